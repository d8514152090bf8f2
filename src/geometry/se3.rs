//! Rigid-body transform used for camera poses.

use nalgebra::{Matrix3, Rotation3, UnitQuaternion, Vector3};

/// Rigid transform `T_ab`: maps points expressed in frame `b` into frame `a`.
#[derive(Debug, Clone, PartialEq)]
pub struct SE3 {
    pub rotation: UnitQuaternion<f64>,
    pub translation: Vector3<f64>,
}

impl SE3 {
    /// Build from a (possibly non-normalized) quaternion and a translation.
    pub fn from_quaternion(
        x: f64,
        y: f64,
        z: f64,
        w: f64,
        translation: Vector3<f64>,
    ) -> Self {
        let q = nalgebra::Quaternion::new(w, x, y, z);
        Self {
            rotation: UnitQuaternion::from_quaternion(q),
            translation,
        }
    }

    /// Build from a rotation matrix and translation.
    ///
    /// The matrix is re-orthonormalized, so slightly noisy rotations are accepted.
    pub fn from_rt(rotation: &Matrix3<f64>, translation: Vector3<f64>) -> Self {
        let rot = Rotation3::from_matrix(rotation);
        Self {
            rotation: UnitQuaternion::from_rotation_matrix(&rot),
            translation,
        }
    }

    pub fn inverse(&self) -> Self {
        let rotation = self.rotation.inverse();
        Self {
            translation: -(rotation * self.translation),
            rotation,
        }
    }

    pub fn transform_point(&self, p: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * p + self.translation
    }

    pub fn rotation_matrix(&self) -> Matrix3<f64> {
        self.rotation.to_rotation_matrix().into_inner()
    }
}
