//! Stereo calibration and per-frame camera pose.

use nalgebra::{Matrix3, Matrix3x4, Vector3};

use crate::error::EstimatorError;
use crate::geometry::{SE3, transform_to_world};

/// Rectified stereo projection matrices of the left and right camera.
///
/// Both map points in the left camera's optical frame to homogeneous pixels.
/// Any scale and any non-degenerate third row is accepted; pixels are always
/// dehomogenized by that row. For a rectified pair the third row is
/// `[0, 0, 1, 0]` and the right camera carries the baseline term in
/// `P_R(0, 3) = -fx * baseline`.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoCalibration {
    left: Matrix3x4<f64>,
    right: Matrix3x4<f64>,
}

impl StereoCalibration {
    pub fn new(left: Matrix3x4<f64>, right: Matrix3x4<f64>) -> Result<Self, EstimatorError> {
        validate_projection("left", &left)?;
        validate_projection("right", &right)?;
        Ok(Self { left, right })
    }

    /// Build from the 12-element row-major `P` arrays a camera-info source provides.
    pub fn from_row_major(left: &[f64], right: &[f64]) -> Result<Self, EstimatorError> {
        let left = projection_from_slice("left", left)?;
        let right = projection_from_slice("right", right)?;
        Self::new(left, right)
    }

    /// Rectified pinhole pair with a horizontal baseline (meters).
    pub fn from_pinhole(
        fx: f64,
        fy: f64,
        cx: f64,
        cy: f64,
        baseline: f64,
    ) -> Result<Self, EstimatorError> {
        let left = Matrix3x4::new(
            fx, 0.0, cx, 0.0,
            0.0, fy, cy, 0.0,
            0.0, 0.0, 1.0, 0.0,
        );
        let mut right = left;
        right[(0, 3)] = -fx * baseline;
        Self::new(left, right)
    }

    pub fn left(&self) -> &Matrix3x4<f64> {
        &self.left
    }

    pub fn right(&self) -> &Matrix3x4<f64> {
        &self.right
    }
}

fn projection_from_slice(
    camera: &'static str,
    values: &[f64],
) -> Result<Matrix3x4<f64>, EstimatorError> {
    if values.is_empty() {
        return Err(EstimatorError::MissingCalibration { camera });
    }
    if values.len() != 12 {
        return Err(EstimatorError::InvalidCalibration {
            camera,
            reason: format!("expected 12 projection coefficients, got {}", values.len()),
        });
    }
    Ok(Matrix3x4::from_row_slice(values))
}

fn validate_projection(camera: &'static str, p: &Matrix3x4<f64>) -> Result<(), EstimatorError> {
    if p.iter().any(|v| !v.is_finite()) {
        return Err(EstimatorError::InvalidCalibration {
            camera,
            reason: "projection matrix contains non-finite values".to_string(),
        });
    }
    if p[(0, 0)].abs() < f64::EPSILON || p[(1, 1)].abs() < f64::EPSILON {
        return Err(EstimatorError::InvalidCalibration {
            camera,
            reason: "zero focal length".to_string(),
        });
    }
    if p.row(2).norm() < f64::EPSILON {
        return Err(EstimatorError::InvalidCalibration {
            camera,
            reason: "projection matrix has an empty depth row".to_string(),
        });
    }
    Ok(())
}

/// Pose of the left optical frame in the world frame, with its inverse.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    /// `T_wc`: camera optical frame to world.
    pub world_from_camera: SE3,
    /// `T_cw`: world to camera optical frame.
    pub camera_from_world: SE3,
}

impl CameraPose {
    pub fn new(world_from_camera: SE3) -> Self {
        let camera_from_world = world_from_camera.inverse();
        Self {
            world_from_camera,
            camera_from_world,
        }
    }

    pub fn from_rt(rotation: &Matrix3<f64>, position: Vector3<f64>) -> Self {
        Self::new(SE3::from_rt(rotation, position))
    }

    /// Quaternion components in `x, y, z, w` order, as most transform sources publish them.
    pub fn from_quaternion(q: [f64; 4], position: Vector3<f64>) -> Self {
        Self::new(SE3::from_quaternion(q[0], q[1], q[2], q[3], position))
    }

    pub fn position(&self) -> Vector3<f64> {
        self.world_from_camera.translation
    }

    pub fn to_world(&self, point_camera: &Vector3<f64>) -> Vector3<f64> {
        transform_to_world(
            point_camera,
            &self.world_from_camera.rotation_matrix(),
            &self.position(),
        )
    }

    pub fn is_finite(&self) -> bool {
        let t = &self.world_from_camera;
        t.rotation.coords.iter().chain(t.translation.iter()).all(|v| v.is_finite())
    }
}
