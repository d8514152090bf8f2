//! Stereo pixel measurement model and its analytic Jacobian.

use nalgebra::{Matrix3, Matrix3x4, RowVector3, Vector3};

use super::ekf::MeasurementModel;
use super::types::{Matrix4, Matrix4x6, Vector4, Vector6, MEAS_DIM, STATE_DIM};
use crate::camera::{CameraPose, StereoCalibration};

/// Projects a world-frame ball state into `[left_x, left_y, right_x, right_y]`.
///
/// The position is first moved into the left optical frame with the inverse
/// camera pose, then every pixel coordinate is `(P[r] . [x_cam; 1]) /
/// (P[2] . [x_cam; 1])` with the camera's own projection matrix. For a
/// rectified `P` the denominator is the optical depth. Velocity does not
/// enter the measurement.
pub struct StereoProjectionModel<'a> {
    calibration: &'a StereoCalibration,
    /// Rotation part of `T_cw`.
    rotation: Matrix3<f64>,
    /// Translation part of `T_cw`.
    translation: Vector3<f64>,
    noise: Matrix4,
}

impl<'a> StereoProjectionModel<'a> {
    pub fn new(
        calibration: &'a StereoCalibration,
        pose: &CameraPose,
        pixel_variance: f64,
    ) -> Self {
        Self {
            calibration,
            rotation: pose.camera_from_world.rotation_matrix(),
            translation: pose.camera_from_world.translation,
            noise: Matrix4::identity() * pixel_variance,
        }
    }

    /// World position to left optical frame.
    pub fn to_camera(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.rotation * position + self.translation
    }

    /// Projection rows in measurement order.
    fn rows(&self) -> [(&Matrix3x4<f64>, usize); MEAS_DIM] {
        let left = self.calibration.left();
        let right = self.calibration.right();
        [(left, 0), (left, 1), (right, 0), (right, 1)]
    }
}

fn position(state: &Vector6) -> Vector3<f64> {
    state.fixed_rows::<3>(0).into_owned()
}

/// `P[r] . [x; 1]`.
fn row_dot(p: &Matrix3x4<f64>, r: usize, x_cam: &Vector3<f64>) -> f64 {
    p[(r, 0)] * x_cam.x + p[(r, 1)] * x_cam.y + p[(r, 2)] * x_cam.z + p[(r, 3)]
}

/// `P[r, 0..3]`.
fn row_gradient(p: &Matrix3x4<f64>, r: usize) -> RowVector3<f64> {
    RowVector3::new(p[(r, 0)], p[(r, 1)], p[(r, 2)])
}

impl MeasurementModel<STATE_DIM, MEAS_DIM> for StereoProjectionModel<'_> {
    fn evaluate(&self, state: &Vector6) -> Vector4 {
        let x_cam = self.to_camera(&position(state));

        let mut z = Vector4::zeros();
        for (i, (p, r)) in self.rows().into_iter().enumerate() {
            z[i] = row_dot(p, r, &x_cam) / row_dot(p, 2, &x_cam);
        }
        z
    }

    fn jacobian(&self, state: &Vector6) -> Matrix4x6 {
        let x_cam = self.to_camera(&position(state));

        let mut h = Matrix4x6::zeros();
        for (i, (p, r)) in self.rows().into_iter().enumerate() {
            let numerator = row_dot(p, r, &x_cam);
            let denom = row_dot(p, 2, &x_cam);
            // Quotient rule on n / d w.r.t. the camera-frame point.
            let d_cam = (row_gradient(p, r) * denom - row_gradient(p, 2) * numerator)
                / (denom * denom);
            // Chain through x_cam = R_cw x_world + t_cw.
            let d_world = d_cam * self.rotation;
            h.fixed_view_mut::<1, 3>(i, 0).copy_from(&d_world);
        }
        h
    }

    fn noise(&self) -> Matrix4 {
        self.noise
    }
}
