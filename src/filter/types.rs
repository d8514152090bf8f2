//! Fixed-size aliases for the ball filter.
//!
//! The state is `[px, py, pz, vx, vy, vz]` in the world frame; the measurement
//! is `[left_x, left_y, right_x, right_y]` in pixels.

use nalgebra::{SMatrix, SVector};

/// Ball state dimension.
pub const STATE_DIM: usize = 6;

/// Stereo measurement dimension.
pub const MEAS_DIM: usize = 4;

/// 6-dimensional ball state.
pub type Vector6 = SVector<f64, STATE_DIM>;

/// 6×6 state covariance / transition matrix.
pub type Matrix6 = SMatrix<f64, STATE_DIM, STATE_DIM>;

/// Stereo pixel measurement.
pub type Vector4 = SVector<f64, MEAS_DIM>;

/// 4×4 measurement noise / innovation covariance.
pub type Matrix4 = SMatrix<f64, MEAS_DIM, MEAS_DIM>;

/// 4×6 measurement Jacobian.
pub type Matrix4x6 = SMatrix<f64, MEAS_DIM, STATE_DIM>;
