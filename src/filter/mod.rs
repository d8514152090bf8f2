//! Extended Kalman filter core and the ball models plugged into it.

pub mod ekf;
pub mod measurement_model;
pub mod motion_model;
pub mod types;

pub use ekf::{ExtendedKalmanFilter, Innovation, MeasurementModel, ProcessModel};
pub use measurement_model::StereoProjectionModel;
pub use motion_model::{BallisticModel, GRAVITY};
pub use types::{Matrix4, Matrix4x6, Matrix6, Vector4, Vector6};
