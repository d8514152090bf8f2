//! Constant-gravity ballistic motion model.

use nalgebra::Vector3;

use super::ekf::ProcessModel;
use super::types::{Matrix6, Vector6, STATE_DIM};

/// Standard gravity in the world frame (z up), m/s^2.
pub const GRAVITY: Vector3<f64> = Vector3::new(0.0, 0.0, -9.80665);

/// Discretized ballistic flight over an elapsed time `dt`.
///
/// Position integrates velocity, velocity is constant apart from gravity.
/// Gravity enters as a deterministic control input rather than as noise, and a
/// small diagonal process noise absorbs drag, spin and calibration error.
#[derive(Debug, Clone, Copy)]
pub struct BallisticModel {
    pub dt: f64,
    pub gravity: Vector3<f64>,
    pub process_noise: f64,
}

impl BallisticModel {
    pub fn new(dt: f64, gravity: Vector3<f64>, process_noise: f64) -> Self {
        Self {
            dt,
            gravity,
            process_noise,
        }
    }

    /// `F = [[I, dt I], [0, I]]`.
    pub fn transition(&self) -> Matrix6 {
        let mut f = Matrix6::identity();
        f.fixed_view_mut::<3, 3>(0, 3)
            .copy_from(&(nalgebra::Matrix3::identity() * self.dt));
        f
    }

    /// `u = [g dt^2 / 2, g dt]`.
    pub fn control(&self) -> Vector6 {
        let mut u = Vector6::zeros();
        u.fixed_rows_mut::<3>(0)
            .copy_from(&(self.gravity * (0.5 * self.dt * self.dt)));
        u.fixed_rows_mut::<3>(3).copy_from(&(self.gravity * self.dt));
        u
    }
}

impl ProcessModel<STATE_DIM> for BallisticModel {
    fn evaluate(&self, state: &Vector6) -> Vector6 {
        self.transition() * state + self.control()
    }

    fn jacobian(&self, _state: &Vector6) -> Matrix6 {
        self.transition()
    }

    fn noise(&self) -> Matrix6 {
        Matrix6::identity() * self.process_noise
    }
}
