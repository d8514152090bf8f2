//! Generic extended Kalman filter.
//!
//! The filter only knows about models through the [`ProcessModel`] and
//! [`MeasurementModel`] traits, so the ballistic and stereo models can be
//! unit tested on their own and swapped without touching the update cycle.

use nalgebra::{SMatrix, SVector};

use crate::error::FilterError;

/// Smallest accepted `(min pivot / max pivot)^2` of the innovation covariance
/// Cholesky factor, an estimate of its reciprocal condition number.
const MIN_INNOVATION_RCOND: f64 = 1e-12;

/// State transition `x_k = f(x_{k-1})` with its Jacobian and additive noise.
pub trait ProcessModel<const N: usize> {
    fn evaluate(&self, state: &SVector<f64, N>) -> SVector<f64, N>;
    fn jacobian(&self, state: &SVector<f64, N>) -> SMatrix<f64, N, N>;
    fn noise(&self) -> SMatrix<f64, N, N>;
}

/// Observation `z = h(x)` with its Jacobian and additive noise.
pub trait MeasurementModel<const N: usize, const M: usize> {
    fn evaluate(&self, state: &SVector<f64, N>) -> SVector<f64, M>;
    fn jacobian(&self, state: &SVector<f64, N>) -> SMatrix<f64, M, N>;
    fn noise(&self) -> SMatrix<f64, M, M>;
}

/// Innovation statistics of an applied update.
#[derive(Debug, Clone, PartialEq)]
pub struct Innovation<const M: usize> {
    /// `y = z - h(x_pred)`.
    pub residual: SVector<f64, M>,
    /// `S = H P_pred H^T + R`.
    pub covariance: SMatrix<f64, M, M>,
    /// Normalized innovation squared `y^T S^-1 y`.
    pub nis: f64,
}

/// Mean and covariance of an N-dimensional Gaussian state.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtendedKalmanFilter<const N: usize> {
    state: SVector<f64, N>,
    covariance: SMatrix<f64, N, N>,
}

impl<const N: usize> ExtendedKalmanFilter<N> {
    pub fn new(state: SVector<f64, N>, covariance: SMatrix<f64, N, N>) -> Self {
        Self {
            state,
            covariance: symmetrize(&covariance),
        }
    }

    pub fn state(&self) -> &SVector<f64, N> {
        &self.state
    }

    pub fn covariance(&self) -> &SMatrix<f64, N, N> {
        &self.covariance
    }

    /// Propagate mean and covariance through the process model.
    pub fn predict<P: ProcessModel<N>>(&mut self, process: &P) {
        let f = process.jacobian(&self.state);
        self.state = process.evaluate(&self.state);
        self.covariance = symmetrize(&(f * self.covariance * f.transpose() + process.noise()));
    }

    /// Correct the current (predicted) estimate with measurement `z`.
    ///
    /// On error the filter is left untouched, i.e. it keeps the predicted
    /// estimate.
    pub fn update<H, const M: usize>(
        &mut self,
        model: &H,
        z: &SVector<f64, M>,
    ) -> Result<Innovation<M>, FilterError>
    where
        H: MeasurementModel<N, M>,
    {
        let h = model.jacobian(&self.state);
        let residual = z - model.evaluate(&self.state);
        if residual.iter().chain(h.iter()).any(|v| !v.is_finite()) {
            return Err(FilterError::NonFinite);
        }

        let s = symmetrize(&(h * self.covariance * h.transpose() + model.noise()));
        let chol = s.cholesky().ok_or(FilterError::NotPositiveDefinite)?;

        let pivots = chol.l().diagonal();
        let rcond = (pivots.min() / pivots.max()).powi(2);
        if !(rcond >= MIN_INNOVATION_RCOND) {
            return Err(FilterError::IllConditioned { rcond });
        }

        // K = P H^T S^-1, so K^T = S^-1 H P (P and S symmetric).
        let gain = chol.solve(&(h * self.covariance)).transpose();
        let nis = residual.dot(&chol.solve(&residual));

        self.state += gain * residual;
        let i_kh = SMatrix::<f64, N, N>::identity() - gain * h;
        self.covariance = symmetrize(&(i_kh * self.covariance));

        Ok(Innovation {
            residual,
            covariance: s,
            nis,
        })
    }

    /// One full predict + update cycle.
    pub fn step<P, H, const M: usize>(
        &mut self,
        process: &P,
        model: &H,
        z: &SVector<f64, M>,
    ) -> Result<Innovation<M>, FilterError>
    where
        P: ProcessModel<N>,
        H: MeasurementModel<N, M>,
    {
        self.predict(process);
        self.update(model, z)
    }
}

/// Average a square matrix with its transpose.
pub fn symmetrize<const N: usize>(m: &SMatrix<f64, N, N>) -> SMatrix<f64, N, N> {
    (m + m.transpose()) * 0.5
}
