//! Estimator tuning parameters.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use anyhow::{Context, Result};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::error::EstimatorError;
use crate::tracking::gate::PlausibilityGate;

/// Tuning of the ball estimator.
///
/// Every field has a default, so a JSON file only needs to list what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Gravity in the world frame (m/s^2).
    pub gravity: [f64; 3],
    /// Gap between received frames after which the track is dropped (s).
    pub track_timeout_s: f64,
    /// Diagonal process noise added to every state component per step.
    pub process_noise: f64,
    /// Pixel measurement variance (px^2).
    pub measurement_noise_px2: f64,
    /// Initial position variances (x, y, z).
    pub initial_position_variance: [f64; 3],
    /// Initial velocity variances (x, y, z).
    pub initial_velocity_variance: [f64; 3],
    pub gate: PlausibilityGate,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            gravity: [0.0, 0.0, -9.80665],
            track_timeout_s: 5.0,
            process_noise: 1e-3,
            measurement_noise_px2: 1.0,
            initial_position_variance: [2.0, 1.0, 1.0],
            initial_velocity_variance: [4.0, 4.0, 4.0],
            gate: PlausibilityGate::default(),
        }
    }
}

impl EstimatorConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file =
            File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
        let config: Self = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to parse estimator config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn gravity(&self) -> Vector3<f64> {
        Vector3::from(self.gravity)
    }

    pub fn validate(&self) -> Result<(), EstimatorError> {
        let positive = |name: &str, v: f64| {
            if v.is_finite() && v > 0.0 {
                Ok(())
            } else {
                Err(EstimatorError::InvalidConfig(format!(
                    "{name} must be positive, got {v}"
                )))
            }
        };

        positive("track_timeout_s", self.track_timeout_s)?;
        positive("process_noise", self.process_noise)?;
        positive("measurement_noise_px2", self.measurement_noise_px2)?;
        for v in self
            .initial_position_variance
            .iter()
            .chain(self.initial_velocity_variance.iter())
        {
            positive("initial variance", *v)?;
        }
        if self.gravity.iter().any(|g| !g.is_finite()) {
            return Err(EstimatorError::InvalidConfig(
                "gravity must be finite".to_string(),
            ));
        }
        if !self.gate.is_well_formed() {
            return Err(EstimatorError::InvalidConfig(
                "plausibility gate intervals must be finite and ordered".to_string(),
            ));
        }
        Ok(())
    }
}
