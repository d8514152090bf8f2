//! Track value and its seeding from a first detection.

use nalgebra::Vector3;

use crate::config::EstimatorConfig;
use crate::filter::{ExtendedKalmanFilter, Matrix6, Vector6};
use crate::tracking::state::TrackPhase;

/// Below this, horizontal range and the launch heuristic's denominator are treated as zero.
const SEED_EPS: f64 = 1e-9;

/// The ball track. Replaced wholesale on (re)initialization and timeout.
#[derive(Debug, Clone, Default)]
pub enum Track {
    #[default]
    Uninitialized,
    Tracking(ActiveTrack),
}

impl Track {
    pub fn phase(&self) -> TrackPhase {
        match self {
            Self::Uninitialized => TrackPhase::Uninitialized,
            Self::Tracking(_) => TrackPhase::Tracking,
        }
    }

    pub fn active(&self) -> Option<&ActiveTrack> {
        match self {
            Self::Uninitialized => None,
            Self::Tracking(active) => Some(active),
        }
    }
}

/// Filter state of a live track.
#[derive(Debug, Clone)]
pub struct ActiveTrack {
    pub filter: ExtendedKalmanFilter<6>,
    /// Time of the detection that seeded the track (s).
    pub started_at_s: f64,
    /// Time of the last detection applied to the filter (s).
    pub last_update_s: f64,
    /// Number of measurement updates applied since seeding.
    pub updates: usize,
}

impl ActiveTrack {
    /// Seed a track at `position` with the launch heuristic velocity and the
    /// configured initial covariance.
    pub fn seed(position: &Vector3<f64>, timestamp_s: f64, config: &EstimatorConfig) -> Self {
        let velocity = launch_velocity(position, &config.gravity());
        let state = Vector6::new(
            position.x, position.y, position.z, velocity.x, velocity.y, velocity.z,
        );
        Self {
            filter: ExtendedKalmanFilter::new(state, initial_covariance(config)),
            started_at_s: timestamp_s,
            last_update_s: timestamp_s,
            updates: 0,
        }
    }
}

/// Guess the velocity of a ball first seen at `position`.
///
/// Assumes the ball was thrown toward the world origin on a 45 degree arc:
/// with horizontal range `d`, the launch speed is
/// `v0 = d * sqrt(-g_z) / sqrt(2 |d + p_z|)`, the horizontal velocity points
/// from the ball to the origin with magnitude `v0`, and the vertical velocity
/// is `v0`.
pub fn launch_velocity(position: &Vector3<f64>, gravity: &Vector3<f64>) -> Vector3<f64> {
    let range = position.x.hypot(position.y);
    let denom = (2.0 * (range + position.z).abs()).sqrt();
    let v0 = if denom > SEED_EPS {
        range * (-gravity.z).max(0.0).sqrt() / denom
    } else {
        0.0
    };

    if range > SEED_EPS {
        Vector3::new(-v0 * position.x / range, -v0 * position.y / range, v0)
    } else {
        Vector3::new(0.0, 0.0, v0)
    }
}

/// `P_init = diag(position variances, velocity variances)`.
pub fn initial_covariance(config: &EstimatorConfig) -> Matrix6 {
    let [px, py, pz] = config.initial_position_variance;
    let [vx, vy, vz] = config.initial_velocity_variance;
    Matrix6::from_diagonal(&Vector6::new(px, py, pz, vx, vy, vz))
}
