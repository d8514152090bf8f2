//! Ball tracking: turns stereo detections into a filtered trajectory.
//!
//! This module implements the per-frame cycle:
//! - Stereo triangulation and world transform of the raw detection
//! - Plausibility gating
//! - Track seeding with the launch heuristic
//! - EKF predict + update against the pixel measurement
//! - Track timeout and reset

pub mod detection;
pub mod estimator;
pub mod gate;
pub mod result;
pub mod state;
pub mod track;

pub use detection::StereoDetection;
pub use estimator::BallEstimator;
pub use gate::PlausibilityGate;
pub use result::{BallEstimate, FrameDiagnostics, FrameResult};
pub use state::TrackPhase;
pub use track::{ActiveTrack, Track};
