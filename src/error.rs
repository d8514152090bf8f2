//! Error and per-frame condition types.
//!
//! Construction problems (missing calibration, bad configuration) are
//! returned as [`EstimatorError`] and should stop the caller. Everything that
//! can go wrong while processing a single frame is reported as a
//! [`FrameCondition`] inside the frame result and never aborts estimation.

use nalgebra::Vector3;
use thiserror::Error;

/// Failures that prevent an estimator from being built.
#[derive(Debug, Error)]
pub enum EstimatorError {
    #[error("missing {camera} camera calibration")]
    MissingCalibration { camera: &'static str },
    #[error("invalid {camera} camera calibration: {reason}")]
    InvalidCalibration {
        camera: &'static str,
        reason: String,
    },
    #[error("invalid estimator configuration: {0}")]
    InvalidConfig(String),
}

/// Why a detection cannot be used at all.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum DetectionError {
    #[error("expected exactly 2 pixel points, got {count}")]
    WrongPointCount { count: usize },
    #[error("pixel coordinates are not finite")]
    NonFinitePixel,
    #[error("timestamp {timestamp_s} is not finite")]
    NonFiniteTimestamp { timestamp_s: f64 },
}

/// Direct linear triangulation failures.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TriangulationError {
    #[error("triangulation input is not finite")]
    NonFiniteInput,
    #[error("svd failed")]
    SvdFailed,
    #[error("degenerate stereo geometry (homogeneous coordinate {w:e})")]
    DegenerateGeometry { w: f64 },
}

/// Reasons an EKF update was not applied.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum FilterError {
    #[error("innovation or measurement jacobian is not finite")]
    NonFinite,
    #[error("innovation covariance is not positive definite")]
    NotPositiveDefinite,
    #[error("innovation covariance is ill-conditioned (rcond {rcond:e})")]
    IllConditioned { rcond: f64 },
}

/// Something noteworthy that happened while processing one frame.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FrameCondition {
    #[error("camera pose unavailable, frame skipped")]
    PoseUnavailable,
    #[error("malformed detection: {0}")]
    MalformedDetection(DetectionError),
    #[error(transparent)]
    DegenerateGeometry(TriangulationError),
    #[error(
        "triangulated point ({:.3}, {:.3}, {:.3}) outside plausibility bounds",
        .point.x, .point.y, .point.z
    )]
    OutOfBounds { point: Vector3<f64> },
    #[error("negative elapsed time {dt_s:.6} s (timestamps out of order)")]
    NegativeDeltaTime { dt_s: f64 },
    #[error("update skipped: {0}")]
    NumericalError(FilterError),
    #[error("no detection for {gap_s:.3} s, track reset")]
    TrackTimeout { gap_s: f64 },
}

impl FrameCondition {
    /// Short machine-readable code, used in replay output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::PoseUnavailable => "pose_unavailable",
            Self::MalformedDetection(_) => "malformed_detection",
            Self::DegenerateGeometry(_) => "degenerate_geometry",
            Self::OutOfBounds { .. } => "out_of_bounds",
            Self::NegativeDeltaTime { .. } => "negative_delta_time",
            Self::NumericalError(_) => "numerical_error",
            Self::TrackTimeout { .. } => "track_timeout",
        }
    }
}
