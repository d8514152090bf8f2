//! Per-frame estimator output and diagnostics.
//!
//! These types describe what happened during processing of a single frame:
//! - whether the measurement was applied and whether the track continued
//! - the posterior ball state and covariance
//! - the conditions raised along the way
//! - the raw inputs and intermediates, for offline replay and tuning

use nalgebra::{Point2, Vector3};

use crate::camera::CameraPose;
use crate::error::FrameCondition;
use crate::filter::{ExtendedKalmanFilter, Matrix6, Vector4};

/// Ball position, velocity and covariance at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct BallEstimate {
    pub timestamp_s: f64,
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    /// Covariance of `[position, velocity]`.
    pub covariance: Matrix6,
}

impl BallEstimate {
    pub fn from_filter(filter: &ExtendedKalmanFilter<6>, timestamp_s: f64) -> Self {
        let x = filter.state();
        Self {
            timestamp_s,
            position: x.fixed_rows::<3>(0).into_owned(),
            velocity: x.fixed_rows::<3>(3).into_owned(),
            covariance: *filter.covariance(),
        }
    }

    /// Covariance flattened row by row.
    pub fn covariance_row_major(&self) -> [f64; 36] {
        let mut out = [0.0; 36];
        for i in 0..6 {
            for j in 0..6 {
                out[i * 6 + j] = self.covariance[(i, j)];
            }
        }
        out
    }
}

/// Intermediate values of one processed frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameDiagnostics {
    /// `[left_x, left_y, right_x, right_y]`.
    pub pixels: [f64; 4],
    pub camera_pose: CameraPose,
    /// Raw triangulation in the optical frame, before the filter.
    pub point_camera: Option<Vector3<f64>>,
    /// Raw triangulation in the world frame, before the filter.
    pub point_world: Option<Vector3<f64>>,
    /// Time since the previous received frame (s).
    pub delta_t_s: f64,
    /// Innovation of the applied update.
    pub innovation: Option<Vector4>,
    /// Normalized innovation squared of the applied update.
    pub nis: Option<f64>,
}

impl FrameDiagnostics {
    pub fn new(left: &Point2<f64>, right: &Point2<f64>, camera_pose: &CameraPose) -> Self {
        Self {
            pixels: [left.x, left.y, right.x, right.y],
            camera_pose: camera_pose.clone(),
            point_camera: None,
            point_world: None,
            delta_t_s: 0.0,
            innovation: None,
            nis: None,
        }
    }
}

/// Outcome of feeding one detection to the estimator.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameResult {
    pub timestamp_s: f64,
    /// False when the frame never reached triangulation (no pose, malformed input).
    pub processed: bool,
    /// True when the detection was accepted and seeded or updated the track.
    pub valid: bool,
    /// True when the estimate continues an existing track, false on (re)seeding.
    pub continuing: bool,
    pub conditions: Vec<FrameCondition>,
    /// Current track estimate; `None` without a track.
    pub estimate: Option<BallEstimate>,
    pub diagnostics: Option<FrameDiagnostics>,
}

impl FrameResult {
    /// A frame dropped before triangulation.
    pub fn skipped(
        timestamp_s: f64,
        condition: FrameCondition,
        estimate: Option<BallEstimate>,
    ) -> Self {
        Self {
            timestamp_s,
            processed: false,
            valid: false,
            continuing: estimate.is_some(),
            conditions: vec![condition],
            estimate,
            diagnostics: None,
        }
    }

    /// `|`-separated condition codes, empty when the frame was clean.
    pub fn condition_codes(&self) -> String {
        self.conditions
            .iter()
            .map(FrameCondition::code)
            .collect::<Vec<_>>()
            .join("|")
    }
}
