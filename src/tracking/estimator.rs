//! Ball estimator: drives one measurement cycle from stereo pixels to the
//! posterior ball state.
//!
//! Per detection:
//! - Resolve the stereo pair (malformed detections and missing poses are
//!   skipped without touching any state)
//! - Triangulate the raw point and move it into the world frame
//! - Advance the received-frame clock, dropping the track after a long gap
//! - Gate the raw point for plausibility
//! - Seed a new track, or run one EKF predict + update on the existing one

use tracing::{debug, info, warn};

use crate::camera::{CameraPose, StereoCalibration};
use crate::config::EstimatorConfig;
use crate::error::{EstimatorError, FrameCondition};
use crate::filter::{BallisticModel, StereoProjectionModel, Vector4};
use crate::geometry::triangulate;
use crate::tracking::detection::StereoDetection;
use crate::tracking::result::{BallEstimate, FrameDiagnostics, FrameResult};
use crate::tracking::state::TrackPhase;
use crate::tracking::track::{ActiveTrack, Track};

/// Single-target ball trajectory estimator.
///
/// Owns its track exclusively and must be driven from one place at a time;
/// independent estimators share nothing.
pub struct BallEstimator {
    calibration: StereoCalibration,
    config: EstimatorConfig,
    track: Track,
    /// Timestamp of the last frame that reached triangulation, accepted or not.
    last_frame_s: Option<f64>,
}

impl BallEstimator {
    /// Calibration is a precondition: there is no estimator without it.
    pub fn new(
        calibration: StereoCalibration,
        config: EstimatorConfig,
    ) -> Result<Self, EstimatorError> {
        config.validate()?;
        Ok(Self {
            calibration,
            config,
            track: Track::Uninitialized,
            last_frame_s: None,
        })
    }

    pub fn phase(&self) -> TrackPhase {
        self.track.phase()
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    /// Latest estimate of the current track.
    pub fn estimate(&self) -> Option<BallEstimate> {
        self.track
            .active()
            .map(|active| BallEstimate::from_filter(&active.filter, active.last_update_s))
    }

    /// Drop the track and the frame clock.
    pub fn reset(&mut self) {
        self.track = Track::Uninitialized;
        self.last_frame_s = None;
    }

    /// Process one stereo detection.
    ///
    /// `pose` is the left optical frame in the world frame at capture time, or
    /// `None` if it could not be resolved. A pose with non-finite components is
    /// treated as unavailable.
    pub fn process_frame(
        &mut self,
        detection: &StereoDetection,
        pose: Option<&CameraPose>,
    ) -> FrameResult {
        let timestamp_s = detection.timestamp_s;

        let Some(pose) = pose.filter(|p| p.is_finite()) else {
            warn!(timestamp_s, "camera pose unavailable, skipping frame");
            return FrameResult::skipped(
                timestamp_s,
                FrameCondition::PoseUnavailable,
                self.estimate(),
            );
        };

        let (pixel_l, pixel_r) = match detection.pair() {
            Ok(pair) => pair,
            Err(err) => {
                warn!(timestamp_s, %err, "malformed detection, skipping frame");
                return FrameResult::skipped(
                    timestamp_s,
                    FrameCondition::MalformedDetection(err),
                    self.estimate(),
                );
            }
        };

        debug!(
            timestamp_s,
            lx = pixel_l.x,
            ly = pixel_l.y,
            rx = pixel_r.x,
            ry = pixel_r.y,
            camera = ?pose.position(),
            "stereo detection"
        );

        let mut conditions = Vec::new();
        let mut diagnostics = FrameDiagnostics::new(&pixel_l, &pixel_r, pose);
        let triangulated = triangulate(
            &pixel_l,
            &pixel_r,
            self.calibration.left(),
            self.calibration.right(),
        );
        diagnostics.delta_t_s = self.advance_clock(timestamp_s, &mut conditions);

        let point_camera = match triangulated {
            Ok(point) => point,
            Err(err) => {
                warn!(timestamp_s, %err, "triangulation failed");
                conditions.push(FrameCondition::DegenerateGeometry(err));
                return self.rejected(timestamp_s, conditions, diagnostics);
            }
        };
        let point_world = pose.to_world(&point_camera);
        diagnostics.point_camera = Some(point_camera);
        diagnostics.point_world = Some(point_world);
        debug!(timestamp_s, optical = ?point_camera, world = ?point_world, "raw ball point");

        if !self.config.gate.contains(&point_world) {
            warn!(
                timestamp_s,
                point = ?point_world,
                "invalid ball point, outside plausibility bounds"
            );
            conditions.push(FrameCondition::OutOfBounds { point: point_world });
            return self.rejected(timestamp_s, conditions, diagnostics);
        }

        if let Track::Tracking(active) = &mut self.track {
            let process = BallisticModel::new(
                diagnostics.delta_t_s,
                self.config.gravity(),
                self.config.process_noise,
            );
            let measurement = StereoProjectionModel::new(
                &self.calibration,
                pose,
                self.config.measurement_noise_px2,
            );
            let z = Vector4::new(pixel_l.x, pixel_l.y, pixel_r.x, pixel_r.y);

            let valid = match active.filter.step(&process, &measurement, &z) {
                Ok(innovation) => {
                    active.updates += 1;
                    diagnostics.innovation = Some(innovation.residual);
                    diagnostics.nis = Some(innovation.nis);
                    true
                }
                Err(err) => {
                    warn!(timestamp_s, %err, "EKF update skipped, keeping prediction");
                    conditions.push(FrameCondition::NumericalError(err));
                    false
                }
            };
            // The prediction was applied either way.
            active.last_update_s = timestamp_s;

            let estimate = BallEstimate::from_filter(&active.filter, timestamp_s);
            debug!(
                timestamp_s,
                position = ?estimate.position,
                velocity = ?estimate.velocity,
                nis = ?diagnostics.nis,
                "ball estimate"
            );
            return FrameResult {
                timestamp_s,
                processed: true,
                valid,
                continuing: true,
                conditions,
                estimate: Some(estimate),
                diagnostics: Some(diagnostics),
            };
        }

        let active = ActiveTrack::seed(&point_world, timestamp_s, &self.config);
        let estimate = BallEstimate::from_filter(&active.filter, timestamp_s);
        info!(
            timestamp_s,
            position = ?estimate.position,
            velocity = ?estimate.velocity,
            "ball track initialized"
        );
        self.track = Track::Tracking(active);
        FrameResult {
            timestamp_s,
            processed: true,
            valid: true,
            continuing: false,
            conditions,
            estimate: Some(estimate),
            diagnostics: Some(diagnostics),
        }
    }

    /// Advance the received-frame clock and return the elapsed time.
    ///
    /// Runs for every frame that reaches triangulation, whether or not the
    /// detection is later accepted.
    fn advance_clock(&mut self, timestamp_s: f64, conditions: &mut Vec<FrameCondition>) -> f64 {
        let mut delta_t_s = match self.last_frame_s {
            Some(prev) => timestamp_s - prev,
            None => 0.0,
        };

        if delta_t_s > self.config.track_timeout_s {
            if self.track.phase() == TrackPhase::Tracking {
                info!(gap_s = delta_t_s, "ball not detected within timeout, track reset");
                conditions.push(FrameCondition::TrackTimeout { gap_s: delta_t_s });
            }
            self.track = Track::Uninitialized;
            delta_t_s = 0.0;
        }

        if delta_t_s < 0.0 {
            warn!(delta_t_s, "frame timestamps are inverted");
            conditions.push(FrameCondition::NegativeDeltaTime { dt_s: delta_t_s });
        }

        self.last_frame_s = Some(timestamp_s);
        delta_t_s
    }

    fn rejected(
        &self,
        timestamp_s: f64,
        conditions: Vec<FrameCondition>,
        diagnostics: FrameDiagnostics,
    ) -> FrameResult {
        let estimate = self.estimate();
        FrameResult {
            timestamp_s,
            processed: true,
            valid: false,
            continuing: estimate.is_some(),
            conditions,
            estimate,
            diagnostics: Some(diagnostics),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectionError;
    use crate::filter::{Matrix6, Vector6};
    use crate::geometry::SE3;
    use crate::synthetic::{BallisticThrow, StereoRig};
    use approx::assert_relative_eq;
    use nalgebra::{Point2, UnitQuaternion, Vector3};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn p_init() -> Matrix6 {
        Matrix6::from_diagonal(&Vector6::new(2.0, 1.0, 1.0, 4.0, 4.0, 4.0))
    }

    fn throw() -> BallisticThrow {
        BallisticThrow::new(Vector3::new(0.0, 0.0, 1.0), Vector3::new(5.0, 0.0, 6.0))
    }

    fn setup() -> (StereoRig, BallEstimator) {
        let rig = StereoRig::side_view().unwrap();
        let estimator =
            BallEstimator::new(rig.calibration.clone(), EstimatorConfig::default()).unwrap();
        (rig, estimator)
    }

    /// Feed frames at t = 0.1, 0.2, ... for `k` in `range`.
    fn feed(
        rig: &StereoRig,
        estimator: &mut BallEstimator,
        range: std::ops::RangeInclusive<usize>,
    ) -> Vec<FrameResult> {
        let throw = throw();
        range
            .map(|k| {
                let t = 0.1 * k as f64;
                estimator.process_frame(&rig.observe(&throw.position_at(t), t), Some(&rig.pose))
            })
            .collect()
    }

    fn max_asymmetry(m: &Matrix6) -> f64 {
        (m - m.transpose()).abs().max()
    }

    #[test]
    fn test_first_frame_seeds_track() {
        let (rig, mut estimator) = setup();
        assert_eq!(estimator.phase(), TrackPhase::Uninitialized);

        let result = feed(&rig, &mut estimator, 1..=1).remove(0);
        assert!(result.processed && result.valid);
        assert!(!result.continuing);
        assert!(result.conditions.is_empty());

        let estimate = result.estimate.unwrap();
        assert_eq!(estimate.covariance, p_init());
        assert_relative_eq!(estimate.position, throw().position_at(0.1), epsilon = 1e-6);
        assert_eq!(estimator.phase(), TrackPhase::Tracking);

        let diag = result.diagnostics.unwrap();
        assert_eq!(diag.delta_t_s, 0.0);
        assert!(diag.nis.is_none());
        assert_relative_eq!(diag.point_world.unwrap(), throw().position_at(0.1), epsilon = 1e-6);
    }

    #[test]
    fn test_noise_free_throw_converges() {
        let (rig, mut estimator) = setup();
        let results = feed(&rig, &mut estimator, 1..=10);

        assert!(results.iter().all(|r| r.valid));
        assert!(results[1..].iter().all(|r| r.continuing));

        let estimate = estimator.estimate().unwrap();
        assert_relative_eq!(estimate.timestamp_s, 1.0, epsilon = 1e-12);
        let pos_err = (estimate.position - throw().position_at(1.0)).norm();
        let vel_err = (estimate.velocity - throw().velocity_at(1.0)).norm();
        assert!(pos_err < 0.02, "position error {pos_err}");
        assert!(vel_err < 0.1, "velocity error {vel_err}");
    }

    #[test]
    fn test_noisy_throw_converges() {
        let (rig, mut estimator) = setup();
        let throw = throw();
        let mut rng = StdRng::seed_from_u64(42);

        for k in 1..=10 {
            let t = 0.1 * k as f64;
            let detection = rig
                .observe_noisy(&throw.position_at(t), t, 0.5, &mut rng)
                .unwrap();
            let result = estimator.process_frame(&detection, Some(&rig.pose));
            assert!(result.valid);

            let cov = result.estimate.unwrap().covariance;
            assert!(max_asymmetry(&cov) < 1e-9);
        }

        let estimate = estimator.estimate().unwrap();
        let pos_err = (estimate.position - throw.position_at(1.0)).norm();
        let vel_err = (estimate.velocity - throw.velocity_at(1.0)).norm();
        assert!(pos_err < 0.1, "position error {pos_err}");
        assert!(vel_err < 0.5, "velocity error {vel_err}");
    }

    #[test]
    fn test_gap_resets_track() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=3);

        // Frame 4 arrives 6 s after frame 3.
        let detection = rig.observe(&throw().position_at(0.4), 6.3);
        let result = estimator.process_frame(&detection, Some(&rig.pose));

        assert!(result.valid);
        assert!(!result.continuing);
        assert!(matches!(
            result.conditions.as_slice(),
            [FrameCondition::TrackTimeout { gap_s }] if (gap_s - 6.0).abs() < 1e-9
        ));
        assert_eq!(result.estimate.unwrap().covariance, p_init());
        assert_eq!(result.diagnostics.unwrap().delta_t_s, 0.0);
        assert_eq!(estimator.track().active().unwrap().started_at_s, 6.3);
    }

    #[test]
    fn test_gap_without_track_is_silent() {
        let (rig, mut estimator) = setup();
        // Clock starts on a rejected frame, so there is no track to time out.
        let outside = rig.observe(&Vector3::new(-1.0, 1.0, 1.5), 0.0);
        assert!(!estimator.process_frame(&outside, Some(&rig.pose)).valid);

        let detection = rig.observe(&throw().position_at(0.1), 6.0);
        let result = estimator.process_frame(&detection, Some(&rig.pose));
        assert!(result.valid);
        assert!(!result.continuing);
        assert!(result.conditions.is_empty());
    }

    #[test]
    fn test_out_of_bounds_leaves_track_untouched() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=3);

        let outside = [
            Vector3::new(-1.0, 1.0, 1.5),
            Vector3::new(25.0, 1.0, 1.5),
            Vector3::new(5.0, 12.0, 1.5),
            Vector3::new(5.0, 0.0, 12.0),
            Vector3::new(5.0, 0.0, -12.0),
        ];
        for (i, point) in outside.iter().enumerate() {
            let before = estimator.track().active().unwrap().filter.clone();
            let t = 0.31 + 0.01 * i as f64;
            let result = estimator.process_frame(&rig.observe(point, t), Some(&rig.pose));

            assert!(result.processed);
            assert!(!result.valid);
            assert!(result.continuing);
            assert!(matches!(result.conditions[0], FrameCondition::OutOfBounds { .. }));
            assert_eq!(estimator.track().active().unwrap().filter, before);
        }

        // The clock kept running through the rejected frames.
        let result = feed(&rig, &mut estimator, 4..=4).remove(0);
        assert!(result.valid && result.continuing);
        assert_relative_eq!(result.diagnostics.unwrap().delta_t_s, 0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_pose_unavailable_skips_without_bookkeeping() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=1);

        let detection = rig.observe(&throw().position_at(0.2), 0.2);
        let result = estimator.process_frame(&detection, None);
        assert!(!result.processed);
        assert!(!result.valid);
        assert_eq!(result.conditions, vec![FrameCondition::PoseUnavailable]);
        assert_eq!(result.estimate.unwrap().timestamp_s, 0.1);

        let result = feed(&rig, &mut estimator, 3..=3).remove(0);
        assert_relative_eq!(result.diagnostics.unwrap().delta_t_s, 0.2, epsilon = 1e-9);
    }

    #[test]
    fn test_malformed_detection() {
        let (rig, mut estimator) = setup();
        let detection = StereoDetection {
            timestamp_s: 0.1,
            pixels: vec![Point2::new(1.0, 2.0), Point2::new(3.0, 4.0), Point2::new(5.0, 6.0)],
        };

        let result = estimator.process_frame(&detection, Some(&rig.pose));
        assert!(!result.processed);
        assert_eq!(
            result.conditions,
            vec![FrameCondition::MalformedDetection(DetectionError::WrongPointCount { count: 3 })]
        );
        assert!(result.estimate.is_none());
        assert!(!result.continuing);
        assert_eq!(estimator.phase(), TrackPhase::Uninitialized);
    }

    #[test]
    fn test_non_finite_pixels_are_malformed() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=2);
        let before = estimator.track().active().unwrap().filter.clone();

        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let detection =
                StereoDetection::new(0.3, Point2::new(bad, 300.0), Point2::new(600.0, 300.0));
            let result = estimator.process_frame(&detection, Some(&rig.pose));

            assert!(!result.processed);
            assert!(result.continuing);
            assert_eq!(
                result.conditions,
                vec![FrameCondition::MalformedDetection(DetectionError::NonFinitePixel)]
            );
            assert_eq!(estimator.track().active().unwrap().filter, before);
        }

        // Clock untouched: the next frame is 0.1 s after frame 2.
        let result = feed(&rig, &mut estimator, 3..=3).remove(0);
        assert!(result.valid);
        assert_relative_eq!(result.diagnostics.unwrap().delta_t_s, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_non_finite_timestamp_leaves_track_usable() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=3);

        let detection = rig.observe(&throw().position_at(0.4), f64::NAN);
        let result = estimator.process_frame(&detection, Some(&rig.pose));
        assert!(!result.processed);
        assert_eq!(result.condition_codes(), "malformed_detection");

        for result in feed(&rig, &mut estimator, 5..=6) {
            assert!(result.valid && result.continuing);
            assert!(result.conditions.is_empty());
            let estimate = result.estimate.unwrap();
            assert!(estimate.position.iter().all(|v| v.is_finite()));
        }
        let estimate = estimator.estimate().unwrap();
        assert!((estimate.position - throw().position_at(0.6)).norm() < 0.1);
    }

    #[test]
    fn test_non_finite_pose_is_unavailable() {
        let (rig, mut estimator) = setup();
        let pose =
            CameraPose::from_quaternion([0.0, 0.0, 0.0, 1.0], Vector3::new(f64::NAN, 0.0, 0.0));
        let detection = rig.observe(&throw().position_at(0.1), 0.1);

        let result = estimator.process_frame(&detection, Some(&pose));
        assert!(!result.processed);
        assert_eq!(result.conditions, vec![FrameCondition::PoseUnavailable]);
        assert_eq!(estimator.phase(), TrackPhase::Uninitialized);
    }

    #[test]
    fn test_scaled_calibration_converges() {
        let rig = StereoRig::side_view().unwrap();
        let left = rig.calibration.left() * 2.0;
        let right = rig.calibration.right() * 2.0;
        let scaled = StereoCalibration::new(left, right).unwrap();
        let mut estimator = BallEstimator::new(scaled, EstimatorConfig::default()).unwrap();

        let results = feed(&rig, &mut estimator, 1..=10);
        assert!(results.iter().all(|r| r.valid));

        let estimate = estimator.estimate().unwrap();
        let pos_err = (estimate.position - throw().position_at(1.0)).norm();
        let vel_err = (estimate.velocity - throw().velocity_at(1.0)).norm();
        assert!(pos_err < 0.02, "position error {pos_err}");
        assert!(vel_err < 0.1, "velocity error {vel_err}");
    }

    #[test]
    fn test_moving_camera_converges() {
        let (base, mut estimator) = setup();
        let throw = throw();

        for k in 1..=10 {
            let t = 0.1 * k as f64;
            // Camera drifts and sways slightly from frame to frame.
            let sway = UnitQuaternion::from_euler_angles(0.01 * t, -0.02 * t, 0.03 * t.sin());
            let world_from_camera = SE3 {
                rotation: sway * base.pose.world_from_camera.rotation,
                translation: base.pose.position() + Vector3::new(0.05 * t, 0.1 * t, -0.02 * t),
            };
            let rig = StereoRig {
                calibration: base.calibration.clone(),
                pose: CameraPose::new(world_from_camera),
            };

            let result =
                estimator.process_frame(&rig.observe(&throw.position_at(t), t), Some(&rig.pose));
            assert!(result.valid);
            let diag = result.diagnostics.unwrap();
            assert_relative_eq!(diag.point_world.unwrap(), throw.position_at(t), epsilon = 1e-6);
        }

        let estimate = estimator.estimate().unwrap();
        let pos_err = (estimate.position - throw.position_at(1.0)).norm();
        let vel_err = (estimate.velocity - throw.velocity_at(1.0)).norm();
        assert!(pos_err < 0.02, "position error {pos_err}");
        assert!(vel_err < 0.1, "velocity error {vel_err}");
    }

    #[test]
    fn test_zero_disparity_is_degenerate() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=2);
        let before = estimator.track().active().unwrap().filter.clone();

        let pixel = Point2::new(700.0, 300.0);
        let detection = StereoDetection::new(0.3, pixel, pixel);
        let result = estimator.process_frame(&detection, Some(&rig.pose));

        assert!(result.processed);
        assert!(!result.valid);
        assert_eq!(result.condition_codes(), "degenerate_geometry");
        assert_eq!(estimator.track().active().unwrap().filter, before);
        assert_relative_eq!(result.diagnostics.unwrap().delta_t_s, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_negative_delta_time_is_flagged() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=3);

        let detection = rig.observe(&throw().position_at(0.25), 0.25);
        let result = estimator.process_frame(&detection, Some(&rig.pose));

        assert!(result.processed);
        assert!(result.continuing);
        assert_eq!(result.condition_codes(), "negative_delta_time");
        assert_relative_eq!(result.diagnostics.unwrap().delta_t_s, -0.05, epsilon = 1e-9);
    }

    #[test]
    fn test_covariance_stays_symmetric() {
        let (rig, mut estimator) = setup();
        for result in feed(&rig, &mut estimator, 1..=15) {
            let estimate = result.estimate.unwrap();
            assert!(max_asymmetry(&estimate.covariance) < 1e-9);
            let flat = estimate.covariance_row_major();
            assert_eq!(flat[1], flat[6]);
        }
    }

    #[test]
    fn test_reset_drops_track() {
        let (rig, mut estimator) = setup();
        feed(&rig, &mut estimator, 1..=2);
        estimator.reset();

        assert!(estimator.estimate().is_none());
        let result = feed(&rig, &mut estimator, 3..=3).remove(0);
        assert!(!result.continuing);
        assert!(result.conditions.is_empty());
    }

    #[test]
    fn test_construction_requires_valid_inputs() {
        let left = [800.0, 0.0, 640.0, 0.0, 0.0, 800.0, 360.0, 0.0, 0.0, 0.0, 1.0, 0.0];
        assert!(matches!(
            StereoCalibration::from_row_major(&left, &[]),
            Err(EstimatorError::MissingCalibration { camera: "right" })
        ));

        let rig = StereoRig::side_view().unwrap();
        let config = EstimatorConfig {
            track_timeout_s: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            BallEstimator::new(rig.calibration, config),
            Err(EstimatorError::InvalidConfig(_))
        ));
    }
}
