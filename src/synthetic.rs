//! Synthetic throws and stereo observations for tests and simulation.

use nalgebra::{Matrix3, Matrix3x4, Point2, Vector3};
use rand::Rng;
use rand_distr::{Distribution, Normal};

use crate::camera::{CameraPose, StereoCalibration};
use crate::error::EstimatorError;
use crate::filter::GRAVITY;
use crate::tracking::detection::StereoDetection;

/// Noise-free ballistic flight.
#[derive(Debug, Clone, Copy)]
pub struct BallisticThrow {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    pub gravity: Vector3<f64>,
}

impl BallisticThrow {
    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>) -> Self {
        Self {
            position,
            velocity,
            gravity: GRAVITY,
        }
    }

    pub fn position_at(&self, t: f64) -> Vector3<f64> {
        self.position + self.velocity * t + self.gravity * (0.5 * t * t)
    }

    pub fn velocity_at(&self, t: f64) -> Vector3<f64> {
        self.velocity + self.gravity * t
    }
}

/// Calibrated stereo camera at a fixed world pose.
#[derive(Debug, Clone)]
pub struct StereoRig {
    pub calibration: StereoCalibration,
    pub pose: CameraPose,
}

impl StereoRig {
    /// 800 px focal length, 0.3 m baseline, 1280x720 principal point, placed
    /// at (2, -4, 1.5) looking along world +y so a throw along +x crosses the
    /// image.
    pub fn side_view() -> Result<Self, EstimatorError> {
        let calibration = StereoCalibration::from_pinhole(800.0, 800.0, 640.0, 360.0, 0.3)?;
        // Optical x -> world x, optical y (down) -> world -z, optical z -> world y.
        let rotation = Matrix3::new(
            1.0, 0.0, 0.0,
            0.0, 0.0, 1.0,
            0.0, -1.0, 0.0,
        );
        let pose = CameraPose::from_rt(&rotation, Vector3::new(2.0, -4.0, 1.5));
        Ok(Self { calibration, pose })
    }

    /// Exact left/right pixels of a world point.
    pub fn project(&self, point_world: &Vector3<f64>) -> (Point2<f64>, Point2<f64>) {
        let p_cam = self.pose.camera_from_world.transform_point(point_world);
        (
            project_point(self.calibration.left(), &p_cam),
            project_point(self.calibration.right(), &p_cam),
        )
    }

    pub fn observe(&self, point_world: &Vector3<f64>, timestamp_s: f64) -> StereoDetection {
        let (left, right) = self.project(point_world);
        StereoDetection::new(timestamp_s, left, right)
    }

    /// Observation with independent Gaussian noise (std `sigma_px`) on every pixel coordinate.
    pub fn observe_noisy<R: Rng + ?Sized>(
        &self,
        point_world: &Vector3<f64>,
        timestamp_s: f64,
        sigma_px: f64,
        rng: &mut R,
    ) -> Result<StereoDetection, rand_distr::NormalError> {
        let normal = Normal::new(0.0, sigma_px)?;
        let (left, right) = self.project(point_world);
        let mut jitter = |p: Point2<f64>| {
            Point2::new(p.x + normal.sample(&mut *rng), p.y + normal.sample(&mut *rng))
        };
        let left = jitter(left);
        let right = jitter(right);
        Ok(StereoDetection::new(timestamp_s, left, right))
    }
}

fn project_point(p: &Matrix3x4<f64>, p_cam: &Vector3<f64>) -> Point2<f64> {
    let h = p * p_cam.push(1.0);
    Point2::new(h.x / h.z, h.y / h.z)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_throw_kinematics() {
        let throw = BallisticThrow::new(Vector3::new(0.0, 0.0, 1.0), Vector3::new(5.0, 0.0, 6.0));
        let apex_t = 6.0 / 9.80665;

        assert_relative_eq!(throw.velocity_at(apex_t).z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(throw.position_at(1.0).x, 5.0, epsilon = 1e-12);
        assert_relative_eq!(
            throw.position_at(1.0).z,
            1.0 + 6.0 - 0.5 * 9.80665,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_side_view_projection() {
        let rig = StereoRig::side_view().unwrap();
        let (left, right) = rig.project(&Vector3::new(2.0, 0.0, 1.5));

        // Straight ahead at 4 m: principal point, 60 px disparity.
        assert_relative_eq!(left.x, 640.0, epsilon = 1e-9);
        assert_relative_eq!(left.y, 360.0, epsilon = 1e-9);
        assert_relative_eq!(right.x, 580.0, epsilon = 1e-9);
        assert_relative_eq!(right.y, 360.0, epsilon = 1e-9);
    }

    #[test]
    fn test_noisy_observation_is_seeded() {
        let rig = StereoRig::side_view().unwrap();
        let p = Vector3::new(1.0, 0.0, 2.0);

        let a = rig
            .observe_noisy(&p, 0.0, 0.5, &mut StdRng::seed_from_u64(3))
            .unwrap();
        let b = rig
            .observe_noisy(&p, 0.0, 0.5, &mut StdRng::seed_from_u64(3))
            .unwrap();
        assert_eq!(a, b);
        assert_ne!(a, rig.observe(&p, 0.0));
    }
}
