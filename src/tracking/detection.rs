//! Raw stereo detections fed into the estimator.

use nalgebra::Point2;

use crate::error::DetectionError;

/// Pixel detections of the ball in the left and right image at one instant.
///
/// A well-formed detection has a finite timestamp and exactly two finite
/// points, left first. Anything else is reported as malformed by the
/// estimator rather than rejected here, so detector output can be passed
/// through unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct StereoDetection {
    /// Capture time (s).
    pub timestamp_s: f64,
    pub pixels: Vec<Point2<f64>>,
}

impl StereoDetection {
    pub fn new(timestamp_s: f64, left: Point2<f64>, right: Point2<f64>) -> Self {
        Self {
            timestamp_s,
            pixels: vec![left, right],
        }
    }

    /// The `(left, right)` pair, if the detection is well formed.
    pub fn pair(&self) -> Result<(Point2<f64>, Point2<f64>), DetectionError> {
        if !self.timestamp_s.is_finite() {
            return Err(DetectionError::NonFiniteTimestamp {
                timestamp_s: self.timestamp_s,
            });
        }
        let (left, right) = match self.pixels.as_slice() {
            [left, right] => (*left, *right),
            other => return Err(DetectionError::WrongPointCount { count: other.len() }),
        };
        if left.coords.iter().chain(right.coords.iter()).any(|v| !v.is_finite()) {
            return Err(DetectionError::NonFinitePixel);
        }
        Ok((left, right))
    }
}
