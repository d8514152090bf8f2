//! Plausibility gate for raw triangulated points.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box in the world frame that a raw triangulation must fall in
/// before it may touch the filter. Bounds are inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlausibilityGate {
    /// `[min, max]` along-track (world x).
    pub along_track: [f64; 2],
    /// `[min, max]` lateral (world y).
    pub lateral: [f64; 2],
    /// `[min, max]` height (world z).
    pub height: [f64; 2],
}

impl Default for PlausibilityGate {
    fn default() -> Self {
        Self {
            along_track: [0.0, 20.0],
            lateral: [-10.0, 10.0],
            height: [-10.0, 10.0],
        }
    }
}

impl PlausibilityGate {
    pub fn contains(&self, point: &Vector3<f64>) -> bool {
        within(point.x, self.along_track)
            && within(point.y, self.lateral)
            && within(point.z, self.height)
    }

    /// True when every interval is finite and ordered.
    pub fn is_well_formed(&self) -> bool {
        [self.along_track, self.lateral, self.height]
            .iter()
            .all(|[lo, hi]| lo.is_finite() && hi.is_finite() && lo <= hi)
    }
}

fn within(v: f64, [lo, hi]: [f64; 2]) -> bool {
    v >= lo && v <= hi
}
