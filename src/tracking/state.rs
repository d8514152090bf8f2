//! Track lifecycle phases.

/// Phase of the ball track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrackPhase {
    /// No track; the next accepted detection seeds one.
    #[default]
    Uninitialized,
    /// A track exists and accepted detections update it.
    Tracking,
}
