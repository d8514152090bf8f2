//! File I/O for offline replay.

pub mod replay;

pub use replay::{
    CalibrationFile, DetectionRecord, load_calibration, load_detections, write_results,
};
