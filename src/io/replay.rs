use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result, bail};
use csv::{ReaderBuilder, Writer};
use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::camera::{CameraPose, StereoCalibration};
use crate::tracking::detection::StereoDetection;
use crate::tracking::result::FrameResult;
use crate::tracking::BallEstimator;

/// One row of a detection log.
#[derive(Debug, Clone)]
pub struct DetectionRecord {
    pub detection: StereoDetection,
    /// Per-row camera pose, if the log carries one.
    pub pose: Option<CameraPose>,
}

/// Camera pose as stored in a calibration file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoseJson {
    /// `[qx, qy, qz, qw]` of the left optical frame in the world frame.
    pub rotation_xyzw: [f64; 4],
    /// Left optical center in the world frame (m).
    pub translation: [f64; 3],
}

impl PoseJson {
    pub fn to_pose(&self) -> CameraPose {
        let [x, y, z] = self.translation;
        CameraPose::from_quaternion(self.rotation_xyzw, Vector3::new(x, y, z))
    }
}

/// Calibration file: the two row-major 3x4 projection matrices and an
/// optional fixed camera pose used for rows without their own pose.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CalibrationFile {
    #[serde(default)]
    pub left_projection: Vec<f64>,
    #[serde(default)]
    pub right_projection: Vec<f64>,
    #[serde(default)]
    pub camera_pose: Option<PoseJson>,
}

pub fn load_calibration<P: AsRef<Path>>(
    path: P,
) -> Result<(StereoCalibration, Option<CameraPose>)> {
    let path = path.as_ref();
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    let calib: CalibrationFile = serde_json::from_reader(file)
        .with_context(|| format!("Failed to parse calibration {}", path.display()))?;

    let stereo =
        StereoCalibration::from_row_major(&calib.left_projection, &calib.right_projection)?;
    let pose = calib.camera_pose.as_ref().map(PoseJson::to_pose);
    Ok((stereo, pose))
}

/// Load `timestamp_s,left_x,left_y,right_x,right_y[,qx,qy,qz,qw,px,py,pz]`.
///
/// Lines starting with `#` are ignored, as is a header row. Rows with fewer
/// than 5 fields are skipped with a warning.
pub fn load_detections<P: AsRef<Path>>(path: P) -> Result<Vec<DetectionRecord>> {
    let path = path.as_ref();
    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .comment(Some(b'#'))
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let mut records = Vec::new();
    for (line, rec) in rdr.records().enumerate() {
        let rec = rec?;
        if line == 0 && rec.get(0).is_some_and(|f| f.parse::<f64>().is_err()) {
            continue;
        }
        if rec.len() < 5 {
            warn!(line, fields = rec.len(), "short detection row, skipping");
            continue;
        }

        let field = |i: usize| -> Result<f64> {
            rec[i]
                .parse()
                .with_context(|| format!("Bad value {:?} in row {}, column {}", &rec[i], line, i))
        };

        let detection = StereoDetection::new(
            field(0)?,
            Point2::new(field(1)?, field(2)?),
            Point2::new(field(3)?, field(4)?),
        );
        let pose = match rec.len() {
            5 => None,
            12 => Some(CameraPose::from_quaternion(
                [field(5)?, field(6)?, field(7)?, field(8)?],
                Vector3::new(field(9)?, field(10)?, field(11)?),
            )),
            n => bail!("Row {} has {} fields, expected 5 or 12", line, n),
        };
        records.push(DetectionRecord { detection, pose });
    }
    Ok(records)
}

/// One output row of a replay.
#[derive(Debug, Clone, Serialize)]
pub struct ResultRow {
    pub timestamp_s: f64,
    pub processed: bool,
    pub valid: bool,
    pub continuing: bool,
    pub conditions: String,
    pub delta_t_s: Option<f64>,
    pub raw_x: Option<f64>,
    pub raw_y: Option<f64>,
    pub raw_z: Option<f64>,
    pub x: Option<f64>,
    pub y: Option<f64>,
    pub z: Option<f64>,
    pub vx: Option<f64>,
    pub vy: Option<f64>,
    pub vz: Option<f64>,
    pub sigma_x: Option<f64>,
    pub sigma_y: Option<f64>,
    pub sigma_z: Option<f64>,
    pub nis: Option<f64>,
}

impl From<&FrameResult> for ResultRow {
    fn from(result: &FrameResult) -> Self {
        let diag = result.diagnostics.as_ref();
        let raw = diag.and_then(|d| d.point_world);
        let est = result.estimate.as_ref();
        let sigma = |i: usize| est.map(|e| e.covariance[(i, i)].sqrt());
        Self {
            timestamp_s: result.timestamp_s,
            processed: result.processed,
            valid: result.valid,
            continuing: result.continuing,
            conditions: result.condition_codes(),
            delta_t_s: diag.map(|d| d.delta_t_s),
            raw_x: raw.map(|p| p.x),
            raw_y: raw.map(|p| p.y),
            raw_z: raw.map(|p| p.z),
            x: est.map(|e| e.position.x),
            y: est.map(|e| e.position.y),
            z: est.map(|e| e.position.z),
            vx: est.map(|e| e.velocity.x),
            vy: est.map(|e| e.velocity.y),
            vz: est.map(|e| e.velocity.z),
            sigma_x: sigma(0),
            sigma_y: sigma(1),
            sigma_z: sigma(2),
            nis: diag.and_then(|d| d.nis),
        }
    }
}

/// Feed every record through the estimator. Rows without a pose fall back to
/// `default_pose`.
pub fn run(
    estimator: &mut BallEstimator,
    records: &[DetectionRecord],
    default_pose: Option<&CameraPose>,
) -> Vec<FrameResult> {
    let results: Vec<FrameResult> = records
        .iter()
        .map(|rec| estimator.process_frame(&rec.detection, rec.pose.as_ref().or(default_pose)))
        .collect();

    let valid = results.iter().filter(|r| r.valid).count();
    info!(frames = results.len(), valid, "replay finished");
    results
}

pub fn write_results<P: AsRef<Path>>(path: P, results: &[FrameResult]) -> Result<()> {
    let path = path.as_ref();
    let mut wtr =
        Writer::from_path(path).with_context(|| format!("Failed to create {}", path.display()))?;
    for result in results {
        wtr.serialize(ResultRow::from(result))?;
    }
    wtr.flush()?;
    Ok(())
}
