use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use nalgebra::Vector3;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use ball_orbit_estimator::config::EstimatorConfig;
use ball_orbit_estimator::io::replay;
use ball_orbit_estimator::synthetic::{BallisticThrow, StereoRig};
use ball_orbit_estimator::tracking::{BallEstimator, FrameResult};

/// Stereo ball trajectory estimator.
#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Optional JSON estimator config. Defaults are used if omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run a recorded detection log through the estimator.
    Replay {
        /// CSV of `timestamp_s,left_x,left_y,right_x,right_y[,qx,qy,qz,qw,px,py,pz]`.
        #[arg(long)]
        detections: PathBuf,
        /// JSON with `left_projection`, `right_projection` and optional `camera_pose`.
        #[arg(long)]
        calibration: PathBuf,
        /// Output CSV of per-frame results.
        #[arg(long, default_value = "ball_estimates.csv")]
        output: PathBuf,
    },
    /// Track a simulated throw seen by the built-in side-view rig.
    Simulate {
        /// Launch position x y z (m).
        #[arg(long, num_args = 3, default_values_t = [0.0, 0.0, 1.0], allow_hyphen_values = true)]
        position: Vec<f64>,
        /// Launch velocity x y z (m/s).
        #[arg(long, num_args = 3, default_values_t = [5.0, 0.0, 6.0], allow_hyphen_values = true)]
        velocity: Vec<f64>,
        #[arg(long, default_value_t = 10)]
        frames: usize,
        /// Frame interval (s).
        #[arg(long, default_value_t = 0.1)]
        interval: f64,
        /// Pixel noise standard deviation (px).
        #[arg(long, default_value_t = 0.0)]
        noise: f64,
        #[arg(long, default_value_t = 0)]
        seed: u64,
        /// Optional output CSV of per-frame results.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => EstimatorConfig::from_json_file(path)?,
        None => EstimatorConfig::default(),
    };

    match args.command {
        Command::Replay {
            detections,
            calibration,
            output,
        } => {
            let (calibration, pose) = replay::load_calibration(&calibration)?;
            let records = replay::load_detections(&detections)?;
            info!(rows = records.len(), "loaded detection log");

            let mut estimator = BallEstimator::new(calibration, config)?;
            let results = replay::run(&mut estimator, &records, pose.as_ref());
            replay::write_results(&output, &results)?;
            println!("Wrote {} frame results to {}", results.len(), output.display());
        }
        Command::Simulate {
            position,
            velocity,
            frames,
            interval,
            noise,
            seed,
            output,
        } => {
            let throw = BallisticThrow::new(
                Vector3::from_column_slice(&position),
                Vector3::from_column_slice(&velocity),
            );
            let rig = StereoRig::side_view()?;
            let mut rng = StdRng::seed_from_u64(seed);
            let mut estimator = BallEstimator::new(rig.calibration.clone(), config)?;

            let mut results: Vec<FrameResult> = Vec::with_capacity(frames);
            for k in 1..=frames {
                let t = interval * k as f64;
                let detection = rig
                    .observe_noisy(&throw.position_at(t), t, noise, &mut rng)
                    .context("Invalid pixel noise")?;
                results.push(estimator.process_frame(&detection, Some(&rig.pose)));
            }

            if let Some(estimate) = estimator.estimate() {
                let t = estimate.timestamp_s;
                let pos_err = (estimate.position - throw.position_at(t)).norm();
                let vel_err = (estimate.velocity - throw.velocity_at(t)).norm();
                println!(
                    "t={:.3}s pos=[{:.3}, {:.3}, {:.3}] vel=[{:.3}, {:.3}, {:.3}] \
                     pos_err={:.4}m vel_err={:.4}m/s",
                    t,
                    estimate.position.x,
                    estimate.position.y,
                    estimate.position.z,
                    estimate.velocity.x,
                    estimate.velocity.y,
                    estimate.velocity.z,
                    pos_err,
                    vel_err
                );
            } else {
                println!("No track after {} frames", frames);
            }

            if let Some(output) = output {
                replay::write_results(&output, &results)?;
            }
        }
    }

    Ok(())
}
