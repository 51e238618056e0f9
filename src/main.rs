use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::Parser;

use mount_attitude_rs::report::AttitudeReport;
use mount_attitude_rs::sources::load_samples;
use mount_attitude_rs::{AccelUnits, AttitudeError, AttitudeEstimator, EstimatorConfig, YawOutcome};

#[derive(Parser, Debug)]
#[command(name = "mount_attitude")]
#[command(about = "Estimate accelerometer mounting attitude from an accel + GPS recording", long_about = None)]
struct Args {
    /// Recording: .csv or .json, optionally .gz
    #[arg(value_name = "RECORDING")]
    input: Option<PathBuf>,

    /// JSON file with estimator parameters (missing fields use defaults)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Accelerometer sample rate (Hz)
    #[arg(long)]
    sample_rate: Option<f64>,

    /// Unit of the accelerometer columns (g, meters-per-second-squared)
    #[arg(long, value_enum)]
    accel_units: Option<UnitsArg>,

    /// Output directory
    #[arg(long, default_value = "attitude_sessions")]
    output_dir: PathBuf,

    /// Print the report to stdout without writing it
    #[arg(long, default_value_t = false)]
    dry_run: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum UnitsArg {
    G,
    MetersPerSecondSquared,
}

impl From<UnitsArg> for AccelUnits {
    fn from(arg: UnitsArg) -> Self {
        match arg {
            UnitsArg::G => AccelUnits::G,
            UnitsArg::MetersPerSecondSquared => AccelUnits::MetersPerSecondSquared,
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let Some(input) = args.input.as_ref() else {
        bail!(AttitudeError::MissingSource);
    };

    let mut config = match args.config.as_ref() {
        Some(path) => EstimatorConfig::from_json_file(path)?,
        None => EstimatorConfig::default(),
    };
    if let Some(rate) = args.sample_rate {
        config.sample_rate_hz = rate;
    }
    if let Some(units) = args.accel_units {
        config.accel_units = units.into();
    }

    println!("[{}] Mount Attitude Starting", ts_now());
    println!("  Input: {}", input.display());
    println!("  Sample rate: {} Hz, GPS rate: {} Hz", config.sample_rate_hz, config.gps_rate_hz);
    println!("  Output Dir: {}", args.output_dir.display());

    let samples = load_samples(input).with_context(|| format!("loading {}", input.display()))?;
    println!("[{}] Loaded {} samples", ts_now(), samples.len());

    let mut estimator = AttitudeEstimator::new(config.clone())?;
    for sample in &samples {
        match estimator.push(sample) {
            Some(YawOutcome::Accepted { yaw, diagnostics }) => println!(
                "[{}] Event at sample {}: psi = {:.2} deg (residual {:.3} g, {} GPS points)",
                ts_now(),
                sample.index,
                yaw.to_degrees(),
                diagnostics.mean_residual,
                diagnostics.gps_points
            ),
            Some(YawOutcome::Rejected { reason, .. }) => println!(
                "[{}] Event at sample {}: yaw rejected ({:?})",
                ts_now(),
                sample.index,
                reason
            ),
            None => {}
        }
    }

    let attitude = estimator.attitude();
    let stamp = Utc::now();
    let report = AttitudeReport::new(stamp, input, config, attitude, estimator.stats().clone());

    if args.dry_run {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        let path = report.save(&args.output_dir, &stamp)?;
        println!("[{}] Report saved to {}", ts_now(), path.display());
    }

    println!("\n=== Final Attitude ===");
    println!("{}", report.summary());
    println!(
        "Events: {} ({} accepted, {} rejected)",
        report.stats.events, report.stats.yaw_accepted, report.stats.yaw_rejected
    );

    Ok(())
}

fn ts_now() -> String {
    Utc::now().format("%H:%M:%S").to_string()
}
