use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attitude::{Attitude, RunStats};
use crate::config::EstimatorConfig;

/// Final result of one recording, written as pretty JSON.
#[derive(Serialize, Deserialize, Clone, Debug)]
pub struct AttitudeReport {
    pub generated_at: String,
    pub input: String,
    pub config: EstimatorConfig,
    /// Radians; `null` while undetermined
    pub attitude: Attitude,
    pub roll_deg: Option<f64>,
    pub pitch_deg: Option<f64>,
    pub yaw_deg: Option<f64>,
    pub stats: RunStats,
}

impl AttitudeReport {
    pub fn new(
        generated_at: DateTime<Utc>,
        input: &Path,
        config: EstimatorConfig,
        attitude: Attitude,
        stats: RunStats,
    ) -> Self {
        Self {
            generated_at: generated_at.to_rfc3339(),
            input: input.display().to_string(),
            config,
            roll_deg: attitude.roll_deg(),
            pitch_deg: attitude.pitch_deg(),
            yaw_deg: attitude.yaw_deg(),
            attitude,
            stats,
        }
    }

    /// Write `attitude_<YYYYmmdd_HHMMSS>.json` into `dir`, creating it if needed.
    pub fn save(&self, dir: &Path, stamp: &DateTime<Utc>) -> std::io::Result<PathBuf> {
        fs::create_dir_all(dir)?;
        let path = dir.join(format!("attitude_{}.json", stamp.format("%Y%m%d_%H%M%S")));
        let json = serde_json::to_string_pretty(self)?;
        fs::write(&path, json)?;
        Ok(path)
    }

    pub fn summary(&self) -> String {
        format!(
            "phi_a = {}, theta_a = {}, psi_a = {}",
            format_angle(self.roll_deg),
            format_angle(self.pitch_deg),
            format_angle(self.yaw_deg)
        )
    }
}

fn format_angle(deg: Option<f64>) -> String {
    match deg {
        Some(d) => format!("{d:.2} deg"),
        None => "undetermined".to_string(),
    }
}
