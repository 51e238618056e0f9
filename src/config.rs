use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{AttitudeError, Result};
use crate::types::{FIX_3D, G0};

/// Largest buffer any derived size may ask for (samples or rows)
pub const MAX_BUFFER_LEN: usize = 1 << 20;

/// Unit of the raw accelerometer columns.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AccelUnits {
    #[default]
    G,
    MetersPerSecondSquared,
}

impl AccelUnits {
    /// Factor converting a raw reading to g-units
    pub fn to_g(self) -> f64 {
        match self {
            AccelUnits::G => 1.0,
            AccelUnits::MetersPerSecondSquared => 1.0 / G0,
        }
    }
}

/// Estimator parameters, fixed for a whole run.
///
/// Defaults reproduce the reference scenario (20 Hz accelerometer, 1 Hz GPS).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Accelerometer sample rate `fs` (Hz)
    pub sample_rate_hz: f64,
    /// GPS report rate `fGPS` (Hz)
    pub gps_rate_hz: f64,
    /// Low-pass cutoff `fc` (Hz)
    pub filter_cutoff_hz: f64,
    /// FIR order; the filter has `filter_order + 1` taps
    pub filter_order: usize,
    /// GPS report latency compensated by lagging the GPS stream (s)
    pub gps_filter_delay_s: f64,
    /// Longest motion event kept in the acceleration window (s)
    pub max_event_duration_s: f64,
    /// `vlow`: slowest GPS speed accepted as a usable row (km/h)
    pub min_gps_speed_kmh: f64,
    /// `ahigh`: deviation from gravity that opens a motion event (g)
    pub accel_high_g: f64,
    /// `alow`: std-dev norm below which the sensor counts as still (g)
    pub accel_low_g: f64,
    /// Filtered vectors used for the stillness std-dev
    pub gravity_window: usize,
    /// Still vectors averaged into the gravity direction
    pub gravity_samples: usize,
    /// Mean residual above which a yaw estimate is discarded (g)
    pub residual_tolerance_g: f64,
    /// Fix quality required for a usable GPS row
    pub min_fix_quality: u8,
    pub accel_units: AccelUnits,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 20.0,
            gps_rate_hz: 1.0,
            filter_cutoff_hz: 0.3,
            filter_order: 63,
            gps_filter_delay_s: 1.5,
            max_event_duration_s: 10.0,
            min_gps_speed_kmh: 15.0,
            accel_high_g: 0.22,
            accel_low_g: 0.08,
            gravity_window: 64,
            gravity_samples: 200,
            residual_tolerance_g: 0.1,
            min_fix_quality: FIX_3D,
            accel_units: AccelUnits::G,
        }
    }
}

impl EstimatorConfig {
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let config: Self = serde_json::from_reader(BufReader::new(file)).map_err(|e| {
            AttitudeError::InvalidConfig(format!("{}: {}", path.display(), e))
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("sample_rate_hz", self.sample_rate_hz),
            ("gps_rate_hz", self.gps_rate_hz),
            ("filter_cutoff_hz", self.filter_cutoff_hz),
            ("max_event_duration_s", self.max_event_duration_s),
            ("accel_high_g", self.accel_high_g),
            ("accel_low_g", self.accel_low_g),
            ("residual_tolerance_g", self.residual_tolerance_g),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(AttitudeError::InvalidConfig(format!(
                    "{name} must be finite and positive (got {value})"
                )));
            }
        }
        for (name, value) in [
            ("gps_filter_delay_s", self.gps_filter_delay_s),
            ("min_gps_speed_kmh", self.min_gps_speed_kmh),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(AttitudeError::InvalidConfig(format!(
                    "{name} must be finite and non-negative (got {value})"
                )));
            }
        }
        if self.filter_cutoff_hz >= self.sample_rate_hz / 2.0 {
            return Err(AttitudeError::InvalidConfig(format!(
                "filter cutoff {} Hz must be below Nyquist ({} Hz)",
                self.filter_cutoff_hz,
                self.sample_rate_hz / 2.0
            )));
        }
        if self.filter_order == 0 {
            return Err(AttitudeError::InvalidConfig(
                "filter_order must be at least 1".to_string(),
            ));
        }
        if self.gravity_window < 2 || self.gravity_samples == 0 {
            return Err(AttitudeError::InvalidConfig(format!(
                "gravity_window ({}) must be >= 2 and gravity_samples ({}) >= 1",
                self.gravity_window, self.gravity_samples
            )));
        }
        if self.event_capacity() == 0 {
            return Err(AttitudeError::InvalidConfig(
                "max_event_duration_s is shorter than one sample".to_string(),
            ));
        }
        for (name, len) in [
            ("filter taps", self.filter_taps()),
            ("GPS delay", self.delay_samples()),
            ("GPS buffer", self.gps_capacity()),
            ("event window", self.event_capacity()),
            ("gravity_window", self.gravity_window),
            ("gravity_samples", self.gravity_samples),
        ] {
            if len > MAX_BUFFER_LEN {
                return Err(AttitudeError::InvalidConfig(format!(
                    "{name} needs {len} entries (limit {MAX_BUFFER_LEN})"
                )));
            }
        }
        Ok(())
    }

    /// Lag of the GPS stream in samples: `ceil(delay * fs)`
    pub fn delay_samples(&self) -> usize {
        (self.gps_filter_delay_s * self.sample_rate_hz).ceil() as usize
    }

    /// `Ngps = ceil((delay + max_event) * fGPS) + 1`
    pub fn gps_capacity(&self) -> usize {
        (((self.gps_filter_delay_s + self.max_event_duration_s) * self.gps_rate_hz)
            .ceil() as usize)
            .saturating_add(1)
    }

    /// `Naccel = floor(max_event * fs)`
    pub fn event_capacity(&self) -> usize {
        (self.max_event_duration_s * self.sample_rate_hz) as usize
    }

    pub fn filter_taps(&self) -> usize {
        self.filter_order.saturating_add(1)
    }
}
