use log::debug;
use serde::{Deserialize, Serialize};

use crate::config::EstimatorConfig;
use crate::error::Result;
use crate::filters::FirFilter;
use crate::gps_buffer::{GpsBuffer, GpsDelayLine};
use crate::gravity::{GravityEstimate, GravityEstimator};
use crate::motion::{MotionEventDetector, MotionState, MotionTransition};
use crate::types::Sample;
use crate::yaw::{estimate_yaw, YawDiagnostics, YawOutcome};

/// Sensor-to-vehicle Euler angles (rad); `None` while undetermined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Attitude {
    pub roll: Option<f64>,
    pub pitch: Option<f64>,
    pub yaw: Option<f64>,
}

impl Attitude {
    pub fn roll_deg(&self) -> Option<f64> {
        self.roll.map(f64::to_degrees)
    }

    pub fn pitch_deg(&self) -> Option<f64> {
        self.pitch.map(f64::to_degrees)
    }

    pub fn yaw_deg(&self) -> Option<f64> {
        self.yaw.map(f64::to_degrees)
    }

    pub fn is_complete(&self) -> bool {
        self.roll.is_some() && self.pitch.is_some() && self.yaw.is_some()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub samples: usize,
    pub filtered_samples: usize,
    /// Index of the sample on which roll/pitch locked
    pub gravity_locked_at: Option<usize>,
    pub events: usize,
    pub yaw_accepted: usize,
    pub yaw_rejected: usize,
    /// GPS buffer flushes after an event ending on a gap row
    pub gps_flushes: usize,
    pub last_event: Option<YawDiagnostics>,
}

/// Sample-synchronous driver owning every buffer and the running estimates.
///
/// Feed samples in index order with [`AttitudeEstimator::push`]; the state
/// stays valid between calls so a live stream can stop and resume at will.
pub struct AttitudeEstimator {
    config: EstimatorConfig,
    to_g: f64,
    filter: FirFilter,
    gravity: GravityEstimator,
    motion: MotionEventDetector,
    gps: GpsBuffer,
    gps_delay: GpsDelayLine,
    yaw: Option<f64>,
    stats: RunStats,
}

impl AttitudeEstimator {
    pub fn new(config: EstimatorConfig) -> Result<Self> {
        config.validate()?;

        let filter = FirFilter::lowpass(
            config.filter_order,
            config.filter_cutoff_hz,
            config.sample_rate_hz,
        );
        let gravity = GravityEstimator::new(
            config.gravity_window,
            config.gravity_samples,
            config.accel_low_g,
        );
        let motion = MotionEventDetector::new(config.event_capacity(), config.accel_high_g);
        let gps = GpsBuffer::new(
            config.gps_capacity(),
            config.min_fix_quality,
            config.min_gps_speed_kmh,
        );
        let gps_delay = GpsDelayLine::new(config.delay_samples());

        debug!(
            "Estimator ready: {} taps, GPS delay {} samples, Ngps {}, Naccel {}",
            config.filter_taps(),
            config.delay_samples(),
            config.gps_capacity(),
            config.event_capacity()
        );

        Ok(Self {
            to_g: config.accel_units.to_g(),
            config,
            filter,
            gravity,
            motion,
            gps,
            gps_delay,
            yaw: None,
            stats: RunStats::default(),
        })
    }

    /// Process one sample. Returns the yaw solver outcome when a motion event ends here.
    pub fn push(&mut self, sample: &Sample) -> Option<YawOutcome> {
        self.stats.samples += 1;

        let delayed_gps = self.gps_delay.push(sample.gps);
        let filtered = self.filter.push(sample.accel * self.to_g)?;
        self.stats.filtered_samples += 1;

        if !self.gravity.is_locked() && self.gravity.push(filtered).is_some() {
            self.stats.gravity_locked_at = Some(sample.index);
        }

        let mut outcome = None;
        if let Some(gravity) = self.gravity.estimate().copied() {
            match self.motion.update(filtered, &gravity.gravity) {
                MotionTransition::Started => {
                    self.stats.events += 1;
                    debug!("Motion event started at sample {}", sample.index);
                }
                MotionTransition::Ended(event) => {
                    debug!(
                        "Motion event ended at sample {} ({} samples, peak {:.3} g)",
                        sample.index,
                        event.samples.len(),
                        event.peak_deviation
                    );
                    let result = estimate_yaw(
                        &gravity,
                        &self.gps.rows(),
                        self.gps.samples_since_last(),
                        &event,
                        self.config.residual_tolerance_g,
                    );
                    self.record_yaw(&result);

                    if self.gps.last_is_gap() {
                        self.gps.clear();
                        self.stats.gps_flushes += 1;
                    }
                    outcome = Some(result);
                }
                MotionTransition::StayedIdle | MotionTransition::Continued => {}
            }
        }

        if let Some(reading) = delayed_gps {
            self.gps.update(&reading, self.motion.is_active());
        }

        outcome
    }

    fn record_yaw(&mut self, result: &YawOutcome) {
        match result.yaw() {
            Some(yaw) => {
                self.yaw = Some(yaw);
                self.stats.yaw_accepted += 1;
            }
            None => self.stats.yaw_rejected += 1,
        }
        self.stats.last_event = result.diagnostics().cloned();
    }

    /// Feed a whole recording in order.
    pub fn process<'a, I>(&mut self, samples: I) -> Attitude
    where
        I: IntoIterator<Item = &'a Sample>,
    {
        for sample in samples {
            self.push(sample);
        }
        self.attitude()
    }

    pub fn attitude(&self) -> Attitude {
        let gravity = self.gravity.estimate();
        Attitude {
            roll: gravity.map(|g| g.roll),
            pitch: gravity.map(|g| g.pitch),
            yaw: self.yaw,
        }
    }

    pub fn gravity(&self) -> Option<&GravityEstimate> {
        self.gravity.estimate()
    }

    pub fn motion_state(&self) -> MotionState {
        self.motion.state()
    }

    pub fn gps_buffer(&self) -> &GpsBuffer {
        &self.gps
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn config(&self) -> &EstimatorConfig {
        &self.config
    }
}

/// One-pass estimate over a complete recording.
pub fn estimate_attitude(config: EstimatorConfig, samples: &[Sample]) -> Result<(Attitude, RunStats)> {
    let mut estimator = AttitudeEstimator::new(config)?;
    let attitude = estimator.process(samples);
    Ok((attitude, estimator.stats().clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AccelUnits;
    use crate::error::AttitudeError;
    use crate::types::{Accel3, GpsReading, G0};
    use approx::assert_relative_eq;

    fn still_sample(index: usize, accel: Accel3) -> Sample {
        Sample {
            index,
            accel,
            gps: GpsReading {
                fix: 0,
                speed_kmh: 0.0,
                heading_deg: 0.0,
                altitude_m: 0.0,
                rtc: (index / 20) as f64,
            },
        }
    }

    #[test]
    fn test_no_output_during_warm_up() {
        let mut est = AttitudeEstimator::new(EstimatorConfig::default()).unwrap();
        for n in 0..63 {
            est.push(&still_sample(n, Accel3::new(0.0, 0.0, -1.0)));
        }
        assert_eq!(est.stats().samples, 63);
        assert_eq!(est.stats().filtered_samples, 0);
        assert_eq!(est.attitude(), Attitude::default());
    }

    #[test]
    fn test_roll_pitch_lock_and_hold() {
        let mut est = AttitudeEstimator::new(EstimatorConfig::default()).unwrap();
        let mut n = 0;
        while est.gravity().is_none() && n < 1000 {
            est.push(&still_sample(n, Accel3::new(0.0, 0.0, -1.0)));
            n += 1;
        }
        // 64 warm-up + 64 stillness window + 199 candidates
        assert_eq!(est.stats().gravity_locked_at, Some(63 + 63 + 199));
        let locked = est.attitude();
        assert_relative_eq!(locked.roll.unwrap(), 0.0, epsilon = 1e-9);
        assert_relative_eq!(locked.pitch.unwrap(), 0.0, epsilon = 1e-9);
        assert!(locked.yaw.is_none());

        // a tilt later in the run never re-locks
        for k in 0..600 {
            est.push(&still_sample(n + k, Accel3::new(0.3, 0.0, -0.95)));
        }
        assert_eq!(est.attitude().roll, locked.roll);
        assert_eq!(est.attitude().pitch, locked.pitch);
    }

    #[test]
    fn test_fix_lost_mid_event_flushes_gps() {
        let mut est = AttitudeEstimator::new(EstimatorConfig::default()).unwrap();
        let sample = |n: usize| Sample {
            index: n,
            accel: if (600..760).contains(&n) {
                Accel3::new(0.0, 0.5, -1.0)
            } else {
                Accel3::new(0.0, 0.0, -1.0)
            },
            gps: GpsReading {
                fix: if n < 700 { 3 } else { 0 },
                speed_kmh: 20.0,
                heading_deg: 0.0,
                altitude_m: 0.0,
                rtc: (n / 20) as f64,
            },
        };

        let mut outcomes = Vec::new();
        let mut rows_before_end = 0;
        for n in 0..900 {
            if est.motion_state() == MotionState::Active {
                rows_before_end = est.gps_buffer().len();
            }
            if let Some(outcome) = est.push(&sample(n)) {
                outcomes.push(outcome);
                // newest row was recorded after the fix dropped
                assert!(est.gps_buffer().is_empty());
            }
        }

        assert_eq!(outcomes.len(), 1);
        assert!(rows_before_end > 1);
        assert_eq!(est.stats().events, 1);
        assert_eq!(est.stats().gps_flushes, 1);
        assert_eq!(est.motion_state(), MotionState::Idle);
        assert!(est.gps_buffer().is_empty());
    }

    #[test]
    fn test_metric_units_are_scaled() {
        let config = EstimatorConfig {
            accel_units: AccelUnits::MetersPerSecondSquared,
            ..EstimatorConfig::default()
        };
        let samples: Vec<Sample> = (0..400)
            .map(|n| still_sample(n, Accel3::new(0.0, 0.0, -G0)))
            .collect();
        let (attitude, _) = estimate_attitude(config, &samples).unwrap();
        assert_relative_eq!(attitude.roll.unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_config_fails_before_processing() {
        let config = EstimatorConfig {
            sample_rate_hz: -1.0,
            ..EstimatorConfig::default()
        };
        assert!(matches!(
            AttitudeEstimator::new(config),
            Err(AttitudeError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_degree_accessors() {
        let attitude = Attitude {
            roll: Some(std::f64::consts::PI),
            pitch: None,
            yaw: Some(-std::f64::consts::FRAC_PI_2),
        };
        assert_relative_eq!(attitude.roll_deg().unwrap(), 180.0);
        assert!(attitude.pitch_deg().is_none());
        assert_relative_eq!(attitude.yaw_deg().unwrap(), -90.0);
        assert!(!attitude.is_complete());
    }
}
