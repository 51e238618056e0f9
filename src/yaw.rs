//! Yaw from GPS-derived horizontal acceleration during a motion event.
//!
//! GPS rows overlapping the event are paired with the accelerometer sample
//! recorded at the same loop step. Each pair yields a planar yaw that rotates
//! the GPS acceleration (expressed along the ground track) onto the
//! gravity-free, de-tilted accelerometer vector. The pair yaws are averaged
//! and accepted only when the reconstruction residual is small.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::gps_buffer::GpsRow;
use crate::gravity::GravityEstimate;
use crate::motion::MotionEvent;
use crate::types::{pitch_rotation, roll_rotation, yaw_rotation, Accel3, Horizontal2, G0};

/// Substituted for a zero GPS clock step
const MIN_GPS_DT: f64 = 1e-6;

/// Slices must hold more rows than this to be trusted
const MIN_SLICE_ROWS: usize = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum YawRejection {
    NoGps,
    /// One or zero GPS rows overlap the event
    SinglePoint,
    /// No GPS row landed on a stored accelerometer sample
    NoAlignedSamples,
    TooFewPoints,
    ResidualTooLarge,
}

/// Reporting-only figures for one event.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct YawDiagnostics {
    pub gps_points: usize,
    pub event_samples: usize,
    /// Accumulated heading change across the slice
    pub yaw_variation_deg: f64,
    /// `None` when the slice only holds gap rows
    pub altitude_variation_m: Option<f64>,
    pub mean_yaw: f64,
    pub mean_residual: f64,
    pub peak_deviation: f64,
    pub peak_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum YawOutcome {
    Accepted {
        yaw: f64,
        diagnostics: YawDiagnostics,
    },
    Rejected {
        reason: YawRejection,
        diagnostics: Option<YawDiagnostics>,
    },
}

impl YawOutcome {
    pub fn yaw(&self) -> Option<f64> {
        match self {
            YawOutcome::Accepted { yaw, .. } => Some(*yaw),
            YawOutcome::Rejected { .. } => None,
        }
    }

    pub fn diagnostics(&self) -> Option<&YawDiagnostics> {
        match self {
            YawOutcome::Accepted { diagnostics, .. } => Some(diagnostics),
            YawOutcome::Rejected { diagnostics, .. } => diagnostics.as_ref(),
        }
    }

    fn rejected(reason: YawRejection) -> Self {
        YawOutcome::Rejected {
            reason,
            diagnostics: None,
        }
    }
}

/// Place GPS rows inside an event window of `event_len` samples.
///
/// The newest row sits `samples_since_last` samples before the end of the
/// window; each older row sits `samples_since_prev` of its successor before
/// it. Returns the index of the first overlapping row and the window position
/// of every row from there on.
pub fn align_rows(
    rows: &[GpsRow],
    samples_since_last: usize,
    event_len: usize,
) -> (usize, Vec<usize>) {
    let mut position = event_len as i64 - samples_since_last as i64;
    let mut start = rows.len();
    let mut positions = Vec::new();

    while position >= 0 && start > 0 {
        start -= 1;
        positions.push(position as usize);
        position -= rows[start].samples_since_prev as i64;
    }
    positions.reverse();
    (start, positions)
}

/// Heading change accumulated over consecutive usable rows, in degrees.
fn yaw_variation_deg(rows: &[GpsRow]) -> f64 {
    rows.windows(2)
        .filter_map(|pair| match (pair[0].kinematics, pair[1].kinematics) {
            (Some(a), Some(b)) => {
                let chord = (b.heading_unit() - a.heading_unit()).norm();
                Some(2.0 * (chord / 2.0).clamp(-1.0, 1.0).asin())
            }
            _ => None,
        })
        .sum::<f64>()
        .to_degrees()
}

fn altitude_variation_m(rows: &[GpsRow]) -> Option<f64> {
    let altitudes = rows
        .iter()
        .filter_map(|r| r.kinematics.map(|k| k.altitude_m));
    let (min, max) = altitudes.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), a| {
        (lo.min(a), hi.max(a))
    });
    if min.is_finite() {
        Some(max - min)
    } else {
        None
    }
}

/// Finite-difference horizontal acceleration (g) between consecutive rows and
/// the ground-track heading at the earlier row of each pair.
///
/// Gap rows count as standing still.
pub fn gps_acceleration(rows: &[GpsRow]) -> Vec<(Accel3, f64)> {
    let velocity = |row: &GpsRow| {
        row.kinematics
            .map(|k| k.velocity_ms())
            .unwrap_or_else(Horizontal2::zeros)
    };

    rows.windows(2)
        .map(|pair| {
            let v0 = velocity(&pair[0]);
            let v1 = velocity(&pair[1]);
            let mut dt = pair[1].rtc - pair[0].rtc;
            if dt == 0.0 {
                dt = MIN_GPS_DT;
            }
            let a = (v1 - v0) / dt / G0;
            let track = v0.y.atan2(v0.x);
            (Accel3::new(a.x, a.y, 0.0), track)
        })
        .collect()
}

/// Solve the mounting yaw for one finished motion event.
///
/// * `gravity` - locked roll/pitch and gravity direction
/// * `rows` - GPS buffer snapshot, oldest first
/// * `samples_since_last` - loop samples since the newest row was recorded
/// * `event` - the event's filtered acceleration window
/// * `residual_tolerance` - mean residual (g) above which the estimate is dropped
pub fn estimate_yaw(
    gravity: &GravityEstimate,
    rows: &[GpsRow],
    samples_since_last: usize,
    event: &MotionEvent,
    residual_tolerance: f64,
) -> YawOutcome {
    if rows.is_empty() {
        return YawOutcome::rejected(YawRejection::NoGps);
    }

    let (start, positions) = align_rows(rows, samples_since_last, event.samples.len());
    let slice = &rows[start..];
    if slice.len() <= 1 {
        return YawOutcome::rejected(YawRejection::SinglePoint);
    }

    let tilt = roll_rotation(gravity.roll) * pitch_rotation(gravity.pitch);
    let untilt = tilt.inverse();

    let mut yaws = Vec::with_capacity(slice.len());
    let mut residuals = Vec::with_capacity(slice.len());
    for ((a_gps, track), position) in gps_acceleration(slice).into_iter().zip(positions.iter()) {
        let Some(measured) = event.samples.get(*position) else {
            continue;
        };
        let linear = measured - gravity.gravity;
        let w = untilt * linear;
        let v = yaw_rotation(track) * a_gps;

        let yaw = (v.y * w.x - v.x * w.y).atan2(v.x * w.x + v.y * w.y);
        let predicted = tilt * yaw_rotation(yaw) * v;

        yaws.push(yaw);
        residuals.push((linear - predicted).norm());
    }

    if yaws.is_empty() {
        return YawOutcome::rejected(YawRejection::NoAlignedSamples);
    }

    let mean_yaw = yaws.iter().sum::<f64>() / yaws.len() as f64;
    let mean_residual = residuals.iter().sum::<f64>() / residuals.len() as f64;
    let diagnostics = YawDiagnostics {
        gps_points: slice.len(),
        event_samples: event.samples.len(),
        yaw_variation_deg: yaw_variation_deg(slice),
        altitude_variation_m: altitude_variation_m(slice),
        mean_yaw,
        mean_residual,
        peak_deviation: event.peak_deviation,
        peak_index: event.peak_index,
    };

    if slice.len() <= MIN_SLICE_ROWS {
        debug!(
            "Yaw rejected: only {} GPS points (residual {:.3} g)",
            slice.len(),
            mean_residual
        );
        return YawOutcome::Rejected {
            reason: YawRejection::TooFewPoints,
            diagnostics: Some(diagnostics),
        };
    }
    if mean_residual >= residual_tolerance {
        debug!(
            "Yaw rejected: residual {:.3} g over {} GPS points",
            mean_residual,
            slice.len()
        );
        return YawOutcome::Rejected {
            reason: YawRejection::ResidualTooLarge,
            diagnostics: Some(diagnostics),
        };
    }

    info!(
        "psi_a = {:.2} deg, Yaw var: {:.2} deg, Alt var: {}, residual {:.3} g, {} GPS points",
        mean_yaw.to_degrees(),
        diagnostics.yaw_variation_deg,
        diagnostics
            .altitude_variation_m
            .map_or_else(|| "n/a".to_string(), |alt| format!("{alt:.2} m")),
        mean_residual,
        slice.len()
    );
    YawOutcome::Accepted {
        yaw: mean_yaw,
        diagnostics,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gravity::roll_pitch_from_samples;
    use crate::types::GpsKinematics;
    use approx::assert_relative_eq;

    fn fix_row(rtc: f64, speed_kmh: f64, heading_deg: f64, samples_since_prev: usize) -> GpsRow {
        GpsRow {
            rtc,
            kinematics: Some(GpsKinematics {
                speed_kmh,
                heading_deg,
                altitude_m: 100.0 + rtc,
            }),
            samples_since_prev,
        }
    }

    fn level_gravity() -> GravityEstimate {
        roll_pitch_from_samples([Accel3::new(0.0, 0.0, -1.0)].iter()).unwrap()
    }

    /// Event window whose samples at `positions` obey the forward model for `yaw`.
    fn synthetic_event(
        gravity: &GravityEstimate,
        rows: &[GpsRow],
        positions: &[usize],
        len: usize,
        yaw: f64,
        extra: Accel3,
    ) -> MotionEvent {
        let tilt = roll_rotation(gravity.roll) * pitch_rotation(gravity.pitch);
        let mut samples = vec![gravity.gravity; len];
        for ((a, track), pos) in gps_acceleration(rows).into_iter().zip(positions) {
            samples[*pos] = gravity.gravity + tilt * yaw_rotation(yaw) * yaw_rotation(track) * a + extra;
        }
        MotionEvent {
            samples,
            peak_deviation: 0.3,
            peak_index: 10,
        }
    }

    fn turning_rows() -> Vec<GpsRow> {
        vec![
            fix_row(0.0, 20.0, 0.0, 0),
            fix_row(1.0, 28.0, 20.0, 20),
            fix_row(2.0, 34.0, 55.0, 20),
            fix_row(3.0, 38.0, 90.0, 20),
        ]
    }

    #[test]
    fn test_alignment_walks_back_from_newest() {
        let rows = turning_rows();
        let (start, positions) = align_rows(&rows, 5, 70);
        assert_eq!(start, 0);
        assert_eq!(positions, vec![5, 25, 45, 65]);

        let (start, positions) = align_rows(&rows, 5, 40);
        assert_eq!(start, 2);
        assert_eq!(positions, vec![15, 35]);
    }

    #[test]
    fn test_alignment_outside_window_is_empty() {
        let rows = turning_rows();
        let (start, positions) = align_rows(&rows, 50, 30);
        assert_eq!(start, rows.len());
        assert!(positions.is_empty());
    }

    #[test]
    fn test_gps_acceleration_straight_line() {
        let rows = vec![fix_row(0.0, 36.0, 90.0, 0), fix_row(2.0, 72.0, 90.0, 40)];
        let acc = gps_acceleration(&rows);
        assert_eq!(acc.len(), 1);
        let (a, track) = acc[0];
        // 10 m/s gained over 2 s heading east
        assert_relative_eq!(a.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(a.y, 5.0 / G0, epsilon = 1e-9);
        assert_relative_eq!(track, std::f64::consts::FRAC_PI_2, epsilon = 1e-9);
    }

    #[test]
    fn test_zero_dt_does_not_divide_by_zero() {
        let rows = vec![fix_row(1.0, 20.0, 0.0, 0), fix_row(1.0, 20.0, 0.0, 3)];
        let (a, _) = gps_acceleration(&rows)[0];
        assert!(a.iter().all(|c| c.is_finite()));
    }

    #[test]
    fn test_recovers_known_yaw() {
        let gravity = level_gravity();
        let rows = turning_rows();
        let (_, positions) = align_rows(&rows, 5, 70);
        let event = synthetic_event(&gravity, &rows, &positions, 70, 0.5, Accel3::zeros());

        let outcome = estimate_yaw(&gravity, &rows, 5, &event, 0.1);
        let yaw = outcome.yaw().expect("yaw accepted");
        assert_relative_eq!(yaw, 0.5, epsilon = 1e-9);
        let diag = outcome.diagnostics().unwrap();
        assert_eq!(diag.gps_points, 4);
        assert!(diag.mean_residual < 1e-9);
        assert_relative_eq!(diag.yaw_variation_deg, 90.0, epsilon = 1e-9);
        assert_relative_eq!(diag.altitude_variation_m.unwrap(), 3.0, epsilon = 1e-9);
    }

    #[test]
    fn test_recovers_yaw_under_tilt() {
        let phi: f64 = 0.15;
        let theta: f64 = -0.1;
        // gravity direction for a sensor rolled by phi and pitched by theta
        let g = Accel3::new(theta.sin(), -phi.sin() * theta.cos(), -phi.cos() * theta.cos());
        let gravity = roll_pitch_from_samples([g].iter()).unwrap();
        assert_relative_eq!(gravity.roll, phi, epsilon = 1e-12);
        assert_relative_eq!(gravity.pitch, theta, epsilon = 1e-12);

        let rows = turning_rows();
        let (_, positions) = align_rows(&rows, 5, 70);
        let event = synthetic_event(&gravity, &rows, &positions, 70, -1.2, Accel3::zeros());
        let yaw = estimate_yaw(&gravity, &rows, 5, &event, 0.1).yaw().unwrap();
        assert_relative_eq!(yaw, -1.2, epsilon = 1e-9);
    }

    #[test]
    fn test_empty_buffer_is_undetermined() {
        let gravity = level_gravity();
        let event = MotionEvent {
            samples: vec![Accel3::zeros(); 10],
            peak_deviation: 0.0,
            peak_index: 0,
        };
        let outcome = estimate_yaw(&gravity, &[], 1, &event, 0.1);
        assert_eq!(
            outcome,
            YawOutcome::Rejected {
                reason: YawRejection::NoGps,
                diagnostics: None
            }
        );
    }

    #[test]
    fn test_single_overlapping_row_is_undetermined() {
        let gravity = level_gravity();
        let rows = turning_rows();
        // window only reaches back to the newest row
        let event = MotionEvent {
            samples: vec![gravity.gravity; 10],
            peak_deviation: 0.3,
            peak_index: 0,
        };
        let outcome = estimate_yaw(&gravity, &rows, 5, &event, 0.1);
        assert!(matches!(
            outcome,
            YawOutcome::Rejected {
                reason: YawRejection::SinglePoint,
                ..
            }
        ));
    }

    #[test]
    fn test_two_rows_are_not_enough() {
        let gravity = level_gravity();
        let rows = turning_rows();
        let (start, positions) = align_rows(&rows, 5, 40);
        let event = synthetic_event(&gravity, &rows[start..], &positions, 40, 0.5, Accel3::zeros());
        let outcome = estimate_yaw(&gravity, &rows, 5, &event, 0.1);
        assert!(outcome.yaw().is_none());
        assert!(matches!(
            outcome,
            YawOutcome::Rejected {
                reason: YawRejection::TooFewPoints,
                diagnostics: Some(_)
            }
        ));
    }

    #[test]
    fn test_large_residual_is_rejected() {
        let gravity = level_gravity();
        let rows = turning_rows();
        let (_, positions) = align_rows(&rows, 5, 70);
        // vertical disturbance the planar model cannot explain
        let event = synthetic_event(&gravity, &rows, &positions, 70, 0.5, Accel3::new(0.0, 0.0, 0.3));
        let outcome = estimate_yaw(&gravity, &rows, 5, &event, 0.1);
        assert!(outcome.yaw().is_none());
        let diag = outcome.diagnostics().unwrap();
        assert!(diag.mean_residual > 0.1);
    }

    #[test]
    fn test_gap_rows_skip_diagnostics() {
        let rows = vec![
            fix_row(0.0, 20.0, 0.0, 0),
            GpsRow {
                rtc: 1.0,
                kinematics: None,
                samples_since_prev: 20,
            },
            fix_row(2.0, 20.0, 90.0, 20),
        ];
        assert_relative_eq!(yaw_variation_deg(&rows), 0.0);
        assert_relative_eq!(altitude_variation_m(&rows).unwrap(), 2.0);
        let acc = gps_acceleration(&rows);
        // decelerating into the gap row
        assert!(acc[0].0.x < 0.0);
    }
}
