//! Roll/pitch from the gravity direction observed while the vehicle is still.
//!
//! The stillness gate looks at the spread of the most recent filtered vectors;
//! once enough consecutive still vectors have been collected their mean is
//! normalized into the gravity direction and the estimate is locked for the
//! rest of the run.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::ring_buffer::RingBuffer;
use crate::types::Accel3;

/// Below this |cos(pitch)| roll is numerically meaningless.
const POLE_COS_THRESHOLD: f64 = 1e-3;

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GravityEstimate {
    /// φ (rad)
    pub roll: f64,
    /// θ (rad)
    pub pitch: f64,
    /// Unit gravity direction `g_a` in the sensor frame
    pub gravity: Accel3,
}

impl GravityEstimate {
    /// Pitch within ~0.06° of ±90°, where roll is unstable. Not corrected, only reported.
    pub fn is_near_pole(&self) -> bool {
        self.pitch.cos().abs() < POLE_COS_THRESHOLD
    }
}

/// Normalized mean of `samples` and the Euler angles it implies.
///
/// `phi = atan2(-an.y, -an.z)`, `theta = asin(an.x)`. Returns `None` for an
/// empty set or a zero mean.
pub fn roll_pitch_from_samples<'a, I>(samples: I) -> Option<GravityEstimate>
where
    I: IntoIterator<Item = &'a Accel3>,
{
    let mut sum = Accel3::zeros();
    let mut count = 0usize;
    for sample in samples {
        sum += sample;
        count += 1;
    }
    if count == 0 {
        return None;
    }

    let mean = sum / count as f64;
    let norm = mean.norm();
    if norm < f64::EPSILON {
        return None;
    }
    let an = mean / norm;

    let roll = (-an.y).atan2(-an.z);
    // clamp only absorbs rounding past ±1
    let pitch = an.x.clamp(-1.0, 1.0).asin();

    Some(GravityEstimate {
        roll,
        pitch,
        gravity: an,
    })
}

/// Population standard deviation per axis.
fn axis_std<'a, I>(samples: I) -> Accel3
where
    I: Iterator<Item = &'a Accel3> + Clone,
{
    let count = samples.clone().count();
    if count == 0 {
        return Accel3::zeros();
    }
    let mean = samples.clone().fold(Accel3::zeros(), |acc, s| acc + s) / count as f64;
    let var = samples.fold(Accel3::zeros(), |acc, s| {
        let d = s - mean;
        acc + d.component_mul(&d)
    }) / count as f64;
    var.map(f64::sqrt)
}

/// One-shot gravity lock over the filtered acceleration stream.
pub struct GravityEstimator {
    recent: RingBuffer<Accel3>,
    candidates: RingBuffer<Accel3>,
    still_threshold: f64,
    estimate: Option<GravityEstimate>,
}

impl GravityEstimator {
    /// * `window` - filtered vectors in the stillness std-dev (64)
    /// * `required` - consecutive still vectors averaged into gravity (200)
    /// * `still_threshold` - `alow`, in g
    pub fn new(window: usize, required: usize, still_threshold: f64) -> Self {
        GravityEstimator {
            recent: RingBuffer::new(window),
            candidates: RingBuffer::new(required),
            still_threshold,
            estimate: None,
        }
    }

    /// Feed one filtered vector. Returns the estimate on the sample that locks it.
    ///
    /// After the lock every further call is a no-op returning `None`.
    pub fn push(&mut self, filtered: Accel3) -> Option<GravityEstimate> {
        if self.estimate.is_some() {
            return None;
        }

        self.recent.push(filtered);
        if !self.recent.is_full() {
            return None;
        }

        let spread = axis_std(self.recent.iter()).norm();
        if spread < self.still_threshold {
            self.candidates.push(filtered);
        } else {
            self.candidates.clear();
        }

        if !self.candidates.is_full() {
            return None;
        }

        let estimate = roll_pitch_from_samples(self.candidates.iter())?;
        info!(
            "Gravity locked: phi_a = {:.2} deg, theta_a = {:.2} deg",
            estimate.roll.to_degrees(),
            estimate.pitch.to_degrees()
        );
        if estimate.is_near_pole() {
            warn!(
                "Gravity direction is within {:.3} of a pole; roll is unreliable",
                POLE_COS_THRESHOLD
            );
        }
        self.estimate = Some(estimate);
        self.candidates.clear();
        Some(estimate)
    }

    pub fn estimate(&self) -> Option<&GravityEstimate> {
        self.estimate.as_ref()
    }

    pub fn is_locked(&self) -> bool {
        self.estimate.is_some()
    }

    /// Still vectors gathered toward the lock so far
    pub fn candidate_count(&self) -> usize {
        self.candidates.len()
    }
}
