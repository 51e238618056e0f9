use serde::{Deserialize, Serialize};

use crate::ring_buffer::RingBuffer;
use crate::types::Accel3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MotionState {
    Idle,
    /// Deviation from gravity above `ahigh`
    Active,
}

/// A finished motion event handed to the yaw solver.
#[derive(Clone, Debug, PartialEq)]
pub struct MotionEvent {
    /// Filtered acceleration from the first to the last active sample (at most `Naccel`)
    pub samples: Vec<Accel3>,
    pub peak_deviation: f64,
    /// Position of the peak inside `samples`
    pub peak_index: usize,
}

#[derive(Clone, Debug, PartialEq)]
pub enum MotionTransition {
    StayedIdle,
    Started,
    Continued,
    Ended(MotionEvent),
}

/// Idle/Active state machine over `|a_f - g_a|`.
pub struct MotionEventDetector {
    state: MotionState,
    window: RingBuffer<Accel3>,
    threshold: f64,
    peak_deviation: f64,
    peak_index: usize,
}

impl MotionEventDetector {
    /// * `capacity` - `Naccel`, samples kept for one event
    /// * `threshold` - `ahigh`, in g
    pub fn new(capacity: usize, threshold: f64) -> Self {
        MotionEventDetector {
            state: MotionState::Idle,
            window: RingBuffer::new(capacity),
            threshold,
            peak_deviation: 0.0,
            peak_index: 0,
        }
    }

    pub fn update(&mut self, filtered: Accel3, gravity: &Accel3) -> MotionTransition {
        let deviation = (filtered - gravity).norm();

        if deviation > self.threshold {
            let transition = match self.state {
                MotionState::Idle => {
                    self.state = MotionState::Active;
                    self.window.clear();
                    self.reset_peak();
                    MotionTransition::Started
                }
                MotionState::Active => MotionTransition::Continued,
            };

            if self.window.push(filtered).is_some() {
                // window slid: the tracked peak moved one slot toward the front
                self.peak_index = self.peak_index.saturating_sub(1);
            }
            if deviation > self.peak_deviation {
                self.peak_deviation = deviation;
                self.peak_index = self.window.len() - 1;
            }
            return transition;
        }

        match self.state {
            MotionState::Idle => MotionTransition::StayedIdle,
            MotionState::Active => {
                let event = MotionEvent {
                    samples: self.window.to_vec(),
                    peak_deviation: self.peak_deviation,
                    peak_index: self.peak_index,
                };
                self.state = MotionState::Idle;
                self.window.clear();
                self.reset_peak();
                MotionTransition::Ended(event)
            }
        }
    }

    fn reset_peak(&mut self) {
        self.peak_deviation = 0.0;
        self.peak_index = 0;
    }

    pub fn state(&self) -> MotionState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state == MotionState::Active
    }

    /// Samples accumulated in the open event
    pub fn active_len(&self) -> usize {
        self.window.len()
    }
}
