use std::f64::consts::PI;

use crate::ring_buffer::RingBuffer;
use crate::types::Accel3;

/// Hamming-windowed sinc low-pass taps (`order + 1` of them), unity DC gain.
///
/// Cutoff is normalized against Nyquist: `wc = cutoff / (fs / 2)`.
pub fn design_lowpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Vec<f64> {
    let taps = order + 1;
    if order == 0 {
        return vec![1.0];
    }

    let wc = cutoff_hz / (sample_rate_hz / 2.0);
    let centre = order as f64 / 2.0;

    let mut weights: Vec<f64> = (0..taps)
        .map(|i| {
            let x = i as f64 - centre;
            let ideal = if x == 0.0 {
                wc
            } else {
                (PI * wc * x).sin() / (PI * x)
            };
            let window = 0.54 - 0.46 * (2.0 * PI * i as f64 / order as f64).cos();
            ideal * window
        })
        .collect();

    // Normalize
    let sum: f64 = weights.iter().sum();
    let total = if sum.abs() > f64::EPSILON { sum } else { 1.0 };
    weights.iter_mut().for_each(|w| *w /= total);

    weights
}

/// Per-axis FIR low-pass over a sliding window of raw acceleration.
pub struct FirFilter {
    window: RingBuffer<Accel3>,
    taps: Vec<f64>,
}

impl FirFilter {
    pub fn new(taps: Vec<f64>) -> Self {
        FirFilter {
            window: RingBuffer::new(taps.len().max(1)),
            taps,
        }
    }

    pub fn lowpass(order: usize, cutoff_hz: f64, sample_rate_hz: f64) -> Self {
        Self::new(design_lowpass(order, cutoff_hz, sample_rate_hz))
    }

    /// Slide `raw` into the window; `None` until the window is full.
    pub fn push(&mut self, raw: Accel3) -> Option<Accel3> {
        self.window.push(raw);
        if !self.window.is_full() {
            return None;
        }

        let mut filtered = Accel3::zeros();
        for (sample, weight) in self.window.iter().zip(self.taps.iter()) {
            filtered += sample * *weight;
        }
        Some(filtered)
    }

    pub fn is_warm(&self) -> bool {
        self.window.is_full()
    }
}
