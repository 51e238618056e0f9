//! Bounded GPS history kept in step with the accelerometer loop.
//!
//! Rows are appended only when the receiver clock advances. Each row records
//! how many accelerometer samples elapsed since the previous row, which is
//! what later lets the yaw solver place GPS rows inside an event window.

use serde::{Deserialize, Serialize};

use crate::ring_buffer::RingBuffer;
use crate::types::{GpsKinematics, GpsReading};

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsRow {
    pub rtc: f64,
    /// `None` for a gap row recorded while fix/speed were unusable during an event
    pub kinematics: Option<GpsKinematics>,
    /// Accelerometer samples between the previous row and this one
    pub samples_since_prev: usize,
}

impl GpsRow {
    pub fn is_gap(&self) -> bool {
        self.kinematics.is_none()
    }
}

pub struct GpsBuffer {
    rows: RingBuffer<GpsRow>,
    samples_since_last: usize,
    min_fix_quality: u8,
    min_speed_kmh: f64,
}

impl GpsBuffer {
    pub fn new(capacity: usize, min_fix_quality: u8, min_speed_kmh: f64) -> Self {
        GpsBuffer {
            rows: RingBuffer::new(capacity),
            samples_since_last: 0,
            min_fix_quality,
            min_speed_kmh,
        }
    }

    /// Valid 3D fix and fast enough for a meaningful heading
    pub fn is_usable(&self, reading: &GpsReading) -> bool {
        reading.fix == self.min_fix_quality && reading.speed_kmh >= self.min_speed_kmh
    }

    /// Advance one accelerometer sample with the (already delayed) GPS reading.
    pub fn update(&mut self, reading: &GpsReading, event_active: bool) {
        if self.is_usable(reading) {
            if self.rows.is_empty() {
                self.rows.push(GpsRow {
                    rtc: reading.rtc,
                    kinematics: Some(reading.kinematics()),
                    samples_since_prev: 0,
                });
                self.samples_since_last = 0;
            } else if self.is_new_report(reading) {
                self.append(reading.rtc, Some(reading.kinematics()));
            }
        } else if !event_active {
            // history outside an event is useless
            self.rows.clear();
        } else if !self.rows.is_empty() && self.is_new_report(reading) {
            self.append(reading.rtc, None);
        }

        self.samples_since_last += 1;
    }

    fn is_new_report(&self, reading: &GpsReading) -> bool {
        self.rows.back().map_or(true, |last| last.rtc != reading.rtc)
    }

    fn append(&mut self, rtc: f64, kinematics: Option<GpsKinematics>) {
        self.rows.push(GpsRow {
            rtc,
            kinematics,
            samples_since_prev: self.samples_since_last,
        });
        self.samples_since_last = 0;
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.rows.capacity()
    }

    /// Samples since the newest row was recorded
    pub fn samples_since_last(&self) -> usize {
        self.samples_since_last
    }

    pub fn last_is_gap(&self) -> bool {
        self.rows.back().map_or(false, GpsRow::is_gap)
    }

    /// Oldest to newest
    pub fn rows(&self) -> Vec<GpsRow> {
        self.rows.to_vec()
    }
}

/// Fixed lag applied to the GPS stream: yields reading `n - delay` at sample `n`.
pub struct GpsDelayLine {
    readings: RingBuffer<GpsReading>,
}

impl GpsDelayLine {
    pub fn new(delay_samples: usize) -> Self {
        GpsDelayLine {
            readings: RingBuffer::new(delay_samples + 1),
        }
    }

    /// Push reading `n`; returns reading `n - delay` once it exists.
    pub fn push(&mut self, reading: GpsReading) -> Option<GpsReading> {
        self.readings.push(reading);
        if self.readings.is_full() {
            self.readings.front().copied()
        } else {
            None
        }
    }

    pub fn delay(&self) -> usize {
        self.readings.capacity() - 1
    }
}
