//! Mounting attitude of a vehicle-fixed accelerometer.
//!
//! Roll and pitch come from the gravity direction seen while the vehicle is
//! still; yaw comes from comparing horizontal acceleration during a motion
//! event with the acceleration implied by GPS speed and heading.

pub mod attitude;
pub mod config;
pub mod error;
pub mod filters;
pub mod gps_buffer;
pub mod gravity;
pub mod motion;
pub mod report;
pub mod ring_buffer;
pub mod sources;
pub mod types;
pub mod yaw;

pub use attitude::{estimate_attitude, Attitude, AttitudeEstimator, RunStats};
pub use config::{AccelUnits, EstimatorConfig};
pub use error::{AttitudeError, Result};
pub use types::{GpsReading, Sample};
pub use yaw::{YawOutcome, YawRejection};
