/// Signal conditioning for the raw accelerometer stream.
pub mod fir;

pub use fir::{design_lowpass, FirFilter};
