pub mod linalg;

pub use linalg::*;

use serde::{Deserialize, Serialize};

/// Fix quality code for a valid 3D position/velocity fix
pub const FIX_3D: u8 = 3;

/// One GPS report as carried alongside an accelerometer sample.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsReading {
    pub fix: u8,
    pub speed_kmh: f64,
    pub heading_deg: f64,
    pub altitude_m: f64,
    /// Receiver clock (seconds, monotonic)
    pub rtc: f64,
}

impl GpsReading {
    pub fn kinematics(&self) -> GpsKinematics {
        GpsKinematics {
            speed_kmh: self.speed_kmh,
            heading_deg: self.heading_deg,
            altitude_m: self.altitude_m,
        }
    }
}

/// Speed, heading and altitude of a usable GPS row.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct GpsKinematics {
    pub speed_kmh: f64,
    pub heading_deg: f64,
    pub altitude_m: f64,
}

impl GpsKinematics {
    /// Horizontal ground velocity (m/s) as (cos, sin) of heading.
    pub fn velocity_ms(&self) -> Horizontal2 {
        let speed = self.speed_kmh * 1000.0 / 3600.0;
        let heading = self.heading_deg.to_radians();
        Horizontal2::new(speed * heading.cos(), speed * heading.sin())
    }

    pub fn heading_unit(&self) -> Horizontal2 {
        let heading = self.heading_deg.to_radians();
        Horizontal2::new(heading.cos(), heading.sin())
    }
}

/// Indexed record of the fused stream. Immutable once read.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub index: usize,
    /// Raw acceleration in g-units
    pub accel: Accel3,
    pub gps: GpsReading,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_velocity_from_heading() {
        let k = GpsKinematics {
            speed_kmh: 36.0,
            heading_deg: 90.0,
            altitude_m: 0.0,
        };
        let v = k.velocity_ms();
        assert_relative_eq!(v.x, 0.0, epsilon = 1e-9);
        assert_relative_eq!(v.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_heading_unit_norm() {
        let k = GpsKinematics {
            speed_kmh: 0.0,
            heading_deg: 217.0,
            altitude_m: 0.0,
        };
        assert_relative_eq!(k.heading_unit().norm(), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_sample_json_keeps_accel_vector() {
        let sample = Sample {
            index: 7,
            accel: Accel3::new(0.01, -0.2, -0.98),
            gps: GpsReading {
                fix: FIX_3D,
                speed_kmh: 42.0,
                heading_deg: 10.0,
                altitude_m: 5.0,
                rtc: 3.0,
            },
        };
        let json = serde_json::to_string(&sample).unwrap();
        let back: Sample = serde_json::from_str(&json).unwrap();
        assert_eq!(back, sample);
    }
}
