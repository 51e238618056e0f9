//! Linear algebra aliases for the attitude pipeline
//!
//! Accelerations are expressed in g-units in the sensor frame; rotations
//! follow the frame-rotation convention used by the roll/pitch/yaw solver.

use nalgebra::{Rotation3, Vector2, Vector3};

/// Standard gravity (m/s²)
pub const G0: f64 = 9.80665;

pub type Accel3 = Vector3<f64>;
pub type Horizontal2 = Vector2<f64>;
pub type FrameRotation = Rotation3<f64>;

/// Frame rotation about x by `phi` ([[1,0,0],[0,c,s],[0,-s,c]])
pub fn roll_rotation(phi: f64) -> FrameRotation {
    Rotation3::from_axis_angle(&Vector3::x_axis(), -phi)
}

/// Frame rotation about y by `theta` ([[c,0,-s],[0,1,0],[s,0,c]])
pub fn pitch_rotation(theta: f64) -> FrameRotation {
    Rotation3::from_axis_angle(&Vector3::y_axis(), -theta)
}

/// Frame rotation about z by `psi` ([[c,s,0],[-s,c,0],[0,0,1]])
pub fn yaw_rotation(psi: f64) -> FrameRotation {
    Rotation3::from_axis_angle(&Vector3::z_axis(), -psi)
}
