//! IMU and optical-flow sample conversions.
//!
//! Raw-memory injection writes the same 16-bit codes the firmware's IMU driver would
//! read from the sensor; peripheral injection hands the emulated sensor its native
//! units (milli-g and deg/s) instead.

use super::fixed::int16_encode;
use crate::common::constants::{ACCEL_LSB_PER_G, GRAVITY, GYRO_LSB_PER_DPS, MILLI_G_PER_G};

/// Encodes an acceleration in m/s² as a ±24 g accelerometer code.
pub fn acceleration_to_raw(m_per_s2: f64) -> u16 {
    int16_encode(m_per_s2 / GRAVITY * ACCEL_LSB_PER_G)
}

/// Encodes an angular rate in rad/s as a ±2000 deg/s gyroscope code.
pub fn angular_rate_to_raw(rad_per_s: f64) -> u16 {
    biased_angular_rate_to_raw(rad_per_s, 0)
}

/// Encodes an angular rate with an artificial bias of `bias_lsb` codes added
/// before rounding.
pub fn biased_angular_rate_to_raw(rad_per_s: f64, bias_lsb: i32) -> u16 {
    int16_encode(rad_per_s.to_degrees() * GYRO_LSB_PER_DPS + f64::from(bias_lsb))
}

/// Encodes a three-axis acceleration.
pub fn acceleration_vector_to_raw(m_per_s2: [f64; 3]) -> [u16; 3] {
    m_per_s2.map(acceleration_to_raw)
}

/// Encodes a three-axis angular rate with a per-axis bias.
pub fn angular_rate_vector_to_raw(rad_per_s: [f64; 3], bias_lsb: [i32; 3]) -> [u16; 3] {
    [
        biased_angular_rate_to_raw(rad_per_s[0], bias_lsb[0]),
        biased_angular_rate_to_raw(rad_per_s[1], bias_lsb[1]),
        biased_angular_rate_to_raw(rad_per_s[2], bias_lsb[2]),
    ]
}

/// Maps a simulator flow displacement onto the firmware's flow axes.
///
/// The sensor is mounted rotated: firmware X gets `-dy`, firmware Y gets `-dx`.
///
/// # Returns
///
/// `[deltaX, deltaY]` as 16-bit two's-complement codes.
pub fn flow_to_firmware(dx: f64, dy: f64) -> [u16; 2] {
    [int16_encode(-dy), int16_encode(-dx)]
}

/// Converts m/s² to the milli-g the emulated accelerometer is fed in.
pub fn acceleration_to_milli_g(m_per_s2: [f64; 3]) -> [f64; 3] {
    m_per_s2.map(|a| a * MILLI_G_PER_G / GRAVITY)
}

/// Converts rad/s to the deg/s the emulated gyroscope is fed in.
pub fn angular_rate_to_degrees(rad_per_s: [f64; 3]) -> [f64; 3] {
    rad_per_s.map(f64::to_degrees)
}
