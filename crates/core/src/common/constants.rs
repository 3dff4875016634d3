//! Physical constants and firmware sensor scaling.
//!
//! The IMU constants describe the raw sample format the firmware's sensor task
//! expects: 16-bit two's-complement codes spanning the configured full-scale range.

/// Standard gravity used by the firmware to express acceleration in g.
pub const GRAVITY: f64 = 9.81;

/// Accelerometer full-scale span in g (±24 g).
pub const ACCEL_SPAN_G: f64 = 48.0;

/// Gyroscope full-scale span in deg/s (±2000 deg/s).
pub const GYRO_SPAN_DPS: f64 = 4000.0;

/// Number of distinct codes in a 16-bit sample.
pub const INT16_CODES: f64 = 65536.0;

/// Accelerometer LSB per g.
pub const ACCEL_LSB_PER_G: f64 = INT16_CODES / ACCEL_SPAN_G;

/// Gyroscope LSB per deg/s.
pub const GYRO_LSB_PER_DPS: f64 = INT16_CODES / GYRO_SPAN_DPS;

/// Millimeters per meter for the firmware's compressed fixed-point values.
pub const MM_PER_M: f64 = 1000.0;

/// Milli-g per g for the emulator's accelerometer feed.
pub const MILLI_G_PER_G: f64 = 1000.0;

/// Firmware scheduler tick rate (one tick per millisecond).
pub const TICK_HZ: f64 = 1000.0;
