//! Value codec.
//!
//! Pure conversions between the simulator's physical units and the integer encodings
//! found in firmware memory. It provides:
//! 1. **Fixed Point:** Saturating 16-bit two's-complement codes and millimeter fields.
//! 2. **IMU:** Accelerometer and gyroscope full-scale codes, plus peripheral-feed units.
//! 3. **Optical Flow:** The axis swap and sign inversion between simulator and firmware.

/// Two's-complement and millimeter conversions.
pub mod fixed;

/// IMU and optical-flow conversions.
pub mod imu;

pub use fixed::{
    int16_decode, int16_encode, millimeters_from_raw, millimeters_to_raw, range_to_raw,
};
pub use imu::{
    acceleration_to_milli_g, acceleration_to_raw, acceleration_vector_to_raw,
    angular_rate_to_degrees, angular_rate_to_raw, angular_rate_vector_to_raw,
    biased_angular_rate_to_raw, flow_to_firmware,
};
