//! 16-bit two's-complement and millimeter fixed-point conversions.

use crate::common::constants::MM_PER_M;
use crate::common::{CodecError, Width};

const I16_MIN: f64 = i16::MIN as f64;
const I16_MAX: f64 = i16::MAX as f64;

/// Encodes a real value as a 16-bit two's-complement code.
///
/// Rounds half up (`floor(value + 0.5)`), saturates to `[-32768, 32767]` and
/// represents negative results as `value + 65536`. NaN encodes as zero.
///
/// # Examples
///
/// ```
/// use cosim_core::codec::int16_encode;
///
/// assert_eq!(int16_encode(1365.33), 1365);
/// assert_eq!(int16_encode(-1.0), 0xFFFF);
/// assert_eq!(int16_encode(1.0e9), 0x7FFF);
/// ```
pub fn int16_encode(value: f64) -> u16 {
    if value.is_nan() {
        return 0;
    }
    let code = (value + 0.5).floor().clamp(I16_MIN, I16_MAX) as i32;
    if code < 0 {
        (code + 0x1_0000) as u16
    } else {
        code as u16
    }
}

/// Decodes a 16-bit two's-complement code.
///
/// Codes up to `0x7FFF` are themselves; larger codes map to `raw - 65536`.
pub const fn int16_decode(raw: u16) -> i16 {
    raw as i16
}

/// Reads a compressed millimeter field as meters (or m/s).
pub fn millimeters_from_raw(raw: u16) -> f64 {
    f64::from(int16_decode(raw)) / MM_PER_M
}

/// Writes meters (or m/s) to a compressed millimeter field.
///
/// # Returns
///
/// The two's-complement code of `round(value * 1000)`, or `OutOfRange` if that does not
/// fit in 16 signed bits. Values are never wrapped through the sign boundary.
pub fn millimeters_to_raw(value: f64) -> Result<u16, CodecError> {
    if !value.is_finite() {
        return Err(CodecError::NonFinite("millimeters"));
    }
    let mm = (value * MM_PER_M).round();
    if !(I16_MIN..=I16_MAX).contains(&mm) {
        return Err(CodecError::OutOfRange {
            value: mm as i64,
            width: Width::HalfWord,
        });
    }
    Ok((mm as i16) as u16)
}

/// Encodes a range-finder distance in meters for the unsigned `range_last` field.
///
/// # Returns
///
/// `round(distance * 1000)` as millimeters, `NegativeUnsigned` for a negative result,
/// or `OutOfRange` above 65535 mm.
pub fn range_to_raw(distance_m: f64) -> Result<u16, CodecError> {
    if !distance_m.is_finite() {
        return Err(CodecError::NonFinite("range"));
    }
    let mm = (distance_m * MM_PER_M).round();
    if mm < 0.0 {
        return Err(CodecError::NegativeUnsigned {
            value: mm as i64,
            width: Width::HalfWord,
        });
    }
    if mm > f64::from(u16::MAX) {
        return Err(CodecError::OutOfRange {
            value: mm as i64,
            width: Width::HalfWord,
        });
    }
    Ok(mm as u16)
}
