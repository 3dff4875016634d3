//! Firmware memory marshaling.
//!
//! This module moves physical quantities in and out of firmware memory. It provides:
//! 1. **Firmware Map:** Every address the loop touches, resolved once up front.
//! 2. **Field Writers:** Free functions building the writes of one sensor group.
//! 3. **Field Readers:** Tick, motor and compressed-telemetry reads.
//! 4. **Bridge:** The per-step inject and read-back, sent as one batch.
//!
//! All IMU, flow and millimeter fields are 16 bits wide; motors are 32-bit words.

use std::array;

use tracing::trace;

use crate::codec;
use crate::common::constants::GYRO_LSB_PER_DPS;
use crate::common::{Addr, CodecError, MonitorError, ResolutionError, RunError, Width};
use crate::config::{FirmwareConfig, ImuInjection};
use crate::monitor::{BatchOp, BatchValue, ImuSample, Monitor};
use crate::symbols::{AddressBook, names};

use super::frames::{SensorFrame, TelemetryFrame};

/// Bytes in a compressed three-axis millimeter vector.
const MM_VECTOR_BYTES: usize = 6;

/// Reads issued per telemetry read-back.
pub const TELEMETRY_READS: usize = 6;

/// Addresses of every firmware variable the loop reads or writes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FirmwareMap {
    /// Scheduler tick counter.
    pub tick: Addr,
    /// Start flag.
    pub start: Addr,
    /// Sensor-task breakpoint location.
    pub entry: Addr,
    /// Motor ratios m1..m4.
    pub motors: [Addr; 4],
    /// Raw accelerometer x, y, z.
    pub accel: [Addr; 3],
    /// Raw gyroscope x, y, z.
    pub gyro: [Addr; 3],
    /// Flow deltaX, deltaY.
    pub flow: [Addr; 2],
    /// Last range reading.
    pub range: Addr,
    /// Start of the compressed position vector.
    pub position: Addr,
    /// Start of the compressed velocity vector.
    pub velocity: Addr,
    /// Start of the compressed setpoint vector.
    pub setpoint: Addr,
    /// Flow estimator innovations.
    pub flow_errors: [Addr; 3],
}

fn resolve_all<const N: usize>(
    book: &AddressBook,
    symbols: [&str; N],
) -> Result<[Addr; N], ResolutionError> {
    let mut out = [Addr::new(0); N];
    for (slot, name) in out.iter_mut().zip(symbols) {
        *slot = book.get(name)?;
    }
    Ok(out)
}

impl FirmwareMap {
    /// Resolves every address from `book`.
    ///
    /// # Returns
    ///
    /// The map, or `Unresolved` naming the first missing symbol.
    pub fn resolve(book: &AddressBook) -> Result<Self, ResolutionError> {
        Ok(Self {
            tick: book.get(names::TICK)?,
            start: book.get(names::START)?,
            entry: book.get(names::SENSOR_TASK)?,
            motors: resolve_all(book, names::MOTORS)?,
            accel: resolve_all(book, names::ACCEL)?,
            gyro: resolve_all(book, names::GYRO)?,
            flow: resolve_all(book, names::FLOW)?,
            range: book.get(names::RANGE)?,
            position: book.get(names::POSITION[0])?,
            velocity: book.get(names::VELOCITY[0])?,
            setpoint: book.get(names::SETPOINT[0])?,
            flow_errors: resolve_all(book, names::FLOW_ERRORS)?,
        })
    }
}

fn halfword_writes<const N: usize>(addrs: [Addr; N], codes: [u16; N]) -> [BatchOp; N] {
    array::from_fn(|i| BatchOp::Write {
        addr: addrs[i],
        value: u64::from(codes[i]),
        width: Width::HalfWord,
    })
}

/// Writes of an acceleration in m/s² to the raw accelerometer buffer.
pub fn acceleration_writes(addrs: [Addr; 3], m_per_s2: [f64; 3]) -> [BatchOp; 3] {
    halfword_writes(addrs, codec::acceleration_vector_to_raw(m_per_s2))
}

/// Writes of an angular rate in rad/s, plus a bias in LSB, to the raw gyroscope buffer.
pub fn angular_rate_writes(
    addrs: [Addr; 3],
    rad_per_s: [f64; 3],
    bias_lsb: [i32; 3],
) -> [BatchOp; 3] {
    halfword_writes(addrs, codec::angular_rate_vector_to_raw(rad_per_s, bias_lsb))
}

/// Writes of a simulator flow displacement to the firmware's flow fields.
pub fn flow_writes(addrs: [Addr; 2], flow: [f64; 2]) -> [BatchOp; 2] {
    halfword_writes(addrs, codec::flow_to_firmware(flow[0], flow[1]))
}

/// Write of a range in meters to the unsigned millimeter range field.
pub fn range_write(addr: Addr, distance_m: f64) -> Result<BatchOp, CodecError> {
    let raw = codec::range_to_raw(distance_m)?;
    Ok(BatchOp::Write {
        addr,
        value: u64::from(raw),
        width: Width::HalfWord,
    })
}

/// Raises the flag that releases the firmware from its pre-flight wait.
pub fn raise_start_flag<M: Monitor + ?Sized>(
    monitor: &mut M,
    addr: Addr,
    width: Width,
) -> Result<(), MonitorError> {
    monitor.write_scalar(addr, 1, width)
}

/// Reads the scheduler tick counter.
pub fn read_tick<M: Monitor + ?Sized>(
    monitor: &mut M,
    addr: Addr,
    width: Width,
) -> Result<u64, MonitorError> {
    monitor.read_scalar(addr, width)
}

/// Reads the four motor ratios.
pub fn read_motors<M: Monitor + ?Sized>(
    monitor: &mut M,
    addrs: [Addr; 4],
) -> Result<[u64; 4], MonitorError> {
    let mut motors = [0; 4];
    for (motor, addr) in motors.iter_mut().zip(addrs) {
        *motor = monitor.read_scalar(addr, Width::Word)?;
    }
    Ok(motors)
}

/// Decodes a compressed three-axis millimeter vector (little-endian halfwords) as meters.
fn millimeter_vector(bytes: &[u8]) -> Result<[f64; 3], MonitorError> {
    if bytes.len() != MM_VECTOR_BYTES {
        return Err(MonitorError::InvalidState(
            "telemetry vector has the wrong length",
        ));
    }
    let mut out = [0.0; 3];
    for (value, pair) in out.iter_mut().zip(bytes.chunks_exact(2)) {
        *value = codec::millimeters_from_raw(u16::from_le_bytes([pair[0], pair[1]]));
    }
    Ok(out)
}

/// Per-step marshaling between a sensor frame and firmware memory.
#[derive(Clone, Debug)]
pub struct FirmwareBridge {
    map: FirmwareMap,
    firmware: FirmwareConfig,
}

impl FirmwareBridge {
    /// Creates a bridge over resolved addresses.
    pub const fn new(map: FirmwareMap, firmware: FirmwareConfig) -> Self {
        Self { map, firmware }
    }

    /// Reads the tick counter at the configured width.
    pub fn read_tick<M: Monitor + ?Sized>(&self, monitor: &mut M) -> Result<u64, MonitorError> {
        read_tick(monitor, self.map.tick, self.firmware.tick_width)
    }

    /// Raises the start flag at the configured width.
    pub fn raise_start_flag<M: Monitor + ?Sized>(&self, monitor: &mut M) -> Result<(), MonitorError> {
        raise_start_flag(monitor, self.map.start, self.firmware.start_flag_width)
    }

    /// Reads the motor commands of the previous control cycle.
    pub fn read_motors<M: Monitor + ?Sized>(&self, monitor: &mut M) -> Result<[u64; 4], MonitorError> {
        read_motors(monitor, self.map.motors)
    }

    /// Operations writing a complete sensor frame: IMU, flow, then range.
    ///
    /// # Returns
    ///
    /// The writes, or the codec error of the first value that cannot be encoded.
    pub fn inject_ops(&self, frame: &SensorFrame) -> Result<Vec<BatchOp>, CodecError> {
        let mut ops = Vec::with_capacity(9 + TELEMETRY_READS + 1);
        match self.firmware.imu_injection {
            ImuInjection::RawMemory => {
                ops.extend(acceleration_writes(self.map.accel, frame.accel));
                ops.extend(angular_rate_writes(
                    self.map.gyro,
                    frame.gyro,
                    self.firmware.gyro_bias_lsb,
                ));
            }
            ImuInjection::PeripheralFeed => {
                let mut gyro_dps = codec::angular_rate_to_degrees(frame.gyro);
                for (rate, bias) in gyro_dps.iter_mut().zip(self.firmware.gyro_bias_lsb) {
                    *rate += f64::from(bias) / GYRO_LSB_PER_DPS;
                }
                ops.push(BatchOp::FeedImu(ImuSample {
                    accel_mg: codec::acceleration_to_milli_g(frame.accel),
                    gyro_dps,
                }));
            }
        }
        ops.extend(flow_writes(self.map.flow, frame.flow));
        ops.push(range_write(self.map.range, frame.range)?);
        Ok(ops)
    }

    /// Reads of the firmware's estimates, setpoint and flow innovations.
    pub fn telemetry_reads(&self) -> [BatchOp; TELEMETRY_READS] {
        let [tof, flow_x, flow_y] = self.map.flow_errors.map(|addr| BatchOp::Read {
            addr,
            width: Width::HalfWord,
        });
        let block = |addr| BatchOp::ReadBytes {
            addr,
            len: MM_VECTOR_BYTES,
        };
        [
            block(self.map.position),
            block(self.map.velocity),
            block(self.map.setpoint),
            tof,
            flow_x,
            flow_y,
        ]
    }

    /// Injects `frame` and reads the telemetry back in one exchange.
    ///
    /// With `resume` set the firmware is let run at the end of the same exchange.
    /// Encoding errors surface before anything is sent.
    ///
    /// # Arguments
    ///
    /// * `monitor` - Session with the firmware halted.
    /// * `frame` - Sensor values for this cycle.
    /// * `motors` - Motor commands read at the start of the cycle, carried into the result.
    /// * `resume` - Whether to end the exchange by resuming the firmware.
    pub fn exchange<M: Monitor + ?Sized>(
        &self,
        monitor: &mut M,
        frame: &SensorFrame,
        motors: [u64; 4],
        resume: bool,
    ) -> Result<TelemetryFrame, RunError> {
        let mut ops = self.inject_ops(frame)?;
        ops.extend(self.telemetry_reads());
        if resume {
            ops.push(BatchOp::Resume);
        }
        let values = monitor.execute_batch(&ops)?;
        trace!(?frame, "sensor frame injected");
        Ok(decode_telemetry(&values, motors)?)
    }
}

/// Rebuilds a telemetry frame from the values of [`FirmwareBridge::telemetry_reads`].
fn decode_telemetry(
    values: &[BatchValue],
    motors: [u64; 4],
) -> Result<TelemetryFrame, MonitorError> {
    let [
        BatchValue::Bytes(position),
        BatchValue::Bytes(velocity),
        BatchValue::Bytes(setpoint),
        BatchValue::Scalar(tof),
        BatchValue::Scalar(flow_x),
        BatchValue::Scalar(flow_y),
    ] = values
    else {
        return Err(MonitorError::InvalidState(
            "telemetry reads returned an unexpected shape",
        ));
    };
    let mut flow_errors = [0.0; 3];
    for (error, &raw) in flow_errors.iter_mut().zip([tof, flow_x, flow_y]) {
        let raw = u16::try_from(raw).map_err(|_| MonitorError::ValueOutOfRange {
            value: raw,
            width: Width::HalfWord,
        })?;
        *error = codec::millimeters_from_raw(raw);
    }
    Ok(TelemetryFrame {
        motors,
        position: millimeter_vector(position)?,
        velocity: millimeter_vector(velocity)?,
        setpoint: millimeter_vector(setpoint)?,
        flow_errors,
    })
}
