//! Monitor capability interface.
//!
//! This module defines the verbs the synchronization loop uses to control a live
//! firmware, independent of which monitor console carries them. It provides:
//! 1. **Capability Trait:** `Monitor`, implemented once per dialect.
//! 2. **Breakpoint Types:** Descriptor, kind and the handle returned when arming.
//! 3. **Dialects:** `ProbeSession` (debug-probe console) and `EmulatorSession` (emulator console).
//! 4. **Wire Plumbing:** The deadline-bounded line channel both dialects share.
//!
//! Every session owns its connection exclusively and every method blocks until the
//! reply is complete. A framing mismatch or timeout poisons the session; the only
//! recovery is to close it and open a new one.

/// Single-breakpoint bookkeeping.
pub mod breakpoint;

/// Deadline-bounded line I/O over a byte stream.
pub mod channel;

/// Emulator console dialect.
pub mod emulator;

/// Debug-probe console dialect.
pub mod probe;

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use breakpoint::BreakpointSlot;
pub use channel::{LineChannel, Transport};
pub use emulator::EmulatorSession;
pub use probe::ProbeSession;

use crate::common::{Addr, MonitorError, Width};
use crate::config::MonitorConfig;

/// Breakpoint implementation requested from the target.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakpointKind {
    /// Instruction patched in memory.
    Software,
    /// Comparator in the debug unit; works from flash.
    #[default]
    Hardware,
}

/// A breakpoint to arm.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Breakpoint {
    /// Instruction address.
    pub addr: Addr,
    /// Bytes covered (2 for a Thumb instruction).
    pub length: u32,
    /// Software or hardware.
    pub kind: BreakpointKind,
}

impl Breakpoint {
    /// A hardware breakpoint over one 16-bit instruction.
    pub const fn hardware(addr: Addr) -> Self {
        Self {
            addr,
            length: 2,
            kind: BreakpointKind::Hardware,
        }
    }
}

/// Proof of an armed breakpoint; required to clear it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BreakpointHandle {
    pub(crate) id: u32,
    pub(crate) addr: Addr,
}

impl BreakpointHandle {
    /// Address the breakpoint was armed at.
    pub const fn addr(&self) -> Addr {
        self.addr
    }

    /// Session-unique identifier.
    pub const fn id(&self) -> u32 {
        self.id
    }
}

/// One IMU sample in the units the emulated sensors are fed in.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ImuSample {
    /// Acceleration in milli-g.
    pub accel_mg: [f64; 3],
    /// Angular rate in deg/s.
    pub gyro_dps: [f64; 3],
}

/// One operation of a batched exchange.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BatchOp {
    /// Hand an IMU sample to the emulated sensors.
    FeedImu(ImuSample),
    /// Unsigned scalar write.
    Write {
        /// Target address.
        addr: Addr,
        /// Raw value.
        value: u64,
        /// Access width.
        width: Width,
    },
    /// Unsigned scalar read; yields [`BatchValue::Scalar`].
    Read {
        /// Source address.
        addr: Addr,
        /// Access width.
        width: Width,
    },
    /// Block read; yields [`BatchValue::Bytes`].
    ReadBytes {
        /// Start address.
        addr: Addr,
        /// Byte count.
        len: usize,
    },
    /// Let the firmware run towards its next halt.
    Resume,
}

/// Result of one read inside a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchValue {
    /// From [`BatchOp::Read`].
    Scalar(u64),
    /// From [`BatchOp::ReadBytes`].
    Bytes(Vec<u8>),
}

/// Reply timing shared by both dialects.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timing {
    /// Bounded wait for a framed reply.
    pub reply: Duration,
    /// Bounded wait for a breakpoint halt.
    pub halt: Duration,
    /// Delay before dropping the connection.
    pub close_settle: Duration,
    /// Delay before removing a breakpoint.
    pub breakpoint_clear_delay: Duration,
}

impl Timing {
    /// Timing with no delays, for scripted streams.
    pub const fn immediate(reply: Duration) -> Self {
        Self {
            reply,
            halt: reply,
            close_settle: Duration::ZERO,
            breakpoint_clear_delay: Duration::ZERO,
        }
    }
}

impl From<&MonitorConfig> for Timing {
    fn from(config: &MonitorConfig) -> Self {
        Self {
            reply: config.reply_timeout(),
            halt: config.halt_timeout(),
            close_settle: config.close_settle(),
            breakpoint_clear_delay: config.breakpoint_clear_delay(),
        }
    }
}

/// Capability surface of a monitor session.
///
/// Implementations translate each call into their console's command grammar and parse
/// the framed reply. Callers never need to know which console they are talking to.
pub trait Monitor {
    /// Stops the firmware and waits for the monitor to confirm.
    fn halt(&mut self) -> Result<(), MonitorError>;

    /// Lets the firmware run. Returns without waiting for any firmware event.
    fn resume(&mut self) -> Result<(), MonitorError>;

    /// Blocks until the firmware is next stopped and its memory can be inspected.
    ///
    /// For the probe this is the asynchronous breakpoint-hit notification; the
    /// emulator advances virtual time by one quantum and stops.
    fn wait_for_halt(&mut self) -> Result<(), MonitorError>;

    /// Arms `breakpoint`. Fails with `BreakpointConflict` if one is already armed.
    fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> Result<BreakpointHandle, MonitorError>;

    /// Removes the breakpoint `handle` refers to.
    ///
    /// Fails with `NoActiveBreakpoint` if nothing is armed and `StaleBreakpoint` if
    /// `handle` is not the armed breakpoint.
    fn clear_breakpoint(&mut self, handle: BreakpointHandle) -> Result<(), MonitorError>;

    /// Reads an unsigned scalar.
    fn read_scalar(&mut self, addr: Addr, width: Width) -> Result<u64, MonitorError>;

    /// Writes an unsigned scalar. Fails with `ValueOutOfRange` if `value` does not
    /// fit in `width`; nothing is sent in that case.
    fn write_scalar(&mut self, addr: Addr, value: u64, width: Width) -> Result<(), MonitorError>;

    /// Reads `len` consecutive bytes.
    fn read_bytes(&mut self, addr: Addr, len: usize) -> Result<Vec<u8>, MonitorError> {
        (0..len as u64)
            .map(|i| self.read_scalar(addr.offset(i), Width::Byte).map(|v| v as u8))
            .collect()
    }

    /// Advances virtual time by `duration` and stops. Emulator only.
    fn run_for(&mut self, _duration: Duration) -> Result<(), MonitorError> {
        Err(MonitorError::Unsupported("run_for"))
    }

    /// Lets the firmware process pending interrupts without advancing time.
    ///
    /// A no-op where the firmware runs freely between halts.
    fn idle(&mut self) -> Result<(), MonitorError> {
        Ok(())
    }

    /// Hands an IMU sample to the emulated sensors and raises their data interrupt.
    fn feed_imu(&mut self, _sample: &ImuSample) -> Result<(), MonitorError> {
        Err(MonitorError::Unsupported("feed_imu"))
    }

    /// Runs `ops` in order and returns one value per read, in read order.
    ///
    /// Dialects that can chain commands send the whole batch as a single request.
    /// Nothing is sent if a write in the batch does not fit its width.
    fn execute_batch(&mut self, ops: &[BatchOp]) -> Result<Vec<BatchValue>, MonitorError> {
        check_batch(ops)?;
        let mut values = Vec::new();
        for &op in ops {
            match op {
                BatchOp::FeedImu(sample) => self.feed_imu(&sample)?,
                BatchOp::Write { addr, value, width } => self.write_scalar(addr, value, width)?,
                BatchOp::Read { addr, width } => {
                    values.push(BatchValue::Scalar(self.read_scalar(addr, width)?));
                }
                BatchOp::ReadBytes { addr, len } => {
                    values.push(BatchValue::Bytes(self.read_bytes(addr, len)?));
                }
                BatchOp::Resume => self.resume()?,
            }
        }
        Ok(values)
    }

    /// Tears the session down after the settle delay. Idempotent.
    fn close(&mut self) -> Result<(), MonitorError>;
}

impl<M: Monitor + ?Sized> Monitor for Box<M> {
    fn halt(&mut self) -> Result<(), MonitorError> {
        (**self).halt()
    }

    fn resume(&mut self) -> Result<(), MonitorError> {
        (**self).resume()
    }

    fn wait_for_halt(&mut self) -> Result<(), MonitorError> {
        (**self).wait_for_halt()
    }

    fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> Result<BreakpointHandle, MonitorError> {
        (**self).set_breakpoint(breakpoint)
    }

    fn clear_breakpoint(&mut self, handle: BreakpointHandle) -> Result<(), MonitorError> {
        (**self).clear_breakpoint(handle)
    }

    fn read_scalar(&mut self, addr: Addr, width: Width) -> Result<u64, MonitorError> {
        (**self).read_scalar(addr, width)
    }

    fn write_scalar(&mut self, addr: Addr, value: u64, width: Width) -> Result<(), MonitorError> {
        (**self).write_scalar(addr, value, width)
    }

    fn read_bytes(&mut self, addr: Addr, len: usize) -> Result<Vec<u8>, MonitorError> {
        (**self).read_bytes(addr, len)
    }

    fn execute_batch(&mut self, ops: &[BatchOp]) -> Result<Vec<BatchValue>, MonitorError> {
        (**self).execute_batch(ops)
    }

    fn run_for(&mut self, duration: Duration) -> Result<(), MonitorError> {
        (**self).run_for(duration)
    }

    fn idle(&mut self) -> Result<(), MonitorError> {
        (**self).idle()
    }

    fn feed_imu(&mut self, sample: &ImuSample) -> Result<(), MonitorError> {
        (**self).feed_imu(sample)
    }

    fn close(&mut self) -> Result<(), MonitorError> {
        (**self).close()
    }
}

/// Rejects `value` if it does not fit an unsigned `width` write.
pub(crate) fn check_fits(value: u64, width: Width) -> Result<(), MonitorError> {
    if width.fits(value) {
        Ok(())
    } else {
        Err(MonitorError::ValueOutOfRange { value, width })
    }
}

/// Rejects a batch containing a write that does not fit its width.
pub(crate) fn check_batch(ops: &[BatchOp]) -> Result<(), MonitorError> {
    ops.iter().try_for_each(|op| match *op {
        BatchOp::Write { value, width, .. } => check_fits(value, width),
        _ => Ok(()),
    })
}

/// Parses a hex token with or without a `0x` prefix.
pub(crate) fn parse_hex(token: &str) -> Option<u64> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))
        .unwrap_or(token);
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}
