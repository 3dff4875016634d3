//! Emulated firmware self-test pass.
//!
//! An emulated flight controller boots with its IMU self-test and gyro bias estimation
//! pending. Both need a stream of plausible resting samples, so the emulator is run in
//! long slices, re-feeding a resting sample after each, until the firmware reports
//! `ready + 2 * gyroBiasFound == ready_status`.

use tracing::{debug, info};

use crate::codec;
use crate::common::{Addr, RunError, Width};
use crate::config::StartupConfig;
use crate::monitor::{ImuSample, Monitor};
use crate::symbols::{AddressBook, names};

use super::frames::SensorFrame;

/// Addresses of the two self-test flags.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StartupFlags {
    /// IMU self-test passed.
    pub ready: Addr,
    /// Gyro bias estimation finished.
    pub gyro_bias_found: Addr,
}

impl StartupFlags {
    /// Resolves both flags from `book`.
    pub fn resolve(book: &AddressBook) -> Result<Self, RunError> {
        Ok(Self {
            ready: book.get(names::READY)?,
            gyro_bias_found: book.get(names::GYRO_BIAS_FOUND)?,
        })
    }
}

/// The IMU sample of a vehicle at rest, in peripheral-feed units.
pub fn resting_sample() -> ImuSample {
    let rest = SensorFrame::resting();
    ImuSample {
        accel_mg: codec::acceleration_to_milli_g(rest.accel),
        gyro_dps: codec::angular_rate_to_degrees(rest.gyro),
    }
}

fn status<M: Monitor + ?Sized>(monitor: &mut M, flags: StartupFlags) -> Result<u64, RunError> {
    let ready = monitor.read_scalar(flags.ready, Width::Byte)?;
    let bias = monitor.read_scalar(flags.gyro_bias_found, Width::Byte)?;
    Ok(ready + 2 * bias)
}

/// Runs the emulator until the firmware's self-test has passed.
///
/// # Arguments
///
/// * `monitor` - An emulator session, machine already bootstrapped.
/// * `flags` - Addresses of `ready` and `gyroBiasFound`.
/// * `config` - Slice lengths, attempt bound and the passing status value.
///
/// # Returns
///
/// The number of retry slices that were needed, or `StartupTimeout` once
/// `max_attempts` slices have run without the status being reached.
pub fn pass_self_test<M: Monitor + ?Sized>(
    monitor: &mut M,
    flags: StartupFlags,
    config: &StartupConfig,
) -> Result<u32, RunError> {
    monitor.run_for(config.initial_run())?;
    let sample = resting_sample();
    let mut attempts = 0;
    loop {
        let current = status(monitor, flags)?;
        if current == config.ready_status {
            info!(attempts, "firmware self-test passed");
            return Ok(attempts);
        }
        if attempts >= config.max_attempts {
            return Err(RunError::StartupTimeout {
                attempts,
                status: current,
            });
        }
        attempts += 1;
        debug!(attempts, status = current, "self-test pending");
        monitor.run_for(config.retry_run())?;
        monitor.feed_imu(&sample)?;
    }
}
