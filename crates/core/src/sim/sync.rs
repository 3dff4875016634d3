//! Breakpoint-gated synchronization loop.
//!
//! This module keeps the plant's clock in step with the firmware's scheduler tick.
//! It provides:
//! 1. **Arming:** Halt the firmware and place the breakpoint at the sensor-task entry.
//! 2. **Priming:** On the first halt, record the tick and release the start flag.
//! 3. **Stepping:** On each later halt, turn the tick delta into `dt`, step the plant,
//!    then inject sensors, read back telemetry and resume in one batch. A zero delta is
//!    a spurious halt and only resumes the firmware.
//! 4. **Draining:** Remove the breakpoint, leave the firmware running and close the session.
//!
//! The loop owns the monitor session for its whole lifetime. Firmware memory is only
//! touched between a confirmed halt and the following resume.

use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::bridge::FirmwareBridge;
use super::frames::FlightRecord;
use super::log::TelemetrySink;
use super::plant::Plant;
use crate::common::{Addr, RunError, Width};
use crate::config::Config;
use crate::monitor::{Breakpoint, BreakpointHandle, Monitor};
use crate::stats::RunStats;

/// Position of the loop in its lifecycle.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoopState {
    /// Nothing sent yet.
    Idle,
    /// Firmware halted and breakpoint placed.
    Armed,
    /// Firmware running towards the next breakpoint hit.
    Running,
    /// Firmware stopped at the breakpoint.
    Halted,
    /// Tearing down.
    Draining,
    /// Session closed.
    Closed,
}

/// What a serviced halt turned out to be.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum HaltOutcome {
    /// The tick had not moved; nothing was read or written beyond the tick.
    Spurious,
    /// A genuine control cycle of `dt` seconds was run.
    Stepped {
        /// Step length in seconds.
        dt: f64,
    },
}

/// Loop parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SyncSettings {
    /// Genuine steps to run before draining.
    pub step_budget: u64,
    /// Sensor noise gain handed to the plant.
    pub noise: f64,
    /// Width the tick counter wraps at.
    pub tick_width: Width,
    /// Ticks per second.
    pub tick_hz: f64,
    /// Sensor-task breakpoint.
    pub breakpoint: Breakpoint,
    /// Pause after arming and after raising the start flag.
    pub arm_settle: Duration,
    /// Steps between progress log lines (0 disables).
    pub progress_interval: u64,
}

impl SyncSettings {
    /// Settings from a run configuration and the resolved breakpoint location.
    pub fn from_config(config: &Config, entry: Addr) -> Self {
        Self {
            step_budget: config.run.step_budget(),
            noise: config.run.noise,
            tick_width: config.firmware.tick_width,
            tick_hz: config.firmware.tick_hz,
            breakpoint: Breakpoint {
                addr: entry,
                length: config.firmware.breakpoint_length,
                kind: config.firmware.breakpoint_kind,
            },
            arm_settle: config.run.arm_settle(),
            progress_interval: config.run.progress_interval,
        }
    }
}

/// The synchronization loop over a monitor `M`, a plant `P` and a flight log `L`.
#[derive(Debug)]
pub struct SyncLoop<M: Monitor, P: Plant, L: TelemetrySink> {
    monitor: M,
    plant: P,
    sink: L,
    bridge: FirmwareBridge,
    settings: SyncSettings,
    state: LoopState,
    breakpoint: Option<BreakpointHandle>,
    tick_prev: Option<u64>,
    steps: u64,
    elapsed: f64,
    stats: RunStats,
}

impl<M: Monitor, P: Plant, L: TelemetrySink> SyncLoop<M, P, L> {
    /// Creates an idle loop.
    pub fn new(monitor: M, plant: P, sink: L, bridge: FirmwareBridge, settings: SyncSettings) -> Self {
        Self {
            monitor,
            plant,
            sink,
            bridge,
            settings,
            state: LoopState::Idle,
            breakpoint: None,
            tick_prev: None,
            steps: 0,
            elapsed: 0.0,
            stats: RunStats::new(),
        }
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> LoopState {
        self.state
    }

    /// Genuine steps run so far.
    pub const fn steps(&self) -> u64 {
        self.steps
    }

    /// Simulated seconds elapsed so far.
    pub const fn elapsed(&self) -> f64 {
        self.elapsed
    }

    /// Tick recorded at the last primed or genuine halt.
    pub const fn tick_prev(&self) -> Option<u64> {
        self.tick_prev
    }

    /// Counters collected so far.
    pub const fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Mutable counters, for recording work done before the loop (startup polls).
    pub const fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    /// The monitor session.
    pub const fn monitor(&self) -> &M {
        &self.monitor
    }

    /// The plant.
    pub const fn plant(&self) -> &P {
        &self.plant
    }

    /// The flight log.
    pub const fn sink(&self) -> &L {
        &self.sink
    }

    fn expect_state(&self, expected: LoopState, what: &'static str) -> Result<(), RunError> {
        if self.state == expected {
            Ok(())
        } else {
            Err(RunError::State(what))
        }
    }

    /// Halts the firmware and arms the sensor-task breakpoint.
    pub fn arm(&mut self) -> Result<(), RunError> {
        self.expect_state(LoopState::Idle, "arm requires an idle loop")?;
        self.monitor.halt()?;
        let handle = self.monitor.set_breakpoint(self.settings.breakpoint)?;
        self.breakpoint = Some(handle);
        self.state = LoopState::Armed;
        info!(entry = %self.settings.breakpoint.addr, "loop armed");
        thread::sleep(self.settings.arm_settle);
        Ok(())
    }

    /// Lets the armed firmware run towards its first breakpoint hit.
    pub fn start(&mut self) -> Result<(), RunError> {
        self.expect_state(LoopState::Armed, "start requires an armed loop")?;
        self.monitor.resume()?;
        self.state = LoopState::Running;
        Ok(())
    }

    /// Services the first halt: records the tick and raises the start flag.
    ///
    /// This halt is not a simulation step and injects nothing.
    pub fn prime(&mut self) -> Result<u64, RunError> {
        self.expect_state(LoopState::Running, "prime requires a running loop")?;
        if self.tick_prev.is_some() {
            return Err(RunError::State("loop already primed"));
        }
        self.monitor.wait_for_halt()?;
        self.state = LoopState::Halted;
        self.stats.halts += 1;

        let tick = self.bridge.read_tick(&mut self.monitor)?;
        self.tick_prev = Some(tick);
        self.bridge.raise_start_flag(&mut self.monitor)?;
        info!(tick, "firmware released from start wait");
        thread::sleep(self.settings.arm_settle);

        self.monitor.resume()?;
        self.state = LoopState::Running;
        Ok(tick)
    }

    /// Waits for the next halt and services it.
    ///
    /// When the step budget is reached the firmware is left halted for [`drain`](Self::drain).
    pub fn service_halt(&mut self) -> Result<HaltOutcome, RunError> {
        self.expect_state(LoopState::Running, "service_halt requires a running loop")?;
        let tick_prev = self
            .tick_prev
            .ok_or(RunError::State("service_halt before prime"))?;

        self.monitor.wait_for_halt()?;
        self.state = LoopState::Halted;
        self.stats.halts += 1;

        let tick_now = self.bridge.read_tick(&mut self.monitor)?;
        let ticks = self.settings.tick_width.wrapping_delta(tick_prev, tick_now);
        if ticks == 0 {
            self.stats.spurious_halts += 1;
            debug!(tick = tick_now, "spurious halt; firmware cycle not finished");
            self.monitor.idle()?;
            self.monitor.resume()?;
            self.state = LoopState::Running;
            return Ok(HaltOutcome::Spurious);
        }

        let dt = ticks as f64 / self.settings.tick_hz;
        let more = self.steps + 1 < self.settings.step_budget;
        self.step(tick_now, ticks, dt, more)?;
        if more {
            self.state = LoopState::Running;
        }
        Ok(HaltOutcome::Stepped { dt })
    }

    /// Runs one simulation step; with `resume` set the firmware is let go in the same batch.
    fn step(&mut self, tick_now: u64, ticks: u64, dt: f64, resume: bool) -> Result<(), RunError> {
        let motors = self.bridge.read_motors(&mut self.monitor)?;
        let state = self.plant.advance(dt, motors);
        let sensors = self.plant.sensors(self.settings.noise);
        let telemetry = self
            .bridge
            .exchange(&mut self.monitor, &sensors, motors, resume)?;

        self.tick_prev = Some(tick_now);
        self.steps += 1;
        self.elapsed += dt;
        self.stats.record_step(ticks, dt);

        self.sink.record(&FlightRecord {
            step: self.steps,
            time_s: self.elapsed,
            tick: tick_now,
            dt_s: dt,
            motors,
            state,
            sensors,
            telemetry,
        })?;

        let interval = self.settings.progress_interval;
        if interval > 0 && self.steps % interval == 0 {
            info!(
                step = self.steps,
                budget = self.settings.step_budget,
                sim_seconds = self.elapsed,
                "progress"
            );
        }
        Ok(())
    }

    /// Removes the breakpoint, leaves the firmware running and closes the session.
    pub fn drain(&mut self) -> Result<(), RunError> {
        let was_halted = match self.state {
            LoopState::Halted | LoopState::Armed => true,
            LoopState::Running => false,
            LoopState::Closed => return Ok(()),
            LoopState::Idle | LoopState::Draining => {
                return Err(RunError::State("drain requires an armed loop"));
            }
        };
        self.state = LoopState::Draining;
        if let Some(handle) = self.breakpoint.take() {
            self.monitor.clear_breakpoint(handle)?;
        }
        if was_halted {
            self.monitor.resume()?;
        }
        self.sink.flush()?;
        self.monitor.close()?;
        self.stats.finish();
        self.state = LoopState::Closed;
        info!(steps = self.steps, sim_seconds = self.elapsed, "loop drained");
        Ok(())
    }

    fn run_inner(&mut self) -> Result<(), RunError> {
        self.arm()?;
        self.start()?;
        let tick = self.prime()?;
        debug!(tick, budget = self.settings.step_budget, "primed; stepping");
        while self.steps < self.settings.step_budget {
            let _ = self.service_halt()?;
        }
        self.drain()
    }

    /// Runs the whole lifecycle: arm, prime, step until the budget is spent, drain.
    ///
    /// # Returns
    ///
    /// The run's counters. On error the session is closed on a best-effort basis
    /// before the error is returned; a new session is needed to retry.
    pub fn run(&mut self) -> Result<&RunStats, RunError> {
        info!(budget = self.settings.step_budget, "synchronization loop starting");
        if let Err(err) = self.run_inner() {
            if let RunError::Monitor(monitor_err) = &err
                && monitor_err.is_desync()
            {
                warn!(%monitor_err, steps = self.steps, "monitor session desynchronized");
            }
            if let Err(close_err) = self.monitor.close() {
                warn!(%close_err, "closing session after failure");
            }
            self.stats.finish();
            self.state = LoopState::Closed;
            return Err(err);
        }
        Ok(&self.stats)
    }
}
