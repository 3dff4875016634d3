//! Run statistics collection and reporting.
//!
//! This module tracks what happened during one synchronization run. It provides:
//! 1. **Summary:** Host wall-clock time, simulated time and the real-time factor.
//! 2. **Synchronization:** Halts observed, spurious halts and firmware ticks consumed.
//! 3. **Startup:** Self-test polls needed before the loop could start.

use std::fmt::Write as _;
use std::time::{Duration, Instant};

/// Section names for selective stats output.
///
/// Valid section identifiers: `"summary"`, `"sync"`, `"startup"`.
/// Pass an empty slice to `render_sections` to render all sections.
pub const STATS_SECTIONS: &[&str] = &["summary", "sync", "startup"];

/// Looks `name` up among [`STATS_SECTIONS`], ignoring case and surrounding blanks.
pub fn stats_section(name: &str) -> Option<&'static str> {
    let name = name.trim();
    STATS_SECTIONS
        .iter()
        .copied()
        .find(|section| section.eq_ignore_ascii_case(name))
}

/// Counters for one synchronization run.
#[derive(Clone, Debug)]
pub struct RunStats {
    start_time: Instant,
    finish_time: Option<Instant>,
    /// Halts observed at the sensor-task breakpoint, including the priming halt.
    pub halts: u64,
    /// Halts where the tick counter had not moved.
    pub spurious_halts: u64,
    /// Genuine control cycles run.
    pub steps: u64,
    /// Firmware ticks elapsed across all steps.
    pub firmware_ticks: u64,
    /// Simulated seconds the plant was advanced by.
    pub sim_seconds: f64,
    /// Self-test polls run before the loop (emulator only).
    pub startup_attempts: u32,
}

impl Default for RunStats {
    fn default() -> Self {
        Self {
            start_time: Instant::now(),
            finish_time: None,
            halts: 0,
            spurious_halts: 0,
            steps: 0,
            firmware_ticks: 0,
            sim_seconds: 0.0,
            startup_attempts: 0,
        }
    }
}

impl RunStats {
    /// Starts the wall clock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one genuine step of `ticks` firmware ticks lasting `dt` seconds.
    pub fn record_step(&mut self, ticks: u64, dt: f64) {
        self.steps += 1;
        self.firmware_ticks += ticks;
        self.sim_seconds += dt;
    }

    /// Stops the wall clock.
    pub fn finish(&mut self) {
        if self.finish_time.is_none() {
            self.finish_time = Some(Instant::now());
        }
    }

    /// Wall-clock time from start to finish (or to now, if still running).
    pub fn host_time(&self) -> Duration {
        self.finish_time
            .unwrap_or_else(Instant::now)
            .duration_since(self.start_time)
    }

    /// Simulated seconds per host second.
    pub fn real_time_factor(&self) -> f64 {
        let host = self.host_time().as_secs_f64();
        if host > 0.0 { self.sim_seconds / host } else { 0.0 }
    }

    /// Renders the requested sections.
    ///
    /// # Arguments
    ///
    /// * `sections` - Section names from [`STATS_SECTIONS`], or empty for all.
    ///
    /// # Returns
    ///
    /// The report text, ending with a closing rule.
    pub fn render_sections(&self, sections: &[String]) -> String {
        let want = |s: &str| sections.is_empty() || sections.iter().any(|x| x == s);
        let mut out = String::new();
        let halts = self.halts.max(1);
        let steps = self.steps.max(1);

        if want("summary") {
            let _ = writeln!(out, "\n==========================================================");
            let _ = writeln!(out, "FIRMWARE CO-SIMULATION STATISTICS");
            let _ = writeln!(out, "==========================================================");
            let _ = writeln!(out, "host_seconds             {:.4} s", self.host_time().as_secs_f64());
            let _ = writeln!(out, "sim_seconds              {:.4} s", self.sim_seconds);
            let _ = writeln!(out, "sim_steps                {}", self.steps);
            let _ = writeln!(out, "real_time_factor         {:.3}", self.real_time_factor());
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("sync") {
            let _ = writeln!(out, "SYNCHRONIZATION");
            let _ = writeln!(out, "  halts                  {}", self.halts);
            let _ = writeln!(
                out,
                "  spurious_halts         {} ({:.2}%)",
                self.spurious_halts,
                self.spurious_halts as f64 / halts as f64 * 100.0
            );
            let _ = writeln!(out, "  firmware_ticks         {}", self.firmware_ticks);
            let _ = writeln!(
                out,
                "  ticks_per_step         {:.3}",
                self.firmware_ticks as f64 / steps as f64
            );
            let _ = writeln!(out, "----------------------------------------------------------");
        }
        if want("startup") {
            let _ = writeln!(out, "STARTUP");
            let _ = writeln!(out, "  self_test_polls        {}", self.startup_attempts);
        }
        let _ = writeln!(out, "==========================================================");
        out
    }

    /// Prints the requested sections to stdout.
    pub fn print_sections(&self, sections: &[String]) {
        print!("{}", self.render_sections(sections));
    }
}
