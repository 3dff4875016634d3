//! Configuration system for the co-simulation run.
//!
//! This module defines all configuration structures and enums used to parameterize
//! a run. It provides:
//! 1. **Defaults:** Baseline endpoint, timing and firmware-layout constants.
//! 2. **Structures:** Hierarchical config for the run, monitor, emulator, symbols and firmware.
//! 3. **Enums:** Monitor backend, IMU injection path and breakpoint kind.
//!
//! Configuration is supplied as JSON (`cosim run --config run.json`); every section and
//! field is optional and falls back to the values in `defaults`. CLI flags are applied
//! on top of the loaded file.

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{fs, io};

use serde::Deserialize;

use crate::common::{Width, constants};
use crate::monitor::BreakpointKind;

/// Default configuration constants.
mod defaults {
    /// Run length in simulated seconds.
    pub const DURATION_S: f64 = 10.0;

    /// Nominal firmware control period in seconds; sets the step budget.
    pub const STEP_S: f64 = 0.001;

    /// Steps between progress log lines.
    pub const PROGRESS_INTERVAL: u64 = 100;

    /// Pause after arming the breakpoint and after raising the start flag.
    pub const ARM_SETTLE_MS: u64 = 50;

    /// Loopback endpoint of the monitor console.
    pub const HOST: &str = "127.0.0.1";

    /// Telnet port of both OpenOCD and the Renode monitor.
    pub const PORT: u16 = 4444;

    /// Connection establishment limit.
    pub const CONNECT_TIMEOUT_MS: u64 = 10_000;

    /// Bounded wait for a framed reply.
    pub const REPLY_TIMEOUT_MS: u64 = 2_000;

    /// Bounded wait for an asynchronous breakpoint halt.
    pub const HALT_TIMEOUT_MS: u64 = 5_000;

    /// Delay before dropping the connection so the last command is executed.
    pub const CLOSE_SETTLE_MS: u64 = 100;

    /// Delay before removing the breakpoint.
    pub const BREAKPOINT_CLEAR_DELAY_MS: u64 = 200;

    /// Prompt of the emulator monitor before a machine is loaded.
    pub const MONITOR_PROMPT: &str = "(monitor)";

    /// Prompt of the emulator monitor once the flight controller machine is loaded.
    pub const MACHINE_PROMPT: &str = "(CF2.1)";

    /// Peripheral exposing the firmware's RAM on the emulated system bus.
    pub const MEMORY_PERIPHERAL: &str = "sysbus.sram";

    /// Emulated accelerometer.
    pub const ACCEL_PERIPHERAL: &str = "sysbus.i2c3.bmi_accel";

    /// Emulated gyroscope.
    pub const GYRO_PERIPHERAL: &str = "sysbus.i2c3.bmi_gyro";

    /// Machine description loaded at bootstrap.
    pub const MACHINE_SCRIPT: &str = "@scripts/single-node/crazyflie.resc";

    /// Virtual time advanced per observation of the firmware tick.
    pub const QUANTUM_MS: u64 = 1;

    /// Virtual time run right after loading the machine.
    pub const BOOT_RUN_MS: u64 = 100;

    /// Bounded wait for a long `RunFor` to return.
    pub const RUN_TIMEOUT_MS: u64 = 360_000;

    /// Virtual time before the first self-test poll.
    pub const STARTUP_INITIAL_MS: u64 = 1_900;

    /// Virtual time between self-test polls.
    pub const STARTUP_RETRY_MS: u64 = 3_000;

    /// Self-test polls before giving up.
    pub const STARTUP_MAX_ATTEMPTS: u32 = 20;

    /// `ready + 2 * gyroBiasFound` once both flags are set.
    pub const STARTUP_READY_STATUS: u64 = 3;

    /// Column of the address in a symbol feed line.
    pub const ADDRESS_COLUMN: usize = 1;

    /// Byte length covered by the hardware breakpoint (one Thumb instruction).
    pub const BREAKPOINT_LENGTH: u32 = 2;
}

/// Monitor dialect to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Debug-probe monitor (OpenOCD telnet) attached to real hardware.
    #[default]
    #[serde(alias = "hitl", alias = "openocd")]
    Probe,
    /// Emulator monitor (Renode) running the firmware image.
    #[serde(alias = "sitl", alias = "renode")]
    Emulator,
}

/// How IMU samples reach the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImuInjection {
    /// Write raw 16-bit samples into the sensor task's `accelRaw`/`gyroRaw` buffers.
    #[default]
    RawMemory,
    /// Feed the emulated IMU peripherals and raise their data interrupt.
    PeripheralFeed,
}

/// Root configuration.
///
/// # Examples
///
/// ```
/// use cosim_core::config::{Backend, Config};
///
/// let json = r#"{
///     "run": { "duration_s": 2.0 },
///     "monitor": { "backend": "emulator", "port": 1234 },
///     "symbols": { "strip_leading_offset_digit": true }
/// }"#;
///
/// let config = Config::from_json(json).unwrap();
/// assert_eq!(config.monitor.backend, Backend::Emulator);
/// assert_eq!(config.run.step_budget(), 2000);
/// assert!(config.symbols.strip_leading_offset_digit);
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Run length and pacing
    #[serde(default)]
    pub run: RunConfig,
    /// Monitor endpoint and reply timing
    #[serde(default)]
    pub monitor: MonitorConfig,
    /// Emulator-only settings
    #[serde(default)]
    pub emulator: EmulatorConfig,
    /// Symbol feed and address book construction
    #[serde(default)]
    pub symbols: SymbolConfig,
    /// Firmware-side field widths and injection path
    #[serde(default)]
    pub firmware: FirmwareConfig,
}

impl Config {
    /// Parses a configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Loads a configuration file.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to a JSON configuration file.
    ///
    /// # Returns
    ///
    /// The parsed configuration, or an I/O error (parse errors are mapped to
    /// `InvalidData`).
    pub fn load(path: &Path) -> io::Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Run length and host-side pacing.
#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Simulated run length in seconds
    #[serde(default = "RunConfig::default_duration")]
    pub duration_s: f64,

    /// Nominal control period in seconds
    #[serde(default = "RunConfig::default_step")]
    pub step_s: f64,

    /// Explicit step budget; overrides `duration_s / step_s`
    #[serde(default)]
    pub steps: Option<u64>,

    /// Sensor noise gain handed to the plant (0 disables noise)
    #[serde(default)]
    pub noise: f64,

    /// Seed for the plant's noise generator
    #[serde(default)]
    pub seed: u64,

    /// Steps between progress log lines (0 disables)
    #[serde(default = "RunConfig::default_progress_interval")]
    pub progress_interval: u64,

    /// Pause after arming and after raising the start flag, in milliseconds
    #[serde(default = "RunConfig::default_arm_settle")]
    pub arm_settle_ms: u64,
}

impl RunConfig {
    fn default_duration() -> f64 {
        defaults::DURATION_S
    }

    fn default_step() -> f64 {
        defaults::STEP_S
    }

    fn default_progress_interval() -> u64 {
        defaults::PROGRESS_INTERVAL
    }

    fn default_arm_settle() -> u64 {
        defaults::ARM_SETTLE_MS
    }

    /// Number of genuine control cycles the loop runs before draining.
    pub fn step_budget(&self) -> u64 {
        if let Some(steps) = self.steps {
            return steps;
        }
        if self.step_s <= 0.0 || !self.duration_s.is_finite() {
            return 0;
        }
        (self.duration_s / self.step_s).round().max(0.0) as u64
    }

    /// Pause after arming and after raising the start flag.
    pub const fn arm_settle(&self) -> Duration {
        Duration::from_millis(self.arm_settle_ms)
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            duration_s: defaults::DURATION_S,
            step_s: defaults::STEP_S,
            steps: None,
            noise: 0.0,
            seed: 0,
            progress_interval: defaults::PROGRESS_INTERVAL,
            arm_settle_ms: defaults::ARM_SETTLE_MS,
        }
    }
}

/// Monitor endpoint and reply timing.
#[derive(Debug, Clone, Deserialize)]
pub struct MonitorConfig {
    /// Dialect to speak
    #[serde(default)]
    pub backend: Backend,

    /// Monitor host
    #[serde(default = "MonitorConfig::default_host")]
    pub host: String,

    /// Monitor TCP port
    #[serde(default = "MonitorConfig::default_port")]
    pub port: u16,

    /// Connection establishment limit in milliseconds
    #[serde(default = "MonitorConfig::default_connect_timeout")]
    pub connect_timeout_ms: u64,

    /// Bounded wait for a framed reply in milliseconds
    #[serde(default = "MonitorConfig::default_reply_timeout")]
    pub reply_timeout_ms: u64,

    /// Bounded wait for a breakpoint halt in milliseconds
    #[serde(default = "MonitorConfig::default_halt_timeout")]
    pub halt_timeout_ms: u64,

    /// Delay before dropping the connection in milliseconds
    #[serde(default = "MonitorConfig::default_close_settle")]
    pub close_settle_ms: u64,

    /// Delay before removing the breakpoint in milliseconds
    #[serde(default = "MonitorConfig::default_breakpoint_clear_delay")]
    pub breakpoint_clear_delay_ms: u64,
}

impl MonitorConfig {
    fn default_host() -> String {
        defaults::HOST.to_string()
    }

    fn default_port() -> u16 {
        defaults::PORT
    }

    fn default_connect_timeout() -> u64 {
        defaults::CONNECT_TIMEOUT_MS
    }

    fn default_reply_timeout() -> u64 {
        defaults::REPLY_TIMEOUT_MS
    }

    fn default_halt_timeout() -> u64 {
        defaults::HALT_TIMEOUT_MS
    }

    fn default_close_settle() -> u64 {
        defaults::CLOSE_SETTLE_MS
    }

    fn default_breakpoint_clear_delay() -> u64 {
        defaults::BREAKPOINT_CLEAR_DELAY_MS
    }

    /// `host:port` of the monitor console.
    pub fn endpoint(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Connection establishment limit.
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Bounded wait for a framed reply.
    pub const fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }

    /// Bounded wait for a breakpoint halt.
    pub const fn halt_timeout(&self) -> Duration {
        Duration::from_millis(self.halt_timeout_ms)
    }

    /// Delay before dropping the connection.
    pub const fn close_settle(&self) -> Duration {
        Duration::from_millis(self.close_settle_ms)
    }

    /// Delay before removing the breakpoint.
    pub const fn breakpoint_clear_delay(&self) -> Duration {
        Duration::from_millis(self.breakpoint_clear_delay_ms)
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            host: defaults::HOST.to_string(),
            port: defaults::PORT,
            connect_timeout_ms: defaults::CONNECT_TIMEOUT_MS,
            reply_timeout_ms: defaults::REPLY_TIMEOUT_MS,
            halt_timeout_ms: defaults::HALT_TIMEOUT_MS,
            close_settle_ms: defaults::CLOSE_SETTLE_MS,
            breakpoint_clear_delay_ms: defaults::BREAKPOINT_CLEAR_DELAY_MS,
        }
    }
}

/// Emulator monitor settings.
#[derive(Debug, Clone, Deserialize)]
pub struct EmulatorConfig {
    /// Prompt shown before a machine is loaded
    #[serde(default = "EmulatorConfig::default_monitor_prompt")]
    pub monitor_prompt: String,

    /// Prompt shown once the machine is loaded
    #[serde(default = "EmulatorConfig::default_machine_prompt")]
    pub machine_prompt: String,

    /// Bus peripheral the firmware RAM is read and written through
    #[serde(default = "EmulatorConfig::default_memory")]
    pub memory_peripheral: String,

    /// Emulated accelerometer peripheral
    #[serde(default = "EmulatorConfig::default_accel")]
    pub accel_peripheral: String,

    /// Emulated gyroscope peripheral
    #[serde(default = "EmulatorConfig::default_gyro")]
    pub gyro_peripheral: String,

    /// Machine script loaded at bootstrap; `None` attaches to an already loaded machine
    #[serde(default = "EmulatorConfig::default_script")]
    pub script: Option<String>,

    /// Monitor commands run after loading the machine
    #[serde(default = "EmulatorConfig::default_init_commands")]
    pub init_commands: Vec<String>,

    /// Virtual time per tick observation in milliseconds
    #[serde(default = "EmulatorConfig::default_quantum")]
    pub quantum_ms: u64,

    /// Virtual time run right after loading in milliseconds
    #[serde(default = "EmulatorConfig::default_boot_run")]
    pub boot_run_ms: u64,

    /// Bounded wait for a `RunFor` reply in milliseconds
    #[serde(default = "EmulatorConfig::default_run_timeout")]
    pub run_timeout_ms: u64,

    /// Firmware self-test pass before the loop starts
    #[serde(default)]
    pub startup: StartupConfig,
}

impl EmulatorConfig {
    fn default_monitor_prompt() -> String {
        defaults::MONITOR_PROMPT.to_string()
    }

    fn default_machine_prompt() -> String {
        defaults::MACHINE_PROMPT.to_string()
    }

    fn default_memory() -> String {
        defaults::MEMORY_PERIPHERAL.to_string()
    }

    fn default_accel() -> String {
        defaults::ACCEL_PERIPHERAL.to_string()
    }

    fn default_gyro() -> String {
        defaults::GYRO_PERIPHERAL.to_string()
    }

    #[allow(clippy::unnecessary_wraps)]
    fn default_script() -> Option<String> {
        Some(defaults::MACHINE_SCRIPT.to_string())
    }

    fn default_init_commands() -> Vec<String> {
        vec!["logLevel -1 sysbus.nrf".to_string(), "logLevel 3".to_string()]
    }

    fn default_quantum() -> u64 {
        defaults::QUANTUM_MS
    }

    fn default_boot_run() -> u64 {
        defaults::BOOT_RUN_MS
    }

    fn default_run_timeout() -> u64 {
        defaults::RUN_TIMEOUT_MS
    }

    /// Virtual time per tick observation.
    pub const fn quantum(&self) -> Duration {
        Duration::from_millis(self.quantum_ms)
    }

    /// Virtual time run right after loading.
    pub const fn boot_run(&self) -> Duration {
        Duration::from_millis(self.boot_run_ms)
    }

    /// Bounded wait for a `RunFor` reply.
    pub const fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }
}

impl Default for EmulatorConfig {
    fn default() -> Self {
        Self {
            monitor_prompt: Self::default_monitor_prompt(),
            machine_prompt: Self::default_machine_prompt(),
            memory_peripheral: Self::default_memory(),
            accel_peripheral: Self::default_accel(),
            gyro_peripheral: Self::default_gyro(),
            script: Self::default_script(),
            init_commands: Self::default_init_commands(),
            quantum_ms: defaults::QUANTUM_MS,
            boot_run_ms: defaults::BOOT_RUN_MS,
            run_timeout_ms: defaults::RUN_TIMEOUT_MS,
            startup: StartupConfig::default(),
        }
    }
}

/// Emulated firmware self-test pass.
///
/// The firmware refuses to fly until its IMU self-test and gyro bias estimation
/// succeed, so the emulator is run in long slices with a resting IMU sample until
/// both flags are set.
#[derive(Debug, Clone, Deserialize)]
pub struct StartupConfig {
    /// Run the self-test pass (emulator backend only)
    #[serde(default = "StartupConfig::default_enabled")]
    pub enabled: bool,

    /// Virtual time before the first poll in milliseconds
    #[serde(default = "StartupConfig::default_initial")]
    pub initial_run_ms: u64,

    /// Virtual time between polls in milliseconds
    #[serde(default = "StartupConfig::default_retry")]
    pub retry_run_ms: u64,

    /// Polls before giving up
    #[serde(default = "StartupConfig::default_max_attempts")]
    pub max_attempts: u32,

    /// Status value that means "passed"
    #[serde(default = "StartupConfig::default_ready_status")]
    pub ready_status: u64,
}

impl StartupConfig {
    fn default_enabled() -> bool {
        true
    }

    fn default_initial() -> u64 {
        defaults::STARTUP_INITIAL_MS
    }

    fn default_retry() -> u64 {
        defaults::STARTUP_RETRY_MS
    }

    fn default_max_attempts() -> u32 {
        defaults::STARTUP_MAX_ATTEMPTS
    }

    fn default_ready_status() -> u64 {
        defaults::STARTUP_READY_STATUS
    }

    /// Virtual time before the first poll.
    pub const fn initial_run(&self) -> Duration {
        Duration::from_millis(self.initial_run_ms)
    }

    /// Virtual time between polls.
    pub const fn retry_run(&self) -> Duration {
        Duration::from_millis(self.retry_run_ms)
    }
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            initial_run_ms: defaults::STARTUP_INITIAL_MS,
            retry_run_ms: defaults::STARTUP_RETRY_MS,
            max_attempts: defaults::STARTUP_MAX_ATTEMPTS,
            ready_status: defaults::STARTUP_READY_STATUS,
        }
    }
}

/// Symbol feed and address book construction.
#[derive(Debug, Clone, Deserialize)]
pub struct SymbolConfig {
    /// Path of the symbol feed
    #[serde(default)]
    pub feed: Option<PathBuf>,

    /// Column (0-based) holding the hex address in each feed line
    #[serde(default = "SymbolConfig::default_address_column")]
    pub address_column: usize,

    /// Drop the memory-region digit the emulator image's addresses carry
    #[serde(default)]
    pub strip_leading_offset_digit: bool,

    /// Breakpoint address to use instead of the computed sensor-task entry
    #[serde(default)]
    pub entry_override: Option<u64>,

    /// Size of the sensor-task function; enables the entry range check
    #[serde(default)]
    pub entry_function_size: Option<u64>,
}

impl SymbolConfig {
    fn default_address_column() -> usize {
        defaults::ADDRESS_COLUMN
    }
}

impl Default for SymbolConfig {
    fn default() -> Self {
        Self {
            feed: None,
            address_column: defaults::ADDRESS_COLUMN,
            strip_leading_offset_digit: false,
            entry_override: None,
            entry_function_size: None,
        }
    }
}

/// Firmware-side field widths and the sensor injection path.
#[derive(Debug, Clone, Deserialize)]
pub struct FirmwareConfig {
    /// Width the tick counter is read at
    #[serde(default = "FirmwareConfig::default_tick_width")]
    pub tick_width: Width,

    /// Scheduler ticks per second
    #[serde(default = "FirmwareConfig::default_tick_hz")]
    pub tick_hz: f64,

    /// Width of the `start` flag
    #[serde(default = "FirmwareConfig::default_start_flag_width")]
    pub start_flag_width: Width,

    /// How IMU samples reach the firmware
    #[serde(default)]
    pub imu_injection: ImuInjection,

    /// Artificial gyro bias in LSB, added before encoding
    #[serde(default)]
    pub gyro_bias_lsb: [i32; 3],

    /// Bytes covered by the sensor-task breakpoint
    #[serde(default = "FirmwareConfig::default_breakpoint_length")]
    pub breakpoint_length: u32,

    /// Breakpoint kind
    #[serde(default)]
    pub breakpoint_kind: BreakpointKind,
}

impl FirmwareConfig {
    fn default_tick_width() -> Width {
        Width::Word
    }

    fn default_tick_hz() -> f64 {
        constants::TICK_HZ
    }

    fn default_start_flag_width() -> Width {
        Width::Byte
    }

    fn default_breakpoint_length() -> u32 {
        defaults::BREAKPOINT_LENGTH
    }
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            tick_width: Width::Word,
            tick_hz: constants::TICK_HZ,
            start_flag_width: Width::Byte,
            imu_injection: ImuInjection::default(),
            gyro_bias_lsb: [0; 3],
            breakpoint_length: defaults::BREAKPOINT_LENGTH,
            breakpoint_kind: BreakpointKind::default(),
        }
    }
}
