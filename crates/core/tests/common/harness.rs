use std::time::Duration;

use cosim_core::common::{Addr, Width};
use cosim_core::config::FirmwareConfig;
use cosim_core::monitor::Breakpoint;
use cosim_core::sim::{FirmwareBridge, FirmwareMap, MemorySink, StaticPlant, SyncLoop, SyncSettings};
use cosim_core::symbols::{AddressBook, ExpansionTable, parse_feed};

use crate::common::mocks::firmware::FakeFirmware;

pub const TICK: Addr = Addr::new(0x2000_0010);
pub const START: Addr = Addr::new(0x2000_0020);
pub const SENSOR_TASK: Addr = Addr::new(0x0800_4000);
pub const ENTRY: Addr = Addr::new(0x0800_4024);
pub const MOTORS: Addr = Addr::new(0x2000_0100);
pub const ACCEL: Addr = Addr::new(0x2000_1000);
pub const GYRO: Addr = Addr::new(0x2000_1010);
pub const FLOW: Addr = Addr::new(0x2000_1020);
pub const RANGE: Addr = Addr::new(0x2000_1030);
pub const STATE: Addr = Addr::new(0x2000_1040);
pub const SETPOINT: Addr = Addr::new(0x2000_1060);
pub const READY: Addr = Addr::new(0x2000_1080);
pub const GYRO_BIAS_FOUND: Addr = Addr::new(0x2000_1081);

/// A symbol feed covering every name the loop and the startup pass resolve.
pub const FIXTURE_FEED: &str = "\
# name                address      size
xTickCount            0x20000010   4
start                 0x20000020   1
sensorsTask           0x08004000   0x1a0
motor_ratios          0x20000100   16
accelRaw              0x20001000   6
gyroRaw               0x20001010   6
currentMotion         0x20001020   12
range_last            0x20001030   2
stateCompressed       0x20001040   18
setpointCompressed    0x20001060   6
error_tof             0x20001070   2
error_flowx           0x20001072   2
error_flowy           0x20001074   2
ready                 0x20001080   1
gyroBiasFound         0x20001081   1
";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

pub fn fixture_book() -> AddressBook {
    let raw = parse_feed(FIXTURE_FEED, 1).unwrap();
    AddressBook::resolve(&raw, false, &ExpansionTable::firmware()).unwrap()
}

pub fn fixture_map() -> FirmwareMap {
    FirmwareMap::resolve(&fixture_book()).unwrap()
}

pub type FakeLoop = SyncLoop<FakeFirmware, StaticPlant, MemorySink>;

/// Builds a synchronization loop over a [`FakeFirmware`] and the fixture feed.
pub struct TestContext {
    ticks: Vec<u64>,
    step_budget: u64,
    tick_width: Width,
    firmware: FirmwareConfig,
    height: f64,
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}

impl TestContext {
    pub fn new() -> Self {
        init_tracing();
        Self {
            ticks: Vec::new(),
            step_budget: 1,
            tick_width: Width::Word,
            firmware: FirmwareConfig::default(),
            height: 0.0,
        }
    }

    /// Tick values the firmware shows at successive halts, priming halt first.
    pub fn with_ticks(mut self, ticks: &[u64]) -> Self {
        self.ticks = ticks.to_vec();
        self
    }

    pub fn with_budget(mut self, step_budget: u64) -> Self {
        self.step_budget = step_budget;
        self
    }

    pub fn with_tick_width(mut self, width: Width) -> Self {
        self.tick_width = width;
        self
    }

    pub fn with_firmware(mut self, firmware: FirmwareConfig) -> Self {
        self.firmware = firmware;
        self
    }

    pub fn with_height(mut self, height: f64) -> Self {
        self.height = height;
        self
    }

    pub fn settings(&self) -> SyncSettings {
        SyncSettings {
            step_budget: self.step_budget,
            noise: 0.0,
            tick_width: self.tick_width,
            tick_hz: 1000.0,
            breakpoint: Breakpoint::hardware(ENTRY),
            arm_settle: Duration::ZERO,
            progress_interval: 0,
        }
    }

    pub fn build(self) -> FakeLoop {
        let firmware = FakeFirmware::new(TICK, self.ticks.iter().copied());
        let bridge = FirmwareBridge::new(fixture_map(), self.firmware.clone());
        let settings = self.settings();
        SyncLoop::new(
            firmware,
            StaticPlant::new(self.height, 0),
            MemorySink::new(),
            bridge,
            settings,
        )
    }
}
