//! Firmware struct layout table.
//!
//! Some firmware symbols are composite: a struct or array whose fields the loop reads or
//! writes individually. The table below lists, per base symbol, the address-book entries
//! it expands into and their byte offsets. It mirrors the C definitions in the firmware
//! build and has to be updated together with them.

/// Physical meaning of a field's raw value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ScaleHint {
    /// Unscaled integer (motor ratios, flags).
    Raw,
    /// Accelerometer code, ±24 g over 16 bits.
    AccelLsb,
    /// Gyroscope code, ±2000 deg/s over 16 bits.
    GyroLsb,
    /// Signed 16-bit millimeters (or mm/s).
    Millimeters,
    /// Signed optical-flow pixel count.
    Pixels,
    /// Not a data field: a displacement into compiled code.
    CodeDisplacement,
}

impl ScaleHint {
    /// Short unit label for listings.
    pub const fn unit(self) -> &'static str {
        match self {
            Self::Raw => "raw",
            Self::AccelLsb => "accel-lsb",
            Self::GyroLsb => "gyro-lsb",
            Self::Millimeters => "mm",
            Self::Pixels => "px",
            Self::CodeDisplacement => "code",
        }
    }
}

/// One address-book entry produced from a base symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldRule {
    /// Address-book name of the field.
    pub name: &'static str,
    /// Byte offset from the base symbol.
    pub offset: u64,
    /// Unit of the raw value, if the field holds data.
    pub scale: Option<ScaleHint>,
}

impl FieldRule {
    const fn new(name: &'static str, offset: u64, scale: ScaleHint) -> Self {
        Self {
            name,
            offset,
            scale: Some(scale),
        }
    }
}

/// Fan-out rule for one base symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CompositeRule {
    /// Symbol name as it appears in the feed.
    pub base: &'static str,
    /// Entries the base expands into.
    pub fields: &'static [FieldRule],
}

/// Well-known address-book names used by the synchronization loop.
pub mod names {
    /// FreeRTOS millisecond tick counter.
    pub const TICK: &str = "xTickCount";
    /// Flag that releases the firmware from its pre-flight wait loop.
    pub const START: &str = "start";
    /// Breakpoint location inside the sensor task.
    pub const SENSOR_TASK: &str = "sensorsTask";
    /// Motor ratio array.
    pub const MOTORS: [&str; 4] = [
        "motor_ratios_m1",
        "motor_ratios_m2",
        "motor_ratios_m3",
        "motor_ratios_m4",
    ];
    /// Raw accelerometer sample.
    pub const ACCEL: [&str; 3] = ["accelRaw_x", "accelRaw_y", "accelRaw_z"];
    /// Raw gyroscope sample.
    pub const GYRO: [&str; 3] = ["gyroRaw_x", "gyroRaw_y", "gyroRaw_z"];
    /// Optical-flow displacement, firmware axes.
    pub const FLOW: [&str; 2] = ["currentMotion_deltaX", "currentMotion_deltaY"];
    /// Last range-finder reading in millimeters.
    pub const RANGE: &str = "range_last";
    /// Compressed position estimate.
    pub const POSITION: [&str; 3] = ["stateCompressed_x", "stateCompressed_y", "stateCompressed_z"];
    /// Compressed velocity estimate.
    pub const VELOCITY: [&str; 3] = [
        "stateCompressed_vx",
        "stateCompressed_vy",
        "stateCompressed_vz",
    ];
    /// Compressed position setpoint.
    pub const SETPOINT: [&str; 3] = [
        "setpointCompressed_x",
        "setpointCompressed_y",
        "setpointCompressed_z",
    ];
    /// Flow estimator innovations (range, flow x, flow y).
    pub const FLOW_ERRORS: [&str; 3] = ["error_tof", "error_flowx", "error_flowy"];
    /// IMU self-test passed flag.
    pub const READY: &str = "ready";
    /// Gyro bias estimation finished flag.
    pub const GYRO_BIAS_FOUND: &str = "gyroBiasFound";
}

/// Displacement from the start of the sensor task to the instruction just past its
/// initialization. Measured against one firmware build; see `SymbolConfig::entry_override`.
pub const SENSOR_TASK_ENTRY_DISPLACEMENT: u64 = 0x24;

const MOTOR_RATIOS: &[FieldRule] = &[
    FieldRule::new("motor_ratios_m1", 0x0, ScaleHint::Raw),
    FieldRule::new("motor_ratios_m2", 0x4, ScaleHint::Raw),
    FieldRule::new("motor_ratios_m3", 0x8, ScaleHint::Raw),
    FieldRule::new("motor_ratios_m4", 0xc, ScaleHint::Raw),
];

const ACCEL_RAW: &[FieldRule] = &[
    FieldRule::new("accelRaw_x", 0x0, ScaleHint::AccelLsb),
    FieldRule::new("accelRaw_y", 0x2, ScaleHint::AccelLsb),
    FieldRule::new("accelRaw_z", 0x4, ScaleHint::AccelLsb),
];

const GYRO_RAW: &[FieldRule] = &[
    FieldRule::new("gyroRaw_x", 0x0, ScaleHint::GyroLsb),
    FieldRule::new("gyroRaw_y", 0x2, ScaleHint::GyroLsb),
    FieldRule::new("gyroRaw_z", 0x4, ScaleHint::GyroLsb),
];

// motionBurst_t: bytes 2-3 hold deltaX, 4-5 deltaY.
const CURRENT_MOTION: &[FieldRule] = &[
    FieldRule::new("currentMotion_deltaX", 0x2, ScaleHint::Pixels),
    FieldRule::new("currentMotion_deltaY", 0x4, ScaleHint::Pixels),
];

const STATE_COMPRESSED: &[FieldRule] = &[
    FieldRule::new("stateCompressed_x", 0x0, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_y", 0x2, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_z", 0x4, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_vx", 0x6, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_vy", 0x8, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_vz", 0xa, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_ax", 0xc, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_ay", 0xe, ScaleHint::Millimeters),
    FieldRule::new("stateCompressed_az", 0x10, ScaleHint::Millimeters),
];

const SETPOINT_COMPRESSED: &[FieldRule] = &[
    FieldRule::new("setpointCompressed_x", 0x0, ScaleHint::Millimeters),
    FieldRule::new("setpointCompressed_y", 0x2, ScaleHint::Millimeters),
    FieldRule::new("setpointCompressed_z", 0x4, ScaleHint::Millimeters),
];

const SENSORS_TASK: &[FieldRule] = &[FieldRule::new(
    names::SENSOR_TASK,
    SENSOR_TASK_ENTRY_DISPLACEMENT,
    ScaleHint::CodeDisplacement,
)];

/// Layout of the flight-controller build the loop is written against.
pub const FIRMWARE_LAYOUT: &[CompositeRule] = &[
    CompositeRule {
        base: "motor_ratios",
        fields: MOTOR_RATIOS,
    },
    CompositeRule {
        base: "accelRaw",
        fields: ACCEL_RAW,
    },
    CompositeRule {
        base: "gyroRaw",
        fields: GYRO_RAW,
    },
    CompositeRule {
        base: "currentMotion",
        fields: CURRENT_MOTION,
    },
    CompositeRule {
        base: "stateCompressed",
        fields: STATE_COMPRESSED,
    },
    CompositeRule {
        base: "setpointCompressed",
        fields: SETPOINT_COMPRESSED,
    },
    CompositeRule {
        base: names::SENSOR_TASK,
        fields: SENSORS_TASK,
    },
];

/// Lookup over a set of composite rules.
#[derive(Clone, Copy, Debug)]
pub struct ExpansionTable {
    rules: &'static [CompositeRule],
}

impl ExpansionTable {
    /// Wraps a rule set.
    pub const fn new(rules: &'static [CompositeRule]) -> Self {
        Self { rules }
    }

    /// The table for the supported firmware build.
    pub const fn firmware() -> Self {
        Self::new(FIRMWARE_LAYOUT)
    }

    /// A table that expands nothing; every symbol passes through verbatim.
    pub const fn empty() -> Self {
        Self::new(&[])
    }

    /// Returns the rule for `base`, if it is composite.
    pub fn lookup(&self, base: &str) -> Option<&'static CompositeRule> {
        self.rules.iter().find(|rule| rule.base == base)
    }

    /// Returns the field rule that produces address-book entry `name`.
    pub fn field(&self, name: &str) -> Option<&'static FieldRule> {
        self.rules
            .iter()
            .flat_map(|rule| rule.fields.iter())
            .find(|field| field.name == name)
    }

    /// All rules in the table.
    pub const fn rules(&self) -> &'static [CompositeRule] {
        self.rules
    }
}

impl Default for ExpansionTable {
    fn default() -> Self {
        Self::firmware()
    }
}
