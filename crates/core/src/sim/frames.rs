//! Per-step data exchanged with the plant and the firmware.

use serde::{Deserialize, Serialize};

use crate::common::constants::GRAVITY;

/// Sensor readings the plant produces for one control cycle.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SensorFrame {
    /// Specific force in m/s², body frame.
    pub accel: [f64; 3],
    /// Angular rate in rad/s, body frame.
    pub gyro: [f64; 3],
    /// Optical-flow displacement in pixels, simulator axes.
    pub flow: [f64; 2],
    /// Range-finder distance in meters.
    pub range: f64,
}

impl SensorFrame {
    /// A vehicle at rest: gravity on z, no rotation, no flow.
    pub const fn resting() -> Self {
        Self {
            accel: [0.0, 0.0, GRAVITY],
            gyro: [0.0; 3],
            flow: [0.0; 2],
            range: 0.0,
        }
    }
}

/// Values read back from firmware memory after each injection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TelemetryFrame {
    /// Motor ratios, raw firmware units.
    pub motors: [u64; 4],
    /// Estimated position in meters.
    pub position: [f64; 3],
    /// Estimated velocity in m/s.
    pub velocity: [f64; 3],
    /// Position setpoint in meters.
    pub setpoint: [f64; 3],
    /// Flow estimator innovations (range, flow x, flow y).
    pub flow_errors: [f64; 3],
}

/// Vehicle state as reported by the plant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VehicleState {
    /// Position in meters, world frame.
    pub position: [f64; 3],
    /// Velocity in m/s, world frame.
    pub velocity: [f64; 3],
    /// Roll, pitch, yaw in radians.
    pub attitude: [f64; 3],
    /// Body angular rate in rad/s.
    pub angular_rate: [f64; 3],
}

/// Everything logged for one genuine step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FlightRecord {
    /// Step index, starting at 1.
    pub step: u64,
    /// Simulated time after this step, in seconds.
    pub time_s: f64,
    /// Firmware tick observed at this halt.
    pub tick: u64,
    /// Step length derived from the tick delta, in seconds.
    pub dt_s: f64,
    /// Motor commands the plant was advanced with.
    pub motors: [u64; 4],
    /// Plant state after advancing.
    pub state: VehicleState,
    /// Sensor values written to the firmware.
    pub sensors: SensorFrame,
    /// Firmware estimates read back after the write.
    pub telemetry: TelemetryFrame,
}
