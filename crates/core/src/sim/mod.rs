//! Simulation top-level.
//!
//! This module ties the plant to the live firmware. It provides:
//! 1. **Frames:** Sensor, telemetry, state and per-step record types.
//! 2. **Plant:** The stepper interface of the physics model.
//! 3. **Bridge:** Marshaling of frames to and from firmware memory.
//! 4. **Loop:** The breakpoint-gated synchronization state machine.
//! 5. **Startup:** The emulator's firmware self-test pass.
//! 6. **Log:** Flight record sinks.

/// Firmware memory marshaling.
pub mod bridge;

/// Per-step data types.
pub mod frames;

/// Flight log sinks.
pub mod log;

/// Plant interface and a resting plant.
pub mod plant;

/// Emulated firmware self-test pass.
pub mod startup;

/// Synchronization loop.
pub mod sync;

pub use bridge::{FirmwareBridge, FirmwareMap};
pub use frames::{FlightRecord, SensorFrame, TelemetryFrame, VehicleState};
pub use log::{JsonLinesSink, MemorySink, TelemetrySink};
pub use plant::{Plant, StaticPlant};
pub use startup::{StartupFlags, pass_self_test};
pub use sync::{HaltOutcome, LoopState, SyncLoop, SyncSettings};
