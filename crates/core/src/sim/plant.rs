//! Plant interface.
//!
//! The physics model is an external collaborator. The loop only needs to step it by a
//! firmware-derived `dt` with the current motor commands and to ask it for a sensor
//! frame. [`StaticPlant`] is a vehicle sitting still, used for bring-up runs and tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::frames::{SensorFrame, VehicleState};

/// A steppable vehicle model.
pub trait Plant {
    /// Advances the model by `dt` seconds under `motors` and returns the new state.
    fn advance(&mut self, dt: f64, motors: [u64; 4]) -> VehicleState;

    /// Synthesizes a sensor frame for the current state.
    ///
    /// `noise` scales the injected measurement noise; 0 gives exact readings.
    fn sensors(&mut self, noise: f64) -> SensorFrame;
}

/// A vehicle at rest at a fixed height above the ground.
///
/// Motor commands are ignored. Sensor noise is uniform in `[-noise, noise]` per channel.
#[derive(Debug)]
pub struct StaticPlant {
    state: VehicleState,
    rng: StdRng,
}

impl StaticPlant {
    /// A plant resting `height` meters above the ground, with a seeded noise source.
    pub fn new(height: f64, seed: u64) -> Self {
        Self {
            state: VehicleState {
                position: [0.0, 0.0, height],
                ..VehicleState::default()
            },
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Current state.
    pub const fn state(&self) -> &VehicleState {
        &self.state
    }

    fn jitter(&mut self, noise: f64) -> f64 {
        if noise > 0.0 {
            self.rng.gen_range(-noise..=noise)
        } else {
            0.0
        }
    }
}

impl Plant for StaticPlant {
    fn advance(&mut self, _dt: f64, _motors: [u64; 4]) -> VehicleState {
        self.state
    }

    fn sensors(&mut self, noise: f64) -> SensorFrame {
        let mut frame = SensorFrame::resting();
        frame.range = self.state.position[2];
        for axis in 0..3 {
            frame.accel[axis] += self.jitter(noise);
            frame.gyro[axis] += self.jitter(noise);
        }
        frame
    }
}
