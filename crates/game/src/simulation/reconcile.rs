use glam::Vec3;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    pub position_factor: f32,
    pub velocity_factor: f32,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            position_factor: 1.0 / 3.0,
            velocity_factor: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Correction {
    pub position: Vec3,
    pub velocity: Vec3,
    pub position_error: f32,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> ReconcileConfig {
        self.config
    }

    pub fn reconcile(
        &self,
        local_position: Vec3,
        local_velocity: Vec3,
        authoritative_position: Vec3,
        authoritative_velocity: Vec3,
        rtt_secs: f32,
    ) -> Correction {
        let one_way = rtt_secs.max(0.0) * 0.5;
        let predicted = authoritative_position + authoritative_velocity * one_way;

        let position_error = predicted - local_position;
        let velocity_error = authoritative_velocity - local_velocity;

        Correction {
            position: local_position + position_error * self.config.position_factor,
            velocity: local_velocity + velocity_error * self.config.velocity_factor,
            position_error: position_error.length(),
        }
    }
}
