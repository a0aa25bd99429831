use std::collections::{HashMap, VecDeque};

use glam::{Vec2, Vec3};
use log::warn;

use crate::snapshot::{EntityId, EntityTable, Player};

pub const DEFAULT_LAG_WINDOW_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LagSample {
    pub time: f64,
    pub position: Vec3,
    pub look: Vec2,
}

impl LagSample {
    fn of(time: f64, player: &Player) -> Self {
        Self {
            time,
            position: player.position,
            look: player.look,
        }
    }

    fn lerp(&self, other: &Self, time: f64) -> (Vec3, Vec2) {
        let span = other.time - self.time;
        let t = if span > 0.0 {
            ((time - self.time) / span) as f32
        } else {
            0.0
        };
        (
            self.position.lerp(other.position, t),
            self.look.lerp(other.look, t),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LagCompensationError {
    #[error("players are already rewound")]
    AlreadyRewound,
    #[error("unrewind without a matching rewind")]
    NotRewound,
}

/// Sliding window of player transforms for server-side hit validation.
///
/// `rewind` and `unrewind` must pair up; a second `rewind` before the
/// `unrewind` is rejected.
#[derive(Debug)]
pub struct LagCompensator {
    window: f64,
    history: HashMap<EntityId, VecDeque<LagSample>>,
    rewound: bool,
}

impl Default for LagCompensator {
    fn default() -> Self {
        Self::new(DEFAULT_LAG_WINDOW_SECS)
    }
}

impl LagCompensator {
    pub fn new(window_secs: f64) -> Self {
        Self {
            window: window_secs,
            history: HashMap::new(),
            rewound: false,
        }
    }

    pub fn window(&self) -> f64 {
        self.window
    }

    pub fn is_rewound(&self) -> bool {
        self.rewound
    }

    pub fn record_tick(&mut self, now: f64, players: &EntityTable<Player>) {
        for player in players.iter() {
            self.history
                .entry(player.id)
                .or_default()
                .push_back(LagSample::of(now, player));
        }

        let cutoff = now - self.window;
        self.history.retain(|_, samples| {
            while samples.front().is_some_and(|s| s.time < cutoff) {
                samples.pop_front();
            }
            !samples.is_empty()
        });
    }

    pub fn rewind(
        &mut self,
        now: f64,
        target_time: f64,
        players: &mut EntityTable<Player>,
    ) -> Result<(), LagCompensationError> {
        if self.rewound {
            return Err(LagCompensationError::AlreadyRewound);
        }

        for player in players.iter_mut() {
            let samples = self.history.entry(player.id).or_default();
            let target = Self::sample_at(samples, target_time);

            // Captured after the lookup so it never stands in for history.
            samples.push_back(LagSample::of(now, player));

            match target {
                Some((position, look)) => {
                    player.position = position;
                    player.look = look;
                }
                None => warn!(
                    "no lag history for entity {} at t={target_time:.3}, using live transform",
                    player.id
                ),
            }
        }

        self.rewound = true;
        Ok(())
    }

    pub fn unrewind(
        &mut self,
        players: &mut EntityTable<Player>,
    ) -> Result<(), LagCompensationError> {
        if !self.rewound {
            return Err(LagCompensationError::NotRewound);
        }

        for player in players.iter_mut() {
            if let Some(last) = self.history.get(&player.id).and_then(|s| s.back()) {
                player.position = last.position;
                player.look = last.look;
            }
        }

        self.rewound = false;
        Ok(())
    }

    pub fn forget(&mut self, id: EntityId) {
        self.history.remove(&id);
    }

    pub fn tracked(&self) -> usize {
        self.history.len()
    }

    pub fn samples(&self, id: EntityId) -> usize {
        self.history.get(&id).map_or(0, VecDeque::len)
    }

    fn sample_at(samples: &VecDeque<LagSample>, time: f64) -> Option<(Vec3, Vec2)> {
        let before = samples.iter().rev().find(|s| s.time <= time);
        let after = samples.iter().find(|s| s.time > time);

        match (before, after) {
            (Some(a), Some(b)) => Some(a.lerp(b, time)),
            (Some(only), None) | (None, Some(only)) => Some((only.position, only.look)),
            (None, None) => None,
        }
    }
}
