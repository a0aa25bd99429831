use std::collections::{HashMap, VecDeque};

use log::{debug, warn};

use crate::net::PeerId;

use super::world::WorldSnapshot;

pub const DEFAULT_MAX_CACHED_SNAPSHOTS: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    Advanced,
    Stale,
    /// Names a sequence this cache never stored; the peer is reset to a
    /// full-state baseline.
    NeverSent,
    /// No record for the peer, either never connected or already gone.
    UnknownPeer,
}

#[derive(Debug)]
pub struct AckCache {
    history: VecDeque<WorldSnapshot>,
    max_cached: usize,
    acks: HashMap<PeerId, Option<u32>>,
    latest_sequence: u32,
    empty: WorldSnapshot,
}

impl Default for AckCache {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_CACHED_SNAPSHOTS)
    }
}

impl AckCache {
    pub fn new(max_cached: usize) -> Self {
        Self {
            history: VecDeque::with_capacity(max_cached),
            max_cached: max_cached.max(1),
            acks: HashMap::new(),
            latest_sequence: 0,
            empty: WorldSnapshot::empty(),
        }
    }

    pub fn add_snapshot(&mut self, snapshot: WorldSnapshot) {
        self.latest_sequence = self.latest_sequence.max(snapshot.sequence);
        self.history.push_back(snapshot);
        while self.history.len() > self.max_cached {
            self.history.pop_front();
        }
    }

    pub fn on_connect(&mut self, player: PeerId) {
        self.acks.entry(player).or_insert(None);
    }

    pub fn acknowledge(&mut self, player: PeerId, sequence: u32) -> AckOutcome {
        let latest_sequence = self.latest_sequence;
        let Some(stored) = self.acks.get_mut(&player) else {
            debug!("ack {} from unknown peer {}", sequence, player.0);
            return AckOutcome::UnknownPeer;
        };

        if sequence == 0 || sequence > latest_sequence {
            warn!(
                "peer {} acked sequence {} which was never sent, resending full state",
                player.0, sequence
            );
            *stored = None;
            self.recompute_retention();
            return AckOutcome::NeverSent;
        }

        // Plain comparison: a u32 sequence at 60 Hz lasts over two years.
        if let Some(current) = *stored {
            if sequence <= current {
                debug!("peer {} stale ack {} (have {})", player.0, sequence, current);
                return AckOutcome::Stale;
            }
        }
        *stored = Some(sequence);
        self.recompute_retention();
        AckOutcome::Advanced
    }

    pub fn on_disconnect(&mut self, player: PeerId) {
        if self.acks.remove(&player).is_some() {
            self.recompute_retention();
        }
    }

    /// The peer's last acked snapshot, or the empty snapshot when it has
    /// acked nothing or its ack has already left the history.
    pub fn get_baseline(&self, player: PeerId) -> &WorldSnapshot {
        match self.acks.get(&player).copied().flatten() {
            Some(sequence) => self.get(sequence).unwrap_or(&self.empty),
            None => &self.empty,
        }
    }

    pub fn last_acked(&self, player: PeerId) -> Option<u32> {
        self.acks.get(&player).copied().flatten()
    }

    pub fn get(&self, sequence: u32) -> Option<&WorldSnapshot> {
        self.history.iter().find(|s| s.sequence == sequence)
    }

    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.history.back()
    }

    pub fn retention_floor(&self) -> Option<u32> {
        self.acks.values().filter_map(|ack| *ack).min()
    }

    pub fn cached_sequences(&self) -> impl Iterator<Item = u32> + '_ {
        self.history.iter().map(|s| s.sequence)
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn peer_count(&self) -> usize {
        self.acks.len()
    }

    fn recompute_retention(&mut self) {
        let Some(floor) = self.retention_floor() else {
            return;
        };
        while self.history.front().is_some_and(|s| s.sequence < floor) {
            self.history.pop_front();
        }
    }
}
