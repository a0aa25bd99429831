use super::world::WorldSnapshot;

pub const DEFAULT_BUFFER_SIZE: usize = 64;

#[derive(Debug)]
pub struct SnapshotBuffer {
    snapshots: Vec<Option<WorldSnapshot>>,
    capacity: usize,
    empty: WorldSnapshot,
}

impl Default for SnapshotBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl SnapshotBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            snapshots: (0..capacity).map(|_| None).collect(),
            capacity,
            empty: WorldSnapshot::empty(),
        }
    }

    pub fn push(&mut self, snapshot: WorldSnapshot) {
        let index = self.slot(snapshot.sequence);
        self.snapshots[index] = Some(snapshot);
    }

    /// Sequence 0 always resolves to the empty world.
    pub fn get(&self, sequence: u32) -> Option<&WorldSnapshot> {
        if sequence == 0 {
            return Some(&self.empty);
        }
        self.snapshots[self.slot(sequence)]
            .as_ref()
            .filter(|s| s.sequence == sequence)
    }

    pub fn latest(&self) -> Option<&WorldSnapshot> {
        self.snapshots
            .iter()
            .filter_map(|s| s.as_ref())
            .max_by_key(|s| s.sequence)
    }

    pub fn latest_sequence(&self) -> u32 {
        self.latest().map_or(0, |s| s.sequence)
    }

    pub fn clear(&mut self) {
        for slot in &mut self.snapshots {
            *slot = None;
        }
    }

    pub fn len(&self) -> usize {
        self.snapshots.iter().filter(|s| s.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, sequence: u32) -> usize {
        (sequence as usize) % self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(sequence: u32) -> WorldSnapshot {
        WorldSnapshot {
            sequence,
            ..WorldSnapshot::empty()
        }
    }

    #[test]
    fn o1_lookup() {
        let mut buffer = SnapshotBuffer::new(64);
        for sequence in 1..100 {
            buffer.push(at(sequence));
        }

        assert_eq!(buffer.get(50).unwrap().sequence, 50);
        assert!(buffer.get(30).is_none());
        assert_eq!(buffer.latest_sequence(), 99);
    }

    #[test]
    fn zero_is_empty_baseline() {
        let buffer = SnapshotBuffer::new(8);
        assert!(buffer.is_empty());
        assert_eq!(buffer.get(0).unwrap().entity_count(), 0);
        assert_eq!(buffer.latest_sequence(), 0);
    }
}
