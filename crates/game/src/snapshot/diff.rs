use log::warn;

use crate::net::codec::{CodecError, WireReader, WireWriter};

use super::entity::{Grenade, Player, Rocket, Spawner, WeaponPickup};
use super::schema::{
    compute_change_mask, copy_masked, decode_full, deserialize_masked, encode_full,
    serialize_masked, ChangeMask, EntityId, Replicated,
};
use super::world::{EntityTable, WorldSnapshot};

/// An entity present in both snapshots. `entity` holds current values for
/// every masked field; unmasked fields are meaningless on the decode side.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate<E> {
    pub id: EntityId,
    pub mask: ChangeMask,
    pub entity: E,
}

#[derive(Debug, Clone, PartialEq)]
pub struct KindDiff<E> {
    pub removed: Vec<EntityId>,
    pub added: Vec<E>,
    pub updated: Vec<EntityUpdate<E>>,
}

impl<E> Default for KindDiff<E> {
    fn default() -> Self {
        Self {
            removed: Vec::new(),
            added: Vec::new(),
            updated: Vec::new(),
        }
    }
}

impl<E: Replicated> KindDiff<E> {
    /// Matches entities by ID only. Unchanged entities still produce a
    /// zero-mask update.
    pub fn compute(old: &EntityTable<E>, new: &EntityTable<E>) -> Self {
        let removed = old.ids().filter(|id| !new.contains(*id)).collect();

        let mut added = Vec::new();
        let mut updated = Vec::new();
        for entity in new.iter() {
            match old.get(entity.id()) {
                Some(previous) => updated.push(EntityUpdate {
                    id: entity.id(),
                    mask: compute_change_mask(previous, entity),
                    entity: entity.clone(),
                }),
                None => added.push(entity.clone()),
            }
        }

        Self {
            removed,
            added,
            updated,
        }
    }

    /// Removals, then additions, then updates. Safe to repeat.
    pub fn apply(&self, table: &mut EntityTable<E>) {
        for id in &self.removed {
            table.remove(*id);
        }
        for entity in &self.added {
            table.insert(entity.clone());
        }
        for update in &self.updated {
            let Some(target) = table.get_mut(update.id) else {
                warn!(
                    "update for unknown {} {} ignored",
                    E::KIND.name(),
                    update.id
                );
                continue;
            };
            if let Err(e) = copy_masked(target, &update.entity, update.mask) {
                warn!("failed to apply {} {} update: {}", E::KIND.name(), update.id, e);
            }
        }
    }

    pub fn changed_count(&self) -> usize {
        self.removed.len()
            + self.added.len()
            + self.updated.iter().filter(|u| !u.mask.is_empty()).count()
    }

    pub fn encode(&self, w: &mut WireWriter) {
        w.write(&self.removed);

        w.write(&(self.added.len() as u32));
        for entity in &self.added {
            encode_full(w, entity);
        }

        w.write(&(self.updated.len() as u32));
        for update in &self.updated {
            w.write(&update.id);
            w.write(&update.mask);
            serialize_masked(w, &update.entity, update.mask);
        }
    }

    pub fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        let removed = r.read()?;

        let added_count = read_count(r)?;
        let mut added = Vec::with_capacity(added_count);
        for _ in 0..added_count {
            added.push(decode_full(r)?);
        }

        let updated_count = read_count(r)?;
        let mut updated = Vec::with_capacity(updated_count);
        for _ in 0..updated_count {
            let id = r.read()?;
            let mask: ChangeMask = r.read()?;
            let mut entity = E::blank(id);
            deserialize_masked(r, &mut entity, mask)?;
            updated.push(EntityUpdate { id, mask, entity });
        }

        Ok(Self {
            removed,
            added,
            updated,
        })
    }
}

fn read_count(r: &mut WireReader<'_>) -> Result<usize, CodecError> {
    let count = r.read::<u32>()? as usize;
    // Every entry carries at least a four-byte ID.
    if count.saturating_mul(4) > r.remaining() {
        return Err(CodecError::TruncatedInput {
            needed: count.saturating_mul(4),
            remaining: r.remaining(),
        });
    }
    Ok(count)
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DiffSet {
    pub players: KindDiff<Player>,
    pub pickups: KindDiff<WeaponPickup>,
    pub grenades: KindDiff<Grenade>,
    pub rockets: KindDiff<Rocket>,
    pub spawners: KindDiff<Spawner>,
}

impl DiffSet {
    pub fn compute(old: &WorldSnapshot, new: &WorldSnapshot) -> Self {
        Self {
            players: KindDiff::compute(&old.players, &new.players),
            pickups: KindDiff::compute(&old.pickups, &new.pickups),
            grenades: KindDiff::compute(&old.grenades, &new.grenades),
            rockets: KindDiff::compute(&old.rockets, &new.rockets),
            spawners: KindDiff::compute(&old.spawners, &new.spawners),
        }
    }

    pub fn apply(&self, world: &mut WorldSnapshot) {
        self.players.apply(&mut world.players);
        self.pickups.apply(&mut world.pickups);
        self.grenades.apply(&mut world.grenades);
        self.rockets.apply(&mut world.rockets);
        self.spawners.apply(&mut world.spawners);
    }

    pub fn changed_count(&self) -> usize {
        self.players.changed_count()
            + self.pickups.changed_count()
            + self.grenades.changed_count()
            + self.rockets.changed_count()
            + self.spawners.changed_count()
    }

    pub fn encode(&self, w: &mut WireWriter) {
        self.players.encode(w);
        self.pickups.encode(w);
        self.grenades.encode(w);
        self.rockets.encode(w);
        self.spawners.encode(w);
    }

    pub fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self {
            players: KindDiff::decode(r)?,
            pickups: KindDiff::decode(r)?,
            grenades: KindDiff::decode(r)?,
            rockets: KindDiff::decode(r)?,
            spawners: KindDiff::decode(r)?,
        })
    }
}

pub fn diff(old: &WorldSnapshot, new: &WorldSnapshot) -> DiffSet {
    DiffSet::compute(old, new)
}

pub fn apply(world: &mut WorldSnapshot, diff: &DiffSet) {
    diff.apply(world);
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::snapshot::entity::WeaponKind;
    use crate::snapshot::world::World;

    fn populated() -> World {
        let mut world = World::new();
        world.spawn_player("a", Vec3::new(0.0, 1.0, 0.0));
        world.spawn_player("b", Vec3::new(5.0, 1.0, 0.0));
        world.spawn_pickup(Vec3::new(2.0, 0.0, 2.0), WeaponKind::Shotgun);
        world.spawn_spawner(Vec3::ZERO, None);
        world.advance_sequence();
        world
    }

    fn wire_roundtrip(diff: &DiffSet) -> DiffSet {
        let mut w = WireWriter::new();
        diff.encode(&mut w);
        let mut r = WireReader::new(w.as_slice());
        let decoded = DiffSet::decode(&mut r).unwrap();
        r.finish().unwrap();
        decoded
    }

    #[test]
    fn new_client_gets_everything_as_added() {
        let mut world = World::new();
        for name in ["a", "b", "c"] {
            world.spawn_player(name, Vec3::ZERO);
        }
        world.advance_sequence();

        let diff = diff(&WorldSnapshot::empty(), world.state());
        assert_eq!(diff.players.added.len(), 3);
        assert!(diff.players.removed.is_empty());
        assert!(diff.players.updated.is_empty());
    }

    #[test]
    fn delta_roundtrip_reproduces_new_state() {
        let mut world = populated();
        let old = world.snapshot();

        let ids: Vec<_> = world.players().ids().collect();
        world.players_mut().get_mut(ids[0]).unwrap().position = Vec3::new(1.0, 1.0, 0.0);
        world.players_mut().get_mut(ids[1]).unwrap().held_weapon = None;
        world.despawn(ids[1]);
        world.spawn_grenade(ids[0], Vec3::ONE, Vec3::Y);
        world.advance_sequence();
        let new = world.snapshot();

        let diff = wire_roundtrip(&diff(&old, &new));
        let mut copy = old.clone();
        apply(&mut copy, &diff);

        assert!(copy.same_entities(&new));
    }

    #[test]
    fn apply_is_idempotent() {
        let mut world = populated();
        let old = world.snapshot();
        for player in world.players_mut().iter_mut() {
            player.ammo -= 5;
        }
        let pickup = world.state().pickups.ids().next().unwrap();
        world.despawn(pickup);
        world.spawn_rocket(1, Vec3::ZERO, Vec3::Z);
        world.advance_sequence();

        let diff = wire_roundtrip(&diff(&old, world.state()));
        let mut once = old.clone();
        apply(&mut once, &diff);
        let mut twice = old.clone();
        apply(&mut twice, &diff);
        apply(&mut twice, &diff);

        assert_eq!(once, twice);
    }

    #[test]
    fn unchanged_entity_is_explicit_zero_mask_update() {
        let world = populated();
        let diff = diff(world.state(), world.state());

        assert_eq!(diff.players.updated.len(), 2);
        assert!(diff.players.updated.iter().all(|u| u.mask.is_empty()));
        assert_eq!(diff.changed_count(), 0);

        let decoded = wire_roundtrip(&diff);
        assert_eq!(decoded.players.updated.len(), 2);
    }

    #[test]
    fn removed_carries_only_id() {
        let mut world = populated();
        let old = world.snapshot();
        let id = world.players().ids().next().unwrap();
        world.despawn(id);

        let diff = diff(&old, world.state());
        assert_eq!(diff.players.removed, vec![id]);

        let mut w = WireWriter::new();
        diff.players.encode(&mut w);
        // removed count + id, added count, updated count + (id, mask, no fields)
        assert_eq!(w.len(), 4 + 4 + 4 + 4 + 4 + 4);
    }

    #[test]
    fn truncated_diff_fails_without_partial_state() {
        let world = populated();
        let diff = diff(&WorldSnapshot::empty(), world.state());
        let mut w = WireWriter::new();
        diff.encode(&mut w);
        let bytes = w.into_bytes();

        let mut r = WireReader::new(&bytes[..bytes.len() - 3]);
        assert!(matches!(
            DiffSet::decode(&mut r),
            Err(CodecError::TruncatedInput { .. })
        ));
    }

    #[test]
    fn update_only_sends_masked_fields() {
        let mut world = populated();
        let old = world.snapshot();
        let id = world.players().ids().next().unwrap();
        world.players_mut().get_mut(id).unwrap().health = 10;

        let diff = diff(&old, world.state());
        let update = diff.players.updated.iter().find(|u| u.id == id).unwrap();
        assert_eq!(update.mask.count(), 1);

        let decoded = wire_roundtrip(&diff);
        let update = decoded.players.updated.iter().find(|u| u.id == id).unwrap();
        assert_eq!(update.entity.health, 10);
        assert!(update.entity.name.is_empty());
    }
}
