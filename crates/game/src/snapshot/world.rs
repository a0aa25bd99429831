use std::collections::BTreeMap;

use glam::Vec3;

use super::entity::{Grenade, Player, Rocket, Spawner, WeaponKind, WeaponPickup};
use super::schema::{EntityId, EntityKind, Replicated};

#[derive(Debug, Clone, PartialEq)]
pub struct EntityTable<E> {
    entities: BTreeMap<EntityId, E>,
}

impl<E> Default for EntityTable<E> {
    fn default() -> Self {
        Self {
            entities: BTreeMap::new(),
        }
    }
}

impl<E: Replicated> EntityTable<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, entity: E) -> Option<E> {
        self.entities.insert(entity.id(), entity)
    }

    pub fn remove(&mut self, id: EntityId) -> Option<E> {
        self.entities.remove(&id)
    }

    pub fn get(&self, id: EntityId) -> Option<&E> {
        self.entities.get(&id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut E> {
        self.entities.get_mut(&id)
    }

    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &E> {
        self.entities.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.entities.values_mut()
    }

    pub fn ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys().copied()
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&E) -> bool) {
        self.entities.retain(|_, e| keep(e));
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl<E: Replicated> FromIterator<E> for EntityTable<E> {
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut table = Self::new();
        for entity in iter {
            table.insert(entity);
        }
        table
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorldSnapshot {
    pub sequence: u32,
    pub players: EntityTable<Player>,
    pub pickups: EntityTable<WeaponPickup>,
    pub grenades: EntityTable<Grenade>,
    pub rockets: EntityTable<Rocket>,
    pub spawners: EntityTable<Spawner>,
}

impl WorldSnapshot {
    /// Sequence 0 with no entities: the baseline for a client that has
    /// acknowledged nothing yet.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn entity_count(&self) -> usize {
        self.players.len()
            + self.pickups.len()
            + self.grenades.len()
            + self.rockets.len()
            + self.spawners.len()
    }

    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        if self.players.contains(id) {
            Some(EntityKind::Player)
        } else if self.pickups.contains(id) {
            Some(EntityKind::WeaponPickup)
        } else if self.grenades.contains(id) {
            Some(EntityKind::Grenade)
        } else if self.rockets.contains(id) {
            Some(EntityKind::Rocket)
        } else if self.spawners.contains(id) {
            Some(EntityKind::Spawner)
        } else {
            None
        }
    }

    pub fn same_entities(&self, other: &WorldSnapshot) -> bool {
        self.players == other.players
            && self.pickups == other.pickups
            && self.grenades == other.grenades
            && self.rockets == other.rockets
            && self.spawners == other.spawners
    }
}

#[derive(Debug)]
pub struct World {
    state: WorldSnapshot,
    next_entity_id: EntityId,
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}

impl World {
    pub fn new() -> Self {
        Self {
            state: WorldSnapshot::empty(),
            next_entity_id: 1,
        }
    }

    pub fn sequence(&self) -> u32 {
        self.state.sequence
    }

    pub fn advance_sequence(&mut self) -> u32 {
        self.state.sequence += 1;
        self.state.sequence
    }

    pub fn state(&self) -> &WorldSnapshot {
        &self.state
    }

    pub fn snapshot(&self) -> WorldSnapshot {
        self.state.clone()
    }

    pub fn players(&self) -> &EntityTable<Player> {
        &self.state.players
    }

    pub fn players_mut(&mut self) -> &mut EntityTable<Player> {
        &mut self.state.players
    }

    pub fn pickups(&self) -> &EntityTable<WeaponPickup> {
        &self.state.pickups
    }

    pub fn grenades(&self) -> &EntityTable<Grenade> {
        &self.state.grenades
    }

    pub fn rockets(&self) -> &EntityTable<Rocket> {
        &self.state.rockets
    }

    pub fn spawners(&self) -> &EntityTable<Spawner> {
        &self.state.spawners
    }

    pub fn pickups_mut(&mut self) -> &mut EntityTable<WeaponPickup> {
        &mut self.state.pickups
    }

    pub fn grenades_mut(&mut self) -> &mut EntityTable<Grenade> {
        &mut self.state.grenades
    }

    pub fn rockets_mut(&mut self) -> &mut EntityTable<Rocket> {
        &mut self.state.rockets
    }

    pub fn spawners_mut(&mut self) -> &mut EntityTable<Spawner> {
        &mut self.state.spawners
    }

    pub fn spawn_player(&mut self, name: impl Into<String>, position: Vec3) -> EntityId {
        let id = self.allocate_id();
        self.state.players.insert(Player::new(id, name, position));
        id
    }

    pub fn spawn_pickup(&mut self, position: Vec3, weapon: WeaponKind) -> EntityId {
        let id = self.allocate_id();
        self.state
            .pickups
            .insert(WeaponPickup::new(id, position, weapon));
        id
    }

    pub fn spawn_grenade(&mut self, owner: EntityId, position: Vec3, velocity: Vec3) -> EntityId {
        let id = self.allocate_id();
        self.state
            .grenades
            .insert(Grenade::new(id, owner, position, velocity));
        id
    }

    pub fn spawn_rocket(&mut self, owner: EntityId, position: Vec3, velocity: Vec3) -> EntityId {
        let id = self.allocate_id();
        self.state.rockets.insert(Rocket {
            id,
            owner,
            position,
            velocity,
        });
        id
    }

    pub fn spawn_spawner(&mut self, position: Vec3, team: Option<u8>) -> EntityId {
        let id = self.allocate_id();
        self.state.spawners.insert(Spawner {
            id,
            position,
            team,
            cooldown: 0.0,
            active: true,
        });
        id
    }

    /// Position of an active spawner chosen by `salt`, or just above the
    /// origin when there is none.
    pub fn spawn_point(&self, salt: u32) -> Vec3 {
        let active: Vec<&Spawner> = self.state.spawners.iter().filter(|s| s.active).collect();
        match active.len() {
            0 => Vec3::new(0.0, 1.0, 0.0),
            n => active[salt as usize % n].position,
        }
    }

    pub fn despawn(&mut self, id: EntityId) -> Option<EntityKind> {
        let kind = self.state.kind_of(id)?;
        match kind {
            EntityKind::Player => {
                self.state.players.remove(id);
            }
            EntityKind::WeaponPickup => {
                self.state.pickups.remove(id);
            }
            EntityKind::Grenade => {
                self.state.grenades.remove(id);
            }
            EntityKind::Rocket => {
                self.state.rockets.remove(id);
            }
            EntityKind::Spawner => {
                self.state.spawners.remove(id);
            }
        }
        Some(kind)
    }

    pub fn entity_count(&self) -> usize {
        self.state.entity_count()
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = self.next_entity_id;
        self.next_entity_id += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_never_reused() {
        let mut world = World::new();
        let a = world.spawn_player("a", Vec3::ZERO);
        let b = world.spawn_grenade(a, Vec3::ZERO, Vec3::X);
        assert_eq!(world.despawn(b), Some(EntityKind::Grenade));
        let c = world.spawn_pickup(Vec3::ONE, WeaponKind::Rifle);

        assert_eq!((a, b, c), (1, 2, 3));
        assert_eq!(world.entity_count(), 2);
        assert_eq!(world.despawn(b), None);
    }

    #[test]
    fn snapshot_is_independent_copy() {
        let mut world = World::new();
        let id = world.spawn_player("a", Vec3::ZERO);
        world.advance_sequence();
        let snapshot = world.snapshot();

        world.players_mut().get_mut(id).unwrap().position = Vec3::X;
        world.advance_sequence();

        assert_eq!(snapshot.sequence, 1);
        assert_eq!(snapshot.players.get(id).unwrap().position, Vec3::ZERO);
        assert_eq!(world.sequence(), 2);
    }

    #[test]
    fn empty_snapshot() {
        let empty = WorldSnapshot::empty();
        assert_eq!(empty.sequence, 0);
        assert_eq!(empty.entity_count(), 0);
    }
}
