use std::collections::HashMap;

use glam::Vec3;
use log::debug;

use skirmish::snapshot::{EntityId, WeaponKind};
use skirmish::{RpcCall, World};

pub const GRAVITY: f32 = 9.8;
pub const ARENA_HALF_EXTENT: f32 = 40.0;
pub const EXPLOSION_RADIUS: f32 = 4.0;
pub const GRENADE_DAMAGE: i32 = 60;
pub const ROCKET_DAMAGE: i32 = 80;
pub const PLAYER_RESPAWN_SECS: f32 = 3.0;
pub const SPAWNER_COOLDOWN_SECS: f32 = 2.0;
const ROCKET_MAX_RANGE: f32 = 150.0;

#[derive(Debug, Default)]
pub struct Arena {
    respawn_timers: HashMap<EntityId, f32>,
    spawned: u32,
}

impl Arena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn populate(world: &mut World) {
        let edge = ARENA_HALF_EXTENT * 0.75;
        for (i, (x, z)) in [(-edge, -edge), (edge, -edge), (-edge, edge), (edge, edge)]
            .into_iter()
            .enumerate()
        {
            world.spawn_spawner(Vec3::new(x, 1.0, z), Some((i % 2) as u8));
        }
        world.spawn_pickup(Vec3::new(0.0, 0.5, 0.0), WeaponKind::RocketLauncher);
        world.spawn_pickup(Vec3::new(8.0, 0.5, 0.0), WeaponKind::Shotgun);
        world.spawn_pickup(Vec3::new(-8.0, 0.5, 0.0), WeaponKind::Shotgun);
    }

    pub fn step(&mut self, world: &mut World, dt: f32) -> Vec<RpcCall> {
        let mut calls = Vec::new();
        move_players(world, dt);
        simulate_grenades(world, dt, &mut calls);
        simulate_rockets(world, dt, &mut calls);
        tick_pickups(world, dt);
        self.tick_respawns(world, dt);
        calls
    }

    fn tick_respawns(&mut self, world: &mut World, dt: f32) {
        for spawner in world.spawners_mut().iter_mut() {
            if !spawner.active {
                spawner.cooldown = (spawner.cooldown - dt).max(0.0);
                spawner.active = spawner.cooldown <= 0.0;
            }
        }

        let dead: Vec<EntityId> = world
            .players()
            .iter()
            .filter(|p| !p.is_alive())
            .map(|p| p.id)
            .collect();
        self.respawn_timers.retain(|id, _| dead.contains(id));

        let mut ready = Vec::new();
        for id in dead {
            let timer = self.respawn_timers.entry(id).or_insert(PLAYER_RESPAWN_SECS);
            *timer -= dt;
            if *timer <= 0.0 {
                ready.push(id);
            }
        }

        for id in ready {
            self.respawn_timers.remove(&id);
            self.spawned = self.spawned.wrapping_add(1);
            let position = world.spawn_point(self.spawned);
            if let Some(spawner) = world
                .spawners_mut()
                .iter_mut()
                .find(|s| s.active && s.position == position)
            {
                spawner.active = false;
                spawner.cooldown = SPAWNER_COOLDOWN_SECS;
            }
            if let Some(player) = world.players_mut().get_mut(id) {
                player.respawn(position);
                debug!("player {id} respawned");
            }
        }
    }
}

fn move_players(world: &mut World, dt: f32) {
    for player in world.players_mut().iter_mut() {
        if !player.is_alive() {
            continue;
        }
        player.position += player.velocity * dt;
        player.position.x = player.position.x.clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT);
        player.position.z = player.position.z.clamp(-ARENA_HALF_EXTENT, ARENA_HALF_EXTENT);
        player.position.y = player.position.y.max(0.0);
    }
}

fn simulate_grenades(world: &mut World, dt: f32, calls: &mut Vec<RpcCall>) {
    let mut detonated = Vec::new();
    for grenade in world.grenades_mut().iter_mut() {
        grenade.velocity.y -= GRAVITY * dt;
        grenade.position += grenade.velocity * dt;
        if grenade.position.y < 0.0 {
            grenade.position.y = 0.0;
            grenade.velocity = Vec3::ZERO;
        }
        grenade.fuse -= dt;
        if grenade.fuse <= 0.0 {
            detonated.push((grenade.id, grenade.owner, grenade.position));
        }
    }

    for (grenade_id, owner, position) in detonated {
        world.despawn(grenade_id);
        calls.push(RpcCall::GrenadeDetonated {
            grenade_id,
            position,
        });
        splash_damage(world, owner, position, GRENADE_DAMAGE, calls);
    }
}

fn simulate_rockets(world: &mut World, dt: f32, calls: &mut Vec<RpcCall>) {
    let mut exploded = Vec::new();
    for rocket in world.rockets().iter() {
        let next = rocket.position + rocket.velocity * dt;
        let hit_player = world.players().iter().any(|p| {
            p.id != rocket.owner && p.is_alive() && p.position.distance(next) <= 1.0
        });
        let out_of_bounds = next.y <= 0.0 || next.length() > ROCKET_MAX_RANGE;
        if hit_player || out_of_bounds {
            exploded.push((rocket.id, rocket.owner, next.with_y(next.y.max(0.0))));
        }
    }

    for rocket in world.rockets_mut().iter_mut() {
        rocket.position += rocket.velocity * dt;
    }

    for (rocket_id, owner, position) in exploded {
        world.despawn(rocket_id);
        splash_damage(world, owner, position, ROCKET_DAMAGE, calls);
    }
}

/// Linear falloff from `damage` at the centre to nothing at the edge.
fn splash_damage(
    world: &mut World,
    owner: EntityId,
    centre: Vec3,
    damage: i32,
    calls: &mut Vec<RpcCall>,
) {
    for player in world.players_mut().iter_mut() {
        let distance = player.position.distance(centre);
        if !player.is_alive() || distance > EXPLOSION_RADIUS {
            continue;
        }
        let dealt = (damage as f32 * (1.0 - distance / EXPLOSION_RADIUS)).ceil() as i32;
        if dealt <= 0 {
            continue;
        }
        player.take_damage(dealt);
        calls.push(RpcCall::HitConfirmed {
            shooter: owner,
            target: player.id,
            damage: dealt,
        });
    }
}

fn tick_pickups(world: &mut World, dt: f32) {
    for pickup in world.pickups_mut().iter_mut() {
        if pickup.available {
            continue;
        }
        pickup.respawn_timer -= dt;
        if pickup.respawn_timer <= 0.0 {
            pickup.respawn_timer = 0.0;
            pickup.available = true;
        }
    }
}
