use std::collections::{BTreeMap, VecDeque};

use glam::Vec3;
use log::{debug, info, warn};

use crate::net::{
    Message, PeerId, ProtocolError, RttEstimator, SendTimes, StateSync, Transport,
    TransportEvent,
};
use crate::rpc::{Dispatch, ExecutionSide, RpcCall, RpcDispatcher};
use crate::simulation::LagCompensator;
use crate::snapshot::{
    AckCache, AckOutcome, DiffSet, EntityId, EntityTable, Player, PlayerFlags, WeaponKind,
    WeaponPickup, World, PLAYER_START_AMMO,
};

use super::config::ServerConfig;
use super::events::{DisconnectReason, ServerEvent};

pub const PLAYER_HIT_RADIUS: f32 = 0.6;
pub const HITSCAN_RANGE: f32 = 200.0;
pub const PICKUP_RADIUS: f32 = 2.5;
pub const MAX_MOVE_SPEED: f32 = 12.0;
pub const MAX_THROW_SPEED: f32 = 25.0;
pub const ROCKET_SPEED: f32 = 30.0;
/// How far from the thrower a grenade may appear.
const MAX_THROW_OFFSET: f32 = 3.0;

#[derive(Debug, Default)]
struct PeerState {
    entity_id: EntityId,
    rtt: RttEstimator,
    send_times: SendTimes,
}

#[derive(Debug, Clone)]
pub struct ServerStats {
    pub sequence: u32,
    pub client_count: usize,
    pub max_clients: usize,
    pub entity_count: usize,
    pub cached_snapshots: usize,
    pub retention_floor: Option<u32>,
}

pub struct ServerSession<T: Transport> {
    transport: T,
    config: ServerConfig,
    dispatcher: RpcDispatcher,
    world: World,
    ack_cache: AckCache,
    lag: LagCompensator,
    peers: BTreeMap<PeerId, PeerState>,
    pending_events: VecDeque<ServerEvent>,
    now: f64,
}

impl<T: Transport> ServerSession<T> {
    pub fn new(transport: T, config: ServerConfig) -> Self {
        Self::with_world(transport, config, World::new())
    }

    pub fn with_world(transport: T, config: ServerConfig, world: World) -> Self {
        Self {
            transport,
            dispatcher: RpcDispatcher::new(ExecutionSide::Server),
            world,
            ack_cache: AckCache::new(config.max_cached_snapshots),
            lag: LagCompensator::new(config.lag_window_secs),
            peers: BTreeMap::new(),
            pending_events: VecDeque::new(),
            now: 0.0,
            config,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn ack_cache(&self) -> &AckCache {
        &self.ack_cache
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn peers(&self) -> impl Iterator<Item = PeerId> + '_ {
        self.peers.keys().copied()
    }

    pub fn entity_of(&self, peer: PeerId) -> Option<EntityId> {
        self.peers.get(&peer).map(|p| p.entity_id)
    }

    pub fn rtt_ms(&self, peer: PeerId) -> Option<f32> {
        self.peers.get(&peer).map(|p| p.rtt.srtt_ms())
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ServerEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn stats(&self) -> ServerStats {
        ServerStats {
            sequence: self.world.sequence(),
            client_count: self.peers.len(),
            max_clients: self.config.max_clients,
            entity_count: self.world.entity_count(),
            cached_snapshots: self.ack_cache.len(),
            retention_floor: self.ack_cache.retention_floor(),
        }
    }

    /// One server tick: drain the network, run `simulate`, then snapshot and
    /// replicate. Calls returned by `simulate` are broadcast to every peer.
    pub fn tick<F>(&mut self, now: f64, simulate: F)
    where
        F: FnOnce(&mut World, f32) -> Vec<RpcCall>,
    {
        self.now = now;
        for player in self.world.players_mut().iter_mut() {
            player.flags.remove(PlayerFlags::FIRING);
        }

        self.process_network();

        let dt = 1.0 / self.config.tick_rate.max(1) as f32;
        for call in simulate(&mut self.world, dt) {
            self.broadcast(call);
        }

        let sequence = self.world.advance_sequence();
        self.lag.record_tick(now, self.world.players());
        self.ack_cache.add_snapshot(self.world.snapshot());
        self.send_state(sequence);
    }

    pub fn call(&mut self, peer: PeerId, call: RpcCall) {
        match self.dispatcher.dispatch(call) {
            Dispatch::Local(call) => self.handle_rpc(peer, call),
            Dispatch::Remote { channel, payload } => {
                if let Err(err) = self.transport.send(peer, channel, payload) {
                    warn!("send to peer {} failed: {err}", peer.0);
                }
            }
        }
    }

    pub fn broadcast(&mut self, call: RpcCall) {
        let peers: Vec<PeerId> = self.peers.keys().copied().collect();
        for peer in peers {
            self.call(peer, call.clone());
        }
    }

    pub fn kick(&mut self, peer: PeerId) {
        self.transport.disconnect(peer);
        self.handle_disconnect(peer, DisconnectReason::Kicked);
    }

    fn process_network(&mut self) {
        for event in self.transport.poll() {
            match event {
                TransportEvent::Connected(peer) => self.handle_connect(peer),
                TransportEvent::Disconnected(peer) => {
                    self.handle_disconnect(peer, DisconnectReason::Graceful)
                }
                TransportEvent::Message { peer, payload, .. } => {
                    self.handle_message(peer, &payload)
                }
            }
        }
    }

    fn handle_message(&mut self, peer: PeerId, payload: &[u8]) {
        if !self.peers.contains_key(&peer) {
            debug!("discarding message from unknown peer {}", peer.0);
            return;
        }

        match self.dispatcher.receive(payload) {
            Ok(Message::Rpc(call)) => self.handle_rpc(peer, call),
            Ok(Message::StateSync(_)) => {
                self.drop_for_violation(peer, ProtocolError::UnexpectedStateSync)
            }
            Err(err) => self.drop_for_violation(peer, err),
        }
    }

    fn drop_for_violation(&mut self, peer: PeerId, err: ProtocolError) {
        warn!("dropping peer {}: {err}", peer.0);
        self.transport.disconnect(peer);
        self.handle_disconnect(peer, DisconnectReason::ProtocolViolation(err));
    }

    fn handle_connect(&mut self, peer: PeerId) {
        if self.peers.contains_key(&peer) {
            return;
        }
        if self.peers.len() >= self.config.max_clients {
            info!("denying peer {}: server full", peer.0);
            self.transport.disconnect(peer);
            self.pending_events
                .push_back(ServerEvent::ConnectionDenied { peer });
            return;
        }

        let spawn = self.world.spawn_point(peer.0);
        let entity_id = self.world.spawn_player(format!("player-{}", peer.0), spawn);
        self.ack_cache.on_connect(peer);
        self.peers.insert(
            peer,
            PeerState {
                entity_id,
                ..Default::default()
            },
        );

        info!("peer {} connected as entity {entity_id}", peer.0);
        self.pending_events
            .push_back(ServerEvent::ClientConnected { peer, entity_id });
        self.call(peer, RpcCall::AssignPlayer { entity_id });
    }

    fn handle_disconnect(&mut self, peer: PeerId, reason: DisconnectReason) {
        let Some(state) = self.peers.remove(&peer) else {
            return;
        };

        self.ack_cache.on_disconnect(peer);
        self.world.despawn(state.entity_id);
        self.lag.forget(state.entity_id);

        info!("peer {} {}", peer.0, reason.as_str());
        self.pending_events
            .push_back(ServerEvent::ClientDisconnected { peer, reason });
    }

    fn handle_rpc(&mut self, peer: PeerId, call: RpcCall) {
        let Some(entity_id) = self.entity_of(peer) else {
            return;
        };

        match call {
            RpcCall::AcknowledgeState { sequence } => self.handle_ack(peer, sequence),
            RpcCall::PlayerInput { velocity, look } => {
                if !velocity.is_finite() || !look.is_finite() {
                    return;
                }
                if let Some(player) = self.world.players_mut().get_mut(entity_id) {
                    if player.is_alive() {
                        player.velocity = velocity.clamp_length_max(MAX_MOVE_SPEED);
                        player.look = look;
                    }
                }
            }
            RpcCall::FireWeapon { origin, direction } => {
                self.handle_fire(peer, entity_id, origin, direction)
            }
            RpcCall::ThrowGrenade { origin, velocity } => {
                self.handle_throw(entity_id, origin, velocity)
            }
            RpcCall::PickupWeapon { pickup_id } => self.handle_pickup(peer, entity_id, pickup_id),
            RpcCall::SendChat { text } => self.handle_chat(entity_id, &text),
            RpcCall::Ping { client_time } => self.call(peer, RpcCall::Pong { client_time }),
            other => debug!("{} is not handled by the server", other.name()),
        }
    }

    fn handle_ack(&mut self, peer: PeerId, sequence: u32) {
        if self.ack_cache.acknowledge(peer, sequence) != AckOutcome::Advanced {
            return;
        }
        if let Some(state) = self.peers.get_mut(&peer) {
            if let Some(sent_at) = state.send_times.take(sequence) {
                state.rtt.sample(((self.now - sent_at) * 1000.0) as f32);
            }
        }
    }

    fn handle_fire(&mut self, peer: PeerId, shooter: EntityId, origin: Vec3, direction: Vec3) {
        let Some(direction) = direction.try_normalize() else {
            return;
        };
        if !origin.is_finite() {
            return;
        }

        let weapon = {
            let Some(player) = self.world.players_mut().get_mut(shooter) else {
                return;
            };
            if !player.is_alive() || player.ammo == 0 {
                return;
            }
            player.ammo -= 1;
            player.flags.insert(PlayerFlags::FIRING);
            player.held_weapon.unwrap_or(WeaponKind::Pistol)
        };

        if weapon == WeaponKind::RocketLauncher {
            self.world
                .spawn_rocket(shooter, origin, direction * ROCKET_SPEED);
            return;
        }

        // The shooter's view is one trip old and the shot took another.
        let rtt = self
            .peers
            .get(&peer)
            .map_or(0.0, |p| f64::from(p.rtt.srtt_secs()));
        if let Err(err) = self
            .lag
            .rewind(self.now, self.now - rtt, self.world.players_mut())
        {
            warn!("hitscan from entity {shooter} skipped: {err}");
            return;
        }
        let hit = raycast_players(self.world.players(), shooter, origin, direction);
        if let Err(err) = self.lag.unrewind(self.world.players_mut()) {
            warn!("unrewind failed: {err}");
        }

        let Some(target) = hit else {
            return;
        };
        let damage = weapon.damage();
        if let Some(player) = self.world.players_mut().get_mut(target) {
            if player.take_damage(damage) {
                info!("entity {target} killed by entity {shooter}");
            }
        }

        self.pending_events.push_back(ServerEvent::PlayerHit {
            shooter,
            target,
            damage,
        });
        let confirm = RpcCall::HitConfirmed {
            shooter,
            target,
            damage,
        };
        if let Some(target_peer) = self.peer_of(target).filter(|p| *p != peer) {
            self.call(target_peer, confirm.clone());
        }
        self.call(peer, confirm);
    }

    fn handle_throw(&mut self, owner: EntityId, origin: Vec3, velocity: Vec3) {
        if !origin.is_finite() || !velocity.is_finite() {
            return;
        }
        let origin = {
            let Some(player) = self.world.players_mut().get_mut(owner) else {
                return;
            };
            if !player.is_alive() || player.grenades == 0 {
                return;
            }
            player.grenades -= 1;
            if origin.distance(player.position) > MAX_THROW_OFFSET {
                player.position
            } else {
                origin
            }
        };
        let id = self
            .world
            .spawn_grenade(owner, origin, velocity.clamp_length_max(MAX_THROW_SPEED));
        debug!("entity {owner} threw grenade {id}");
    }

    fn handle_pickup(&mut self, peer: PeerId, entity_id: EntityId, pickup_id: EntityId) {
        let position = match self.world.players().get(entity_id) {
            Some(player) if player.is_alive() => player.position,
            _ => return,
        };

        let weapon = self
            .world
            .pickups_mut()
            .get_mut(pickup_id)
            .filter(|p| p.available && p.position.distance(position) <= PICKUP_RADIUS)
            .map(|pickup| {
                pickup.available = false;
                pickup.respawn_timer = WeaponPickup::RESPAWN_SECS;
                pickup.weapon
            });

        if let Some(weapon) = weapon {
            if let Some(player) = self.world.players_mut().get_mut(entity_id) {
                player.held_weapon = Some(weapon);
                player.ammo = PLAYER_START_AMMO;
            }
        }

        self.call(
            peer,
            RpcCall::PickupResult {
                pickup_id,
                weapon,
                granted: weapon.is_some(),
            },
        );
    }

    fn handle_chat(&mut self, sender: EntityId, text: &str) {
        let text: String = text.trim().chars().take(self.config.max_chat_len).collect();
        if text.is_empty() {
            return;
        }
        self.pending_events.push_back(ServerEvent::Chat {
            sender,
            text: text.clone(),
        });
        self.broadcast(RpcCall::ChatMessage {
            sender: Some(sender),
            text,
        });
    }

    fn peer_of(&self, entity_id: EntityId) -> Option<PeerId> {
        self.peers
            .iter()
            .find(|(_, state)| state.entity_id == entity_id)
            .map(|(peer, _)| *peer)
    }

    fn send_state(&mut self, sequence: u32) {
        let Some(latest) = self.ack_cache.latest() else {
            return;
        };

        let outgoing: Vec<(PeerId, Vec<u8>)> = self
            .peers
            .keys()
            .map(|&peer| {
                let baseline = self.ack_cache.get_baseline(peer);
                let sync = StateSync {
                    sequence: latest.sequence,
                    baseline: baseline.sequence,
                    diff: DiffSet::compute(baseline, latest),
                };
                (peer, Message::StateSync(sync).encode())
            })
            .collect();

        for (peer, payload) in outgoing {
            let channel = StateSync::channel_for(payload.len());
            match self.transport.send(peer, channel, payload) {
                Ok(()) => {
                    if let Some(state) = self.peers.get_mut(&peer) {
                        state.send_times.track(sequence, self.now);
                    }
                }
                // The next tick diffs against the same baseline again.
                Err(err) => warn!("state sync {sequence} to peer {} failed: {err}", peer.0),
            }
        }
    }
}

/// Nearest living player, other than `shooter`, hit by the ray.
pub fn raycast_players(
    players: &EntityTable<Player>,
    shooter: EntityId,
    origin: Vec3,
    direction: Vec3,
) -> Option<EntityId> {
    players
        .iter()
        .filter(|p| p.id != shooter && p.is_alive())
        .filter_map(|p| {
            ray_sphere(origin, direction, p.position, PLAYER_HIT_RADIUS).map(|t| (t, p.id))
        })
        .filter(|(t, _)| *t <= HITSCAN_RANGE)
        .min_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, id)| id)
}

fn ray_sphere(origin: Vec3, direction: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let to_center = center - origin;
    let along = to_center.dot(direction);
    let closest_sq = to_center.length_squared() - along * along;
    let radius_sq = radius * radius;
    if closest_sq > radius_sq {
        return None;
    }
    let half_chord = (radius_sq - closest_sq).sqrt();
    let near = along - half_chord;
    let t = if near >= 0.0 { near } else { along + half_chord };
    (t >= 0.0).then_some(t)
}
