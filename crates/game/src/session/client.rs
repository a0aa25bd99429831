use std::collections::VecDeque;

use glam::{Vec2, Vec3};
use log::{debug, info, warn};

use crate::net::{Message, PeerId, ProtocolError, RttEstimator, StateSync, Transport, TransportEvent};
use crate::rpc::{Dispatch, ExecutionSide, RpcCall, RpcDispatcher};
use crate::simulation::Reconciler;
use crate::snapshot::{EntityId, SnapshotBuffer, WorldSnapshot};

use super::config::ClientConfig;
use super::events::{ClientEvent, DisconnectReason};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictedPlayer {
    pub position: Vec3,
    pub velocity: Vec3,
    pub look: Vec2,
}

#[derive(Debug, Clone, Default)]
pub struct ClientStats {
    pub applied: u64,
    pub stale: u64,
    pub missing_baseline: u64,
    pub last_correction: f32,
}

pub struct ClientSession<T: Transport> {
    transport: T,
    config: ClientConfig,
    dispatcher: RpcDispatcher,
    buffer: SnapshotBuffer,
    reconciler: Reconciler,
    rtt: RttEstimator,
    local_entity: Option<EntityId>,
    predicted: Option<PredictedPlayer>,
    connected: bool,
    last_ping: Option<f64>,
    now: f64,
    stats: ClientStats,
    empty: WorldSnapshot,
    pending_events: VecDeque<ClientEvent>,
}

impl<T: Transport> ClientSession<T> {
    pub fn new(transport: T, config: ClientConfig) -> Self {
        Self {
            transport,
            dispatcher: RpcDispatcher::new(ExecutionSide::Client),
            buffer: SnapshotBuffer::new(config.snapshot_buffer_size),
            reconciler: Reconciler::new(config.reconcile),
            rtt: RttEstimator::default(),
            local_entity: None,
            predicted: None,
            connected: false,
            last_ping: None,
            now: 0.0,
            stats: ClientStats::default(),
            empty: WorldSnapshot::empty(),
            pending_events: VecDeque::new(),
            config,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn world(&self) -> &WorldSnapshot {
        self.buffer.latest().unwrap_or(&self.empty)
    }

    pub fn latest_sequence(&self) -> u32 {
        self.buffer.latest_sequence()
    }

    pub fn local_entity(&self) -> Option<EntityId> {
        self.local_entity
    }

    pub fn predicted(&self) -> Option<&PredictedPlayer> {
        self.predicted.as_ref()
    }

    pub fn rtt_ms(&self) -> f32 {
        self.rtt.srtt_ms()
    }

    pub fn stats(&self) -> &ClientStats {
        &self.stats
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn drain_events(&mut self) -> impl Iterator<Item = ClientEvent> + '_ {
        self.pending_events.drain(..)
    }

    pub fn tick(&mut self, now: f64) {
        self.now = now;
        self.process_network();

        if !self.connected {
            return;
        }
        let ping_due = self
            .last_ping
            .is_none_or(|sent| now - sent >= self.config.ping_interval_secs);
        if ping_due {
            self.last_ping = Some(now);
            self.call(RpcCall::Ping { client_time: now });
        }
    }

    pub fn predict(&mut self, dt: f32) {
        if let Some(predicted) = &mut self.predicted {
            predicted.position += predicted.velocity * dt;
        }
    }

    pub fn send_input(&mut self, velocity: Vec3, look: Vec2) {
        if let Some(predicted) = &mut self.predicted {
            predicted.velocity = velocity;
            predicted.look = look;
        }
        self.call(RpcCall::PlayerInput { velocity, look });
    }

    pub fn call(&mut self, call: RpcCall) {
        match self.dispatcher.dispatch(call) {
            Dispatch::Local(call) => self.handle_rpc(call),
            Dispatch::Remote { channel, payload } => {
                if let Err(err) = self.transport.send(PeerId::SERVER, channel, payload) {
                    debug!("send to server failed: {err}");
                }
            }
        }
    }

    pub fn disconnect(&mut self) {
        if self.connected {
            self.transport.disconnect(PeerId::SERVER);
            self.mark_disconnected(DisconnectReason::Graceful);
        }
    }

    fn process_network(&mut self) {
        for event in self.transport.poll() {
            match event {
                TransportEvent::Connected(_) => {
                    self.connected = true;
                    self.pending_events.push_back(ClientEvent::Connected);
                }
                TransportEvent::Disconnected(_) => {
                    self.mark_disconnected(DisconnectReason::Graceful)
                }
                TransportEvent::Message { payload, .. } => {
                    if !self.connected {
                        continue;
                    }
                    match self.dispatcher.receive(&payload) {
                        Ok(Message::StateSync(sync)) => self.apply_state(sync),
                        Ok(Message::Rpc(call)) => self.handle_rpc(call),
                        Err(err) => {
                            self.drop_for_violation(err);
                            return;
                        }
                    }
                }
            }
        }
    }

    fn drop_for_violation(&mut self, err: ProtocolError) {
        warn!("dropping server connection: {err}");
        self.transport.disconnect(PeerId::SERVER);
        self.mark_disconnected(DisconnectReason::ProtocolViolation(err));
    }

    fn mark_disconnected(&mut self, reason: DisconnectReason) {
        if !self.connected {
            return;
        }
        self.connected = false;
        info!("disconnected from server: {}", reason.as_str());
        self.pending_events
            .push_back(ClientEvent::Disconnected { reason });
    }

    fn apply_state(&mut self, sync: StateSync) {
        if sync.sequence <= self.buffer.latest_sequence() {
            debug!(
                "stale state sync {} (have {})",
                sync.sequence,
                self.buffer.latest_sequence()
            );
            self.stats.stale += 1;
            return;
        }
        let Some(baseline) = self.buffer.get(sync.baseline) else {
            warn!(
                "state sync {} against unknown baseline {}",
                sync.sequence, sync.baseline
            );
            self.stats.missing_baseline += 1;
            return;
        };

        let mut state = baseline.clone();
        sync.diff.apply(&mut state);
        state.sequence = sync.sequence;
        self.buffer.push(state);
        self.stats.applied += 1;

        self.call(RpcCall::AcknowledgeState {
            sequence: sync.sequence,
        });
        self.reconcile();
    }

    fn reconcile(&mut self) {
        let Some(entity_id) = self.local_entity else {
            return;
        };
        let Some(authoritative) = self.world().players.get(entity_id) else {
            return;
        };
        let (position, velocity, look) = (
            authoritative.position,
            authoritative.velocity,
            authoritative.look,
        );

        match &mut self.predicted {
            None => {
                self.predicted = Some(PredictedPlayer {
                    position,
                    velocity,
                    look,
                });
            }
            Some(predicted) => {
                let correction = self.reconciler.reconcile(
                    predicted.position,
                    predicted.velocity,
                    position,
                    velocity,
                    self.rtt.srtt_secs(),
                );
                predicted.position = correction.position;
                predicted.velocity = correction.velocity;
                self.stats.last_correction = correction.position_error;
            }
        }
    }

    fn handle_rpc(&mut self, call: RpcCall) {
        let event = match call {
            RpcCall::Pong { client_time } => {
                self.rtt.sample(((self.now - client_time) * 1000.0) as f32);
                return;
            }
            RpcCall::AssignPlayer { entity_id } => {
                info!("assigned entity {entity_id}");
                self.local_entity = Some(entity_id);
                self.predicted = None;
                ClientEvent::Assigned { entity_id }
            }
            RpcCall::ChatMessage { sender, text } => ClientEvent::Chat { sender, text },
            RpcCall::HitConfirmed {
                shooter,
                target,
                damage,
            } => ClientEvent::HitConfirmed {
                shooter,
                target,
                damage,
            },
            RpcCall::GrenadeDetonated {
                grenade_id,
                position,
            } => ClientEvent::GrenadeDetonated {
                grenade_id,
                position,
            },
            RpcCall::PickupResult {
                pickup_id,
                weapon,
                granted,
            } => ClientEvent::PickupResult {
                pickup_id,
                weapon,
                granted,
            },
            other => {
                debug!("{} is not handled by the client", other.name());
                return;
            }
        };
        self.pending_events.push_back(event);
    }
}
