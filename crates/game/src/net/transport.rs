use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::Rc;

use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::channel::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PeerId(pub u32);

impl PeerId {
    /// The server's address as seen from every client.
    pub const SERVER: PeerId = PeerId(0);
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    Connected(PeerId),
    Disconnected(PeerId),
    Message {
        peer: PeerId,
        channel: Channel,
        payload: Vec<u8>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("peer {} is not connected", .0.0)]
    NotConnected(PeerId),
}

pub trait Transport {
    fn send(&mut self, peer: PeerId, channel: Channel, payload: Vec<u8>)
    -> Result<(), TransportError>;

    fn poll(&mut self) -> Vec<TransportEvent>;

    /// Drops the connection. A no-op for peers already gone.
    fn disconnect(&mut self, peer: PeerId);
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConditions {
    pub loss_percent: f32,
    pub latency_ms: u32,
    /// Extra random delay on unreliable channels, which lets them reorder.
    pub jitter_ms: u32,
    pub seed: u64,
}

#[derive(Debug, Clone, Default)]
pub struct NetworkStats {
    pub packets_sent: u64,
    pub packets_dropped: u64,
    pub packets_delivered: u64,
    pub bytes_sent: u64,
}

#[derive(Debug)]
struct Delayed {
    release_time: f64,
    order: u64,
    from: PeerId,
    event: TransportEvent,
}

impl PartialEq for Delayed {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Delayed {}

impl PartialOrd for Delayed {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Delayed {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap on (release_time, order).
        other
            .release_time
            .total_cmp(&self.release_time)
            .then_with(|| other.order.cmp(&self.order))
    }
}

#[derive(Debug)]
struct Hub {
    now: f64,
    conditions: LinkConditions,
    rng: StdRng,
    inboxes: HashMap<PeerId, BinaryHeap<Delayed>>,
    clients: HashSet<PeerId>,
    next_peer: u32,
    order: u64,
    stats: NetworkStats,
}

impl Hub {
    fn enqueue(&mut self, to: PeerId, from: PeerId, delay_secs: f64, event: TransportEvent) {
        let order = self.order;
        self.order += 1;
        let release_time = self.now + delay_secs;
        self.inboxes.entry(to).or_default().push(Delayed {
            release_time,
            order,
            from,
            event,
        });
    }

    fn link_up(&self, a: PeerId, b: PeerId) -> bool {
        if a == PeerId::SERVER {
            self.clients.contains(&b)
        } else {
            b == PeerId::SERVER && self.clients.contains(&a)
        }
    }

    fn send(
        &mut self,
        from: PeerId,
        to: PeerId,
        channel: Channel,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        if !self.link_up(from, to) {
            return Err(TransportError::NotConnected(to));
        }

        self.stats.packets_sent += 1;
        self.stats.bytes_sent += payload.len() as u64;

        let mut delay_ms = self.conditions.latency_ms as f64;
        if !channel.is_reliable() {
            if self.conditions.loss_percent > 0.0
                && self.rng.gen_range(0.0f32..100.0) < self.conditions.loss_percent
            {
                self.stats.packets_dropped += 1;
                return Ok(());
            }
            if self.conditions.jitter_ms > 0 {
                delay_ms += self.rng.gen_range(0..=self.conditions.jitter_ms) as f64;
            }
        }

        self.enqueue(
            to,
            from,
            delay_ms / 1000.0,
            TransportEvent::Message {
                peer: from,
                channel,
                payload,
            },
        );
        Ok(())
    }

    fn poll(&mut self, peer: PeerId) -> Vec<TransportEvent> {
        let now = self.now;
        let Some(inbox) = self.inboxes.get_mut(&peer) else {
            return Vec::new();
        };
        let mut events = Vec::new();
        while inbox.peek().is_some_and(|d| d.release_time <= now) {
            if let Some(delayed) = inbox.pop() {
                events.push(delayed.event);
            }
        }
        self.stats.packets_delivered += events
            .iter()
            .filter(|e| matches!(e, TransportEvent::Message { .. }))
            .count() as u64;
        events
    }

    fn drop_link(&mut self, client: PeerId) {
        if !self.clients.remove(&client) {
            return;
        }
        debug!("loopback link to peer {} dropped", client.0);

        // Anything still in flight between the pair is lost with the link.
        if let Some(inbox) = self.inboxes.get_mut(&PeerId::SERVER) {
            inbox.retain(|d| d.from != client);
        }
        if let Some(inbox) = self.inboxes.get_mut(&client) {
            inbox.clear();
        }
        self.enqueue(
            PeerId::SERVER,
            client,
            0.0,
            TransportEvent::Disconnected(client),
        );
        self.enqueue(
            client,
            PeerId::SERVER,
            0.0,
            TransportEvent::Disconnected(PeerId::SERVER),
        );
    }
}

#[derive(Debug, Clone)]
pub struct LoopbackNetwork {
    hub: Rc<RefCell<Hub>>,
}

impl Default for LoopbackNetwork {
    fn default() -> Self {
        Self::new(LinkConditions::default())
    }
}

impl LoopbackNetwork {
    pub fn new(conditions: LinkConditions) -> Self {
        let rng = StdRng::seed_from_u64(conditions.seed);
        Self {
            hub: Rc::new(RefCell::new(Hub {
                now: 0.0,
                conditions,
                rng,
                inboxes: HashMap::new(),
                clients: HashSet::new(),
                next_peer: 1,
                order: 0,
                stats: NetworkStats::default(),
            })),
        }
    }

    pub fn server_endpoint(&self) -> LoopbackEndpoint {
        LoopbackEndpoint {
            hub: Rc::clone(&self.hub),
            local: PeerId::SERVER,
        }
    }

    pub fn connect(&self) -> LoopbackEndpoint {
        let mut hub = self.hub.borrow_mut();
        let client = PeerId(hub.next_peer);
        hub.next_peer += 1;
        hub.clients.insert(client);
        hub.enqueue(PeerId::SERVER, client, 0.0, TransportEvent::Connected(client));
        hub.enqueue(
            client,
            PeerId::SERVER,
            0.0,
            TransportEvent::Connected(PeerId::SERVER),
        );
        LoopbackEndpoint {
            hub: Rc::clone(&self.hub),
            local: client,
        }
    }

    pub fn set_time(&self, now: f64) {
        let mut hub = self.hub.borrow_mut();
        hub.now = hub.now.max(now);
    }

    pub fn set_conditions(&self, conditions: LinkConditions) {
        let mut hub = self.hub.borrow_mut();
        hub.rng = StdRng::seed_from_u64(conditions.seed);
        hub.conditions = conditions;
    }

    pub fn stats(&self) -> NetworkStats {
        self.hub.borrow().stats.clone()
    }

    pub fn connected_clients(&self) -> usize {
        self.hub.borrow().clients.len()
    }
}

#[derive(Debug)]
pub struct LoopbackEndpoint {
    hub: Rc<RefCell<Hub>>,
    local: PeerId,
}

impl LoopbackEndpoint {
    pub fn local_peer(&self) -> PeerId {
        self.local
    }

    /// Injects raw bytes as if `from` had sent them, bypassing link
    /// conditions. Meant for exercising malformed input handling.
    pub fn inject(&self, from: PeerId, channel: Channel, payload: Vec<u8>) {
        self.hub.borrow_mut().enqueue(
            self.local,
            from,
            0.0,
            TransportEvent::Message {
                peer: from,
                channel,
                payload,
            },
        );
    }
}

impl Transport for LoopbackEndpoint {
    fn send(
        &mut self,
        peer: PeerId,
        channel: Channel,
        payload: Vec<u8>,
    ) -> Result<(), TransportError> {
        self.hub
            .borrow_mut()
            .send(self.local, peer, channel, payload)
    }

    fn poll(&mut self) -> Vec<TransportEvent> {
        self.hub.borrow_mut().poll(self.local)
    }

    fn disconnect(&mut self, peer: PeerId) {
        let client = if self.local == PeerId::SERVER {
            peer
        } else {
            self.local
        };
        self.hub.borrow_mut().drop_link(client);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connect_notifies_both_sides() {
        let network = LoopbackNetwork::default();
        let mut server = network.server_endpoint();
        let mut client = network.connect();

        assert_eq!(
            server.poll(),
            vec![TransportEvent::Connected(client.local_peer())]
        );
        assert_eq!(client.poll(), vec![TransportEvent::Connected(PeerId::SERVER)]);
    }

    #[test]
    fn latency_holds_messages_until_due() {
        let network = LoopbackNetwork::new(LinkConditions {
            latency_ms: 50,
            ..Default::default()
        });
        let mut server = network.server_endpoint();
        let mut client = network.connect();
        server.poll();

        client
            .send(PeerId::SERVER, Channel::Reliable, vec![1, 2])
            .unwrap();
        assert!(server.poll().is_empty());

        network.set_time(0.05);
        assert_eq!(server.poll().len(), 1);
    }

    #[test]
    fn reliable_channels_survive_total_loss_in_order() {
        let network = LoopbackNetwork::new(LinkConditions {
            loss_percent: 100.0,
            jitter_ms: 30,
            ..Default::default()
        });
        let mut server = network.server_endpoint();
        let mut client = network.connect();
        server.poll();

        for i in 0..10u8 {
            client
                .send(PeerId::SERVER, Channel::ReliableSequenced, vec![i])
                .unwrap();
            client
                .send(PeerId::SERVER, Channel::Unreliable, vec![i])
                .unwrap();
        }

        network.set_time(1.0);
        let payloads: Vec<u8> = server
            .poll()
            .into_iter()
            .filter_map(|e| match e {
                TransportEvent::Message { payload, .. } => Some(payload[0]),
                _ => None,
            })
            .collect();
        assert_eq!(payloads, (0..10).collect::<Vec<_>>());
        assert_eq!(network.stats().packets_dropped, 10);
    }

    #[test]
    fn disconnect_is_idempotent_and_blocks_sends() {
        let network = LoopbackNetwork::default();
        let mut server = network.server_endpoint();
        let mut client = network.connect();
        let peer = client.local_peer();
        server.poll();
        client.poll();

        server.disconnect(peer);
        server.disconnect(peer);

        assert_eq!(client.poll(), vec![TransportEvent::Disconnected(PeerId::SERVER)]);
        assert_eq!(
            server.send(peer, Channel::Reliable, vec![0]),
            Err(TransportError::NotConnected(peer))
        );
        assert_eq!(network.connected_clients(), 0);
    }
}
