use glam::{Vec2, Vec3};
use rand::Rng;
use rand::rngs::StdRng;

use skirmish::session::MAX_MOVE_SPEED;
use skirmish::{ClientConfig, ClientEvent, ClientSession, LoopbackEndpoint, LoopbackNetwork, RpcCall};

const CHAT_LINES: &[&str] = &["gl hf", "nice shot", "rotate b", "need ammo", "gg"];

#[derive(Debug, Clone, Default)]
pub struct BotStats {
    pub hits: u64,
    pub chats: u64,
    pub pickups: u64,
    pub disconnects: u64,
}

pub struct Bot {
    session: ClientSession<LoopbackEndpoint>,
    next_decision: f64,
}

impl Bot {
    pub fn connect(network: &LoopbackNetwork, config: ClientConfig) -> Self {
        Self {
            session: ClientSession::new(network.connect(), config),
            next_decision: 0.0,
        }
    }

    pub fn session(&self) -> &ClientSession<LoopbackEndpoint> {
        &self.session
    }

    pub fn tick(&mut self, now: f64, dt: f32, rng: &mut StdRng, stats: &mut BotStats) {
        self.session.tick(now);
        self.session.predict(dt);

        for event in self.session.drain_events() {
            match event {
                ClientEvent::HitConfirmed { .. } => stats.hits += 1,
                ClientEvent::Chat { .. } => stats.chats += 1,
                ClientEvent::PickupResult { granted: true, .. } => stats.pickups += 1,
                ClientEvent::Disconnected { .. } => stats.disconnects += 1,
                _ => {}
            }
        }

        if now >= self.next_decision && self.session.is_connected() {
            self.next_decision = now + rng.gen_range(0.2..1.0);
            self.decide(rng);
        }
    }

    fn decide(&mut self, rng: &mut StdRng) {
        let Some(me) = self.session.local_entity() else {
            return;
        };
        let world = self.session.world();
        let Some(player) = world.players.get(me) else {
            return;
        };
        if !player.is_alive() {
            return;
        }
        let position = player.position;

        let target = world
            .players
            .iter()
            .filter(|p| p.id != me && p.is_alive())
            .min_by(|a, b| {
                a.position
                    .distance_squared(position)
                    .total_cmp(&b.position.distance_squared(position))
            })
            .map(|p| p.position);
        let nearby_pickup = world
            .pickups
            .iter()
            .find(|p| p.available && p.position.distance(position) < 2.0)
            .map(|p| p.id);

        let heading = Vec3::new(rng.gen_range(-1.0..1.0), 0.0, rng.gen_range(-1.0..1.0))
            .normalize_or_zero();
        let speed = rng.gen_range(0.0..MAX_MOVE_SPEED * 0.5);
        let look = Vec2::new(heading.x.atan2(heading.z), 0.0);
        self.session.send_input(heading * speed, look);

        if let Some(pickup_id) = nearby_pickup {
            self.session.call(RpcCall::PickupWeapon { pickup_id });
        }

        match rng.gen_range(0..100) {
            0..=39 => {
                if let Some(target) = target {
                    let direction = (target - position).normalize_or_zero();
                    self.session.call(RpcCall::FireWeapon {
                        origin: position,
                        direction,
                    });
                }
            }
            40..=44 => self.session.call(RpcCall::ThrowGrenade {
                origin: position,
                velocity: heading * 8.0 + Vec3::Y * 4.0,
            }),
            45..=46 => {
                let line = CHAT_LINES[rng.gen_range(0..CHAT_LINES.len())];
                self.session.call(RpcCall::SendChat { text: line.into() });
            }
            _ => {}
        }
    }
}
