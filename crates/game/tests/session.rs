use glam::{Vec2, Vec3};

use skirmish::snapshot::{WeaponKind, PLAYER_MAX_HEALTH, PLAYER_START_GRENADES};
use skirmish::{
    Channel, ClientConfig, ClientEvent, ClientSession, DisconnectReason, LinkConditions,
    LoopbackEndpoint, LoopbackNetwork, Message, PeerId, ProtocolError, RpcCall, ServerConfig,
    ServerEvent, ServerSession, World,
};

const DT: f32 = 1.0 / 60.0;

fn move_players(world: &mut World, dt: f32) -> Vec<RpcCall> {
    for player in world.players_mut().iter_mut() {
        player.position += player.velocity * dt;
    }
    Vec::new()
}

struct Harness {
    network: LoopbackNetwork,
    server: ServerSession<LoopbackEndpoint>,
    clients: Vec<ClientSession<LoopbackEndpoint>>,
    now: f64,
}

impl Harness {
    fn new(conditions: LinkConditions, config: ServerConfig) -> Self {
        let network = LoopbackNetwork::new(conditions);
        let server = ServerSession::new(network.server_endpoint(), config);
        Self {
            network,
            server,
            clients: Vec::new(),
            now: 0.0,
        }
    }

    fn lossless() -> Self {
        Self::new(LinkConditions::default(), ServerConfig::default())
    }

    fn connect(&mut self) -> usize {
        let endpoint = self.network.connect();
        self.clients
            .push(ClientSession::new(endpoint, ClientConfig::default()));
        self.clients.len() - 1
    }

    fn step(&mut self) {
        self.now += f64::from(DT);
        self.network.set_time(self.now);
        self.server.tick(self.now, move_players);
        for client in &mut self.clients {
            client.tick(self.now);
            client.predict(DT);
        }
    }

    fn run(&mut self, steps: usize) {
        for _ in 0..steps {
            self.step();
        }
    }

    fn peer(&self, client: usize) -> PeerId {
        self.clients[client].transport().local_peer()
    }

    fn client_events(&mut self, client: usize) -> Vec<ClientEvent> {
        self.clients[client].drain_events().collect()
    }

    fn server_events(&mut self) -> Vec<ServerEvent> {
        self.server.drain_events().collect()
    }
}

#[test]
fn clients_converge_to_server_world() {
    let mut h = Harness::lossless();
    for _ in 0..3 {
        h.connect();
    }
    h.run(2);

    h.clients[0].send_input(Vec3::new(3.0, 0.0, 0.0), Vec2::new(0.5, 0.0));
    h.clients[1].send_input(Vec3::new(0.0, 0.0, -2.0), Vec2::ZERO);
    h.run(30);

    let server_state = h.server.world().state();
    assert_eq!(server_state.players.len(), 3);
    for (i, client) in h.clients.iter().enumerate() {
        assert_eq!(client.world(), server_state);
        assert_eq!(client.local_entity(), h.server.entity_of(h.peer(i)));
    }

    let mover = h.clients[0].local_entity().unwrap();
    let authoritative = server_state.players.get(mover).unwrap().position;
    let predicted = h.clients[0].predicted().unwrap().position;
    assert!(authoritative.x > 1.0);
    assert!(predicted.distance(authoritative) < 0.5);

    // Acks keep the history trimmed to the unacknowledged tail.
    assert!(h.server.stats().cached_snapshots <= 3);
}

#[test]
fn late_joiner_receives_full_state() {
    let mut h = Harness::lossless();
    h.connect();
    h.connect();
    h.run(20);

    let late = h.connect();
    h.step();

    assert_eq!(h.clients[late].stats().applied, 1);
    assert_eq!(h.clients[late].world(), h.server.world().state());
    assert_eq!(h.clients[late].world().players.len(), 3);
}

#[test]
fn lossy_link_converges_once_it_recovers() {
    let conditions = LinkConditions {
        loss_percent: 25.0,
        latency_ms: 30,
        jitter_ms: 20,
        seed: 7,
    };
    let mut h = Harness::new(conditions, ServerConfig::default());
    h.connect();
    h.connect();
    h.run(10);

    for step in 0..240 {
        if step % 30 == 0 {
            let sideways = (step / 30) as f32 % 3.0 - 1.0;
            h.clients[0].send_input(Vec3::new(sideways, 0.0, 1.0), Vec2::ZERO);
        }
        h.step();
    }

    h.network.set_conditions(LinkConditions {
        latency_ms: 30,
        ..Default::default()
    });
    h.clients[0].send_input(Vec3::ZERO, Vec2::ZERO);
    h.run(60);

    let server_state = h.server.world().state();
    for client in &h.clients {
        assert!(client.world().same_entities(server_state));
        assert!(client.stats().applied > 100);
    }
    assert!(h.network.stats().packets_dropped > 0);
}

#[test]
fn unknown_message_drops_only_that_client() {
    let mut h = Harness::lossless();
    h.connect();
    h.connect();
    h.run(3);

    let peer = h.peer(0);
    let entity = h.server.entity_of(peer).unwrap();
    h.server
        .transport()
        .inject(peer, Channel::Reliable, vec![250, 0, 0]);
    h.run(2);

    let events = h.server_events();
    assert!(events.contains(&ServerEvent::ClientDisconnected {
        peer,
        reason: DisconnectReason::ProtocolViolation(ProtocolError::UnknownMessage(250)),
    }));
    assert!(h.server.world().players().get(entity).is_none());
    assert_eq!(h.server.ack_cache().peer_count(), 1);
    assert!(!h.clients[0].is_connected());
    assert!(h.clients[1].is_connected());
}

#[test]
fn client_rpc_sent_to_server_is_a_violation() {
    let mut h = Harness::lossless();
    h.connect();
    h.run(2);

    let peer = h.peer(0);
    let bytes = Message::Rpc(RpcCall::Pong { client_time: 0.0 }).encode();
    h.server.transport().inject(peer, Channel::Unreliable, bytes);
    h.step();

    assert!(h.server_events().iter().any(|e| matches!(
        e,
        ServerEvent::ClientDisconnected {
            reason: DisconnectReason::ProtocolViolation(ProtocolError::WrongSide { name: "Pong", .. }),
            ..
        }
    )));
}

#[test]
fn truncated_state_sync_drops_server_connection() {
    let mut h = Harness::lossless();
    h.connect();
    h.run(3);
    let peer = h.peer(0);

    h.clients[0]
        .transport()
        .inject(PeerId::SERVER, Channel::UnreliableStateUpdate, vec![0, 5, 0]);
    h.step();

    let events = h.client_events(0);
    assert!(events.iter().any(|e| matches!(
        e,
        ClientEvent::Disconnected {
            reason: DisconnectReason::ProtocolViolation(ProtocolError::Codec(_))
        }
    )));

    h.step();
    assert!(h.server.entity_of(peer).is_none());
    assert_eq!(h.server.world().players().len(), 0);
}

#[test]
fn hitscan_damages_target_and_notifies_both() {
    let mut h = Harness::lossless();
    h.connect();
    h.connect();
    h.run(3);

    let shooter = h.clients[0].local_entity().unwrap();
    let target = h.clients[1].local_entity().unwrap();
    {
        let players = h.server.world_mut().players_mut();
        players.get_mut(shooter).unwrap().position = Vec3::ZERO;
        players.get_mut(target).unwrap().position = Vec3::new(0.0, 0.0, 10.0);
    }
    h.run(10);

    h.clients[0].call(RpcCall::FireWeapon {
        origin: Vec3::ZERO,
        direction: Vec3::Z,
    });
    h.run(2);

    let damage = WeaponKind::Pistol.damage();
    let confirmed = ClientEvent::HitConfirmed {
        shooter,
        target,
        damage,
    };
    assert!(h.client_events(0).contains(&confirmed));
    assert!(h.client_events(1).contains(&confirmed));

    let replicated = h.clients[1].world().players.get(target).unwrap();
    assert_eq!(replicated.health, PLAYER_MAX_HEALTH - damage);
}

#[test]
fn hitscan_under_latency_hits_what_the_shooter_saw() {
    let conditions = LinkConditions {
        latency_ms: 100,
        ..Default::default()
    };
    let mut h = Harness::new(conditions, ServerConfig::default());
    h.connect();
    h.connect();
    h.run(30);

    let shooter = h.clients[0].local_entity().unwrap();
    let target = h.clients[1].local_entity().unwrap();
    {
        let players = h.server.world_mut().players_mut();
        players.get_mut(shooter).unwrap().position = Vec3::new(0.0, 1.0, 0.0);
        players.get_mut(target).unwrap().position = Vec3::new(-4.0, 1.0, 10.0);
    }
    h.clients[1].send_input(Vec3::new(8.0, 0.0, 0.0), Vec2::ZERO);
    h.run(120);

    let server_rtt = h.server.rtt_ms(h.peer(0)).unwrap();
    assert!((180.0..240.0).contains(&server_rtt), "server rtt {server_rtt}");

    let seen = h.clients[0].world();
    let origin = seen.players.get(shooter).unwrap().position;
    let aim = seen.players.get(target).unwrap().position;
    let live = h.server.world().players().get(target).unwrap().position;
    // The target has moved on since the state the shooter is looking at.
    assert!(live.distance(aim) > 0.5, "live {live} seen {aim}");

    h.clients[0].call(RpcCall::FireWeapon {
        origin,
        direction: aim - origin,
    });
    h.run(30);

    let confirmed = ClientEvent::HitConfirmed {
        shooter,
        target,
        damage: WeaponKind::Pistol.damage(),
    };
    assert!(h.client_events(0).contains(&confirmed));
}

#[test]
fn pickup_is_granted_once() {
    let mut h = Harness::lossless();
    h.connect();
    h.run(3);

    let me = h.clients[0].local_entity().unwrap();
    let position = h.server.world().players().get(me).unwrap().position;
    let pickup = h
        .server
        .world_mut()
        .spawn_pickup(position + Vec3::X, WeaponKind::Shotgun);
    h.run(2);

    for _ in 0..2 {
        h.clients[0].call(RpcCall::PickupWeapon { pickup_id: pickup });
        h.run(2);
    }

    let results: Vec<(bool, Option<WeaponKind>)> = h
        .client_events(0)
        .into_iter()
        .filter_map(|e| match e {
            ClientEvent::PickupResult {
                granted, weapon, ..
            } => Some((granted, weapon)),
            _ => None,
        })
        .collect();
    assert_eq!(
        results,
        vec![(true, Some(WeaponKind::Shotgun)), (false, None)]
    );

    let world = h.clients[0].world();
    assert_eq!(
        world.players.get(me).unwrap().held_weapon,
        Some(WeaponKind::Shotgun)
    );
    assert!(!world.pickups.get(pickup).unwrap().available);
}

#[test]
fn thrown_grenade_replicates() {
    let mut h = Harness::lossless();
    h.connect();
    h.run(3);

    let me = h.clients[0].local_entity().unwrap();
    let origin = h.server.world().players().get(me).unwrap().position;
    h.clients[0].call(RpcCall::ThrowGrenade {
        origin,
        velocity: Vec3::new(0.0, 5.0, 5.0),
    });
    h.run(2);

    let world = h.clients[0].world();
    assert_eq!(world.grenades.len(), 1);
    assert_eq!(world.grenades.iter().next().unwrap().owner, me);
    assert_eq!(
        world.players.get(me).unwrap().grenades,
        PLAYER_START_GRENADES - 1
    );
}

#[test]
fn chat_reaches_every_client() {
    let mut h = Harness::lossless();
    h.connect();
    h.connect();
    h.run(3);

    let sender = h.clients[0].local_entity();
    h.clients[0].call(RpcCall::SendChat {
        text: "  gl hf  ".into(),
    });
    h.run(2);

    let expected = ClientEvent::Chat {
        sender,
        text: "gl hf".into(),
    };
    assert!(h.client_events(0).contains(&expected));
    assert!(h.client_events(1).contains(&expected));
}

#[test]
fn disconnect_releases_server_state() {
    let mut h = Harness::lossless();
    h.connect();
    h.run(3);
    let peer = h.peer(0);

    h.clients[0].disconnect();
    h.step();

    assert!(h.server_events().contains(&ServerEvent::ClientDisconnected {
        peer,
        reason: DisconnectReason::Graceful,
    }));
    assert_eq!(h.server.ack_cache().peer_count(), 0);
    assert_eq!(h.server.world().players().len(), 0);
    assert!(!h.clients[0].is_connected());
}

#[test]
fn full_server_denies_extra_clients() {
    let config = ServerConfig {
        max_clients: 1,
        ..Default::default()
    };
    let mut h = Harness::new(LinkConditions::default(), config);
    h.connect();
    h.connect();
    h.run(3);

    let denied = h.peer(1);
    assert!(h
        .server_events()
        .contains(&ServerEvent::ConnectionDenied { peer: denied }));
    assert!(h.clients[0].is_connected());
    assert!(!h.clients[1].is_connected());
    assert_eq!(h.clients[1].local_entity(), None);
}

#[test]
fn ping_produces_rtt_estimate() {
    let conditions = LinkConditions {
        latency_ms: 40,
        ..Default::default()
    };
    let mut h = Harness::new(conditions, ServerConfig::default());
    h.connect();
    h.run(180);

    let client_rtt = h.clients[0].rtt_ms();
    let server_rtt = h.server.rtt_ms(h.peer(0)).unwrap();
    assert!((80.0..130.0).contains(&client_rtt), "client rtt {client_rtt}");
    assert!((80.0..130.0).contains(&server_rtt), "server rtt {server_rtt}");
}
