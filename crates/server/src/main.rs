mod bots;
mod config;
mod simulation;

use std::path::PathBuf;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand::rngs::StdRng;

use skirmish::{
    FixedTimestep, LoopbackEndpoint, LoopbackNetwork, ServerEvent, ServerSession, World,
};

use bots::{Bot, BotStats};
use config::FileConfig;
use simulation::Arena;

#[derive(Parser)]
#[command(name = "skirmish-server")]
#[command(about = "Headless skirmish server with loopback bot clients")]
struct Args {
    #[arg(short, long, help = "TOML config file")]
    config: Option<PathBuf>,

    #[arg(short, long)]
    tick_rate: Option<u32>,

    #[arg(short, long)]
    bots: Option<usize>,

    #[arg(short, long, help = "Simulated seconds to run, 0 for forever")]
    duration_secs: Option<f64>,

    #[arg(long, help = "Pace ticks against the wall clock")]
    realtime: bool,

    #[arg(long, help = "Packet loss percentage on unreliable channels (0-100)")]
    loss: Option<f32>,

    #[arg(long, help = "One-way latency in ms")]
    latency_ms: Option<u32>,

    #[arg(long, help = "Jitter in ms on unreliable channels")]
    jitter_ms: Option<u32>,

    #[arg(long)]
    seed: Option<u64>,
}

impl Args {
    fn resolve(&self) -> Result<FileConfig> {
        let mut config = match &self.config {
            Some(path) => FileConfig::load(path)?,
            None => FileConfig::default(),
        };
        if let Some(tick_rate) = self.tick_rate {
            config.server.tick_rate = tick_rate;
        }
        if let Some(bots) = self.bots {
            config.soak.bots = bots;
        }
        if let Some(duration) = self.duration_secs {
            config.soak.duration_secs = duration;
        }
        if self.realtime {
            config.soak.realtime = true;
        }
        if let Some(loss) = self.loss {
            config.link.loss_percent = loss.clamp(0.0, 100.0);
        }
        if let Some(latency) = self.latency_ms {
            config.link.latency_ms = latency;
        }
        if let Some(jitter) = self.jitter_ms {
            config.link.jitter_ms = jitter;
        }
        if let Some(seed) = self.seed {
            config.soak.seed = seed;
            config.link.seed = seed;
        }
        Ok(config)
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = Args::parse().resolve()?;
    info!(
        "starting: {} Hz, {} bots, link {:?}",
        config.server.tick_rate, config.soak.bots, config.link
    );

    run(config);
    Ok(())
}

fn run(config: FileConfig) {
    let network = LoopbackNetwork::new(config.link.clone());
    let mut world = World::new();
    Arena::populate(&mut world);
    let mut server =
        ServerSession::with_world(network.server_endpoint(), config.server.clone(), world);
    let mut arena = Arena::new();

    let mut rng = StdRng::seed_from_u64(config.soak.seed);
    let mut bots: Vec<Bot> = (0..config.soak.bots)
        .map(|_| Bot::connect(&network, config.client.clone()))
        .collect();
    let mut bot_stats = BotStats::default();

    let mut timestep = FixedTimestep::new(config.server.tick_rate);
    let dt = timestep.dt() as f32;
    let mut last_frame = Instant::now();
    let mut next_report = config.soak.report_interval_secs;

    loop {
        if config.soak.realtime {
            let frame_start = Instant::now();
            timestep.accumulate((frame_start - last_frame).as_secs_f64());
            last_frame = frame_start;
        } else {
            timestep.accumulate(timestep.dt());
        }

        while timestep.consume_tick() {
            let now = timestep.sim_time();
            network.set_time(now);
            server.tick(now, |world, dt| arena.step(world, dt));
            log_server_events(&mut server);

            for bot in &mut bots {
                bot.tick(now, dt, &mut rng, &mut bot_stats);
            }

            if config.soak.report_interval_secs > 0.0 && now >= next_report {
                next_report += config.soak.report_interval_secs;
                report(now, &server, &network, &bots, &bot_stats);
            }
        }

        let elapsed = timestep.sim_time();
        if config.soak.duration_secs > 0.0 && elapsed >= config.soak.duration_secs {
            break;
        }
        if config.soak.realtime {
            thread::sleep(Duration::from_millis(1));
        }
    }

    report(timestep.sim_time(), &server, &network, &bots, &bot_stats);
    // More than a second of lag on a connected bot means replication stalled.
    let lagging = bots
        .iter()
        .filter(|bot| bot.session().is_connected())
        .filter(|bot| {
            bot.session().latest_sequence() + config.server.tick_rate < server.world().sequence()
        })
        .count();
    if lagging > 0 {
        warn!("{lagging} connected bots are over a second behind the server");
    }
    info!("shutting down after {} ticks", timestep.ticks());
}

fn log_server_events(server: &mut ServerSession<LoopbackEndpoint>) {
    for event in server.drain_events() {
        match event {
            ServerEvent::ClientConnected { peer, entity_id } => {
                info!("client {} connected (entity {entity_id})", peer.0);
            }
            ServerEvent::ClientDisconnected { peer, reason } => {
                info!("client {} {}", peer.0, reason.as_str());
            }
            ServerEvent::ConnectionDenied { peer } => {
                warn!("connection denied to {}: server full", peer.0);
            }
            ServerEvent::Chat { sender, text } => info!("[{sender}] {text}"),
            ServerEvent::PlayerHit {
                shooter,
                target,
                damage,
            } => debug!("{shooter} hit {target} for {damage}"),
        }
    }
}

fn report(
    now: f64,
    server: &ServerSession<LoopbackEndpoint>,
    network: &LoopbackNetwork,
    bots: &[Bot],
    bot_stats: &BotStats,
) {
    let stats = server.stats();
    let net = network.stats();
    let rtt: Vec<String> = server
        .peers()
        .filter_map(|peer| server.rtt_ms(peer))
        .map(|rtt| format!("{rtt:.0}"))
        .collect();
    let connected = bots.iter().filter(|b| b.session().is_connected()).count();

    info!(
        "t={now:.1}s seq={} clients={}/{} entities={} cached={} floor={:?}",
        stats.sequence,
        stats.client_count,
        stats.max_clients,
        stats.entity_count,
        stats.cached_snapshots,
        stats.retention_floor,
    );
    info!(
        "  net: sent={} dropped={} delivered={} bytes={} rtt=[{}]",
        net.packets_sent,
        net.packets_dropped,
        net.packets_delivered,
        net.bytes_sent,
        rtt.join(", "),
    );
    info!(
        "  bots: connected={connected} hits={} chats={} pickups={} disconnects={}",
        bot_stats.hits, bot_stats.chats, bot_stats.pickups, bot_stats.disconnects,
    );
}
