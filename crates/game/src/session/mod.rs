mod client;
mod config;
mod events;
mod server;

pub use client::{ClientSession, ClientStats, PredictedPlayer};
pub use config::{ClientConfig, ServerConfig};
pub use events::{ClientEvent, DisconnectReason, ServerEvent};
pub use server::{
    raycast_players, ServerSession, ServerStats, HITSCAN_RANGE, MAX_MOVE_SPEED, MAX_THROW_SPEED,
    PICKUP_RADIUS, PLAYER_HIT_RADIUS, ROCKET_SPEED,
};
