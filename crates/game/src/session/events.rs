use glam::Vec3;

use crate::net::{PeerId, ProtocolError};
use crate::snapshot::{EntityId, WeaponKind};

#[derive(Debug, Clone, PartialEq)]
pub enum ServerEvent {
    ClientConnected {
        peer: PeerId,
        entity_id: EntityId,
    },
    ClientDisconnected {
        peer: PeerId,
        reason: DisconnectReason,
    },
    ConnectionDenied {
        peer: PeerId,
    },
    Chat {
        sender: EntityId,
        text: String,
    },
    PlayerHit {
        shooter: EntityId,
        target: EntityId,
        damage: i32,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    Connected,
    Disconnected {
        reason: DisconnectReason,
    },
    Assigned {
        entity_id: EntityId,
    },
    Chat {
        sender: Option<EntityId>,
        text: String,
    },
    HitConfirmed {
        shooter: EntityId,
        target: EntityId,
        damage: i32,
    },
    GrenadeDetonated {
        grenade_id: EntityId,
        position: Vec3,
    },
    PickupResult {
        pickup_id: EntityId,
        weapon: Option<WeaponKind>,
        granted: bool,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DisconnectReason {
    Graceful,
    Kicked,
    ProtocolViolation(ProtocolError),
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Graceful => "disconnected",
            DisconnectReason::Kicked => "kicked",
            DisconnectReason::ProtocolViolation(_) => "protocol violation",
        }
    }
}
