use glam::{Vec2, Vec3};

use crate::net::codec::{CodecError, WireReader, WireWriter};
use crate::snapshot::{EntityId, WeaponKind};

use super::table::{self, RpcDescriptor};

#[derive(Debug, Clone, PartialEq)]
pub enum RpcCall {
    AcknowledgeState { sequence: u32 },
    PlayerInput { velocity: Vec3, look: Vec2 },
    FireWeapon { origin: Vec3, direction: Vec3 },
    ThrowGrenade { origin: Vec3, velocity: Vec3 },
    PickupWeapon { pickup_id: EntityId },
    SendChat { text: String },
    Ping { client_time: f64 },

    Pong { client_time: f64 },
    AssignPlayer { entity_id: EntityId },
    ChatMessage { sender: Option<EntityId>, text: String },
    HitConfirmed { shooter: EntityId, target: EntityId, damage: i32 },
    GrenadeDetonated { grenade_id: EntityId, position: Vec3 },
    PickupResult {
        pickup_id: EntityId,
        weapon: Option<WeaponKind>,
        granted: bool,
    },
}

impl RpcCall {
    pub fn id(&self) -> u8 {
        match self {
            Self::AcknowledgeState { .. } => table::ACKNOWLEDGE_STATE,
            Self::PlayerInput { .. } => table::PLAYER_INPUT,
            Self::FireWeapon { .. } => table::FIRE_WEAPON,
            Self::ThrowGrenade { .. } => table::THROW_GRENADE,
            Self::PickupWeapon { .. } => table::PICKUP_WEAPON,
            Self::SendChat { .. } => table::SEND_CHAT,
            Self::Ping { .. } => table::PING,
            Self::Pong { .. } => table::PONG,
            Self::AssignPlayer { .. } => table::ASSIGN_PLAYER,
            Self::ChatMessage { .. } => table::CHAT_MESSAGE,
            Self::HitConfirmed { .. } => table::HIT_CONFIRMED,
            Self::GrenadeDetonated { .. } => table::GRENADE_DETONATED,
            Self::PickupResult { .. } => table::PICKUP_RESULT,
        }
    }

    pub fn descriptor(&self) -> &'static RpcDescriptor {
        // Every variant has a table row; see `table_matches_variants`.
        &table::RPC_TABLE[usize::from(self.id()) - 1]
    }

    pub fn name(&self) -> &'static str {
        self.descriptor().name
    }

    /// Arguments in parameter order; the id byte is written by the envelope.
    pub fn encode_args(&self, w: &mut WireWriter) {
        match self {
            Self::AcknowledgeState { sequence } => w.write(sequence),
            Self::PlayerInput { velocity, look } => {
                w.write(velocity);
                w.write(look);
            }
            Self::FireWeapon { origin, direction } => {
                w.write(origin);
                w.write(direction);
            }
            Self::ThrowGrenade { origin, velocity } => {
                w.write(origin);
                w.write(velocity);
            }
            Self::PickupWeapon { pickup_id } => w.write(pickup_id),
            Self::SendChat { text } => w.write(text),
            Self::Ping { client_time } | Self::Pong { client_time } => w.write(client_time),
            Self::AssignPlayer { entity_id } => w.write(entity_id),
            Self::ChatMessage { sender, text } => {
                w.write(sender);
                w.write(text);
            }
            Self::HitConfirmed {
                shooter,
                target,
                damage,
            } => {
                w.write(shooter);
                w.write(target);
                w.write(damage);
            }
            Self::GrenadeDetonated {
                grenade_id,
                position,
            } => {
                w.write(grenade_id);
                w.write(position);
            }
            Self::PickupResult {
                pickup_id,
                weapon,
                granted,
            } => {
                w.write(pickup_id);
                w.write(weapon);
                w.write(granted);
            }
        }
    }

    pub fn decode_args(id: u8, r: &mut WireReader<'_>) -> Result<Option<Self>, CodecError> {
        let call = match id {
            table::ACKNOWLEDGE_STATE => Self::AcknowledgeState {
                sequence: r.read()?,
            },
            table::PLAYER_INPUT => Self::PlayerInput {
                velocity: r.read()?,
                look: r.read()?,
            },
            table::FIRE_WEAPON => Self::FireWeapon {
                origin: r.read()?,
                direction: r.read()?,
            },
            table::THROW_GRENADE => Self::ThrowGrenade {
                origin: r.read()?,
                velocity: r.read()?,
            },
            table::PICKUP_WEAPON => Self::PickupWeapon {
                pickup_id: r.read()?,
            },
            table::SEND_CHAT => Self::SendChat { text: r.read()? },
            table::PING => Self::Ping {
                client_time: r.read()?,
            },
            table::PONG => Self::Pong {
                client_time: r.read()?,
            },
            table::ASSIGN_PLAYER => Self::AssignPlayer {
                entity_id: r.read()?,
            },
            table::CHAT_MESSAGE => Self::ChatMessage {
                sender: r.read()?,
                text: r.read()?,
            },
            table::HIT_CONFIRMED => Self::HitConfirmed {
                shooter: r.read()?,
                target: r.read()?,
                damage: r.read()?,
            },
            table::GRENADE_DETONATED => Self::GrenadeDetonated {
                grenade_id: r.read()?,
                position: r.read()?,
            },
            table::PICKUP_RESULT => Self::PickupResult {
                pickup_id: r.read()?,
                weapon: r.read()?,
                granted: r.read()?,
            },
            _ => return Ok(None),
        };
        Ok(Some(call))
    }
}
