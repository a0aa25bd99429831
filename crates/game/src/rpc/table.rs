use crate::net::Channel;
use crate::snapshot::{FieldDescriptor, FieldType as T};

use ExecutionSide::{Client, Server};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionSide {
    Server,
    Client,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RpcDescriptor {
    pub name: &'static str,
    pub id: u8,
    pub side: ExecutionSide,
    pub channel: Channel,
    pub params: &'static [FieldDescriptor],
}

// Message type 0 is reserved for state sync.
pub const ACKNOWLEDGE_STATE: u8 = 1;
pub const PLAYER_INPUT: u8 = 2;
pub const FIRE_WEAPON: u8 = 3;
pub const THROW_GRENADE: u8 = 4;
pub const PICKUP_WEAPON: u8 = 5;
pub const SEND_CHAT: u8 = 6;
pub const PING: u8 = 7;
pub const PONG: u8 = 8;
pub const ASSIGN_PLAYER: u8 = 9;
pub const CHAT_MESSAGE: u8 = 10;
pub const HIT_CONFIRMED: u8 = 11;
pub const GRENADE_DETONATED: u8 = 12;
pub const PICKUP_RESULT: u8 = 13;

/// Registration order is the id order and identical on every peer.
pub static RPC_TABLE: [RpcDescriptor; 13] = [
    RpcDescriptor {
        name: "AcknowledgeState",
        id: ACKNOWLEDGE_STATE,
        side: Server,
        channel: Channel::Unreliable,
        params: &[FieldDescriptor::new("sequence", T::U32)],
    },
    RpcDescriptor {
        name: "PlayerInput",
        id: PLAYER_INPUT,
        side: Server,
        channel: Channel::Unreliable,
        params: &[
            FieldDescriptor::new("velocity", T::Vec3),
            FieldDescriptor::new("look", T::Vec2),
        ],
    },
    RpcDescriptor {
        name: "FireWeapon",
        id: FIRE_WEAPON,
        side: Server,
        channel: Channel::Reliable,
        params: &[
            FieldDescriptor::new("origin", T::Vec3),
            FieldDescriptor::new("direction", T::Vec3),
        ],
    },
    RpcDescriptor {
        name: "ThrowGrenade",
        id: THROW_GRENADE,
        side: Server,
        channel: Channel::Reliable,
        params: &[
            FieldDescriptor::new("origin", T::Vec3),
            FieldDescriptor::new("velocity", T::Vec3),
        ],
    },
    RpcDescriptor {
        name: "PickupWeapon",
        id: PICKUP_WEAPON,
        side: Server,
        channel: Channel::Reliable,
        params: &[FieldDescriptor::new("pickup_id", T::U32)],
    },
    RpcDescriptor {
        name: "SendChat",
        id: SEND_CHAT,
        side: Server,
        channel: Channel::ReliableSequenced,
        params: &[FieldDescriptor::new("text", T::Str)],
    },
    RpcDescriptor {
        name: "Ping",
        id: PING,
        side: Server,
        channel: Channel::Unreliable,
        params: &[FieldDescriptor::new("client_time", T::F64)],
    },
    RpcDescriptor {
        name: "Pong",
        id: PONG,
        side: Client,
        channel: Channel::Unreliable,
        params: &[FieldDescriptor::new("client_time", T::F64)],
    },
    RpcDescriptor {
        name: "AssignPlayer",
        id: ASSIGN_PLAYER,
        side: Client,
        channel: Channel::ReliableSequenced,
        params: &[FieldDescriptor::new("entity_id", T::U32)],
    },
    RpcDescriptor {
        name: "ChatMessage",
        id: CHAT_MESSAGE,
        side: Client,
        channel: Channel::ReliableSequenced,
        params: &[
            FieldDescriptor::nullable("sender", T::U32),
            FieldDescriptor::new("text", T::Str),
        ],
    },
    RpcDescriptor {
        name: "HitConfirmed",
        id: HIT_CONFIRMED,
        side: Client,
        channel: Channel::Reliable,
        params: &[
            FieldDescriptor::new("shooter", T::U32),
            FieldDescriptor::new("target", T::U32),
            FieldDescriptor::new("damage", T::I32),
        ],
    },
    RpcDescriptor {
        name: "GrenadeDetonated",
        id: GRENADE_DETONATED,
        side: Client,
        channel: Channel::Reliable,
        params: &[
            FieldDescriptor::new("grenade_id", T::U32),
            FieldDescriptor::new("position", T::Vec3),
        ],
    },
    RpcDescriptor {
        name: "PickupResult",
        id: PICKUP_RESULT,
        side: Client,
        channel: Channel::Reliable,
        params: &[
            FieldDescriptor::new("pickup_id", T::U32),
            FieldDescriptor::nullable("weapon", T::Weapon),
            FieldDescriptor::new("granted", T::Bool),
        ],
    },
];

pub fn by_id(id: u8) -> Option<&'static RpcDescriptor> {
    RPC_TABLE.iter().find(|d| d.id == id)
}

pub fn by_name(name: &str) -> Option<&'static RpcDescriptor> {
    RPC_TABLE.iter().find(|d| d.name == name)
}
