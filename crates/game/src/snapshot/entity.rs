use bitflags::bitflags;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::net::codec::{CodecError, WireDecode, WireEncode, WireReader, WireWriter};

use super::schema::{EntityId, EntityKind, FieldDescriptor, FieldType, Replicated};

pub const PLAYER_MAX_HEALTH: i32 = 100;
pub const PLAYER_START_AMMO: u16 = 60;
pub const PLAYER_START_GRENADES: u8 = 2;
pub const GRENADE_FUSE_SECS: f32 = 2.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum WeaponKind {
    Pistol = 0,
    Shotgun = 1,
    Rifle = 2,
    RocketLauncher = 3,
}

impl WeaponKind {
    pub fn damage(self) -> i32 {
        match self {
            Self::Pistol => 15,
            Self::Shotgun => 40,
            Self::Rifle => 25,
            Self::RocketLauncher => 0,
        }
    }
}

impl TryFrom<u8> for WeaponKind {
    type Error = CodecError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Pistol),
            1 => Ok(Self::Shotgun),
            2 => Ok(Self::Rifle),
            3 => Ok(Self::RocketLauncher),
            _ => Err(CodecError::InvalidTag {
                what: "weapon",
                value,
            }),
        }
    }
}

impl WireEncode for WeaponKind {
    fn encode(&self, w: &mut WireWriter) {
        w.write_u8(*self as u8);
    }
}

impl WireDecode for WeaponKind {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        WeaponKind::try_from(r.read_u8()?)
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PlayerFlags: u16 {
        const ALIVE = 1 << 0;
        const GROUNDED = 1 << 1;
        const CROUCHING = 1 << 2;
        const SPRINTING = 1 << 3;
        const FIRING = 1 << 4;
    }
}

impl WireEncode for PlayerFlags {
    fn encode(&self, w: &mut WireWriter) {
        w.write(&self.bits());
    }
}

impl WireDecode for PlayerFlags {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(PlayerFlags::from_bits_retain(r.read()?))
    }
}

fn unknown_field(kind: EntityKind, index: usize) -> CodecError {
    CodecError::InvalidTag {
        what: kind.name(),
        value: index as u8,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: EntityId,
    pub name: String,
    pub position: Vec3,
    pub velocity: Vec3,
    /// Yaw and pitch in radians.
    pub look: Vec2,
    pub health: i32,
    pub ammo: u16,
    pub grenades: u8,
    pub flags: PlayerFlags,
    pub held_weapon: Option<WeaponKind>,
}

impl Player {
    pub fn new(id: EntityId, name: impl Into<String>, position: Vec3) -> Self {
        Self {
            id,
            name: name.into(),
            position,
            velocity: Vec3::ZERO,
            look: Vec2::ZERO,
            health: PLAYER_MAX_HEALTH,
            ammo: PLAYER_START_AMMO,
            grenades: PLAYER_START_GRENADES,
            flags: PlayerFlags::ALIVE | PlayerFlags::GROUNDED,
            held_weapon: Some(WeaponKind::Pistol),
        }
    }

    pub fn is_alive(&self) -> bool {
        self.flags.contains(PlayerFlags::ALIVE)
    }

    /// Returns true when this hit killed the player.
    pub fn take_damage(&mut self, amount: i32) -> bool {
        if !self.is_alive() {
            return false;
        }
        self.health -= amount;
        if self.health > 0 {
            return false;
        }
        self.health = 0;
        self.velocity = Vec3::ZERO;
        self.flags.remove(PlayerFlags::ALIVE | PlayerFlags::FIRING | PlayerFlags::SPRINTING);
        true
    }

    pub fn respawn(&mut self, position: Vec3) {
        let name = std::mem::take(&mut self.name);
        *self = Self::new(self.id, name, position);
    }
}

impl Replicated for Player {
    const KIND: EntityKind = EntityKind::Player;
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("name", FieldType::Str),
        FieldDescriptor::new("position", FieldType::Vec3),
        FieldDescriptor::new("velocity", FieldType::Vec3),
        FieldDescriptor::new("look", FieldType::Vec2),
        FieldDescriptor::new("health", FieldType::I32),
        FieldDescriptor::new("ammo", FieldType::U16),
        FieldDescriptor::new("grenades", FieldType::U8),
        FieldDescriptor::new("flags", FieldType::Flags16),
        FieldDescriptor::nullable("held_weapon", FieldType::Weapon),
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn blank(id: EntityId) -> Self {
        Self {
            id,
            name: String::new(),
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
            look: Vec2::ZERO,
            health: 0,
            ammo: 0,
            grenades: 0,
            flags: PlayerFlags::empty(),
            held_weapon: None,
        }
    }

    fn encode_field(&self, index: usize, w: &mut WireWriter) {
        match index {
            0 => w.write(&self.name),
            1 => w.write(&self.position),
            2 => w.write(&self.velocity),
            3 => w.write(&self.look),
            4 => w.write(&self.health),
            5 => w.write(&self.ammo),
            6 => w.write(&self.grenades),
            7 => w.write(&self.flags),
            8 => w.write(&self.held_weapon),
            _ => {}
        }
    }

    fn decode_field(&mut self, index: usize, r: &mut WireReader<'_>) -> Result<(), CodecError> {
        match index {
            0 => self.name = r.read()?,
            1 => self.position = r.read()?,
            2 => self.velocity = r.read()?,
            3 => self.look = r.read()?,
            4 => self.health = r.read()?,
            5 => self.ammo = r.read()?,
            6 => self.grenades = r.read()?,
            7 => self.flags = r.read()?,
            8 => self.held_weapon = r.read()?,
            _ => return Err(unknown_field(Self::KIND, index)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeaponPickup {
    pub id: EntityId,
    pub position: Vec3,
    pub weapon: WeaponKind,
    pub available: bool,
    pub respawn_timer: f32,
}

impl WeaponPickup {
    pub const RESPAWN_SECS: f32 = 10.0;

    pub fn new(id: EntityId, position: Vec3, weapon: WeaponKind) -> Self {
        Self {
            id,
            position,
            weapon,
            available: true,
            respawn_timer: 0.0,
        }
    }
}

impl Replicated for WeaponPickup {
    const KIND: EntityKind = EntityKind::WeaponPickup;
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("position", FieldType::Vec3),
        FieldDescriptor::new("weapon", FieldType::Weapon),
        FieldDescriptor::new("available", FieldType::Bool),
        FieldDescriptor::new("respawn_timer", FieldType::F32),
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn blank(id: EntityId) -> Self {
        Self::new(id, Vec3::ZERO, WeaponKind::Pistol)
    }

    fn encode_field(&self, index: usize, w: &mut WireWriter) {
        match index {
            0 => w.write(&self.position),
            1 => w.write(&self.weapon),
            2 => w.write(&self.available),
            3 => w.write(&self.respawn_timer),
            _ => {}
        }
    }

    fn decode_field(&mut self, index: usize, r: &mut WireReader<'_>) -> Result<(), CodecError> {
        match index {
            0 => self.position = r.read()?,
            1 => self.weapon = r.read()?,
            2 => self.available = r.read()?,
            3 => self.respawn_timer = r.read()?,
            _ => return Err(unknown_field(Self::KIND, index)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Grenade {
    pub id: EntityId,
    pub owner: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
    pub fuse: f32,
}

impl Grenade {
    pub fn new(id: EntityId, owner: EntityId, position: Vec3, velocity: Vec3) -> Self {
        Self {
            id,
            owner,
            position,
            velocity,
            fuse: GRENADE_FUSE_SECS,
        }
    }
}

impl Replicated for Grenade {
    const KIND: EntityKind = EntityKind::Grenade;
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("owner", FieldType::U32),
        FieldDescriptor::new("position", FieldType::Vec3),
        FieldDescriptor::new("velocity", FieldType::Vec3),
        FieldDescriptor::new("fuse", FieldType::F32),
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn blank(id: EntityId) -> Self {
        Self::new(id, 0, Vec3::ZERO, Vec3::ZERO)
    }

    fn encode_field(&self, index: usize, w: &mut WireWriter) {
        match index {
            0 => w.write(&self.owner),
            1 => w.write(&self.position),
            2 => w.write(&self.velocity),
            3 => w.write(&self.fuse),
            _ => {}
        }
    }

    fn decode_field(&mut self, index: usize, r: &mut WireReader<'_>) -> Result<(), CodecError> {
        match index {
            0 => self.owner = r.read()?,
            1 => self.position = r.read()?,
            2 => self.velocity = r.read()?,
            3 => self.fuse = r.read()?,
            _ => return Err(unknown_field(Self::KIND, index)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Rocket {
    pub id: EntityId,
    pub owner: EntityId,
    pub position: Vec3,
    pub velocity: Vec3,
}

impl Replicated for Rocket {
    const KIND: EntityKind = EntityKind::Rocket;
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("owner", FieldType::U32),
        FieldDescriptor::new("position", FieldType::Vec3),
        FieldDescriptor::new("velocity", FieldType::Vec3),
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn blank(id: EntityId) -> Self {
        Self {
            id,
            owner: 0,
            position: Vec3::ZERO,
            velocity: Vec3::ZERO,
        }
    }

    fn encode_field(&self, index: usize, w: &mut WireWriter) {
        match index {
            0 => w.write(&self.owner),
            1 => w.write(&self.position),
            2 => w.write(&self.velocity),
            _ => {}
        }
    }

    fn decode_field(&mut self, index: usize, r: &mut WireReader<'_>) -> Result<(), CodecError> {
        match index {
            0 => self.owner = r.read()?,
            1 => self.position = r.read()?,
            2 => self.velocity = r.read()?,
            _ => return Err(unknown_field(Self::KIND, index)),
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Spawner {
    pub id: EntityId,
    pub position: Vec3,
    pub team: Option<u8>,
    pub cooldown: f32,
    pub active: bool,
}

impl Replicated for Spawner {
    const KIND: EntityKind = EntityKind::Spawner;
    const FIELDS: &'static [FieldDescriptor] = &[
        FieldDescriptor::new("position", FieldType::Vec3),
        FieldDescriptor::nullable("team", FieldType::U8),
        FieldDescriptor::new("cooldown", FieldType::F32),
        FieldDescriptor::new("active", FieldType::Bool),
    ];

    fn id(&self) -> EntityId {
        self.id
    }

    fn blank(id: EntityId) -> Self {
        Self {
            id,
            position: Vec3::ZERO,
            team: None,
            cooldown: 0.0,
            active: false,
        }
    }

    fn encode_field(&self, index: usize, w: &mut WireWriter) {
        match index {
            0 => w.write(&self.position),
            1 => w.write(&self.team),
            2 => w.write(&self.cooldown),
            3 => w.write(&self.active),
            _ => {}
        }
    }

    fn decode_field(&mut self, index: usize, r: &mut WireReader<'_>) -> Result<(), CodecError> {
        match index {
            0 => self.position = r.read()?,
            1 => self.team = r.read()?,
            2 => self.cooldown = r.read()?,
            3 => self.active = r.read()?,
            _ => return Err(unknown_field(Self::KIND, index)),
        }
        Ok(())
    }
}
