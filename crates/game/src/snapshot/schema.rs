use std::fmt;

use serde::{Deserialize, Serialize};

use crate::net::codec::{CodecError, WireDecode, WireEncode, WireReader, WireWriter};

pub type EntityId = u32;

pub const MAX_FIELDS: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FieldType {
    Bool,
    U8,
    U16,
    U32,
    I32,
    F32,
    F64,
    Vec2,
    Vec3,
    Str,
    Flags16,
    Weapon,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
    pub nullable: bool,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: false,
        }
    }

    pub const fn nullable(name: &'static str, ty: FieldType) -> Self {
        Self {
            name,
            ty,
            nullable: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum EntityKind {
    Player = 0,
    WeaponPickup = 1,
    Grenade = 2,
    Rocket = 3,
    Spawner = 4,
}

impl EntityKind {
    pub const ALL: [EntityKind; 5] = [
        EntityKind::Player,
        EntityKind::WeaponPickup,
        EntityKind::Grenade,
        EntityKind::Rocket,
        EntityKind::Spawner,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Player => "player",
            Self::WeaponPickup => "weapon_pickup",
            Self::Grenade => "grenade",
            Self::Rocket => "rocket",
            Self::Spawner => "spawner",
        }
    }

    pub fn schema(self) -> &'static [FieldDescriptor] {
        use super::entity::{Grenade, Player, Rocket, Spawner, WeaponPickup};
        match self {
            Self::Player => Player::FIELDS,
            Self::WeaponPickup => WeaponPickup::FIELDS,
            Self::Grenade => Grenade::FIELDS,
            Self::Rocket => Rocket::FIELDS,
            Self::Spawner => Spawner::FIELDS,
        }
    }
}

/// One bit per schema field, bit `i` for `FIELDS[i]`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ChangeMask(u32);

impl ChangeMask {
    pub const EMPTY: Self = Self(0);

    pub fn full(field_count: usize) -> Self {
        debug_assert!(field_count <= MAX_FIELDS);
        if field_count >= MAX_FIELDS {
            Self(u32::MAX)
        } else {
            Self((1u32 << field_count) - 1)
        }
    }

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn set(&mut self, index: usize) {
        self.0 |= 1 << index;
    }

    #[inline]
    pub fn is_set(self, index: usize) -> bool {
        index < MAX_FIELDS && self.0 & (1 << index) != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn count(self) -> u32 {
        self.0.count_ones()
    }

    pub fn fits(self, field_count: usize) -> bool {
        self.0 & !Self::full(field_count).0 == 0
    }

    pub fn iter(self) -> impl Iterator<Item = usize> {
        (0..MAX_FIELDS).filter(move |&i| self.is_set(i))
    }
}

impl fmt::Debug for ChangeMask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ChangeMask({:#b})", self.0)
    }
}

impl WireEncode for ChangeMask {
    fn encode(&self, w: &mut WireWriter) {
        w.write(&self.0);
    }
}

impl WireDecode for ChangeMask {
    fn decode(r: &mut WireReader<'_>) -> Result<Self, CodecError> {
        Ok(Self(r.read()?))
    }
}

/// A replicated entity kind with a fixed, ordered field schema.
///
/// `encode_field`/`decode_field` must agree with `FIELDS` index for index.
/// The entity ID is carried outside the schema.
pub trait Replicated: Clone + PartialEq + fmt::Debug {
    const KIND: EntityKind;
    const FIELDS: &'static [FieldDescriptor];

    fn id(&self) -> EntityId;

    /// A placeholder carrying only `id`, filled in by `decode_field`.
    fn blank(id: EntityId) -> Self;

    fn encode_field(&self, index: usize, w: &mut WireWriter);

    fn decode_field(&mut self, index: usize, r: &mut WireReader<'_>) -> Result<(), CodecError>;
}

/// Compares serialized field bytes, so floats compare bitwise and a
/// null/value transition always flips the presence byte.
pub fn compute_change_mask<E: Replicated>(old: &E, new: &E) -> ChangeMask {
    let mut mask = ChangeMask::EMPTY;
    let mut a = WireWriter::with_capacity(32);
    let mut b = WireWriter::with_capacity(32);
    for index in 0..E::FIELDS.len() {
        a.clear();
        b.clear();
        old.encode_field(index, &mut a);
        new.encode_field(index, &mut b);
        if a.as_slice() != b.as_slice() {
            mask.set(index);
        }
    }
    mask
}

pub fn serialize_masked<E: Replicated>(w: &mut WireWriter, entity: &E, mask: ChangeMask) {
    for index in mask.iter().take_while(|&i| i < E::FIELDS.len()) {
        entity.encode_field(index, w);
    }
}

/// Reads only masked fields into `entity`; everything else is left as is.
pub fn deserialize_masked<E: Replicated>(
    r: &mut WireReader<'_>,
    entity: &mut E,
    mask: ChangeMask,
) -> Result<(), CodecError> {
    if !mask.fits(E::FIELDS.len()) {
        return Err(CodecError::InvalidMask {
            mask: mask.bits(),
            field_count: E::FIELDS.len(),
        });
    }
    for index in mask.iter() {
        entity.decode_field(index, r)?;
    }
    Ok(())
}

pub fn copy_masked<E: Replicated>(
    target: &mut E,
    source: &E,
    mask: ChangeMask,
) -> Result<(), CodecError> {
    let mut w = WireWriter::with_capacity(64);
    serialize_masked(&mut w, source, mask);
    let mut r = WireReader::new(w.as_slice());
    deserialize_masked(&mut r, target, mask)?;
    r.finish()
}

pub fn encode_full<E: Replicated>(w: &mut WireWriter, entity: &E) {
    w.write(&entity.id());
    serialize_masked(w, entity, ChangeMask::full(E::FIELDS.len()));
}

pub fn decode_full<E: Replicated>(r: &mut WireReader<'_>) -> Result<E, CodecError> {
    let mut entity = E::blank(r.read()?);
    deserialize_masked(r, &mut entity, ChangeMask::full(E::FIELDS.len()))?;
    Ok(entity)
}
