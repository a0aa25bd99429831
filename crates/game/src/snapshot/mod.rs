mod ack_cache;
mod buffer;
mod diff;
mod entity;
mod schema;
mod world;

pub use ack_cache::{AckCache, AckOutcome, DEFAULT_MAX_CACHED_SNAPSHOTS};
pub use buffer::{SnapshotBuffer, DEFAULT_BUFFER_SIZE};
pub use diff::{apply, diff, DiffSet, EntityUpdate, KindDiff};
pub use entity::{
    Grenade, Player, PlayerFlags, Rocket, Spawner, WeaponKind, WeaponPickup, GRENADE_FUSE_SECS,
    PLAYER_MAX_HEALTH, PLAYER_START_AMMO, PLAYER_START_GRENADES,
};
pub use schema::{
    compute_change_mask, copy_masked, decode_full, deserialize_masked, encode_full,
    serialize_masked, ChangeMask, EntityId, EntityKind, FieldDescriptor, FieldType, Replicated,
    MAX_FIELDS,
};
pub use world::{EntityTable, World, WorldSnapshot};
