pub mod net;
pub mod rpc;
pub mod session;
pub mod simulation;
pub mod snapshot;

pub use net::{
    Channel, CodecError, LinkConditions, LoopbackEndpoint, LoopbackNetwork, Message,
    NetworkStats, PeerId, ProtocolError, StateSync, Transport, TransportError, TransportEvent,
    MAX_PACKET_SIZE,
};
pub use rpc::{Dispatch, ExecutionSide, RpcCall, RpcDispatcher, RpcError};
pub use session::{
    ClientConfig, ClientEvent, ClientSession, DisconnectReason, ServerConfig, ServerEvent,
    ServerSession, ServerStats,
};
pub use simulation::{FixedTimestep, LagCompensator, ReconcileConfig, Reconciler};
pub use snapshot::{
    AckCache, DiffSet, EntityId, EntityKind, Player, World, WorldSnapshot,
};
