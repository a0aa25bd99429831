mod channel;
pub mod codec;
mod protocol;
mod rtt;
mod transport;

pub use channel::Channel;
pub use codec::{CodecError, WireDecode, WireEncode, WireReader, WireWriter};
pub use protocol::{Message, ProtocolError, StateSync, MAX_PACKET_SIZE, STATE_SYNC_ID};
pub use rtt::{RttEstimator, SendTimes};
pub use transport::{
    LinkConditions, LoopbackEndpoint, LoopbackNetwork, NetworkStats, PeerId, Transport,
    TransportError, TransportEvent,
};
