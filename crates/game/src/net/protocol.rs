use crate::rpc::{ExecutionSide, RpcCall};
use crate::snapshot::DiffSet;

use super::channel::Channel;
use super::codec::{CodecError, WireReader, WireWriter};

pub const MAX_PACKET_SIZE: usize = 1200;

/// Message type reserved for state sync; RPC ids start at 1.
pub const STATE_SYNC_ID: u8 = 0;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProtocolError {
    #[error("empty message")]
    Empty,
    #[error("unknown message type {0}")]
    UnknownMessage(u8),
    #[error("rpc {name} must execute on the {expected:?} side")]
    WrongSide {
        name: &'static str,
        expected: ExecutionSide,
    },
    #[error("state sync received by the server")]
    UnexpectedStateSync,
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateSync {
    pub sequence: u32,
    pub baseline: u32,
    pub diff: DiffSet,
}

impl StateSync {
    pub fn channel_for(encoded_len: usize) -> Channel {
        if encoded_len <= MAX_PACKET_SIZE {
            Channel::UnreliableStateUpdate
        } else {
            Channel::UnreliableFragmented
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    StateSync(StateSync),
    Rpc(RpcCall),
}

impl Message {
    pub fn type_id(&self) -> u8 {
        match self {
            Self::StateSync(_) => STATE_SYNC_ID,
            Self::Rpc(call) => call.id(),
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut w = WireWriter::with_capacity(64);
        w.write_u8(self.type_id());
        match self {
            Self::StateSync(sync) => {
                w.write(&sync.sequence);
                w.write(&sync.baseline);
                sync.diff.encode(&mut w);
            }
            Self::Rpc(call) => call.encode_args(&mut w),
        }
        w.into_bytes()
    }

    /// All or nothing: any truncation, unknown id or leftover byte fails the
    /// whole message.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let mut r = WireReader::new(bytes);
        let type_id = r.read_u8().map_err(|_| ProtocolError::Empty)?;

        let message = if type_id == STATE_SYNC_ID {
            Self::StateSync(StateSync {
                sequence: r.read()?,
                baseline: r.read()?,
                diff: DiffSet::decode(&mut r)?,
            })
        } else {
            match RpcCall::decode_args(type_id, &mut r)? {
                Some(call) => Self::Rpc(call),
                None => return Err(ProtocolError::UnknownMessage(type_id)),
            }
        };

        r.finish()?;
        Ok(message)
    }
}
