mod call;
mod table;

use log::warn;

use crate::net::{Channel, Message, ProtocolError};

pub use call::RpcCall;
pub use table::{by_id, by_name, ExecutionSide, RpcDescriptor, RPC_TABLE};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RpcError {
    #[error("no rpc registered as {0:?}")]
    UnknownName(String),
    #[error("arguments for {actual} passed to {requested}")]
    ArgumentMismatch {
        requested: &'static str,
        actual: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Dispatch {
    Local(RpcCall),
    Remote { channel: Channel, payload: Vec<u8> },
}

#[derive(Debug, Clone, Copy)]
pub struct RpcDispatcher {
    local: ExecutionSide,
}

impl RpcDispatcher {
    pub fn new(local: ExecutionSide) -> Self {
        Self { local }
    }

    pub fn local_side(&self) -> ExecutionSide {
        self.local
    }

    pub fn lookup(name: &str) -> Result<&'static RpcDescriptor, RpcError> {
        by_name(name).ok_or_else(|| RpcError::UnknownName(name.to_owned()))
    }

    pub fn dispatch(&self, call: RpcCall) -> Dispatch {
        let descriptor = call.descriptor();
        if descriptor.side == self.local {
            Dispatch::Local(call)
        } else {
            Dispatch::Remote {
                channel: descriptor.channel,
                payload: Message::Rpc(call).encode(),
            }
        }
    }

    pub fn call(&self, name: &str, args: RpcCall) -> Result<Dispatch, RpcError> {
        let descriptor = Self::lookup(name)?;
        if descriptor.id != args.id() {
            return Err(RpcError::ArgumentMismatch {
                requested: descriptor.name,
                actual: args.name(),
            });
        }
        Ok(self.dispatch(args))
    }

    pub fn receive(&self, bytes: &[u8]) -> Result<Message, ProtocolError> {
        let message = Message::decode(bytes)?;
        match &message {
            Message::StateSync(_) if self.local == ExecutionSide::Server => {
                Err(ProtocolError::UnexpectedStateSync)
            }
            Message::Rpc(call) if call.descriptor().side != self.local => {
                let descriptor = call.descriptor();
                warn!("rejecting {} received on the wrong side", descriptor.name);
                Err(ProtocolError::WrongSide {
                    name: descriptor.name,
                    expected: descriptor.side,
                })
            }
            _ => Ok(message),
        }
    }
}
