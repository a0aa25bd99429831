use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Channel {
    ReliableSequenced = 0,
    Reliable = 1,
    UnreliableStateUpdate = 2,
    UnreliableFragmented = 3,
    Unreliable = 4,
}

impl Channel {
    pub fn is_reliable(self) -> bool {
        matches!(self, Self::ReliableSequenced | Self::Reliable)
    }

    pub fn is_ordered(self) -> bool {
        matches!(self, Self::ReliableSequenced)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reliability_classes() {
        assert!(Channel::ReliableSequenced.is_reliable());
        assert!(Channel::Reliable.is_reliable());
        assert!(!Channel::UnreliableStateUpdate.is_reliable());
        assert!(!Channel::UnreliableFragmented.is_reliable());
        assert!(!Channel::Unreliable.is_reliable());
        assert!(Channel::ReliableSequenced.is_ordered());
        assert!(!Channel::Reliable.is_ordered());
    }
}
