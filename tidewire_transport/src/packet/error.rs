use tidewire_serde::SerializationError;

use crate::packet::header::ProtocolId;

pub type Result<T> = core::result::Result<T, PacketError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PacketError {
    #[error("serialization error: {0}")]
    Serialization(#[from] SerializationError),
    #[error("packet has protocol id {received:?}, expected {expected:?}")]
    ProtocolMismatch {
        expected: ProtocolId,
        received: ProtocolId,
    },
    #[error("a packet of {max_packet_bits} bits cannot hold a single message fragment")]
    BudgetTooSmall { max_packet_bits: usize },
}
