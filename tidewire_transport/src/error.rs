use crate::message::MessageChannelId;
use crate::packet::error::PacketError;

pub type Result<T> = core::result::Result<T, TransportError>;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error(transparent)]
    SerializationError(#[from] tidewire_serde::SerializationError),
    #[error(transparent)]
    PacketError(#[from] PacketError),
    #[error("channel {0:?} was not found")]
    ChannelNotFound(MessageChannelId),
    #[error("all channel ids are in use")]
    ChannelIdsExhausted,
    #[error("message of {size} bytes exceeds the limit of {max} bytes")]
    MessageTooLarge { size: usize, max: usize },
    #[error("message would need {num_fragments} fragments, more than a fragment index can address")]
    TooManyFragments { num_fragments: usize },
}
