//! Settings describing how a channel delivers its messages
use serde::{Deserialize, Serialize};
use tidewire_serde::SerializationError;

use crate::config::DEFAULT_MAX_FRAGMENTED_MESSAGES;

/// Delivery guarantee of an incoming channel.
///
/// Whatever the mode, a message is released at most once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransferMode {
    /// Messages are released as soon as they are received, in arrival order
    #[default]
    Immediate = 0,
    /// Messages are released as soon as they are received, but messages older than
    /// the most recent one released are dropped
    Sequenced = 1,
    /// Messages are released in sequence id order, without gaps.
    /// A message is held back until every message before it has been released.
    Ordered = 2,
}

impl From<TransferMode> for u8 {
    fn from(value: TransferMode) -> Self {
        value as u8
    }
}

impl TryFrom<u8> for TransferMode {
    type Error = SerializationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Immediate),
            1 => Ok(Self::Sequenced),
            2 => Ok(Self::Ordered),
            _ => Err(SerializationError::InvalidValue("TransferMode")),
        }
    }
}

/// [`ChannelSettings`] are used to specify how an incoming channel behaves
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelSettings {
    pub mode: TransferMode,
    /// Maximum number of messages that can be reassembled from fragments at the same time.
    /// Fragments starting a new message beyond this limit are dropped.
    pub max_fragmented_messages: usize,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self {
            mode: TransferMode::default(),
            max_fragmented_messages: DEFAULT_MAX_FRAGMENTED_MESSAGES,
        }
    }
}

impl ChannelSettings {
    pub fn new(mode: TransferMode) -> Self {
        Self {
            mode,
            ..Default::default()
        }
    }

    pub fn with_max_fragmented_messages(mut self, max_fragmented_messages: usize) -> Self {
        self.max_fragmented_messages = max_fragmented_messages;
        self
    }
}
