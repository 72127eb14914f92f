use crate::channel::builder::TransferMode;
use crate::message::{Message, MessageChannelId, MessageSequenceId};

/// Sending side of a channel: stamps outgoing messages with consecutive sequence ids
#[derive(Debug)]
pub struct OutMessageChannel {
    channel_id: MessageChannelId,
    transfer_mode: TransferMode,
    /// Last id handed out, [`MessageSequenceId::INVALID`] until the first message
    last_sequence_id: MessageSequenceId,
}

impl OutMessageChannel {
    pub fn new(channel_id: MessageChannelId, transfer_mode: TransferMode) -> Self {
        Self {
            channel_id,
            transfer_mode,
            last_sequence_id: MessageSequenceId::INVALID,
        }
    }

    pub fn channel_id(&self) -> MessageChannelId {
        self.channel_id
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.transfer_mode
    }

    /// Id of the last message sent on this channel
    pub fn last_sequence_id(&self) -> MessageSequenceId {
        self.last_sequence_id
    }

    /// Reserve the next sequence id. The first id is `1`.
    ///
    /// # Panics
    ///
    /// Panics if every id of the channel has been used.
    pub fn acquire_next_sequence_id(&mut self) -> MessageSequenceId {
        self.last_sequence_id = self
            .last_sequence_id
            .next()
            .unwrap_or_else(|| panic!("channel {:?} ran out of sequence ids", self.channel_id));
        self.last_sequence_id
    }

    /// Assign this channel and its next sequence id to the message
    pub fn stamp(&mut self, message: Message) -> Message {
        let sequence_id = self.acquire_next_sequence_id();
        message
            .with_channel_id(self.channel_id)
            .with_sequence_id(sequence_id)
    }
}
