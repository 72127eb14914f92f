//! Sending side of a link: owns the outgoing channels and the messages waiting to be packed
use alloc::vec::Vec;
use core::mem;

use hashbrown::HashMap;
use tracing::{debug, trace};

use crate::channel::builder::TransferMode;
use crate::channel::sender::OutMessageChannel;
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::message::{Message, MessageChannelId, MessageSequenceId, ProtocolMessageType};

/// Stamps outgoing messages and queues them until they are packed into packets.
///
/// The default channel ([`MessageChannelId::DEFAULT`]) always exists. Other channels are opened
/// with [`open_channel`](Outbox::open_channel), which also queues the
/// [`ProtocolMessageType::ChannelOpened`] message that creates the channel on the remote side.
#[derive(Debug)]
pub struct Outbox {
    max_message_bytes: usize,
    default_channel: OutMessageChannel,
    channels: HashMap<MessageChannelId, OutMessageChannel>,
    next_channel_id: u16,
    queued: Vec<Message>,
}

impl Outbox {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            max_message_bytes: config.max_message_bytes,
            default_channel: OutMessageChannel::new(
                MessageChannelId::DEFAULT,
                TransferMode::Immediate,
            ),
            channels: HashMap::default(),
            next_channel_id: 1,
            queued: Vec::new(),
        }
    }

    pub fn channel(&self, channel_id: MessageChannelId) -> Option<&OutMessageChannel> {
        if channel_id.is_default() {
            return Some(&self.default_channel);
        }
        self.channels.get(&channel_id)
    }

    fn channel_mut(&mut self, channel_id: MessageChannelId) -> Result<&mut OutMessageChannel> {
        if channel_id.is_default() {
            return Ok(&mut self.default_channel);
        }
        self.channels
            .get_mut(&channel_id)
            .ok_or(TransportError::ChannelNotFound(channel_id))
    }

    /// Open a new channel. The remote side receives its transfer mode through a
    /// [`ProtocolMessageType::ChannelOpened`] message, which is the first message of the channel.
    pub fn open_channel(&mut self, transfer_mode: TransferMode) -> Result<MessageChannelId> {
        let channel_id = MessageChannelId(self.next_channel_id);
        self.next_channel_id = self
            .next_channel_id
            .checked_add(1)
            .ok_or(TransportError::ChannelIdsExhausted)?;
        let mut channel = OutMessageChannel::new(channel_id, transfer_mode);
        let opened = channel.stamp(Message::new(
            ProtocolMessageType::ChannelOpened,
            alloc::vec![u8::from(transfer_mode)],
        ));
        self.channels.insert(channel_id, channel);
        self.queued.push(opened);
        debug!(?channel_id, ?transfer_mode, "opened outgoing channel");
        Ok(channel_id)
    }

    /// Close a channel. The queued [`ProtocolMessageType::ChannelClosed`] message is the last
    /// message of the channel; its sequence id is returned.
    pub fn close_channel(&mut self, channel_id: MessageChannelId) -> Result<MessageSequenceId> {
        if channel_id.is_default() {
            return Err(TransportError::ChannelNotFound(channel_id));
        }
        let mut channel = self
            .channels
            .remove(&channel_id)
            .ok_or(TransportError::ChannelNotFound(channel_id))?;
        let closed = channel.stamp(Message::empty(ProtocolMessageType::ChannelClosed));
        let final_sequence_id = closed.sequence_id();
        self.queued.push(closed);
        debug!(?channel_id, ?final_sequence_id, "closed outgoing channel");
        Ok(final_sequence_id)
    }

    /// Stamp the message with the channel's next sequence id and queue it.
    pub fn send(
        &mut self,
        channel_id: MessageChannelId,
        message: Message,
    ) -> Result<MessageSequenceId> {
        let size = message.payload().len();
        if size > self.max_message_bytes {
            return Err(TransportError::MessageTooLarge {
                size,
                max: self.max_message_bytes,
            });
        }
        let message = self.channel_mut(channel_id)?.stamp(message);
        let sequence_id = message.sequence_id();
        trace!(?channel_id, ?sequence_id, size, "queued message");
        self.queued.push(message);
        Ok(sequence_id)
    }

    pub fn num_queued(&self) -> usize {
        self.queued.len()
    }

    /// Take every queued message, in the order they were sent
    pub fn drain_queued(&mut self) -> Vec<Message> {
        mem::take(&mut self.queued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::MessageType;
    use alloc::vec;
    use test_log::test;

    fn outbox() -> Outbox {
        Outbox::new(&TransportConfig::default())
    }

    #[test]
    fn test_send_on_default_channel() -> Result<()> {
        let mut outbox = outbox();
        let first = outbox.send(
            MessageChannelId::DEFAULT,
            Message::new(MessageType::custom(0), vec![1]),
        )?;
        let second = outbox.send(
            MessageChannelId::DEFAULT,
            Message::empty(MessageType::custom(1)),
        )?;
        assert_eq!(first, MessageSequenceId(1));
        assert_eq!(second, MessageSequenceId(2));

        let queued = outbox.drain_queued();
        assert_eq!(queued.len(), 2);
        assert!(!queued[0].is_channeled());
        assert_eq!(outbox.num_queued(), 0);
        Ok(())
    }

    #[test]
    fn test_open_and_close_channel() -> Result<()> {
        let mut outbox = outbox();
        let channel_id = outbox.open_channel(TransferMode::Ordered)?;
        assert_eq!(channel_id, MessageChannelId(1));
        assert_eq!(
            outbox.channel(channel_id).map(OutMessageChannel::transfer_mode),
            Some(TransferMode::Ordered)
        );

        let sent = outbox.send(channel_id, Message::new(MessageType::custom(0), vec![7]))?;
        // the ChannelOpened message took the first id
        assert_eq!(sent, MessageSequenceId(2));
        let final_id = outbox.close_channel(channel_id)?;
        assert_eq!(final_id, MessageSequenceId(3));
        assert!(outbox.channel(channel_id).is_none());

        let queued = outbox.drain_queued();
        assert_eq!(
            queued.iter().map(Message::protocol_type).collect::<Vec<_>>(),
            vec![
                Some(ProtocolMessageType::ChannelOpened),
                None,
                Some(ProtocolMessageType::ChannelClosed)
            ]
        );
        assert_eq!(queued[0].payload().as_ref(), &[2]);
        assert!(queued.iter().all(|m| m.channel_id() == channel_id));

        assert_eq!(
            outbox.send(channel_id, Message::empty(MessageType::custom(0))),
            Err(TransportError::ChannelNotFound(channel_id))
        );
        assert_eq!(
            outbox.close_channel(channel_id),
            Err(TransportError::ChannelNotFound(channel_id))
        );
        Ok(())
    }

    #[test]
    fn test_default_channel_cannot_be_closed() {
        let mut outbox = outbox();
        assert_eq!(
            outbox.close_channel(MessageChannelId::DEFAULT),
            Err(TransportError::ChannelNotFound(MessageChannelId::DEFAULT))
        );
    }

    #[test]
    fn test_message_too_large() {
        let mut outbox = Outbox::new(&TransportConfig {
            max_message_bytes: 4,
            ..Default::default()
        });
        assert_eq!(
            outbox.send(
                MessageChannelId::DEFAULT,
                Message::new(MessageType::custom(0), vec![0; 5])
            ),
            Err(TransportError::MessageTooLarge { size: 5, max: 4 })
        );
        assert_eq!(outbox.num_queued(), 0);
    }
}
