//! Receiving side of a link: dispatches incoming messages to their channel
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::mem;

use tracing::{debug, trace, warn};

use crate::channel::builder::{ChannelSettings, TransferMode};
use crate::channel::receiver::InMessageChannel;
use crate::config::TransportConfig;
use crate::message::{Message, MessageChannelId, ProtocolMessageType};
use crate::packet::packet::InPacket;

/// Lifecycle notifications about the incoming channels, for the application
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelEvent {
    /// The remote peer opened a channel
    Opened {
        channel_id: MessageChannelId,
        transfer_mode: TransferMode,
    },
    /// Every message of a closed channel has been released and the channel was deleted
    Closed { channel_id: MessageChannelId },
}

/// Owns the incoming channels of a link.
///
/// Channels are created when their [`ProtocolMessageType::ChannelOpened`] message arrives, and
/// deleted once their [`ProtocolMessageType::ChannelClosed`] message has been received and every
/// message they still owed has been released.
#[derive(Debug)]
pub struct Inbox {
    max_fragmented_messages: usize,
    /// Sorted so that [`release`](Inbox::release) visits channels in a deterministic order
    channels: BTreeMap<MessageChannelId, InMessageChannel>,
    /// Channels that were deleted. A late duplicate of their `ChannelOpened` message must not
    /// create them again.
    retired: BTreeSet<MessageChannelId>,
    events: Vec<ChannelEvent>,
}

impl Inbox {
    pub fn new(config: &TransportConfig) -> Self {
        let mut default_channel = InMessageChannel::new(
            MessageChannelId::DEFAULT,
            ChannelSettings::new(TransferMode::Immediate)
                .with_max_fragmented_messages(config.max_fragmented_messages),
        );
        default_channel.open();
        let mut channels = BTreeMap::new();
        channels.insert(MessageChannelId::DEFAULT, default_channel);
        Self {
            max_fragmented_messages: config.max_fragmented_messages,
            channels,
            retired: BTreeSet::new(),
            events: Vec::new(),
        }
    }

    pub fn channel(&self, channel_id: MessageChannelId) -> Option<&InMessageChannel> {
        self.channels.get(&channel_id)
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Take the channel events that happened since the last call
    pub fn drain_events(&mut self) -> Vec<ChannelEvent> {
        mem::take(&mut self.events)
    }

    /// Dispatch every message of the packet. Returns the number of messages accepted.
    pub fn receive_packet(&mut self, packet: InPacket) -> usize {
        let mut accepted = 0;
        for message in packet.into_messages() {
            if self.receive_message(message) {
                accepted += 1;
            }
        }
        accepted
    }

    /// Push a single message into its channel. Returns true if the channel accepted it.
    pub fn receive_message(&mut self, message: Message) -> bool {
        let channel_id = message.channel_id();
        if !self.channels.contains_key(&channel_id) && !self.try_create_channel(&message) {
            if self.retired.contains(&channel_id) {
                trace!(
                    ?channel_id,
                    sequence_id = ?message.sequence_id(),
                    "message for a deleted channel"
                );
                return false;
            }
            warn!(
                ?channel_id,
                sequence_id = ?message.sequence_id(),
                "message for an unknown channel"
            );
            #[cfg(feature = "metrics")]
            metrics::counter!("transport::inbox::unknown_channel").increment(1);
            return false;
        }
        let Some(channel) = self.channels.get_mut(&channel_id) else {
            return false;
        };
        let closes_channel = !channel_id.is_default()
            && !message.is_fragment()
            && message.protocol_type() == Some(ProtocolMessageType::ChannelClosed);
        let sequence_id = message.sequence_id();
        let accepted = channel.push(message);
        if accepted && closes_channel && !channel.is_closed() {
            channel.close(sequence_id);
        }
        accepted
    }

    /// Create the channel announced by a `ChannelOpened` message
    fn try_create_channel(&mut self, message: &Message) -> bool {
        if message.protocol_type() != Some(ProtocolMessageType::ChannelOpened)
            || message.is_fragment()
        {
            return false;
        }
        let channel_id = message.channel_id();
        if self.retired.contains(&channel_id) {
            return false;
        }
        let Some(transfer_mode) = message
            .payload()
            .first()
            .and_then(|byte| TransferMode::try_from(*byte).ok())
        else {
            warn!(?channel_id, "invalid transfer mode in ChannelOpened message");
            return false;
        };
        let mut channel = InMessageChannel::new(
            channel_id,
            ChannelSettings::new(transfer_mode)
                .with_max_fragmented_messages(self.max_fragmented_messages),
        );
        channel.open();
        self.channels.insert(channel_id, channel);
        self.events.push(ChannelEvent::Opened {
            channel_id,
            transfer_mode,
        });
        true
    }

    /// Take the messages that every channel is ready to release.
    ///
    /// Channel control messages are consumed here and not returned. Channels that are closed
    /// and have nothing left to release are deleted.
    pub fn release(&mut self) -> Vec<Message> {
        let mut released = Vec::new();
        for (channel_id, channel) in self.channels.iter_mut() {
            for message in channel.release() {
                if is_channel_control(*channel_id, &message) {
                    trace!(?channel_id, sequence_id = ?message.sequence_id(), "consumed control message");
                    continue;
                }
                released.push(message);
            }
        }
        #[cfg(feature = "metrics")]
        metrics::counter!("transport::inbox::released").increment(released.len() as u64);
        let retired = &mut self.retired;
        let events = &mut self.events;
        self.channels.retain(|channel_id, channel| {
            let delete = channel.ready_to_delete();
            if delete {
                debug!(?channel_id, "deleting closed channel");
                retired.insert(*channel_id);
                events.push(ChannelEvent::Closed {
                    channel_id: *channel_id,
                });
            }
            !delete
        });
        released
    }
}

fn is_channel_control(channel_id: MessageChannelId, message: &Message) -> bool {
    !channel_id.is_default()
        && matches!(
            message.protocol_type(),
            Some(ProtocolMessageType::ChannelOpened | ProtocolMessageType::ChannelClosed)
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{MessageSequenceId, MessageType};
    use crate::outbox::Outbox;
    use alloc::vec;
    use test_log::test;

    fn data(value: u8) -> Message {
        Message::new(MessageType::custom(0), vec![value])
    }

    fn payloads(messages: &[Message]) -> Vec<u8> {
        messages.iter().map(|m| m.payload()[0]).collect()
    }

    #[test]
    fn test_default_channel_always_exists() {
        let config = TransportConfig::default();
        let mut outbox = Outbox::new(&config);
        let mut inbox = Inbox::new(&config);
        outbox.send(MessageChannelId::DEFAULT, data(1)).unwrap();
        outbox.send(MessageChannelId::DEFAULT, data(2)).unwrap();
        for message in outbox.drain_queued().into_iter().rev() {
            assert!(inbox.receive_message(message));
        }
        assert_eq!(payloads(&inbox.release()), vec![2, 1]);
        assert_eq!(inbox.num_channels(), 1);
    }

    #[test]
    fn test_unknown_channel_is_dropped() {
        let mut inbox = Inbox::new(&TransportConfig::default());
        let message = data(1)
            .with_channel_id(MessageChannelId(4))
            .with_sequence_id(MessageSequenceId(2));
        assert!(!inbox.receive_message(message));
        assert!(inbox.channel(MessageChannelId(4)).is_none());
    }

    #[test]
    fn test_channel_lifecycle() {
        let config = TransportConfig::default();
        let mut outbox = Outbox::new(&config);
        let mut inbox = Inbox::new(&config);

        let channel_id = outbox.open_channel(TransferMode::Ordered).unwrap();
        for value in 1..=3 {
            outbox.send(channel_id, data(value)).unwrap();
        }
        outbox.close_channel(channel_id).unwrap();
        let mut queued = outbox.drain_queued();
        // opened, 1, 2, 3, closed: lose message 2 for now
        let second = queued.remove(2);
        for message in queued {
            assert!(inbox.receive_message(message));
        }

        assert_eq!(
            inbox.drain_events(),
            vec![ChannelEvent::Opened {
                channel_id,
                transfer_mode: TransferMode::Ordered
            }]
        );
        let channel = inbox.channel(channel_id).unwrap();
        assert_eq!(channel.transfer_mode(), TransferMode::Ordered);
        assert_eq!(channel.final_sequence_id(), Some(MessageSequenceId(5)));
        assert_eq!(payloads(&inbox.release()), vec![1]);
        assert_eq!(inbox.num_channels(), 2);
        assert!(inbox.drain_events().is_empty());

        assert!(inbox.receive_message(second.duplicate()));
        assert!(!inbox.receive_message(second));
        assert_eq!(payloads(&inbox.release()), vec![2, 3]);
        // everything was released: the channel is gone
        assert!(inbox.channel(channel_id).is_none());
        assert_eq!(inbox.num_channels(), 1);
        assert_eq!(
            inbox.drain_events(),
            vec![ChannelEvent::Closed { channel_id }]
        );
    }

    #[test]
    fn test_late_channel_opened_does_not_recreate_channel() {
        let config = TransportConfig::default();
        let mut outbox = Outbox::new(&config);
        let mut inbox = Inbox::new(&config);
        let channel_id = outbox.open_channel(TransferMode::Immediate).unwrap();
        outbox.close_channel(channel_id).unwrap();
        let queued = outbox.drain_queued();
        let late_copy = queued[0].duplicate();
        let late_close = queued[1].duplicate();
        for message in queued {
            assert!(inbox.receive_message(message));
        }
        assert!(inbox.release().is_empty());
        assert!(inbox.channel(channel_id).is_none());

        assert!(!inbox.receive_message(late_copy));
        assert!(!inbox.receive_message(late_close));
        assert!(inbox.channel(channel_id).is_none());
        // opened then closed, once
        assert_eq!(
            inbox.drain_events(),
            vec![
                ChannelEvent::Opened {
                    channel_id,
                    transfer_mode: TransferMode::Immediate
                },
                ChannelEvent::Closed { channel_id }
            ]
        );
    }

    #[test]
    fn test_invalid_transfer_mode() {
        let mut inbox = Inbox::new(&TransportConfig::default());
        let opened = Message::new(ProtocolMessageType::ChannelOpened, vec![9])
            .with_channel_id(MessageChannelId(1))
            .with_sequence_id(MessageSequenceId(1));
        assert!(!inbox.receive_message(opened));
        assert_eq!(inbox.num_channels(), 1);
        assert!(inbox.drain_events().is_empty());
    }
}
