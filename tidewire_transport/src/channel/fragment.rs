//! Splitting large messages into fragments, and putting them back together
use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use bytes::{Bytes, BytesMut};
use tracing::trace;

use crate::error::{Result, TransportError};
use crate::message::{
    FragmentIndex, FragmentInfo, Message, MessageChannelId, MessageSequenceId, MessageTimestamp,
    MessageType,
};

/// Maximum number of fragments a message can be split into
pub const MAX_FRAGMENTS: usize = FragmentIndex::MAX as usize + 1;

/// Split a message into fragments carrying at most `fragment_data_bytes` bytes each.
///
/// Every fragment keeps the header of the original message (type, channel, sequence id,
/// timestamp). The fragments share the original payload buffer.
/// A message with an empty payload cannot be fragmented and is returned unchanged.
pub fn split_into_fragments(message: Message, fragment_data_bytes: usize) -> Result<Vec<Message>> {
    debug_assert!(fragment_data_bytes > 0);
    debug_assert!(
        !message.is_fragment(),
        "cannot fragment a message that is already a fragment"
    );
    if !message.has_data() {
        return Ok(alloc::vec![message]);
    }
    let num_fragments = message.payload().len().div_ceil(fragment_data_bytes);
    if num_fragments > MAX_FRAGMENTS {
        return Err(TransportError::TooManyFragments { num_fragments });
    }
    let payload = message.payload().clone();
    trace!(
        sequence_id = ?message.sequence_id(),
        num_fragments,
        "splitting message into fragments"
    );
    Ok(payload
        .chunks(fragment_data_bytes)
        .enumerate()
        .map(|(index, chunk)| {
            message
                .duplicate()
                .with_payload(payload.slice_ref(chunk))
                .with_fragment(FragmentInfo {
                    index: index as FragmentIndex,
                    is_final: index + 1 == num_fragments,
                })
        })
        .collect())
}

/// Data structure to reconstruct a single message from its fragments.
///
/// Fragments can be added in any order. The message is complete once the final fragment
/// has been received, along with every fragment before it.
#[derive(Debug)]
pub struct FragmentedMessage {
    message_type: MessageType,
    channel_id: MessageChannelId,
    sequence_id: MessageSequenceId,
    timestamp: Option<MessageTimestamp>,
    fragments: BTreeMap<FragmentIndex, Bytes>,
    /// Index of the fragment flagged as final, once it has been received
    final_index: Option<FragmentIndex>,
}

impl FragmentedMessage {
    /// Start reassembling a message from one of its fragments
    pub fn new(fragment: Message) -> Self {
        debug_assert!(fragment.is_fragment());
        let mut fragmented = Self {
            message_type: fragment.message_type(),
            channel_id: fragment.channel_id(),
            sequence_id: fragment.sequence_id(),
            timestamp: fragment.timestamp(),
            fragments: BTreeMap::new(),
            final_index: None,
        };
        fragmented.add(fragment);
        fragmented
    }

    pub fn sequence_id(&self) -> MessageSequenceId {
        self.sequence_id
    }

    pub fn num_received(&self) -> usize {
        self.fragments.len()
    }

    pub fn contains(&self, index: FragmentIndex) -> bool {
        self.fragments.contains_key(&index)
    }

    /// Returns true if this fragment of the message was already received
    pub fn is_duplicate(&self, fragment: &Message) -> bool {
        fragment
            .fragment()
            .is_some_and(|info| self.contains(info.index))
    }

    /// Add a fragment of the message.
    ///
    /// Returns false (and leaves the message untouched) if the fragment is a duplicate,
    /// belongs to another message, or contradicts the final fragment index.
    pub fn add(&mut self, fragment: Message) -> bool {
        let Some(info) = fragment.fragment() else {
            return false;
        };
        if fragment.sequence_id() != self.sequence_id || self.contains(info.index) {
            return false;
        }
        match self.final_index {
            Some(final_index) if info.is_final || info.index > final_index => {
                trace!(?info, final_index, "fragment past the final fragment");
                return false;
            }
            None if info.is_final
                && self
                    .fragments
                    .last_key_value()
                    .is_some_and(|(&last, _)| last > info.index) =>
            {
                trace!(?info, "final fragment before an already received fragment");
                return false;
            }
            _ => {}
        }
        if info.is_final {
            self.final_index = Some(info.index);
        }
        self.fragments.insert(info.index, fragment.into_payload());
        true
    }

    pub fn is_complete(&self) -> bool {
        self.final_index
            .is_some_and(|final_index| self.fragments.len() == final_index as usize + 1)
    }

    /// Concatenate the fragments back into the original message
    pub fn reconstruct(self) -> Message {
        debug_assert!(self.is_complete());
        let size = self.fragments.values().map(Bytes::len).sum();
        let mut payload = BytesMut::with_capacity(size);
        for bytes in self.fragments.into_values() {
            payload.extend_from_slice(&bytes);
        }
        let message = Message::new(self.message_type, payload.freeze())
            .with_channel_id(self.channel_id)
            .with_sequence_id(self.sequence_id);
        match self.timestamp {
            Some(timestamp) => message.with_timestamp(timestamp),
            None => message,
        }
    }
}
