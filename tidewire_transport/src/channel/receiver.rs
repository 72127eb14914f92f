//! Receiving side of a channel
use alloc::collections::{BTreeMap, btree_map};
use alloc::vec::Vec;
use core::mem;

use tracing::{debug, trace};

use crate::channel::builder::{ChannelSettings, TransferMode};
use crate::channel::fragment::FragmentedMessage;
use crate::channel::sequence::MessageSequence;
use crate::message::{Message, MessageChannelId, MessageSequenceId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelState {
    /// Created but not opened yet: no message can be pushed
    Unopened,
    Open,
    /// No message with an id greater than `final_sequence_id` will ever be accepted
    Closed {
        final_sequence_id: MessageSequenceId,
    },
}

enum FragmentOutcome {
    Rejected,
    /// The fragment was stored, the message is still missing some fragments
    Buffered,
    Complete(Message),
}

/// Receiving side of a channel.
///
/// Messages are pushed in whatever order the network delivers them. The channel drops
/// duplicates, reassembles fragmented messages, and makes messages available through
/// [`release`](InMessageChannel::release) according to its [`TransferMode`].
#[derive(Debug)]
pub struct InMessageChannel {
    channel_id: MessageChannelId,
    settings: ChannelSettings,
    state: ChannelState,
    /// Ids of every message accepted so far (fragments count once their message is complete)
    sequence: MessageSequence,
    /// Id of the last accepted message, used to drop stale messages in [`TransferMode::Sequenced`]
    last_sequence_id: MessageSequenceId,
    /// Id of the last message released by [`TransferMode::Ordered`]
    last_released_id: MessageSequenceId,
    /// Accepted messages waiting to be released, for the unordered modes
    ready: Vec<Message>,
    /// Accepted messages waiting for the messages before them, for [`TransferMode::Ordered`]
    pending: BTreeMap<MessageSequenceId, Message>,
    fragmented: BTreeMap<MessageSequenceId, FragmentedMessage>,
}

impl InMessageChannel {
    pub fn new(channel_id: MessageChannelId, settings: ChannelSettings) -> Self {
        Self {
            channel_id,
            settings,
            state: ChannelState::Unopened,
            sequence: MessageSequence::new(),
            last_sequence_id: MessageSequenceId::INVALID,
            last_released_id: MessageSequenceId::INVALID,
            ready: Vec::new(),
            pending: BTreeMap::new(),
            fragmented: BTreeMap::new(),
        }
    }

    pub fn channel_id(&self) -> MessageChannelId {
        self.channel_id
    }

    pub fn transfer_mode(&self) -> TransferMode {
        self.settings.mode
    }

    pub fn is_open(&self) -> bool {
        self.state == ChannelState::Open
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ChannelState::Closed { .. })
    }

    /// The last id this channel accepts, once it has been closed
    pub fn final_sequence_id(&self) -> Option<MessageSequenceId> {
        match self.state {
            ChannelState::Closed { final_sequence_id } => Some(final_sequence_id),
            _ => None,
        }
    }

    pub fn last_sequence_id(&self) -> MessageSequenceId {
        self.last_sequence_id
    }

    pub fn sequence(&self) -> &MessageSequence {
        &self.sequence
    }

    /// Number of messages currently being reassembled from fragments
    pub fn num_fragmented(&self) -> usize {
        self.fragmented.len()
    }

    /// Start accepting messages. The next expected sequence id is `1`.
    ///
    /// # Panics
    ///
    /// Panics if the channel was already opened.
    pub fn open(&mut self) {
        assert_eq!(
            self.state,
            ChannelState::Unopened,
            "channel {:?} was already opened",
            self.channel_id
        );
        self.state = ChannelState::Open;
        self.sequence = MessageSequence::new();
        debug!(channel_id = ?self.channel_id, mode = ?self.settings.mode, "opened channel");
    }

    /// Stop accepting messages after `final_sequence_id`.
    ///
    /// Ordered channels keep accepting the missing messages up to the final id, the other
    /// modes stop accepting anything. Messages past the final id that were already accepted,
    /// and reassemblies that can no longer complete, are dropped.
    ///
    /// # Panics
    ///
    /// Panics if the channel was already closed.
    pub fn close(&mut self, final_sequence_id: MessageSequenceId) {
        assert!(
            !self.is_closed(),
            "channel {:?} was already closed",
            self.channel_id
        );
        self.state = ChannelState::Closed { final_sequence_id };
        match self.settings.mode {
            TransferMode::Ordered => {
                self.pending.retain(|id, _| *id <= final_sequence_id);
                self.fragmented.retain(|id, _| *id <= final_sequence_id);
            }
            TransferMode::Immediate | TransferMode::Sequenced => self.fragmented.clear(),
        }
        debug!(channel_id = ?self.channel_id, ?final_sequence_id, "closed channel");
    }

    /// Returns true if this message (or this fragment of it) was already received
    pub fn is_duplicate(&self, message: &Message) -> bool {
        let id = message.sequence_id();
        if self.sequence.is_verified(id) {
            return true;
        }
        message.is_fragment()
            && self
                .fragmented
                .get(&id)
                .is_some_and(|fragmented| fragmented.is_duplicate(message))
    }

    /// Push a message (or a fragment of a message) received from the network.
    ///
    /// Returns true if the message was accepted. A fragment is accepted if it was stored,
    /// even if its message is not complete yet.
    pub fn push(&mut self, message: Message) -> bool {
        debug_assert_eq!(message.channel_id(), self.channel_id);
        let id = message.sequence_id();
        if !self.is_acceptable(id) || self.is_duplicate(&message) {
            trace!(channel_id = ?self.channel_id, ?id, "rejected message");
            #[cfg(feature = "metrics")]
            metrics::counter!("transport::channel::receive::rejected").increment(1);
            return false;
        }
        if !message.is_fragment() {
            return self.accept(message);
        }
        match self.push_fragment(message) {
            FragmentOutcome::Rejected => false,
            FragmentOutcome::Buffered => true,
            FragmentOutcome::Complete(message) => self.accept(message),
        }
    }

    /// Checks that depend only on the sequence id and the channel state
    fn is_acceptable(&self, id: MessageSequenceId) -> bool {
        if !id.is_valid() || self.state == ChannelState::Unopened {
            return false;
        }
        if let ChannelState::Closed { final_sequence_id } = self.state {
            if self.settings.mode != TransferMode::Ordered || id > final_sequence_id {
                return false;
            }
        }
        match self.settings.mode {
            // accepting an id slides the window past every id before it
            TransferMode::Immediate => self.sequence.is_within_reach(id),
            TransferMode::Sequenced => {
                id >= self.last_sequence_id && self.sequence.is_within_reach(id)
            }
            // ordered channels cannot slide the window: every id must be released
            TransferMode::Ordered => self.sequence.can_track(id),
        }
    }

    fn push_fragment(&mut self, fragment: Message) -> FragmentOutcome {
        let id = fragment.sequence_id();
        let num_fragmented = self.fragmented.len();
        match self.fragmented.entry(id) {
            btree_map::Entry::Occupied(mut entry) => {
                if !entry.get_mut().add(fragment) {
                    return FragmentOutcome::Rejected;
                }
                if entry.get().is_complete() {
                    FragmentOutcome::Complete(entry.remove().reconstruct())
                } else {
                    FragmentOutcome::Buffered
                }
            }
            btree_map::Entry::Vacant(entry) => {
                let fragmented = FragmentedMessage::new(fragment);
                if fragmented.is_complete() {
                    return FragmentOutcome::Complete(fragmented.reconstruct());
                }
                if num_fragmented >= self.settings.max_fragmented_messages {
                    debug!(
                        channel_id = ?self.channel_id,
                        ?id,
                        "too many messages being reassembled, dropping fragment"
                    );
                    return FragmentOutcome::Rejected;
                }
                entry.insert(fragmented);
                FragmentOutcome::Buffered
            }
        }
    }

    /// Accept a whole message
    fn accept(&mut self, message: Message) -> bool {
        let id = message.sequence_id();
        match self.settings.mode {
            TransferMode::Immediate | TransferMode::Sequenced => {
                // a newer message may have been accepted while this one was being reassembled
                if self.settings.mode == TransferMode::Sequenced && id < self.last_sequence_id {
                    trace!(channel_id = ?self.channel_id, ?id, "dropping stale message");
                    return false;
                }
                self.sequence.verify(id);
                self.last_sequence_id = id;
                if self.settings.mode == TransferMode::Sequenced {
                    // older messages can never be released anymore
                    self.fragmented = self.fragmented.split_off(&id);
                }
                self.ready.push(message);
            }
            TransferMode::Ordered => {
                self.sequence.verify(id);
                if id > self.last_sequence_id {
                    self.last_sequence_id = id;
                }
                self.pending.insert(id, message);
            }
        }
        true
    }

    /// Take the messages that are ready to be handed to the application
    pub fn release(&mut self) -> Vec<Message> {
        match self.settings.mode {
            TransferMode::Immediate | TransferMode::Sequenced => mem::take(&mut self.ready),
            TransferMode::Ordered => {
                let mut released = Vec::new();
                while let Some(entry) = self.pending.first_entry() {
                    if Some(*entry.key()) != self.last_released_id.next() {
                        break;
                    }
                    self.last_released_id = *entry.key();
                    released.push(entry.remove());
                }
                released
            }
        }
    }

    /// Returns true once the channel is closed and has nothing left to receive or release
    pub fn ready_to_delete(&self) -> bool {
        let ChannelState::Closed { final_sequence_id } = self.state else {
            return false;
        };
        let received_everything = self.settings.mode != TransferMode::Ordered
            || self.sequence.verified_up_to() >= final_sequence_id;
        received_everything
            && self.ready.is_empty()
            && self.pending.is_empty()
            && self.fragmented.is_empty()
    }
}
