//! The [`Message`] unit exchanged over a link, and its wire format.
//!
//! A message is written as:
//! - message type (8 bits)
//! - sequence id (32 bits)
//! - payload size in bytes (16 bits)
//! - optional timestamp (presence bit + 32 bits)
//! - optional channel id (presence bit + 16 bits), absent for the default channel
//! - if the payload is not empty: a fragment bit, followed by the fragment index (16 bits)
//!   and a final-fragment bit when set
//! - the payload bytes
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tidewire_serde::{BitReader, BitSerialize, BitWrite, SerializationError};

pub const MESSAGE_TYPE_BITS: usize = 8;
pub const MESSAGE_SEQUENCE_ID_BITS: usize = 32;
pub const MESSAGE_DATA_SIZE_BITS: usize = 16;
pub const MESSAGE_TIMESTAMP_BITS: usize = 32;
pub const MESSAGE_CHANNEL_ID_BITS: usize = 16;
pub const FRAGMENT_INDEX_BITS: usize = 16;

/// Smallest possible message header: no timestamp, default channel, empty payload
pub const MIN_MESSAGE_HEADER_BITS: usize =
    MESSAGE_TYPE_BITS + MESSAGE_SEQUENCE_ID_BITS + MESSAGE_DATA_SIZE_BITS + 1 + 1;

/// Largest payload that fits in a single message on the wire
pub const MAX_MESSAGE_DATA_BYTES: usize = u16::MAX as usize;

/// Message types at or above this value belong to the application
pub const CUSTOM_MESSAGE_TYPE_START: u8 = 128;

/// Milliseconds on the sender's clock
pub type MessageTimestamp = u32;

/// Position of a fragment within its message
pub type FragmentIndex = u16;

/// Identifies a channel within a link.
///
/// Channel `0` is the default channel, which always exists and is never written on the wire.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct MessageChannelId(pub u16);

impl MessageChannelId {
    pub const DEFAULT: Self = Self(0);

    pub fn is_default(self) -> bool {
        self == Self::DEFAULT
    }
}

/// Per-channel message counter.
///
/// `0` means "not assigned yet"; the first message sent on a channel gets id `1`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageSequenceId(pub u32);

impl MessageSequenceId {
    pub const INVALID: Self = Self(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    /// The id that follows this one, or `None` if the id space is exhausted
    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MessageType(pub u8);

impl MessageType {
    /// Application message type, offset from [`CUSTOM_MESSAGE_TYPE_START`].
    ///
    /// # Panics
    ///
    /// Panics if `offset` is greater than `127`.
    pub const fn custom(offset: u8) -> Self {
        match CUSTOM_MESSAGE_TYPE_START.checked_add(offset) {
            Some(message_type) => Self(message_type),
            None => panic!("custom message type offset must be at most 127"),
        }
    }

    pub fn is_custom(self) -> bool {
        self.0 >= CUSTOM_MESSAGE_TYPE_START
    }
}

/// Message types reserved by the transport itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ProtocolMessageType {
    /// Keeps an otherwise idle link alive
    Heartbeat = 1,
    Ping = 2,
    /// Announces a new channel, its payload is the channel's transfer mode
    ChannelOpened = 3,
    /// Last message of a channel, its sequence id is the final id of the channel
    ChannelClosed = 4,
}

impl From<ProtocolMessageType> for MessageType {
    fn from(value: ProtocolMessageType) -> Self {
        Self(value as u8)
    }
}

impl TryFrom<MessageType> for ProtocolMessageType {
    type Error = SerializationError;

    fn try_from(value: MessageType) -> Result<Self, Self::Error> {
        match value.0 {
            1 => Ok(Self::Heartbeat),
            2 => Ok(Self::Ping),
            3 => Ok(Self::ChannelOpened),
            4 => Ok(Self::ChannelClosed),
            _ => Err(SerializationError::InvalidValue("ProtocolMessageType")),
        }
    }
}

/// Marks a message as one piece of a larger message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FragmentInfo {
    pub index: FragmentIndex,
    /// True for the last fragment, which tells the receiver how many fragments to expect
    pub is_final: bool,
}

/// A typed payload sent over a channel.
///
/// Messages are not `Clone`: a message is moved from the outbox into a packet, and from a
/// packet into an inbox. Use [`Message::duplicate`] when a copy is really needed (for example
/// to resend it); the payload itself is shared.
#[derive(Debug, PartialEq, Eq)]
pub struct Message {
    message_type: MessageType,
    channel_id: MessageChannelId,
    sequence_id: MessageSequenceId,
    timestamp: Option<MessageTimestamp>,
    fragment: Option<FragmentInfo>,
    payload: Bytes,
}

impl Message {
    pub fn new(message_type: impl Into<MessageType>, payload: impl Into<Bytes>) -> Self {
        Self {
            message_type: message_type.into(),
            channel_id: MessageChannelId::DEFAULT,
            sequence_id: MessageSequenceId::INVALID,
            timestamp: None,
            fragment: None,
            payload: payload.into(),
        }
    }

    /// A message that only carries its type
    pub fn empty(message_type: impl Into<MessageType>) -> Self {
        Self::new(message_type, Bytes::new())
    }

    pub fn with_channel_id(mut self, channel_id: MessageChannelId) -> Self {
        self.channel_id = channel_id;
        self
    }

    pub fn with_sequence_id(mut self, sequence_id: MessageSequenceId) -> Self {
        self.sequence_id = sequence_id;
        self
    }

    pub fn with_timestamp(mut self, timestamp: MessageTimestamp) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_fragment(mut self, fragment: FragmentInfo) -> Self {
        self.fragment = Some(fragment);
        self
    }

    pub(crate) fn without_fragment(mut self) -> Self {
        self.fragment = None;
        self
    }

    pub(crate) fn with_payload(mut self, payload: Bytes) -> Self {
        self.payload = payload;
        self
    }

    /// Copy of this message sharing the same payload buffer
    pub fn duplicate(&self) -> Self {
        Self {
            payload: self.payload.clone(),
            ..*self
        }
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    /// The reserved transport type of this message, if it is one
    pub fn protocol_type(&self) -> Option<ProtocolMessageType> {
        ProtocolMessageType::try_from(self.message_type).ok()
    }

    pub fn is_custom(&self) -> bool {
        self.message_type.is_custom()
    }

    pub fn channel_id(&self) -> MessageChannelId {
        self.channel_id
    }

    pub fn is_channeled(&self) -> bool {
        !self.channel_id.is_default()
    }

    pub fn sequence_id(&self) -> MessageSequenceId {
        self.sequence_id
    }

    pub fn timestamp(&self) -> Option<MessageTimestamp> {
        self.timestamp
    }

    pub fn fragment(&self) -> Option<FragmentInfo> {
        self.fragment
    }

    pub fn is_fragment(&self) -> bool {
        self.fragment.is_some()
    }

    pub fn payload(&self) -> &Bytes {
        &self.payload
    }

    pub fn into_payload(self) -> Bytes {
        self.payload
    }

    pub fn has_data(&self) -> bool {
        !self.payload.is_empty()
    }

    /// Number of header bits this message takes on the wire
    pub fn header_bits(&self) -> usize {
        self.header_bits_with(self.is_fragment())
    }

    /// Number of header bits this message would take if it were sent as a fragment
    pub fn fragment_header_bits(&self) -> usize {
        self.header_bits_with(true)
    }

    fn header_bits_with(&self, as_fragment: bool) -> usize {
        let mut bits = MIN_MESSAGE_HEADER_BITS;
        if self.timestamp.is_some() {
            bits += MESSAGE_TIMESTAMP_BITS;
        }
        if self.is_channeled() {
            bits += MESSAGE_CHANNEL_ID_BITS;
        }
        if self.has_data() || as_fragment {
            // is_fragment bit
            bits += 1;
            if as_fragment {
                bits += FRAGMENT_INDEX_BITS + 1;
            }
        }
        bits
    }

    /// Number of bits this message takes on the wire, header and payload
    pub fn total_bits(&self) -> usize {
        self.header_bits() + tidewire_serde::bytes_to_bits(self.payload.len())
    }
}

impl BitSerialize for Message {
    fn ser(&self, writer: &mut dyn BitWrite) -> tidewire_serde::Result<()> {
        if self.payload.len() > MAX_MESSAGE_DATA_BYTES {
            return Err(SerializationError::Overflow {
                value: self.payload.len() as u64,
                bits: MESSAGE_DATA_SIZE_BITS as u32,
            });
        }
        self.message_type.0.ser(writer)?;
        self.sequence_id.0.ser(writer)?;
        (self.payload.len() as u16).ser(writer)?;
        self.timestamp.ser(writer)?;
        self.is_channeled()
            .then_some(self.channel_id.0)
            .ser(writer)?;
        if self.has_data() {
            writer.write_bit(self.fragment.is_some());
            if let Some(fragment) = self.fragment {
                fragment.index.ser(writer)?;
                fragment.is_final.ser(writer)?;
            }
        }
        writer.write_bytes(&self.payload);
        Ok(())
    }

    fn de(reader: &mut BitReader) -> tidewire_serde::Result<Self> {
        let message_type = MessageType(u8::de(reader)?);
        let sequence_id = MessageSequenceId(u32::de(reader)?);
        let data_bytes = u16::de(reader)? as usize;
        let timestamp = Option::<MessageTimestamp>::de(reader)?;
        let channel_id = Option::<u16>::de(reader)?
            .map(MessageChannelId)
            .unwrap_or_default();
        let fragment = if data_bytes > 0 && reader.read_bit()? {
            Some(FragmentInfo {
                index: FragmentIndex::de(reader)?,
                is_final: bool::de(reader)?,
            })
        } else {
            None
        };
        let payload = reader.read_bytes(data_bytes)?;
        Ok(Self {
            message_type,
            channel_id,
            sequence_id,
            timestamp,
            fragment,
            payload,
        })
    }

    fn bit_len(&self) -> usize {
        self.total_bits()
    }
}
