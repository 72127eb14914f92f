//! Outgoing and incoming packets, and how they are written to / read from the wire
use alloc::vec::Vec;
use core::net::SocketAddr;
use core::time::Duration;

use bytes::Bytes;
use tracing::trace;
use tidewire_serde::{BitReader, BitSerialize, BitWrite, BitWriter};

use crate::message::{MIN_MESSAGE_HEADER_BITS, Message};
use crate::packet::error::{PacketError, Result};
use crate::packet::header::{PROTOCOL_ID_BITS, PacketHeader, PacketSequenceId, ProtocolId};

/// A packet waiting to be sent
#[derive(Debug, PartialEq, Eq)]
pub struct OutPacket {
    destination: SocketAddr,
    header: PacketHeader,
    messages: Vec<Message>,
    /// Set by the link when the packet is actually sent
    send_time: Option<Duration>,
}

impl OutPacket {
    /// A packet for `destination`. The sequence id is ignored for standalone packets.
    pub fn new(destination: SocketAddr, is_standalone: bool, sequence_id: PacketSequenceId) -> Self {
        debug_assert!(is_standalone || sequence_id.is_valid());
        Self {
            destination,
            header: PacketHeader {
                protocol_id: ProtocolId::default(),
                sequence_id: (!is_standalone).then_some(sequence_id),
            },
            messages: Vec::new(),
            send_time: None,
        }
    }

    /// A packet outside of the packet sequence
    pub fn standalone(destination: SocketAddr) -> Self {
        Self::new(destination, true, PacketSequenceId::INVALID)
    }

    pub fn with_protocol_id(mut self, protocol_id: ProtocolId) -> Self {
        self.header.protocol_id = protocol_id;
        self
    }

    pub fn destination(&self) -> SocketAddr {
        self.destination
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn protocol_id(&self) -> ProtocolId {
        self.header.protocol_id
    }

    pub fn is_standalone(&self) -> bool {
        self.header.is_standalone()
    }

    pub fn sequence_id(&self) -> Option<PacketSequenceId> {
        self.header.sequence_id
    }

    pub fn send_time(&self) -> Option<Duration> {
        self.send_time
    }

    pub fn set_send_time(&mut self, send_time: Duration) {
        self.send_time = Some(send_time);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn push_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn has_messages(&self) -> bool {
        !self.messages.is_empty()
    }

    /// True if the packet carries application messages
    pub fn has_custom_messages(&self) -> bool {
        self.messages.iter().any(Message::is_custom)
    }

    /// True if the packet carries messages used by the link itself (heartbeats, pings, channel control)
    pub fn has_protocol_messages(&self) -> bool {
        self.messages.iter().any(|message| !message.is_custom())
    }

    pub fn header_bits(&self) -> usize {
        self.header.bit_len()
    }

    pub fn message_bits(&self) -> usize {
        self.messages.iter().map(Message::total_bits).sum()
    }

    /// Number of bits the packet takes on the wire
    pub fn total_bits(&self) -> usize {
        self.header_bits() + self.message_bits()
    }

    /// Serialize the packet into a new buffer
    pub fn to_bytes(&self) -> Result<Bytes> {
        let mut writer = BitWriter::with_capacity(tidewire_serde::bits_to_bytes(self.total_bits()));
        write_packet(self, &mut writer)?;
        Ok(writer.finish())
    }
}

/// A packet received from the network
#[derive(Debug, PartialEq, Eq)]
pub struct InPacket {
    source: SocketAddr,
    header: PacketHeader,
    messages: Vec<Message>,
}

impl InPacket {
    pub fn new(source: SocketAddr, header: PacketHeader, messages: Vec<Message>) -> Self {
        Self {
            source,
            header,
            messages,
        }
    }

    /// Decode a packet received from `source`, which must use `protocol_id`
    pub fn from_bytes(
        bytes: impl Into<Bytes>,
        source: SocketAddr,
        protocol_id: ProtocolId,
    ) -> Result<Self> {
        let mut reader = BitReader::new(bytes);
        read_packet(&mut reader, source, protocol_id)
    }

    pub fn source(&self) -> SocketAddr {
        self.source
    }

    pub fn header(&self) -> &PacketHeader {
        &self.header
    }

    pub fn is_standalone(&self) -> bool {
        self.header.is_standalone()
    }

    pub fn sequence_id(&self) -> Option<PacketSequenceId> {
        self.header.sequence_id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn header_bits(&self) -> usize {
        self.header.bit_len()
    }

    pub fn total_bits(&self) -> usize {
        self.header_bits() + self.messages.iter().map(Message::total_bits).sum::<usize>()
    }
}

/// Write the packet header followed by every message.
///
/// Returns the number of bits written.
pub fn write_packet(packet: &OutPacket, writer: &mut dyn BitWrite) -> Result<usize> {
    let start = writer.bits_written();
    packet.header.ser(writer)?;
    for message in &packet.messages {
        message.ser(writer)?;
    }
    let written = writer.bits_written() - start;
    debug_assert_eq!(written, packet.total_bits());
    Ok(written)
}

/// Read a packet header and as many messages as the buffer contains.
///
/// Reading stops once fewer bits than the smallest message header remain, which covers the
/// zero padding of the last byte. A message that fails to decode ends the packet: the messages
/// read before it are kept.
pub fn read_packet(
    reader: &mut BitReader,
    source: SocketAddr,
    protocol_id: ProtocolId,
) -> Result<InPacket> {
    let header = PacketHeader::de(reader)?;
    if header.protocol_id != protocol_id {
        return Err(PacketError::ProtocolMismatch {
            expected: protocol_id,
            received: header.protocol_id,
        });
    }
    let mut messages = Vec::new();
    while reader.bits_remaining() >= MIN_MESSAGE_HEADER_BITS {
        match Message::de(reader) {
            Ok(message) => messages.push(message),
            Err(error) => {
                trace!(?error, ?source, "truncated packet");
                #[cfg(feature = "metrics")]
                metrics::counter!("transport::packet::receive::truncated").increment(1);
                break;
            }
        }
    }
    Ok(InPacket {
        source,
        header,
        messages,
    })
}

/// Read the protocol id at the start of a raw packet, without decoding anything else
pub fn peek_protocol_id(bytes: &[u8]) -> Option<ProtocolId> {
    let prefix = bytes.get(..PROTOCOL_ID_BITS / 8)?;
    let prefix: [u8; 4] = prefix.try_into().ok()?;
    Some(ProtocolId(u32::from_be_bytes(prefix)))
}
