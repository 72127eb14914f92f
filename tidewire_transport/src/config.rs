//! Configuration shared by both sides of a link
use serde::{Deserialize, Serialize};

use crate::packet::header::ProtocolId;

/// Size of a packet in bytes, chosen to stay under the usual internet MTU
pub const DEFAULT_MAX_PACKET_BYTES: usize = 1200;

/// Largest payload accepted by [`Outbox::send`](crate::outbox::Outbox::send)
pub const DEFAULT_MAX_MESSAGE_BYTES: usize = 1 << 20;

/// Number of fragmented messages that an incoming channel reassembles at the same time
pub const DEFAULT_MAX_FRAGMENTED_MESSAGES: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Written at the start of every packet; packets carrying another id are rejected
    pub protocol_id: ProtocolId,
    /// Maximum number of bytes in a packet, header included
    pub max_packet_bytes: usize,
    /// Maximum payload size of a single (unfragmented) message handed to the outbox
    pub max_message_bytes: usize,
    /// Maximum number of messages being reassembled concurrently, per incoming channel
    pub max_fragmented_messages: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            protocol_id: ProtocolId::default(),
            max_packet_bytes: DEFAULT_MAX_PACKET_BYTES,
            max_message_bytes: DEFAULT_MAX_MESSAGE_BYTES,
            max_fragmented_messages: DEFAULT_MAX_FRAGMENTED_MESSAGES,
        }
    }
}

impl TransportConfig {
    pub fn with_protocol_id(mut self, protocol_id: ProtocolId) -> Self {
        self.protocol_id = protocol_id;
        self
    }

    pub fn with_max_packet_bytes(mut self, max_packet_bytes: usize) -> Self {
        self.max_packet_bytes = max_packet_bytes;
        self
    }

    pub fn max_packet_bits(&self) -> usize {
        tidewire_serde::bytes_to_bits(self.max_packet_bytes)
    }
}
