use alloc::vec::Vec;
use core::net::SocketAddr;

use tracing::trace;

use crate::channel::fragment::split_into_fragments;
use crate::config::TransportConfig;
use crate::error::Result;
use crate::message::{MAX_MESSAGE_DATA_BYTES, Message};
use crate::packet::error::PacketError;
use crate::packet::header::{PacketSequenceId, ProtocolId, SEQUENCED_HEADER_BITS};
use crate::packet::packet::OutPacket;

/// `PacketBuilder` handles the process of packing messages into packets.
///
/// Packets are filled in message order and never exceed `max_packet_bits` on the wire.
/// Messages that cannot fit in a packet on their own are split into fragments.
#[derive(Debug)]
pub struct PacketBuilder {
    protocol_id: ProtocolId,
    max_packet_bits: usize,
    /// Last packet sequence id handed out
    last_sequence_id: PacketSequenceId,
}

impl PacketBuilder {
    pub fn new(config: &TransportConfig) -> Self {
        Self {
            protocol_id: config.protocol_id,
            max_packet_bits: config.max_packet_bits(),
            last_sequence_id: PacketSequenceId::INVALID,
        }
    }

    pub fn max_packet_bits(&self) -> usize {
        self.max_packet_bits
    }

    /// Reserve the next packet sequence id. The first id is `1`.
    ///
    /// # Panics
    ///
    /// Panics if the packet sequence ids are exhausted.
    pub fn acquire_next_sequence_id(&mut self) -> PacketSequenceId {
        self.last_sequence_id = self
            .last_sequence_id
            .next()
            .unwrap_or_else(|| panic!("ran out of packet sequence ids"));
        self.last_sequence_id
    }

    /// Number of bits available for messages in a sequenced packet
    fn message_budget(&self) -> Result<usize> {
        self.max_packet_bits
            .checked_sub(SEQUENCED_HEADER_BITS)
            .ok_or_else(|| self.budget_too_small())
    }

    fn budget_too_small(&self) -> crate::error::TransportError {
        PacketError::BudgetTooSmall {
            max_packet_bits: self.max_packet_bits,
        }
        .into()
    }

    /// Split the message if it cannot be sent in a single packet
    fn fit_message(&self, message: Message, budget: usize) -> Result<Vec<Message>> {
        if message.total_bits() <= budget && message.payload().len() <= MAX_MESSAGE_DATA_BYTES {
            return Ok(alloc::vec![message]);
        }
        if !message.has_data() {
            return Err(self.budget_too_small());
        }
        let fragment_data_bytes = budget
            .checked_sub(message.fragment_header_bits())
            .map(|bits| (bits / 8).min(MAX_MESSAGE_DATA_BYTES))
            .filter(|&bytes| bytes > 0)
            .ok_or_else(|| self.budget_too_small())?;
        split_into_fragments(message, fragment_data_bytes)
    }

    /// Pack the messages into as few packets as possible, keeping their order.
    ///
    /// Each packet gets the next packet sequence id.
    pub fn build_packets(
        &mut self,
        destination: SocketAddr,
        messages: Vec<Message>,
    ) -> Result<Vec<OutPacket>> {
        let budget = self.message_budget()?;
        let mut groups: Vec<Vec<Message>> = Vec::new();
        let mut used_bits = 0;
        for message in messages {
            for piece in self.fit_message(message, budget)? {
                let bits = piece.total_bits();
                if groups.is_empty() || used_bits + bits > budget {
                    groups.push(Vec::new());
                    used_bits = 0;
                }
                used_bits += bits;
                if let Some(group) = groups.last_mut() {
                    group.push(piece);
                }
            }
        }

        let packets: Vec<OutPacket> = groups
            .into_iter()
            .map(|group| {
                let mut packet = OutPacket::new(destination, false, self.acquire_next_sequence_id())
                    .with_protocol_id(self.protocol_id);
                for message in group {
                    packet.push_message(message);
                }
                packet
            })
            .collect();
        trace!(
            num_packets = packets.len(),
            ?destination,
            "built packets"
        );
        Ok(packets)
    }
}
