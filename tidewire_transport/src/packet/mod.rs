/*!
Module to group messages into packets

# Packet
A packet is the unit handed to the datagram socket. It starts with a small header:
- the protocol id, so that peers running an incompatible protocol reject each other's packets
- a standalone bit: standalone packets (connection handshakes, pings) are outside of the
  packet sequence, so they carry no sequence id
- the packet sequence id, for every packet that is not standalone

The rest of the packet is a list of [`Message`](crate::message::Message)s written back to back,
without any alignment between them.

Messages that are too large to fit in a packet are split into fragments by the
[`PacketBuilder`](packet_builder::PacketBuilder).
*/

pub mod error;

/// Defines the [`PacketHeader`](header::PacketHeader) written at the start of every packet
pub mod header;

#[allow(clippy::module_inception)]
pub mod packet;

/// Packs messages into packets that fit in a bit budget
pub mod packet_builder;
