/*! # Tidewire

Tidewire is the message layer of a peer-to-peer transport: it splits a link into channels,
frames messages into packets that fit a datagram, and puts them back together in the order
each channel promises.

A typical send/receive cycle looks like this:
- [`Outbox::send`](prelude::Outbox::send) stamps a message with its channel's next sequence id
- [`PacketBuilder::build_packets`](prelude::PacketBuilder::build_packets) packs the queued
  messages into [`OutPacket`](prelude::OutPacket)s, fragmenting the large ones
- the packets are serialized with [`OutPacket::to_bytes`](prelude::OutPacket::to_bytes) and sent
- the remote peer decodes them with [`InPacket::from_bytes`](prelude::InPacket::from_bytes) and
  hands them to its [`Inbox`](prelude::Inbox), which releases the messages

## Feature flags
*/
#![doc = document_features::document_features!()]
#![cfg_attr(not(feature = "std"), no_std)]

/// Bit-level serialization
pub mod serde {
    pub use tidewire_serde::*;
}

/// Channels, messages and packets
pub mod transport {
    pub use tidewire_transport::*;
}

/// Prelude containing commonly used types
pub mod prelude {
    pub use tidewire_serde::{BitReader, BitSerialize, BitWrite, BitWriter, SerializationError};
    pub use tidewire_transport::prelude::*;
}
