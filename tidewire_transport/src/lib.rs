/*! # Tidewire Transport

Reliable message channels and packet framing for the tidewire networking library.

Messages sent through an [`Outbox`](outbox::Outbox) are stamped with a per-channel
sequence id, packed into [`OutPacket`](packet::packet::OutPacket)s by the
[`PacketBuilder`](packet::packet_builder::PacketBuilder) (fragmenting anything too large
for one packet), and written to the wire. On the other side, decoded
[`InPacket`](packet::packet::InPacket)s are handed to an [`Inbox`](inbox::Inbox) which
deduplicates, reassembles and releases messages according to each channel's
[`TransferMode`](channel::builder::TransferMode).

Acknowledgement and retransmission are left to the layer above: the receiving side only
guarantees that whatever it is given is released at most once, in the order the channel
promises.

## Feature flags
*/
#![doc = document_features::document_features!()]
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

pub mod channel;
pub mod config;
pub mod error;
pub mod inbox;
pub mod message;
pub mod outbox;
pub mod packet;

pub mod prelude {
    pub use crate::channel::builder::{ChannelSettings, TransferMode};
    pub use crate::channel::fragment::FragmentedMessage;
    pub use crate::channel::receiver::InMessageChannel;
    pub use crate::channel::sender::OutMessageChannel;
    pub use crate::channel::sequence::MessageSequence;
    pub use crate::config::TransportConfig;
    pub use crate::error::TransportError;
    pub use crate::inbox::{ChannelEvent, Inbox};
    pub use crate::message::{
        FragmentInfo, Message, MessageChannelId, MessageSequenceId, MessageType,
        ProtocolMessageType,
    };
    pub use crate::outbox::Outbox;
    pub use crate::packet::error::PacketError;
    pub use crate::packet::header::{PacketHeader, PacketSequenceId, ProtocolId};
    pub use crate::packet::packet::{InPacket, OutPacket};
    pub use crate::packet::packet_builder::PacketBuilder;
}
