use core::net::{IpAddr, Ipv4Addr, SocketAddr};

use bytes::Bytes;
use tidewire::prelude::*;
use tracing::debug;

use crate::conditioner::{LinkConditioner, LinkConditionerConfig};

pub const CLIENT_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5001);
pub const SERVER_ADDR: SocketAddr = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 5000);

/// One side of a link: everything needed to send and receive messages
#[derive(Debug)]
pub struct Peer {
    pub addr: SocketAddr,
    pub config: TransportConfig,
    pub outbox: Outbox,
    pub inbox: Inbox,
    pub builder: PacketBuilder,
}

impl Peer {
    pub fn new(addr: SocketAddr, config: TransportConfig) -> Self {
        Self {
            addr,
            config,
            outbox: Outbox::new(&config),
            inbox: Inbox::new(&config),
            builder: PacketBuilder::new(&config),
        }
    }

    /// Pack the given messages into packets for `destination` and serialize them
    pub fn write_datagrams(
        &mut self,
        destination: SocketAddr,
        messages: Vec<Message>,
    ) -> Result<Vec<Bytes>, TransportError> {
        let packets = self.builder.build_packets(destination, messages)?;
        let mut datagrams = Vec::with_capacity(packets.len());
        for packet in packets {
            datagrams.push(packet.to_bytes()?);
        }
        Ok(datagrams)
    }

    /// Decode a datagram and dispatch its messages. Returns the number of messages accepted.
    pub fn read_datagram(&mut self, source: SocketAddr, datagram: Bytes) -> Result<usize, PacketError> {
        let packet = InPacket::from_bytes(datagram, source, self.config.protocol_id)?;
        Ok(self.inbox.receive_packet(packet))
    }
}

/// Stepper with a client [`Peer`] sending to a server [`Peer`] through a [`LinkConditioner`].
///
/// Every message sent by the client is kept so that tests can retransmit it, which is the
/// job of the layer above the transport.
#[derive(Debug)]
pub struct LinkStepper {
    pub client: Peer,
    pub server: Peer,
    pub conditioner: LinkConditioner,
    sent: Vec<Message>,
}

impl Default for LinkStepper {
    fn default() -> Self {
        Self::new(TransportConfig::default(), LinkConditionerConfig::default())
    }
}

impl LinkStepper {
    pub fn new(config: TransportConfig, conditioner: LinkConditionerConfig) -> Self {
        Self {
            client: Peer::new(CLIENT_ADDR, config),
            server: Peer::new(SERVER_ADDR, config),
            conditioner: LinkConditioner::new(conditioner),
            sent: Vec::new(),
        }
    }

    /// Send a message on a client channel
    pub fn send(&mut self, channel_id: MessageChannelId, message: Message) -> MessageSequenceId {
        self.client
            .outbox
            .send(channel_id, message)
            .expect("message should be queued")
    }

    /// Flush the client outbox through the link, then return what the server releases
    pub fn step(&mut self) -> Vec<Message> {
        let queued = self.client.outbox.drain_queued();
        self.sent.extend(queued.iter().map(Message::duplicate));
        self.transmit(queued)
    }

    /// Send again every message sent so far, as a reliability layer would after losses
    pub fn retransmit(&mut self) -> Vec<Message> {
        let messages = self.sent.iter().map(Message::duplicate).collect();
        self.transmit(messages)
    }

    fn transmit(&mut self, messages: Vec<Message>) -> Vec<Message> {
        let datagrams = self
            .client
            .write_datagrams(SERVER_ADDR, messages)
            .expect("messages should fit in packets");
        let datagrams = self.conditioner.condition(datagrams);
        debug!(num_datagrams = datagrams.len(), "delivering datagrams");
        for datagram in datagrams {
            self.server
                .read_datagram(CLIENT_ADDR, datagram)
                .expect("datagram should decode");
        }
        self.server.inbox.release()
    }
}
