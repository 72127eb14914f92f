use test_log::test;
use tidewire::prelude::*;
use tidewire::transport::packet::packet::peek_protocol_id;

use crate::stepper::{CLIENT_ADDR, Peer, SERVER_ADDR};

#[test]
fn test_datagrams_never_exceed_packet_size() {
    for max_packet_bytes in [64, 100, 576, 1200] {
        let config = TransportConfig::default().with_max_packet_bytes(max_packet_bytes);
        let mut client = Peer::new(CLIENT_ADDR, config);
        let mut server = Peer::new(SERVER_ADDR, config);
        let channel_id = client.outbox.open_channel(TransferMode::Ordered).unwrap();
        for size in [0, 1, 7, 50, 63, 64, 500, 3000] {
            client
                .outbox
                .send(
                    channel_id,
                    Message::new(MessageType::custom(0), vec![size as u8; size]),
                )
                .unwrap();
        }
        let queued = client.outbox.drain_queued();
        let datagrams = client.write_datagrams(SERVER_ADDR, queued).unwrap();
        for datagram in datagrams {
            assert!(datagram.len() <= max_packet_bytes);
            server.read_datagram(CLIENT_ADDR, datagram).unwrap();
        }
        let sizes: Vec<usize> = server
            .inbox
            .release()
            .iter()
            .map(|m| m.payload().len())
            .collect();
        assert_eq!(sizes, vec![0, 1, 7, 50, 63, 64, 500, 3000]);
    }
}

#[test]
fn test_protocol_mismatch_is_rejected() {
    let mut client = Peer::new(
        CLIENT_ADDR,
        TransportConfig::default().with_protocol_id(ProtocolId(1)),
    );
    let mut server = Peer::new(
        SERVER_ADDR,
        TransportConfig::default().with_protocol_id(ProtocolId(2)),
    );
    client
        .outbox
        .send(
            MessageChannelId::DEFAULT,
            Message::empty(ProtocolMessageType::Heartbeat),
        )
        .unwrap();
    let queued = client.outbox.drain_queued();
    let datagrams = client.write_datagrams(SERVER_ADDR, queued).unwrap();
    assert_eq!(datagrams.len(), 1);
    assert_eq!(peek_protocol_id(&datagrams[0]), Some(ProtocolId(1)));
    assert_eq!(
        server.read_datagram(CLIENT_ADDR, datagrams[0].clone()),
        Err(PacketError::ProtocolMismatch {
            expected: ProtocolId(2),
            received: ProtocolId(1),
        })
    );
    assert!(server.inbox.release().is_empty());
}

#[test]
fn test_standalone_packet() {
    let mut server = Peer::new(SERVER_ADDR, TransportConfig::default());
    let mut packet = OutPacket::standalone(SERVER_ADDR);
    packet.push_message(
        Message::new(ProtocolMessageType::Ping, vec![1, 2]).with_sequence_id(MessageSequenceId(1)),
    );
    let datagram = packet.to_bytes().unwrap();
    assert_eq!(server.read_datagram(CLIENT_ADDR, datagram).unwrap(), 1);

    let released = server.inbox.release();
    assert_eq!(released.len(), 1);
    assert_eq!(released[0].protocol_type(), Some(ProtocolMessageType::Ping));
}
