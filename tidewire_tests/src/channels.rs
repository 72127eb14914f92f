use test_log::test;
use tidewire::prelude::*;

use crate::conditioner::LinkConditionerConfig;
use crate::stepper::LinkStepper;

fn data(value: u32) -> Message {
    Message::new(MessageType::custom(0), value.to_be_bytes().to_vec())
}

fn values(messages: &[Message]) -> Vec<u32> {
    messages
        .iter()
        .map(|m| {
            let bytes: [u8; 4] = m.payload().as_ref().try_into().unwrap();
            u32::from_be_bytes(bytes)
        })
        .collect()
}

/// Open a client channel and make sure the server knows about it before anything else is sent
fn open_channel(stepper: &mut LinkStepper, mode: TransferMode) -> MessageChannelId {
    let channel_id = stepper.client.outbox.open_channel(mode).unwrap();
    assert!(stepper.step().is_empty());
    assert_eq!(
        stepper
            .server
            .inbox
            .channel(channel_id)
            .map(InMessageChannel::transfer_mode),
        Some(mode)
    );
    channel_id
}

#[test]
fn test_immediate_delivers_each_message_once() {
    let mut stepper = LinkStepper::new(
        TransportConfig::default().with_max_packet_bytes(100),
        LinkConditionerConfig::chaotic(),
    );
    let channel_id = open_channel(&mut stepper, TransferMode::Immediate);
    for value in 0..50 {
        stepper.send(channel_id, data(value));
    }
    let mut received = values(&stepper.step());
    assert_ne!(received, (0..50).collect::<Vec<_>>());
    received.sort_unstable();
    assert_eq!(received, (0..50).collect::<Vec<_>>());

    // resending everything does not release anything twice
    assert!(stepper.retransmit().is_empty());
}

#[test]
fn test_sequenced_never_goes_back() {
    let mut stepper = LinkStepper::new(
        TransportConfig::default().with_max_packet_bytes(100),
        LinkConditionerConfig::chaotic(),
    );
    let channel_id = open_channel(&mut stepper, TransferMode::Sequenced);
    for value in 0..20 {
        stepper.send(channel_id, data(value));
    }
    let received = values(&stepper.step());
    // the packets arrive in reverse order: the newest message wins
    assert!(received.contains(&19));
    assert!(received.windows(2).all(|pair| pair[0] < pair[1]));

    stepper.send(channel_id, data(20));
    assert_eq!(values(&stepper.step()), vec![20]);
    assert!(stepper.retransmit().is_empty());
}

#[test]
fn test_ordered_recovers_from_loss() {
    let mut stepper = LinkStepper::new(
        TransportConfig::default().with_max_packet_bytes(100),
        LinkConditionerConfig::lossy(3),
    );
    let channel_id = open_channel(&mut stepper, TransferMode::Ordered);
    for value in 0..30 {
        stepper.send(channel_id, data(value));
    }
    let mut received = values(&stepper.step());
    assert!(received.len() < 30);
    assert_eq!(received, (0..received.len() as u32).collect::<Vec<_>>());

    // every third datagram is still lost, but over a few rounds everything gets through
    for _ in 0..5 {
        received.extend(values(&stepper.retransmit()));
    }
    assert_eq!(received, (0..30).collect::<Vec<_>>());
}

#[test]
fn test_large_message_over_reordering_link() {
    let mut stepper = LinkStepper::new(
        TransportConfig::default().with_max_packet_bytes(128),
        LinkConditionerConfig::chaotic(),
    );
    let channel_id = open_channel(&mut stepper, TransferMode::Ordered);
    let payload: Vec<u8> = (0..5000u32).map(|i| (i % 251) as u8).collect();
    stepper.send(
        channel_id,
        Message::new(MessageType::custom(1), payload.clone()).with_timestamp(77),
    );
    stepper.send(channel_id, data(1));

    let received = stepper.step();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].payload().as_ref(), payload.as_slice());
    assert_eq!(received[0].timestamp(), Some(77));
    assert!(!received[0].is_fragment());
    assert_eq!(values(&received[1..]), vec![1]);
}

#[test]
fn test_closed_channel_is_deleted_once_drained() {
    let mut stepper = LinkStepper::new(
        TransportConfig::default().with_max_packet_bytes(100),
        LinkConditionerConfig::lossy(3),
    );
    let channel_id = open_channel(&mut stepper, TransferMode::Ordered);
    for value in 0..10 {
        stepper.send(channel_id, data(value));
    }
    stepper.client.outbox.close_channel(channel_id).unwrap();

    let mut received = values(&stepper.step());
    for _ in 0..10 {
        if stepper.server.inbox.channel(channel_id).is_none() && received.len() == 10 {
            break;
        }
        received.extend(values(&stepper.retransmit()));
    }
    assert_eq!(received, (0..10).collect::<Vec<_>>());
    assert!(stepper.server.inbox.channel(channel_id).is_none());
    assert_eq!(stepper.server.inbox.num_channels(), 1);
    assert_eq!(
        stepper.server.inbox.drain_events(),
        vec![
            ChannelEvent::Opened {
                channel_id,
                transfer_mode: TransferMode::Ordered
            },
            ChannelEvent::Closed { channel_id }
        ]
    );
}

#[test]
fn test_channels_are_independent() {
    let mut stepper = LinkStepper::default();
    let ordered = stepper
        .client
        .outbox
        .open_channel(TransferMode::Ordered)
        .unwrap();
    let immediate = stepper
        .client
        .outbox
        .open_channel(TransferMode::Immediate)
        .unwrap();
    stepper.send(ordered, data(1));
    stepper.send(immediate, data(2));
    stepper.send(MessageChannelId::DEFAULT, data(3));

    let received = stepper.step();
    let mut by_channel: Vec<(u16, u32)> = received
        .iter()
        .map(|m| m.channel_id().0)
        .zip(values(&received))
        .collect();
    by_channel.sort_unstable();
    assert_eq!(by_channel, vec![(0, 3), (ordered.0, 1), (immediate.0, 2)]);
}
