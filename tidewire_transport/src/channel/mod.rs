//! Channels split a link into independent streams of messages.
//!
//! Each side of a channel keeps its own state: the [`OutMessageChannel`](sender::OutMessageChannel)
//! hands out sequence ids, the [`InMessageChannel`](receiver::InMessageChannel) uses them to
//! deduplicate, reassemble and release messages in the order required by the channel's
//! [`TransferMode`](builder::TransferMode).
pub mod builder;
pub mod fragment;
pub mod receiver;
pub mod sender;
pub mod sequence;
