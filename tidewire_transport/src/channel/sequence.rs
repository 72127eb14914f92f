//! Tracks which sequence ids of a channel have already been received
use ringbuffer::{ConstGenericRingBuffer, RingBuffer};

use crate::message::MessageSequenceId;

/// Number of ids past [`MessageSequence::verified_up_to`] that can be tracked individually
pub const SEQUENCE_WINDOW_SIZE: usize = 1024;

/// Largest distance past [`MessageSequence::verified_up_to`] of an id that is allowed to slide the
/// window. Sliding verifies every id that falls off the window.
pub const MAX_SEQUENCE_JUMP: usize = 32 * SEQUENCE_WINDOW_SIZE;

/// Set of verified (already received) sequence ids.
///
/// Every id up to and including `verified_up_to` is verified. The ids after it are tracked
/// in a fixed window of [`SEQUENCE_WINDOW_SIZE`] bits; whenever the oldest bit of the window
/// becomes verified, `verified_up_to` moves forward.
///
/// Verifying an id beyond the window slides the window forward, which implicitly verifies
/// the ids that fall off its start. Ordered channels never do this: they refuse messages
/// that would not fit in the window (see [`MessageSequence::can_track`]).
#[derive(Debug, Clone)]
pub struct MessageSequence {
    verified_up_to: MessageSequenceId,
    /// The oldest element is the id `verified_up_to + 1`
    window: ConstGenericRingBuffer<bool, SEQUENCE_WINDOW_SIZE>,
}

impl Default for MessageSequence {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageSequence {
    /// A sequence in which nothing has been verified yet: the next expected id is `1`
    pub fn new() -> Self {
        let mut window = ConstGenericRingBuffer::new();
        // the window is always full so that pushing a bit drops the oldest one
        window.fill(false);
        Self {
            verified_up_to: MessageSequenceId::INVALID,
            window,
        }
    }

    /// Every id up to and including this one has been verified
    pub fn verified_up_to(&self) -> MessageSequenceId {
        self.verified_up_to
    }

    /// Returns true if the id can be checked without sliding the window
    pub fn can_track(&self, id: MessageSequenceId) -> bool {
        id <= self.verified_up_to || self.distance(id) <= SEQUENCE_WINDOW_SIZE as u64
    }

    /// Returns true if the id is at most [`MAX_SEQUENCE_JUMP`] past `verified_up_to`
    pub fn is_within_reach(&self, id: MessageSequenceId) -> bool {
        self.distance(id) <= MAX_SEQUENCE_JUMP as u64
    }

    pub fn is_verified(&self, id: MessageSequenceId) -> bool {
        if id <= self.verified_up_to {
            return true;
        }
        let distance = self.distance(id);
        if distance > SEQUENCE_WINDOW_SIZE as u64 {
            return false;
        }
        self.window.get_signed(distance as isize - 1).copied() == Some(true)
    }

    /// Mark the id as verified.
    ///
    /// Returns false if it was already verified.
    pub fn verify(&mut self, id: MessageSequenceId) -> bool {
        if self.is_verified(id) {
            return false;
        }
        let window_size = SEQUENCE_WINDOW_SIZE as u64;
        let mut distance = self.distance(id);
        if distance > window_size {
            let shift = distance - window_size;
            if shift >= window_size {
                // nothing in the current window survives the slide
                self.window.fill(false);
                self.verified_up_to = MessageSequenceId(id.0 - SEQUENCE_WINDOW_SIZE as u32);
            } else {
                for _ in 0..shift {
                    self.advance();
                }
            }
            distance = window_size;
        }
        if let Some(bit) = self.window.get_mut_signed(distance as isize - 1) {
            *bit = true;
        }
        while self.window.get_signed(0).copied() == Some(true) {
            self.advance();
        }
        true
    }

    fn advance(&mut self) {
        self.window.push(false);
        self.verified_up_to.0 += 1;
    }

    fn distance(&self, id: MessageSequenceId) -> u64 {
        u64::from(id.0).saturating_sub(u64::from(self.verified_up_to.0))
    }
}
