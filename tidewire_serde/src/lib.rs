/*! # Tidewire Serde

Bit-level serialization primitives for the tidewire networking library.

Values are written most-significant-bit first into a byte buffer, without any
padding between fields. The final byte of a written buffer is zero-padded.
*/
#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod error;
mod reader;
mod serde;
mod writer;

pub use crate::serde::BitSerialize;
pub use error::{Result, SerializationError};
pub use reader::BitReader;
pub use writer::{BitCounter, BitWrite, BitWriter};

/// Number of bits needed to store `num_bytes` bytes
pub const fn bytes_to_bits(num_bytes: usize) -> usize {
    num_bytes * 8
}

/// Number of bytes needed to store `num_bits` bits (rounded up)
pub const fn bits_to_bytes(num_bits: usize) -> usize {
    num_bits.div_ceil(8)
}
