use bitvec::prelude::{BitVec, Msb0};
use bitvec::view::BitView;
use bytes::Bytes;

use crate::error::{Result, SerializationError};

/// Sink for a stream of bits.
///
/// Bits are written most-significant first, so that a value written with
/// [`write_bits`](BitWrite::write_bits) reads back identically with
/// [`BitReader::read_bits`](crate::BitReader::read_bits).
pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);

    /// Write the `num_bits` least significant bits of `value`
    fn write_bits(&mut self, value: u64, num_bits: u32);

    fn write_bytes(&mut self, bytes: &[u8]);

    /// Total number of bits written so far
    fn bits_written(&self) -> usize;

    /// Write `value` on `num_bits` bits, failing if the value does not fit
    fn write_unsigned(&mut self, value: u64, num_bits: u32) -> Result<()> {
        if num_bits < u64::BITS && value >> num_bits != 0 {
            return Err(SerializationError::Overflow {
                value,
                bits: num_bits,
            });
        }
        self.write_bits(value, num_bits);
        Ok(())
    }
}

/// [`BitWrite`] implementation backed by a growable bit vector
#[derive(Debug, Default, Clone)]
pub struct BitWriter {
    /// The bits past the end of the vector in its last byte are kept at zero
    bits: BitVec<u8, Msb0>,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(num_bytes: usize) -> Self {
        Self {
            bits: BitVec::with_capacity(crate::bytes_to_bits(num_bytes)),
        }
    }

    /// The bytes written so far. The last byte is zero-padded.
    pub fn as_slice(&self) -> &[u8] {
        self.bits.as_raw_slice()
    }

    /// Clears the writer but keeps the underlying allocation
    pub fn reset(&mut self) {
        self.bits.clear();
    }

    /// Consume the writer and return the written bytes
    pub fn finish(self) -> Bytes {
        let mut bits = self.bits;
        bits.force_align();
        bits.set_uninitialized(false);
        Bytes::from(bits.into_vec())
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        self.bits.push(bit);
        self.bits.set_uninitialized(false);
    }

    fn write_bits(&mut self, value: u64, num_bits: u32) {
        debug_assert!(num_bits <= u64::BITS);
        let bytes = value.to_be_bytes();
        let value_bits = bytes.view_bits::<Msb0>();
        self.bits
            .extend_from_bitslice(&value_bits[(u64::BITS - num_bits) as usize..]);
        self.bits.set_uninitialized(false);
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.bits.extend_from_bitslice(bytes.view_bits::<Msb0>());
        self.bits.set_uninitialized(false);
    }

    fn bits_written(&self) -> usize {
        self.bits.len()
    }
}

/// [`BitWrite`] implementation that only counts the bits, used to compute serialized sizes
#[derive(Debug, Default, Clone, Copy)]
pub struct BitCounter {
    num_bits: usize,
}

impl BitCounter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BitWrite for BitCounter {
    fn write_bit(&mut self, _: bool) {
        self.num_bits += 1;
    }

    fn write_bits(&mut self, _: u64, num_bits: u32) {
        self.num_bits += num_bits as usize;
    }

    fn write_bytes(&mut self, bytes: &[u8]) {
        self.num_bits += bytes.len() * 8;
    }

    fn bits_written(&self) -> usize {
        self.num_bits
    }
}
