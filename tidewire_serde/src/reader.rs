use alloc::vec::Vec;

use bitvec::prelude::{BitSlice, Msb0};
use bitvec::view::BitView;
use bitvec::field::BitField;
use bytes::Bytes;

use crate::error::{Result, SerializationError};

/// Reads values from a buffer of bits written by a [`BitWriter`](crate::BitWriter).
///
/// The reader holds a [`Bytes`] so that byte-aligned reads can return sub-slices
/// of the original buffer without copying.
#[derive(Debug, Clone)]
pub struct BitReader {
    buffer: Bytes,
    /// Position of the next bit to read
    position: usize,
}

impl BitReader {
    pub fn new(buffer: impl Into<Bytes>) -> Self {
        Self {
            buffer: buffer.into(),
            position: 0,
        }
    }

    pub fn bits_read(&self) -> usize {
        self.position
    }

    pub fn bits_remaining(&self) -> usize {
        self.buffer.len() * 8 - self.position
    }

    fn ensure(&self, requested: usize) -> Result<()> {
        let remaining = self.bits_remaining();
        if requested > remaining {
            return Err(SerializationError::NotEnoughBits {
                requested,
                remaining,
            });
        }
        Ok(())
    }

    fn bits(&self) -> &BitSlice<u8, Msb0> {
        self.buffer.view_bits::<Msb0>()
    }

    pub fn read_bit(&mut self) -> Result<bool> {
        self.ensure(1)?;
        let bit = self.bits()[self.position];
        self.position += 1;
        Ok(bit)
    }

    /// Read `num_bits` bits into the least significant bits of a `u64`
    pub fn read_bits(&mut self, num_bits: u32) -> Result<u64> {
        debug_assert!(num_bits <= u64::BITS);
        let num_bits = num_bits as usize;
        self.ensure(num_bits)?;
        if num_bits == 0 {
            return Ok(0);
        }
        let value = self.bits()[self.position..self.position + num_bits].load_be::<u64>();
        self.position += num_bits;
        Ok(value)
    }

    /// Read `num_bytes` bytes. Zero-copy if the reader is currently byte-aligned.
    pub fn read_bytes(&mut self, num_bytes: usize) -> Result<Bytes> {
        let num_bits = crate::bytes_to_bits(num_bytes);
        self.ensure(num_bits)?;
        let start = self.position;
        self.position += num_bits;
        if start % 8 == 0 {
            let start = start / 8;
            return Ok(self.buffer.slice(start..start + num_bytes));
        }
        let bytes: Vec<u8> = self.bits()[start..self.position]
            .chunks(8)
            .map(|byte| byte.load_be::<u8>())
            .collect();
        Ok(Bytes::from(bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::writer::{BitWrite, BitWriter};
    use test_log::test;

    #[test]
    fn test_read_back_written_bits() -> Result<()> {
        let mut writer = BitWriter::new();
        writer.write_bit(true);
        writer.write_bits(0x1234, 16);
        writer.write_bytes(b"abc");
        writer.write_bits(u64::MAX, 64);

        let mut reader = BitReader::new(writer.finish());
        assert!(reader.read_bit()?);
        assert_eq!(reader.read_bits(16)?, 0x1234);
        assert_eq!(reader.read_bytes(3)?, Bytes::from_static(b"abc"));
        assert_eq!(reader.read_bits(64)?, u64::MAX);
        // padding bits of the final byte
        assert_eq!(reader.bits_remaining(), 7);
        Ok(())
    }

    #[test]
    fn test_aligned_read_bytes_is_a_slice() -> Result<()> {
        let buffer = Bytes::from_static(&[1, 2, 3, 4]);
        let mut reader = BitReader::new(buffer.clone());
        assert_eq!(reader.read_bits(8)?, 1);
        let slice = reader.read_bytes(2)?;
        assert_eq!(slice.as_ptr(), buffer[1..].as_ptr());
        assert_eq!(reader.bits_read(), 24);
        Ok(())
    }

    #[test]
    fn test_not_enough_bits_leaves_cursor() {
        let mut reader = BitReader::new(Bytes::from_static(&[0xFF]));
        assert_eq!(reader.read_bits(3), Ok(0b111));
        assert_eq!(
            reader.read_bits(6),
            Err(SerializationError::NotEnoughBits {
                requested: 6,
                remaining: 5
            })
        );
        assert_eq!(reader.bits_read(), 3);
        assert!(reader.read_bytes(1).is_err());
        assert_eq!(reader.read_bits(5), Ok(0b11111));
    }
}
