use crate::error::Result;
use crate::reader::BitReader;
use crate::writer::{BitCounter, BitWrite};

/// A type that can be written to and read from a bit stream.
pub trait BitSerialize: Sized {
    /// Serialize `self` into the writer
    fn ser(&self, writer: &mut dyn BitWrite) -> Result<()>;

    /// Parse a value from the reader
    fn de(reader: &mut BitReader) -> Result<Self>;

    /// Number of bits that [`ser`](BitSerialize::ser) writes.
    ///
    /// The default implementation serializes into a [`BitCounter`]; types on hot paths
    /// override it with a closed-form computation.
    fn bit_len(&self) -> usize {
        let mut counter = BitCounter::new();
        // a failed write still reports the bits written up to the failure
        let _ = self.ser(&mut counter);
        counter.bits_written()
    }
}

impl BitSerialize for bool {
    fn ser(&self, writer: &mut dyn BitWrite) -> Result<()> {
        writer.write_bit(*self);
        Ok(())
    }

    fn de(reader: &mut BitReader) -> Result<Self> {
        reader.read_bit()
    }

    fn bit_len(&self) -> usize {
        1
    }
}

macro_rules! impl_unsigned {
    ($($ty:ty),*) => {
        $(
            impl BitSerialize for $ty {
                fn ser(&self, writer: &mut dyn BitWrite) -> Result<()> {
                    writer.write_bits(u64::from(*self), <$ty>::BITS);
                    Ok(())
                }

                fn de(reader: &mut BitReader) -> Result<Self> {
                    // the read value has exactly BITS bits so the cast is lossless
                    Ok(reader.read_bits(<$ty>::BITS)? as $ty)
                }

                fn bit_len(&self) -> usize {
                    <$ty>::BITS as usize
                }
            }
        )*
    };
}

impl_unsigned!(u8, u16, u32, u64);

/// Options are written as a presence bit followed by the value
impl<T: BitSerialize> BitSerialize for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) -> Result<()> {
        writer.write_bit(self.is_some());
        if let Some(value) = self {
            value.ser(writer)?;
        }
        Ok(())
    }

    fn de(reader: &mut BitReader) -> Result<Self> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_len(&self) -> usize {
        1 + self.as_ref().map_or(0, |value| value.bit_len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::BitWriter;
    use test_log::test;

    #[derive(Debug, PartialEq)]
    struct Sample {
        flag: bool,
        id: u16,
        tick: Option<u32>,
    }

    impl BitSerialize for Sample {
        fn ser(&self, writer: &mut dyn BitWrite) -> Result<()> {
            self.flag.ser(writer)?;
            self.id.ser(writer)?;
            self.tick.ser(writer)
        }

        fn de(reader: &mut BitReader) -> Result<Self> {
            Ok(Self {
                flag: bool::de(reader)?,
                id: u16::de(reader)?,
                tick: Option::<u32>::de(reader)?,
            })
        }
    }

    #[test]
    fn test_struct_serde() -> Result<()> {
        let samples = [
            Sample {
                flag: true,
                id: 513,
                tick: None,
            },
            Sample {
                flag: false,
                id: u16::MAX,
                tick: Some(7),
            },
        ];
        let mut writer = BitWriter::new();
        for sample in &samples {
            sample.ser(&mut writer)?;
        }
        assert_eq!(
            writer.bits_written(),
            samples.iter().map(BitSerialize::bit_len).sum::<usize>()
        );

        let mut reader = BitReader::new(writer.finish());
        assert_eq!(Sample::de(&mut reader)?, samples[0]);
        assert_eq!(Sample::de(&mut reader)?, samples[1]);
        Ok(())
    }

    #[test]
    fn test_counter_bit_len() {
        let sample = Sample {
            flag: true,
            id: 1,
            tick: Some(2),
        };
        assert_eq!(sample.bit_len(), 1 + 16 + 1 + 32);
    }
}
