use serde::{Deserialize, Serialize};
use tidewire_serde::{BitReader, BitSerialize, BitWrite};

pub const PROTOCOL_ID_BITS: usize = 32;
pub const PACKET_SEQUENCE_ID_BITS: usize = 32;

/// Header size of a standalone packet: protocol id and standalone bit
pub const STANDALONE_HEADER_BITS: usize = PROTOCOL_ID_BITS + 1;

/// Header size of a packet that is part of the packet sequence
pub const SEQUENCED_HEADER_BITS: usize = STANDALONE_HEADER_BITS + PACKET_SEQUENCE_ID_BITS;

/// Identifies the protocol (and its version) spoken by a peer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProtocolId(pub u32);

impl ProtocolId {
    /// "TDW" followed by the wire format version
    pub const DEFAULT: Self = Self(0x5444_5701);
}

impl Default for ProtocolId {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Counter of the packets sent over a link, `0` is never used
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PacketSequenceId(pub u32);

impl PacketSequenceId {
    pub const INVALID: Self = Self(0);

    pub fn is_valid(self) -> bool {
        self != Self::INVALID
    }

    pub fn next(self) -> Option<Self> {
        self.0.checked_add(1).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketHeader {
    pub protocol_id: ProtocolId,
    /// `None` for standalone packets
    pub sequence_id: Option<PacketSequenceId>,
}

impl PacketHeader {
    pub fn is_standalone(&self) -> bool {
        self.sequence_id.is_none()
    }

    pub fn bit_len(&self) -> usize {
        if self.is_standalone() {
            STANDALONE_HEADER_BITS
        } else {
            SEQUENCED_HEADER_BITS
        }
    }
}

impl BitSerialize for PacketHeader {
    fn ser(&self, writer: &mut dyn BitWrite) -> tidewire_serde::Result<()> {
        self.protocol_id.0.ser(writer)?;
        self.is_standalone().ser(writer)?;
        if let Some(sequence_id) = self.sequence_id {
            sequence_id.0.ser(writer)?;
        }
        Ok(())
    }

    fn de(reader: &mut BitReader) -> tidewire_serde::Result<Self> {
        let protocol_id = ProtocolId(u32::de(reader)?);
        let sequence_id = if bool::de(reader)? {
            None
        } else {
            Some(PacketSequenceId(u32::de(reader)?))
        };
        Ok(Self {
            protocol_id,
            sequence_id,
        })
    }

    fn bit_len(&self) -> usize {
        PacketHeader::bit_len(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;
    use tidewire_serde::BitWriter;

    #[test]
    fn test_header_sizes() {
        let mut header = PacketHeader {
            protocol_id: ProtocolId(7),
            sequence_id: None,
        };
        let mut writer = BitWriter::new();
        header.ser(&mut writer).unwrap();
        assert_eq!(writer.bits_written(), STANDALONE_HEADER_BITS);
        assert_eq!(writer.bits_written(), 33);

        header.sequence_id = Some(PacketSequenceId(3));
        let mut writer = BitWriter::new();
        header.ser(&mut writer).unwrap();
        assert_eq!(writer.bits_written(), SEQUENCED_HEADER_BITS);
        assert_eq!(writer.bits_written(), 65);

        let mut reader = BitReader::new(writer.finish());
        assert_eq!(PacketHeader::de(&mut reader).unwrap(), header);
    }

    #[test]
    fn test_protocol_id_comes_first() {
        let header = PacketHeader {
            protocol_id: ProtocolId(0x0102_0304),
            sequence_id: Some(PacketSequenceId(1)),
        };
        let mut writer = BitWriter::new();
        header.ser(&mut writer).unwrap();
        assert_eq!(&writer.as_slice()[..4], &[1, 2, 3, 4]);
    }
}
