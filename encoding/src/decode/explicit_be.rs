//! Element decoding under Explicit VR Big Endian (retired, still read).
use std::io::Read;

use byteordered::Endianness;

use medicom_core::header::{DataElementHeader, SequenceItemHeader};

use crate::decode::basic::BasicDecoder;
use crate::decode::{decode_explicit_header, read_item_header, Decode, Result};

/// Decoder for the Explicit VR Big Endian element form.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplicitVRBigEndianDecoder;

impl Decode for ExplicitVRBigEndianDecoder {
    fn decode_header<R: Read>(&self, source: &mut R) -> Result<(DataElementHeader, usize)> {
        let basic = BasicDecoder::new(Endianness::Big);
        decode_explicit_header(&basic, source)
    }

    fn decode_item_header<R: Read>(&self, source: &mut R) -> Result<SequenceItemHeader> {
        let basic = BasicDecoder::new(Endianness::Big);
        read_item_header(&basic, source)
    }

    fn endianness(&self) -> Endianness {
        Endianness::Big
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::header::{Length, Tag, VR};

    #[test]
    fn decodes_big_endian_header() {
        // (0028,0010) US, length 2
        let raw = [0x00, 0x28, 0x00, 0x10, b'U', b'S', 0x00, 0x02];
        let mut cursor = &raw[..];
        let (header, _) = ExplicitVRBigEndianDecoder
            .decode_header(&mut cursor)
            .unwrap();
        assert_eq!(header.tag, Tag(0x0028, 0x0010));
        assert_eq!(header.vr, VR::US);
        assert_eq!(header.len, Length(2));
    }
}
