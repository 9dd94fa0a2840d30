//! Element decoding under Explicit VR Little Endian.
use std::io::Read;

use byteordered::Endianness;

use medicom_core::header::{DataElementHeader, SequenceItemHeader};

use crate::decode::basic::BasicDecoder;
use crate::decode::{decode_explicit_header, read_item_header, Decode, Result};

/// Decoder for the Explicit VR Little Endian element form,
/// which is also the element form of every encapsulated transfer syntax
/// and of the file meta group.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplicitVRLittleEndianDecoder;

impl Decode for ExplicitVRLittleEndianDecoder {
    fn decode_header<R: Read>(&self, source: &mut R) -> Result<(DataElementHeader, usize)> {
        let basic = BasicDecoder::new(Endianness::Little);
        decode_explicit_header(&basic, source)
    }

    fn decode_item_header<R: Read>(&self, source: &mut R) -> Result<SequenceItemHeader> {
        let basic = BasicDecoder::new(Endianness::Little);
        read_item_header(&basic, source)
    }

    fn endianness(&self) -> Endianness {
        Endianness::Little
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::header::{Length, Tag, VR};

    #[test]
    fn decodes_short_form_header() {
        // (0010,0010) PN, length 6
        let raw = [0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x06, 0x00];
        let mut cursor = &raw[..];
        let (header, bytes_read) = ExplicitVRLittleEndianDecoder
            .decode_header(&mut cursor)
            .unwrap();
        assert_eq!(header.tag, Tag(0x0010, 0x0010));
        assert_eq!(header.vr, VR::PN);
        assert_eq!(header.len, Length(6));
        assert_eq!(bytes_read, 8);
    }

    #[test]
    fn decodes_long_form_header() {
        // (7FE0,0010) OB, undefined length
        let raw = [
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF,
        ];
        let mut cursor = &raw[..];
        let (header, bytes_read) = ExplicitVRLittleEndianDecoder
            .decode_header(&mut cursor)
            .unwrap();
        assert_eq!(header.tag, Tag(0x7FE0, 0x0010));
        assert_eq!(header.vr, VR::OB);
        assert!(header.len.is_undefined());
        assert_eq!(bytes_read, 12);
    }

    #[test]
    fn rejects_unknown_vr() {
        let raw = [0x10, 0x00, 0x10, 0x00, b'Z', b'Z', 0x06, 0x00];
        let mut cursor = &raw[..];
        assert!(ExplicitVRLittleEndianDecoder
            .decode_header(&mut cursor)
            .is_err());
    }
}
