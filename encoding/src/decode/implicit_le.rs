//! Element decoding under Implicit VR Little Endian.
use std::io::Read;

use byteordered::Endianness;

use medicom_core::dictionary::{tags, DataDictionary, StandardDataDictionary};
use medicom_core::header::{DataElementHeader, Length, SequenceItemHeader, VR};

use crate::decode::basic::BasicDecoder;
use crate::decode::{read_item_header, read_tag, Decode, ReadLengthSnafu, Result};
use snafu::ResultExt;

/// Decoder for the Implicit VR Little Endian element form.
///
/// The VR is not present in the stream:
/// it is resolved through the standard data dictionary,
/// defaulting to UN for unknown attributes.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImplicitVRLittleEndianDecoder;

impl Decode for ImplicitVRLittleEndianDecoder {
    fn decode_header<R: Read>(&self, source: &mut R) -> Result<(DataElementHeader, usize)> {
        let basic = BasicDecoder::new(Endianness::Little);
        let tag = read_tag(&basic, source)?;
        let len = basic.read_u32(source).context(ReadLengthSnafu { tag })?;
        let len = Length(len);

        let vr = if tag == tags::PIXEL_DATA && len.is_undefined() {
            // encapsulated pixel data is OB by definition
            VR::OB
        } else if tag.group() == 0xFFFE {
            VR::UN
        } else {
            StandardDataDictionary.vr_of(tag)
        };

        Ok((DataElementHeader::new(tag, vr, len), 8))
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
    use medicom_core::header::Tag;

    // (0008,0018) SOPInstanceUID, length 8
    const RAW: &[u8] = &[0x08, 0x00, 0x18, 0x00, 0x08, 0x00, 0x00, 0x00];

    #[test]
    fn decodes_header_with_dictionary_vr() {
        let mut cursor = RAW;
        let (header, bytes_read) = ImplicitVRLittleEndianDecoder
            .decode_header(&mut cursor)
            .unwrap();
        assert_eq!(header.tag, Tag(0x0008, 0x0018));
        assert_eq!(header.vr, VR::UI);
        assert_eq!(header.len, Length(8));
        assert_eq!(bytes_read, 8);
    }

    #[test]
    fn unknown_tag_resolves_to_un() {
        let raw = [0x09, 0x00, 0x01, 0x10, 0x02, 0x00, 0x00, 0x00];
        let mut cursor = &raw[..];
        let (header, _) = ImplicitVRLittleEndianDecoder
            .decode_header(&mut cursor)
            .unwrap();
        assert_eq!(header.vr, VR::UN);
    }
}
