//! Element encoding under Explicit VR Little Endian.
use std::io::Write;

use byteordered::Endianness;
use snafu::ResultExt;

use medicom_core::dictionary::tags;
use medicom_core::header::DataElementHeader;

use crate::encode::basic::BasicEncoder;
use crate::encode::{
    encode_explicit_header, write_delimiter, write_tag, Encode, Result, WriteItemHeaderSnafu,
};

/// Encoder for the Explicit VR Little Endian element form.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplicitVRLittleEndianEncoder;

impl Encode for ExplicitVRLittleEndianEncoder {
    fn encode_element_header<W: Write>(
        &self,
        dest: &mut W,
        header: DataElementHeader,
    ) -> Result<usize> {
        let basic = BasicEncoder::new(Endianness::Little);
        encode_explicit_header(&basic, dest, header)
    }

    fn encode_item_header<W: Write>(&self, dest: &mut W, len: u32) -> Result<()> {
        let basic = BasicEncoder::new(Endianness::Little);
        write_tag(&basic, dest, tags::ITEM).context(WriteItemHeaderSnafu)?;
        basic.write_u32(dest, len).context(WriteItemHeaderSnafu)
    }

    fn encode_item_delimiter<W: Write>(&self, dest: &mut W) -> Result<()> {
        let basic = BasicEncoder::new(Endianness::Little);
        write_delimiter(&basic, dest, tags::ITEM_DELIMITATION_ITEM)
    }

    fn encode_sequence_delimiter<W: Write>(&self, dest: &mut W) -> Result<()> {
        let basic = BasicEncoder::new(Endianness::Little);
        write_delimiter(&basic, dest, tags::SEQUENCE_DELIMITATION_ITEM)
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
    fn short_and_long_forms() {
        let mut out = Vec::new();
        let header = DataElementHeader::new(Tag(0x0010, 0x0010), VR::PN, Length(6));
        let n = ExplicitVRLittleEndianEncoder
            .encode_element_header(&mut out, header)
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(out, [0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x06, 0x00]);

        let mut out = Vec::new();
        let header = DataElementHeader::new(Tag(0x7FE0, 0x0010), VR::OB, Length::UNDEFINED);
        let n = ExplicitVRLittleEndianEncoder
            .encode_element_header(&mut out, header)
            .unwrap();
        assert_eq!(n, 12);
        assert_eq!(
            out,
            [0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]
        );
    }

    #[test]
    fn short_form_overflow_is_an_error() {
        let mut out = Vec::new();
        let header = DataElementHeader::new(Tag(0x0010, 0x0010), VR::PN, Length(0x1_0000));
        assert!(ExplicitVRLittleEndianEncoder
            .encode_element_header(&mut out, header)
            .is_err());
    }
}
