//! Element encoding under Implicit VR Little Endian.
use std::io::Write;

use byteordered::Endianness;
use snafu::ResultExt;

use medicom_core::dictionary::tags;
use medicom_core::header::{DataElementHeader, Length};

use crate::encode::basic::BasicEncoder;
use crate::encode::{
    write_delimiter, write_tag, Encode, Result, WriteHeaderSnafu, WriteItemHeaderSnafu,
};

/// Encoder for the Implicit VR Little Endian element form.
/// The VR is dropped; only the tag and a 32-bit length are written.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImplicitVRLittleEndianEncoder;

impl Encode for ImplicitVRLittleEndianEncoder {
    fn encode_element_header<W: Write>(
        &self,
        dest: &mut W,
        header: DataElementHeader,
    ) -> Result<usize> {
        let basic = BasicEncoder::new(Endianness::Little);
        let tag = header.tag;
        write_tag(&basic, dest, tag).context(WriteHeaderSnafu { tag })?;
        basic
            .write_u32(dest, header.len.0)
            .context(WriteHeaderSnafu { tag })?;
        Ok(8)
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
    use medicom_core::header::{Tag, VR};

    #[test]
    fn encodes_tag_and_length_only() {
        let mut out = Vec::new();
        let header = DataElementHeader::new(Tag(0x0008, 0x0018), VR::UI, Length(8));
        let n = ImplicitVRLittleEndianEncoder
            .encode_element_header(&mut out, header)
            .unwrap();
        assert_eq!(n, 8);
        assert_eq!(out, [0x08, 0x00, 0x18, 0x00, 0x08, 0x00, 0x00, 0x00]);
    }
}
