//! Element encoding under Explicit VR Big Endian (retired, still written
//! for interoperation with legacy archives).
use std::io::Write;

use byteordered::Endianness;
use snafu::ResultExt;

use medicom_core::dictionary::tags;
use medicom_core::header::DataElementHeader;

use crate::encode::basic::BasicEncoder;
use crate::encode::{
    encode_explicit_header, write_delimiter, write_tag, Encode, Result, WriteItemHeaderSnafu,
};

/// Encoder for the Explicit VR Big Endian element form.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExplicitVRBigEndianEncoder;

impl Encode for ExplicitVRBigEndianEncoder {
    fn encode_element_header<W: Write>(
        &self,
        dest: &mut W,
        header: DataElementHeader,
    ) -> Result<usize> {
        let basic = BasicEncoder::new(Endianness::Big);
        encode_explicit_header(&basic, dest, header)
    }

    fn encode_item_header<W: Write>(&self, dest: &mut W, len: u32) -> Result<()> {
        let basic = BasicEncoder::new(Endianness::Big);
        write_tag(&basic, dest, tags::ITEM).context(WriteItemHeaderSnafu)?;
        basic.write_u32(dest, len).context(WriteItemHeaderSnafu)
    }

    fn encode_item_delimiter<W: Write>(&self, dest: &mut W) -> Result<()> {
        let basic = BasicEncoder::new(Endianness::Big);
        write_delimiter(&basic, dest, tags::ITEM_DELIMITATION_ITEM)
    }

    fn encode_sequence_delimiter<W: Write>(&self, dest: &mut W) -> Result<()> {
        let basic = BasicEncoder::new(Endianness::Big);
        write_delimiter(&basic, dest, tags::SEQUENCE_DELIMITATION_ITEM)
    }

    fn endianness(&self) -> Endianness {
        Endianness::Big
    }
}
