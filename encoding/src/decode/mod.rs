//! Decoding of data element headers and values from raw bytes,
//! parameterized by the transfer syntax element form.
pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;
pub mod primitive_value;

use std::io::Read;

use byteordered::Endianness;
use snafu::{Backtrace, ResultExt, Snafu};

use medicom_core::header::{DataElementHeader, Length, SequenceItemHeader, Tag, VR};

use crate::decode::basic::BasicDecoder;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not read data element tag"))]
    ReadTag {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("could not read value representation of {}", tag))]
    ReadVr {
        tag: Tag,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("unknown value representation {:?} in {}", bytes, tag))]
    UnknownVr {
        tag: Tag,
        bytes: [u8; 2],
        backtrace: Backtrace,
    },

    #[snafu(display("could not read value length of {}", tag))]
    ReadLength {
        tag: Tag,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("item header tag {} is not a sequence item", tag))]
    UnexpectedItemTag { tag: Tag, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A decoder of data element headers under one element form.
///
/// The `usize` in the output of header decoding
/// is the number of bytes consumed from the source,
/// so that callers can track stream offsets.
pub trait Decode {
    /// Decode a data element header from the source.
    fn decode_header<R: Read>(&self, source: &mut R) -> Result<(DataElementHeader, usize)>;

    /// Decode a sequence item header (item, item delimiter
    /// or sequence delimiter) from the source.
    /// Always consumes exactly 8 bytes.
    fn decode_item_header<R: Read>(&self, source: &mut R) -> Result<SequenceItemHeader>;

    /// The byte order of this element form.
    fn endianness(&self) -> Endianness;
}

/// Read a tag in the given byte order.
pub(crate) fn read_tag<R: Read>(basic: &BasicDecoder, source: &mut R) -> Result<Tag> {
    let group = basic.read_u16(&mut *source).context(ReadTagSnafu)?;
    let element = basic.read_u16(source).context(ReadTagSnafu)?;
    Ok(Tag(group, element))
}

pub(crate) fn read_item_header<R: Read>(
    basic: &BasicDecoder,
    source: &mut R,
) -> Result<SequenceItemHeader> {
    let tag = read_tag(basic, source)?;
    let len = basic.read_u32(source).context(ReadLengthSnafu { tag })?;
    match SequenceItemHeader::new(tag, Length(len)) {
        Ok(header) => Ok(header),
        Err(_) => UnexpectedItemTagSnafu { tag }.fail(),
    }
}

/// An element-form decoder for any of the supported transfer syntaxes.
#[derive(Debug, Clone, Copy)]
pub enum ElementDecoder {
    /// Implicit VR Little Endian
    ImplicitLE(implicit_le::ImplicitVRLittleEndianDecoder),
    /// Explicit VR Little Endian (also used by all encapsulated syntaxes)
    ExplicitLE(explicit_le::ExplicitVRLittleEndianDecoder),
    /// Explicit VR Big Endian
    ExplicitBE(explicit_be::ExplicitVRBigEndianDecoder),
}

impl Decode for ElementDecoder {
    fn decode_header<R: Read>(&self, source: &mut R) -> Result<(DataElementHeader, usize)> {
        match self {
            ElementDecoder::ImplicitLE(d) => d.decode_header(source),
            ElementDecoder::ExplicitLE(d) => d.decode_header(source),
            ElementDecoder::ExplicitBE(d) => d.decode_header(source),
        }
    }

    fn decode_item_header<R: Read>(&self, source: &mut R) -> Result<SequenceItemHeader> {
        match self {
            ElementDecoder::ImplicitLE(d) => d.decode_item_header(source),
            ElementDecoder::ExplicitLE(d) => d.decode_item_header(source),
            ElementDecoder::ExplicitBE(d) => d.decode_item_header(source),
        }
    }

    fn endianness(&self) -> Endianness {
        match self {
            ElementDecoder::ImplicitLE(d) => d.endianness(),
            ElementDecoder::ExplicitLE(d) => d.endianness(),
            ElementDecoder::ExplicitBE(d) => d.endianness(),
        }
    }
}

/// Decode the header of an explicitly encoded element:
/// the VR follows the tag in two characters,
/// and its class decides the width of the length field.
pub(crate) fn decode_explicit_header<R: Read>(
    basic: &BasicDecoder,
    source: &mut R,
) -> Result<(DataElementHeader, usize)> {
    let tag = read_tag(basic, source)?;

    // item and delimiter elements never carry an explicit VR
    if tag.group() == 0xFFFE {
        let len = basic.read_u32(source).context(ReadLengthSnafu { tag })?;
        return Ok((DataElementHeader::new(tag, VR::UN, Length(len)), 8));
    }

    let mut vr_bytes = [0u8; 2];
    source
        .read_exact(&mut vr_bytes)
        .context(ReadVrSnafu { tag })?;
    let vr = match VR::from_binary(vr_bytes) {
        Some(vr) => vr,
        None => {
            return UnknownVrSnafu {
                tag,
                bytes: vr_bytes,
            }
            .fail()
        }
    };

    let (len, bytes_read) = match vr.length_width() {
        medicom_core::header::LengthWidth::Long => {
            let mut reserved = [0u8; 2];
            source
                .read_exact(&mut reserved)
                .context(ReadLengthSnafu { tag })?;
            let len = basic.read_u32(source).context(ReadLengthSnafu { tag })?;
            (Length(len), 12)
        }
        medicom_core::header::LengthWidth::Short => {
            let len = basic.read_u16(source).context(ReadLengthSnafu { tag })?;
            (Length(len as u32), 8)
        }
    };

    Ok((DataElementHeader::new(tag, vr, len), bytes_read))
}
