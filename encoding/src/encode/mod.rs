//! Encoding of data element headers and values into raw bytes,
//! parameterized by the transfer syntax element form.
pub mod basic;
pub mod explicit_be;
pub mod explicit_le;
pub mod implicit_le;
pub mod primitive_value;

use std::io::Write;

use byteordered::Endianness;
use snafu::{ensure, Backtrace, ResultExt, Snafu};

use medicom_core::header::{DataElementHeader, LengthWidth, Tag};

use crate::encode::basic::BasicEncoder;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not write header of element {}", tag))]
    WriteHeader {
        tag: Tag,
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display("could not write item header"))]
    WriteItemHeader {
        backtrace: Backtrace,
        source: std::io::Error,
    },

    #[snafu(display(
        "value of element {} has {} bytes, too long for a 16-bit length field",
        tag,
        len
    ))]
    ValueTooLong { tag: Tag, len: u32, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// An encoder of data element headers under one element form.
///
/// Header encoding returns the number of bytes written,
/// so that callers can track stream offsets and group lengths.
pub trait Encode {
    /// Encode a data element header.
    fn encode_element_header<W: Write>(
        &self,
        dest: &mut W,
        header: DataElementHeader,
    ) -> Result<usize>;

    /// Encode an item header with the given length
    /// (`0xFFFF_FFFF` for undefined).
    fn encode_item_header<W: Write>(&self, dest: &mut W, len: u32) -> Result<()>;

    /// Encode an item delimitation item.
    fn encode_item_delimiter<W: Write>(&self, dest: &mut W) -> Result<()>;

    /// Encode a sequence delimitation item.
    fn encode_sequence_delimiter<W: Write>(&self, dest: &mut W) -> Result<()>;

    /// The byte order of this element form.
    fn endianness(&self) -> Endianness;
}

pub(crate) fn write_tag<W: Write>(basic: &BasicEncoder, dest: &mut W, tag: Tag) -> std::io::Result<()> {
    basic.write_u16(&mut *dest, tag.group())?;
    basic.write_u16(dest, tag.element())
}

pub(crate) fn write_delimiter<W: Write>(
    basic: &BasicEncoder,
    dest: &mut W,
    tag: Tag,
) -> Result<()> {
    write_tag(basic, dest, tag).context(WriteItemHeaderSnafu)?;
    basic.write_u32(dest, 0).context(WriteItemHeaderSnafu)
}

/// Encode an explicit VR element header in the given byte order.
pub(crate) fn encode_explicit_header<W: Write>(
    basic: &BasicEncoder,
    dest: &mut W,
    header: DataElementHeader,
) -> Result<usize> {
    let tag = header.tag;
    write_tag(basic, dest, tag).context(WriteHeaderSnafu { tag })?;
    dest.write_all(&header.vr.to_bytes())
        .context(WriteHeaderSnafu { tag })?;
    match header.vr.length_width() {
        LengthWidth::Long => {
            dest.write_all(&[0, 0]).context(WriteHeaderSnafu { tag })?;
            basic
                .write_u32(dest, header.len.0)
                .context(WriteHeaderSnafu { tag })?;
            Ok(12)
        }
        LengthWidth::Short => {
            let len = header.len.0;
            ensure!(len <= u16::MAX as u32, ValueTooLongSnafu { tag, len });
            basic
                .write_u16(dest, len as u16)
                .context(WriteHeaderSnafu { tag })?;
            Ok(8)
        }
    }
}

/// An element-form encoder for any of the supported transfer syntaxes.
#[derive(Debug, Clone, Copy)]
pub enum ElementEncoder {
    /// Implicit VR Little Endian
    ImplicitLE(implicit_le::ImplicitVRLittleEndianEncoder),
    /// Explicit VR Little Endian
    ExplicitLE(explicit_le::ExplicitVRLittleEndianEncoder),
    /// Explicit VR Big Endian
    ExplicitBE(explicit_be::ExplicitVRBigEndianEncoder),
}

impl Encode for ElementEncoder {
    fn encode_element_header<W: Write>(
        &self,
        dest: &mut W,
        header: DataElementHeader,
    ) -> Result<usize> {
        match self {
            ElementEncoder::ImplicitLE(e) => e.encode_element_header(dest, header),
            ElementEncoder::ExplicitLE(e) => e.encode_element_header(dest, header),
            ElementEncoder::ExplicitBE(e) => e.encode_element_header(dest, header),
        }
    }

    fn encode_item_header<W: Write>(&self, dest: &mut W, len: u32) -> Result<()> {
        match self {
            ElementEncoder::ImplicitLE(e) => e.encode_item_header(dest, len),
            ElementEncoder::ExplicitLE(e) => e.encode_item_header(dest, len),
            ElementEncoder::ExplicitBE(e) => e.encode_item_header(dest, len),
        }
    }

    fn encode_item_delimiter<W: Write>(&self, dest: &mut W) -> Result<()> {
        match self {
            ElementEncoder::ImplicitLE(e) => e.encode_item_delimiter(dest),
            ElementEncoder::ExplicitLE(e) => e.encode_item_delimiter(dest),
            ElementEncoder::ExplicitBE(e) => e.encode_item_delimiter(dest),
        }
    }

    fn encode_sequence_delimiter<W: Write>(&self, dest: &mut W) -> Result<()> {
        match self {
            ElementEncoder::ImplicitLE(e) => e.encode_sequence_delimiter(dest),
            ElementEncoder::ExplicitLE(e) => e.encode_sequence_delimiter(dest),
            ElementEncoder::ExplicitBE(e) => e.encode_sequence_delimiter(dest),
        }
    }

    fn endianness(&self) -> Endianness {
        match self {
            ElementEncoder::ImplicitLE(e) => e.endianness(),
            ElementEncoder::ExplicitLE(e) => e.endianness(),
            ElementEncoder::ExplicitBE(e) => e.endianness(),
        }
    }
}
