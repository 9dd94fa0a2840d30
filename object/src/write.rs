//! The data set writer: in-memory data sets to byte streams,
//! under a chosen transfer syntax.
//!
//! Writing is canonical: primitive value lengths are recomputed
//! from the encoded form, with even-length padding applied
//! per the VR's padding byte.
//! Sequence and item length forms (defined or undefined)
//! are preserved from the parsed representation,
//! so that an unmodified data set re-encodes byte-identically.
use std::io::Write;

use snafu::{ensure, ResultExt, Snafu};

use medicom_core::dictionary::tags;
use medicom_core::header::{DataElementHeader, Header, Length, Tag};
use medicom_core::value::Value;
use medicom_encoding::encode::primitive_value::encode_primitive;
use medicom_encoding::encode::{Encode, ElementEncoder};
use medicom_encoding::text::SpecificCharacterSet;
use medicom_encoding::transfer_syntax::TransferSyntax;

use crate::mem::DataSet;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// An element header could not be encoded.
    #[snafu(display("could not encode header of {}", tag))]
    EncodeHeader {
        tag: Tag,
        #[snafu(source(from(medicom_encoding::encode::Error, Box::new)))]
        source: Box<medicom_encoding::encode::Error>,
    },

    /// A value could not be encoded into bytes.
    #[snafu(display("could not encode value of {}", tag))]
    EncodeValue {
        tag: Tag,
        #[snafu(source(from(medicom_encoding::encode::primitive_value::Error, Box::new)))]
        source: Box<medicom_encoding::encode::primitive_value::Error>,
    },

    /// The value bytes could not be written to the destination.
    #[snafu(display("could not write value of {}", tag))]
    WriteValue {
        tag: Tag,
        source: std::io::Error,
    },

    /// A pixel data fragment has odd length,
    /// which cannot be represented in an item.
    #[snafu(display("pixel data fragment {} has odd length {}", index, len))]
    OddFragmentLength { index: usize, len: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Write a complete data set to a byte destination
/// under the given transfer syntax.
///
/// Returns the number of bytes written.
pub fn write_data_set<W: Write>(
    dest: &mut W,
    ds: &DataSet,
    ts: &TransferSyntax,
) -> Result<u64> {
    let encoder = ts.element_encoder();
    write_elements(dest, ds, &encoder)
}

fn write_elements<W: Write>(
    dest: &mut W,
    ds: &DataSet,
    encoder: &ElementEncoder,
) -> Result<u64> {
    let mut written: u64 = 0;
    let mut charset = ds.charset().clone();
    for element in ds.iter() {
        let tag = element.tag();
        match element.value() {
            Value::Primitive(value) => {
                let bytes = encode_primitive(value, element.vr(), encoder.endianness(), &charset)
                    .context(EncodeValueSnafu { tag })?;
                let header =
                    DataElementHeader::new(tag, element.vr(), Length(bytes.len() as u32));
                let n = encoder
                    .encode_element_header(dest, header)
                    .context(EncodeHeaderSnafu { tag })?;
                dest.write_all(&bytes).context(WriteValueSnafu { tag })?;
                written += n as u64 + bytes.len() as u64;
                if tag == tags::SPECIFIC_CHARACTER_SET {
                    if let Ok(term) = element.to_str() {
                        charset = SpecificCharacterSet::from_term(&term);
                    }
                }
            }
            Value::Sequence { items, length } => {
                if length.is_defined() {
                    // items go through a buffer so the total length is known
                    let mut buffer = Vec::new();
                    for item in items.iter() {
                        write_item(&mut buffer, item, encoder)?;
                    }
                    let header =
                        DataElementHeader::new(tag, element.vr(), Length(buffer.len() as u32));
                    let n = encoder
                        .encode_element_header(dest, header)
                        .context(EncodeHeaderSnafu { tag })?;
                    dest.write_all(&buffer).context(WriteValueSnafu { tag })?;
                    written += n as u64 + buffer.len() as u64;
                } else {
                    let header = DataElementHeader::new(tag, element.vr(), Length::UNDEFINED);
                    let n = encoder
                        .encode_element_header(dest, header)
                        .context(EncodeHeaderSnafu { tag })?;
                    written += n as u64;
                    for item in items.iter() {
                        written += write_item_streamed(dest, item, encoder)?;
                    }
                    encoder
                        .encode_sequence_delimiter(dest)
                        .context(EncodeHeaderSnafu { tag })?;
                    written += 8;
                }
            }
            Value::PixelSequence {
                offset_table,
                fragments,
            } => {
                let header = DataElementHeader::new(tag, element.vr(), Length::UNDEFINED);
                let n = encoder
                    .encode_element_header(dest, header)
                    .context(EncodeHeaderSnafu { tag })?;
                written += n as u64;

                // Basic Offset Table, always little endian
                encoder
                    .encode_item_header(dest, offset_table.len() as u32 * 4)
                    .context(EncodeHeaderSnafu { tag })?;
                written += 8;
                for offset in offset_table.iter() {
                    dest.write_all(&offset.to_le_bytes())
                        .context(WriteValueSnafu { tag })?;
                    written += 4;
                }

                for (index, fragment) in fragments.iter().enumerate() {
                    ensure!(
                        fragment.len() % 2 == 0,
                        OddFragmentLengthSnafu {
                            index,
                            len: fragment.len()
                        }
                    );
                    encoder
                        .encode_item_header(dest, fragment.len() as u32)
                        .context(EncodeHeaderSnafu { tag })?;
                    dest.write_all(fragment).context(WriteValueSnafu { tag })?;
                    written += 8 + fragment.len() as u64;
                }
                encoder
                    .encode_sequence_delimiter(dest)
                    .context(EncodeHeaderSnafu { tag })?;
                written += 8;
            }
        }
    }
    Ok(written)
}

/// Write a sequence item into a buffered destination,
/// honoring the item's declared length form.
fn write_item(buffer: &mut Vec<u8>, item: &DataSet, encoder: &ElementEncoder) -> Result<()> {
    if item.length().is_defined() {
        let mut item_buffer = Vec::new();
        write_elements(&mut item_buffer, item, encoder)?;
        encoder
            .encode_item_header(buffer, item_buffer.len() as u32)
            .context(EncodeHeaderSnafu { tag: tags::ITEM })?;
        buffer.extend_from_slice(&item_buffer);
    } else {
        encoder
            .encode_item_header(buffer, 0xFFFF_FFFF)
            .context(EncodeHeaderSnafu { tag: tags::ITEM })?;
        write_elements(buffer, item, encoder)?;
        encoder
            .encode_item_delimiter(buffer)
            .context(EncodeHeaderSnafu { tag: tags::ITEM })?;
    }
    Ok(())
}

/// Write a sequence item directly to the destination,
/// honoring the item's declared length form.
fn write_item_streamed<W: Write>(
    dest: &mut W,
    item: &DataSet,
    encoder: &ElementEncoder,
) -> Result<u64> {
    if item.length().is_defined() {
        let mut item_buffer = Vec::new();
        write_elements(&mut item_buffer, item, encoder)?;
        encoder
            .encode_item_header(dest, item_buffer.len() as u32)
            .context(EncodeHeaderSnafu { tag: tags::ITEM })?;
        dest.write_all(&item_buffer)
            .context(WriteValueSnafu { tag: tags::ITEM })?;
        Ok(8 + item_buffer.len() as u64)
    } else {
        encoder
            .encode_item_header(dest, 0xFFFF_FFFF)
            .context(EncodeHeaderSnafu { tag: tags::ITEM })?;
        let written = write_elements(dest, item, encoder)?;
        encoder
            .encode_item_delimiter(dest)
            .context(EncodeHeaderSnafu { tag: tags::ITEM })?;
        Ok(written + 16)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::read::{read_data_set, ParseMode};
    use medicom_core::header::VR;
    use medicom_encoding::transfer_syntax::entries;

    #[test]
    fn written_data_sets_parse_back() {
        let mut ds = DataSet::new();
        ds.put_value(tags::MODALITY, VR::CS, "OT");
        ds.put_value(tags::ROWS, VR::US, 2_u16);
        ds.put_value(tags::PATIENT_NAME, VR::PN, "Doe^Jane");

        for ts in [
            &entries::IMPLICIT_VR_LITTLE_ENDIAN,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            &entries::EXPLICIT_VR_BIG_ENDIAN,
        ] {
            let mut out = Vec::new();
            let written = write_data_set(&mut out, &ds, ts).unwrap();
            assert_eq!(written as usize, out.len());
            let back = read_data_set(&out[..], ts, ParseMode::Strict).unwrap();
            assert_eq!(back.string(tags::MODALITY).unwrap(), "OT");
            assert_eq!(back.uint16(tags::ROWS).unwrap(), 2);
            assert_eq!(back.string(tags::PATIENT_NAME).unwrap(), "Doe^Jane");
        }
    }

    #[test]
    fn read_write_read_is_byte_identical() {
        // undefined-length sequence with one undefined-length item
        let raw: Vec<u8> = vec![
            0x08, 0x00, 0x99, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, //
            0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, //
            0x08, 0x00, 0x55, 0x11, b'U', b'I', 0x04, 0x00, b'1', b'.', b'2', 0x00, //
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, //
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00, //
            0x10, 0x00, 0x10, 0x00, b'P', b'N', 0x08, 0x00, b'D', b'o', b'e', b'^', b'J',
            b'a', b'n', b'e',
        ];
        let ts = &entries::EXPLICIT_VR_LITTLE_ENDIAN;
        let ds = read_data_set(&raw[..], ts, ParseMode::Strict).unwrap();
        let mut out = Vec::new();
        write_data_set(&mut out, &ds, ts).unwrap();
        assert_eq!(out, raw);
    }

    #[test]
    fn defined_length_sequences_are_preserved() {
        // defined-length sequence with one defined-length item
        let raw: Vec<u8> = vec![
            0x08, 0x00, 0x99, 0x11, b'S', b'Q', 0x00, 0x00, 0x14, 0x00, 0x00, 0x00, //
            0xFE, 0xFF, 0x00, 0xE0, 0x0C, 0x00, 0x00, 0x00, //
            0x08, 0x00, 0x55, 0x11, b'U', b'I', 0x04, 0x00, b'1', b'.', b'2', 0x00,
        ];
        let ts = &entries::EXPLICIT_VR_LITTLE_ENDIAN;
        let ds = read_data_set(&raw[..], ts, ParseMode::Strict).unwrap();
        let mut out = Vec::new();
        write_data_set(&mut out, &ds, ts).unwrap();
        assert_eq!(out, raw);
    }
}
