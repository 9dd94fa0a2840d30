//! The data set reader: byte streams to in-memory data sets,
//! under a chosen transfer syntax.
use std::io::{ErrorKind, Read};

use snafu::{ResultExt, Snafu};
use tracing::warn;

use medicom_core::dictionary::tags;
use medicom_core::header::{DataElementHeader, Header, Length, SequenceItemHeader, Tag, VR};
use medicom_core::validation;
use medicom_core::value::{PrimitiveValue, Value, C};
use medicom_encoding::decode::primitive_value::decode_primitive;
use medicom_encoding::decode::{Decode, ElementDecoder};
use medicom_encoding::text::SpecificCharacterSet;
use medicom_encoding::transfer_syntax::TransferSyntax;

use crate::mem::{DataElement, DataSet};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A data element header could not be decoded.
    #[snafu(display("could not decode element header at offset {}", offset))]
    DecodeHeader {
        offset: u64,
        #[snafu(source(from(medicom_encoding::decode::Error, Box::new)))]
        source: Box<medicom_encoding::decode::Error>,
    },

    /// The value bytes of an element could not be read.
    #[snafu(display("could not read value of {} at offset {}", tag, offset))]
    ReadValue {
        tag: Tag,
        offset: u64,
        source: std::io::Error,
    },

    /// The value bytes could not be decoded under the element's VR.
    #[snafu(display("could not decode value of {} at offset {}", tag, offset))]
    DecodeValue {
        tag: Tag,
        offset: u64,
        #[snafu(source(from(medicom_encoding::decode::primitive_value::Error, Box::new)))]
        source: Box<medicom_encoding::decode::primitive_value::Error>,
    },

    /// The value violates the rules of its VR (strict mode only).
    #[snafu(display("invalid value of {} at offset {}", tag, offset))]
    InvalidValue {
        tag: Tag,
        offset: u64,
        #[snafu(source(from(validation::Violation, Box::new)))]
        source: Box<validation::Violation>,
    },

    /// An element declared an odd value length (strict mode only).
    #[snafu(display("element {} at offset {} has odd length {}", tag, offset, len))]
    OddLengthValue { tag: Tag, offset: u64, len: u32 },

    /// An element declared an undefined length
    /// but is neither a sequence nor encapsulated pixel data.
    #[snafu(display(
        "element {} at offset {} has undefined length but is not a sequence",
        tag,
        offset
    ))]
    UndefinedLengthNotAllowed { tag: Tag, offset: u64 },

    /// A sequence was not terminated before the end of its enclosing scope.
    #[snafu(display("unterminated sequence or item at offset {}", offset))]
    DanglingSequence { offset: u64 },

    /// A delimitation item appeared outside of any sequence.
    #[snafu(display("unexpected delimitation item {} at offset {}", tag, offset))]
    UnexpectedDelimiter { tag: Tag, offset: u64 },

    /// The Basic Offset Table of encapsulated pixel data is malformed.
    #[snafu(display("basic offset table at offset {} has invalid length {}", offset, len))]
    PixelBotInconsistent { offset: u64, len: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// How strictly the reader treats malformed values.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum ParseMode {
    /// Malformed values halt the parse with an error.
    Strict,
    /// Malformed values are kept as UN elements with their raw bytes,
    /// and a warning is logged.
    #[default]
    Lenient,
}

struct ReaderContext {
    decoder: ElementDecoder,
    mode: ParseMode,
}

/// Read a complete data set from a byte source
/// under the given transfer syntax, until end of stream.
pub fn read_data_set<R: Read>(
    mut source: R,
    ts: &TransferSyntax,
    mode: ParseMode,
) -> Result<DataSet> {
    let ctx = ReaderContext {
        decoder: ts.element_decoder(),
        mode,
    };
    let mut ds = DataSet::new();
    let mut charset = SpecificCharacterSet::Default;
    let mut position: u64 = 0;

    loop {
        // detect a clean end of stream at an element boundary
        let mut first = [0u8; 1];
        match source.read_exact(&mut first) {
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => break,
            r => r.context(ReadValueSnafu {
                tag: Tag(0, 0),
                offset: position,
            })?,
        }
        let header = {
            let mut chained = (&first[..]).chain(&mut source);
            let (header, n) = ctx
                .decoder
                .decode_header(&mut chained)
                .context(DecodeHeaderSnafu { offset: position })?;
            position += n as u64;
            header
        };
        if header.is_item_delimiter() || header.is_sequence_delimiter() {
            return UnexpectedDelimiterSnafu {
                tag: header.tag,
                offset: position - 8,
            }
            .fail();
        }
        let element = read_element(&ctx, &mut source, header, &mut position, &charset)?;
        if element.tag() == tags::SPECIFIC_CHARACTER_SET {
            if let Ok(term) = element.to_str() {
                charset = SpecificCharacterSet::from_term(&term);
            }
        }
        ds.put(element);
    }
    Ok(ds)
}

/// Read the value portion of an element whose header was already decoded.
fn read_element<R: Read>(
    ctx: &ReaderContext,
    source: &mut R,
    header: DataElementHeader,
    position: &mut u64,
    charset: &SpecificCharacterSet,
) -> Result<DataElement> {
    let tag = header.tag;

    if header.len.is_undefined() {
        if header.vr == VR::SQ {
            let items = read_sequence_undefined(ctx, source, position, charset)?;
            return Ok(DataElement::from_parts(
                header,
                Value::Sequence {
                    items,
                    length: Length::UNDEFINED,
                },
            ));
        }
        if tag == tags::PIXEL_DATA {
            let (offset_table, fragments) = read_pixel_sequence(ctx, source, position)?;
            return Ok(DataElement::from_parts(
                header,
                Value::PixelSequence {
                    offset_table,
                    fragments,
                },
            ));
        }
        return UndefinedLengthNotAllowedSnafu {
            tag,
            offset: *position,
        }
        .fail();
    }

    let len = header.len.0;
    if len % 2 != 0 {
        match ctx.mode {
            ParseMode::Strict => {
                return OddLengthValueSnafu {
                    tag,
                    offset: *position,
                    len,
                }
                .fail()
            }
            ParseMode::Lenient => {
                warn!("element {} has odd length {}", tag, len);
            }
        }
    }

    if header.vr == VR::SQ {
        // defined-length sequence: bounded by its declared length
        let mut data = vec![0; len as usize];
        source.read_exact(&mut data).context(ReadValueSnafu {
            tag,
            offset: *position,
        })?;
        let items = read_items_from_slice(ctx, &data, *position, charset)?;
        *position += len as u64;
        return Ok(DataElement::from_parts(
            header,
            Value::Sequence {
                items,
                length: Length(len),
            },
        ));
    }

    let mut data = vec![0; len as usize];
    source.read_exact(&mut data).context(ReadValueSnafu {
        tag,
        offset: *position,
    })?;

    if ctx.mode == ParseMode::Strict {
        validation::validate(header.vr, &data).context(InvalidValueSnafu {
            tag,
            offset: *position,
        })?;
    } else if let Err(violation) = validation::validate(header.vr, &data) {
        warn!("invalid value of {}: {}; keeping raw bytes", tag, violation);
        *position += len as u64;
        let raw = PrimitiveValue::U8(data.into_iter().collect());
        return Ok(DataElement::from_parts(
            DataElementHeader::new(tag, VR::UN, Length(len)),
            Value::Primitive(raw),
        ));
    }

    let value = match decode_primitive(header.vr, &data, ctx.decoder.endianness(), charset) {
        Ok(value) => value,
        Err(e) => match ctx.mode {
            ParseMode::Strict => {
                return Err(e).context(DecodeValueSnafu {
                    tag,
                    offset: *position,
                })
            }
            ParseMode::Lenient => {
                warn!("could not decode value of {}: {}; keeping raw bytes", tag, e);
                *position += len as u64;
                let raw = PrimitiveValue::U8(data.into_iter().collect());
                return Ok(DataElement::from_parts(
                    DataElementHeader::new(tag, VR::UN, Length(len)),
                    Value::Primitive(raw),
                ));
            }
        },
    };
    *position += len as u64;
    Ok(DataElement::from_parts(header, Value::Primitive(value)))
}

/// Read sequence items from a stream until the sequence delimitation item.
fn read_sequence_undefined<R: Read>(
    ctx: &ReaderContext,
    source: &mut R,
    position: &mut u64,
    charset: &SpecificCharacterSet,
) -> Result<C<DataSet>> {
    let mut items = C::new();
    loop {
        let item = ctx
            .decoder
            .decode_item_header(source)
            .context(DecodeHeaderSnafu { offset: *position })?;
        *position += 8;
        match item {
            SequenceItemHeader::SequenceDelimiter => return Ok(items),
            SequenceItemHeader::ItemDelimiter => {
                return UnexpectedDelimiterSnafu {
                    tag: tags::ITEM_DELIMITATION_ITEM,
                    offset: *position - 8,
                }
                .fail()
            }
            SequenceItemHeader::Item { len } if len.is_defined() => {
                let mut data = vec![0; len.0 as usize];
                source.read_exact(&mut data).context(ReadValueSnafu {
                    tag: tags::ITEM,
                    offset: *position,
                })?;
                let item_set = read_item_from_slice(ctx, &data, *position, charset, Length(len.0))?;
                *position += len.0 as u64;
                items.push(item_set);
            }
            SequenceItemHeader::Item { .. } => {
                let item_set = read_item_undefined(ctx, source, position, charset)?;
                items.push(item_set);
            }
        }
    }
}

/// Read the elements of one undefined-length item
/// until the item delimitation item.
fn read_item_undefined<R: Read>(
    ctx: &ReaderContext,
    source: &mut R,
    position: &mut u64,
    charset: &SpecificCharacterSet,
) -> Result<DataSet> {
    let mut ds = DataSet::with_length(Length::UNDEFINED);
    let mut charset = charset.clone();
    ds.set_charset(charset.clone());
    loop {
        let (header, n) = ctx
            .decoder
            .decode_header(source)
            .context(DecodeHeaderSnafu { offset: *position })?;
        *position += n as u64;
        if header.is_item_delimiter() {
            return Ok(ds);
        }
        if header.is_sequence_delimiter() {
            return UnexpectedDelimiterSnafu {
                tag: header.tag,
                offset: *position - 8,
            }
            .fail();
        }
        let element = read_element(ctx, source, header, position, &charset)?;
        if element.tag() == tags::SPECIFIC_CHARACTER_SET {
            if let Ok(term) = element.to_str() {
                charset = SpecificCharacterSet::from_term(&term);
            }
        }
        ds.put(element);
    }
}

/// Read all sequence items contained in a defined-length sequence value.
fn read_items_from_slice(
    ctx: &ReaderContext,
    data: &[u8],
    base: u64,
    charset: &SpecificCharacterSet,
) -> Result<C<DataSet>> {
    let mut items = C::new();
    let mut src: &[u8] = data;
    let mut position = base;
    while !src.is_empty() {
        let item = ctx
            .decoder
            .decode_item_header(&mut src)
            .context(DecodeHeaderSnafu { offset: position })?;
        position += 8;
        match item {
            SequenceItemHeader::Item { len } if len.is_defined() => {
                let n = len.0 as usize;
                if src.len() < n {
                    return DanglingSequenceSnafu { offset: position }.fail();
                }
                let (item_data, rest) = src.split_at(n);
                let item_set =
                    read_item_from_slice(ctx, item_data, position, charset, Length(len.0))?;
                items.push(item_set);
                src = rest;
                position += n as u64;
            }
            SequenceItemHeader::Item { .. } => {
                // undefined-length item nested in a defined-length sequence
                let item_set = read_item_undefined(ctx, &mut src, &mut position, charset)?;
                items.push(item_set);
            }
            SequenceItemHeader::SequenceDelimiter | SequenceItemHeader::ItemDelimiter => {
                return UnexpectedDelimiterSnafu {
                    tag: tags::SEQUENCE_DELIMITATION_ITEM,
                    offset: position - 8,
                }
                .fail()
            }
        }
    }
    Ok(items)
}

/// Read the elements of one defined-length item from its value bytes.
fn read_item_from_slice(
    ctx: &ReaderContext,
    data: &[u8],
    base: u64,
    charset: &SpecificCharacterSet,
    length_form: Length,
) -> Result<DataSet> {
    let mut ds = DataSet::with_length(length_form);
    let mut charset = charset.clone();
    ds.set_charset(charset.clone());
    let mut src: &[u8] = data;
    let mut position = base;
    while !src.is_empty() {
        let (header, n) = ctx
            .decoder
            .decode_header(&mut src)
            .context(DecodeHeaderSnafu { offset: position })?;
        position += n as u64;
        if header.is_item_delimiter() || header.is_sequence_delimiter() {
            return UnexpectedDelimiterSnafu {
                tag: header.tag,
                offset: position - 8,
            }
            .fail();
        }
        let element = read_element(ctx, &mut src, header, &mut position, &charset)?;
        if element.tag() == tags::SPECIFIC_CHARACTER_SET {
            if let Ok(term) = element.to_str() {
                charset = SpecificCharacterSet::from_term(&term);
            }
        }
        ds.put(element);
    }
    Ok(ds)
}

/// Read the fragments of encapsulated pixel data:
/// the Basic Offset Table item followed by the encoded fragments,
/// until the sequence delimitation item.
fn read_pixel_sequence<R: Read>(
    ctx: &ReaderContext,
    source: &mut R,
    position: &mut u64,
) -> Result<(C<u32>, C<Vec<u8>>)> {
    let mut offset_table = C::new();
    let mut fragments: C<Vec<u8>> = C::new();
    let mut first = true;
    loop {
        let item = ctx
            .decoder
            .decode_item_header(source)
            .context(DecodeHeaderSnafu { offset: *position })?;
        *position += 8;
        match item {
            SequenceItemHeader::SequenceDelimiter => return Ok((offset_table, fragments)),
            SequenceItemHeader::ItemDelimiter => {
                return UnexpectedDelimiterSnafu {
                    tag: tags::ITEM_DELIMITATION_ITEM,
                    offset: *position - 8,
                }
                .fail()
            }
            SequenceItemHeader::Item { len } => {
                let len = len.get().ok_or(Error::DanglingSequence { offset: *position })?;
                let mut data = vec![0; len as usize];
                source.read_exact(&mut data).context(ReadValueSnafu {
                    tag: tags::ITEM,
                    offset: *position,
                })?;
                if first {
                    // the first item is the Basic Offset Table,
                    // a list of 32-bit frame offsets (possibly empty)
                    if len % 4 != 0 {
                        return PixelBotInconsistentSnafu {
                            offset: *position,
                            len,
                        }
                        .fail();
                    }
                    for chunk in data.chunks_exact(4) {
                        offset_table
                            .push(u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]));
                    }
                    first = false;
                } else {
                    fragments.push(data);
                }
                *position += len as u64;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_encoding::transfer_syntax::entries;

    // a small data set in Explicit VR Little Endian:
    // (0008,0060) CS "CT", (0028,0010) US 512
    const SIMPLE_EXPLICIT: &[u8] = &[
        0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x02, 0x00, b'C', b'T', //
        0x28, 0x00, 0x10, 0x00, b'U', b'S', 0x02, 0x00, 0x00, 0x02,
    ];

    #[test]
    fn reads_simple_explicit_data_set() {
        let ds = read_data_set(
            SIMPLE_EXPLICIT,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            ParseMode::Strict,
        )
        .unwrap();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.string(tags::MODALITY).unwrap(), "CT");
        assert_eq!(ds.uint16(tags::ROWS).unwrap(), 512);
    }

    #[test]
    fn reads_undefined_length_sequence() {
        // (0008,1199) SQ undefined, one undefined item holding
        // (0008,1155) UI "1.2", then delimiters
        let raw: Vec<u8> = vec![
            0x08, 0x00, 0x99, 0x11, b'S', b'Q', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, //
            0xFE, 0xFF, 0x00, 0xE0, 0xFF, 0xFF, 0xFF, 0xFF, // item, undefined
            0x08, 0x00, 0x55, 0x11, b'U', b'I', 0x04, 0x00, b'1', b'.', b'2', 0x00, //
            0xFE, 0xFF, 0x0D, 0xE0, 0x00, 0x00, 0x00, 0x00, // item delimiter
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00, // sequence delimiter
        ];
        let ds = read_data_set(
            &raw[..],
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            ParseMode::Strict,
        )
        .unwrap();
        let seq = ds.element(tags::REFERENCED_SOP_SEQUENCE).unwrap();
        let items = seq.value().items().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(
            items[0].uid(tags::REFERENCED_SOP_INSTANCE_UID).unwrap(),
            "1.2"
        );
    }

    #[test]
    fn reads_encapsulated_pixel_data() {
        // (7FE0,0010) OB undefined; empty BOT; one fragment of 2 bytes
        let raw: Vec<u8> = vec![
            0xE0, 0x7F, 0x10, 0x00, b'O', b'B', 0x00, 0x00, 0xFF, 0xFF, 0xFF, 0xFF, //
            0xFE, 0xFF, 0x00, 0xE0, 0x00, 0x00, 0x00, 0x00, // BOT, empty
            0xFE, 0xFF, 0x00, 0xE0, 0x02, 0x00, 0x00, 0x00, 0xAB, 0xCD, // fragment
            0xFE, 0xFF, 0xDD, 0xE0, 0x00, 0x00, 0x00, 0x00, // sequence delimiter
        ];
        let ds = read_data_set(
            &raw[..],
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            ParseMode::Strict,
        )
        .unwrap();
        let pixel = ds.element(tags::PIXEL_DATA).unwrap();
        match pixel.value() {
            Value::PixelSequence {
                offset_table,
                fragments,
            } => {
                assert!(offset_table.is_empty());
                assert_eq!(fragments.len(), 1);
                assert_eq!(fragments[0], vec![0xAB, 0xCD]);
            }
            other => panic!("expected pixel sequence, got {:?}", other),
        }
    }

    #[test]
    fn strict_mode_rejects_bad_values() {
        // (0008,0060) CS "c t!" - lower case is not allowed in CS
        let raw: &[u8] = &[
            0x08, 0x00, 0x60, 0x00, b'C', b'S', 0x04, 0x00, b'c', b' ', b't', b'!',
        ];
        let err = read_data_set(
            raw,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            ParseMode::Strict,
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidValue { .. }));

        // lenient mode keeps the raw bytes as UN
        let ds = read_data_set(
            raw,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            ParseMode::Lenient,
        )
        .unwrap();
        let element = ds.element(tags::MODALITY).unwrap();
        assert_eq!(element.vr(), VR::UN);
    }

    #[test]
    fn short_read_reports_offset() {
        // header declares 8 value bytes but only 2 are present
        let raw: &[u8] = &[
            0x08, 0x00, 0x18, 0x00, b'U', b'I', 0x08, 0x00, b'1', b'.',
        ];
        let err = read_data_set(
            raw,
            &entries::EXPLICIT_VR_LITTLE_ENDIAN,
            ParseMode::Strict,
        )
        .unwrap_err();
        match err {
            Error::ReadValue { offset, .. } => assert_eq!(offset, 8),
            other => panic!("unexpected error {:?}", other),
        }
    }
}
