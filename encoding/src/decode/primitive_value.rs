//! Decoding of primitive values from their raw byte form,
//! according to the element's VR and the active byte order.
use byteordered::Endianness;
use snafu::{ResultExt, Snafu};

use medicom_core::header::{Tag, VR};
use medicom_core::value::{PrimitiveValue, C};

use crate::decode::basic::BasicDecoder;
use crate::text::{DefaultCharacterSetCodec, SpecificCharacterSet, TextCodec};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not decode text value"))]
    DecodeText { source: crate::text::DecodeTextError },

    #[snafu(display("value length {} is not a multiple of {} for {}", len, unit, vr))]
    BadValueLength { vr: VR, len: usize, unit: usize },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Whether this string VR always uses the default character repertoire,
/// regardless of the declared specific character set.
fn is_default_repertoire(vr: VR) -> bool {
    use VR::*;
    matches!(vr, AE | AS | CS | DA | DS | DT | IS | TM | UI | UR)
}

/// Whether the `\` byte separates multiple values in this VR.
fn is_multi_valued(vr: VR) -> bool {
    use VR::*;
    !matches!(vr, LT | ST | UT | UR)
}

fn split_strings(text: String, vr: VR) -> PrimitiveValue {
    // strip the single padding byte appended for even length, if any
    let pad = vr.padding_byte() as char;
    let text = match text.strip_suffix(pad) {
        Some(stripped) => stripped,
        None => &text,
    };
    if is_multi_valued(vr) && text.contains('\\') {
        let parts: C<String> = text.split('\\').map(|s| s.to_string()).collect();
        PrimitiveValue::Strs(parts)
    } else {
        PrimitiveValue::Str(text.to_string())
    }
}

macro_rules! decode_array {
    ($data:expr, $basic:expr, $unit:literal, $read:ident, $variant:ident, $vr:expr) => {{
        if $data.len() % $unit != 0 {
            return BadValueLengthSnafu {
                vr: $vr,
                len: $data.len(),
                unit: $unit as usize,
            }
            .fail();
        }
        let mut out = C::with_capacity($data.len() / $unit);
        for chunk in $data.chunks_exact($unit) {
            // infallible: reading from an in-memory slice
            out.push($basic.$read(chunk).expect("chunk has exact size"));
        }
        Ok(PrimitiveValue::$variant(out))
    }};
}

/// Decode a primitive value from its raw bytes.
///
/// Character data in VRs bound to the default repertoire is decoded
/// with the default codec; other text VRs use the data set's
/// specific character set, falling back to raw byte pass-through
/// when the character set is not supported.
pub fn decode_primitive(
    vr: VR,
    data: &[u8],
    endianness: Endianness,
    charset: &SpecificCharacterSet,
) -> Result<PrimitiveValue> {
    let basic = BasicDecoder::new(endianness);
    if data.is_empty() {
        return Ok(PrimitiveValue::Empty);
    }
    use VR::*;
    match vr {
        AE | AS | CS | DA | DS | DT | IS | TM | UI | UR | LO | LT | PN | SH | ST | UC | UT => {
            let codec: &dyn TextCodec = if is_default_repertoire(vr) {
                &DefaultCharacterSetCodec
            } else {
                match charset.codec() {
                    Some(codec) => codec,
                    // unsupported character set: pass through as raw bytes
                    None => return Ok(PrimitiveValue::U8(data.iter().copied().collect())),
                }
            };
            let text = codec.decode(data).context(DecodeTextSnafu)?;
            Ok(split_strings(text, vr))
        }
        AT => {
            if data.len() % 4 != 0 {
                return BadValueLengthSnafu {
                    vr,
                    len: data.len(),
                    unit: 4usize,
                }
                .fail();
            }
            let mut tags: C<Tag> = C::with_capacity(data.len() / 4);
            for chunk in data.chunks_exact(4) {
                let group = basic.read_u16(&chunk[0..2]).expect("chunk has exact size");
                let element = basic.read_u16(&chunk[2..4]).expect("chunk has exact size");
                tags.push(Tag(group, element));
            }
            Ok(PrimitiveValue::Tags(tags))
        }
        OB | UN => Ok(PrimitiveValue::U8(data.iter().copied().collect())),
        SS => decode_array!(data, basic, 2, read_i16, I16, vr),
        US | OW => decode_array!(data, basic, 2, read_u16, U16, vr),
        SL => decode_array!(data, basic, 4, read_i32, I32, vr),
        UL | OL => decode_array!(data, basic, 4, read_u32, U32, vr),
        SV => decode_array!(data, basic, 8, read_i64, I64, vr),
        UV | OV => decode_array!(data, basic, 8, read_u64, U64, vr),
        FL | OF => decode_array!(data, basic, 4, read_f32, F32, vr),
        FD | OD => decode_array!(data, basic, 8, read_f64, F64, vr),
        // sequences are handled structurally by the data set reader
        SQ => Ok(PrimitiveValue::Empty),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn decodes_padded_text() {
        let v = decode_primitive(
            VR::CS,
            b"MONOCHROME2 ",
            Endianness::Little,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(v, PrimitiveValue::Str("MONOCHROME2".to_string()));
    }

    #[test]
    fn decodes_multi_valued_text() {
        let v = decode_primitive(
            VR::CS,
            b"DERIVED\\PRIMARY ",
            Endianness::Little,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(
            v,
            PrimitiveValue::Strs(smallvec!["DERIVED".to_string(), "PRIMARY".to_string()])
        );
    }

    #[test]
    fn decodes_numbers_in_both_byte_orders() {
        let v = decode_primitive(
            VR::US,
            &[0x01, 0x00, 0x00, 0x02],
            Endianness::Little,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(v, PrimitiveValue::U16(smallvec![1, 512]));

        let v = decode_primitive(
            VR::US,
            &[0x01, 0x00, 0x00, 0x02],
            Endianness::Big,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(v, PrimitiveValue::U16(smallvec![256, 2]));
    }

    #[test]
    fn rejects_misaligned_binary_values() {
        let r = decode_primitive(
            VR::UL,
            &[0u8; 6],
            Endianness::Little,
            &SpecificCharacterSet::Default,
        );
        assert!(matches!(r, Err(Error::BadValueLength { .. })));
    }

    #[test]
    fn unsupported_charset_passes_raw_bytes() {
        let charset = SpecificCharacterSet::from_term("ISO_IR 144");
        let v = decode_primitive(VR::LO, &[0xC4, 0xC5], Endianness::Little, &charset).unwrap();
        assert_eq!(v, PrimitiveValue::U8(smallvec![0xC4, 0xC5]));
    }
}
