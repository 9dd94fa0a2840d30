//! Encoding of primitive values into their raw byte form,
//! according to the element's VR and the active byte order.
//!
//! The output is always padded to even length
//! with the padding byte of the VR.
use byteordered::Endianness;
use snafu::Snafu;

use medicom_core::header::VR;
use medicom_core::value::PrimitiveValue;

use crate::encode::basic::BasicEncoder;
use crate::text::{DefaultCharacterSetCodec, SpecificCharacterSet, TextCodec};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("could not encode text value"))]
    EncodeText { source: crate::text::EncodeTextError },

    #[snafu(display("value of type {:?} cannot be encoded as {}", value_type, vr))]
    IncompatibleValue {
        vr: VR,
        value_type: medicom_core::value::ValueType,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

fn is_default_repertoire(vr: VR) -> bool {
    use VR::*;
    matches!(vr, AE | AS | CS | DA | DS | DT | IS | TM | UI | UR)
}

fn pad_to_even(mut data: Vec<u8>, pad: u8) -> Vec<u8> {
    if data.len() % 2 != 0 {
        data.push(pad);
    }
    data
}

macro_rules! encode_array {
    ($values:expr, $basic:expr, $unit:literal, $write:ident) => {{
        let mut out = Vec::with_capacity($values.len() * $unit);
        for &v in $values.iter() {
            // infallible: writing into a Vec
            $basic.$write(&mut out, v).expect("writing to Vec");
        }
        out
    }};
}

/// Encode a primitive value into raw bytes under the given VR,
/// byte order and character set, padded to even length.
pub fn encode_primitive(
    value: &PrimitiveValue,
    vr: VR,
    endianness: Endianness,
    charset: &SpecificCharacterSet,
) -> Result<Vec<u8>> {
    let basic = BasicEncoder::new(endianness);
    use PrimitiveValue::*;
    let bytes = match value {
        Empty => Vec::new(),
        Str(_) | Strs(_) | Date(_) | Time(_) | DateTime(_) => {
            let text = value.to_str();
            let codec: &dyn TextCodec = if is_default_repertoire(vr) {
                &DefaultCharacterSetCodec
            } else {
                // fall back to the default repertoire when the
                // declared character set has no codec
                charset.codec().unwrap_or(&DefaultCharacterSetCodec)
            };
            let encoded = codec.encode(&text).map_err(|source| Error::EncodeText { source })?;
            return Ok(pad_to_even(encoded, vr.padding_byte()));
        }
        Tags(tags) => {
            let mut out = Vec::with_capacity(tags.len() * 4);
            for tag in tags.iter() {
                basic.write_u16(&mut out, tag.group()).expect("writing to Vec");
                basic
                    .write_u16(&mut out, tag.element())
                    .expect("writing to Vec");
            }
            out
        }
        U8(values) => values.to_vec(),
        I16(values) => encode_array!(values, basic, 2, write_i16),
        U16(values) => encode_array!(values, basic, 2, write_u16),
        I32(values) => encode_array!(values, basic, 4, write_i32),
        U32(values) => encode_array!(values, basic, 4, write_u32),
        I64(values) => encode_array!(values, basic, 8, write_i64),
        U64(values) => encode_array!(values, basic, 8, write_u64),
        F32(values) => encode_array!(values, basic, 4, write_f32),
        F64(values) => encode_array!(values, basic, 8, write_f64),
    };
    Ok(pad_to_even(bytes, vr.padding_byte()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::primitive_value::decode_primitive;
    use smallvec::smallvec;

    #[test]
    fn text_is_padded_to_even_length() {
        let v = PrimitiveValue::Str("MONOCHROME2".to_string());
        let bytes = encode_primitive(
            &v,
            VR::CS,
            Endianness::Little,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(bytes, b"MONOCHROME2 ");

        let v = PrimitiveValue::Str("1.2.840.10008.1.1".to_string());
        let bytes = encode_primitive(
            &v,
            VR::UI,
            Endianness::Little,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(bytes, b"1.2.840.10008.1.1\0");
    }

    #[test]
    fn numbers_round_trip_through_bytes() {
        for endianness in [Endianness::Little, Endianness::Big] {
            let v = PrimitiveValue::U16(smallvec![1, 2, 512]);
            let bytes =
                encode_primitive(&v, VR::US, endianness, &SpecificCharacterSet::Default).unwrap();
            assert_eq!(bytes.len(), 6);
            let back =
                decode_primitive(VR::US, &bytes, endianness, &SpecificCharacterSet::Default)
                    .unwrap();
            assert_eq!(back, v);
        }
    }

    #[test]
    fn multi_valued_text_round_trips() {
        let v = PrimitiveValue::Strs(smallvec!["DERIVED".to_string(), "PRIMARY".to_string()]);
        let bytes = encode_primitive(
            &v,
            VR::CS,
            Endianness::Little,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(bytes, b"DERIVED\\PRIMARY ");
        let back = decode_primitive(
            VR::CS,
            &bytes,
            Endianness::Little,
            &SpecificCharacterSet::Default,
        )
        .unwrap();
        assert_eq!(back, v);
    }
}
