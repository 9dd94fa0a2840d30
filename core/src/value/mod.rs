//! Representation of the values of a DICOM data element,
//! in memory and decoupled from any transfer syntax.
pub mod deserialize;
pub mod person_name;
pub mod serialize;

use std::borrow::Cow;
use std::fmt;

use smallvec::SmallVec;
use snafu::{OptionExt, ResultExt, Snafu};

use crate::header::{Length, Tag};
pub use crate::value::deserialize::{AgeUnit, AgeString, DicomDate, DicomDateTime, DicomTime};
pub use crate::value::person_name::PersonName;

/// A collection type for element value multiplicity,
/// optimized for the common case of a single value.
pub type C<T> = SmallVec<[T; 2]>;

/// The type identifier of a primitive value,
/// for diagnostics in conversion errors.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ValueType {
    /// no value
    Empty,
    /// a single string of characters
    Str,
    /// multiple strings of characters
    Strs,
    /// attribute tags
    Tags,
    /// unsigned 8-bit integers
    U8,
    /// signed 16-bit integers
    I16,
    /// unsigned 16-bit integers
    U16,
    /// signed 32-bit integers
    I32,
    /// unsigned 32-bit integers
    U32,
    /// signed 64-bit integers
    I64,
    /// unsigned 64-bit integers
    U64,
    /// single-precision floats
    F32,
    /// double-precision floats
    F64,
    /// dates
    Date,
    /// times
    Time,
    /// date-times
    DateTime,
}

/// Error type for a failed conversion of a primitive value
/// into a requested type.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum ConvertValueError {
    /// The value does not hold character data.
    #[snafu(display("value of type {:?} is not a string", original))]
    NotString {
        /// the type of the existing value
        original: ValueType,
    },

    /// The value is empty.
    #[snafu(display("value is empty"))]
    EmptyValue,

    /// The value does not hold (and cannot be coerced into) numeric data.
    #[snafu(display("value of type {:?} cannot be read as a number", original))]
    NotNumeric {
        /// the type of the existing value
        original: ValueType,
    },

    /// The value holds text which could not be parsed
    /// into the requested form.
    #[snafu(display("could not parse `{}` as {}", text, requested))]
    ParseText {
        /// the offending text
        text: String,
        /// the requested type
        requested: &'static str,
        #[snafu(source(from(deserialize::Error, Box::new)))]
        source: Box<deserialize::Error>,
    },

    /// The person name text could not be parsed.
    #[snafu(display("could not parse `{}` as a person name", text))]
    ParsePersonName {
        /// the offending text
        text: String,
        source: person_name::Error,
    },

    /// A numeric narrowing conversion was out of range.
    #[snafu(display("value {} out of range for {}", value, requested))]
    NarrowConvert {
        /// the value in decimal form
        value: String,
        /// the requested type
        requested: &'static str,
    },

    /// The value does not hold raw binary data.
    #[snafu(display("value of type {:?} does not hold raw bytes", original))]
    NotBytes {
        /// the type of the existing value
        original: ValueType,
    },
}

pub type ConvertResult<T> = Result<T, ConvertValueError>;

/// An in-memory representation of a primitive (non-nested) DICOM value.
///
/// Multiplicity is represented through the [`C`] small vector type.
/// Character data of string VRs is kept as decoded text,
/// while binary values are kept in their natural numeric form.
#[derive(Debug, PartialEq, Clone)]
pub enum PrimitiveValue {
    /// No value; the element is empty.
    Empty,
    /// A single string of characters.
    Str(String),
    /// Multiple strings of characters (one per value).
    Strs(C<String>),
    /// Attribute tags (VR AT).
    Tags(C<Tag>),
    /// Raw bytes (VR OB, UN).
    U8(C<u8>),
    /// Signed 16-bit integers (VR SS).
    I16(C<i16>),
    /// Unsigned 16-bit integers (VR US, OW).
    U16(C<u16>),
    /// Signed 32-bit integers (VR SL).
    I32(C<i32>),
    /// Unsigned 32-bit integers (VR UL, OL).
    U32(C<u32>),
    /// Signed 64-bit integers (VR SV).
    I64(C<i64>),
    /// Unsigned 64-bit integers (VR UV, OV).
    U64(C<u64>),
    /// Single-precision floats (VR FL, OF).
    F32(C<f32>),
    /// Double-precision floats (VR FD, OD).
    F64(C<f64>),
    /// Structured dates (VR DA).
    Date(C<DicomDate>),
    /// Structured times (VR TM).
    Time(C<DicomTime>),
    /// Structured date-times (VR DT).
    DateTime(C<DicomDateTime>),
}

impl PrimitiveValue {
    /// The type identifier of this value.
    pub fn value_type(&self) -> ValueType {
        use PrimitiveValue::*;
        match self {
            Empty => ValueType::Empty,
            Str(_) => ValueType::Str,
            Strs(_) => ValueType::Strs,
            Tags(_) => ValueType::Tags,
            U8(_) => ValueType::U8,
            I16(_) => ValueType::I16,
            U16(_) => ValueType::U16,
            I32(_) => ValueType::I32,
            U32(_) => ValueType::U32,
            I64(_) => ValueType::I64,
            U64(_) => ValueType::U64,
            F32(_) => ValueType::F32,
            F64(_) => ValueType::F64,
            Date(_) => ValueType::Date,
            Time(_) => ValueType::Time,
            DateTime(_) => ValueType::DateTime,
        }
    }

    /// The number of individual values in this element.
    pub fn multiplicity(&self) -> u32 {
        use PrimitiveValue::*;
        match self {
            Empty => 0,
            Str(_) => 1,
            Strs(v) => v.len() as u32,
            Tags(v) => v.len() as u32,
            U8(v) => v.len() as u32,
            I16(v) => v.len() as u32,
            U16(v) => v.len() as u32,
            I32(v) => v.len() as u32,
            U32(v) => v.len() as u32,
            I64(v) => v.len() as u32,
            U64(v) => v.len() as u32,
            F32(v) => v.len() as u32,
            F64(v) => v.len() as u32,
            Date(v) => v.len() as u32,
            Time(v) => v.len() as u32,
            DateTime(v) => v.len() as u32,
        }
    }

    /// Whether this value is empty.
    pub fn is_empty(&self) -> bool {
        self.multiplicity() == 0
    }

    /// Render the value as a single string,
    /// joining multiple values with the standard `\` separator.
    ///
    /// Returns a borrowed string slice when the value
    /// is already a single string.
    pub fn to_str(&self) -> Cow<'_, str> {
        use PrimitiveValue::*;
        fn join<T: fmt::Display>(v: &[T]) -> String {
            v.iter()
                .map(|x| x.to_string())
                .collect::<Vec<_>>()
                .join("\\")
        }
        match self {
            Empty => Cow::Borrowed(""),
            Str(s) => Cow::Borrowed(s.as_str()),
            Strs(v) if v.len() == 1 => Cow::Borrowed(v[0].as_str()),
            Strs(v) => Cow::Owned(v.join("\\")),
            Tags(v) => Cow::Owned(join(v)),
            U8(v) => Cow::Owned(join(v)),
            I16(v) => Cow::Owned(join(v)),
            U16(v) => Cow::Owned(join(v)),
            I32(v) => Cow::Owned(join(v)),
            U32(v) => Cow::Owned(join(v)),
            I64(v) => Cow::Owned(join(v)),
            U64(v) => Cow::Owned(join(v)),
            F32(v) => Cow::Owned(join(v)),
            F64(v) => Cow::Owned(join(v)),
            Date(v) => Cow::Owned(join(v)),
            Time(v) => Cow::Owned(join(v)),
            DateTime(v) => Cow::Owned(join(v)),
        }
    }

    /// Render the value as a single string
    /// with trailing whitespace and null padding removed.
    pub fn to_clean_str(&self) -> Cow<'_, str> {
        match self.to_str() {
            Cow::Borrowed(s) => Cow::Borrowed(s.trim_end_matches(['\0', ' '])),
            Cow::Owned(s) => Cow::Owned(s.trim_end_matches(['\0', ' ']).to_string()),
        }
    }

    /// Retrieve the individual string values.
    pub fn strings(&self) -> ConvertResult<C<String>> {
        use PrimitiveValue::*;
        match self {
            Str(s) => Ok(smallvec::smallvec![s.clone()]),
            Strs(v) => Ok(v.clone()),
            Empty => Ok(smallvec::smallvec![]),
            other => NotStringSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Retrieve the raw binary data of this value, if it holds bytes.
    pub fn to_bytes(&self) -> ConvertResult<Cow<'_, [u8]>> {
        match self {
            PrimitiveValue::U8(v) => Ok(Cow::Borrowed(&v[..])),
            PrimitiveValue::Empty => Ok(Cow::Borrowed(&[])),
            other => NotBytesSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read the first value as a signed 32-bit integer,
    /// parsing integer strings (IS) on demand.
    pub fn to_int(&self) -> ConvertResult<i32> {
        use PrimitiveValue::*;
        match self {
            I16(v) => v.first().map(|&x| x as i32).context(EmptyValueSnafu),
            U16(v) => v.first().map(|&x| x as i32).context(EmptyValueSnafu),
            I32(v) => v.first().copied().context(EmptyValueSnafu),
            U8(v) => v.first().map(|&x| x as i32).context(EmptyValueSnafu),
            U32(v) => {
                let x = *v.first().context(EmptyValueSnafu)?;
                i32::try_from(x).ok().context(NarrowConvertSnafu {
                    value: x.to_string(),
                    requested: "i32",
                })
            }
            I64(v) => {
                let x = *v.first().context(EmptyValueSnafu)?;
                i32::try_from(x).ok().context(NarrowConvertSnafu {
                    value: x.to_string(),
                    requested: "i32",
                })
            }
            U64(v) => {
                let x = *v.first().context(EmptyValueSnafu)?;
                i32::try_from(x).ok().context(NarrowConvertSnafu {
                    value: x.to_string(),
                    requested: "i32",
                })
            }
            Str(_) | Strs(_) => {
                let text = self.to_clean_str();
                let text = text.trim();
                deserialize::parse_is(text.as_bytes()).context(ParseTextSnafu {
                    text: text.to_string(),
                    requested: "IS",
                })
            }
            other => NotNumericSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read the first value as an unsigned 16-bit integer.
    pub fn to_u16(&self) -> ConvertResult<u16> {
        let v = self.to_int()?;
        u16::try_from(v).ok().context(NarrowConvertSnafu {
            value: v.to_string(),
            requested: "u16",
        })
    }

    /// Read the first value as an unsigned 32-bit integer.
    pub fn to_u32(&self) -> ConvertResult<u32> {
        use PrimitiveValue::*;
        match self {
            U32(v) => v.first().copied().context(EmptyValueSnafu),
            U64(v) => {
                let x = *v.first().context(EmptyValueSnafu)?;
                u32::try_from(x).ok().context(NarrowConvertSnafu {
                    value: x.to_string(),
                    requested: "u32",
                })
            }
            _ => {
                let v = self.to_int()?;
                u32::try_from(v).ok().context(NarrowConvertSnafu {
                    value: v.to_string(),
                    requested: "u32",
                })
            }
        }
    }

    /// Read all values as signed 32-bit integers,
    /// parsing integer strings (IS) on demand.
    pub fn to_multi_int(&self) -> ConvertResult<C<i32>> {
        use PrimitiveValue::*;
        match self {
            I16(v) => Ok(v.iter().map(|&x| x as i32).collect()),
            U16(v) => Ok(v.iter().map(|&x| x as i32).collect()),
            I32(v) => Ok(v.clone()),
            U8(v) => Ok(v.iter().map(|&x| x as i32).collect()),
            Str(_) | Strs(_) => self
                .strings()?
                .iter()
                .map(|s| {
                    let s = s.trim_matches(['\0', ' ']);
                    deserialize::parse_is(s.as_bytes()).context(ParseTextSnafu {
                        text: s.to_string(),
                        requested: "IS",
                    })
                })
                .collect(),
            other => NotNumericSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read the first value as a double-precision float,
    /// parsing decimal strings (DS) on demand.
    pub fn to_float64(&self) -> ConvertResult<f64> {
        use PrimitiveValue::*;
        match self {
            F32(v) => v.first().map(|&x| x as f64).context(EmptyValueSnafu),
            F64(v) => v.first().copied().context(EmptyValueSnafu),
            I16(v) => v.first().map(|&x| x as f64).context(EmptyValueSnafu),
            U16(v) => v.first().map(|&x| x as f64).context(EmptyValueSnafu),
            I32(v) => v.first().map(|&x| x as f64).context(EmptyValueSnafu),
            U32(v) => v.first().map(|&x| x as f64).context(EmptyValueSnafu),
            Str(_) | Strs(_) => {
                let strings = self.strings()?;
                let text = strings.first().context(EmptyValueSnafu)?;
                let text = text.trim_matches(['\0', ' ']);
                deserialize::parse_ds(text.as_bytes()).context(ParseTextSnafu {
                    text: text.to_string(),
                    requested: "DS",
                })
            }
            other => NotNumericSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read all values as double-precision floats,
    /// parsing decimal strings (DS) on demand.
    pub fn to_multi_float64(&self) -> ConvertResult<C<f64>> {
        use PrimitiveValue::*;
        match self {
            F32(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            F64(v) => Ok(v.clone()),
            I16(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            U16(v) => Ok(v.iter().map(|&x| x as f64).collect()),
            Str(_) | Strs(_) => self
                .strings()?
                .iter()
                .map(|s| {
                    let s = s.trim_matches(['\0', ' ']);
                    deserialize::parse_ds(s.as_bytes()).context(ParseTextSnafu {
                        text: s.to_string(),
                        requested: "DS",
                    })
                })
                .collect(),
            other => NotNumericSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read the first value as a structured date,
    /// parsing `YYYYMMDD` text on demand.
    pub fn to_date(&self) -> ConvertResult<DicomDate> {
        match self {
            PrimitiveValue::Date(v) => v.first().copied().context(EmptyValueSnafu),
            PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => {
                let text = self.to_clean_str().to_string();
                deserialize::parse_date(text.as_bytes())
                    .context(ParseTextSnafu { text, requested: "DA" })
            }
            other => NotStringSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read the first value as a structured time,
    /// parsing `HHMMSS[.FFFFFF]` text on demand.
    pub fn to_time(&self) -> ConvertResult<DicomTime> {
        match self {
            PrimitiveValue::Time(v) => v.first().copied().context(EmptyValueSnafu),
            PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => {
                let text = self.to_clean_str().to_string();
                deserialize::parse_time(text.as_bytes())
                    .context(ParseTextSnafu { text, requested: "TM" })
            }
            other => NotStringSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read the first value as a structured date-time.
    pub fn to_datetime(&self) -> ConvertResult<DicomDateTime> {
        match self {
            PrimitiveValue::DateTime(v) => v.first().copied().context(EmptyValueSnafu),
            PrimitiveValue::Str(_) | PrimitiveValue::Strs(_) => {
                let text = self.to_clean_str().to_string();
                deserialize::parse_datetime(text.as_bytes())
                    .context(ParseTextSnafu { text, requested: "DT" })
            }
            other => NotStringSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }

    /// Read the first value as a person name.
    pub fn to_person_name(&self) -> ConvertResult<PersonName> {
        let text = self.to_clean_str().to_string();
        PersonName::parse(&text).context(ParsePersonNameSnafu { text })
    }

    /// Read the first value as an attribute tag.
    pub fn to_tag(&self) -> ConvertResult<Tag> {
        match self {
            PrimitiveValue::Tags(v) => v.first().copied().context(EmptyValueSnafu),
            other => NotNumericSnafu {
                original: other.value_type(),
            }
            .fail(),
        }
    }
}

impl fmt::Display for PrimitiveValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_str())
    }
}

impl From<&str> for PrimitiveValue {
    fn from(v: &str) -> Self {
        PrimitiveValue::Str(v.to_string())
    }
}

impl From<String> for PrimitiveValue {
    fn from(v: String) -> Self {
        PrimitiveValue::Str(v)
    }
}

impl From<u16> for PrimitiveValue {
    fn from(v: u16) -> Self {
        PrimitiveValue::U16(smallvec::smallvec![v])
    }
}

impl From<u32> for PrimitiveValue {
    fn from(v: u32) -> Self {
        PrimitiveValue::U32(smallvec::smallvec![v])
    }
}

impl From<i32> for PrimitiveValue {
    fn from(v: i32) -> Self {
        PrimitiveValue::I32(smallvec::smallvec![v])
    }
}

impl From<f64> for PrimitiveValue {
    fn from(v: f64) -> Self {
        PrimitiveValue::F64(smallvec::smallvec![v])
    }
}

impl From<Vec<u8>> for PrimitiveValue {
    fn from(v: Vec<u8>) -> Self {
        PrimitiveValue::U8(v.into_iter().collect())
    }
}

impl From<Tag> for PrimitiveValue {
    fn from(v: Tag) -> Self {
        PrimitiveValue::Tags(smallvec::smallvec![v])
    }
}

impl From<DicomDate> for PrimitiveValue {
    fn from(v: DicomDate) -> Self {
        PrimitiveValue::Date(smallvec::smallvec![v])
    }
}

impl From<DicomTime> for PrimitiveValue {
    fn from(v: DicomTime) -> Self {
        PrimitiveValue::Time(smallvec::smallvec![v])
    }
}

/// A full data element value, which may be primitive,
/// a sequence of nested items of type `I`,
/// or a sequence of encapsulated pixel data fragments.
///
/// Equality compares the contained values;
/// the declared sequence length form does not participate
/// (an undefined length never equals anything, by design of [`Length`]).
#[derive(Debug, Clone)]
pub enum Value<I> {
    /// a primitive value with no nesting
    Primitive(PrimitiveValue),
    /// a sequence of items (VR SQ)
    Sequence {
        /// the nested data set items, in order
        items: C<I>,
        /// the declared sequence length (may be undefined)
        length: Length,
    },
    /// encapsulated pixel data
    PixelSequence {
        /// the byte offsets of the Basic Offset Table, one per frame
        /// (empty when the BOT was not provided)
        offset_table: C<u32>,
        /// the compressed fragments, excluding the Basic Offset Table
        fragments: C<Vec<u8>>,
    },
}

impl<I> Value<I> {
    /// Whether this value is a primitive value.
    pub fn is_primitive(&self) -> bool {
        matches!(self, Value::Primitive(_))
    }

    /// Obtain the primitive value, if this value is one.
    pub fn primitive(&self) -> Option<&PrimitiveValue> {
        match self {
            Value::Primitive(v) => Some(v),
            _ => None,
        }
    }

    /// Obtain the sequence items, if this value is a sequence.
    pub fn items(&self) -> Option<&[I]> {
        match self {
            Value::Sequence { items, .. } => Some(items),
            _ => None,
        }
    }

    /// Obtain the pixel data fragments,
    /// if this value is an encapsulated pixel data sequence.
    pub fn fragments(&self) -> Option<&[Vec<u8>]> {
        match self {
            Value::PixelSequence { fragments, .. } => Some(fragments),
            _ => None,
        }
    }
}

impl<I: PartialEq> PartialEq for Value<I> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Primitive(a), Value::Primitive(b)) => a == b,
            (Value::Sequence { items: a, .. }, Value::Sequence { items: b, .. }) => a == b,
            (
                Value::PixelSequence {
                    offset_table: ot_a,
                    fragments: f_a,
                },
                Value::PixelSequence {
                    offset_table: ot_b,
                    fragments: f_b,
                },
            ) => ot_a == ot_b && f_a == f_b,
            _ => false,
        }
    }
}

impl<I> From<PrimitiveValue> for Value<I> {
    fn from(v: PrimitiveValue) -> Self {
        Value::Primitive(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smallvec::smallvec;

    #[test]
    fn to_str_joins_with_backslash() {
        let v = PrimitiveValue::Strs(smallvec!["DERIVED".to_string(), "PRIMARY".to_string()]);
        assert_eq!(v.to_str(), "DERIVED\\PRIMARY");
        let v = PrimitiveValue::U16(smallvec![1, 2, 3]);
        assert_eq!(v.to_str(), "1\\2\\3");
    }

    #[test]
    fn int_coercion_from_text() {
        let v = PrimitiveValue::Str("42 ".to_string());
        assert_eq!(v.to_int().unwrap(), 42);
        let v = PrimitiveValue::Str("-7".to_string());
        assert_eq!(v.to_int().unwrap(), -7);
    }

    #[test]
    fn float_coercion_from_ds_text() {
        let v = PrimitiveValue::Str(" 00128.5 ".to_string());
        assert_eq!(v.to_float64().unwrap(), 128.5);
        let v = PrimitiveValue::Strs(smallvec!["1.5".to_string(), "-3e2".to_string()]);
        let all = v.to_multi_float64().unwrap();
        assert_eq!(&all[..], &[1.5, -300.0]);
    }

    #[test]
    fn narrowing_out_of_range_is_reported() {
        let v = PrimitiveValue::U32(smallvec![0x8000_0000]);
        assert!(matches!(
            v.to_int(),
            Err(ConvertValueError::NarrowConvert { .. })
        ));
    }
}
