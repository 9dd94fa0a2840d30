//! Character set handling for DICOM text values.
//!
//! Only the default repertoire (ISO-IR 100, Latin-1 superset)
//! and Unicode in UTF-8 (ISO-IR 192) are decoded to native strings.
//! Values declared in any other specific character set are
//! passed through as raw bytes and surface lossily on demand.
use std::borrow::Cow;

use encoding::all::{ISO_8859_1, UTF_8};
use encoding::{DecoderTrap, EncoderTrap, Encoding};
use snafu::Snafu;

/// An error decoding text from its character repertoire.
#[derive(Debug, Snafu)]
#[snafu(display("could not decode text: {}", message))]
pub struct DecodeTextError {
    message: Cow<'static, str>,
}

/// An error encoding text into its character repertoire.
#[derive(Debug, Snafu)]
#[snafu(display("could not encode text: {}", message))]
pub struct EncodeTextError {
    message: Cow<'static, str>,
}

/// A text codec for one specific character set.
pub trait TextCodec {
    /// The defined term which identifies this character set
    /// in _Specific Character Set_.
    fn name(&self) -> Cow<'static, str>;

    /// Decode the given bytes into a string.
    fn decode(&self, text: &[u8]) -> Result<String, DecodeTextError>;

    /// Encode the given string into bytes.
    fn encode(&self, text: &str) -> Result<Vec<u8>, EncodeTextError>;
}

/// Codec for the default character repertoire (ISO-IR 100).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DefaultCharacterSetCodec;

impl TextCodec for DefaultCharacterSetCodec {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ISO_IR 100")
    }

    fn decode(&self, text: &[u8]) -> Result<String, DecodeTextError> {
        ISO_8859_1
            .decode(text, DecoderTrap::Strict)
            .map_err(|message| DecodeTextError { message })
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>, EncodeTextError> {
        ISO_8859_1
            .encode(text, EncoderTrap::Strict)
            .map_err(|message| EncodeTextError { message })
    }
}

/// Codec for Unicode in UTF-8 (ISO-IR 192).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Utf8CharacterSetCodec;

impl TextCodec for Utf8CharacterSetCodec {
    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ISO_IR 192")
    }

    fn decode(&self, text: &[u8]) -> Result<String, DecodeTextError> {
        UTF_8
            .decode(text, DecoderTrap::Strict)
            .map_err(|message| DecodeTextError { message })
    }

    fn encode(&self, text: &str) -> Result<Vec<u8>, EncodeTextError> {
        UTF_8
            .encode(text, EncoderTrap::Strict)
            .map_err(|message| EncodeTextError { message })
    }
}

/// The specific character set in effect for a data set.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub enum SpecificCharacterSet {
    /// the default repertoire (ISO-IR 100, also covers an absent attribute)
    #[default]
    Default,
    /// Unicode in UTF-8 (ISO-IR 192)
    Utf8,
    /// a character set this implementation does not decode;
    /// values are passed through as raw bytes
    Unsupported(String),
}

impl SpecificCharacterSet {
    /// Interpret a _Specific Character Set_ value.
    ///
    /// An empty value means the default repertoire.
    /// Unrecognized defined terms yield
    /// [`Unsupported`](SpecificCharacterSet::Unsupported).
    pub fn from_term(term: &str) -> Self {
        match term.trim_matches(['\0', ' ']) {
            "" | "ISO_IR 100" | "ISO 2022 IR 100" => SpecificCharacterSet::Default,
            "ISO_IR 192" => SpecificCharacterSet::Utf8,
            other => SpecificCharacterSet::Unsupported(other.to_string()),
        }
    }

    /// Obtain the codec for this character set,
    /// or `None` when the set is not supported.
    pub fn codec(&self) -> Option<&'static dyn TextCodec> {
        match self {
            SpecificCharacterSet::Default => Some(&DefaultCharacterSetCodec),
            SpecificCharacterSet::Utf8 => Some(&Utf8CharacterSetCodec),
            SpecificCharacterSet::Unsupported(_) => None,
        }
    }

    /// The defined term of this character set.
    pub fn term(&self) -> &str {
        match self {
            SpecificCharacterSet::Default => "ISO_IR 100",
            SpecificCharacterSet::Utf8 => "ISO_IR 192",
            SpecificCharacterSet::Unsupported(term) => term,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_codec_round_trip() {
        let codec = DefaultCharacterSetCodec;
        let text = "Simões^João";
        let bytes = codec.encode(text).unwrap();
        assert_eq!(codec.decode(&bytes).unwrap(), text);
    }

    #[test]
    fn character_set_resolution() {
        assert_eq!(
            SpecificCharacterSet::from_term("ISO_IR 100"),
            SpecificCharacterSet::Default
        );
        assert_eq!(
            SpecificCharacterSet::from_term(""),
            SpecificCharacterSet::Default
        );
        assert_eq!(
            SpecificCharacterSet::from_term("ISO_IR 192"),
            SpecificCharacterSet::Utf8
        );
        let cs = SpecificCharacterSet::from_term("ISO_IR 144");
        assert!(cs.codec().is_none());
        assert_eq!(cs.term(), "ISO_IR 144");
    }
}
