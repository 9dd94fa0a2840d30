//! The pixel data codec registry.
//!
//! Maps transfer syntax UIDs to the codec able to decode
//! (and possibly encode) its encapsulated frames.
//! The built-in set covers RLE Lossless natively and the JPEG family
//! through the `jpeg-decoder` adapter;
//! user codecs (e.g. a JPEG 2000 decoder) can be registered
//! at startup through [`register_codec`].
pub mod jpeg;
pub mod rle;

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use once_cell::sync::Lazy;
use snafu::Snafu;

use medicom_core::dictionary::uids;

use crate::attribute::PixelDescriptor;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
#[non_exhaustive]
pub enum Error {
    /// The encoded frame data is malformed.
    #[snafu(display("malformed encoded frame: {}", message))]
    MalformedFrame { message: String },

    /// The RLE segment header contradicts the fragment contents.
    #[snafu(display("RLE header mismatch: {}", message))]
    RleHeaderMismatch { message: String },

    /// The decoded output does not match the pixel descriptor.
    #[snafu(display(
        "decoded frame has {} bytes, expected {}",
        got,
        expected
    ))]
    OutputMismatch { got: usize, expected: usize },

    /// The codec does not support this operation.
    #[snafu(display("operation not supported by codec `{}`", name))]
    Unsupported { name: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// What a registered codec can do.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct CodecCapabilities {
    /// frames can be decoded
    pub decode: bool,
    /// frames can be encoded
    pub encode: bool,
    /// decoding is backed by a platform accelerated implementation
    pub accelerated: bool,
}

/// A pixel data codec for one family of transfer syntaxes.
pub trait PixelCodec: Send + Sync {
    /// A short name identifying the codec.
    fn name(&self) -> &str;

    /// The capabilities of this codec.
    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            decode: true,
            ..Default::default()
        }
    }

    /// Decode one frame from its encoded bytes
    /// into native little-endian sample bytes.
    fn decode_frame(
        &self,
        encoded: &[u8],
        desc: &PixelDescriptor,
        frame: u32,
    ) -> Result<Vec<u8>>;

    /// Encode one frame of native sample bytes.
    ///
    /// The default implementation reports the operation
    /// as unsupported.
    fn encode_frame(&self, _pixels: &[u8], _desc: &PixelDescriptor) -> Result<Vec<u8>> {
        UnsupportedSnafu {
            name: self.name().to_string(),
        }
        .fail()
    }
}

/// A codec registration: one of the built-in codecs
/// or a user-supplied implementation.
#[derive(Clone)]
pub enum RegisteredCodec {
    /// the native RLE Lossless codec
    Rle(rle::RleLosslessCodec),
    /// the JPEG family adapter
    Jpeg(jpeg::JpegCodec),
    /// a user-supplied codec
    Custom(Arc<dyn PixelCodec>),
}

impl RegisteredCodec {
    /// The capabilities of the underlying codec.
    pub fn capabilities(&self) -> CodecCapabilities {
        match self {
            RegisteredCodec::Rle(c) => c.capabilities(),
            RegisteredCodec::Jpeg(c) => c.capabilities(),
            RegisteredCodec::Custom(c) => c.capabilities(),
        }
    }

    /// Decode one frame through the underlying codec.
    pub fn decode_frame(
        &self,
        encoded: &[u8],
        desc: &PixelDescriptor,
        frame: u32,
    ) -> Result<Vec<u8>> {
        match self {
            RegisteredCodec::Rle(c) => c.decode_frame(encoded, desc, frame),
            RegisteredCodec::Jpeg(c) => c.decode_frame(encoded, desc, frame),
            RegisteredCodec::Custom(c) => c.decode_frame(encoded, desc, frame),
        }
    }

    /// Encode one frame through the underlying codec.
    pub fn encode_frame(&self, pixels: &[u8], desc: &PixelDescriptor) -> Result<Vec<u8>> {
        match self {
            RegisteredCodec::Rle(c) => c.encode_frame(pixels, desc),
            RegisteredCodec::Jpeg(c) => c.encode_frame(pixels, desc),
            RegisteredCodec::Custom(c) => c.encode_frame(pixels, desc),
        }
    }
}

/// The codec registry, mapping transfer syntax UIDs to codecs.
#[derive(Default)]
pub struct CodecRegistry {
    codecs: HashMap<String, RegisteredCodec>,
}

impl CodecRegistry {
    /// Create a registry holding the built-in codecs.
    pub fn with_builtins() -> Self {
        let mut codecs = HashMap::new();
        codecs.insert(
            uids::RLE_LOSSLESS.to_string(),
            RegisteredCodec::Rle(rle::RleLosslessCodec),
        );
        for uid in [
            uids::JPEG_BASELINE,
            uids::JPEG_EXTENDED,
            uids::JPEG_LOSSLESS,
            uids::JPEG_LOSSLESS_SV1,
        ] {
            codecs.insert(uid.to_string(), RegisteredCodec::Jpeg(jpeg::JpegCodec));
        }
        CodecRegistry { codecs }
    }

    /// Obtain the codec registered for the given transfer syntax,
    /// if it can decode.
    pub fn decoder_for(&self, uid: &str) -> Option<RegisteredCodec> {
        self.codecs
            .get(uid.trim_end_matches('\0'))
            .filter(|c| c.capabilities().decode)
            .cloned()
    }

    /// Obtain the codec registered for the given transfer syntax,
    /// if it can encode.
    pub fn encoder_for(&self, uid: &str) -> Option<RegisteredCodec> {
        self.codecs
            .get(uid.trim_end_matches('\0'))
            .filter(|c| c.capabilities().encode)
            .cloned()
    }

    /// Whether an encoder is available for the given transfer syntax.
    pub fn has_encoder(&self, uid: &str) -> bool {
        self.encoder_for(uid).is_some()
    }

    /// Register a user codec for a transfer syntax,
    /// replacing any previous registration.
    pub fn register(&mut self, uid: impl Into<String>, codec: Arc<dyn PixelCodec>) {
        self.codecs.insert(uid.into(), RegisteredCodec::Custom(codec));
    }
}

static GLOBAL_REGISTRY: Lazy<RwLock<CodecRegistry>> =
    Lazy::new(|| RwLock::new(CodecRegistry::with_builtins()));

/// Take a snapshot of the process-wide codec registry.
pub fn registry() -> CodecRegistrySnapshot {
    CodecRegistrySnapshot
}

/// Register a user codec in the process-wide registry.
/// Intended to be called once at startup.
pub fn register_codec(uid: impl Into<String>, codec: Arc<dyn PixelCodec>) {
    GLOBAL_REGISTRY
        .write()
        .expect("codec registry lock poisoned")
        .register(uid, codec);
}

/// A read handle over the process-wide codec registry.
pub struct CodecRegistrySnapshot;

impl CodecRegistrySnapshot {
    /// Obtain the codec for the given transfer syntax, if it can decode.
    pub fn decoder_for(&self, uid: &str) -> Option<RegisteredCodec> {
        GLOBAL_REGISTRY
            .read()
            .expect("codec registry lock poisoned")
            .decoder_for(uid)
    }

    /// Obtain the codec for the given transfer syntax, if it can encode.
    pub fn encoder_for(&self, uid: &str) -> Option<RegisteredCodec> {
        GLOBAL_REGISTRY
            .read()
            .expect("codec registry lock poisoned")
            .encoder_for(uid)
    }

    /// Whether an encoder is available for the given transfer syntax.
    pub fn has_encoder(&self, uid: &str) -> bool {
        self.encoder_for(uid).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_contents() {
        let registry = CodecRegistry::with_builtins();
        assert!(registry.decoder_for(uids::RLE_LOSSLESS).is_some());
        assert!(registry.decoder_for(uids::JPEG_BASELINE).is_some());
        // no JPEG 2000 decoder is built in
        assert!(registry.decoder_for(uids::JPEG_2000).is_none());
        // the built-in set ships decoders only
        assert!(!registry.has_encoder(uids::RLE_LOSSLESS));
    }

    #[test]
    fn custom_codec_registration() {
        struct NullCodec;
        impl PixelCodec for NullCodec {
            fn name(&self) -> &str {
                "null"
            }
            fn decode_frame(
                &self,
                _encoded: &[u8],
                desc: &PixelDescriptor,
                _frame: u32,
            ) -> Result<Vec<u8>> {
                Ok(vec![0; desc.bytes_per_frame()])
            }
        }

        let mut registry = CodecRegistry::with_builtins();
        registry.register(uids::JPEG_2000, Arc::new(NullCodec));
        assert!(registry.decoder_for(uids::JPEG_2000).is_some());
    }
}
