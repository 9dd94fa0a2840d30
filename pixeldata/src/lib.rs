//! Decoding and rendering of DICOM pixel data.
//!
//! This crate covers the path from a parsed DICOM object
//! to displayable pixels:
//!
//! - [`attribute`] extracts the pixel descriptor from the data set;
//! - [`frames`] addresses individual frames in native and
//!   encapsulated pixel data;
//! - [`codec`] holds the registry of per-transfer-syntax codecs,
//!   including the native RLE Lossless decoder and the JPEG adapter;
//! - [`transform`] and [`palette`] implement the window level and
//!   palette color transformations;
//! - [`render`] produces 8-bit grayscale or RGBA buffers;
//! - [`transcode`] converts objects between uncompressed
//!   transfer syntaxes.
pub mod attribute;
pub mod codec;
pub mod frames;
pub mod palette;
pub mod render;
pub mod transcode;
pub mod transform;

use snafu::{OptionExt, ResultExt, Snafu};

use medicom_core::dictionary::tags;
use medicom_core::value::Value;
use medicom_object::FileObject;

pub use crate::attribute::{PhotometricInterpretation, PixelDescriptor, PlanarConfiguration};
pub use crate::render::{render_frame, PixelBuffer, RenderOptions, RenderedImage};
pub use crate::transform::{Rescale, VoiLutFunction, WindowLevel, WindowLevelTransform};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The pixel descriptor could not be extracted.
    #[snafu(display("could not interpret pixel attributes"))]
    Descriptor {
        #[snafu(source(from(attribute::Error, Box::new)))]
        source: Box<attribute::Error>,
    },

    /// The object has no pixel data element.
    #[snafu(display("object has no pixel data"))]
    MissingPixelData,

    /// The frame could not be addressed.
    #[snafu(display("could not address frame {}", frame))]
    Frame {
        frame: u32,
        #[snafu(source(from(frames::Error, Box::new)))]
        source: Box<frames::Error>,
    },

    /// The frame could not be decoded by the codec.
    #[snafu(display("could not decode frame {}", frame))]
    DecodeFrame {
        frame: u32,
        #[snafu(source(from(codec::Error, Box::new)))]
        source: Box<codec::Error>,
    },

    /// No codec is registered for the transfer syntax.
    #[snafu(display("no decoder available for transfer syntax {}", uid))]
    NoDecoder { uid: String },

    /// The transfer syntax of the object is not supported.
    #[snafu(display("unsupported transfer syntax"))]
    UnsupportedTransferSyntax { source: medicom_object::file::Error },

    /// The frame could not be rendered.
    #[snafu(display("could not render frame"))]
    Render {
        #[snafu(source(from(render::Error, Box::new)))]
        source: Box<render::Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Decode one frame of the object's pixel data
/// into native little-endian sample bytes.
///
/// For native (uncompressed) pixel data the frame bytes are
/// sliced out of the value; for encapsulated pixel data the frame
/// is located through the Basic Offset Table or fragment layout
/// and decoded with the codec registered for the transfer syntax.
pub fn decode_frame(obj: &FileObject, frame: u32) -> Result<Vec<u8>> {
    let desc = PixelDescriptor::from_data_set(obj.data()).context(DescriptorSnafu)?;
    let element = obj
        .data()
        .get(tags::PIXEL_DATA)
        .context(MissingPixelDataSnafu)?;

    match element.value() {
        Value::PixelSequence {
            offset_table,
            fragments,
        } => {
            let ts = obj.transfer_syntax().context(UnsupportedTransferSyntaxSnafu)?;
            let encoded = frames::encapsulated_frame(offset_table, fragments, &desc, frame)
                .context(FrameSnafu { frame })?;
            let registry = codec::registry();
            let codec = registry
                .decoder_for(ts.uid())
                .context(NoDecoderSnafu { uid: ts.uid() })?;
            codec
                .decode_frame(&encoded, &desc, frame)
                .context(DecodeFrameSnafu { frame })
        }
        Value::Primitive(value) => {
            frames::native_frame(value, &desc, frame).context(FrameSnafu { frame })
        }
        Value::Sequence { .. } => MissingPixelDataSnafu.fail(),
    }
}

/// Decode a frame and render it to an 8-bit image in one step,
/// honoring the window settings present in the object
/// unless overridden in `options`.
pub fn render_object_frame(
    obj: &FileObject,
    frame: u32,
    options: &RenderOptions,
) -> Result<RenderedImage> {
    let desc = PixelDescriptor::from_data_set(obj.data()).context(DescriptorSnafu)?;
    let pixels = decode_frame(obj, frame)?;
    render_frame(obj.data(), &desc, &pixels, options).context(RenderSnafu)
}
