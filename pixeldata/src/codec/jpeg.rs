//! JPEG family decoding through the `jpeg-decoder` crate:
//! Baseline (Process 1), Extended (Process 2 & 4)
//! and the lossless processes.
use std::io::Cursor;

use byteorder::{ByteOrder, LittleEndian};
use snafu::ensure;

use crate::attribute::PixelDescriptor;
use crate::codec::{
    CodecCapabilities, MalformedFrameSnafu, OutputMismatchSnafu, PixelCodec, Result,
};

/// The JPEG family codec, decoding one JPEG stream per frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct JpegCodec;

impl PixelCodec for JpegCodec {
    fn name(&self) -> &str {
        "jpeg"
    }

    fn capabilities(&self) -> CodecCapabilities {
        CodecCapabilities {
            decode: true,
            encode: false,
            accelerated: false,
        }
    }

    fn decode_frame(
        &self,
        encoded: &[u8],
        desc: &PixelDescriptor,
        _frame: u32,
    ) -> Result<Vec<u8>> {
        let mut decoder = jpeg_decoder::Decoder::new(Cursor::new(encoded));
        let pixels = decoder.decode().map_err(|e| {
            MalformedFrameSnafu {
                message: format!("JPEG decode failed: {}", e),
            }
            .build()
        })?;
        let info = decoder.info().ok_or_else(|| {
            MalformedFrameSnafu {
                message: "JPEG stream has no frame info".to_string(),
            }
            .build()
        })?;
        ensure!(
            info.width == desc.columns && info.height == desc.rows,
            MalformedFrameSnafu {
                message: format!(
                    "JPEG frame is {}x{}, pixel module declares {}x{}",
                    info.width, info.height, desc.columns, desc.rows
                )
            }
        );

        // jpeg-decoder yields u8 for 8-bit output and u16 samples
        // packed as native-endian u8 pairs for 12/16-bit output;
        // normalize to little-endian sample bytes
        let out = match info.pixel_format {
            jpeg_decoder::PixelFormat::L8 | jpeg_decoder::PixelFormat::RGB24 => pixels,
            jpeg_decoder::PixelFormat::L16 => {
                let mut words = vec![0u16; pixels.len() / 2];
                byteorder::NativeEndian::read_u16_into(&pixels, &mut words);
                let mut out = vec![0u8; pixels.len()];
                LittleEndian::write_u16_into(&words, &mut out);
                out
            }
            other => {
                return MalformedFrameSnafu {
                    message: format!("unsupported JPEG pixel format {:?}", other),
                }
                .fail()
            }
        };

        ensure!(
            out.len() == desc.bytes_per_frame(),
            OutputMismatchSnafu {
                got: out.len(),
                expected: desc.bytes_per_frame(),
            }
        );
        Ok(out)
    }
}
