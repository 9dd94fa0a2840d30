//! Native decoder for the RLE Lossless transfer syntax
//! (PS3.5 Annex G).
//!
//! Each frame occupies one fragment, beginning with a 64-byte header:
//! a 32-bit segment count followed by fifteen 32-bit segment offsets
//! (zero terminated). Segments hold PackBits-style runs and are
//! split by byte plane: for samples wider than 8 bits,
//! the most significant plane comes first.
use byteorder::{ByteOrder, LittleEndian};
use snafu::ensure;

use crate::attribute::PixelDescriptor;
use crate::codec::{
    CodecCapabilities, MalformedFrameSnafu, OutputMismatchSnafu, PixelCodec, Result,
    RleHeaderMismatchSnafu,
};

/// The RLE Lossless codec (UID `1.2.840.10008.1.2.5`).
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct RleLosslessCodec;

impl PixelCodec for RleLosslessCodec {
    fn name(&self) -> &str {
        "rle-lossless"
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
        ensure!(
            encoded.len() >= 64,
            MalformedFrameSnafu {
                message: format!("fragment of {} bytes has no RLE header", encoded.len())
            }
        );

        let segment_count = LittleEndian::read_u32(&encoded[0..4]) as usize;
        let bytes_per_sample = desc.bytes_per_sample();
        let samples = desc.samples_per_pixel as usize;
        let expected_segments = samples * bytes_per_sample;
        ensure!(
            segment_count == expected_segments && segment_count <= 15,
            RleHeaderMismatchSnafu {
                message: format!(
                    "header declares {} segments, pixel format requires {}",
                    segment_count, expected_segments
                )
            }
        );

        let mut offsets = Vec::with_capacity(segment_count + 1);
        for i in 0..segment_count {
            let offset = LittleEndian::read_u32(&encoded[4 + 4 * i..8 + 4 * i]);
            offsets.push(offset);
        }
        offsets.push(encoded.len() as u32);

        // offsets must start right after the header and ascend
        ensure!(
            offsets[0] == 64,
            RleHeaderMismatchSnafu {
                message: format!("first segment offset is {}, expected 64", offsets[0])
            }
        );
        ensure!(
            offsets.windows(2).all(|w| w[0] < w[1])
                && *offsets.last().unwrap() as usize <= encoded.len(),
            RleHeaderMismatchSnafu {
                message: "segment offsets are not strictly ascending".to_string()
            }
        );

        let plane_len = desc.pixels_per_frame();
        let mut out = vec![0u8; desc.bytes_per_frame()];

        for segment_index in 0..segment_count {
            let segment =
                &encoded[offsets[segment_index] as usize..offsets[segment_index + 1] as usize];
            let decoded = decode_packbits(segment, plane_len)?;

            // segment order is MSB plane first;
            // the output is little-endian interleaved
            let sample = segment_index / bytes_per_sample;
            let plane = segment_index % bytes_per_sample;
            let byte_in_sample = bytes_per_sample - 1 - plane;
            let stride = samples * bytes_per_sample;
            let base = sample * bytes_per_sample + byte_in_sample;
            for (pixel, &value) in decoded.iter().enumerate() {
                out[pixel * stride + base] = value;
            }
        }
        Ok(out)
    }
}

/// Decode one PackBits run-length encoded segment
/// into exactly `expected_len` bytes.
///
/// Control byte semantics for signed byte `n`:
/// `0..=127` copies the next `n + 1` literal bytes,
/// `-127..=-1` repeats the next byte `1 - n` times,
/// and `-128` is a no-op.
fn decode_packbits(segment: &[u8], expected_len: usize) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(expected_len);
    let mut pos = 0;
    while pos < segment.len() && out.len() < expected_len {
        let control = segment[pos] as i8;
        pos += 1;
        match control {
            0..=127 => {
                let count = control as usize + 1;
                ensure!(
                    pos + count <= segment.len(),
                    MalformedFrameSnafu {
                        message: "literal run exceeds segment".to_string()
                    }
                );
                out.extend_from_slice(&segment[pos..pos + count]);
                pos += count;
            }
            -127..=-1 => {
                let count = 1 - control as isize;
                ensure!(
                    pos < segment.len(),
                    MalformedFrameSnafu {
                        message: "repeat run missing its byte".to_string()
                    }
                );
                let value = segment[pos];
                pos += 1;
                out.resize(out.len() + count as usize, value);
            }
            -128 => {
                // no-op
            }
        }
    }
    ensure!(
        out.len() >= expected_len,
        OutputMismatchSnafu {
            got: out.len(),
            expected: expected_len,
        }
    );
    out.truncate(expected_len);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{PhotometricInterpretation, PlanarConfiguration};
    use crate::codec::Error;

    fn mono_desc(rows: u16, columns: u16, bits: u16) -> PixelDescriptor {
        PixelDescriptor {
            rows,
            columns,
            frames: 1,
            bits_allocated: bits,
            bits_stored: bits,
            high_bit: bits - 1,
            signed: false,
            samples_per_pixel: 1,
            photometric: PhotometricInterpretation::Monochrome2,
            planar: PlanarConfiguration::Interleaved,
        }
    }

    fn rle_frame(segments: &[Vec<u8>]) -> Vec<u8> {
        let mut frame = vec![0u8; 64];
        LittleEndian::write_u32(&mut frame[0..4], segments.len() as u32);
        let mut offset = 64u32;
        for (i, segment) in segments.iter().enumerate() {
            LittleEndian::write_u32(&mut frame[4 + 4 * i..8 + 4 * i], offset);
            offset += segment.len() as u32;
        }
        for segment in segments {
            frame.extend_from_slice(segment);
        }
        frame
    }

    #[test]
    fn repeat_run_fills_frame() {
        // a 4x4 8-bit frame from a single repeat run:
        // control 0xF1 (-15) repeats the next byte 16 times
        let frame = rle_frame(&[vec![0xF1, 0xAB]]);
        let out = RleLosslessCodec
            .decode_frame(&frame, &mono_desc(4, 4, 8), 0)
            .unwrap();
        assert_eq!(out, vec![0xAB; 16]);
    }

    #[test]
    fn literal_run_preserves_bytes() {
        // control 0x03 copies the 4 following literal bytes
        let frame = rle_frame(&[vec![0x03, 1, 2, 3, 4]]);
        let out = RleLosslessCodec
            .decode_frame(&frame, &mono_desc(2, 2, 8), 0)
            .unwrap();
        assert_eq!(out, vec![1, 2, 3, 4]);
    }

    #[test]
    fn sixteen_bit_planes_interleave_little_endian() {
        // 2x1, 16-bit: MSB plane [0x01, 0x02], LSB plane [0x03, 0x04]
        // pixels are 0x0103 and 0x0204, little-endian on output
        let frame = rle_frame(&[vec![0x01, 0x01, 0x02], vec![0x01, 0x03, 0x04]]);
        let out = RleLosslessCodec
            .decode_frame(&frame, &mono_desc(1, 2, 16), 0)
            .unwrap();
        assert_eq!(out, vec![0x03, 0x01, 0x04, 0x02]);
    }

    #[test]
    fn noop_control_is_skipped() {
        let frame = rle_frame(&[vec![0x80, 0xF1, 0x55]]);
        let out = RleLosslessCodec
            .decode_frame(&frame, &mono_desc(4, 4, 8), 0)
            .unwrap();
        assert_eq!(out, vec![0x55; 16]);
    }

    #[test]
    fn bad_segment_count_is_rejected() {
        let mut frame = rle_frame(&[vec![0xF1, 0xAB]]);
        LittleEndian::write_u32(&mut frame[0..4], 3);
        let err = RleLosslessCodec
            .decode_frame(&frame, &mono_desc(4, 4, 8), 0)
            .unwrap_err();
        assert!(matches!(err, Error::RleHeaderMismatch { .. }));
    }

    #[test]
    fn misaligned_offsets_are_rejected() {
        let mut frame = rle_frame(&[vec![0xF1, 0xAB]]);
        LittleEndian::write_u32(&mut frame[4..8], 60);
        let err = RleLosslessCodec
            .decode_frame(&frame, &mono_desc(4, 4, 8), 0)
            .unwrap_err();
        assert!(matches!(err, Error::RleHeaderMismatch { .. }));
    }

    #[test]
    fn total_output_length_matches_descriptor() {
        let frame = rle_frame(&[vec![0xF1, 0x11], vec![0xF1, 0x22]]);
        let out = RleLosslessCodec
            .decode_frame(&frame, &mono_desc(4, 4, 16), 0)
            .unwrap();
        assert_eq!(out.len(), 4 * 4 * 2);
    }
}
