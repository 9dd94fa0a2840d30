//! Frame addressing for native and encapsulated pixel data.
use byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure, Snafu};

use medicom_core::value::PrimitiveValue;

use crate::attribute::PixelDescriptor;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The frame index is out of range.
    #[snafu(display("frame index {} out of range (frames: {})", frame, frames))]
    FrameOutOfRange { frame: u32, frames: u32 },

    /// The pixel data value is shorter than the addressed frame.
    #[snafu(display("pixel data ends before frame {}", frame))]
    ShortPixelData { frame: u32 },

    /// The pixel data value has an unexpected in-memory type.
    #[snafu(display("pixel data value type is not byte or word data"))]
    UnsupportedValueType,

    /// The Basic Offset Table contradicts the fragment layout.
    #[snafu(display("basic offset table entry {} is out of bounds", offset))]
    OffsetOutOfBounds { offset: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Slice one frame out of native (uncompressed) pixel data,
/// as little-endian sample bytes.
pub fn native_frame(
    value: &PrimitiveValue,
    desc: &PixelDescriptor,
    frame: u32,
) -> Result<Vec<u8>> {
    ensure!(
        frame < desc.frames,
        FrameOutOfRangeSnafu {
            frame,
            frames: desc.frames
        }
    );
    let frame_size = desc.bytes_per_frame();
    let start = frame as usize * frame_size;

    match value {
        PrimitiveValue::U8(data) => {
            ensure!(
                data.len() >= start + frame_size,
                ShortPixelDataSnafu { frame }
            );
            Ok(data[start..start + frame_size].to_vec())
        }
        PrimitiveValue::U16(data) => {
            // OW data: lower the words back to little-endian bytes
            let start_w = start / 2;
            let len_w = frame_size / 2;
            ensure!(
                data.len() >= start_w + len_w,
                ShortPixelDataSnafu { frame }
            );
            let mut out = vec![0u8; frame_size];
            LittleEndian::write_u16_into(&data[start_w..start_w + len_w], &mut out);
            Ok(out)
        }
        _ => UnsupportedValueTypeSnafu.fail(),
    }
}

/// Locate the encoded bytes of one frame of encapsulated pixel data.
///
/// Resolution order, as the layout information permits:
/// a Basic Offset Table with one entry per frame;
/// then a one-fragment-per-frame layout;
/// then the whole concatenated stream
/// (left to the codec to demultiplex).
pub fn encapsulated_frame(
    offset_table: &[u32],
    fragments: &[Vec<u8>],
    desc: &PixelDescriptor,
    frame: u32,
) -> Result<Vec<u8>> {
    ensure!(
        frame < desc.frames,
        FrameOutOfRangeSnafu {
            frame,
            frames: desc.frames
        }
    );

    if offset_table.len() == desc.frames as usize && desc.frames > 1 {
        // offsets address the concatenated fragment stream (BOT excluded)
        let stream: Vec<u8> = concatenated(fragments);
        let start = offset_table[frame as usize];
        let end = offset_table
            .get(frame as usize + 1)
            .copied()
            .unwrap_or(stream.len() as u32);
        ensure!(
            (start as usize) < stream.len() && (end as usize) <= stream.len() && start < end,
            OffsetOutOfBoundsSnafu { offset: start }
        );
        return Ok(stream[start as usize..end as usize].to_vec());
    }

    if fragments.len() == desc.frames as usize {
        return Ok(fragments[frame as usize].clone());
    }

    // no per-frame layout information: hand the codec the whole stream
    tracing::debug!(
        "no per-frame layout ({} fragments, {} frames); deferring to codec demux",
        fragments.len(),
        desc.frames
    );
    Ok(concatenated(fragments))
}

fn concatenated(fragments: &[Vec<u8>]) -> Vec<u8> {
    let total: usize = fragments.iter().map(|f| f.len()).sum();
    let mut out = Vec::with_capacity(total);
    for fragment in fragments {
        out.extend_from_slice(fragment);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribute::{PhotometricInterpretation, PlanarConfiguration};
    use smallvec::smallvec;

    fn desc(frames: u32, bits: u16) -> PixelDescriptor {
        PixelDescriptor {
            rows: 2,
            columns: 2,
            frames,
            bits_allocated: bits,
            bits_stored: bits,
            high_bit: bits - 1,
            signed: false,
            samples_per_pixel: 1,
            photometric: PhotometricInterpretation::Monochrome2,
            planar: PlanarConfiguration::Interleaved,
        }
    }

    #[test]
    fn native_8bit_frame_slicing() {
        let value = PrimitiveValue::U8(smallvec![1, 2, 3, 4, 5, 6, 7, 8]);
        let d = desc(2, 8);
        assert_eq!(native_frame(&value, &d, 0).unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(native_frame(&value, &d, 1).unwrap(), vec![5, 6, 7, 8]);
        assert!(matches!(
            native_frame(&value, &d, 2),
            Err(Error::FrameOutOfRange { .. })
        ));
    }

    #[test]
    fn native_16bit_frame_lowering() {
        let value = PrimitiveValue::U16(smallvec![0x0102, 0x0304, 0x0506, 0x0708]);
        let d = desc(1, 16);
        assert_eq!(
            native_frame(&value, &d, 0).unwrap(),
            vec![0x02, 0x01, 0x04, 0x03, 0x06, 0x05, 0x08, 0x07]
        );
    }

    #[test]
    fn fragment_per_frame_layout() {
        let fragments = vec![vec![0xAA; 8], vec![0xBB; 8]];
        let d = desc(2, 8);
        assert_eq!(
            encapsulated_frame(&[], &fragments, &d, 1).unwrap(),
            vec![0xBB; 8]
        );
    }

    #[test]
    fn offset_table_layout() {
        let fragments = vec![vec![0xAA; 6], vec![0xBB; 6]];
        let offsets = [0u32, 6];
        let d = desc(2, 8);
        assert_eq!(
            encapsulated_frame(&offsets, &fragments, &d, 0).unwrap(),
            vec![0xAA; 6]
        );
        assert_eq!(
            encapsulated_frame(&offsets, &fragments, &d, 1).unwrap(),
            vec![0xBB; 6]
        );
    }
}
