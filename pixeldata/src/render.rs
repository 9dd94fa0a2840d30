//! Rendering of decoded pixel frames into 8-bit display buffers.
use byteorder::{ByteOrder, LittleEndian};
use snafu::Snafu;

use medicom_core::dictionary::tags;
use medicom_object::mem::DataSet;

use crate::attribute::{PhotometricInterpretation, PixelDescriptor, PlanarConfiguration};
use crate::palette::PaletteLut;
use crate::transform::{Rescale, VoiLutFunction, WindowLevel, WindowLevelTransform};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The frame buffer does not match the descriptor.
    #[snafu(display("frame has {} bytes, descriptor requires {}", got, expected))]
    BufferMismatch { got: usize, expected: usize },

    /// The palette lookup table could not be read.
    #[snafu(display("could not read palette color lookup table"))]
    Palette { source: crate::palette::Error },

    /// The sample format is not supported by the renderer.
    #[snafu(display("unsupported sample format: {} bits", bits))]
    UnsupportedBits { bits: u16 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Options controlling the rendering of a frame.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct RenderOptions {
    /// the window to apply; when absent, the window settings of the
    /// data set are used, or a full-range window as a last resort
    pub window: Option<WindowLevel>,
    /// the VOI LUT function to apply; when absent, the function
    /// declared in the data set is used, defaulting to LINEAR
    pub function: Option<VoiLutFunction>,
    /// whether to apply the modality rescale before windowing,
    /// for window values given in absolute (output) units
    pub apply_rescale: bool,
}

/// The pixels of a rendered frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PixelBuffer {
    /// one 8-bit luminance sample per pixel
    Gray8(Vec<u8>),
    /// four 8-bit samples per pixel (red, green, blue, alpha)
    Rgba8(Vec<u8>),
}

/// A rendered frame: dimensions plus the 8-bit pixel buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedImage {
    /// width in pixels
    pub width: u16,
    /// height in pixels
    pub height: u16,
    /// the pixel buffer
    pub pixels: PixelBuffer,
}

/// Render one decoded frame into an 8-bit buffer,
/// honoring the photometric interpretation.
///
/// Monochrome frames produce grayscale output;
/// palette color and full-color frames produce RGBA output
/// with an opaque alpha channel.
pub fn render_frame(
    ds: &DataSet,
    desc: &PixelDescriptor,
    frame: &[u8],
    options: &RenderOptions,
) -> Result<RenderedImage> {
    if frame.len() != desc.bytes_per_frame() {
        return BufferMismatchSnafu {
            got: frame.len(),
            expected: desc.bytes_per_frame(),
        }
        .fail();
    }

    let pixels = match desc.photometric {
        PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2 => {
            PixelBuffer::Gray8(render_monochrome(ds, desc, frame, options)?)
        }
        PhotometricInterpretation::PaletteColor => {
            PixelBuffer::Rgba8(render_palette(ds, desc, frame)?)
        }
        _ => PixelBuffer::Rgba8(render_color(desc, frame)?),
    };

    Ok(RenderedImage {
        width: desc.columns,
        height: desc.rows,
        pixels,
    })
}

/// Read one stored sample value, sign-extended and masked
/// to the effective stored bits.
fn stored_value(desc: &PixelDescriptor, frame: &[u8], index: usize) -> Result<i64> {
    let raw: u32 = match desc.bits_allocated {
        8 => frame[index] as u32,
        16 => LittleEndian::read_u16(&frame[index * 2..index * 2 + 2]) as u32,
        32 => LittleEndian::read_u32(&frame[index * 4..index * 4 + 4]),
        bits => return UnsupportedBitsSnafu { bits }.fail(),
    };
    let mask: u32 = if desc.bits_stored >= 32 {
        u32::MAX
    } else {
        (1u32 << desc.bits_stored) - 1
    };
    let value = raw & mask;
    if desc.signed {
        // two's complement within bits_stored
        let sign_bit = 1u32 << (desc.bits_stored - 1);
        if value & sign_bit != 0 {
            return Ok(value as i64 - (1i64 << desc.bits_stored));
        }
    }
    Ok(value as i64)
}

fn window_from_data_set(ds: &DataSet, desc: &PixelDescriptor) -> WindowLevel {
    let center = ds.float64(tags::WINDOW_CENTER).ok();
    let width = ds.float64(tags::WINDOW_WIDTH).ok();
    match (center, width) {
        (Some(center), Some(width)) => WindowLevel { center, width },
        _ => {
            // full range of the stored sample values
            let full = (1u64 << desc.bits_stored) as f64;
            let center = if desc.signed { 0. } else { full / 2. };
            WindowLevel {
                center,
                width: full,
            }
        }
    }
}

fn rescale_from_data_set(ds: &DataSet) -> Rescale {
    let slope = ds.float64(tags::RESCALE_SLOPE).unwrap_or(1.);
    let intercept = ds.float64(tags::RESCALE_INTERCEPT).unwrap_or(0.);
    Rescale::new(slope, intercept)
}

fn render_monochrome(
    ds: &DataSet,
    desc: &PixelDescriptor,
    frame: &[u8],
    options: &RenderOptions,
) -> Result<Vec<u8>> {
    let window = options.window.unwrap_or_else(|| window_from_data_set(ds, desc));
    let function = options.function.unwrap_or_else(|| {
        ds.string(tags::VOILUT_FUNCTION)
            .ok()
            .and_then(|term| VoiLutFunction::try_from(term.as_ref()).ok())
            .unwrap_or_default()
    });
    let transform = WindowLevelTransform::new(function, window);
    let rescale = if options.apply_rescale {
        rescale_from_data_set(ds)
    } else {
        Rescale::identity()
    };
    let invert = desc.photometric == PhotometricInterpretation::Monochrome1;

    let count = desc.pixels_per_frame();
    let mut out = Vec::with_capacity(count);
    for i in 0..count {
        let stored = stored_value(desc, frame, i)? as f64;
        let value = rescale.apply(stored);
        let mut normalized = transform.apply(value);
        if invert {
            normalized = 1. - normalized;
        }
        out.push((normalized * 255.).round().clamp(0., 255.) as u8);
    }
    Ok(out)
}

fn render_palette(ds: &DataSet, desc: &PixelDescriptor, frame: &[u8]) -> Result<Vec<u8>> {
    let lut = PaletteLut::from_data_set(ds).map_err(|source| Error::Palette { source })?;
    let count = desc.pixels_per_frame();
    let mut out = Vec::with_capacity(count * 4);
    for i in 0..count {
        let stored = stored_value(desc, frame, i)?;
        let (r, g, b) = lut.lookup8(stored);
        out.extend_from_slice(&[r, g, b, 255]);
    }
    Ok(out)
}

fn render_color(desc: &PixelDescriptor, frame: &[u8]) -> Result<Vec<u8>> {
    if desc.bits_allocated != 8 {
        return UnsupportedBitsSnafu {
            bits: desc.bits_allocated,
        }
        .fail();
    }
    let count = desc.pixels_per_frame();

    // bring samples into interleaved order
    let interleaved: Vec<u8> = match desc.planar {
        PlanarConfiguration::Interleaved => frame.to_vec(),
        PlanarConfiguration::Separate => {
            let mut out = vec![0u8; frame.len()];
            for pixel in 0..count {
                for sample in 0..3 {
                    out[pixel * 3 + sample] = frame[sample * count + pixel];
                }
            }
            out
        }
    };

    let interleaved = match desc.photometric {
        PhotometricInterpretation::YbrFull422 => upsample_422(&interleaved, count),
        _ => interleaved,
    };

    let mut out = Vec::with_capacity(count * 4);
    if desc.photometric.is_ybr() {
        for chunk in interleaved.chunks_exact(3) {
            let (r, g, b) = ybr_to_rgb(chunk[0], chunk[1], chunk[2]);
            out.extend_from_slice(&[r, g, b, 255]);
        }
    } else {
        for chunk in interleaved.chunks_exact(3) {
            out.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
        }
    }
    Ok(out)
}

/// Expand horizontally subsampled 4:2:2 data
/// (Y1 Y2 Cb Cr per pixel pair) into full Y Cb Cr triplets.
fn upsample_422(data: &[u8], pixels: usize) -> Vec<u8> {
    let mut out = Vec::with_capacity(pixels * 3);
    for quad in data.chunks_exact(4) {
        let [y1, y2, cb, cr] = [quad[0], quad[1], quad[2], quad[3]];
        out.extend_from_slice(&[y1, cb, cr, y2, cb, cr]);
    }
    out
}

/// Convert one full-range YCbCr sample to RGB
/// (PS3.3 C.7.6.3.1.2).
fn ybr_to_rgb(y: u8, cb: u8, cr: u8) -> (u8, u8, u8) {
    let y = y as f64;
    let cb = cb as f64 - 128.;
    let cr = cr as f64 - 128.;
    let r = y + 1.402 * cr;
    let g = y - 0.344136 * cb - 0.714136 * cr;
    let b = y + 1.772 * cb;
    (
        r.round().clamp(0., 255.) as u8,
        g.round().clamp(0., 255.) as u8,
        b.round().clamp(0., 255.) as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::header::VR;

    fn mono_data_set(bits: u16, signed: bool) -> (DataSet, PixelDescriptor) {
        let mut ds = DataSet::new();
        ds.put_value(tags::ROWS, VR::US, 1_u16);
        ds.put_value(tags::COLUMNS, VR::US, 4_u16);
        ds.put_value(tags::BITS_ALLOCATED, VR::US, bits);
        ds.put_value(tags::BITS_STORED, VR::US, bits);
        ds.put_value(tags::HIGH_BIT, VR::US, bits - 1);
        ds.put_value(
            tags::PIXEL_REPRESENTATION,
            VR::US,
            if signed { 1_u16 } else { 0_u16 },
        );
        ds.put_value(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16);
        ds.put_value(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");
        let desc = PixelDescriptor::from_data_set(&ds).unwrap();
        (ds, desc)
    }

    #[test]
    fn monochrome2_window_renders_expected_levels() {
        let (mut ds, desc) = mono_data_set(8, false);
        ds.put_value(tags::WINDOW_CENTER, VR::DS, "128");
        ds.put_value(tags::WINDOW_WIDTH, VR::DS, "256");
        let frame = [0u8, 64, 128, 255];
        let image = render_frame(&ds, &desc, &frame, &RenderOptions::default()).unwrap();
        match image.pixels {
            PixelBuffer::Gray8(pixels) => {
                assert_eq!(pixels.len(), 4);
                assert_eq!(pixels[0], 0);
                assert!(pixels[1] > 60 && pixels[1] < 70);
                assert!(pixels[2] > 125 && pixels[2] < 132);
                assert_eq!(pixels[3], 255);
            }
            other => panic!("expected grayscale, got {:?}", other),
        }
    }

    #[test]
    fn monochrome1_inverts() {
        let (mut ds, mut desc) = mono_data_set(8, false);
        ds.put_value(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME1");
        desc.photometric = PhotometricInterpretation::Monochrome1;
        let frame = [0u8, 255, 0, 255];
        let image = render_frame(&ds, &desc, &frame, &RenderOptions::default()).unwrap();
        match image.pixels {
            PixelBuffer::Gray8(pixels) => {
                assert_eq!(pixels[0], 255);
                assert_eq!(pixels[1], 0);
            }
            other => panic!("expected grayscale, got {:?}", other),
        }
    }

    #[test]
    fn rescale_applies_before_window() {
        let (mut ds, desc) = mono_data_set(16, false);
        ds.put_value(tags::RESCALE_SLOPE, VR::DS, "1");
        ds.put_value(tags::RESCALE_INTERCEPT, VR::DS, "-1024");
        // window in output units around 0
        ds.put_value(tags::WINDOW_CENTER, VR::DS, "0");
        ds.put_value(tags::WINDOW_WIDTH, VR::DS, "100");
        let mut frame = vec![0u8; 8];
        LittleEndian::write_u16_into(&[0, 1024, 1074, 4000], &mut frame);
        let options = RenderOptions {
            apply_rescale: true,
            ..Default::default()
        };
        let image = render_frame(&ds, &desc, &frame, &options).unwrap();
        match image.pixels {
            PixelBuffer::Gray8(pixels) => {
                assert_eq!(pixels[0], 0); // -1024 far below window
                assert!(pixels[1] > 120 && pixels[1] < 136); // 0 at center
                assert_eq!(pixels[3], 255); // 2976 far above window
            }
            other => panic!("expected grayscale, got {:?}", other),
        }
    }

    #[test]
    fn rgb_passthrough_has_opaque_alpha() {
        let mut ds = DataSet::new();
        ds.put_value(tags::ROWS, VR::US, 1_u16);
        ds.put_value(tags::COLUMNS, VR::US, 2_u16);
        ds.put_value(tags::BITS_ALLOCATED, VR::US, 8_u16);
        ds.put_value(tags::BITS_STORED, VR::US, 8_u16);
        ds.put_value(tags::HIGH_BIT, VR::US, 7_u16);
        ds.put_value(tags::SAMPLES_PER_PIXEL, VR::US, 3_u16);
        ds.put_value(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "RGB");
        let desc = PixelDescriptor::from_data_set(&ds).unwrap();
        let frame = [255u8, 0, 0, 0, 255, 0];
        let image = render_frame(&ds, &desc, &frame, &RenderOptions::default()).unwrap();
        match image.pixels {
            PixelBuffer::Rgba8(pixels) => {
                assert_eq!(pixels, vec![255, 0, 0, 255, 0, 255, 0, 255]);
            }
            other => panic!("expected RGBA, got {:?}", other),
        }
    }

    #[test]
    fn ybr_full_converts_to_rgb() {
        // Y=128 Cb=128 Cr=128 is mid gray
        let (r, g, b) = ybr_to_rgb(128, 128, 128);
        assert_eq!((r, g, b), (128, 128, 128));
        // pure luma
        let (r, g, b) = ybr_to_rgb(255, 128, 128);
        assert_eq!((r, g, b), (255, 255, 255));
    }
}
