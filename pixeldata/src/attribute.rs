//! Extraction of the pixel descriptor from a data set.
use snafu::{ensure, ResultExt, Snafu};

use medicom_core::dictionary::tags;
use medicom_object::mem::{AccessError, DataSet};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A required pixel module attribute is missing or unreadable.
    #[snafu(display("missing or invalid attribute `{}`", name))]
    Attribute {
        name: &'static str,
        source: AccessError,
    },

    /// The photometric interpretation term is not recognized.
    #[snafu(display("unsupported photometric interpretation `{}`", value))]
    UnsupportedPhotometric { value: String },

    /// A pixel module invariant does not hold.
    #[snafu(display("invalid pixel attributes: {}", message))]
    Invariant { message: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The photometric interpretation of decoded pixel samples.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PhotometricInterpretation {
    /// grayscale, minimum value is white
    Monochrome1,
    /// grayscale, minimum value is black
    Monochrome2,
    /// red, green and blue samples
    Rgb,
    /// indices into a palette color lookup table
    PaletteColor,
    /// full-range YCbCr
    YbrFull,
    /// full-range YCbCr, chroma subsampled 2:1 horizontally
    YbrFull422,
    /// partial-range YCbCr, chroma subsampled 2:1 horizontally
    YbrPartial422,
    /// partial-range YCbCr, chroma subsampled 2:1 in both axes
    YbrPartial420,
    /// irreversible color transform (JPEG 2000)
    YbrIct,
    /// reversible color transform (JPEG 2000)
    YbrRct,
}

impl PhotometricInterpretation {
    /// Interpret the _Photometric Interpretation_ defined term.
    pub fn from_term(term: &str) -> Option<Self> {
        use PhotometricInterpretation::*;
        match term.trim_matches(['\0', ' ']) {
            "MONOCHROME1" => Some(Monochrome1),
            "MONOCHROME2" => Some(Monochrome2),
            "RGB" => Some(Rgb),
            "PALETTE COLOR" => Some(PaletteColor),
            "YBR_FULL" => Some(YbrFull),
            "YBR_FULL_422" => Some(YbrFull422),
            "YBR_PARTIAL_422" => Some(YbrPartial422),
            "YBR_PARTIAL_420" => Some(YbrPartial420),
            "YBR_ICT" => Some(YbrIct),
            "YBR_RCT" => Some(YbrRct),
        _ => None,
        }
    }

    /// Whether samples are grayscale.
    pub fn is_monochrome(self) -> bool {
        matches!(
            self,
            PhotometricInterpretation::Monochrome1 | PhotometricInterpretation::Monochrome2
        )
    }

    /// Whether samples are luma/chroma and need conversion to RGB.
    pub fn is_ybr(self) -> bool {
        use PhotometricInterpretation::*;
        matches!(
            self,
            YbrFull | YbrFull422 | YbrPartial422 | YbrPartial420 | YbrIct | YbrRct
        )
    }
}

/// The arrangement of samples of multi-sample pixel data.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum PlanarConfiguration {
    /// samples interleaved per pixel (R1 G1 B1 R2 G2 B2 ...)
    #[default]
    Interleaved,
    /// one plane per sample (R1 R2 ... G1 G2 ... B1 B2 ...)
    Separate,
}

/// A description of the shape and sample format of pixel data,
/// extracted from the image pixel module.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelDescriptor {
    /// number of rows (height)
    pub rows: u16,
    /// number of columns (width)
    pub columns: u16,
    /// number of frames, at least 1
    pub frames: u32,
    /// bits allocated per sample (8, 16 or 32)
    pub bits_allocated: u16,
    /// bits effectively stored per sample
    pub bits_stored: u16,
    /// position of the most significant bit
    pub high_bit: u16,
    /// whether sample values are two's complement signed
    pub signed: bool,
    /// samples per pixel (1 or 3)
    pub samples_per_pixel: u16,
    /// interpretation of the sample values
    pub photometric: PhotometricInterpretation,
    /// plane arrangement for multi-sample data
    pub planar: PlanarConfiguration,
}

impl PixelDescriptor {
    /// Extract the pixel descriptor from a data set,
    /// checking the invariants of the image pixel module.
    pub fn from_data_set(ds: &DataSet) -> Result<Self> {
        let rows = ds.uint16(tags::ROWS).context(AttributeSnafu { name: "Rows" })?;
        let columns = ds
            .uint16(tags::COLUMNS)
            .context(AttributeSnafu { name: "Columns" })?;
        let bits_allocated = ds
            .uint16(tags::BITS_ALLOCATED)
            .context(AttributeSnafu { name: "BitsAllocated" })?;
        let bits_stored = ds.uint16(tags::BITS_STORED).unwrap_or(bits_allocated);
        let high_bit = ds.uint16(tags::HIGH_BIT).unwrap_or(bits_stored.saturating_sub(1));
        let signed = ds.uint16(tags::PIXEL_REPRESENTATION).unwrap_or(0) == 1;
        let samples_per_pixel = ds.uint16(tags::SAMPLES_PER_PIXEL).unwrap_or(1);
        let frames = ds
            .int(tags::NUMBER_OF_FRAMES)
            .ok()
            .filter(|&n| n > 0)
            .unwrap_or(1) as u32;

        let photometric_term = ds
            .string(tags::PHOTOMETRIC_INTERPRETATION)
            .context(AttributeSnafu {
                name: "PhotometricInterpretation",
            })?;
        let photometric = PhotometricInterpretation::from_term(&photometric_term)
            .ok_or_else(|| Error::UnsupportedPhotometric {
                value: photometric_term.to_string(),
            })?;

        let planar = match ds.uint16(tags::PLANAR_CONFIGURATION).unwrap_or(0) {
            1 => PlanarConfiguration::Separate,
            _ => PlanarConfiguration::Interleaved,
        };

        ensure!(
            matches!(bits_allocated, 8 | 16 | 32),
            InvariantSnafu {
                message: "BitsAllocated must be 8, 16 or 32"
            }
        );
        ensure!(
            bits_stored >= 1 && bits_stored <= bits_allocated,
            InvariantSnafu {
                message: "BitsStored must be between 1 and BitsAllocated"
            }
        );
        ensure!(
            high_bit == bits_stored - 1,
            InvariantSnafu {
                message: "HighBit must equal BitsStored - 1"
            }
        );
        let mono_or_palette = photometric.is_monochrome()
            || photometric == PhotometricInterpretation::PaletteColor;
        ensure!(
            (mono_or_palette && samples_per_pixel == 1)
                || (!mono_or_palette && samples_per_pixel == 3),
            InvariantSnafu {
                message: "SamplesPerPixel does not match PhotometricInterpretation"
            }
        );

        Ok(PixelDescriptor {
            rows,
            columns,
            frames,
            bits_allocated,
            bits_stored,
            high_bit,
            signed,
            samples_per_pixel,
            photometric,
            planar,
        })
    }

    /// The number of bytes in one sample.
    pub fn bytes_per_sample(&self) -> usize {
        self.bits_allocated as usize / 8
    }

    /// The number of pixels in one frame.
    pub fn pixels_per_frame(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// The number of bytes in one decoded frame.
    pub fn bytes_per_frame(&self) -> usize {
        self.pixels_per_frame() * self.samples_per_pixel as usize * self.bytes_per_sample()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::header::VR;

    fn base_data_set() -> DataSet {
        let mut ds = DataSet::new();
        ds.put_value(tags::ROWS, VR::US, 4_u16);
        ds.put_value(tags::COLUMNS, VR::US, 4_u16);
        ds.put_value(tags::BITS_ALLOCATED, VR::US, 16_u16);
        ds.put_value(tags::BITS_STORED, VR::US, 12_u16);
        ds.put_value(tags::HIGH_BIT, VR::US, 11_u16);
        ds.put_value(tags::PIXEL_REPRESENTATION, VR::US, 0_u16);
        ds.put_value(tags::SAMPLES_PER_PIXEL, VR::US, 1_u16);
        ds.put_value(tags::PHOTOMETRIC_INTERPRETATION, VR::CS, "MONOCHROME2");
        ds
    }

    #[test]
    fn extracts_descriptor() {
        let desc = PixelDescriptor::from_data_set(&base_data_set()).unwrap();
        assert_eq!(desc.rows, 4);
        assert_eq!(desc.bits_stored, 12);
        assert_eq!(desc.frames, 1);
        assert_eq!(desc.photometric, PhotometricInterpretation::Monochrome2);
        assert_eq!(desc.bytes_per_frame(), 32);
    }

    #[test]
    fn rejects_sample_mismatch() {
        let mut ds = base_data_set();
        ds.put_value(tags::SAMPLES_PER_PIXEL, VR::US, 3_u16);
        let err = PixelDescriptor::from_data_set(&ds).unwrap_err();
        assert!(matches!(err, Error::Invariant { .. }));
    }

    #[test]
    fn rejects_high_bit_mismatch() {
        let mut ds = base_data_set();
        ds.put_value(tags::HIGH_BIT, VR::US, 15_u16);
        assert!(PixelDescriptor::from_data_set(&ds).is_err());
    }
}
