//! Palette color lookup tables.
use snafu::{ensure, OptionExt, Snafu};

use medicom_core::dictionary::tags;
use medicom_core::header::Tag;
use medicom_core::value::PrimitiveValue;
use medicom_object::mem::DataSet;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// A palette attribute is missing.
    #[snafu(display("missing palette attribute {}", tag))]
    MissingAttribute { tag: Tag },

    /// A palette descriptor is malformed.
    #[snafu(display("palette descriptor of {} is malformed", tag))]
    BadDescriptor { tag: Tag },

    /// Palette data does not match its descriptor.
    #[snafu(display("palette data of {} has {} entries, expected {}", tag, got, expected))]
    DataMismatch { tag: Tag, got: usize, expected: u32 },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The descriptor of one palette color channel:
/// entry count, first mapped stored value and bits per entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PaletteDescriptor {
    /// number of entries in the table (a stored 0 means 65536)
    pub entries: u32,
    /// the stored pixel value mapped to the first entry
    pub first_mapped: u16,
    /// bits per entry, 8 or 16
    pub bits_per_entry: u16,
}

impl PaletteDescriptor {
    fn from_value(value: &PrimitiveValue, tag: Tag) -> Result<Self> {
        match value {
            PrimitiveValue::U16(v) if v.len() == 3 => {
                let entries = if v[0] == 0 { 65536 } else { v[0] as u32 };
                let bits = v[2];
                ensure!(bits == 8 || bits == 16, BadDescriptorSnafu { tag });
                Ok(PaletteDescriptor {
                    entries,
                    first_mapped: v[1],
                    bits_per_entry: bits,
                })
            }
            _ => BadDescriptorSnafu { tag }.fail(),
        }
    }
}

/// A palette color lookup table for the three color channels.
///
/// Entries are kept as 16-bit values;
/// 8-bit table entries are shifted into the high byte on load,
/// per PS3.3 C.7.6.3.1.6.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteLut {
    descriptor: PaletteDescriptor,
    red: Vec<u16>,
    green: Vec<u16>,
    blue: Vec<u16>,
}

impl PaletteLut {
    /// Read the palette color lookup table of a data set.
    pub fn from_data_set(ds: &DataSet) -> Result<Self> {
        let descriptor = PaletteDescriptor::from_value(
            palette_value(ds, tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR)?,
            tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
        )?;
        // channel descriptors must agree on shape; red is authoritative
        let red = channel_data(ds, tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DATA, &descriptor)?;
        let green = channel_data(ds, tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DATA, &descriptor)?;
        let blue = channel_data(ds, tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DATA, &descriptor)?;
        Ok(PaletteLut {
            descriptor,
            red,
            green,
            blue,
        })
    }

    /// The channel descriptor.
    pub fn descriptor(&self) -> PaletteDescriptor {
        self.descriptor
    }

    /// Map a stored pixel value to its 16-bit RGB triplet.
    ///
    /// Values below the first mapped value clamp to the first entry,
    /// values beyond the last entry clamp to the last one.
    pub fn lookup(&self, value: i64) -> (u16, u16, u16) {
        let index = (value - self.descriptor.first_mapped as i64)
            .clamp(0, self.descriptor.entries as i64 - 1) as usize;
        (self.red[index], self.green[index], self.blue[index])
    }

    /// Map a stored pixel value to an 8-bit RGB triplet.
    pub fn lookup8(&self, value: i64) -> (u8, u8, u8) {
        let (r, g, b) = self.lookup(value);
        ((r >> 8) as u8, (g >> 8) as u8, (b >> 8) as u8)
    }
}

fn palette_value(ds: &DataSet, tag: Tag) -> Result<&PrimitiveValue> {
    ds.get(tag)
        .and_then(|e| e.value().primitive())
        .context(MissingAttributeSnafu { tag })
}

fn channel_data(ds: &DataSet, tag: Tag, desc: &PaletteDescriptor) -> Result<Vec<u16>> {
    let value = palette_value(ds, tag)?;
    let words: Vec<u16> = match value {
        PrimitiveValue::U16(v) => v.to_vec(),
        PrimitiveValue::U8(v) => {
            // raw byte storage of a word-aligned table
            v.chunks_exact(2)
                .map(|c| u16::from_le_bytes([c[0], c[1]]))
                .collect()
        }
        _ => return BadDescriptorSnafu { tag }.fail(),
    };

    let entries = desc.entries as usize;
    if desc.bits_per_entry == 16 {
        ensure!(
            words.len() >= entries,
            DataMismatchSnafu {
                tag,
                got: words.len(),
                expected: desc.entries
            }
        );
        Ok(words[..entries].to_vec())
    } else {
        // 8-bit entries are packed two per word;
        // scale each into the high byte of a 16-bit entry
        let mut out = Vec::with_capacity(entries);
        for word in &words {
            let [lo, hi] = word.to_le_bytes();
            out.push((lo as u16) << 8);
            out.push((hi as u16) << 8);
        }
        ensure!(
            out.len() >= entries,
            DataMismatchSnafu {
                tag,
                got: out.len(),
                expected: desc.entries
            }
        );
        out.truncate(entries);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::header::VR;
    use smallvec::smallvec;

    fn palette_data_set() -> DataSet {
        let mut ds = DataSet::new();
        for tag in [
            tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
            tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
            tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
        ] {
            ds.put_value(
                tag,
                VR::US,
                PrimitiveValue::U16(smallvec![4, 10, 16]),
            );
        }
        ds.put_value(
            tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            VR::OW,
            PrimitiveValue::U16(smallvec![0x0000, 0x1111, 0x2222, 0x3333]),
        );
        ds.put_value(
            tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            VR::OW,
            PrimitiveValue::U16(smallvec![0x4444, 0x5555, 0x6666, 0x7777]),
        );
        ds.put_value(
            tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            VR::OW,
            PrimitiveValue::U16(smallvec![0x8888, 0x9999, 0xAAAA, 0xBBBB]),
        );
        ds
    }

    #[test]
    fn lookup_maps_entries_in_order() {
        let lut = PaletteLut::from_data_set(&palette_data_set()).unwrap();
        // every k below entry count maps to the k-th entry
        for k in 0..4u16 {
            let (r, _, _) = lut.lookup(10 + k as i64);
            assert_eq!(r, 0x1111 * k);
        }
    }

    #[test]
    fn lookup_clamps_out_of_range() {
        let lut = PaletteLut::from_data_set(&palette_data_set()).unwrap();
        assert_eq!(lut.lookup(0), lut.lookup(10));
        assert_eq!(lut.lookup(500), lut.lookup(13));
    }

    #[test]
    fn eight_bit_entries_shift_high() {
        let mut ds = palette_data_set();
        for tag in [
            tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
            tags::GREEN_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
            tags::BLUE_PALETTE_COLOR_LOOKUP_TABLE_DESCRIPTOR,
        ] {
            ds.put_value(tag, VR::US, PrimitiveValue::U16(smallvec![4, 0, 8]));
        }
        // entries 0x10, 0x20, 0x30, 0x40 packed two per word
        ds.put_value(
            tags::RED_PALETTE_COLOR_LOOKUP_TABLE_DATA,
            VR::OW,
            PrimitiveValue::U16(smallvec![0x2010, 0x4030]),
        );
        let lut = PaletteLut::from_data_set(&ds).unwrap();
        assert_eq!(lut.lookup(1).0, 0x2000);
        assert_eq!(lut.lookup8(3).0, 0x40);
    }
}
