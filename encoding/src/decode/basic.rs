//! Endianness-aware reading of primitive numbers.
use std::io::{Read, Result};

use byteordered::byteorder::{BigEndian, LittleEndian, ReadBytesExt};
use byteordered::Endianness;

/// A reader of multi-byte numbers in a fixed byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicDecoder(Endianness);

impl BasicDecoder {
    /// Create a basic decoder for the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        BasicDecoder(endianness)
    }

    /// The byte order of this decoder.
    pub fn endianness(&self) -> Endianness {
        self.0
    }

    pub fn read_u16<R: Read>(&self, mut source: R) -> Result<u16> {
        match self.0 {
            Endianness::Little => source.read_u16::<LittleEndian>(),
            Endianness::Big => source.read_u16::<BigEndian>(),
        }
    }

    pub fn read_i16<R: Read>(&self, mut source: R) -> Result<i16> {
        match self.0 {
            Endianness::Little => source.read_i16::<LittleEndian>(),
            Endianness::Big => source.read_i16::<BigEndian>(),
        }
    }

    pub fn read_u32<R: Read>(&self, mut source: R) -> Result<u32> {
        match self.0 {
            Endianness::Little => source.read_u32::<LittleEndian>(),
            Endianness::Big => source.read_u32::<BigEndian>(),
        }
    }

    pub fn read_i32<R: Read>(&self, mut source: R) -> Result<i32> {
        match self.0 {
            Endianness::Little => source.read_i32::<LittleEndian>(),
            Endianness::Big => source.read_i32::<BigEndian>(),
        }
    }

    pub fn read_u64<R: Read>(&self, mut source: R) -> Result<u64> {
        match self.0 {
            Endianness::Little => source.read_u64::<LittleEndian>(),
            Endianness::Big => source.read_u64::<BigEndian>(),
        }
    }

    pub fn read_i64<R: Read>(&self, mut source: R) -> Result<i64> {
        match self.0 {
            Endianness::Little => source.read_i64::<LittleEndian>(),
            Endianness::Big => source.read_i64::<BigEndian>(),
        }
    }

    pub fn read_f32<R: Read>(&self, mut source: R) -> Result<f32> {
        match self.0 {
            Endianness::Little => source.read_f32::<LittleEndian>(),
            Endianness::Big => source.read_f32::<BigEndian>(),
        }
    }

    pub fn read_f64<R: Read>(&self, mut source: R) -> Result<f64> {
        match self.0 {
            Endianness::Little => source.read_f64::<LittleEndian>(),
            Endianness::Big => source.read_f64::<BigEndian>(),
        }
    }
}
