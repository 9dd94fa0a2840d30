//! Endianness-aware writing of primitive numbers.
use std::io::{Result, Write};

use byteordered::byteorder::{BigEndian, LittleEndian, WriteBytesExt};
use byteordered::Endianness;

/// A writer of multi-byte numbers in a fixed byte order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BasicEncoder(Endianness);

impl BasicEncoder {
    /// Create a basic encoder for the given byte order.
    pub fn new(endianness: Endianness) -> Self {
        BasicEncoder(endianness)
    }

    /// The byte order of this encoder.
    pub fn endianness(&self) -> Endianness {
        self.0
    }

    pub fn write_u16<W: Write>(&self, mut dest: W, value: u16) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_u16::<LittleEndian>(value),
            Endianness::Big => dest.write_u16::<BigEndian>(value),
        }
    }

    pub fn write_i16<W: Write>(&self, mut dest: W, value: i16) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_i16::<LittleEndian>(value),
            Endianness::Big => dest.write_i16::<BigEndian>(value),
        }
    }

    pub fn write_u32<W: Write>(&self, mut dest: W, value: u32) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_u32::<LittleEndian>(value),
            Endianness::Big => dest.write_u32::<BigEndian>(value),
        }
    }

    pub fn write_i32<W: Write>(&self, mut dest: W, value: i32) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_i32::<LittleEndian>(value),
            Endianness::Big => dest.write_i32::<BigEndian>(value),
        }
    }

    pub fn write_u64<W: Write>(&self, mut dest: W, value: u64) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_u64::<LittleEndian>(value),
            Endianness::Big => dest.write_u64::<BigEndian>(value),
        }
    }

    pub fn write_i64<W: Write>(&self, mut dest: W, value: i64) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_i64::<LittleEndian>(value),
            Endianness::Big => dest.write_i64::<BigEndian>(value),
        }
    }

    pub fn write_f32<W: Write>(&self, mut dest: W, value: f32) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_f32::<LittleEndian>(value),
            Endianness::Big => dest.write_f32::<BigEndian>(value),
        }
    }

    pub fn write_f64<W: Write>(&self, mut dest: W, value: f64) -> Result<()> {
        match self.0 {
            Endianness::Little => dest.write_f64::<LittleEndian>(value),
            Endianness::Big => dest.write_f64::<BigEndian>(value),
        }
    }
}
