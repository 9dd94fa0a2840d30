//! Stream adapters for the Deflated Explicit VR Little Endian
//! transfer syntax (UID `1.2.840.10008.1.2.1.99`).
//!
//! The deflated data set is a raw DEFLATE stream (RFC 1951),
//! with no zlib or gzip wrapper.
use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

/// Wrap a reader so that the deflated data set stream
/// is inflated on the fly.
pub fn inflating<R: Read>(source: R) -> DeflateDecoder<R> {
    DeflateDecoder::new(source)
}

/// Wrap a writer so that the data set stream
/// is deflated on the fly.
/// The encoder must be finished (or dropped) to flush the trailing block.
pub fn deflating<W: Write>(dest: W) -> DeflateEncoder<W> {
    DeflateEncoder::new(dest, Compression::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};

    #[test]
    fn inflate_reverses_deflate() {
        let payload: Vec<u8> = (0..255u8).cycle().take(4096).collect();
        let mut encoder = deflating(Vec::new());
        encoder.write_all(&payload).unwrap();
        let compressed = encoder.finish().unwrap();
        assert!(compressed.len() < payload.len());

        let mut inflated = Vec::new();
        inflating(&compressed[..])
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, payload);
    }
}
