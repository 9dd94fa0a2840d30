//! DICOM encoding and decoding primitives.
//!
//! This crate turns raw bytes into data element headers and values
//! and back, under a chosen transfer syntax:
//!
//! - the [`decode`] and [`encode`] modules hold the byte-level codecs
//!   for the implicit/explicit VR and little/big endian element forms;
//! - the [`text`] module holds the character set codecs;
//! - the [`transfer_syntax`] module describes the known transfer
//!   syntaxes and exposes the process-wide registry.
pub mod decode;
pub mod encode;
pub mod text;
pub mod transfer_syntax;

pub use byteordered::Endianness;

pub use crate::decode::Decode;
pub use crate::encode::Encode;
pub use crate::transfer_syntax::{TransferSyntax, TransferSyntaxRegistry, VrEncoding};
