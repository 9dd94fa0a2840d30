//! This crate contains the base data types and value parsers
//! for handling DICOM data elements,
//! independently of the encoding and transfer syntax in effect.
//!
//! The key types here are:
//!
//! - [`Tag`], a data element tag as a `(group, element)` pair;
//! - [`VR`], an enumeration of the 31 value representations,
//!   with introspection of their encoding properties;
//! - [`Length`], a data element length which may be undefined;
//! - [`PrimitiveValue`], the in-memory form of a non-nested element value;
//! - [`DataElementHeader`], the header portion of a data element;
//! - the [`dictionary`] module, containing the standard data element
//!   and unique identifier dictionaries.
pub mod dictionary;
pub mod header;
pub mod validation;
pub mod value;

pub use crate::header::{DataElementHeader, Header, Length, SequenceItemHeader, Tag, VR};
pub use crate::value::{PrimitiveValue, Value, C};

/// The official UID root of this implementation.
pub const IMPLEMENTATION_CLASS_UID: &str = "2.25.305828264421255389101619351031939301";

/// The version name which identifies this implementation in association
/// negotiation. Must have up to 16 characters.
pub const IMPLEMENTATION_VERSION_NAME: &str = "MEDICOM_010";
