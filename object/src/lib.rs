//! High-level abstractions for reading and manipulating DICOM objects:
//! in-memory data sets, file meta information tables
//! and Part-10 file objects.
//!
//! The usual entry points are [`open_file`] to read a DICOM file
//! from the file system and [`FileObject::from_reader`]
//! for already opened byte streams:
//!
//! ```no_run
//! # fn run() -> Result<(), Box<dyn std::error::Error>> {
//! use medicom_object::open_file;
//! use medicom_core::dictionary::tags;
//!
//! let obj = open_file("0001.dcm")?;
//! let patient_name = obj.data().string(tags::PATIENT_NAME)?;
//! # Ok(())
//! # }
//! ```
pub mod file;
pub mod mem;
pub mod meta;
pub mod read;
pub mod write;

pub use crate::file::{open_file, FileObject};
pub use crate::mem::{DataElement, DataSet};
pub use crate::meta::{FileMetaTable, FileMetaTableBuilder};
pub use crate::read::{read_data_set, ParseMode};
pub use crate::write::write_data_set;
