//! DICOM file meta information tables.
//!
//! The file meta group is always encoded in Explicit VR Little Endian,
//! starting with the `DICM` magic code and the
//! _File Meta Information Group Length_ element,
//! which this module recomputes on every write.
use std::io::{Read, Write};

use snafu::{ensure, OptionExt, ResultExt, Snafu};

use medicom_core::dictionary::tags;
use medicom_core::header::VR;
use medicom_core::{IMPLEMENTATION_CLASS_UID, IMPLEMENTATION_VERSION_NAME};
use medicom_encoding::transfer_syntax::entries::EXPLICIT_VR_LITTLE_ENDIAN;

use crate::mem::DataSet;
use crate::read::{read_data_set, ParseMode};
use crate::write::write_data_set;

const DICM_MAGIC_CODE: [u8; 4] = [b'D', b'I', b'C', b'M'];

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The magic code `DICM` could not be read.
    #[snafu(display("could not read magic code"))]
    ReadMagicCode { source: std::io::Error },

    /// The magic code check failed: this is not DICOM data.
    #[snafu(display("invalid DICOM file (magic code check failed)"))]
    NotDicom,

    /// The file meta group could not be read from its source.
    #[snafu(display("could not read file meta group"))]
    ReadGroup { source: std::io::Error },

    /// The file meta group data set could not be decoded.
    #[snafu(display("could not decode file meta group"))]
    DecodeGroup {
        #[snafu(source(from(crate::read::Error, Box::new)))]
        source: Box<crate::read::Error>,
    },

    /// The file meta group data set could not be written.
    #[snafu(display("could not write file meta group"))]
    WriteGroup {
        #[snafu(source(from(crate::write::Error, Box::new)))]
        source: Box<crate::write::Error>,
    },

    /// The destination stream could not be written to.
    #[snafu(display("could not write to destination"))]
    WriteOut { source: std::io::Error },

    /// A mandatory file meta attribute is missing.
    #[snafu(display("missing mandatory file meta attribute `{}`", name))]
    MissingAttribute { name: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// DICOM File Meta Information Table.
///
/// Holds the relevant parts of the file meta information group,
/// as specified in PS3.10 chapter 7.
#[derive(Debug, Clone, PartialEq)]
pub struct FileMetaTable {
    /// File Meta Information Group Length
    pub information_group_length: u32,
    /// File Meta Information Version
    pub information_version: [u8; 2],
    /// Media Storage SOP Class UID
    pub media_storage_sop_class_uid: String,
    /// Media Storage SOP Instance UID
    pub media_storage_sop_instance_uid: String,
    /// Transfer Syntax UID
    pub transfer_syntax: String,
    /// Implementation Class UID
    pub implementation_class_uid: String,
    /// Implementation Version Name
    pub implementation_version_name: Option<String>,
    /// Source Application Entity Title
    pub source_application_entity_title: Option<String>,
}

fn trimmed(text: &str) -> &str {
    text.trim_end_matches(|c: char| c.is_whitespace() || c == '\0')
}

impl FileMetaTable {
    /// Read a file meta table from a source
    /// positioned at the `DICM` magic code.
    pub fn from_reader<R: Read>(mut source: R) -> Result<Self> {
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic).context(ReadMagicCodeSnafu)?;
        ensure!(magic == DICM_MAGIC_CODE, NotDicomSnafu);

        // the group length element is fixed-form:
        // (0002,0000) UL, 4 bytes
        let mut group_length_element = [0u8; 12];
        source
            .read_exact(&mut group_length_element)
            .context(ReadGroupSnafu)?;
        ensure!(
            group_length_element[0..4] == [0x02, 0x00, 0x00, 0x00]
                && group_length_element[4..6] == *b"UL",
            NotDicomSnafu
        );
        let information_group_length = u32::from_le_bytes([
            group_length_element[8],
            group_length_element[9],
            group_length_element[10],
            group_length_element[11],
        ]);

        let mut group = vec![0; information_group_length as usize];
        source.read_exact(&mut group).context(ReadGroupSnafu)?;

        let ds = read_data_set(&group[..], &EXPLICIT_VR_LITTLE_ENDIAN, ParseMode::Lenient)
            .context(DecodeGroupSnafu)?;

        let information_version = match ds.get(tags::FILE_META_INFORMATION_VERSION) {
            Some(element) => {
                let bytes: Vec<u8> = element
                    .primitive()
                    .ok()
                    .and_then(|v| v.to_bytes().ok())
                    .map(|b| b.to_vec())
                    .unwrap_or_default();
                [
                    bytes.first().copied().unwrap_or(0),
                    bytes.get(1).copied().unwrap_or(1),
                ]
            }
            None => [0, 1],
        };

        let get_string = |tag| ds.string(tag).map(|s| s.to_string()).ok();

        Ok(FileMetaTable {
            information_group_length,
            information_version,
            media_storage_sop_class_uid: get_string(tags::MEDIA_STORAGE_SOP_CLASS_UID)
                .context(MissingAttributeSnafu {
                    name: "MediaStorageSOPClassUID",
                })?,
            media_storage_sop_instance_uid: get_string(tags::MEDIA_STORAGE_SOP_INSTANCE_UID)
                .context(MissingAttributeSnafu {
                    name: "MediaStorageSOPInstanceUID",
                })?,
            transfer_syntax: get_string(tags::TRANSFER_SYNTAX_UID).context(
                MissingAttributeSnafu {
                    name: "TransferSyntaxUID",
                },
            )?,
            implementation_class_uid: get_string(tags::IMPLEMENTATION_CLASS_UID)
                .unwrap_or_else(|| IMPLEMENTATION_CLASS_UID.to_string()),
            implementation_version_name: get_string(tags::IMPLEMENTATION_VERSION_NAME),
            source_application_entity_title: get_string(tags::SOURCE_APPLICATION_ENTITY_TITLE),
        })
    }

    /// Getter for the transfer syntax UID,
    /// with trailing padding already excluded.
    pub fn transfer_syntax(&self) -> &str {
        trimmed(&self.transfer_syntax)
    }

    /// Getter for the media storage SOP class UID,
    /// with trailing padding already excluded.
    pub fn media_storage_sop_class_uid(&self) -> &str {
        trimmed(&self.media_storage_sop_class_uid)
    }

    /// Getter for the media storage SOP instance UID,
    /// with trailing padding already excluded.
    pub fn media_storage_sop_instance_uid(&self) -> &str {
        trimmed(&self.media_storage_sop_instance_uid)
    }

    /// Replace the transfer syntax UID.
    /// The group length is recomputed on the next write.
    pub fn set_transfer_syntax(&mut self, uid: &str) {
        self.transfer_syntax = trimmed(uid).to_string();
    }

    /// Build the file meta group as a data set
    /// (excluding the group length element).
    fn to_data_set(&self) -> DataSet {
        let mut ds = DataSet::new();
        ds.put_value(
            tags::FILE_META_INFORMATION_VERSION,
            VR::OB,
            self.information_version.to_vec(),
        );
        ds.put_value(
            tags::MEDIA_STORAGE_SOP_CLASS_UID,
            VR::UI,
            self.media_storage_sop_class_uid(),
        );
        ds.put_value(
            tags::MEDIA_STORAGE_SOP_INSTANCE_UID,
            VR::UI,
            self.media_storage_sop_instance_uid(),
        );
        ds.put_value(tags::TRANSFER_SYNTAX_UID, VR::UI, self.transfer_syntax());
        ds.put_value(
            tags::IMPLEMENTATION_CLASS_UID,
            VR::UI,
            trimmed(&self.implementation_class_uid),
        );
        if let Some(name) = &self.implementation_version_name {
            ds.put_value(tags::IMPLEMENTATION_VERSION_NAME, VR::SH, trimmed(name));
        }
        if let Some(ae) = &self.source_application_entity_title {
            ds.put_value(tags::SOURCE_APPLICATION_ENTITY_TITLE, VR::AE, trimmed(ae));
        }
        ds
    }

    /// Write the `DICM` magic code and the complete file meta group,
    /// with a regenerated group length element.
    pub fn write_to<W: Write>(&self, mut dest: W) -> Result<()> {
        let mut group = Vec::new();
        write_data_set(&mut group, &self.to_data_set(), &EXPLICIT_VR_LITTLE_ENDIAN)
            .context(WriteGroupSnafu)?;

        dest.write_all(&DICM_MAGIC_CODE).context(WriteOutSnafu)?;
        // (0002,0000) UL 4, group length
        dest.write_all(&[0x02, 0x00, 0x00, 0x00, b'U', b'L', 0x04, 0x00])
            .context(WriteOutSnafu)?;
        dest.write_all(&(group.len() as u32).to_le_bytes())
            .context(WriteOutSnafu)?;
        dest.write_all(&group).context(WriteOutSnafu)?;
        Ok(())
    }
}

/// A builder for a new file meta information table.
#[derive(Debug, Default, Clone)]
pub struct FileMetaTableBuilder {
    media_storage_sop_class_uid: Option<String>,
    media_storage_sop_instance_uid: Option<String>,
    transfer_syntax: Option<String>,
    implementation_class_uid: Option<String>,
    implementation_version_name: Option<String>,
    source_application_entity_title: Option<String>,
}

impl FileMetaTableBuilder {
    /// Create a new builder with no attributes set.
    pub fn new() -> Self {
        FileMetaTableBuilder::default()
    }

    /// Define the media storage SOP class UID.
    pub fn media_storage_sop_class_uid(mut self, value: impl Into<String>) -> Self {
        self.media_storage_sop_class_uid = Some(value.into());
        self
    }

    /// Define the media storage SOP instance UID.
    pub fn media_storage_sop_instance_uid(mut self, value: impl Into<String>) -> Self {
        self.media_storage_sop_instance_uid = Some(value.into());
        self
    }

    /// Define the transfer syntax of the main data set.
    pub fn transfer_syntax(mut self, value: impl Into<String>) -> Self {
        self.transfer_syntax = Some(value.into());
        self
    }

    /// Define the implementation class UID.
    pub fn implementation_class_uid(mut self, value: impl Into<String>) -> Self {
        self.implementation_class_uid = Some(value.into());
        self
    }

    /// Define the source application entity title.
    pub fn source_application_entity_title(mut self, value: impl Into<String>) -> Self {
        self.source_application_entity_title = Some(value.into());
        self
    }

    /// Build the file meta table.
    /// Fails if a mandatory attribute is missing.
    pub fn build(self) -> Result<FileMetaTable> {
        let media_storage_sop_class_uid =
            self.media_storage_sop_class_uid
                .context(MissingAttributeSnafu {
                    name: "MediaStorageSOPClassUID",
                })?;
        let media_storage_sop_instance_uid =
            self.media_storage_sop_instance_uid
                .context(MissingAttributeSnafu {
                    name: "MediaStorageSOPInstanceUID",
                })?;
        let transfer_syntax = self.transfer_syntax.context(MissingAttributeSnafu {
            name: "TransferSyntaxUID",
        })?;
        let mut table = FileMetaTable {
            information_group_length: 0,
            information_version: [0, 1],
            media_storage_sop_class_uid,
            media_storage_sop_instance_uid,
            transfer_syntax,
            implementation_class_uid: self
                .implementation_class_uid
                .unwrap_or_else(|| IMPLEMENTATION_CLASS_UID.to_string()),
            implementation_version_name: Some(
                self.implementation_version_name
                    .unwrap_or_else(|| IMPLEMENTATION_VERSION_NAME.to_string()),
            ),
            source_application_entity_title: self.source_application_entity_title,
        };
        // compute the group length of the canonical encoding
        let mut group = Vec::new();
        write_data_set(&mut group, &table.to_data_set(), &EXPLICIT_VR_LITTLE_ENDIAN)
            .context(WriteGroupSnafu)?;
        table.information_group_length = group.len() as u32;
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::dictionary::uids;

    #[test]
    fn meta_table_round_trips() {
        let table = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
            .media_storage_sop_instance_uid("1.2.3.4.5")
            .transfer_syntax(uids::EXPLICIT_VR_LITTLE_ENDIAN)
            .build()
            .unwrap();

        let mut out = Vec::new();
        table.write_to(&mut out).unwrap();
        assert_eq!(&out[0..4], b"DICM");

        let back = FileMetaTable::from_reader(&out[..]).unwrap();
        assert_eq!(
            back.media_storage_sop_class_uid(),
            uids::SECONDARY_CAPTURE_IMAGE_STORAGE
        );
        assert_eq!(back.media_storage_sop_instance_uid(), "1.2.3.4.5");
        assert_eq!(back.transfer_syntax(), uids::EXPLICIT_VR_LITTLE_ENDIAN);
        assert_eq!(back.information_group_length, table.information_group_length);
    }

    #[test]
    fn missing_mandatory_attribute_fails() {
        let result = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
            .build();
        assert!(matches!(result, Err(Error::MissingAttribute { .. })));
    }
}
