//! Reading and writing DICOM Part-10 files.
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use snafu::{ResultExt, Snafu};

use medicom_encoding::transfer_syntax::{deflate, TransferSyntax, TransferSyntaxRegistry};

use crate::mem::DataSet;
use crate::meta::FileMetaTable;
use crate::read::{read_data_set, ParseMode};
use crate::write::write_data_set;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The file could not be opened or created.
    #[snafu(display("could not access file"))]
    OpenFile { source: std::io::Error },

    /// The 128-byte preamble could not be read.
    #[snafu(display("could not read file preamble"))]
    ReadPreamble { source: std::io::Error },

    /// The file meta group could not be read or written.
    #[snafu(display("file meta group failure"))]
    Meta {
        #[snafu(source(from(crate::meta::Error, Box::new)))]
        source: Box<crate::meta::Error>,
    },

    /// The transfer syntax named in the file meta group is not known
    /// to the registry.
    #[snafu(display("unsupported transfer syntax `{}`", uid))]
    UnsupportedTransferSyntax { uid: String },

    /// The main data set could not be decoded.
    #[snafu(display("could not read data set"))]
    ReadDataSet {
        #[snafu(source(from(crate::read::Error, Box::new)))]
        source: Box<crate::read::Error>,
    },

    /// The main data set could not be encoded.
    #[snafu(display("could not write data set"))]
    WriteDataSet {
        #[snafu(source(from(crate::write::Error, Box::new)))]
        source: Box<crate::write::Error>,
    },

    /// The destination stream could not be written to.
    #[snafu(display("could not write to destination"))]
    WriteOut { source: std::io::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A complete DICOM Part-10 file object:
/// preamble, file meta information and the main data set.
///
/// File objects are immutable after parsing;
/// build a new data set and a new object to apply mutations.
#[derive(Debug, Clone, PartialEq)]
pub struct FileObject {
    preamble: [u8; 128],
    meta: FileMetaTable,
    data: DataSet,
}

impl FileObject {
    /// Create a file object from a meta table and a data set,
    /// with a zeroed preamble.
    pub fn new(meta: FileMetaTable, data: DataSet) -> Self {
        FileObject {
            preamble: [0; 128],
            meta,
            data,
        }
    }

    /// Read a file object from a byte stream
    /// positioned at the start of the preamble.
    pub fn from_reader<R: Read>(mut source: R) -> Result<Self> {
        let mut preamble = [0u8; 128];
        source.read_exact(&mut preamble).context(ReadPreambleSnafu)?;
        let meta = FileMetaTable::from_reader(&mut source).context(MetaSnafu)?;
        let ts = TransferSyntaxRegistry
            .get(meta.transfer_syntax())
            .ok_or_else(|| Error::UnsupportedTransferSyntax {
                uid: meta.transfer_syntax().to_string(),
            })?;

        let data = if ts.is_deflated() {
            let inflater = deflate::inflating(source);
            read_data_set(inflater, ts, ParseMode::Lenient).context(ReadDataSetSnafu)?
        } else {
            read_data_set(source, ts, ParseMode::Lenient).context(ReadDataSetSnafu)?
        };

        Ok(FileObject {
            preamble,
            meta,
            data,
        })
    }

    /// The file meta information table.
    pub fn meta(&self) -> &FileMetaTable {
        &self.meta
    }

    /// The main data set.
    pub fn data(&self) -> &DataSet {
        &self.data
    }

    /// The transfer syntax of the main data set.
    pub fn transfer_syntax(&self) -> Result<&'static TransferSyntax> {
        TransferSyntaxRegistry
            .get(self.meta.transfer_syntax())
            .ok_or_else(|| Error::UnsupportedTransferSyntax {
                uid: self.meta.transfer_syntax().to_string(),
            })
    }

    /// Deconstruct into the meta table and the data set.
    pub fn into_parts(self) -> (FileMetaTable, DataSet) {
        (self.meta, self.data)
    }

    /// Write the complete file to a byte stream:
    /// preamble, magic code, meta group and main data set.
    pub fn write_to<W: Write>(&self, mut dest: W) -> Result<()> {
        dest.write_all(&self.preamble).context(WriteOutSnafu)?;
        self.meta.write_to(&mut dest).context(MetaSnafu)?;
        let ts = self.transfer_syntax()?;
        if ts.is_deflated() {
            let mut deflater = deflate::deflating(dest);
            write_data_set(&mut deflater, &self.data, ts).context(WriteDataSetSnafu)?;
            deflater.finish().context(WriteOutSnafu)?;
        } else {
            write_data_set(&mut dest, &self.data, ts).context(WriteDataSetSnafu)?;
        }
        Ok(())
    }

    /// Write the complete file to the file system.
    pub fn write_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let file = File::create(path).context(OpenFileSnafu)?;
        self.write_to(BufWriter::new(file))
    }
}

/// Open a DICOM file from the file system.
pub fn open_file<P: AsRef<Path>>(path: P) -> Result<FileObject> {
    let file = File::open(path).context(OpenFileSnafu)?;
    FileObject::from_reader(BufReader::new(file))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meta::FileMetaTableBuilder;
    use medicom_core::dictionary::{tags, uids};
    use medicom_core::header::VR;

    fn sample_object(ts_uid: &str) -> FileObject {
        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(uids::SECONDARY_CAPTURE_IMAGE_STORAGE)
            .media_storage_sop_instance_uid("1.2.3.4.5.6")
            .transfer_syntax(ts_uid)
            .build()
            .unwrap();
        let mut data = DataSet::new();
        data.put_value(tags::SOP_CLASS_UID, VR::UI, uids::SECONDARY_CAPTURE_IMAGE_STORAGE);
        data.put_value(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4.5.6");
        data.put_value(tags::MODALITY, VR::CS, "OT");
        data.put_value(tags::PATIENT_NAME, VR::PN, "Doe^Jane");
        data.put_value(tags::ROWS, VR::US, 1_u16);
        data.put_value(tags::COLUMNS, VR::US, 1_u16);
        data.put_value(tags::PIXEL_DATA, VR::OB, vec![0xAB, 0x00]);
        FileObject::new(meta, data)
    }

    #[test]
    fn file_round_trip() {
        let obj = sample_object(uids::EXPLICIT_VR_LITTLE_ENDIAN);
        let mut bytes = Vec::new();
        obj.write_to(&mut bytes).unwrap();
        assert_eq!(&bytes[128..132], b"DICM");

        let back = FileObject::from_reader(&bytes[..]).unwrap();
        assert_eq!(back.data().string(tags::PATIENT_NAME).unwrap(), "Doe^Jane");
        assert_eq!(back.meta().media_storage_sop_instance_uid(), "1.2.3.4.5.6");

        // a parse-encode-parse cycle is byte identical
        let mut again = Vec::new();
        back.write_to(&mut again).unwrap();
        assert_eq!(bytes, again);
    }

    #[test]
    fn deflated_file_round_trip() {
        let obj = sample_object(uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN);
        let mut bytes = Vec::new();
        obj.write_to(&mut bytes).unwrap();

        let back = FileObject::from_reader(&bytes[..]).unwrap();
        assert_eq!(back.data().string(tags::MODALITY).unwrap(), "OT");
        assert_eq!(
            back.data()
                .element(tags::PIXEL_DATA)
                .unwrap()
                .primitive()
                .unwrap()
                .to_bytes()
                .unwrap()
                .as_ref(),
            &[0xAB, 0x00]
        );
    }

    #[test]
    fn write_to_file_and_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sc.dcm");
        let obj = sample_object(uids::EXPLICIT_VR_LITTLE_ENDIAN);
        obj.write_to_file(&path).unwrap();
        let back = open_file(&path).unwrap();
        assert_eq!(back.data().uid(tags::SOP_INSTANCE_UID).unwrap(), "1.2.3.4.5.6");
    }
}
