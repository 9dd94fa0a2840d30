//! Unique identifier constants and the UID dictionary.
#![allow(missing_docs)]
use std::collections::HashMap;

use once_cell::sync::Lazy;

/// The kind of entity named by a UID.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum UidType {
    /// a transfer syntax
    TransferSyntax,
    /// a service-object pair class
    SopClass,
    /// a well-known service-object pair instance
    SopInstance,
    /// an application context name
    ApplicationContext,
}

/// An entry of the UID dictionary.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct UidEntry {
    /// the UID value
    pub uid: &'static str,
    /// the standard name
    pub name: &'static str,
    /// the kind of entity named
    pub kind: UidType,
}

// transfer syntaxes
pub const IMPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2";
pub const EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1";
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: &str = "1.2.840.10008.1.2.1.99";
pub const EXPLICIT_VR_BIG_ENDIAN: &str = "1.2.840.10008.1.2.2";
pub const JPEG_BASELINE: &str = "1.2.840.10008.1.2.4.50";
pub const JPEG_EXTENDED: &str = "1.2.840.10008.1.2.4.51";
pub const JPEG_LOSSLESS: &str = "1.2.840.10008.1.2.4.57";
pub const JPEG_LOSSLESS_SV1: &str = "1.2.840.10008.1.2.4.70";
pub const JPEG_2000_LOSSLESS_ONLY: &str = "1.2.840.10008.1.2.4.90";
pub const JPEG_2000: &str = "1.2.840.10008.1.2.4.91";
pub const RLE_LOSSLESS: &str = "1.2.840.10008.1.2.5";

// application context
pub const DICOM_APPLICATION_CONTEXT_NAME: &str = "1.2.840.10008.3.1.1.1";

// service classes
pub const VERIFICATION: &str = "1.2.840.10008.1.1";
pub const STORAGE_COMMITMENT_PUSH_MODEL: &str = "1.2.840.10008.1.20.1";
pub const STORAGE_COMMITMENT_PUSH_MODEL_INSTANCE: &str = "1.2.840.10008.1.20.1.1";
pub const PATIENT_ROOT_QUERY_RETRIEVE_FIND: &str = "1.2.840.10008.5.1.4.1.2.1.1";
pub const PATIENT_ROOT_QUERY_RETRIEVE_MOVE: &str = "1.2.840.10008.5.1.4.1.2.1.2";
pub const PATIENT_ROOT_QUERY_RETRIEVE_GET: &str = "1.2.840.10008.5.1.4.1.2.1.3";
pub const STUDY_ROOT_QUERY_RETRIEVE_FIND: &str = "1.2.840.10008.5.1.4.1.2.2.1";
pub const STUDY_ROOT_QUERY_RETRIEVE_MOVE: &str = "1.2.840.10008.5.1.4.1.2.2.2";
pub const STUDY_ROOT_QUERY_RETRIEVE_GET: &str = "1.2.840.10008.5.1.4.1.2.2.3";

// storage SOP classes
pub const COMPUTED_RADIOGRAPHY_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.1";
pub const DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PRESENTATION: &str = "1.2.840.10008.5.1.4.1.1.1.1";
pub const CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2";
pub const ENHANCED_CT_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.2.1";
pub const MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4";
pub const ENHANCED_MR_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.4.1";
pub const ULTRASOUND_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.6.1";
pub const SECONDARY_CAPTURE_IMAGE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.7";
pub const RT_STRUCTURE_SET_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.481.3";
pub const RT_PLAN_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.481.5";
pub const RT_DOSE_STORAGE: &str = "1.2.840.10008.5.1.4.1.1.481.2";

/// The storage SOP classes accepted by default by the storage services.
pub static DEFAULT_STORAGE_SOP_CLASSES: &[&str] = &[
    COMPUTED_RADIOGRAPHY_IMAGE_STORAGE,
    DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PRESENTATION,
    CT_IMAGE_STORAGE,
    ENHANCED_CT_IMAGE_STORAGE,
    MR_IMAGE_STORAGE,
    ENHANCED_MR_IMAGE_STORAGE,
    ULTRASOUND_IMAGE_STORAGE,
    SECONDARY_CAPTURE_IMAGE_STORAGE,
    RT_STRUCTURE_SET_STORAGE,
    RT_PLAN_STORAGE,
    RT_DOSE_STORAGE,
];

macro_rules! uid_entry {
    ($uid:ident, $name:literal, $kind:ident) => {
        UidEntry {
            uid: $uid,
            name: $name,
            kind: UidType::$kind,
        }
    };
}

/// The entries of the UID dictionary.
pub static UID_ENTRIES: &[UidEntry] = &[
    uid_entry!(IMPLICIT_VR_LITTLE_ENDIAN, "Implicit VR Little Endian", TransferSyntax),
    uid_entry!(EXPLICIT_VR_LITTLE_ENDIAN, "Explicit VR Little Endian", TransferSyntax),
    uid_entry!(
        DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
        "Deflated Explicit VR Little Endian",
        TransferSyntax
    ),
    uid_entry!(EXPLICIT_VR_BIG_ENDIAN, "Explicit VR Big Endian", TransferSyntax),
    uid_entry!(JPEG_BASELINE, "JPEG Baseline (Process 1)", TransferSyntax),
    uid_entry!(JPEG_EXTENDED, "JPEG Extended (Process 2 & 4)", TransferSyntax),
    uid_entry!(JPEG_LOSSLESS, "JPEG Lossless, Non-Hierarchical (Process 14)", TransferSyntax),
    uid_entry!(JPEG_LOSSLESS_SV1, "JPEG Lossless SV1", TransferSyntax),
    uid_entry!(JPEG_2000_LOSSLESS_ONLY, "JPEG 2000 Image Compression (Lossless Only)", TransferSyntax),
    uid_entry!(JPEG_2000, "JPEG 2000 Image Compression", TransferSyntax),
    uid_entry!(RLE_LOSSLESS, "RLE Lossless", TransferSyntax),
    uid_entry!(DICOM_APPLICATION_CONTEXT_NAME, "DICOM Application Context Name", ApplicationContext),
    uid_entry!(VERIFICATION, "Verification SOP Class", SopClass),
    uid_entry!(STORAGE_COMMITMENT_PUSH_MODEL, "Storage Commitment Push Model SOP Class", SopClass),
    uid_entry!(
        STORAGE_COMMITMENT_PUSH_MODEL_INSTANCE,
        "Storage Commitment Push Model SOP Instance",
        SopInstance
    ),
    uid_entry!(PATIENT_ROOT_QUERY_RETRIEVE_FIND, "Patient Root Q/R Information Model - FIND", SopClass),
    uid_entry!(PATIENT_ROOT_QUERY_RETRIEVE_MOVE, "Patient Root Q/R Information Model - MOVE", SopClass),
    uid_entry!(PATIENT_ROOT_QUERY_RETRIEVE_GET, "Patient Root Q/R Information Model - GET", SopClass),
    uid_entry!(STUDY_ROOT_QUERY_RETRIEVE_FIND, "Study Root Q/R Information Model - FIND", SopClass),
    uid_entry!(STUDY_ROOT_QUERY_RETRIEVE_MOVE, "Study Root Q/R Information Model - MOVE", SopClass),
    uid_entry!(STUDY_ROOT_QUERY_RETRIEVE_GET, "Study Root Q/R Information Model - GET", SopClass),
    uid_entry!(COMPUTED_RADIOGRAPHY_IMAGE_STORAGE, "Computed Radiography Image Storage", SopClass),
    uid_entry!(
        DIGITAL_X_RAY_IMAGE_STORAGE_FOR_PRESENTATION,
        "Digital X-Ray Image Storage - For Presentation",
        SopClass
    ),
    uid_entry!(CT_IMAGE_STORAGE, "CT Image Storage", SopClass),
    uid_entry!(ENHANCED_CT_IMAGE_STORAGE, "Enhanced CT Image Storage", SopClass),
    uid_entry!(MR_IMAGE_STORAGE, "MR Image Storage", SopClass),
    uid_entry!(ENHANCED_MR_IMAGE_STORAGE, "Enhanced MR Image Storage", SopClass),
    uid_entry!(ULTRASOUND_IMAGE_STORAGE, "Ultrasound Image Storage", SopClass),
    uid_entry!(SECONDARY_CAPTURE_IMAGE_STORAGE, "Secondary Capture Image Storage", SopClass),
    uid_entry!(RT_STRUCTURE_SET_STORAGE, "RT Structure Set Storage", SopClass),
    uid_entry!(RT_PLAN_STORAGE, "RT Plan Storage", SopClass),
    uid_entry!(RT_DOSE_STORAGE, "RT Dose Storage", SopClass),
];

static BY_UID: Lazy<HashMap<&'static str, &'static UidEntry>> =
    Lazy::new(|| UID_ENTRIES.iter().map(|e| (e.uid, e)).collect());

/// Look up a UID dictionary entry,
/// ignoring trailing null padding in the candidate.
pub fn by_uid(uid: &str) -> Option<&'static UidEntry> {
    BY_UID.get(uid.trim_end_matches('\0')).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_padding() {
        let entry = by_uid("1.2.840.10008.1.1\0").unwrap();
        assert_eq!(entry.name, "Verification SOP Class");
        assert_eq!(entry.kind, UidType::SopClass);
        assert!(by_uid("9.9.9").is_none());
    }
}
