//! Conversion of DICOM objects between transfer syntaxes
//! of the uncompressed family,
//! and transfer syntax selection policy.
use snafu::{ensure, OptionExt, ResultExt, Snafu};

use medicom_encoding::transfer_syntax::{TransferSyntax, TransferSyntaxRegistry};
use medicom_object::FileObject;

use crate::codec;

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    /// The requested transfer syntax is not in the registry.
    #[snafu(display("unknown transfer syntax `{}`", uid))]
    UnknownTransferSyntax { uid: String },

    /// The source object is encapsulated;
    /// decode its pixel data before transcoding.
    #[snafu(display("source transfer syntax `{}` is encapsulated", uid))]
    EncapsulatedSource { uid: String },

    /// The target is encapsulated and no encoder is registered for it.
    #[snafu(display("no encoder available for transfer syntax `{}`", uid))]
    EncoderMissing { uid: String },

    /// No syntax in the preference list satisfies the policy.
    #[snafu(display("no compatible transfer syntax"))]
    NoCompatibleSyntax,

    /// The source object could not be inspected.
    #[snafu(display("could not inspect source object"))]
    InspectSource { source: medicom_object::file::Error },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Policy options for transcoding and syntax selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeOptions {
    /// never produce a lossy target
    pub preserve_fidelity: bool,
}

impl Default for TranscodeOptions {
    fn default() -> Self {
        TranscodeOptions {
            preserve_fidelity: true,
        }
    }
}

/// Convert a file object to another transfer syntax
/// of the uncompressed family.
///
/// Tag order, sequence structure, pixel data integrity and value
/// semantics are preserved; byte order and VR encoding changes are
/// applied when the object is written out under the new syntax.
///
/// Converting into an encapsulated syntax requires an encoder
/// in the codec registry and is refused otherwise.
pub fn transcode(obj: &FileObject, target_uid: &str, options: TranscodeOptions) -> Result<FileObject> {
    let target = TransferSyntaxRegistry
        .get(target_uid)
        .context(UnknownTransferSyntaxSnafu { uid: target_uid })?;
    let source = obj.transfer_syntax().context(InspectSourceSnafu)?;

    ensure!(
        source.is_uncompressed(),
        EncapsulatedSourceSnafu { uid: source.uid() }
    );
    if target.is_encapsulated() {
        ensure!(
            codec::registry().has_encoder(target.uid()),
            EncoderMissingSnafu { uid: target.uid() }
        );
    }
    ensure!(
        !options.preserve_fidelity || target.is_lossless(),
        NoCompatibleSyntaxSnafu
    );

    let (mut meta, data) = obj.clone().into_parts();
    meta.set_transfer_syntax(target.uid());
    Ok(FileObject::new(meta, data))
}

/// Select a transfer syntax for an outgoing data set,
/// given the caller's preference order and the set accepted by a peer.
///
/// Preferences are honored in order; lossy syntaxes are skipped when
/// fidelity is preserved, and encapsulated syntaxes are admitted only
/// when the codec registry can encode into them.
pub fn select_transfer_syntax(
    preferences: &[&str],
    accepted: &[&str],
    options: TranscodeOptions,
) -> Result<&'static TransferSyntax> {
    let registry = codec::registry();
    preferences
        .iter()
        .filter(|uid| accepted.iter().any(|a| a.trim_end_matches('\0') == **uid))
        .filter_map(|uid| TransferSyntaxRegistry.get(uid))
        .find(|ts| {
            if options.preserve_fidelity && !ts.is_lossless() {
                return false;
            }
            if ts.is_encapsulated() && !registry.has_encoder(ts.uid()) {
                return false;
            }
            true
        })
        .context(NoCompatibleSyntaxSnafu)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::dictionary::{tags, uids};
    use medicom_core::header::VR;
    use medicom_object::{DataSet, FileMetaTableBuilder};

    fn sample_object(ts_uid: &str) -> FileObject {
        let meta = FileMetaTableBuilder::new()
            .media_storage_sop_class_uid(uids::CT_IMAGE_STORAGE)
            .media_storage_sop_instance_uid("1.2.3.4")
            .transfer_syntax(ts_uid)
            .build()
            .unwrap();
        let mut ds = DataSet::new();
        ds.put_value(tags::SOP_CLASS_UID, VR::UI, uids::CT_IMAGE_STORAGE);
        ds.put_value(tags::SOP_INSTANCE_UID, VR::UI, "1.2.3.4");
        ds.put_value(tags::ROWS, VR::US, 16_u16);
        FileObject::new(meta, ds)
    }

    #[test]
    fn uncompressed_conversion_preserves_values() {
        let obj = sample_object(uids::EXPLICIT_VR_LITTLE_ENDIAN);
        let out = transcode(&obj, uids::EXPLICIT_VR_BIG_ENDIAN, Default::default()).unwrap();
        assert_eq!(out.meta().transfer_syntax(), uids::EXPLICIT_VR_BIG_ENDIAN);
        assert_eq!(out.data().uint16(tags::ROWS).unwrap(), 16);

        // and the converted object decodes back identically
        let mut bytes = Vec::new();
        out.write_to(&mut bytes).unwrap();
        let back = FileObject::from_reader(&bytes[..]).unwrap();
        assert_eq!(back.data(), obj.data());
    }

    #[test]
    fn encapsulated_target_requires_encoder() {
        let obj = sample_object(uids::EXPLICIT_VR_LITTLE_ENDIAN);
        let err = transcode(&obj, uids::RLE_LOSSLESS, Default::default()).unwrap_err();
        assert!(matches!(err, Error::EncoderMissing { .. }));
    }

    #[test]
    fn selection_honors_preference_and_fidelity() {
        let preferences = [
            uids::JPEG_BASELINE,
            uids::EXPLICIT_VR_LITTLE_ENDIAN,
            uids::IMPLICIT_VR_LITTLE_ENDIAN,
        ];
        let accepted = [
            uids::IMPLICIT_VR_LITTLE_ENDIAN,
            uids::EXPLICIT_VR_LITTLE_ENDIAN,
            uids::JPEG_BASELINE,
        ];
        // JPEG baseline is lossy and has no encoder; explicit LE wins
        let ts = select_transfer_syntax(&preferences, &accepted, Default::default()).unwrap();
        assert_eq!(ts.uid(), uids::EXPLICIT_VR_LITTLE_ENDIAN);

        let none = select_transfer_syntax(
            &[uids::JPEG_BASELINE],
            &accepted,
            TranscodeOptions {
                preserve_fidelity: true,
            },
        );
        assert!(matches!(none, Err(Error::NoCompatibleSyntax)));
    }
}
