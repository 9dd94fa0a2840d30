//! Transfer syntax descriptors and the process-wide registry.
pub mod deflate;
pub mod entries;

use std::collections::HashMap;

use byteordered::Endianness;
use once_cell::sync::Lazy;

use crate::decode::{
    explicit_be::ExplicitVRBigEndianDecoder, explicit_le::ExplicitVRLittleEndianDecoder,
    implicit_le::ImplicitVRLittleEndianDecoder, ElementDecoder,
};
use crate::encode::{
    explicit_be::ExplicitVRBigEndianEncoder, explicit_le::ExplicitVRLittleEndianEncoder,
    implicit_le::ImplicitVRLittleEndianEncoder, ElementEncoder,
};

/// How the value representation of a data element is conveyed.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum VrEncoding {
    /// the VR is resolved through the data dictionary
    Implicit,
    /// the VR is written explicitly after the tag
    Explicit,
}

/// A descriptor of a DICOM transfer syntax:
/// its UID and the encoding rules it mandates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSyntax {
    uid: &'static str,
    name: &'static str,
    vr_encoding: VrEncoding,
    endianness: Endianness,
    encapsulated: bool,
    deflated: bool,
    lossless: bool,
}

impl TransferSyntax {
    /// Create a new transfer syntax descriptor.
    pub const fn new(
        uid: &'static str,
        name: &'static str,
        vr_encoding: VrEncoding,
        endianness: Endianness,
        encapsulated: bool,
        deflated: bool,
        lossless: bool,
    ) -> Self {
        TransferSyntax {
            uid,
            name,
            vr_encoding,
            endianness,
            encapsulated,
            deflated,
            lossless,
        }
    }

    /// The unique identifier of this transfer syntax.
    pub fn uid(&self) -> &'static str {
        self.uid
    }

    /// The descriptive name of this transfer syntax.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The VR encoding form.
    pub fn vr_encoding(&self) -> VrEncoding {
        self.vr_encoding
    }

    /// The byte order of data element encoding.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether pixel data is encapsulated in fragments.
    pub fn is_encapsulated(&self) -> bool {
        self.encapsulated
    }

    /// Whether the data set stream is wrapped in a deflate stream.
    pub fn is_deflated(&self) -> bool {
        self.deflated
    }

    /// Whether the encoding is lossless.
    pub fn is_lossless(&self) -> bool {
        self.lossless
    }

    /// Whether this syntax belongs to the uncompressed family
    /// (pixel data is native and elements can be re-encoded freely).
    pub fn is_uncompressed(&self) -> bool {
        !self.encapsulated
    }

    /// Obtain an element decoder for this transfer syntax.
    /// Encapsulated syntaxes all use Explicit VR Little Endian
    /// at the element level.
    pub fn element_decoder(&self) -> ElementDecoder {
        match (self.vr_encoding, self.endianness) {
            (VrEncoding::Implicit, _) => {
                ElementDecoder::ImplicitLE(ImplicitVRLittleEndianDecoder)
            }
            (VrEncoding::Explicit, Endianness::Little) => {
                ElementDecoder::ExplicitLE(ExplicitVRLittleEndianDecoder)
            }
            (VrEncoding::Explicit, Endianness::Big) => {
                ElementDecoder::ExplicitBE(ExplicitVRBigEndianDecoder)
            }
        }
    }

    /// Obtain an element encoder for this transfer syntax.
    pub fn element_encoder(&self) -> ElementEncoder {
        match (self.vr_encoding, self.endianness) {
            (VrEncoding::Implicit, _) => {
                ElementEncoder::ImplicitLE(ImplicitVRLittleEndianEncoder)
            }
            (VrEncoding::Explicit, Endianness::Little) => {
                ElementEncoder::ExplicitLE(ExplicitVRLittleEndianEncoder)
            }
            (VrEncoding::Explicit, Endianness::Big) => {
                ElementEncoder::ExplicitBE(ExplicitVRBigEndianEncoder)
            }
        }
    }
}

static REGISTRY: Lazy<HashMap<&'static str, &'static TransferSyntax>> =
    Lazy::new(|| entries::ALL.iter().map(|ts| (ts.uid(), ts)).collect());

/// The process-wide registry of known transfer syntaxes.
#[derive(Debug, Default, Copy, Clone)]
pub struct TransferSyntaxRegistry;

impl TransferSyntaxRegistry {
    /// Look up a transfer syntax by its UID,
    /// ignoring trailing null padding.
    pub fn get(&self, uid: &str) -> Option<&'static TransferSyntax> {
        REGISTRY
            .get(uid.trim_end_matches(|c: char| c.is_whitespace() || c == '\0'))
            .copied()
    }

    /// Iterate over all registered transfer syntaxes.
    pub fn iter(&self) -> impl Iterator<Item = &'static TransferSyntax> {
        entries::ALL.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use medicom_core::dictionary::uids;

    #[test]
    fn registry_covers_the_required_syntaxes() {
        let registry = TransferSyntaxRegistry;
        for uid in [
            uids::IMPLICIT_VR_LITTLE_ENDIAN,
            uids::EXPLICIT_VR_LITTLE_ENDIAN,
            uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
            uids::EXPLICIT_VR_BIG_ENDIAN,
            uids::JPEG_BASELINE,
            uids::JPEG_EXTENDED,
            uids::JPEG_LOSSLESS,
            uids::JPEG_LOSSLESS_SV1,
            uids::JPEG_2000_LOSSLESS_ONLY,
            uids::JPEG_2000,
            uids::RLE_LOSSLESS,
        ] {
            assert!(registry.get(uid).is_some(), "missing {}", uid);
        }
    }

    #[test]
    fn lookup_tolerates_padding() {
        let registry = TransferSyntaxRegistry;
        let ts = registry.get("1.2.840.10008.1.2.1\0").unwrap();
        assert_eq!(ts.uid(), "1.2.840.10008.1.2.1");
        assert_eq!(ts.vr_encoding(), VrEncoding::Explicit);
        assert_eq!(ts.endianness(), Endianness::Little);
    }

    #[test]
    fn syntax_properties() {
        let registry = TransferSyntaxRegistry;
        assert!(registry.get(uids::RLE_LOSSLESS).unwrap().is_encapsulated());
        assert!(registry.get(uids::RLE_LOSSLESS).unwrap().is_lossless());
        assert!(!registry.get(uids::JPEG_BASELINE).unwrap().is_lossless());
        assert!(registry
            .get(uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN)
            .unwrap()
            .is_deflated());
    }
}
