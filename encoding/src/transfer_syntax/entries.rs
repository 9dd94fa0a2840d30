//! The built-in transfer syntax descriptors.
use byteordered::Endianness;

use medicom_core::dictionary::uids;

use crate::transfer_syntax::{TransferSyntax, VrEncoding};

/// Implicit VR Little Endian: the default transfer syntax.
pub const IMPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    uids::IMPLICIT_VR_LITTLE_ENDIAN,
    "Implicit VR Little Endian",
    VrEncoding::Implicit,
    Endianness::Little,
    false,
    false,
    true,
);

/// Explicit VR Little Endian.
pub const EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    uids::EXPLICIT_VR_LITTLE_ENDIAN,
    "Explicit VR Little Endian",
    VrEncoding::Explicit,
    Endianness::Little,
    false,
    false,
    true,
);

/// Deflated Explicit VR Little Endian.
pub const DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN: TransferSyntax = TransferSyntax::new(
    uids::DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
    "Deflated Explicit VR Little Endian",
    VrEncoding::Explicit,
    Endianness::Little,
    false,
    true,
    true,
);

/// Explicit VR Big Endian (retired).
pub const EXPLICIT_VR_BIG_ENDIAN: TransferSyntax = TransferSyntax::new(
    uids::EXPLICIT_VR_BIG_ENDIAN,
    "Explicit VR Big Endian",
    VrEncoding::Explicit,
    Endianness::Big,
    false,
    false,
    true,
);

/// JPEG Baseline (Process 1): lossy 8-bit JPEG.
pub const JPEG_BASELINE: TransferSyntax = TransferSyntax::new(
    uids::JPEG_BASELINE,
    "JPEG Baseline (Process 1)",
    VrEncoding::Explicit,
    Endianness::Little,
    true,
    false,
    false,
);

/// JPEG Extended (Process 2 & 4): lossy 12-bit JPEG.
pub const JPEG_EXTENDED: TransferSyntax = TransferSyntax::new(
    uids::JPEG_EXTENDED,
    "JPEG Extended (Process 2 & 4)",
    VrEncoding::Explicit,
    Endianness::Little,
    true,
    false,
    false,
);

/// JPEG Lossless, Non-Hierarchical (Process 14).
pub const JPEG_LOSSLESS: TransferSyntax = TransferSyntax::new(
    uids::JPEG_LOSSLESS,
    "JPEG Lossless, Non-Hierarchical (Process 14)",
    VrEncoding::Explicit,
    Endianness::Little,
    true,
    false,
    true,
);

/// JPEG Lossless, Non-Hierarchical, First-Order Prediction.
pub const JPEG_LOSSLESS_SV1: TransferSyntax = TransferSyntax::new(
    uids::JPEG_LOSSLESS_SV1,
    "JPEG Lossless SV1",
    VrEncoding::Explicit,
    Endianness::Little,
    true,
    false,
    true,
);

/// JPEG 2000 Image Compression (Lossless Only).
pub const JPEG_2000_LOSSLESS_ONLY: TransferSyntax = TransferSyntax::new(
    uids::JPEG_2000_LOSSLESS_ONLY,
    "JPEG 2000 Image Compression (Lossless Only)",
    VrEncoding::Explicit,
    Endianness::Little,
    true,
    false,
    true,
);

/// JPEG 2000 Image Compression.
pub const JPEG_2000: TransferSyntax = TransferSyntax::new(
    uids::JPEG_2000,
    "JPEG 2000 Image Compression",
    VrEncoding::Explicit,
    Endianness::Little,
    true,
    false,
    false,
);

/// RLE Lossless.
pub const RLE_LOSSLESS: TransferSyntax = TransferSyntax::new(
    uids::RLE_LOSSLESS,
    "RLE Lossless",
    VrEncoding::Explicit,
    Endianness::Little,
    true,
    false,
    true,
);

/// All built-in transfer syntaxes.
pub static ALL: &[TransferSyntax] = &[
    IMPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_LITTLE_ENDIAN,
    DEFLATED_EXPLICIT_VR_LITTLE_ENDIAN,
    EXPLICIT_VR_BIG_ENDIAN,
    JPEG_BASELINE,
    JPEG_EXTENDED,
    JPEG_LOSSLESS,
    JPEG_LOSSLESS_SV1,
    JPEG_2000_LOSSLESS_ONLY,
    JPEG_2000,
    RLE_LOSSLESS,
];
