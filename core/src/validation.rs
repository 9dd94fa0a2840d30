//! Value-level validation for the 31 value representations.
//!
//! [`validate`] checks a candidate value in its encoded text or binary form
//! against the repertoire, length and syntax rules of a VR.
//! It is used by the strict parsing mode and by writers
//! which refuse to emit malformed elements.
use snafu::{ensure, Snafu};

use crate::header::VR;
use crate::value::deserialize;
use crate::value::person_name::PersonName;

/// A violation of the value rules of a VR.
#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Violation {
    #[snafu(display("value has {} bytes, exceeding the {} byte maximum of {}", len, max, vr))]
    TooLong { vr: VR, len: usize, max: u32 },

    #[snafu(display("character `{}` not allowed in {}", *value as char, vr))]
    BadCharacter { vr: VR, value: u8 },

    #[snafu(display("malformed {} value", vr))]
    Malformed {
        vr: VR,
        #[snafu(source(from(deserialize::Error, Box::new)))]
        source: Box<deserialize::Error>,
    },

    #[snafu(display("malformed person name"))]
    MalformedName { source: crate::value::person_name::Error },

    #[snafu(display("UID component has a leading zero"))]
    UidLeadingZero,

    #[snafu(display("UID has an empty component"))]
    UidEmptyComponent,

    #[snafu(display("URI has no scheme prefix"))]
    UriMissingScheme,

    #[snafu(display("value is empty"))]
    Empty,

    #[snafu(display("binary value length {} is not a multiple of {}", len, unit))]
    BadBinaryLength { len: usize, unit: usize },
}

type Result<T = (), E = Violation> = std::result::Result<T, E>;

/// Validate an encoded value against the rules of the given VR.
///
/// String values are expected in their raw encoded form,
/// possibly including the trailing padding byte.
/// Multi-valued string VRs are split on the `\` delimiter
/// and each value is checked individually.
pub fn validate(vr: VR, value: &[u8]) -> Result {
    use VR::*;
    match vr {
        AE | AS | CS | DA | DS | DT | IS | LO | PN | SH | TM | UC | UI => {
            for item in strip_padding(vr, value).split(|&b| b == b'\\') {
                validate_single(vr, item)?;
            }
            Ok(())
        }
        // no value multiplicity in these VRs
        LT | ST | UT | UR => validate_single(vr, strip_padding(vr, value)),
        AT => binary_multiple(value, 4),
        SS | US | OW => binary_multiple(value, 2),
        SL | UL | FL | OF | OL => binary_multiple(value, 4),
        FD | OD | SV | UV | OV => binary_multiple(value, 8),
        OB | UN | SQ => Ok(()),
    }
}

fn binary_multiple(value: &[u8], unit: usize) -> Result {
    ensure!(
        value.len() % unit == 0,
        BadBinaryLengthSnafu {
            len: value.len(),
            unit
        }
    );
    Ok(())
}

fn strip_padding(vr: VR, value: &[u8]) -> &[u8] {
    let pad = vr.padding_byte();
    match value {
        [rest @ .., b] if *b == pad => rest,
        _ => value,
    }
}

fn validate_single(vr: VR, value: &[u8]) -> Result {
    if let Some(max) = vr.max_length() {
        ensure!(
            value.len() <= max as usize,
            TooLongSnafu {
                vr,
                len: value.len(),
                max
            }
        );
    }
    use VR::*;
    match vr {
        AE => validate_ae(value),
        AS => deserialize::parse_age(value)
            .map(|_| ())
            .map_err(|e| malformed(vr, e)),
        CS => validate_cs(value),
        DA => deserialize::parse_date(value)
            .map(|_| ())
            .map_err(|e| malformed(vr, e)),
        DS => deserialize::parse_ds(value)
            .map(|_| ())
            .map_err(|e| malformed(vr, e)),
        DT => deserialize::parse_datetime(value)
            .map(|_| ())
            .map_err(|e| malformed(vr, e)),
        IS => deserialize::parse_is(value)
            .map(|_| ())
            .map_err(|e| malformed(vr, e)),
        TM => deserialize::parse_time(value)
            .map(|_| ())
            .map_err(|e| malformed(vr, e)),
        PN => {
            let text = std::str::from_utf8(value)
                .map_err(|_| Violation::BadCharacter { vr, value: 0xFF })?;
            PersonName::parse(text)
                .map(|_| ())
                .map_err(|source| Violation::MalformedName { source })
        }
        UI => validate_ui(value),
        UR => validate_ur(value),
        // free text and long string VRs only exclude control characters
        LO | LT | SH | ST | UC | UT => validate_text(vr, value),
        _ => Ok(()),
    }
}

fn malformed(vr: VR, source: deserialize::Error) -> Violation {
    Violation::Malformed {
        vr,
        source: Box::new(source),
    }
}

fn validate_ae(value: &[u8]) -> Result {
    ensure!(!value.iter().all(|&b| b == b' '), EmptySnafu);
    for &b in value {
        ensure!(
            (0x20..0x7F).contains(&b) && b != b'\\',
            BadCharacterSnafu { vr: VR::AE, value: b }
        );
    }
    Ok(())
}

fn validate_cs(value: &[u8]) -> Result {
    for &b in value {
        ensure!(
            b.is_ascii_uppercase() || b.is_ascii_digit() || b == b' ' || b == b'_',
            BadCharacterSnafu { vr: VR::CS, value: b }
        );
    }
    Ok(())
}

fn validate_ui(value: &[u8]) -> Result {
    ensure!(!value.is_empty(), EmptySnafu);
    for component in value.split(|&b| b == b'.') {
        ensure!(!component.is_empty(), UidEmptyComponentSnafu);
        for &b in component {
            ensure!(
                b.is_ascii_digit(),
                BadCharacterSnafu { vr: VR::UI, value: b }
            );
        }
        // no leading zero in non-zero components
        ensure!(
            component.len() == 1 || component[0] != b'0',
            UidLeadingZeroSnafu
        );
    }
    Ok(())
}

fn validate_ur(value: &[u8]) -> Result {
    for &b in value {
        ensure!(
            b > 0x20 && b < 0x7F,
            BadCharacterSnafu { vr: VR::UR, value: b }
        );
    }
    // scheme prefix: ALPHA *(ALPHA / DIGIT / "+" / "-" / ".") ":"
    let colon = value
        .iter()
        .position(|&b| b == b':')
        .ok_or(Violation::UriMissingScheme)?;
    let scheme = &value[..colon];
    let valid_scheme = !scheme.is_empty()
        && scheme[0].is_ascii_alphabetic()
        && scheme
            .iter()
            .all(|&b| b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.');
    ensure!(valid_scheme, UriMissingSchemeSnafu);
    Ok(())
}

fn validate_text(vr: VR, value: &[u8]) -> Result {
    for &b in value {
        // ESC is tolerated for code extension sequences
        ensure!(
            b >= 0x20 || b == 0x1B || b == b'\n' || b == b'\r' || b == 0x0C,
            BadCharacterSnafu { vr, value: b }
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_string_repertoire() {
        assert!(validate(VR::CS, b"MONOCHROME2").is_ok());
        assert!(validate(VR::CS, b"ORIGINAL\\PRIMARY").is_ok());
        assert!(validate(VR::CS, b"DERIVED ").is_ok());
        assert!(validate(VR::CS, b"lower").is_err());
        assert!(validate(VR::CS, b"BAD-CHAR").is_err());
    }

    #[test]
    fn application_entity_rules() {
        assert!(validate(VR::AE, b"STORE_SCP").is_ok());
        assert!(validate(VR::AE, b"ORTHANC ").is_ok());
        assert!(validate(VR::AE, b"                ").is_err());
        assert!(validate(VR::AE, b"SEVENTEEN_CHARS_X").is_err());
        assert!(validate(VR::AE, b"BAD\\AE").is_err());
    }

    #[test]
    fn uid_rules() {
        assert!(validate(VR::UI, b"1.2.840.10008.1.1").is_ok());
        assert!(validate(VR::UI, b"1.2.840.10008.1.1\0").is_ok());
        assert!(validate(VR::UI, b"1.2.840.10008.1.0.5").is_ok());
        assert!(validate(VR::UI, b"1.2.840.010008").is_err());
        assert!(validate(VR::UI, b"1..2").is_err());
        assert!(validate(VR::UI, b"1.2a").is_err());
    }

    #[test]
    fn uri_rules() {
        assert!(validate(VR::UR, b"https://dicom.nema.org/").is_ok());
        assert!(validate(VR::UR, b"urn:oid:1.2.840").is_ok());
        assert!(validate(VR::UR, b"no-scheme-here").is_err());
        assert!(validate(VR::UR, b"http://a b").is_err());
    }

    #[test]
    fn date_and_number_forms() {
        assert!(validate(VR::DA, b"20240101").is_ok());
        assert!(validate(VR::DA, b"2024010").is_err());
        assert!(validate(VR::IS, b"123456 ").is_ok());
        assert!(validate(VR::IS, b"12345X").is_err());
        assert!(validate(VR::DS, b" 1.5").is_ok());
    }

    #[test]
    fn binary_length_multiples() {
        assert!(validate(VR::US, &[0, 1, 2, 3]).is_ok());
        assert!(validate(VR::US, &[0, 1, 2]).is_err());
        assert!(validate(VR::FD, &[0; 16]).is_ok());
        assert!(validate(VR::FD, &[0; 12]).is_err());
    }
}
