//! Encoding of typed values back into their DICOM text forms.
//!
//! Together with the parsers in [`deserialize`](super::deserialize),
//! these implementations guarantee a stable round trip:
//! parsing a valid text form and re-encoding it
//! reproduces the original text.
use std::fmt;

use crate::value::deserialize::{AgeString, AgeUnit, DicomDate, DicomDateTime, DicomTime};

impl fmt::Display for DicomDate {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year(), self.month(), self.day())
    }
}

impl fmt::Display for DicomTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:02}{:02}{:02}",
            self.hour(),
            self.minute(),
            self.second()
        )?;
        let digits = self.fraction_digits() as usize;
        if digits > 0 {
            let micros = format!("{:06}", self.microsecond());
            write!(f, ".{}", &micros[..digits])?;
        }
        Ok(())
    }
}

impl fmt::Display for DicomDateTime {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.date)?;
        if let Some(time) = &self.time {
            write!(f, "{}", time)?;
        }
        if let Some(minutes) = self.offset_minutes {
            let sign = if minutes < 0 { '-' } else { '+' };
            let minutes = minutes.unsigned_abs();
            write!(f, "{}{:02}{:02}", sign, minutes / 60, minutes % 60)?;
        }
        Ok(())
    }
}

impl fmt::Display for AgeString {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let unit = match self.unit {
            AgeUnit::Days => 'D',
            AgeUnit::Weeks => 'W',
            AgeUnit::Months => 'M',
            AgeUnit::Years => 'Y',
        };
        write!(f, "{:03}{}", self.value, unit)
    }
}

/// Encode a decimal value as Decimal String text,
/// guaranteed to fit the 16-character limit of the VR.
pub fn encode_ds(value: f64) -> String {
    let simple = format!("{}", value);
    if simple.len() <= 16 {
        return simple;
    }
    // reduce precision until the text fits
    for precision in (0..=14).rev() {
        let s = format!("{:.*e}", precision, value);
        if s.len() <= 16 {
            return s;
        }
    }
    // unreachable with f64 inputs, but stay total
    format!("{:.0e}", value)
}

/// Encode an integer as Integer String text.
pub fn encode_is(value: i32) -> String {
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::deserialize::{parse_date, parse_datetime, parse_ds, parse_time};

    #[test]
    fn date_time_round_trip() {
        for text in ["20240131", "19991231"] {
            assert_eq!(parse_date(text.as_bytes()).unwrap().to_string(), text);
        }
        for text in ["235959", "120000.5", "120000.123456", "080000.000"] {
            assert_eq!(parse_time(text.as_bytes()).unwrap().to_string(), text);
        }
        for text in [
            "20240101",
            "20240101120000",
            "20240101120000.25+0100",
            "20240101-0530",
        ] {
            assert_eq!(parse_datetime(text.as_bytes()).unwrap().to_string(), text);
        }
    }

    #[test]
    fn ds_round_trips_to_same_value() {
        for text in ["1.25", "-3e2", "0.001", "1e-10"] {
            let v = parse_ds(text.as_bytes()).unwrap();
            let encoded = encode_ds(v);
            assert!(encoded.len() <= 16);
            assert_eq!(parse_ds(encoded.as_bytes()).unwrap(), v);
        }
    }

    #[test]
    fn ds_encoding_fits_limit() {
        let encoded = encode_ds(std::f64::consts::PI * 1e100);
        assert!(encoded.len() <= 16);
    }
}
