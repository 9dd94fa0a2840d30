//! Parsing of DICOM text value forms into typed values.
//!
//! The parsers here are strict:
//! they accept exactly the forms laid out in PS3.5 section 6.2
//! for the respective value representation,
//! and reject anything else with a descriptive error.
use chrono::NaiveDate;
use snafu::{ensure, OptionExt, ResultExt, Snafu};

#[derive(Debug, Snafu)]
#[non_exhaustive]
pub enum Error {
    #[snafu(display("unexpected length {}: expected {}", len, expected))]
    UnexpectedLength { len: usize, expected: &'static str },

    #[snafu(display("invalid character `{}` in value", *value as char))]
    InvalidToken { value: u8 },

    #[snafu(display("invalid {} component: got {}", component, value))]
    InvalidComponent { component: &'static str, value: u32 },

    #[snafu(display("date {:04}-{:02}-{:02} does not exist", year, month, day))]
    InvalidCalendarDate { year: u16, month: u8, day: u8 },

    #[snafu(display("integer string exceeds the signed 32-bit range"))]
    IntegerOutOfRange,

    #[snafu(display("multiple sign characters in number"))]
    MultipleSigns,

    #[snafu(display("could not parse decimal string"))]
    ParseFloat { source: std::num::ParseFloatError },

    #[snafu(display("invalid age unit `{}`: must be one of D, W, M, Y", *value as char))]
    InvalidAgeUnit { value: u8 },

    #[snafu(display("invalid time zone offset"))]
    InvalidTimeZone,
}

type Result<T, E = Error> = std::result::Result<T, E>;

/// A structured DICOM date (VR DA), always at full `YYYYMMDD` precision.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DicomDate {
    year: u16,
    month: u8,
    day: u8,
}

impl DicomDate {
    /// Create a date value, checking that it exists in the
    /// proleptic Gregorian calendar.
    pub fn new(year: u16, month: u8, day: u8) -> Result<Self> {
        NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
            .context(InvalidCalendarDateSnafu { year, month, day })?;
        Ok(DicomDate { year, month, day })
    }

    /// The year component.
    pub fn year(&self) -> u16 {
        self.year
    }

    /// The month component (1-12).
    pub fn month(&self) -> u8 {
        self.month
    }

    /// The day component (1-31).
    pub fn day(&self) -> u8 {
        self.day
    }

    /// Convert to a chrono naive date.
    pub fn to_naive_date(&self) -> NaiveDate {
        // validity checked on construction
        NaiveDate::from_ymd_opt(self.year as i32, self.month as u32, self.day as u32)
            .expect("DicomDate holds a valid calendar date")
    }
}

/// A structured DICOM time (VR TM) with `HHMMSS[.FFFFFF]` precision.
///
/// The number of fraction digits originally present is retained,
/// so that re-encoding reproduces the exact text form.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DicomTime {
    hour: u8,
    minute: u8,
    second: u8,
    /// fraction of a second in microseconds
    fraction: u32,
    /// number of fraction digits in the text form, 0 when absent
    fraction_digits: u8,
}

impl DicomTime {
    /// Create a time value without a fractional component.
    pub fn new(hour: u8, minute: u8, second: u8) -> Result<Self> {
        Self::with_fraction(hour, minute, second, 0, 0)
    }

    /// Create a time value with a fractional component,
    /// given in microseconds together with its number of text digits.
    pub fn with_fraction(
        hour: u8,
        minute: u8,
        second: u8,
        fraction: u32,
        fraction_digits: u8,
    ) -> Result<Self> {
        ensure!(
            hour < 24,
            InvalidComponentSnafu {
                component: "hour",
                value: hour as u32
            }
        );
        ensure!(
            minute < 60,
            InvalidComponentSnafu {
                component: "minute",
                value: minute as u32
            }
        );
        ensure!(
            second < 60,
            InvalidComponentSnafu {
                component: "second",
                value: second as u32
            }
        );
        ensure!(
            fraction < 1_000_000,
            InvalidComponentSnafu {
                component: "fraction",
                value: fraction
            }
        );
        ensure!(
            fraction_digits <= 6,
            InvalidComponentSnafu {
                component: "fraction digits",
                value: fraction_digits as u32
            }
        );
        Ok(DicomTime {
            hour,
            minute,
            second,
            fraction,
            fraction_digits,
        })
    }

    /// The hour component (0-23).
    pub fn hour(&self) -> u8 {
        self.hour
    }

    /// The minute component (0-59).
    pub fn minute(&self) -> u8 {
        self.minute
    }

    /// The second component (0-59).
    pub fn second(&self) -> u8 {
        self.second
    }

    /// The fraction of a second, in microseconds.
    pub fn microsecond(&self) -> u32 {
        self.fraction
    }

    /// The number of fraction digits in the original text form.
    pub fn fraction_digits(&self) -> u8 {
        self.fraction_digits
    }
}

/// A structured DICOM date-time (VR DT):
/// a full date, an optional time, and an optional UTC offset.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct DicomDateTime {
    /// the date portion
    pub date: DicomDate,
    /// the time portion, when present
    pub time: Option<DicomTime>,
    /// the suffix UTC offset in minutes east, when present
    pub offset_minutes: Option<i16>,
}

impl DicomDateTime {
    /// Convert to a chrono date-time in the given default offset,
    /// used when the value carries no offset suffix.
    pub fn to_chrono(
        &self,
        default_offset: chrono::FixedOffset,
    ) -> Option<chrono::DateTime<chrono::FixedOffset>> {
        use chrono::TimeZone;
        let offset = match self.offset_minutes {
            Some(m) => chrono::FixedOffset::east_opt(m as i32 * 60)?,
            None => default_offset,
        };
        let time = match self.time {
            Some(t) => chrono::NaiveTime::from_hms_micro_opt(
                t.hour as u32,
                t.minute as u32,
                t.second as u32,
                t.fraction,
            )?,
            None => chrono::NaiveTime::from_hms_opt(0, 0, 0)?,
        };
        offset
            .from_local_datetime(&self.date.to_naive_date().and_time(time))
            .single()
    }
}

/// The unit of an age string (VR AS).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum AgeUnit {
    /// days
    Days,
    /// weeks
    Weeks,
    /// months
    Months,
    /// years
    Years,
}

/// A structured age string (VR AS), `nnnD|W|M|Y`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AgeString {
    /// the three-digit count
    pub value: u16,
    /// the unit of the count
    pub unit: AgeUnit,
}

/// Read an unsigned integer from `text`,
/// which must be all ASCII digits and at most 9 characters.
fn read_number(text: &[u8]) -> Result<u32> {
    ensure!(
        !text.is_empty() && text.len() <= 9,
        UnexpectedLengthSnafu {
            len: text.len(),
            expected: "between 1 and 9 digits"
        }
    );
    let mut acc: u32 = 0;
    for &b in text {
        ensure!(b.is_ascii_digit(), InvalidTokenSnafu { value: b });
        acc = acc * 10 + (b - b'0') as u32;
    }
    Ok(acc)
}

/// Decode a DICOM Date (DA) from its `YYYYMMDD` text form.
pub fn parse_date(buf: &[u8]) -> Result<DicomDate> {
    ensure!(
        buf.len() == 8,
        UnexpectedLengthSnafu {
            len: buf.len(),
            expected: "8 (YYYYMMDD)"
        }
    );
    let year = read_number(&buf[0..4])? as u16;
    let month = read_number(&buf[4..6])? as u8;
    let day = read_number(&buf[6..8])? as u8;
    DicomDate::new(year, month, day)
}

/// Decode a DICOM Time (TM) from its `HHMMSS[.FFFFFF]` text form.
pub fn parse_time(buf: &[u8]) -> Result<DicomTime> {
    let (time, rest) = parse_time_partial(buf)?;
    ensure!(
        rest.is_empty(),
        UnexpectedLengthSnafu {
            len: buf.len(),
            expected: "HHMMSS followed by at most 6 fraction digits"
        }
    );
    Ok(time)
}

/// Decode the time portion at the start of `buf`,
/// returning the remaining bytes (used by the DT parser,
/// where a UTC offset may follow).
fn parse_time_partial(buf: &[u8]) -> Result<(DicomTime, &[u8])> {
    ensure!(
        buf.len() >= 6,
        UnexpectedLengthSnafu {
            len: buf.len(),
            expected: "at least 6 (HHMMSS)"
        }
    );
    let hour = read_number(&buf[0..2])? as u8;
    let minute = read_number(&buf[2..4])? as u8;
    let second = read_number(&buf[4..6])? as u8;
    let rest = &buf[6..];
    if let [b'.', fraction @ ..] = rest {
        // up to six fraction digits, ending the value or
        // followed by a time zone suffix
        let n = fraction
            .iter()
            .position(|&b| b == b'+' || b == b'-')
            .unwrap_or(fraction.len());
        ensure!(
            (1..=6).contains(&n),
            UnexpectedLengthSnafu {
                len: n,
                expected: "between 1 and 6 fraction digits"
            }
        );
        let mut micros = read_number(&fraction[..n])?;
        for _ in n..6 {
            micros *= 10;
        }
        let time = DicomTime::with_fraction(hour, minute, second, micros, n as u8)?;
        Ok((time, &fraction[n..]))
    } else {
        Ok((DicomTime::new(hour, minute, second)?, rest))
    }
}

/// Decode a DICOM Date Time (DT)
/// from its `YYYYMMDD[HHMMSS[.FFFFFF]][+-ZZZZ]` text form.
pub fn parse_datetime(buf: &[u8]) -> Result<DicomDateTime> {
    ensure!(
        buf.len() >= 8,
        UnexpectedLengthSnafu {
            len: buf.len(),
            expected: "at least 8 (YYYYMMDD)"
        }
    );
    let date = parse_date(&buf[0..8])?;
    let mut rest = &buf[8..];

    let time = if !rest.is_empty() && rest[0].is_ascii_digit() {
        let (time, r) = parse_time_partial(rest)?;
        rest = r;
        Some(time)
    } else {
        None
    };

    let offset_minutes = match rest {
        [] => None,
        [sign @ (b'+' | b'-'), digits @ ..] => {
            ensure!(digits.len() == 4, InvalidTimeZoneSnafu);
            let hours = read_number(&digits[0..2])? as i16;
            let minutes = read_number(&digits[2..4])? as i16;
            ensure!(hours < 24 && minutes < 60, InvalidTimeZoneSnafu);
            let total = hours * 60 + minutes;
            Some(if *sign == b'-' { -total } else { total })
        }
        [c, ..] => return InvalidTokenSnafu { value: *c }.fail(),
    };

    Ok(DicomDateTime {
        date,
        time,
        offset_minutes,
    })
}

/// Decode a DICOM Integer String (IS):
/// an optionally signed decimal integer of at most 12 characters
/// which fits a signed 32-bit integer.
pub fn parse_is(text: &[u8]) -> Result<i32> {
    ensure!(
        !text.is_empty() && text.len() <= 12,
        UnexpectedLengthSnafu {
            len: text.len(),
            expected: "between 1 and 12 characters"
        }
    );
    let (negative, digits) = match text {
        [b'-', rest @ ..] => (true, rest),
        [b'+', rest @ ..] => (false, rest),
        _ => (false, text),
    };
    ensure!(
        !digits.is_empty(),
        UnexpectedLengthSnafu {
            len: 0usize,
            expected: "at least one digit"
        }
    );
    // a second sign would fail the digit check below
    let mut acc: i64 = 0;
    for &b in digits {
        ensure!(b.is_ascii_digit(), InvalidTokenSnafu { value: b });
        acc = acc * 10 + (b - b'0') as i64;
        ensure!(acc <= i32::MAX as i64 + 1, IntegerOutOfRangeSnafu);
    }
    let acc = if negative { -acc } else { acc };
    i32::try_from(acc).map_err(|_| Error::IntegerOutOfRange)
}

/// Decode a DICOM Decimal String (DS):
/// fixed or floating point decimal text of at most 16 characters,
/// tolerating surrounding spaces.
pub fn parse_ds(text: &[u8]) -> Result<f64> {
    ensure!(
        !text.is_empty() && text.len() <= 16,
        UnexpectedLengthSnafu {
            len: text.len(),
            expected: "between 1 and 16 characters"
        }
    );
    let text = std::str::from_utf8(text)
        .map_err(|_| Error::InvalidToken { value: 0 })?
        .trim();
    text.parse::<f64>().context(ParseFloatSnafu)
}

/// Decode a DICOM Age String (AS): `nnnD`, `nnnW`, `nnnM` or `nnnY`.
pub fn parse_age(text: &[u8]) -> Result<AgeString> {
    ensure!(
        text.len() == 4,
        UnexpectedLengthSnafu {
            len: text.len(),
            expected: "4 (nnnU)"
        }
    );
    let value = read_number(&text[0..3])? as u16;
    let unit = match text[3] {
        b'D' => AgeUnit::Days,
        b'W' => AgeUnit::Weeks,
        b'M' => AgeUnit::Months,
        b'Y' => AgeUnit::Years,
        c => return InvalidAgeUnitSnafu { value: c }.fail(),
    };
    Ok(AgeString { value, unit })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn date_full_precision_only() {
        let d = parse_date(b"20240229").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2024, 2, 29));
        assert!(parse_date(b"2024").is_err());
        assert!(parse_date(b"202402").is_err());
        assert!(parse_date(b"20230229").is_err());
        assert!(parse_date(b"2024022X").is_err());
    }

    #[test]
    fn time_with_and_without_fraction() {
        let t = parse_time(b"235959").unwrap();
        assert_eq!((t.hour(), t.minute(), t.second()), (23, 59, 59));
        assert_eq!(t.fraction_digits(), 0);

        let t = parse_time(b"120000.5").unwrap();
        assert_eq!(t.microsecond(), 500_000);
        assert_eq!(t.fraction_digits(), 1);

        let t = parse_time(b"120000.123456").unwrap();
        assert_eq!(t.microsecond(), 123_456);

        assert!(parse_time(b"1200").is_err());
        assert!(parse_time(b"240000").is_err());
        assert!(parse_time(b"120000.1234567").is_err());
    }

    #[test]
    fn datetime_variants() {
        let dt = parse_datetime(b"20240101").unwrap();
        assert!(dt.time.is_none());
        assert!(dt.offset_minutes.is_none());

        let dt = parse_datetime(b"20240101120000.25+0100").unwrap();
        assert_eq!(dt.time.unwrap().microsecond(), 250_000);
        assert_eq!(dt.offset_minutes, Some(60));

        let dt = parse_datetime(b"20240101-0530").unwrap();
        assert!(dt.time.is_none());
        assert_eq!(dt.offset_minutes, Some(-330));

        assert!(parse_datetime(b"20240101+05").is_err());
    }

    #[test]
    fn integer_string_range_and_syntax() {
        assert_eq!(parse_is(b"0").unwrap(), 0);
        assert_eq!(parse_is(b"-2147483648").unwrap(), i32::MIN);
        assert_eq!(parse_is(b"2147483647").unwrap(), i32::MAX);
        assert_eq!(parse_is(b"+17").unwrap(), 17);
        assert!(parse_is(b"2147483648").is_err());
        assert!(parse_is(b"--1").is_err());
        assert!(parse_is(b"1.5").is_err());
        assert!(parse_is(b"1234567890123").is_err());
    }

    #[test]
    fn decimal_string_tolerates_spaces() {
        assert_eq!(parse_ds(b" 1.25 ").unwrap(), 1.25);
        assert_eq!(parse_ds(b"-3e2").unwrap(), -300.);
        assert!(parse_ds(b"abc").is_err());
        assert!(parse_ds(b"1.000000000000000001").is_err());
    }

    #[test]
    fn age_string_units() {
        let a = parse_age(b"036M").unwrap();
        assert_eq!(a.value, 36);
        assert_eq!(a.unit, AgeUnit::Months);
        assert!(parse_age(b"36M").is_err());
        assert!(parse_age(b"036X").is_err());
    }
}
