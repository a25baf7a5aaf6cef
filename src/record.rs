//! Parsing of single `station;temperature` lines.
//!
//! Temperatures are fixed-point decimals with exactly one fractional digit,
//! so they are held as integer tenths. That keeps every sum exact no matter
//! how many records are folded together.

use std::fmt;
use std::str::FromStr;

use memchr::memchr;
use thiserror::Error;

/// Why a line could not be turned into a [`Record`].
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    #[error("field delimiter not found")]
    MissingDelimiter,
    #[error("value is not a decimal number")]
    InvalidNumber,
    #[error("value must have exactly one fractional digit")]
    FractionalDigits,
    #[error("unexpected content after the value")]
    TrailingContent,
    #[error("value does not fit in the supported range")]
    OutOfRange,
}

/// A temperature stored as a whole number of tenths of a degree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Temperature(i32);

impl Temperature {
    pub const fn from_tenths(tenths: i32) -> Self {
        Self(tenths)
    }

    pub const fn tenths(self) -> i32 {
        self.0
    }
}

impl fmt::Display for Temperature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{}", sign, abs / 10, abs % 10)
    }
}

impl FromStr for Temperature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_temperature(s.as_bytes())
    }
}

/// One parsed line. Borrows the station name from the chunk it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Record<'a> {
    pub station: &'a [u8],
    pub temperature: Temperature,
}

/// Splits `line` on the first `delimiter` and parses the value after it.
///
/// The station name is kept byte for byte, surrounding whitespace included.
/// The value must look like `-?[0-9]+\.[0-9]` with nothing before or after.
pub fn parse_record(line: &[u8], delimiter: u8) -> Result<Record<'_>, ParseError> {
    let split = memchr(delimiter, line).ok_or(ParseError::MissingDelimiter)?;
    let temperature = parse_temperature(&line[split + 1..])?;
    Ok(Record {
        station: &line[..split],
        temperature,
    })
}

/// Parses a one-decimal fixed-point number into tenths.
pub fn parse_temperature(bytes: &[u8]) -> Result<Temperature, ParseError> {
    let (negative, digits) = match bytes.split_first() {
        Some((b'-', rest)) => (true, rest),
        _ => (false, bytes),
    };

    let dot = memchr(b'.', digits).ok_or(ParseError::InvalidNumber)?;
    let (integral, fraction) = (&digits[..dot], &digits[dot + 1..]);
    if integral.is_empty() || !integral.iter().all(u8::is_ascii_digit) {
        return Err(ParseError::InvalidNumber);
    }

    let fraction_digit = match fraction {
        [d] if d.is_ascii_digit() => *d - b'0',
        [d, rest @ ..] if d.is_ascii_digit() && rest.iter().all(u8::is_ascii_digit) => {
            return Err(ParseError::FractionalDigits)
        }
        [d, ..] if d.is_ascii_digit() => return Err(ParseError::TrailingContent),
        _ => return Err(ParseError::InvalidNumber),
    };

    let whole: u32 = lexical_core::parse(integral).map_err(|_| ParseError::OutOfRange)?;
    let tenths = whole
        .checked_mul(10)
        .and_then(|t| t.checked_add(u32::from(fraction_digit)))
        .and_then(|t| i32::try_from(t).ok())
        .ok_or(ParseError::OutOfRange)?;

    Ok(Temperature(if negative { -tenths } else { tenths }))
}
