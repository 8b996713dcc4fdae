//! Log line parser.
//!
//! This module turns raw log lines into typed [`LineEvent`] values and
//! derives the contract grouping key from train identifiers.
//!
//! # Line Grammar
//!
//! One event per line. Two forms are recognized, anywhere in the line:
//!
//! - Arrival: `Delay for train <train-id>[<location>]: <[-]HH:MM:SS>`
//! - Bad platform: `Bad platform for train <train-id>`
//!
//! Anything else is a reject (`None`), which callers are free to count or
//! surface as a status line. A malformed duration does NOT reject the line:
//! the delay falls back to 0 so a train's position is still tracked even
//! when its timing field is garbled.

use thiserror::Error;

use crate::types::{ContractId, ContractType, Report, TrainId};

/// Marker phrase introducing an arrival report.
const ARRIVAL_MARKER: &str = "Delay for train ";

/// Marker phrase introducing a platform assignment failure.
const BAD_PLATFORM_MARKER: &str = "Bad platform for train ";

/// The route family whose contract id carries an extra disambiguating
/// character (the family's numeric block is wider than three digits).
const WIDE_FAMILY: &str = "Reg";

/// Byte offset of the disambiguating character in a `Reg`-family id:
/// immediately after the three family letters and three digits.
const WIDE_FAMILY_EXTRA_OFFSET: usize = 6;

/// Error type for identifier grouping failures.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    /// The train id contains no alphabetic prefix followed by a 3-digit
    /// group, or a `Reg`-family id is too short to carry its extra
    /// character. Fatal to the one event, not to the engine.
    #[error("train id {0:?} does not match the contract grouping pattern")]
    MalformedIdentifier(String),
}

/// A parsed log line.
///
/// The discriminant is explicit so downstream code matches on the variant
/// instead of inspecting payload shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEvent {
    /// A train reported a location together with its schedule deviation.
    Arrival(Report),
    /// A platform assignment failure for the named train. No movement data.
    BadPlatform(TrainId),
}

/// Parses one raw log line.
///
/// # Returns
///
/// * `Some(LineEvent::Arrival(_))` - the line carries a movement report
/// * `Some(LineEvent::BadPlatform(_))` - the line carries a platform failure
/// * `None` - unrecognized line (ignored, not an error)
pub fn parse_line(line: &str) -> Option<LineEvent> {
    if let Some(at) = line.find(ARRIVAL_MARKER) {
        let rest = &line[at + ARRIVAL_MARKER.len()..];
        let (tid, rest) = rest.split_once('[')?;
        let (location, rest) = rest.split_once(']')?;
        let delay_text = rest.strip_prefix(": ")?.trim();
        if tid.is_empty() || location.is_empty() || delay_text.is_empty() {
            return None;
        }
        let delay_secs = parse_delay(delay_text);
        return Some(LineEvent::Arrival(Report::new(tid, location, delay_secs)));
    }

    if let Some(at) = line.find(BAD_PLATFORM_MARKER) {
        let rest = &line[at + BAD_PLATFORM_MARKER.len()..];
        let tid = rest.split_whitespace().next()?;
        return Some(LineEvent::BadPlatform(TrainId::new(tid)));
    }

    None
}

/// Converts a `[-]HH:MM:SS` duration to signed total seconds.
///
/// Fields are read at fixed two-digit offsets (0..2, 3..5, 6..8 after the
/// sign), so the separator characters are not validated. Any field that
/// fails to parse makes the whole duration fall back to 0; a leading `-`
/// negates the total.
fn parse_delay(text: &str) -> i64 {
    let (sign, body) = match text.strip_prefix('-') {
        Some(rest) => (-1, rest),
        None => (1, text),
    };

    let field = |lo: usize, hi: usize| -> Option<i64> {
        body.get(lo..hi).and_then(|f| f.parse::<i64>().ok())
    };

    match (field(0, 2), field(3, 5), field(6, 8)) {
        (Some(hours), Some(minutes), Some(seconds)) => {
            sign * (hours * 3600 + minutes * 60 + seconds)
        }
        _ => 0,
    }
}

/// Derives the `(ctype, cid)` grouping key from a train id.
///
/// The key is the first alphabetic run immediately followed by three ASCII
/// digits: the run is the route family (`ctype`), the digits the contract
/// id. The `Reg` family additionally appends the character at byte offset 6
/// (its numeric block is four digits wide, so `Reg1024` and `Reg1025` are
/// distinct contracts).
///
/// # Errors
///
/// [`ParseError::MalformedIdentifier`] if no such pattern exists in the id,
/// or if a `Reg`-family id has no character at the extra offset.
pub fn contract_key(tid: &TrainId) -> Result<(ContractType, ContractId), ParseError> {
    let id = tid.as_str();
    let bytes = id.as_bytes();
    let mut i = 0;

    while i < bytes.len() {
        if !bytes[i].is_ascii_alphabetic() {
            i += 1;
            continue;
        }

        let start = i;
        while i < bytes.len() && bytes[i].is_ascii_alphabetic() {
            i += 1;
        }

        let digits_end = i + 3;
        if digits_end <= bytes.len() && bytes[i..digits_end].iter().all(u8::is_ascii_digit) {
            let prefix = &id[start..i];
            let digits = &id[i..digits_end];

            let cid = if prefix == WIDE_FAMILY {
                let extra = id
                    .get(WIDE_FAMILY_EXTRA_OFFSET..WIDE_FAMILY_EXTRA_OFFSET + 1)
                    .ok_or_else(|| ParseError::MalformedIdentifier(id.to_string()))?;
                format!("{digits}{extra}")
            } else {
                digits.to_string()
            };

            return Ok((ContractType::new(prefix), ContractId::new(cid)));
        }
        // Alphabetic run not followed by three digits; keep scanning.
    }

    Err(ParseError::MalformedIdentifier(id.to_string()))
}
