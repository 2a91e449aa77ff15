use std::collections::HashMap;
use std::error::Error as StdError;
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, LocalResult, NaiveDate, TimeZone};
use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::ast::{Symbol, Value, ValueKind};

/// Failure raised by a tag reader; wrapped into the reader's error type
/// with the original attached as cause.
pub type TagReaderError = Box<dyn StdError + Send + Sync + 'static>;

/// Resolves one tagged literal: receives the parsed value, returns the
/// domain value.
pub type TagReader = Arc<dyn Fn(Value) -> Result<Value, TagReaderError> + Send + Sync>;

/// Fallback for tags with no dedicated reader.
pub type DefaultTagReader =
    Arc<dyn Fn(Symbol, Value) -> Result<Value, TagReaderError> + Send + Sync>;

/// Process-wide defaults consulted after per-call readers.
pub fn default_data_readers() -> &'static HashMap<Symbol, TagReader> {
    static DEFAULTS: Lazy<HashMap<Symbol, TagReader>> = Lazy::new(|| {
        let mut map: HashMap<Symbol, TagReader> = HashMap::new();
        map.insert(Symbol::simple("inst"), inst_reader());
        map.insert(Symbol::simple("uuid"), uuid_reader());
        map
    });
    &DEFAULTS
}

pub fn inst_reader() -> TagReader {
    Arc::new(|value: Value| {
        let ValueKind::String(text) = &value.kind else {
            return Err(tag_err(format!(
                "instant literal expects a string, got {}",
                value.kind.type_name()
            )));
        };
        let instant = parse_timestamp(text)?;
        Ok(Value::new(ValueKind::Inst(instant)))
    })
}

pub fn uuid_reader() -> TagReader {
    Arc::new(|value: Value| {
        let ValueKind::String(text) = &value.kind else {
            return Err(tag_err(format!(
                "uuid literal expects a string, got {}",
                value.kind.type_name()
            )));
        };
        let uuid = Uuid::parse_str(text).map_err(|err| tag_err(format!("Invalid uuid: {err}")))?;
        Ok(Value::new(ValueKind::Uuid(uuid)))
    })
}

fn tag_err(message: String) -> TagReaderError {
    message.into()
}

// RFC 3339 with every field after the year optional; missing fields
// default to the start of their period, missing offsets to UTC.
static TIMESTAMP_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(\d\d\d\d)(?:-(\d\d)(?:-(\d\d)(?:[T](\d\d)(?::(\d\d)(?::(\d\d)(?:[.](\d+))?)?)?)?)?)?(?:[Z]|([-+])(\d\d):(\d\d))?$",
    )
    .unwrap()
});

fn parse_timestamp(text: &str) -> Result<DateTime<FixedOffset>, TagReaderError> {
    let trimmed = text.trim();
    let caps = TIMESTAMP_PATTERN
        .captures(trimmed)
        .ok_or_else(|| tag_err(format!("Unrecognized date/time syntax: {text}")))?;
    let field = |index: usize| caps.get(index).map(|m| m.as_str());

    let year: i32 = caps[1].parse()?;
    let month: u32 = field(2).map_or(Ok(1), |s| s.parse())?;
    let day: u32 = field(3).map_or(Ok(1), |s| s.parse())?;
    let hour: u32 = field(4).map_or(Ok(0), |s| s.parse())?;
    let minute: u32 = field(5).map_or(Ok(0), |s| s.parse())?;
    let second: u32 = field(6).map_or(Ok(0), |s| s.parse())?;
    let nanos: u32 = match field(7) {
        Some(fraction) => {
            let mut digits = fraction.to_string();
            digits.truncate(9);
            let scale = 10u32.pow(9 - digits.len() as u32);
            let parsed: u32 = digits.parse()?;
            parsed * scale
        }
        None => 0,
    };
    let offset_seconds: i32 = match (field(8), field(9), field(10)) {
        (Some(sign), Some(hours), Some(minutes)) => {
            let hours: i32 = hours.parse()?;
            let minutes: i32 = minutes.parse()?;
            let magnitude = hours * 3600 + minutes * 60;
            if sign == "-" {
                -magnitude
            } else {
                magnitude
            }
        }
        _ => 0,
    };

    let offset = FixedOffset::east_opt(offset_seconds)
        .ok_or_else(|| tag_err(format!("Invalid timezone offset: {text}")))?;
    let date = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or_else(|| tag_err(format!("Invalid date: {text}")))?;
    let datetime = date
        .and_hms_nano_opt(hour, minute, second, nanos)
        .ok_or_else(|| tag_err(format!("Invalid time: {text}")))?;
    match offset.from_local_datetime(&datetime) {
        LocalResult::Single(instant) => Ok(instant),
        _ => Err(tag_err(format!("Invalid timestamp: {text}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_timestamps() {
        let instant = parse_timestamp("1985-04-12T23:20:50.52Z").expect("timestamp");
        assert_eq!(instant.to_rfc3339(), "1985-04-12T23:20:50.520+00:00");
    }

    #[test]
    fn partial_timestamps_default_their_fields() {
        let instant = parse_timestamp("1985").expect("year only");
        assert_eq!(instant.to_rfc3339(), "1985-01-01T00:00:00+00:00");
        let instant = parse_timestamp("1985-04-12T23:20").expect("no seconds");
        assert_eq!(instant.to_rfc3339(), "1985-04-12T23:20:00+00:00");
    }

    #[test]
    fn honors_offsets() {
        let instant = parse_timestamp("2000-01-01T00:00:00+05:30").expect("offset");
        assert_eq!(instant.offset().local_minus_utc(), 5 * 3600 + 30 * 60);
    }

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(parse_timestamp("2000-13-01").is_err());
        assert!(parse_timestamp("2000-02-30").is_err());
        assert!(parse_timestamp("not-a-date").is_err());
    }
}
