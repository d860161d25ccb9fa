//! Culture-invariant text forms of the literal kinds that render as `Type.Parse("...")`.
//!
//! Formatting always produces the round-trip ("o") form; parsing accepts that form plus a few
//! common invariant-culture spellings.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use uuid::Uuid;

/// Static receivers whose `Parse` calls fold into literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralFactory {
    DateTime,
    DateTimeOffset,
    DateOnly,
    TimeOnly,
    Guid,
}

impl LiteralFactory {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.strip_prefix("System.").unwrap_or(name) {
            "DateTime" => Some(Self::DateTime),
            "DateTimeOffset" => Some(Self::DateTimeOffset),
            "DateOnly" => Some(Self::DateOnly),
            "TimeOnly" => Some(Self::TimeOnly),
            "Guid" => Some(Self::Guid),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::DateTime => "DateTime",
            Self::DateTimeOffset => "DateTimeOffset",
            Self::DateOnly => "DateOnly",
            Self::TimeOnly => "TimeOnly",
            Self::Guid => "Guid",
        }
    }
}

/// Named `DateTimeStyles` flags accepted in `DateTimeStyles.Name` form.
pub fn date_time_style(name: &str) -> Option<i32> {
    Some(match name {
        "None" => 0,
        "AllowLeadingWhite" => 1,
        "AllowTrailingWhite" => 2,
        "AllowInnerWhite" => 4,
        "AllowWhiteSpaces" => 7,
        "NoCurrentDateDefault" => 8,
        "AdjustToUniversal" => 16,
        "AssumeLocal" => 32,
        "AssumeUniversal" => 64,
        "RoundtripKind" => 128,
        _ => return None,
    })
}

pub fn is_date_time_styles_type(name: &str) -> bool {
    matches!(name, "DateTimeStyles" | "Globalization.DateTimeStyles" | "System.Globalization.DateTimeStyles")
}

/// Fractional seconds as seven digits of 100ns ticks. Anything finer than a tick is dropped, so a value
/// carrying sub-tick nanoseconds reads back slightly earlier than it was written.
fn ticks(nanos: u32) -> String { format!("{:07}", nanos.min(999_999_999) / 100) }

/// Round-trippable text for a date-time, precise to 100ns
pub fn format_date_time(value: &NaiveDateTime) -> String { format!("{}.{}", value.format("%Y-%m-%dT%H:%M:%S"), ticks(value.nanosecond())) }

pub fn format_date_time_offset(value: &DateTime<FixedOffset>) -> String {
    format!("{}.{}{}", value.format("%Y-%m-%dT%H:%M:%S"), ticks(value.nanosecond()), value.format("%:z"))
}

pub fn format_date(value: &NaiveDate) -> String { value.format("%Y-%m-%d").to_string() }

pub fn format_time(value: &NaiveTime) -> String { format!("{}.{}", value.format("%H:%M:%S"), ticks(value.nanosecond())) }

pub fn format_guid(value: &Uuid) -> String { value.hyphenated().to_string() }

const DATE_TIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%m/%d/%Y %H:%M:%S", "%m/%d/%Y %H:%M"];
const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y"];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M"];

/// Parse a DateTime. Text carrying an offset (or `Z`) is normalized to UTC.
pub fn parse_date_time(text: &str) -> Option<NaiveDateTime> {
    let text = text.trim();
    if let Some(value) = parse_date_time_offset(text) {
        return Some(value.naive_utc());
    }
    let text = text.strip_suffix('Z').unwrap_or(text);
    DATE_TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(text, fmt).ok())
        .or_else(|| parse_date(text).and_then(|date| date.and_hms_opt(0, 0, 0)))
}

pub fn parse_date_time_offset(text: &str) -> Option<DateTime<FixedOffset>> {
    let text = text.trim();
    DateTime::parse_from_rfc3339(text)
        .ok()
        .or_else(|| DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%:z").ok())
        .or_else(|| DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f %:z").ok())
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    DATE_FORMATS.iter().find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
}

pub fn parse_time(text: &str) -> Option<NaiveTime> {
    let text = text.trim();
    TIME_FORMATS.iter().find_map(|fmt| NaiveTime::parse_from_str(text, fmt).ok())
}

pub fn parse_guid(text: &str) -> Option<Uuid> { Uuid::parse_str(text.trim()).ok() }
