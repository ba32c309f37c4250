// crates/upgrade-guard-core/src/core/time.rs
// ============================================================================
// Module: Upgrade Guard Timestamps
// Description: Lenient timestamp parsing and RFC 3339 serde helpers.
// Purpose: Read the timestamp dialects found in dependency reports.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Dependency tooling emits timestamps as RFC 3339 strings, as offset-less
//! ISO datetimes, or as bare calendar dates. Everything is normalized to a
//! UTC [`OffsetDateTime`]; outputs always serialize as RFC 3339.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Deserializer;
use serde::Serializer;
use serde::de::Error as _;
use time::Date;
use time::Month;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Parsing
// ============================================================================

/// Parses an RFC 3339 timestamp, an offset-less ISO datetime (read as UTC),
/// or a bare `YYYY-MM-DD` date (read as midnight UTC).
#[must_use]
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = OffsetDateTime::parse(trimmed, &Rfc3339) {
        return Some(parsed);
    }
    if trimmed.contains('T') {
        let assumed = format!("{trimmed}Z");
        return OffsetDateTime::parse(&assumed, &Rfc3339).ok();
    }
    parse_date(trimmed).map(|date| date.midnight().assume_utc())
}

/// Parses a `YYYY-MM-DD` calendar date.
fn parse_date(value: &str) -> Option<Date> {
    let mut parts = value.split('-');
    let year = parts.next()?.parse::<i32>().ok()?;
    let month = parts.next()?.parse::<u8>().ok()?;
    let day = parts.next()?.parse::<u8>().ok()?;
    if parts.next().is_some() {
        return None;
    }
    let month = Month::try_from(month).ok()?;
    Date::from_calendar_date(year, month, day).ok()
}

/// Formats a timestamp as RFC 3339, falling back to unix seconds for values
/// RFC 3339 cannot represent.
#[must_use]
pub fn format_timestamp(value: OffsetDateTime) -> String {
    value.format(&Rfc3339).unwrap_or_else(|_| value.unix_timestamp().to_string())
}

/// Returns whole days elapsed from `then` to `now` (negative when `then` is
/// in the future).
#[must_use]
pub fn whole_days_between(then: OffsetDateTime, now: OffsetDateTime) -> i64 {
    (now - then).whole_days()
}

/// Returns fractional days elapsed from `then` to `now`, floored at zero.
#[must_use]
pub fn elapsed_days(then: OffsetDateTime, now: OffsetDateTime) -> f64 {
    ((now - then).as_seconds_f64() / 86_400.0).max(0.0)
}

// ============================================================================
// SECTION: Serde Helpers
// ============================================================================

/// Serde adapter for required timestamps.
pub mod rfc3339 {
    use super::Deserialize;
    use super::Deserializer;
    use super::OffsetDateTime;
    use super::Serializer;
    use super::format_timestamp;
    use super::parse_timestamp;

    /// Serializes a timestamp as RFC 3339.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when writing fails.
    pub fn serialize<S: Serializer>(
        value: &OffsetDateTime,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&format_timestamp(*value))
    }

    /// Deserializes a timestamp using the lenient parser.
    ///
    /// # Errors
    ///
    /// Returns a custom error when the value is not a recognized timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<OffsetDateTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_timestamp(&raw).ok_or_else(|| super::invalid_timestamp::<D>(&raw))
    }
}

/// Serde adapter for optional timestamps.
pub mod rfc3339_option {
    use super::Deserialize;
    use super::Deserializer;
    use super::OffsetDateTime;
    use super::Serializer;
    use super::format_timestamp;
    use super::parse_timestamp;

    /// Serializes an optional timestamp as RFC 3339 or `null`.
    ///
    /// # Errors
    ///
    /// Returns the serializer error when writing fails.
    #[allow(clippy::ref_option, reason = "Signature is fixed by serde's `with` contract.")]
    pub fn serialize<S: Serializer>(
        value: &Option<OffsetDateTime>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(value) => serializer.serialize_some(&format_timestamp(*value)),
            None => serializer.serialize_none(),
        }
    }

    /// Deserializes an optional timestamp using the lenient parser.
    ///
    /// # Errors
    ///
    /// Returns a custom error when a present value is not a recognized
    /// timestamp.
    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<OffsetDateTime>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|text| parse_timestamp(&text).ok_or_else(|| super::invalid_timestamp::<D>(&text)))
            .transpose()
    }
}

/// Builds the shared "invalid timestamp" deserialization error.
fn invalid_timestamp<'de, D: Deserializer<'de>>(raw: &str) -> D::Error {
    D::Error::custom(format!("invalid timestamp: {raw}"))
}
