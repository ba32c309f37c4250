// crates/upgrade-guard-core/src/core/identifiers.rs
// ============================================================================
// Module: Upgrade Guard Identifiers
// Description: Canonical package names and run identifiers.
// Purpose: Provide strongly typed, serializable IDs with stable string forms.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Package names are canonicalized on construction so that `Django`,
//! `django` and `dj_ango`-style spellings from different tools collapse onto
//! one key. Run identifiers embed their UTC start time so retention can age
//! snapshots without opening them.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::Date;
use time::Month;
use time::OffsetDateTime;
use time::Time;

// ============================================================================
// SECTION: Package Names
// ============================================================================

/// Canonical package name.
///
/// # Invariants
/// - Lowercase ASCII with runs of `-`, `_` and `.` collapsed to a single `-`.
/// - Leading and trailing whitespace is removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct PackageName(String);

impl PackageName {
    /// Creates a canonical package name from any spelling.
    #[must_use]
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(canonicalize(raw.as_ref()))
    }

    /// Returns the canonical name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true when the canonical name is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PackageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for PackageName {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for PackageName {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<PackageName> for String {
    fn from(value: PackageName) -> Self {
        value.0
    }
}

/// Lowercases and collapses separator runs.
fn canonicalize(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut pending_separator = false;
    for ch in raw.trim().chars() {
        if matches!(ch, '-' | '_' | '.') {
            pending_separator = true;
            continue;
        }
        if pending_separator && !out.is_empty() {
            out.push('-');
        }
        pending_separator = false;
        out.extend(ch.to_lowercase());
    }
    out
}

// ============================================================================
// SECTION: Run Identifiers
// ============================================================================

/// Length of the `YYYYMMDDTHHMMSSZ` prefix of a run identifier.
const RUN_TIMESTAMP_LEN: usize = 16;

/// Identifier of one engine run, also the snapshot directory name.
///
/// # Invariants
/// - Generated identifiers start with a `YYYYMMDDTHHMMSSZ` UTC timestamp.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

impl RunId {
    /// Creates a run identifier from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Builds `YYYYMMDDTHHMMSSZ[-tag]-suffix` from its parts. Tag characters
    /// outside `[A-Za-z0-9_]` are replaced with `_`.
    #[must_use]
    pub fn from_parts(started_at: OffsetDateTime, tag: Option<&str>, suffix: &str) -> Self {
        let utc = started_at.to_offset(time::UtcOffset::UTC);
        let mut id = format!(
            "{:04}{:02}{:02}T{:02}{:02}{:02}Z",
            utc.year(),
            u8::from(utc.month()),
            utc.day(),
            utc.hour(),
            utc.minute(),
            utc.second()
        );
        if let Some(tag) = tag.map(str::trim).filter(|tag| !tag.is_empty()) {
            id.push('-');
            id.extend(
                tag.chars().map(|ch| if ch.is_ascii_alphanumeric() || ch == '_' { ch } else { '_' }),
            );
        }
        if !suffix.is_empty() {
            id.push('-');
            id.push_str(suffix);
        }
        Self(id)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the UTC start time encoded in the identifier, if any.
    #[must_use]
    pub fn started_at(&self) -> Option<OffsetDateTime> {
        let prefix = self.0.get(..RUN_TIMESTAMP_LEN)?;
        let bytes = prefix.as_bytes();
        if bytes[8] != b'T' || bytes[15] != b'Z' {
            return None;
        }
        let number = |range: std::ops::Range<usize>| prefix.get(range)?.parse::<u32>().ok();
        let year = i32::try_from(number(0..4)?).ok()?;
        let month = Month::try_from(u8::try_from(number(4..6)?).ok()?).ok()?;
        let day = u8::try_from(number(6..8)?).ok()?;
        let hour = u8::try_from(number(9..11)?).ok()?;
        let minute = u8::try_from(number(11..13)?).ok()?;
        let second = u8::try_from(number(13..15)?).ok()?;
        let date = Date::from_calendar_date(year, month, day).ok()?;
        let clock = Time::from_hms(hour, minute, second).ok()?;
        Some(date.with_time(clock).assume_utc())
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for RunId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for RunId {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}
