// crates/upgrade-guard-core/src/core/version.rs
// ============================================================================
// Module: Upgrade Guard Version Algebra
// Description: Lenient release versions, change classes, and requirements.
// Purpose: Order versions and evaluate ranges across packaging dialects.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! Package indexes mix semantic versions (`1.2.3-rc.1`) with PEP 440 style
//! versions (`1.2.3rc1`, `2.0.dev4`, `1.0.post2`). [`Version`] accepts both,
//! orders them as `dev < alpha < beta < rc < final < post`, and pads missing
//! release components with zeros so `1.2` equals `1.2.0`.
//!
//! [`VersionReq`] evaluates comma-separated requirement clauses. A bare
//! version is an exact pin by default; [`VersionReq::parse_compatible`]
//! reads it as a caret range instead, which is how cross-repository
//! requirements are compared.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::fmt;
use std::hash::Hash;
use std::hash::Hasher;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Version parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VersionError {
    /// Version string could not be parsed.
    #[error("invalid version `{0}`")]
    InvalidVersion(String),
    /// Requirement string could not be parsed.
    #[error("invalid version requirement `{0}`")]
    InvalidRequirement(String),
}

// ============================================================================
// SECTION: Pre-Releases
// ============================================================================

/// Pre-release phase, ordered from earliest to latest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreReleaseKind {
    /// Development snapshot.
    Dev,
    /// Alpha release (also used for unrecognized labels).
    Alpha,
    /// Beta release.
    Beta,
    /// Release candidate.
    Rc,
}

/// Pre-release marker with its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PreRelease {
    /// Pre-release phase.
    pub kind: PreReleaseKind,
    /// Sequence number within the phase.
    pub number: u64,
}

// ============================================================================
// SECTION: Version
// ============================================================================

/// A parsed release version.
///
/// # Invariants
/// - `release` holds at least one component.
/// - Equality and ordering ignore trailing zero components and local labels.
#[derive(Debug, Clone)]
pub struct Version {
    /// Release components (`1.2.3` -> `[1, 2, 3]`).
    release: Vec<u64>,
    /// Optional pre-release marker.
    pre: Option<PreRelease>,
    /// Optional post-release number.
    post: Option<u64>,
    /// Original spelling, used for display.
    raw: String,
}

impl Version {
    /// Parses a version string.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidVersion`] when the string has no
    /// numeric release or carries unrecognized trailing text.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidVersion(input.to_string());
        let trimmed = input.trim();
        let without_prefix = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);
        let public = without_prefix.split('+').next().unwrap_or_default().to_ascii_lowercase();
        let release_end =
            public.find(|ch: char| !(ch.is_ascii_digit() || ch == '.')).unwrap_or(public.len());
        let release_text = public[..release_end].trim_end_matches('.');
        if release_text.is_empty() {
            return Err(invalid());
        }
        let mut release = Vec::new();
        for part in release_text.split('.') {
            release.push(part.parse::<u64>().map_err(|_| invalid())?);
        }
        let (pre, post) = parse_suffix(&public[release_end..]).ok_or_else(invalid)?;
        Ok(Self {
            release,
            pre,
            post,
            raw: trimmed.to_string(),
        })
    }

    /// Builds a final release from numeric components.
    #[must_use]
    pub fn from_release(release: &[u64]) -> Self {
        let release = if release.is_empty() { vec![0] } else { release.to_vec() };
        let raw = release.iter().map(u64::to_string).collect::<Vec<_>>().join(".");
        Self {
            release,
            pre: None,
            post: None,
            raw,
        }
    }

    /// Returns the release components.
    #[must_use]
    pub fn release(&self) -> &[u64] {
        &self.release
    }

    /// Returns the release component at `index`, defaulting to zero.
    #[must_use]
    pub fn component(&self, index: usize) -> u64 {
        self.release.get(index).copied().unwrap_or(0)
    }

    /// Returns the major component.
    #[must_use]
    pub fn major(&self) -> u64 {
        self.component(0)
    }

    /// Returns the minor component.
    #[must_use]
    pub fn minor(&self) -> u64 {
        self.component(1)
    }

    /// Returns the patch component.
    #[must_use]
    pub fn patch(&self) -> u64 {
        self.component(2)
    }

    /// Returns the pre-release marker, if any.
    #[must_use]
    pub const fn pre_release(&self) -> Option<PreRelease> {
        self.pre
    }

    /// Returns true for development, alpha, beta and rc versions.
    #[must_use]
    pub const fn is_prerelease(&self) -> bool {
        self.pre.is_some()
    }

    /// Returns the original spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Classifies the move from `self` to `target`.
    #[must_use]
    pub fn change_to(&self, target: &Self) -> VersionChange {
        match target.cmp(self) {
            Ordering::Equal => VersionChange::None,
            Ordering::Less => VersionChange::Downgrade,
            Ordering::Greater if target.major() != self.major() => VersionChange::Major,
            Ordering::Greater if target.minor() != self.minor() => VersionChange::Minor,
            Ordering::Greater => VersionChange::Patch,
        }
    }

    /// Returns true when both versions share the first `depth` components.
    #[must_use]
    pub fn shares_prefix(&self, other: &Self, depth: usize) -> bool {
        (0..depth).all(|index| self.component(index) == other.component(index))
    }

    /// Release components with trailing zeros removed, for hashing.
    fn significant_release(&self) -> &[u64] {
        let end = self.release.iter().rposition(|part| *part != 0).map_or(0, |index| index + 1);
        &self.release[..end]
    }
}

/// Parses the pre/post suffix following the release.
fn parse_suffix(mut rest: &str) -> Option<(Option<PreRelease>, Option<u64>)> {
    let mut pre: Option<PreRelease> = None;
    let mut post: Option<u64> = None;
    loop {
        rest = rest.trim_start_matches(['.', '-', '_']);
        if rest.is_empty() {
            return Some((pre, post));
        }
        let label_end =
            rest.find(|ch: char| !ch.is_ascii_alphabetic()).unwrap_or(rest.len());
        if label_end == 0 {
            return None;
        }
        let label = &rest[..label_end];
        rest = rest[label_end..].trim_start_matches(['.', '-', '_']);
        let digits_end = rest.find(|ch: char| !ch.is_ascii_digit()).unwrap_or(rest.len());
        let number = if digits_end == 0 { 0 } else { rest[..digits_end].parse::<u64>().ok()? };
        rest = &rest[digits_end..];
        match label {
            "post" | "rev" | "r" => post = Some(number),
            "dev" | "snapshot" => {
                if pre.is_none() {
                    pre = Some(PreRelease {
                        kind: PreReleaseKind::Dev,
                        number,
                    });
                }
            }
            _ => {
                let kind = match label {
                    "b" | "beta" => PreReleaseKind::Beta,
                    "rc" | "c" | "pre" | "preview" => PreReleaseKind::Rc,
                    _ => PreReleaseKind::Alpha,
                };
                pre = Some(PreRelease {
                    kind,
                    number,
                });
            }
        }
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        let width = self.release.len().max(other.release.len());
        for index in 0..width {
            match self.component(index).cmp(&other.component(index)) {
                Ordering::Equal => {}
                unequal => return unequal,
            }
        }
        let pre_order = match (self.pre, other.pre) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(left), Some(right)) => left.cmp(&right),
        };
        pre_order.then_with(|| self.post.cmp(&other.post))
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.significant_release().hash(state);
        self.pre.hash(state);
        self.post.hash(state);
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

impl std::str::FromStr for Version {
    type Err = VersionError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

impl Serialize for Version {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// SECTION: Version Change
// ============================================================================

/// Size of a version move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionChange {
    /// Same version.
    None,
    /// Patch-level move within one minor line.
    Patch,
    /// Minor-level move within one major line.
    Minor,
    /// Major-level move.
    Major,
    /// Target is older than the current version.
    Downgrade,
}

// ============================================================================
// SECTION: Requirements
// ============================================================================

/// Comparison operator of a requirement clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    /// `==` (or a bare version in exact mode).
    Exact,
    /// `!=`.
    NotEqual,
    /// `>`.
    Greater,
    /// `>=`.
    GreaterEq,
    /// `<`.
    Less,
    /// `<=`.
    LessEq,
    /// `^` (or a bare version in compatible mode).
    Caret,
    /// `~`.
    Tilde,
    /// `~=`.
    Compatible,
}

/// One clause of a requirement.
#[derive(Debug, Clone)]
struct Clause {
    /// Clause operator.
    op: Operator,
    /// Clause operand.
    version: Version,
    /// True when the operand ended in `.*`.
    wildcard: bool,
}

impl Clause {
    /// Returns true when `candidate` satisfies the clause.
    fn matches(&self, candidate: &Version) -> bool {
        let target = &self.version;
        match self.op {
            Operator::Exact if self.wildcard => {
                candidate.shares_prefix(target, target.release().len())
            }
            Operator::Exact => candidate == target,
            Operator::NotEqual if self.wildcard => {
                !candidate.shares_prefix(target, target.release().len())
            }
            Operator::NotEqual => candidate != target,
            Operator::Greater => candidate > target,
            Operator::GreaterEq => candidate >= target,
            Operator::Less => candidate < target,
            Operator::LessEq => candidate <= target,
            Operator::Caret => candidate >= target && *candidate < caret_upper(target),
            Operator::Tilde => candidate >= target && *candidate < tilde_upper(target),
            Operator::Compatible => candidate >= target && *candidate < compatible_upper(target),
        }
    }
}

/// Upper bound of `^target`: bump the first non-zero component.
fn caret_upper(target: &Version) -> Version {
    let release = target.release();
    let pivot = release.iter().position(|part| *part != 0).unwrap_or(release.len() - 1);
    bump(release, pivot)
}

/// Upper bound of `~target`: bump minor, or major when only major is given.
fn tilde_upper(target: &Version) -> Version {
    let pivot = if target.release().len() > 1 { 1 } else { 0 };
    bump(target.release(), pivot)
}

/// Upper bound of `~=target`: bump the second-to-last component.
fn compatible_upper(target: &Version) -> Version {
    let release = target.release();
    let pivot = release.len().saturating_sub(2);
    bump(release, pivot)
}

/// Increments `release[pivot]` and truncates the components after it.
fn bump(release: &[u64], pivot: usize) -> Version {
    let mut parts: Vec<u64> = release.iter().take(pivot + 1).copied().collect();
    while parts.len() <= pivot {
        parts.push(0);
    }
    parts[pivot] = parts[pivot].saturating_add(1);
    Version::from_release(&parts)
}

/// A comma-separated version requirement.
///
/// # Invariants
/// - An empty clause list matches every version.
#[derive(Debug, Clone)]
pub struct VersionReq {
    /// Conjunctive clauses.
    clauses: Vec<Clause>,
    /// Original spelling.
    raw: String,
}

impl VersionReq {
    /// Requirement matching every version.
    #[must_use]
    pub fn any() -> Self {
        Self {
            clauses: Vec::new(),
            raw: "*".to_string(),
        }
    }

    /// Parses a requirement where a bare version is an exact pin.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidRequirement`] for unparseable clauses.
    pub fn parse(input: &str) -> Result<Self, VersionError> {
        Self::parse_with(input, Operator::Exact)
    }

    /// Parses a requirement where a bare version is a caret range, so
    /// `2.28.0` accepts any `2.x` release at or above it.
    ///
    /// # Errors
    ///
    /// Returns [`VersionError::InvalidRequirement`] for unparseable clauses.
    pub fn parse_compatible(input: &str) -> Result<Self, VersionError> {
        Self::parse_with(input, Operator::Caret)
    }

    /// Shared parser with the operator applied to bare versions.
    fn parse_with(input: &str, bare: Operator) -> Result<Self, VersionError> {
        let invalid = || VersionError::InvalidRequirement(input.to_string());
        let mut clauses = Vec::new();
        for text in input.split(',') {
            let text = text.trim();
            if text.is_empty() || text == "*" {
                continue;
            }
            let (op, operand) = split_operator(text, bare);
            let operand = operand.trim();
            let (operand, wildcard) = match operand.strip_suffix(".*") {
                Some(prefix) => (prefix, true),
                None => (operand, false),
            };
            if wildcard && !matches!(op, Operator::Exact | Operator::NotEqual) {
                return Err(invalid());
            }
            let version = Version::parse(operand).map_err(|_| invalid())?;
            clauses.push(Clause {
                op,
                version,
                wildcard,
            });
        }
        Ok(Self {
            clauses,
            raw: input.trim().to_string(),
        })
    }

    /// Returns true when `candidate` satisfies every clause.
    #[must_use]
    pub fn matches(&self, candidate: &Version) -> bool {
        self.clauses.iter().all(|clause| clause.matches(candidate))
    }

    /// Returns the versions named by the clauses.
    #[must_use]
    pub fn mentioned_versions(&self) -> Vec<Version> {
        self.clauses.iter().map(|clause| clause.version.clone()).collect()
    }

    /// Returns true when the requirement matches every version.
    #[must_use]
    pub fn is_any(&self) -> bool {
        self.clauses.is_empty()
    }

    /// Returns the original spelling.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Splits a clause into operator and operand.
fn split_operator(text: &str, bare: Operator) -> (Operator, &str) {
    const OPERATORS: [(&str, Operator); 11] = [
        ("===", Operator::Exact),
        ("==", Operator::Exact),
        ("!=", Operator::NotEqual),
        (">=", Operator::GreaterEq),
        ("<=", Operator::LessEq),
        ("~=", Operator::Compatible),
        (">", Operator::Greater),
        ("<", Operator::Less),
        ("^", Operator::Caret),
        ("~", Operator::Tilde),
        ("=", Operator::Exact),
    ];
    for (token, op) in OPERATORS {
        if let Some(rest) = text.strip_prefix(token) {
            return (op, rest);
        }
    }
    (bare, text)
}

impl PartialEq for VersionReq {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for VersionReq {}

impl fmt::Display for VersionReq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

impl Serialize for VersionReq {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionReq {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
