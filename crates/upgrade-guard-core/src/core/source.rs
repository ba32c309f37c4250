// crates/upgrade-guard-core/src/core/source.rs
// ============================================================================
// Module: Upgrade Guard Source Inputs
// Description: Canonical package records, issues, and per-source inputs.
// Purpose: Define the single shape every heterogeneous feed normalizes into.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Each collaborator feed (preflight, update bot, vulnerability feed, SBOM,
//! metadata snapshot, contract) becomes one [`SourceInput`] per run, even
//! when the feed was absent or unreadable. Availability is an explicit
//! tri-state [`SourceState`]; consumers branch on it rather than on errors.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::hashing::HashDigest;
use crate::core::identifiers::PackageName;
use crate::core::severity::Severity;
use crate::core::version::Version;
use crate::core::version::VersionReq;

// ============================================================================
// SECTION: Source Identity
// ============================================================================

/// Feed a [`SourceInput`] came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Wheel/binary availability preflight report.
    Preflight,
    /// Update-bot advice (Renovate-style).
    UpdateBot,
    /// Vulnerability feed export.
    VulnerabilityFeed,
    /// Software bill of materials.
    Sbom,
    /// Package index metadata snapshot.
    Metadata,
    /// Contract policy document.
    Contract,
}

impl SourceKind {
    /// Every source kind, in canonical order.
    pub const ALL: [Self; 6] = [
        Self::Preflight,
        Self::UpdateBot,
        Self::VulnerabilityFeed,
        Self::Sbom,
        Self::Metadata,
        Self::Contract,
    ];

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Preflight => "preflight",
            Self::UpdateBot => "update_bot",
            Self::VulnerabilityFeed => "vulnerability_feed",
            Self::Sbom => "sbom",
            Self::Metadata => "metadata",
            Self::Contract => "contract",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability of a source for this run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceState {
    /// Payload was read and validated.
    Ok,
    /// Payload was absent or could not be fetched in time.
    Missing,
    /// Payload was present but failed validation.
    Error,
}

impl SourceState {
    /// Returns the snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Missing => "missing",
            Self::Error => "error",
        }
    }
}

// ============================================================================
// SECTION: Issues
// ============================================================================

/// Category of a package issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IssueKind {
    /// Known vulnerability in the resolved version.
    Vulnerability,
    /// No binary artifact for one or more target platforms.
    MissingBinary,
    /// Upgrade path crosses a breaking change.
    BreakingChange,
}

impl IssueKind {
    /// Parses the labels emitted by the supported feeds.
    #[must_use]
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "vulnerability" | "cve" | "advisory" | "security" => Some(Self::Vulnerability),
            "missing-binary" | "missing-wheel" | "binary" | "wheel" => Some(Self::MissingBinary),
            "breaking-change" | "breaking" => Some(Self::BreakingChange),
            _ => None,
        }
    }

    /// Returns the serialized label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Vulnerability => "vulnerability",
            Self::MissingBinary => "missing-binary",
            Self::BreakingChange => "breaking-change",
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A finding reported against one package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Issue category.
    pub kind: IssueKind,
    /// Stable identifier (CVE id, advisory id, synthesized key).
    pub id: String,
    /// Reported severity.
    pub severity: Severity,
    /// Human-readable summary.
    pub summary: String,
}

// ============================================================================
// SECTION: Package Records
// ============================================================================

/// Artifact signature evidence attached by preflight or SBOM tooling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureEvidence {
    /// True when the signature verified.
    #[serde(default)]
    pub verified: bool,
    /// Publisher identity bound to the signature.
    #[serde(default)]
    pub publisher: Option<String>,
}

/// One package as reported by a feed.
///
/// # Invariants
/// - `name` is canonical and unique within a [`SourceInput`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageRecord {
    /// Canonical package name.
    pub name: PackageName,
    /// Currently resolved version.
    pub current: Version,
    /// Candidate version suggested by the feed.
    pub candidate: Option<Version>,
    /// Ecosystem tag (`pypi`, `npm`, ...).
    pub ecosystem: String,
    /// False marks a transitive dependency.
    #[serde(default)]
    pub direct: Option<bool>,
    /// Declared version constraint, when the feed knows it.
    #[serde(default)]
    pub constraint: Option<VersionReq>,
    /// Signature evidence, when the feed knows it.
    #[serde(default)]
    pub signature: Option<SignatureEvidence>,
}

impl PackageRecord {
    /// Creates a record with no candidate and no optional evidence.
    #[must_use]
    pub fn new(name: impl Into<PackageName>, current: Version, ecosystem: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            current,
            candidate: None,
            ecosystem: ecosystem.into(),
            direct: None,
            constraint: None,
            signature: None,
        }
    }

    /// Returns true when the record is known to be transitive.
    #[must_use]
    pub fn is_transitive(&self) -> bool {
        self.direct == Some(false)
    }
}

/// A package record with the issues one source reported for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageEntry {
    /// Package record.
    pub record: PackageRecord,
    /// Issues reported by the source.
    #[serde(default)]
    pub issues: Vec<Issue>,
}

// ============================================================================
// SECTION: Source Input
// ============================================================================

/// Normalized output of one feed for one run.
///
/// # Invariants
/// - `packages` is empty unless `state` is [`SourceState::Ok`].
/// - `diagnostic` is set whenever `state` is not [`SourceState::Ok`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceInput {
    /// Feed identity.
    pub source: SourceKind,
    /// Availability state.
    pub state: SourceState,
    /// Time the feed says it was generated.
    #[serde(default, with = "crate::core::time::rfc3339_option")]
    pub generated_at: Option<OffsetDateTime>,
    /// Normalized package entries, sorted by name.
    #[serde(default)]
    pub packages: Vec<PackageEntry>,
    /// Where the raw payload was read from.
    #[serde(default)]
    pub raw_path: Option<String>,
    /// Digest of the raw payload bytes.
    #[serde(default)]
    pub digest: Option<HashDigest>,
    /// Reason the source is missing or errored.
    #[serde(default)]
    pub diagnostic: Option<String>,
    /// Entries dropped during normalization.
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl SourceInput {
    /// Creates an empty, available input.
    #[must_use]
    pub const fn ok(source: SourceKind, raw_path: Option<String>) -> Self {
        Self {
            source,
            state: SourceState::Ok,
            generated_at: None,
            packages: Vec::new(),
            raw_path,
            digest: None,
            diagnostic: None,
            warnings: Vec::new(),
        }
    }

    /// Creates a missing input with the reason it is missing.
    #[must_use]
    pub fn missing(source: SourceKind, raw_path: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            state: SourceState::Missing,
            diagnostic: Some(reason.into()),
            ..Self::ok(source, raw_path)
        }
    }

    /// Creates an errored input with a validation diagnostic.
    #[must_use]
    pub fn error(source: SourceKind, raw_path: Option<String>, diagnostic: impl Into<String>) -> Self {
        Self {
            state: SourceState::Error,
            diagnostic: Some(diagnostic.into()),
            ..Self::ok(source, raw_path)
        }
    }

    /// Returns true when the payload was read and validated.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.state == SourceState::Ok
    }
}
