// crates/upgrade-guard-core/src/core/payloads.rs
// ============================================================================
// Module: Upgrade Guard Raw Payloads
// Description: Wire schemas of the collaborator reports.
// Purpose: Give every source feed a typed shape before normalization.
// Dependencies: serde, serde_json
// ============================================================================

//! ## Overview
//! These types mirror the JSON emitted by collaborator tools. They are kept
//! permissive at the entry level (versions and severities are plain strings)
//! so that one bad entry becomes a warning instead of failing the source;
//! the document skeleton itself must still match or the source is marked
//! `error`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::core::source::SignatureEvidence;

// ============================================================================
// SECTION: Preflight
// ============================================================================

/// Preflight wheel availability report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightReport {
    /// Producing tool.
    #[serde(default)]
    pub source: Option<String>,
    /// Producer-reported state.
    #[serde(default)]
    pub state: Option<String>,
    /// Report timestamp.
    #[serde(default)]
    pub generated_at: Option<String>,
    /// Checked packages.
    #[serde(default)]
    pub packages: Vec<PreflightPackage>,
}

/// One package in a preflight report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreflightPackage {
    /// Package name.
    pub name: String,
    /// Resolved version.
    pub version: String,
    /// Ecosystem tag.
    #[serde(default)]
    pub ecosystem: Option<String>,
    /// Candidate version.
    #[serde(default)]
    pub candidate: Option<String>,
    /// Direct dependency flag.
    #[serde(default)]
    pub direct: Option<bool>,
    /// Declared version constraint.
    #[serde(default)]
    pub constraint: Option<String>,
    /// Signature evidence.
    #[serde(default)]
    pub signature: Option<SignatureEvidence>,
    /// Availability status (`ok`, `error`, `fail`).
    #[serde(default)]
    pub status: Option<String>,
    /// Platforms lacking a binary artifact.
    #[serde(default)]
    pub missing_targets: Vec<String>,
    /// Reported issues.
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

/// Issue as reported by a collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawIssue {
    /// Issue kind label.
    pub kind: String,
    /// Issue identifier.
    #[serde(default)]
    pub id: Option<String>,
    /// Severity label.
    #[serde(default)]
    pub severity: Option<String>,
    /// Summary line.
    #[serde(default)]
    pub summary: Option<String>,
}

// ============================================================================
// SECTION: Update Bot
// ============================================================================

/// Update-bot pending update export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateBotReport {
    /// Export timestamp.
    #[serde(default, alias = "generatedAt")]
    pub generated_at: Option<String>,
    /// Pending updates.
    #[serde(default)]
    pub updates: Vec<UpdateBotEntry>,
}

/// One pending update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateBotEntry {
    /// Package name.
    #[serde(alias = "depName")]
    pub package: String,
    /// Resolved version.
    #[serde(alias = "currentVersion")]
    pub current_version: String,
    /// Proposed version.
    #[serde(alias = "newVersion")]
    pub new_version: String,
    /// Update type (`major`, `minor`, `patch`).
    #[serde(default, alias = "updateType")]
    pub update_type: Option<String>,
    /// Bot-flagged breaking change.
    #[serde(default)]
    pub breaking: bool,
    /// Ecosystem tag.
    #[serde(default)]
    pub ecosystem: Option<String>,
}

// ============================================================================
// SECTION: Vulnerability Feed
// ============================================================================

/// Vulnerability feed export.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VulnerabilityFeed {
    /// Export timestamp.
    #[serde(default)]
    pub generated_at: Option<String>,
    /// Findings.
    #[serde(default)]
    pub vulnerabilities: Vec<VulnerabilityEntry>,
}

/// One vulnerability finding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VulnerabilityEntry {
    /// Advisory identifier.
    pub id: String,
    /// Affected package.
    pub package: String,
    /// Ecosystem tag.
    #[serde(default)]
    pub ecosystem: Option<String>,
    /// Installed version.
    pub installed_version: String,
    /// First fixed version.
    #[serde(default)]
    pub fixed_version: Option<String>,
    /// Severity label.
    #[serde(default)]
    pub severity: Option<String>,
    /// Summary line.
    #[serde(default)]
    pub summary: Option<String>,
}

// ============================================================================
// SECTION: SBOM
// ============================================================================

/// CycloneDX subset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SbomDocument {
    /// Document metadata.
    #[serde(default)]
    pub metadata: Option<SbomMetadata>,
    /// Components.
    #[serde(default)]
    pub components: Vec<SbomComponent>,
}

/// SBOM metadata block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomMetadata {
    /// Generation timestamp.
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// One SBOM component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SbomComponent {
    /// Component name.
    pub name: String,
    /// Component version.
    pub version: String,
    /// Package URL (`pkg:pypi/requests@2.31.0`).
    #[serde(default)]
    pub purl: Option<String>,
    /// Scope (`required`, `optional`).
    #[serde(default)]
    pub scope: Option<String>,
    /// Signature evidence.
    #[serde(default)]
    pub signature: Option<SignatureEvidence>,
}

// ============================================================================
// SECTION: Metadata Snapshot
// ============================================================================

/// Package index snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshot {
    /// Snapshot timestamp.
    #[serde(default)]
    pub generated_at: Option<String>,
    /// Entries keyed by package name.
    #[serde(default)]
    pub packages: BTreeMap<String, MetadataSnapshotEntry>,
}

/// One index entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataSnapshotEntry {
    /// Latest release.
    #[serde(default)]
    pub latest: Option<String>,
    /// Latest stable release.
    #[serde(default)]
    pub stable: Option<String>,
    /// Known releases.
    #[serde(default)]
    pub versions: Vec<String>,
    /// Release date of the latest release.
    #[serde(default)]
    pub released_at: Option<String>,
    /// Popularity in `[0, 1]`.
    #[serde(default)]
    pub popularity: Option<f64>,
    /// Test coverage signal.
    #[serde(default)]
    pub has_test_coverage: Option<bool>,
    /// Reverse dependency count.
    #[serde(default)]
    pub dependency_count: Option<u32>,
    /// Packages this one depends on.
    #[serde(default)]
    pub requires: Vec<String>,
    /// Releases announcing breaking changes.
    #[serde(default)]
    pub breaking_releases: Vec<String>,
}
