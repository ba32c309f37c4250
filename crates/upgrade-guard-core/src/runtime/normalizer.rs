// crates/upgrade-guard-core/src/runtime/normalizer.rs
// ============================================================================
// Module: Upgrade Guard Input Normalizer
// Description: Converts raw collaborator payloads into canonical source inputs.
// Purpose: Fuse heterogeneous feeds without ever dropping or raising on one.
// Dependencies: crate::core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Every raw payload is parsed into a [`SourcePayload`] variant and handed to
//! the normalization function for that variant. An absent payload becomes a
//! `missing` input, a payload that fails to parse becomes an `error` input
//! with a diagnostic, and individual bad entries become warnings on an
//! otherwise `ok` input. Nothing here returns an error to the caller.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use thiserror::Error;
use time::OffsetDateTime;

use crate::core::HashDigest;
use crate::core::Issue;
use crate::core::IssueKind;
use crate::core::MetadataEntry;
use crate::core::MetadataIndex;
use crate::core::PackageEntry;
use crate::core::PackageName;
use crate::core::PackageRecord;
use crate::core::PopularityScore;
use crate::core::Severity;
use crate::core::SourceInput;
use crate::core::SourceKind;
use crate::core::SourceState;
use crate::core::Version;
use crate::core::VersionChange;
use crate::core::VersionReq;
use crate::core::payloads::MetadataSnapshot;
use crate::core::payloads::PreflightPackage;
use crate::core::payloads::PreflightReport;
use crate::core::payloads::RawIssue;
use crate::core::payloads::SbomDocument;
use crate::core::payloads::UpdateBotReport;
use crate::core::payloads::VulnerabilityFeed;
use crate::core::time::parse_timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Ecosystem assumed when a feed does not name one.
pub const DEFAULT_ECOSYSTEM: &str = "pypi";

/// Preflight statuses meaning the binary artifact is unavailable.
const FAILED_STATUSES: [&str; 4] = ["error", "fail", "failure", "blocked"];

/// Preflight statuses meaning the binary artifact is degraded.
const DEGRADED_STATUSES: [&str; 5] = ["warn", "warning", "allowlisted", "sdist", "degraded"];

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Payload parsing errors. These never escape [`normalize_source`]; they
/// become the diagnostic of an `error` input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NormalizeError {
    /// Payload does not match the schema for its source.
    #[error("malformed {kind} payload: {message}")]
    Malformed {
        /// Source kind.
        kind: SourceKind,
        /// Parser message.
        message: String,
    },
    /// Source kind is loaded outside the normalizer.
    #[error("{0} payloads are loaded by the configuration layer")]
    Unsupported(SourceKind),
}

// ============================================================================
// SECTION: Raw Sources
// ============================================================================

/// Body of a raw source as fetched by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawBody {
    /// Nothing was configured or found.
    Absent,
    /// The fetch failed or timed out.
    Unavailable(String),
    /// Payload bytes.
    Present(Vec<u8>),
}

/// One raw source payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawSource {
    /// Source kind.
    pub kind: SourceKind,
    /// Location the payload was read from.
    pub raw_path: Option<String>,
    /// Payload body.
    pub body: RawBody,
}

impl RawSource {
    /// Creates a present source.
    #[must_use]
    pub fn present(kind: SourceKind, raw_path: Option<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            kind,
            raw_path,
            body: RawBody::Present(bytes.into()),
        }
    }

    /// Creates an absent source.
    #[must_use]
    pub const fn absent(kind: SourceKind, raw_path: Option<String>) -> Self {
        Self {
            kind,
            raw_path,
            body: RawBody::Absent,
        }
    }

    /// Creates a source whose fetch failed.
    #[must_use]
    pub fn unavailable(kind: SourceKind, raw_path: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            kind,
            raw_path,
            body: RawBody::Unavailable(reason.into()),
        }
    }
}

// ============================================================================
// SECTION: Payload Variants
// ============================================================================

/// Parsed payload, one variant per collaborator feed.
#[derive(Debug, Clone, PartialEq)]
pub enum SourcePayload {
    /// Preflight wheel availability report.
    Preflight(PreflightReport),
    /// Update-bot pending updates.
    UpdateBot(UpdateBotReport),
    /// Vulnerability feed export.
    VulnerabilityFeed(VulnerabilityFeed),
    /// Software bill of materials.
    Sbom(SbomDocument),
    /// Package index snapshot.
    Metadata(MetadataSnapshot),
}

impl SourcePayload {
    /// Parses JSON bytes as the payload for `kind`.
    ///
    /// # Errors
    ///
    /// Returns [`NormalizeError::Malformed`] when the bytes do not match the
    /// schema and [`NormalizeError::Unsupported`] for contract payloads.
    pub fn parse(kind: SourceKind, bytes: &[u8]) -> Result<Self, NormalizeError> {
        let malformed = |err: serde_json::Error| NormalizeError::Malformed {
            kind,
            message: err.to_string(),
        };
        match kind {
            SourceKind::Preflight => serde_json::from_slice(bytes).map(Self::Preflight).map_err(malformed),
            SourceKind::UpdateBot => serde_json::from_slice(bytes).map(Self::UpdateBot).map_err(malformed),
            SourceKind::VulnerabilityFeed => {
                serde_json::from_slice(bytes).map(Self::VulnerabilityFeed).map_err(malformed)
            }
            SourceKind::Sbom => serde_json::from_slice(bytes).map(Self::Sbom).map_err(malformed),
            SourceKind::Metadata => serde_json::from_slice(bytes).map(Self::Metadata).map_err(malformed),
            SourceKind::Contract => Err(NormalizeError::Unsupported(kind)),
        }
    }

    /// Returns the source kind of the payload.
    #[must_use]
    pub const fn kind(&self) -> SourceKind {
        match self {
            Self::Preflight(_) => SourceKind::Preflight,
            Self::UpdateBot(_) => SourceKind::UpdateBot,
            Self::VulnerabilityFeed(_) => SourceKind::VulnerabilityFeed,
            Self::Sbom(_) => SourceKind::Sbom,
            Self::Metadata(_) => SourceKind::Metadata,
        }
    }
}

// ============================================================================
// SECTION: Normalized Output
// ============================================================================

/// Normalization result for one payload.
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// Canonical source input.
    pub input: SourceInput,
    /// Metadata index, for metadata payloads.
    pub metadata: Option<MetadataIndex>,
}

/// Normalization result for a whole run.
///
/// # Invariants
/// - `sources` holds one input per raw source plus one `missing` input per
///   expected kind that was not supplied, sorted by kind.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedSources {
    /// Canonical source inputs.
    pub sources: Vec<SourceInput>,
    /// Metadata index (empty when the metadata source was not usable).
    pub metadata: MetadataIndex,
}

/// Normalizes one raw source. Never fails.
#[must_use]
pub fn normalize_source(raw: RawSource) -> Normalized {
    let RawSource {
        kind,
        raw_path,
        body,
    } = raw;
    let bytes = match body {
        RawBody::Absent => {
            return Normalized {
                input: SourceInput::missing(kind, raw_path, "source not provided"),
                metadata: None,
            };
        }
        RawBody::Unavailable(reason) => {
            return Normalized {
                input: SourceInput::missing(kind, raw_path, reason),
                metadata: None,
            };
        }
        RawBody::Present(bytes) => bytes,
    };
    let digest = HashDigest::of_bytes(&bytes);
    let mut normalized = match SourcePayload::parse(kind, &bytes) {
        Ok(payload) => normalize_payload(payload, raw_path),
        Err(err) => Normalized {
            input: SourceInput::error(kind, raw_path, err.to_string()),
            metadata: None,
        },
    };
    normalized.input.digest = Some(digest);
    normalized
}

/// Normalizes a parsed payload.
#[must_use]
pub fn normalize_payload(payload: SourcePayload, raw_path: Option<String>) -> Normalized {
    match payload {
        SourcePayload::Preflight(report) => Normalized {
            input: normalize_preflight(report, raw_path),
            metadata: None,
        },
        SourcePayload::UpdateBot(report) => Normalized {
            input: normalize_update_bot(report, raw_path),
            metadata: None,
        },
        SourcePayload::VulnerabilityFeed(feed) => Normalized {
            input: normalize_vulnerability_feed(feed, raw_path),
            metadata: None,
        },
        SourcePayload::Sbom(document) => Normalized {
            input: normalize_sbom(document, raw_path),
            metadata: None,
        },
        SourcePayload::Metadata(snapshot) => {
            let (input, index) = normalize_metadata(snapshot, raw_path);
            Normalized {
                input,
                metadata: Some(index),
            }
        }
    }
}

/// Normalizes every raw source and adds `missing` inputs for expected kinds
/// that were not supplied.
#[must_use]
pub fn normalize_all(raws: Vec<RawSource>, expected: &[SourceKind]) -> NormalizedSources {
    let mut sources = Vec::with_capacity(raws.len().max(expected.len()));
    let mut metadata: Option<MetadataIndex> = None;
    for raw in raws {
        let normalized = normalize_source(raw);
        if metadata.is_none() {
            metadata = normalized.metadata;
        }
        sources.push(normalized.input);
    }
    for kind in expected {
        if !sources.iter().any(|input| input.source == *kind) {
            sources.push(SourceInput::missing(*kind, None, "source not provided"));
        }
    }
    sources.sort_by_key(|input| input.source);
    NormalizedSources {
        sources,
        metadata: metadata.unwrap_or_default(),
    }
}

// ============================================================================
// SECTION: Per-Variant Normalization
// ============================================================================

/// Normalizes a preflight report.
fn normalize_preflight(report: PreflightReport, raw_path: Option<String>) -> SourceInput {
    let mut input = SourceInput::ok(SourceKind::Preflight, raw_path);
    input.generated_at = read_timestamp(report.generated_at.as_deref(), &mut input.warnings);
    match report.state.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref() {
        Some("missing") => {
            input.state = SourceState::Missing;
            input.diagnostic = Some("preflight producer reported missing state".to_string());
            return input;
        }
        Some("error") => {
            input.state = SourceState::Error;
            input.diagnostic = Some("preflight producer reported error state".to_string());
            return input;
        }
        _ => {}
    }
    let mut collector = EntryCollector::default();
    for package in report.packages {
        if let Some(entry) = preflight_entry(package, &mut input.warnings) {
            collector.add(entry);
        }
    }
    input.packages = collector.finish();
    input
}

/// Converts one preflight package, synthesizing a missing-binary issue from
/// its availability status.
fn preflight_entry(package: PreflightPackage, warnings: &mut Vec<String>) -> Option<PackageEntry> {
    let mut record = package_record(&package.name, &package.version, package.ecosystem.as_deref(), warnings)?;
    record.candidate = optional_version(package.candidate.as_deref(), &record.name, warnings);
    record.direct = package.direct;
    record.signature = package.signature;
    if let Some(raw) = package.constraint.as_deref().map(str::trim).filter(|raw| !raw.is_empty()) {
        match VersionReq::parse(raw) {
            Ok(constraint) => record.constraint = Some(constraint),
            Err(err) => warnings.push(format!("{}: {err}", record.name)),
        }
    }
    let mut issues: Vec<Issue> = package
        .issues
        .iter()
        .filter_map(|issue| raw_issue(issue, &record.name, warnings))
        .collect();
    let status = package.status.as_deref().map(str::trim).map(str::to_ascii_lowercase);
    let has_binary_issue = issues.iter().any(|issue| issue.kind == IssueKind::MissingBinary);
    let failed = status.as_deref().is_some_and(|status| FAILED_STATUSES.contains(&status));
    if !has_binary_issue && (failed || !package.missing_targets.is_empty()) {
        let summary = if package.missing_targets.is_empty() {
            format!("missing binary wheel (status={})", status.as_deref().unwrap_or("error"))
        } else {
            format!("missing binary wheel for {}", package.missing_targets.join(", "))
        };
        issues.push(Issue {
            kind: IssueKind::MissingBinary,
            id: format!("missing-binary-{}", record.name),
            severity: Severity::High,
            summary,
        });
    } else if !has_binary_issue
        && let Some(status) = status.as_deref().filter(|status| DEGRADED_STATUSES.contains(status))
    {
        issues.push(Issue {
            kind: IssueKind::MissingBinary,
            id: format!("degraded-binary-{}", record.name),
            severity: Severity::Medium,
            summary: format!("binary wheel degraded (status={status})"),
        });
    }
    Some(PackageEntry {
        record,
        issues,
    })
}

/// Normalizes an update-bot export.
fn normalize_update_bot(report: UpdateBotReport, raw_path: Option<String>) -> SourceInput {
    let mut input = SourceInput::ok(SourceKind::UpdateBot, raw_path);
    input.generated_at = read_timestamp(report.generated_at.as_deref(), &mut input.warnings);
    let mut collector = EntryCollector::default();
    for update in report.updates {
        let Some(mut record) = package_record(
            &update.package,
            &update.current_version,
            update.ecosystem.as_deref(),
            &mut input.warnings,
        ) else {
            continue;
        };
        let Some(target) = optional_version(Some(update.new_version.as_str()), &record.name, &mut input.warnings)
        else {
            continue;
        };
        let change = match update.update_type.as_deref().map(str::trim).map(str::to_ascii_lowercase).as_deref() {
            Some("major") => VersionChange::Major,
            Some("minor") => VersionChange::Minor,
            Some("patch") => VersionChange::Patch,
            _ => record.current.change_to(&target),
        };
        let mut issues = Vec::new();
        if change == VersionChange::Major || update.breaking {
            let summary = if change == VersionChange::Major {
                format!("major upgrade candidate ({} -> {target})", record.current)
            } else {
                format!("breaking change announced ({} -> {target})", record.current)
            };
            issues.push(Issue {
                kind: IssueKind::BreakingChange,
                id: format!("breaking-{}-{target}", record.name),
                severity: Severity::High,
                summary,
            });
        }
        record.candidate = Some(target);
        collector.add(PackageEntry {
            record,
            issues,
        });
    }
    input.packages = collector.finish();
    input
}

/// Normalizes a vulnerability feed; fixed versions become candidates.
fn normalize_vulnerability_feed(feed: VulnerabilityFeed, raw_path: Option<String>) -> SourceInput {
    let mut input = SourceInput::ok(SourceKind::VulnerabilityFeed, raw_path);
    input.generated_at = read_timestamp(feed.generated_at.as_deref(), &mut input.warnings);
    let mut collector = EntryCollector::default();
    for finding in feed.vulnerabilities {
        let Some(mut record) = package_record(
            &finding.package,
            &finding.installed_version,
            finding.ecosystem.as_deref(),
            &mut input.warnings,
        ) else {
            continue;
        };
        record.candidate = optional_version(finding.fixed_version.as_deref(), &record.name, &mut input.warnings);
        let severity = issue_severity(finding.severity.as_deref(), &record.name, &mut input.warnings);
        let id = if finding.id.trim().is_empty() {
            format!("vulnerability-{}", record.name)
        } else {
            finding.id.trim().to_string()
        };
        let summary = finding.summary.unwrap_or_else(|| format!("{id} affects {}", record.name));
        collector.add(PackageEntry {
            record,
            issues: vec![Issue {
                kind: IssueKind::Vulnerability,
                id,
                severity,
                summary,
            }],
        });
    }
    input.packages = collector.finish();
    input
}

/// Normalizes a `CycloneDX` SBOM subset.
fn normalize_sbom(document: SbomDocument, raw_path: Option<String>) -> SourceInput {
    let mut input = SourceInput::ok(SourceKind::Sbom, raw_path);
    let timestamp = document.metadata.and_then(|metadata| metadata.timestamp);
    input.generated_at = read_timestamp(timestamp.as_deref(), &mut input.warnings);
    let mut collector = EntryCollector::default();
    for component in document.components {
        let ecosystem = component.purl.as_deref().and_then(purl_ecosystem);
        let Some(mut record) =
            package_record(&component.name, &component.version, ecosystem.as_deref(), &mut input.warnings)
        else {
            continue;
        };
        record.direct = component
            .scope
            .as_deref()
            .map(|scope| !scope.trim().eq_ignore_ascii_case("optional"));
        record.signature = component.signature;
        collector.add(PackageEntry {
            record,
            issues: Vec::new(),
        });
    }
    input.packages = collector.finish();
    input
}

/// Normalizes a metadata snapshot into an index. The source input itself
/// carries no packages; the index is returned separately.
fn normalize_metadata(snapshot: MetadataSnapshot, raw_path: Option<String>) -> (SourceInput, MetadataIndex) {
    let mut input = SourceInput::ok(SourceKind::Metadata, raw_path);
    input.generated_at = read_timestamp(snapshot.generated_at.as_deref(), &mut input.warnings);
    let mut packages = BTreeMap::new();
    for (raw_name, raw) in snapshot.packages {
        let name = PackageName::new(&raw_name);
        if name.is_empty() {
            input.warnings.push("metadata entry without a package name".to_string());
            continue;
        }
        let warnings = &mut input.warnings;
        let entry = MetadataEntry {
            latest: optional_version(raw.latest.as_deref(), &name, warnings),
            stable: optional_version(raw.stable.as_deref(), &name, warnings),
            versions: raw
                .versions
                .iter()
                .filter_map(|version| optional_version(Some(version.as_str()), &name, warnings))
                .collect(),
            released_at: read_timestamp(raw.released_at.as_deref(), warnings),
            popularity: raw.popularity.map(PopularityScore::new),
            has_test_coverage: raw.has_test_coverage,
            dependency_count: raw.dependency_count,
            requires: raw.requires.iter().map(PackageName::new).filter(|dep| !dep.is_empty()).collect(),
            breaking_releases: raw
                .breaking_releases
                .iter()
                .filter_map(|version| optional_version(Some(version.as_str()), &name, warnings))
                .collect(),
        };
        packages.insert(name, entry);
    }
    let index = MetadataIndex {
        generated_at: input.generated_at,
        packages,
    };
    (input, index)
}

// ============================================================================
// SECTION: Cross-Source Merge
// ============================================================================

/// One package merged across every usable source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergedPackage {
    /// Merged record.
    pub record: PackageRecord,
    /// Issues tagged with the source that reported them.
    pub issues: Vec<(SourceKind, Issue)>,
    /// Sources that mentioned the package, in priority order.
    pub sources: Vec<SourceKind>,
}

/// Source priority for resolved-version attribution (lower wins).
const fn source_priority(kind: SourceKind) -> u8 {
    match kind {
        SourceKind::Sbom => 0,
        SourceKind::Preflight => 1,
        SourceKind::UpdateBot => 2,
        SourceKind::VulnerabilityFeed => 3,
        SourceKind::Metadata => 4,
        SourceKind::Contract => 5,
    }
}

/// Merges the packages of every `ok` source by canonical name.
///
/// The resolved version, ecosystem, signature and dependency flags come from
/// the highest-priority source that reports them (SBOM, then preflight, then
/// update bot, then vulnerability feed). The candidate is the highest
/// candidate reported by any source.
#[must_use]
pub fn merge_packages(sources: &[SourceInput]) -> BTreeMap<PackageName, MergedPackage> {
    let mut ordered: Vec<&SourceInput> = sources.iter().filter(|input| input.is_ok()).collect();
    ordered.sort_by_key(|input| source_priority(input.source));
    let mut merged: BTreeMap<PackageName, MergedPackage> = BTreeMap::new();
    for input in ordered {
        for entry in &input.packages {
            let tagged = entry.issues.iter().cloned().map(|issue| (input.source, issue));
            match merged.get_mut(&entry.record.name) {
                Some(existing) => {
                    let record = &mut existing.record;
                    if let Some(candidate) = &entry.record.candidate
                        && record.candidate.as_ref().is_none_or(|current| candidate > current)
                    {
                        record.candidate = Some(candidate.clone());
                    }
                    if record.direct.is_none() {
                        record.direct = entry.record.direct;
                    }
                    if record.constraint.is_none() {
                        record.constraint.clone_from(&entry.record.constraint);
                    }
                    if record.signature.is_none() {
                        record.signature.clone_from(&entry.record.signature);
                    }
                    existing.issues.extend(tagged);
                    if !existing.sources.contains(&input.source) {
                        existing.sources.push(input.source);
                    }
                }
                None => {
                    merged.insert(
                        entry.record.name.clone(),
                        MergedPackage {
                            record: entry.record.clone(),
                            issues: tagged.collect(),
                            sources: vec![input.source],
                        },
                    );
                }
            }
        }
    }
    merged
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Merges entries for the same package within one source.
#[derive(Debug, Default)]
struct EntryCollector {
    /// Entries keyed by canonical name.
    entries: BTreeMap<PackageName, PackageEntry>,
}

impl EntryCollector {
    /// Adds an entry, merging issues and keeping the highest candidate.
    fn add(&mut self, entry: PackageEntry) {
        match self.entries.get_mut(&entry.record.name) {
            Some(existing) => {
                if let Some(candidate) = entry.record.candidate
                    && existing.record.candidate.as_ref().is_none_or(|current| &candidate > current)
                {
                    existing.record.candidate = Some(candidate);
                }
                existing.issues.extend(entry.issues);
            }
            None => {
                self.entries.insert(entry.record.name.clone(), entry);
            }
        }
    }

    /// Returns the entries sorted by name.
    fn finish(self) -> Vec<PackageEntry> {
        self.entries.into_values().collect()
    }
}

/// Builds a record from a name and version, warning on bad values.
fn package_record(
    name: &str,
    version: &str,
    ecosystem: Option<&str>,
    warnings: &mut Vec<String>,
) -> Option<PackageRecord> {
    let name = PackageName::new(name);
    if name.is_empty() {
        warnings.push("entry without a package name skipped".to_string());
        return None;
    }
    let current = match Version::parse(version) {
        Ok(current) => current,
        Err(err) => {
            warnings.push(format!("{name}: {err}; entry skipped"));
            return None;
        }
    };
    let ecosystem = ecosystem
        .map(str::trim)
        .filter(|ecosystem| !ecosystem.is_empty())
        .map_or_else(|| DEFAULT_ECOSYSTEM.to_string(), str::to_ascii_lowercase);
    Some(PackageRecord::new(name, current, ecosystem))
}

/// Parses an optional version, warning when it is present but invalid.
fn optional_version(raw: Option<&str>, name: &PackageName, warnings: &mut Vec<String>) -> Option<Version> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    match Version::parse(raw) {
        Ok(version) => Some(version),
        Err(err) => {
            warnings.push(format!("{name}: {err}"));
            None
        }
    }
}

/// Converts a reported issue; unknown kinds are skipped with a warning.
fn raw_issue(issue: &RawIssue, name: &PackageName, warnings: &mut Vec<String>) -> Option<Issue> {
    let Some(kind) = IssueKind::parse_label(&issue.kind) else {
        warnings.push(format!("{name}: unknown issue kind `{}` skipped", issue.kind));
        return None;
    };
    let severity = issue_severity(issue.severity.as_deref(), name, warnings);
    let id = issue
        .id
        .as_deref()
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map_or_else(|| format!("{kind}-{name}"), str::to_string);
    let summary = issue.summary.clone().unwrap_or_else(|| format!("{kind} reported for {name}"));
    Some(Issue {
        kind,
        id,
        severity,
        summary,
    })
}

/// Reads a severity label; missing or unrecognized labels are medium.
fn issue_severity(label: Option<&str>, name: &PackageName, warnings: &mut Vec<String>) -> Severity {
    let Some(label) = label.map(str::trim).filter(|label| !label.is_empty()) else {
        return Severity::Medium;
    };
    Severity::parse_label(label).unwrap_or_else(|| {
        warnings.push(format!("{name}: unknown severity `{label}` treated as medium"));
        Severity::Medium
    })
}

/// Reads an optional timestamp, warning when it is present but invalid.
fn read_timestamp(raw: Option<&str>, warnings: &mut Vec<String>) -> Option<OffsetDateTime> {
    let raw = raw.map(str::trim).filter(|raw| !raw.is_empty())?;
    let parsed = parse_timestamp(raw);
    if parsed.is_none() {
        warnings.push(format!("unparseable timestamp `{raw}` ignored"));
    }
    parsed
}

/// Extracts the ecosystem from a package URL (`pkg:pypi/name@1.0`).
fn purl_ecosystem(purl: &str) -> Option<String> {
    let rest = purl.trim().strip_prefix("pkg:")?;
    let ecosystem = rest.split('/').next()?.trim();
    (!ecosystem.is_empty()).then(|| ecosystem.to_ascii_lowercase())
}
