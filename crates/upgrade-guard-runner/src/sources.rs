// crates/upgrade-guard-runner/src/sources.rs
// ============================================================================
// Module: Source Collection
// Description: Concurrent, time-bounded fetching of raw source payloads.
// Purpose: Turn configured source files into normalized inputs.
// Dependencies: upgrade-guard-core, upgrade-guard-config, tokio
// ============================================================================

//! ## Overview
//! Every configured source is read on the blocking pool under its own
//! timeout, all sources at once. A source that is unconfigured or absent is
//! `missing`; one whose read fails, times out, or exceeds the size limit is
//! `missing` with the reason as its diagnostic. No fetch failure aborts the
//! run. The contract is loaded through the configuration crate so that a
//! malformed policy still fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::HashMap;
use std::fs::File;
use std::io;
use std::io::ErrorKind;
use std::io::Read;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;

use tokio::task::Id;
use tokio::task::JoinSet;
use upgrade_guard_config::ConfigError;
use upgrade_guard_config::ContractLoad;
use upgrade_guard_config::SourcesConfig;
use upgrade_guard_config::load_contract;
use upgrade_guard_core::ContractPolicy;
use upgrade_guard_core::SourceInput;
use upgrade_guard_core::SourceKind;
use upgrade_guard_core::runtime::NormalizedSources;
use upgrade_guard_core::runtime::RawBody;
use upgrade_guard_core::runtime::RawSource;
use upgrade_guard_core::runtime::normalize_all;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Source kinds parsed by the normalizer.
pub const FEED_KINDS: [SourceKind; 5] = [
    SourceKind::Preflight,
    SourceKind::UpdateBot,
    SourceKind::VulnerabilityFeed,
    SourceKind::Sbom,
    SourceKind::Metadata,
];

// ============================================================================
// SECTION: Types
// ============================================================================

/// Sources gathered for one run.
#[derive(Debug, Clone)]
pub struct CollectedSources {
    /// Normalized inputs, contract included, sorted by kind.
    pub normalized: NormalizedSources,
    /// Contract policy in force.
    pub policy: ContractPolicy,
    /// Raw payload bytes by kind, for snapshotting.
    pub raw: BTreeMap<SourceKind, Vec<u8>>,
}

// ============================================================================
// SECTION: Collection
// ============================================================================

/// Fetches and normalizes every configured source.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] when the contract file reads but is not a
/// valid policy.
pub async fn collect_sources(config: &SourcesConfig) -> Result<CollectedSources, ConfigError> {
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut tasks = JoinSet::new();
    let mut spawned = HashMap::with_capacity(FEED_KINDS.len());
    for kind in FEED_KINDS {
        let path = config.path_for(kind);
        let raw_path = path.as_ref().map(|path| path.display().to_string());
        let handle = tasks.spawn(fetch_source(kind, path, timeout, config.max_bytes));
        spawned.insert(handle.id(), (kind, raw_path));
    }
    let contract = fetch_contract(config.path_for(SourceKind::Contract), timeout).await?;

    let raws = join_fetches(tasks, spawned).await;
    let mut raw: BTreeMap<SourceKind, Vec<u8>> = raws
        .iter()
        .filter_map(|source| match &source.body {
            RawBody::Present(bytes) => Some((source.kind, bytes.clone())),
            RawBody::Absent | RawBody::Unavailable(_) => None,
        })
        .collect();
    if let Some(bytes) = contract.raw {
        raw.insert(SourceKind::Contract, bytes);
    }

    let mut normalized = normalize_all(raws, &FEED_KINDS);
    normalized.sources.push(contract.source);
    normalized.sources.sort_by_key(|input| input.source);
    Ok(CollectedSources {
        normalized,
        policy: contract.policy,
        raw,
    })
}

/// Drains the fetch tasks. A task that panicked or was cancelled leaves its
/// source unavailable with the failure as diagnostic.
async fn join_fetches(
    mut tasks: JoinSet<RawSource>,
    mut spawned: HashMap<Id, (SourceKind, Option<String>)>,
) -> Vec<RawSource> {
    let mut raws = Vec::with_capacity(spawned.len());
    while let Some(joined) = tasks.join_next_with_id().await {
        match joined {
            Ok((id, raw)) => {
                spawned.remove(&id);
                raws.push(raw);
            }
            Err(err) => {
                if let Some((kind, raw_path)) = spawned.remove(&err.id()) {
                    raws.push(RawSource::unavailable(kind, raw_path, format!("fetch task failed: {err}")));
                }
            }
        }
    }
    raws
}

/// Fetches one feed payload under a timeout.
async fn fetch_source(
    kind: SourceKind,
    path: Option<PathBuf>,
    timeout: Duration,
    max_bytes: usize,
) -> RawSource {
    let Some(path) = path else {
        return RawSource::absent(kind, None);
    };
    let raw_path = Some(path.display().to_string());
    let read = tokio::task::spawn_blocking(move || read_limited(&path, max_bytes));
    match tokio::time::timeout(timeout, read).await {
        Err(_) => RawSource::unavailable(kind, raw_path, timeout_reason(timeout)),
        Ok(Err(err)) => RawSource::unavailable(kind, raw_path, format!("fetch task failed: {err}")),
        Ok(Ok(Ok(bytes))) => RawSource::present(kind, raw_path, bytes),
        Ok(Ok(Err(err))) if err.kind() == ErrorKind::NotFound => RawSource::absent(kind, raw_path),
        Ok(Ok(Err(err))) => RawSource::unavailable(kind, raw_path, format!("fetch failed: {err}")),
    }
}

/// Loads the contract policy under a timeout.
async fn fetch_contract(path: Option<PathBuf>, timeout: Duration) -> Result<ContractLoad, ConfigError> {
    let raw_path = path.as_ref().map(|path| path.display().to_string());
    let load = tokio::task::spawn_blocking(move || load_contract(path.as_deref()));
    let reason = match tokio::time::timeout(timeout, load).await {
        Ok(Ok(result)) => return result,
        Ok(Err(err)) => format!("fetch task failed: {err}"),
        Err(_) => timeout_reason(timeout),
    };
    Ok(ContractLoad {
        source: SourceInput::missing(SourceKind::Contract, raw_path, reason),
        policy: ContractPolicy::default(),
        raw: None,
    })
}

/// Reads a file, refusing payloads over `max_bytes`.
fn read_limited(path: &Path, max_bytes: usize) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if file.metadata()?.len() > limit {
        return Err(oversized(max_bytes));
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(oversized(max_bytes));
    }
    Ok(bytes)
}

/// Error for a payload over the size limit.
fn oversized(max_bytes: usize) -> io::Error {
    io::Error::new(ErrorKind::InvalidData, format!("payload exceeds size limit of {max_bytes} bytes"))
}

/// Diagnostic for a fetch that did not finish in time.
fn timeout_reason(timeout: Duration) -> String {
    format!("fetch timed out after {} ms", timeout.as_millis())
}

// ============================================================================
// SECTION: Tests
// ============================================================================
