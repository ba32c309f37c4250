// crates/upgrade-guard-runner/src/repositories.rs
// ============================================================================
// Module: Repository Loading
// Description: Concurrent loading of registered repositories' requirements.
// Purpose: Build the repository set for cross-repo conflict resolution.
// Dependencies: upgrade-guard-core, upgrade-guard-config, tokio
// ============================================================================

//! ## Overview
//! Each registered repository's requirements file is read on the blocking
//! pool concurrently. Inline dependencies from configuration override entries
//! read from the file. Results are merged by repository name, so output order
//! does not depend on completion order. An unreadable requirements file
//! leaves the repository with its inline dependencies and a warning.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use tokio::task::JoinSet;
use upgrade_guard_config::RepositoryConfig;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::RepositoryInfo;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Repositories loaded for one run.
#[derive(Debug, Clone, Default)]
pub struct LoadedRepositories {
    /// Repositories sorted by name.
    pub repositories: Vec<RepositoryInfo>,
    /// Per-repository load warnings.
    pub warnings: Vec<String>,
}

// ============================================================================
// SECTION: Loading
// ============================================================================

/// Loads every configured repository.
pub async fn load_repositories(configs: &[RepositoryConfig]) -> LoadedRepositories {
    let mut tasks = JoinSet::new();
    for config in configs.iter().cloned() {
        tasks.spawn_blocking(move || load_one(&config));
    }
    let mut merged: BTreeMap<String, RepositoryInfo> = BTreeMap::new();
    let mut warnings = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((info, warning)) => {
                warnings.extend(warning);
                merged.insert(info.name.clone(), info);
            }
            Err(err) => warnings.push(format!("repository load task failed: {err}")),
        }
    }
    warnings.sort();
    LoadedRepositories {
        repositories: merged.into_values().collect(),
        warnings,
    }
}

/// Loads one repository, returning a warning when its file is unreadable.
fn load_one(config: &RepositoryConfig) -> (RepositoryInfo, Option<String>) {
    let inline = config.repository_info();
    let Some(path) = config.requirements_path() else {
        return (inline, None);
    };
    match read_requirements(&path) {
        Ok(from_file) => {
            let mut info = inline;
            for (package, requirement) in from_file {
                info.dependencies.entry(package).or_insert(requirement);
            }
            (info, None)
        }
        Err(err) => {
            let warning = format!("{}: requirements unreadable ({}): {err}", inline.name, path.display());
            (inline, Some(warning))
        }
    }
}

/// Reads a requirements file.
fn read_requirements(path: &Path) -> std::io::Result<BTreeMap<PackageName, String>> {
    Ok(parse_requirements(&fs::read_to_string(path)?))
}

// ============================================================================
// SECTION: Requirements Parsing
// ============================================================================

/// Parses `requirements.txt`-style lines into requirements by package.
///
/// Comments, blank lines, option lines (`-r`, `-e`, `--index-url`), and
/// environment markers are ignored; extras are stripped from names. A bare
/// name requires any version (`*`). Later lines win over earlier ones.
#[must_use]
pub fn parse_requirements(text: &str) -> BTreeMap<PackageName, String> {
    let mut requirements = BTreeMap::new();
    for line in text.lines() {
        let line = line.split('#').next().unwrap_or_default();
        let line = line.split(';').next().unwrap_or_default().trim();
        if line.is_empty() || line.starts_with('-') {
            continue;
        }
        let split = line.find(|ch: char| "=<>!~^* ".contains(ch)).unwrap_or(line.len());
        let (name, requirement) = line.split_at(split);
        let name = PackageName::new(name.split('[').next().unwrap_or_default());
        if name.is_empty() {
            continue;
        }
        let requirement: String = requirement.split_whitespace().collect();
        let requirement = if requirement.is_empty() { "*".to_string() } else { requirement };
        requirements.insert(name, requirement);
    }
    requirements
}
