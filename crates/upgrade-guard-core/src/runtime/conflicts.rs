// crates/upgrade-guard-core/src/runtime/conflicts.rs
// ============================================================================
// Module: Upgrade Guard Cross-Repo Coordinator
// Description: Detects and resolves divergent requirements across repositories.
// Purpose: Produce a conflict resolution plan with a safe execution order.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! Every registered repository declares a requirement per package. Bare
//! versions read as caret ranges, so `2.28.0` and `2.31.0` are compatible.
//! A package whose requirement strings differ between repositories is a
//! conflict. The strategy is chosen per conflict:
//!
//! - a version some repository declares satisfies every repository:
//!   `HIGHEST_VERSION`, the highest such declared version;
//! - the requirements straddle a major boundary: `BACKTRACK`, searching
//!   repository subsets (largest first, then priority) for a common version;
//! - a known stable release satisfies every repository:
//!   `LOWEST_COMPATIBLE`, the lowest such release;
//! - otherwise `EXCLUDE_CONFLICTING`.
//!
//! Known releases come from metadata; pre-releases among them are ignored
//! unless a repository names one. A strategy that finds nothing falls back
//! to `EXCLUDE_CONFLICTING` and the package is flagged for manual
//! resolution. Execution order is a
//! topological order over package dependency edges with independent
//! packages first; cycles are collapsed into one group and recorded.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use time::OffsetDateTime;

use crate::core::DependencyConflict;
use crate::core::MetadataIndex;
use crate::core::PackageName;
use crate::core::RepositoryInfo;
use crate::core::ResolutionPlan;
use crate::core::ResolutionStrategy;
use crate::core::UpdateCoordination;
use crate::core::Version;
use crate::core::VersionReq;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Largest repository count the backtracking search explores.
pub const MAX_BACKTRACK_REPOSITORIES: usize = 16;

// ============================================================================
// SECTION: Coordinator
// ============================================================================

/// Requirement map for one package: repository name to requirement.
pub type RequirementMap = BTreeMap<String, String>;

/// Cross-repository coordinator.
///
/// # Invariants
/// - Repository names are unique; re-registering replaces the entry.
#[derive(Debug, Clone, Default)]
pub struct CrossRepoCoordinator {
    /// Registered repositories by name.
    repositories: BTreeMap<String, RepositoryInfo>,
    /// Package dependency edges (package to the packages it requires).
    edges: BTreeMap<PackageName, BTreeSet<PackageName>>,
    /// Releases known per package.
    available: BTreeMap<PackageName, BTreeSet<Version>>,
    /// Forced strategies per package.
    overrides: BTreeMap<PackageName, ResolutionStrategy>,
}

impl CrossRepoCoordinator {
    /// Creates an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a repository.
    pub fn register_repository(&mut self, repository: RepositoryInfo) {
        self.repositories.insert(repository.name.clone(), repository);
    }

    /// Returns the registered repositories in name order.
    pub fn repositories(&self) -> impl Iterator<Item = &RepositoryInfo> {
        self.repositories.values()
    }

    /// Declares the packages `package` depends on.
    pub fn set_dependencies(
        &mut self,
        package: &PackageName,
        requires: impl IntoIterator<Item = PackageName>,
    ) {
        let requires: BTreeSet<PackageName> =
            requires.into_iter().filter(|dependency| dependency != package).collect();
        self.edges.insert(package.clone(), requires);
    }

    /// Declares the releases known for a package.
    pub fn set_available_versions(
        &mut self,
        package: &PackageName,
        versions: impl IntoIterator<Item = Version>,
    ) {
        self.available.entry(package.clone()).or_default().extend(versions);
    }

    /// Loads releases and dependency edges from a metadata index.
    pub fn load_metadata(&mut self, index: &MetadataIndex) {
        for (name, entry) in &index.packages {
            self.set_available_versions(name, entry.known_versions());
            if !entry.requires.is_empty() {
                self.set_dependencies(name, entry.requires.iter().cloned());
            }
        }
    }

    /// Forces a strategy for one package.
    pub fn set_strategy(&mut self, package: &PackageName, strategy: ResolutionStrategy) {
        self.overrides.insert(package.clone(), strategy);
    }

    /// Returns the union graph: every package and the requirement each
    /// repository declares for it.
    #[must_use]
    pub fn dependency_graph(&self) -> BTreeMap<PackageName, RequirementMap> {
        let mut graph: BTreeMap<PackageName, RequirementMap> = BTreeMap::new();
        for repository in self.repositories.values() {
            for (package, requirement) in &repository.dependencies {
                graph
                    .entry(package.clone())
                    .or_default()
                    .insert(repository.name.clone(), requirement.clone());
            }
        }
        graph
    }

    /// Detects and resolves every conflict, sorted by package.
    #[must_use]
    pub fn detect_conflicts(&self) -> Vec<DependencyConflict> {
        self.dependency_graph()
            .into_iter()
            .filter(|(_, required)| {
                required.values().map(|requirement| requirement.trim()).collect::<BTreeSet<_>>().len() > 1
            })
            .map(|(package, required)| self.resolve_conflict(package, required))
            .collect()
    }

    /// Builds the resolution plan.
    #[must_use]
    pub fn resolve(&self, now: OffsetDateTime) -> ResolutionPlan {
        let conflicts = self.detect_conflicts();
        let resolutions: BTreeMap<PackageName, Version> = conflicts
            .iter()
            .filter_map(|conflict| {
                conflict.resolved_version.clone().map(|version| (conflict.package.clone(), version))
            })
            .collect();
        let manual_resolution =
            conflicts.iter().filter(|conflict| !conflict.resolvable).map(|conflict| conflict.package.clone()).collect();
        let nodes: BTreeSet<PackageName> = resolutions.keys().cloned().collect();
        let (execution_order, cycles) = self.execution_order(&nodes);
        let total_weight: f64 = conflicts.iter().map(|conflict| conflict.strategy.risk_weight()).sum();
        let estimated_risk = if total_weight > 0.0 {
            let weighted: f64 =
                conflicts.iter().map(|conflict| conflict.risk * conflict.strategy.risk_weight()).sum();
            (weighted / total_weight).clamp(0.0, 1.0)
        } else {
            0.0
        };
        ResolutionPlan {
            generated_at: now,
            repositories: self.repositories.keys().cloned().collect(),
            conflicts,
            resolutions,
            execution_order,
            cycles,
            manual_resolution,
            estimated_risk,
        }
    }

    /// Reports which repositories must change to adopt `version`.
    #[must_use]
    pub fn coordinate_update(&self, package: &PackageName, version: &Version) -> UpdateCoordination {
        let mut coordination = UpdateCoordination {
            package: package.clone(),
            version: version.clone(),
            compatible: Vec::new(),
            requires_change: Vec::new(),
            unparseable: Vec::new(),
            crosses_major: false,
        };
        for repository in self.repositories.values() {
            let Some(requirement) = repository.dependencies.get(package) else {
                continue;
            };
            match VersionReq::parse_compatible(requirement) {
                Ok(parsed) if parsed.matches(version) => coordination.compatible.push(repository.name.clone()),
                Ok(parsed) => {
                    if parsed.mentioned_versions().iter().any(|mentioned| mentioned.major() != version.major()) {
                        coordination.crosses_major = true;
                    }
                    coordination.requires_change.push(repository.name.clone());
                }
                Err(_) => coordination.unparseable.push(repository.name.clone()),
            }
        }
        coordination
    }

    // ------------------------------------------------------------------------
    // Resolution
    // ------------------------------------------------------------------------

    /// Resolves one conflict.
    fn resolve_conflict(&self, package: PackageName, required: RequirementMap) -> DependencyConflict {
        let mut notes = Vec::new();
        let mut parsed = BTreeMap::new();
        for (repository, requirement) in &required {
            match VersionReq::parse_compatible(requirement) {
                Ok(req) => {
                    parsed.insert(repository.clone(), req);
                }
                Err(err) => notes.push(format!("{repository}: {err}")),
            }
        }
        if parsed.len() != required.len() {
            return unresolved(package, required, notes, ResolutionStrategy::ExcludeConflicting);
        }

        let declared: BTreeSet<Version> = parsed.values().flat_map(VersionReq::mentioned_versions).collect();
        let mut candidates: BTreeSet<Version> = self
            .available
            .get(&package)
            .map(|known| known.iter().filter(|version| !version.is_prerelease()).cloned().collect())
            .unwrap_or_default();
        candidates.extend(declared.iter().cloned());
        let all: Vec<&String> = parsed.keys().collect();
        let declared_common = common_versions(&declared, &parsed, &all);
        let common = common_versions(&candidates, &parsed, &all);

        let strategy = self.overrides.get(&package).copied().unwrap_or_else(|| {
            if !declared_common.is_empty() {
                ResolutionStrategy::HighestVersion
            } else if spans_majors(&parsed) {
                ResolutionStrategy::Backtrack
            } else if !common.is_empty() {
                ResolutionStrategy::LowestCompatible
            } else {
                notes.push("no known release satisfies every repository".to_string());
                ResolutionStrategy::ExcludeConflicting
            }
        });

        let mut excluded = Vec::new();
        let resolved = match strategy {
            ResolutionStrategy::HighestVersion => declared_common.last().cloned(),
            ResolutionStrategy::LowestCompatible => common.first().cloned(),
            ResolutionStrategy::LockToStable => {
                common.iter().rev().find(|version| !version.is_prerelease()).cloned()
            }
            ResolutionStrategy::Backtrack => {
                match self.backtrack(&candidates, &parsed, &mut notes) {
                    Some((version, left_out)) => {
                        excluded = left_out;
                        Some(version)
                    }
                    None => None,
                }
            }
            ResolutionStrategy::ExcludeConflicting => None,
        };

        let Some(resolved) = resolved else {
            if strategy != ResolutionStrategy::ExcludeConflicting {
                notes.push(format!("{strategy} found no version satisfying every repository"));
            }
            notes.push("excluded; manual resolution required".to_string());
            return unresolved(package, required, notes, ResolutionStrategy::ExcludeConflicting);
        };
        if !excluded.is_empty() {
            notes.push(format!("repositories left on their own requirement: {}", excluded.join(", ")));
        }
        DependencyConflict {
            package,
            required_versions: required,
            resolvable: true,
            strategy,
            resolved_version: Some(resolved),
            excluded_repositories: excluded,
            risk: strategy.base_risk(),
            notes,
        }
    }

    /// Searches repository subsets for a common version. Returns the
    /// version and the repositories left out.
    fn backtrack(
        &self,
        candidates: &BTreeSet<Version>,
        parsed: &BTreeMap<String, VersionReq>,
        notes: &mut Vec<String>,
    ) -> Option<(Version, Vec<String>)> {
        if parsed.len() > MAX_BACKTRACK_REPOSITORIES {
            notes.push(format!(
                "backtracking limited to {MAX_BACKTRACK_REPOSITORIES} repositories; {} registered",
                parsed.len()
            ));
            return None;
        }
        let mut ranked: Vec<&String> = parsed.keys().collect();
        ranked.sort_by(|left, right| {
            let priority = |name: &String| self.repositories.get(name).map_or(0, |repo| repo.priority);
            priority(right).cmp(&priority(left)).then_with(|| left.cmp(right))
        });
        let total = ranked.len();
        for size in (1..=total).rev() {
            let mut subsets: Vec<Vec<&String>> = combinations(&ranked, size);
            subsets.sort_by(|left, right| {
                let score = |subset: &Vec<&String>| -> i64 {
                    subset
                        .iter()
                        .map(|name| i64::from(self.repositories.get(*name).map_or(0, |repo| repo.priority)))
                        .sum()
                };
                score(right).cmp(&score(left)).then_with(|| left.cmp(right))
            });
            for subset in subsets {
                if let Some(version) = common_versions(candidates, parsed, &subset).pop() {
                    let left_out =
                        ranked.iter().filter(|name| !subset.contains(name)).map(|name| (*name).clone()).collect();
                    return Some((version, left_out));
                }
            }
        }
        None
    }

    // ------------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------------

    /// Orders resolved packages so dependencies come before dependents.
    /// Returns the order and the cycles that had to be collapsed.
    fn execution_order(&self, nodes: &BTreeSet<PackageName>) -> (Vec<PackageName>, Vec<Vec<PackageName>>) {
        // Strongly connected components through mutual reachability.
        let reach: BTreeMap<&PackageName, BTreeSet<&PackageName>> =
            nodes.iter().map(|node| (node, self.reachable(node, nodes))).collect();
        let mut component_of: BTreeMap<&PackageName, usize> = BTreeMap::new();
        let mut components: Vec<Vec<PackageName>> = Vec::new();
        for node in nodes {
            if component_of.contains_key(node) {
                continue;
            }
            let index = components.len();
            let mut members = Vec::new();
            for other in nodes {
                let mutual = other == node
                    || (reach.get(node).is_some_and(|set| set.contains(other))
                        && reach.get(other).is_some_and(|set| set.contains(node)));
                if mutual {
                    component_of.insert(other, index);
                    members.push(other.clone());
                }
            }
            components.push(members);
        }

        // Component edges: dependency component must precede dependent.
        let mut successors: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); components.len()];
        let mut in_degree = vec![0usize; components.len()];
        let mut connected = vec![false; components.len()];
        for node in nodes {
            let Some(&dependent) = component_of.get(node) else {
                continue;
            };
            for dependency in self.requires_within(node, nodes) {
                let Some(&target) = component_of.get(dependency) else {
                    continue;
                };
                if target != dependent && successors[target].insert(dependent) {
                    in_degree[dependent] += 1;
                    connected[target] = true;
                    connected[dependent] = true;
                }
            }
        }

        // Kahn's algorithm; isolated components first, then name order.
        let key = |index: usize| (connected[index], components[index][0].clone());
        let mut ready: BTreeSet<(bool, PackageName, usize)> = (0..components.len())
            .filter(|index| in_degree[*index] == 0)
            .map(|index| {
                let (linked, name) = key(index);
                (linked, name, index)
            })
            .collect();
        let mut order = Vec::with_capacity(nodes.len());
        while let Some(next) = ready.pop_first() {
            let index = next.2;
            order.extend(components[index].iter().cloned());
            for &successor in &successors[index] {
                in_degree[successor] -= 1;
                if in_degree[successor] == 0 {
                    let (linked, name) = key(successor);
                    ready.insert((linked, name, successor));
                }
            }
        }

        let cycles = components.into_iter().filter(|members| members.len() > 1).collect();
        (order, cycles)
    }

    /// Returns the dependencies of `node` that are part of `nodes`.
    fn requires_within<'a>(&'a self, node: &PackageName, nodes: &BTreeSet<PackageName>) -> Vec<&'a PackageName> {
        self.edges
            .get(node)
            .map(|deps| deps.iter().filter(|dep| nodes.contains(*dep)).collect())
            .unwrap_or_default()
    }

    /// Returns every node of `nodes` reachable from `start` through one or
    /// more edges.
    fn reachable<'a>(&'a self, start: &PackageName, nodes: &BTreeSet<PackageName>) -> BTreeSet<&'a PackageName> {
        let mut seen = BTreeSet::new();
        let mut stack = self.requires_within(start, nodes);
        while let Some(node) = stack.pop() {
            if seen.insert(node) {
                stack.extend(self.requires_within(node, nodes));
            }
        }
        seen
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Builds an unresolved conflict.
fn unresolved(
    package: PackageName,
    required: RequirementMap,
    notes: Vec<String>,
    strategy: ResolutionStrategy,
) -> DependencyConflict {
    DependencyConflict {
        package,
        required_versions: required,
        resolvable: false,
        strategy,
        resolved_version: None,
        excluded_repositories: Vec::new(),
        risk: strategy.base_risk(),
        notes,
    }
}

/// Returns the candidates every listed repository accepts, ascending.
fn common_versions(
    candidates: &BTreeSet<Version>,
    parsed: &BTreeMap<String, VersionReq>,
    repositories: &[&String],
) -> Vec<Version> {
    candidates
        .iter()
        .filter(|version| {
            repositories
                .iter()
                .all(|name| parsed.get(*name).is_some_and(|requirement| requirement.matches(version)))
        })
        .cloned()
        .collect()
}

/// Returns true when the requirements mention more than one major version.
fn spans_majors(parsed: &BTreeMap<String, VersionReq>) -> bool {
    parsed
        .values()
        .flat_map(VersionReq::mentioned_versions)
        .map(|version| version.major())
        .collect::<BTreeSet<_>>()
        .len()
        > 1
}

/// Returns every `size`-element subset of `items`, preserving order.
fn combinations<'a>(items: &[&'a String], size: usize) -> Vec<Vec<&'a String>> {
    let mut out = Vec::new();
    let mut current = Vec::with_capacity(size);
    collect_combinations(items, size, 0, &mut current, &mut out);
    out
}

/// Recursive helper for [`combinations`].
fn collect_combinations<'a>(
    items: &[&'a String],
    size: usize,
    start: usize,
    current: &mut Vec<&'a String>,
    out: &mut Vec<Vec<&'a String>>,
) {
    if current.len() == size {
        out.push(current.clone());
        return;
    }
    for index in start..items.len() {
        if items.len() - index < size - current.len() {
            break;
        }
        current.push(items[index]);
        collect_combinations(items, size, index + 1, current, out);
        current.pop();
    }
}
