// crates/upgrade-guard-core/tests/cross_repo.rs
// ============================================================================
// Module: Cross-Repo Coordinator Tests
// Description: Conflict detection, strategy selection, and execution order.
// ============================================================================
//! ## Overview
//! Registers repositories with diverging requirements and checks the chosen
//! strategies, resolved versions, manual-resolution flags, and that the
//! execution order places dependencies before dependents.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    reason = "Test-only panic-based assertions are permitted."
)]

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use proptest::prelude::*;
use time::OffsetDateTime;
use time::macros::datetime;
use upgrade_guard_core::CrossRepoCoordinator;
use upgrade_guard_core::MetadataEntry;
use upgrade_guard_core::MetadataIndex;
use upgrade_guard_core::PackageName;
use upgrade_guard_core::RepositoryInfo;
use upgrade_guard_core::ResolutionStrategy;
use upgrade_guard_core::Version;

/// Fixed evaluation clock.
const NOW: OffsetDateTime = datetime!(2026-10-19 12:00 UTC);

/// Parses a version fixture.
fn v(raw: &str) -> Version {
    Version::parse(raw).unwrap()
}

/// Package name shorthand.
fn pkg(name: &str) -> PackageName {
    PackageName::new(name)
}

/// Verifies compatible caret requirements resolve to the highest common
/// release.
#[test]
fn compatible_requirements_pick_highest_version() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(RepositoryInfo::new("billing", "/srv/billing").with_dependency("requests", "2.28.0"));
    coordinator.register_repository(RepositoryInfo::new("checkout", "/srv/checkout").with_dependency("requests", "2.30.0"));
    coordinator.register_repository(RepositoryInfo::new("search", "/srv/search").with_dependency("requests", "2.31.0"));

    let plan = coordinator.resolve(NOW);
    assert_eq!(plan.repositories, vec!["billing", "checkout", "search"]);
    let conflict = plan.conflict(&pkg("requests")).unwrap();
    assert!(conflict.resolvable);
    assert_eq!(conflict.strategy, ResolutionStrategy::HighestVersion);
    assert_eq!(conflict.resolved_version, Some(v("2.31.0")));
    assert_eq!(conflict.required_versions.len(), 3);
    assert_eq!(plan.resolutions.get(&pkg("requests")), Some(&v("2.31.0")));
    assert_eq!(plan.execution_order, vec![pkg("requests")]);
    assert!(plan.manual_resolution.is_empty());
    assert!((plan.estimated_risk - 0.2).abs() < 1e-9);
}

/// Verifies identical requirements are not conflicts.
#[test]
fn identical_requirements_are_not_conflicts() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(RepositoryInfo::new("billing", "/srv/billing").with_dependency("idna", "3.7"));
    coordinator.register_repository(RepositoryInfo::new("search", "/srv/search").with_dependency("idna", " 3.7 "));
    assert!(coordinator.detect_conflicts().is_empty());
    let plan = coordinator.resolve(NOW);
    assert!(plan.execution_order.is_empty());
    assert!(plan.estimated_risk.abs() < f64::EPSILON);
    assert_eq!(coordinator.dependency_graph()[&pkg("idna")].len(), 2);
}

/// Verifies known releases never move the highest pick past what the
/// repositories declare, and release candidates are ignored.
#[test]
fn known_releases_do_not_override_declared_versions() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(RepositoryInfo::new("billing", "/srv/billing").with_dependency("requests", "2.28.0"));
    coordinator.register_repository(RepositoryInfo::new("checkout", "/srv/checkout").with_dependency("requests", "2.30.0"));
    coordinator.register_repository(RepositoryInfo::new("search", "/srv/search").with_dependency("requests", "2.31.0"));
    let mut index = MetadataIndex::default();
    index.packages.insert(
        pkg("requests"),
        MetadataEntry {
            latest: Some(v("2.33.0rc1")),
            versions: vec![v("2.31.0"), v("2.32.3"), v("2.33.0rc1")],
            ..MetadataEntry::default()
        },
    );
    coordinator.load_metadata(&index);

    let conflict = coordinator.detect_conflicts().pop().unwrap();
    assert_eq!(conflict.strategy, ResolutionStrategy::HighestVersion);
    assert_eq!(conflict.resolved_version, Some(v("2.31.0")));

    coordinator.set_strategy(&pkg("requests"), ResolutionStrategy::LockToStable);
    let conflict = coordinator.detect_conflicts().pop().unwrap();
    assert_eq!(conflict.resolved_version, Some(v("2.32.3")));
}

/// Verifies a stable known release satisfying every range is chosen as the
/// lowest compatible version when no declared version fits.
#[test]
fn known_release_between_ranges_is_lowest_compatible() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(RepositoryInfo::new("billing", "/srv/billing").with_dependency("urllib3", ">1.26.5"));
    coordinator.register_repository(RepositoryInfo::new("search", "/srv/search").with_dependency("urllib3", "<1.26.9"));
    let mut index = MetadataIndex::default();
    index.packages.insert(
        pkg("urllib3"),
        MetadataEntry {
            versions: vec![v("1.26.6rc1"), v("1.26.6"), v("1.26.8"), v("1.26.9")],
            ..MetadataEntry::default()
        },
    );
    coordinator.load_metadata(&index);

    let conflict = coordinator.detect_conflicts().pop().unwrap();
    assert_eq!(conflict.strategy, ResolutionStrategy::LowestCompatible);
    assert_eq!(conflict.resolved_version, Some(v("1.26.6")));
    assert!(conflict.resolvable);
    assert!((conflict.risk - 0.3).abs() < 1e-9);

    coordinator.set_strategy(&pkg("urllib3"), ResolutionStrategy::LockToStable);
    let conflict = coordinator.detect_conflicts().pop().unwrap();
    assert_eq!(conflict.resolved_version, Some(v("1.26.8")));
}

/// Verifies requirements across a major boundary backtrack to the largest
/// satisfiable subset.
#[test]
fn major_split_backtracks_to_largest_subset() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(RepositoryInfo::new("alpha", "/srv/alpha").with_dependency("pydantic", "1.10.0"));
    coordinator.register_repository(RepositoryInfo::new("beta", "/srv/beta").with_dependency("pydantic", "2.0.0"));
    coordinator.register_repository(RepositoryInfo::new("gamma", "/srv/gamma").with_dependency("pydantic", "2.5.0"));

    let plan = coordinator.resolve(NOW);
    let conflict = plan.conflict(&pkg("pydantic")).unwrap();
    assert_eq!(conflict.strategy, ResolutionStrategy::Backtrack);
    assert_eq!(conflict.resolved_version, Some(v("2.5.0")));
    assert_eq!(conflict.excluded_repositories, vec!["alpha"]);
    assert!(conflict.notes.contains(&"repositories left on their own requirement: alpha".to_string()));
    assert!((plan.estimated_risk - 0.7).abs() < 1e-9);
}

/// Verifies repository priority decides between equally sized subsets.
#[test]
fn backtracking_prefers_high_priority_repositories() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(
        RepositoryInfo::new("legacy", "/srv/legacy").with_dependency("pydantic", "1.10.0").with_priority(10),
    );
    coordinator.register_repository(RepositoryInfo::new("modern", "/srv/modern").with_dependency("pydantic", "2.5.0"));
    let conflict = coordinator.detect_conflicts().pop().unwrap();
    assert_eq!(conflict.resolved_version, Some(v("1.10.0")));
    assert_eq!(conflict.excluded_repositories, vec!["modern"]);
}

/// Verifies unsatisfiable and unparseable requirements are excluded and
/// flagged for manual resolution.
#[test]
fn unresolvable_conflicts_need_manual_resolution() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(
        RepositoryInfo::new("billing", "/srv/billing")
            .with_dependency("celery", "<5.3.0")
            .with_dependency("kombu", "latest please"),
    );
    coordinator.register_repository(
        RepositoryInfo::new("search", "/srv/search").with_dependency("celery", ">=5.4.0").with_dependency("kombu", "5.3"),
    );

    let plan = coordinator.resolve(NOW);
    let celery = plan.conflict(&pkg("celery")).unwrap();
    assert!(!celery.resolvable);
    assert_eq!(celery.strategy, ResolutionStrategy::ExcludeConflicting);
    assert!(celery.resolved_version.is_none());
    assert!(
        celery.notes.contains(&"no known release satisfies every repository".to_string())
    );
    let kombu = plan.conflict(&pkg("kombu")).unwrap();
    assert!(!kombu.resolvable);
    assert!(kombu.notes[0].starts_with("billing: "));
    assert_eq!(plan.manual_resolution, vec![pkg("celery"), pkg("kombu")]);
    assert!(plan.resolutions.is_empty());
    assert!((plan.estimated_risk - 1.0).abs() < 1e-9);
}

/// Verifies dependencies precede dependents and isolated packages lead.
#[test]
fn execution_order_respects_dependencies() {
    let mut coordinator = CrossRepoCoordinator::new();
    let mut billing = RepositoryInfo::new("billing", "/srv/billing");
    let mut search = RepositoryInfo::new("search", "/srv/search");
    for name in ["certifi", "idna", "requests", "urllib3"] {
        billing = billing.with_dependency(name, "1.0.0");
        search = search.with_dependency(name, "1.2.0");
    }
    coordinator.register_repository(billing);
    coordinator.register_repository(search);
    coordinator.set_dependencies(&pkg("requests"), [pkg("urllib3"), pkg("idna"), pkg("requests")]);

    let plan = coordinator.resolve(NOW);
    assert_eq!(plan.execution_order, vec![pkg("certifi"), pkg("idna"), pkg("urllib3"), pkg("requests")]);
    assert!(plan.cycles.is_empty());
}

/// Verifies dependency cycles are collapsed and recorded.
#[test]
fn cycles_are_recorded() {
    let mut coordinator = CrossRepoCoordinator::new();
    let mut billing = RepositoryInfo::new("billing", "/srv/billing");
    let mut search = RepositoryInfo::new("search", "/srv/search");
    for name in ["botocore", "boto3", "s3transfer"] {
        billing = billing.with_dependency(name, "1.0.0");
        search = search.with_dependency(name, "1.1.0");
    }
    coordinator.register_repository(billing);
    coordinator.register_repository(search);
    coordinator.set_dependencies(&pkg("boto3"), [pkg("s3transfer")]);
    coordinator.set_dependencies(&pkg("s3transfer"), [pkg("boto3")]);
    coordinator.set_dependencies(&pkg("botocore"), [pkg("boto3")]);

    let plan = coordinator.resolve(NOW);
    assert_eq!(plan.cycles, vec![vec![pkg("boto3"), pkg("s3transfer")]]);
    assert_eq!(plan.execution_order, vec![pkg("boto3"), pkg("s3transfer"), pkg("botocore")]);
}

/// Verifies update coordination splits repositories by compatibility.
#[test]
fn coordinate_update_reports_required_changes() {
    let mut coordinator = CrossRepoCoordinator::new();
    coordinator.register_repository(RepositoryInfo::new("billing", "/srv/billing").with_dependency("django", "4.2.0"));
    coordinator.register_repository(RepositoryInfo::new("cms", "/srv/cms").with_dependency("django", ">=4.0"));
    coordinator.register_repository(RepositoryInfo::new("docs", "/srv/docs").with_dependency("django", "four"));
    coordinator.register_repository(RepositoryInfo::new("search", "/srv/search").with_dependency("flask", "3.0.0"));

    let coordination = coordinator.coordinate_update(&pkg("django"), &v("5.0.0"));
    assert_eq!(coordination.compatible, vec!["cms"]);
    assert_eq!(coordination.requires_change, vec!["billing"]);
    assert_eq!(coordination.unparseable, vec!["docs"]);
    assert!(coordination.crosses_major);

    let minor = coordinator.coordinate_update(&pkg("django"), &v("4.2.7"));
    assert_eq!(minor.compatible, vec!["billing", "cms"]);
    assert!(!minor.crosses_major);
}

proptest! {
    /// Verifies every resolved package is ordered exactly once and acyclic
    /// dependencies precede their dependents.
    #[test]
    fn execution_order_is_topological(
        edges in prop::collection::vec((0_usize..6, 0_usize..6), 0..12),
    ) {
        let names: Vec<PackageName> = (0..6).map(|index| pkg(&format!("pkg-{index}"))).collect();
        let mut coordinator = CrossRepoCoordinator::new();
        let mut left = RepositoryInfo::new("left", "/srv/left");
        let mut right = RepositoryInfo::new("right", "/srv/right");
        for name in &names {
            left = left.with_dependency(name.as_str(), "1.0.0");
            right = right.with_dependency(name.as_str(), "1.1.0");
        }
        coordinator.register_repository(left);
        coordinator.register_repository(right);
        let mut requires: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
        for (from, to) in &edges {
            requires.entry(*from).or_default().insert(*to);
        }
        for (from, targets) in &requires {
            coordinator.set_dependencies(&names[*from], targets.iter().map(|to| names[*to].clone()));
        }

        let plan = coordinator.resolve(NOW);
        prop_assert_eq!(plan.execution_order.len(), names.len());
        let ordered: BTreeSet<&PackageName> = plan.execution_order.iter().collect();
        prop_assert_eq!(ordered.len(), names.len());
        let position = |name: &PackageName| plan.execution_order.iter().position(|entry| entry == name);
        let same_cycle = |a: &PackageName, b: &PackageName| {
            plan.cycles.iter().any(|cycle| cycle.contains(a) && cycle.contains(b))
        };
        for (from, targets) in &requires {
            for to in targets {
                if from == to || same_cycle(&names[*from], &names[*to]) {
                    continue;
                }
                prop_assert!(position(&names[*to]) < position(&names[*from]));
            }
        }
    }
}
