//! Integration tests for the resolver module.
//!
//! These tests drive the native resolver end to end against an in-memory
//! cache: installs, dependency chains, conflicts, alternatives, upgrades,
//! user relation constraints, auto-removal and proposal control through
//! the callback.

#![cfg(feature = "resolver")]

use deb_toolkit::cache::MockCache;
use deb_toolkit::error::DebToolkitError;
use deb_toolkit::resolver::{NativeResolver, Reason, ResolverConfig, UserAnswer};
use deb_toolkit::types::{
    parse_relation_line, BinaryPayload, Priority, RelationExpression, ReleaseInfo, SourceRecord,
    Version, VersionKind,
};
use std::collections::BTreeMap;
use std::sync::Arc;

fn binary(name: &str, version: &str, installed: bool) -> Version {
    let base_uri = if installed {
        ""
    } else {
        "http://deb.debian.org/debian"
    };
    Version {
        package_name: name.to_string(),
        version_string: version.to_string(),
        priority: Priority::Optional,
        maintainer: String::new(),
        section: "utils".to_string(),
        trusted: true,
        sources: vec![SourceRecord {
            release: Arc::new(ReleaseInfo {
                archive: "stable".to_string(),
                base_uri: base_uri.to_string(),
                ..ReleaseInfo::default()
            }),
            directory: "pool/main".to_string(),
        }],
        other_fields: BTreeMap::new(),
        kind: VersionKind::Binary(BinaryPayload::default()),
    }
}

fn with_depends(mut version: Version, line: &str) -> Version {
    if let VersionKind::Binary(payload) = &mut version.kind {
        payload.relations.depends = parse_relation_line(line).expect("depends should parse");
    }
    version
}

fn with_recommends(mut version: Version, line: &str) -> Version {
    if let VersionKind::Binary(payload) = &mut version.kind {
        payload.relations.recommends =
            parse_relation_line(line).expect("recommends should parse");
    }
    version
}

fn with_conflicts(mut version: Version, line: &str) -> Version {
    if let VersionKind::Binary(payload) = &mut version.kind {
        payload.relations.conflicts =
            parse_relation_line(line).expect("conflicts should parse");
    }
    version
}

fn with_essential(mut version: Version) -> Version {
    if let VersionKind::Binary(payload) = &mut version.kind {
        payload.essential = true;
    }
    version
}

/// Run the resolver and accept the first proposal.
fn accept_first(resolver: &NativeResolver<'_>) -> BTreeMap<String, String> {
    let mut chosen = BTreeMap::new();
    let accepted = resolver
        .resolve(|proposal| {
            chosen = proposal
                .chosen()
                .iter()
                .map(|(name, version)| (name.clone(), version.version_string.clone()))
                .collect();
            UserAnswer::Accept
        })
        .expect("resolution should succeed");
    assert!(accepted);
    chosen
}

#[test]
fn test_single_package_install() {
    let mut cache = MockCache::new();
    let a = cache.add_version(binary("a", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let chosen = accept_first(&resolver);
    assert_eq!(chosen, BTreeMap::from([("a".to_string(), "1".to_string())]));
}

#[test]
fn test_simple_dependency_is_pulled_in() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "b"));
    cache.add_version(binary("b", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let chosen = accept_first(&resolver);
    assert_eq!(
        chosen,
        BTreeMap::from([
            ("a".to_string(), "1".to_string()),
            ("b".to_string(), "1".to_string()),
        ])
    );
}

#[test]
fn test_conflict_with_sticked_package_is_infeasible() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "b"));
    cache.add_version(with_conflicts(binary("b", "1", false), "c"));
    let c = cache.add_version(binary("c", "1", true));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");
    // Fix c to its installed version; now b cannot be configured
    resolver
        .install_version(c)
        .expect("install should be accepted");

    let result = resolver.resolve(|_| UserAnswer::Accept);
    assert!(matches!(result, Err(DebToolkitError::ResolverInfeasible)));
}

#[test]
fn test_conflicting_package_is_removed_when_allowed() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_conflicts(binary("a", "1", false), "c"));
    cache.add_version(binary("c", "1", true));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let mut removed = Vec::new();
    let mut reason = None;
    let accepted = resolver
        .resolve(|proposal| {
            removed = proposal.removed().iter().cloned().collect();
            reason = proposal.reasons().get("c").cloned();
            UserAnswer::Accept
        })
        .expect("resolution should succeed");
    assert!(accepted);
    assert_eq!(removed, vec!["c".to_string()]);
    assert!(matches!(
        reason,
        Some(Reason::Relation { package_name, .. }) if package_name == "a"
    ));
}

#[test]
fn test_essential_package_is_not_removed() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_conflicts(binary("a", "1", false), "c"));
    cache.add_version(with_essential(binary("c", "1", true)));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let result = resolver.resolve(|_| UserAnswer::Accept);
    assert!(matches!(result, Err(DebToolkitError::ResolverInfeasible)));
}

#[test]
fn test_alternatives_are_proposed_in_turn() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "b | c"));
    cache.add_version(binary("b", "1", false));
    cache.add_version(binary("c", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let mut proposals: Vec<Vec<String>> = Vec::new();
    let accepted = resolver
        .resolve(|proposal| {
            proposals.push(proposal.chosen().keys().cloned().collect());
            if proposals.len() < 2 {
                UserAnswer::Decline
            } else {
                UserAnswer::Accept
            }
        })
        .expect("resolution should succeed");
    assert!(accepted);
    assert_eq!(proposals.len(), 2);
    assert_eq!(proposals[0], vec!["a".to_string(), "b".to_string()]);
    assert_eq!(proposals[1], vec!["a".to_string(), "c".to_string()]);
}

#[test]
fn test_versioned_dependency_upgrades_installed_package() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "b (>= 2.0)"));
    cache.add_version(binary("b", "1.0", true));
    cache.add_version(binary("b", "2.0", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let chosen = accept_first(&resolver);
    assert_eq!(chosen.get("b").map(String::as_str), Some("2.0"));
}

#[test]
fn test_pin_steers_dependency_choice() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "b"));
    cache.add_version(binary("b", "1.0", false));
    cache.add_version(binary("b", "2.0", false));
    cache.set_pin("b", "1.0", 990);

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let chosen = accept_first(&resolver);
    assert_eq!(chosen.get("b").map(String::as_str), Some("1.0"));
}

#[test]
fn test_upgrade_moves_to_best_candidate() {
    let mut cache = MockCache::new();
    cache.add_version(binary("a", "1.0", true));
    cache.add_version(binary("a", "2.0", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.upgrade();

    let chosen = accept_first(&resolver);
    assert_eq!(chosen.get("a").map(String::as_str), Some("2.0"));
}

#[test]
fn test_satisfy_relation_installs_an_alternative() {
    let mut cache = MockCache::new();
    cache.add_version(binary("x", "1", false));
    cache.add_version(binary("y", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.satisfy_relation(RelationExpression::parse("x | y").expect("should parse"));

    let chosen = accept_first(&resolver);
    // The first alternative in enumeration order wins the tie
    assert_eq!(chosen.keys().collect::<Vec<_>>(), vec!["x"]);
}

#[test]
fn test_unsatisfy_relation_removes_match() {
    let mut cache = MockCache::new();
    cache.add_version(binary("c", "1", true));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.unsatisfy_relation(RelationExpression::parse("c").expect("should parse"));

    let mut removed = Vec::new();
    let accepted = resolver
        .resolve(|proposal| {
            removed = proposal.removed().iter().cloned().collect();
            assert!(proposal.chosen().is_empty());
            UserAnswer::Accept
        })
        .expect("resolution should succeed");
    assert!(accepted);
    assert_eq!(removed, vec!["c".to_string()]);
}

#[test]
fn test_removal_cascades_to_dependent_packages() {
    let mut cache = MockCache::new();
    cache.add_version(with_depends(binary("y", "1", true), "x"));
    cache.add_version(binary("x", "1", true));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.remove_package("x");

    let mut removed = Vec::new();
    let accepted = resolver
        .resolve(|proposal| {
            removed = proposal.removed().iter().cloned().collect();
            UserAnswer::Accept
        })
        .expect("resolution should succeed");
    assert!(accepted);
    assert_eq!(removed, vec!["x".to_string(), "y".to_string()]);
}

#[test]
fn test_auto_installed_leaf_is_cleaned() {
    let mut cache = MockCache::new();
    cache.add_version(with_depends(binary("a", "1", true), "b"));
    cache.add_version(binary("b", "1", true));
    cache.mark_automatically_installed("b");

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.remove_package("a");

    let mut autoremoved = Vec::new();
    let mut reason = None;
    let accepted = resolver
        .resolve(|proposal| {
            autoremoved = proposal.autoremoved().iter().cloned().collect();
            reason = proposal.reasons().get("b").cloned();
            UserAnswer::Accept
        })
        .expect("resolution should succeed");
    assert!(accepted);
    assert_eq!(autoremoved, vec!["b".to_string()]);
    assert_eq!(reason, Some(Reason::AutoRemoval));
}

#[test]
fn test_auto_installed_dependency_is_kept_while_needed() {
    let mut cache = MockCache::new();
    cache.add_version(with_depends(binary("a", "1", true), "b"));
    cache.add_version(binary("b", "1", true));
    cache.mark_automatically_installed("b");

    let resolver = NativeResolver::new(&cache, ResolverConfig::default());
    let mut autoremoved_count = 0;
    let accepted = resolver
        .resolve(|proposal| {
            autoremoved_count = proposal.autoremoved().len();
            UserAnswer::Accept
        })
        .expect("resolution should succeed");
    assert!(accepted);
    assert_eq!(autoremoved_count, 0);
}

#[test]
fn test_recommends_satisfied_then_ignored_on_decline() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_recommends(binary("a", "1", false), "r"));
    cache.add_version(binary("r", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let mut proposals: Vec<Vec<String>> = Vec::new();
    let accepted = resolver
        .resolve(|proposal| {
            proposals.push(proposal.chosen().keys().cloned().collect());
            if proposals.len() < 2 {
                UserAnswer::Decline
            } else {
                UserAnswer::Accept
            }
        })
        .expect("resolution should succeed");
    assert!(accepted);
    // Satisfying the recommendation scores better than breaking it
    assert_eq!(proposals[0], vec!["a".to_string(), "r".to_string()]);
    assert_eq!(proposals[1], vec!["a".to_string()]);
}

#[test]
fn test_already_broken_recommends_is_left_alone() {
    let mut cache = MockCache::new();
    cache.add_version(with_recommends(binary("a", "1", true), "r"));
    cache.add_version(binary("r", "1", false));
    let b = cache.add_version(binary("b", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(b).expect("install should be accepted");

    let chosen = accept_first(&resolver);
    // Installing b does not drag in the long-ignored recommendation of a
    assert!(!chosen.contains_key("r"));
}

#[test]
fn test_virtual_package_satisfies_dependency() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "mail-agent"));
    let mut provider = binary("postfix", "1", false);
    if let VersionKind::Binary(payload) = &mut provider.kind {
        payload.provides.push("mail-agent".to_string());
    }
    cache.add_version(provider);

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let chosen = accept_first(&resolver);
    assert_eq!(chosen.get("postfix").map(String::as_str), Some("1"));
}

#[test]
fn test_abandon_stops_the_search() {
    let mut cache = MockCache::new();
    let a = cache.add_version(binary("a", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let accepted = resolver
        .resolve(|_| UserAnswer::Abandon)
        .expect("resolution should report abandon");
    assert!(!accepted);
}

#[test]
fn test_no_duplicate_proposals() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "b | c | d"));
    cache.add_version(binary("b", "1", false));
    cache.add_version(binary("c", "1", false));
    cache.add_version(binary("d", "1", false));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let mut proposals: Vec<BTreeMap<String, String>> = Vec::new();
    let result = resolver.resolve(|proposal| {
        proposals.push(
            proposal
                .chosen()
                .iter()
                .map(|(name, version)| (name.clone(), version.version_string.clone()))
                .collect(),
        );
        UserAnswer::Decline
    });
    assert!(matches!(result, Err(DebToolkitError::ResolverInfeasible)));
    assert_eq!(proposals.len(), 3);
    for (index, proposal) in proposals.iter().enumerate() {
        for other in &proposals[index + 1..] {
            assert_ne!(proposal, other);
        }
    }
}

#[test]
fn test_proposal_order_is_deterministic() {
    let run = || {
        let mut cache = MockCache::new();
        let a = cache.add_version(with_depends(binary("a", "1", false), "b | c"));
        cache.add_version(binary("b", "1", false));
        cache.add_version(binary("c", "1", false));
        let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
        resolver.install_version(a).expect("install should be accepted");
        let mut proposals: Vec<Vec<String>> = Vec::new();
        let _ = resolver.resolve(|proposal| {
            proposals.push(proposal.chosen().keys().cloned().collect());
            UserAnswer::Decline
        });
        proposals
    };
    assert_eq!(run(), run());
}

#[test]
fn test_no_remove_protects_untouched_packages() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_conflicts(binary("a", "1", false), "c"));
    cache.add_version(binary("c", "1", true));

    let config = ResolverConfig {
        no_remove: true,
        ..ResolverConfig::default()
    };
    let mut resolver = NativeResolver::new(&cache, config);
    resolver.install_version(a).expect("install should be accepted");

    let result = resolver.resolve(|_| UserAnswer::Accept);
    assert!(matches!(result, Err(DebToolkitError::ResolverInfeasible)));
}

#[test]
fn test_accepted_solution_satisfies_all_relations() {
    let mut cache = MockCache::new();
    let a = cache.add_version(with_depends(binary("a", "1", false), "b, c (>= 2.0)"));
    cache.add_version(with_depends(binary("b", "1", false), "d"));
    cache.add_version(binary("c", "1.0", false));
    cache.add_version(binary("c", "2.0", false));
    cache.add_version(with_conflicts(binary("d", "1", false), "e"));
    cache.add_version(binary("e", "1", true));

    let mut resolver = NativeResolver::new(&cache, ResolverConfig::default());
    resolver.install_version(a).expect("install should be accepted");

    let chosen = accept_first(&resolver);
    assert_eq!(chosen.get("a").map(String::as_str), Some("1"));
    assert_eq!(chosen.get("b").map(String::as_str), Some("1"));
    assert_eq!(chosen.get("c").map(String::as_str), Some("2.0"));
    assert_eq!(chosen.get("d").map(String::as_str), Some("1"));
    // e conflicts with d and must be gone
    assert!(!chosen.contains_key("e"));
}
