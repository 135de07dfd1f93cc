//! Dependency graph of the native resolver.
//!
//! Elements live in an arena and reference each other by stable indices,
//! which keeps the inherently cyclic graph free of ownership cycles. Four
//! element kinds exist: version elements, relation elements (positive),
//! anti-relation elements (Conflicts/Breaks) and empty-package elements
//! standing for "package X is absent". Version elements of one package form
//! that package's conflict set: at most one of them, or the empty element,
//! may be chosen in a solution.

use crate::cache::Cache;
use crate::resolver::solution::PackageEntry;
use crate::resolver::ResolverConfig;
use crate::types::{
    BinaryPayload, Priority, RelationExpression, RelationType, ReleaseInfo, SourceRecord, Version,
    VersionKind,
};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::sync::Arc;

/// Package name of the synthetic version element carrying user satisfy and
/// unsatisfy requests.
pub(crate) const DUMMY_PACKAGE_NAME: &str = "<user requests>";

/// Priority of user-requested relations; attacked before anything else.
pub(crate) const PRIORITY_USER: u32 = 5;
/// Priority of `Pre-Depends` relations.
pub(crate) const PRIORITY_PRE_DEPENDS: u32 = 4;
/// Priority of `Conflicts` and `Breaks` anti-relations.
pub(crate) const PRIORITY_ANTI: u32 = 4;
/// Priority of `Depends` relations.
pub(crate) const PRIORITY_DEPENDS: u32 = 3;
/// Priority of `Recommends` relations.
pub(crate) const PRIORITY_RECOMMENDS: u32 = 2;
/// Priority of `Suggests` relations.
pub(crate) const PRIORITY_SUGGESTS: u32 = 1;

/// Stable index of an element within the graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct ElementId(pub(crate) u32);

impl ElementId {
    /// Arena slot of this element.
    const fn index(self) -> usize {
        self.0 as usize
    }
}

/// One node of the dependency graph.
#[derive(Debug)]
pub(crate) enum Vertex {
    /// A concrete binary version of a package.
    Version {
        /// The version this element stands for.
        version: Arc<Version>,
    },
    /// A positive relation; satisfied when any related version is chosen.
    Relation {
        /// Relation field the expression came from.
        kind: RelationType,
        /// The relation expression.
        expression: RelationExpression,
        /// Broken-successor priority.
        priority: u32,
    },
    /// A negated relation; satisfied only when none of the related versions
    /// is chosen.
    AntiRelation {
        /// Relation field the expression came from.
        kind: RelationType,
        /// The relation expression.
        expression: RelationExpression,
        /// Broken-successor priority.
        priority: u32,
    },
    /// The absence of a package.
    Empty {
        /// Name of the absent package.
        package_name: String,
    },
}

/// Initial state of one package when resolving starts.
#[derive(Clone, Debug, Default)]
pub(crate) struct InitialPackageEntry {
    /// Version to start from; `None` requests absence.
    pub version: Option<Arc<Version>>,
    /// Whether the user fixed this state.
    pub sticked: bool,
    /// Whether the user changed this state from what is installed.
    pub modified: bool,
}

/// A relation discovered during package traversal, wired into the graph
/// once every reachable version element exists.
struct PendingRelation {
    /// Version element declaring the relation.
    dependee: ElementId,
    /// Relation field.
    kind: RelationType,
    /// The expression itself.
    expression: RelationExpression,
    /// Versions satisfying (or, for anti-relations, matching) the
    /// expression.
    related: Vec<Arc<Version>>,
    /// Broken-successor priority.
    priority: u32,
}

/// Arena-allocated dependency graph over the reachable package universe.
pub(crate) struct DependencyGraph<'c> {
    /// Catalog access.
    cache: &'c dyn Cache,
    /// Whether `Recommends` edges are created.
    track_recommends: bool,
    /// Whether `Suggests` edges are created.
    track_suggests: bool,
    /// Whether unmodified installed packages may be removed.
    no_remove: bool,
    /// Element storage.
    vertices: Vec<Vertex>,
    /// Outgoing edges per element.
    successors: Vec<Vec<ElementId>>,
    /// Incoming edges per element.
    predecessors: Vec<Vec<ElementId>>,
    /// Version elements per package name, best version first.
    families: BTreeMap<String, Vec<ElementId>>,
    /// Empty-package elements, created lazily per package.
    empty_elements: BTreeMap<String, ElementId>,
    /// Version element lookup by `(package_name, version_string)`.
    version_index: HashMap<(String, String), ElementId>,
    /// Packages that must not be removed.
    unremovable: BTreeSet<String>,
}

impl<'c> DependencyGraph<'c> {
    /// What: Create an empty graph over a cache.
    pub(crate) fn new(cache: &'c dyn Cache, config: &ResolverConfig) -> Self {
        Self {
            cache,
            track_recommends: config.install_recommends,
            track_suggests: config.install_suggests,
            no_remove: config.no_remove,
            vertices: Vec::new(),
            successors: Vec::new(),
            predecessors: Vec::new(),
            families: BTreeMap::new(),
            empty_elements: BTreeMap::new(),
            version_index: HashMap::new(),
            unremovable: BTreeSet::new(),
        }
    }

    /// Append a vertex to the arena.
    fn add_vertex(&mut self, vertex: Vertex) -> ElementId {
        let id = ElementId(u32::try_from(self.vertices.len()).unwrap_or(u32::MAX));
        self.vertices.push(vertex);
        self.successors.push(Vec::new());
        self.predecessors.push(Vec::new());
        id
    }

    /// Add an edge, ignoring duplicates.
    fn add_edge(&mut self, from: ElementId, to: ElementId) {
        if !self.successors[from.index()].contains(&to) {
            self.successors[from.index()].push(to);
            self.predecessors[to.index()].push(from);
        }
    }

    /// Create the version element of one version and register it.
    fn add_version_vertex(&mut self, version: Arc<Version>) -> ElementId {
        let key = (
            version.package_name.clone(),
            version.version_string.clone(),
        );
        if let Some(existing) = self.version_index.get(&key) {
            return *existing;
        }
        let package_name = version.package_name.clone();
        let id = self.add_vertex(Vertex::Version { version });
        self.version_index.insert(key, id);
        self.families.entry(package_name).or_default().push(id);
        id
    }

    /// What: Get the empty-package element of a package, creating it lazily.
    pub(crate) fn get_or_create_empty_element(&mut self, package_name: &str) -> ElementId {
        if let Some(existing) = self.empty_elements.get(package_name) {
            return *existing;
        }
        let id = self.add_vertex(Vertex::Empty {
            package_name: package_name.to_string(),
        });
        self.empty_elements.insert(package_name.to_string(), id);
        id
    }

    /// The vertex stored under an element id.
    pub(crate) fn vertex(&self, id: ElementId) -> &Vertex {
        &self.vertices[id.index()]
    }

    /// Outgoing edges of an element.
    pub(crate) fn successors(&self, id: ElementId) -> &[ElementId] {
        &self.successors[id.index()]
    }

    /// Incoming edges of an element.
    pub(crate) fn predecessors(&self, id: ElementId) -> &[ElementId] {
        &self.predecessors[id.index()]
    }

    /// Version elements of one package, best version first.
    pub(crate) fn family(&self, package_name: &str) -> &[ElementId] {
        self.families
            .get(package_name)
            .map_or(&[], Vec::as_slice)
    }

    /// Version element lookup by package and version string.
    pub(crate) fn version_element(
        &self,
        package_name: &str,
        version_string: &str,
    ) -> Option<ElementId> {
        self.version_index
            .get(&(package_name.to_string(), version_string.to_string()))
            .copied()
    }

    /// The package a version or empty element belongs to.
    pub(crate) fn package_of(&self, id: ElementId) -> Option<&str> {
        match self.vertex(id) {
            Vertex::Version { version } => Some(&version.package_name),
            Vertex::Empty { package_name } => Some(package_name),
            Vertex::Relation { .. } | Vertex::AntiRelation { .. } => None,
        }
    }

    /// The version carried by a version element.
    pub(crate) fn version_of(&self, id: ElementId) -> Option<&Arc<Version>> {
        match self.vertex(id) {
            Vertex::Version { version } => Some(version),
            _ => None,
        }
    }

    /// Broken-successor priority of a relation-ish element.
    pub(crate) fn priority(&self, id: ElementId) -> u32 {
        match self.vertex(id) {
            Vertex::Relation { priority, .. } | Vertex::AntiRelation { priority, .. } => *priority,
            Vertex::Version { .. } | Vertex::Empty { .. } => 0,
        }
    }

    /// Whether a relation element is soft (Recommends/Suggests).
    pub(crate) fn is_soft(&self, id: ElementId) -> bool {
        matches!(
            self.vertex(id),
            Vertex::Relation { priority, .. } if *priority <= PRIORITY_RECOMMENDS
        )
    }

    /// What: Check whether a package may be switched to its empty element.
    ///
    /// Details:
    /// - Essential packages are never removable.
    /// - With `no_remove` set, installed packages the user did not touch are
    ///   not removable either.
    pub(crate) fn can_package_be_removed(&self, package_name: &str) -> bool {
        !self.unremovable.contains(package_name)
    }

    /// Human-readable description of an element for diagnostics.
    pub(crate) fn describe(&self, id: ElementId) -> String {
        match self.vertex(id) {
            Vertex::Version { version } => version.to_string(),
            Vertex::Relation {
                kind, expression, ..
            } => format!("{kind}: {expression}"),
            Vertex::AntiRelation {
                kind, expression, ..
            } => format!("{kind}: {expression}"),
            Vertex::Empty { package_name } => format!("{package_name} removed"),
        }
    }

    /// Relation kinds considered for one binary payload, with priorities.
    fn considered_kinds(&self) -> Vec<(RelationType, u32)> {
        let mut kinds = vec![
            (RelationType::PreDepends, PRIORITY_PRE_DEPENDS),
            (RelationType::Depends, PRIORITY_DEPENDS),
        ];
        if self.track_recommends {
            kinds.push((RelationType::Recommends, PRIORITY_RECOMMENDS));
        }
        if self.track_suggests {
            kinds.push((RelationType::Suggests, PRIORITY_SUGGESTS));
        }
        kinds.push((RelationType::Conflicts, PRIORITY_ANTI));
        kinds.push((RelationType::Breaks, PRIORITY_ANTI));
        kinds
    }

    /// Collect the relations of one version element and extend the
    /// discovery queue with the packages they relate to.
    fn collect_relations(
        &mut self,
        element: ElementId,
        payload: &BinaryPayload,
        queue: &mut VecDeque<String>,
        pending: &mut Vec<PendingRelation>,
    ) {
        for (kind, priority) in self.considered_kinds() {
            for expression in payload.relations.get(kind) {
                let related = self.cache.satisfying_versions(expression);
                for version in &related {
                    queue.push_back(version.package_name.clone());
                }
                pending.push(PendingRelation {
                    dependee: element,
                    kind,
                    expression: expression.clone(),
                    related,
                    priority,
                });
            }
        }
    }

    /// The synthetic version carrying user satisfy/unsatisfy requests.
    fn dummy_version() -> Arc<Version> {
        Arc::new(Version {
            package_name: DUMMY_PACKAGE_NAME.to_string(),
            version_string: "0".to_string(),
            priority: Priority::Required,
            maintainer: String::new(),
            section: String::new(),
            trusted: true,
            sources: vec![SourceRecord {
                release: Arc::new(ReleaseInfo::default()),
                directory: String::new(),
            }],
            other_fields: BTreeMap::new(),
            kind: VersionKind::Binary(BinaryPayload::default()),
        })
    }

    /// What: Materialize the graph over the transitive closure of packages
    /// reachable from the initial state and return the seed entries.
    ///
    /// Inputs:
    /// - `initial`: Per-package starting state (installed, sticked,
    ///   modified).
    /// - `satisfy`: Relation expressions that must hold in any solution.
    /// - `unsatisfy`: Relation expressions that must not hold.
    ///
    /// Output:
    /// - Returns `(element, entry, keep_soft_broken)` seed triples encoding
    ///   the initial installation plus user requests; broken successors are
    ///   computed by the solution storage afterwards. The flag marks
    ///   entries taken unmodified from the installed state, whose already
    ///   broken soft relations are ignored instead of being repaired.
    pub(crate) fn fill(
        &mut self,
        initial: &BTreeMap<String, InitialPackageEntry>,
        satisfy: &[RelationExpression],
        unsatisfy: &[RelationExpression],
    ) -> Vec<(ElementId, PackageEntry, bool)> {
        let mut queue: VecDeque<String> = initial.keys().cloned().collect();
        let mut pending: Vec<PendingRelation> = Vec::new();

        // User requests hang off one synthetic always-chosen element
        let dummy_element = if satisfy.is_empty() && unsatisfy.is_empty() {
            None
        } else {
            let element = self.add_version_vertex(Self::dummy_version());
            for expression in satisfy {
                let related = self.cache.satisfying_versions(expression);
                for version in &related {
                    queue.push_back(version.package_name.clone());
                }
                pending.push(PendingRelation {
                    dependee: element,
                    kind: RelationType::Depends,
                    expression: expression.clone(),
                    related,
                    priority: PRIORITY_USER,
                });
            }
            for expression in unsatisfy {
                let related = self.cache.satisfying_versions(expression);
                for version in &related {
                    queue.push_back(version.package_name.clone());
                }
                pending.push(PendingRelation {
                    dependee: element,
                    kind: RelationType::Conflicts,
                    expression: expression.clone(),
                    related,
                    priority: PRIORITY_USER,
                });
            }
            Some(element)
        };

        // Discover reachable packages and create their version elements
        let mut processed: BTreeSet<String> = BTreeSet::new();
        while let Some(package_name) = queue.pop_front() {
            if package_name == DUMMY_PACKAGE_NAME || !processed.insert(package_name.clone()) {
                continue;
            }
            self.get_or_create_empty_element(&package_name);
            let Some(package) = self.cache.binary_package(&package_name) else {
                continue;
            };
            for version in self.cache.sorted_pinned_versions(package) {
                let element = self.add_version_vertex(Arc::clone(&version));
                let Some(payload) = version.as_binary() else {
                    continue;
                };
                if payload.essential {
                    self.unremovable.insert(package_name.clone());
                }
                self.collect_relations(element, payload, &mut queue, &mut pending);
            }
        }

        // Wire relation elements now that every reachable version exists
        let mut relation_dedup: HashMap<(RelationType, String), ElementId> = HashMap::new();
        let mut anti_dedup: HashMap<(String, RelationType, String), ElementId> = HashMap::new();
        for relation in pending {
            let dependee_package = self
                .package_of(relation.dependee)
                .unwrap_or(DUMMY_PACKAGE_NAME)
                .to_string();
            let expression_key = relation.expression.to_string();
            if relation.kind.is_anti() {
                let key = (
                    dependee_package.clone(),
                    relation.kind,
                    expression_key,
                );
                let element = match anti_dedup.get(&key) {
                    Some(element) => *element,
                    None => {
                        let element = self.add_vertex(Vertex::AntiRelation {
                            kind: relation.kind,
                            expression: relation.expression.clone(),
                            priority: relation.priority,
                        });
                        anti_dedup.insert(key, element);
                        for version in &relation.related {
                            // A package never conflicts with its own versions
                            if version.package_name == dependee_package {
                                continue;
                            }
                            if let Some(target) = self
                                .version_element(&version.package_name, &version.version_string)
                            {
                                self.add_edge(element, target);
                            }
                        }
                        element
                    }
                };
                self.add_edge(relation.dependee, element);
            } else {
                let key = (relation.kind, expression_key);
                let element = match relation_dedup.get(&key) {
                    Some(element) => *element,
                    None => {
                        let element = self.add_vertex(Vertex::Relation {
                            kind: relation.kind,
                            expression: relation.expression.clone(),
                            priority: relation.priority,
                        });
                        relation_dedup.insert(key, element);
                        for version in &relation.related {
                            if let Some(target) = self
                                .version_element(&version.package_name, &version.version_string)
                            {
                                self.add_edge(element, target);
                            }
                        }
                        element
                    }
                };
                self.add_edge(relation.dependee, element);
            }
        }

        // Seed entries: user requests first, then the initial package state
        let mut seeds = Vec::new();
        if let Some(element) = dummy_element {
            seeds.push((
                element,
                PackageEntry {
                    sticked: true,
                    ..PackageEntry::default()
                },
                false,
            ));
        }
        for (package_name, entry) in initial {
            let element = match &entry.version {
                Some(version) => self
                    .version_element(&version.package_name, &version.version_string)
                    .unwrap_or_else(|| self.add_version_vertex(Arc::clone(version))),
                None => self.get_or_create_empty_element(package_name),
            };
            if self.no_remove && !entry.modified && entry.version.is_some() {
                self.unremovable.insert(package_name.clone());
            }
            seeds.push((
                element,
                PackageEntry {
                    sticked: entry.sticked,
                    ..PackageEntry::default()
                },
                !entry.modified,
            ));
        }
        seeds
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MockCache;
    use crate::types::parse_relation_line;

    fn binary_version(name: &str, version: &str, depends: &str, conflicts: &str) -> Version {
        let mut payload = BinaryPayload::default();
        payload.relations.depends =
            parse_relation_line(depends).expect("depends should parse");
        payload.relations.conflicts =
            parse_relation_line(conflicts).expect("conflicts should parse");
        Version {
            package_name: name.to_string(),
            version_string: version.to_string(),
            priority: Priority::Optional,
            maintainer: String::new(),
            section: String::new(),
            trusted: true,
            sources: vec![SourceRecord {
                release: Arc::new(ReleaseInfo::default()),
                directory: String::new(),
            }],
            other_fields: BTreeMap::new(),
            kind: VersionKind::Binary(payload),
        }
    }

    fn initial_entry(version: Arc<Version>, sticked: bool) -> InitialPackageEntry {
        InitialPackageEntry {
            version: Some(version),
            sticked,
            modified: true,
        }
    }

    #[test]
    fn test_fill_builds_transitive_closure() {
        let mut cache = MockCache::new();
        let a = cache.add_version(binary_version("a", "1", "b", ""));
        cache.add_version(binary_version("b", "1", "c", ""));
        cache.add_version(binary_version("c", "1", "", ""));
        cache.add_version(binary_version("unrelated", "1", "", ""));

        let config = ResolverConfig::default();
        let mut graph = DependencyGraph::new(&cache, &config);
        let mut initial = BTreeMap::new();
        initial.insert("a".to_string(), initial_entry(a, true));
        let seeds = graph.fill(&initial, &[], &[]);

        assert_eq!(seeds.len(), 1);
        assert!(graph.version_element("a", "1").is_some());
        assert!(graph.version_element("b", "1").is_some());
        assert!(graph.version_element("c", "1").is_some());
        // Unreachable packages stay out of the graph
        assert!(graph.version_element("unrelated", "1").is_none());
    }

    #[test]
    fn test_version_element_edges() {
        let mut cache = MockCache::new();
        let a = cache.add_version(binary_version("a", "1", "b", "c"));
        cache.add_version(binary_version("b", "1", "", ""));
        cache.add_version(binary_version("c", "1", "", ""));

        let config = ResolverConfig::default();
        let mut graph = DependencyGraph::new(&cache, &config);
        let mut initial = BTreeMap::new();
        initial.insert("a".to_string(), initial_entry(a, true));
        graph.fill(&initial, &[], &[]);

        let a_element = graph.version_element("a", "1").expect("a element");
        let successors = graph.successors(a_element);
        assert_eq!(successors.len(), 2);

        let relation = successors
            .iter()
            .find(|id| matches!(graph.vertex(**id), Vertex::Relation { .. }))
            .expect("depends element");
        let b_element = graph.version_element("b", "1").expect("b element");
        assert_eq!(graph.successors(*relation), &[b_element]);

        let anti = successors
            .iter()
            .find(|id| matches!(graph.vertex(**id), Vertex::AntiRelation { .. }))
            .expect("conflicts element");
        let c_element = graph.version_element("c", "1").expect("c element");
        assert_eq!(graph.successors(*anti), &[c_element]);
    }

    #[test]
    fn test_user_requests_get_dummy_element() {
        let mut cache = MockCache::new();
        cache.add_version(binary_version("a", "1", "", ""));

        let config = ResolverConfig::default();
        let mut graph = DependencyGraph::new(&cache, &config);
        let satisfy =
            vec![RelationExpression::parse("a").expect("expression should parse")];
        let seeds = graph.fill(&BTreeMap::new(), &satisfy, &[]);

        assert_eq!(seeds.len(), 1);
        let (dummy, entry, _) = &seeds[0];
        assert!(entry.sticked);
        assert_eq!(graph.package_of(*dummy), Some(DUMMY_PACKAGE_NAME));
        assert_eq!(graph.successors(*dummy).len(), 1);
        assert_eq!(graph.priority(graph.successors(*dummy)[0]), PRIORITY_USER);
    }

    #[test]
    fn test_essential_packages_are_unremovable() {
        let mut cache = MockCache::new();
        let mut essential = binary_version("keystone", "1", "", "");
        if let VersionKind::Binary(payload) = &mut essential.kind {
            payload.essential = true;
        }
        let keystone = cache.add_version(essential);

        let config = ResolverConfig::default();
        let mut graph = DependencyGraph::new(&cache, &config);
        let mut initial = BTreeMap::new();
        initial.insert("keystone".to_string(), initial_entry(keystone, false));
        graph.fill(&initial, &[], &[]);

        assert!(!graph.can_package_be_removed("keystone"));
        assert!(graph.can_package_be_removed("anything-else"));
    }
}
