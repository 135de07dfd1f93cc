//! Search driver of the native resolver.
//!
//! The driver keeps a frontier of candidate solutions. Each step picks the
//! most promising candidate, finds its highest-priority broken successor,
//! enumerates the actions that could fix it, scores them and branches one
//! child per action. A candidate with nothing broken is complete and is
//! proposed to the user callback.

use crate::cache::Cache;
use crate::error::{DebToolkitError, Result};
use crate::resolver::graph::{
    DependencyGraph, ElementId, InitialPackageEntry, Vertex, DUMMY_PACKAGE_NAME,
    PRIORITY_DEPENDS,
};
use crate::resolver::solution::{IntroducedBy, PackageEntry, Solution, SolutionStorage};
use crate::resolver::{ResolverConfig, SynchronizeSourceVersions};
use crate::types::{
    compare_version_strings, RelationExpression, RelationType, Version,
};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, trace};

/// Answer of the proposal callback.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UserAnswer {
    /// Take this solution; the search ends successfully.
    Accept,
    /// Reject this solution; the search continues.
    Decline,
    /// Stop searching without a solution.
    Abandon,
}

/// Why a package ended up in its proposed state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Reason {
    /// Requested by the user, or part of the initial state.
    User,
    /// Removed as an unused automatically installed package.
    AutoRemoval,
    /// Demanded by a relation of another package.
    Relation {
        /// Package declaring the relation.
        package_name: String,
        /// Its version string.
        version_string: String,
        /// The relation field.
        relation_type: RelationType,
        /// The relation expression.
        expression: RelationExpression,
    },
    /// Moved together with other binaries of its source package.
    Synchronization {
        /// The source package being synchronized.
        source_package: String,
    },
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User => write!(f, "user request"),
            Self::AutoRemoval => write!(f, "auto-removal of an unused package"),
            Self::Relation {
                package_name,
                version_string,
                relation_type,
                expression,
            } => write!(
                f,
                "{package_name} {version_string}: {relation_type}: {expression}"
            ),
            Self::Synchronization { source_package } => {
                write!(f, "synchronization with source package {source_package}")
            }
        }
    }
}

/// Read-only view of a complete solution handed to the callback.
#[derive(Clone, Debug)]
pub struct SolutionView {
    /// Solution identifier.
    id: u64,
    /// Preference score.
    score: f64,
    /// Chosen package versions by name.
    chosen: BTreeMap<String, Arc<Version>>,
    /// Initially installed packages now absent.
    removed: BTreeSet<String>,
    /// Packages marked for removal by auto-clean.
    autoremoved: BTreeSet<String>,
    /// Explanations for newly chosen or removed packages.
    reasons: BTreeMap<String, Reason>,
}

impl SolutionView {
    /// Solution identifier; identifiers increase in creation order.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Accumulated preference score.
    #[must_use]
    pub const fn score(&self) -> f64 {
        self.score
    }

    /// Chosen package versions by name.
    #[must_use]
    pub const fn chosen(&self) -> &BTreeMap<String, Arc<Version>> {
        &self.chosen
    }

    /// Initially installed packages that are absent in this solution.
    #[must_use]
    pub const fn removed(&self) -> &BTreeSet<String> {
        &self.removed
    }

    /// Packages marked for removal by auto-clean.
    #[must_use]
    pub const fn autoremoved(&self) -> &BTreeSet<String> {
        &self.autoremoved
    }

    /// Explanations for packages whose state differs from the initial one.
    #[must_use]
    pub const fn reasons(&self) -> &BTreeMap<String, Reason> {
        &self.reasons
    }
}

/// Where a candidate action points.
enum TargetSpec {
    /// An existing version element.
    Element(ElementId),
    /// The empty element of a package, created lazily.
    EmptyOf(String),
}

/// A candidate mutation of one solution.
struct Action {
    /// Package whose state changes.
    package_name: String,
    /// Target version; `None` means absence.
    version: Option<Arc<Version>>,
    /// Element to choose.
    target: ElementId,
    /// Other packages to stick atomically with this change.
    packages_to_stick: Vec<String>,
    /// `(dependee, relation)` ignored by policy instead of being satisfied.
    fakely_satisfies: Option<(ElementId, ElementId)>,
    /// Why the action is considered.
    reason: Reason,
    /// Introduction bookkeeping stored on the resulting entry.
    introduced_by: Option<IntroducedBy>,
    /// Estimated score change; NaN until computed.
    profit: f64,
}

/// What: Native dependency resolver over a package cache.
///
/// Inputs: None (created via `NativeResolver::new()`, configured with the
/// request methods)
///
/// Output:
/// - `NativeResolver` instance ready to `resolve()`
///
/// Details:
/// - Requests accumulate: versions to install, packages to remove,
///   relation expressions to satisfy or unsatisfy, and an optional
///   upgrade-everything flag.
/// - `resolve()` runs the branching search and proposes complete solutions
///   through the callback until one is accepted, the user abandons, or the
///   frontier runs dry.
pub struct NativeResolver<'c> {
    /// Catalog access.
    cache: &'c dyn Cache,
    /// Search configuration.
    config: ResolverConfig,
    /// Versions to install, sticked, by package name.
    to_install: BTreeMap<String, Arc<Version>>,
    /// Packages to remove, sticked.
    to_remove: BTreeSet<String>,
    /// Relation expressions that must hold.
    satisfy: Vec<RelationExpression>,
    /// Relation expressions that must not hold.
    unsatisfy: Vec<RelationExpression>,
    /// Whether every installed package should move to its best candidate.
    upgrade_requested: bool,
}

impl<'c> NativeResolver<'c> {
    /// What: Create a resolver over a cache.
    #[must_use]
    pub fn new(cache: &'c dyn Cache, config: ResolverConfig) -> Self {
        Self {
            cache,
            config,
            to_install: BTreeMap::new(),
            to_remove: BTreeSet::new(),
            satisfy: Vec::new(),
            unsatisfy: Vec::new(),
            upgrade_requested: false,
        }
    }

    /// What: Request installation of a concrete binary version.
    ///
    /// Details:
    /// - The package is sticked to exactly this version.
    /// - Only binary versions are installable.
    pub fn install_version(&mut self, version: Arc<Version>) -> Result<()> {
        if version.as_binary().is_none() {
            return Err(DebToolkitError::InvalidInput(format!(
                "cannot install source version {version}"
            )));
        }
        self.to_remove.remove(&version.package_name);
        self.to_install
            .insert(version.package_name.clone(), version);
        Ok(())
    }

    /// What: Request removal of a package.
    pub fn remove_package(&mut self, package_name: &str) {
        self.to_install.remove(package_name);
        self.to_remove.insert(package_name.to_string());
    }

    /// What: Require a relation expression to be satisfied.
    pub fn satisfy_relation(&mut self, expression: RelationExpression) {
        self.satisfy.push(expression);
    }

    /// What: Require a relation expression to be unsatisfied.
    pub fn unsatisfy_relation(&mut self, expression: RelationExpression) {
        self.unsatisfy.push(expression);
    }

    /// What: Request moving every installed package to its best candidate.
    pub fn upgrade(&mut self) {
        self.upgrade_requested = true;
    }

    /// Build the per-package initial state from the installed system plus
    /// the accumulated requests.
    fn import_initial_state(&self) -> BTreeMap<String, InitialPackageEntry> {
        let mut initial = BTreeMap::new();
        for package_name in self.cache.binary_package_names() {
            if let Some(version) = self.cache.installed_version(&package_name) {
                initial.insert(
                    package_name,
                    InitialPackageEntry {
                        version: Some(version),
                        sticked: false,
                        modified: false,
                    },
                );
            }
        }
        if self.upgrade_requested {
            for (package_name, entry) in &mut initial {
                let Some(package) = self.cache.binary_package(package_name) else {
                    continue;
                };
                let best = self.cache.sorted_pinned_versions(package).into_iter().next();
                if let Some(best) = best {
                    let already = entry
                        .version
                        .as_ref()
                        .is_some_and(|current| Arc::ptr_eq(current, &best));
                    if !already {
                        entry.version = Some(best);
                        entry.modified = true;
                    }
                }
            }
        }
        for (package_name, version) in &self.to_install {
            initial.insert(
                package_name.clone(),
                InitialPackageEntry {
                    version: Some(Arc::clone(version)),
                    sticked: true,
                    modified: true,
                },
            );
        }
        for package_name in &self.to_remove {
            initial.insert(
                package_name.clone(),
                InitialPackageEntry {
                    version: None,
                    sticked: true,
                    modified: true,
                },
            );
        }
        initial
    }

    /// Weight of one version under the score model.
    fn version_weight(&self, version: &Version) -> f64 {
        let score = &self.config.score;
        let mut weight = score.weight_of(version.priority);
        if version.is_installed() {
            weight += score.installed_bonus;
        }
        if version.trusted {
            weight += score.trusted_bonus;
        }
        weight
    }

    /// Estimated score change of moving a package from `old` to `new`.
    fn action_profit(&self, old: Option<&Arc<Version>>, new: Option<&Arc<Version>>) -> f64 {
        let score = &self.config.score;
        let old_weight = old.map_or(0.0, |version| self.version_weight(version));
        let new_weight = new.map_or(0.0, |version| self.version_weight(version));
        let mut profit = new_weight - old_weight;
        if let Some(old) = old {
            if new.is_none() && old.is_installed() {
                profit -= score.removal_penalty;
            }
            if let Some(new) = new {
                if compare_version_strings(&new.version_string, &old.version_string)
                    == Ordering::Less
                {
                    profit -= score.downgrade_penalty;
                }
                if new.priority < old.priority {
                    profit -= score.priority_drop_penalty;
                }
            }
        }
        profit
    }

    /// Pick the next frontier candidate: highest score, then lowest level,
    /// then lowest id.
    fn choose_solution(frontier: &[Solution]) -> Option<usize> {
        frontier
            .iter()
            .enumerate()
            .max_by(|(_, left), (_, right)| {
                left.score
                    .total_cmp(&right.score)
                    .then_with(|| right.level.cmp(&left.level))
                    .then_with(|| right.id.cmp(&left.id))
            })
            .map(|(index, _)| index)
    }

    /// Drop the worst candidates once the frontier exceeds its cap.
    fn erase_worst_solutions(&self, frontier: &mut Vec<Solution>) {
        if frontier.len() <= self.config.max_solution_count {
            return;
        }
        frontier.sort_by(|left, right| {
            right
                .score
                .total_cmp(&left.score)
                .then_with(|| left.level.cmp(&right.level))
                .then_with(|| left.id.cmp(&right.id))
        });
        debug!(
            dropped = frontier.len() - self.config.max_solution_count,
            "capping solution frontier"
        );
        frontier.truncate(self.config.max_solution_count);
    }

    /// What: Find the highest-priority broken successor of a solution.
    ///
    /// Details:
    /// - Stale broken-successor records whose element verified satisfied in
    ///   the meantime are dropped from their entries here.
    ///
    /// Output:
    /// - Returns `(dependee element, broken element)`, or `None` when the
    ///   solution is complete.
    fn find_broken(
        storage: &SolutionStorage<'_>,
        solution: &mut Solution,
    ) -> Option<(ElementId, ElementId)> {
        let mut best: Option<(ElementId, ElementId, u32)> = None;
        let mut updates: Vec<(ElementId, PackageEntry)> = Vec::new();
        for (element, entry) in solution.entries() {
            if entry.broken_successors.is_empty() {
                continue;
            }
            let still_broken: Vec<_> = entry
                .broken_successors
                .iter()
                .copied()
                .filter(|broken| !storage.verify_element(solution, broken.element))
                .collect();
            for broken in &still_broken {
                let better = best.is_none_or(|(_, _, priority)| broken.priority > priority);
                if better {
                    best = Some((element, broken.element, broken.priority));
                }
            }
            if still_broken.len() != entry.broken_successors.len() {
                let mut refreshed = (**entry).clone();
                refreshed.broken_successors = still_broken;
                updates.push((element, refreshed));
            }
        }
        for (element, entry) in updates {
            solution.insert(element, entry);
        }
        best.map(|(dependee, broken, _)| (dependee, broken))
    }

    /// The reason attached to actions fixing one broken element.
    fn reason_for(
        storage: &SolutionStorage<'_>,
        dependee: ElementId,
        broken: ElementId,
    ) -> Reason {
        let graph = storage.graph();
        let Some(version) = graph.version_of(dependee) else {
            return Reason::User;
        };
        if version.package_name == DUMMY_PACKAGE_NAME {
            return Reason::User;
        }
        match graph.vertex(broken) {
            Vertex::Relation {
                kind, expression, ..
            }
            | Vertex::AntiRelation {
                kind, expression, ..
            } => Reason::Relation {
                package_name: version.package_name.clone(),
                version_string: version.version_string.clone(),
                relation_type: *kind,
                expression: expression.clone(),
            },
            Vertex::Version { .. } | Vertex::Empty { .. } => Reason::User,
        }
    }

    /// Candidate targets fixing a broken element, in enumeration order.
    fn candidate_targets(
        graph: &DependencyGraph<'_>,
        solution: &Solution,
        dependee: ElementId,
        broken: ElementId,
    ) -> Vec<TargetSpec> {
        let mut targets = Vec::new();
        let dependee_package = graph.package_of(dependee).map(str::to_string);
        let anti = matches!(graph.vertex(broken), Vertex::AntiRelation { .. });

        if anti {
            // Move or drop each chosen version the anti-relation matches
            for &forbidden in graph.successors(broken) {
                if solution.entry(forbidden).is_none() {
                    continue;
                }
                let Some(package_name) = graph.package_of(forbidden) else {
                    continue;
                };
                for &alternative in graph.family(package_name) {
                    if alternative != forbidden
                        && !graph.successors(broken).contains(&alternative)
                    {
                        targets.push(TargetSpec::Element(alternative));
                    }
                }
                if graph.can_package_be_removed(package_name) {
                    targets.push(TargetSpec::EmptyOf(package_name.to_string()));
                }
            }
        } else {
            // Versions satisfying the relation
            for &satisfying in graph.successors(broken) {
                targets.push(TargetSpec::Element(satisfying));
            }
        }

        // Alternative versions of the dependee without this requirement,
        // and removal of the dependee itself
        if let Some(package_name) =
            dependee_package.filter(|name| name.as_str() != DUMMY_PACKAGE_NAME)
        {
            for &alternative in graph.family(&package_name) {
                if alternative != dependee && !graph.successors(alternative).contains(&broken) {
                    targets.push(TargetSpec::Element(alternative));
                }
            }
            if graph.can_package_be_removed(&package_name) {
                targets.push(TargetSpec::EmptyOf(package_name));
            }
        }
        targets
    }

    /// Build the action choosing `target`, unless the choice is impossible.
    fn make_change_action(
        storage: &mut SolutionStorage<'_>,
        solution: &Solution,
        reason: &Reason,
        introduced_by: IntroducedBy,
        target: ElementId,
    ) -> Option<Action> {
        if solution.entry(target).is_some() {
            return None;
        }
        if let Err(offender) = storage.simulate_set_package_entry(solution, target) {
            trace!(
                candidate = %storage.graph().describe(target),
                offender = %storage.graph().describe(offender),
                "action discarded by simulation"
            );
            return None;
        }
        let (package_name, version) = match storage.graph().vertex(target) {
            Vertex::Version { version } => {
                (version.package_name.clone(), Some(Arc::clone(version)))
            }
            Vertex::Empty { package_name } => (package_name.clone(), None),
            Vertex::Relation { .. } | Vertex::AntiRelation { .. } => return None,
        };
        Some(Action {
            package_name,
            version,
            target,
            packages_to_stick: Vec::new(),
            fakely_satisfies: None,
            reason: reason.clone(),
            introduced_by: Some(introduced_by),
            profit: f64::NAN,
        })
    }

    /// What: Enumerate the candidate actions for one broken element.
    fn compute_actions(
        &self,
        storage: &mut SolutionStorage<'_>,
        solution: &Solution,
        dependee: ElementId,
        broken: ElementId,
    ) -> Vec<Action> {
        let reason = Self::reason_for(storage, dependee, broken);
        let introduced_by = IntroducedBy {
            version_element: dependee,
            broken_element: broken,
        };
        let specs = Self::candidate_targets(storage.graph(), solution, dependee, broken);

        let mut actions = Vec::new();
        let mut seen: BTreeSet<ElementId> = BTreeSet::new();
        for spec in specs {
            let target = match spec {
                TargetSpec::Element(element) => element,
                TargetSpec::EmptyOf(package_name) => {
                    storage.graph_mut().get_or_create_empty_element(&package_name)
                }
            };
            if !seen.insert(target) {
                continue;
            }
            if let Some(action) =
                Self::make_change_action(storage, solution, &reason, introduced_by, target)
            {
                actions.push(action);
            }
        }

        // A broken soft relation may be ignored at a price
        if storage.graph().is_soft(broken) {
            let package_name = storage
                .graph()
                .package_of(dependee)
                .unwrap_or(DUMMY_PACKAGE_NAME)
                .to_string();
            actions.push(Action {
                package_name,
                version: None,
                target: dependee,
                packages_to_stick: Vec::new(),
                fakely_satisfies: Some((dependee, broken)),
                reason: reason.clone(),
                introduced_by: None,
                profit: f64::NAN,
            });
        }
        actions
    }

    /// What: Check that binaries related to an action's version can move to
    /// the same source version.
    fn can_related_packages_be_synchronized(
        storage: &mut SolutionStorage<'_>,
        solution: &Solution,
        version: &Arc<Version>,
    ) -> bool {
        let Some(payload) = version.as_binary() else {
            return true;
        };
        let source_package = payload.source_package_name.clone();
        let source_version = payload.source_version_string.clone();
        if source_package.is_empty() {
            return true;
        }
        let mut related: Vec<(ElementId, String)> = Vec::new();
        for (element, _) in solution.entries() {
            let Some(other) = storage.graph().version_of(element) else {
                continue;
            };
            if other.package_name == version.package_name {
                continue;
            }
            let Some(other_payload) = other.as_binary() else {
                continue;
            };
            if other_payload.source_package_name == source_package
                && other_payload.source_version_string != source_version
            {
                related.push((element, other.package_name.clone()));
            }
        }
        for (_, package_name) in related {
            let family = storage.graph().family(&package_name).to_vec();
            let feasible = family.into_iter().any(|alternative| {
                let matches = storage.graph().version_of(alternative).is_some_and(|alt| {
                    alt.as_binary()
                        .is_some_and(|p| p.source_version_string == source_version)
                });
                matches
                    && storage
                        .simulate_set_package_entry(solution, alternative)
                        .is_ok()
            });
            if !feasible {
                return false;
            }
        }
        true
    }

    /// Drop actions whose related packages cannot move together under the
    /// hard synchronization policy.
    fn filter_unsynchronizeable_actions(
        &self,
        storage: &mut SolutionStorage<'_>,
        solution: &Solution,
        actions: Vec<Action>,
    ) -> Vec<Action> {
        if self.config.synchronize_source_versions != SynchronizeSourceVersions::Hard {
            return actions;
        }
        actions
            .into_iter()
            .filter(|action| {
                action.version.as_ref().is_none_or(|version| {
                    Self::can_related_packages_be_synchronized(storage, solution, version)
                })
            })
            .collect()
    }

    /// Fill in the profit of every action.
    fn calculate_profits(
        &self,
        storage: &mut SolutionStorage<'_>,
        solution: &Solution,
        actions: &mut [Action],
    ) {
        for action in actions.iter_mut() {
            if let Some((_, relation)) = action.fakely_satisfies {
                let score = &self.config.score;
                action.profit = match storage.graph().vertex(relation) {
                    Vertex::Relation { kind, .. } if *kind == RelationType::Suggests => {
                        -score.break_suggests_penalty
                    }
                    _ => -score.break_recommends_penalty,
                };
                continue;
            }
            let old_version = storage
                .conflicting_elements(action.target)
                .into_iter()
                .filter(|member| *member != action.target)
                .find(|member| solution.entry(*member).is_some())
                .and_then(|member| storage.graph().version_of(member).cloned());
            action.profit = self.action_profit(old_version.as_ref(), action.version.as_ref());
        }
    }

    /// What: Apply one action to a freshly cloned solution.
    fn apply_action(
        &self,
        storage: &mut SolutionStorage<'_>,
        child: &mut Solution,
        action: &Action,
    ) {
        trace!(
            solution = child.id,
            package = %action.package_name,
            reason = %action.reason,
            profit = action.profit,
            "applying action"
        );
        if let Some((dependee, relation)) = action.fakely_satisfies {
            if let Some(existing) = child.entry(dependee) {
                let mut entry = (**existing).clone();
                entry
                    .broken_successors
                    .retain(|broken| broken.element != relation);
                entry.faked_successors.insert(relation);
                child.insert(dependee, entry);
            }
            child.score += action.profit;
            return;
        }

        let displaced = storage
            .conflicting_elements(action.target)
            .into_iter()
            .filter(|member| *member != action.target)
            .find(|member| child.entry(*member).is_some());

        storage.set_package_entry(
            child,
            action.target,
            PackageEntry {
                sticked: true,
                ..PackageEntry::default()
            },
            action.introduced_by,
        );

        // Refresh broken-successor lists of everything pointing at the
        // changed family members, then of the new element itself
        let mut affected_relations: BTreeSet<ElementId> = BTreeSet::new();
        affected_relations.extend(storage.graph().predecessors(action.target).iter().copied());
        if let Some(displaced) = displaced {
            affected_relations.extend(storage.graph().predecessors(displaced).iter().copied());
        }
        let mut declarers: BTreeSet<ElementId> = BTreeSet::new();
        for relation in affected_relations {
            declarers.extend(storage.graph().predecessors(relation).iter().copied());
        }
        declarers.insert(action.target);
        for declarer in declarers {
            let Some(existing) = child.entry(declarer) else {
                continue;
            };
            let faked = existing.faked_successors.clone();
            let mut entry = (**existing).clone();
            entry.broken_successors = storage.compute_broken_successors(child, declarer, &faked);
            child.insert(declarer, entry);
        }

        for package_name in &action.packages_to_stick {
            let family = storage.graph().family(package_name).to_vec();
            for member in family {
                if let Some(existing) = child.entry(member) {
                    let mut entry = (**existing).clone();
                    entry.sticked = true;
                    child.insert(member, entry);
                }
            }
        }
        child.score += action.profit;
    }

    /// What: Mark unused automatically installed packages for removal.
    ///
    /// Details:
    /// - A chosen version survives when it is reachable over hard relations
    ///   from a manually installed, user-requested or essential chosen
    ///   version; everything else that is automatically installed is
    ///   switched to its empty element with the autoremoved mark.
    fn clean_automatically_installed(
        &self,
        storage: &mut SolutionStorage<'_>,
        solution: &mut Solution,
    ) {
        let mut chosen: Vec<(ElementId, Arc<Version>)> = Vec::new();
        for (element, _) in solution.entries() {
            if let Some(version) = storage.graph().version_of(element) {
                chosen.push((element, Arc::clone(version)));
            }
        }

        let mut queue: Vec<ElementId> = Vec::new();
        for (element, version) in &chosen {
            let name = version.package_name.as_str();
            let manual = name == DUMMY_PACKAGE_NAME
                || self.to_install.contains_key(name)
                || (self.cache.is_installed(name)
                    && !self.cache.is_automatically_installed(name))
                || version.as_binary().is_some_and(|payload| payload.essential);
            if manual {
                queue.push(*element);
            }
        }

        let mut reachable: BTreeSet<ElementId> = queue.iter().copied().collect();
        while let Some(element) = queue.pop() {
            for &successor in storage.graph().successors(element) {
                let hard = matches!(
                    storage.graph().vertex(successor),
                    Vertex::Relation { priority, .. } if *priority >= PRIORITY_DEPENDS
                );
                if !hard {
                    continue;
                }
                for &satisfier in storage.graph().successors(successor) {
                    if solution.entry(satisfier).is_some() && reachable.insert(satisfier) {
                        queue.push(satisfier);
                    }
                }
            }
        }

        for (element, version) in chosen {
            if reachable.contains(&element) {
                continue;
            }
            if !self.cache.is_automatically_installed(&version.package_name) {
                continue;
            }
            debug!(package = %version.package_name, "marking for auto-removal");
            let empty = storage
                .graph_mut()
                .get_or_create_empty_element(&version.package_name);
            storage.set_package_entry(
                solution,
                empty,
                PackageEntry {
                    sticked: true,
                    autoremoved: true,
                    ..PackageEntry::default()
                },
                None,
            );
        }
    }

    /// Assemble the read-only proposal view of a complete solution.
    fn build_view(
        storage: &SolutionStorage<'_>,
        solution: &Solution,
        installed_names: &BTreeSet<String>,
    ) -> SolutionView {
        debug_assert!(solution.finished);
        let mut chosen = BTreeMap::new();
        let mut removed = BTreeSet::new();
        let mut autoremoved = BTreeSet::new();
        let mut reasons = BTreeMap::new();
        for (element, entry) in solution.entries() {
            match storage.graph().vertex(element) {
                Vertex::Version { version } if version.package_name != DUMMY_PACKAGE_NAME => {
                    chosen.insert(version.package_name.clone(), Arc::clone(version));
                    if let Some(introduced) = entry.introduced_by {
                        reasons.insert(
                            version.package_name.clone(),
                            Self::reason_for(
                                storage,
                                introduced.version_element,
                                introduced.broken_element,
                            ),
                        );
                    }
                }
                Vertex::Empty { package_name } => {
                    if entry.autoremoved {
                        autoremoved.insert(package_name.clone());
                        reasons.insert(package_name.clone(), Reason::AutoRemoval);
                    }
                    if installed_names.contains(package_name) {
                        removed.insert(package_name.clone());
                        if let Some(introduced) = entry.introduced_by {
                            reasons.insert(
                                package_name.clone(),
                                Self::reason_for(
                                    storage,
                                    introduced.version_element,
                                    introduced.broken_element,
                                ),
                            );
                        }
                    }
                }
                _ => {}
            }
        }
        SolutionView {
            id: solution.id,
            score: solution.score,
            chosen,
            removed,
            autoremoved,
            reasons,
        }
    }

    /// What: Run the branching search and propose solutions.
    ///
    /// Inputs:
    /// - `callback`: Receives each complete solution; answers with
    ///   [`UserAnswer`].
    ///
    /// Output:
    /// - Returns `Ok(true)` when a proposal was accepted.
    /// - Returns `Ok(false)` when the user abandoned the search.
    /// - Fails with [`DebToolkitError::ResolverInfeasible`] when the
    ///   frontier runs dry without an accepted proposal.
    ///
    /// Details:
    /// - Given the same cache and requests, the proposal order is
    ///   deterministic: the chooser, the action enumeration order and the
    ///   tie-breaking are all fixed.
    pub fn resolve(
        &self,
        mut callback: impl FnMut(&SolutionView) -> UserAnswer,
    ) -> Result<bool> {
        let initial_state = self.import_initial_state();
        let installed_names: BTreeSet<String> = initial_state
            .iter()
            .filter(|(name, _)| self.cache.is_installed(name))
            .map(|(name, _)| name.clone())
            .collect();

        let mut graph = DependencyGraph::new(self.cache, &self.config);
        let seeds = graph.fill(&initial_state, &self.satisfy, &self.unsatisfy);
        let mut storage = SolutionStorage::new(graph);
        let mut initial_solution = storage.initial_solution();
        storage.prepare_for_resolving(&mut initial_solution, seeds);
        debug!(
            packages = initial_state.len(),
            "starting native resolver search"
        );

        let mut frontier: Vec<Solution> = vec![initial_solution];
        loop {
            let Some(index) = Self::choose_solution(&frontier) else {
                debug!("solution frontier exhausted");
                return Err(DebToolkitError::ResolverInfeasible);
            };
            let mut solution = frontier.remove(index);

            let Some((dependee, broken)) = Self::find_broken(&storage, &mut solution) else {
                solution.finished = true;
                if self.config.auto_clean {
                    self.clean_automatically_installed(&mut storage, &mut solution);
                }
                let view = Self::build_view(&storage, &solution, &installed_names);
                debug!(
                    solution = solution.id,
                    score = solution.score,
                    decisions = solution.inserted_elements.len(),
                    "proposing complete solution"
                );
                match callback(&view) {
                    UserAnswer::Accept => return Ok(true),
                    UserAnswer::Abandon => return Ok(false),
                    UserAnswer::Decline => continue,
                }
            };
            trace!(
                solution = solution.id,
                broken = %storage.graph().describe(broken),
                "expanding solution"
            );

            let actions = self.compute_actions(&mut storage, &solution, dependee, broken);
            let mut actions =
                self.filter_unsynchronizeable_actions(&mut storage, &solution, actions);
            self.calculate_profits(&mut storage, &solution, &mut actions);
            actions.sort_by(|left, right| {
                right
                    .profit
                    .total_cmp(&left.profit)
                    .then_with(|| left.package_name.cmp(&right.package_name))
                    .then_with(|| left.target.cmp(&right.target))
            });

            for index in 0..actions.len() {
                let mut child = storage.clone_solution(&solution);
                for prior in &actions[..index] {
                    if prior.fakely_satisfies.is_none() {
                        storage.set_rejection(&mut child, prior.target);
                    }
                }
                self.apply_action(&mut storage, &mut child, &actions[index]);
                frontier.push(child);
            }
            self.erase_worst_solutions(&mut frontier);
        }
    }
}
