//! Persistent solutions and their shared storage.
//!
//! A solution is an immutable snapshot plus a delta: a shared master map,
//! an added map and a removed set. Sibling branches of the search share the
//! master structurally; the delta is promoted into a squashed master when
//! it grows past half the master's size, which keeps lookups cheap without
//! copying the whole state on every branch.

use crate::resolver::graph::{DependencyGraph, ElementId, Vertex};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// A successor element that must be satisfied but currently is not.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BrokenSuccessor {
    /// The unsatisfied relation-ish element.
    pub element: ElementId,
    /// Its priority; higher priorities are attacked first.
    pub priority: u32,
}

/// The `(version element, broken element)` pair explaining why an entry was
/// chosen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct IntroducedBy {
    /// Version element whose broken successor triggered the choice.
    pub version_element: ElementId,
    /// The broken successor itself.
    pub broken_element: ElementId,
}

/// Per-element bookkeeping of one solution.
#[derive(Clone, Debug, Default)]
pub(crate) struct PackageEntry {
    /// The element may not be changed along this branch.
    pub sticked: bool,
    /// The element was switched to absence by auto-clean.
    pub autoremoved: bool,
    /// Successors currently unsatisfied, with priorities.
    pub broken_successors: Vec<BrokenSuccessor>,
    /// Successors ignored by policy; never re-reported as broken.
    pub faked_successors: BTreeSet<ElementId>,
    /// Family elements that must not be chosen later on this branch.
    pub rejected_conflictors: BTreeSet<ElementId>,
    /// Why this element was chosen; `None` for initial state.
    pub introduced_by: Option<IntroducedBy>,
}

impl PackageEntry {
    /// What: Check whether switching the family to `element` is allowed.
    ///
    /// Details:
    /// - Sticked entries are fixed; rejected conflictors stay rejected.
    pub(crate) fn is_modification_allowed(&self, element: ElementId) -> bool {
        !self.sticked && !self.rejected_conflictors.contains(&element)
    }
}

/// A candidate assignment of chosen elements, with structural sharing.
#[derive(Debug)]
pub(crate) struct Solution {
    /// Monotonic identifier; lower means created earlier.
    pub id: u64,
    /// Depth in the search tree.
    pub level: u32,
    /// Whether the solution has no broken successors left.
    pub finished: bool,
    /// Accumulated preference score.
    pub score: f64,
    /// Shared base snapshot.
    master: Arc<BTreeMap<ElementId, Arc<PackageEntry>>>,
    /// Entries added or changed relative to the master.
    added: BTreeMap<ElementId, Arc<PackageEntry>>,
    /// Master keys masked out.
    removed: BTreeSet<ElementId>,
    /// Elements in insertion order.
    pub inserted_elements: Vec<ElementId>,
}

impl Solution {
    /// The empty initial solution.
    fn new(id: u64) -> Self {
        Self {
            id,
            level: 0,
            finished: false,
            score: 0.0,
            master: Arc::new(BTreeMap::new()),
            added: BTreeMap::new(),
            removed: BTreeSet::new(),
            inserted_elements: Vec::new(),
        }
    }

    /// What: Look up the effective entry of an element.
    ///
    /// Details:
    /// - The effective view is `added` over `master \ removed`.
    pub(crate) fn entry(&self, element: ElementId) -> Option<&Arc<PackageEntry>> {
        if let Some(entry) = self.added.get(&element) {
            return Some(entry);
        }
        if self.removed.contains(&element) {
            return None;
        }
        self.master.get(&element)
    }

    /// What: Collect every effective `(element, entry)` pair exactly once,
    /// ordered by element id.
    pub(crate) fn entries(&self) -> Vec<(ElementId, &Arc<PackageEntry>)> {
        let mut result = Vec::with_capacity(self.master.len() + self.added.len());
        for (element, entry) in self.master.iter() {
            if !self.removed.contains(element) && !self.added.contains_key(element) {
                result.push((*element, entry));
            }
        }
        for (element, entry) in &self.added {
            result.push((*element, entry));
        }
        result.sort_by_key(|(element, _)| *element);
        result
    }

    /// Every element with an effective entry, ordered by element id.
    pub(crate) fn elements(&self) -> Vec<ElementId> {
        self.entries().into_iter().map(|(element, _)| element).collect()
    }

    /// Insert or replace an entry.
    pub(crate) fn insert(&mut self, element: ElementId, entry: PackageEntry) {
        let fresh = self.entry(element).is_none();
        self.added.insert(element, Arc::new(entry));
        self.removed.remove(&element);
        if fresh {
            self.inserted_elements.push(element);
        }
    }

    /// Drop the effective entry of an element.
    fn remove(&mut self, element: ElementId) {
        self.added.remove(&element);
        if self.master.contains_key(&element) {
            self.removed.insert(element);
        }
    }
}

/// Shared solution machinery: id allocation, cloning with structural
/// sharing, and entry manipulation against the dependency graph.
pub(crate) struct SolutionStorage<'c> {
    /// Next solution id to hand out.
    next_free_id: u64,
    /// The dependency graph all solutions refer into.
    graph: DependencyGraph<'c>,
}

impl<'c> SolutionStorage<'c> {
    /// What: Create storage over a filled dependency graph.
    pub(crate) fn new(graph: DependencyGraph<'c>) -> Self {
        Self {
            next_free_id: 0,
            graph,
        }
    }

    /// The dependency graph.
    pub(crate) fn graph(&self) -> &DependencyGraph<'c> {
        &self.graph
    }

    /// Mutable access to the dependency graph (lazy empty elements).
    pub(crate) fn graph_mut(&mut self) -> &mut DependencyGraph<'c> {
        &mut self.graph
    }

    /// Allocate the next solution id.
    fn allocate_id(&mut self) -> u64 {
        let id = self.next_free_id;
        self.next_free_id += 1;
        id
    }

    /// What: Create the empty initial solution.
    pub(crate) fn initial_solution(&mut self) -> Solution {
        Solution::new(self.allocate_id())
    }

    /// What: Seed a fresh solution with initial entries and compute their
    /// broken successors.
    ///
    /// Details:
    /// - For entries flagged as unmodified initial state, soft relations
    ///   that are already broken are recorded as faked instead, so the
    ///   search does not try to repair a state the user never touched.
    pub(crate) fn prepare_for_resolving(
        &mut self,
        solution: &mut Solution,
        seeds: Vec<(ElementId, PackageEntry, bool)>,
    ) {
        let mut ignore_soft: BTreeSet<ElementId> = BTreeSet::new();
        for (element, entry, keep_soft_broken) in seeds {
            if keep_soft_broken {
                ignore_soft.insert(element);
            }
            solution.insert(element, entry);
        }
        for element in solution.elements() {
            let broken = self.compute_broken_successors(solution, element, &BTreeSet::new());
            if let Some(existing) = solution.entry(element) {
                let mut entry = (**existing).clone();
                if ignore_soft.contains(&element) {
                    for successor in &broken {
                        if self.graph.is_soft(successor.element) {
                            entry.faked_successors.insert(successor.element);
                        }
                    }
                    entry.broken_successors = broken
                        .into_iter()
                        .filter(|successor| !self.graph.is_soft(successor.element))
                        .collect();
                } else {
                    entry.broken_successors = broken;
                }
                solution.insert(element, entry);
            }
        }
    }

    /// What: Clone a solution for branching.
    ///
    /// Details:
    /// - When the parent's delta has grown to half its master, the delta is
    ///   squashed into a fresh master first; otherwise master, added and
    ///   removed are shared or copied as-is. The policy is deterministic.
    pub(crate) fn clone_solution(&mut self, parent: &Solution) -> Solution {
        let promote = parent.added.len() >= 8 && parent.added.len() * 2 >= parent.master.len();
        let (master, added, removed) = if promote {
            let mut squashed = (*parent.master).clone();
            for element in &parent.removed {
                squashed.remove(element);
            }
            for (element, entry) in &parent.added {
                squashed.insert(*element, Arc::clone(entry));
            }
            (Arc::new(squashed), BTreeMap::new(), BTreeSet::new())
        } else {
            (
                Arc::clone(&parent.master),
                parent.added.clone(),
                parent.removed.clone(),
            )
        };
        Solution {
            id: self.allocate_id(),
            level: parent.level + 1,
            finished: false,
            score: parent.score,
            master,
            added,
            removed,
            inserted_elements: parent.inserted_elements.clone(),
        }
    }

    /// What: All elements of the family a version or empty element belongs
    /// to, including the element itself and the empty element.
    pub(crate) fn conflicting_elements(&mut self, element: ElementId) -> Vec<ElementId> {
        let Some(package_name) = self.graph.package_of(element).map(str::to_string) else {
            return vec![element];
        };
        let mut result = self.graph.family(&package_name).to_vec();
        let empty = self.graph.get_or_create_empty_element(&package_name);
        result.push(empty);
        result
    }

    /// What: Check whether an element is satisfied in a solution.
    ///
    /// Details:
    /// - A relation element is satisfied when any related version is chosen.
    /// - An anti-relation element is satisfied when none is chosen.
    /// - A version or empty element is satisfied when it is itself chosen.
    pub(crate) fn verify_element(&self, solution: &Solution, element: ElementId) -> bool {
        match self.graph.vertex(element) {
            Vertex::Version { .. } | Vertex::Empty { .. } => solution.entry(element).is_some(),
            Vertex::Relation { .. } => self
                .graph
                .successors(element)
                .iter()
                .any(|related| solution.entry(*related).is_some()),
            Vertex::AntiRelation { .. } => self
                .graph
                .successors(element)
                .iter()
                .all(|related| solution.entry(*related).is_none()),
        }
    }

    /// What: Compute the broken successors of a chosen element.
    ///
    /// Inputs:
    /// - `faked`: Successors ignored by policy, never reported broken.
    pub(crate) fn compute_broken_successors(
        &self,
        solution: &Solution,
        element: ElementId,
        faked: &BTreeSet<ElementId>,
    ) -> Vec<BrokenSuccessor> {
        self.graph
            .successors(element)
            .iter()
            .filter(|successor| !faked.contains(successor))
            .filter(|successor| !self.verify_element(solution, **successor))
            .map(|successor| BrokenSuccessor {
                element: *successor,
                priority: self.graph.priority(*successor),
            })
            .collect()
    }

    /// What: Predict whether choosing an element would clash with a fixed
    /// or rejecting family member.
    ///
    /// Output:
    /// - Returns `Err(offender)` naming the conflicting element, `Ok(())`
    ///   otherwise.
    pub(crate) fn simulate_set_package_entry(
        &mut self,
        solution: &Solution,
        element: ElementId,
    ) -> Result<(), ElementId> {
        for conflictor in self.conflicting_elements(element) {
            if conflictor == element {
                continue;
            }
            if let Some(entry) = solution.entry(conflictor) {
                if !entry.is_modification_allowed(element) {
                    return Err(conflictor);
                }
            }
        }
        Ok(())
    }

    /// What: Record that an element must not be chosen later on this
    /// branch.
    ///
    /// Details:
    /// - The rejection is stored on the family's current entry; a family
    ///   with no chosen member records it on its empty element.
    pub(crate) fn set_rejection(&mut self, solution: &mut Solution, element: ElementId) {
        let family = self.conflicting_elements(element);
        let chosen = family
            .iter()
            .copied()
            .find(|member| solution.entry(*member).is_some());
        match chosen {
            Some(member) => {
                if let Some(existing) = solution.entry(member) {
                    let mut entry = (**existing).clone();
                    entry.rejected_conflictors.insert(element);
                    solution.insert(member, entry);
                }
            }
            None => {
                let Some(package_name) = self.graph.package_of(element).map(str::to_string)
                else {
                    return;
                };
                let empty = self.graph.get_or_create_empty_element(&package_name);
                let mut entry = PackageEntry::default();
                entry.rejected_conflictors.insert(element);
                solution.insert(empty, entry);
            }
        }
    }

    /// What: Choose an element, displacing the family's previous choice.
    ///
    /// Details:
    /// - The previous choice's rejections are inherited, and every other
    ///   family member is marked rejected, so the family is never flipped
    ///   back and forth along one branch.
    pub(crate) fn set_package_entry(
        &mut self,
        solution: &mut Solution,
        element: ElementId,
        mut entry: PackageEntry,
        introduced_by: Option<IntroducedBy>,
    ) {
        entry.introduced_by = introduced_by;
        let family = self.conflicting_elements(element);
        for member in &family {
            if *member == element {
                continue;
            }
            if let Some(previous) = solution.entry(*member) {
                entry
                    .rejected_conflictors
                    .extend(previous.rejected_conflictors.iter().copied());
                solution.remove(*member);
            }
        }
        for member in &family {
            if *member != element {
                entry.rejected_conflictors.insert(*member);
            }
        }
        solution.insert(element, entry);
    }
}
