//! Selector tree and evaluation against a package cache.
//!
//! A parsed query is a [`Selector`] tree. Evaluation walks the tree with a
//! [`VersionSet`] describing the versions the current node may select from,
//! producing an ordered version sequence. The canonical order is
//! [`spcv_cmp`]: package name ascending, pin descending, version string
//! descending. Every merge and set operation below relies on that single
//! order, which makes evaluation deterministic and repeatable.

use crate::cache::{spcv_cmp, Cache};
use crate::error::{DebToolkitError, Result};
use crate::types::{BinaryPayload, RelationType, Version};
use regex::Regex;
use std::cell::OnceCell;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Version attribute matched by a regular expression.
#[derive(Clone, Debug)]
pub enum FieldKind {
    /// The version string itself.
    VersionString,
    /// Maintainer name and address.
    Maintainer,
    /// Priority spelling (`"required"`, .., `"extra"`).
    Priority,
    /// Archive section.
    Section,
    /// An unmodeled index field, by name.
    Other(String),
    /// Producing source package name (binary only).
    SourcePackage,
    /// Producing source version string (binary only).
    SourceVersion,
    /// Concatenated short and long description, localized when the cache
    /// provides a localization (binary only).
    Description,
}

/// Boolean version attribute.
#[derive(Clone, Copy, Debug)]
pub enum BoolKind {
    /// The version comes from a verified source.
    Trusted,
    /// The version is essential (binary only).
    Essential,
    /// This very version is installed (binary only).
    VersionInstalled,
    /// Some version of the package is installed (binary only).
    PackageInstalled,
    /// The package is marked automatically installed (binary only).
    PackageAutoInstalled,
}

/// Release attribute matched by a regular expression against any of the
/// version's source records.
#[derive(Clone, Copy, Debug)]
pub enum ReleaseFieldKind {
    /// Archive name.
    Archive,
    /// Release codename.
    Codename,
    /// Component.
    Component,
    /// Release version.
    Version,
    /// Vendor.
    Vendor,
    /// Base URI.
    Origin,
}

/// A node of a parsed selector query.
#[derive(Clone, Debug)]
pub enum Selector {
    /// Select versions whose package name matches the regex.
    PackageName(Regex),
    /// Keep versions whose attribute matches the regex.
    Field(FieldKind, Regex),
    /// Keep versions with any source record attribute matching the regex.
    ReleaseField(ReleaseFieldKind, Regex),
    /// Keep versions for which the predicate holds.
    Bool(BoolKind),
    /// Left-fold intersection of the children.
    And(Vec<Selector>),
    /// Ordered union of the children.
    Or(Vec<Selector>),
    /// Set difference of the input and the child.
    Not(Box<Selector>),
    /// Symmetric difference of the two children.
    Xor(Box<Selector>, Box<Selector>),
    /// Collapse to the best version per package.
    Best(Box<Selector>),
    /// Bind a variable to a value and evaluate the body with it.
    With {
        /// Variable name (read back via a `_name` token).
        name: String,
        /// Selector producing the variable value, evaluated unfiltered.
        value: Box<Selector>,
        /// Body evaluated with the variable in scope.
        body: Box<Selector>,
    },
    /// Read a variable defined by `With` or `Recursive`.
    Variable(String),
    /// Fixed-point iteration of `iter` seeded with `init`.
    Recursive {
        /// Variable name rebound on every iteration.
        name: String,
        /// Selector producing the initial variable value.
        init: Box<Selector>,
        /// Selector evaluated repeatedly until the result stops growing.
        iter: Box<Selector>,
    },
    /// Map each version to the versions satisfying its relations of the
    /// given type (binary only).
    Dependency(RelationType, Box<Selector>),
    /// Identity wrapper marking the root of a binary query.
    BinaryTag(Box<Selector>),
}

/// What: Compile a selector regular expression.
///
/// Details:
/// - Patterns match the whole input, as the query language requires, so the
///   pattern is anchored on both sides before compilation.
pub(crate) fn compile_regex(pattern: &str) -> Result<Regex> {
    Regex::new(&format!("^(?:{pattern})$"))
        .map_err(|_| DebToolkitError::InvalidRegex(pattern.to_string()))
}

/// Lazily computed version universe of one query evaluation.
///
/// The full universe is assembled at most once per evaluation; package
/// lists come from the cache in name order with each package's versions
/// already sorted best-first, which together yield the canonical order.
pub(crate) struct VersionSetGetter<'c> {
    /// Cache supplying catalogs and pins.
    cache: &'c dyn Cache,
    /// Binary universe if true, source universe otherwise.
    binary: bool,
    /// Memoized full universe.
    all: OnceCell<Vec<Arc<Version>>>,
}

impl<'c> VersionSetGetter<'c> {
    /// What: Create a getter over the binary or source universe.
    pub(crate) fn new(cache: &'c dyn Cache, binary: bool) -> Self {
        Self {
            cache,
            binary,
            all: OnceCell::new(),
        }
    }

    /// Sorted package names of the selected universe.
    fn package_names(&self) -> Vec<String> {
        if self.binary {
            self.cache.binary_package_names()
        } else {
            self.cache.source_package_names()
        }
    }

    /// Append all versions of one package, best version first.
    fn push_package(&self, name: &str, out: &mut Vec<Arc<Version>>) {
        let package = if self.binary {
            self.cache.binary_package(name)
        } else {
            self.cache.source_package(name)
        };
        if let Some(package) = package {
            out.extend(self.cache.sorted_pinned_versions(package));
        }
    }

    /// The full universe, computed on first use.
    fn all(&self) -> &[Arc<Version>] {
        self.all.get_or_init(|| {
            let mut result = Vec::new();
            for name in self.package_names() {
                self.push_package(&name, &mut result);
            }
            result
        })
    }

    /// Versions of all packages whose name matches the regex.
    fn get_matching(&self, regex: &Regex) -> Vec<Arc<Version>> {
        let mut result = Vec::new();
        for name in self.package_names() {
            if regex.is_match(&name) {
                self.push_package(&name, &mut result);
            }
        }
        result
    }
}

/// The set of versions a selector node evaluates against.
///
/// An unfiltered set reads the whole universe through the getter; a
/// filtered set carries an explicit ordered sequence. Variable bindings
/// travel with the set either way.
#[derive(Clone)]
pub(crate) struct VersionSet<'a, 'c> {
    /// Universe access.
    getter: &'a VersionSetGetter<'c>,
    /// Stored sequence when filtered, `None` when unfiltered.
    versions: Option<Vec<Arc<Version>>>,
    /// Variable bindings visible to this evaluation.
    variables: BTreeMap<String, Vec<Arc<Version>>>,
}

impl<'a, 'c> VersionSet<'a, 'c> {
    /// What: Create the unfiltered root set of an evaluation.
    pub(crate) fn new(getter: &'a VersionSetGetter<'c>) -> Self {
        Self {
            getter,
            versions: None,
            variables: BTreeMap::new(),
        }
    }

    /// A filtered set holding `versions`, sharing getter and variables.
    fn generate(&self, versions: Vec<Arc<Version>>) -> Self {
        Self {
            getter: self.getter,
            versions: Some(versions),
            variables: self.variables.clone(),
        }
    }

    /// An unfiltered set sharing getter and variables.
    fn unfiltered(&self) -> Self {
        Self {
            getter: self.getter,
            versions: None,
            variables: self.variables.clone(),
        }
    }

    /// Whether the set carries an explicit sequence.
    const fn is_filtered(&self) -> bool {
        self.versions.is_some()
    }

    /// The effective ordered sequence.
    fn get(&self) -> &[Arc<Version>] {
        match &self.versions {
            Some(versions) => versions,
            None => self.getter.all(),
        }
    }

    /// The effective sequence narrowed by a package name regex.
    fn get_matching(&self, regex: &Regex) -> Vec<Arc<Version>> {
        match &self.versions {
            Some(versions) => versions
                .iter()
                .filter(|version| regex.is_match(&version.package_name))
                .cloned()
                .collect(),
            None => self.getter.get_matching(regex),
        }
    }

    /// Bind a variable.
    fn set_variable(&mut self, name: String, versions: Vec<Arc<Version>>) {
        self.variables.insert(name, versions);
    }

    /// Read a variable, failing when it is not bound.
    fn variable(&self, name: &str) -> Result<&[Arc<Version>]> {
        self.variables
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| DebToolkitError::UndefinedVariable(name.to_string()))
    }
}

/// What: Merge a sorted sequence into an accumulator, dropping duplicates.
///
/// Details:
/// - Both inputs must already be in canonical order; the output is too.
/// - Versions comparing equal are the same object by cache uniqueness, so
///   one of the two is kept.
pub(crate) fn merge_unique(
    cache: &dyn Cache,
    main: &mut Vec<Arc<Version>>,
    other: Vec<Arc<Version>>,
) {
    if other.is_empty() {
        return;
    }
    if main.is_empty() {
        *main = other;
        return;
    }
    let left = std::mem::take(main);
    let mut left_iter = left.into_iter().peekable();
    let mut right_iter = other.into_iter().peekable();
    while let (Some(left_next), Some(right_next)) = (left_iter.peek(), right_iter.peek()) {
        match spcv_cmp(cache, left_next, right_next) {
            Ordering::Less => main.push(left_iter.next().expect("peeked")),
            Ordering::Greater => main.push(right_iter.next().expect("peeked")),
            Ordering::Equal => {
                main.push(left_iter.next().expect("peeked"));
                right_iter.next();
            }
        }
    }
    main.extend(left_iter);
    main.extend(right_iter);
}

/// Set intersection of two canonically ordered sequences.
fn intersection(
    cache: &dyn Cache,
    left: &[Arc<Version>],
    right: &[Arc<Version>],
) -> Vec<Arc<Version>> {
    let mut result = Vec::new();
    let mut left_index = 0;
    let mut right_index = 0;
    while left_index < left.len() && right_index < right.len() {
        match spcv_cmp(cache, &left[left_index], &right[right_index]) {
            Ordering::Less => left_index += 1,
            Ordering::Greater => right_index += 1,
            Ordering::Equal => {
                result.push(Arc::clone(&left[left_index]));
                left_index += 1;
                right_index += 1;
            }
        }
    }
    result
}

/// Set difference `left \ right` of two canonically ordered sequences.
fn difference(
    cache: &dyn Cache,
    left: &[Arc<Version>],
    right: &[Arc<Version>],
) -> Vec<Arc<Version>> {
    let mut result = Vec::new();
    let mut right_index = 0;
    for version in left {
        while right_index < right.len()
            && spcv_cmp(cache, &right[right_index], version) == Ordering::Less
        {
            right_index += 1;
        }
        let shared = right_index < right.len()
            && spcv_cmp(cache, &right[right_index], version) == Ordering::Equal;
        if !shared {
            result.push(Arc::clone(version));
        }
    }
    result
}

/// Symmetric difference of two canonically ordered sequences.
fn symmetric_difference(
    cache: &dyn Cache,
    left: &[Arc<Version>],
    right: &[Arc<Version>],
) -> Vec<Arc<Version>> {
    let mut result = Vec::new();
    let mut left_index = 0;
    let mut right_index = 0;
    while left_index < left.len() && right_index < right.len() {
        match spcv_cmp(cache, &left[left_index], &right[right_index]) {
            Ordering::Less => {
                result.push(Arc::clone(&left[left_index]));
                left_index += 1;
            }
            Ordering::Greater => {
                result.push(Arc::clone(&right[right_index]));
                right_index += 1;
            }
            Ordering::Equal => {
                left_index += 1;
                right_index += 1;
            }
        }
    }
    result.extend(left[left_index..].iter().cloned());
    result.extend(right[right_index..].iter().cloned());
    result
}

/// Constrain a sequence to a filtered input set; pass through otherwise.
fn filter_through(
    cache: &dyn Cache,
    versions: Vec<Arc<Version>>,
    from: &VersionSet<'_, '_>,
) -> Vec<Arc<Version>> {
    if from.is_filtered() {
        intersection(cache, from.get(), &versions)
    } else {
        versions
    }
}

/// Compute the string value of a matched field for one version.
fn field_value(kind: &FieldKind, cache: &dyn Cache, version: &Arc<Version>) -> Result<String> {
    fn binary(version: &Arc<Version>) -> Result<&BinaryPayload> {
        version.as_binary().ok_or_else(|| {
            DebToolkitError::Internal(
                "binary-only field selector evaluated against a source version".to_string(),
            )
        })
    }
    Ok(match kind {
        FieldKind::VersionString => version.version_string.clone(),
        FieldKind::Maintainer => version.maintainer.clone(),
        FieldKind::Priority => version.priority.as_str().to_string(),
        FieldKind::Section => version.section.clone(),
        FieldKind::Other(name) => version.other_field(name).to_string(),
        FieldKind::SourcePackage => binary(version)?.source_package_name.clone(),
        FieldKind::SourceVersion => binary(version)?.source_version_string.clone(),
        FieldKind::Description => {
            let payload = binary(version)?;
            let (localized_short, localized_long) =
                cache.localized_descriptions(version).unwrap_or_default();
            let short = if localized_short.is_empty() {
                &payload.short_description
            } else {
                &localized_short
            };
            let long = if localized_long.is_empty() {
                &payload.long_description
            } else {
                &localized_long
            };
            format!("{short}{long}")
        }
    })
}

/// Evaluate a boolean attribute for one version.
fn bool_value(kind: BoolKind, cache: &dyn Cache, version: &Arc<Version>) -> Result<bool> {
    fn binary(version: &Arc<Version>) -> Result<&BinaryPayload> {
        version.as_binary().ok_or_else(|| {
            DebToolkitError::Internal(
                "binary-only predicate evaluated against a source version".to_string(),
            )
        })
    }
    Ok(match kind {
        BoolKind::Trusted => version.trusted,
        BoolKind::Essential => binary(version)?.essential,
        BoolKind::VersionInstalled => version.is_installed(),
        BoolKind::PackageInstalled => cache.is_installed(&version.package_name),
        BoolKind::PackageAutoInstalled => {
            cache.is_automatically_installed(&version.package_name)
        }
    })
}

/// The release attribute of one source record.
fn release_field_value<'v>(
    kind: ReleaseFieldKind,
    record: &'v crate::types::SourceRecord,
) -> &'v str {
    match kind {
        ReleaseFieldKind::Archive => &record.release.archive,
        ReleaseFieldKind::Codename => &record.release.codename,
        ReleaseFieldKind::Component => &record.release.component,
        ReleaseFieldKind::Version => &record.release.version,
        ReleaseFieldKind::Vendor => &record.release.vendor,
        ReleaseFieldKind::Origin => &record.release.base_uri,
    }
}

impl Selector {
    /// What: Evaluate this selector against a version set.
    ///
    /// Inputs:
    /// - `cache`: Cache supplying catalogs, pins and relation resolution.
    /// - `from`: The set of versions this node may select from.
    ///
    /// Output:
    /// - Returns the selected versions in canonical order.
    ///
    /// Details:
    /// - Evaluation is pure: repeated calls with the same cache state yield
    ///   the identical sequence.
    pub(crate) fn select(
        &self,
        cache: &dyn Cache,
        from: &VersionSet<'_, '_>,
    ) -> Result<Vec<Arc<Version>>> {
        match self {
            Self::PackageName(regex) => Ok(from.get_matching(regex)),
            Self::Field(kind, regex) => {
                let mut result = Vec::new();
                for version in from.get() {
                    if regex.is_match(&field_value(kind, cache, version)?) {
                        result.push(Arc::clone(version));
                    }
                }
                Ok(result)
            }
            Self::ReleaseField(kind, regex) => Ok(from
                .get()
                .iter()
                .filter(|version| {
                    version
                        .sources
                        .iter()
                        .any(|record| regex.is_match(release_field_value(*kind, record)))
                })
                .cloned()
                .collect()),
            Self::Bool(kind) => {
                let mut result = Vec::new();
                for version in from.get() {
                    if bool_value(*kind, cache, version)? {
                        result.push(Arc::clone(version));
                    }
                }
                Ok(result)
            }
            Self::And(children) => {
                let mut children_iter = children.iter();
                let first = children_iter.next().ok_or_else(|| {
                    DebToolkitError::Internal("empty 'and' selector".to_string())
                })?;
                let mut accumulator = first.select(cache, from)?;
                for child in children_iter {
                    let narrowed = from.generate(accumulator);
                    accumulator = child.select(cache, &narrowed)?;
                }
                Ok(accumulator)
            }
            Self::Or(children) => {
                let mut children_iter = children.iter();
                let first = children_iter.next().ok_or_else(|| {
                    DebToolkitError::Internal("empty 'or' selector".to_string())
                })?;
                let mut accumulator = first.select(cache, from)?;
                for child in children_iter {
                    let part = child.select(cache, from)?;
                    merge_unique(cache, &mut accumulator, part);
                }
                Ok(accumulator)
            }
            Self::Not(child) => {
                let excluded = child.select(cache, from)?;
                Ok(difference(cache, from.get(), &excluded))
            }
            Self::Xor(left, right) => {
                let left_versions = left.select(cache, from)?;
                let right_versions = right.select(cache, from)?;
                Ok(symmetric_difference(cache, &left_versions, &right_versions))
            }
            Self::Best(child) => {
                let mut result = child.select(cache, from)?;
                result.dedup_by(|next, prev| next.package_name == prev.package_name);
                Ok(result)
            }
            Self::With { name, value, body } => {
                let value_versions = value.select(cache, &from.unfiltered())?;
                let mut modified = from.clone();
                modified.set_variable(name.clone(), value_versions);
                body.select(cache, &modified)
            }
            Self::Variable(name) => {
                let stored = from.variable(name)?.to_vec();
                Ok(filter_through(cache, stored, from))
            }
            Self::Recursive { name, init, iter } => {
                // Fixed point seeded with the initial value; grows until the
                // iterating selector stops contributing new versions
                let mut result = init.select(cache, &from.unfiltered())?;
                loop {
                    let previous_len = result.len();
                    let mut iteration = from.unfiltered();
                    iteration.set_variable(name.clone(), result.clone());
                    let step = iter.select(cache, &iteration)?;
                    merge_unique(cache, &mut result, step);
                    if result.len() == previous_len {
                        break;
                    }
                }
                Ok(filter_through(cache, result, from))
            }
            Self::Dependency(kind, child) => {
                let mut result: Vec<Arc<Version>> = Vec::new();
                for version in child.select(cache, &from.unfiltered())? {
                    let payload = version.as_binary().ok_or_else(|| {
                        DebToolkitError::Internal(
                            "dependency transform applied to a source version".to_string(),
                        )
                    })?;
                    for expression in payload.relations.get(*kind) {
                        let mut satisfying = cache.satisfying_versions(expression);
                        satisfying.sort_by(|left, right| spcv_cmp(cache, left, right));
                        merge_unique(cache, &mut result, satisfying);
                    }
                }
                Ok(filter_through(cache, result, from))
            }
            Self::BinaryTag(child) => child.select(cache, from),
        }
    }
}
