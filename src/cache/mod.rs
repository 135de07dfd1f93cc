//! Package cache interface consumed by the query engine and the resolver.
//!
//! The toolkit core never parses index files itself; it reads catalogs,
//! pin priorities and installation state through the narrow [`Cache`]
//! trait. An in-memory implementation for tests and examples lives in
//! [`mock`].

pub mod mock;

use crate::types::{Package, RelationExpression, Version};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::sync::Arc;

pub use mock::MockCache;

/// Configuration for cache implementations.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether pinned-version lookups are memoized.
    ///
    /// The resolver performs many repeated pin lookups; construct its cache
    /// with memoization enabled.
    pub memoize: bool,
}

/// Read-only package catalog interface.
///
/// Implementations supply package and version catalogs, per-version pin
/// priorities, installation state and relation resolution. All data is
/// immutable from the point of view of the core.
pub trait Cache {
    /// What: List all known binary package names, sorted ascending.
    fn binary_package_names(&self) -> Vec<String>;

    /// What: List all known source package names, sorted ascending.
    fn source_package_names(&self) -> Vec<String>;

    /// What: Look up a binary package handle by name.
    fn binary_package(&self, name: &str) -> Option<&Package>;

    /// What: Look up a source package handle by name.
    fn source_package(&self, name: &str) -> Option<&Package>;

    /// What: Get a package's versions ordered best-first.
    ///
    /// Output:
    /// - Versions sorted by pin descending, then version string descending,
    ///   so the most preferred version comes first.
    fn sorted_pinned_versions(&self, package: &Package) -> Vec<Arc<Version>>;

    /// What: Get the pin priority of a version.
    fn pin(&self, version: &Version) -> i32;

    /// What: Resolve a relation expression to the versions satisfying it.
    ///
    /// Details:
    /// - Covers both real package names and virtual names provided by
    ///   binary versions; a provided virtual name satisfies only
    ///   unversioned relations.
    fn satisfying_versions(&self, expression: &RelationExpression) -> Vec<Arc<Version>>;

    /// What: Check whether some version of a package is installed.
    fn is_installed(&self, package_name: &str) -> bool;

    /// What: Check whether a package is marked as automatically installed.
    fn is_automatically_installed(&self, package_name: &str) -> bool;

    /// What: Get the installed version of a package, if any.
    fn installed_version(&self, package_name: &str) -> Option<Arc<Version>>;

    /// What: Get localized short and long descriptions for a binary version.
    ///
    /// Output:
    /// - Returns `None` when no localization is available; callers fall
    ///   back to the version's own description fields.
    fn localized_descriptions(&self, version: &Version) -> Option<(String, String)>;
}

/// What: Compare two versions in the canonical selection order.
///
/// Inputs:
/// - `cache`: Cache supplying pin priorities.
/// - `left`, `right`: Versions to compare.
///
/// Output:
/// - Returns `Ordering::Less` when `left` sorts before `right`.
///
/// Details:
/// - Orders by package name ascending, then pin descending, then version
///   string descending, so within one package the most preferred version
///   comes first.
/// - Every merge and set operation of the query engine uses this single
///   order, which keeps intersections and differences well-defined.
#[must_use]
pub fn spcv_cmp(cache: &dyn Cache, left: &Version, right: &Version) -> Ordering {
    left.package_name
        .cmp(&right.package_name)
        .then_with(|| cache.pin(right).cmp(&cache.pin(left)))
        .then_with(|| right.version_string.cmp(&left.version_string))
}
