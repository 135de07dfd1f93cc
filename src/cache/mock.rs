//! In-memory [`Cache`] implementation for testing purposes.

use super::{Cache, CacheConfig};
use crate::types::{Package, RelationExpression, Version, VersionKind};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// What: In-memory cache populated from explicit fixture data.
///
/// Inputs: None (created via `MockCache::new()` and `add_*` methods)
///
/// Output:
/// - `MockCache` instance implementing [`Cache`]
///
/// Details:
/// - Binary and source versions are routed by their [`VersionKind`].
/// - Pins default to 500 and can be overridden per version.
/// - Installation state is derived from the versions themselves; a version
///   whose first source release has an empty base URI counts as installed.
/// - With `CacheConfig::memoize` set, sorted pinned version lookups are
///   cached per package name.
#[derive(Debug, Default)]
pub struct MockCache {
    /// Cache configuration.
    config: CacheConfig,
    /// Binary packages by name.
    binary: BTreeMap<String, Package>,
    /// Source packages by name.
    source: BTreeMap<String, Package>,
    /// Names marked as automatically installed.
    auto_installed: Vec<String>,
    /// Pin overrides keyed by `(package_name, version_string)`.
    pins: HashMap<(String, String), i32>,
    /// Localized descriptions keyed by `(package_name, version_string)`.
    descriptions: HashMap<(String, String), (String, String)>,
    /// Memoized sorted pinned versions per package name.
    sorted_memo: RefCell<HashMap<String, Vec<Arc<Version>>>>,
}

/// Default pin priority for versions without an override.
const DEFAULT_PIN: i32 = 500;

impl MockCache {
    /// What: Create an empty mock cache with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What: Create an empty mock cache with the given configuration.
    #[must_use]
    pub fn with_config(config: CacheConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// What: Add a version to the catalog.
    ///
    /// Inputs:
    /// - `version`: Fully built version record.
    ///
    /// Output:
    /// - Returns the shared handle under which the version is stored.
    ///
    /// Details:
    /// - The version is routed to the binary or source catalog by its kind.
    /// - Clears the sorted-versions memo since the catalog changed.
    pub fn add_version(&mut self, version: Version) -> Arc<Version> {
        let catalog = match version.kind {
            VersionKind::Binary(_) => &mut self.binary,
            VersionKind::Source(_) => &mut self.source,
        };
        let handle = Arc::new(version);
        let package = catalog
            .entry(handle.package_name.clone())
            .or_insert_with(|| Package {
                name: handle.package_name.clone(),
                versions: Vec::new(),
            });
        package.versions.push(Arc::clone(&handle));
        self.sorted_memo.borrow_mut().clear();
        handle
    }

    /// What: Override the pin priority of one version.
    pub fn set_pin(&mut self, package_name: &str, version_string: &str, pin: i32) {
        self.pins
            .insert((package_name.to_string(), version_string.to_string()), pin);
        self.sorted_memo.borrow_mut().clear();
    }

    /// What: Mark a package as automatically installed.
    pub fn mark_automatically_installed(&mut self, package_name: &str) {
        if !self.auto_installed.iter().any(|name| name == package_name) {
            self.auto_installed.push(package_name.to_string());
        }
    }

    /// What: Store localized descriptions for one binary version.
    pub fn set_localized_descriptions(
        &mut self,
        package_name: &str,
        version_string: &str,
        short: &str,
        long: &str,
    ) {
        self.descriptions.insert(
            (package_name.to_string(), version_string.to_string()),
            (short.to_string(), long.to_string()),
        );
    }

    /// What: Sort a version list best-first by pin, then version string.
    fn sort_best_first(&self, versions: &mut [Arc<Version>]) {
        versions.sort_by(|left, right| {
            self.pin(right)
                .cmp(&self.pin(left))
                .then_with(|| right.version_string.cmp(&left.version_string))
        });
    }
}

impl Cache for MockCache {
    fn binary_package_names(&self) -> Vec<String> {
        self.binary.keys().cloned().collect()
    }

    fn source_package_names(&self) -> Vec<String> {
        self.source.keys().cloned().collect()
    }

    fn binary_package(&self, name: &str) -> Option<&Package> {
        self.binary.get(name)
    }

    fn source_package(&self, name: &str) -> Option<&Package> {
        self.source.get(name)
    }

    fn sorted_pinned_versions(&self, package: &Package) -> Vec<Arc<Version>> {
        if self.config.memoize {
            if let Some(sorted) = self.sorted_memo.borrow().get(&package.name) {
                return sorted.clone();
            }
        }
        let mut sorted = package.versions.clone();
        self.sort_best_first(&mut sorted);
        if self.config.memoize {
            self.sorted_memo
                .borrow_mut()
                .insert(package.name.clone(), sorted.clone());
        }
        sorted
    }

    fn pin(&self, version: &Version) -> i32 {
        self.pins
            .get(&(
                version.package_name.clone(),
                version.version_string.clone(),
            ))
            .copied()
            .unwrap_or(DEFAULT_PIN)
    }

    fn satisfying_versions(&self, expression: &RelationExpression) -> Vec<Arc<Version>> {
        let mut result: Vec<Arc<Version>> = Vec::new();
        for package in self.binary.values() {
            for version in &package.versions {
                let Some(payload) = version.as_binary() else {
                    continue;
                };
                let satisfies = expression.0.iter().any(|relation| {
                    if relation.package_name == version.package_name {
                        relation.is_satisfied_by(&version.version_string)
                    } else {
                        // Provided virtual names satisfy only unversioned relations
                        relation.constraint.is_none()
                            && payload.provides.iter().any(|p| *p == relation.package_name)
                    }
                });
                if satisfies && !result.iter().any(|found| Arc::ptr_eq(found, version)) {
                    result.push(Arc::clone(version));
                }
            }
        }
        result
    }

    fn is_installed(&self, package_name: &str) -> bool {
        self.binary
            .get(package_name)
            .is_some_and(|package| package.installed_version().is_some())
    }

    fn is_automatically_installed(&self, package_name: &str) -> bool {
        self.auto_installed.iter().any(|name| name == package_name)
    }

    fn installed_version(&self, package_name: &str) -> Option<Arc<Version>> {
        self.binary
            .get(package_name)
            .and_then(|package| package.installed_version().cloned())
    }

    fn localized_descriptions(&self, version: &Version) -> Option<(String, String)> {
        self.descriptions
            .get(&(
                version.package_name.clone(),
                version.version_string.clone(),
            ))
            .cloned()
    }
}
