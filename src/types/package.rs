//! Package and version data types.
//!
//! Versions are produced by an index parser, shared as `Arc<Version>` and
//! never mutated afterwards; the query engine and the resolver only read
//! them. Identity for set operations is `Arc` pointer identity, and
//! `(package_name, version_string)` is unique within one cache.

use crate::error::{DebToolkitError, Result};
use crate::types::relation::{RelationLine, RelationLines};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Package priority, as declared by the archive.
///
/// The order is total, with `Required` greatest; it is used for display and
/// for preference scoring.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Priority {
    /// Not part of any standard installation.
    #[default]
    Extra,
    /// Installed on request.
    Optional,
    /// Part of a standard installation.
    Standard,
    /// Expected on any reasonable system.
    Important,
    /// The system is unusable without it.
    Required,
}

impl Priority {
    /// What: Get the lowercase archive spelling of this priority.
    ///
    /// Output:
    /// - Returns the string used in index files and matched by
    ///   `version:priority` queries.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Required => "required",
            Self::Important => "important",
            Self::Standard => "standard",
            Self::Optional => "optional",
            Self::Extra => "extra",
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Priority {
    type Err = DebToolkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "required" => Ok(Self::Required),
            "important" => Ok(Self::Important),
            "standard" => Ok(Self::Standard),
            "optional" => Ok(Self::Optional),
            "extra" => Ok(Self::Extra),
            other => Err(DebToolkitError::Parse(format!(
                "unknown priority '{other}'"
            ))),
        }
    }
}

/// Hash algorithm of a file checksum.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HashKind {
    /// MD5 checksum.
    Md5,
    /// SHA-1 checksum.
    Sha1,
    /// SHA-256 checksum.
    Sha256,
}

/// A downloadable file with its size and checksums.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// File name without directory.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Checksums by algorithm.
    pub hash_sums: BTreeMap<HashKind, String>,
}

impl FileRecord {
    /// What: Compare checksums with another file record.
    ///
    /// Output:
    /// - Returns `true` when at least one algorithm is present on both sides
    ///   and every shared algorithm agrees.
    #[must_use]
    pub fn hashes_match(&self, other: &Self) -> bool {
        let mut shared = 0;
        for (kind, sum) in &self.hash_sums {
            if let Some(other_sum) = other.hash_sums.get(kind) {
                if sum != other_sum {
                    return false;
                }
                shared += 1;
            }
        }
        shared > 0
    }
}

/// Metadata of one archive release.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseInfo {
    /// Archive name (e.g., `"stable"`).
    pub archive: String,
    /// Release codename (e.g., `"bookworm"`).
    pub codename: String,
    /// Component (e.g., `"main"`).
    pub component: String,
    /// Release version string.
    pub version: String,
    /// Vendor name.
    pub vendor: String,
    /// Base URI the release is fetched from; empty for the installed
    /// system's own state.
    pub base_uri: String,
}

/// Where a version record came from: a release and a directory within it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    /// The release the version was listed in.
    pub release: Arc<ReleaseInfo>,
    /// Directory within the release.
    pub directory: String,
}

/// Binary-only version payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryPayload {
    /// Target architecture (e.g., `"amd64"` or `"all"`).
    pub architecture: String,
    /// Unpacked size in bytes.
    pub installed_size: u64,
    /// The package file itself.
    pub file: FileRecord,
    /// Name of the producing source package.
    pub source_package_name: String,
    /// Version string of the producing source package.
    pub source_version_string: String,
    /// Whether the package is essential and must never be removed.
    pub essential: bool,
    /// One-line description.
    pub short_description: String,
    /// Extended description.
    pub long_description: String,
    /// Virtual names this version provides.
    pub provides: Vec<String>,
    /// All relation lines.
    pub relations: RelationLines,
}

/// Source-only version payload.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourcePayload {
    /// Architectures the source builds for.
    pub architectures: Vec<String>,
    /// Binary package names the source produces.
    pub binary_names: Vec<String>,
    /// Upstream tarball files.
    pub tarball_files: Vec<FileRecord>,
    /// Debian diff files.
    pub diff_files: Vec<FileRecord>,
    /// Source control (dsc) files.
    pub dsc_files: Vec<FileRecord>,
    /// `Build-Depends` line.
    pub build_depends: RelationLine,
    /// `Build-Depends-Indep` line.
    pub build_depends_indep: RelationLine,
    /// `Build-Conflicts` line.
    pub build_conflicts: RelationLine,
    /// `Build-Conflicts-Indep` line.
    pub build_conflicts_indep: RelationLine,
}

/// Kind-specific payload of a version.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum VersionKind {
    /// A binary package version.
    Binary(BinaryPayload),
    /// A source package version.
    Source(SourcePayload),
}

/// A specific release of a package.
///
/// Common fields live directly on the struct; binary- and source-specific
/// data lives in [`VersionKind`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Version {
    /// Package name.
    pub package_name: String,
    /// Version string.
    pub version_string: String,
    /// Archive priority.
    pub priority: Priority,
    /// Maintainer name and address.
    pub maintainer: String,
    /// Archive section.
    pub section: String,
    /// Whether the version comes from a cryptographically verified source.
    pub trusted: bool,
    /// Releases the version was seen in; never empty.
    pub sources: Vec<SourceRecord>,
    /// Index fields not modeled explicitly, by field name.
    pub other_fields: BTreeMap<String, String>,
    /// Binary or source payload.
    pub kind: VersionKind,
}

impl Version {
    /// What: View the binary payload of this version.
    ///
    /// Output:
    /// - Returns `Some` for binary versions, `None` for source versions.
    #[must_use]
    pub const fn as_binary(&self) -> Option<&BinaryPayload> {
        match &self.kind {
            VersionKind::Binary(payload) => Some(payload),
            VersionKind::Source(_) => None,
        }
    }

    /// What: View the source payload of this version.
    #[must_use]
    pub const fn as_source(&self) -> Option<&SourcePayload> {
        match &self.kind {
            VersionKind::Source(payload) => Some(payload),
            VersionKind::Binary(_) => None,
        }
    }

    /// What: Check whether this version is the one installed on the system.
    ///
    /// Details:
    /// - A version is installed when its first source record points at the
    ///   system's own state, which carries an empty base URI.
    #[must_use]
    pub fn is_installed(&self) -> bool {
        self.sources
            .first()
            .is_some_and(|source| source.release.base_uri.is_empty())
    }

    /// What: Look up an unmodeled index field by name.
    #[must_use]
    pub fn other_field(&self, name: &str) -> &str {
        self.other_fields.get(name).map_or("", String::as_str)
    }

    /// What: Compare file checksums with another version.
    ///
    /// Output:
    /// - Returns `true` when both versions are of the same kind and their
    ///   file records agree.
    ///
    /// Details:
    /// - Comparing a binary version with a source version is a programmer
    ///   error and fails with [`DebToolkitError::Internal`].
    pub fn are_hashes_equal(&self, other: &Self) -> Result<bool> {
        match (&self.kind, &other.kind) {
            (VersionKind::Binary(left), VersionKind::Binary(right)) => {
                Ok(left.file.hashes_match(&right.file))
            }
            (VersionKind::Source(left), VersionKind::Source(right)) => {
                let pairs = [
                    (&left.tarball_files, &right.tarball_files),
                    (&left.diff_files, &right.diff_files),
                    (&left.dsc_files, &right.dsc_files),
                ];
                Ok(pairs.iter().all(|(left_files, right_files)| {
                    left_files.len() == right_files.len()
                        && left_files
                            .iter()
                            .zip(right_files.iter())
                            .all(|(l, r)| l.hashes_match(r))
                }))
            }
            _ => Err(DebToolkitError::Internal(
                "are_hashes_equal: comparing versions of different kinds".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.package_name, self.version_string)
    }
}

/// A package handle: a name with all known versions of that name.
#[derive(Clone, Debug, Default)]
pub struct Package {
    /// Package name.
    pub name: String,
    /// Known versions, in no particular order.
    pub versions: Vec<Arc<Version>>,
}

impl Package {
    /// What: Find a version of this package by version string.
    #[must_use]
    pub fn version(&self, version_string: &str) -> Option<&Arc<Version>> {
        self.versions
            .iter()
            .find(|version| version.version_string == version_string)
    }

    /// What: Find the installed version of this package, if any.
    #[must_use]
    pub fn installed_version(&self) -> Option<&Arc<Version>> {
        self.versions.iter().find(|version| version.is_installed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn release(base_uri: &str) -> Arc<ReleaseInfo> {
        Arc::new(ReleaseInfo {
            archive: "stable".to_string(),
            codename: "bookworm".to_string(),
            component: "main".to_string(),
            version: "12".to_string(),
            vendor: "Debian".to_string(),
            base_uri: base_uri.to_string(),
        })
    }

    fn binary_version(name: &str, version: &str, base_uri: &str) -> Version {
        Version {
            package_name: name.to_string(),
            version_string: version.to_string(),
            priority: Priority::Optional,
            maintainer: "Maintainer <m@example.org>".to_string(),
            section: "utils".to_string(),
            trusted: true,
            sources: vec![SourceRecord {
                release: release(base_uri),
                directory: "pool/main".to_string(),
            }],
            other_fields: BTreeMap::new(),
            kind: VersionKind::Binary(BinaryPayload::default()),
        }
    }

    #[test]
    fn test_priority_ordering_and_strings() {
        assert!(Priority::Required > Priority::Important);
        assert!(Priority::Important > Priority::Standard);
        assert!(Priority::Standard > Priority::Optional);
        assert!(Priority::Optional > Priority::Extra);
        assert_eq!(Priority::Required.as_str(), "required");
        assert_eq!("extra".parse::<Priority>().ok(), Some(Priority::Extra));
        assert!("unknown".parse::<Priority>().is_err());
    }

    #[test]
    fn test_is_installed_from_base_uri() {
        assert!(binary_version("a", "1.0", "").is_installed());
        assert!(!binary_version("a", "1.0", "http://deb.debian.org/debian").is_installed());
    }

    #[test]
    fn test_hashes_match() {
        let mut left = FileRecord::default();
        left.hash_sums.insert(HashKind::Sha256, "aa".to_string());
        left.hash_sums.insert(HashKind::Md5, "bb".to_string());

        let mut right = FileRecord::default();
        right.hash_sums.insert(HashKind::Sha256, "aa".to_string());
        assert!(left.hashes_match(&right));

        right.hash_sums.insert(HashKind::Md5, "cc".to_string());
        assert!(!left.hashes_match(&right));

        // No shared algorithm means no match
        let empty = FileRecord::default();
        assert!(!left.hashes_match(&empty));
    }

    #[test]
    fn test_hash_comparison_rejects_kind_mismatch() {
        let binary = binary_version("a", "1.0", "");
        let source = Version {
            kind: VersionKind::Source(SourcePayload::default()),
            ..binary_version("a", "1.0", "")
        };
        assert!(binary.are_hashes_equal(&source).is_err());
        // Same kind but no shared checksum algorithm: comparable, not equal
        assert_eq!(
            binary
                .are_hashes_equal(&binary_version("a", "1.0", ""))
                .ok(),
            Some(false)
        );
    }

    #[test]
    fn test_package_lookups() {
        let package = Package {
            name: "a".to_string(),
            versions: vec![
                Arc::new(binary_version("a", "1.0", "http://deb.debian.org/debian")),
                Arc::new(binary_version("a", "2.0", "")),
            ],
        };
        assert_eq!(
            package.version("1.0").map(|v| v.version_string.as_str()),
            Some("1.0")
        );
        assert!(package.version("3.0").is_none());
        assert_eq!(
            package
                .installed_version()
                .map(|v| v.version_string.as_str()),
            Some("2.0")
        );
    }

    #[test]
    fn test_serde_roundtrip_version() {
        let version = binary_version("a", "1.0", "");
        let json = serde_json::to_string(&version).expect("serialization should succeed");
        let deserialized: Version =
            serde_json::from_str(&json).expect("deserialization should succeed");
        assert_eq!(version, deserialized);
    }
}
