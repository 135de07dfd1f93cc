//! Function-selector query engine.
//!
//! The query engine parses a compact textual query language into a tree of
//! selector nodes and evaluates that tree against a package cache,
//! producing an ordered sequence of versions.
//!
//! # Overview
//!
//! The query language is a prefix functional notation. Atoms select by
//! package attributes (`package:name(/^lib/)`, `package:installed`),
//! version attributes (`version:maintainer`, `version:trusted`) or release
//! attributes (`release:archive(stable)`). Combinators compose selections
//! (`and`, `or`, `not`, `xor`, `best`), `with` and `recursive` introduce
//! variables, and dependency transforms (`depends(x)`, `pre-depends(x)`)
//! map selections across relations. See [`QueryParser`] for the full
//! surface, including the short aliases like `p:n` and `vr:d`.
//!
//! # Examples
//!
//! ## Installed packages that were not installed automatically
//!
//! ```
//! use deb_toolkit::cache::MockCache;
//! use deb_toolkit::query::{parse_query, select_all_versions, QueryKind};
//!
//! # fn example() -> deb_toolkit::error::Result<()> {
//! let cache = MockCache::new();
//! let selector = parse_query(
//!     "and(package:installed, not(package:automatically-installed))",
//!     QueryKind::Binary,
//! )?;
//! let versions = select_all_versions(&cache, &selector)?;
//! println!("{} versions selected", versions.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## A package with its installed dependency closure
//!
//! ```
//! use deb_toolkit::cache::MockCache;
//! use deb_toolkit::query::{parse_query, select_all_versions, QueryKind};
//!
//! # fn example() -> deb_toolkit::error::Result<()> {
//! let cache = MockCache::new();
//! let selector = parse_query(
//!     "package-with-dependencies(package:name(/^bash$/))",
//!     QueryKind::Binary,
//! )?;
//! let versions = select_all_versions(&cache, &selector)?;
//! # Ok(())
//! # }
//! ```

mod parse;
mod select;

pub use parse::{QueryKind, QueryParser};
pub use select::{BoolKind, FieldKind, ReleaseFieldKind, Selector};

use crate::cache::Cache;
use crate::error::Result;
use crate::types::Version;
use select::{VersionSet, VersionSetGetter};
use std::sync::Arc;
use tracing::debug;

/// What: Parse a query string with a fresh parser session.
///
/// Inputs:
/// - `query`: The query text.
/// - `kind`: Universe the query runs against.
///
/// Output:
/// - Returns the parsed selector tree.
///
/// Details:
/// - Convenience wrapper over [`QueryParser::parse`] for one-off queries;
///   reuse a [`QueryParser`] to keep anonymous variable numbering unique
///   across several queries.
pub fn parse_query(query: &str, kind: QueryKind) -> Result<Selector> {
    QueryParser::new().parse(query, kind)
}

/// What: Evaluate a selector against the cache and return all selected
/// versions.
///
/// Inputs:
/// - `cache`: Cache supplying catalogs, pins and relation resolution.
/// - `selector`: Parsed selector tree.
///
/// Output:
/// - Returns the selected versions in canonical order: package name
///   ascending, then pin descending, then version string descending.
///
/// Details:
/// - The universe (binary or source) is chosen by the [`Selector::BinaryTag`]
///   marker the parser placed at the root.
/// - Evaluation is deterministic: the same cache state and selector always
///   produce the identical sequence.
pub fn select_all_versions(cache: &dyn Cache, selector: &Selector) -> Result<Vec<Arc<Version>>> {
    let binary = matches!(selector, Selector::BinaryTag(_));
    debug!(binary, "evaluating selector query");
    let getter = VersionSetGetter::new(cache, binary);
    let from = VersionSet::new(&getter);
    let result = selector.select(cache, &from)?;
    debug!(selected = result.len(), "selector query evaluated");
    Ok(result)
}

/// What: Evaluate a selector and keep only the best version per package.
///
/// Details:
/// - Selected versions are already ordered best-first within each package,
///   so collapsing to the first occurrence per package name suffices.
pub fn select_best_versions(cache: &dyn Cache, selector: &Selector) -> Result<Vec<Arc<Version>>> {
    let mut result = select_all_versions(cache, selector)?;
    result.dedup_by(|next, prev| next.package_name == prev.package_name);
    Ok(result)
}
