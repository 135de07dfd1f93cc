//! Rust toolkit for Debian package management.
//!
//! This crate provides the core machinery of a high-level package manager:
//! a function-selector query engine for expressing set-algebraic queries
//! over binary and source package versions, and a native dependency
//! resolver that searches for a consistent installation state over a
//! dependency graph.
//!
//! Package catalogs, pin priorities and installation state are consumed
//! through the narrow [`cache::Cache`] trait; index file parsing, network
//! transport and disk state are out of scope.
//!
//! # Features
//!
//! - `query`: the function-selector query engine
//! - `resolver`: the native dependency resolver
//!
//! # Examples
//!
//! ## Evaluating a selector query
//!
//! ```
//! use deb_toolkit::cache::MockCache;
//! use deb_toolkit::query::{parse_query, select_all_versions, QueryKind};
//!
//! # fn example() -> deb_toolkit::Result<()> {
//! let cache = MockCache::new();
//! let selector = parse_query(
//!     "and(package:installed, not(package:automatically-installed))",
//!     QueryKind::Binary,
//! )?;
//! let versions = select_all_versions(&cache, &selector)?;
//! for version in versions {
//!     println!("{version}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Resolving an installation request
//!
//! ```
//! use deb_toolkit::cache::MockCache;
//! use deb_toolkit::resolver::{NativeResolver, ResolverConfig, UserAnswer};
//!
//! # fn example() -> deb_toolkit::Result<()> {
//! let cache = MockCache::new();
//! let resolver = NativeResolver::new(&cache, ResolverConfig::default());
//! let accepted = resolver.resolve(|proposal| {
//!     for (name, version) in proposal.chosen() {
//!         println!("{name} -> {}", version.version_string);
//!     }
//!     UserAnswer::Accept
//! })?;
//! # let _ = accepted;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod error;
pub mod types;

#[cfg(feature = "query")]
pub mod query;

#[cfg(feature = "resolver")]
pub mod resolver;

/// Prelude module for convenient imports.
///
/// This module re-exports commonly used types, traits and functions,
/// allowing you to import everything you need with a single
/// `use deb_toolkit::prelude::*;`.
pub mod prelude;

// Re-export commonly used types
pub use cache::{Cache, CacheConfig, MockCache};
pub use error::{DebToolkitError as Error, Result};
pub use types::{BinaryPayload, Package, Priority, Version, VersionKind};

#[cfg(feature = "query")]
pub use query::{parse_query, select_all_versions, select_best_versions, QueryKind, Selector};

#[cfg(feature = "resolver")]
pub use resolver::{NativeResolver, ResolverConfig, SolutionView, UserAnswer};
