//! Native dependency resolver.
//!
//! Given an initial installation state plus user requests (installs,
//! removals, relation constraints), the resolver searches for a complete,
//! consistent assignment of package to version (or to absence) satisfying
//! every hard relation while maximizing a preference score. Complete
//! solutions are proposed to a user callback one by one; the callback
//! accepts, declines or abandons.
//!
//! # Overview
//!
//! The search is built around four pieces:
//!
//! - a dependency graph of elements (version, relation, anti-relation and
//!   empty-package vertices) over the reachable package universe,
//! - persistent solutions sharing common prefix state across sibling
//!   branches,
//! - a frontier of candidate solutions ordered by score,
//! - an action enumerator turning the highest-priority broken relation of
//!   a candidate into child solutions.
//!
//! # Example
//!
//! ```
//! use deb_toolkit::cache::MockCache;
//! use deb_toolkit::resolver::{NativeResolver, ResolverConfig, UserAnswer};
//!
//! # fn example() -> deb_toolkit::error::Result<()> {
//! let cache = MockCache::new();
//! let resolver = NativeResolver::new(&cache, ResolverConfig::default());
//! let accepted = resolver.resolve(|proposal| {
//!     println!("proposed solution with {} packages", proposal.chosen().len());
//!     UserAnswer::Accept
//! })?;
//! # let _ = accepted;
//! # Ok(())
//! # }
//! ```

mod graph;
mod search;
mod solution;

pub use search::{NativeResolver, Reason, SolutionView, UserAnswer};

use crate::types::Priority;
use serde::{Deserialize, Serialize};

/// Source-version synchronization policy for binaries built from one
/// source package.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SynchronizeSourceVersions {
    /// Binaries move independently.
    #[default]
    Off,
    /// Feasibility of moving related binaries together is checked but not
    /// enforced.
    Soft,
    /// Actions whose related binaries cannot be moved together are
    /// discarded.
    Hard,
}

/// Weights and penalties of the preference score model.
///
/// Weights are monotone in priority; profits compose additively across the
/// actions of a solution.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScoreConfig {
    /// Weight of a `required` version.
    pub required_weight: f64,
    /// Weight of an `important` version.
    pub important_weight: f64,
    /// Weight of a `standard` version.
    pub standard_weight: f64,
    /// Weight of an `optional` version.
    pub optional_weight: f64,
    /// Weight of an `extra` version.
    pub extra_weight: f64,
    /// Bonus for versions currently installed.
    pub installed_bonus: f64,
    /// Bonus for versions from a verified source.
    pub trusted_bonus: f64,
    /// Penalty for removing an installed package.
    pub removal_penalty: f64,
    /// Penalty for downgrading a package.
    pub downgrade_penalty: f64,
    /// Penalty for crossing a priority boundary downwards.
    pub priority_drop_penalty: f64,
    /// Penalty for leaving a `Recommends` relation unsatisfied.
    pub break_recommends_penalty: f64,
    /// Penalty for leaving a `Suggests` relation unsatisfied.
    pub break_suggests_penalty: f64,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            required_weight: 5000.0,
            important_weight: 1000.0,
            standard_weight: 400.0,
            optional_weight: 100.0,
            extra_weight: 20.0,
            installed_bonus: 300.0,
            trusted_bonus: 50.0,
            removal_penalty: 2000.0,
            downgrade_penalty: 800.0,
            priority_drop_penalty: 100.0,
            break_recommends_penalty: 250.0,
            break_suggests_penalty: 60.0,
        }
    }
}

impl ScoreConfig {
    /// What: Get the weight of a priority level.
    #[must_use]
    pub const fn weight_of(&self, priority: Priority) -> f64 {
        match priority {
            Priority::Required => self.required_weight,
            Priority::Important => self.important_weight,
            Priority::Standard => self.standard_weight,
            Priority::Optional => self.optional_weight,
            Priority::Extra => self.extra_weight,
        }
    }
}

/// Configuration for the native resolver.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Whether `Recommends` relations are tracked and satisfied.
    pub install_recommends: bool,
    /// Whether `Suggests` relations are tracked and satisfied.
    pub install_suggests: bool,
    /// Whether installed packages the user did not touch are protected
    /// from removal.
    pub no_remove: bool,
    /// Whether unused automatically installed packages are marked for
    /// removal before proposing a solution.
    pub auto_clean: bool,
    /// Upper bound on the number of candidate solutions kept.
    pub max_solution_count: usize,
    /// Source-version synchronization policy.
    pub synchronize_source_versions: SynchronizeSourceVersions,
    /// Score model parameters.
    pub score: ScoreConfig,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            install_recommends: true,
            install_suggests: false,
            no_remove: false,
            auto_clean: true,
            max_solution_count: 512,
            synchronize_source_versions: SynchronizeSourceVersions::Off,
            score: ScoreConfig::default(),
        }
    }
}
