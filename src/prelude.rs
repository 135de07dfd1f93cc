//! Convenience re-exports of the most commonly used items.

pub use crate::cache::{spcv_cmp, Cache, CacheConfig, MockCache};
pub use crate::error::{DebToolkitError, Result};
pub use crate::types::{
    compare_version_strings, parse_relation_line, BinaryPayload, Package, Priority, RelOp,
    Relation, RelationExpression, RelationLines, RelationType, ReleaseInfo, SourcePayload,
    SourceRecord, Version, VersionKind,
};

#[cfg(feature = "query")]
pub use crate::query::{
    parse_query, select_all_versions, select_best_versions, QueryKind, QueryParser, Selector,
};

#[cfg(feature = "resolver")]
pub use crate::resolver::{
    NativeResolver, Reason, ResolverConfig, ScoreConfig, SolutionView,
    SynchronizeSourceVersions, UserAnswer,
};
