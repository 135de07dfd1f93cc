//! Data types for Debian packages, versions and relations.
//!
//! Everything here is immutable once constructed; the query engine and the
//! resolver treat versions as shared read-only data.

pub mod package;
pub mod relation;
pub mod version;

pub use package::{
    BinaryPayload, FileRecord, HashKind, Package, Priority, ReleaseInfo, SourcePayload,
    SourceRecord, Version, VersionKind,
};
pub use relation::{
    parse_relation_line, RelOp, Relation, RelationExpression, RelationLine, RelationLines,
    RelationType,
};
pub use version::compare_version_strings;
