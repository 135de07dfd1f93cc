//! Relation data types for inter-package dependency declarations.
//!
//! A relation line like `libc6 (>= 2.31), libfoo | libbar (<< 2.0)` is a
//! comma-separated list of relation expressions; each expression is a
//! `|`-joined disjunction of single package relations.

use crate::error::{DebToolkitError, Result};
use crate::types::version::compare_version_strings;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Kind of a binary relation line.
///
/// Covers all relation fields a binary package version carries.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RelationType {
    /// Must be satisfied before the package is unpacked.
    PreDepends,
    /// Must be satisfied for the package to be configured.
    Depends,
    /// Should be satisfied in all but unusual installations.
    Recommends,
    /// May enhance the package's usefulness.
    Suggests,
    /// Declares usefulness for another package.
    Enhances,
    /// Must not be installed together (strong form).
    Conflicts,
    /// Must not be installed together while the match is in effect.
    Breaks,
    /// Overwrites files of the matched packages.
    Replaces,
}

impl RelationType {
    /// All relation types, in field order.
    pub const ALL: [Self; 8] = [
        Self::PreDepends,
        Self::Depends,
        Self::Recommends,
        Self::Suggests,
        Self::Enhances,
        Self::Conflicts,
        Self::Breaks,
        Self::Replaces,
    ];

    /// What: Get the control-file field name of this relation type.
    ///
    /// Output:
    /// - Returns the capitalized field name (e.g., `"Pre-Depends"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PreDepends => "Pre-Depends",
            Self::Depends => "Depends",
            Self::Recommends => "Recommends",
            Self::Suggests => "Suggests",
            Self::Enhances => "Enhances",
            Self::Conflicts => "Conflicts",
            Self::Breaks => "Breaks",
            Self::Replaces => "Replaces",
        }
    }

    /// What: Check whether the relation forbids matched versions instead of
    /// requiring one.
    ///
    /// Output:
    /// - Returns `true` for `Conflicts` and `Breaks`.
    #[must_use]
    pub const fn is_anti(self) -> bool {
        matches!(self, Self::Conflicts | Self::Breaks)
    }
}

impl std::fmt::Display for RelationType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Version comparison operator of a single relation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RelOp {
    /// Strictly earlier (`<<`).
    Less,
    /// Earlier or equal (`<=`).
    LessOrEqual,
    /// Exactly equal (`=`).
    Equal,
    /// Later or equal (`>=`).
    GreaterOrEqual,
    /// Strictly later (`>>`).
    Greater,
}

impl RelOp {
    /// What: Get the canonical operator spelling.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Less => "<<",
            Self::LessOrEqual => "<=",
            Self::Equal => "=",
            Self::GreaterOrEqual => ">=",
            Self::Greater => ">>",
        }
    }
}

/// A single package relation: a package name with an optional version
/// constraint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Relation {
    /// Related package name (real or virtual).
    pub package_name: String,
    /// Optional version constraint.
    pub constraint: Option<(RelOp, String)>,
}

impl Relation {
    /// What: Create a relation without a version constraint.
    #[must_use]
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            constraint: None,
        }
    }

    /// What: Create a relation with a version constraint.
    #[must_use]
    pub fn with_constraint(
        package_name: impl Into<String>,
        op: RelOp,
        version: impl Into<String>,
    ) -> Self {
        Self {
            package_name: package_name.into(),
            constraint: Some((op, version.into())),
        }
    }

    /// What: Parse a relation from its string form.
    ///
    /// Inputs:
    /// - `input`: Relation string (e.g., `"libc6 (>= 2.31)"` or `"libfoo"`).
    ///
    /// Output:
    /// - Returns the parsed `Relation`.
    ///
    /// Details:
    /// - The legacy operators `<` and `>` are accepted and read as `<=` and
    ///   `>=`, as `dpkg` does.
    /// - Architecture qualifiers and restriction lists are not supported
    ///   here; they are stripped by the index parser before this point.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(DebToolkitError::Parse(
                "empty relation".to_string(),
            ));
        }
        let Some((name, rest)) = input.split_once('(') else {
            return Ok(Self::new(input));
        };
        let name = name.trim();
        if name.is_empty() {
            return Err(DebToolkitError::Parse(format!(
                "missing package name in relation '{input}'"
            )));
        }
        let Some(constraint) = rest.trim_end().strip_suffix(')') else {
            return Err(DebToolkitError::Parse(format!(
                "missing closing parenthesis in relation '{input}'"
            )));
        };
        let constraint = constraint.trim();
        let (op, version) = if let Some(rest) = constraint.strip_prefix(">=") {
            (RelOp::GreaterOrEqual, rest)
        } else if let Some(rest) = constraint.strip_prefix("<=") {
            (RelOp::LessOrEqual, rest)
        } else if let Some(rest) = constraint.strip_prefix(">>") {
            (RelOp::Greater, rest)
        } else if let Some(rest) = constraint.strip_prefix("<<") {
            (RelOp::Less, rest)
        } else if let Some(rest) = constraint.strip_prefix('=') {
            (RelOp::Equal, rest)
        } else if let Some(rest) = constraint.strip_prefix('>') {
            (RelOp::GreaterOrEqual, rest)
        } else if let Some(rest) = constraint.strip_prefix('<') {
            (RelOp::LessOrEqual, rest)
        } else {
            return Err(DebToolkitError::Parse(format!(
                "missing version comparison operator in relation '{input}'"
            )));
        };
        let version = version.trim();
        if version.is_empty() {
            return Err(DebToolkitError::Parse(format!(
                "missing version in relation '{input}'"
            )));
        }
        Ok(Self::with_constraint(name, op, version))
    }

    /// What: Check whether a concrete version string satisfies this relation.
    ///
    /// Inputs:
    /// - `version_string`: Version to test.
    ///
    /// Output:
    /// - Returns `true` when the constraint is absent or holds for the
    ///   version.
    #[must_use]
    pub fn is_satisfied_by(&self, version_string: &str) -> bool {
        let Some((op, required)) = &self.constraint else {
            return true;
        };
        let ordering = compare_version_strings(version_string, required);
        match op {
            RelOp::Less => ordering == Ordering::Less,
            RelOp::LessOrEqual => ordering != Ordering::Greater,
            RelOp::Equal => ordering == Ordering::Equal,
            RelOp::GreaterOrEqual => ordering != Ordering::Less,
            RelOp::Greater => ordering == Ordering::Greater,
        }
    }
}

impl std::fmt::Display for Relation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.constraint {
            Some((op, version)) => {
                write!(f, "{} ({} {})", self.package_name, op.as_str(), version)
            }
            None => write!(f, "{}", self.package_name),
        }
    }
}

/// A relation expression: a disjunction of single relations.
///
/// The expression is satisfied when any alternative is satisfied.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RelationExpression(pub Vec<Relation>);

impl RelationExpression {
    /// What: Parse a relation expression from its string form.
    ///
    /// Inputs:
    /// - `input`: Expression string (e.g., `"libfoo | libbar (>= 2.0)"`).
    ///
    /// Output:
    /// - Returns the parsed expression; fails on an empty alternative.
    pub fn parse(input: &str) -> Result<Self> {
        let alternatives = input
            .split('|')
            .map(Relation::parse)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self(alternatives))
    }
}

impl std::fmt::Display for RelationExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for relation in &self.0 {
            if !first {
                f.write_str(" | ")?;
            }
            first = false;
            write!(f, "{relation}")?;
        }
        Ok(())
    }
}

/// A relation line: the full value of one relation field.
pub type RelationLine = Vec<RelationExpression>;

/// What: Parse a comma-separated relation line.
///
/// Inputs:
/// - `input`: Line value (e.g., `"libc6 (>= 2.31), libfoo | libbar"`).
///
/// Output:
/// - Returns the parsed `RelationLine`; an empty input yields an empty line.
pub fn parse_relation_line(input: &str) -> Result<RelationLine> {
    let input = input.trim();
    if input.is_empty() {
        return Ok(Vec::new());
    }
    input.split(',').map(RelationExpression::parse).collect()
}

/// Relation lines of a binary version, one per [`RelationType`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationLines {
    /// `Pre-Depends` line.
    pub pre_depends: RelationLine,
    /// `Depends` line.
    pub depends: RelationLine,
    /// `Recommends` line.
    pub recommends: RelationLine,
    /// `Suggests` line.
    pub suggests: RelationLine,
    /// `Enhances` line.
    pub enhances: RelationLine,
    /// `Conflicts` line.
    pub conflicts: RelationLine,
    /// `Breaks` line.
    pub breaks: RelationLine,
    /// `Replaces` line.
    pub replaces: RelationLine,
}

impl RelationLines {
    /// What: Get the line for a relation type.
    #[must_use]
    pub const fn get(&self, kind: RelationType) -> &RelationLine {
        match kind {
            RelationType::PreDepends => &self.pre_depends,
            RelationType::Depends => &self.depends,
            RelationType::Recommends => &self.recommends,
            RelationType::Suggests => &self.suggests,
            RelationType::Enhances => &self.enhances,
            RelationType::Conflicts => &self.conflicts,
            RelationType::Breaks => &self.breaks,
            RelationType::Replaces => &self.replaces,
        }
    }

    /// What: Get a mutable reference to the line for a relation type.
    pub const fn get_mut(&mut self, kind: RelationType) -> &mut RelationLine {
        match kind {
            RelationType::PreDepends => &mut self.pre_depends,
            RelationType::Depends => &mut self.depends,
            RelationType::Recommends => &mut self.recommends,
            RelationType::Suggests => &mut self.suggests,
            RelationType::Enhances => &mut self.enhances,
            RelationType::Conflicts => &mut self.conflicts,
            RelationType::Breaks => &mut self.breaks,
            RelationType::Replaces => &mut self.replaces,
        }
    }
}
