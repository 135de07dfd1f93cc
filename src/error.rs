//! Unified error type for deb-toolkit.

use thiserror::Error;

/// Unified error type for all deb-toolkit operations.
///
/// This error type covers all possible failure modes across different modules,
/// providing clear, actionable error messages.
#[derive(Error, Debug)]
pub enum DebToolkitError {
    /// A selector query could not be parsed.
    #[error("unable to parse the query '{query}': {reason}")]
    QueryParse {
        /// The query string as given by the caller.
        query: String,
        /// Diagnostic from the failing parse step.
        reason: String,
    },

    /// A regular expression argument failed to compile.
    #[error("regular expression '{0}' is not valid")]
    InvalidRegex(String),

    /// A `_variable` was read without being defined by `with()` or
    /// `recursive()`.
    #[error("the variable '{0}' is not defined")]
    UndefinedVariable(String),

    /// Dispatch received a function name that is not registered for the
    /// requested query kind.
    #[error("unknown {kind} selector function '{name}'")]
    UnknownSelector {
        /// Query kind the dispatch ran under ("binary" or "source").
        kind: &'static str,
        /// The unrecognized function name.
        name: String,
    },

    /// The resolver exhausted its solution frontier without any proposal
    /// being accepted.
    #[error("no solution could be proposed for the request")]
    ResolverInfeasible,

    /// Custom parsing error with message (relation strings, version strings).
    #[error("Parse error: {0}")]
    Parse(String),

    /// Invalid input parameter.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Programmer error. Must not occur in a correct implementation.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Result type alias for deb-toolkit operations.
pub type Result<T> = std::result::Result<T, DebToolkitError>;
