//! Parser for the function-selector query language.
//!
//! Queries use a prefix functional notation: `name(arg1, arg2, ...)`, or a
//! bare `name` for zero-argument calls. Arguments are raw substrings and may
//! be protected by wrapping them in `/.../`, which hides commas and brackets
//! from the splitter. Exactly one level of quoting is stripped.

use crate::error::{DebToolkitError, Result};
use crate::query::select::{compile_regex, BoolKind, FieldKind, ReleaseFieldKind, Selector};
use crate::types::RelationType;

/// Characters trimmed around queries and arguments.
const TRIMMED: &[char] = &[' ', '\n'];

/// Simple function-name aliases.
const ALIASES: &[(&str, &str)] = &[
    ("p:n", "package:name"),
    ("p:i", "package:installed"),
    ("p:ai", "package:automatically-installed"),
    ("v:v", "version:version"),
    ("v:m", "version:maintainer"),
    ("v:p", "version:priority"),
    ("v:s", "version:section"),
    ("v:t", "version:trusted"),
    ("v:f", "version:field"),
    ("v:sp", "version:source-package"),
    ("v:sv", "version:source-version"),
    ("v:e", "version:essential"),
    ("v:i", "version:installed"),
    ("vr:pd", "pre-depends"),
    ("vr:d", "depends"),
    ("vr:r", "recommends"),
    ("vr:s", "suggests"),
    ("vr:e", "enhances"),
    ("vr:c", "conflicts"),
    ("vr:b", "breaks"),
    ("vr:rp", "replaces"),
    ("r:a", "release:archive"),
    ("r:n", "release:codename"),
    ("r:c", "release:component"),
    ("r:v", "release:version"),
    ("r:o", "release:vendor"),
    ("r:u", "release:origin"),
];

/// Which universe a query runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum QueryKind {
    /// Binary package versions.
    Binary,
    /// Source package versions.
    Source,
}

impl QueryKind {
    /// Spelling used in diagnostics.
    const fn as_str(self) -> &'static str {
        match self {
            Self::Binary => "binary",
            Self::Source => "source",
        }
    }
}

/// What: Parser for selector queries.
///
/// Inputs: None (created via `QueryParser::new()`)
///
/// Output:
/// - `QueryParser` instance turning query strings into [`Selector`] trees
///
/// Details:
/// - Holds the counter for anonymous variables introduced by composite
///   aliases, so numbering is deterministic per parser session.
#[derive(Debug, Default)]
pub struct QueryParser {
    /// Next anonymous variable id.
    anonymous_variable_id: usize,
}

impl QueryParser {
    /// What: Create a parser with a fresh anonymous-variable counter.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// What: Parse a query string into a selector tree.
    ///
    /// Inputs:
    /// - `query`: The query text.
    /// - `kind`: Universe the query runs against.
    ///
    /// Output:
    /// - Returns the selector tree; the root of a binary query is wrapped in
    ///   [`Selector::BinaryTag`] so drivers can pick the right universe.
    ///
    /// Details:
    /// - Any inner failure is wrapped into a single
    ///   [`DebToolkitError::QueryParse`] naming the whole query.
    ///
    /// # Example
    ///
    /// ```
    /// use deb_toolkit::query::{QueryKind, QueryParser};
    ///
    /// let mut parser = QueryParser::new();
    /// let selector = parser.parse("and(package:installed, p:n(/lib.*/))", QueryKind::Binary);
    /// assert!(selector.is_ok());
    /// ```
    pub fn parse(&mut self, query: &str, kind: QueryKind) -> Result<Selector> {
        let trimmed = query.trim_matches(TRIMMED);
        let selector =
            self.parse_expression(trimmed, kind)
                .map_err(|error| DebToolkitError::QueryParse {
                    query: trimmed.to_string(),
                    reason: error.to_string(),
                })?;
        Ok(match kind {
            QueryKind::Binary => Selector::BinaryTag(Box::new(selector)),
            QueryKind::Source => selector,
        })
    }

    /// Parse one expression: a function name with optional argument list.
    fn parse_expression(&mut self, query: &str, kind: QueryKind) -> Result<Selector> {
        if query.is_empty() {
            return Err(DebToolkitError::Parse("the query cannot be empty".to_string()));
        }

        let (function_name, arguments) = match query.find(['(', ')']) {
            // The whole string is a name of a function taking no parameters
            None => (query.to_string(), Vec::new()),
            Some(position) => {
                if query.as_bytes()[position] == b')' {
                    return Err(DebToolkitError::Parse(
                        "closing bracket ')' doesn't have a corresponding opening bracket '('"
                            .to_string(),
                    ));
                }
                if !query.ends_with(')') {
                    return Err(DebToolkitError::Parse(
                        "the last query character is not a closing bracket ')'".to_string(),
                    ));
                }
                let name = query[..position].to_string();
                let body = &query[position + 1..query.len() - 1];
                let mut arguments = split_arguments(body)?;
                for argument in &mut arguments {
                    *argument = argument.trim_matches(TRIMMED).to_string();
                    strip_argument_quotes(argument);
                }
                (name, arguments)
            }
        };

        let (function_name, arguments) = self.expand_aliases(function_name, arguments)?;
        self.dispatch(&function_name, arguments, kind)
    }

    /// Apply simple and composite aliases to the resolved call.
    fn expand_aliases(
        &mut self,
        function_name: String,
        arguments: Vec<String>,
    ) -> Result<(String, Vec<String>)> {
        if let Some((_, target)) = ALIASES
            .iter()
            .find(|(alias, _)| *alias == function_name)
        {
            return Ok(((*target).to_string(), arguments));
        }

        if function_name == "package-with-dependencies" {
            require_n_arguments(&arguments, 1)?;
            let variable_name = format!("__anon{}", self.anonymous_variable_id);
            self.anonymous_variable_id += 1;
            let iterating_expression = format!(
                "best(and( or(vr:pd({variable_name}),vr:d({variable_name}),vr:r({variable_name})) , package:installed ))"
            );
            let mut expanded = vec![variable_name];
            expanded.extend(arguments);
            expanded.push(iterating_expression);
            return Ok(("recursive".to_string(), expanded));
        }

        Ok((function_name, arguments))
    }

    /// Parse every argument as a sub-expression.
    fn parse_all(&mut self, arguments: &[String], kind: QueryKind) -> Result<Vec<Selector>> {
        arguments
            .iter()
            .map(|argument| self.parse_expression(argument, kind))
            .collect()
    }

    /// Construct the selector for a resolved function name.
    #[allow(clippy::too_many_lines)]
    fn dispatch(
        &mut self,
        function_name: &str,
        arguments: Vec<String>,
        kind: QueryKind,
    ) -> Result<Selector> {
        // Any name starting with '_' reads a variable
        if function_name.starts_with('_') {
            require_n_arguments(&arguments, 0)?;
            return Ok(Selector::Variable(function_name.to_string()));
        }

        match function_name {
            "with" => {
                require_n_arguments(&arguments, 3)?;
                Ok(Selector::With {
                    name: arguments[0].clone(),
                    value: Box::new(self.parse_expression(&arguments[1], kind)?),
                    body: Box::new(self.parse_expression(&arguments[2], kind)?),
                })
            }
            "recursive" => {
                require_n_arguments(&arguments, 3)?;
                Ok(Selector::Recursive {
                    name: arguments[0].clone(),
                    init: Box::new(self.parse_expression(&arguments[1], kind)?),
                    iter: Box::new(self.parse_expression(&arguments[2], kind)?),
                })
            }
            "and" => {
                require_some_arguments(&arguments)?;
                Ok(Selector::And(self.parse_all(&arguments, kind)?))
            }
            "or" => {
                require_some_arguments(&arguments)?;
                Ok(Selector::Or(self.parse_all(&arguments, kind)?))
            }
            "not" => {
                require_n_arguments(&arguments, 1)?;
                Ok(Selector::Not(Box::new(
                    self.parse_expression(&arguments[0], kind)?,
                )))
            }
            "xor" => {
                require_n_arguments(&arguments, 2)?;
                Ok(Selector::Xor(
                    Box::new(self.parse_expression(&arguments[0], kind)?),
                    Box::new(self.parse_expression(&arguments[1], kind)?),
                ))
            }
            "best" => {
                require_n_arguments(&arguments, 1)?;
                Ok(Selector::Best(Box::new(
                    self.parse_expression(&arguments[0], kind)?,
                )))
            }
            "package:name" => Ok(Selector::PackageName(regex_argument(&arguments)?)),
            "version:version" => Ok(Selector::Field(
                FieldKind::VersionString,
                regex_argument(&arguments)?,
            )),
            "version:maintainer" => Ok(Selector::Field(
                FieldKind::Maintainer,
                regex_argument(&arguments)?,
            )),
            "version:priority" => Ok(Selector::Field(
                FieldKind::Priority,
                regex_argument(&arguments)?,
            )),
            "version:section" => Ok(Selector::Field(
                FieldKind::Section,
                regex_argument(&arguments)?,
            )),
            "version:trusted" => {
                require_n_arguments(&arguments, 0)?;
                Ok(Selector::Bool(BoolKind::Trusted))
            }
            "version:field" => {
                require_n_arguments(&arguments, 2)?;
                Ok(Selector::Field(
                    FieldKind::Other(arguments[0].clone()),
                    compile_regex(&arguments[1])?,
                ))
            }
            "release:archive" => Ok(Selector::ReleaseField(
                ReleaseFieldKind::Archive,
                regex_argument(&arguments)?,
            )),
            "release:codename" => Ok(Selector::ReleaseField(
                ReleaseFieldKind::Codename,
                regex_argument(&arguments)?,
            )),
            "release:component" => Ok(Selector::ReleaseField(
                ReleaseFieldKind::Component,
                regex_argument(&arguments)?,
            )),
            "release:version" => Ok(Selector::ReleaseField(
                ReleaseFieldKind::Version,
                regex_argument(&arguments)?,
            )),
            "release:vendor" => Ok(Selector::ReleaseField(
                ReleaseFieldKind::Vendor,
                regex_argument(&arguments)?,
            )),
            "release:origin" => Ok(Selector::ReleaseField(
                ReleaseFieldKind::Origin,
                regex_argument(&arguments)?,
            )),
            _ if kind == QueryKind::Binary => self.dispatch_binary(function_name, arguments),
            _ => Err(DebToolkitError::UnknownSelector {
                kind: kind.as_str(),
                name: function_name.to_string(),
            }),
        }
    }

    /// Construct a selector available only in the binary universe.
    fn dispatch_binary(
        &mut self,
        function_name: &str,
        arguments: Vec<String>,
    ) -> Result<Selector> {
        let relation_type = match function_name {
            "pre-depends" => Some(RelationType::PreDepends),
            "depends" => Some(RelationType::Depends),
            "recommends" => Some(RelationType::Recommends),
            "suggests" => Some(RelationType::Suggests),
            "enhances" => Some(RelationType::Enhances),
            "conflicts" => Some(RelationType::Conflicts),
            "breaks" => Some(RelationType::Breaks),
            "replaces" => Some(RelationType::Replaces),
            _ => None,
        };
        if let Some(relation_type) = relation_type {
            require_n_arguments(&arguments, 1)?;
            return Ok(Selector::Dependency(
                relation_type,
                Box::new(self.parse_expression(&arguments[0], QueryKind::Binary)?),
            ));
        }

        match function_name {
            "version:source-package" => Ok(Selector::Field(
                FieldKind::SourcePackage,
                regex_argument(&arguments)?,
            )),
            "version:source-version" => Ok(Selector::Field(
                FieldKind::SourceVersion,
                regex_argument(&arguments)?,
            )),
            "version:description" => Ok(Selector::Field(
                FieldKind::Description,
                regex_argument(&arguments)?,
            )),
            "version:essential" => {
                require_n_arguments(&arguments, 0)?;
                Ok(Selector::Bool(BoolKind::Essential))
            }
            "version:installed" => {
                require_n_arguments(&arguments, 0)?;
                Ok(Selector::Bool(BoolKind::VersionInstalled))
            }
            "package:installed" => {
                require_n_arguments(&arguments, 0)?;
                Ok(Selector::Bool(BoolKind::PackageInstalled))
            }
            "package:automatically-installed" => {
                require_n_arguments(&arguments, 0)?;
                Ok(Selector::Bool(BoolKind::PackageAutoInstalled))
            }
            _ => Err(DebToolkitError::UnknownSelector {
                kind: QueryKind::Binary.as_str(),
                name: function_name.to_string(),
            }),
        }
    }
}

/// What: Split an argument body on top-level commas.
///
/// Details:
/// - A bracket-nesting counter tracks `(` and `)`; commas split only at
///   level zero.
/// - `/` starts a quoted span ending at the next `/`; its content is opaque
///   to the splitter.
fn split_arguments(input: &str) -> Result<Vec<String>> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    let bytes = input.as_bytes();
    let mut result = Vec::new();
    let mut argument_start = 0;
    let mut position = 0;
    let mut level: usize = 0;
    while position < bytes.len() {
        match bytes[position] {
            b',' => {
                if level == 0 {
                    result.push(input[argument_start..position].to_string());
                    argument_start = position + 1;
                }
            }
            b'(' => level += 1,
            b')' => {
                if level == 0 {
                    return Err(DebToolkitError::Parse(format!(
                        "unexpected closing bracket ')' after '{}'",
                        &input[..position]
                    )));
                }
                level -= 1;
            }
            b'/' => {
                // Quoting: skip to the closing '/'
                match input[position + 1..].find('/') {
                    Some(offset) => position += offset + 1,
                    None => {
                        return Err(DebToolkitError::Parse(
                            "unable to find closing quoting character '/'".to_string(),
                        ));
                    }
                }
            }
            _ => {}
        }
        position += 1;
    }
    if level != 0 {
        return Err(DebToolkitError::Parse("too few closing brackets".to_string()));
    }
    result.push(input[argument_start..].to_string());
    Ok(result)
}

/// Strip exactly one level of `/.../` quoting.
fn strip_argument_quotes(argument: &mut String) {
    if argument.len() >= 2 && argument.starts_with('/') && argument.ends_with('/') {
        argument.pop();
        argument.remove(0);
    }
}

/// Fail unless exactly `n` arguments were given.
fn require_n_arguments(arguments: &[String], n: usize) -> Result<()> {
    if arguments.len() == n {
        Ok(())
    } else {
        Err(DebToolkitError::Parse(format!(
            "the function requires exactly {n} arguments"
        )))
    }
}

/// Fail unless at least one argument was given.
fn require_some_arguments(arguments: &[String]) -> Result<()> {
    if arguments.is_empty() {
        Err(DebToolkitError::Parse(
            "the function should have at least one argument".to_string(),
        ))
    } else {
        Ok(())
    }
}

/// The single regex argument of a matcher function.
fn regex_argument(arguments: &[String]) -> Result<regex::Regex> {
    require_n_arguments(arguments, 1)?;
    compile_regex(&arguments[0])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_binary(query: &str) -> Result<Selector> {
        QueryParser::new().parse(query, QueryKind::Binary)
    }

    #[test]
    fn test_split_top_level_commas() {
        let parts = split_arguments("a, b(c, d), e").expect("should split");
        assert_eq!(parts, vec!["a", " b(c, d)", " e"]);
    }

    #[test]
    fn test_split_respects_quoting() {
        let parts = split_arguments("/a,b/, c").expect("should split");
        assert_eq!(parts, vec!["/a,b/", " c"]);
    }

    #[test]
    fn test_split_errors() {
        assert!(split_arguments("a)").is_err());
        assert!(split_arguments("a(b").is_err());
        assert!(split_arguments("/abc").is_err());
    }

    #[test]
    fn test_parse_zero_argument_call() {
        let selector = parse_binary("package:installed").expect("should parse");
        assert!(matches!(
            selector,
            Selector::BinaryTag(inner) if matches!(*inner, Selector::Bool(BoolKind::PackageInstalled))
        ));
    }

    #[test]
    fn test_parse_nested_call() {
        let selector =
            parse_binary("and(package:installed, not(package:automatically-installed))")
                .expect("should parse");
        let Selector::BinaryTag(inner) = selector else {
            panic!("binary query root must be tagged");
        };
        let Selector::And(children) = *inner else {
            panic!("expected an and selector");
        };
        assert_eq!(children.len(), 2);
        assert!(matches!(children[1], Selector::Not(_)));
    }

    #[test]
    fn test_quoting_protects_regex_commas() {
        let selector = parse_binary("package:name(/^(a|b){1,2}$/)").expect("should parse");
        let Selector::BinaryTag(inner) = selector else {
            panic!("binary query root must be tagged");
        };
        assert!(matches!(*inner, Selector::PackageName(_)));
    }

    #[test]
    fn test_simple_aliases() {
        assert!(matches!(
            parse_binary("p:i").expect("should parse"),
            Selector::BinaryTag(inner) if matches!(*inner, Selector::Bool(BoolKind::PackageInstalled))
        ));
        assert!(matches!(
            parse_binary("vr:d(p:i)").expect("should parse"),
            Selector::BinaryTag(inner)
                if matches!(*inner, Selector::Dependency(RelationType::Depends, _))
        ));
    }

    #[test]
    fn test_composite_alias_expands_to_recursive() {
        let selector =
            parse_binary("package-with-dependencies(package:name(/^a$/))").expect("should parse");
        let Selector::BinaryTag(inner) = selector else {
            panic!("binary query root must be tagged");
        };
        let Selector::Recursive { name, .. } = *inner else {
            panic!("expected a recursive selector");
        };
        assert_eq!(name, "__anon0");
    }

    #[test]
    fn test_anonymous_variables_count_per_session() {
        let mut parser = QueryParser::new();
        parser
            .parse("package-with-dependencies(p:i)", QueryKind::Binary)
            .expect("should parse");
        let selector = parser
            .parse("package-with-dependencies(p:i)", QueryKind::Binary)
            .expect("should parse");
        let Selector::BinaryTag(inner) = selector else {
            panic!("binary query root must be tagged");
        };
        assert!(
            matches!(*inner, Selector::Recursive { ref name, .. } if name == "__anon1")
        );
    }

    #[test]
    fn test_binary_only_selectors_rejected_for_source() {
        let mut parser = QueryParser::new();
        let error = parser
            .parse("package:installed", QueryKind::Source)
            .expect_err("should fail");
        assert!(error.to_string().contains("source"));
    }

    #[test]
    fn test_parse_error_wraps_query() {
        let error = parse_binary("and(package:installed,)").expect_err("should fail");
        let message = error.to_string();
        assert!(message.starts_with("unable to parse the query"));
        assert!(message.contains("and(package:installed,)"));
    }

    #[test]
    fn test_wrong_arity_reported() {
        assert!(parse_binary("not(p:i, p:i)").is_err());
        assert!(parse_binary("xor(p:i)").is_err());
        assert!(parse_binary("and()").is_err());
        assert!(parse_binary("version:trusted(p:i)").is_err());
    }

    #[test]
    fn test_invalid_regex_reported() {
        let error = parse_binary("package:name(/[/)").expect_err("should fail");
        assert!(error.to_string().contains("is not valid"));
    }

    #[test]
    fn test_empty_query_rejected() {
        assert!(parse_binary("").is_err());
        assert!(parse_binary("  \n ").is_err());
    }

    #[test]
    fn test_unmatched_closing_bracket() {
        let error = parse_binary("a)b(").expect_err("should fail");
        assert!(error
            .to_string()
            .contains("doesn't have a corresponding opening bracket"));
    }
}
