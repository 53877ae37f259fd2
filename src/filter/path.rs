//! Field path compiler
//!
//! ```text
//! path := IDENT ('.' IDENT | '[' STRING ']')*
//! ```
//!
//! `tags.exception` and `tags['exception']` name the same value: the
//! `exception` key inside the `tags` map column.

use nom::{
    branch::alt,
    character::complete::char,
    combinator::{cut, map},
    multi::many0,
    sequence::preceded,
};

use crate::expr::lexer::{bare_identifier, bracket_key, finish, PResult};
use crate::expr::SyntaxResult;
use crate::row::{InputRow, Value};

/// A compiled field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathExpression {
    segments: Vec<String>,
}

impl PathExpression {
    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Resolve the path against a row.
    ///
    /// The first segment names a column and each further segment a key in
    /// the nested map. When the current value is not a map the remaining
    /// segments are ignored and that value is returned.
    pub fn evaluate<'r, R: InputRow + ?Sized>(&self, row: &'r R) -> Option<&'r Value> {
        let (first, rest) = self.segments.split_first()?;
        let mut current = row.get_column(first)?;
        for segment in rest {
            match current {
                Value::Map(map) => current = map.get(segment)?,
                _ => return Some(current),
            }
        }
        Some(current)
    }
}

impl std::fmt::Display for PathExpression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.segments.join("."))
    }
}

/// Compile path text
pub fn compile_path(text: &str) -> SyntaxResult<PathExpression> {
    finish(text, path(text))
}

fn path(input: &str) -> PResult<'_, PathExpression> {
    let (input, head) = bare_identifier(input.trim_start())?;
    let (input, tail) = many0(alt((
        preceded(char('.'), cut(map(bare_identifier, str::to_string))),
        bracket_key,
    )))(input)?;

    let mut segments = vec![head.to_string()];
    segments.extend(tail);
    Ok((input, PathExpression { segments }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::row_of;
    use std::collections::HashMap;

    fn tags(pairs: &[(&str, &str)]) -> Value {
        Value::Map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect::<HashMap<_, _>>(),
        )
    }

    #[test]
    fn test_nested_lookup() {
        let row = row_of([("tags", tags(&[("exception", "Code: 60")]))]);
        let path = compile_path("tags.exception").unwrap();
        assert_eq!(path.evaluate(&row), Some(&Value::from("Code: 60")));

        let bracketed = compile_path("tags['exception']").unwrap();
        assert_eq!(bracketed, path);
    }

    #[test]
    fn test_graceful_degradation_on_scalar() {
        // `tags` is a plain string here, so the lookup stops at it
        let row = row_of([("tags", "plain")]);
        let path = compile_path("tags.exception").unwrap();
        assert_eq!(path.evaluate(&row), Some(&Value::from("plain")));
    }

    #[test]
    fn test_missing_values() {
        let row = row_of([("tags", tags(&[("other", "x")]))]);
        assert_eq!(compile_path("tags.exception").unwrap().evaluate(&row), None);
        assert_eq!(compile_path("missing.key").unwrap().evaluate(&row), None);
    }

    #[test]
    fn test_deep_path() {
        let mut inner = HashMap::new();
        inner.insert("c".to_string(), Value::Long(3));
        let mut outer = HashMap::new();
        outer.insert("b".to_string(), Value::Map(inner));
        let row = row_of([("a", Value::Map(outer))]);

        let path = compile_path("a.b['c']").unwrap();
        assert_eq!(path.segments(), ["a", "b", "c"]);
        assert_eq!(path.evaluate(&row), Some(&Value::Long(3)));
    }

    #[test]
    fn test_syntax_errors() {
        assert_eq!(compile_path("tags.").unwrap_err().position, 5);
        assert_eq!(compile_path("tags[").unwrap_err().position, 5);
        assert_eq!(compile_path("1tags").unwrap_err().position, 0);
        assert_eq!(compile_path("tags x").unwrap_err().position, 5);
    }
}
