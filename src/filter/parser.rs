//! Filter Parser
//!
//! # Supported Syntax
//!
//! ```text
//! expr       := or
//! or         := and (OR and)*
//! and        := atom (AND atom)*
//! atom       := '(' expr ')' | binaryExpr
//! binaryExpr := VARIABLE OP (NUMBER | STRING | TRUE | FALSE | VARIABLE)
//! OP         := = | == | > | >= | < | <= | <> | !=
//! ```
//!
//! Strings may be single or double quoted. Logic keywords are
//! case-insensitive.

use nom::{
    branch::alt,
    character::complete::char,
    combinator::{cut, map, value},
    multi::many0,
    sequence::{delimited, preceded},
};

use super::predicate::{Predicate, ValueExtractor};
use crate::expr::lexer::{
    bare_identifier, comparison_symbol, expect, finish, keyword, number, quoted_string, ws,
    PResult,
};
use crate::expr::{ComparisonOp, Literal, SyntaxResult};
use crate::row::Value;

/// Compiles filter text into [`Predicate`] trees
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCompiler {
    debug: bool,
}

impl FilterCompiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap every comparison in [`Predicate::Debug`]
    pub fn debug(mut self, enabled: bool) -> Self {
        self.debug = enabled;
        self
    }

    /// Compile filter text
    pub fn compile(&self, text: &str) -> SyntaxResult<Predicate> {
        let predicate = finish(text, or_filter(text))?;
        Ok(if self.debug { wrap_debug(predicate) } else { predicate })
    }
}

/// Compile filter text without debug instrumentation
pub fn compile_filter(text: &str) -> SyntaxResult<Predicate> {
    FilterCompiler::new().compile(text)
}

fn wrap_debug(predicate: Predicate) -> Predicate {
    match predicate {
        Predicate::And(operands) => Predicate::And(operands.into_iter().map(wrap_debug).collect()),
        Predicate::Or(operands) => Predicate::Or(operands.into_iter().map(wrap_debug).collect()),
        leaf @ Predicate::Compare { .. } => Predicate::Debug(Box::new(leaf)),
        debug @ Predicate::Debug(_) => debug,
    }
}

fn chain<'a>(
    input: &'a str,
    word: &'static str,
    operand: fn(&'a str) -> PResult<'a, Predicate>,
    build: fn(Vec<Predicate>) -> Predicate,
) -> PResult<'a, Predicate> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(preceded(ws(keyword(word)), cut(operand)))(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let mut operands = vec![first];
    operands.extend(rest);
    Ok((input, build(operands)))
}

fn or_filter(input: &str) -> PResult<'_, Predicate> {
    chain(input, "or", and_filter, Predicate::Or)
}

fn and_filter(input: &str) -> PResult<'_, Predicate> {
    chain(input, "and", atom, Predicate::And)
}

fn atom(input: &str) -> PResult<'_, Predicate> {
    ws(alt((
        delimited(char('('), cut(or_filter), expect(')')),
        binary_expr,
    )))(input)
}

fn binary_expr(input: &str) -> PResult<'_, Predicate> {
    let (input, name) = bare_identifier(input)?;
    let (input, symbol) = cut(ws(comparison_symbol))(input)?;
    let (input, right) = cut(ws(operand))(input)?;

    let op = ComparisonOp::from_symbol(symbol).unwrap_or(ComparisonOp::Eq);
    Ok((
        input,
        Predicate::Compare {
            op,
            left: ValueExtractor::Column(name.to_string()),
            right,
        },
    ))
}

fn operand(input: &str) -> PResult<'_, ValueExtractor> {
    alt((
        map(number, |lit| ValueExtractor::Constant(literal_value(lit))),
        map(
            alt((quoted_string('\'', true), quoted_string('"', false))),
            |s| ValueExtractor::Constant(Value::String(s)),
        ),
        value(ValueExtractor::Constant(Value::Bool(true)), keyword("true")),
        value(ValueExtractor::Constant(Value::Bool(false)), keyword("false")),
        map(bare_identifier, |name| ValueExtractor::Column(name.to_string())),
    ))(input)
}

fn literal_value(lit: Literal) -> Value {
    match lit {
        Literal::String(s) => Value::String(s),
        Literal::Long(v) | Literal::Timestamp(v) => Value::Long(v),
        Literal::Double(v) => Value::Double(v),
        Literal::Boolean(b) => Value::Bool(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{row_of, InputRow};
    use std::collections::HashMap;

    fn rows() -> Vec<HashMap<String, Value>> {
        let mut out = Vec::new();
        for (status, uri, latency) in [
            (200i64, "/api/users", 12.5f64),
            (500, "/api/orders", 250.0),
            (404, "/web/index", 3.0),
            (503, "/web/cart", 900.0),
        ] {
            out.push(row_of([
                ("status", Value::Long(status)),
                ("uri", Value::from(uri)),
                ("latency", Value::Double(latency)),
            ]));
        }
        out
    }

    fn num(row: &HashMap<String, Value>, column: &str) -> f64 {
        row.get_column(column).and_then(Value::as_f64).unwrap_or(f64::NAN)
    }

    #[test]
    fn test_filter_matches_hand_written_predicate() {
        let filter = compile_filter("status >= 500 AND latency > 100 OR uri = '/web/index'").unwrap();
        for row in rows() {
            let expected = (num(&row, "status") >= 500.0 && num(&row, "latency") > 100.0)
                || row.get_column("uri").and_then(Value::as_str) == Some("/web/index");
            assert_eq!(filter.evaluate(&row), expected, "{:?}", row);
        }
    }

    #[test]
    fn test_and_binds_tighter_than_or() {
        let filter = compile_filter("a = 1 or b = 2 AND c = 3").unwrap();
        match filter {
            Predicate::Or(operands) => {
                assert_eq!(operands.len(), 2);
                assert!(matches!(operands[1], Predicate::And(_)));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_parenthesized_groups() {
        let filter = compile_filter("(status = 200 OR status = 404) AND uri <> \"/api/users\"").unwrap();
        let matched: Vec<i64> = rows()
            .iter()
            .filter(|r| filter.evaluate(*r))
            .filter_map(|r| r.get_column("status").and_then(Value::as_i64))
            .collect();
        assert_eq!(matched, vec![404]);
    }

    #[test]
    fn test_column_to_column_comparison() {
        let filter = compile_filter("used > limit").unwrap();
        assert!(filter.evaluate(&row_of([("used", 5i64), ("limit", 3i64)])));
        assert!(!filter.evaluate(&row_of([("used", 1i64), ("limit", 3i64)])));
    }

    #[test]
    fn test_operators() {
        let row = row_of([("x", 5i64)]);
        for (text, expected) in [
            ("x = 5", true),
            ("x == 5", true),
            ("x != 5", false),
            ("x <> 4", true),
            ("x < 6", true),
            ("x <= 5", true),
            ("x > 5", false),
            ("x >= 5.0", true),
        ] {
            assert_eq!(compile_filter(text).unwrap().evaluate(&row), expected, "{}", text);
        }
    }

    #[test]
    fn test_syntax_errors() {
        let err = compile_filter("status >= ").unwrap_err();
        assert_eq!(err.position, 10);

        let err = compile_filter("(status = 1").unwrap_err();
        assert_eq!(err.message, "expected ')'");

        let err = compile_filter("status LIKE 'x'").unwrap_err();
        assert_eq!(err.position, 7);

        assert!(compile_filter("status = 1 AND").is_err());
    }

    #[test]
    fn test_debug_mode_wraps_leaves() {
        let filter = FilterCompiler::new().debug(true).compile("a = 1 AND b = 2").unwrap();
        match &filter {
            Predicate::And(operands) => {
                assert!(operands.iter().all(|p| matches!(p, Predicate::Debug(_))));
            }
            other => panic!("unexpected {:?}", other),
        }
        let row = row_of([("a", 1i64), ("b", 2i64)]);
        assert!(filter.evaluate(&row));
    }
}
