//! Expression serializer
//!
//! Renders an expression as text. Identifier quoting, string escaping and
//! timestamp literals come from an [`ExpressionStyle`]; every SQL dialect is
//! one, and [`Canonical`] is the style used by `Display`.
//!
//! Parentheses are emitted only where precedence requires them, so compiling
//! serialized text yields the same tree again.

use std::fmt::Write;

use super::ast::{BinaryOp, Expression, Literal, LogicalOp};
use super::lexer::{is_ident_char, is_ident_start};

/// Lexical conventions used when rendering an expression
pub trait ExpressionStyle {
    /// Quote a column name
    fn quote_identifier(&self, name: &str) -> String;

    /// Character placed before a `'` inside a string literal
    fn string_escape_char(&self) -> char;

    /// Render a timestamp literal (milliseconds since the epoch)
    fn format_timestamp(&self, millis: i64) -> String {
        format!("'{}'", Literal::timestamp_rfc3339(millis))
    }
}

/// Unquoted, backslash-escaping style accepted by [`super::compile`]
#[derive(Debug, Clone, Copy, Default)]
pub struct Canonical;

impl ExpressionStyle for Canonical {
    fn quote_identifier(&self, name: &str) -> String {
        if is_plain_identifier(name) {
            name.to_string()
        } else {
            format!("\"{}\"", name.replace('"', "\"\""))
        }
    }

    fn string_escape_char(&self) -> char {
        '\\'
    }
}

fn is_plain_identifier(name: &str) -> bool {
    const KEYWORDS: &[&str] = &["and", "or", "not", "like", "true", "false"];
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if is_ident_start(c))
        && chars.all(is_ident_char)
        && !KEYWORDS.iter().any(|k| k.eq_ignore_ascii_case(name))
}

/// Quote a string literal with `'`, escaping embedded quotes with `escape`
pub fn quote_string(value: &str, escape: char) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        if c == '\'' || (c == '\\' && escape == '\\') {
            out.push(escape);
        }
        out.push(c);
    }
    out.push('\'');
    out
}

/// Serialize an expression with the given style
pub fn serialize<S: ExpressionStyle + ?Sized>(expr: &Expression, style: &S) -> String {
    let mut out = String::new();
    write_expression(&mut out, expr, style);
    out
}

fn write_child<S: ExpressionStyle + ?Sized>(
    out: &mut String,
    child: &Expression,
    style: &S,
    parenthesize: bool,
) {
    if parenthesize {
        out.push('(');
        write_expression(out, child, style);
        out.push(')');
    } else {
        write_expression(out, child, style);
    }
}

fn write_expression<S: ExpressionStyle + ?Sized>(out: &mut String, expr: &Expression, style: &S) {
    match expr {
        Expression::Literal(lit) => write_literal(out, lit, style),
        Expression::Identifier { name } => out.push_str(&style.quote_identifier(name)),
        Expression::Macro { name } => {
            let _ = write!(out, "{{{}}}", name);
        }
        Expression::Binary {
            op: BinaryOp::SafeDiv,
            lhs,
            rhs,
        } => {
            out.push_str("CASE WHEN ");
            write_child(out, rhs, style, rhs.precedence() <= 4);
            out.push_str(" <> 0 THEN ");
            write_binary(out, BinaryOp::Div, lhs, rhs, style);
            out.push_str(" ELSE 0 END");
        }
        Expression::Binary { op, lhs, rhs } => write_binary(out, *op, lhs, rhs, style),
        Expression::Logical {
            op: LogicalOp::Not,
            operands,
        } => {
            out.push_str("NOT ");
            match operands.first() {
                Some(operand) => write_child(out, operand, style, operand.precedence() < 3),
                None => out.push_str("TRUE"),
            }
        }
        Expression::Logical { op, operands } => {
            if operands.is_empty() {
                out.push_str(if *op == LogicalOp::And { "TRUE" } else { "FALSE" });
                return;
            }
            for (i, operand) in operands.iter().enumerate() {
                if i > 0 {
                    let _ = write!(out, " {} ", op.keyword());
                }
                write_child(out, operand, style, operand.precedence() <= op.precedence());
            }
        }
        Expression::Comparison { op, lhs, rhs } => {
            write_child(out, lhs, style, lhs.precedence() <= 4);
            let _ = write!(out, " {} ", op.symbol());
            write_child(out, rhs, style, rhs.precedence() <= 4);
        }
        Expression::Function { name, args } => {
            out.push_str(name);
            out.push('(');
            if args.is_empty() && name.eq_ignore_ascii_case("count") {
                out.push('*');
            }
            for (i, arg) in args.iter().enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                write_expression(out, arg, style);
            }
            out.push(')');
        }
        Expression::MapAccess { base, key } => {
            write_child(out, base, style, base.precedence() < 7);
            out.push('[');
            out.push_str(&quote_string(key, style.string_escape_char()));
            out.push(']');
        }
    }
}

fn write_binary<S: ExpressionStyle + ?Sized>(
    out: &mut String,
    op: BinaryOp,
    lhs: &Expression,
    rhs: &Expression,
    style: &S,
) {
    let precedence = op.precedence();
    write_child(out, lhs, style, lhs.precedence() < precedence);
    let _ = write!(out, " {} ", op.symbol());
    write_child(out, rhs, style, rhs.precedence() <= precedence);
}

fn write_literal<S: ExpressionStyle + ?Sized>(out: &mut String, lit: &Literal, style: &S) {
    match lit {
        Literal::String(s) => out.push_str(&quote_string(s, style.string_escape_char())),
        Literal::Long(v) => {
            let _ = write!(out, "{}", v);
        }
        Literal::Double(v) => {
            let _ = write!(out, "{:?}", v);
        }
        Literal::Boolean(true) => out.push_str("TRUE"),
        Literal::Boolean(false) => out.push_str("FALSE"),
        Literal::Timestamp(millis) => out.push_str(&style.format_timestamp(*millis)),
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&serialize(self, &Canonical))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{compile, ComparisonOp};

    fn round_trip(text: &str) {
        let first = compile(text).unwrap();
        let rendered = first.to_string();
        let second = compile(&rendered)
            .unwrap_or_else(|e| panic!("re-compiling '{}' failed: {}", rendered, e));
        assert_eq!(first, second, "'{}' rendered as '{}'", text, rendered);
    }

    #[test]
    fn test_round_trip_stability() {
        for text in [
            "a = 1 OR b = 2 AND c = 3",
            "(a = 1 OR b = 2) AND c = 3",
            "a AND (b AND c)",
            "NOT (a OR b)",
            "NOT NOT a",
            "a - (b - c)",
            "(a + b) * c / (d - 1)",
            "a / (b * c)",
            "-a * -3",
            "tags['exception'] = 'Code: 60'",
            "startsWith(uri, '/api') AND lower(name) LIKE '%it''s%'",
            "\"my col\" >= 2.5 AND `and` = 'x\\\\y'",
            "(a = b) = (c > d)",
            "cost / {interval} > 0.5",
            "count(*) > 10",
        ] {
            round_trip(text);
        }
    }

    #[test]
    fn test_minimal_parentheses() {
        let expr = compile("((a + b)) * (c)").unwrap();
        assert_eq!(expr.to_string(), "(a + b) * c");

        let expr = compile("(a * b) + c").unwrap();
        assert_eq!(expr.to_string(), "a * b + c");
    }

    #[test]
    fn test_string_escaping() {
        assert_eq!(quote_string("it's", '\''), "'it''s'");
        assert_eq!(quote_string("it's", '\\'), "'it\\'s'");
        assert_eq!(quote_string("a\\b", '\\'), "'a\\\\b'");
    }

    #[test]
    fn test_safe_division_rendering() {
        let expr = Expression::binary(
            BinaryOp::SafeDiv,
            Expression::identifier("a"),
            Expression::binary(BinaryOp::Add, Expression::identifier("b"), Expression::long(1)),
        );
        assert_eq!(
            expr.to_string(),
            "CASE WHEN b + 1 <> 0 THEN a / (b + 1) ELSE 0 END"
        );
    }

    #[test]
    fn test_keyword_identifiers_are_quoted() {
        let expr = Expression::comparison(
            ComparisonOp::Eq,
            Expression::identifier("or"),
            Expression::long(1),
        );
        assert_eq!(expr.to_string(), "\"or\" = 1");
    }
}
