//! Rewrite rules shared by every dialect
//!
//! Applied bottom-up by [`transform`]:
//!
//! - `a / b` becomes a zero-guarded division unless `b` is a literal or a
//!   macro
//! - `startsWith`, `endsWith` and `hasToken` become `LIKE` on dialects
//!   without them
//! - `match` becomes `REGEXP_LIKE` on dialects without it
//! - `m['k'] = 'v'` becomes a LIKE over the map's JSON text on dialects
//!   without map columns

use super::error::{DialectError, DialectResult};
use super::SqlDialect;
use crate::expr::{BinaryOp, ComparisonOp, Expression, Literal};

/// Adapt an expression to a dialect
pub fn transform<D: SqlDialect + ?Sized>(dialect: &D, expr: Expression) -> DialectResult<Expression> {
    let rewritten = expr.try_transform_up(&mut |node| rewrite_node(dialect, node))?;

    if !dialect.supports_map_access() {
        let mut leftover = None;
        rewritten.walk(&mut |node| {
            if leftover.is_none() && matches!(node, Expression::MapAccess { .. }) {
                leftover = Some(node.to_string());
            }
        });
        if let Some(construct) = leftover {
            return Err(unsupported(dialect, format!("map access {}", construct)));
        }
    }
    Ok(rewritten)
}

fn unsupported<D: SqlDialect + ?Sized>(dialect: &D, construct: String) -> DialectError {
    DialectError::UnsupportedConstruct {
        dialect: dialect.name(),
        construct,
    }
}

fn rewrite_node<D: SqlDialect + ?Sized>(dialect: &D, node: Expression) -> DialectResult<Expression> {
    match node {
        Expression::Binary {
            op: BinaryOp::Div,
            lhs,
            rhs,
        } => {
            let guarded = !matches!(*rhs, Expression::Literal(_) | Expression::Macro { .. });
            let op = if guarded { BinaryOp::SafeDiv } else { BinaryOp::Div };
            Ok(Expression::Binary { op, lhs, rhs })
        }
        Expression::Function { name, args } => rewrite_function(dialect, name, args),
        Expression::Comparison { op, lhs, rhs } if !dialect.supports_map_access() => {
            rewrite_map_comparison(dialect, op, *lhs, *rhs)
        }
        other => Ok(other),
    }
}

fn rewrite_function<D: SqlDialect + ?Sized>(
    dialect: &D,
    name: String,
    mut args: Vec<Expression>,
) -> DialectResult<Expression> {
    if dialect.supports_function(&name) {
        return Ok(Expression::Function { name, args });
    }

    let (prefix, suffix) = match name.to_ascii_lowercase().as_str() {
        "startswith" => ("", "%"),
        "endswith" => ("%", ""),
        "hastoken" => ("%", "%"),
        "match" => return Ok(Expression::function("REGEXP_LIKE", args)),
        _ => {
            let call = Expression::Function { name, args };
            return Err(unsupported(dialect, format!("function {}", call)));
        }
    };

    if args.len() != 2 {
        let call = Expression::Function { name, args };
        return Err(unsupported(dialect, format!("function {}", call)));
    }
    let pattern = args.remove(1);
    let subject = args.remove(0);

    let pattern = match pattern {
        Expression::Literal(Literal::String(text)) => {
            Expression::string(format!("{}{}{}", prefix, escape_like(&text), suffix))
        }
        other => {
            let mut parts = Vec::with_capacity(3);
            if !prefix.is_empty() {
                parts.push(Expression::string(prefix));
            }
            parts.push(other);
            if !suffix.is_empty() {
                parts.push(Expression::string(suffix));
            }
            Expression::function("concat", parts)
        }
    };

    Ok(Expression::comparison(ComparisonOp::Like, subject, pattern))
}

/// Escape LIKE wildcards so a literal matches itself
fn escape_like(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn rewrite_map_comparison<D: SqlDialect + ?Sized>(
    dialect: &D,
    op: ComparisonOp,
    lhs: Expression,
    rhs: Expression,
) -> DialectResult<Expression> {
    // Normalize `'v' = m['k']` to `m['k'] = 'v'`
    let (base, key, other) = match (lhs, rhs) {
        (Expression::MapAccess { base, key }, other) => (*base, key, other),
        (other, Expression::MapAccess { base, key })
            if matches!(op, ComparisonOp::Eq | ComparisonOp::Ne) =>
        {
            (*base, key, other)
        }
        (lhs, rhs) => return Ok(Expression::comparison(op, lhs, rhs)),
    };

    let like = match op {
        ComparisonOp::Eq => ComparisonOp::Like,
        ComparisonOp::Ne => ComparisonOp::NotLike,
        _ => {
            let construct = Expression::comparison(op, Expression::map_access(base, key), other);
            return Err(unsupported(dialect, format!("map comparison {}", construct)));
        }
    };

    let value = match &other {
        Expression::Literal(Literal::String(s)) => Some(serde_json::to_string(s)),
        Expression::Literal(Literal::Long(v)) => Some(serde_json::to_string(v)),
        Expression::Literal(Literal::Double(v)) => Some(serde_json::to_string(v)),
        Expression::Literal(Literal::Boolean(v)) => Some(serde_json::to_string(v)),
        _ => None,
    };
    let (key_json, value_json) = match (serde_json::to_string(&key), value) {
        (Ok(k), Some(Ok(v))) => (k, v),
        _ => {
            let construct = Expression::comparison(op, Expression::map_access(base, key), other);
            return Err(unsupported(dialect, format!("map comparison {}", construct)));
        }
    };

    let pattern = format!("%{}:{}%", escape_like(&key_json), escape_like(&value_json));
    Ok(Expression::comparison(like, base, Expression::string(pattern)))
}
