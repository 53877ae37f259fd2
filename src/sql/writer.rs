//! SELECT statement serializer
//!
//! One left-to-right pass over the clauses. Sub-selects are written on their
//! own lines one indentation level deeper than the enclosing statement.
//!
//! ```text
//! SELECT "uri",
//!        count("status") AS "status"
//! FROM (
//!     SELECT "uri",
//!            "status"
//!     FROM "http_requests"
//! ) AS tbl1
//! GROUP BY "uri"
//! ```

use std::fmt::Write;

use super::selector::{SelectColumn, Selector};
use super::statement::{FromSource, SelectStatement, WhereClause};
use crate::dialect::SqlDialect;
use crate::expr::{serialize, Expression};

const INDENT: &str = "    ";

impl SelectStatement {
    /// Render the statement for a dialect
    pub fn to_sql(&self, dialect: &dyn SqlDialect) -> String {
        let mut out = String::new();
        write_statement(&mut out, self, dialect, 0);
        out
    }
}

fn write_statement(out: &mut String, stmt: &SelectStatement, dialect: &dyn SqlDialect, depth: usize) {
    let pad = INDENT.repeat(depth);

    out.push_str(&pad);
    out.push_str("SELECT ");
    if stmt.selectors.is_empty() {
        out.push('*');
    }
    for (i, selector) in stmt.selectors.iter().enumerate() {
        if i > 0 {
            let _ = write!(out, ",\n{}       ", pad);
        }
        write_selector(out, selector, dialect);
    }

    if let Some(from) = &stmt.from {
        let _ = write!(out, "\n{}FROM ", pad);
        match &from.source {
            FromSource::Table(table) => out.push_str(&dialect.quote_identifier(table)),
            FromSource::SubQuery(inner) => {
                out.push_str("(\n");
                write_statement(out, inner, dialect, depth + 1);
                let _ = write!(out, "\n{})", pad);
            }
        }
        let alias = match (&from.alias, &from.source) {
            (Some(alias), _) => Some(dialect.quote_identifier(alias)),
            (None, FromSource::SubQuery(_)) if dialect.need_table_alias() => {
                Some(format!("tbl{}", depth + 1))
            }
            _ => None,
        };
        if let Some(alias) = alias {
            let _ = write!(out, " AS {}", alias);
        }
    }

    write_conjunction(out, "WHERE", &stmt.where_clause, dialect, &pad);

    if !stmt.group_by.is_empty() {
        let _ = write!(out, "\n{}GROUP BY ", pad);
        write_list(out, &stmt.group_by, dialect);
    }

    write_conjunction(out, "HAVING", &stmt.having, dialect, &pad);

    if !stmt.order_by.is_empty() {
        let _ = write!(out, "\n{}ORDER BY ", pad);
        for (i, order) in stmt.order_by.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(
                out,
                "{} {}",
                serialize(&order.expression, dialect),
                order.order.keyword()
            );
        }
    }

    if let Some(limit) = &stmt.limit {
        let _ = write!(out, "\n{}LIMIT {}", pad, limit.limit);
        if let Some(offset) = limit.offset {
            let _ = write!(out, " OFFSET {}", offset);
        }
    }
}

fn write_selector(out: &mut String, selector: &Selector, dialect: &dyn SqlDialect) {
    let rendered = match &selector.column {
        SelectColumn::Column(name) => dialect.quote_identifier(name),
        SelectColumn::Expression(expr) => serialize(expr, dialect),
        SelectColumn::Text(raw) => raw.clone(),
    };
    out.push_str(&rendered);

    let redundant = match (&selector.column, &selector.alias) {
        (SelectColumn::Column(name), Some(alias)) => name == alias,
        (SelectColumn::Expression(expr), Some(alias)) => expr.as_identifier() == Some(alias),
        _ => false,
    };
    if let (Some(alias), false) = (&selector.alias, redundant) {
        let _ = write!(out, " AS {}", dialect.quote_identifier(alias));
    }
}

fn write_conjunction(
    out: &mut String,
    keyword: &str,
    clause: &WhereClause,
    dialect: &dyn SqlDialect,
    pad: &str,
) {
    let expressions = clause.expressions();
    if expressions.is_empty() {
        return;
    }
    let _ = write!(out, "\n{}{} ", pad, keyword);
    if expressions.len() == 1 {
        out.push_str(&serialize(&expressions[0], dialect));
        return;
    }
    for (i, expr) in expressions.iter().enumerate() {
        if i > 0 {
            out.push_str(" AND ");
        }
        let _ = write!(out, "({})", serialize(expr, dialect));
    }
}

fn write_list(out: &mut String, expressions: &[Expression], dialect: &dyn SqlDialect) {
    for (i, expr) in expressions.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&serialize(expr, dialect));
    }
}
