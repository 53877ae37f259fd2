//! SELECT statement AST
//!
//! A mutable builder the planner fills clause by clause. Serialization lives
//! in [`super::writer`].

use serde::{Deserialize, Serialize};

use super::selector::{Selector, SelectorList};
use crate::expr::{Expression, LogicalOp};

/// Source of rows for a statement
#[derive(Debug, Clone, PartialEq)]
pub enum FromSource {
    Table(String),
    SubQuery(Box<SelectStatement>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FromClause {
    pub source: FromSource,
    pub alias: Option<String>,
}

/// Conjunction of boolean expressions
///
/// Used for both WHERE and HAVING. Nested ANDs are flattened into the list
/// and structurally equal expressions are kept once.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WhereClause {
    expressions: Vec<Expression>,
}

impl WhereClause {
    pub fn add(&mut self, expr: Expression) {
        match expr {
            Expression::Logical {
                op: LogicalOp::And,
                operands,
            } => {
                for operand in operands {
                    self.add(operand);
                }
            }
            other => {
                if !self.expressions.contains(&other) {
                    self.expressions.push(other);
                }
            }
        }
    }

    pub fn expressions(&self) -> &[Expression] {
        &self.expressions
    }

    pub fn is_empty(&self) -> bool {
        self.expressions.is_empty()
    }

    /// The whole clause as one expression
    pub fn to_expression(&self) -> Option<Expression> {
        match self.expressions.len() {
            0 => None,
            1 => self.expressions.first().cloned(),
            _ => Some(Expression::logical(LogicalOp::And, self.expressions.clone())),
        }
    }
}

/// HAVING has the same semantics as WHERE
pub type HavingClause = WhereClause;

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    pub fn keyword(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// One ORDER BY entry
#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub expression: Expression,
    pub order: SortOrder,
}

impl OrderBy {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            expression: Expression::identifier(column),
            order: SortOrder::Asc,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            expression: Expression::identifier(column),
            order: SortOrder::Desc,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LimitClause {
    pub limit: u64,
    pub offset: Option<u64>,
}

/// A SELECT statement under construction
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SelectStatement {
    pub selectors: SelectorList,
    pub from: Option<FromClause>,
    pub where_clause: WhereClause,
    pub group_by: Vec<Expression>,
    pub having: HavingClause,
    pub order_by: Vec<OrderBy>,
    pub limit: Option<LimitClause>,
}

impl SelectStatement {
    pub fn new() -> Self {
        Self::default()
    }

    /// `SELECT ... FROM table`
    pub fn from_table(table: impl Into<String>) -> Self {
        Self {
            from: Some(FromClause {
                source: FromSource::Table(table.into()),
                alias: None,
            }),
            ..Self::default()
        }
    }

    /// `SELECT ... FROM (inner) [AS alias]`
    pub fn from_subquery(inner: SelectStatement, alias: Option<String>) -> Self {
        Self {
            from: Some(FromClause {
                source: FromSource::SubQuery(Box::new(inner)),
                alias,
            }),
            ..Self::default()
        }
    }

    pub fn select(&mut self, selector: Selector) -> &mut Self {
        self.selectors.push(selector);
        self
    }

    pub fn add_where(&mut self, expr: Expression) -> &mut Self {
        self.where_clause.add(expr);
        self
    }

    pub fn add_group_by(&mut self, expr: Expression) -> &mut Self {
        if !self.group_by.contains(&expr) {
            self.group_by.push(expr);
        }
        self
    }

    pub fn add_having(&mut self, expr: Expression) -> &mut Self {
        self.having.add(expr);
        self
    }

    pub fn add_order_by(&mut self, order: OrderBy) -> &mut Self {
        self.order_by.push(order);
        self
    }

    pub fn set_limit(&mut self, limit: u64, offset: Option<u64>) -> &mut Self {
        self.limit = Some(LimitClause { limit, offset });
        self
    }

    /// Columns visible to an enclosing query; `None` means `SELECT *`
    pub fn output_columns(&self) -> Option<Vec<&str>> {
        if self.selectors.is_empty() {
            None
        } else {
            Some(self.selectors.output_names())
        }
    }

    /// Check whether an enclosing query may reference `column`
    pub fn exposes(&self, column: &str) -> bool {
        match self.output_columns() {
            None => true,
            Some(names) => names.contains(&column),
        }
    }
}
