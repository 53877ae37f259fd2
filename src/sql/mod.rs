//! SQL Statement AST
//!
//! The SELECT statement model the physical planner builds, and the
//! indentation-tracking serializer that renders it for a dialect.

mod selector;
mod statement;
mod writer;

pub use selector::{SelectColumn, Selector, SelectorList};
pub use statement::{
    FromClause, FromSource, HavingClause, LimitClause, OrderBy, SelectStatement, SortOrder,
    WhereClause,
};
