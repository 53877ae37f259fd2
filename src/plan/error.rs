//! Planning error types

use thiserror::Error;

use super::logical::AggregateFunction;
use crate::dialect::DialectError;
use crate::expr::{DataType, SyntaxError};

/// Errors that can occur while planning a query
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlanError {
    /// A referenced column is not produced by the plan's input
    #[error("Unresolved column '{column}' in {context}")]
    UnresolvedColumn { column: String, context: String },

    /// The dialect cannot express part of the query
    #[error(transparent)]
    Unsupported(#[from] DialectError),

    /// Aggregate over a column whose declared type it can't take
    #[error("Cannot apply {function} to '{column}' of type {found}")]
    TypeMismatch {
        function: AggregateFunction,
        column: String,
        found: DataType,
    },

    /// Time bucket interval must be positive
    #[error("Invalid granularity: {0} seconds")]
    InvalidGranularity(i64),

    /// Filter text failed to compile
    #[error(transparent)]
    Syntax(#[from] SyntaxError),
}

impl PlanError {
    pub(crate) fn unresolved(column: impl Into<String>, context: impl Into<String>) -> Self {
        PlanError::UnresolvedColumn {
            column: column.into(),
            context: context.into(),
        }
    }
}

/// Result type for planning operations
pub type PlanResult<T> = Result<T, PlanError>;
