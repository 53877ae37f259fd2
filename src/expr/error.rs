//! Expression compiler error types

use thiserror::Error;

/// Malformed expression, filter or path text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Syntax error at position {position}: {message}")]
pub struct SyntaxError {
    /// Character offset into the source text
    pub position: usize,
    /// Human readable description
    pub message: String,
}

impl SyntaxError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}

/// Result type for compiler operations
pub type SyntaxResult<T> = Result<T, SyntaxError>;
