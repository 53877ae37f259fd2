//! Dialect error types

use thiserror::Error;

/// Errors raised while adapting expressions to a dialect
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DialectError {
    /// The dialect can neither express nor rewrite the construct
    #[error("Unsupported construct for {dialect}: {construct}")]
    UnsupportedConstruct {
        dialect: &'static str,
        construct: String,
    },

    /// No dialect is registered under the tag
    #[error("Unknown dialect: {0}")]
    UnknownDialect(String),
}

/// Result type for dialect operations
pub type DialectResult<T> = Result<T, DialectError>;
