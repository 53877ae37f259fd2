//! Expression Model
//!
//! Typed expression trees shared by filters, selectors and the planner.
//!
//! # Architecture
//!
//! ```text
//! Text ──► Compiler ──► Expression ──► Optimizer ──► Serializer ──► SQL text
//!            (nom)         (AST)      (transform_up)   (ExpressionStyle)
//! ```
//!
//! # Example
//!
//! ```rust
//! use sightline::expr::{compile, optimize};
//!
//! let expr = optimize(compile("status >= 500 AND TRUE").unwrap());
//! assert_eq!(expr.to_string(), "status >= 500");
//! ```

mod ast;
mod error;
pub mod functions;
pub(crate) mod lexer;
mod optimizer;
mod parser;
mod serializer;

pub use ast::{BinaryOp, ComparisonOp, DataType, Expression, Literal, LogicalOp};
pub use error::{SyntaxError, SyntaxResult};
pub use optimizer::optimize;
pub use parser::compile;
pub use serializer::{quote_string, serialize, Canonical, ExpressionStyle};
