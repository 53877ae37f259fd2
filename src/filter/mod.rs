//! Filter and Path Compilers
//!
//! Row filters and nested field paths written as text, compiled once and
//! evaluated against many [`InputRow`](crate::row::InputRow)s.
//!
//! # Example
//!
//! ```rust
//! use sightline::filter::{compile_filter, compile_path};
//! use sightline::row::{row_of, Value};
//!
//! let filter = compile_filter("status >= 500 AND service = 'checkout'").unwrap();
//! let row = row_of([("status", Value::Long(503)), ("service", Value::from("checkout"))]);
//! assert!(filter.evaluate(&row));
//!
//! let path = compile_path("service.name").unwrap();
//! assert_eq!(path.evaluate(&row), Some(&Value::from("checkout")));
//! ```

mod parser;
mod path;
mod predicate;

pub use parser::{compile_filter, FilterCompiler};
pub use path::{compile_path, PathExpression};
pub use predicate::{Predicate, ValueExtractor};
