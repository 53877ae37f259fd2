//! # Sightline
//!
//! Metric query compiler and streaming aggregator.
//!
//! ## Features
//!
//! - **Expression model**: typed AST with a text compiler, dialect-aware
//!   serializer and bottom-up rewrite passes
//! - **Filter & path compilers**: textual row filters and nested field paths
//! - **Query planning**: logical plans lowered into SQL statement ASTs with
//!   aggregate pushdown
//! - **Dialects**: H2, MySQL and ClickHouse, each papering over its own
//!   incompatibilities (window emulation, safe division, LIKE rewrites)
//! - **Streaming aggregation**: time-bucketed pre-aggregation of raw telemetry
//!   rows with read-and-clear flushes
//!
//! ## Modules
//!
//! - [`expr`]: Expression AST, compiler, serializer and optimizer
//! - [`filter`]: Filter and path compilers
//! - [`row`]: Input row contract shared by filters and the aggregator
//! - [`sql`]: SELECT statement AST and serializer
//! - [`dialect`]: Per-database SQL capabilities
//! - [`plan`]: Logical plans and the physical planner
//! - [`aggregator`]: Streaming metrics aggregator
//! - [`config`]: Configuration loading
//!
//! ## Quick Start
//!
//! ```rust
//! use sightline::dialect::Dialect;
//! use sightline::plan::{AggregateFunction, LogicalPlan, PhysicalPlanner};
//!
//! let scan = LogicalPlan::scan("http_requests")
//!     .with_filter(sightline::expr::compile("status >= 500").unwrap());
//! let plan = LogicalPlan::aggregate(scan, AggregateFunction::Count, "status", &["uri"]);
//!
//! let planner = PhysicalPlanner::new(Dialect::H2.sql_dialect());
//! let sql = planner.to_sql(&plan).unwrap();
//! assert!(sql.contains("GROUP BY \"uri\""));
//! ```

pub mod aggregator;
pub mod config;
pub mod dialect;
pub mod expr;
pub mod filter;
pub mod plan;
pub mod row;
pub mod sql;

// Re-export top-level types for convenience
pub use expr::{compile, BinaryOp, ComparisonOp, DataType, Expression, Literal, LogicalOp, SyntaxError};

pub use filter::{compile_filter, compile_path, FilterCompiler, PathExpression, Predicate, ValueExtractor};

pub use row::{InputRow, Value};

pub use sql::{OrderBy, SelectStatement, Selector, SelectorList, SortOrder};

pub use dialect::{Dialect, DialectError, SqlDialect};

pub use plan::{
    AggregateFunction, LogicalPlan, PhysicalPlan, PhysicalPlanner, PlanError, PlanResult,
    QueryRequest, TimeBucket,
};

pub use aggregator::{
    spawn_flush_task, AggregatedRow, AggregatorError, MetricKind, MetricSchema, MetricSpec,
    NumberAggregator, StreamingAggregator,
};

pub use config::{AggregatorConfig, Config, ConfigError, LoggingConfig, PlannerConfig};
