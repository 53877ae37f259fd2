//! Streaming Metrics Aggregator
//!
//! Pre-reduces raw telemetry rows into time-bucketed metric rows before they
//! reach storage.
//!
//! # Example
//!
//! ```rust
//! use sightline::aggregator::{MetricKind, MetricSchema, StreamingAggregator};
//! use sightline::row::{row_of, Value};
//!
//! let schema = MetricSchema::new("ts")
//!     .with_dimension("uri")
//!     .with_metric("latency", MetricKind::Max);
//! let aggregator = StreamingAggregator::new(schema, 10_000).unwrap();
//!
//! aggregator
//!     .aggregate(&row_of([("ts", Value::Long(1_000)), ("uri", "/a".into()), ("latency", Value::Long(30))]))
//!     .unwrap();
//!
//! let rows = aggregator.get_rows();
//! assert_eq!(rows[0].get("latency"), Some(&Value::Long(30)));
//! assert!(aggregator.get_rows().is_empty());
//! ```

mod engine;
mod error;
mod flush;
mod number;
mod schema;

pub use engine::{AggregatedRow, StreamingAggregator};
pub use error::{AggregatorError, AggregatorResult};
pub use flush::spawn_flush_task;
pub use number::{Number, NumberAggregator};
pub use schema::{MetricKind, MetricSchema, MetricSpec};
