//! Aggregation schema
//!
//! Fixed at construction: which column carries the timestamp, which columns
//! form the grouping key (in order) and how each metric is reduced.

use serde::{Deserialize, Serialize};

use super::number::NumberAggregator;

/// How a metric column is reduced within a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricKind {
    Sum,
    Min,
    Max,
    Count,
    /// Derived later from the physical metrics; never accumulated here
    PostAggregation,
}

impl MetricKind {
    /// Fresh accumulator, `None` for post-aggregation metrics
    pub fn aggregator(&self) -> Option<NumberAggregator> {
        match self {
            MetricKind::Sum => Some(NumberAggregator::Sum(None)),
            MetricKind::Min => Some(NumberAggregator::Min(None)),
            MetricKind::Max => Some(NumberAggregator::Max(None)),
            MetricKind::Count => Some(NumberAggregator::Count(0)),
            MetricKind::PostAggregation => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    /// Source column, also the output column
    pub name: String,
    pub kind: MetricKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSchema {
    /// Empty when left to the configured default
    #[serde(default)]
    pub timestamp_column: String,
    /// Grouping columns, in key order
    #[serde(default)]
    pub dimensions: Vec<String>,
    #[serde(default)]
    pub metrics: Vec<MetricSpec>,
}

impl MetricSchema {
    pub fn new(timestamp_column: impl Into<String>) -> Self {
        Self {
            timestamp_column: timestamp_column.into(),
            dimensions: Vec::new(),
            metrics: Vec::new(),
        }
    }

    pub fn with_dimension(mut self, name: impl Into<String>) -> Self {
        self.dimensions.push(name.into());
        self
    }

    pub fn with_metric(mut self, name: impl Into<String>, kind: MetricKind) -> Self {
        self.metrics.push(MetricSpec {
            name: name.into(),
            kind,
        });
        self
    }

    /// Use `column` as the timestamp column unless one is already set
    pub fn or_timestamp_column(mut self, column: &str) -> Self {
        if self.timestamp_column.is_empty() {
            self.timestamp_column = column.to_string();
        }
        self
    }

    /// Metrics with a concrete accumulator, paired with a fresh one
    pub(crate) fn physical_metrics(&self) -> Vec<(String, NumberAggregator)> {
        self.metrics
            .iter()
            .filter_map(|m| m.kind.aggregator().map(|agg| (m.name.clone(), agg)))
            .collect()
    }
}
