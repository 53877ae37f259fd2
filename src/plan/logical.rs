//! Logical plans
//!
//! A logical plan says what a query computes, independent of any database.
//! Trees are built bottom-up, so every input is owned by its parent and the
//! tree can never contain a cycle.

use serde::{Deserialize, Serialize};

use crate::expr::{DataType, Expression};
use crate::sql::{OrderBy, Selector, SelectorList};

/// Aggregates an `Aggregate` node can apply
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregateFunction {
    Sum,
    Min,
    Max,
    Avg,
    Count,
    /// Value at the earliest timestamp
    First,
    /// Value at the latest timestamp
    Last,
    /// Comma-joined string values
    GroupConcat,
}

impl AggregateFunction {
    pub fn name(&self) -> &'static str {
        match self {
            AggregateFunction::Sum => "sum",
            AggregateFunction::Min => "min",
            AggregateFunction::Max => "max",
            AggregateFunction::Avg => "avg",
            AggregateFunction::Count => "count",
            AggregateFunction::First => "first",
            AggregateFunction::Last => "last",
            AggregateFunction::GroupConcat => "group_concat",
        }
    }

    /// Whether the input must be numeric
    pub fn requires_numeric(&self) -> bool {
        matches!(self, AggregateFunction::Sum | AggregateFunction::Avg)
    }

    /// Declared type of the aggregate over an input of type `input`
    pub fn output_type(&self, input: DataType) -> DataType {
        match self {
            AggregateFunction::Count => DataType::Long,
            AggregateFunction::Avg => DataType::Double,
            AggregateFunction::GroupConcat => DataType::String,
            _ => input,
        }
    }
}

impl std::fmt::Display for AggregateFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Group rows into fixed time intervals
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeBucket {
    /// Timestamp column to floor
    pub column: String,
    /// Bucket width
    pub interval_seconds: i64,
}

/// A node in a logical plan
#[derive(Debug, Clone, PartialEq)]
pub enum LogicalPlan {
    /// Read rows from a table
    TableScan {
        table: String,
        filter: Option<Expression>,
        /// Empty means every column
        selectors: SelectorList,
    },
    /// Aggregate one field, grouped by zero or more columns
    Aggregate {
        input: Box<LogicalPlan>,
        function: AggregateFunction,
        field: String,
        group_by: Vec<String>,
        time_bucket: Option<TimeBucket>,
    },
    /// Order the input's rows
    Sort {
        input: Box<LogicalPlan>,
        order_by: Vec<OrderBy>,
    },
    /// Keep at most `limit` rows, skipping `offset`
    Limit {
        input: Box<LogicalPlan>,
        limit: u64,
        offset: Option<u64>,
    },
}

impl LogicalPlan {
    /// Scan every column of a table
    pub fn scan(table: impl Into<String>) -> Self {
        LogicalPlan::TableScan {
            table: table.into(),
            filter: None,
            selectors: SelectorList::new(),
        }
    }

    /// Restrict the scanned rows.
    ///
    /// Filters always apply to the rows read from the table, so on any other
    /// node the filter is pushed to the scan underneath. Repeated calls are
    /// ANDed together.
    pub fn with_filter(self, filter: Expression) -> Self {
        match self {
            LogicalPlan::TableScan {
                table,
                filter: existing,
                selectors,
            } => LogicalPlan::TableScan {
                table,
                filter: Some(match existing {
                    Some(existing) => existing.and(filter),
                    None => filter,
                }),
                selectors,
            },
            LogicalPlan::Aggregate {
                input,
                function,
                field,
                group_by,
                time_bucket,
            } => LogicalPlan::Aggregate {
                input: Box::new((*input).with_filter(filter)),
                function,
                field,
                group_by,
                time_bucket,
            },
            LogicalPlan::Sort { input, order_by } => LogicalPlan::Sort {
                input: Box::new((*input).with_filter(filter)),
                order_by,
            },
            LogicalPlan::Limit {
                input,
                limit,
                offset,
            } => LogicalPlan::Limit {
                input: Box::new((*input).with_filter(filter)),
                limit,
                offset,
            },
        }
    }

    /// Add a projected column or expression to a scan; ignored on other nodes
    pub fn select(mut self, selector: Selector) -> Self {
        if let LogicalPlan::TableScan { selectors, .. } = &mut self {
            selectors.push(selector);
        }
        self
    }

    /// Aggregate `field` of `input`, grouped by `group_by`
    pub fn aggregate(
        input: LogicalPlan,
        function: AggregateFunction,
        field: impl Into<String>,
        group_by: &[&str],
    ) -> Self {
        LogicalPlan::Aggregate {
            input: Box::new(input),
            function,
            field: field.into(),
            group_by: group_by.iter().map(|g| g.to_string()).collect(),
            time_bucket: None,
        }
    }

    /// Group an aggregate into time buckets; ignored on other nodes
    pub fn with_time_bucket(mut self, column: impl Into<String>, interval_seconds: i64) -> Self {
        if let LogicalPlan::Aggregate { time_bucket, .. } = &mut self {
            *time_bucket = Some(TimeBucket {
                column: column.into(),
                interval_seconds,
            });
        }
        self
    }

    pub fn sort(input: LogicalPlan, order_by: Vec<OrderBy>) -> Self {
        LogicalPlan::Sort {
            input: Box::new(input),
            order_by,
        }
    }

    pub fn limit(input: LogicalPlan, limit: u64, offset: Option<u64>) -> Self {
        LogicalPlan::Limit {
            input: Box::new(input),
            limit,
            offset,
        }
    }

    /// Input of this node, `None` for scans
    pub fn input(&self) -> Option<&LogicalPlan> {
        match self {
            LogicalPlan::TableScan { .. } => None,
            LogicalPlan::Aggregate { input, .. }
            | LogicalPlan::Sort { input, .. }
            | LogicalPlan::Limit { input, .. } => Some(&**input),
        }
    }

    /// Short node name for diagnostics
    pub fn kind(&self) -> &'static str {
        match self {
            LogicalPlan::TableScan { .. } => "TableScan",
            LogicalPlan::Aggregate { .. } => "Aggregate",
            LogicalPlan::Sort { .. } => "Sort",
            LogicalPlan::Limit { .. } => "Limit",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::compile;

    #[test]
    fn test_filters_reach_the_scan() {
        let plan = LogicalPlan::aggregate(LogicalPlan::scan("t"), AggregateFunction::Sum, "v", &[])
            .with_filter(compile("a = 1").unwrap())
            .with_filter(compile("b = 2").unwrap());

        match plan.input() {
            Some(LogicalPlan::TableScan { filter, .. }) => {
                assert_eq!(filter.as_ref(), Some(&compile("a = 1 AND b = 2").unwrap()));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_builder_shape() {
        let plan = LogicalPlan::limit(
            LogicalPlan::sort(
                LogicalPlan::aggregate(LogicalPlan::scan("t"), AggregateFunction::Count, "v", &["g"])
                    .with_time_bucket("ts", 60),
                vec![OrderBy::desc("v")],
            ),
            10,
            None,
        );

        let kinds: Vec<&str> = std::iter::successors(Some(&plan), |p| p.input())
            .map(LogicalPlan::kind)
            .collect();
        assert_eq!(kinds, vec!["Limit", "Sort", "Aggregate", "TableScan"]);
    }

    #[test]
    fn test_aggregate_function_serde() {
        let f: AggregateFunction = serde_json::from_str("\"group_concat\"").unwrap();
        assert_eq!(f, AggregateFunction::GroupConcat);
        assert_eq!(serde_json::to_string(&AggregateFunction::Avg).unwrap(), "\"avg\"");
    }
}
