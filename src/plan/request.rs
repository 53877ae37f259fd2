//! Declarative query requests
//!
//! The JSON shape outer layers submit. A request is lowered into a
//! [`LogicalPlan`] before planning.
//!
//! ```json
//! {
//!   "table": "http_requests",
//!   "filter": "status >= 500 AND startsWith(uri, '/api')",
//!   "interval": { "start_ms": 1705329000000, "end_ms": 1705332600000 },
//!   "aggregate": { "function": "count", "field": "status", "group_by": ["uri"], "bucket_seconds": 60 },
//!   "order_by": [{ "column": "status", "descending": true }],
//!   "limit": 10
//! }
//! ```

use serde::{Deserialize, Serialize};

use super::error::PlanResult;
use super::logical::{AggregateFunction, LogicalPlan};
use crate::expr::{compile, ComparisonOp, Expression};
use crate::sql::{OrderBy, Selector, SortOrder};

/// Half-open time range `[start_ms, end_ms)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeInterval {
    pub start_ms: i64,
    pub end_ms: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateRequest {
    pub function: AggregateFunction,
    pub field: String,
    #[serde(default)]
    pub group_by: Vec<String>,
    /// Time bucket width; omitted means a single bucket
    #[serde(default)]
    pub bucket_seconds: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub column: String,
    #[serde(default)]
    pub descending: bool,
}

/// A metric query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub table: String,
    /// Projected columns; empty means every column
    #[serde(default)]
    pub columns: Vec<String>,
    /// Expression text, see [`crate::expr::compile`]
    #[serde(default)]
    pub filter: Option<String>,
    #[serde(default)]
    pub interval: Option<TimeInterval>,
    #[serde(default)]
    pub aggregate: Option<AggregateRequest>,
    #[serde(default)]
    pub order_by: Vec<OrderRequest>,
    #[serde(default)]
    pub limit: Option<u64>,
    /// Only applied together with `limit`
    #[serde(default)]
    pub offset: Option<u64>,
}

impl QueryRequest {
    /// Lower the request into a logical plan
    ///
    /// `timestamp_column` is the column the interval restricts and time
    /// buckets are computed from.
    pub fn to_logical_plan(&self, timestamp_column: &str) -> PlanResult<LogicalPlan> {
        let mut plan = LogicalPlan::scan(self.table.clone());
        for column in &self.columns {
            plan = plan.select(Selector::column(column.clone()));
        }

        if let Some(text) = &self.filter {
            plan = plan.with_filter(compile(text)?);
        }

        if let Some(interval) = &self.interval {
            let ts = Expression::identifier(timestamp_column);
            let range = Expression::comparison(
                ComparisonOp::Gte,
                ts.clone(),
                Expression::timestamp(interval.start_ms),
            )
            .and(Expression::comparison(
                ComparisonOp::Lt,
                ts,
                Expression::timestamp(interval.end_ms),
            ));
            plan = plan.with_filter(range);
        }

        if let Some(agg) = &self.aggregate {
            let group_by: Vec<&str> = agg.group_by.iter().map(String::as_str).collect();
            plan = LogicalPlan::aggregate(plan, agg.function, agg.field.clone(), &group_by);
            if let Some(seconds) = agg.bucket_seconds {
                plan = plan.with_time_bucket(timestamp_column, seconds);
            }
        }

        if !self.order_by.is_empty() {
            let order_by = self
                .order_by
                .iter()
                .map(|o| OrderBy {
                    expression: Expression::identifier(o.column.clone()),
                    order: if o.descending {
                        SortOrder::Desc
                    } else {
                        SortOrder::Asc
                    },
                })
                .collect();
            plan = LogicalPlan::sort(plan, order_by);
        }

        if let Some(limit) = self.limit {
            plan = LogicalPlan::limit(plan, limit, self.offset);
        }

        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Dialect;
    use crate::plan::{PhysicalPlanner, PlanError};

    const REQUEST: &str = r#"{
        "table": "http_requests",
        "filter": "startsWith(uri, '/api')",
        "interval": { "start_ms": 0, "end_ms": 60000 },
        "aggregate": { "function": "sum", "field": "bytes", "group_by": ["uri"], "bucket_seconds": 10 },
        "order_by": [{ "column": "bytes", "descending": true }],
        "limit": 5
    }"#;

    #[test]
    fn test_request_to_sql() {
        let request: QueryRequest = serde_json::from_str(REQUEST).unwrap();
        let plan = request.to_logical_plan("timestamp").unwrap();
        let sql = PhysicalPlanner::new(Dialect::H2.sql_dialect()).to_sql(&plan).unwrap();

        assert_eq!(
            sql,
            "SELECT UNIX_TIMESTAMP(\"timestamp\") / 10 * 10 AS \"_timestamp\",\n\
             \x20      \"uri\",\n\
             \x20      sum(\"bytes\") AS \"bytes\"\n\
             FROM \"http_requests\"\n\
             WHERE (\"uri\" LIKE '/api%') \
             AND (\"timestamp\" >= TIMESTAMP '1970-01-01 00:00:00.000') \
             AND (\"timestamp\" < TIMESTAMP '1970-01-01 00:01:00.000')\n\
             GROUP BY UNIX_TIMESTAMP(\"timestamp\") / 10 * 10, \"uri\"\n\
             ORDER BY \"bytes\" DESC\n\
             LIMIT 5"
        );
    }

    #[test]
    fn test_minimal_request() {
        let request: QueryRequest = serde_json::from_str(r#"{ "table": "t" }"#).unwrap();
        assert_eq!(request.to_logical_plan("ts").unwrap(), LogicalPlan::scan("t"));
    }

    #[test]
    fn test_bad_filter_is_a_syntax_error() {
        let request = QueryRequest {
            table: "t".to_string(),
            columns: vec![],
            filter: Some("a = (1".to_string()),
            interval: None,
            aggregate: None,
            order_by: vec![],
            limit: None,
            offset: None,
        };
        assert!(matches!(request.to_logical_plan("ts"), Err(PlanError::Syntax(_))));
    }
}
