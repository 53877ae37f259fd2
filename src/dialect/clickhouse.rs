//! ClickHouse dialect

use super::{SqlDialect, WindowSpec, COMMON_FUNCTIONS};
use crate::expr::{BinaryOp, Expression, ExpressionStyle};

/// Functions ClickHouse has beyond the common set
const NATIVE_FUNCTIONS: &[&str] = &["startsWith", "endsWith", "hasToken", "match"];

#[derive(Debug, Clone, Copy, Default)]
pub struct ClickHouseDialect;

impl ExpressionStyle for ClickHouseDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\\\""))
    }

    fn string_escape_char(&self) -> char {
        '\\'
    }

    fn format_timestamp(&self, millis: i64) -> String {
        format!("fromUnixTimestamp64Milli({})", millis)
    }
}

impl SqlDialect for ClickHouseDialect {
    fn name(&self) -> &'static str {
        "clickhouse"
    }

    fn need_table_alias(&self) -> bool {
        false
    }

    fn is_alias_allowed_in_where_clause(&self) -> bool {
        true
    }

    // intDiv(toUnixTimestamp(ts), n) * n
    fn time_floor_expression(&self, ts: Expression, interval_seconds: i64) -> Expression {
        let seconds = Expression::function("toUnixTimestamp", vec![ts]);
        Expression::binary(
            BinaryOp::Mul,
            Expression::function("intDiv", vec![seconds, Expression::long(interval_seconds)]),
            Expression::long(interval_seconds),
        )
    }

    fn string_aggregator(&self, field: Expression) -> Expression {
        Expression::function(
            "arrayStringConcat",
            vec![
                Expression::function("groupArray", vec![field]),
                Expression::string(","),
            ],
        )
    }

    fn use_window_function_as_aggregator(&self, _name: &str) -> bool {
        false
    }

    fn first_aggregator(&self, field: &str, window: &WindowSpec) -> String {
        format!("argMin({}, {})", field, window.order_by)
    }

    fn last_aggregator(&self, field: &str, window: &WindowSpec) -> String {
        format!("argMax({}, {})", field, window.order_by)
    }

    fn supports_function(&self, name: &str) -> bool {
        COMMON_FUNCTIONS
            .iter()
            .chain(NATIVE_FUNCTIONS)
            .any(|f| f.eq_ignore_ascii_case(name))
    }

    fn supports_map_access(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::serialize;

    #[test]
    fn test_time_floor() {
        let d = ClickHouseDialect;
        let floor = d.time_floor_expression(Expression::identifier("ts"), 10);
        assert_eq!(serialize(&floor, &d), "intDiv(toUnixTimestamp(\"ts\"), 10) * 10");
    }

    #[test]
    fn test_aggregators() {
        let d = ClickHouseDialect;
        let agg = d.string_aggregator(Expression::identifier("host"));
        assert_eq!(serialize(&agg, &d), "arrayStringConcat(groupArray(\"host\"), ',')");

        let window = WindowSpec {
            partition_by: vec![],
            order_by: "\"ts\"".to_string(),
        };
        assert_eq!(d.first_aggregator("\"v\"", &window), "argMin(\"v\", \"ts\")");
        assert_eq!(d.last_aggregator("\"v\"", &window), "argMax(\"v\", \"ts\")");
    }

    #[test]
    fn test_timestamp_literal() {
        assert_eq!(
            ClickHouseDialect.format_timestamp(1705329342123),
            "fromUnixTimestamp64Milli(1705329342123)"
        );
    }
}
