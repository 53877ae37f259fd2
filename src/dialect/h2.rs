//! H2 dialect

use super::{sql_timestamp, SqlDialect, COMMON_FUNCTIONS};
use crate::expr::{BinaryOp, Expression, ExpressionStyle};

#[derive(Debug, Clone, Copy, Default)]
pub struct H2Dialect;

impl ExpressionStyle for H2Dialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("\"{}\"", name.replace('"', "\"\""))
    }

    fn string_escape_char(&self) -> char {
        '\''
    }

    fn format_timestamp(&self, millis: i64) -> String {
        format!("TIMESTAMP '{}'", sql_timestamp(millis))
    }
}

impl SqlDialect for H2Dialect {
    fn name(&self) -> &'static str {
        "h2"
    }

    fn need_table_alias(&self) -> bool {
        false
    }

    fn is_alias_allowed_in_where_clause(&self) -> bool {
        false
    }

    // UNIX_TIMESTAMP(ts) / n * n
    fn time_floor_expression(&self, ts: Expression, interval_seconds: i64) -> Expression {
        let seconds = Expression::function("UNIX_TIMESTAMP", vec![ts]);
        Expression::binary(
            BinaryOp::Mul,
            Expression::binary(BinaryOp::Div, seconds, Expression::long(interval_seconds)),
            Expression::long(interval_seconds),
        )
    }

    fn string_aggregator(&self, field: Expression) -> Expression {
        Expression::function("LISTAGG", vec![field, Expression::string(",")])
    }

    fn use_window_function_as_aggregator(&self, name: &str) -> bool {
        name.eq_ignore_ascii_case("first") || name.eq_ignore_ascii_case("last")
    }

    fn supports_function(&self, name: &str) -> bool {
        COMMON_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(name))
            || name.eq_ignore_ascii_case("REGEXP_LIKE")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::WindowSpec;
    use crate::expr::serialize;

    #[test]
    fn test_time_floor() {
        let d = H2Dialect;
        let floor = d.time_floor_expression(Expression::identifier("ts"), 60);
        assert_eq!(serialize(&floor, &d), "UNIX_TIMESTAMP(\"ts\") / 60 * 60");
    }

    #[test]
    fn test_aggregators() {
        let d = H2Dialect;
        let agg = d.string_aggregator(Expression::identifier("host"));
        assert_eq!(serialize(&agg, &d), "LISTAGG(\"host\", ',')");

        let window = WindowSpec {
            partition_by: vec!["\"uri\"".to_string()],
            order_by: "\"ts\"".to_string(),
        };
        assert_eq!(
            d.last_aggregator("\"status\"", &window),
            "FIRST_VALUE(\"status\") OVER (PARTITION BY \"uri\" ORDER BY \"ts\" DESC)"
        );
        assert!(d.use_window_function_as_aggregator("first"));
        assert!(!d.use_window_function_as_aggregator("sum"));
    }

    #[test]
    fn test_timestamp_literal() {
        assert_eq!(H2Dialect.format_timestamp(0), "TIMESTAMP '1970-01-01 00:00:00.000'");
    }
}
