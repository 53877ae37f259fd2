//! MySQL dialect

use super::{sql_timestamp, SqlDialect, COMMON_FUNCTIONS};
use crate::expr::{BinaryOp, Expression, ExpressionStyle};

#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlDialect;

impl ExpressionStyle for MySqlDialect {
    fn quote_identifier(&self, name: &str) -> String {
        format!("`{}`", name.replace('`', "``"))
    }

    fn string_escape_char(&self) -> char {
        '\\'
    }

    fn format_timestamp(&self, millis: i64) -> String {
        format!("'{}'", sql_timestamp(millis))
    }
}

impl SqlDialect for MySqlDialect {
    fn name(&self) -> &'static str {
        "mysql"
    }

    fn need_table_alias(&self) -> bool {
        true
    }

    fn is_alias_allowed_in_where_clause(&self) -> bool {
        false
    }

    // FLOOR(UNIX_TIMESTAMP(ts) / n) * n
    fn time_floor_expression(&self, ts: Expression, interval_seconds: i64) -> Expression {
        let seconds = Expression::function("UNIX_TIMESTAMP", vec![ts]);
        let buckets = Expression::function(
            "FLOOR",
            vec![Expression::binary(
                BinaryOp::Div,
                seconds,
                Expression::long(interval_seconds),
            )],
        );
        Expression::binary(BinaryOp::Mul, buckets, Expression::long(interval_seconds))
    }

    fn string_aggregator(&self, field: Expression) -> Expression {
        Expression::function("GROUP_CONCAT", vec![field])
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
    use crate::expr::serialize;

    #[test]
    fn test_time_floor() {
        let d = MySqlDialect;
        let floor = d.time_floor_expression(Expression::identifier("ts"), 300);
        assert_eq!(serialize(&floor, &d), "FLOOR(UNIX_TIMESTAMP(`ts`) / 300) * 300");
    }

    #[test]
    fn test_string_aggregator() {
        let d = MySqlDialect;
        let agg = d.string_aggregator(Expression::identifier("host"));
        assert_eq!(serialize(&agg, &d), "GROUP_CONCAT(`host`)");
    }

    #[test]
    fn test_quoting() {
        assert_eq!(MySqlDialect.quote_identifier("we`ird"), "`we``ird`");
        assert!(MySqlDialect.need_table_alias());
    }
}
