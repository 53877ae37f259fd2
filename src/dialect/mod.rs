//! SQL Dialects
//!
//! Each supported database is a stateless [`SqlDialect`] singleton. The
//! planner asks the dialect how to quote, floor timestamps, aggregate strings
//! and pick first/last values, and runs every expression through
//! [`SqlDialect::transform`] before it reaches a statement.
//!
//! | capability                   | h2      | mysql   | clickhouse |
//! |------------------------------|---------|---------|------------|
//! | identifier quoting           | `"x"`   | `` `x` `` | `"x"`    |
//! | derived table alias required | no      | yes     | no         |
//! | alias usable in WHERE        | no      | no      | yes        |
//! | string escape                | `''`    | `\'`    | `\'`       |
//! | first/last                   | window  | window  | argMin/argMax |
//! | startsWith/endsWith/hasToken | LIKE    | LIKE    | native     |
//! | map access                   | JSON LIKE | JSON LIKE | native  |

mod clickhouse;
mod error;
mod h2;
mod mysql;
pub mod rewrite;

use chrono::{TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::expr::{Expression, ExpressionStyle};

pub use clickhouse::ClickHouseDialect;
pub use error::{DialectError, DialectResult};
pub use h2::H2Dialect;
pub use mysql::MySqlDialect;

/// Window used when first/last values are computed with `FIRST_VALUE`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSpec {
    /// Rendered partition expressions
    pub partition_by: Vec<String>,
    /// Rendered ordering expression, ascending
    pub order_by: String,
}

impl WindowSpec {
    fn render(&self, descending: bool) -> String {
        let mut out = String::from("OVER (");
        if !self.partition_by.is_empty() {
            out.push_str("PARTITION BY ");
            out.push_str(&self.partition_by.join(", "));
            out.push(' ');
        }
        out.push_str("ORDER BY ");
        out.push_str(&self.order_by);
        if descending {
            out.push_str(" DESC");
        }
        out.push(')');
        out
    }
}

/// Functions every dialect evaluates natively
const COMMON_FUNCTIONS: &[&str] = &[
    "lower", "upper", "concat", "length", "abs", "round", "sum", "min", "max", "avg", "count",
];

/// Capabilities of a target database
pub trait SqlDialect: ExpressionStyle + Send + Sync + std::fmt::Debug {
    /// Dialect tag, e.g. `"h2"`
    fn name(&self) -> &'static str;

    /// Whether a derived table needs an alias
    fn need_table_alias(&self) -> bool;

    /// Whether a SELECT alias may be referenced from WHERE
    fn is_alias_allowed_in_where_clause(&self) -> bool;

    /// Expression flooring `ts` to a multiple of `interval_seconds`, in seconds
    fn time_floor_expression(&self, ts: Expression, interval_seconds: i64) -> Expression;

    /// Comma-joining string aggregate over `field`
    fn string_aggregator(&self, field: Expression) -> Expression;

    /// Whether the named aggregate must be emulated with a window function
    fn use_window_function_as_aggregator(&self, name: &str) -> bool;

    /// Value of `field` at the earliest timestamp
    fn first_aggregator(&self, field: &str, window: &WindowSpec) -> String {
        format!("FIRST_VALUE({}) {}", field, window.render(false))
    }

    /// Value of `field` at the latest timestamp
    fn last_aggregator(&self, field: &str, window: &WindowSpec) -> String {
        format!("FIRST_VALUE({}) {}", field, window.render(true))
    }

    /// Whether a function can be emitted unchanged
    fn supports_function(&self, name: &str) -> bool {
        COMMON_FUNCTIONS.iter().any(|f| f.eq_ignore_ascii_case(name))
    }

    /// Whether `m['k']` is valid SQL
    fn supports_map_access(&self) -> bool {
        false
    }

    /// Adapt an expression to this dialect
    fn transform(&self, expr: Expression) -> DialectResult<Expression> {
        rewrite::transform(self, expr)
    }
}

/// Registered dialects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    H2,
    MySql,
    ClickHouse,
}

static H2: H2Dialect = H2Dialect;
static MYSQL: MySqlDialect = MySqlDialect;
static CLICKHOUSE: ClickHouseDialect = ClickHouseDialect;

impl Dialect {
    /// Look a dialect up by tag (case-insensitive)
    pub fn from_tag(tag: &str) -> DialectResult<Self> {
        match tag.trim().to_ascii_lowercase().as_str() {
            "h2" => Ok(Dialect::H2),
            "mysql" => Ok(Dialect::MySql),
            "clickhouse" => Ok(Dialect::ClickHouse),
            _ => Err(DialectError::UnknownDialect(tag.to_string())),
        }
    }

    pub fn tag(&self) -> &'static str {
        self.sql_dialect().name()
    }

    /// Shared dialect instance
    pub fn sql_dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Dialect::H2 => &H2,
            Dialect::MySql => &MYSQL,
            Dialect::ClickHouse => &CLICKHOUSE,
        }
    }

    pub fn all() -> [Dialect; 3] {
        [Dialect::H2, Dialect::MySql, Dialect::ClickHouse]
    }
}

impl std::str::FromStr for Dialect {
    type Err = DialectError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_tag(s)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// `YYYY-MM-DD HH:MM:SS.mmm` in UTC
pub(crate) fn sql_timestamp(millis: i64) -> String {
    match Utc.timestamp_millis_opt(millis) {
        chrono::LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S%.3f").to_string(),
        _ => millis.to_string(),
    }
}
