//! Physical planner
//!
//! Lowers a [`LogicalPlan`] into a [`SelectStatement`] for one dialect.
//!
//! # Planning Rules
//!
//! ```text
//! TableScan          → SELECT selectors FROM table WHERE filter
//! Aggregate(scan)    → pushdown: reuse the scan's FROM/WHERE, GROUP BY here
//! Aggregate(other)   → SELECT ... FROM (input) GROUP BY ...
//! first/last         → FIRST_VALUE window in a sub-select, or argMin/argMax
//! Sort / Limit       → attached to the input, or wrapped around it
//! ```
//!
//! Every column an operator references is checked against what its input
//! exposes before any SQL text is produced.

use tracing::debug;

use super::error::{PlanError, PlanResult};
use super::logical::{AggregateFunction, LogicalPlan, TimeBucket};
use crate::config::PlannerConfig;
use crate::dialect::{SqlDialect, WindowSpec};
use crate::expr::{serialize, DataType, Expression};
use crate::sql::{OrderBy, SelectColumn, SelectStatement, Selector, SelectorList};

/// Output of the planner
#[derive(Debug, Clone, PartialEq)]
pub enum PhysicalPlan {
    /// Plain read of a table
    TableScan(SelectStatement),
    /// Any other statement
    Select(SelectStatement),
}

impl PhysicalPlan {
    pub fn statement(&self) -> &SelectStatement {
        match self {
            PhysicalPlan::TableScan(stmt) | PhysicalPlan::Select(stmt) => stmt,
        }
    }

    pub fn into_statement(self) -> SelectStatement {
        match self {
            PhysicalPlan::TableScan(stmt) | PhysicalPlan::Select(stmt) => stmt,
        }
    }
}

/// Lowers logical plans into SQL for one dialect
#[derive(Debug, Clone)]
pub struct PhysicalPlanner {
    dialect: &'static dyn SqlDialect,
    /// Column first/last values are ordered by
    timestamp_column: String,
    /// Output name of the time bucket column
    bucket_alias: String,
}

impl PhysicalPlanner {
    pub fn new(dialect: &'static dyn SqlDialect) -> Self {
        Self {
            dialect,
            timestamp_column: "timestamp".to_string(),
            bucket_alias: "_timestamp".to_string(),
        }
    }

    pub fn from_config(config: &PlannerConfig) -> Self {
        Self {
            dialect: config.dialect.sql_dialect(),
            timestamp_column: config.timestamp_column.clone(),
            bucket_alias: config.time_bucket_alias.clone(),
        }
    }

    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = column.into();
        self
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.dialect
    }

    /// Plan a logical tree
    pub fn plan(&self, plan: &LogicalPlan) -> PlanResult<PhysicalPlan> {
        match plan {
            LogicalPlan::TableScan {
                table,
                filter,
                selectors,
            } => self.visit_table_scan(table, filter.as_ref(), selectors),
            LogicalPlan::Aggregate {
                input,
                function,
                field,
                group_by,
                time_bucket,
            } => self.visit_aggregate(input, *function, field, group_by, time_bucket.as_ref()),
            LogicalPlan::Sort { input, order_by } => self.visit_sort(input, order_by),
            LogicalPlan::Limit {
                input,
                limit,
                offset,
            } => self.visit_limit(input, *limit, *offset),
        }
    }

    /// Plan a logical tree and render it
    pub fn to_sql(&self, plan: &LogicalPlan) -> PlanResult<String> {
        let physical = self.plan(plan)?;
        Ok(physical.statement().to_sql(self.dialect))
    }

    fn visit_table_scan(
        &self,
        table: &str,
        filter: Option<&Expression>,
        selectors: &SelectorList,
    ) -> PlanResult<PhysicalPlan> {
        let mut stmt = SelectStatement::from_table(table);
        for selector in selectors {
            stmt.select(self.transform_selector(selector)?);
        }

        if let Some(filter) = filter {
            let filter = if self.dialect.is_alias_allowed_in_where_clause() {
                filter.clone()
            } else {
                inline_aliases(filter.clone(), selectors)
            };
            stmt.add_where(self.dialect.transform(filter)?);
        }

        Ok(PhysicalPlan::TableScan(stmt))
    }

    fn transform_selector(&self, selector: &Selector) -> PlanResult<Selector> {
        let column = match &selector.column {
            SelectColumn::Expression(expr) => {
                SelectColumn::Expression(self.dialect.transform(expr.clone())?)
            }
            other => other.clone(),
        };
        Ok(Selector {
            column,
            ..selector.clone()
        })
    }

    fn visit_aggregate(
        &self,
        input: &LogicalPlan,
        function: AggregateFunction,
        field: &str,
        group_by: &[String],
        time_bucket: Option<&TimeBucket>,
    ) -> PlanResult<PhysicalPlan> {
        if let Some(bucket) = time_bucket {
            if bucket.interval_seconds <= 0 {
                return Err(PlanError::InvalidGranularity(bucket.interval_seconds));
            }
        }

        let child = self.plan(input)?;
        let windowed = matches!(function, AggregateFunction::First | AggregateFunction::Last)
            && self.dialect.use_window_function_as_aggregator(function.name());

        let field_type = {
            let exposed = child.statement();
            let count_all = function == AggregateFunction::Count && field == "*";
            if !count_all && !exposed.exposes(field) {
                return Err(PlanError::unresolved(field, "aggregate field"));
            }
            let field_type = exposed
                .selectors
                .find(field)
                .map(Selector::data_type)
                .unwrap_or(DataType::Any);
            if function.requires_numeric() && field_type != DataType::Any && !field_type.is_numeric() {
                return Err(PlanError::TypeMismatch {
                    function,
                    column: field.to_string(),
                    found: field_type,
                });
            }
            for column in group_by {
                if !exposed.exposes(column) {
                    return Err(PlanError::unresolved(column.as_str(), "group by"));
                }
            }
            if let Some(bucket) = time_bucket {
                if !exposed.exposes(&bucket.column) {
                    return Err(PlanError::unresolved(bucket.column.as_str(), "time bucket"));
                }
            }
            let needs_timestamp =
                matches!(function, AggregateFunction::First | AggregateFunction::Last);
            if needs_timestamp && !exposed.exposes(&self.timestamp_column) {
                return Err(PlanError::unresolved(
                    self.timestamp_column.as_str(),
                    "first/last ordering",
                ));
            }
            field_type
        };

        let pushdown = matches!(
            &child,
            PhysicalPlan::TableScan(scan) if ColumnResolver::can_inline(&scan.selectors)
        );
        debug!(
            function = %function,
            field,
            pushdown,
            windowed,
            "Planning aggregate"
        );

        let (mut stmt, resolver) = self.aggregate_base(child, pushdown);

        if windowed {
            return Ok(PhysicalPlan::Select(self.window_aggregate(
                stmt,
                &resolver,
                function,
                field,
                group_by,
                time_bucket,
            )));
        }

        if let Some(bucket) = time_bucket {
            let floor = self.floor(&resolver, bucket);
            stmt.select(Selector::expression(floor.clone()).with_alias(self.bucket_alias.clone()));
            stmt.add_group_by(floor);
        }
        for column in group_by {
            let expr = resolver.resolve(column);
            stmt.select(Selector::expression(expr.clone()).with_alias(column.clone()));
            stmt.add_group_by(expr);
        }
        stmt.select(
            self.aggregate_selector(&resolver, function, field)
                .with_type(function.output_type(field_type)),
        );

        Ok(PhysicalPlan::Select(stmt))
    }

    /// Empty statement the aggregate is built on, and how to resolve the
    /// input's column names inside it
    fn aggregate_base(
        &self,
        child: PhysicalPlan,
        pushdown: bool,
    ) -> (SelectStatement, ColumnResolver) {
        let input = child.into_statement();
        if !pushdown {
            return (
                SelectStatement::from_subquery(input, None),
                ColumnResolver::default(),
            );
        }
        let resolver = ColumnResolver::from_selectors(&input.selectors);
        let stmt = SelectStatement {
            from: input.from,
            where_clause: input.where_clause,
            ..SelectStatement::default()
        };
        (stmt, resolver)
    }

    fn floor(&self, resolver: &ColumnResolver, bucket: &TimeBucket) -> Expression {
        self.dialect
            .time_floor_expression(resolver.resolve(&bucket.column), bucket.interval_seconds)
    }

    fn aggregate_selector(
        &self,
        resolver: &ColumnResolver,
        function: AggregateFunction,
        field: &str,
    ) -> Selector {
        if function == AggregateFunction::Count && field == "*" {
            return Selector::expression(Expression::function("count", vec![])).with_alias("count");
        }

        let value = resolver.resolve(field);
        let selector = match function {
            AggregateFunction::GroupConcat => {
                Selector::expression(self.dialect.string_aggregator(value))
            }
            AggregateFunction::First | AggregateFunction::Last => {
                let window = WindowSpec {
                    partition_by: Vec::new(),
                    order_by: serialize(&resolver.resolve(&self.timestamp_column), self.dialect),
                };
                let rendered = serialize(&value, self.dialect);
                Selector::text(if function == AggregateFunction::First {
                    self.dialect.first_aggregator(&rendered, &window)
                } else {
                    self.dialect.last_aggregator(&rendered, &window)
                })
            }
            _ => Selector::expression(Expression::function(function.name(), vec![value])),
        };
        selector.with_alias(field)
    }

    /// First/last emulated with `FIRST_VALUE` over a window.
    ///
    /// The window repeats the same value on every row of a partition, so the
    /// outer statement only has to collapse duplicates with GROUP BY.
    fn window_aggregate(
        &self,
        mut inner: SelectStatement,
        resolver: &ColumnResolver,
        function: AggregateFunction,
        field: &str,
        group_by: &[String],
        time_bucket: Option<&TimeBucket>,
    ) -> SelectStatement {
        let mut partition_by = Vec::new();
        let mut outer_columns = Vec::new();

        if let Some(bucket) = time_bucket {
            let floor = self.floor(resolver, bucket);
            partition_by.push(serialize(&floor, self.dialect));
            inner.select(Selector::expression(floor).with_alias(self.bucket_alias.clone()));
            outer_columns.push(self.bucket_alias.clone());
        }
        for column in group_by {
            let expr = resolver.resolve(column);
            partition_by.push(serialize(&expr, self.dialect));
            inner.select(Selector::expression(expr).with_alias(column.clone()));
            outer_columns.push(column.clone());
        }

        let window = WindowSpec {
            partition_by,
            order_by: serialize(&resolver.resolve(&self.timestamp_column), self.dialect),
        };
        let rendered = serialize(&resolver.resolve(field), self.dialect);
        let value = if function == AggregateFunction::First {
            self.dialect.first_aggregator(&rendered, &window)
        } else {
            self.dialect.last_aggregator(&rendered, &window)
        };
        inner.select(Selector::text(value).with_alias(field));
        outer_columns.push(field.to_string());

        let mut outer = SelectStatement::from_subquery(inner, None);
        for column in outer_columns {
            let expr = Expression::identifier(column.clone());
            outer.select(Selector::column(column));
            outer.add_group_by(expr);
        }
        outer
    }

    fn visit_sort(&self, input: &LogicalPlan, order_by: &[OrderBy]) -> PlanResult<PhysicalPlan> {
        let child = self.plan(input)?;
        for order in order_by {
            for column in order.expression.identifiers() {
                if !child.statement().exposes(column) {
                    return Err(PlanError::unresolved(column, "order by"));
                }
            }
        }

        let mut stmt = child.into_statement();
        if !stmt.order_by.is_empty() || stmt.limit.is_some() {
            debug!("Wrapping input to apply ORDER BY");
            stmt = SelectStatement::from_subquery(stmt, None);
        }
        for order in order_by {
            stmt.add_order_by(OrderBy {
                expression: self.dialect.transform(order.expression.clone())?,
                order: order.order,
            });
        }
        Ok(PhysicalPlan::Select(stmt))
    }

    fn visit_limit(
        &self,
        input: &LogicalPlan,
        limit: u64,
        offset: Option<u64>,
    ) -> PlanResult<PhysicalPlan> {
        let mut stmt = self.plan(input)?.into_statement();
        if stmt.limit.is_some() {
            debug!("Wrapping input to apply LIMIT");
            stmt = SelectStatement::from_subquery(stmt, None);
        }
        stmt.set_limit(limit, offset);
        Ok(PhysicalPlan::Select(stmt))
    }
}

/// Maps the input's column names to expressions valid in a pushed-down
/// statement. Aliased scan selectors are inlined by alias; everything else
/// is a plain column reference.
#[derive(Debug, Default)]
struct ColumnResolver {
    aliases: Vec<(String, Expression)>,
}

impl ColumnResolver {
    fn from_selectors(selectors: &SelectorList) -> Self {
        let aliases = selectors
            .iter()
            .filter_map(|s| match (&s.column, s.output_name()) {
                (SelectColumn::Expression(expr), Some(name)) => {
                    Some((name.to_string(), expr.clone()))
                }
                (SelectColumn::Column(column), Some(name)) if column != name => {
                    Some((name.to_string(), Expression::identifier(column.clone())))
                }
                _ => None,
            })
            .collect();
        Self { aliases }
    }

    /// Raw text selectors can't be inlined, so an alias on one blocks pushdown
    fn can_inline(selectors: &SelectorList) -> bool {
        !selectors
            .iter()
            .any(|s| matches!(s.column, SelectColumn::Text(_)) && s.alias.is_some())
    }

    fn resolve(&self, column: &str) -> Expression {
        self.aliases
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, expr)| expr.clone())
            .unwrap_or_else(|| Expression::identifier(column))
    }
}

/// Replace references to selector aliases with what they stand for
fn inline_aliases(filter: Expression, selectors: &SelectorList) -> Expression {
    let resolver = ColumnResolver::from_selectors(selectors);
    if resolver.aliases.is_empty() {
        return filter;
    }
    filter.transform_up(&mut |node| match node.as_identifier() {
        Some(name) => resolver.resolve(name),
        None => node,
    })
}
