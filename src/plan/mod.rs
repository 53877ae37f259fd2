//! Query Planning
//!
//! Declarative queries become SQL in three steps:
//!
//! ```text
//! QueryRequest ──▶ LogicalPlan ──▶ PhysicalPlan (SelectStatement) ──▶ SQL text
//!   (serde)         (what)          (dialect-specific how)
//! ```

mod error;
mod logical;
mod planner;
mod request;

pub use error::{PlanError, PlanResult};
pub use logical::{AggregateFunction, LogicalPlan, TimeBucket};
pub use planner::{PhysicalPlan, PhysicalPlanner};
pub use request::{AggregateRequest, OrderRequest, QueryRequest, TimeInterval};
