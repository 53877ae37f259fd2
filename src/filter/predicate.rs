//! Compiled row predicates
//!
//! A predicate tree whose leaves compare two [`ValueExtractor`]s. Column
//! references are resolved against each row when the predicate runs.

use tracing::debug;

use crate::expr::ComparisonOp;
use crate::row::{InputRow, Value};

/// Produces one operand of a comparison
#[derive(Debug, Clone, PartialEq)]
pub enum ValueExtractor {
    /// Fixed value from the filter text
    Constant(Value),
    /// Column looked up on the row
    Column(String),
}

impl ValueExtractor {
    /// Resolve against a row; `None` when the column is absent
    pub fn extract<'r, R: InputRow + ?Sized>(&'r self, row: &'r R) -> Option<&'r Value> {
        match self {
            ValueExtractor::Constant(value) => Some(value),
            ValueExtractor::Column(name) => row.get_column(name),
        }
    }
}

impl std::fmt::Display for ValueExtractor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueExtractor::Column(name) => write!(f, "{}", name),
            ValueExtractor::Constant(Value::String(s)) => {
                write!(f, "{}", crate::expr::quote_string(s, '\\'))
            }
            ValueExtractor::Constant(value) => write!(f, "{}", value),
        }
    }
}

/// A compiled filter
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `left OP right`
    Compare {
        op: ComparisonOp,
        left: ValueExtractor,
        right: ValueExtractor,
    },
    /// Every operand matches
    And(Vec<Predicate>),
    /// At least one operand matches
    Or(Vec<Predicate>),
    /// Logs operands and outcome of the wrapped leaf
    Debug(Box<Predicate>),
}

impl Predicate {
    /// Evaluate against a row
    pub fn evaluate<R: InputRow + ?Sized>(&self, row: &R) -> bool {
        match self {
            Predicate::Compare { op, left, right } => {
                compare(*op, left.extract(row), right.extract(row))
            }
            Predicate::And(operands) => operands.iter().all(|p| p.evaluate(row)),
            Predicate::Or(operands) => operands.iter().any(|p| p.evaluate(row)),
            Predicate::Debug(inner) => {
                let result = inner.evaluate(row);
                if let Predicate::Compare { left, right, .. } = inner.as_ref() {
                    debug!(
                        predicate = %inner,
                        left = ?left.extract(row),
                        right = ?right.extract(row),
                        result,
                        "Filter evaluated"
                    );
                } else {
                    debug!(predicate = %inner, result, "Filter evaluated");
                }
                result
            }
        }
    }

    /// Column names referenced anywhere in the predicate
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::Compare { left, right, .. } => {
                for side in [left, right] {
                    if let ValueExtractor::Column(name) = side {
                        if !out.contains(&name.as_str()) {
                            out.push(name);
                        }
                    }
                }
            }
            Predicate::And(operands) | Predicate::Or(operands) => {
                for operand in operands {
                    operand.collect_columns(out);
                }
            }
            Predicate::Debug(inner) => inner.collect_columns(out),
        }
    }
}

impl std::fmt::Display for Predicate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Predicate::Compare { op, left, right } => write!(f, "{} {} {}", left, op, right),
            Predicate::And(operands) | Predicate::Or(operands) => {
                let keyword = if matches!(self, Predicate::And(_)) { " AND " } else { " OR " };
                for (i, operand) in operands.iter().enumerate() {
                    if i > 0 {
                        f.write_str(keyword)?;
                    }
                    if matches!(operand, Predicate::And(_) | Predicate::Or(_)) {
                        write!(f, "({})", operand)?;
                    } else {
                        write!(f, "{}", operand)?;
                    }
                }
                Ok(())
            }
            Predicate::Debug(inner) => write!(f, "{}", inner),
        }
    }
}

/// Compare two resolved operands.
///
/// Numbers compare numerically (numeric strings are coerced when the other
/// side is a number), strings lexicographically, booleans only for
/// equality. A missing column only satisfies `!=`.
fn compare(op: ComparisonOp, left: Option<&Value>, right: Option<&Value>) -> bool {
    let (left, right) = match (left, right) {
        (Some(l), Some(r)) => (l, r),
        _ => return op == ComparisonOp::Ne,
    };

    let numeric = |v: &Value| matches!(v, Value::Long(_) | Value::Double(_));
    match (left, right) {
        (Value::String(a), Value::String(b)) => op.compare_str(a, b),
        (l, r) if numeric(l) || numeric(r) => match (l.as_f64(), r.as_f64()) {
            (Some(a), Some(b)) => op.compare_f64(a, b),
            _ => op == ComparisonOp::Ne,
        },
        (l, r) => match op {
            ComparisonOp::Eq => l == r,
            ComparisonOp::Ne => l != r,
            _ => false,
        },
    }
}
