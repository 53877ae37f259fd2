//! Expression optimizer
//!
//! A single bottom-up pass that folds literal arithmetic and comparisons,
//! simplifies boolean connectives and flattens nested `AND`/`OR` chains.
//! Running it twice gives the same tree as running it once, and the root
//! keeps its declared type.

use super::ast::{BinaryOp, ComparisonOp, DataType, Expression, Literal, LogicalOp};

/// Simplify an expression
pub fn optimize(expr: Expression) -> Expression {
    expr.transform_up(&mut simplify)
}

fn simplify(node: Expression) -> Expression {
    match node {
        Expression::Binary { op, lhs, rhs } => {
            let folded = match (&*lhs, &*rhs) {
                (Expression::Literal(l), Expression::Literal(r)) => fold_arithmetic(op, l, r),
                _ => None,
            };
            folded.unwrap_or(Expression::Binary { op, lhs, rhs })
        }
        Expression::Comparison { op, lhs, rhs } => {
            let folded = match (&*lhs, &*rhs) {
                (Expression::Literal(l), Expression::Literal(r)) => fold_comparison(op, l, r),
                _ => None,
            };
            match folded {
                Some(b) => Expression::boolean(b),
                None => Expression::Comparison { op, lhs, rhs },
            }
        }
        Expression::Logical {
            op: LogicalOp::Not,
            mut operands,
        } => match operands.pop() {
            Some(Expression::Literal(Literal::Boolean(b))) if operands.is_empty() => {
                Expression::boolean(!b)
            }
            Some(Expression::Logical {
                op: LogicalOp::Not,
                operands: mut inner,
            }) if operands.is_empty()
                && inner.len() == 1
                && inner[0].data_type() == DataType::Boolean =>
            {
                inner.remove(0)
            }
            Some(operand) => {
                operands.push(operand);
                Expression::logical(LogicalOp::Not, operands)
            }
            None => Expression::logical(LogicalOp::Not, operands),
        },
        Expression::Logical { op, operands } => simplify_connective(op, operands),
        other => other,
    }
}

/// Simplify an `AND`/`OR` node whose operands are already simplified
fn simplify_connective(op: LogicalOp, operands: Vec<Expression>) -> Expression {
    // Neutral element is TRUE for AND, FALSE for OR; the other one absorbs
    let neutral = op == LogicalOp::And;

    let mut flat = Vec::with_capacity(operands.len());
    for operand in operands {
        match operand {
            Expression::Logical {
                op: inner_op,
                operands: inner,
            } if inner_op == op => flat.extend(inner),
            Expression::Literal(Literal::Boolean(b)) if b == neutral => {}
            Expression::Literal(Literal::Boolean(_)) => return Expression::boolean(!neutral),
            other => flat.push(other),
        }
    }

    match flat.len() {
        0 => Expression::boolean(neutral),
        1 if flat[0].data_type() == DataType::Boolean => flat.remove(0),
        _ => Expression::logical(op, flat),
    }
}

fn fold_arithmetic(op: BinaryOp, lhs: &Literal, rhs: &Literal) -> Option<Expression> {
    if let (Literal::Long(a), Literal::Long(b)) = (lhs, rhs) {
        let folded = match op {
            BinaryOp::Add => a.checked_add(*b),
            BinaryOp::Sub => a.checked_sub(*b),
            BinaryOp::Mul => a.checked_mul(*b),
            BinaryOp::Div | BinaryOp::SafeDiv => None,
        };
        if let Some(v) = folded {
            return Some(Expression::long(v));
        }
        if matches!(op, BinaryOp::Add | BinaryOp::Sub | BinaryOp::Mul) {
            return None;
        }
    }

    let (a, b) = (lhs.as_f64()?, rhs.as_f64()?);
    let result = match op {
        BinaryOp::Add => a + b,
        BinaryOp::Sub => a - b,
        BinaryOp::Mul => a * b,
        BinaryOp::Div if b == 0.0 => return None,
        BinaryOp::SafeDiv if b == 0.0 => 0.0,
        BinaryOp::Div | BinaryOp::SafeDiv => a / b,
    };
    result.is_finite().then(|| Expression::double(result))
}

fn fold_comparison(op: ComparisonOp, lhs: &Literal, rhs: &Literal) -> Option<bool> {
    match (lhs, rhs) {
        (Literal::String(a), Literal::String(b)) => Some(op.compare_str(a, b)),
        (Literal::Boolean(a), Literal::Boolean(b)) => match op {
            ComparisonOp::Eq => Some(a == b),
            ComparisonOp::Ne => Some(a != b),
            _ => None,
        },
        (Literal::Timestamp(a), Literal::Timestamp(b)) => {
            (!matches!(op, ComparisonOp::Like | ComparisonOp::NotLike))
                .then(|| op.compare_f64(*a as f64, *b as f64))
        }
        _ if matches!(op, ComparisonOp::Like | ComparisonOp::NotLike) => None,
        _ => Some(op.compare_f64(lhs.as_f64()?, rhs.as_f64()?)),
    }
}
