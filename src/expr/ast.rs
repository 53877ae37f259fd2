//! Expression Abstract Syntax Tree
//!
//! Typed, immutable expression nodes shared by filters, selectors and the
//! planner. Every node reports a declared result type through
//! [`Expression::data_type`].
//!
//! # Example Expressions
//!
//! ```text
//! status >= 500 AND startsWith(uri, '/api')
//! totalCost / {interval}
//! tags['exception'] = 'Code: 60'
//! ```

use super::functions;
use chrono::{TimeZone, Utc};
use std::convert::Infallible;

/// Declared result type of an expression
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    String,
    Long,
    Double,
    Boolean,
    /// Milliseconds since the Unix epoch
    Timestamp,
    Map,
    /// Unknown until bound against a concrete table
    Any,
}

impl DataType {
    /// Whether values of this type can take part in arithmetic
    pub fn is_numeric(&self) -> bool {
        matches!(self, DataType::Long | DataType::Double)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String => write!(f, "string"),
            Self::Long => write!(f, "long"),
            Self::Double => write!(f, "double"),
            Self::Boolean => write!(f, "boolean"),
            Self::Timestamp => write!(f, "timestamp"),
            Self::Map => write!(f, "map"),
            Self::Any => write!(f, "any"),
        }
    }
}

/// A constant value
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    String(String),
    Long(i64),
    Double(f64),
    Boolean(bool),
    /// Milliseconds since the Unix epoch
    Timestamp(i64),
}

impl Literal {
    /// Declared type of this literal
    pub fn data_type(&self) -> DataType {
        match self {
            Literal::String(_) => DataType::String,
            Literal::Long(_) => DataType::Long,
            Literal::Double(_) => DataType::Double,
            Literal::Boolean(_) => DataType::Boolean,
            Literal::Timestamp(_) => DataType::Timestamp,
        }
    }

    /// Numeric value of a `Long` or `Double` literal
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Literal::Long(v) => Some(*v as f64),
            Literal::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// RFC 3339 rendering of a timestamp literal
    pub fn timestamp_rfc3339(millis: i64) -> String {
        match Utc.timestamp_millis_opt(millis) {
            chrono::LocalResult::Single(dt) => {
                dt.to_rfc3339_opts(chrono::SecondsFormat::Millis, true)
            }
            _ => millis.to_string(),
        }
    }
}

/// Arithmetic operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    /// Division guarded against a zero divisor.
    ///
    /// Produced by dialect rewrites only; renders as
    /// `CASE WHEN rhs <> 0 THEN lhs / rhs ELSE 0 END`.
    SafeDiv,
}

impl BinaryOp {
    /// Binding strength used by the serializer
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            BinaryOp::Add | BinaryOp::Sub => 5,
            BinaryOp::Mul | BinaryOp::Div => 6,
            BinaryOp::SafeDiv => 7,
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div | BinaryOp::SafeDiv => "/",
        }
    }
}

/// Logical connectives
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogicalOp {
    And,
    Or,
    /// Negation of a single operand
    Not,
}

impl LogicalOp {
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            LogicalOp::Or => 1,
            LogicalOp::And => 2,
            LogicalOp::Not => 3,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            LogicalOp::And => "AND",
            LogicalOp::Or => "OR",
            LogicalOp::Not => "NOT",
        }
    }
}

/// Comparison operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComparisonOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Like,
    NotLike,
}

impl ComparisonOp {
    /// Parse from operator text
    pub fn from_symbol(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "=" | "==" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            ">=" => Some(Self::Gte),
            "<" => Some(Self::Lt),
            "<=" => Some(Self::Lte),
            "like" => Some(Self::Like),
            "not like" => Some(Self::NotLike),
            _ => None,
        }
    }

    /// SQL rendering of the operator
    pub fn symbol(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "<>",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
        }
    }

    /// Compare two f64 values
    pub fn compare_f64(&self, a: f64, b: f64) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            Self::Gt => a > b,
            Self::Gte => a >= b,
            Self::Lt => a < b,
            Self::Lte => a <= b,
            Self::Like | Self::NotLike => false,
        }
    }

    /// Compare two strings
    pub fn compare_str(&self, a: &str, b: &str) -> bool {
        match self {
            Self::Eq => a == b,
            Self::Ne => a != b,
            // String comparisons for ordering (lexicographic)
            Self::Gt => a > b,
            Self::Gte => a >= b,
            Self::Lt => a < b,
            Self::Lte => a <= b,
            Self::Like => like_matches(a, b),
            Self::NotLike => !like_matches(a, b),
        }
    }
}

impl std::fmt::Display for ComparisonOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.symbol())
    }
}

/// SQL LIKE matching with `%` and `_` wildcards
fn like_matches(text: &str, pattern: &str) -> bool {
    let text: Vec<char> = text.chars().collect();
    let pattern: Vec<char> = pattern.chars().collect();

    // Classic two-pointer wildcard match with backtracking on '%'
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        if p < pattern.len() && (pattern[p] == '_' || pattern[p] == text[t]) {
            t += 1;
            p += 1;
        } else if p < pattern.len() && pattern[p] == '%' {
            star = Some((p, t));
            p += 1;
        } else if let Some((sp, st)) = star {
            p = sp + 1;
            t = st + 1;
            star = Some((sp, st + 1));
        } else {
            return false;
        }
    }
    while p < pattern.len() && pattern[p] == '%' {
        p += 1;
    }
    p == pattern.len()
}

/// An expression node
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Constant value
    Literal(Literal),
    /// Column reference
    Identifier { name: String },
    /// Arithmetic
    Binary {
        op: BinaryOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// AND/OR over any number of operands, NOT over exactly one
    Logical {
        op: LogicalOp,
        operands: Vec<Expression>,
    },
    /// Binary comparison producing a boolean
    Comparison {
        op: ComparisonOp,
        lhs: Box<Expression>,
        rhs: Box<Expression>,
    },
    /// Scalar or aggregate function call
    Function { name: String, args: Vec<Expression> },
    /// `base['key']` lookup into a map column
    MapAccess { base: Box<Expression>, key: String },
    /// `{name}` placeholder substituted after SQL generation
    Macro { name: String },
}

impl Expression {
    /// Create a column reference
    pub fn identifier(name: impl Into<String>) -> Self {
        Expression::Identifier { name: name.into() }
    }

    /// Create a string literal
    pub fn string(value: impl Into<String>) -> Self {
        Expression::Literal(Literal::String(value.into()))
    }

    /// Create an integer literal
    pub fn long(value: i64) -> Self {
        Expression::Literal(Literal::Long(value))
    }

    /// Create a floating point literal
    pub fn double(value: f64) -> Self {
        Expression::Literal(Literal::Double(value))
    }

    /// Create a boolean literal
    pub fn boolean(value: bool) -> Self {
        Expression::Literal(Literal::Boolean(value))
    }

    /// Create a timestamp literal (milliseconds)
    pub fn timestamp(millis: i64) -> Self {
        Expression::Literal(Literal::Timestamp(millis))
    }

    /// Create a macro placeholder
    pub fn macro_ref(name: impl Into<String>) -> Self {
        Expression::Macro { name: name.into() }
    }

    /// Create an arithmetic node
    pub fn binary(op: BinaryOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Create a comparison node
    pub fn comparison(op: ComparisonOp, lhs: Expression, rhs: Expression) -> Self {
        Expression::Comparison {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    /// Create a logical node
    pub fn logical(op: LogicalOp, operands: Vec<Expression>) -> Self {
        Expression::Logical { op, operands }
    }

    /// Create a function call
    pub fn function(name: impl Into<String>, args: Vec<Expression>) -> Self {
        Expression::Function {
            name: name.into(),
            args,
        }
    }

    /// Create a map lookup
    pub fn map_access(base: Expression, key: impl Into<String>) -> Self {
        Expression::MapAccess {
            base: Box::new(base),
            key: key.into(),
        }
    }

    /// `self AND other`, merging existing AND chains on either side
    pub fn and(self, other: Expression) -> Self {
        let mut operands = Vec::new();
        for side in [self, other] {
            match side {
                Expression::Logical {
                    op: LogicalOp::And,
                    operands: inner,
                } => operands.extend(inner),
                side => operands.push(side),
            }
        }
        Expression::logical(LogicalOp::And, operands)
    }

    /// `NOT self`
    pub fn not(self) -> Self {
        Expression::logical(LogicalOp::Not, vec![self])
    }

    /// Check for a literal node
    pub fn is_literal(&self) -> bool {
        matches!(self, Expression::Literal(_))
    }

    /// Name of the column when this is an identifier
    pub fn as_identifier(&self) -> Option<&str> {
        match self {
            Expression::Identifier { name } => Some(name),
            _ => None,
        }
    }

    /// Declared result type
    pub fn data_type(&self) -> DataType {
        match self {
            Expression::Literal(lit) => lit.data_type(),
            Expression::Identifier { .. } | Expression::Macro { .. } => DataType::Any,
            Expression::Binary { op, lhs, rhs } => match op {
                BinaryOp::Div | BinaryOp::SafeDiv => DataType::Double,
                _ if lhs.data_type() == DataType::Long && rhs.data_type() == DataType::Long => {
                    DataType::Long
                }
                _ => DataType::Double,
            },
            Expression::Logical { .. } | Expression::Comparison { .. } => DataType::Boolean,
            Expression::Function { name, args } => functions::lookup(name)
                .map(|f| f.return_type(args))
                .unwrap_or(DataType::Any),
            Expression::MapAccess { .. } => DataType::String,
        }
    }

    /// Binding strength used by the serializer; atoms bind tightest
    pub(crate) fn precedence(&self) -> u8 {
        match self {
            Expression::Logical { op, .. } => op.precedence(),
            Expression::Comparison { .. } => 4,
            Expression::Binary { op, .. } => op.precedence(),
            _ => 7,
        }
    }

    /// Visit every node, children before parents
    pub fn walk<'a>(&'a self, visitor: &mut impl FnMut(&'a Expression)) {
        match self {
            Expression::Binary { lhs, rhs, .. } | Expression::Comparison { lhs, rhs, .. } => {
                lhs.walk(&mut *visitor);
                rhs.walk(&mut *visitor);
            }
            Expression::Logical { operands, .. } => {
                for operand in operands {
                    operand.walk(&mut *visitor);
                }
            }
            Expression::Function { args, .. } => {
                for arg in args {
                    arg.walk(&mut *visitor);
                }
            }
            Expression::MapAccess { base, .. } => base.walk(&mut *visitor),
            Expression::Literal(_) | Expression::Identifier { .. } | Expression::Macro { .. } => {}
        }
        visitor(self);
    }

    /// Names of every column referenced by this expression
    pub fn identifiers(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.walk(&mut |node| {
            if let Expression::Identifier { name } = node {
                if !names.contains(&name.as_str()) {
                    names.push(name.as_str());
                }
            }
        });
        names
    }

    /// Rebuild the tree bottom-up, applying a fallible rewrite to each node
    /// after its children have been rewritten
    pub fn try_transform_up<E, F>(self, f: &mut F) -> Result<Expression, E>
    where
        F: FnMut(Expression) -> Result<Expression, E>,
    {
        let node = match self {
            Expression::Binary { op, lhs, rhs } => Expression::Binary {
                op,
                lhs: Box::new(lhs.try_transform_up(&mut *f)?),
                rhs: Box::new(rhs.try_transform_up(&mut *f)?),
            },
            Expression::Comparison { op, lhs, rhs } => Expression::Comparison {
                op,
                lhs: Box::new(lhs.try_transform_up(&mut *f)?),
                rhs: Box::new(rhs.try_transform_up(&mut *f)?),
            },
            Expression::Logical { op, operands } => Expression::Logical {
                op,
                operands: operands
                    .into_iter()
                    .map(|o| o.try_transform_up(&mut *f))
                    .collect::<Result<_, _>>()?,
            },
            Expression::Function { name, args } => Expression::Function {
                name,
                args: args
                    .into_iter()
                    .map(|a| a.try_transform_up(&mut *f))
                    .collect::<Result<_, _>>()?,
            },
            Expression::MapAccess { base, key } => Expression::MapAccess {
                base: Box::new(base.try_transform_up(&mut *f)?),
                key,
            },
            leaf => leaf,
        };
        f(node)
    }

    /// Infallible variant of [`Expression::try_transform_up`]
    pub fn transform_up<F>(self, f: &mut F) -> Expression
    where
        F: FnMut(Expression) -> Expression,
    {
        match self.try_transform_up(&mut |node| Ok::<_, Infallible>(f(node))) {
            Ok(expr) => expr,
            Err(never) => match never {},
        }
    }
}

impl From<Literal> for Expression {
    fn from(lit: Literal) -> Self {
        Expression::Literal(lit)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_types() {
        let sum = Expression::binary(BinaryOp::Add, Expression::long(1), Expression::long(2));
        assert_eq!(sum.data_type(), DataType::Long);

        let mixed = Expression::binary(BinaryOp::Mul, Expression::long(1), Expression::double(2.0));
        assert_eq!(mixed.data_type(), DataType::Double);

        let div = Expression::binary(BinaryOp::Div, Expression::long(4), Expression::long(2));
        assert_eq!(div.data_type(), DataType::Double);

        let cmp = Expression::comparison(
            ComparisonOp::Eq,
            Expression::identifier("a"),
            Expression::long(1),
        );
        assert_eq!(cmp.data_type(), DataType::Boolean);

        let starts = Expression::function(
            "startsWith",
            vec![Expression::identifier("uri"), Expression::string("/api")],
        );
        assert_eq!(starts.data_type(), DataType::Boolean);
        assert_eq!(Expression::function("unknownFn", vec![]).data_type(), DataType::Any);
    }

    #[test]
    fn test_and_extends_chain() {
        let expr = Expression::identifier("a")
            .and(Expression::identifier("b"))
            .and(Expression::identifier("c"));

        match expr {
            Expression::Logical { op, operands } => {
                assert_eq!(op, LogicalOp::And);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_transform_up_visits_children_first() {
        let expr = Expression::binary(
            BinaryOp::Add,
            Expression::identifier("a"),
            Expression::binary(BinaryOp::Mul, Expression::identifier("b"), Expression::long(2)),
        );

        let mut order = Vec::new();
        let rewritten = expr.transform_up(&mut |node| {
            order.push(node.precedence());
            match node {
                Expression::Identifier { name } => Expression::identifier(name.to_uppercase()),
                other => other,
            }
        });

        // a, b, 2, (b * 2), (a + ...)
        assert_eq!(order, vec![7, 7, 7, 6, 5]);
        assert_eq!(rewritten.identifiers(), vec!["A", "B"]);
    }

    #[test]
    fn test_try_transform_up_propagates_errors() {
        let expr = Expression::function("lower", vec![Expression::identifier("x")]);
        let result: Result<Expression, String> = expr.try_transform_up(&mut |node| match node {
            Expression::Identifier { name } => Err(name),
            other => Ok(other),
        });
        assert_eq!(result, Err("x".to_string()));
    }

    #[test]
    fn test_like_matching() {
        assert!(ComparisonOp::Like.compare_str("/api/users", "/api%"));
        assert!(ComparisonOp::Like.compare_str("GET /api", "%api"));
        assert!(ComparisonOp::Like.compare_str("abc", "a_c"));
        assert!(!ComparisonOp::Like.compare_str("/web", "/api%"));
        assert!(ComparisonOp::NotLike.compare_str("/web", "/api%"));
    }

    #[test]
    fn test_timestamp_rfc3339() {
        assert_eq!(
            Literal::timestamp_rfc3339(1705329342123),
            "2024-01-15T14:35:42.123Z"
        );
    }
}
