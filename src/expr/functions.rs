//! Built-in function registry
//!
//! Functions the expression compiler accepts, with their arity and the
//! argument kinds checked against literal arguments at compile time.

use super::ast::{DataType, Expression};

/// Kind of value a parameter accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Number,
    Any,
}

impl ParamKind {
    /// Whether a literal of the given type may be passed
    fn accepts(&self, data_type: DataType) -> bool {
        match self {
            ParamKind::Any => true,
            ParamKind::String => data_type == DataType::String,
            ParamKind::Number => data_type.is_numeric(),
        }
    }
}

impl std::fmt::Display for ParamKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParamKind::String => write!(f, "string"),
            ParamKind::Number => write!(f, "numeric"),
            ParamKind::Any => write!(f, "any"),
        }
    }
}

/// How a function computes its result type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Returns {
    Fixed(DataType),
    /// Same type as the first argument
    FirstArgument,
}

/// Signature of a built-in function
#[derive(Debug, Clone, Copy)]
pub struct FunctionSignature {
    pub name: &'static str,
    /// Parameter kinds; the last one repeats for variadic functions
    pub params: &'static [ParamKind],
    pub min_args: usize,
    /// `None` for variadic functions
    pub max_args: Option<usize>,
    /// Whether the function aggregates over rows
    pub aggregate: bool,
    returns: Returns,
}

impl FunctionSignature {
    /// Result type for a concrete argument list
    pub fn return_type(&self, args: &[Expression]) -> DataType {
        match self.returns {
            Returns::Fixed(t) => t,
            Returns::FirstArgument => args.first().map(|a| a.data_type()).unwrap_or(DataType::Any),
        }
    }

    /// Kind expected at argument position `index`
    pub fn param(&self, index: usize) -> ParamKind {
        self.params
            .get(index)
            .or_else(|| self.params.last())
            .copied()
            .unwrap_or(ParamKind::Any)
    }

    /// Check arity and literal argument kinds
    pub fn check(&self, args: &[Expression]) -> Result<(), String> {
        let too_many = self.max_args.map(|max| args.len() > max).unwrap_or(false);
        if args.len() < self.min_args || too_many {
            let expected = match self.max_args {
                Some(max) if max == self.min_args => format!("{}", max),
                Some(max) => format!("{} to {}", self.min_args, max),
                None => format!("at least {}", self.min_args),
            };
            return Err(format!(
                "function '{}' expects {} argument(s), got {}",
                self.name,
                expected,
                args.len()
            ));
        }

        for (index, arg) in args.iter().enumerate() {
            if let Expression::Literal(lit) = arg {
                let kind = self.param(index);
                if !kind.accepts(lit.data_type()) {
                    return Err(format!(
                        "function '{}' expects a {} argument at position {}, got {}",
                        self.name,
                        kind,
                        index + 1,
                        lit.data_type()
                    ));
                }
            }
        }
        Ok(())
    }
}

use ParamKind::{Any, Number, String as Str};

const fn scalar(
    name: &'static str,
    params: &'static [ParamKind],
    min_args: usize,
    max_args: Option<usize>,
    returns: DataType,
) -> FunctionSignature {
    FunctionSignature {
        name,
        params,
        min_args,
        max_args,
        aggregate: false,
        returns: Returns::Fixed(returns),
    }
}

const fn aggregate(
    name: &'static str,
    min_args: usize,
    params: &'static [ParamKind],
    returns: Returns,
) -> FunctionSignature {
    FunctionSignature {
        name,
        params,
        min_args,
        max_args: Some(1),
        aggregate: true,
        returns,
    }
}

static FUNCTIONS: &[FunctionSignature] = &[
    // String predicates
    scalar("startsWith", &[Str, Str], 2, Some(2), DataType::Boolean),
    scalar("endsWith", &[Str, Str], 2, Some(2), DataType::Boolean),
    scalar("hasToken", &[Str, Str], 2, Some(2), DataType::Boolean),
    scalar("match", &[Str, Str], 2, Some(2), DataType::Boolean),
    // String functions
    scalar("lower", &[Str], 1, Some(1), DataType::String),
    scalar("upper", &[Str], 1, Some(1), DataType::String),
    scalar("concat", &[Any], 2, None, DataType::String),
    scalar("length", &[Str], 1, Some(1), DataType::Long),
    // Numeric functions
    scalar("abs", &[Number], 1, Some(1), DataType::Double),
    scalar("round", &[Number, Number], 1, Some(2), DataType::Double),
    // Aggregates
    aggregate("sum", 1, &[Number], Returns::Fixed(DataType::Double)),
    aggregate("avg", 1, &[Number], Returns::Fixed(DataType::Double)),
    aggregate("min", 1, &[Any], Returns::FirstArgument),
    aggregate("max", 1, &[Any], Returns::FirstArgument),
    aggregate("count", 0, &[Any], Returns::Fixed(DataType::Long)),
    aggregate("first", 1, &[Any], Returns::FirstArgument),
    aggregate("last", 1, &[Any], Returns::FirstArgument),
];

/// Find a built-in function by name (case-insensitive)
pub fn lookup(name: &str) -> Option<&'static FunctionSignature> {
    FUNCTIONS.iter().find(|f| f.name.eq_ignore_ascii_case(name))
}

/// All registered functions
pub fn all() -> &'static [FunctionSignature] {
    FUNCTIONS
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_case_insensitive() {
        assert_eq!(lookup("STARTSWITH").map(|f| f.name), Some("startsWith"));
        assert!(lookup("nope").is_none());
    }

    #[test]
    fn test_arity_check() {
        let starts = lookup("startsWith").unwrap();
        let err = starts.check(&[Expression::identifier("uri")]).unwrap_err();
        assert!(err.contains("expects 2 argument(s), got 1"), "{}", err);

        let concat = lookup("concat").unwrap();
        assert!(concat
            .check(&[Expression::identifier("a"), Expression::identifier("b"), Expression::string("c")])
            .is_ok());

        let count = lookup("count").unwrap();
        assert!(count.check(&[]).is_ok());
    }

    #[test]
    fn test_literal_type_check() {
        let round = lookup("round").unwrap();
        let err = round.check(&[Expression::string("x")]).unwrap_err();
        assert!(err.contains("numeric argument at position 1"), "{}", err);

        let lower = lookup("lower").unwrap();
        assert!(lower.check(&[Expression::long(1)]).is_err());
        assert!(lower.check(&[Expression::identifier("name")]).is_ok());
    }

    #[test]
    fn test_return_types() {
        let max = lookup("max").unwrap();
        assert_eq!(max.return_type(&[Expression::long(1)]), DataType::Long);
        assert_eq!(lookup("count").unwrap().return_type(&[]), DataType::Long);
    }
}
