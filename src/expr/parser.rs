//! Expression Compiler
//!
//! Compiles expression text into an [`Expression`] tree.
//!
//! # Grammar
//!
//! ```text
//! or       := and (OR and)*
//! and      := not (AND not)*
//! not      := NOT not | cmp
//! cmp      := additive [(= | == | != | <> | > | >= | < | <= | [NOT] LIKE) additive]
//! additive := mult ((+ | -) mult)*
//! mult     := unary ((* | /) unary)*
//! unary    := '-' unary | postfix
//! postfix  := primary ('[' STRING ']')*
//! primary  := NUMBER | STRING | TRUE | FALSE | '{' IDENT '}'
//!           | IDENT '(' args ')' | IDENT | "quoted" | `quoted` | '(' or ')'
//! ```
//!
//! # Examples
//!
//! ```text
//! status >= 500 AND NOT startsWith(uri, '/health')
//! (totalCost - ioCost) / {interval} > 0.5
//! tags['exception'] LIKE '%timeout%'
//! ```

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::char,
    combinator::{cut, map, opt, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded},
};

use super::ast::{BinaryOp, ComparisonOp, Expression, Literal, LogicalOp};
use super::error::SyntaxResult;
use super::functions;
use super::lexer::{
    bare_identifier, bracket_key, comparison_symbol, expect, fail_at, finish, keyword, number,
    quoted_identifier, single_quoted, ws, PResult, ParseFailure,
};

/// Words that can never name a column
const RESERVED: &[&str] = &["and", "or", "not", "like", "true", "false"];

/// Compile expression text into an expression tree
pub fn compile(text: &str) -> SyntaxResult<Expression> {
    finish(text, or_expr(text))
}

/// Parse one n-ary logical level: `operand (KEYWORD operand)*`
fn logical_chain<'a>(
    input: &'a str,
    op: LogicalOp,
    word: &'static str,
    operand: fn(&'a str) -> PResult<'a, Expression>,
) -> PResult<'a, Expression> {
    let (input, first) = operand(input)?;
    let (input, rest) = many0(preceded(ws(keyword(word)), cut(operand)))(input)?;
    if rest.is_empty() {
        return Ok((input, first));
    }
    let mut operands = Vec::with_capacity(rest.len() + 1);
    operands.push(first);
    operands.extend(rest);
    Ok((input, Expression::logical(op, operands)))
}

fn or_expr(input: &str) -> PResult<'_, Expression> {
    logical_chain(input, LogicalOp::Or, "or", and_expr)
}

fn and_expr(input: &str) -> PResult<'_, Expression> {
    logical_chain(input, LogicalOp::And, "and", not_expr)
}

fn not_expr(input: &str) -> PResult<'_, Expression> {
    // `NOT LIKE` belongs to the comparison level, never a prefix
    if let Ok((rest, _)) = ws(keyword("not"))(input) {
        if ws(keyword("like"))(rest).is_err() {
            let (rest, operand) = cut(not_expr)(rest)?;
            return Ok((rest, operand.not()));
        }
    }
    comparison(input)
}

fn comparison_op(input: &str) -> PResult<'_, ComparisonOp> {
    ws(alt((
        map(comparison_symbol, |s| {
            ComparisonOp::from_symbol(s).unwrap_or(ComparisonOp::Eq)
        }),
        value(ComparisonOp::Like, keyword("like")),
        value(
            ComparisonOp::NotLike,
            pair(keyword("not"), ws(keyword("like"))),
        ),
    )))(input)
}

fn comparison(input: &str) -> PResult<'_, Expression> {
    let (input, lhs) = additive(input)?;
    match comparison_op(input) {
        Ok((rest, op)) => {
            let (rest, rhs) = cut(additive)(rest)?;
            Ok((rest, Expression::comparison(op, lhs, rhs)))
        }
        Err(nom::Err::Error(_)) => Ok((input, lhs)),
        Err(e) => Err(e),
    }
}

/// Left-associative arithmetic level
fn arithmetic<'a>(
    input: &'a str,
    ops: &'static [(&'static str, BinaryOp)],
    operand: fn(&'a str) -> PResult<'a, Expression>,
) -> PResult<'a, Expression> {
    let (mut input, mut lhs) = operand(input)?;
    loop {
        let matched = ops.iter().find_map(|(symbol, op)| {
            ws(tag::<_, _, ParseFailure>(*symbol))(input)
                .ok()
                .map(|(rest, _)| (rest, *op))
        });
        match matched {
            Some((rest, op)) => {
                let (rest, rhs) = cut(operand)(rest)?;
                lhs = Expression::binary(op, lhs, rhs);
                input = rest;
            }
            None => return Ok((input, lhs)),
        }
    }
}

fn additive(input: &str) -> PResult<'_, Expression> {
    arithmetic(input, &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)], multiplicative)
}

fn multiplicative(input: &str) -> PResult<'_, Expression> {
    arithmetic(input, &[("*", BinaryOp::Mul), ("/", BinaryOp::Div)], unary)
}

fn unary(input: &str) -> PResult<'_, Expression> {
    match postfix(input) {
        Err(nom::Err::Error(failure)) => {
            let (rest, _) = match ws(char::<_, ParseFailure>('-'))(input) {
                Ok(ok) => ok,
                Err(_) => return Err(nom::Err::Error(failure)),
            };
            let (rest, operand) = cut(unary)(rest)?;
            Ok((rest, negate(operand)))
        }
        other => other,
    }
}

fn negate(operand: Expression) -> Expression {
    match operand {
        Expression::Literal(Literal::Long(v)) if v != i64::MIN => Expression::long(-v),
        Expression::Literal(Literal::Double(v)) => Expression::double(-v),
        other => Expression::binary(BinaryOp::Sub, Expression::long(0), other),
    }
}

fn postfix(input: &str) -> PResult<'_, Expression> {
    let (mut input, mut expr) = primary(input)?;
    loop {
        match bracket_key(input) {
            Ok((rest, key)) => {
                expr = Expression::map_access(expr, key);
                input = rest;
            }
            Err(nom::Err::Error(_)) => return Ok((input, expr)),
            Err(e) => return Err(e),
        }
    }
}

fn primary(input: &str) -> PResult<'_, Expression> {
    ws(alt((
        delimited(char('('), cut(or_expr), expect(')')),
        map(number, Expression::Literal),
        map(single_quoted, Expression::string),
        value(Expression::boolean(true), keyword("true")),
        value(Expression::boolean(false), keyword("false")),
        macro_ref,
        map(quoted_identifier, Expression::identifier),
        identifier_or_call,
    )))(input)
}

fn macro_ref(input: &str) -> PResult<'_, Expression> {
    let (rest, _) = char('{')(input)?;
    let (rest, name) = cut(ws(bare_identifier))(rest)?;
    let (rest, _) = expect('}')(rest)?;
    Ok((rest, Expression::macro_ref(name)))
}

fn identifier_or_call(input: &str) -> PResult<'_, Expression> {
    let (rest, name) = bare_identifier(input)?;

    let (rest, open) = opt(ws(char('(')))(rest)?;
    if open.is_none() {
        if RESERVED.iter().any(|w| w.eq_ignore_ascii_case(name)) {
            return Err(nom::Err::Error(ParseFailure::new(
                input,
                format!("unexpected keyword '{}'", name),
            )));
        }
        return Ok((rest, Expression::identifier(name)));
    }

    // `count(*)` is the zero-argument form
    let (rest, star) = opt(ws(char('*')))(rest)?;
    let (rest, args) = if star.is_some() && name.eq_ignore_ascii_case("count") {
        (rest, Vec::new())
    } else if star.is_some() {
        return fail_at(input, format!("'*' is only valid in count(*), not '{}'", name));
    } else {
        separated_list0(ws(char(',')), or_expr)(rest)?
    };
    let (rest, _) = expect(')')(rest)?;

    let signature = match functions::lookup(name) {
        Some(signature) => signature,
        None => return fail_at(input, format!("unknown function '{}'", name)),
    };
    if let Err(message) = signature.check(&args) {
        return fail_at(input, message);
    }

    Ok((rest, Expression::function(signature.name, args)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> Expression {
        Expression::identifier(name)
    }

    #[test]
    fn test_precedence() {
        let expr = compile("a = 1 OR b = 2 AND c = 3").unwrap();
        let expected = Expression::logical(
            LogicalOp::Or,
            vec![
                Expression::comparison(ComparisonOp::Eq, id("a"), Expression::long(1)),
                Expression::logical(
                    LogicalOp::And,
                    vec![
                        Expression::comparison(ComparisonOp::Eq, id("b"), Expression::long(2)),
                        Expression::comparison(ComparisonOp::Eq, id("c"), Expression::long(3)),
                    ],
                ),
            ],
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_arithmetic_is_left_associative() {
        let expr = compile("a - b - c * 2").unwrap();
        let expected = Expression::binary(
            BinaryOp::Sub,
            Expression::binary(BinaryOp::Sub, id("a"), id("b")),
            Expression::binary(BinaryOp::Mul, id("c"), Expression::long(2)),
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_logical_chain_is_n_ary() {
        match compile("a AND b and c").unwrap() {
            Expression::Logical { op, operands } => {
                assert_eq!(op, LogicalOp::And);
                assert_eq!(operands.len(), 3);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_not_and_not_like() {
        assert_eq!(
            compile("NOT a = 1").unwrap(),
            Expression::comparison(ComparisonOp::Eq, id("a"), Expression::long(1)).not()
        );
        assert_eq!(
            compile("uri NOT LIKE '/api%'").unwrap(),
            Expression::comparison(ComparisonOp::NotLike, id("uri"), Expression::string("/api%"))
        );
    }

    #[test]
    fn test_functions_and_map_access() {
        let expr = compile("STARTSWITH(uri, '/api') AND tags['exception'] = 'Code: 60'").unwrap();
        let expected = Expression::logical(
            LogicalOp::And,
            vec![
                Expression::function("startsWith", vec![id("uri"), Expression::string("/api")]),
                Expression::comparison(
                    ComparisonOp::Eq,
                    Expression::map_access(id("tags"), "exception"),
                    Expression::string("Code: 60"),
                ),
            ],
        );
        assert_eq!(expr, expected);
    }

    #[test]
    fn test_literals_and_macros() {
        assert_eq!(compile("-5").unwrap(), Expression::long(-5));
        assert_eq!(compile("- 2.5").unwrap(), Expression::double(-2.5));
        assert_eq!(
            compile("-a").unwrap(),
            Expression::binary(BinaryOp::Sub, Expression::long(0), id("a"))
        );
        assert_eq!(compile("'it''s'").unwrap(), Expression::string("it's"));
        assert_eq!(compile("TRUE").unwrap(), Expression::boolean(true));
        assert_eq!(
            compile("cost / {interval}").unwrap(),
            Expression::binary(BinaryOp::Div, id("cost"), Expression::macro_ref("interval"))
        );
        assert_eq!(compile("\"my col\"").unwrap(), id("my col"));
        assert_eq!(compile("count()").unwrap(), Expression::function("count", vec![]));
        assert_eq!(compile("COUNT(*)").unwrap(), Expression::function("count", vec![]));
        assert!(compile("sum(*)").is_err());
    }

    #[test]
    fn test_unbalanced_parenthesis() {
        let err = compile("(a = 1").unwrap_err();
        assert_eq!(err.position, 6);
        assert_eq!(err.message, "expected ')'");
    }

    #[test]
    fn test_trailing_input() {
        let err = compile("a = 1 b").unwrap_err();
        assert_eq!(err.position, 6);
        assert!(err.message.contains("unexpected 'b'"), "{}", err.message);
    }

    #[test]
    fn test_unknown_operator() {
        let err = compile("a ~ 1").unwrap_err();
        assert_eq!(err.position, 2);
    }

    #[test]
    fn test_function_errors_point_at_name() {
        let err = compile("x = 1 AND nope(a)").unwrap_err();
        assert_eq!(err.position, 10);
        assert!(err.message.contains("unknown function 'nope'"));

        let err = compile("startsWith(uri)").unwrap_err();
        assert_eq!(err.position, 0);
        assert!(err.message.contains("expects 2 argument(s)"));

        let err = compile("round('x')").unwrap_err();
        assert!(err.message.contains("numeric"));
    }

    #[test]
    fn test_missing_operand() {
        let err = compile("a =").unwrap_err();
        assert_eq!(err.position, 3);
        let err = compile("").unwrap_err();
        assert_eq!(err.position, 0);
    }

    #[test]
    fn test_reserved_words_are_not_identifiers() {
        assert!(compile("a = and").is_err());
        assert_eq!(compile("android").unwrap(), id("android"));
    }
}
