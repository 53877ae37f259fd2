//! Shared nom building blocks
//!
//! Token parsers used by the expression, filter and path compilers. All of
//! them run on `&str` input with [`ParseFailure`] as the error type so a
//! failure remembers where it happened and why.

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{anychar, char, digit1, multispace0},
    combinator::{cut, not, opt, peek, recognize, verify},
    error::{ErrorKind, FromExternalError, ParseError},
    sequence::{pair, preceded, terminated, tuple},
};

use super::ast::Literal;
use super::error::SyntaxError;

/// Parser error carrying the remaining input and a message
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure<'a> {
    pub input: &'a str,
    pub message: String,
}

impl<'a> ParseFailure<'a> {
    pub fn new(input: &'a str, message: impl Into<String>) -> Self {
        Self {
            input,
            message: message.into(),
        }
    }

    /// Convert into a positioned error relative to the full source
    pub fn into_syntax_error(self, source: &str) -> SyntaxError {
        let position = source.len().saturating_sub(self.input.len());
        let char_position = source
            .get(..position)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(position);
        SyntaxError::new(char_position, self.message)
    }
}

impl<'a> ParseError<&'a str> for ParseFailure<'a> {
    fn from_error_kind(input: &'a str, _kind: ErrorKind) -> Self {
        let message = match input.chars().next() {
            Some(c) => format!("unexpected '{}'", c),
            None => "unexpected end of input".to_string(),
        };
        Self::new(input, message)
    }

    fn append(_input: &'a str, _kind: ErrorKind, other: Self) -> Self {
        other
    }

    // Keep whichever branch got further into the input
    fn or(self, other: Self) -> Self {
        if other.input.len() < self.input.len() {
            other
        } else {
            self
        }
    }
}

impl<'a, E: std::fmt::Display> FromExternalError<&'a str, E> for ParseFailure<'a> {
    fn from_external_error(input: &'a str, _kind: ErrorKind, e: E) -> Self {
        Self::new(input, e.to_string())
    }
}

/// nom result specialised to compiler input
pub type PResult<'a, O> = nom::IResult<&'a str, O, ParseFailure<'a>>;

/// Fail without backtracking
pub fn fail_at<'a, O>(input: &'a str, message: impl Into<String>) -> PResult<'a, O> {
    Err(nom::Err::Failure(ParseFailure::new(input, message)))
}

/// Wrap a parser so it skips leading whitespace
pub fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> PResult<'a, O>
where
    F: FnMut(&'a str) -> PResult<'a, O>,
{
    preceded(multispace0, inner)
}

/// Require a closing character, failing hard when it is missing
pub fn expect<'a>(c: char) -> impl FnMut(&'a str) -> PResult<'a, char> {
    move |input: &'a str| {
        let (rest, _) = multispace0(input)?;
        match char::<&str, ParseFailure>(c)(rest) {
            Ok(ok) => Ok(ok),
            Err(_) => fail_at(rest, format!("expected '{}'", c)),
        }
    }
}

pub fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

pub fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Case-insensitive keyword not followed by an identifier character
pub fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> PResult<'a, &'a str> {
    terminated(
        tag_no_case(word),
        not(peek(verify(anychar, |c: &char| is_ident_char(*c)))),
    )
}

/// Bare identifier: letter or underscore, then alphanumerics or underscores
pub fn bare_identifier(input: &str) -> PResult<'_, &str> {
    recognize(pair(
        take_while1(is_ident_start),
        take_while(is_ident_char),
    ))(input)
}

/// Identifier in double quotes or backticks; the quote is doubled to escape
pub fn quoted_identifier(input: &str) -> PResult<'_, String> {
    let (rest, quote) = alt((char('"'), char('`')))(input)?;
    let mut out = String::new();
    let mut chars = rest.char_indices();
    while let Some((i, c)) = chars.next() {
        if c == quote {
            let after = &rest[i + c.len_utf8()..];
            if after.starts_with(quote) {
                out.push(quote);
                chars.next();
                continue;
            }
            return Ok((after, out));
        }
        out.push(c);
    }
    fail_at(input, "unterminated quoted identifier")
}

/// Single-quoted string; `''`, `\'` and `\\` are escapes
pub fn single_quoted(input: &str) -> PResult<'_, String> {
    quoted_string('\'', true)(input)
}

/// String quoted with `quote`; backslash escapes the next character
pub fn quoted_string<'a>(
    quote: char,
    allow_doubled: bool,
) -> impl FnMut(&'a str) -> PResult<'a, String> {
    move |input: &'a str| {
        let (rest, _) = char(quote)(input)?;
        let mut out = String::new();
        let mut chars = rest.char_indices().peekable();
        while let Some((i, c)) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some((_, escaped)) => out.push(escaped),
                    None => break,
                },
                c if c == quote => {
                    if allow_doubled && matches!(chars.peek(), Some((_, next)) if *next == quote) {
                        out.push(quote);
                        chars.next();
                        continue;
                    }
                    return Ok((&rest[i + c.len_utf8()..], out));
                }
                c => out.push(c),
            }
        }
        fail_at(input, "unterminated string literal")
    }
}

/// Numeric literal: optional sign, digits, optional fraction and exponent.
///
/// A fraction or exponent makes it a `Double`, otherwise it is a `Long`.
pub fn number(input: &str) -> PResult<'_, Literal> {
    let (rest, text) = recognize(tuple((
        opt(char('-')),
        digit1,
        opt(pair(char('.'), cut(digit1))),
        opt(tuple((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            cut(digit1),
        ))),
    )))(input)?;

    let is_double = text.contains(['.', 'e', 'E']);
    if is_double {
        match text.parse::<f64>() {
            Ok(v) if v.is_finite() => Ok((rest, Literal::Double(v))),
            _ => fail_at(input, format!("number '{}' is out of range", text)),
        }
    } else {
        match text.parse::<i64>() {
            Ok(v) => Ok((rest, Literal::Long(v))),
            Err(_) => fail_at(input, format!("number '{}' is out of range", text)),
        }
    }
}

/// `[ 'key' ]` postfix used for map lookups
pub fn bracket_key(input: &str) -> PResult<'_, String> {
    let (rest, _) = ws(char('['))(input)?;
    let (rest, key) = ws(alt((single_quoted, quoted_string('"', false))))(rest)
        .map_err(|e| match e {
            nom::Err::Error(f) => nom::Err::Failure(ParseFailure::new(f.input, "expected quoted key")),
            other => other,
        })?;
    let (rest, _) = expect(']')(rest)?;
    Ok((rest, key))
}

/// Trailing whitespace followed by end of input
pub fn finish<'a, O>(source: &'a str, result: PResult<'a, O>) -> Result<O, SyntaxError> {
    match result {
        Ok((rest, out)) => {
            let (rest, _) = multispace0::<&str, ParseFailure>(rest)
                .map_err(|e| to_syntax_error(source, e))?;
            if rest.is_empty() {
                Ok(out)
            } else {
                let failure = ParseFailure::from_error_kind(rest, ErrorKind::Eof);
                Err(failure.into_syntax_error(source))
            }
        }
        Err(e) => Err(to_syntax_error(source, e)),
    }
}

fn to_syntax_error(source: &str, err: nom::Err<ParseFailure<'_>>) -> SyntaxError {
    match err {
        nom::Err::Error(f) | nom::Err::Failure(f) => f.into_syntax_error(source),
        nom::Err::Incomplete(_) => SyntaxError::new(source.chars().count(), "unexpected end of input"),
    }
}

/// Comparison operator token, longest match first
pub fn comparison_symbol(input: &str) -> PResult<'_, &str> {
    alt((
        tag(">="),
        tag("<="),
        tag("<>"),
        tag("!="),
        tag("=="),
        tag("="),
        tag(">"),
        tag("<"),
    ))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers() {
        assert_eq!(number("42 rest"), Ok((" rest", Literal::Long(42))));
        assert_eq!(number("-1.5"), Ok(("", Literal::Double(-1.5))));
        assert_eq!(number("2e3"), Ok(("", Literal::Double(2000.0))));
        assert!(matches!(
            number("99999999999999999999"),
            Err(nom::Err::Failure(_))
        ));
    }

    #[test]
    fn test_single_quoted_escapes() {
        assert_eq!(single_quoted("'it''s'"), Ok(("", "it's".to_string())));
        assert_eq!(single_quoted(r"'it\'s'"), Ok(("", "it's".to_string())));
        assert_eq!(single_quoted(r"'a\\b' x"), Ok((" x", r"a\b".to_string())));
        assert!(matches!(single_quoted("'open"), Err(nom::Err::Failure(_))));
    }

    #[test]
    fn test_quoted_identifier() {
        assert_eq!(quoted_identifier("\"my col\""), Ok(("", "my col".to_string())));
        assert_eq!(quoted_identifier("`a``b`"), Ok(("", "a`b".to_string())));
    }

    #[test]
    fn test_keyword_boundary() {
        assert!(keyword("and")("AND x").is_ok());
        assert!(keyword("and")("android").is_err());
    }

    #[test]
    fn test_finish_reports_trailing_input() {
        let source = "abc )";
        let err = finish(source, bare_identifier(source)).unwrap_err();
        assert_eq!(err.position, 4);
        assert_eq!(err.message, "unexpected ')'");
    }
}
