//! Expression Parser
//!
//! Parses filter expression strings into the expression AST.
//!
//! # Supported Syntax
//!
//! ```text
//! expr     := operand (binop operand)*
//! binop    := OR | AND | = | != | <> | =~ | !~ | < | <= | > | >=
//!           | + | - | | | ^ | * | / | % | &
//! operand  := '(' expr ')' | '-' number | string | number | duration
//!           | regex | true | false | call | identifier
//! ```
//!
//! # Examples
//!
//! ```text
//! host = 'server01'
//! region =~ /us-.*/ AND time > now() - 1h
//! "my tag" != 'x' OR value >= 1.5
//! ```

use nom::{
    branch::alt,
    bytes::complete::{tag, tag_no_case, take_while, take_while1},
    character::complete::{anychar, char, digit1, multispace0, none_of},
    combinator::{map, map_res, not, opt, peek, recognize, value},
    multi::{many0, separated_list0},
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};

use crate::query::ast::{BinaryOp, Expr};
use crate::query::error::{CompileError, CompileResult};

const NANOS_PER_MICRO: i64 = 1_000;
const NANOS_PER_MILLI: i64 = 1_000_000;
const NANOS_PER_SECOND: i64 = 1_000_000_000;
const NANOS_PER_MINUTE: i64 = 60 * NANOS_PER_SECOND;
const NANOS_PER_HOUR: i64 = 60 * NANOS_PER_MINUTE;
const NANOS_PER_DAY: i64 = 24 * NANOS_PER_HOUR;
const NANOS_PER_WEEK: i64 = 7 * NANOS_PER_DAY;

/// Deepest expression tree the parser will build
pub const MAX_DEPTH: usize = 256;

/// Error kind reserved for the depth cap
const TOO_DEEP: nom::error::ErrorKind = nom::error::ErrorKind::TooLarge;

/// Parse an expression string into an AST
pub fn parse_expr(input: &str) -> CompileResult<Expr> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CompileError::Parse("empty expression".to_string()));
    }

    match parse_binary(input, 1, 0) {
        Ok((remaining, expr)) => {
            if remaining.trim().is_empty() {
                Ok(expr)
            } else {
                Err(CompileError::Parse(format!(
                    "unexpected input after expression: '{}'",
                    remaining.trim()
                )))
            }
        }
        Err(nom::Err::Failure(e)) if e.code == TOO_DEEP => {
            Err(CompileError::Parse("expression nested too deeply".to_string()))
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(CompileError::Parse(
            format!("found '{}' in '{}'", snippet(e.input), input),
        )),
        Err(nom::Err::Incomplete(_)) => {
            Err(CompileError::Parse("incomplete expression".to_string()))
        }
    }
}

fn snippet(input: &str) -> &str {
    let input = input.trim_start();
    if input.is_empty() {
        return "EOF";
    }
    match input.char_indices().nth(16) {
        Some((idx, _)) => &input[..idx],
        None => input,
    }
}

/// Precedence climbing over binary operators.
///
/// Operators binding at least `min_prec` are folded left-to-right; the right
/// operand is parsed one level tighter, which makes equal precedence left
/// associative.
///
/// `depth` is how far below the root the result will sit. Every fold, paren
/// and call adds a level, and parsing fails once it passes [`MAX_DEPTH`].
fn parse_binary(input: &str, min_prec: u8, depth: usize) -> IResult<&str, Expr> {
    if depth > MAX_DEPTH {
        return Err(too_deep(input));
    }
    let (mut input, mut lhs) = parse_operand(input, depth)?;
    let mut depth = depth;

    loop {
        let (rest, _) = multispace0(input)?;
        let (after_op, op) = match parse_binary_op(rest) {
            Ok(parsed) => parsed,
            Err(_) => break,
        };
        if op.precedence() < min_prec {
            break;
        }

        depth += 1;
        if depth > MAX_DEPTH {
            return Err(too_deep(rest));
        }
        let (after_op, _) = multispace0(after_op)?;
        let (after_rhs, rhs) = parse_binary(after_op, op.precedence() + 1, depth)?;
        lhs = Expr::binary(op, lhs, rhs);
        input = after_rhs;
    }

    Ok((input, lhs))
}

fn too_deep(input: &str) -> nom::Err<nom::error::Error<&str>> {
    nom::Err::Failure(nom::error::Error::new(input, TOO_DEEP))
}

/// Parse a binary operator
fn parse_binary_op(input: &str) -> IResult<&str, BinaryOp> {
    alt((
        value(BinaryOp::Or, keyword("OR")),
        value(BinaryOp::And, keyword("AND")),
        value(BinaryOp::EqRegex, tag("=~")),
        value(BinaryOp::NeqRegex, tag("!~")),
        value(BinaryOp::Neq, alt((tag("!="), tag("<>")))),
        value(BinaryOp::Lte, tag("<=")),
        value(BinaryOp::Gte, tag(">=")),
        value(BinaryOp::Eq, tag("=")),
        value(BinaryOp::Lt, tag("<")),
        value(BinaryOp::Gt, tag(">")),
        value(BinaryOp::Add, tag("+")),
        value(BinaryOp::Sub, tag("-")),
        value(BinaryOp::Mul, tag("*")),
        value(BinaryOp::Div, tag("/")),
        value(BinaryOp::Mod, tag("%")),
        value(BinaryOp::BitAnd, tag("&")),
        value(BinaryOp::BitOr, tag("|")),
        value(BinaryOp::BitXor, tag("^")),
    ))(input)
}

/// Case-insensitive keyword that is not the prefix of a longer identifier
fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag_no_case(kw), not(peek(ident_char)))
}

fn ident_char(input: &str) -> IResult<&str, char> {
    nom::character::complete::satisfy(|c| c.is_alphanumeric() || c == '_')(input)
}

/// Parse a single operand
fn parse_operand(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, _) = multispace0(input)?;
    alt((
        |i| parse_paren(i, depth + 1),
        parse_negated,
        map(parse_quoted_string, Expr::String),
        parse_numeric,
        map(parse_regex, Expr::Regex),
        value(Expr::Boolean(true), keyword("true")),
        value(Expr::Boolean(false), keyword("false")),
        |i| parse_call(i, depth + 1),
        map(parse_identifier, Expr::VarRef),
    ))(input)
}

/// Parse `( expr )`
fn parse_paren(input: &str, depth: usize) -> IResult<&str, Expr> {
    map(
        delimited(
            char('('),
            |i| parse_binary(i, 1, depth),
            preceded(multispace0, char(')')),
        ),
        Expr::paren,
    )(input)
}

/// Parse a negative numeric or duration literal
fn parse_negated(input: &str) -> IResult<&str, Expr> {
    let (input, _) = char('-')(input)?;
    let (input, _) = multispace0(input)?;
    let (rest, expr) = parse_numeric(input)?;

    let negated = match expr {
        Expr::Integer(i) => Expr::Integer(-i),
        Expr::Number(n) => Expr::Number(-n),
        Expr::Duration(d) => Expr::Duration(-d),
        // -9223372036854775808 is the only unsigned literal with a signed negation
        Expr::Unsigned(u) if u == i64::MAX as u64 + 1 => Expr::Integer(i64::MIN),
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Verify,
            )))
        }
    };
    Ok((rest, negated))
}

/// Parse an integer, float or duration literal
fn parse_numeric(input: &str) -> IResult<&str, Expr> {
    alt((parse_duration, parse_float, parse_integer))(input)
}

/// Parse duration like "7d", "24h", "30m", "150ms"
fn parse_duration(input: &str) -> IResult<&str, Expr> {
    let (input, num) = map_res(digit1, |s: &str| s.parse::<i64>())(input)?;
    let (input, unit) = terminated(
        alt((
            value(1i64, tag("ns")),
            value(NANOS_PER_MILLI, tag("ms")),
            value(NANOS_PER_MICRO, alt((tag("u"), tag("µ")))),
            value(NANOS_PER_SECOND, tag("s")),
            value(NANOS_PER_MINUTE, tag("m")),
            value(NANOS_PER_HOUR, tag("h")),
            value(NANOS_PER_DAY, tag("d")),
            value(NANOS_PER_WEEK, tag("w")),
        )),
        not(peek(ident_char)),
    )(input)?;

    match num.checked_mul(unit) {
        Some(ns) => Ok((input, Expr::Duration(ns))),
        None => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::MapRes,
        ))),
    }
}

/// Parse floating point number: `1.5`, `.5`, `1.5e3` or `1e3`
fn parse_float(input: &str) -> IResult<&str, Expr> {
    map(
        map_res(
            recognize(alt((
                recognize(tuple((opt(digit1), char('.'), digit1, opt(exponent)))),
                recognize(pair(digit1, exponent)),
            ))),
            |s: &str| s.parse::<f64>(),
        ),
        Expr::Number,
    )(input)
}

fn exponent(input: &str) -> IResult<&str, &str> {
    recognize(tuple((
        alt((char('e'), char('E'))),
        opt(alt((char('+'), char('-')))),
        digit1,
    )))(input)
}

/// Parse an integer; values past `i64::MAX` become unsigned literals
fn parse_integer(input: &str) -> IResult<&str, Expr> {
    let (rest, digits) = terminated(digit1, not(peek(ident_char)))(input)?;

    if let Ok(i) = digits.parse::<i64>() {
        return Ok((rest, Expr::Integer(i)));
    }
    match digits.parse::<u64>() {
        Ok(u) => Ok((rest, Expr::Unsigned(u))),
        Err(_) => Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::MapRes,
        ))),
    }
}

/// Parse quoted string with backslash escapes
fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        map(
            many0(alt((
                preceded(
                    char('\\'),
                    map(anychar, |c| match c {
                        'n' => '\n',
                        't' => '\t',
                        other => other,
                    }),
                ),
                none_of("\\'"),
            ))),
            |chars: Vec<char>| chars.into_iter().collect(),
        ),
        char('\''),
    )(input)
}

/// Parse regex literal like `/us-.*/`, validating the pattern
fn parse_regex(input: &str) -> IResult<&str, String> {
    let (rest, pattern) = delimited(
        char('/'),
        map(
            many0(alt((
                value("/", tag("\\/")),
                recognize(pair(char('\\'), anychar)),
                recognize(none_of("\\/")),
            ))),
            |parts: Vec<&str>| parts.concat(),
        ),
        char('/'),
    )(input)?;

    if regex::Regex::new(&pattern).is_err() {
        return Err(nom::Err::Failure(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((rest, pattern))
}

/// Parse function call like `now()`
fn parse_call(input: &str, depth: usize) -> IResult<&str, Expr> {
    let (input, name) = parse_bare_identifier(input)?;
    let (input, _) = multispace0(input)?;
    let (input, args) = delimited(
        char('('),
        separated_list0(
            delimited(multispace0, char(','), multispace0),
            |i| parse_binary(i, 1, depth),
        ),
        preceded(multispace0, char(')')),
    )(input)?;

    Ok((
        input,
        Expr::Call {
            name: name.to_lowercase(),
            args,
        },
    ))
}

/// Parse identifier (bare or double-quoted)
fn parse_identifier(input: &str) -> IResult<&str, String> {
    alt((
        map(parse_bare_identifier, str::to_string),
        parse_quoted_identifier,
    ))(input)
}

fn parse_bare_identifier(input: &str) -> IResult<&str, &str> {
    let (rest, ident) = recognize(pair(
        take_while1(|c: char| c.is_alphabetic() || c == '_'),
        take_while(|c: char| c.is_alphanumeric() || c == '_'),
    ))(input)?;

    if ident.eq_ignore_ascii_case("and") || ident.eq_ignore_ascii_case("or") {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    Ok((rest, ident))
}

fn parse_quoted_identifier(input: &str) -> IResult<&str, String> {
    delimited(
        char('"'),
        map(
            many0(alt((preceded(char('\\'), anychar), none_of("\\\"")))),
            |chars: Vec<char>| chars.into_iter().collect(),
        ),
        char('"'),
    )(input)
}
