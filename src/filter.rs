//! Condition strings for the command line, parsed with nom.
//!
//! ```text
//! |users.email~%@example.com
//! ┬ ──┬── ──┬─┬ ──────┬─────
//! │   │     │ │       └── Value (typed: int, float, bool, null, quoted or bare text)
//! │   │     │ └── Operator: = ~ >= <= > < : !null ?null
//! │   │     └── Field
//! │   └── Optional table qualifier
//! └── Optional OR marker
//! ```
//!
//! `~` is LIKE, `:` takes a comma-separated IN list, `?null` / `!null` test
//! for NULL and take no value.

use nom::{
    IResult,
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, multispace0},
    combinator::{all_consuming, map, opt, rest, value},
    multi::separated_list1,
    number::complete::recognize_float,
    sequence::{delimited, preceded, terminated},
};
use serde_json::Value;

use crate::ast::{Comparison, Comparitor, Field, Operand, Relation, Where};
use crate::error::{KeelError, KeelResult};

/// Parse one condition string.
pub fn parse(input: &str) -> KeelResult<Where> {
    let input = input.trim();

    match all_consuming(parse_condition)(input) {
        Ok((_, clause)) => Ok(clause),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(KeelError::parse(
            input.len() - e.input.len(),
            format!("Invalid condition '{}'", input),
        )),
        Err(nom::Err::Incomplete(_)) => Err(KeelError::parse(input.len(), "Incomplete condition")),
    }
}

/// Parse every condition, stopping at the first failure.
pub fn parse_all<S: AsRef<str>>(inputs: &[S]) -> KeelResult<Vec<Where>> {
    inputs.iter().map(|s| parse(s.as_ref())).collect()
}

fn parse_condition(input: &str) -> IResult<&str, Where> {
    let (input, or) = opt(terminated(char('|'), multispace0))(input)?;
    let (input, field) = parse_field(input)?;
    let (input, _) = multispace0(input)?;
    let (input, comparitor) = parse_comparitor(input)?;
    let (input, _) = multispace0(input)?;

    let (input, comparison) = match comparitor {
        Comparitor::IsNull | Comparitor::IsNotNull => (input, Comparison::None),
        Comparitor::In => map(parse_list, Comparison::List)(input)?,
        _ => map(parse_value, |v| Comparison::Single(Operand::Value(v)))(input)?,
    };

    let relation = if or.is_some() { Relation::Or } else { Relation::And };

    Ok((
        input,
        Where::new(field, comparison)
            .comparitor(comparitor)
            .relation(relation),
    ))
}

fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// `field` or `table.field`.
fn parse_field(input: &str) -> IResult<&str, Field> {
    let (input, first) = parse_identifier(input)?;
    let (input, second) = opt(preceded(char('.'), parse_identifier))(input)?;

    Ok((
        input,
        match second {
            Some(field) => Field::new(field).on(first),
            None => Field::new(first),
        },
    ))
}

fn parse_comparitor(input: &str) -> IResult<&str, Comparitor> {
    alt((
        value(Comparitor::IsNotNull, tag("!null")),
        value(Comparitor::IsNull, tag("?null")),
        value(Comparitor::Gte, tag(">=")),
        value(Comparitor::Lte, tag("<=")),
        value(Comparitor::Gt, char('>')),
        value(Comparitor::Lt, char('<')),
        value(Comparitor::Like, char('~')),
        value(Comparitor::In, char(':')),
        value(Comparitor::Equals, char('=')),
    ))(input)
}

fn parse_list(input: &str) -> IResult<&str, Vec<Operand>> {
    separated_list1(
        delimited(multispace0, char(','), multispace0),
        map(parse_list_item, Operand::Value),
    )(input)
}

fn parse_list_item(input: &str) -> IResult<&str, Value> {
    alt((
        parse_quoted,
        map(is_not(","), |s: &str| typed_value(s.trim())),
    ))(input)
}

fn parse_value(input: &str) -> IResult<&str, Value> {
    alt((parse_quoted, map(rest, |s: &str| typed_value(s.trim()))))(input)
}

fn parse_quoted(input: &str) -> IResult<&str, Value> {
    let string = |s: &str| Value::String(s.to_string());
    alt((
        map(delimited(char('"'), opt(is_not("\"")), char('"')), move |s| {
            string(s.unwrap_or_default())
        }),
        map(delimited(char('\''), opt(is_not("'")), char('\'')), move |s| {
            string(s.unwrap_or_default())
        }),
    ))(input)
}

/// Bare text becomes a number, bool or null when it reads as one.
fn typed_value(text: &str) -> Value {
    match text {
        "null" | "NULL" => return Value::Null,
        "true" => return Value::Bool(true),
        "false" => return Value::Bool(false),
        _ => {}
    }

    if let Ok(n) = text.parse::<i64>() {
        return Value::from(n);
    }

    if all_consuming(recognize_float::<&str, nom::error::Error<&str>>)(text).is_ok() {
        if let Some(n) = text.parse::<f64>().ok().and_then(serde_json::Number::from_f64) {
            return Value::Number(n);
        }
    }

    Value::String(text.to_string())
}
