//! Built-in attribute expression language for access rules.
//!
//! ```text
//! expr       := and ("||" and)*
//! and        := unary ("&&" unary)*
//! unary      := "!" unary | "(" expr ")" | comparison | operand
//! comparison := operand ("==" | "!=" | "in") operand
//! operand    := subject.<path> | object.<path> | action
//!             | "string" | 'string' | number | true | false | [operand, ...]
//! ```
//!
//! A comparison that references a missing attribute is false. `in` tests array
//! membership, or equality when the right side is a scalar. A bare operand is true
//! only when it resolves to the boolean `true`.

use async_trait::async_trait;
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while},
    character::complete::{char, multispace0, satisfy},
    combinator::{all_consuming, map, not, peek, recognize, value},
    multi::{many0, many1, separated_list0},
    number::complete::double,
    sequence::{delimited, pair, preceded, terminated, tuple},
    IResult,
};
use serde_json::{Map, Value};
use tracing::debug;

use crate::application::{PolicyEvaluator, PolicyInput};
use crate::domain::{AccessRule, DomainError, PolicyLanguage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    Subject,
    Object,
    Action,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Path(Scope, Vec<String>),
    Literal(Value),
    List(Vec<Operand>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Comparator {
    Eq,
    Ne,
    In,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Not(Box<Expr>),
    Compare(Operand, Comparator, Operand),
    Truthy(Operand),
}

/// Evaluates `PolicyLanguage::Attribute` rules in-process.
#[derive(Debug, Default)]
pub struct AttributeRuleEvaluator;

impl AttributeRuleEvaluator {
    pub fn new() -> Self {
        Self
    }

    /// Checks that `text` parses without evaluating it.
    pub fn check_syntax(text: &str) -> Result<(), DomainError> {
        parse_rule(text).map(|_| ())
    }
}

#[async_trait]
impl PolicyEvaluator for AttributeRuleEvaluator {
    async fn evaluate(&self, rule: &AccessRule, input: &PolicyInput) -> Result<bool, DomainError> {
        if rule.language() != PolicyLanguage::Attribute {
            return Err(DomainError::policy(format!(
                "Attribute evaluator cannot evaluate {} rules",
                rule.language().as_str()
            )));
        }

        let expr = parse_rule(rule.text())?;
        let allowed = eval(&expr, input);
        debug!("Attribute rule {} evaluated to {}", rule.rule_id(), allowed);
        Ok(allowed)
    }

    fn supports(&self, language: PolicyLanguage) -> bool {
        language == PolicyLanguage::Attribute
    }
}

fn parse_rule(text: &str) -> Result<Expr, DomainError> {
    match all_consuming(ws(expression))(text) {
        Ok((_, expr)) => Ok(expr),
        Err(e) => Err(DomainError::policy(format!(
            "Invalid attribute rule '{}': {}",
            text, e
        ))),
    }
}

// =============================================================================
// PARSER
// =============================================================================

fn ws<'a, O, F>(inner: F) -> impl FnMut(&'a str) -> IResult<&'a str, O>
where
    F: FnMut(&'a str) -> IResult<&'a str, O>,
{
    delimited(multispace0, inner, multispace0)
}

fn expression(input: &str) -> IResult<&str, Expr> {
    let (input, first) = conjunction(input)?;
    let (input, rest) = many0(preceded(ws(tag("||")), conjunction))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, e| Expr::Or(Box::new(acc), Box::new(e)));
    Ok((input, expr))
}

fn conjunction(input: &str) -> IResult<&str, Expr> {
    let (input, first) = unary(input)?;
    let (input, rest) = many0(preceded(ws(tag("&&")), unary))(input)?;
    let expr = rest
        .into_iter()
        .fold(first, |acc, e| Expr::And(Box::new(acc), Box::new(e)));
    Ok((input, expr))
}

fn unary(input: &str) -> IResult<&str, Expr> {
    alt((
        map(preceded(ws(char('!')), unary), |e| Expr::Not(Box::new(e))),
        delimited(ws(char('(')), expression, ws(char(')'))),
        comparison,
        map(ws(operand), Expr::Truthy),
    ))(input)
}

fn comparison(input: &str) -> IResult<&str, Expr> {
    map(
        tuple((ws(operand), comparator, ws(operand))),
        |(left, op, right)| Expr::Compare(left, op, right),
    )(input)
}

fn comparator(input: &str) -> IResult<&str, Comparator> {
    alt((
        value(Comparator::Eq, tag("==")),
        value(Comparator::Ne, tag("!=")),
        value(Comparator::In, keyword("in")),
    ))(input)
}

fn operand(input: &str) -> IResult<&str, Operand> {
    alt((
        list,
        path,
        map(string_literal, |s| Operand::Literal(Value::String(s.to_string()))),
        map(bool_literal, |b| Operand::Literal(Value::Bool(b))),
        map(double, |n| Operand::Literal(Value::from(n))),
    ))(input)
}

fn list(input: &str) -> IResult<&str, Operand> {
    map(
        delimited(
            ws(char('[')),
            separated_list0(ws(char(',')), ws(operand)),
            ws(char(']')),
        ),
        Operand::List,
    )(input)
}

fn path(input: &str) -> IResult<&str, Operand> {
    alt((
        map(preceded(tag("subject"), many1(preceded(char('.'), ident))), |segments| {
            Operand::Path(Scope::Subject, segments)
        }),
        map(preceded(tag("object"), many1(preceded(char('.'), ident))), |segments| {
            Operand::Path(Scope::Object, segments)
        }),
        value(Operand::Path(Scope::Action, Vec::new()), keyword("action")),
    ))(input)
}

fn ident(input: &str) -> IResult<&str, String> {
    map(
        recognize(pair(
            satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        String::from,
    )(input)
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(
        tag(word),
        not(peek(satisfy(|c: char| c.is_ascii_alphanumeric() || c == '_'))),
    )
}

fn string_literal(input: &str) -> IResult<&str, &str> {
    alt((
        delimited(char('"'), take_until("\""), char('"')),
        delimited(char('\''), take_until("'"), char('\'')),
    ))(input)
}

fn bool_literal(input: &str) -> IResult<&str, bool> {
    alt((value(true, keyword("true")), value(false, keyword("false"))))(input)
}

// =============================================================================
// EVALUATION
// =============================================================================

fn eval(expr: &Expr, input: &PolicyInput) -> bool {
    match expr {
        Expr::Or(left, right) => eval(left, input) || eval(right, input),
        Expr::And(left, right) => eval(left, input) && eval(right, input),
        Expr::Not(inner) => !eval(inner, input),
        Expr::Compare(left, op, right) => match (resolve(left, input), resolve(right, input)) {
            (Some(l), Some(r)) => compare(&l, *op, &r),
            _ => false,
        },
        Expr::Truthy(operand) => matches!(resolve(operand, input), Some(Value::Bool(true))),
    }
}

fn resolve(operand: &Operand, input: &PolicyInput) -> Option<Value> {
    match operand {
        Operand::Literal(v) => Some(v.clone()),
        Operand::List(items) => Some(Value::Array(
            items.iter().filter_map(|i| resolve(i, input)).collect(),
        )),
        Operand::Path(Scope::Action, _) => Some(Value::String(input.action().to_string())),
        Operand::Path(Scope::Subject, segments) => lookup(input.subject(), segments),
        Operand::Path(Scope::Object, segments) => lookup(input.object(), segments),
    }
}

fn lookup(root: &Map<String, Value>, segments: &[String]) -> Option<Value> {
    let (first, rest) = segments.split_first()?;
    let mut current = root.get(first)?;
    for segment in rest {
        current = current.as_object()?.get(segment)?;
    }
    if current.is_null() {
        return None;
    }
    Some(current.clone())
}

fn compare(left: &Value, op: Comparator, right: &Value) -> bool {
    match op {
        Comparator::Eq => values_equal(left, right),
        Comparator::Ne => !values_equal(left, right),
        Comparator::In => match right {
            Value::Array(items) => items.iter().any(|item| values_equal(left, item)),
            scalar => values_equal(left, scalar),
        },
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left.as_f64(), right.as_f64()) {
        (Some(l), Some(r)) if left.is_number() && right.is_number() => l == r,
        _ => left == right,
    }
}
