use bson::{Bson, Document};
use regex::Regex;

use crate::expression::Expression;

/// Parse error for filter documents.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterParseError(pub String);

impl std::fmt::Display for FilterParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter parse error: {}", self.0)
    }
}

impl std::error::Error for FilterParseError {}

fn fail<T>(msg: impl Into<String>) -> Result<T, FilterParseError> {
    Err(FilterParseError(msg.into()))
}

/// Parse a filter document into an [`Expression`].
///
/// Entries are ANDed. A field maps either to a value (implicit `$eq`) or to
/// an operator document such as `{ "$gte": 1, "$lt": 9 }`; `$and` / `$or`
/// take arrays of filter documents.
pub fn parse_filter(doc: &Document) -> Result<Expression, FilterParseError> {
    let terms = doc
        .iter()
        .map(|(key, value)| match key.as_str() {
            "$and" => logical(key, value).map(Expression::And),
            "$or" => logical(key, value).map(Expression::Or),
            k if k.starts_with('$') => fail(format!("unsupported top-level operator {k}")),
            field => field_condition(field, value),
        })
        .collect::<Result<Vec<_>, _>>()?;
    conjunction(terms, "filter document is empty")
}

fn conjunction(mut terms: Vec<Expression>, empty: &str) -> Result<Expression, FilterParseError> {
    match terms.len() {
        0 => fail(empty),
        1 => Ok(terms.remove(0)),
        _ => Ok(Expression::And(terms)),
    }
}

fn logical(op: &str, value: &Bson) -> Result<Vec<Expression>, FilterParseError> {
    let Bson::Array(items) = value else {
        return fail(format!("{op} expects an array"));
    };
    if items.is_empty() {
        return fail(format!("{op} needs at least one clause"));
    }
    items
        .iter()
        .map(|item| match item {
            Bson::Document(clause) => parse_filter(clause),
            other => fail(format!("{op} clauses must be documents, got {other}")),
        })
        .collect()
}

fn field_condition(field: &str, value: &Bson) -> Result<Expression, FilterParseError> {
    match value {
        Bson::Document(ops) if ops.keys().next().is_some_and(|k| k.starts_with('$')) => {
            operators(field, ops)
        }
        // embedded documents compare whole
        _ => Ok(Expression::Eq(field.to_string(), value.clone())),
    }
}

fn operators(field: &str, ops: &Document) -> Result<Expression, FilterParseError> {
    if ops.contains_key("$regex") {
        return regex(field, ops);
    }
    let terms = ops
        .iter()
        .map(|(op, arg)| {
            let field = field.to_string();
            let arg = arg.clone();
            Ok(match op.as_str() {
                "$eq" => Expression::Eq(field, arg),
                "$ne" => Expression::Ne(field, arg),
                "$gt" => Expression::Gt(field, arg),
                "$gte" => Expression::Gte(field, arg),
                "$lt" => Expression::Lt(field, arg),
                "$lte" => Expression::Lte(field, arg),
                "$exists" => match arg {
                    Bson::Boolean(present) => Expression::Exists(field, present),
                    other => return fail(format!("$exists on {field} takes a boolean, got {other}")),
                },
                "$options" => return fail(format!("$options on {field} requires $regex")),
                other => return fail(format!("unsupported operator {other} on {field}")),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;
    conjunction(terms, "operator document is empty")
}

fn regex(field: &str, ops: &Document) -> Result<Expression, FilterParseError> {
    let mut pattern = None;
    let mut flags = String::new();
    for (key, value) in ops {
        match (key.as_str(), value) {
            ("$regex", Bson::String(p)) => pattern = Some(p.as_str()),
            ("$options", Bson::String(opts)) => {
                for flag in opts.chars() {
                    if !matches!(flag, 'i' | 'm' | 's' | 'x') {
                        return fail(format!("unsupported regex option '{flag}'"));
                    }
                    flags.push(flag);
                }
            }
            ("$regex" | "$options", other) => {
                return fail(format!("{key} on {field} takes a string, got {other}"));
            }
            (other, _) => return fail(format!("{other} cannot be combined with $regex")),
        }
    }
    let Some(pattern) = pattern else {
        return fail(format!("$regex on {field} has no pattern"));
    };

    let source = if flags.is_empty() {
        pattern.to_string()
    } else {
        format!("(?{flags}){pattern}")
    };
    let re = Regex::new(&source).map_err(|e| FilterParseError(format!("bad $regex: {e}")))?;
    Ok(Expression::Regex(field.to_string(), re))
}
