//! Computed-field operators for `$project`.
//!
//! Arguments are parsed once when the projection is compiled; evaluation
//! only reads the fetched document and writes the destination field.

use std::cmp::Ordering;

use bson::{Bson, Document};
use chrono::{DateTime, SecondsFormat, Utc};
use mimic_query::{path, value_cmp, value_eq};
use mimic_store::Store;

use super::date::DateComponent;
use super::filter::{self, ArrayFilter};
use super::registry::OperatorKind;
use crate::codes;
use crate::database::Database;
use crate::error::DbError;

// ── Operands ────────────────────────────────────────────────────

/// A field reference (`"$a.b"`) or a literal value.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Operand {
    Field(String),
    Literal(Bson),
}

impl Operand {
    pub(crate) fn parse(value: &Bson) -> Self {
        match value {
            Bson::String(s) if s.starts_with('$') => Operand::Field(s[1..].to_string()),
            other => Operand::Literal(other.clone()),
        }
    }

    fn field(&self) -> Option<&str> {
        match self {
            Operand::Field(f) => Some(f),
            Operand::Literal(_) => None,
        }
    }

    fn resolve<'a>(&'a self, doc: &'a Document) -> Option<&'a Bson> {
        match self {
            Operand::Field(f) => path::get(doc, f),
            Operand::Literal(v) => Some(v),
        }
    }
}

// ── Comparisons ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CompareOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub(crate) fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "$eq" => Some(CompareOp::Eq),
            "$ne" => Some(CompareOp::Ne),
            "$gt" => Some(CompareOp::Gt),
            "$gte" => Some(CompareOp::Gte),
            "$lt" => Some(CompareOp::Lt),
            "$lte" => Some(CompareOp::Lte),
            _ => None,
        }
    }

    /// Missing values compare as null, and null sorts before everything.
    fn holds(self, left: &Bson, right: &Bson) -> bool {
        let ord = match (is_null(left), is_null(right)) {
            (true, true) => Some(Ordering::Equal),
            (true, false) => Some(Ordering::Less),
            (false, true) => Some(Ordering::Greater),
            (false, false) => value_cmp(left, right),
        };
        match self {
            CompareOp::Eq => ord == Some(Ordering::Equal) || value_eq(left, right),
            CompareOp::Ne => !(ord == Some(Ordering::Equal) || value_eq(left, right)),
            CompareOp::Gt => ord == Some(Ordering::Greater),
            CompareOp::Gte => matches!(ord, Some(Ordering::Greater | Ordering::Equal)),
            CompareOp::Lt => ord == Some(Ordering::Less),
            CompareOp::Lte => matches!(ord, Some(Ordering::Less | Ordering::Equal)),
        }
    }
}

/// Boolean test of `$cond`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Condition {
    Constant(bool),
    Field(String),
    Compare {
        op: CompareOp,
        left: Operand,
        right: Operand,
    },
}

impl Condition {
    fn parse(value: &Bson) -> Result<Self, DbError> {
        match value {
            Bson::String(s) if s.starts_with('$') => Ok(Condition::Field(s[1..].to_string())),
            Bson::Document(d) => {
                let (keyword, arg) = single_entry(d)?;
                let op = CompareOp::parse(keyword).ok_or_else(|| invalid_operator(keyword))?;
                let args = arity(keyword, arg, 2)?;
                Ok(Condition::Compare {
                    op,
                    left: Operand::parse(args[0]),
                    right: Operand::parse(args[1]),
                })
            }
            other => Ok(Condition::Constant(truthy(Some(other)))),
        }
    }

    fn test(&self, doc: &Document) -> bool {
        match self {
            Condition::Constant(b) => *b,
            Condition::Field(f) => truthy(path::get(doc, f)),
            Condition::Compare { op, left, right } => op.holds(
                left.resolve(doc).unwrap_or(&Bson::Null),
                right.resolve(doc).unwrap_or(&Bson::Null),
            ),
        }
    }

    fn fields(&self) -> Vec<&str> {
        match self {
            Condition::Constant(_) => Vec::new(),
            Condition::Field(f) => vec![f.as_str()],
            Condition::Compare { left, right, .. } => {
                left.field().into_iter().chain(right.field()).collect()
            }
        }
    }
}

// ── Operators ───────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub(crate) enum Computation {
    /// Copy the top-level field named by the destination.
    Include,
    /// Copy the value of the source field that triggered evaluation.
    Rename,
    Size(Operand),
    IfNull {
        value: Operand,
        fallback: Operand,
    },
    Concat(Vec<Operand>),
    Substr {
        value: Operand,
        start: i64,
        length: i64,
    },
    Compare {
        left: Operand,
        right: Operand,
        compare: fn(&str, &str) -> Ordering,
    },
    Case {
        value: Operand,
        transform: fn(&str) -> String,
    },
    /// A value fixed at compile time (`$divide`).
    Constant(Bson),
    Date {
        value: Operand,
        component: DateComponent,
    },
    Cond {
        condition: Condition,
        then: Operand,
        otherwise: Operand,
    },
    Filter(ArrayFilter),
}

/// One compiled operator instance, writing to `dest` (a dotted path).
#[derive(Debug, Clone)]
pub(crate) struct Operator {
    pub(crate) dest: String,
    pub(crate) computation: Computation,
}

impl Operator {
    pub(crate) fn include(field: &str) -> Self {
        Self {
            dest: field.to_string(),
            computation: Computation::Include,
        }
    }

    pub(crate) fn rename(dest: String) -> Self {
        Self {
            dest,
            computation: Computation::Rename,
        }
    }

    /// Parse the operator argument `arg` found under `keyword`.
    pub(crate) fn build<S: Store>(
        keyword: &str,
        kind: OperatorKind,
        dest: String,
        arg: &Bson,
        db: &Database<S>,
        collection: &str,
    ) -> Result<Self, DbError> {
        let computation = match kind {
            OperatorKind::Size => Computation::Size(single(keyword, arg)?),
            OperatorKind::IfNull => {
                let args = arity(keyword, arg, 2)?;
                Computation::IfNull {
                    value: Operand::parse(args[0]),
                    fallback: Operand::parse(args[1]),
                }
            }
            OperatorKind::Concat => {
                let args = operands(arg);
                if args.is_empty() {
                    return Err(DbError::command(
                        codes::BAD_ARITY,
                        "Expression $concat takes at least 1 argument",
                    ));
                }
                Computation::Concat(args.into_iter().map(Operand::parse).collect())
            }
            OperatorKind::Substr => {
                let args = arity(keyword, arg, 3)?;
                let start = as_i64(args[1]).ok_or_else(|| {
                    DbError::command(
                        codes::SUBSTR_START,
                        format!(
                            "$substr: starting index must be a numeric type (is BSON type {})",
                            type_name(Some(args[1]))
                        ),
                    )
                })?;
                let length = as_i64(args[2]).ok_or_else(|| {
                    DbError::command(
                        codes::SUBSTR_LENGTH,
                        format!(
                            "$substr: length must be a numeric type (is BSON type {})",
                            type_name(Some(args[2]))
                        ),
                    )
                })?;
                Computation::Substr {
                    value: Operand::parse(args[0]),
                    start,
                    length,
                }
            }
            OperatorKind::Cmp | OperatorKind::Strcasecmp => {
                let args = arity(keyword, arg, 2)?;
                let compare: fn(&str, &str) -> Ordering = match kind {
                    OperatorKind::Cmp => |a, b| a.cmp(b),
                    _ => |a, b| a.to_uppercase().cmp(&b.to_uppercase()),
                };
                Computation::Compare {
                    left: Operand::parse(args[0]),
                    right: Operand::parse(args[1]),
                    compare,
                }
            }
            OperatorKind::ToLower => Computation::Case {
                value: single(keyword, arg)?,
                transform: str::to_lowercase,
            },
            OperatorKind::ToUpper => Computation::Case {
                value: single(keyword, arg)?,
                transform: str::to_uppercase,
            },
            OperatorKind::Divide => {
                let args = arity(keyword, arg, 2)?;
                let mut values = [0.0; 2];
                for (slot, value) in values.iter_mut().zip(args.iter().copied()) {
                    *slot = as_f64(value).ok_or_else(|| {
                        DbError::command(
                            codes::DIVIDE_NON_NUMERIC,
                            format!(
                                "$divide only supports numeric types, not {}",
                                type_name(Some(value))
                            ),
                        )
                    })?;
                }
                // Evaluated once from the literal operands
                Computation::Constant(Bson::Double(values[1] % values[0]))
            }
            OperatorKind::Date(component) => {
                let args = arity(keyword, arg, 1)?;
                if !matches!(args[0], Bson::String(_)) {
                    return Err(DbError::command(
                        codes::BAD_ARITY,
                        format!("{keyword} takes a single field path string"),
                    ));
                }
                Computation::Date {
                    value: Operand::parse(args[0]),
                    component,
                }
            }
            OperatorKind::Cond => parse_cond(arg)?,
            OperatorKind::Filter => Computation::Filter(filter::build(db, collection, arg)?),
        };
        Ok(Self { dest, computation })
    }

    /// Source fields this operator reads.
    pub(crate) fn fields(&self) -> Vec<String> {
        let fields: Vec<&str> = match &self.computation {
            Computation::Include | Computation::Rename | Computation::Constant(_) => Vec::new(),
            Computation::Size(value)
            | Computation::Substr { value, .. }
            | Computation::Case { value, .. }
            | Computation::Date { value, .. } => value.field().into_iter().collect(),
            Computation::IfNull { value, fallback } => {
                value.field().into_iter().chain(fallback.field()).collect()
            }
            Computation::Concat(parts) => parts.iter().filter_map(Operand::field).collect(),
            Computation::Compare { left, right, .. } => {
                left.field().into_iter().chain(right.field()).collect()
            }
            Computation::Cond {
                condition,
                then,
                otherwise,
            } => {
                let mut fields = condition.fields();
                fields.extend(then.field());
                fields.extend(otherwise.field());
                fields
            }
            Computation::Filter(f) => vec![f.input()],
        };
        fields.into_iter().map(str::to_string).collect()
    }

    /// Compute the destination value from `source` and write it into `out`.
    /// `position` is the index of `source` in the fetched batch; `matched`
    /// is the source field that triggered this run, if any.
    pub(crate) fn evaluate(
        &self,
        source: &Document,
        position: usize,
        matched: Option<&str>,
        out: &mut Document,
    ) -> Result<(), DbError> {
        let value = match &self.computation {
            Computation::Include => source.get(&self.dest).cloned(),
            Computation::Rename => matched.and_then(|f| path::get(source, f)).cloned(),
            Computation::Size(value) => match value.resolve(source) {
                Some(Bson::Array(arr)) => Some(Bson::Int32(arr.len() as i32)),
                other => {
                    return Err(DbError::command(
                        codes::SIZE_NOT_ARRAY,
                        format!(
                            "The argument to $size must be an array. Type was: {}",
                            type_name(other)
                        ),
                    ));
                }
            },
            Computation::IfNull { value, fallback } => match value.resolve(source) {
                Some(v) if !is_null(v) => Some(v.clone()),
                _ => fallback.resolve(source).cloned(),
            },
            Computation::Concat(parts) => Some(concat(parts, source)),
            Computation::Substr {
                value,
                start,
                length,
            } => {
                let text = text(value.resolve(source)).unwrap_or_default();
                Some(Bson::String(substr(&text, *start, *length)))
            }
            Computation::Compare {
                left,
                right,
                compare,
            } => {
                let ord = match (text(left.resolve(source)), text(right.resolve(source))) {
                    (Some(a), Some(b)) => compare(&a, &b),
                    (a, b) => a.is_some().cmp(&b.is_some()),
                };
                Some(Bson::Int32(ord as i32))
            }
            Computation::Case { value, transform } => {
                let text = text(value.resolve(source)).unwrap_or_default();
                Some(Bson::String(transform(&text)))
            }
            Computation::Constant(v) => Some(v.clone()),
            Computation::Date { value, component } => match value.resolve(source) {
                None | Some(Bson::Null) => Some(Bson::Null),
                Some(Bson::DateTime(dt)) => {
                    let millis = dt.timestamp_millis();
                    let v = component.extract(millis).ok_or_else(|| {
                        DbError::command(codes::DATE_TYPE, format!("date out of range: {millis}"))
                    })?;
                    Some(Bson::Int32(v))
                }
                Some(other) => {
                    return Err(DbError::command(
                        codes::DATE_TYPE,
                        format!(
                            "can't convert from BSON type {} to Date",
                            type_name(Some(other))
                        ),
                    ));
                }
            },
            Computation::Cond {
                condition,
                then,
                otherwise,
            } => {
                let branch = if condition.test(source) { then } else { otherwise };
                branch.resolve(source).cloned()
            }
            Computation::Filter(f) => f.evaluate(source, position)?,
        };

        if let Some(value) = value {
            path::set(out, &self.dest, value);
        }
        Ok(())
    }
}

// ── Argument parsing ────────────────────────────────────────────

/// An array argument lists the operands; anything else is one operand.
fn operands(arg: &Bson) -> Vec<&Bson> {
    match arg {
        Bson::Array(items) => items.iter().collect(),
        other => vec![other],
    }
}

pub(crate) fn arity<'a>(
    keyword: &str,
    arg: &'a Bson,
    expected: usize,
) -> Result<Vec<&'a Bson>, DbError> {
    let args = operands(arg);
    if args.len() != expected {
        return Err(DbError::command(
            codes::BAD_ARITY,
            format!(
                "Expression {keyword} takes exactly {expected} arguments. {} were passed in.",
                args.len()
            ),
        ));
    }
    Ok(args)
}

fn single(keyword: &str, arg: &Bson) -> Result<Operand, DbError> {
    Ok(Operand::parse(arity(keyword, arg, 1)?[0]))
}

pub(crate) fn single_entry(d: &Document) -> Result<(&str, &Bson), DbError> {
    match d.iter().next() {
        Some((k, v)) if d.len() == 1 => Ok((k.as_str(), v)),
        _ => Err(DbError::command(
            codes::EXPRESSION_FIELD_COUNT,
            format!(
                "an expression specification must contain exactly one field, \
                 the name of the expression. Found {} fields",
                d.len()
            ),
        )),
    }
}

pub(crate) fn invalid_operator(keyword: &str) -> DbError {
    DbError::command(codes::INVALID_OPERATOR, format!("invalid operator '{keyword}'"))
}

fn parse_cond(arg: &Bson) -> Result<Computation, DbError> {
    let (condition, then, otherwise) = match arg {
        Bson::Document(d) => {
            let mut parts: [Option<&Bson>; 3] = [None; 3];
            for (k, v) in d {
                let slot = match k.as_str() {
                    "if" => 0,
                    "then" => 1,
                    "else" => 2,
                    other => {
                        return Err(DbError::command(
                            codes::COND_UNKNOWN_ARG,
                            format!("Unrecognized parameter to $cond: {other}"),
                        ));
                    }
                };
                parts[slot] = Some(v);
            }
            let missing = |code: i32, name: &str| {
                DbError::command(code, format!("Missing '{name}' parameter to $cond"))
            };
            (
                parts[0].ok_or_else(|| missing(codes::COND_MISSING_IF, "if"))?,
                parts[1].ok_or_else(|| missing(codes::COND_MISSING_THEN, "then"))?,
                parts[2].ok_or_else(|| missing(codes::COND_MISSING_ELSE, "else"))?,
            )
        }
        other => {
            let args = arity("$cond", other, 3)?;
            (args[0], args[1], args[2])
        }
    };
    Ok(Computation::Cond {
        condition: Condition::parse(condition)?,
        then: Operand::parse(then),
        otherwise: Operand::parse(otherwise),
    })
}

// ── Value helpers ───────────────────────────────────────────────

fn is_null(v: &Bson) -> bool {
    matches!(v, Bson::Null | Bson::Undefined)
}

/// Aggregation truthiness: missing, null, `false` and zero are false.
fn truthy(v: Option<&Bson>) -> bool {
    match v {
        None | Some(Bson::Null) | Some(Bson::Undefined) => false,
        Some(Bson::Boolean(b)) => *b,
        Some(Bson::Int32(n)) => *n != 0,
        Some(Bson::Int64(n)) => *n != 0,
        Some(Bson::Double(n)) => *n != 0.0,
        Some(_) => true,
    }
}

fn as_f64(v: &Bson) -> Option<f64> {
    match v {
        Bson::Int32(n) => Some(*n as f64),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}

fn as_i64(v: &Bson) -> Option<i64> {
    match v {
        Bson::Int32(n) => Some(*n as i64),
        Bson::Int64(n) => Some(*n),
        Bson::Double(n) => Some(*n as i64),
        _ => None,
    }
}

pub(crate) fn type_name(v: Option<&Bson>) -> &'static str {
    match v {
        None => "missing",
        Some(Bson::Null) => "null",
        Some(Bson::String(_)) => "string",
        Some(Bson::Double(_)) => "double",
        Some(Bson::Int32(_)) => "int",
        Some(Bson::Int64(_)) => "long",
        Some(Bson::Boolean(_)) => "bool",
        Some(Bson::Document(_)) => "object",
        Some(Bson::Array(_)) => "array",
        Some(Bson::DateTime(_)) => "date",
        Some(Bson::ObjectId(_)) => "objectId",
        Some(_) => "unknown",
    }
}

/// String form of a value; `None` for missing or null.
fn text(v: Option<&Bson>) -> Option<String> {
    match v {
        None => None,
        Some(v) if is_null(v) => None,
        Some(v) => Some(string_form(v)),
    }
}

fn string_form(v: &Bson) -> String {
    match v {
        Bson::String(s) => s.clone(),
        Bson::Int32(n) => n.to_string(),
        Bson::Int64(n) => n.to_string(),
        Bson::Double(d) if d.is_finite() && d.fract() == 0.0 => format!("{d:.1}"),
        Bson::Double(d) => d.to_string(),
        Bson::Boolean(b) => b.to_string(),
        Bson::DateTime(dt) => DateTime::<Utc>::from_timestamp_millis(dt.timestamp_millis())
            .map(|d| d.to_rfc3339_opts(SecondsFormat::Millis, true))
            .unwrap_or_else(|| dt.to_string()),
        Bson::ObjectId(oid) => oid.to_hex(),
        other => other.to_string(),
    }
}

fn concat(parts: &[Operand], source: &Document) -> Bson {
    let mut out = String::new();
    for part in parts {
        match text(part.resolve(source)) {
            Some(s) => out.push_str(&s),
            None => return Bson::Null,
        }
    }
    Bson::String(out)
}

fn substr(text: &str, start: i64, length: i64) -> String {
    let len = text.chars().count();
    let start = start.max(0) as usize;
    if start >= len {
        return String::new();
    }
    let end = if length < 0 {
        len
    } else {
        start.saturating_add(length as usize).min(len)
    };
    text.chars().skip(start).take(end - start).collect()
}

#[cfg(test)]
mod tests {
    use bson::doc;
    use mimic_store::MemoryStore;

    use super::*;
    use crate::database::DatabaseConfig;

    fn build(keyword: &str, kind: OperatorKind, arg: Bson) -> Result<Operator, DbError> {
        let db = Database::open(MemoryStore::new(), DatabaseConfig::default());
        Operator::build(keyword, kind, "out".into(), &arg, &db, "c")
    }

    fn eval(op: &Operator, source: &Document) -> Result<Option<Bson>, DbError> {
        let mut out = Document::new();
        op.evaluate(source, 0, None, &mut out)?;
        Ok(out.get("out").cloned())
    }

    #[test]
    fn operand_parsing() {
        assert_eq!(Operand::parse(&Bson::String("$a.b".into())), Operand::Field("a.b".into()));
        assert_eq!(Operand::parse(&Bson::String("a".into())), Operand::Literal("a".into()));
        assert_eq!(Operand::parse(&Bson::Int32(1)), Operand::Literal(Bson::Int32(1)));
    }

    #[test]
    fn size_counts_elements() {
        let op = build("$size", OperatorKind::Size, Bson::String("$v".into())).unwrap();
        assert_eq!(eval(&op, &doc! { "v": [1, 2, 3] }).unwrap(), Some(Bson::Int32(3)));
        assert_eq!(op.fields(), vec!["v".to_string()]);
    }

    #[test]
    fn size_rejects_non_array_and_missing() {
        let op = build("$size", OperatorKind::Size, Bson::String("$v".into())).unwrap();
        let err = eval(&op, &doc! { "v": "abc" }).unwrap_err();
        assert_eq!(err.code(), Some(codes::SIZE_NOT_ARRAY));
        let err = eval(&op, &doc! {}).unwrap_err();
        assert_eq!(err.code(), Some(codes::SIZE_NOT_ARRAY));
    }

    #[test]
    fn size_arity() {
        let err = build("$size", OperatorKind::Size, bson::bson!(["$a", "$b"])).unwrap_err();
        assert_eq!(err.code(), Some(codes::BAD_ARITY));
    }

    #[test]
    fn if_null_falls_back() {
        let op = build("$ifNull", OperatorKind::IfNull, bson::bson!(["$a", "none"])).unwrap();
        assert_eq!(eval(&op, &doc! { "a": "x" }).unwrap(), Some(Bson::String("x".into())));
        assert_eq!(eval(&op, &doc! { "a": null }).unwrap(), Some(Bson::String("none".into())));
        assert_eq!(eval(&op, &doc! {}).unwrap(), Some(Bson::String("none".into())));
    }

    #[test]
    fn if_null_field_fallback() {
        let op = build("$ifNull", OperatorKind::IfNull, bson::bson!(["$a", "$b"])).unwrap();
        assert_eq!(op.fields(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(eval(&op, &doc! { "b": 2 }).unwrap(), Some(Bson::Int32(2)));
        assert_eq!(eval(&op, &doc! {}).unwrap(), None);
    }

    #[test]
    fn if_null_arity() {
        let err = build("$ifNull", OperatorKind::IfNull, bson::bson!(["$a"])).unwrap_err();
        assert_eq!(err.code(), Some(codes::BAD_ARITY));
    }

    #[test]
    fn concat_string_forms() {
        let op = build(
            "$concat",
            OperatorKind::Concat,
            bson::bson!(["$s", "-", "$i", "-", "$d", "-", "$b"]),
        )
        .unwrap();
        let source = doc! { "s": "x", "i": 3, "d": 5.0, "b": true };
        assert_eq!(eval(&op, &source).unwrap(), Some(Bson::String("x-3-5.0-true".into())));
    }

    #[test]
    fn concat_null_short_circuits() {
        let op = build("$concat", OperatorKind::Concat, bson::bson!(["$a", "-", "$b"])).unwrap();
        assert_eq!(eval(&op, &doc! { "a": "x", "b": null }).unwrap(), Some(Bson::Null));
        assert_eq!(eval(&op, &doc! { "a": "x" }).unwrap(), Some(Bson::Null));
    }

    #[test]
    fn concat_date_form() {
        let op = build("$concat", OperatorKind::Concat, bson::bson!(["$d"])).unwrap();
        let d = bson::DateTime::from_millis(1_394_979_936_789);
        assert_eq!(
            eval(&op, &doc! { "d": d }).unwrap(),
            Some(Bson::String("2014-03-16T14:25:36.789Z".into()))
        );
    }

    #[test]
    fn concat_requires_operands() {
        let err = build("$concat", OperatorKind::Concat, bson::bson!([])).unwrap_err();
        assert_eq!(err.code(), Some(codes::BAD_ARITY));
    }

    #[test]
    fn substr_clamps() {
        assert_eq!(substr("hello", 2, 100), "llo");
        assert_eq!(substr("hello", 5, 1), "");
        assert_eq!(substr("hello", 9, 1), "");
        assert_eq!(substr("hello", 1, 3), "ell");
        assert_eq!(substr("hello", 1, -1), "ello");
        assert_eq!(substr("hello", -2, 2), "he");
        assert_eq!(substr("héllo", 1, 2), "él");
    }

    #[test]
    fn substr_null_is_empty() {
        let op = build("$substr", OperatorKind::Substr, bson::bson!(["$s", 0, 2])).unwrap();
        assert_eq!(eval(&op, &doc! {}).unwrap(), Some(Bson::String(String::new())));
        assert_eq!(eval(&op, &doc! { "s": 12345 }).unwrap(), Some(Bson::String("12".into())));
    }

    #[test]
    fn substr_argument_types() {
        let err = build("$substr", OperatorKind::Substr, bson::bson!(["$s", "a", 2])).unwrap_err();
        assert_eq!(err.code(), Some(codes::SUBSTR_START));
        let err = build("$substr", OperatorKind::Substr, bson::bson!(["$s", 0, "b"])).unwrap_err();
        assert_eq!(err.code(), Some(codes::SUBSTR_LENGTH));
        let err = build("$substr", OperatorKind::Substr, bson::bson!(["$s", 0])).unwrap_err();
        assert_eq!(err.code(), Some(codes::BAD_ARITY));
    }

    #[test]
    fn cmp_and_strcasecmp() {
        let cmp = build("$cmp", OperatorKind::Cmp, bson::bson!(["$a", "$b"])).unwrap();
        let case = build("$strcasecmp", OperatorKind::Strcasecmp, bson::bson!(["$a", "$b"]))
            .unwrap();
        let source = doc! { "a": "abc", "b": "ABD" };
        assert_eq!(eval(&cmp, &source).unwrap(), Some(Bson::Int32(1)));
        assert_eq!(eval(&case, &source).unwrap(), Some(Bson::Int32(-1)));
        let same = doc! { "a": "Hello", "b": "hELLO" };
        assert_eq!(eval(&case, &same).unwrap(), Some(Bson::Int32(0)));
        assert_eq!(eval(&cmp, &doc! { "b": "x" }).unwrap(), Some(Bson::Int32(-1)));
        assert_eq!(eval(&cmp, &doc! {}).unwrap(), Some(Bson::Int32(0)));
    }

    #[test]
    fn case_transforms() {
        let lower = build("$toLower", OperatorKind::ToLower, Bson::String("$a".into())).unwrap();
        let upper = build("$toUpper", OperatorKind::ToUpper, bson::bson!(["$a"])).unwrap();
        assert_eq!(eval(&lower, &doc! { "a": "MiXed" }).unwrap(), Some(Bson::String("mixed".into())));
        assert_eq!(eval(&upper, &doc! { "a": "MiXed" }).unwrap(), Some(Bson::String("MIXED".into())));
        assert_eq!(eval(&upper, &doc! { "a": null }).unwrap(), Some(Bson::String(String::new())));
        let literal = build("$toUpper", OperatorKind::ToUpper, Bson::String("abc".into())).unwrap();
        assert_eq!(eval(&literal, &doc! {}).unwrap(), Some(Bson::String("ABC".into())));
    }

    #[test]
    fn divide_is_compile_time_remainder() {
        let op = build("$divide", OperatorKind::Divide, bson::bson!([3, 10])).unwrap();
        assert!(op.fields().is_empty());
        assert_eq!(eval(&op, &doc! {}).unwrap(), Some(Bson::Double(1.0)));
        let zero = build("$divide", OperatorKind::Divide, bson::bson!([0, 10])).unwrap();
        match eval(&zero, &doc! {}).unwrap() {
            Some(Bson::Double(v)) => assert!(v.is_nan()),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn divide_rejects_non_numeric() {
        let err = build("$divide", OperatorKind::Divide, bson::bson!(["$a", 2])).unwrap_err();
        assert_eq!(err.code(), Some(codes::DIVIDE_NON_NUMERIC));
        let err = build("$divide", OperatorKind::Divide, bson::bson!([1])).unwrap_err();
        assert_eq!(err.code(), Some(codes::BAD_ARITY));
    }

    #[test]
    fn date_component() {
        let op = build(
            "$month",
            OperatorKind::Date(DateComponent::Month),
            Bson::String("$d".into()),
        )
        .unwrap();
        let d = bson::DateTime::from_millis(1_394_979_936_789);
        assert_eq!(eval(&op, &doc! { "d": d }).unwrap(), Some(Bson::Int32(3)));
        assert_eq!(eval(&op, &doc! {}).unwrap(), Some(Bson::Null));
        let err = eval(&op, &doc! { "d": "2014-03-16" }).unwrap_err();
        assert_eq!(err.code(), Some(codes::DATE_TYPE));
    }

    #[test]
    fn date_argument_must_be_string() {
        let err = build("$year", OperatorKind::Date(DateComponent::Year), Bson::Int32(1))
            .unwrap_err();
        assert_eq!(err.code(), Some(codes::BAD_ARITY));
    }

    #[test]
    fn cond_array_form() {
        let op = build(
            "$cond",
            OperatorKind::Cond,
            bson::bson!([{ "$gte": ["$qty", 250] }, 30, 20]),
        )
        .unwrap();
        assert_eq!(op.fields(), vec!["qty".to_string()]);
        assert_eq!(eval(&op, &doc! { "qty": 300 }).unwrap(), Some(Bson::Int32(30)));
        assert_eq!(eval(&op, &doc! { "qty": 100 }).unwrap(), Some(Bson::Int32(20)));
        assert_eq!(eval(&op, &doc! {}).unwrap(), Some(Bson::Int32(20)));
    }

    #[test]
    fn cond_document_form_with_field_condition() {
        let op = build(
            "$cond",
            OperatorKind::Cond,
            bson::bson!({ "if": "$flag", "then": "$a", "else": "none" }),
        )
        .unwrap();
        assert_eq!(eval(&op, &doc! { "flag": true, "a": 1 }).unwrap(), Some(Bson::Int32(1)));
        assert_eq!(eval(&op, &doc! { "flag": 0, "a": 1 }).unwrap(), Some(Bson::String("none".into())));
        assert_eq!(eval(&op, &doc! { "a": 1 }).unwrap(), Some(Bson::String("none".into())));
    }

    #[test]
    fn cond_argument_errors() {
        let cases = [
            (bson::bson!({ "then": 1, "else": 2 }), codes::COND_MISSING_IF),
            (bson::bson!({ "if": true, "else": 2 }), codes::COND_MISSING_THEN),
            (bson::bson!({ "if": true, "then": 1 }), codes::COND_MISSING_ELSE),
            (bson::bson!({ "if": true, "then": 1, "else": 2, "x": 3 }), codes::COND_UNKNOWN_ARG),
            (bson::bson!([true, 1]), codes::BAD_ARITY),
            (bson::bson!([{ "$add": [1, 2] }, 1, 2]), codes::INVALID_OPERATOR),
        ];
        for (arg, code) in cases {
            let err = build("$cond", OperatorKind::Cond, arg).unwrap_err();
            assert_eq!(err.code(), Some(code), "{err}");
        }
    }

    #[test]
    fn compare_op_null_ordering() {
        assert!(CompareOp::Lt.holds(&Bson::Null, &Bson::Int32(1)));
        assert!(CompareOp::Eq.holds(&Bson::Null, &Bson::Null));
        assert!(CompareOp::Gte.holds(&Bson::Int64(5), &Bson::Double(5.0)));
        assert!(CompareOp::Ne.holds(&Bson::String("a".into()), &Bson::Int32(1)));
    }
}
