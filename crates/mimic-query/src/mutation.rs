use bson::{Bson, Document, doc};

use crate::eval::{matches, value_eq};
use crate::expression::Expression;
use crate::parse_filter::parse_filter;
use crate::path;

/// Field name used to wrap a bare array element so operator conditions like
/// `{ "$gte": 6 }` can be evaluated as an ordinary filter.
const ELEMENT: &str = "elem";

/// What happens to one field path.
#[derive(Debug, Clone)]
pub enum MutationOp {
    /// Write the value, creating missing parents.
    Set(Bson),
    Unset,
    /// Append to an array, starting one when the field is missing.
    Push(Bson),
    /// Remove every array element matching the condition.
    Pull(PullCondition),
}

/// Element test used by `$pull`.
#[derive(Debug, Clone)]
pub enum PullCondition {
    /// Element equals the value.
    Equals(Bson),
    /// Document elements matching a field query, e.g. `{ "price": { "$gt": 5 } }`.
    Query(Expression),
    /// Element value tested by operators, e.g. `{ "$gte": 6 }`.
    Value(Expression),
    All(Vec<PullCondition>),
    Any(Vec<PullCondition>),
}

impl PullCondition {
    pub fn matches(&self, elem: &Bson) -> bool {
        match self {
            PullCondition::Equals(v) => value_eq(elem, v),
            PullCondition::Query(expr) => {
                std::matches!(elem, Bson::Document(d) if matches(d, expr))
            }
            PullCondition::Value(expr) => matches(&doc! { ELEMENT: elem.clone() }, expr),
            PullCondition::All(children) => children.iter().all(|c| c.matches(elem)),
            PullCondition::Any(children) => children.iter().any(|c| c.matches(elem)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FieldMutation {
    pub field: String,
    pub op: MutationOp,
}

/// A parsed update document, applied field by field in document order.
#[derive(Debug, Clone)]
pub struct Mutation {
    pub ops: Vec<FieldMutation>,
}

/// Failure applying a mutation to a particular document.
#[derive(Debug, Clone, PartialEq)]
pub struct MutationError(pub String);

impl std::fmt::Display for MutationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "mutation error: {}", self.0)
    }
}

impl std::error::Error for MutationError {}

impl Mutation {
    /// Apply this mutation in place. Returns `Ok(false)` if nothing changed.
    pub fn apply(&self, doc: &mut Document) -> Result<bool, MutationError> {
        let mut changed = false;
        for FieldMutation { field, op } in &self.ops {
            match op {
                MutationOp::Set(val) => {
                    if path::get(doc, field) != Some(val) {
                        path::set(doc, field, val.clone());
                        changed = true;
                    }
                }
                MutationOp::Unset => {
                    changed |= path::remove(doc, field).is_some();
                }
                MutationOp::Push(val) => match path::get_mut(doc, field) {
                    Some(Bson::Array(arr)) => {
                        arr.push(val.clone());
                        changed = true;
                    }
                    Some(_) => {
                        return Err(MutationError(format!("$push target '{field}' is not an array")));
                    }
                    None => {
                        path::set(doc, field, Bson::Array(vec![val.clone()]));
                        changed = true;
                    }
                },
                MutationOp::Pull(cond) => match path::get_mut(doc, field) {
                    Some(Bson::Array(arr)) => {
                        let before = arr.len();
                        arr.retain(|elem| !cond.matches(elem));
                        changed |= arr.len() != before;
                    }
                    // Nothing to pull from
                    Some(Bson::Null) | None => {}
                    Some(_) => {
                        return Err(MutationError(format!("$pull target '{field}' is not an array")));
                    }
                },
            }
        }

        Ok(changed)
    }
}

/// Parse an update document.
///
/// Operator keys (`$set`, `$unset`, `$push`, `$pull`) map field paths to
/// operands; a bare field is shorthand for `$set`. `_id` keys are ignored,
/// but an operator targeting `_id` is rejected.
pub fn parse_mutation(doc: &Document) -> Result<Mutation, ParseError> {
    let mut ops = Vec::new();

    for (key, value) in doc.iter().filter(|(k, _)| k.as_str() != "_id") {
        match key.as_str() {
            "$set" => field_ops(key, value, &mut ops, |v| Ok(MutationOp::Set(v.clone())))?,
            "$unset" => field_ops(key, value, &mut ops, |_| Ok(MutationOp::Unset))?,
            "$push" => field_ops(key, value, &mut ops, |v| Ok(MutationOp::Push(v.clone())))?,
            "$pull" => field_ops(key, value, &mut ops, |v| {
                parse_pull_condition(v).map(MutationOp::Pull)
            })?,
            op if op.starts_with('$') => {
                return Err(ParseError(format!("unsupported update operator {op}")));
            }
            field => ops.push(FieldMutation {
                field: field.to_string(),
                op: MutationOp::Set(value.clone()),
            }),
        }
    }

    if ops.is_empty() {
        return Err(ParseError("update document has no changes".into()));
    }
    if let Some(fm) = ops.iter().find(|fm| path::top_level(&fm.field) == "_id") {
        return Err(ParseError(format!("'{}' would modify the immutable _id", fm.field)));
    }
    Ok(Mutation { ops })
}

/// Parse error for update documents.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError(pub String);

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "update parse error: {}", self.0)
    }
}

impl std::error::Error for ParseError {}

// ── Parsing helpers ─────────────────────────────────────────────

/// Expand `{ op: { field: operand, ... } }` into one mutation per field.
/// `$unset` operands are ignored (`{ "field": "" }` by convention).
fn field_ops(
    op: &str,
    value: &Bson,
    ops: &mut Vec<FieldMutation>,
    make: impl Fn(&Bson) -> Result<MutationOp, ParseError>,
) -> Result<(), ParseError> {
    let Bson::Document(fields) = value else {
        return Err(ParseError(format!("{op} takes a document of fields")));
    };
    for (field, operand) in fields {
        ops.push(FieldMutation {
            field: field.clone(),
            op: make(operand)?,
        });
    }
    Ok(())
}

fn parse_pull_condition(value: &Bson) -> Result<PullCondition, ParseError> {
    let cond = match value {
        Bson::Document(d) => d,
        other => return Ok(PullCondition::Equals(other.clone())),
    };

    // An empty document removes every document element.
    if cond.is_empty() {
        return Ok(PullCondition::Query(Expression::And(Vec::new())));
    }

    if !cond.keys().all(|k| k.starts_with('$')) {
        let expr = parse_filter(cond).map_err(|e| ParseError(format!("$pull: {e}")))?;
        return Ok(PullCondition::Query(expr));
    }

    let mut parts = Vec::new();
    let mut value_ops = Document::new();
    for (key, val) in cond {
        match key.as_str() {
            "$and" | "$or" => {
                let items = match val {
                    Bson::Array(items) if !items.is_empty() => items,
                    _ => {
                        return Err(ParseError(format!("$pull: {key} needs a non-empty array")));
                    }
                };
                let children = items
                    .iter()
                    .map(parse_pull_condition)
                    .collect::<Result<Vec<_>, _>>()?;
                parts.push(if key == "$and" {
                    PullCondition::All(children)
                } else {
                    PullCondition::Any(children)
                });
            }
            _ => {
                value_ops.insert(key.clone(), val.clone());
            }
        }
    }

    if !value_ops.is_empty() {
        let expr = parse_filter(&doc! { ELEMENT: value_ops })
            .map_err(|e| ParseError(format!("$pull: {e}")))?;
        parts.push(PullCondition::Value(expr));
    }

    Ok(match parts.len() {
        1 => parts.remove(0),
        _ => PullCondition::All(parts),
    })
}
