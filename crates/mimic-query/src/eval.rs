use std::cmp::Ordering;

use bson::{Bson, Document};

use crate::expression::Expression;
use crate::path;

/// Evaluate whether a document matches the given expression.
pub fn matches(doc: &Document, expr: &Expression) -> bool {
    match expr {
        Expression::And(children) => children.iter().all(|c| matches(doc, c)),
        Expression::Or(children) => children.iter().any(|c| matches(doc, c)),
        Expression::Eq(field, val) => eq_matches(path::get(doc, field), val),
        Expression::Ne(field, val) => !eq_matches(path::get(doc, field), val),
        Expression::Gt(field, val)
        | Expression::Gte(field, val)
        | Expression::Lt(field, val)
        | Expression::Lte(field, val) => {
            let predicate: fn(Ordering) -> bool = match expr {
                Expression::Gt(..) => |o| o == Ordering::Greater,
                Expression::Gte(..) => |o| o != Ordering::Less,
                Expression::Lt(..) => |o| o == Ordering::Less,
                _ => |o| o != Ordering::Greater,
            };
            match path::get(doc, field) {
                Some(Bson::Array(arr)) => arr
                    .iter()
                    .any(|elem| value_cmp(elem, val).is_some_and(predicate)),
                Some(v) => value_cmp(v, val).is_some_and(predicate),
                None => false,
            }
        }
        Expression::Regex(field, re) => match path::get(doc, field) {
            Some(Bson::String(s)) => re.is_match(s),
            Some(Bson::Array(arr)) => arr
                .iter()
                .any(|elem| matches!(elem, Bson::String(s) if re.is_match(s))),
            _ => false,
        },
        Expression::Exists(field, expected) => {
            // $exists checks physical presence; a null value counts as "exists"
            *expected == path::contains(doc, field)
        }
    }
}

fn eq_matches(stored: Option<&Bson>, query_val: &Bson) -> bool {
    // $eq: null matches both missing fields and explicit null values
    if matches!(query_val, Bson::Null) {
        return matches!(stored, None | Some(Bson::Null));
    }
    match stored {
        Some(whole @ Bson::Array(arr)) => {
            value_eq(whole, query_val) || arr.iter().any(|elem| value_eq(elem, query_val))
        }
        Some(v) => value_eq(v, query_val),
        None => false,
    }
}

/// Equality between a stored value and a query value. Numbers compare
/// across Int32/Int64/Double; everything else compares structurally.
pub fn value_eq(stored: &Bson, query_val: &Bson) -> bool {
    match (as_f64(stored), as_f64(query_val)) {
        (Some(a), Some(b)) => a == b,
        _ => match (stored, query_val) {
            (Bson::DateTime(a), Bson::DateTime(b)) => a.timestamp_millis() == b.timestamp_millis(),
            (Bson::Array(a), Bson::Array(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| value_eq(x, y))
            }
            (Bson::Document(a), Bson::Document(b)) => {
                a.len() == b.len()
                    && a.iter()
                        .zip(b.iter())
                        .all(|((ka, va), (kb, vb))| ka == kb && value_eq(va, vb))
            }
            _ => stored == query_val,
        },
    }
}

/// Ordering between a stored value and a query value of a comparable
/// type. Incompatible types yield `None` (silently excluded).
pub fn value_cmp(stored: &Bson, query_val: &Bson) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (as_f64(stored), as_f64(query_val)) {
        return a.partial_cmp(&b);
    }
    match (stored, query_val) {
        (Bson::String(a), Bson::String(b)) => Some(a.cmp(b)),
        (Bson::DateTime(a), Bson::DateTime(b)) => {
            Some(a.timestamp_millis().cmp(&b.timestamp_millis()))
        }
        (Bson::Boolean(a), Bson::Boolean(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(v) => Some(*v as f64),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}
