//! `$filter`: array element selection.
//!
//! The element condition is rewritten into a `$pull` query over the input
//! field and applied to a scratch copy of the collection. What the pull
//! leaves behind are the rejected elements; the kept ones are the original
//! elements absent from the scratch array. Results are kept by document
//! position: the scratch copy, the pull and the stage fetch all preserve
//! insertion order.

use bson::{Bson, Document, doc};
use mimic_query::{FindOptions, path};
use mimic_store::Store;
use tracing::trace;

use super::operator::{CompareOp, arity, invalid_operator, type_name};
use crate::codes;
use crate::database::Database;
use crate::error::DbError;

const DEFAULT_ALIAS: &str = "this";

#[derive(Debug, Clone)]
pub(crate) struct ArrayFilter {
    input: String,
    /// Kept elements per document position; `None` keeps everything.
    survivors: Option<Vec<Vec<Bson>>>,
}

impl ArrayFilter {
    pub(crate) fn input(&self) -> &str {
        &self.input
    }

    /// `position` is the index of `source` in the collection being projected.
    pub(crate) fn evaluate(
        &self,
        source: &Document,
        position: usize,
    ) -> Result<Option<Bson>, DbError> {
        match path::get(source, &self.input) {
            None | Some(Bson::Null) => Ok(Some(Bson::Null)),
            Some(Bson::Array(arr)) => {
                let kept = match &self.survivors {
                    None => arr.clone(),
                    Some(survivors) => survivors.get(position).cloned().unwrap_or_default(),
                };
                Ok(Some(Bson::Array(kept)))
            }
            Some(other) => Err(not_an_array(other)),
        }
    }
}

pub(crate) fn build<S: Store>(
    db: &Database<S>,
    collection: &str,
    arg: &Bson,
) -> Result<ArrayFilter, DbError> {
    let spec = match arg {
        Bson::Document(spec) => spec,
        _ => {
            return Err(DbError::command(
                codes::FILTER_NOT_OBJECT,
                "$filter only supports an object as its argument",
            ));
        }
    };

    let mut input = None;
    let mut alias = DEFAULT_ALIAS;
    let mut cond = None;
    for (key, value) in spec {
        match key.as_str() {
            "input" => input = Some(value),
            "as" => match value {
                Bson::String(name) if !name.is_empty() => alias = name,
                _ => {
                    return Err(DbError::InvalidQuery(
                        "$filter 'as' must be a non-empty string".into(),
                    ));
                }
            },
            "cond" => cond = Some(value),
            other => {
                return Err(DbError::command(
                    codes::FILTER_UNKNOWN_ARG,
                    format!("Unrecognized parameter to $filter: {other}"),
                ));
            }
        }
    }

    let input = match input {
        Some(Bson::String(s)) if s.starts_with('$') => s[1..].to_string(),
        Some(other) => {
            return Err(DbError::command(
                codes::FILTER_INPUT_NOT_ARRAY,
                format!(
                    "input to $filter must be an array field reference, not {}",
                    type_name(Some(other))
                ),
            ));
        }
        None => {
            return Err(DbError::command(
                codes::FILTER_MISSING_INPUT,
                "Missing 'input' parameter to $filter",
            ));
        }
    };
    let cond = match cond {
        Some(Bson::Document(cond)) => cond,
        _ => {
            return Err(DbError::command(
                codes::FILTER_MISSING_COND,
                "Missing 'cond' parameter to $filter",
            ));
        }
    };

    let query = condition_query(alias, cond)?;
    if query.is_empty() {
        return Ok(ArrayFilter {
            input,
            survivors: None,
        });
    }

    let survivors = select(db, collection, &input, query)?;
    Ok(ArrayFilter {
        input,
        survivors: Some(survivors),
    })
}

/// Compute the kept elements of every document's input array, by position.
/// Documents without an array input get an empty entry.
fn select<S: Store>(
    db: &Database<S>,
    collection: &str,
    input: &str,
    query: Document,
) -> Result<Vec<Vec<Bson>>, DbError> {
    let mut mask = Document::new();
    mask.insert(path::top_level(input), 1);
    let originals = db.find(
        collection,
        Document::new(),
        FindOptions {
            projection: Some(mask.clone()),
        },
    )?;
    for doc in &originals {
        match path::get(doc, input) {
            None | Some(Bson::Null) | Some(Bson::Array(_)) => {}
            Some(other) => return Err(not_an_array(other)),
        }
    }

    // Elements matching the condition are pulled, the rest stay behind.
    let rejected: Vec<Option<Vec<Bson>>> = {
        let scratch = db.scratch(collection)?;
        let mut pull = Document::new();
        pull.insert(input, query);
        let result = db.update_many(scratch.name(), Document::new(), doc! { "$pull": pull })?;
        trace!(
            scratch = scratch.name(),
            modified = result.modified,
            "$filter pull applied"
        );
        db.find(
            scratch.name(),
            Document::new(),
            FindOptions {
                projection: Some(mask),
            },
        )?
        .into_iter()
        .map(|doc| match path::get(&doc, input) {
            Some(Bson::Array(arr)) => Some(arr.clone()),
            _ => None,
        })
        .collect()
    };

    let survivors = originals
        .iter()
        .enumerate()
        .map(|(position, doc)| match path::get(doc, input) {
            Some(Bson::Array(arr)) => {
                let dropped = rejected.get(position).and_then(Option::as_ref);
                arr.iter()
                    .filter(|elem| dropped.is_none_or(|d| !d.contains(elem)))
                    .cloned()
                    .collect()
            }
            _ => Vec::new(),
        })
        .collect();
    Ok(survivors)
}

/// Rewrite an element condition over `$$alias` into a `$pull` query.
/// An empty condition yields an empty query.
fn condition_query(alias: &str, cond: &Document) -> Result<Document, DbError> {
    let mut entries = cond.iter();
    let (op, arg) = match entries.next() {
        None => return Ok(Document::new()),
        Some(entry) if cond.len() == 1 => entry,
        Some(_) => {
            return Err(DbError::command(
                codes::EXPRESSION_FIELD_COUNT,
                format!(
                    "an expression specification must contain exactly one field, \
                     the name of the expression. Found {} fields",
                    cond.len()
                ),
            ));
        }
    };

    if op == "$and" || op == "$or" {
        let items = match arg {
            Bson::Array(items) if !items.is_empty() => items,
            _ => {
                return Err(DbError::command(
                    codes::BAD_ARITY,
                    format!("{op} in a $filter condition needs a non-empty array"),
                ));
            }
        };
        let mut children = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Bson::Document(child) if !child.is_empty() => {
                    children.push(Bson::Document(condition_query(alias, child)?));
                }
                _ => {
                    return Err(DbError::command(
                        codes::BAD_ARITY,
                        format!("{op} in a $filter condition takes condition documents"),
                    ));
                }
            }
        }
        let mut query = Document::new();
        query.insert(op.clone(), children);
        return Ok(query);
    }

    if CompareOp::parse(op).is_none() {
        return Err(invalid_operator(op));
    }
    let args = arity(op, arg, 2)?;
    let reference = match args[0] {
        Bson::String(s) => s.trim_start_matches('$'),
        other => {
            return Err(DbError::command(
                codes::UNDEFINED_VARIABLE,
                format!("$filter condition must reference $${alias}, found {other}"),
            ));
        }
    };
    let (variable, sub_path) = match reference.split_once('.') {
        Some((variable, rest)) => (variable, Some(rest)),
        None => (reference, None),
    };
    if variable != alias {
        return Err(DbError::command(
            codes::UNDEFINED_VARIABLE,
            format!("Use of undefined variable: {variable}"),
        ));
    }

    let mut test = Document::new();
    test.insert(op.clone(), args[1].clone());
    Ok(match sub_path {
        Some(field) => {
            let mut query = Document::new();
            query.insert(field, test);
            query
        }
        None => test,
    })
}

fn not_an_array(value: &Bson) -> DbError {
    DbError::command(
        codes::FILTER_INPUT_NOT_ARRAY,
        format!(
            "input to $filter must be an array not {}",
            type_name(Some(value))
        ),
    )
}
