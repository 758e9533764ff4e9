//! The `$project` stage: compile, fetch, evaluate, replace.

mod compiler;
mod date;
mod filter;
mod operator;
mod registry;

use bson::Document;
use mimic_query::{FindOptions, path};
use mimic_store::Store;
use tracing::debug;

use self::compiler::CompiledProjection;
use crate::database::Database;
use crate::error::DbError;

/// Apply a `$project` specification to `collection`, replacing its
/// contents with the projected documents. Any error leaves the collection
/// untouched.
pub(crate) fn apply<S: Store>(
    db: &Database<S>,
    collection: &str,
    spec: &Document,
) -> Result<(), DbError> {
    debug!(collection, spec = %spec, "$project stage");

    let compiled = compiler::compile(db, collection, spec)?;
    debug!(
        collection,
        mask = %compiled.mask,
        operators = compiled.operators.len(),
        source_fields = compiled.deps.len(),
        exclusion = compiled.exclusion,
        "$project compiled"
    );

    let fetched = db.find(
        collection,
        Document::new(),
        FindOptions {
            projection: Some(compiled.mask.clone()),
        },
    )?;
    let output = fetched
        .iter()
        .enumerate()
        .map(|(position, doc)| evaluate(&compiled, position, doc))
        .collect::<Result<Vec<_>, _>>()?;

    let count = output.len();
    db.replace_all(collection, output)?;
    debug!(collection, documents = count, "$project done");
    Ok(())
}

/// Project one fetched document.
///
/// Operators whose source field is present run first, once each, with that
/// field as the matched key. Every operator that did not run then runs with
/// no matched key, so fallbacks like `$ifNull` still fill their destination.
fn evaluate(
    compiled: &CompiledProjection,
    position: usize,
    source: &Document,
) -> Result<Document, DbError> {
    if compiled.exclusion {
        let mut out = source.clone();
        if !compiled.include_id {
            out.remove("_id");
        }
        return Ok(out);
    }

    let mut scratch = Document::new();
    let mut ran = vec![false; compiled.operators.len()];

    for (field, ids) in compiled.deps.iter() {
        if !path::contains(source, field) {
            continue;
        }
        for &id in ids {
            if !ran[id] {
                compiled.operators[id].evaluate(source, position, Some(field), &mut scratch)?;
                ran[id] = true;
            }
        }
    }
    for (id, op) in compiled.operators.iter().enumerate() {
        if !ran[id] {
            op.evaluate(source, position, None, &mut scratch)?;
        }
    }

    // _id first, then specification order
    let mut out = Document::new();
    if compiled.include_id {
        if let Some(id) = scratch.remove("_id").or_else(|| source.get("_id").cloned()) {
            out.insert("_id", id);
        }
    }
    for key in &compiled.order {
        if key == "_id" {
            continue;
        }
        if let Some(value) = scratch.remove(key) {
            out.insert(key.clone(), value);
        }
    }
    for (key, value) in scratch {
        if key != "_id" {
            out.insert(key, value);
        }
    }
    Ok(out)
}
