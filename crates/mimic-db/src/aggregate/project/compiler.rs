//! Projection compiler.
//!
//! Walks a `$project` specification once and produces the fetch mask sent
//! to storage plus the operators keyed by the source fields they read.

use std::collections::{HashMap, HashSet};

use bson::{Bson, Document};
use mimic_query::path;
use mimic_store::Store;

use super::operator::{Operator, invalid_operator};
use super::registry;
use crate::codes;
use crate::database::Database;
use crate::error::DbError;

/// Output of [`compile`], consumed by the stage executor.
#[derive(Debug)]
pub(crate) struct CompiledProjection {
    /// Find-style field selection for the fetch.
    pub(crate) mask: Document,
    pub(crate) include_id: bool,
    /// Copy fetched documents as-is (the mask already dropped the excluded paths).
    pub(crate) exclusion: bool,
    pub(crate) operators: Vec<Operator>,
    pub(crate) deps: DependencyMap,
    /// Top-level output fields in specification order.
    pub(crate) order: Vec<String>,
}

// ── Dependency map ──────────────────────────────────────────────

/// Source field -> operators reading it, in registration order. An operator
/// may sit under several fields but at most once under each.
#[derive(Debug, Default)]
pub(crate) struct DependencyMap {
    entries: Vec<(String, Vec<usize>)>,
    index: HashMap<String, usize>,
}

impl DependencyMap {
    fn register(&mut self, field: &str, operator: usize) {
        let slot = *self.index.entry(field.to_string()).or_insert_with(|| {
            self.entries.push((field.to_string(), Vec::new()));
            self.entries.len() - 1
        });
        let ids = &mut self.entries[slot].1;
        if !ids.contains(&operator) {
            ids.push(operator);
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, &[usize])> {
        self.entries.iter().map(|(f, ids)| (f.as_str(), ids.as_slice()))
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}

// ── Fetch mask ──────────────────────────────────────────────────

/// Starts as the specification (minus nulls) and is rewritten into a pure
/// field selection as renames and operators are discovered.
struct FetchMask {
    doc: Document,
    requested: HashSet<String>,
}

impl FetchMask {
    fn new(spec: &Document) -> Self {
        let doc = spec
            .iter()
            .filter(|(_, v)| !matches!(v, Bson::Null))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Self {
            doc,
            requested: HashSet::new(),
        }
    }

    /// Stop fetching an output-only key, unless a source field of the same
    /// name was requested.
    fn exclude_dest(&mut self, key: &str) {
        if !self.requested.contains(key) {
            self.doc.remove(key);
        }
    }

    /// Fetch the top-level segment of a source field.
    fn request(&mut self, field: &str) {
        let top = path::top_level(field);
        self.requested.insert(top.to_string());
        self.doc.insert(top, 1);
    }

    /// `_id` is always fetched. A mask left with no fields selects just
    /// `_id` rather than the whole document.
    fn finish(self, exclusion: bool, exclusions: &[String]) -> Document {
        if exclusion {
            return exclusions
                .iter()
                .map(|p| (p.clone(), Bson::Int32(0)))
                .collect();
        }
        let mut doc = self.doc;
        doc.remove("_id");
        if doc.is_empty() {
            doc.insert("_id", 1);
        }
        doc
    }
}

// ── Compiler ────────────────────────────────────────────────────

enum Target {
    /// Copy the source field into this destination.
    Rename(String),
    /// Feed an already-built operator.
    Operator(usize),
}

struct Compiler<'a, S: Store> {
    db: &'a Database<S>,
    collection: &'a str,
    mask: FetchMask,
    deps: DependencyMap,
    operators: Vec<Operator>,
    exclusions: Vec<String>,
    include_id: bool,
    /// A non-`_id` inclusion, rename or computed field was seen.
    included: bool,
}

/// Compile a `$project` specification. `db` and `collection` are only read
/// by operators that need storage access (`$filter`).
pub(crate) fn compile<S: Store>(
    db: &Database<S>,
    collection: &str,
    spec: &Document,
) -> Result<CompiledProjection, DbError> {
    let entries: Vec<(&String, &Bson)> = spec
        .iter()
        .filter(|(_, v)| !matches!(v, Bson::Null))
        .collect();
    if entries.is_empty() {
        return Err(DbError::command(
            codes::EMPTY_PROJECTION,
            "$project requires at least one output field",
        ));
    }

    let mut compiler = Compiler {
        db,
        collection,
        mask: FetchMask::new(spec),
        deps: DependencyMap::default(),
        operators: Vec::new(),
        exclusions: Vec::new(),
        include_id: true,
        included: false,
    };
    let mut order: Vec<String> = Vec::new();

    for (key, value) in entries {
        let top = path::top_level(key);
        if !order.iter().any(|k| k == top) {
            order.push(top.to_string());
        }
        if key == "_id" && is_exclusion(value) {
            compiler.include_id = false;
            continue;
        }
        compiler.create_mapping(key, value, "")?;
    }

    if let Some(path) = compiler.exclusions.first().filter(|_| compiler.included) {
        return Err(DbError::command(
            codes::MIXED_PROJECTION,
            format!("Cannot do exclusion on field {path} in inclusion projection"),
        ));
    }

    let exclusion =
        !compiler.included && (!compiler.exclusions.is_empty() || !compiler.include_id);
    let mask = compiler.mask.finish(exclusion, &compiler.exclusions);

    Ok(CompiledProjection {
        mask,
        include_id: compiler.include_id,
        exclusion,
        operators: compiler.operators,
        deps: compiler.deps,
        order,
    })
}

impl<S: Store> Compiler<'_, S> {
    /// Compile one specification entry. `namespace` is `""` at the top level
    /// and `"parent."` inside a sub-document projection.
    fn create_mapping(&mut self, key: &str, value: &Bson, namespace: &str) -> Result<(), DbError> {
        let dest = format!("{namespace}{key}");
        let top_level = namespace.is_empty();

        match value {
            // { dest: "$source" }
            Bson::String(s) if s.starts_with('$') => {
                self.note_inclusion(&dest);
                if top_level {
                    self.mask.exclude_dest(key);
                }
                self.reference(&s[1..], Target::Rename(dest));
            }
            // { dest: "source" }
            Bson::String(s) => {
                self.note_inclusion(&dest);
                if top_level {
                    self.mask.exclude_dest(key);
                }
                self.reference(s, Target::Rename(dest));
            }
            Bson::Document(fragment) => {
                if top_level {
                    self.mask.exclude_dest(key);
                }
                match registry::lookup(fragment) {
                    Some((keyword, kind)) => {
                        if fragment.len() > 1 {
                            return Err(DbError::command(
                                codes::EXPRESSION_FIELD_COUNT,
                                format!(
                                    "an expression specification must contain exactly one \
                                     field, the name of the expression. Found {} fields",
                                    fragment.len()
                                ),
                            ));
                        }
                        self.note_inclusion(&dest);
                        let arg = fragment.get(keyword).unwrap_or(&Bson::Null);
                        let op =
                            Operator::build(keyword, kind, dest, arg, self.db, self.collection)?;
                        let fields = op.fields();
                        let id = self.push(op);
                        for field in fields {
                            self.reference(&field, Target::Operator(id));
                        }
                    }
                    None => {
                        if let Some(k) = fragment.keys().find(|k| k.starts_with('$')) {
                            return Err(invalid_operator(k));
                        }
                        let nested = format!("{dest}.");
                        for (k, v) in fragment {
                            if !matches!(v, Bson::Null) {
                                self.create_mapping(k, v, &nested)?;
                            }
                        }
                    }
                }
            }
            v if is_exclusion(v) => self.exclusions.push(dest),
            // { dest: 1 }
            _ => {
                self.note_inclusion(&dest);
                if top_level {
                    let id = self.push(Operator::include(path::top_level(key)));
                    self.deps.register(key, id);
                } else {
                    let id = self.push(Operator::rename(dest.clone()));
                    self.deps.register(&dest, id);
                    self.mask.request(&dest);
                }
            }
        }
        Ok(())
    }

    /// Register a source field read, requesting it from storage.
    fn reference(&mut self, field: &str, target: Target) {
        let id = match target {
            Target::Rename(dest) => self.push(Operator::rename(dest)),
            Target::Operator(id) => id,
        };
        self.deps.register(field, id);
        self.mask.request(field);
    }

    fn push(&mut self, op: Operator) -> usize {
        self.operators.push(op);
        self.operators.len() - 1
    }

    fn note_inclusion(&mut self, dest: &str) {
        if dest != "_id" {
            self.included = true;
        }
    }
}

pub(crate) fn is_exclusion(value: &Bson) -> bool {
    match value {
        Bson::Boolean(b) => !b,
        Bson::Int32(v) => *v == 0,
        Bson::Int64(v) => *v == 0,
        Bson::Double(v) => *v == 0.0,
        _ => false,
    }
}
