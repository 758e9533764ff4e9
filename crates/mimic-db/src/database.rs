use std::sync::atomic::{AtomicU64, Ordering};

use bson::oid::ObjectId;
use bson::{Bson, Document};
use mimic_query::{FieldProjection, FindOptions, matches, parse_filter, parse_mutation};
use mimic_store::{Records, Store};
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use crate::aggregate;
use crate::encoding::{decode, encode};
use crate::error::DbError;
use crate::result::{InsertResult, UpdateResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Name prefix of the temporary collections used by `$filter` and
    /// `aggregate`.
    pub scratch_prefix: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            scratch_prefix: "_scratch".into(),
        }
    }
}

pub struct Database<S: Store> {
    store: S,
    config: DatabaseConfig,
    scratch_seq: AtomicU64,
}

impl<S: Store> Database<S> {
    pub fn open(store: S, config: DatabaseConfig) -> Self {
        Self {
            store,
            config,
            scratch_seq: AtomicU64::new(0),
        }
    }

    // ── Collections ─────────────────────────────────────────────

    pub fn create_collection(&self, name: &str) -> Result<(), DbError> {
        Ok(self.store.create_collection(name)?)
    }

    pub fn drop_collection(&self, name: &str) -> Result<(), DbError> {
        Ok(self.store.drop_collection(name)?)
    }

    pub fn collection_names(&self) -> Vec<String> {
        self.store.collection_names()
    }

    /// Copy every document of `source` into `target`, replacing its contents.
    pub fn clone_collection(&self, source: &str, target: &str) -> Result<(), DbError> {
        let records = self.store.snapshot(source)?;
        self.store.create_collection(target)?;
        self.store.replace(target, records)?;
        Ok(())
    }

    /// Create a temporary copy of `source` that is dropped with the guard.
    /// A missing source yields an empty scratch collection.
    pub fn scratch(&self, source: &str) -> Result<ScratchCollection<'_, S>, DbError> {
        let seq = self.scratch_seq.fetch_add(1, Ordering::Relaxed);
        let name = format!("{}.{}.{}", self.config.scratch_prefix, source, seq);
        self.store.create_collection(&name)?;
        let guard = ScratchCollection { db: self, name };
        if self.store.has_collection(source) {
            self.store.replace(&guard.name, self.store.snapshot(source)?)?;
        }
        trace!(source, scratch = %guard.name, "scratch collection created");
        Ok(guard)
    }

    // ── Writes ──────────────────────────────────────────────────

    pub fn insert_one(&self, collection: &str, doc: Document) -> Result<InsertResult, DbError> {
        self.insert_many(collection, vec![doc])
    }

    /// Insert documents, creating the collection if needed. Documents
    /// without an `_id` get a fresh `ObjectId` placed first.
    pub fn insert_many(
        &self,
        collection: &str,
        docs: Vec<Document>,
    ) -> Result<InsertResult, DbError> {
        self.store.create_collection(collection)?;
        let mut ids = Vec::with_capacity(docs.len());
        let mut records = Vec::with_capacity(docs.len());
        for doc in docs {
            let doc = with_id(doc);
            ids.push(doc.get("_id").cloned().unwrap_or(Bson::Null));
            records.push(encode(&doc)?);
        }
        self.store.append(collection, records)?;
        Ok(InsertResult { ids })
    }

    /// Apply an update document to every document matching `filter`.
    pub fn update_many(
        &self,
        collection: &str,
        filter: Document,
        update: Document,
    ) -> Result<UpdateResult, DbError> {
        let mutation = parse_mutation(&update)?;
        let expr = if filter.is_empty() {
            None
        } else {
            Some(parse_filter(&filter)?)
        };
        if !self.store.has_collection(collection) {
            return Ok(UpdateResult::default());
        }

        let mut result = UpdateResult::default();
        let mut records = Records::new();
        for bytes in self.store.snapshot(collection)? {
            let mut doc = decode(&bytes)?;
            if expr.as_ref().is_some_and(|e| !matches(&doc, e)) {
                records.push_back(bytes);
                continue;
            }
            result.matched += 1;
            if mutation.apply(&mut doc)? {
                result.modified += 1;
                records.push_back(encode(&doc)?);
            } else {
                records.push_back(bytes);
            }
        }

        if result.modified > 0 {
            self.store.replace(collection, records)?;
        }
        Ok(result)
    }

    /// Swap the whole content of a collection, creating it if needed.
    pub fn replace_all(&self, collection: &str, docs: Vec<Document>) -> Result<(), DbError> {
        let records = docs
            .iter()
            .map(encode)
            .collect::<Result<Records, _>>()?;
        self.store.create_collection(collection)?;
        self.store.replace(collection, records)?;
        Ok(())
    }

    // ── Reads ───────────────────────────────────────────────────

    /// Documents matching `filter`, in insertion order. A missing collection
    /// reads as empty.
    pub fn find(
        &self,
        collection: &str,
        filter: Document,
        options: FindOptions,
    ) -> Result<Vec<Document>, DbError> {
        let expr = if filter.is_empty() {
            None
        } else {
            Some(parse_filter(&filter)?)
        };
        let projection = match &options.projection {
            Some(spec) => FieldProjection::parse(spec)?,
            None => FieldProjection::all(),
        };
        if !self.store.has_collection(collection) {
            return Ok(Vec::new());
        }

        let mut out = Vec::new();
        for bytes in self.store.snapshot(collection)? {
            let doc = decode(&bytes)?;
            if expr.as_ref().is_some_and(|e| !matches(&doc, e)) {
                continue;
            }
            if projection.is_all() {
                out.push(doc);
            } else {
                out.push(projection.apply(&doc));
            }
        }
        Ok(out)
    }

    // ── Aggregation ─────────────────────────────────────────────

    /// Run a `$project` stage in place on `collection`.
    pub fn project(&self, collection: &str, spec: &Document) -> Result<(), DbError> {
        aggregate::project::apply(self, collection, spec)
    }

    /// Run a pipeline over a copy of `collection` and return the result.
    /// The source collection is left untouched.
    pub fn aggregate(
        &self,
        collection: &str,
        pipeline: &[Document],
    ) -> Result<Vec<Document>, DbError> {
        aggregate::run(self, collection, pipeline)
    }
}

fn with_id(doc: Document) -> Document {
    if doc.contains_key("_id") {
        return doc;
    }
    let mut out = Document::new();
    out.insert("_id", ObjectId::new());
    for (k, v) in doc {
        out.insert(k, v);
    }
    out
}

/// A temporary collection, dropped when the guard goes out of scope.
pub struct ScratchCollection<'a, S: Store> {
    db: &'a Database<S>,
    name: String,
}

impl<S: Store> ScratchCollection<'_, S> {
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl<S: Store> Drop for ScratchCollection<'_, S> {
    fn drop(&mut self) {
        match self.db.store.drop_collection(&self.name) {
            Ok(()) => trace!(scratch = %self.name, "scratch collection dropped"),
            Err(e) => warn!(scratch = %self.name, error = %e, "failed to drop scratch collection"),
        }
    }
}
