//! Aggregation pipeline driver.
//!
//! A pipeline runs against a scratch copy of the source collection. Each
//! stage consumes the scratch contents and replaces them with its output,
//! so stages compose as snapshot-to-snapshot transforms.

pub(crate) mod project;

use bson::{Bson, Document};
use mimic_query::FindOptions;
use mimic_store::Store;
use tracing::debug;

use crate::codes;
use crate::database::Database;
use crate::error::DbError;

pub(crate) fn run<S: Store>(
    db: &Database<S>,
    collection: &str,
    pipeline: &[Document],
) -> Result<Vec<Document>, DbError> {
    let scratch = db.scratch(collection)?;

    for (index, stage) in pipeline.iter().enumerate() {
        let (name, arg) = match stage.iter().next() {
            Some(entry) if stage.len() == 1 => entry,
            _ => {
                return Err(DbError::command(
                    codes::STAGE_FIELD_COUNT,
                    "A pipeline stage specification object must contain exactly one field.",
                ));
            }
        };
        debug!(collection, index, stage = %name, "running pipeline stage");

        match name.as_str() {
            "$project" => {
                let spec = match arg {
                    Bson::Document(spec) => spec,
                    _ => {
                        return Err(DbError::command(
                            codes::PROJECT_NOT_OBJECT,
                            "$project specification must be an object",
                        ));
                    }
                };
                project::apply(db, scratch.name(), spec)?;
            }
            other => {
                return Err(DbError::command(
                    codes::UNKNOWN_STAGE,
                    format!("Unrecognized pipeline stage name: '{other}'"),
                ));
            }
        }
    }

    db.find(scratch.name(), Document::new(), FindOptions::default())
}
