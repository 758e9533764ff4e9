use bson::Document;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FindOptions {
    /// Find-style field selection, e.g. `{ "name": 1, "_id": 0 }`.
    pub projection: Option<Document>,
}
