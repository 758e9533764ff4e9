//! Record encoding: every stored record is one BSON document.

use bson::{Document, RawDocumentBuf};

use crate::error::DbError;

pub(crate) fn encode(doc: &Document) -> Result<Vec<u8>, DbError> {
    Ok(RawDocumentBuf::try_from(doc)?.into_bytes())
}

pub(crate) fn decode(bytes: &[u8]) -> Result<Document, DbError> {
    Ok(bson::deserialize_from_slice(bytes)?)
}
