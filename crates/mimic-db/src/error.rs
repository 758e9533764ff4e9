use std::fmt;

use mimic_query::{FilterParseError, MutationError, ParseError, ProjectionParseError};
use mimic_store::StoreError;

#[derive(Debug)]
pub enum DbError {
    Store(StoreError),
    CollectionNotFound(String),
    InvalidQuery(String),
    Serialization(String),
    /// A failure carrying a MongoDB error code (see [`crate::codes`]).
    Command { code: i32, message: String },
}

impl DbError {
    pub(crate) fn command(code: i32, message: impl Into<String>) -> Self {
        DbError::Command {
            code,
            message: message.into(),
        }
    }

    /// Numeric MongoDB error code, if this failure has one.
    pub fn code(&self) -> Option<i32> {
        match self {
            DbError::Command { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl fmt::Display for DbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DbError::Store(e) => write!(f, "store error: {e}"),
            DbError::CollectionNotFound(name) => write!(f, "collection not found: {name}"),
            DbError::InvalidQuery(msg) => write!(f, "invalid query: {msg}"),
            DbError::Serialization(msg) => write!(f, "serialization error: {msg}"),
            DbError::Command { code, message } => write!(f, "command failed ({code}): {message}"),
        }
    }
}

impl std::error::Error for DbError {}

impl From<StoreError> for DbError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::CollectionNotFound(name) => DbError::CollectionNotFound(name),
            other => DbError::Store(other),
        }
    }
}

impl From<bson::error::Error> for DbError {
    fn from(e: bson::error::Error) -> Self {
        DbError::Serialization(e.to_string())
    }
}

impl From<FilterParseError> for DbError {
    fn from(e: FilterParseError) -> Self {
        DbError::InvalidQuery(e.to_string())
    }
}

impl From<ParseError> for DbError {
    fn from(e: ParseError) -> Self {
        DbError::InvalidQuery(e.to_string())
    }
}

impl From<MutationError> for DbError {
    fn from(e: MutationError) -> Self {
        DbError::InvalidQuery(e.to_string())
    }
}

impl From<ProjectionParseError> for DbError {
    fn from(e: ProjectionParseError) -> Self {
        DbError::InvalidQuery(e.to_string())
    }
}
