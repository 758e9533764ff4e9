use std::fmt;

#[derive(Debug)]
pub enum StoreError {
    CollectionNotFound(String),
    Storage(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::CollectionNotFound(name) => write!(f, "collection not found: {name}"),
            StoreError::Storage(msg) => write!(f, "storage error: {msg}"),
        }
    }
}

impl std::error::Error for StoreError {}
