mod aggregate;
pub mod codes;
mod database;
mod encoding;
mod error;
mod result;

pub use bson::{Bson, Document};
pub use database::{Database, DatabaseConfig, ScratchCollection};
pub use error::DbError;
pub use result::{InsertResult, UpdateResult};
