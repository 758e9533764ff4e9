use imbl::Vector;

use crate::error::StoreError;

/// Serialized documents of one collection, in insertion order.
///
/// Cloning is O(1): snapshots share structure with the live collection.
pub type Records = Vector<Vec<u8>>;

pub trait Store {
    fn create_collection(&self, name: &str) -> Result<(), StoreError>;
    /// Dropping a collection that does not exist is a no-op.
    fn drop_collection(&self, name: &str) -> Result<(), StoreError>;
    fn has_collection(&self, name: &str) -> bool;
    /// Names of all live collections, sorted.
    fn collection_names(&self) -> Vec<String>;

    // Reads
    fn snapshot(&self, name: &str) -> Result<Records, StoreError>;

    // Writes
    fn append(&self, name: &str, records: Vec<Vec<u8>>) -> Result<(), StoreError>;
    /// Swap the whole content of a collection. Readers holding an older
    /// snapshot keep seeing it.
    fn replace(&self, name: &str, records: Records) -> Result<(), StoreError>;
}
