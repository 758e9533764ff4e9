use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use arc_swap::ArcSwap;

use crate::error::StoreError;
use crate::store::{Records, Store};

type Slot = Arc<ArcSwap<Records>>;

pub struct MemoryStore {
    collections: RwLock<HashMap<String, Slot>>,
    write_lock: Mutex<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            collections: RwLock::new(HashMap::new()),
            write_lock: Mutex::new(()),
        }
    }

    fn slot(&self, name: &str) -> Result<Slot, StoreError> {
        let collections = self
            .collections
            .read()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        collections
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::CollectionNotFound(name.to_string()))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn create_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(ArcSwap::from_pointee(Records::new())));
        Ok(())
    }

    fn drop_collection(&self, name: &str) -> Result<(), StoreError> {
        let mut collections = self
            .collections
            .write()
            .map_err(|e| StoreError::Storage(format!("catalog lock poisoned: {e}")))?;
        collections.remove(name);
        Ok(())
    }

    fn has_collection(&self, name: &str) -> bool {
        self.collections
            .read()
            .map(|c| c.contains_key(name))
            .unwrap_or(false)
    }

    fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = match self.collections.read() {
            Ok(c) => c.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names.sort();
        names
    }

    fn snapshot(&self, name: &str) -> Result<Records, StoreError> {
        Ok((**self.slot(name)?.load()).clone())
    }

    fn append(&self, name: &str, records: Vec<Vec<u8>>) -> Result<(), StoreError> {
        let slot = self.slot(name)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        let mut data = (**slot.load()).clone();
        data.extend(records);
        slot.store(Arc::new(data));
        Ok(())
    }

    fn replace(&self, name: &str, records: Records) -> Result<(), StoreError> {
        let slot = self.slot(name)?;
        let _guard = self
            .write_lock
            .lock()
            .map_err(|e| StoreError::Storage(format!("write lock poisoned: {e}")))?;
        slot.store(Arc::new(records));
        Ok(())
    }
}
