//! # Storage Backends
//!
//! Raw keyed document storage, one namespace per collection. Query
//! semantics live in [`Database`](super::Database); backends only load,
//! store and remove whole documents.

use std::collections::HashMap;
use std::path::Path;
use std::sync::RwLock;

use serde_json::Value;

use super::errors::{StoreError, StoreResult};

/// Primitive operations every backend provides
pub trait Backend: Send + Sync {
    /// Every document of a collection
    fn scan(&self, collection: &str) -> StoreResult<Vec<Value>>;

    /// One document by id
    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;

    /// Insert or overwrite a document
    fn put(&self, collection: &str, id: &str, doc: &Value) -> StoreResult<()>;

    /// Remove a document, returning it if it existed
    fn remove(&self, collection: &str, id: &str) -> StoreResult<Option<Value>>;
}

fn id_of(doc: &Value) -> Option<&str> {
    doc.get("_id").and_then(Value::as_str)
}

/// Process-local backend; documents keep insertion order
#[derive(Default)]
pub struct MemoryBackend {
    data: RwLock<HashMap<String, Vec<Value>>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn scan(&self, collection: &str) -> StoreResult<Vec<Value>> {
        let data = self.data.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(data.get(collection).cloned().unwrap_or_default())
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let data = self.data.read().map_err(|_| StoreError::LockPoisoned)?;
        Ok(data
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| id_of(d) == Some(id)))
            .cloned())
    }

    fn put(&self, collection: &str, id: &str, doc: &Value) -> StoreResult<()> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        let docs = data.entry(collection.to_string()).or_default();

        match docs.iter_mut().find(|d| id_of(d) == Some(id)) {
            Some(existing) => *existing = doc.clone(),
            None => docs.push(doc.clone()),
        }
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        let mut data = self.data.write().map_err(|_| StoreError::LockPoisoned)?;
        let Some(docs) = data.get_mut(collection) else {
            return Ok(None);
        };

        Ok(docs
            .iter()
            .position(|d| id_of(d) == Some(id))
            .map(|idx| docs.remove(idx)))
    }
}

/// Persistent backend on sled; one tree per collection, JSON values
#[derive(Clone)]
pub struct SledBackend {
    db: sled::Db,
}

impl SledBackend {
    /// Open or create the database directory
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db = sled::open(path)?;
        Ok(Self { db })
    }

    fn tree(&self, collection: &str) -> StoreResult<sled::Tree> {
        Ok(self.db.open_tree(collection)?)
    }

    /// Flush dirty pages to disk
    pub fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

impl Backend for SledBackend {
    fn scan(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.tree(collection)?
            .iter()
            .values()
            .map(|bytes| Ok(serde_json::from_slice(&bytes?)?))
            .collect()
    }

    fn get(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        match self.tree(collection)?.get(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn put(&self, collection: &str, id: &str, doc: &Value) -> StoreResult<()> {
        let bytes = serde_json::to_vec(doc)?;
        self.tree(collection)?.insert(id.as_bytes(), bytes)?;
        Ok(())
    }

    fn remove(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        match self.tree(collection)?.remove(id.as_bytes())? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}
