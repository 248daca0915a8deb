//! # Document Store
//!
//! Collections of JSON documents with Mongo-like operations:
//! - `find` with filter, sort, projection and skip/limit
//! - `create`, `find_by_id_and_update`, `find_by_id_and_delete`
//! - unique indexes over one or more fields
//! - aggregation pipelines
//!
//! Every document carries an `_id` (UUID v4 string) and a version `__v`
//! that starts at 0 and is bumped on each update.
//!
//! Writes are serialized per database handle: the unique-index check and
//! the write it guards run under one lock.

mod aggregate;
mod backend;
mod errors;
mod filter;
pub mod geo;
mod query;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, RwLock};

use serde_json::{Map, Value};
use uuid::Uuid;

pub use aggregate::{Accumulator, GroupKey, Pipeline, Stage};
pub use backend::{Backend, MemoryBackend, SledBackend};
pub use errors::{StoreError, StoreResult};
pub use filter::{compare_json_values, lookup, FilterExpr, FilterOperator, FilterSet};
pub use query::{Projection, Query, SortKey};

/// Name of the id field
pub const ID_FIELD: &str = "_id";

/// Name of the version field
pub const VERSION_FIELD: &str = "__v";

/// A unique index over one or more fields of a collection
#[derive(Debug, Clone)]
struct UniqueIndex {
    name: String,
    fields: Vec<String>,
}

impl UniqueIndex {
    /// The indexed values of a document, or `None` if any is missing
    fn key(&self, doc: &Value) -> Option<Value> {
        let mut key = Map::new();
        for field in &self.fields {
            let value = lookup(doc, field)?;
            if value.is_null() {
                return None;
            }
            key.insert(field.clone(), value.clone());
        }
        Some(Value::Object(key))
    }

    fn describe(&self, key: &Value) -> String {
        match (self.fields.as_slice(), key) {
            ([single], Value::Object(map)) => map
                .get(single)
                .map(Value::to_string)
                .unwrap_or_default(),
            _ => key.to_string(),
        }
    }
}

/// Handle to the document store; cheap to clone
#[derive(Clone)]
pub struct Database {
    backend: Arc<dyn Backend>,
    indexes: Arc<RwLock<HashMap<String, Vec<UniqueIndex>>>>,
    writes: Arc<Mutex<()>>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            indexes: Arc::new(RwLock::new(HashMap::new())),
            writes: Arc::new(Mutex::new(())),
        }
    }

    fn write_lock(&self) -> StoreResult<MutexGuard<'_, ()>> {
        self.writes.lock().map_err(|_| StoreError::LockPoisoned)
    }

    /// Store that lives only as long as the process
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    /// Persistent store at `path`
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        Ok(Self::new(Arc::new(SledBackend::open(path)?)))
    }

    /// Register a unique index; later writes that collide are rejected
    pub fn ensure_unique(&self, collection: &str, fields: &[&str]) -> StoreResult<()> {
        let mut indexes = self.indexes.write().map_err(|_| StoreError::LockPoisoned)?;
        let entry = indexes.entry(collection.to_string()).or_default();

        let name = fields
            .iter()
            .map(|f| format!("{f}_1"))
            .collect::<Vec<_>>()
            .join("_");
        if entry.iter().all(|idx| idx.name != name) {
            entry.push(UniqueIndex {
                name,
                fields: fields.iter().map(|f| f.to_string()).collect(),
            });
        }
        Ok(())
    }

    fn check_unique(&self, collection: &str, doc: &Value) -> StoreResult<()> {
        let indexes = self.indexes.read().map_err(|_| StoreError::LockPoisoned)?;
        let Some(indexes) = indexes.get(collection) else {
            return Ok(());
        };
        if indexes.is_empty() {
            return Ok(());
        }

        let own_id = doc.get(ID_FIELD);
        let existing = self.backend.scan(collection)?;
        for index in indexes {
            let Some(key) = index.key(doc) else {
                continue;
            };
            let clash = existing
                .iter()
                .filter(|other| other.get(ID_FIELD) != own_id)
                .any(|other| index.key(other).as_ref() == Some(&key));
            if clash {
                return Err(StoreError::DuplicateKey {
                    collection: collection.to_string(),
                    index: index.name.clone(),
                    value: index.describe(&key),
                });
            }
        }
        Ok(())
    }

    /// Execute a query
    pub fn find(&self, query: &Query) -> StoreResult<Vec<Value>> {
        let docs = self.backend.scan(&query.collection)?;
        Ok(query.apply(docs))
    }

    /// First document matching a filter, in storage order
    pub fn find_one(&self, collection: &str, filter: &FilterSet) -> StoreResult<Option<Value>> {
        Ok(self
            .backend
            .scan(collection)?
            .into_iter()
            .find(|doc| filter.matches(doc)))
    }

    /// Number of documents matching a filter
    pub fn count(&self, collection: &str, filter: &FilterSet) -> StoreResult<usize> {
        Ok(self
            .backend
            .scan(collection)?
            .iter()
            .filter(|doc| filter.matches(doc))
            .count())
    }

    /// Document by id; a malformed id is a cast error
    pub fn find_by_id(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        parse_id(id)?;
        self.backend.get(collection, id)
    }

    /// Insert a new document, assigning `_id` when absent and `__v = 0`
    pub fn create(&self, collection: &str, doc: Value) -> StoreResult<Value> {
        let Value::Object(mut obj) = doc else {
            return Err(StoreError::invalid("document must be a JSON object"));
        };

        let id = match obj.get(ID_FIELD) {
            Some(Value::String(id)) => parse_id(id)?.to_string(),
            Some(other) => return Err(StoreError::invalid_id(other.to_string())),
            None => Uuid::new_v4().to_string(),
        };
        obj.insert(ID_FIELD.to_string(), Value::String(id.clone()));
        obj.insert(VERSION_FIELD.to_string(), Value::from(0));

        let doc = Value::Object(obj);
        let _guard = self.write_lock()?;
        if self.backend.get(collection, &id)?.is_some() {
            return Err(StoreError::DuplicateKey {
                collection: collection.to_string(),
                index: "_id_".to_string(),
                value: Value::String(id).to_string(),
            });
        }
        self.check_unique(collection, &doc)?;
        self.backend.put(collection, &id, &doc)?;
        Ok(doc)
    }

    /// Overwrite an existing document with a full new version
    pub fn replace(&self, collection: &str, doc: Value) -> StoreResult<Value> {
        let _guard = self.write_lock()?;
        self.replace_locked(collection, doc)
    }

    /// `replace` for callers already holding the write lock
    fn replace_locked(&self, collection: &str, doc: Value) -> StoreResult<Value> {
        let id = doc
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .ok_or_else(|| StoreError::invalid_id("undefined"))?
            .to_string();
        parse_id(&id)?;

        let version = self
            .backend
            .get(collection, &id)?
            .and_then(|old| old.get(VERSION_FIELD).and_then(Value::as_u64))
            .unwrap_or(0);

        let mut doc = doc;
        if let Some(obj) = doc.as_object_mut() {
            obj.insert(VERSION_FIELD.to_string(), Value::from(version + 1));
        }
        self.check_unique(collection, &doc)?;
        self.backend.put(collection, &id, &doc)?;
        Ok(doc)
    }

    /// Merge `patch` into the document and return the updated version
    pub fn find_by_id_and_update(
        &self,
        collection: &str,
        id: &str,
        patch: &Value,
    ) -> StoreResult<Option<Value>> {
        let _guard = self.write_lock()?;
        let Some(mut doc) = self.find_by_id(collection, id)? else {
            return Ok(None);
        };

        if let (Some(target), Some(changes)) = (doc.as_object_mut(), patch.as_object()) {
            for (key, value) in changes {
                if key == ID_FIELD || key == VERSION_FIELD {
                    continue;
                }
                target.insert(key.clone(), value.clone());
            }
        }
        self.replace_locked(collection, doc).map(Some)
    }

    /// Remove a document by id, returning it
    pub fn find_by_id_and_delete(&self, collection: &str, id: &str) -> StoreResult<Option<Value>> {
        parse_id(id)?;
        let _guard = self.write_lock()?;
        self.backend.remove(collection, id)
    }

    /// Run an aggregation pipeline over a collection
    pub fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> StoreResult<Vec<Value>> {
        Ok(pipeline.run(self.backend.scan(collection)?))
    }
}

fn parse_id(id: &str) -> StoreResult<Uuid> {
    Uuid::parse_str(id).map_err(|_| StoreError::invalid_id(id))
}
