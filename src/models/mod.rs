//! # Resource Models
//!
//! Typed documents for each collection and the [`Resource`] trait that the
//! generic handlers are written against.

pub mod review;
pub mod tour;
pub mod user;

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::store::{Database, StoreError, StoreResult};

pub use review::Review;
pub use tour::{Difficulty, Location, Tour};
pub use user::{Role, User};

/// Documents of another collection attached to a read, keyed by a
/// reference field on the other side (`reviews.tour == tour._id`).
#[derive(Debug, Clone, Copy)]
pub struct Related {
    /// Field the related documents are attached under
    pub field: &'static str,
    pub collection: &'static str,
    pub foreign_field: &'static str,
    /// Presentation applied to each related document
    pub present: fn(&Database, Value) -> StoreResult<Value>,
}

/// A collection-backed document type
pub trait Resource: Serialize + DeserializeOwned + Send + Sync + Sized + 'static {
    /// Collection the documents live in
    const COLLECTION: &'static str;

    /// Fields stripped from every response
    const HIDDEN: &'static [&'static str] = &[];

    /// Fields clients may never write
    const PROTECTED: &'static [&'static str] = &[];

    /// Related documents attached by get-one
    const RELATED: Option<Related> = None;

    /// State captured before an update or delete and handed to
    /// [`Resource::after_mutation`] once it has been committed
    type Captured: Send;

    /// Check schema constraints
    fn validate(&self) -> StoreResult<()>;

    /// Normalisation run before every save
    fn before_save(&mut self) {}

    /// Filter applied to every find
    fn default_filter() -> crate::store::FilterSet {
        crate::store::FilterSet::new()
    }

    /// Replace references with the documents they point to
    fn populate(_db: &Database, _doc: &mut Value) -> StoreResult<()> {
        Ok(())
    }

    /// Add computed fields to a document leaving the store
    fn decorate(_doc: &mut Value) {}

    /// Hook run after a document has been inserted
    fn after_create(&self, _db: &Database) -> StoreResult<()> {
        Ok(())
    }

    /// Snapshot taken from the stored document before it is mutated
    fn capture(&self) -> Self::Captured;

    /// Hook run after an update (`updated` is the new version) or a delete
    fn after_mutation(
        _db: &Database,
        _captured: Self::Captured,
        _updated: Option<&Self>,
    ) -> StoreResult<()> {
        Ok(())
    }
}

/// Decode a stored or submitted document into its typed form
pub fn decode<R: Resource>(doc: Value) -> StoreResult<R> {
    serde_json::from_value(doc).map_err(|e| StoreError::invalid(e.to_string()))
}

/// Validate, normalise and encode a typed document for storage
pub fn encode<R: Resource>(mut resource: R) -> StoreResult<(R, Value)> {
    resource.before_save();
    resource.validate()?;
    let value = serde_json::to_value(&resource)?;
    Ok((resource, value))
}

/// Prepare a stored document for a client: populate, decorate, hide
pub fn present<R: Resource>(db: &Database, mut doc: Value) -> StoreResult<Value> {
    R::populate(db, &mut doc)?;
    R::decorate(&mut doc);
    if let Some(obj) = doc.as_object_mut() {
        for field in R::HIDDEN {
            obj.remove(*field);
        }
    }
    Ok(doc)
}

/// Register the unique indexes every collection relies on
pub fn register_indexes(db: &Database) -> StoreResult<()> {
    db.ensure_unique(Tour::COLLECTION, &["name"])?;
    db.ensure_unique(User::COLLECTION, &["email"])?;
    db.ensure_unique(Review::COLLECTION, &["tour", "user"])?;
    Ok(())
}

/// URL-safe lowercase slug
pub fn slugify(text: &str) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| {
        Regex::new("[^a-z0-9]+").unwrap_or_else(|error| panic!("slug regex failed to compile: {error}"))
    });
    re.replace_all(&text.to_lowercase(), "-")
        .trim_matches('-')
        .to_string()
}

/// Loose email shape check
pub fn is_email(text: &str) -> bool {
    static EMAIL: OnceLock<Regex> = OnceLock::new();
    let re = EMAIL.get_or_init(|| {
        Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$")
            .unwrap_or_else(|error| panic!("email regex failed to compile: {error}"))
    });
    re.is_match(text)
}

/// Collects field violations into one validation error
#[derive(Debug, Default)]
pub(crate) struct Violations(Vec<String>);

impl Violations {
    pub(crate) fn check(&mut self, ok: bool, message: impl Into<String>) {
        if !ok {
            self.0.push(message.into());
        }
    }

    pub(crate) fn finish(self) -> StoreResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Validation(self.0))
        }
    }
}

/// Trimmed, non-empty string
pub(crate) fn present_text(value: &Option<String>) -> bool {
    value.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false)
}

pub(crate) fn is_uuid(id: &str) -> bool {
    uuid::Uuid::parse_str(id).is_ok()
}
