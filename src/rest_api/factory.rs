//! # Handler Factory
//!
//! Generic CRUD over any [`Resource`]. The `*_document` functions hold the
//! logic and are shared with the CLI seeder; the async handlers wrap them
//! for axum routes.

use std::time::Instant;

use axum::extract::{Path, State};
use serde_json::Value;

use super::errors::{ApiError, ApiResult};
use super::extract::AppJson;
use super::features::{ApiFeatures, QueryParams};
use super::response::{ListResponse, NoContent, SingleResponse};
use crate::http_server::AppState;
use crate::models::{decode, encode, present, Resource};
use crate::store::{Database, FilterExpr, Query, SortKey, ID_FIELD, VERSION_FIELD};

/// Load a stored document visible under the resource's default filter
fn load<R: Resource>(db: &Database, id: &str) -> ApiResult<Value> {
    db.find_by_id(R::COLLECTION, id)?
        .filter(|doc| R::default_filter().matches(doc))
        .ok_or_else(ApiError::no_document)
}

/// Remove fields clients may not write
pub fn sanitize_body<R: Resource>(body: Value) -> ApiResult<Value> {
    let Value::Object(mut obj) = body else {
        return Err(ApiError::BadRequest(
            "Request body must be a JSON object".to_string(),
        ));
    };
    obj.remove(ID_FIELD);
    obj.remove(VERSION_FIELD);
    for field in R::PROTECTED {
        obj.remove(*field);
    }
    Ok(Value::Object(obj))
}

/// List documents matching the request parameters
pub fn list_documents<R: Resource>(
    db: &Database,
    params: &QueryParams,
    parent: Option<FilterExpr>,
) -> ApiResult<Vec<Value>> {
    let started = Instant::now();

    let mut query = Query::new(R::COLLECTION).filter(R::default_filter());
    if let Some(parent) = parent {
        query = query.and(parent);
    }
    let query = ApiFeatures::new(query, params)
        .filter()?
        .sort()
        .limit_fields()
        .paginate()
        .into_query();

    let docs = db.find(&query)?;
    tracing::debug!(
        collection = R::COLLECTION,
        results = docs.len(),
        elapsed_us = started.elapsed().as_micros() as u64,
        "query executed"
    );

    docs.into_iter()
        .map(|doc| present::<R>(db, doc).map_err(ApiError::from))
        .collect()
}

/// One document by id, with its related documents attached
pub fn get_document<R: Resource>(db: &Database, id: &str) -> ApiResult<Value> {
    let mut doc = present::<R>(db, load::<R>(db, id)?)?;

    if let Some(related) = R::RELATED {
        let query = Query::new(related.collection)
            .and(FilterExpr::eq(related.foreign_field, id))
            .sort(vec![SortKey::desc("createdAt")]);
        let attached = db
            .find(&query)?
            .into_iter()
            .map(|d| (related.present)(db, d))
            .collect::<Result<Vec<_>, _>>()?;

        if let Some(obj) = doc.as_object_mut() {
            obj.insert(related.field.to_string(), Value::Array(attached));
        }
    }
    Ok(doc)
}

/// Validate and insert a new document, then run its post-save hook
pub fn create_document<R: Resource>(db: &Database, body: Value) -> ApiResult<Value> {
    let (resource, value) = encode(decode::<R>(body)?)?;
    let saved = db.create(R::COLLECTION, value)?;
    resource.after_create(db)?;
    Ok(present::<R>(db, saved)?)
}

/// Merge a patch onto a stored document, re-validate and persist
pub fn update_document<R: Resource>(db: &Database, id: &str, patch: Value) -> ApiResult<Value> {
    let stored = load::<R>(db, id)?;
    let captured = decode::<R>(stored.clone())?.capture();

    let mut merged = stored;
    if let (Some(target), Value::Object(changes)) = (merged.as_object_mut(), patch) {
        for (key, value) in changes {
            if key != ID_FIELD && key != VERSION_FIELD {
                target.insert(key, value);
            }
        }
    }

    let (updated, value) = encode(decode::<R>(merged)?)?;
    let saved = db.replace(R::COLLECTION, value)?;
    R::after_mutation(db, captured, Some(&updated))?;
    Ok(present::<R>(db, saved)?)
}

/// Remove a document, then run its post-delete hook
pub fn delete_document<R: Resource>(db: &Database, id: &str) -> ApiResult<()> {
    let stored = load::<R>(db, id)?;
    let captured = decode::<R>(stored)?.capture();

    db.find_by_id_and_delete(R::COLLECTION, id)?
        .ok_or_else(ApiError::no_document)?;
    R::after_mutation(db, captured, None)?;
    Ok(())
}

// =============================================================================
// Route handlers
// =============================================================================

pub async fn get_all<R: Resource>(
    State(state): State<AppState>,
    params: QueryParams,
) -> ApiResult<ListResponse> {
    let docs = list_documents::<R>(&state.db, &params, None)?;
    Ok(ListResponse::new(docs))
}

pub async fn get_one<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<SingleResponse> {
    Ok(SingleResponse::new(get_document::<R>(&state.db, &id)?))
}

pub async fn create_one<R: Resource>(
    State(state): State<AppState>,
    AppJson(body): AppJson<Value>,
) -> ApiResult<SingleResponse> {
    let body = sanitize_body::<R>(body)?;
    Ok(SingleResponse::created(create_document::<R>(&state.db, body)?))
}

pub async fn update_one<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
    AppJson(body): AppJson<Value>,
) -> ApiResult<SingleResponse> {
    let patch = sanitize_body::<R>(body)?;
    Ok(SingleResponse::new(update_document::<R>(&state.db, &id, patch)?))
}

pub async fn delete_one<R: Resource>(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<NoContent> {
    delete_document::<R>(&state.db, &id)?;
    Ok(NoContent)
}
