//! # Response Formatting
//!
//! The `{status, results?, data}` envelope shared by every JSON endpoint.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// List response: `{status, results, data: {data: [...]}}`
#[derive(Debug, Clone, Serialize)]
pub struct ListResponse {
    pub status: &'static str,
    pub results: usize,
    pub data: Value,
}

impl ListResponse {
    pub fn new(docs: Vec<Value>) -> Self {
        Self {
            status: "success",
            results: docs.len(),
            data: json!({ "data": docs }),
        }
    }
}

impl IntoResponse for ListResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// Single document response: `{status, data: {<key>: doc}}`
#[derive(Debug, Clone, Serialize)]
pub struct SingleResponse {
    #[serde(skip)]
    code: StatusCode,
    pub status: &'static str,
    pub data: Value,
}

impl SingleResponse {
    /// `200` with the document under `data.data`
    pub fn new(doc: Value) -> Self {
        Self::keyed("data", doc)
    }

    /// `200` with the document under `data.<key>`
    pub fn keyed(key: &str, doc: Value) -> Self {
        let mut data = serde_json::Map::new();
        data.insert(key.to_string(), doc);
        Self {
            code: StatusCode::OK,
            status: "success",
            data: Value::Object(data),
        }
    }

    /// `201` with the document under `data.data`
    pub fn created(doc: Value) -> Self {
        Self {
            code: StatusCode::CREATED,
            ..Self::new(doc)
        }
    }

    pub fn code(&self) -> StatusCode {
        self.code
    }
}

impl IntoResponse for SingleResponse {
    fn into_response(self) -> Response {
        (self.code, Json(self)).into_response()
    }
}

/// Message-only response: `{status, message}`
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub status: &'static str,
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "success",
            message: message.into(),
        }
    }
}

impl IntoResponse for MessageResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}

/// `204` with an empty body
pub struct NoContent;

impl IntoResponse for NoContent {
    fn into_response(self) -> Response {
        StatusCode::NO_CONTENT.into_response()
    }
}
