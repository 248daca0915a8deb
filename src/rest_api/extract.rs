//! Request extractors whose rejections go through [`ApiError`].

use axum::async_trait;
use axum::extract::{FromRequest, FromRequestParts, Query};
use axum::http::request::Parts;

use super::errors::ApiError;
use super::features::QueryParams;

/// JSON body; malformed input becomes a 400 in the standard envelope
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(ApiError))]
pub struct AppJson<T>(pub T);

/// URL-encoded form body
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Form), rejection(ApiError))]
pub struct AppForm<T>(pub T);

/// Every `key=value` pair of the query string, repeats included
#[async_trait]
impl<S> FromRequestParts<S> for QueryParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let Query(pairs) = Query::<Vec<(String, String)>>::try_from_uri(&parts.uri)
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        Ok(pairs.into_iter().collect())
    }
}
