//! # Auth Gate
//!
//! Resolves the principal behind a request:
//!
//! ```text
//! anonymous -> token presented -> verified -> authorized
//! ```
//!
//! [`protect`] fails the request at the first broken step. [`is_logged_in`]
//! is the page variant: it never fails and only records who is viewing.

use std::sync::Arc;

use axum::async_trait;
use axum::extract::{FromRequestParts, Request, State};
use axum::http::header::{AUTHORIZATION, COOKIE};
use axum::http::request::Parts;
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use cookie::Cookie;

use super::errors::AuthError;
use super::service::AuthService;
use crate::models::User;
use crate::rest_api::ApiError;

/// Cookie carrying the session token
pub const JWT_COOKIE: &str = "jwt";

/// Cookie value written on logout
pub const LOGGED_OUT: &str = "loggedout";

/// The verified user behind a protected request
#[derive(Debug, Clone)]
pub struct Principal(pub User);

/// Whoever is looking at a page, if anyone
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<User>);

/// Token from `Authorization: Bearer <t>`, else from the `jwt` cookie
pub fn extract_token(headers: &HeaderMap) -> Option<String> {
    let bearer = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty());

    match bearer {
        Some(token) => Some(token.to_string()),
        None => cookie_value(headers, JWT_COOKIE),
    }
}

/// Value of a named cookie across all `Cookie` headers, unquoted.
/// Malformed pairs are skipped.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == name)
        .map(|cookie| cookie.value_trimmed().to_string())
        .filter(|value| !value.is_empty())
}

/// Require a valid token for a live user whose password has not changed
/// since the token was issued
pub async fn protect(
    State(auth): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_token(req.headers()).ok_or(AuthError::NotLoggedIn)?;

    let user = auth.authenticate(&token).map_err(|err| {
        tracing::warn!(uri = %req.uri(), error = %err, "rejected token");
        err
    })?;

    req.extensions_mut().insert(Viewer(Some(user.clone())));
    req.extensions_mut().insert(Principal(user));
    Ok(next.run(req).await)
}

/// Record the viewer from the `jwt` cookie; any failure means anonymous
pub async fn is_logged_in(
    State(auth): State<Arc<AuthService>>,
    mut req: Request,
    next: Next,
) -> Response {
    let viewer = cookie_value(req.headers(), JWT_COOKIE)
        .filter(|token| token != LOGGED_OUT)
        .and_then(|token| auth.authenticate(&token).ok());

    req.extensions_mut().insert(Viewer(viewer));
    next.run(req).await
}

#[async_trait]
impl<S> FromRequestParts<S> for Principal
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Principal>()
            .cloned()
            .ok_or_else(|| AuthError::NotLoggedIn.into())
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts.extensions.get::<Viewer>().cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_token(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_bearer_wins_over_cookie() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer from-header"));
        headers.insert(COOKIE, HeaderValue::from_static("jwt=from-cookie"));
        assert_eq!(extract_token(&headers), Some("from-header".to_string()));
    }

    #[test]
    fn test_cookie_token() {
        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("theme=dark; jwt=abc; lang=en"));
        assert_eq!(extract_token(&headers), Some("abc".to_string()));
    }

    #[test]
    fn test_cookie_token_across_headers_and_quoted() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark; broken; lang=en"));
        headers.append(COOKIE, HeaderValue::from_static("jwt=\"abc.def\""));
        assert_eq!(extract_token(&headers), Some("abc.def".to_string()));
        assert_eq!(cookie_value(&headers, "lang"), Some("en".to_string()));
        assert_eq!(cookie_value(&headers, "session"), None);
    }

    #[test]
    fn test_no_token() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
        headers.insert(COOKIE, HeaderValue::from_static("jwt="));
        assert_eq!(extract_token(&headers), None);
    }
}
