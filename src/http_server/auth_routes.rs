//! Auth HTTP Routes
//!
//! Account endpoints under `/api/v1/users`. Every successful login-like
//! call answers `{status, token, data: {user}}` and sets the `jwt` cookie.

use axum::extract::{Path, State};
use axum::http::header::{HOST, SET_COOKIE};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use cookie::time::Duration;
use cookie::Cookie;
use serde_json::json;

use super::state::AppState;
use crate::auth::service::{
    ForgotPasswordRequest, LoginRequest, ResetPasswordRequest, SignupRequest,
    UpdatePasswordRequest,
};
use crate::auth::{Principal, JWT_COOKIE, LOGGED_OUT};
use crate::config::AppConfig;
use crate::models::User;
use crate::rest_api::{ApiResult, AppJson, MessageResponse};

/// Seconds the logout cookie survives
const LOGOUT_COOKIE_SECONDS: i64 = 10;

/// Session cookie carrying a token; `Secure` in production
pub fn session_cookie(token: &str, config: &AppConfig) -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, token.to_string()))
        .max_age(Duration::days(config.jwt_cookie_expires_in_days))
        .path("/")
        .http_only(true)
        .secure(config.mode.is_production())
        .build()
}

/// Cookie that overwrites the session and expires almost at once
pub fn logout_cookie() -> Cookie<'static> {
    Cookie::build((JWT_COOKIE, LOGGED_OUT))
        .max_age(Duration::seconds(LOGOUT_COOKIE_SECONDS))
        .path("/")
        .http_only(true)
        .build()
}

/// Issue a token for `user` and answer with it
fn send_token(state: &AppState, user: &User, status: StatusCode) -> ApiResult<Response> {
    let token = state.auth.issue(user)?;
    let cookie = session_cookie(&token, &state.config);
    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": state.auth.present(user)? },
    });
    Ok((status, [(SET_COOKIE, cookie.to_string())], Json(body)).into_response())
}

pub async fn signup(
    State(state): State<AppState>,
    AppJson(request): AppJson<SignupRequest>,
) -> ApiResult<Response> {
    let user = state.auth.signup(request)?;
    send_token(&state, &user, StatusCode::CREATED)
}

pub async fn login(
    State(state): State<AppState>,
    AppJson(request): AppJson<LoginRequest>,
) -> ApiResult<Response> {
    let user = state.auth.login(request)?;
    send_token(&state, &user, StatusCode::OK)
}

/// Replace the session cookie
pub async fn logout() -> impl IntoResponse {
    (
        [(SET_COOKIE, logout_cookie().to_string())],
        Json(json!({ "status": "success" })),
    )
}

pub async fn forgot_password(
    State(state): State<AppState>,
    headers: HeaderMap,
    AppJson(request): AppJson<ForgotPasswordRequest>,
) -> ApiResult<MessageResponse> {
    let host = headers
        .get(HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| state.config.socket_addr());
    let base_url = format!("http://{host}");

    state.auth.forgot_password(request.email, &base_url).await?;
    Ok(MessageResponse::new("Token sent to email!"))
}

pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    AppJson(request): AppJson<ResetPasswordRequest>,
) -> ApiResult<Response> {
    let user = state.auth.reset_password(&token, request)?;
    send_token(&state, &user, StatusCode::OK)
}

pub async fn update_password(
    State(state): State<AppState>,
    Principal(user): Principal,
    AppJson(request): AppJson<UpdatePasswordRequest>,
) -> ApiResult<Response> {
    let user = state.auth.update_password(&user, request)?;
    send_token(&state, &user, StatusCode::OK)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Mode;

    #[test]
    fn test_session_cookie() {
        let config = AppConfig {
            jwt_cookie_expires_in_days: 1,
            ..AppConfig::default()
        };
        let header = session_cookie("abc", &config).to_string();
        let cookie = Cookie::parse(header.as_str()).unwrap();
        assert_eq!(cookie.name(), "jwt");
        assert_eq!(cookie.value(), "abc");
        assert_eq!(cookie.max_age(), Some(Duration::seconds(86_400)));
        assert_eq!(cookie.path(), Some("/"));
        assert_eq!(cookie.http_only(), Some(true));
        assert_ne!(cookie.secure(), Some(true));

        let production = AppConfig {
            mode: Mode::Production,
            ..config
        };
        assert_eq!(session_cookie("abc", &production).secure(), Some(true));
    }

    #[test]
    fn test_logout_cookie() {
        let cookie = logout_cookie();
        assert_eq!(cookie.value(), LOGGED_OUT);
        assert_eq!(cookie.max_age(), Some(Duration::seconds(10)));
        assert_eq!(cookie.http_only(), Some(true));
    }
}
