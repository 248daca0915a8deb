//! # HTTP Server
//!
//! Combines the API and page routers into one axum application and
//! serves it.
//!
//! Every response carries the usual hardening headers. Requests under
//! `/api` are rate limited per client IP: a burst of
//! `rate_limit_max` requests, refilled evenly over the window.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{DefaultBodyLimit, OriginalUri};
use axum::http::header::{HeaderName, HeaderValue, RETRY_AFTER};
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, map_response};
use axum::response::{IntoResponse, Response};
use axum::Router;
use tokio::net::TcpListener;
use tower_governor::governor::GovernorConfigBuilder;
use tower_governor::key_extractor::SmartIpKeyExtractor;
use tower_governor::GovernorLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use super::review_routes::review_routes;
use super::state::AppState;
use super::tour_routes::tour_routes;
use super::user_routes::user_routes;
use super::view_routes::view_routes;
use crate::config::AppConfig;
use crate::rest_api::{translate_errors, ApiError};

/// Largest accepted request body
pub const BODY_LIMIT_BYTES: usize = 10 * 1024;

/// Message for clients over the `/api` rate limit
pub const RATE_LIMIT_MESSAGE: &str = "Too many requests from this IP, please try again in an hour!";

/// Headers set on every response unless a handler already set them
pub const SECURITY_HEADERS: [(&str, &str); 12] = [
    (
        "content-security-policy",
        "default-src 'self';base-uri 'self';font-src 'self' https: data:;\
         form-action 'self';frame-ancestors 'self';img-src 'self' data:;\
         object-src 'none';script-src 'self';script-src-attr 'none';\
         style-src 'self' https: 'unsafe-inline';upgrade-insecure-requests",
    ),
    ("cross-origin-opener-policy", "same-origin"),
    ("cross-origin-resource-policy", "same-origin"),
    ("origin-agent-cluster", "?1"),
    ("referrer-policy", "no-referrer"),
    ("strict-transport-security", "max-age=15552000; includeSubDomains"),
    ("x-content-type-options", "nosniff"),
    ("x-dns-prefetch-control", "off"),
    ("x-download-options", "noopen"),
    ("x-frame-options", "SAMEORIGIN"),
    ("x-permitted-cross-domain-policies", "none"),
    ("x-xss-protection", "0"),
];

/// Build the application router
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    let router = Router::new()
        .merge(view_routes(&state))
        .nest("/api", api_routes(&state))
        .fallback(not_found)
        .layer(DefaultBodyLimit::max(BODY_LIMIT_BYTES))
        .layer(from_fn_with_state(state.config.mode, translate_errors));

    with_security_headers(router)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

fn api_routes(state: &AppState) -> Router<AppState> {
    let api = Router::new()
        .nest("/v1/tours", tour_routes(state))
        .nest("/v1/users", user_routes(state))
        .nest("/v1/reviews", review_routes(state));
    rate_limited(api, &state.config)
}

/// Limit each client IP to `rate_limit_max` requests per window
fn rate_limited(api: Router<AppState>, config: &AppConfig) -> Router<AppState> {
    if config.rate_limit_max == 0 {
        return api;
    }
    let window_ms = config.rate_limit_window_secs.saturating_mul(1000);
    let refill_ms = (window_ms / u64::from(config.rate_limit_max)).max(1);

    let Some(governor) = GovernorConfigBuilder::default()
        .key_extractor(SmartIpKeyExtractor)
        .per_millisecond(refill_ms)
        .burst_size(config.rate_limit_max)
        .finish()
    else {
        tracing::warn!(
            max = config.rate_limit_max,
            window_secs = config.rate_limit_window_secs,
            "invalid rate limit settings, /api is not rate limited"
        );
        return api;
    };

    api.layer(GovernorLayer {
        config: Arc::new(governor),
    })
    .layer(map_response(rate_limit_exceeded))
}

/// Turn the limiter's plain-text 429 into the error envelope
async fn rate_limit_exceeded(response: Response) -> Response {
    if response.status() != StatusCode::TOO_MANY_REQUESTS {
        return response;
    }
    let mut limited = ApiError::Operational {
        status: StatusCode::TOO_MANY_REQUESTS.as_u16(),
        message: RATE_LIMIT_MESSAGE.to_string(),
    }
    .into_response();
    if let Some(retry) = response.headers().get(RETRY_AFTER) {
        limited.headers_mut().insert(RETRY_AFTER, retry.clone());
    }
    limited
}

fn with_security_headers(router: Router<AppState>) -> Router<AppState> {
    SECURITY_HEADERS
        .iter()
        .fold(router, |router, &(name, value)| {
            router.layer(SetResponseHeaderLayer::if_not_present(
                HeaderName::from_static(name),
                HeaderValue::from_static(value),
            ))
        })
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.cors_origins.is_empty() {
        // No origins configured: allow everything
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        use tower_http::cors::AllowOrigin;
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| s.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn not_found(OriginalUri(uri): OriginalUri) -> ApiError {
    ApiError::NotFound(format!("Can't find {uri} on this server!"))
}

/// HTTP server for the booking API
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        Self { state }
    }

    /// Get the socket address
    pub fn socket_addr(&self) -> String {
        self.state.config.socket_addr()
    }

    /// Get the router (for testing)
    pub fn router(&self) -> Router {
        build_router(self.state.clone())
    }

    /// Bind and serve until the process stops
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr = self.socket_addr();
        let listener = TcpListener::bind(&addr).await?;

        tracing::info!(
            addr = %addr,
            mode = ?self.state.config.mode,
            persistent = self.state.config.database_path.is_some(),
            "tourbook listening"
        );

        // The rate limiter falls back to the peer address
        let app = self.router().into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::Database;

    #[test]
    fn test_server_with_custom_port() {
        let config = AppConfig {
            port: 8080,
            ..AppConfig::default()
        };
        let server = HttpServer::new(AppState::new(Database::in_memory(), config));
        assert_eq!(server.socket_addr(), "127.0.0.1:8080");
    }

    #[test]
    fn test_router_builds() {
        let server = HttpServer::new(AppState::new(Database::in_memory(), AppConfig::default()));
        let _router = server.router();
    }

    #[test]
    fn test_router_builds_without_rate_limit() {
        let config = AppConfig {
            rate_limit_max: 0,
            ..AppConfig::default()
        };
        let server = HttpServer::new(AppState::new(Database::in_memory(), config));
        let _router = server.router();
    }

    #[test]
    fn test_security_headers_are_valid() {
        for (name, value) in SECURITY_HEADERS {
            assert_eq!(name, name.to_ascii_lowercase());
            assert!(HeaderValue::from_str(value).is_ok(), "{name}");
        }
    }
}
