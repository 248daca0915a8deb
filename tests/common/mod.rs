//! Shared helpers for the HTTP integration tests.
//!
//! Every test gets its own in-memory store and router; requests are driven
//! through `tower::ServiceExt::oneshot` without binding a socket, so each
//! request names its client address in `x-forwarded-for`.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::{to_bytes, Body};
use axum::http::{header, HeaderMap, HeaderValue, Method, Request, StatusCode};
use axum::Router;
use cookie::Cookie;
use serde_json::{json, Value};
use tower::ServiceExt;

use tourbook::auth::email::MockEmailSender;
use tourbook::auth::service::SignupRequest;
use tourbook::config::{AppConfig, Mode};
use tourbook::http_server::{build_router, AppState};
use tourbook::models::{decode, register_indexes, User};
use tourbook::store::Database;

pub struct TestApp {
    pub state: AppState,
    pub router: Router,
    pub mailbox: Arc<MockEmailSender>,
}

/// App over a fresh in-memory store
pub fn app(mode: Mode) -> TestApp {
    app_with(Database::in_memory(), mode)
}

/// App over the given store
pub fn app_with(db: Database, mode: Mode) -> TestApp {
    app_with_config(db, config(mode))
}

/// Test configuration for `mode`
pub fn config(mode: Mode) -> AppConfig {
    AppConfig {
        mode,
        jwt_secret: "integration-test-secret".to_string(),
        ..AppConfig::default()
    }
}

/// App over the given store and configuration
pub fn app_with_config(db: Database, config: AppConfig) -> TestApp {
    register_indexes(&db).unwrap();
    let mailbox = Arc::new(MockEmailSender::new());
    let state = AppState::with_email_sender(db, config, mailbox.clone());
    let router = build_router(state.clone());
    TestApp {
        state,
        router,
        mailbox,
    }
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl Reply {
    pub fn cookie(&self) -> Option<&str> {
        self.headers
            .get(header::SET_COOKIE)
            .and_then(|v| v.to_str().ok())
    }

    /// The `Set-Cookie` header, parsed
    pub fn parsed_cookie(&self) -> Option<Cookie<'static>> {
        self.cookie()
            .and_then(|raw| Cookie::parse(raw.to_string()).ok())
    }
}

impl TestApp {
    /// Send a request with an optional bearer token and JSON body
    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        self.dispatch(request).await
    }

    /// Send a prepared request
    pub async fn dispatch(&self, mut request: Request<Body>) -> Reply {
        request
            .headers_mut()
            .entry("x-forwarded-for")
            .or_insert(HeaderValue::from_static("127.0.0.1"));
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            headers,
            body,
        }
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> Reply {
        self.send(Method::GET, uri, token, None).await
    }

    /// Sign up a user, give it `role` and return it with a fresh token
    pub fn user(&self, name: &str, email: &str, role: &str) -> (User, String) {
        let user = self
            .state
            .auth
            .signup(SignupRequest {
                name: Some(name.to_string()),
                email: Some(email.to_string()),
                password: "pass1234".to_string(),
                password_confirm: Some("pass1234".to_string()),
            })
            .unwrap();
        let doc = self
            .state
            .db
            .find_by_id_and_update("users", user.id(), &json!({ "role": role }))
            .unwrap()
            .unwrap();
        let user: User = decode(doc).unwrap();
        let token = self.state.auth.issue(&user).unwrap();
        (user, token)
    }

    /// Create a tour as an admin and return its id
    pub async fn tour(&self, admin: &str, body: Value) -> String {
        let reply = self
            .send(Method::POST, "/api/v1/tours", Some(admin), Some(body))
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        reply.body["data"]["data"]["_id"].as_str().unwrap().to_string()
    }
}

/// A valid tour body
pub fn tour_body(name: &str, difficulty: &str, price: f64, duration: u32) -> Value {
    json!({
        "name": name,
        "duration": duration,
        "maxGroupSize": 10,
        "difficulty": difficulty,
        "price": price,
        "summary": "Exploring the wild",
        "imageCover": "tour-cover.jpg"
    })
}
