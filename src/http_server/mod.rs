//! # HTTP Server Module
//!
//! The axum application.
//!
//! # Endpoints
//!
//! - `/api/v1/tours/*` - Tours, reports and nested reviews
//! - `/api/v1/users/*` - Accounts, self-service and user management
//! - `/api/v1/reviews/*` - Reviews
//! - `/`, `/tour/:slug`, `/login`, `/me` - Page models

pub mod auth_routes;
pub mod guards;
pub mod review_routes;
pub mod server;
pub mod state;
pub mod tour_routes;
pub mod user_routes;
pub mod view_routes;

pub use server::{build_router, HttpServer};
pub use state::AppState;
