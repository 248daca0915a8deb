//! tourbook - REST API backend for a tour-booking site
//!
//! Tours, users and reviews stored as JSON documents, served over HTTP
//! with JWT authentication and role-based access.

pub mod auth;
pub mod cli;
pub mod config;
pub mod http_server;
pub mod models;
pub mod ratings;
pub mod rest_api;
pub mod store;
