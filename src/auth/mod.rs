//! # Auth Module
//!
//! Password accounts, signed session tokens and role-based route access.

pub mod access;
pub mod crypto;
pub mod email;
pub mod errors;
pub mod gate;
pub mod jwt;
pub mod service;

pub use access::{restrict_to, Access};
pub use errors::{AuthError, AuthResult};
pub use gate::{is_logged_in, protect, Principal, Viewer, JWT_COOKIE, LOGGED_OUT};
pub use jwt::{JwtClaims, JwtConfig, JwtManager};
pub use service::AuthService;
