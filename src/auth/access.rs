//! # Route Access Rules
//!
//! Composable predicates over the authenticated principal. A rule is
//! attached to a route as a layer that runs after [`protect`], so the
//! principal is always present when it is evaluated.
//!
//! [`protect`]: super::gate::protect

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::errors::AuthError;
use super::gate::Principal;
use crate::models::{Role, User};
use crate::rest_api::ApiError;

/// Access rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Access {
    /// Any authenticated user
    Authenticated,

    /// Exactly this role
    Role(Role),

    /// Any of these roles
    AnyOf(Vec<Role>),

    /// Either rule
    Or(Box<Access>, Box<Access>),

    /// Both rules
    And(Box<Access>, Box<Access>),
}

impl Access {
    pub fn role(role: Role) -> Self {
        Access::Role(role)
    }

    pub fn any_of(roles: impl IntoIterator<Item = Role>) -> Self {
        Access::AnyOf(roles.into_iter().collect())
    }

    pub fn or(self, other: Access) -> Self {
        Access::Or(Box::new(self), Box::new(other))
    }

    pub fn and(self, other: Access) -> Self {
        Access::And(Box::new(self), Box::new(other))
    }

    /// Whether `user` satisfies the rule
    pub fn allows(&self, user: &User) -> bool {
        match self {
            Access::Authenticated => true,
            Access::Role(role) => user.role == *role,
            Access::AnyOf(roles) => roles.contains(&user.role),
            Access::Or(a, b) => a.allows(user) || b.allows(user),
            Access::And(a, b) => a.allows(user) && b.allows(user),
        }
    }
}

/// Reject principals the rule does not allow with 403
pub async fn restrict_to(
    State(access): State<Access>,
    req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let principal = req
        .extensions()
        .get::<Principal>()
        .ok_or(AuthError::NotLoggedIn)?;

    if !access.allows(&principal.0) {
        tracing::warn!(
            user = principal.0.id(),
            role = ?principal.0.role,
            rule = ?access,
            "access denied"
        );
        return Err(AuthError::Forbidden.into());
    }
    Ok(next.run(req).await)
}
