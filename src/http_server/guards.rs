//! Route-level auth layers.
//!
//! Layers added later run first, so `protect` always resolves the
//! principal before an access rule looks at it.

use axum::middleware::from_fn_with_state;
use axum::routing::MethodRouter;

use super::state::AppState;
use crate::auth::{protect, restrict_to, Access};

/// Require a logged-in user
pub fn protected(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.auth.clone(), protect))
}

/// Require a logged-in user the rule allows
pub fn restricted(
    route: MethodRouter<AppState>,
    state: &AppState,
    access: Access,
) -> MethodRouter<AppState> {
    protected(route.route_layer(from_fn_with_state(access, restrict_to)), state)
}
