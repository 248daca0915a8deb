//! User HTTP Routes
//!
//! Public account endpoints, self-service for the logged-in user and
//! admin-only user management.

use axum::extract::State;
use axum::routing::{delete, get, patch, post};
use axum::Router;
use serde_json::Value;

use super::auth_routes;
use super::guards::{protected, restricted};
use super::state::AppState;
use crate::auth::{Access, Principal};
use crate::models::{Role, User};
use crate::rest_api::factory::{self, get_document};
use crate::rest_api::{ApiError, ApiResult, AppJson, NoContent, SingleResponse};

/// User routes, mounted under `/api/v1/users`
pub fn user_routes(state: &AppState) -> Router<AppState> {
    let admin = Access::role(Role::Admin);

    Router::new()
        .route("/signup", post(auth_routes::signup))
        .route("/login", post(auth_routes::login))
        .route("/logout", get(auth_routes::logout))
        .route("/forgotPassword", post(auth_routes::forgot_password))
        .route("/resetPassword/:token", patch(auth_routes::reset_password))
        .route(
            "/updateMyPassword",
            protected(patch(auth_routes::update_password), state),
        )
        .route("/me", protected(get(get_me), state))
        .route("/updateMe", protected(patch(update_me), state))
        .route("/deleteMe", protected(delete(delete_me), state))
        .route(
            "/",
            restricted(
                get(factory::get_all::<User>).post(create_user),
                state,
                admin.clone(),
            ),
        )
        .route(
            "/:id",
            restricted(
                get(factory::get_one::<User>)
                    .patch(factory::update_one::<User>)
                    .delete(factory::delete_one::<User>),
                state,
                admin,
            ),
        )
}

async fn get_me(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> ApiResult<SingleResponse> {
    Ok(SingleResponse::new(get_document::<User>(&state.db, user.id())?))
}

async fn update_me(
    State(state): State<AppState>,
    Principal(user): Principal,
    AppJson(body): AppJson<Value>,
) -> ApiResult<SingleResponse> {
    let updated = state.auth.update_me(&user, body)?;
    Ok(SingleResponse::keyed("user", updated))
}

async fn delete_me(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> ApiResult<NoContent> {
    state.auth.delete_me(&user)?;
    Ok(NoContent)
}

/// Accounts are only created through signup
async fn create_user() -> ApiError {
    ApiError::Operational {
        status: 500,
        message: "This route is not defined! Please use /signup instead".to_string(),
    }
}
