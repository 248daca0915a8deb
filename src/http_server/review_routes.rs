//! Review HTTP Routes
//!
//! Every review route needs a logged-in user. Only plain users write
//! reviews; authors and admins may edit or delete them.

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Router;
use serde_json::Value;

use super::guards::{protected, restricted};
use super::state::AppState;
use crate::auth::{Access, Principal};
use crate::models::{Review, Role, User};
use crate::rest_api::factory::{self, create_document, list_documents, sanitize_body};
use crate::rest_api::{ApiResult, AppJson, ListResponse, QueryParams, SingleResponse};
use crate::store::FilterExpr;

/// Review routes, mounted under `/api/v1/reviews`
pub fn review_routes(state: &AppState) -> Router<AppState> {
    let authors = Access::any_of([Role::User, Role::Admin]);

    Router::new()
        .route(
            "/",
            protected(get(factory::get_all::<Review>), state).merge(restricted(
                post(create_review),
                state,
                Access::role(Role::User),
            )),
        )
        .route(
            "/:id",
            protected(get(factory::get_one::<Review>), state).merge(restricted(
                patch(factory::update_one::<Review>).delete(factory::delete_one::<Review>),
                state,
                authors,
            )),
        )
}

/// Default the review's tour to the route's and its author to the caller
pub fn set_tour_user_ids(body: Value, tour: Option<&str>, user: &User) -> ApiResult<Value> {
    let mut body = sanitize_body::<Review>(body)?;
    if let Some(obj) = body.as_object_mut() {
        if let Some(tour) = tour {
            obj.entry("tour").or_insert_with(|| Value::from(tour));
        }
        obj.entry("user").or_insert_with(|| Value::from(user.id()));
    }
    Ok(body)
}

async fn create_review(
    State(state): State<AppState>,
    Principal(user): Principal,
    AppJson(body): AppJson<Value>,
) -> ApiResult<SingleResponse> {
    let body = set_tour_user_ids(body, None, &user)?;
    Ok(SingleResponse::created(create_document::<Review>(&state.db, body)?))
}

/// `GET /api/v1/tours/:id/reviews`
pub async fn get_tour_reviews(
    State(state): State<AppState>,
    Path(tour): Path<String>,
    params: QueryParams,
) -> ApiResult<ListResponse> {
    let docs = list_documents::<Review>(&state.db, &params, Some(FilterExpr::eq("tour", tour)))?;
    Ok(ListResponse::new(docs))
}

/// `POST /api/v1/tours/:id/reviews`
pub async fn create_tour_review(
    State(state): State<AppState>,
    Path(tour): Path<String>,
    Principal(user): Principal,
    AppJson(body): AppJson<Value>,
) -> ApiResult<SingleResponse> {
    let body = set_tour_user_ids(body, Some(&tour), &user)?;
    Ok(SingleResponse::created(create_document::<Review>(&state.db, body)?))
}
