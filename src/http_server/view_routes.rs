//! Page Routes
//!
//! Data for the server-rendered pages as JSON page models:
//! `{title, user?, ...}`. Public pages only note who is viewing; the
//! account pages require a login.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};

use super::guards::protected;
use super::state::AppState;
use crate::auth::{is_logged_in, Principal, Viewer};
use crate::models::{Resource, Tour, User};
use crate::rest_api::factory::{get_document, list_documents};
use crate::rest_api::{ApiError, ApiResult, AppForm, QueryParams};
use crate::store::{FilterExpr, Query};

/// A page: its title, the viewer and page-specific data
#[derive(Debug, Serialize)]
pub struct Page {
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
    #[serde(flatten)]
    pub data: Map<String, Value>,
}

impl Page {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            user: None,
            data: Map::new(),
        }
    }

    fn with(mut self, key: &str, value: Value) -> Self {
        self.data.insert(key.to_string(), value);
        self
    }

    fn viewed_by(mut self, state: &AppState, user: Option<&User>) -> ApiResult<Self> {
        self.user = user.map(|u| state.auth.present(u)).transpose()?;
        Ok(self)
    }
}

/// Page routes, mounted at the root
pub fn view_routes(state: &AppState) -> Router<AppState> {
    let public = Router::new()
        .route("/", get(overview))
        .route("/tour/:slug", get(tour_page))
        .route("/login", get(login_page))
        .route_layer(from_fn_with_state(state.auth.clone(), is_logged_in));

    let account = Router::new()
        .route("/me", protected(get(account_page), state))
        .route("/submit-user-data", protected(post(submit_user_data), state));

    public.merge(account)
}

async fn overview(State(state): State<AppState>, Viewer(viewer): Viewer) -> ApiResult<Json<Page>> {
    let tours = list_documents::<Tour>(&state.db, &QueryParams::new(), None)?;
    Ok(Json(
        Page::new("All Tours")
            .with("tours", Value::Array(tours))
            .viewed_by(&state, viewer.as_ref())?,
    ))
}

async fn tour_page(
    State(state): State<AppState>,
    Viewer(viewer): Viewer,
    Path(slug): Path<String>,
) -> ApiResult<Json<Page>> {
    let query = Query::new(Tour::COLLECTION)
        .filter(Tour::default_filter())
        .and(FilterExpr::eq("slug", slug))
        .limit(1);
    let id = state
        .db
        .find(&query)?
        .into_iter()
        .next()
        .and_then(|doc| doc.get("_id").and_then(Value::as_str).map(str::to_string))
        .ok_or_else(|| ApiError::NotFound("There is no tour with that name.".to_string()))?;

    let tour = get_document::<Tour>(&state.db, &id)?;
    let title = format!("{} Tour", tour["name"].as_str().unwrap_or_default());
    Ok(Json(
        Page::new(title)
            .with("tour", tour)
            .viewed_by(&state, viewer.as_ref())?,
    ))
}

async fn login_page(State(state): State<AppState>, Viewer(viewer): Viewer) -> ApiResult<Json<Page>> {
    Ok(Json(
        Page::new("Log into your account").viewed_by(&state, viewer.as_ref())?,
    ))
}

async fn account_page(
    State(state): State<AppState>,
    Principal(user): Principal,
) -> ApiResult<Json<Page>> {
    Ok(Json(Page::new("Your account").viewed_by(&state, Some(&user))?))
}

/// Form post from the account page; only name and email are taken
async fn submit_user_data(
    State(state): State<AppState>,
    Principal(user): Principal,
    AppForm(form): AppForm<HashMap<String, String>>,
) -> ApiResult<Json<Page>> {
    let patch: Map<String, Value> = form
        .into_iter()
        .filter(|(key, _)| key == "name" || key == "email")
        .map(|(key, value)| (key, Value::String(value)))
        .collect();
    let updated = state.auth.update_me(&user, Value::Object(patch))?;

    let mut page = Page::new("Your account");
    page.user = Some(updated);
    Ok(Json(page))
}
