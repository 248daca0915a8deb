//! Tour HTTP Routes
//!
//! CRUD from the handler factory plus the tour-specific reports: the
//! cheap-tours alias, statistics by difficulty, the monthly plan and the
//! geospatial lookups. Reviews of one tour are nested under `/:id/reviews`.

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Router;
use serde_json::{json, Value};

use super::guards::{protected, restricted};
use super::review_routes::{create_tour_review, get_tour_reviews};
use super::state::AppState;
use crate::auth::Access;
use crate::models::{present, Resource, Role, Tour};
use crate::rest_api::factory::{self, list_documents};
use crate::rest_api::{ApiError, ApiResult, ListResponse, QueryParams, SingleResponse};
use crate::store::geo::{self, EARTH_RADIUS_KM, EARTH_RADIUS_MI};
use crate::store::{
    Accumulator, Database, FilterExpr, FilterOperator, FilterSet, GroupKey, Pipeline, Projection,
    Query, SortKey,
};

/// Tour routes, mounted under `/api/v1/tours`
pub fn tour_routes(state: &AppState) -> Router<AppState> {
    let staff = Access::any_of([Role::Admin, Role::LeadGuide]);
    let planners = Access::any_of([Role::Admin, Role::LeadGuide, Role::Guide]);

    Router::new()
        .route("/top-5-cheap", get(top_five_cheap))
        .route("/tour-stats", get(tour_stats))
        .route(
            "/monthly-plan/:year",
            restricted(get(monthly_plan), state, planners),
        )
        .route(
            "/tours-within/:distance/center/:latlng/unit/:unit",
            get(tours_within),
        )
        .route("/distances/:latlng/unit/:unit", get(distances))
        .route(
            "/",
            get(factory::get_all::<Tour>).merge(restricted(
                post(factory::create_one::<Tour>),
                state,
                staff.clone(),
            )),
        )
        .route(
            "/:id",
            get(factory::get_one::<Tour>).merge(restricted(
                patch(factory::update_one::<Tour>).delete(factory::delete_one::<Tour>),
                state,
                staff,
            )),
        )
        .route(
            "/:id/reviews",
            protected(get(get_tour_reviews), state).merge(restricted(
                post(create_tour_review),
                state,
                Access::role(Role::User),
            )),
        )
}

// ==================
// Reports
// ==================

/// Distance unit of the geospatial routes; anything but `mi` is kilometres
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Miles,
    Kilometres,
}

impl Unit {
    pub fn parse(s: &str) -> Self {
        if s == "mi" {
            Unit::Miles
        } else {
            Unit::Kilometres
        }
    }

    /// Earth radius in this unit
    fn earth_radius(self) -> f64 {
        match self {
            Unit::Miles => EARTH_RADIUS_MI,
            Unit::Kilometres => EARTH_RADIUS_KM,
        }
    }

    /// Factor converting metres into this unit
    fn per_metre(self) -> f64 {
        match self {
            Unit::Miles => 0.000621371,
            Unit::Kilometres => 0.001,
        }
    }
}

/// `lat,lng` into a GeoJSON-ordered `[lng, lat]`
pub fn parse_lat_lng(latlng: &str) -> ApiResult<[f64; 2]> {
    let invalid = || {
        ApiError::BadRequest(
            "Please provide latitude and longitude in the format lat,lng.".to_string(),
        )
    };

    let (lat, lng) = latlng.split_once(',').ok_or_else(invalid)?;
    let lat: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let lng: f64 = lng.trim().parse().map_err(|_| invalid())?;
    Ok([lng, lat])
}

/// Statistics for well-rated tours, grouped by difficulty
pub fn tour_stats_pipeline() -> Pipeline {
    Pipeline::new()
        .matching(Tour::default_filter().and(FilterExpr::gte("ratingsAverage", 4.5)))
        .group(
            GroupKey::Field("difficulty".to_string()),
            vec![
                ("numTours", Accumulator::Count),
                ("numRatings", Accumulator::Sum("ratingsQuantity".to_string())),
                ("avgRating", Accumulator::Avg("ratingsAverage".to_string())),
                ("avgPrice", Accumulator::Avg("price".to_string())),
                ("minPrice", Accumulator::Min("price".to_string())),
                ("maxPrice", Accumulator::Max("price".to_string())),
            ],
        )
        .sort(vec![SortKey::asc("avgPrice")])
}

/// Tour starts per month of `year`, busiest month first
pub fn monthly_plan_pipeline(year: i32) -> Pipeline {
    let from = format!("{year:04}-01-01");
    let until = format!("{:04}-01-01", year + 1);

    Pipeline::new()
        .matching(Tour::default_filter())
        .unwind("startDates")
        .matching(
            FilterSet::from(FilterExpr::gte("startDates", from))
                .and(FilterExpr::new("startDates", FilterOperator::Lt, json!(until))),
        )
        .group(
            GroupKey::Month("startDates".to_string()),
            vec![
                ("numTourStarts", Accumulator::Count),
                ("tours", Accumulator::Push("name".to_string())),
            ],
        )
        .add_field("month", "_id")
        .project(Projection::Exclude(vec!["_id".to_string()]))
        .sort(vec![SortKey::desc("numTourStarts")])
        .limit(12)
}

/// Visible tours starting within `distance` of the centre
pub fn tours_within_radius(
    db: &Database,
    distance: f64,
    center: [f64; 2],
    unit: Unit,
) -> ApiResult<Vec<Value>> {
    let radius = distance / unit.earth_radius();
    let query = Query::new(Tour::COLLECTION)
        .filter(Tour::default_filter())
        .and(FilterExpr::within_sphere("startLocation", center, radius));

    db.find(&query)?
        .into_iter()
        .map(|doc| present::<Tour>(db, doc).map_err(ApiError::from))
        .collect()
}

/// `{_id, name, distance}` for every visible tour with a start location,
/// nearest first
pub fn tour_distances(db: &Database, center: [f64; 2], unit: Unit) -> ApiResult<Vec<Value>> {
    let query = Query::new(Tour::COLLECTION).filter(Tour::default_filter());

    let mut distances: Vec<(f64, Value)> = db
        .find(&query)?
        .into_iter()
        .filter_map(|doc| {
            let point = doc.get("startLocation").and_then(geo::point_of)?;
            let distance = geo::distance_meters(center, point) * unit.per_metre();
            Some((
                distance,
                json!({"_id": doc["_id"], "name": doc["name"], "distance": distance}),
            ))
        })
        .collect();

    distances.sort_by(|a, b| a.0.total_cmp(&b.0));
    Ok(distances.into_iter().map(|(_, doc)| doc).collect())
}

// ==================
// Handlers
// ==================

/// Five best-rated, cheapest tours
async fn top_five_cheap(
    State(state): State<AppState>,
    mut params: QueryParams,
) -> ApiResult<ListResponse> {
    params.insert("limit", "5");
    params.insert("sort", "-ratingsAverage,price");
    params.insert("fields", "name,price,ratingsAverage,summary,difficulty");
    let docs = list_documents::<Tour>(&state.db, &params, None)?;
    Ok(ListResponse::new(docs))
}

async fn tour_stats(State(state): State<AppState>) -> ApiResult<SingleResponse> {
    let stats = state.db.aggregate(Tour::COLLECTION, &tour_stats_pipeline())?;
    Ok(SingleResponse::keyed("stats", Value::Array(stats)))
}

async fn monthly_plan(
    State(state): State<AppState>,
    Path(year): Path<String>,
) -> ApiResult<SingleResponse> {
    let year: i32 = year.parse().map_err(|_| ApiError::Cast {
        path: "year".to_string(),
        value: year.clone(),
    })?;
    let plan = state
        .db
        .aggregate(Tour::COLLECTION, &monthly_plan_pipeline(year))?;
    Ok(SingleResponse::keyed("plan", Value::Array(plan)))
}

async fn tours_within(
    State(state): State<AppState>,
    Path((distance, latlng, unit)): Path<(String, String, String)>,
) -> ApiResult<ListResponse> {
    let center = parse_lat_lng(&latlng)?;
    let distance: f64 = distance.parse().map_err(|_| ApiError::Cast {
        path: "distance".to_string(),
        value: distance.clone(),
    })?;
    let tours = tours_within_radius(&state.db, distance, center, Unit::parse(&unit))?;
    Ok(ListResponse::new(tours))
}

async fn distances(
    State(state): State<AppState>,
    Path((latlng, unit)): Path<(String, String)>,
) -> ApiResult<SingleResponse> {
    let center = parse_lat_lng(&latlng)?;
    let docs = tour_distances(&state.db, center, Unit::parse(&unit))?;
    Ok(SingleResponse::new(Value::Array(docs)))
}
