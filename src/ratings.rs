//! # Rating Statistics
//!
//! Keeps `ratingsQuantity` / `ratingsAverage` of every tour in step with
//! its reviews.
//!
//! Creating a review recomputes its tour directly. Updates and deletes run
//! in two phases: [`RatingTarget::capture`] reads the tour id from the
//! stored review before the mutation, and the returned target is consumed
//! by [`RatingTarget::recompute`] once the mutation has been committed.

use serde_json::json;

use crate::models::tour::{round_rating, DEFAULT_RATINGS_AVERAGE};
use crate::models::{Resource, Review, Tour};
use crate::store::{Accumulator, Database, FilterExpr, GroupKey, Pipeline, StoreResult};

/// Statistics written onto a tour
#[derive(Debug, Clone, PartialEq)]
pub struct RatingStats {
    pub tour: String,
    pub quantity: u64,
    pub average: f64,
}

/// Tour whose statistics must be refreshed once a mutation commits
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RatingTarget {
    tour: String,
}

impl RatingTarget {
    /// Phase one: remember which tour the review belongs to
    pub fn capture(review: &Review) -> Option<Self> {
        review.tour.clone().map(|tour| Self { tour })
    }

    pub fn tour(&self) -> &str {
        &self.tour
    }

    /// Phase two: recompute after the mutation
    pub fn recompute(self, db: &Database) -> StoreResult<RatingStats> {
        calc_average_ratings(db, &self.tour)
    }
}

/// Aggregate all reviews of `tour_id` and write the result onto the tour
pub fn calc_average_ratings(db: &Database, tour_id: &str) -> StoreResult<RatingStats> {
    let pipeline = Pipeline::new()
        .matching(FilterExpr::eq("tour", tour_id).into())
        .group(
            GroupKey::Field("tour".into()),
            vec![
                ("nRating", Accumulator::Count),
                ("avgRating", Accumulator::Avg("rating".into())),
            ],
        );
    let groups = db.aggregate(Review::COLLECTION, &pipeline)?;

    let stats = match groups.first() {
        Some(group) => RatingStats {
            tour: tour_id.to_string(),
            quantity: group["nRating"].as_u64().unwrap_or(0),
            average: group["avgRating"]
                .as_f64()
                .map(round_rating)
                .unwrap_or(DEFAULT_RATINGS_AVERAGE),
        },
        None => RatingStats {
            tour: tour_id.to_string(),
            quantity: 0,
            average: DEFAULT_RATINGS_AVERAGE,
        },
    };

    let patch = json!({
        "ratingsQuantity": stats.quantity,
        "ratingsAverage": stats.average,
    });
    if db.find_by_id_and_update(Tour::COLLECTION, tour_id, &patch)?.is_none() {
        tracing::debug!(tour = tour_id, "rating stats computed for a missing tour");
    }
    tracing::debug!(
        tour = tour_id,
        quantity = stats.quantity,
        average = stats.average,
        "tour ratings recomputed"
    );
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use uuid::Uuid;

    fn setup() -> (Database, String) {
        let db = Database::in_memory();
        let tour = db
            .create(Tour::COLLECTION, json!({"name": "The Sea Explorer", "ratingsAverage": 4.5, "ratingsQuantity": 0}))
            .unwrap();
        let id = tour["_id"].as_str().unwrap().to_string();
        (db, id)
    }

    fn add_review(db: &Database, tour: &str, rating: f64) -> Value {
        db.create(
            Review::COLLECTION,
            json!({"review": "Lovely", "rating": rating, "tour": tour, "user": Uuid::new_v4().to_string()}),
        )
        .unwrap()
    }

    fn tour_stats(db: &Database, id: &str) -> (u64, f64) {
        let tour = db.find_by_id(Tour::COLLECTION, id).unwrap().unwrap();
        (
            tour["ratingsQuantity"].as_u64().unwrap(),
            tour["ratingsAverage"].as_f64().unwrap(),
        )
    }

    #[test]
    fn test_average_is_rounded_to_one_decimal() {
        let (db, tour) = setup();
        for rating in [5.0, 4.0, 4.0] {
            add_review(&db, &tour, rating);
        }

        let stats = calc_average_ratings(&db, &tour).unwrap();
        assert_eq!(stats.quantity, 3);
        assert_eq!(stats.average, 4.3);
        assert_eq!(tour_stats(&db, &tour), (3, 4.3));
    }

    #[test]
    fn test_only_reviews_of_the_tour_count() {
        let (db, tour) = setup();
        add_review(&db, &tour, 2.0);
        add_review(&db, &Uuid::new_v4().to_string(), 5.0);

        assert_eq!(calc_average_ratings(&db, &tour).unwrap().average, 2.0);
    }

    #[test]
    fn test_no_reviews_resets_defaults() {
        let (db, tour) = setup();
        db.find_by_id_and_update(Tour::COLLECTION, &tour, &json!({"ratingsQuantity": 7, "ratingsAverage": 3.1}))
            .unwrap();

        calc_average_ratings(&db, &tour).unwrap();
        assert_eq!(tour_stats(&db, &tour), (0, 4.5));
    }

    #[test]
    fn test_capture_then_recompute_after_delete() {
        let (db, tour) = setup();
        let kept = add_review(&db, &tour, 3.0);
        let removed = add_review(&db, &tour, 5.0);
        calc_average_ratings(&db, &tour).unwrap();

        let stored: Review = serde_json::from_value(removed.clone()).unwrap();
        let target = RatingTarget::capture(&stored).unwrap();
        assert_eq!(target.tour(), tour);

        db.find_by_id_and_delete(Review::COLLECTION, removed["_id"].as_str().unwrap())
            .unwrap();
        let stats = target.recompute(&db).unwrap();

        assert_eq!(stats.quantity, 1);
        assert_eq!(stats.average, kept["rating"].as_f64().unwrap());
    }
}
