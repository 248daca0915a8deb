//! # Review
//!
//! Each review belongs to one tour and one user; a user reviews a tour at
//! most once. Every create, update and delete refreshes the rating
//! statistics of the affected tour (see [`crate::ratings`]).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{is_uuid, present_text, Resource, User, Violations};
use crate::ratings::{self, RatingTarget};
use crate::store::{Database, StoreResult};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub review: Option<String>,

    pub rating: Option<f64>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    /// Tour id
    pub tour: Option<String>,

    /// User id
    pub user: Option<String>,
}

impl Resource for Review {
    const COLLECTION: &'static str = "reviews";

    type Captured = Option<RatingTarget>;

    fn validate(&self) -> StoreResult<()> {
        let mut v = Violations::default();
        v.check(present_text(&self.review), "Review can not be empty!");
        match self.rating {
            Some(rating) => v.check(
                (1.0..=5.0).contains(&rating),
                format!("Rating ({rating}) must be between 1 and 5"),
            ),
            None => v.check(false, "A review must have a rating"),
        }
        v.check(
            self.tour.as_deref().map(is_uuid).unwrap_or(false),
            "Review must belong to a tour.",
        );
        v.check(
            self.user.as_deref().map(is_uuid).unwrap_or(false),
            "Review must belong to a user",
        );
        v.finish()
    }

    fn before_save(&mut self) {
        if let Some(text) = &mut self.review {
            *text = text.trim().to_string();
        }
    }

    /// Expand the author into `{_id, name, photo}`
    fn populate(db: &Database, doc: &mut Value) -> StoreResult<()> {
        let Some(user_id) = doc.get("user").and_then(Value::as_str).map(str::to_string) else {
            return Ok(());
        };
        let Some(user) = db.find_by_id(User::COLLECTION, &user_id)? else {
            return Ok(());
        };

        let summary: Map<String, Value> = ["_id", "name", "photo"]
            .into_iter()
            .filter_map(|field| user.get(field).map(|v| (field.to_string(), v.clone())))
            .collect();
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("user".to_string(), Value::Object(summary));
        }
        Ok(())
    }

    fn after_create(&self, db: &Database) -> StoreResult<()> {
        if let Some(tour) = &self.tour {
            ratings::calc_average_ratings(db, tour)?;
        }
        Ok(())
    }

    fn capture(&self) -> Self::Captured {
        RatingTarget::capture(self)
    }

    fn after_mutation(
        db: &Database,
        captured: Self::Captured,
        updated: Option<&Self>,
    ) -> StoreResult<()> {
        let previous = match captured {
            Some(target) => Some(target.recompute(db)?.tour),
            None => None,
        };

        // A review moved to another tour changes that tour's stats as well
        if let Some(tour) = updated.and_then(|r| r.tour.as_deref()) {
            if previous.as_deref() != Some(tour) {
                ratings::calc_average_ratings(db, tour)?;
            }
        }
        Ok(())
    }
}
