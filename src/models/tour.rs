//! # Tour

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{is_uuid, present, present_text, slugify, Related, Resource, Review, User, Violations};
use crate::store::{Database, FilterExpr, FilterSet, StoreResult};

/// Average assigned to tours without reviews
pub const DEFAULT_RATINGS_AVERAGE: f64 = 4.5;

const NAME_MIN: usize = 10;
const NAME_MAX: usize = 40;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    Medium,
    Difficult,
}

/// GeoJSON geometry type; only points are stored
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum GeoKind {
    #[default]
    Point,
}

/// A GeoJSON point with descriptive fields
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(rename = "type", default)]
    pub kind: GeoKind,

    /// `[lng, lat]`
    pub coordinates: Vec<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<u32>,
}

impl Location {
    fn is_valid(&self) -> bool {
        match self.coordinates.as_slice() {
            [lng, lat] => (-180.0..=180.0).contains(lng) && (-90.0..=90.0).contains(lat),
            _ => false,
        }
    }
}

fn default_ratings_average() -> f64 {
    DEFAULT_RATINGS_AVERAGE
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tour {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    pub name: Option<String>,

    #[serde(default)]
    pub slug: String,

    pub duration: Option<u32>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_group_size: Option<u32>,

    pub difficulty: Option<Difficulty>,

    #[serde(default = "default_ratings_average")]
    pub ratings_average: f64,

    #[serde(default)]
    pub ratings_quantity: u64,

    pub price: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_discount: Option<f64>,

    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    pub image_cover: Option<String>,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub start_dates: Vec<DateTime<Utc>>,

    #[serde(default)]
    pub secret_tour: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_location: Option<Location>,

    #[serde(default)]
    pub locations: Vec<Location>,

    /// User ids
    #[serde(default)]
    pub guides: Vec<String>,
}

/// Round to one decimal place
pub fn round_rating(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn present_review(db: &Database, doc: Value) -> StoreResult<Value> {
    present::<Review>(db, doc)
}

impl Resource for Tour {
    const COLLECTION: &'static str = "tours";
    const HIDDEN: &'static [&'static str] = &["createdAt"];
    const PROTECTED: &'static [&'static str] = &["ratingsAverage", "ratingsQuantity"];
    const RELATED: Option<Related> = Some(Related {
        field: "reviews",
        collection: Review::COLLECTION,
        foreign_field: "tour",
        present: present_review,
    });

    type Captured = ();

    fn validate(&self) -> StoreResult<()> {
        let mut v = Violations::default();

        match self.name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => {
                let len = name.chars().count();
                v.check(
                    len <= NAME_MAX,
                    "A tour name must have less or equal then 40 characters",
                );
                v.check(
                    len >= NAME_MIN,
                    "A tour name must have more or equal then 10 characters",
                );
            }
            _ => v.check(false, "A tour must have a name"),
        }
        v.check(self.duration.is_some(), "A tour must have a duration");
        v.check(self.difficulty.is_some(), "A tour must have a difficulty");
        v.check(
            (1.0..=5.0).contains(&self.ratings_average),
            if self.ratings_average < 1.0 {
                "Rating must be above 1.0"
            } else {
                "Rating must be below 5.0"
            },
        );
        match self.price {
            Some(price) => {
                if let Some(discount) = self.price_discount {
                    v.check(
                        discount < price,
                        format!("Discount price ({discount}) should be below regular price"),
                    );
                }
            }
            None => v.check(false, "A tour must have a price"),
        }
        v.check(present_text(&self.summary), "A tour must have a summary");
        v.check(present_text(&self.image_cover), "A tour must have a cover image");
        v.check(
            self.start_location.as_ref().map(Location::is_valid).unwrap_or(true)
                && self.locations.iter().all(Location::is_valid),
            "Locations need [lng, lat] coordinates",
        );
        v.check(
            self.guides.iter().all(|g| is_uuid(g)),
            "Guides must be user ids",
        );

        v.finish()
    }

    fn before_save(&mut self) {
        for field in [&mut self.name, &mut self.summary, &mut self.description] {
            if let Some(text) = field {
                *text = text.trim().to_string();
            }
        }
        self.slug = self.name.as_deref().map(slugify).unwrap_or_default();
        self.ratings_average = round_rating(self.ratings_average);
    }

    fn default_filter() -> FilterSet {
        FilterExpr::ne("secretTour", true).into()
    }

    /// Expand guide ids into user summaries
    fn populate(db: &Database, doc: &mut Value) -> StoreResult<()> {
        let Some(ids) = doc.get("guides").and_then(Value::as_array).cloned() else {
            return Ok(());
        };

        let mut guides = Vec::with_capacity(ids.len());
        for id in ids.iter().filter_map(Value::as_str) {
            if let Some(mut user) = db.find_by_id(User::COLLECTION, id)? {
                if let Some(obj) = user.as_object_mut() {
                    obj.remove("__v");
                    obj.remove("passwordChangedAt");
                }
                guides.push(present::<User>(db, user)?);
            }
        }
        if let Some(obj) = doc.as_object_mut() {
            obj.insert("guides".to_string(), Value::Array(guides));
        }
        Ok(())
    }

    fn decorate(doc: &mut Value) {
        let weeks = doc.get("duration").and_then(Value::as_f64).map(|d| d / 7.0);
        if let (Some(obj), Some(weeks)) = (doc.as_object_mut(), weeks) {
            obj.insert("durationWeeks".to_string(), Value::from(weeks));
        }
    }

    fn capture(&self) -> Self::Captured {}
}
