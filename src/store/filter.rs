//! # Filter Expressions
//!
//! Conditions evaluated against stored JSON documents. Field names may be
//! dotted paths (`startLocation.coordinates`).

use std::cmp::Ordering;

use serde_json::Value;

use super::geo;

/// Filter operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOperator {
    /// Equals (array fields match when any element equals)
    Eq,

    /// Not equals (missing fields match)
    Ne,

    /// Greater than
    Gt,

    /// Greater than or equal
    Gte,

    /// Less than
    Lt,

    /// Less than or equal
    Lte,

    /// Value in list
    In,

    /// GeoJSON point inside a sphere; operand is `[[lng, lat], radius_radians]`
    WithinSphere,
}

impl FilterOperator {
    /// Get the operator string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::WithinSphere => "geoWithin",
        }
    }

    /// Parse one of the comparison operators accepted in query strings
    pub fn from_comparison(s: &str) -> Option<Self> {
        match s {
            "gt" => Some(FilterOperator::Gt),
            "gte" => Some(FilterOperator::Gte),
            "lt" => Some(FilterOperator::Lt),
            "lte" => Some(FilterOperator::Lte),
            _ => None,
        }
    }
}

/// A filter expression
#[derive(Debug, Clone, PartialEq)]
pub struct FilterExpr {
    /// Field to filter on
    pub field: String,

    /// Comparison operator
    pub operator: FilterOperator,

    /// Value to compare against
    pub value: Value,
}

impl FilterExpr {
    /// Create a new filter expression
    pub fn new(field: impl Into<String>, operator: FilterOperator, value: Value) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
        }
    }

    /// Create an equality filter
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Eq, value.into())
    }

    /// Create a not-equal filter
    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Ne, value.into())
    }

    /// Create a greater-than-or-equal filter
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, FilterOperator::Gte, value.into())
    }

    /// Create an "in list" filter
    pub fn in_list(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::new(field, FilterOperator::In, Value::Array(values))
    }

    /// Match GeoJSON points within `radius` radians of `[lng, lat]`
    pub fn within_sphere(field: impl Into<String>, center: [f64; 2], radius: f64) -> Self {
        Self::new(
            field,
            FilterOperator::WithinSphere,
            serde_json::json!([[center[0], center[1]], radius]),
        )
    }

    /// Check if a document matches this filter
    pub fn matches(&self, doc: &Value) -> bool {
        let field_value = match lookup(doc, &self.field) {
            Some(v) if !v.is_null() => v,
            _ => {
                return match self.operator {
                    FilterOperator::Eq => self.value.is_null(),
                    FilterOperator::Ne => !self.value.is_null(),
                    FilterOperator::In => self
                        .value
                        .as_array()
                        .map(|arr| arr.iter().any(Value::is_null))
                        .unwrap_or(false),
                    _ => false,
                }
            }
        };

        match self.operator {
            FilterOperator::Eq => values_match(field_value, &self.value),
            FilterOperator::Ne => !values_match(field_value, &self.value),
            FilterOperator::Gt => ordered(field_value, &self.value, |o| o.is_gt()),
            FilterOperator::Gte => ordered(field_value, &self.value, |o| o.is_ge()),
            FilterOperator::Lt => ordered(field_value, &self.value, |o| o.is_lt()),
            FilterOperator::Lte => ordered(field_value, &self.value, |o| o.is_le()),
            FilterOperator::In => match self.value.as_array() {
                Some(arr) => arr.iter().any(|v| values_match(field_value, v)),
                None => false,
            },
            FilterOperator::WithinSphere => {
                let Some(point) = geo::point_of(field_value) else {
                    return false;
                };
                match sphere_operand(&self.value) {
                    Some((center, radius)) => geo::central_angle(point, center) <= radius,
                    None => false,
                }
            }
        }
    }
}

fn sphere_operand(value: &Value) -> Option<([f64; 2], f64)> {
    let parts = value.as_array()?;
    let center = parts.first()?.as_array()?;
    let lng = center.first()?.as_f64()?;
    let lat = center.get(1)?.as_f64()?;
    let radius = parts.get(1)?.as_f64()?;
    Some(([lng, lat], radius))
}

/// Resolve a dotted path inside a document
pub fn lookup<'a>(doc: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(doc, |current, segment| current.get(segment))
}

/// Equality with numeric coercion; array fields match when any element does
fn values_match(field_value: &Value, operand: &Value) -> bool {
    if let (Value::Array(items), false) = (field_value, operand.is_array()) {
        return items.iter().any(|item| scalar_eq(item, operand));
    }
    scalar_eq(field_value, operand)
}

fn scalar_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

fn ordered(field_value: &Value, operand: &Value, pred: impl Fn(Ordering) -> bool) -> bool {
    match (field_value, operand) {
        (Value::Number(_), Value::Number(_)) | (Value::String(_), Value::String(_)) => {
            pred(compare_json_values(field_value, operand))
        }
        _ => false,
    }
}

/// Total order used for comparisons and sorting.
///
/// Missing and null sort first, then booleans, numbers, strings, and
/// everything else compares equal.
pub fn compare_json_values(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            let x = x.as_f64().unwrap_or(0.0);
            let y = y.as_f64().unwrap_or(0.0);
            x.partial_cmp(&y).unwrap_or(Ordering::Equal)
        }
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => rank(a).cmp(&rank(b)),
    }
}

/// A set of filters combined with AND logic
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    pub filters: Vec<FilterExpr>,
}

impl FilterSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, filter: FilterExpr) -> Self {
        self.filters.push(filter);
        self
    }

    /// Append every filter of another set
    pub fn merge(mut self, other: FilterSet) -> Self {
        self.filters.extend(other.filters);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Check if a document matches all filters
    pub fn matches(&self, doc: &Value) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

impl From<FilterExpr> for FilterSet {
    fn from(filter: FilterExpr) -> Self {
        FilterSet::new().and(filter)
    }
}
