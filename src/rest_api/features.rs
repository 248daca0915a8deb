//! # API Features
//!
//! Turns a flat query string into filter, sort, field-limit and pagination
//! steps on a [`Query`]. Steps consume and return the builder so they chain:
//!
//! ```ignore
//! let query = ApiFeatures::new(Query::new("tours"), &params)
//!     .filter()?
//!     .sort()
//!     .limit_fields()
//!     .paginate()
//!     .into_query();
//! ```
//!
//! Nothing touches the store until the caller executes the query.
//!
//! A repeated parameter keeps its last value, except for the keys in
//! [`MULTI_VALUE_KEYS`]: `?duration=5&duration=9` matches either duration.

use std::collections::{BTreeMap, HashMap};

use serde_json::Value;

use super::errors::{ApiError, ApiResult};
use crate::store::{FilterExpr, FilterOperator, Projection, Query, SortKey};

/// Default page number
pub const DEFAULT_PAGE: usize = 1;

/// Default page size
pub const DEFAULT_LIMIT: usize = 100;

/// Keys that steer the query rather than filter it
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Sort applied when the client gives none
const DEFAULT_SORT: &str = "-createdAt";

/// Fields that may be repeated in a query string
pub const MULTI_VALUE_KEYS: [&str; 6] = [
    "duration",
    "ratingsAverage",
    "ratingsQuantity",
    "maxGroupSize",
    "difficulty",
    "price",
];

/// Query-string parameters in key order, every value of each key kept
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    values: BTreeMap<String, Vec<String>>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last value given for `key`
    pub fn get(&self, key: &str) -> Option<&String> {
        self.values.get(key).and_then(|v| v.last())
    }

    /// Set `key` to exactly one value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), vec![value.into()]);
    }

    /// Values that take part in filtering: all of them for repeatable
    /// fields, the last one otherwise
    fn effective(&self, key: &str) -> &[String] {
        let values = self.values.get(key).map(Vec::as_slice).unwrap_or_default();
        let field = split_operator(key).map(|(field, _)| field).unwrap_or(key);
        if MULTI_VALUE_KEYS.contains(&field) {
            values
        } else {
            values.len().checked_sub(1).map(|last| &values[last..]).unwrap_or_default()
        }
    }
}

impl FromIterator<(String, String)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(pairs: I) -> Self {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.values.entry(key).or_default().push(value);
        }
        params
    }
}

impl From<HashMap<String, String>> for QueryParams {
    fn from(map: HashMap<String, String>) -> Self {
        map.into_iter().collect()
    }
}

/// Query builder over one set of request parameters
#[derive(Debug, Clone)]
pub struct ApiFeatures<'a> {
    query: Query,
    params: &'a QueryParams,
}

impl<'a> ApiFeatures<'a> {
    pub fn new(query: Query, params: &'a QueryParams) -> Self {
        Self { query, params }
    }

    /// Apply every non-reserved parameter as a filter.
    ///
    /// `price[gte]=500` becomes `price >= 500`; other bracket operators
    /// are rejected.
    pub fn filter(mut self) -> ApiResult<Self> {
        let params = self.params;
        let keys: Vec<&String> = params
            .values
            .keys()
            .filter(|key| !RESERVED_KEYS.contains(&key.as_str()))
            .collect();

        for key in keys {
            match params.effective(key) {
                [] => {}
                [value] => {
                    let filter = parse_filter(key, value)?;
                    self.query = self.query.and(filter);
                }
                values => {
                    for filter in parse_repeated(key, values)? {
                        self.query = self.query.and(filter);
                    }
                }
            }
        }
        Ok(self)
    }

    /// `sort=-price,ratingsAverage`; newest first by default
    pub fn sort(mut self) -> Self {
        let spec = self
            .params
            .get("sort")
            .map(String::as_str)
            .unwrap_or(DEFAULT_SORT);
        let keys: Vec<SortKey> = spec.split(',').filter_map(SortKey::parse).collect();

        let keys = if keys.is_empty() {
            SortKey::parse(DEFAULT_SORT).into_iter().collect()
        } else {
            keys
        };
        self.query = self.query.sort(keys);
        self
    }

    /// `fields=name,price` projects; `fields=-summary` excludes.
    /// Without it only `__v` is dropped.
    pub fn limit_fields(mut self) -> Self {
        let projection = match self.params.get("fields") {
            Some(spec) => parse_fields(spec),
            None => None,
        };
        let projection =
            projection.unwrap_or_else(|| Projection::Exclude(vec!["__v".to_string()]));
        self.query = self.query.select(projection);
        self
    }

    /// `page` and `limit` become skip/limit; missing, non-numeric or zero
    /// values fall back to page 1 and limit 100
    pub fn paginate(mut self) -> Self {
        let page = positive(self.params.get("page")).unwrap_or(DEFAULT_PAGE);
        let limit = positive(self.params.get("limit")).unwrap_or(DEFAULT_LIMIT);
        let skip = (page - 1).saturating_mul(limit);

        self.query = self.query.skip(skip).limit(limit);
        self
    }

    pub fn into_query(self) -> Query {
        self.query
    }
}

fn positive(value: Option<&String>) -> Option<usize> {
    value
        .and_then(|v| v.trim().parse::<usize>().ok())
        .filter(|n| *n > 0)
}

/// Parse the fields parameter into a projection
fn parse_fields(spec: &str) -> Option<Projection> {
    let fields: Vec<&str> = spec
        .split(',')
        .map(str::trim)
        .filter(|f| !f.is_empty())
        .collect();
    if fields.is_empty() {
        return None;
    }

    if fields.iter().all(|f| f.starts_with('-')) {
        Some(Projection::Exclude(
            fields.iter().map(|f| f.trim_start_matches('-').to_string()).collect(),
        ))
    } else {
        Some(Projection::Include(
            fields
                .iter()
                .filter(|f| !f.starts_with('-'))
                .map(|f| f.to_string())
                .collect(),
        ))
    }
}

/// Split `price[gte]` into field and operator
fn split_operator(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let inner = key[open + 1..].strip_suffix(']')?;
    Some((&key[..open], inner))
}

/// Parse a filter expression from key=value
fn parse_filter(key: &str, value: &str) -> ApiResult<FilterExpr> {
    match split_operator(key) {
        Some((field, op)) if !field.is_empty() => {
            let operator = FilterOperator::from_comparison(op).ok_or_else(|| {
                ApiError::BadRequest(format!("Invalid filter operator: {op}"))
            })?;
            Ok(FilterExpr::new(field, operator, parse_filter_value(value)))
        }
        _ => Ok(FilterExpr::eq(key, parse_filter_value(value))),
    }
}

/// A repeated equality becomes one membership test; repeated comparisons
/// all apply
fn parse_repeated(key: &str, values: &[String]) -> ApiResult<Vec<FilterExpr>> {
    if split_operator(key).is_some() {
        return values.iter().map(|value| parse_filter(key, value)).collect();
    }
    let candidates = values.iter().map(|v| parse_filter_value(v)).collect();
    Ok(vec![FilterExpr::in_list(key, candidates)])
}

/// Type a raw query value: null, booleans, integers, floats, else string
fn parse_filter_value(value: &str) -> Value {
    if value == "null" {
        return Value::Null;
    }

    if value == "true" {
        return Value::Bool(true);
    }
    if value == "false" {
        return Value::Bool(false);
    }

    if let Ok(n) = value.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(n) = value.parse::<f64>() {
        if let Some(num) = serde_json::Number::from_f64(n) {
            return Value::Number(num);
        }
    }

    Value::String(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn build(p: &QueryParams) -> ApiResult<Query> {
        Ok(ApiFeatures::new(Query::new("tours"), p)
            .filter()?
            .sort()
            .limit_fields()
            .paginate()
            .into_query())
    }

    #[test]
    fn test_defaults() {
        let query = build(&QueryParams::new()).unwrap();

        assert!(query.filter.is_empty());
        assert_eq!(query.sort, vec![SortKey::desc("createdAt")]);
        assert_eq!(query.projection, Projection::Exclude(vec!["__v".into()]));
        assert_eq!(query.skip, 0);
        assert_eq!(query.limit, Some(DEFAULT_LIMIT));
    }

    #[test]
    fn test_reserved_keys_are_not_filters() {
        let p = params(&[("page", "2"), ("sort", "price"), ("limit", "10"), ("fields", "name")]);
        assert!(build(&p).unwrap().filter.is_empty());
    }

    #[test]
    fn test_comparison_suffixes() {
        let p = params(&[("duration[gte]", "5"), ("difficulty", "easy"), ("price[lt]", "1500")]);
        let query = build(&p).unwrap();

        assert_eq!(
            query.filter.filters,
            vec![
                FilterExpr::eq("difficulty", "easy"),
                FilterExpr::gte("duration", 5),
                FilterExpr::new("price", FilterOperator::Lt, json!(1500)),
            ]
        );
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let p = params(&[("price[ne]", "500")]);
        let err = build(&p).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(_)));
        assert_eq!(err.status_code(), axum::http::StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_value_typing() {
        assert_eq!(parse_filter_value("5"), json!(5));
        assert_eq!(parse_filter_value("4.7"), json!(4.7));
        assert_eq!(parse_filter_value("true"), json!(true));
        assert_eq!(parse_filter_value("null"), Value::Null);
        assert_eq!(parse_filter_value("easy"), json!("easy"));
    }

    #[test]
    fn test_sort_keys() {
        let p = params(&[("sort", "-ratingsAverage,price")]);
        assert_eq!(
            build(&p).unwrap().sort,
            vec![SortKey::desc("ratingsAverage"), SortKey::asc("price")]
        );
    }

    #[test]
    fn test_fields_projection() {
        let include = build(&params(&[("fields", "name,duration,price")])).unwrap();
        assert_eq!(
            include.projection,
            Projection::Include(vec!["name".into(), "duration".into(), "price".into()])
        );

        let exclude = build(&params(&[("fields", "-summary,-images")])).unwrap();
        assert_eq!(
            exclude.projection,
            Projection::Exclude(vec!["summary".into(), "images".into()])
        );
    }

    #[test]
    fn test_pagination() {
        let query = build(&params(&[("page", "3"), ("limit", "10")])).unwrap();
        assert_eq!(query.skip, 20);
        assert_eq!(query.limit, Some(10));
    }

    #[test]
    fn test_invalid_pagination_falls_back() {
        let query = build(&params(&[("page", "0"), ("limit", "abc")])).unwrap();
        assert_eq!(query.skip, 0);
        assert_eq!(query.limit, Some(DEFAULT_LIMIT));
    }

    #[test]
    fn test_repeated_parameters() {
        let p = params(&[
            ("difficulty", "easy"),
            ("difficulty", "medium"),
            ("name", "The Forest Hiker"),
            ("name", "The Sea Explorer"),
            ("price[gte]", "400"),
            ("price[gte]", "500"),
        ]);
        let query = build(&p).unwrap();

        assert_eq!(
            query.filter.filters,
            vec![
                FilterExpr::in_list("difficulty", vec![json!("easy"), json!("medium")]),
                FilterExpr::eq("name", "The Sea Explorer"),
                FilterExpr::gte("price", 400),
                FilterExpr::gte("price", 500),
            ]
        );
    }

    #[test]
    fn test_query_params_last_value_wins() {
        let mut p = params(&[("sort", "price"), ("sort", "-price")]);
        assert_eq!(p.get("sort").map(String::as_str), Some("-price"));

        p.insert("sort", "name");
        assert_eq!(p.get("sort").map(String::as_str), Some("name"));
        assert_eq!(p.effective("sort").len(), 1);
    }

    #[test]
    fn test_building_twice_is_idempotent() {
        let p = params(&[
            ("duration[gte]", "5"),
            ("difficulty", "easy"),
            ("price[lte]", "1000"),
            ("sort", "price"),
            ("page", "2"),
        ]);
        assert_eq!(build(&p).unwrap(), build(&p).unwrap());
    }
}
