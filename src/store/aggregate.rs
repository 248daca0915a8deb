//! # Aggregation Pipelines
//!
//! A small pipeline engine over JSON documents: match, unwind, group,
//! sort, limit and project stages executed in order.

use chrono::{DateTime, Datelike, Utc};
use serde_json::{Map, Value};

use super::filter::{compare_json_values, lookup, FilterSet};
use super::query::{sort_documents, Projection, SortKey};

/// Grouping key for a `Group` stage
#[derive(Debug, Clone, PartialEq)]
pub enum GroupKey {
    /// Everything falls in one group (`_id: null`)
    All,

    /// Group by the value at a path
    Field(String),

    /// Group by the calendar month (1-12) of an RFC 3339 date at a path
    Month(String),
}

/// Accumulator computed for each group
#[derive(Debug, Clone, PartialEq)]
pub enum Accumulator {
    Count,
    Sum(String),
    Avg(String),
    Min(String),
    Max(String),
    /// Collect the values at a path into an array
    Push(String),
}

/// Pipeline stage
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Match(FilterSet),
    Unwind(String),
    Group {
        key: GroupKey,
        fields: Vec<(String, Accumulator)>,
    },
    AddField {
        name: String,
        from: String,
    },
    Sort(Vec<SortKey>),
    Limit(usize),
    Project(Projection),
}

/// Ordered list of stages
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn matching(mut self, filter: FilterSet) -> Self {
        self.stages.push(Stage::Match(filter));
        self
    }

    pub fn unwind(mut self, field: impl Into<String>) -> Self {
        self.stages.push(Stage::Unwind(field.into()));
        self
    }

    pub fn group(mut self, key: GroupKey, fields: Vec<(&str, Accumulator)>) -> Self {
        let fields = fields
            .into_iter()
            .map(|(name, acc)| (name.to_string(), acc))
            .collect();
        self.stages.push(Stage::Group { key, fields });
        self
    }

    /// Copy the value at `from` into a new top-level field
    pub fn add_field(mut self, name: impl Into<String>, from: impl Into<String>) -> Self {
        self.stages.push(Stage::AddField {
            name: name.into(),
            from: from.into(),
        });
        self
    }

    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.stages.push(Stage::Sort(keys));
        self
    }

    pub fn limit(mut self, n: usize) -> Self {
        self.stages.push(Stage::Limit(n));
        self
    }

    pub fn project(mut self, projection: Projection) -> Self {
        self.stages.push(Stage::Project(projection));
        self
    }

    /// Execute all stages over the given documents
    pub fn run(&self, docs: Vec<Value>) -> Vec<Value> {
        self.stages.iter().fold(docs, |docs, stage| match stage {
            Stage::Match(filter) => docs.into_iter().filter(|d| filter.matches(d)).collect(),
            Stage::Unwind(field) => unwind(docs, field),
            Stage::Group { key, fields } => group(docs, key, fields),
            Stage::AddField { name, from } => docs
                .into_iter()
                .map(|mut doc| {
                    let value = lookup(&doc, from).cloned().unwrap_or(Value::Null);
                    if let Some(obj) = doc.as_object_mut() {
                        obj.insert(name.clone(), value);
                    }
                    doc
                })
                .collect(),
            Stage::Sort(keys) => {
                let mut docs = docs;
                sort_documents(&mut docs, keys);
                docs
            }
            Stage::Limit(n) => docs.into_iter().take(*n).collect(),
            Stage::Project(projection) => docs.into_iter().map(|d| projection.apply(d)).collect(),
        })
    }
}

fn unwind(docs: Vec<Value>, field: &str) -> Vec<Value> {
    let mut out = Vec::new();
    for doc in docs {
        let Some(Value::Array(items)) = doc.get(field).cloned() else {
            continue;
        };
        for item in items {
            let mut copy = doc.clone();
            if let Some(obj) = copy.as_object_mut() {
                obj.insert(field.to_string(), item);
            }
            out.push(copy);
        }
    }
    out
}

fn group_key(doc: &Value, key: &GroupKey) -> Value {
    match key {
        GroupKey::All => Value::Null,
        GroupKey::Field(path) => lookup(doc, path).cloned().unwrap_or(Value::Null),
        GroupKey::Month(path) => lookup(doc, path)
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| Value::from(d.with_timezone(&Utc).month()))
            .unwrap_or(Value::Null),
    }
}

fn group(docs: Vec<Value>, key: &GroupKey, fields: &[(String, Accumulator)]) -> Vec<Value> {
    // Groups keep first-seen order
    let mut groups: Vec<(Value, Vec<Value>)> = Vec::new();
    for doc in docs {
        let k = group_key(&doc, key);
        match groups.iter_mut().find(|(existing, _)| existing == &k) {
            Some((_, members)) => members.push(doc),
            None => groups.push((k, vec![doc])),
        }
    }

    groups
        .into_iter()
        .map(|(k, members)| {
            let mut out = Map::new();
            out.insert("_id".to_string(), k);
            for (name, acc) in fields {
                out.insert(name.clone(), accumulate(&members, acc));
            }
            Value::Object(out)
        })
        .collect()
}

fn numbers<'a>(members: &'a [Value], path: &'a str) -> impl Iterator<Item = f64> + 'a {
    members
        .iter()
        .filter_map(move |m| lookup(m, path).and_then(Value::as_f64))
}

fn accumulate(members: &[Value], acc: &Accumulator) -> Value {
    match acc {
        Accumulator::Count => Value::from(members.len()),
        Accumulator::Sum(path) => Value::from(numbers(members, path).sum::<f64>()),
        Accumulator::Avg(path) => {
            let values: Vec<f64> = numbers(members, path).collect();
            if values.is_empty() {
                Value::Null
            } else {
                Value::from(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Accumulator::Min(path) | Accumulator::Max(path) => {
            let want_max = matches!(acc, Accumulator::Max(_));
            members
                .iter()
                .filter_map(|m| lookup(m, path))
                .filter(|v| !v.is_null())
                .fold(None::<&Value>, |best, v| match best {
                    None => Some(v),
                    Some(b) => {
                        let ord = compare_json_values(v, b);
                        if (want_max && ord.is_gt()) || (!want_max && ord.is_lt()) {
                            Some(v)
                        } else {
                            Some(b)
                        }
                    }
                })
                .cloned()
                .unwrap_or(Value::Null)
        }
        Accumulator::Push(path) => Value::Array(
            members
                .iter()
                .filter_map(|m| lookup(m, path).cloned())
                .collect(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::filter::FilterExpr;
    use serde_json::json;

    #[test]
    fn test_match_then_group_count_and_avg() {
        let reviews = vec![
            json!({"tour": "t1", "rating": 5}),
            json!({"tour": "t1", "rating": 4}),
            json!({"tour": "t2", "rating": 1}),
        ];

        let stats = Pipeline::new()
            .matching(FilterExpr::eq("tour", "t1").into())
            .group(
                GroupKey::Field("tour".into()),
                vec![
                    ("nRating", Accumulator::Count),
                    ("avgRating", Accumulator::Avg("rating".into())),
                ],
            )
            .run(reviews);

        assert_eq!(stats, vec![json!({"_id": "t1", "nRating": 2, "avgRating": 4.5})]);
    }

    #[test]
    fn test_group_min_max_sum() {
        let tours = vec![
            json!({"difficulty": "easy", "price": 397, "ratingsQuantity": 2}),
            json!({"difficulty": "easy", "price": 497, "ratingsQuantity": 3}),
        ];

        let stats = Pipeline::new()
            .group(
                GroupKey::Field("difficulty".into()),
                vec![
                    ("minPrice", Accumulator::Min("price".into())),
                    ("maxPrice", Accumulator::Max("price".into())),
                    ("numRatings", Accumulator::Sum("ratingsQuantity".into())),
                ],
            )
            .run(tours);

        assert_eq!(stats[0]["minPrice"], 397);
        assert_eq!(stats[0]["maxPrice"], 497);
        assert_eq!(stats[0]["numRatings"], 5.0);
    }

    #[test]
    fn test_unwind_and_group_by_month() {
        let tours = vec![
            json!({"name": "A", "startDates": ["2021-04-25T09:00:00Z", "2021-07-20T09:00:00Z"]}),
            json!({"name": "B", "startDates": ["2021-07-01T09:00:00Z"]}),
        ];

        let plan = Pipeline::new()
            .unwind("startDates")
            .group(
                GroupKey::Month("startDates".into()),
                vec![
                    ("numTourStarts", Accumulator::Count),
                    ("tours", Accumulator::Push("name".into())),
                ],
            )
            .add_field("month", "_id")
            .sort(vec![SortKey::desc("numTourStarts")])
            .limit(1)
            .run(tours);

        assert_eq!(
            plan,
            vec![json!({"_id": 7, "month": 7, "numTourStarts": 2, "tours": ["A", "B"]})]
        );
    }

    #[test]
    fn test_avg_of_empty_group_is_null() {
        let value = accumulate(&[json!({"x": 1})], &Accumulator::Avg("rating".into()));
        assert!(value.is_null());
    }
}
