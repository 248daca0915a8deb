//! # Query Handle
//!
//! A lazily executed query over one collection. Building a `Query` does no
//! I/O; `Database::find` runs it as filter → sort → skip/limit → project.

use serde_json::{Map, Value};

use super::filter::{compare_json_values, lookup, FilterExpr, FilterSet};

/// One sort key
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: false,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            descending: true,
        }
    }

    /// Parse `price` / `-price`
    pub fn parse(spec: &str) -> Option<Self> {
        let spec = spec.trim();
        match spec.strip_prefix('-') {
            Some("") => None,
            Some(field) => Some(Self::desc(field)),
            None if spec.is_empty() => None,
            None => Some(Self::asc(spec)),
        }
    }
}

/// Field projection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    /// Every field
    #[default]
    All,

    /// Only these fields (`_id` is always kept). Dotted paths select
    /// nested fields and keep their enclosing objects.
    Include(Vec<String>),

    /// Every field except these; dotted paths remove nested fields
    Exclude(Vec<String>),
}

impl Projection {
    /// Apply the projection to one document
    pub fn apply(&self, doc: Value) -> Value {
        let Value::Object(mut obj) = doc else {
            return doc;
        };

        match self {
            Projection::All => Value::Object(obj),
            Projection::Include(fields) => {
                let mut projected = Map::new();
                if let Some(id) = obj.get("_id") {
                    projected.insert("_id".to_string(), id.clone());
                }
                let source = Value::Object(obj);
                for field in fields {
                    if let Some(value) = lookup(&source, field) {
                        insert_path(&mut projected, field, value.clone());
                    }
                }
                Value::Object(projected)
            }
            Projection::Exclude(fields) => {
                for field in fields {
                    remove_path(&mut obj, field);
                }
                Value::Object(obj)
            }
        }
    }
}

/// Set `value` at a dotted path, creating intermediate objects
fn insert_path(target: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            target.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let child = target
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = child {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Remove the field at a dotted path, if present
fn remove_path(target: &mut Map<String, Value>, path: &str) {
    match path.split_once('.') {
        None => {
            target.remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(child)) = target.get_mut(head) {
                remove_path(child, rest);
            }
        }
    }
}

/// A query against one collection
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub collection: String,
    pub filter: FilterSet,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: usize,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filter: FilterSet::new(),
            sort: Vec::new(),
            projection: Projection::All,
            skip: 0,
            limit: None,
        }
    }

    /// Add every filter of `filters` (AND)
    pub fn filter(mut self, filters: FilterSet) -> Self {
        self.filter = self.filter.merge(filters);
        self
    }

    /// Add one filter (AND)
    pub fn and(mut self, filter: FilterExpr) -> Self {
        self.filter = self.filter.and(filter);
        self
    }

    pub fn sort(mut self, keys: Vec<SortKey>) -> Self {
        self.sort = keys;
        self
    }

    pub fn select(mut self, projection: Projection) -> Self {
        self.projection = projection;
        self
    }

    pub fn skip(mut self, skip: usize) -> Self {
        self.skip = skip;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Run the query over an already-loaded collection
    pub fn apply(&self, docs: Vec<Value>) -> Vec<Value> {
        let mut matched: Vec<Value> = docs
            .into_iter()
            .filter(|doc| self.filter.matches(doc))
            .collect();

        sort_documents(&mut matched, &self.sort);

        matched
            .into_iter()
            .skip(self.skip)
            .take(self.limit.unwrap_or(usize::MAX))
            .map(|doc| self.projection.apply(doc))
            .collect()
    }
}

/// Stable multi-key sort
pub fn sort_documents(docs: &mut [Value], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }

    docs.sort_by(|a, b| {
        for key in keys {
            let a_val = lookup(a, &key.field).unwrap_or(&Value::Null);
            let b_val = lookup(b, &key.field).unwrap_or(&Value::Null);

            let cmp = compare_json_values(a_val, b_val);
            let cmp = if key.descending { cmp.reverse() } else { cmp };
            if cmp.is_ne() {
                return cmp;
            }
        }
        std::cmp::Ordering::Equal
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tours() -> Vec<Value> {
        vec![
            json!({"_id": "a", "name": "Sea Explorer", "price": 497, "__v": 0}),
            json!({"_id": "b", "name": "Forest Hiker", "price": 397, "__v": 0}),
            json!({"_id": "c", "name": "Snow Adventurer", "price": 997, "__v": 0}),
            json!({"_id": "d", "name": "City Wanderer", "price": 397, "__v": 0}),
        ]
    }

    #[test]
    fn test_sort_key_parse() {
        assert_eq!(SortKey::parse("-price"), Some(SortKey::desc("price")));
        assert_eq!(SortKey::parse(" name "), Some(SortKey::asc("name")));
        assert_eq!(SortKey::parse("-"), None);
        assert_eq!(SortKey::parse(""), None);
    }

    #[test]
    fn test_apply_sorts_by_multiple_keys() {
        let query = Query::new("tours").sort(vec![SortKey::asc("price"), SortKey::desc("name")]);
        let ids: Vec<_> = query
            .apply(tours())
            .iter()
            .map(|d| d["_id"].as_str().unwrap_or_default().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "d", "a", "c"]);
    }

    #[test]
    fn test_apply_skip_and_limit_after_filter() {
        let query = Query::new("tours")
            .and(FilterExpr::eq("price", 397))
            .sort(vec![SortKey::asc("name")])
            .skip(1)
            .limit(5);
        let result = query.apply(tours());
        assert_eq!(result.len(), 1);
        assert_eq!(result[0]["_id"], "b");
    }

    #[test]
    fn test_include_projection_keeps_id() {
        let query = Query::new("tours").select(Projection::Include(vec!["name".into()]));
        let result = query.apply(tours());
        assert_eq!(result[0], json!({"_id": "a", "name": "Sea Explorer"}));
    }

    #[test]
    fn test_projection_with_dotted_paths() {
        let doc = json!({
            "_id": "a",
            "name": "The Forest Hiker",
            "startLocation": {"address": "224 Banff Ave", "coordinates": [-115.57, 51.17]}
        });

        let included = Projection::Include(vec!["startLocation.address".into()]).apply(doc.clone());
        assert_eq!(
            included,
            json!({"_id": "a", "startLocation": {"address": "224 Banff Ave"}})
        );

        let excluded = Projection::Exclude(vec!["startLocation.coordinates".into()]).apply(doc);
        assert_eq!(excluded["startLocation"], json!({"address": "224 Banff Ave"}));
        assert_eq!(excluded["name"], "The Forest Hiker");
    }

    #[test]
    fn test_exclude_projection() {
        let query = Query::new("tours").select(Projection::Exclude(vec!["__v".into()]));
        let result = query.apply(tours());
        assert!(result.iter().all(|d| d.get("__v").is_none()));
        assert_eq!(result[0]["price"], 497);
    }
}
