//! The document store the client talks to.
//!
//! Collections hold JSON objects keyed by generated ids. Queries are equality
//! filters plus one sort key, which is all the client ever asks for.

use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};

pub const USERS: &str = "users";
pub const WORKOUTS: &str = "workouts";
pub const MEALS: &str = "meals";
pub const WORKOUT_PLANS: &str = "workoutPlans";
pub const PROGRESS: &str = "progress";

/// Every collection the client reads or writes.
pub const COLLECTIONS: &[&str] = &[USERS, WORKOUTS, MEALS, WORKOUT_PLANS, PROGRESS];

pub fn validate_collection(name: &str) -> Result<()> {
    if COLLECTIONS.contains(&name) {
        Ok(())
    } else {
        Err(Error::validation(format!(
            "Unknown collection '{name}'. Must be one of: {}",
            COLLECTIONS.join(", ")
        )))
    }
}

/// RFC 3339 UTC timestamp with fixed width, so string order is time order.
#[must_use]
pub fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

impl Document {
    /// Decode into an entity, exposing the document id as its `id` field.
    pub fn into_entity<T: DeserializeOwned>(self) -> Result<T> {
        let mut data = match self.data {
            Value::Object(map) => map,
            _ => return Err(Error::remote(format!("Document {} is not an object", self.id))),
        };
        data.insert("id".to_string(), Value::String(self.id));
        Ok(serde_json::from_value(Value::Object(data))?)
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.data.get(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Filter {
    pub field: String,
    pub value: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Query {
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub order_by: Option<OrderBy>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn where_eq(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter {
            field: field.to_string(),
            value: value.into(),
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    #[must_use]
    pub fn matches(&self, data: &Value) -> bool {
        self.filters
            .iter()
            .all(|f| data.get(&f.field) == Some(&f.value))
    }

    /// Filter and sort in place. The sort is stable, so ties keep store order.
    pub fn apply(&self, docs: &mut Vec<Document>) {
        docs.retain(|d| self.matches(&d.data));
        if let Some(order) = &self.order_by {
            docs.sort_by(|a, b| {
                let ord = compare_values(a.field(&order.field), b.field(&order.field));
                match order.direction {
                    Direction::Asc => ord,
                    Direction::Desc => ord.reverse(),
                }
            });
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Missing fields sort before everything, then values by type, then by value.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => {
                let x = x.as_f64().unwrap_or(0.0);
                let y = y.as_f64().unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => type_rank(a).cmp(&type_rank(b)),
        },
    }
}

/// Shallow merge: every top-level key of `patch` replaces the stored one.
pub fn merge_patch(target: &mut Map<String, Value>, patch: Value) -> Result<()> {
    let Value::Object(patch) = patch else {
        return Err(Error::validation("Update payload must be a JSON object"));
    };
    for (key, value) in patch {
        if key == "id" {
            continue;
        }
        target.insert(key, value);
    }
    Ok(())
}

/// Turn a payload into the object a store insert expects.
pub fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(mut map) => {
            map.remove("id");
            Ok(map)
        }
        _ => Err(Error::validation("Document payload must be a JSON object")),
    }
}

/// Collaborator holding durable state for every collection.
///
/// Implemented by the local SQLite `Database` and by the CLI's HTTP client.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>>;

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>>;

    /// Insert under a freshly generated id.
    async fn insert(&self, collection: &str, data: Value) -> Result<Document>;

    /// Create or replace the document at `id`.
    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document>;

    /// Merge `patch` into an existing document; `NotFound` if there is none.
    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Document>;

    /// Returns whether a document was removed. Deleting a missing id succeeds.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, data: Value) -> Document {
        Document {
            id: id.to_string(),
            data,
        }
    }

    #[test]
    fn test_query_filters_and_sorts_desc() {
        let mut docs = vec![
            doc("a", json!({"userId": "u1", "date": "2024-01-01"})),
            doc("b", json!({"userId": "u2", "date": "2024-01-03"})),
            doc("c", json!({"userId": "u1", "date": "2024-01-02"})),
        ];
        let q = Query::new()
            .where_eq("userId", "u1")
            .order_by("date", Direction::Desc);
        q.apply(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a"]);
    }

    #[test]
    fn test_query_numbers_compare_numerically() {
        let mut docs = vec![
            doc("a", json!({"n": 10})),
            doc("b", json!({"n": 9.5})),
            doc("c", json!({"n": 100})),
        ];
        Query::new().order_by("n", Direction::Asc).apply(&mut docs);
        let ids: Vec<&str> = docs.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_query_missing_sort_field_sorts_last_when_desc() {
        let mut docs = vec![doc("a", json!({})), doc("b", json!({"date": "2024-01-01"}))];
        Query::new().order_by("date", Direction::Desc).apply(&mut docs);
        assert_eq!(docs[0].id, "b");
    }

    #[test]
    fn test_filter_requires_exact_type() {
        let q = Query::new().where_eq("completed", true);
        assert!(q.matches(&json!({"completed": true})));
        assert!(!q.matches(&json!({"completed": "true"})));
        assert!(!q.matches(&json!({})));
    }

    #[test]
    fn test_merge_patch_is_shallow_and_keeps_id() {
        let mut target = json!({"title": "Old", "exercises": [1, 2]})
            .as_object()
            .cloned()
            .unwrap();
        merge_patch(&mut target, json!({"title": "New", "id": "hijack", "notes": null})).unwrap();
        assert_eq!(target["title"], "New");
        assert_eq!(target["exercises"], json!([1, 2]));
        assert_eq!(target["notes"], Value::Null);
        assert!(!target.contains_key("id"));
    }

    #[test]
    fn test_merge_patch_rejects_non_object() {
        let mut target = Map::new();
        assert!(merge_patch(&mut target, json!([1])).is_err());
    }

    #[test]
    fn test_into_entity_injects_id() {
        #[derive(Deserialize)]
        struct Thing {
            id: String,
            name: String,
        }
        let thing: Thing = doc("t1", json!({"name": "x"})).into_entity().unwrap();
        assert_eq!(thing.id, "t1");
        assert_eq!(thing.name, "x");
    }

    #[test]
    fn test_validate_collection() {
        assert!(validate_collection("workoutPlans").is_ok());
        assert!(validate_collection("recipes").is_err());
    }

    #[test]
    fn test_timestamps_order_lexically() {
        let a = timestamp();
        let b = timestamp();
        assert!(a <= b);
        assert!(a.ends_with('Z'));
    }
}
