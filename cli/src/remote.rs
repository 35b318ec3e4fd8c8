use anyhow::Context;
use async_trait::async_trait;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use stride_core::store::{self, Direction, Document, DocumentStore, Query};
use stride_core::{Error, Result};

#[derive(Deserialize)]
struct ErrorBody {
    error: String,
}

/// Document store reached over the `stride serve` REST API.
pub struct HttpStore {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpStore {
    pub fn new(base_url: &str, api_key: Option<String>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "stride-cli/{} (fitness tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn url(&self, collection: &str, id: Option<&str>) -> String {
        match id {
            Some(id) => format!("{}/api/collections/{collection}/{id}", self.base_url),
            None => format!("{}/api/collections/{collection}", self.base_url),
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let request = match &self.api_key {
            Some(key) => request.bearer_auth(key),
            None => request,
        };
        request
            .send()
            .await
            .with_context(|| format!("Failed to reach {}", self.base_url))
            .map_err(Error::from)
    }

    /// Map a non-success response onto the error taxonomy.
    async fn error_for(response: Response) -> Error {
        let status = response.status();
        let message = match response.json::<ErrorBody>().await {
            Ok(body) => body.error,
            Err(_) => format!("Server returned {status}"),
        };
        match status {
            StatusCode::BAD_REQUEST => Error::Validation(message),
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::UNAUTHORIZED => Error::Auth(message),
            _ => Error::Remote(message),
        }
    }

    async fn document(response: Response) -> Result<Document> {
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(response
            .json::<Document>()
            .await
            .context("Failed to parse document")?)
    }
}

/// Query-string pairs for the list endpoint. Filter values go out as JSON so
/// the server never has to guess their type.
fn query_params(query: &Query) -> Vec<(&'static str, String)> {
    let mut params: Vec<(&'static str, String)> = query
        .filters
        .iter()
        .map(|f| ("where", format!("{}:{}", f.field, f.value)))
        .collect();
    if let Some(order) = &query.order_by {
        let direction = match order.direction {
            Direction::Asc => "asc",
            Direction::Desc => "desc",
        };
        params.push(("order", format!("{}:{direction}", order.field)));
    }
    params
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn query(&self, collection: &str, query: &Query) -> Result<Vec<Document>> {
        store::validate_collection(collection)?;
        debug!(collection, "GET collection");
        let response = self
            .send(
                self.client
                    .get(self.url(collection, None))
                    .query(&query_params(query)),
            )
            .await?;
        if !response.status().is_success() {
            return Err(Self::error_for(response).await);
        }
        Ok(response
            .json::<Vec<Document>>()
            .await
            .context("Failed to parse document list")?)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>> {
        store::validate_collection(collection)?;
        let response = self
            .send(self.client.get(self.url(collection, Some(id))))
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::document(response).await.map(Some)
    }

    async fn insert(&self, collection: &str, data: Value) -> Result<Document> {
        store::validate_collection(collection)?;
        let response = self
            .send(self.client.post(self.url(collection, None)).json(&data))
            .await?;
        Self::document(response).await
    }

    async fn set(&self, collection: &str, id: &str, data: Value) -> Result<Document> {
        store::validate_collection(collection)?;
        let response = self
            .send(self.client.put(self.url(collection, Some(id))).json(&data))
            .await?;
        Self::document(response).await
    }

    async fn update(&self, collection: &str, id: &str, patch: Value) -> Result<Document> {
        store::validate_collection(collection)?;
        let response = self
            .send(self.client.patch(self.url(collection, Some(id))).json(&patch))
            .await?;
        Self::document(response).await
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool> {
        store::validate_collection(collection)?;
        let response = self
            .send(self.client.delete(self.url(collection, Some(id))))
            .await?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            status if status.is_success() => Ok(true),
            _ => Err(Self::error_for(response).await),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::NaiveDate;
    use serde_json::json;
    use stride_core::db::Database;
    use stride_core::models::{FoodItem, MealPatch, NewMeal};
    use stride_core::nutrition::{NutritionTotals, Quantity};
    use stride_core::slices::Nutrition;

    use crate::server::spawn_local;

    const KEY: &str = "remote-test-key";

    async fn served_store() -> HttpStore {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let base = spawn_local(db, Some(KEY.to_string())).await.unwrap();
        HttpStore::new(&base, Some(KEY.to_string())).unwrap()
    }

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn meal(user: &str, date: &str, food: FoodItem) -> NewMeal {
        NewMeal::new(user, "Meal", "lunch", day(date), vec![food]).unwrap()
    }

    fn oats() -> FoodItem {
        FoodItem::new("Oats", NutritionTotals::new(150.0, 5.0, 27.0, 3.0), 40.0, "g", 2.0)
    }

    fn summary_calories(nutrition: &Nutrition) -> Quantity {
        nutrition.daily_summary().unwrap().totals.calories
    }

    #[tokio::test]
    async fn test_meal_lifecycle_over_http() {
        let remote: Arc<dyn DocumentStore> = Arc::new(served_store().await);
        let nutrition = Nutrition::new(Arc::clone(&remote));

        assert!(nutrition.fetch_day("u1", day("2024-01-01")).await.unwrap().is_empty());
        let created = nutrition.create(&meal("u1", "2024-01-01", oats())).await.unwrap();
        assert_eq!(summary_calories(&nutrition), Quantity::from_f64(300.0));

        nutrition.create(&meal("u1", "2024-01-02", oats())).await.unwrap();
        nutrition.create(&meal("u2", "2024-01-01", oats())).await.unwrap();
        let meals = nutrition.fetch_day("u1", day("2024-01-01")).await.unwrap();
        assert_eq!(meals.len(), 1);
        assert_eq!(meals[0].id, created.id);
        assert_eq!(nutrition.daily_summary().unwrap().meal_count, 1);

        let eggs = FoodItem::new("Eggs", NutritionTotals::new(78.0, 6.0, 0.6, 5.0), 1.0, "egg", 3.0);
        let patch = MealPatch::new().foods(vec![eggs]).unwrap();
        let updated = nutrition.update(&created.id, &patch).await.unwrap();
        assert!(updated.totals_consistent());
        assert_eq!(summary_calories(&nutrition), Quantity::from_f64(234.0));

        assert!(nutrition.delete(&created.id).await.unwrap());
        assert_eq!(summary_calories(&nutrition), Quantity::ZERO);
        assert!(!remote.delete(store::MEALS, &created.id).await.unwrap());

        let err = nutrition.fetch_one(&created.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.message(), "Meal not found");
    }

    #[tokio::test]
    async fn test_typed_filters_round_trip() {
        let remote = served_store().await;
        for (completed, duration) in [(true, 30), (false, 30), (true, 45)] {
            remote
                .insert(
                    store::WORKOUTS,
                    json!({"userId": "u1", "completed": completed, "duration": duration}),
                )
                .await
                .unwrap();
        }
        let done = remote
            .query(store::WORKOUTS, &Query::new().where_eq("completed", true))
            .await
            .unwrap();
        assert_eq!(done.len(), 2);

        let q = Query::new()
            .where_eq("userId", "u1")
            .where_eq("duration", 30)
            .order_by("completed", Direction::Desc);
        let docs = remote.query(store::WORKOUTS, &q).await.unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].data["completed"], true);
    }

    #[tokio::test]
    async fn test_status_codes_map_to_errors() {
        let remote = served_store().await;
        assert!(remote.get(store::MEALS, "missing").await.unwrap().is_none());
        assert!(!remote.delete(store::MEALS, "missing").await.unwrap());

        let err = remote
            .update(store::MEALS, "missing", json!({"name": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));

        let doc = remote
            .insert(store::MEALS, json!({"userId": "u1", "name": "Soup"}))
            .await
            .unwrap();
        let err = remote.update(store::MEALS, &doc.id, json!(5)).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let err = remote.insert(store::MEALS, json!([1, 2])).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[tokio::test]
    async fn test_wrong_api_key_is_auth_error() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let base = spawn_local(db, Some(KEY.to_string())).await.unwrap();
        let remote = HttpStore::new(&base, Some("wrong".to_string())).unwrap();
        let err = remote.query(store::MEALS, &Query::new()).await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));

        let anonymous = HttpStore::new(&base, None).unwrap();
        let err = anonymous.get(store::MEALS, "m1").await.unwrap_err();
        assert!(matches!(err, Error::Auth(_)));
    }

    #[test]
    fn test_query_params_encode_values_as_json() {
        let q = Query::new()
            .where_eq("userId", "u1")
            .where_eq("completed", true)
            .order_by("date", Direction::Desc);
        let params = query_params(&q);
        assert_eq!(
            params,
            vec![
                ("where", "userId:\"u1\"".to_string()),
                ("where", "completed:true".to_string()),
                ("order", "date:desc".to_string()),
            ]
        );
    }

    #[test]
    fn test_url_building() {
        let store = HttpStore::new("http://localhost:8080/", None).unwrap();
        assert_eq!(
            store.url("meals", None),
            "http://localhost:8080/api/collections/meals"
        );
        assert_eq!(
            store.url("meals", Some("m1")),
            "http://localhost:8080/api/collections/meals/m1"
        );
    }
}
