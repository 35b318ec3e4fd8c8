//! The per-entity slices of the application state.

use std::sync::Arc;

use chrono::NaiveDate;

use crate::collection::{Action, CollectionState, RemoteCollection, RequestStatus};
use crate::error::Result;
use crate::models::{
    Meal, MealFilter, NewProgressEntry, ProfilePatch, ProgressEntry, UserProfile, Workout,
    WorkoutPlan, WorkoutPlanPatch,
};
use crate::nutrition::{DailySummary, DailySummaryTracker};
use crate::store::DocumentStore;

pub type Workouts = RemoteCollection<Workout>;

pub type Plans = RemoteCollection<WorkoutPlan>;

/// Meals of one day plus that day's running summary.
pub type Nutrition = RemoteCollection<Meal, DailySummaryTracker>;

impl RemoteCollection<Meal, DailySummaryTracker> {
    pub async fn fetch_day(&self, owner: &str, date: NaiveDate) -> Result<Vec<Meal>> {
        self.fetch_all(owner, MealFilter { date }).await
    }

    #[must_use]
    pub fn daily_summary(&self) -> Option<DailySummary> {
        self.with_state(|s| s.aggregate().summary().cloned())
    }
}

impl RemoteCollection<WorkoutPlan> {
    /// Mark one plan active and every other plan of the owner inactive.
    pub async fn activate(&self, owner: &str, id: &str) -> Result<WorkoutPlan> {
        let plans = self.fetch_all(owner, ()).await?;
        let activate = WorkoutPlanPatch {
            is_active: Some(true),
            ..WorkoutPlanPatch::default()
        };
        let active = self.update(id, &activate).await?;
        let deactivate = WorkoutPlanPatch {
            is_active: Some(false),
            ..WorkoutPlanPatch::default()
        };
        for plan in plans.iter().filter(|p| p.is_active && p.id != id) {
            self.update(&plan.id, &deactivate).await?;
        }
        self.dispatch(Action::FetchedOne(active.clone()));
        Ok(active)
    }

    #[must_use]
    pub fn active(&self) -> Option<WorkoutPlan> {
        self.with_state(|s| s.items().iter().find(|p| p.is_active).cloned())
    }
}

/// Progress entries are append-only from the client's side.
#[derive(Clone)]
pub struct ProgressLog {
    inner: RemoteCollection<ProgressEntry>,
}

impl ProgressLog {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: RemoteCollection::new(store),
        }
    }

    pub async fn fetch_all(&self, owner: &str) -> Result<Vec<ProgressEntry>> {
        self.inner.fetch_all(owner, ()).await
    }

    pub async fn add(&self, entry: &NewProgressEntry) -> Result<ProgressEntry> {
        self.inner.create(entry).await
    }

    /// Newest entry that recorded a weight.
    #[must_use]
    pub fn latest_weight(&self) -> Option<(NaiveDate, f64)> {
        self.inner
            .with_state(|s| s.items().iter().find_map(|e| e.weight.map(|w| (e.date, w))))
    }

    #[must_use]
    pub fn snapshot(&self) -> CollectionState<ProgressEntry> {
        self.inner.snapshot()
    }

    pub fn reset(&self) {
        self.inner.reset();
    }
}

/// The signed-in user's profile document.
#[derive(Clone)]
pub struct ProfileSlice {
    inner: RemoteCollection<UserProfile>,
}

impl ProfileSlice {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            inner: RemoteCollection::new(store),
        }
    }

    pub async fn fetch(&self, uid: &str) -> Result<UserProfile> {
        self.inner.fetch_one(uid).await
    }

    pub async fn update(&self, uid: &str, patch: &ProfilePatch) -> Result<UserProfile> {
        self.inner.update(uid, patch).await
    }

    pub fn clear(&self) {
        self.inner.clear_current();
    }

    /// Forget the profile along with the last request's status and error.
    pub fn reset(&self) {
        self.inner.reset();
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.inner.current()
    }

    #[must_use]
    pub fn status(&self) -> RequestStatus {
        self.inner.status()
    }

    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.inner.error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use crate::collection::Validate;
    use crate::db::Database;
    use crate::error::Error;
    use crate::models::{Exercise, FoodItem, MealPatch, NewMeal, NewWorkout, NewWorkoutPlan};
    use crate::nutrition::{NutritionTotals, Quantity};
    use crate::store;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn db() -> Arc<dyn DocumentStore> {
        Arc::new(Database::open_in_memory().unwrap())
    }

    fn food(calories: f64) -> FoodItem {
        FoodItem {
            id: "f".to_string(),
            name: "Food".to_string(),
            calories: Quantity::from_f64(calories),
            protein: Quantity::from_f64(1.0),
            carbs: Quantity::from_f64(1.0),
            fat: Quantity::from_f64(1.0),
            serving_size: 1.0,
            serving_unit: "serving".to_string(),
            quantity: 1.0,
        }
    }

    fn new_meal(date: &str, calories: f64) -> NewMeal {
        NewMeal::new("u1", "Meal", "lunch", day(date), vec![food(calories)]).unwrap()
    }

    fn calories(nutrition: &Nutrition) -> f64 {
        nutrition.daily_summary().unwrap().totals.calories.as_f64()
    }

    #[tokio::test]
    async fn test_nutrition_scenario_against_store() {
        let docs = db();
        let nutrition = Nutrition::new(Arc::clone(&docs));
        let first = nutrition.create(&new_meal("2024-01-01", 400.0)).await.unwrap();
        nutrition.create(&new_meal("2024-01-01", 600.0)).await.unwrap();

        let fresh = Nutrition::new(docs);
        fresh.fetch_day("u1", day("2024-01-01")).await.unwrap();
        assert!((calories(&fresh) - 1000.0).abs() < f64::EPSILON);

        fresh.create(&new_meal("2024-01-01", 200.0)).await.unwrap();
        assert!((calories(&fresh) - 1200.0).abs() < f64::EPSILON);

        fresh.delete(&first.id).await.unwrap();
        assert!((calories(&fresh) - 800.0).abs() < f64::EPSILON);
        assert_eq!(fresh.daily_summary().unwrap().meal_count, 2);
    }

    #[tokio::test]
    async fn test_meal_update_rewrites_totals_and_summary() {
        let nutrition = Nutrition::new(db());
        nutrition.fetch_day("u1", day("2024-01-01")).await.unwrap();
        let meal = nutrition.create(&new_meal("2024-01-01", 300.0)).await.unwrap();

        let patch = MealPatch::new().foods(vec![food(100.0), food(50.0)]).unwrap();
        let updated = nutrition.update(&meal.id, &patch).await.unwrap();
        assert!(updated.totals_consistent());
        assert!((calories(&nutrition) - 150.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_non_finite_meal_is_never_stored() {
        let docs = db();
        let nutrition = Nutrition::new(Arc::clone(&docs));
        let mut bad = food(100.0);
        bad.quantity = f64::NAN;
        let foods = vec![bad];
        let meal = NewMeal {
            user_id: "u1".to_string(),
            name: "Meal".to_string(),
            meal_type: "lunch".to_string(),
            date: day("2024-01-01"),
            totals: NutritionTotals::from_foods(&foods),
            foods,
        };
        let err = nutrition.create(&meal).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)));

        let meals = nutrition.fetch_day("u1", day("2024-01-01")).await.unwrap();
        assert!(meals.is_empty());
    }

    #[tokio::test]
    async fn test_non_finite_exercise_weight_keeps_list_readable() {
        let workouts = Workouts::new(db());
        let workout = NewWorkout {
            user_id: "u1".to_string(),
            title: "Push".to_string(),
            description: None,
            exercises: vec![Exercise::new("Bench", 3, 8, f64::NAN)],
            duration: 40,
            calories_burned: None,
            date: day("2024-01-01"),
            completed: false,
        };
        assert!(workouts.create(&workout).await.is_err());
        assert!(workouts.fetch_all("u1", ()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_day_only_returns_that_day() {
        let nutrition = Nutrition::new(db());
        nutrition.create(&new_meal("2024-01-01", 100.0)).await.unwrap();
        nutrition.create(&new_meal("2024-01-02", 200.0)).await.unwrap();
        let meals = nutrition.fetch_day("u1", day("2024-01-02")).await.unwrap();
        assert_eq!(meals.len(), 1);
        assert!((calories(&nutrition) - 200.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_missing_plan_message() {
        let plans = Plans::new(db());
        let err = plans.fetch_one("nope").await.unwrap_err();
        assert_eq!(err.message(), "Workout plan not found");
    }

    #[tokio::test]
    async fn test_activate_plan_deactivates_others() {
        let plans = Plans::new(db());
        let mut ids = Vec::new();
        for title in ["A", "B"] {
            let plan = NewWorkoutPlan {
                user_id: "u1".to_string(),
                title: title.to_string(),
                description: None,
                days: BTreeMap::new(),
                start_date: None,
                end_date: None,
                is_active: true,
            };
            assert!(plan.validate().is_ok());
            ids.push(plans.create(&plan).await.unwrap().id);
        }
        plans.activate("u1", &ids[0]).await.unwrap();
        let all = plans.fetch_all("u1", ()).await.unwrap();
        let active: Vec<&str> = all.iter().filter(|p| p.is_active).map(|p| p.id.as_str()).collect();
        assert_eq!(active, vec![ids[0].as_str()]);
        assert_eq!(plans.active().unwrap().id, ids[0]);
    }

    #[tokio::test]
    async fn test_progress_log_latest_weight() {
        let log = ProgressLog::new(db());
        for (date, weight) in [("2024-01-01", Some(82.0)), ("2024-02-01", None), ("2024-01-15", Some(81.0))] {
            log.add(&NewProgressEntry {
                user_id: "u1".to_string(),
                date: day(date),
                weight,
                body_fat: None,
                measurements: None,
                notes: Some("check-in".to_string()),
            })
            .await
            .unwrap();
        }
        let entries = log.fetch_all("u1").await.unwrap();
        assert_eq!(entries[0].date, day("2024-02-01"));
        assert_eq!(log.latest_weight(), Some((day("2024-01-15"), 81.0)));
    }

    #[tokio::test]
    async fn test_profile_fetch_and_update() {
        let docs = db();
        let profile = UserProfile::new_account("uid1", "a@b.co", "Ada");
        docs
            .set(store::USERS, "uid1", serde_json::to_value(&profile).unwrap())
            .await
            .unwrap();

        let slice = ProfileSlice::new(docs);
        assert_eq!(slice.fetch("uid1").await.unwrap().display_name, "Ada");

        let patch = ProfilePatch {
            weight: Some(Some(70.5)),
            goals: Some(vec!["Run a 10k".to_string()]),
            ..ProfilePatch::default()
        };
        let updated = slice.update("uid1", &patch).await.unwrap();
        assert_eq!(updated.weight, Some(70.5));
        assert_eq!(updated.goals.len(), 1);
        assert_eq!(updated.email, "a@b.co");

        slice.clear();
        assert!(slice.profile().is_none());
    }

    #[tokio::test]
    async fn test_missing_profile_message() {
        let slice = ProfileSlice::new(db());
        let err = slice.fetch("ghost").await.unwrap_err();
        assert_eq!(err.message(), "User profile not found");
        assert_eq!(slice.status(), RequestStatus::Rejected);
        assert_eq!(slice.error().as_deref(), Some("User profile not found"));
    }
}
