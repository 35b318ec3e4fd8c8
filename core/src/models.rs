use std::collections::BTreeMap;
use std::fmt;

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Deserializer, Serialize};

use crate::collection::{Entity, Validate};
use crate::error::{Error, Result};
use crate::nutrition::{NutritionTotals, Quantity};
use crate::settings::Units;
use crate::store::{self, Query};
use crate::theme::ThemePreference;

fn deserialize_some<'de, T, D>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}

fn require_text(value: &str, what: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::validation(format!("{what} must not be empty")));
    }
    Ok(())
}

/// Largest amount any numeric field may hold: nutrients, servings, weights,
/// body measurements and calories burned.
pub const MAX_AMOUNT: f64 = 100_000.0;

fn require_bounded(value: f64, what: &str) -> Result<()> {
    if !value.is_finite() || value > MAX_AMOUNT {
        return Err(Error::validation(format!(
            "{what} must be a number no greater than {MAX_AMOUNT}"
        )));
    }
    Ok(())
}

fn require_non_negative(value: f64, what: &str) -> Result<()> {
    require_bounded(value, what)?;
    if value < 0.0 {
        return Err(Error::validation(format!("{what} must not be negative")));
    }
    Ok(())
}

fn require_positive(value: f64, what: &str) -> Result<()> {
    require_bounded(value, what)?;
    if value <= 0.0 {
        return Err(Error::validation(format!("{what} must be greater than 0")));
    }
    Ok(())
}

// --- User profile ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub notifications: bool,
    #[serde(default)]
    pub theme: ThemePreference,
    #[serde(default)]
    pub units: Units,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            notifications: true,
            theme: ThemePreference::System,
            units: Units::Metric,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub uid: String,
    pub email: String,
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    #[serde(default)]
    pub height: Option<f64>,
    #[serde(default)]
    pub weight: Option<f64>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub preferences: Preferences,
    #[serde(default)]
    pub created_at: String,
}

impl UserProfile {
    /// The document written at signup.
    #[must_use]
    pub fn new_account(uid: &str, email: &str, display_name: &str) -> Self {
        Self {
            uid: uid.to_string(),
            email: email.to_string(),
            display_name: display_name.to_string(),
            photo_url: None,
            height: None,
            weight: None,
            goals: Vec::new(),
            preferences: Preferences::default(),
            created_at: store::timestamp(),
        }
    }
}

/// Profiles live at `users/{uid}`; the document id is the account uid.
impl Entity for UserProfile {
    const COLLECTION: &'static str = store::USERS;
    const LABEL: &'static str = "User profile";
    const PLURAL: &'static str = "user profiles";
    const SORT_FIELD: &'static str = "createdAt";
    type Filter = ();

    fn id(&self) -> &str {
        &self.uid
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct ProfilePatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub photo_url: Option<Option<String>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub height: Option<Option<f64>>,
    #[serde(
        default,
        deserialize_with = "deserialize_some",
        skip_serializing_if = "Option::is_none"
    )]
    pub weight: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub goals: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferences: Option<Preferences>,
}

impl ProfilePatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.display_name.is_none()
            && self.photo_url.is_none()
            && self.height.is_none()
            && self.weight.is_none()
            && self.goals.is_none()
            && self.preferences.is_none()
    }
}

impl Validate for ProfilePatch {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation("At least one field must be provided"));
        }
        if let Some(name) = &self.display_name {
            require_text(name, "Display name")?;
        }
        if let Some(Some(h)) = self.height {
            require_positive(h, "Height")?;
        }
        if let Some(Some(w)) = self.weight {
            require_positive(w, "Weight")?;
        }
        Ok(())
    }
}

// --- Workouts ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Exercise {
    pub id: String,
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Exercise {
    #[must_use]
    pub fn new(name: &str, sets: u32, reps: u32, weight: f64) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            sets,
            reps,
            weight,
            duration: None,
            notes: None,
        }
    }

    /// Total load moved: sets × reps × weight.
    #[must_use]
    pub fn volume(&self) -> f64 {
        f64::from(self.sets) * f64::from(self.reps) * self.weight
    }
}

pub fn validate_exercise(exercise: &Exercise) -> Result<()> {
    require_text(&exercise.name, "Exercise name")?;
    if exercise.sets == 0 {
        return Err(Error::validation("Exercise sets must be greater than 0"));
    }
    require_non_negative(exercise.weight, "Exercise weight")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workout {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub exercises: Vec<Exercise>,
    /// Minutes.
    pub duration: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<f64>,
    pub date: NaiveDate,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub created_at: String,
}

impl Workout {
    #[must_use]
    pub fn total_volume(&self) -> f64 {
        self.exercises.iter().map(Exercise::volume).sum()
    }
}

impl Entity for Workout {
    const COLLECTION: &'static str = store::WORKOUTS;
    const LABEL: &'static str = "Workout";
    const PLURAL: &'static str = "workouts";
    const SORT_FIELD: &'static str = "date";
    type Filter = ();

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkout {
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub exercises: Vec<Exercise>,
    pub duration: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<f64>,
    pub date: NaiveDate,
    pub completed: bool,
}

impl Validate for NewWorkout {
    fn validate(&self) -> Result<()> {
        require_text(&self.user_id, "User id")?;
        require_text(&self.title, "Workout title")?;
        for exercise in &self.exercises {
            validate_exercise(exercise)?;
        }
        if let Some(calories) = self.calories_burned {
            require_non_negative(calories, "Calories burned")?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct WorkoutPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exercises: Option<Vec<Exercise>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calories_burned: Option<Option<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
}

impl WorkoutPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.exercises.is_none()
            && self.duration.is_none()
            && self.calories_burned.is_none()
            && self.date.is_none()
            && self.completed.is_none()
    }
}

impl Validate for WorkoutPatch {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation("At least one field must be provided"));
        }
        if let Some(title) = &self.title {
            require_text(title, "Workout title")?;
        }
        if let Some(exercises) = &self.exercises {
            for exercise in exercises {
                validate_exercise(exercise)?;
            }
        }
        if let Some(Some(calories)) = self.calories_burned {
            require_non_negative(calories, "Calories burned")?;
        }
        Ok(())
    }
}

// --- Nutrition ---

pub const MEAL_TYPES: &[&str] = &["breakfast", "lunch", "dinner", "snack"];

pub fn validate_meal_type(meal: &str) -> Result<String> {
    let lower = meal.to_lowercase();
    if MEAL_TYPES.contains(&lower.as_str()) {
        Ok(lower)
    } else {
        Err(Error::validation(format!(
            "Invalid meal type '{meal}'. Must be one of: {}",
            MEAL_TYPES.join(", ")
        )))
    }
}

/// One food on a meal. Nutrient amounts are per serving.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FoodItem {
    pub id: String,
    pub name: String,
    pub calories: Quantity,
    pub protein: Quantity,
    pub carbs: Quantity,
    pub fat: Quantity,
    pub serving_size: f64,
    pub serving_unit: String,
    pub quantity: f64,
}

impl FoodItem {
    /// A food with a fresh id; `per_serving` holds the nutrients of one
    /// serving.
    #[must_use]
    pub fn new(
        name: &str,
        per_serving: NutritionTotals,
        serving_size: f64,
        serving_unit: &str,
        quantity: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.to_string(),
            calories: per_serving.calories,
            protein: per_serving.protein,
            carbs: per_serving.carbs,
            fat: per_serving.fat,
            serving_size,
            serving_unit: serving_unit.to_string(),
            quantity,
        }
    }

    #[must_use]
    pub fn totals(&self) -> NutritionTotals {
        NutritionTotals {
            calories: self.calories.scale(self.quantity),
            protein: self.protein.scale(self.quantity),
            carbs: self.carbs.scale(self.quantity),
            fat: self.fat.scale(self.quantity),
        }
    }
}

pub fn validate_food_item(food: &FoodItem) -> Result<()> {
    require_text(&food.name, "Food name")?;
    for (label, q) in [
        ("calories", food.calories),
        ("protein", food.protein),
        ("carbs", food.carbs),
        ("fat", food.fat),
    ] {
        if q.is_negative() {
            return Err(Error::validation(format!("{label} must not be negative")));
        }
        if q > Quantity::from_f64(MAX_AMOUNT) {
            return Err(Error::validation(format!(
                "{label} must be no greater than {MAX_AMOUNT}"
            )));
        }
    }
    require_positive(food.quantity, "quantity")?;
    require_positive(food.serving_size, "servingSize")
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meal {
    pub id: String,
    pub user_id: String,
    pub name: String,
    pub meal_type: String,
    pub date: NaiveDate,
    #[serde(default)]
    pub foods: Vec<FoodItem>,
    #[serde(flatten)]
    pub totals: NutritionTotals,
    #[serde(default)]
    pub created_at: String,
}

impl Meal {
    /// Whether the stored totals still equal the sum over the food list.
    #[must_use]
    pub fn totals_consistent(&self) -> bool {
        self.totals == NutritionTotals::from_foods(&self.foods)
    }
}

/// Meals are listed one day at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MealFilter {
    pub date: NaiveDate,
}

impl Entity for Meal {
    const COLLECTION: &'static str = store::MEALS;
    const LABEL: &'static str = "Meal";
    const PLURAL: &'static str = "meals";
    const SORT_FIELD: &'static str = "createdAt";
    type Filter = MealFilter;

    fn id(&self) -> &str {
        &self.id
    }

    fn filter_query(filter: &MealFilter, query: Query) -> Query {
        query.where_eq("date", filter.date.format("%Y-%m-%d").to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewMeal {
    pub user_id: String,
    pub name: String,
    pub meal_type: String,
    pub date: NaiveDate,
    pub foods: Vec<FoodItem>,
    #[serde(flatten)]
    pub totals: NutritionTotals,
}

impl NewMeal {
    /// Validate the input and compute the totals the meal is stored with.
    pub fn new(
        user_id: &str,
        name: &str,
        meal_type: &str,
        date: NaiveDate,
        foods: Vec<FoodItem>,
    ) -> Result<Self> {
        require_text(user_id, "User id")?;
        require_text(name, "Meal name")?;
        let meal_type = validate_meal_type(meal_type)?;
        for food in &foods {
            validate_food_item(food)?;
        }
        let totals = NutritionTotals::from_foods(&foods);
        Ok(Self {
            user_id: user_id.to_string(),
            name: name.to_string(),
            meal_type,
            date,
            foods,
            totals,
        })
    }
}

impl Validate for NewMeal {
    fn validate(&self) -> Result<()> {
        require_text(&self.user_id, "User id")?;
        require_text(&self.name, "Meal name")?;
        validate_meal_type(&self.meal_type)?;
        for food in &self.foods {
            validate_food_item(food)?;
        }
        if self.totals != NutritionTotals::from_foods(&self.foods) {
            return Err(Error::validation("Meal totals do not match its foods"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MealPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    meal_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    foods: Option<Vec<FoodItem>>,
    #[serde(flatten, skip_serializing_if = "Option::is_none")]
    totals: Option<NutritionTotals>,
}

impl MealPatch {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: &str) -> Result<Self> {
        require_text(name, "Meal name")?;
        self.name = Some(name.to_string());
        Ok(self)
    }

    pub fn meal_type(mut self, meal_type: &str) -> Result<Self> {
        self.meal_type = Some(validate_meal_type(meal_type)?);
        Ok(self)
    }

    #[must_use]
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    /// Replacing the food list always rewrites the totals with it.
    pub fn foods(mut self, foods: Vec<FoodItem>) -> Result<Self> {
        for food in &foods {
            validate_food_item(food)?;
        }
        self.totals = Some(NutritionTotals::from_foods(&foods));
        self.foods = Some(foods);
        Ok(self)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.meal_type.is_none() && self.date.is_none() && self.foods.is_none()
    }
}

impl Validate for MealPatch {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation("At least one field must be provided"));
        }
        Ok(())
    }
}

// --- Progress ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Measurements {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chest: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waist: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hips: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arms: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thighs: Option<f64>,
}

impl Measurements {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().iter().all(|(_, v)| v.is_none())
    }

    #[must_use]
    pub fn values(&self) -> [(&'static str, Option<f64>); 5] {
        [
            ("chest", self.chest),
            ("waist", self.waist),
            ("hips", self.hips),
            ("arms", self.arms),
            ("thighs", self.thighs),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEntry {
    pub id: String,
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_fat: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Measurements>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

impl Entity for ProgressEntry {
    const COLLECTION: &'static str = store::PROGRESS;
    const LABEL: &'static str = "Progress entry";
    const PLURAL: &'static str = "progress entries";
    const SORT_FIELD: &'static str = "date";
    type Filter = ();

    fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewProgressEntry {
    pub user_id: String,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body_fat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub measurements: Option<Measurements>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Validate for NewProgressEntry {
    fn validate(&self) -> Result<()> {
        require_text(&self.user_id, "User id")?;
        let has_measurements = self.measurements.is_some_and(|m| !m.is_empty());
        if self.weight.is_none()
            && self.body_fat.is_none()
            && !has_measurements
            && self.notes.as_deref().is_none_or(|n| n.trim().is_empty())
        {
            return Err(Error::validation(
                "A progress entry needs a weight, body fat, measurement, or note",
            ));
        }
        if let Some(w) = self.weight {
            require_positive(w, "weight")?;
        }
        if self.body_fat.is_some_and(|b| !(0.0..=100.0).contains(&b)) {
            return Err(Error::validation("bodyFat must be between 0 and 100"));
        }
        if let Some(m) = &self.measurements {
            for (label, value) in m.values() {
                if let Some(v) = value {
                    require_positive(v, label)?;
                }
            }
        }
        Ok(())
    }
}

// --- Workout plans ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Weekday {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl Weekday {
    pub const ALL: [Weekday; 7] = [
        Weekday::Monday,
        Weekday::Tuesday,
        Weekday::Wednesday,
        Weekday::Thursday,
        Weekday::Friday,
        Weekday::Saturday,
        Weekday::Sunday,
    ];

    /// Accepts full names and three-letter abbreviations, any case.
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "monday" | "mon" => Ok(Self::Monday),
            "tuesday" | "tue" => Ok(Self::Tuesday),
            "wednesday" | "wed" => Ok(Self::Wednesday),
            "thursday" | "thu" => Ok(Self::Thursday),
            "friday" | "fri" => Ok(Self::Friday),
            "saturday" | "sat" => Ok(Self::Saturday),
            "sunday" | "sun" => Ok(Self::Sunday),
            _ => Err(Error::validation(format!(
                "Invalid day '{s}'. Use monday-sunday or mon-sun"
            ))),
        }
    }

    #[must_use]
    pub fn of(date: NaiveDate) -> Self {
        Self::ALL[date.weekday().num_days_from_monday() as usize]
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }
}

impl fmt::Display for Weekday {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanExercise {
    pub name: String,
    pub sets: u32,
    pub reps: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayPlan {
    pub title: String,
    #[serde(default)]
    pub exercises: Vec<PlanExercise>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkoutPlan {
    pub id: String,
    pub user_id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub days: BTreeMap<Weekday, DayPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    #[serde(default)]
    pub is_active: bool,
    #[serde(default)]
    pub created_at: String,
}

impl WorkoutPlan {
    /// The scheduled day for `date`, if the plan covers that date at all.
    #[must_use]
    pub fn day_for(&self, date: NaiveDate) -> Option<&DayPlan> {
        if self.start_date.is_some_and(|s| date < s) || self.end_date.is_some_and(|e| date > e) {
            return None;
        }
        self.days.get(&Weekday::of(date))
    }
}

impl Entity for WorkoutPlan {
    const COLLECTION: &'static str = store::WORKOUT_PLANS;
    const LABEL: &'static str = "Workout plan";
    const PLURAL: &'static str = "workout plans";
    const SORT_FIELD: &'static str = "createdAt";
    type Filter = ();

    fn id(&self) -> &str {
        &self.id
    }
}

fn validate_plan_days(days: &BTreeMap<Weekday, DayPlan>) -> Result<()> {
    for (day, plan) in days {
        require_text(&plan.title, &format!("Title for {day}"))?;
        for exercise in &plan.exercises {
            require_text(&exercise.name, "Exercise name")?;
            if exercise.sets == 0 {
                return Err(Error::validation("Exercise sets must be greater than 0"));
            }
        }
    }
    Ok(())
}

fn validate_date_range(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Result<()> {
    if let (Some(s), Some(e)) = (start, end) {
        if s > e {
            return Err(Error::validation("Plan start date must not be after its end date"));
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewWorkoutPlan {
    pub user_id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub days: BTreeMap<Weekday, DayPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
    pub is_active: bool,
}

impl Validate for NewWorkoutPlan {
    fn validate(&self) -> Result<()> {
        require_text(&self.user_id, "User id")?;
        require_text(&self.title, "Plan title")?;
        validate_plan_days(&self.days)?;
        validate_date_range(self.start_date, self.end_date)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
#[allow(clippy::option_option)]
pub struct WorkoutPlanPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<BTreeMap<Weekday, DayPlan>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<Option<NaiveDate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

impl WorkoutPlanPatch {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.days.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.is_active.is_none()
    }
}

impl Validate for WorkoutPlanPatch {
    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(Error::validation("At least one field must be provided"));
        }
        if let Some(title) = &self.title {
            require_text(title, "Plan title")?;
        }
        if let Some(days) = &self.days {
            validate_plan_days(days)?;
        }
        validate_date_range(self.start_date.flatten(), self.end_date.flatten())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn food(name: &str, calories: f64, quantity: f64) -> FoodItem {
        FoodItem {
            id: name.to_lowercase(),
            name: name.to_string(),
            calories: Quantity::from_f64(calories),
            protein: Quantity::from_f64(10.0),
            carbs: Quantity::from_f64(20.0),
            fat: Quantity::from_f64(5.0),
            serving_size: 100.0,
            serving_unit: "g".to_string(),
            quantity,
        }
    }

    #[test]
    fn test_valid_meal_types() {
        assert_eq!(validate_meal_type("breakfast").unwrap(), "breakfast");
        assert_eq!(validate_meal_type("lunch").unwrap(), "lunch");
        assert_eq!(validate_meal_type("dinner").unwrap(), "dinner");
        assert_eq!(validate_meal_type("snack").unwrap(), "snack");
    }

    #[test]
    fn test_meal_type_case_insensitive() {
        assert_eq!(validate_meal_type("Lunch").unwrap(), "lunch");
        assert_eq!(validate_meal_type("BREAKFAST").unwrap(), "breakfast");
    }

    #[test]
    fn test_invalid_meal_type() {
        let err = validate_meal_type("brunch").unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(validate_meal_type("").is_err());
    }

    #[test]
    fn test_new_meal_computes_totals() {
        let meal = NewMeal::new(
            "u1",
            "Lunch bowl",
            "Lunch",
            date("2024-06-15"),
            vec![food("Rice", 130.0, 2.0), food("Chicken", 165.0, 1.5)],
        )
        .unwrap();
        assert_eq!(meal.meal_type, "lunch");
        assert_eq!(meal.totals.calories, Quantity::from_f64(507.5));
        assert_eq!(meal.totals.protein, Quantity::from_f64(35.0));
    }

    #[test]
    fn test_new_meal_serializes_totals_alongside_foods() {
        let meal = NewMeal::new("u1", "Snack", "snack", date("2024-06-15"), vec![food("Apple", 52.0, 1.0)])
            .unwrap();
        let value = serde_json::to_value(&meal).unwrap();
        assert_eq!(value["totalCalories"], 52.0);
        assert_eq!(value["mealType"], "snack");
        assert_eq!(value["date"], "2024-06-15");
        assert!(value["foods"].is_array());
    }

    #[test]
    fn test_new_meal_rejects_bad_food() {
        let mut bad = food("Ghost", 10.0, 1.0);
        bad.quantity = 0.0;
        assert!(NewMeal::new("u1", "x", "snack", date("2024-06-15"), vec![bad]).is_err());
    }

    #[test]
    fn test_new_meal_rejects_non_finite_food_amounts() {
        let day = date("2024-01-01");
        let mut nan_quantity = food("Rice", 130.0, 1.0);
        nan_quantity.quantity = f64::NAN;
        let mut inf_serving = food("Rice", 130.0, 1.0);
        inf_serving.serving_size = f64::INFINITY;
        for bad in [nan_quantity, inf_serving] {
            let err = NewMeal::new("u1", "Lunch", "lunch", day, vec![bad]).unwrap_err();
            assert!(matches!(err, Error::Validation(_)));
        }
    }

    #[test]
    fn test_new_meal_rejects_oversized_amounts() {
        let day = date("2024-01-01");
        let huge = || food("Lard", 1e16, 1.0);
        assert!(NewMeal::new("u1", "Feast", "dinner", day, vec![huge(), huge()]).is_err());
        assert!(NewMeal::new("u1", "Feast", "dinner", day, vec![food("Rice", 130.0, 1e9)]).is_err());
        assert!(NewMeal::new("u1", "Feast", "dinner", day, vec![food("Rice", MAX_AMOUNT, 2.0)]).is_ok());
    }

    #[test]
    fn test_meal_round_trip_keeps_totals_consistent() {
        let new = NewMeal::new("u1", "Dinner", "dinner", date("2024-06-15"), vec![food("Pasta", 350.0, 1.0)])
            .unwrap();
        let mut value = serde_json::to_value(&new).unwrap();
        value["id"] = "m1".into();
        value["createdAt"] = "2024-06-15T18:00:00Z".into();
        let meal: Meal = serde_json::from_value(value).unwrap();
        assert!(meal.totals_consistent());
        assert_eq!(meal.totals.calories, Quantity::from_f64(350.0));
    }

    #[test]
    fn test_meal_patch_foods_rewrites_totals() {
        let patch = MealPatch::new().foods(vec![food("Egg", 78.0, 3.0)]).unwrap();
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["totalCalories"], 234.0);
        assert!(value.get("name").is_none());
    }

    #[test]
    fn test_meal_patch_without_foods_leaves_totals_out() {
        let patch = MealPatch::new().name("Renamed").unwrap();
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value["name"], "Renamed");
        assert!(value.get("totalCalories").is_none());
        assert!(!patch.is_empty());
        assert!(MealPatch::new().is_empty());
    }

    #[test]
    fn test_new_workout_validation() {
        let mut workout = NewWorkout {
            user_id: "u1".to_string(),
            title: "Leg day".to_string(),
            description: None,
            exercises: vec![Exercise::new("Squat", 5, 5, 100.0)],
            duration: 60,
            calories_burned: Some(400.0),
            date: date("2024-06-15"),
            completed: false,
        };
        assert!(workout.validate().is_ok());
        workout.title = "  ".to_string();
        assert!(workout.validate().is_err());
    }

    #[test]
    fn test_workout_rejects_non_finite_numbers() {
        let mut workout = NewWorkout {
            user_id: "u1".to_string(),
            title: "Push".to_string(),
            description: None,
            exercises: vec![Exercise::new("Bench", 3, 8, f64::NAN)],
            duration: 45,
            calories_burned: None,
            date: date("2024-01-01"),
            completed: false,
        };
        assert!(matches!(workout.validate(), Err(Error::Validation(_))));

        workout.exercises = vec![Exercise::new("Bench", 3, 8, 60.0)];
        workout.calories_burned = Some(f64::INFINITY);
        assert!(workout.validate().is_err());

        let patch = WorkoutPatch {
            calories_burned: Some(Some(f64::NAN)),
            ..WorkoutPatch::default()
        };
        assert!(patch.validate().is_err());
        let patch = WorkoutPatch {
            exercises: Some(vec![Exercise::new("Row", 3, 8, 1e12)]),
            ..WorkoutPatch::default()
        };
        assert!(patch.validate().is_err());
    }

    #[test]
    fn test_exercise_volume() {
        let e = Exercise::new("Bench", 3, 10, 60.0);
        assert!((e.volume() - 1800.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_workout_patch_requires_a_field() {
        assert!(WorkoutPatch::default().validate().is_err());
        let patch = WorkoutPatch {
            completed: Some(true),
            ..WorkoutPatch::default()
        };
        assert!(patch.validate().is_ok());
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({"completed": true}));
    }

    #[test]
    fn test_workout_patch_clears_description_with_null() {
        let patch = WorkoutPatch {
            description: Some(None),
            ..WorkoutPatch::default()
        };
        let value = serde_json::to_value(&patch).unwrap();
        assert_eq!(value, serde_json::json!({"description": null}));
    }

    #[test]
    fn test_progress_entry_validation() {
        let mut entry = NewProgressEntry {
            user_id: "u1".to_string(),
            date: date("2024-06-15"),
            weight: Some(80.5),
            body_fat: None,
            measurements: None,
            notes: None,
        };
        assert!(entry.validate().is_ok());

        entry.weight = Some(0.0);
        assert!(entry.validate().is_err());

        entry.weight = None;
        assert!(entry.validate().is_err());

        entry.measurements = Some(Measurements {
            waist: Some(82.0),
            ..Measurements::default()
        });
        assert!(entry.validate().is_ok());

        entry.body_fat = Some(120.0);
        assert!(entry.validate().is_err());

        entry.body_fat = Some(f64::NAN);
        assert!(entry.validate().is_err());

        entry.body_fat = None;
        entry.weight = Some(f64::NAN);
        assert!(entry.validate().is_err());

        entry.weight = None;
        entry.measurements = Some(Measurements {
            waist: Some(f64::INFINITY),
            ..Measurements::default()
        });
        assert!(entry.validate().is_err());
    }

    #[test]
    fn test_weekday_parse() {
        assert_eq!(Weekday::parse("Monday").unwrap(), Weekday::Monday);
        assert_eq!(Weekday::parse("sat").unwrap(), Weekday::Saturday);
        assert!(Weekday::parse("funday").is_err());
    }

    #[test]
    fn test_weekday_of_date() {
        // 2024-06-15 was a Saturday
        assert_eq!(Weekday::of(date("2024-06-15")), Weekday::Saturday);
        assert_eq!(Weekday::of(date("2024-06-17")), Weekday::Monday);
    }

    #[test]
    fn test_plan_days_serialize_by_weekday_name() {
        let mut days = BTreeMap::new();
        days.insert(
            Weekday::Wednesday,
            DayPlan {
                title: "Pull".to_string(),
                exercises: vec![PlanExercise {
                    name: "Row".to_string(),
                    sets: 4,
                    reps: 8,
                    notes: None,
                }],
            },
        );
        let plan = NewWorkoutPlan {
            user_id: "u1".to_string(),
            title: "PPL".to_string(),
            description: None,
            days,
            start_date: None,
            end_date: None,
            is_active: true,
        };
        let value = serde_json::to_value(&plan).unwrap();
        assert_eq!(value["days"]["wednesday"]["title"], "Pull");
        assert_eq!(value["isActive"], true);
    }

    #[test]
    fn test_plan_date_range_validation() {
        let plan = NewWorkoutPlan {
            user_id: "u1".to_string(),
            title: "Cut".to_string(),
            description: None,
            days: BTreeMap::new(),
            start_date: Some(date("2024-07-01")),
            end_date: Some(date("2024-06-01")),
            is_active: false,
        };
        assert!(plan.validate().is_err());
    }

    #[test]
    fn test_plan_day_for_respects_range() {
        let mut days = BTreeMap::new();
        days.insert(
            Weekday::Saturday,
            DayPlan {
                title: "Long run".to_string(),
                exercises: Vec::new(),
            },
        );
        let plan = WorkoutPlan {
            id: "p1".to_string(),
            user_id: "u1".to_string(),
            title: "Marathon".to_string(),
            description: None,
            days,
            start_date: Some(date("2024-06-01")),
            end_date: Some(date("2024-06-30")),
            is_active: true,
            created_at: String::new(),
        };
        assert_eq!(plan.day_for(date("2024-06-15")).unwrap().title, "Long run");
        assert!(plan.day_for(date("2024-06-14")).is_none());
        assert!(plan.day_for(date("2024-07-06")).is_none());
    }

    #[test]
    fn test_profile_patch_validation() {
        assert!(ProfilePatch::default().validate().is_err());
        let patch = ProfilePatch {
            height: Some(Some(-1.0)),
            ..ProfilePatch::default()
        };
        assert!(patch.validate().is_err());
        let patch = ProfilePatch {
            weight: Some(Some(f64::NAN)),
            ..ProfilePatch::default()
        };
        assert!(patch.validate().is_err());
        let patch = ProfilePatch {
            goals: Some(vec!["Run 10k".to_string()]),
            ..ProfilePatch::default()
        };
        assert!(patch.validate().is_ok());
    }

    #[test]
    fn test_new_account_profile_defaults() {
        let profile = UserProfile::new_account("uid1", "a@b.co", "Ada");
        assert!(profile.goals.is_empty());
        assert!(profile.height.is_none());
        assert!(profile.preferences.notifications);
        assert_eq!(profile.preferences.theme, ThemePreference::System);
        assert_eq!(profile.preferences.units, Units::Metric);
    }
}
