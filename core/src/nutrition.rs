//! Nutrition arithmetic and the derived daily summary.
//!
//! Nutrient amounts are fixed-point (`Quantity`, thousandths in an `i64`) so
//! that the daily summary can be adjusted incrementally on every create,
//! update and delete without accumulating rounding drift: adding a meal's
//! totals and later subtracting them returns exactly to the previous value.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::collection::Aggregate;
use crate::models::{FoodItem, Meal, MealFilter};

const SCALE: f64 = 1000.0;

/// A nutrient amount (kcal or grams) with three decimal places of precision.
/// Arithmetic saturates at the `i64` bounds instead of overflowing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Quantity(i64);

impl Quantity {
    pub const ZERO: Quantity = Quantity(0);

    #[must_use]
    pub fn from_milli(milli: i64) -> Self {
        Self(milli)
    }

    /// Round a floating-point amount to the nearest thousandth.
    #[must_use]
    pub fn from_f64(value: f64) -> Self {
        Self((value * SCALE).round() as i64)
    }

    #[must_use]
    pub fn milli(self) -> i64 {
        self.0
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(self) -> f64 {
        self.0 as f64 / SCALE
    }

    /// Multiply by a serving quantity, rounding once at the end.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn scale(self, factor: f64) -> Self {
        Self((self.0 as f64 * factor).round() as i64)
    }

    #[must_use]
    pub fn is_negative(self) -> bool {
        self.0 < 0
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match f.precision() {
            Some(p) => write!(f, "{:.*}", p, self.as_f64()),
            None => write!(f, "{}", self.as_f64()),
        }
    }
}

impl Add for Quantity {
    type Output = Quantity;
    fn add(self, rhs: Quantity) -> Quantity {
        Quantity(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Quantity {
    type Output = Quantity;
    fn sub(self, rhs: Quantity) -> Quantity {
        Quantity(self.0.saturating_sub(rhs.0))
    }
}

impl AddAssign for Quantity {
    fn add_assign(&mut self, rhs: Quantity) {
        *self = *self + rhs;
    }
}

impl SubAssign for Quantity {
    fn sub_assign(&mut self, rhs: Quantity) {
        *self = *self - rhs;
    }
}

impl Neg for Quantity {
    type Output = Quantity;
    fn neg(self) -> Quantity {
        Quantity(self.0.saturating_neg())
    }
}

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Quantity>>(iter: I) -> Quantity {
        iter.fold(Quantity::ZERO, Add::add)
    }
}

impl From<f64> for Quantity {
    fn from(value: f64) -> Self {
        Self::from_f64(value)
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.as_f64())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = f64::deserialize(deserializer)?;
        if !value.is_finite() {
            return Err(serde::de::Error::custom("nutrient amount must be finite"));
        }
        Ok(Self::from_f64(value))
    }
}

/// Calories and macronutrients, serialized with the `total*` field names a
/// meal document stores them under.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutritionTotals {
    #[serde(rename = "totalCalories")]
    pub calories: Quantity,
    #[serde(rename = "totalProtein")]
    pub protein: Quantity,
    #[serde(rename = "totalCarbs")]
    pub carbs: Quantity,
    #[serde(rename = "totalFat")]
    pub fat: Quantity,
}

impl NutritionTotals {
    pub const ZERO: NutritionTotals = NutritionTotals {
        calories: Quantity::ZERO,
        protein: Quantity::ZERO,
        carbs: Quantity::ZERO,
        fat: Quantity::ZERO,
    };

    #[must_use]
    pub fn new(calories: f64, protein: f64, carbs: f64, fat: f64) -> Self {
        Self {
            calories: Quantity::from_f64(calories),
            protein: Quantity::from_f64(protein),
            carbs: Quantity::from_f64(carbs),
            fat: Quantity::from_f64(fat),
        }
    }

    /// Totals of a food list: each item contributes its per-serving amounts
    /// times its quantity.
    #[must_use]
    pub fn from_foods(foods: &[FoodItem]) -> Self {
        foods.iter().map(FoodItem::totals).sum()
    }
}

impl Add for NutritionTotals {
    type Output = NutritionTotals;
    fn add(self, rhs: NutritionTotals) -> NutritionTotals {
        NutritionTotals {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl Sub for NutritionTotals {
    type Output = NutritionTotals;
    fn sub(self, rhs: NutritionTotals) -> NutritionTotals {
        NutritionTotals {
            calories: self.calories - rhs.calories,
            protein: self.protein - rhs.protein,
            carbs: self.carbs - rhs.carbs,
            fat: self.fat - rhs.fat,
        }
    }
}

impl AddAssign for NutritionTotals {
    fn add_assign(&mut self, rhs: NutritionTotals) {
        *self = *self + rhs;
    }
}

impl SubAssign for NutritionTotals {
    fn sub_assign(&mut self, rhs: NutritionTotals) {
        *self = *self - rhs;
    }
}

impl Sum for NutritionTotals {
    fn sum<I: Iterator<Item = NutritionTotals>>(iter: I) -> NutritionTotals {
        iter.fold(NutritionTotals::ZERO, Add::add)
    }
}

/// Nutrition totals across every meal logged on one date. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailySummary {
    pub date: NaiveDate,
    #[serde(flatten)]
    pub totals: NutritionTotals,
    pub meal_count: usize,
}

impl DailySummary {
    /// Full recomputation over the meals of `date`; meals of other dates are
    /// ignored.
    #[must_use]
    pub fn from_meals(date: NaiveDate, meals: &[Meal]) -> Self {
        let on_date = meals.iter().filter(|m| m.date == date);
        let mut summary = Self {
            date,
            totals: NutritionTotals::ZERO,
            meal_count: 0,
        };
        for meal in on_date {
            summary.totals += meal.totals;
            summary.meal_count += 1;
        }
        summary
    }

    fn add_meal(&mut self, meal: &Meal) {
        if meal.date == self.date {
            self.totals += meal.totals;
            self.meal_count += 1;
        }
    }

    fn remove_meal(&mut self, meal: &Meal) {
        if meal.date == self.date {
            self.totals -= meal.totals;
            self.meal_count = self.meal_count.saturating_sub(1);
        }
    }
}

/// Keeps the nutrition slice's daily summary in step with its meal list.
///
/// The summary tracks exactly one date: the one last fetched. Changes to
/// meals of any other date leave it untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DailySummaryTracker {
    summary: Option<DailySummary>,
}

impl DailySummaryTracker {
    #[must_use]
    pub fn summary(&self) -> Option<&DailySummary> {
        self.summary.as_ref()
    }
}

impl Aggregate<Meal> for DailySummaryTracker {
    fn on_fetch_all(&mut self, filter: &MealFilter, items: &[Meal]) {
        self.summary = Some(DailySummary::from_meals(filter.date, items));
    }

    fn on_create(&mut self, item: &Meal) {
        if let Some(summary) = self.summary.as_mut() {
            summary.add_meal(item);
        }
    }

    fn on_update(&mut self, old: &Meal, new: &Meal) {
        if let Some(summary) = self.summary.as_mut() {
            summary.remove_meal(old);
            summary.add_meal(new);
        }
    }

    fn on_delete(&mut self, removed: &Meal) {
        if let Some(summary) = self.summary.as_mut() {
            summary.remove_meal(removed);
        }
    }
}
