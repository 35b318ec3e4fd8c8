use anyhow::Result;
use serde_json::json;

use stride_core::models::MEAL_TYPES;
use stride_core::nutrition::{DailySummary, NutritionTotals};

use super::Client;
use super::helpers::{exit_empty, no_neg_zero, parse_date, print_json};
use super::meal::print_meal;

fn macros_line(t: &NutritionTotals) -> String {
    format!(
        "{:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        no_neg_zero(t.calories.as_f64()),
        no_neg_zero(t.protein.as_f64()),
        no_neg_zero(t.carbs.as_f64()),
        no_neg_zero(t.fat.as_f64())
    )
}

pub(crate) async fn cmd_summary(client: &Client, date: Option<String>, json: bool) -> Result<()> {
    let uid = client.uid()?;
    let date = parse_date(date)?;
    let meals = client.app.nutrition.fetch_day(&uid, date).await?;
    let summary = client
        .app
        .nutrition
        .daily_summary()
        .unwrap_or_else(|| DailySummary::from_meals(date, &meals));

    if json {
        return print_json(&json!({ "summary": summary, "meals": meals }));
    }

    if meals.is_empty() {
        exit_empty(&format!("No meals for {date}"));
    }

    println!("=== {date} ===\n");

    for meal_type in MEAL_TYPES {
        let of_type: Vec<_> = meals.iter().filter(|m| m.meal_type == *meal_type).collect();
        if of_type.is_empty() {
            continue;
        }
        let subtotal: NutritionTotals = of_type.iter().map(|m| m.totals).sum();
        println!(
            "  {} ({:.0} kcal)",
            meal_type.to_uppercase(),
            subtotal.calories.as_f64()
        );
        for meal in of_type {
            print_meal(meal);
        }
        println!();
    }

    println!(
        "  TOTAL ({} meals): {}",
        summary.meal_count,
        macros_line(&summary.totals)
    );
    Ok(())
}
