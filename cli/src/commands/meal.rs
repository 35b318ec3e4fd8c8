use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::models::{Meal, MealPatch, NewMeal};

use super::Client;
use super::helpers::{exit_empty, no_neg_zero, parse_date, parse_food, print_json, truncate};

pub(super) fn print_meal(meal: &Meal) {
    let t = &meal.totals;
    println!(
        "  {} [{}] ({:.0} kcal)",
        meal.name,
        meal.meal_type,
        t.calories.as_f64()
    );
    for food in &meal.foods {
        let qty = food.quantity;
        let serving = if food.serving_size.fract() == 0.0 {
            format!("{:.0}{}", food.serving_size, food.serving_unit)
        } else {
            format!("{}{}", food.serving_size, food.serving_unit)
        };
        let ft = food.totals();
        println!(
            "    {} — {qty} x {serving} — {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
            food.name,
            ft.calories.as_f64(),
            ft.protein.as_f64(),
            ft.carbs.as_f64(),
            ft.fat.as_f64()
        );
    }
}

pub(crate) async fn cmd_meal_log(
    client: &Client,
    name: &str,
    meal_type: &str,
    foods: &[String],
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let user_id = client.uid()?;
    let foods = foods
        .iter()
        .map(|f| parse_food(f))
        .collect::<Result<Vec<_>>>()?;
    let meal = NewMeal::new(&user_id, name, meal_type, parse_date(date)?, foods)?;
    let created = client.app.nutrition.create(&meal).await?;

    if json {
        return print_json(&created);
    }
    let cal = created.totals.calories.as_f64();
    println!(
        "Logged {} ({}) on {}: {cal:.0} kcal (id: {})",
        created.name, created.meal_type, created.date, created.id
    );
    Ok(())
}

pub(crate) async fn cmd_meal_list(client: &Client, date: Option<String>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct MealRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Meal")]
        meal_type: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Foods")]
        foods: usize,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let uid = client.uid()?;
    let date = parse_date(date)?;
    let meals = client.app.nutrition.fetch_day(&uid, date).await?;

    if json {
        return print_json(&meals);
    }
    if meals.is_empty() {
        exit_empty(&format!("No meals for {date}"));
    }

    let rows: Vec<MealRow> = meals
        .iter()
        .map(|m| MealRow {
            id: m.id.clone(),
            meal_type: m.meal_type.clone(),
            name: truncate(&m.name, 30),
            foods: m.foods.len(),
            calories: format!("{:.0}", no_neg_zero(m.totals.calories.as_f64())),
            protein: format!("{:.1}g", no_neg_zero(m.totals.protein.as_f64())),
            carbs: format!("{:.1}g", no_neg_zero(m.totals.carbs.as_f64())),
            fat: format!("{:.1}g", no_neg_zero(m.totals.fat.as_f64())),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) async fn cmd_meal_show(client: &Client, id: &str, json: bool) -> Result<()> {
    let meal = client.app.nutrition.fetch_one(id).await?;
    if json {
        return print_json(&meal);
    }
    println!("=== {} ===", meal.date);
    println!("  id: {}", meal.id);
    print_meal(&meal);
    Ok(())
}

pub(crate) async fn cmd_meal_update(
    client: &Client,
    id: &str,
    name: Option<&str>,
    meal_type: Option<&str>,
    foods: &[String],
    date: Option<String>,
    json: bool,
) -> Result<()> {
    let mut patch = MealPatch::new();
    if let Some(name) = name {
        patch = patch.name(name)?;
    }
    if let Some(meal_type) = meal_type {
        patch = patch.meal_type(meal_type)?;
    }
    if let Some(date) = date {
        patch = patch.date(parse_date(Some(date))?);
    }
    if !foods.is_empty() {
        let foods = foods
            .iter()
            .map(|f| parse_food(f))
            .collect::<Result<Vec<_>>>()?;
        patch = patch.foods(foods)?;
    }
    let updated = client.app.nutrition.update(id, &patch).await?;

    if json {
        return print_json(&updated);
    }
    println!("Updated meal {}", updated.id);
    print_meal(&updated);
    Ok(())
}

pub(crate) async fn cmd_meal_delete(client: &Client, id: &str, json: bool) -> Result<()> {
    let deleted = client.app.nutrition.delete(id).await?;

    if json {
        return print_json(&serde_json::json!({ "deleted": deleted, "id": id }));
    }
    if !deleted {
        exit_empty(&format!("No meal with id {id}"));
    }
    println!("Deleted meal {id}");
    Ok(())
}
