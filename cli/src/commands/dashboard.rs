use anyhow::Result;
use chrono::Local;
use serde_json::json;

use stride_core::Error;

use super::Client;
use super::helpers::{no_neg_zero, print_json};

fn outcome<T>(result: &std::result::Result<T, Error>) -> Option<&str> {
    result.as_ref().err().map(Error::message)
}

pub(crate) async fn cmd_dashboard(client: &Client, json: bool) -> Result<()> {
    let uid = client.uid()?;
    let today = Local::now().date_naive();
    let dash = client.app.load_dashboard(&uid, today).await;

    if json {
        return print_json(&json!({
            "date": today,
            "profile": dash.profile.as_ref().ok(),
            "workouts": dash.workouts.as_ref().ok(),
            "meals": dash.meals.as_ref().ok(),
            "summary": dash.summary,
            "progress": dash.progress.as_ref().ok(),
            "errors": {
                "profile": outcome(&dash.profile),
                "workouts": outcome(&dash.workouts),
                "meals": outcome(&dash.meals),
                "progress": outcome(&dash.progress),
            },
        }));
    }

    match &dash.profile {
        Ok(p) => println!("=== Hi, {} ({today}) ===\n", p.display_name),
        Err(e) => println!("=== {today} ===  (profile: {e})\n"),
    }

    match &dash.summary {
        Some(s) => println!(
            "  Nutrition: {} meals, {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
            s.meal_count,
            no_neg_zero(s.totals.calories.as_f64()),
            no_neg_zero(s.totals.protein.as_f64()),
            no_neg_zero(s.totals.carbs.as_f64()),
            no_neg_zero(s.totals.fat.as_f64())
        ),
        None => {
            if let Err(e) = &dash.meals {
                println!("  Nutrition: {e}");
            }
        }
    }

    match &dash.workouts {
        Ok(workouts) => {
            let done = workouts.iter().filter(|w| w.completed).count();
            println!("  Workouts:  {} logged, {done} completed", workouts.len());
            if let Some(latest) = workouts.first() {
                println!("             latest: {} ({})", latest.title, latest.date);
            }
        }
        Err(e) => println!("  Workouts:  {e}"),
    }

    match &dash.progress {
        Ok(_) => {
            let units = client.app.settings().units;
            match client.app.progress.latest_weight() {
                Some((date, w)) => {
                    println!("  Weight:    {w:.1} {} ({date})", units.weight_unit());
                }
                None => println!("  Weight:    -"),
            }
        }
        Err(e) => println!("  Progress:  {e}"),
    }

    Ok(())
}
