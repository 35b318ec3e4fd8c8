use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;

use stride_core::models::{DayPlan, Exercise, FoodItem, PlanExercise, Weekday};
use stride_core::nutrition::NutritionTotals;

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(Local::now().date_naive()),
        Some(s) => match s.as_str() {
            "today" => Ok(Local::now().date_naive()),
            "yesterday" => Ok(Local::now().date_naive() - chrono::Duration::days(1)),
            "tomorrow" => Ok(Local::now().date_naive() + chrono::Duration::days(1)),
            _ => NaiveDate::parse_from_str(&s, "%Y-%m-%d").with_context(|| {
                format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
            }),
        },
    }
}

fn field<T: std::str::FromStr>(value: &str, what: &str, arg: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| anyhow::anyhow!("Invalid {what} '{value}' in '{arg}'"))
}

/// A numeric field that must be a finite, non-negative number.
fn amount(value: &str, what: &str, arg: &str) -> Result<f64> {
    let n: f64 = field(value, what, arg)?;
    if !n.is_finite() || n < 0.0 {
        bail!("Invalid {what} '{value}' in '{arg}'");
    }
    Ok(n)
}

/// Parse `NAME:CALORIES:PROTEIN:CARBS:FAT[:QUANTITY[:SERVING]]`, nutrients
/// per serving. The serving defaults to `1 serving` and looks like `40g`
/// or `250 ml`.
pub(crate) fn parse_food(arg: &str) -> Result<FoodItem> {
    let parts: Vec<&str> = arg.split(':').collect();
    if parts.len() < 5 || parts.len() > 7 {
        bail!(
            "Invalid food '{arg}'. Use NAME:CALORIES:PROTEIN:CARBS:FAT[:QUANTITY[:SERVING]]"
        );
    }
    let name = parts[0].trim();
    if name.is_empty() {
        bail!("Food name must not be empty in '{arg}'");
    }
    let calories = amount(parts[1], "calories", arg)?;
    let protein = amount(parts[2], "protein", arg)?;
    let carbs = amount(parts[3], "carbs", arg)?;
    let fat = amount(parts[4], "fat", arg)?;
    let quantity = match parts.get(5) {
        Some(q) => amount(q, "quantity", arg)?,
        None => 1.0,
    };
    let (serving_size, serving_unit) = match parts.get(6) {
        Some(s) => parse_serving(s)?,
        None => (1.0, "serving".to_string()),
    };

    Ok(FoodItem::new(
        name,
        NutritionTotals::new(calories, protein, carbs, fat),
        serving_size,
        &serving_unit,
        quantity,
    ))
}

/// Split "40g", "250 ml" or "1.5 cup" into a size and a unit.
pub(crate) fn parse_serving(s: &str) -> Result<(f64, String)> {
    let s = s.trim();
    let idx = s.find(|c: char| c.is_alphabetic()).unwrap_or(s.len());
    let (num, unit) = s.split_at(idx);
    let size: f64 = num
        .trim()
        .parse()
        .with_context(|| format!("Invalid serving '{s}'. Use a number and unit like '40g'"))?;
    if !size.is_finite() || size <= 0.0 {
        bail!("Serving size must be greater than 0");
    }
    let unit = unit.trim();
    let unit = if unit.is_empty() { "g" } else { unit };
    Ok((size, unit.to_lowercase()))
}

/// Parse `NAME:SETS:REPS[:WEIGHT]`.
pub(crate) fn parse_exercise(arg: &str) -> Result<Exercise> {
    let parts: Vec<&str> = arg.split(':').collect();
    if parts.len() < 3 || parts.len() > 4 {
        bail!("Invalid exercise '{arg}'. Use NAME:SETS:REPS[:WEIGHT]");
    }
    let sets: u32 = field(parts[1], "sets", arg)?;
    let reps: u32 = field(parts[2], "reps", arg)?;
    let weight = match parts.get(3) {
        Some(w) => amount(w, "weight", arg)?,
        None => 0.0,
    };
    Ok(Exercise::new(parts[0].trim(), sets, reps, weight))
}

/// Parse `DAY=TITLE`, e.g. `mon=Push day`.
pub(crate) fn parse_day_title(arg: &str) -> Result<(Weekday, DayPlan)> {
    let (day, title) = arg
        .split_once('=')
        .with_context(|| format!("Invalid day '{arg}'. Use DAY=TITLE (e.g. 'mon=Push')"))?;
    let day = Weekday::parse(day.trim())?;
    Ok((
        day,
        DayPlan {
            title: title.trim().to_string(),
            exercises: Vec::new(),
        },
    ))
}

/// Parse `DAY=NAME:SETS:REPS`, e.g. `mon=Bench press:4:8`.
pub(crate) fn parse_plan_exercise(arg: &str) -> Result<(Weekday, PlanExercise)> {
    let (day, rest) = arg.split_once('=').with_context(|| {
        format!("Invalid plan exercise '{arg}'. Use DAY=NAME:SETS:REPS")
    })?;
    let day = Weekday::parse(day.trim())?;
    let parts: Vec<&str> = rest.split(':').collect();
    if parts.len() != 3 {
        bail!("Invalid plan exercise '{arg}'. Use DAY=NAME:SETS:REPS");
    }
    Ok((
        day,
        PlanExercise {
            name: parts[0].trim().to_string(),
            sets: field(parts[1], "sets", arg)?,
            reps: field(parts[2], "reps", arg)?,
            notes: None,
        },
    ))
}

/// Parse an on/off switch.
pub(crate) fn parse_switch(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "on" | "true" | "yes" => Ok(true),
        "off" | "false" | "no" => Ok(false),
        _ => bail!("Invalid value '{s}'. Use on or off"),
    }
}

/// Read one line from stdin after printing `label` to stderr.
pub(crate) fn prompt(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Report an empty result the way every list command does and exit with 2.
pub(crate) fn exit_empty(message: &str) -> ! {
    eprintln!("{message}");
    process::exit(2);
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

pub(crate) fn or_dash<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "-".to_string(), |v| v.to_string())
}
