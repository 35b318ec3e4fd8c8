use anyhow::Result;
use chrono::Local;
use std::collections::BTreeMap;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::models::{DayPlan, NewWorkoutPlan, Weekday, WorkoutPlan};

use super::Client;
use super::helpers::{
    exit_empty, or_dash, parse_date, parse_day_title, parse_plan_exercise, print_json, truncate,
};

/// Build the weekly schedule from `DAY=TITLE` and `DAY=NAME:SETS:REPS`
/// arguments. A day with exercises but no title is named after the day.
fn build_days(days: &[String], exercises: &[String]) -> Result<BTreeMap<Weekday, DayPlan>> {
    let mut schedule = BTreeMap::new();
    for arg in days {
        let (day, plan) = parse_day_title(arg)?;
        schedule.insert(day, plan);
    }
    for arg in exercises {
        let (day, exercise) = parse_plan_exercise(arg)?;
        schedule
            .entry(day)
            .or_insert_with(|| DayPlan {
                title: day.to_string(),
                exercises: Vec::new(),
            })
            .exercises
            .push(exercise);
    }
    Ok(schedule)
}

fn print_plan(plan: &WorkoutPlan) {
    let active = if plan.is_active { " (active)" } else { "" };
    println!("=== {}{active} ===", plan.title);
    println!("  id: {}", plan.id);
    if let Some(desc) = &plan.description {
        println!("  {desc}");
    }
    if plan.start_date.is_some() || plan.end_date.is_some() {
        println!("  {} to {}", or_dash(plan.start_date), or_dash(plan.end_date));
    }
    println!();
    for (day, session) in &plan.days {
        println!("  {day}: {}", session.title);
        for ex in &session.exercises {
            println!("    {} — {}x{}", ex.name, ex.sets, ex.reps);
        }
    }
}

pub(crate) struct PlanArgs {
    pub description: Option<String>,
    pub days: Vec<String>,
    pub exercises: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
}

pub(crate) async fn cmd_plan_create(
    client: &Client,
    title: &str,
    args: PlanArgs,
    activate: bool,
    json: bool,
) -> Result<()> {
    let user_id = client.uid()?;
    let plan = NewWorkoutPlan {
        user_id: user_id.clone(),
        title: title.to_string(),
        description: args.description,
        days: build_days(&args.days, &args.exercises)?,
        start_date: args.start.map(|d| parse_date(Some(d))).transpose()?,
        end_date: args.end.map(|d| parse_date(Some(d))).transpose()?,
        is_active: false,
    };
    let mut created = client.app.plans.create(&plan).await?;
    if activate {
        created = client.app.plans.activate(&user_id, &created.id).await?;
    }

    if json {
        return print_json(&created);
    }
    println!("Created plan {} (id: {})", created.title, created.id);
    Ok(())
}

pub(crate) async fn cmd_plan_list(client: &Client, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct PlanRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Days")]
        days: usize,
        #[tabled(rename = "Active")]
        active: &'static str,
        #[tabled(rename = "Start")]
        start: String,
        #[tabled(rename = "End")]
        end: String,
    }

    let uid = client.uid()?;
    let plans = client.app.plans.fetch_all(&uid, ()).await?;

    if json {
        return print_json(&plans);
    }
    if plans.is_empty() {
        exit_empty("No workout plans yet");
    }

    let rows: Vec<PlanRow> = plans
        .iter()
        .map(|p| PlanRow {
            id: p.id.clone(),
            title: truncate(&p.title, 30),
            days: p.days.len(),
            active: if p.is_active { "yes" } else { "" },
            start: or_dash(p.start_date),
            end: or_dash(p.end_date),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    let today = Local::now().date_naive();
    let scheduled = client
        .app
        .plans
        .active()
        .and_then(|p| p.day_for(today).map(|d| d.title.clone()));
    if let Some(title) = scheduled {
        println!("Today ({}): {title}", Weekday::of(today));
    }
    Ok(())
}

pub(crate) async fn cmd_plan_show(client: &Client, id: &str, json: bool) -> Result<()> {
    let plan = client.app.plans.fetch_one(id).await?;
    if json {
        return print_json(&plan);
    }
    print_plan(&plan);
    Ok(())
}

pub(crate) async fn cmd_plan_activate(client: &Client, id: &str, json: bool) -> Result<()> {
    let uid = client.uid()?;
    let plan = client.app.plans.activate(&uid, id).await?;
    if json {
        return print_json(&plan);
    }
    println!("Active plan: {}", plan.title);
    Ok(())
}

pub(crate) async fn cmd_plan_delete(client: &Client, id: &str, json: bool) -> Result<()> {
    let deleted = client.app.plans.delete(id).await?;

    if json {
        return print_json(&serde_json::json!({ "deleted": deleted, "id": id }));
    }
    if !deleted {
        exit_empty(&format!("No plan with id {id}"));
    }
    println!("Deleted plan {id}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_days_merges_titles_and_exercises() {
        let days = build_days(
            &["mon=Push".to_string(), "thu=Pull".to_string()],
            &[
                "mon=Bench press:4:8".to_string(),
                "mon=Dips:3:12".to_string(),
                "sat=Squat:5:5".to_string(),
            ],
        )
        .unwrap();

        assert_eq!(days.len(), 3);
        assert_eq!(days[&Weekday::Monday].title, "Push");
        assert_eq!(days[&Weekday::Monday].exercises.len(), 2);
        assert!(days[&Weekday::Thursday].exercises.is_empty());
        assert_eq!(days[&Weekday::Saturday].title, "saturday");
    }
}
