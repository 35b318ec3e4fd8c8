use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::models::{NewWorkout, Workout, WorkoutPatch};

use super::Client;
use super::helpers::{exit_empty, or_dash, parse_date, parse_exercise, print_json, truncate};

pub(crate) struct WorkoutArgs {
    pub title: Option<String>,
    pub description: Option<String>,
    pub exercises: Vec<String>,
    pub duration: Option<u32>,
    pub calories: Option<f64>,
    pub date: Option<String>,
}

fn print_workout(w: &Workout) {
    let done = if w.completed { "completed" } else { "planned" };
    println!("=== {} ({}, {done}) ===", w.title, w.date);
    println!("  id: {}", w.id);
    if let Some(desc) = &w.description {
        println!("  {desc}");
    }
    let calories = or_dash(w.calories_burned.map(|c| format!("{c:.0} kcal")));
    println!("  {} min | {calories} burned", w.duration);
    println!();
    for ex in &w.exercises {
        if ex.weight > 0.0 {
            println!("    {} — {}x{} @ {}", ex.name, ex.sets, ex.reps, ex.weight);
        } else {
            println!("    {} — {}x{}", ex.name, ex.sets, ex.reps);
        }
    }
    let volume = w.total_volume();
    if volume > 0.0 {
        println!("\n  Volume: {volume:.0}");
    }
}

pub(crate) async fn cmd_workout_add(
    client: &Client,
    title: &str,
    args: WorkoutArgs,
    completed: bool,
    json: bool,
) -> Result<()> {
    let user_id = client.uid()?;
    let exercises = args
        .exercises
        .iter()
        .map(|e| parse_exercise(e))
        .collect::<Result<Vec<_>>>()?;
    let workout = NewWorkout {
        user_id,
        title: title.to_string(),
        description: args.description,
        exercises,
        duration: args.duration.unwrap_or(0),
        calories_burned: args.calories,
        date: parse_date(args.date)?,
        completed,
    };
    let created = client.app.workouts.create(&workout).await?;

    if json {
        return print_json(&created);
    }
    println!(
        "Added workout {} on {} (id: {})",
        created.title, created.date, created.id
    );
    Ok(())
}

pub(crate) async fn cmd_workout_list(client: &Client, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct WorkoutRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Exercises")]
        exercises: usize,
        #[tabled(rename = "Minutes")]
        duration: u32,
        #[tabled(rename = "Volume")]
        volume: String,
        #[tabled(rename = "Done")]
        done: &'static str,
    }

    let uid = client.uid()?;
    let workouts = client.app.workouts.fetch_all(&uid, ()).await?;

    if json {
        return print_json(&workouts);
    }
    if workouts.is_empty() {
        exit_empty("No workouts yet");
    }

    let rows: Vec<WorkoutRow> = workouts
        .iter()
        .map(|w| WorkoutRow {
            id: w.id.clone(),
            date: w.date.to_string(),
            title: truncate(&w.title, 30),
            exercises: w.exercises.len(),
            duration: w.duration,
            volume: format!("{:.0}", w.total_volume()),
            done: if w.completed { "yes" } else { "no" },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

pub(crate) async fn cmd_workout_show(client: &Client, id: &str, json: bool) -> Result<()> {
    let workout = client.app.workouts.fetch_one(id).await?;
    if json {
        return print_json(&workout);
    }
    print_workout(&workout);
    Ok(())
}

pub(crate) async fn cmd_workout_update(
    client: &Client,
    id: &str,
    args: WorkoutArgs,
    json: bool,
) -> Result<()> {
    let exercises = if args.exercises.is_empty() {
        None
    } else {
        Some(
            args.exercises
                .iter()
                .map(|e| parse_exercise(e))
                .collect::<Result<Vec<_>>>()?,
        )
    };
    let patch = WorkoutPatch {
        title: args.title,
        description: args.description.map(Some),
        exercises,
        duration: args.duration,
        calories_burned: args.calories.map(Some),
        date: args.date.map(|d| parse_date(Some(d))).transpose()?,
        completed: None,
    };
    let updated = client.app.workouts.update(id, &patch).await?;

    if json {
        return print_json(&updated);
    }
    println!("Updated workout {}", updated.id);
    print_workout(&updated);
    Ok(())
}

pub(crate) async fn cmd_workout_complete(client: &Client, id: &str, json: bool) -> Result<()> {
    let patch = WorkoutPatch {
        completed: Some(true),
        ..WorkoutPatch::default()
    };
    let updated = client.app.workouts.update(id, &patch).await?;

    if json {
        return print_json(&updated);
    }
    println!("Completed {} ({})", updated.title, updated.date);
    Ok(())
}

pub(crate) async fn cmd_workout_delete(client: &Client, id: &str, json: bool) -> Result<()> {
    let deleted = client.app.workouts.delete(id).await?;

    if json {
        return print_json(&serde_json::json!({ "deleted": deleted, "id": id }));
    }
    if !deleted {
        exit_empty(&format!("No workout with id {id}"));
    }
    println!("Deleted workout {id}");
    Ok(())
}
