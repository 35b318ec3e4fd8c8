use anyhow::Result;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use stride_core::models::{Measurements, NewProgressEntry};

use super::Client;
use super::helpers::{exit_empty, or_dash, parse_date, print_json, truncate};

pub(crate) struct ProgressArgs {
    pub weight: Option<f64>,
    pub body_fat: Option<f64>,
    pub measurements: Measurements,
    pub notes: Option<String>,
    pub date: Option<String>,
}

pub(crate) async fn cmd_progress_add(client: &Client, args: ProgressArgs, json: bool) -> Result<()> {
    let user_id = client.uid()?;
    let measurements = if args.measurements.is_empty() {
        None
    } else {
        Some(args.measurements)
    };
    let entry = NewProgressEntry {
        user_id,
        date: parse_date(args.date)?,
        weight: args.weight,
        body_fat: args.body_fat,
        measurements,
        notes: args.notes,
    };
    let created = client.app.progress.add(&entry).await?;

    if json {
        return print_json(&created);
    }
    let units = client.app.settings().units;
    let weight = or_dash(created.weight.map(|w| format!("{w} {}", units.weight_unit())));
    println!("Recorded progress for {}: {weight}", created.date);
    Ok(())
}

pub(crate) async fn cmd_progress_list(client: &Client, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct ProgressRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Body fat")]
        body_fat: String,
        #[tabled(rename = "Measurements")]
        measurements: String,
        #[tabled(rename = "Notes")]
        notes: String,
    }

    let uid = client.uid()?;
    let entries = client.app.progress.fetch_all(&uid).await?;

    if json {
        return print_json(&entries);
    }
    if entries.is_empty() {
        exit_empty("No progress entries yet");
    }

    let units = client.app.settings().units;
    let rows: Vec<ProgressRow> = entries
        .iter()
        .map(|e| ProgressRow {
            date: e.date.to_string(),
            weight: or_dash(e.weight.map(|w| format!("{w:.1} {}", units.weight_unit()))),
            body_fat: or_dash(e.body_fat.map(|b| format!("{b:.1}%"))),
            measurements: e.measurements.as_ref().map_or_else(
                || "-".to_string(),
                |m| {
                    m.values()
                        .iter()
                        .filter_map(|(name, v)| {
                            v.map(|v| format!("{name} {v}{}", units.length_unit()))
                        })
                        .collect::<Vec<_>>()
                        .join(", ")
                },
            ),
            notes: e.notes.as_deref().map(|n| truncate(n, 30)).unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    if let Some((date, weight)) = client.app.progress.latest_weight() {
        println!("Latest weight: {weight:.1} {} ({date})", units.weight_unit());
    }
    Ok(())
}
