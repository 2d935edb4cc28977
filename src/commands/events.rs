use anyhow::Result;
use chrono::NaiveDate;
use makerspace_core::{Actor, Calendar, EventFilter, EventInstance};
use owo_colors::OwoColorize;

use crate::render::{Render, format_date_label, pluralize};
use crate::utils::tui::create_spinner;

pub async fn run(calendar: &Calendar, filter: EventFilter, viewer: Option<&Actor>, json: bool) -> Result<()> {
    let spinner = create_spinner("Loading events");
    let view = calendar.load().await;
    spinner.finish_and_clear();

    for diagnostic in &view.diagnostics {
        let label = match &diagnostic.event_id {
            Some(id) => format!("Skipped event {}: {}", id, diagnostic.message),
            None => diagnostic.message.clone(),
        };
        eprintln!("{}", label.yellow());
    }

    let instances = filter.apply(view.instances, viewer);

    if json {
        println!("{}", serde_json::to_string_pretty(&instances)?);
        return Ok(());
    }

    if instances.is_empty() {
        println!("{}", "No events found".dimmed());
        return Ok(());
    }

    print_by_day(&instances, chrono::Local::now().date_naive());
    println!(
        "\n{}",
        format!("{} {}", instances.len(), pluralize("event", instances.len())).dimmed()
    );

    Ok(())
}

fn print_by_day(instances: &[EventInstance], today: NaiveDate) {
    let mut current_date: Option<NaiveDate> = None;

    for instance in instances {
        let date = instance.start.date();
        if current_date != Some(date) {
            if current_date.is_some() {
                println!();
            }
            println!("{}", format_date_label(date, today).bold());
            current_date = Some(date);
        }
        println!("{}", instance.render());
    }
}
