use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveTime, TimeDelta};
use clap::Args;
use makerspace_core::event::{parse_date, parse_time};
use makerspace_core::{Actor, Calendar, EventDraft};
use owo_colors::OwoColorize;

const DEFAULT_LENGTH: &str = "1h";

#[derive(Args)]
pub struct EventArgs {
    /// Day of the event (YYYY-MM-DD), defaults to today
    #[arg(short, long)]
    pub date: Option<String>,

    /// Start time (HH:MM)
    #[arg(short, long)]
    pub start: String,

    /// End time (HH:MM)
    #[arg(short, long, conflicts_with = "duration")]
    pub end: Option<String>,

    /// Length instead of an end time, e.g. "90m" (default 1h)
    #[arg(long)]
    pub duration: Option<String>,

    /// Meeting, Workshop, Deadline or Personal
    #[arg(short, long, default_value = "Personal")]
    pub category: String,

    /// None, Daily, Weekly or Monthly
    #[arg(short, long, default_value = "None")]
    pub recurrence: String,

    #[arg(long)]
    pub description: Option<String>,

    /// Ask the portal to send a reminder
    #[arg(long)]
    pub reminder: bool,
}

impl EventArgs {
    pub fn into_draft(self, title: String, today: NaiveDate) -> Result<EventDraft> {
        let date = match self.date.as_deref() {
            Some(d) => parse_date(d)?,
            None => today,
        };
        let start_time = parse_time(&self.start)?;
        let end_time = match self.end.as_deref() {
            Some(e) => parse_time(e)?,
            None => end_after(start_time, self.duration.as_deref().unwrap_or(DEFAULT_LENGTH))?,
        };

        Ok(EventDraft {
            title,
            description: self.description,
            date,
            start_time,
            end_time,
            category: self.category.parse()?,
            recurrence: self.recurrence.parse()?,
            reminder: self.reminder,
        })
    }
}

/// End time `length` after `start`, which must stay on the same day.
pub fn end_after(start: NaiveTime, length: &str) -> Result<NaiveTime> {
    let std_dur = humantime::parse_duration(length.trim())
        .with_context(|| format!("Could not parse duration: \"{}\"", length))?;
    let delta = TimeDelta::from_std(std_dur).context("Duration too large")?;

    let (end, wrapped) = start.overflowing_add_signed(delta);
    if wrapped != 0 || end <= start {
        anyhow::bail!("Events must end on the day they start");
    }
    Ok(end)
}

pub async fn run(calendar: &Calendar, actor: &Actor, draft: EventDraft) -> Result<()> {
    let event = calendar.create(actor, &draft).await?;

    println!(
        "{}",
        format!(
            "  Created: {} on {} {}-{}",
            event.title,
            event.date,
            event.start_time.format("%H:%M"),
            event.end_time.format("%H:%M")
        )
        .green()
    );
    println!("  {}", format!("id {}", event.id).dimmed());
    if let Some(url) = &event.meeting_url {
        println!("  Join: {}", url.underline());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use makerspace_core::{Category, Recurrence};

    fn args(start: &str) -> EventArgs {
        EventArgs {
            date: None,
            start: start.to_string(),
            end: None,
            duration: None,
            category: "Personal".to_string(),
            recurrence: "None".to_string(),
            description: None,
            reminder: false,
        }
    }

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, 5).unwrap()
    }

    #[test]
    fn draft_defaults_to_today_and_one_hour() {
        let draft = args("14:00").into_draft("Tool tidy".into(), today()).unwrap();
        assert_eq!(draft.date, today());
        assert_eq!(draft.end_time, NaiveTime::from_hms_opt(15, 0, 0).unwrap());
        assert_eq!(draft.category, Category::Personal);
        assert_eq!(draft.recurrence, Recurrence::None);
    }

    #[test]
    fn draft_uses_explicit_fields() {
        let mut a = args("18:30");
        a.date = Some("2025-03-12".into());
        a.duration = Some("90m".into());
        a.category = "workshop".into();
        a.recurrence = "weekly".into();

        let draft = a.into_draft("Soldering club".into(), today()).unwrap();
        assert_eq!(draft.date, NaiveDate::from_ymd_opt(2025, 3, 12).unwrap());
        assert_eq!(draft.end_time, NaiveTime::from_hms_opt(20, 0, 0).unwrap());
        assert_eq!(draft.category, Category::Workshop);
        assert_eq!(draft.recurrence, Recurrence::Weekly);
    }

    #[test]
    fn draft_rejects_unknown_category() {
        let mut a = args("10:00");
        a.category = "Party".into();
        assert!(a.into_draft("Oops".into(), today()).is_err());
    }

    #[test]
    fn end_after_stays_on_the_same_day() {
        let start = NaiveTime::from_hms_opt(23, 0, 0).unwrap();
        assert!(end_after(start, "30m").is_ok());
        assert!(end_after(start, "2h").is_err());
        assert!(end_after(start, "soon").is_err());
    }
}
