use anyhow::Result;
use clap::Args;
use makerspace_core::event::{parse_date, parse_time};
use makerspace_core::{Actor, Calendar, Event, EventDraft, EventId};
use owo_colors::OwoColorize;

/// Fields to change; anything left out keeps its current value.
#[derive(Args, Default)]
pub struct ChangeArgs {
    #[arg(long)]
    pub title: Option<String>,

    /// New day (YYYY-MM-DD)
    #[arg(short, long)]
    pub date: Option<String>,

    /// New start time (HH:MM); keeps the length unless --end is given
    #[arg(short, long)]
    pub start: Option<String>,

    /// New end time (HH:MM)
    #[arg(short, long)]
    pub end: Option<String>,

    #[arg(short, long)]
    pub category: Option<String>,

    #[arg(short, long)]
    pub recurrence: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    #[arg(long)]
    pub reminder: Option<bool>,
}

impl ChangeArgs {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.date.is_none()
            && self.start.is_none()
            && self.end.is_none()
            && self.category.is_none()
            && self.recurrence.is_none()
            && self.description.is_none()
            && self.reminder.is_none()
    }

    pub fn apply(self, existing: &Event) -> Result<EventDraft> {
        let mut draft = EventDraft::from(existing);

        if let Some(title) = self.title {
            draft.title = title;
        }
        if let Some(date) = self.date.as_deref() {
            draft.date = parse_date(date)?;
        }
        if let Some(start) = self.start.as_deref() {
            draft.start_time = parse_time(start)?;
            if self.end.is_none() {
                let (end, wrapped) = draft.start_time.overflowing_add_signed(existing.duration());
                if wrapped != 0 {
                    anyhow::bail!("Moved event would end after midnight; pass --end as well");
                }
                draft.end_time = end;
            }
        }
        if let Some(end) = self.end.as_deref() {
            draft.end_time = parse_time(end)?;
        }
        if let Some(category) = self.category.as_deref() {
            draft.category = category.parse()?;
        }
        if let Some(recurrence) = self.recurrence.as_deref() {
            draft.recurrence = recurrence.parse()?;
        }
        if let Some(description) = self.description {
            draft.description = Some(description);
        }
        if let Some(reminder) = self.reminder {
            draft.reminder = reminder;
        }

        Ok(draft)
    }
}

pub async fn run(calendar: &Calendar, actor: &Actor, id: &EventId, changes: ChangeArgs) -> Result<()> {
    if changes.is_empty() {
        println!("{}", "Nothing to change".dimmed());
        return Ok(());
    }

    let existing = calendar.events().get(id).await?;
    let draft = changes.apply(&existing)?;
    let event = calendar.update(actor, id, &draft).await?;

    println!(
        "{}",
        format!(
            "  Updated: {} on {} {}-{}",
            event.title,
            event.date,
            event.start_time.format("%H:%M"),
            event.end_time.format("%H:%M")
        )
        .yellow()
    );
    Ok(())
}
