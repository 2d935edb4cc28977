//! Terminal rendering for portal types.
//!
//! Extension traits that add colored output to makerspace-core types using
//! owo_colors.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use makerspace_core::{Category, EventInstance, PresenceRecord, Recurrence};
use owo_colors::OwoColorize;

pub trait Render {
    fn render(&self) -> String;
}

impl Render for Category {
    fn render(&self) -> String {
        let (r, g, b) = self.rgb();
        self.as_str().truecolor(r, g, b).to_string()
    }
}

impl Render for EventInstance {
    fn render(&self) -> String {
        let time = format!(
            "{}-{}",
            self.start.format("%H:%M"),
            self.end.format("%H:%M")
        );
        let (r, g, b) = self.category.rgb();
        let mut line = format!(
            "  {} {} {}",
            time,
            self.title.truecolor(r, g, b).bold(),
            format!("[{}]", self.category).dimmed()
        );

        if self.recurrence != Recurrence::None {
            line.push_str(&format!(" {}", format!("({})", self.recurrence.as_str().to_lowercase()).dimmed()));
        }
        if let Some(url) = &self.meeting_url {
            line.push_str(&format!("\n        {}", url.underline()));
        }
        line
    }
}

/// One line per online user, e.g. "● ada  (seen 12s ago)".
pub fn render_presence(record: &PresenceRecord, now: DateTime<Utc>) -> String {
    let name = if record.username.is_empty() {
        record.user_id.as_str()
    } else {
        record.username.as_str()
    };
    let age = (now - record.last_seen).to_std().unwrap_or_default();
    format!(
        "  {} {}  {}",
        "●".green(),
        name,
        format!("(seen {} ago)", format_age(age)).dimmed()
    )
}

/// Whole seconds only; sub-second precision is noise here.
pub fn format_age(age: Duration) -> String {
    humantime::format_duration(Duration::from_secs(age.as_secs())).to_string()
}

/// A human-readable day label (e.g. "Today", "Tomorrow", "Wed Mar 5").
pub fn format_date_label(date: NaiveDate, today: NaiveDate) -> String {
    match (date - today).num_days() {
        0 => "Today".to_string(),
        1 => "Tomorrow".to_string(),
        -1 => "Yesterday".to_string(),
        _ => date.format("%a %b %-d").to_string(),
    }
}

pub fn pluralize(word: &str, count: usize) -> String {
    if count == 1 {
        word.to_string()
    } else {
        format!("{}s", word)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).unwrap()
    }

    #[test]
    fn date_labels() {
        assert_eq!(format_date_label(day(5), day(5)), "Today");
        assert_eq!(format_date_label(day(6), day(5)), "Tomorrow");
        assert_eq!(format_date_label(day(4), day(5)), "Yesterday");
        assert_eq!(format_date_label(day(12), day(5)), "Wed Mar 12");
    }

    #[test]
    fn ages_drop_fractions() {
        assert_eq!(format_age(Duration::from_millis(12_700)), "12s");
        assert_eq!(format_age(Duration::from_secs(95)), "1m 35s");
    }

    #[test]
    fn pluralize_counts() {
        assert_eq!(pluralize("event", 1), "event");
        assert_eq!(pluralize("event", 3), "events");
    }
}
