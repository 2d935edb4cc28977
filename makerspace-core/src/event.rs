//! Calendar event types.
//!
//! Rows come out of the `events` table as loosely shaped JSON. They are decoded
//! into an [`EventRow`] (dates and times still as text) and then validated into an
//! [`Event`], which is the only shape the expander and calendar service work with.

use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{PortalError, PortalResult};
use crate::store::Row;

/// Table holding event definitions.
pub const EVENTS_TABLE: &str = "events";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMATS: [&str; 3] = ["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];

/// Identifier of a stored event.
///
/// The hosted database may hand out uuids or integer keys, so the id is kept
/// as an opaque string either way.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    pub fn new(id: impl Into<String>) -> Self {
        EventId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(i64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => EventId(s),
            RawId::Number(n) => EventId(n.to_string()),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    Meeting,
    Workshop,
    Deadline,
    Personal,
}

impl Category {
    pub const ALL: [Category; 4] = [
        Category::Meeting,
        Category::Workshop,
        Category::Deadline,
        Category::Personal,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Meeting => "Meeting",
            Category::Workshop => "Workshop",
            Category::Deadline => "Deadline",
            Category::Personal => "Personal",
        }
    }

    /// Display color used by the portal's calendar views.
    pub fn rgb(&self) -> (u8, u8, u8) {
        match self {
            Category::Meeting => (0x25, 0x63, 0xeb),
            Category::Workshop => (0x05, 0x96, 0x69),
            Category::Deadline => (0xb9, 0x1c, 0x1c),
            Category::Personal => (0xd9, 0x77, 0x06),
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| PortalError::Parse(format!("Unknown category '{}'", s)))
    }
}

/// How an event repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Recurrence {
    #[default]
    None,
    Daily,
    Weekly,
    Monthly,
}

impl Recurrence {
    pub const ALL: [Recurrence; 4] = [
        Recurrence::None,
        Recurrence::Daily,
        Recurrence::Weekly,
        Recurrence::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Recurrence::None => "None",
            Recurrence::Daily => "Daily",
            Recurrence::Weekly => "Weekly",
            Recurrence::Monthly => "Monthly",
        }
    }

    pub fn is_recurring(&self) -> bool {
        *self != Recurrence::None
    }
}

impl fmt::Display for Recurrence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Recurrence {
    type Err = PortalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Ok(Recurrence::None);
        }
        Recurrence::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| PortalError::Parse(format!("Unknown recurrence '{}'", s)))
    }
}

/// An `events` row exactly as stored, before validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub id: EventId,
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: String,
    pub start_time: String,
    pub end_time: String,
    pub category: String,
    #[serde(default)]
    pub recurrence: Option<String>,
    pub created_by: String,
    #[serde(default)]
    pub meeting_url: Option<String>,
    #[serde(default)]
    pub reminder: Option<bool>,
}

impl EventRow {
    pub fn from_row(row: Row) -> PortalResult<Self> {
        serde_json::from_value(serde_json::Value::Object(row))
            .map_err(|e| PortalError::Parse(format!("Malformed event row: {}", e)))
    }
}

/// A validated calendar event definition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub category: Category,
    pub recurrence: Recurrence,
    pub created_by: String,
    pub meeting_url: Option<String>,
    pub reminder: bool,
}

impl Event {
    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    pub fn duration(&self) -> TimeDelta {
        self.end_time - self.start_time
    }
}

/// Prefix a field error with the event it came from, keeping a single
/// "Parse error:" in the rendered message.
fn in_event(id: &EventId, field: &str, e: PortalError) -> PortalError {
    let detail = match e {
        PortalError::Parse(msg) => msg,
        other => other.to_string(),
    };
    PortalError::Parse(format!("Event '{}': {}{}", id, field, detail))
}

impl TryFrom<EventRow> for Event {
    type Error = PortalError;

    fn try_from(row: EventRow) -> Result<Self, Self::Error> {
        let date = parse_date(&row.date).map_err(|e| in_event(&row.id, "", e))?;
        let start_time = parse_time(&row.start_time).map_err(|e| in_event(&row.id, "start ", e))?;
        let end_time = parse_time(&row.end_time).map_err(|e| in_event(&row.id, "end ", e))?;

        if start_time >= end_time {
            return Err(PortalError::Parse(format!(
                "Event '{}': start {} is not before end {}",
                row.id, row.start_time, row.end_time
            )));
        }

        let category = row.category.parse().map_err(|e| in_event(&row.id, "", e))?;
        let recurrence = match row.recurrence.as_deref() {
            Some(r) => r.parse().map_err(|e| in_event(&row.id, "", e))?,
            None => Recurrence::None,
        };

        Ok(Event {
            id: row.id,
            title: row.title,
            description: row.description,
            date,
            start_time,
            end_time,
            category,
            recurrence,
            created_by: row.created_by,
            meeting_url: row.meeting_url.filter(|u| !u.is_empty()),
            reminder: row.reminder.unwrap_or(false),
        })
    }
}

/// Parse a `YYYY-MM-DD` calendar day.
pub fn parse_date(s: &str) -> PortalResult<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), DATE_FORMAT).map_err(|_| {
        PortalError::Parse(format!("Invalid date '{}'. Expected YYYY-MM-DD", s))
    })
}

/// Parse a wall-clock time as `HH:MM`, `HH:MM:SS` or with fractional seconds.
pub fn parse_time(s: &str) -> PortalResult<NaiveTime> {
    let s = s.trim();
    TIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveTime::parse_from_str(s, fmt).ok())
        .ok_or_else(|| PortalError::Parse(format!("Invalid time '{}'. Expected HH:MM", s)))
}

/// User input for creating or replacing an event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventDraft {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub category: Category,
    #[serde(default)]
    pub recurrence: Recurrence,
    #[serde(default)]
    pub reminder: bool,
}

impl EventDraft {
    pub fn validate(&self) -> PortalResult<()> {
        if self.title.trim().is_empty() {
            return Err(PortalError::Validation("Title is required".into()));
        }
        if self.start_time >= self.end_time {
            return Err(PortalError::Validation(format!(
                "Start time {} must be before end time {}",
                self.start_time.format("%H:%M"),
                self.end_time.format("%H:%M")
            )));
        }
        Ok(())
    }

    pub fn start(&self) -> NaiveDateTime {
        self.date.and_time(self.start_time)
    }

    pub fn end(&self) -> NaiveDateTime {
        self.date.and_time(self.end_time)
    }

    /// Columns written for this draft; ownership and meeting link are added by the caller.
    pub fn to_row(&self) -> Row {
        let mut row = Row::new();
        row.insert("title".into(), self.title.trim().into());
        row.insert(
            "description".into(),
            self.description.clone().unwrap_or_default().into(),
        );
        row.insert("date".into(), self.date.format(DATE_FORMAT).to_string().into());
        row.insert(
            "start_time".into(),
            self.start_time.format("%H:%M:%S").to_string().into(),
        );
        row.insert(
            "end_time".into(),
            self.end_time.format("%H:%M:%S").to_string().into(),
        );
        row.insert("category".into(), self.category.as_str().into());
        row.insert("recurrence".into(), self.recurrence.as_str().into());
        row.insert("reminder".into(), self.reminder.into());
        row
    }
}

impl From<&Event> for EventDraft {
    fn from(event: &Event) -> Self {
        EventDraft {
            title: event.title.clone(),
            description: event.description.clone(),
            date: event.date,
            start_time: event.start_time,
            end_time: event.end_time,
            category: event.category,
            recurrence: event.recurrence,
            reminder: event.reminder,
        }
    }
}

/// One concrete dated occurrence of an [`Event`].
///
/// Instances are derived on every load and never written back; edits and
/// deletes always target `source_event_id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventInstance {
    pub source_event_id: EventId,
    pub group_id: EventId,
    pub start: NaiveDateTime,
    pub end: NaiveDateTime,
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub recurrence: Recurrence,
    pub created_by: String,
    pub meeting_url: Option<String>,
}

impl EventInstance {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Half-open overlap test on `[start, end)`.
    pub fn overlaps(&self, start: NaiveDateTime, end: NaiveDateTime) -> bool {
        start < self.end && self.start < end
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: serde_json::Value) -> Row {
        match value {
            serde_json::Value::Object(map) => map,
            _ => panic!("Expected an object"),
        }
    }

    #[test]
    fn test_event_row_accepts_integer_and_string_ids() {
        let numeric = EventRow::from_row(row(json!({
            "id": 42,
            "title": "Laser cutter induction",
            "date": "2025-03-05",
            "start_time": "09:00:00",
            "end_time": "10:30:00",
            "category": "Workshop",
            "created_by": "u1"
        })))
        .expect("Should decode numeric id");
        assert_eq!(numeric.id.as_str(), "42");

        let text = EventRow::from_row(row(json!({
            "id": "b7c1",
            "title": "Board meeting",
            "date": "2025-03-05",
            "start_time": "18:00",
            "end_time": "19:00",
            "category": "Meeting",
            "recurrence": null,
            "created_by": "u2"
        })))
        .expect("Should decode string id");
        assert_eq!(text.id.as_str(), "b7c1");
    }

    #[test]
    fn test_event_from_row_parses_both_time_formats() {
        let event: Event = EventRow::from_row(row(json!({
            "id": 1,
            "title": "Open shop",
            "date": "2025-03-05",
            "start_time": "09:00",
            "end_time": "17:30:00",
            "category": "personal",
            "recurrence": "weekly",
            "created_by": "u1"
        })))
        .and_then(Event::try_from)
        .expect("Should validate");

        assert_eq!(event.category, Category::Personal);
        assert_eq!(event.recurrence, Recurrence::Weekly);
        assert_eq!(event.duration(), TimeDelta::minutes(510));
        assert!(!event.reminder);
    }

    #[test]
    fn test_event_rejects_inverted_times() {
        let err = EventRow::from_row(row(json!({
            "id": 1,
            "title": "Backwards",
            "date": "2025-03-05",
            "start_time": "11:00",
            "end_time": "10:00",
            "category": "Meeting",
            "created_by": "u1"
        })))
        .and_then(Event::try_from)
        .expect_err("Should reject end before start");

        assert!(matches!(err, PortalError::Parse(_)));
    }

    #[test]
    fn test_bad_date_message_names_the_event_once() {
        let err = EventRow::from_row(row(json!({
            "id": "bad",
            "title": "Broken",
            "date": "2025-13-45",
            "start_time": "09:00",
            "end_time": "10:00",
            "category": "Meeting",
            "created_by": "u1"
        })))
        .and_then(Event::try_from)
        .expect_err("Should reject the date");

        assert_eq!(
            err.to_string(),
            "Parse error: Event 'bad': Invalid date '2025-13-45'. Expected YYYY-MM-DD"
        );
    }

    #[test]
    fn test_unknown_category_is_a_parse_error() {
        assert!(matches!(
            "Party".parse::<Category>(),
            Err(PortalError::Parse(_))
        ));
        assert_eq!("".parse::<Recurrence>().expect("empty is None"), Recurrence::None);
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = EventDraft {
            title: "  ".into(),
            description: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 5).expect("valid date"),
            start_time: NaiveTime::from_hms_opt(9, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"),
            category: Category::Meeting,
            recurrence: Recurrence::None,
            reminder: false,
        };
        assert!(matches!(draft.validate(), Err(PortalError::Validation(_))));

        draft.title = "Standup".into();
        assert!(draft.validate().is_ok());

        draft.end_time = draft.start_time;
        assert!(matches!(draft.validate(), Err(PortalError::Validation(_))));
    }

    #[test]
    fn test_instance_overlap_is_half_open() {
        let day = NaiveDate::from_ymd_opt(2025, 3, 5).expect("valid date");
        let at = |h| day.and_hms_opt(h, 0, 0).expect("valid time");
        let instance = EventInstance {
            source_event_id: EventId::new("1"),
            group_id: EventId::new("1"),
            start: at(9),
            end: at(10),
            title: "Standup".into(),
            description: None,
            category: Category::Meeting,
            recurrence: Recurrence::None,
            created_by: "u1".into(),
            meeting_url: None,
        };

        assert!(instance.overlaps(at(9), at(11)));
        assert!(instance.overlaps(at(8), at(12)));
        assert!(!instance.overlaps(at(10), at(11)));
        assert!(!instance.overlaps(at(8), at(9)));
    }
}
