//! Recurring event expansion.
//!
//! Materializes a stored event definition into the concrete dated instances a
//! calendar view renders. Recurring events are expanded from their own date up
//! to a fixed horizon per cadence; there are no exception dates or per-instance
//! overrides.

use chrono::{Datelike, Months, NaiveDate, TimeDelta};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{PortalError, PortalResult};
use crate::event::{Event, EventInstance, EventRow, Recurrence};
use crate::store::Row;

fn default_daily_days() -> u32 {
    30
}

fn default_weekly_weeks() -> u32 {
    12
}

fn default_monthly_months() -> u32 {
    6
}

/// How far ahead each cadence is expanded, counted from the event's own date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecurrenceHorizon {
    #[serde(default = "default_daily_days")]
    pub daily_days: u32,
    #[serde(default = "default_weekly_weeks")]
    pub weekly_weeks: u32,
    #[serde(default = "default_monthly_months")]
    pub monthly_months: u32,
}

impl Default for RecurrenceHorizon {
    fn default() -> Self {
        RecurrenceHorizon {
            daily_days: default_daily_days(),
            weekly_weeks: default_weekly_weeks(),
            monthly_months: default_monthly_months(),
        }
    }
}

impl RecurrenceHorizon {
    /// Largest accepted horizons: two years of each cadence.
    pub const MAX_DAILY_DAYS: u32 = 731;
    pub const MAX_WEEKLY_WEEKS: u32 = 104;
    pub const MAX_MONTHLY_MONTHS: u32 = 24;

    /// Reject horizons that would materialize an unbounded number of instances.
    pub fn validate(&self) -> PortalResult<()> {
        let limits = [
            ("daily_days", self.daily_days, Self::MAX_DAILY_DAYS),
            ("weekly_weeks", self.weekly_weeks, Self::MAX_WEEKLY_WEEKS),
            ("monthly_months", self.monthly_months, Self::MAX_MONTHLY_MONTHS),
        ];
        match limits.into_iter().find(|(_, value, max)| value > max) {
            Some((name, value, max)) => Err(PortalError::Config(format!(
                "recurrence.{} = {} exceeds the maximum of {}",
                name, value, max
            ))),
            None => Ok(()),
        }
    }

    /// Last date (inclusive) instances are generated for.
    pub fn end_for(&self, start: NaiveDate, recurrence: Recurrence) -> NaiveDate {
        let end = match recurrence {
            Recurrence::None => Some(start),
            Recurrence::Daily => start.checked_add_signed(TimeDelta::days(self.daily_days.into())),
            Recurrence::Weekly => {
                start.checked_add_signed(TimeDelta::weeks(self.weekly_weeks.into()))
            }
            // Clamps to the last day of the target month, like calendar arithmetic does.
            Recurrence::Monthly => start.checked_add_months(Months::new(self.monthly_months)),
        };
        end.unwrap_or(NaiveDate::MAX)
    }
}

/// Dates an event occurs on within its horizon, in ascending order.
fn occurrence_dates(event: &Event, horizon: &RecurrenceHorizon) -> Vec<NaiveDate> {
    let start = event.date;
    let end = horizon.end_for(start, event.recurrence);

    match event.recurrence {
        Recurrence::None => vec![start],
        Recurrence::Daily => start.iter_days().take_while(|d| *d <= end).collect(),
        Recurrence::Weekly => start.iter_weeks().take_while(|d| *d <= end).collect(),
        Recurrence::Monthly => {
            // Months without the anchor day (31st in April, 30th in February)
            // are skipped rather than clamped.
            (0..=horizon.monthly_months)
                .filter_map(|offset| {
                    let first = start.with_day(1)?.checked_add_months(Months::new(offset))?;
                    NaiveDate::from_ymd_opt(first.year(), first.month(), start.day())
                })
                .take_while(|d| *d <= end)
                .collect()
        }
    }
}

/// Expand one event into its concrete instances.
///
/// A non-recurring event yields exactly one instance. Every instance keeps the
/// source's wall-clock start and end times and carries the source id as its
/// group id.
pub fn expand_event(event: &Event, horizon: &RecurrenceHorizon) -> Vec<EventInstance> {
    occurrence_dates(event, horizon)
        .into_iter()
        .map(|date| EventInstance {
            source_event_id: event.id.clone(),
            group_id: event.id.clone(),
            start: date.and_time(event.start_time),
            end: date.and_time(event.end_time),
            title: event.title.clone(),
            description: event.description.clone(),
            category: event.category,
            recurrence: event.recurrence,
            created_by: event.created_by.clone(),
            meeting_url: event.meeting_url.clone(),
        })
        .collect()
}

/// A stored event that could not be expanded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExpansionDiagnostic {
    /// Id of the offending row, when it had a readable one.
    pub event_id: Option<String>,
    pub message: String,
}

/// Instances produced from a batch of rows, plus whatever was skipped.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Expansion {
    pub instances: Vec<EventInstance>,
    pub diagnostics: Vec<ExpansionDiagnostic>,
}

fn row_id(row: &Row) -> Option<String> {
    match row.get("id")? {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Null => None,
        other => Some(other.to_string()),
    }
}

/// Validate and expand raw `events` rows.
///
/// Rows that fail validation are skipped and reported in
/// [`Expansion::diagnostics`]; they never stop the rest of the batch.
pub fn expand_rows(rows: Vec<Row>, horizon: &RecurrenceHorizon) -> Expansion {
    let mut expansion = Expansion::default();

    for row in rows {
        let event_id = row_id(&row);
        match EventRow::from_row(row).and_then(Event::try_from) {
            Ok(event) => expansion.instances.extend(expand_event(&event, horizon)),
            Err(e) => {
                warn!(event_id = event_id.as_deref().unwrap_or("?"), error = %e, "skipping event");
                expansion.diagnostics.push(ExpansionDiagnostic {
                    event_id,
                    message: e.to_string(),
                });
            }
        }
    }

    expansion
}
