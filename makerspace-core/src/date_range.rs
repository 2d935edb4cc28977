//! Date range for filtering calendar instances.

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

use crate::error::{PortalError, PortalResult};
use crate::event::{EventInstance, parse_date};

/// Days shown when no end date is given.
pub const DEFAULT_VIEW_DAYS: i64 = 7;

/// Inclusive range of calendar days.
/// None values mean unbounded in that direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

impl DateRange {
    pub fn unbounded() -> Self {
        DateRange::default()
    }

    /// Parse optional bounds as given; missing bounds stay open.
    /// `from` may be "start" for unbounded.
    pub fn parse(from: Option<&str>, to: Option<&str>) -> PortalResult<Self> {
        let from = match from {
            None | Some("start") => None,
            Some(s) => Some(parse_bound(s)?),
        };
        let to = to.map(parse_bound).transpose()?;
        Self::checked(from, to)
    }

    /// Parse command line bounds.
    /// - `from`: "start" for unbounded, or YYYY-MM-DD, defaults to `today`
    /// - `to`: YYYY-MM-DD, defaults to DEFAULT_VIEW_DAYS after `from`
    pub fn from_args(from: Option<&str>, to: Option<&str>, today: NaiveDate) -> PortalResult<Self> {
        let from_date = match from {
            Some("start") => None,
            Some(s) => Some(parse_bound(s)?),
            None => Some(today),
        };

        let to_date = match to {
            Some(s) => Some(parse_bound(s)?),
            None => {
                let anchor = from_date.unwrap_or(today);
                anchor.checked_add_signed(TimeDelta::days(DEFAULT_VIEW_DAYS))
            }
        };

        Self::checked(from_date, to_date)
    }

    fn checked(from: Option<NaiveDate>, to: Option<NaiveDate>) -> PortalResult<Self> {
        if let (Some(f), Some(t)) = (from, to) {
            if f > t {
                return Err(PortalError::Validation(format!(
                    "Range start {} is after its end {}",
                    f, t
                )));
            }
        }
        Ok(DateRange { from, to })
    }

    fn start(&self) -> Option<NaiveDateTime> {
        self.from.map(|d| d.and_time(chrono::NaiveTime::MIN))
    }

    /// Exclusive upper bound: midnight after `to`.
    fn end(&self) -> Option<NaiveDateTime> {
        self.to
            .and_then(|d| d.succ_opt())
            .map(|d| d.and_time(chrono::NaiveTime::MIN))
    }

    /// Whether any part of the instance falls inside the range.
    pub fn overlaps(&self, instance: &EventInstance) -> bool {
        let after_start = self.start().is_none_or(|s| instance.end > s);
        let before_end = self.end().is_none_or(|e| instance.start < e);
        after_start && before_end
    }
}

fn parse_bound(s: &str) -> PortalResult<NaiveDate> {
    parse_date(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Category, EventId, Recurrence};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, d).expect("valid date")
    }

    fn instance_on(d: u32) -> EventInstance {
        EventInstance {
            source_event_id: EventId::new("1"),
            group_id: EventId::new("1"),
            start: day(d).and_hms_opt(23, 0, 0).expect("valid time"),
            end: day(d).and_hms_opt(23, 59, 0).expect("valid time"),
            title: "Late shift".into(),
            description: None,
            category: Category::Personal,
            recurrence: Recurrence::None,
            created_by: "u1".into(),
            meeting_url: None,
        }
    }

    #[test]
    fn test_from_args_defaults() {
        let range = DateRange::from_args(None, None, day(5)).expect("Should parse");
        assert_eq!(range.from, Some(day(5)));
        assert_eq!(range.to, Some(day(12)));

        let range = DateRange::from_args(Some("start"), Some("2025-03-20"), day(5)).expect("Should parse");
        assert_eq!(range.from, None);
        assert_eq!(range.to, Some(day(20)));
    }

    #[test]
    fn test_rejects_bad_input() {
        assert!(DateRange::from_args(Some("tomorrow"), None, day(5)).is_err());
        assert!(matches!(
            DateRange::parse(Some("2025-03-10"), Some("2025-03-01")),
            Err(PortalError::Validation(_))
        ));
    }

    #[test]
    fn test_overlap_includes_whole_end_day() {
        let range = DateRange::parse(Some("2025-03-05"), Some("2025-03-07")).expect("Should parse");
        assert!(!range.overlaps(&instance_on(4)));
        assert!(range.overlaps(&instance_on(5)));
        assert!(range.overlaps(&instance_on(7)));
        assert!(!range.overlaps(&instance_on(8)));
        assert!(DateRange::unbounded().overlaps(&instance_on(8)));
    }
}
