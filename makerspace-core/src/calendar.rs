//! The shared calendar: loading, filtering and changing events.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::date_range::DateRange;
use crate::error::{PortalError, PortalResult};
use crate::event::{Category, EVENTS_TABLE, Event, EventDraft, EventId, EventInstance, EventRow};
use crate::recurrence::{Expansion, ExpansionDiagnostic, RecurrenceHorizon, expand_rows};
use crate::session::Actor;
use crate::store::{Filter, Row, SharedStore};

const MEETING_HOST: &str = "https://meet.jit.si";

/// What a calendar view renders: every instance plus the rows that were skipped.
pub type CalendarView = Expansion;

/// Typed access to the `events` table.
#[derive(Clone)]
pub struct EventGateway {
    store: SharedStore,
}

impl EventGateway {
    pub fn new(store: SharedStore) -> Self {
        EventGateway { store }
    }

    /// Every stored row, unvalidated.
    pub async fn list_rows(&self) -> PortalResult<Vec<Row>> {
        self.store.select(EVENTS_TABLE, &[]).await
    }

    /// The stored row as-is, so rows that no longer validate can still be
    /// repaired or removed.
    pub async fn get_row(&self, id: &EventId) -> PortalResult<Row> {
        self.store
            .select(EVENTS_TABLE, &[id_filter(id)])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PortalError::NotFound(format!("Event '{}'", id)))
    }

    pub async fn get(&self, id: &EventId) -> PortalResult<Event> {
        EventRow::from_row(self.get_row(id).await?).and_then(Event::try_from)
    }

    pub async fn insert(&self, row: Row) -> PortalResult<Event> {
        let stored = self.store.insert(EVENTS_TABLE, row).await?;
        EventRow::from_row(stored).and_then(Event::try_from)
    }

    pub async fn update(&self, id: &EventId, patch: Row) -> PortalResult<()> {
        match self.store.update(EVENTS_TABLE, &[id_filter(id)], patch).await? {
            0 => Err(PortalError::NotFound(format!("Event '{}'", id))),
            _ => Ok(()),
        }
    }

    pub async fn delete(&self, id: &EventId) -> PortalResult<()> {
        match self.store.delete(EVENTS_TABLE, &[id_filter(id)]).await? {
            0 => Err(PortalError::NotFound(format!("Event '{}'", id))),
            _ => Ok(()),
        }
    }
}

fn id_filter(id: &EventId) -> Filter {
    Filter::eq("id", id.as_str())
}

pub struct Calendar {
    events: EventGateway,
    horizon: RecurrenceHorizon,
}

impl Calendar {
    pub fn new(store: SharedStore, horizon: RecurrenceHorizon) -> Self {
        Calendar {
            events: EventGateway::new(store),
            horizon,
        }
    }

    pub fn events(&self) -> &EventGateway {
        &self.events
    }

    /// Read and expand every event.
    ///
    /// A failed read is reported as a diagnostic on an empty view so a broken
    /// connection renders as an empty calendar with an error, not a crash.
    pub async fn load(&self) -> CalendarView {
        match self.events.list_rows().await {
            Ok(rows) => {
                let view = expand_rows(rows, &self.horizon);
                debug!(
                    instances = view.instances.len(),
                    skipped = view.diagnostics.len(),
                    "calendar loaded"
                );
                view
            }
            Err(e) => {
                warn!(error = %e, "failed to load events");
                CalendarView {
                    instances: Vec::new(),
                    diagnostics: vec![ExpansionDiagnostic {
                        event_id: None,
                        message: e.to_string(),
                    }],
                }
            }
        }
    }

    /// Instances needed for a conflict check. Unlike [`Calendar::load`] a
    /// failed read is an error here.
    async fn instances(&self) -> PortalResult<Vec<EventInstance>> {
        let rows = self.events.list_rows().await?;
        Ok(expand_rows(rows, &self.horizon).instances)
    }

    pub async fn create(&self, actor: &Actor, draft: &EventDraft) -> PortalResult<Event> {
        draft.validate()?;
        check_conflict(&self.instances().await?, actor, draft, None)?;

        let mut row = draft.to_row();
        row.insert("created_by".into(), actor.user_id.clone().into());
        if let Some(url) = meeting_link_for(actor, draft) {
            attach_meeting(&mut row, draft, &url);
        }

        let event = self.events.insert(row).await?;
        info!(event_id = %event.id, user_id = %actor.user_id, "event created");
        Ok(event)
    }

    /// Replace an event's fields with `draft`. Ownership stays with the creator.
    pub async fn update(&self, actor: &Actor, id: &EventId, draft: &EventDraft) -> PortalResult<Event> {
        let existing = self.events.get_row(id).await?;
        ensure_can_modify(id, &existing, actor)?;
        draft.validate()?;
        check_conflict(&self.instances().await?, actor, draft, Some(id))?;

        let mut row = draft.to_row();
        match text_field(&existing, "meeting_url") {
            Some(url) if draft.category == Category::Meeting => attach_meeting(&mut row, draft, url),
            Some(_) => {
                row.insert("meeting_url".into(), serde_json::Value::Null);
            }
            None => {
                if let Some(url) = meeting_link_for(actor, draft) {
                    attach_meeting(&mut row, draft, &url);
                }
            }
        }

        self.events.update(id, row).await?;
        info!(event_id = %id, user_id = %actor.user_id, "event updated");
        self.events.get(id).await
    }

    /// Delete an event and every instance it expands to. Only `created_by`
    /// is read, so malformed rows can be deleted too.
    pub async fn delete(&self, actor: &Actor, id: &EventId) -> PortalResult<()> {
        let existing = self.events.get_row(id).await?;
        ensure_can_modify(id, &existing, actor)?;
        self.events.delete(id).await?;
        info!(event_id = %id, user_id = %actor.user_id, "event deleted");
        Ok(())
    }
}

/// Rows without a creator are admin-only.
fn ensure_can_modify(id: &EventId, row: &Row, actor: &Actor) -> PortalResult<()> {
    if actor.may_modify(text_field(row, "created_by").unwrap_or_default()) {
        Ok(())
    } else {
        Err(PortalError::Forbidden(format!(
            "'{}' may not change event '{}'",
            actor.username, id
        )))
    }
}

fn text_field<'a>(row: &'a Row, key: &str) -> Option<&'a str> {
    row.get(key)
        .and_then(serde_json::Value::as_str)
        .filter(|s| !s.is_empty())
}

/// The draft's slot must not overlap another of the actor's own instances.
/// `ignore` excludes the event being edited.
fn check_conflict(
    instances: &[EventInstance],
    actor: &Actor,
    draft: &EventDraft,
    ignore: Option<&EventId>,
) -> PortalResult<()> {
    let (start, end) = (draft.start(), draft.end());
    let clash = instances.iter().find(|i| {
        i.created_by == actor.user_id
            && ignore != Some(&i.source_event_id)
            && i.overlaps(start, end)
    });

    match clash {
        Some(i) => Err(PortalError::Conflict(format!(
            "Overlaps '{}' ({} - {})",
            i.title,
            i.start.format("%Y-%m-%d %H:%M"),
            i.end.format("%H:%M")
        ))),
        None => Ok(()),
    }
}

/// Admins get a video room for meetings.
fn meeting_link_for(actor: &Actor, draft: &EventDraft) -> Option<String> {
    (actor.is_admin() && draft.category == Category::Meeting).then(generate_meeting_url)
}

fn generate_meeting_url() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}/meet-{}-{}",
        MEETING_HOST,
        &suffix[..6],
        Utc::now().timestamp_millis()
    )
}

fn attach_meeting(row: &mut Row, draft: &EventDraft, url: &str) {
    let description = draft.description.clone().unwrap_or_default();
    let join = format!("Join: {}", url);
    let description = if description.contains(&join) {
        description
    } else {
        format!("{}\n\nJoin: {}", description, url)
    };
    row.insert("description".into(), description.into());
    row.insert("meeting_url".into(), url.into());
}

/// Narrowing applied to a calendar view before display.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Empty means every category.
    pub categories: Vec<Category>,
    pub only_mine: bool,
    /// Case-insensitive title substring.
    pub search: Option<String>,
    pub range: DateRange,
}

impl EventFilter {
    /// Keep matching instances, ordered by start. `only_mine` without a
    /// viewer matches nothing.
    pub fn apply(&self, instances: Vec<EventInstance>, viewer: Option<&Actor>) -> Vec<EventInstance> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let mut kept: Vec<EventInstance> = instances
            .into_iter()
            .filter(|i| self.categories.is_empty() || self.categories.contains(&i.category))
            .filter(|i| !self.only_mine || viewer.is_some_and(|v| v.user_id == i.created_by))
            .filter(|i| {
                needle
                    .as_ref()
                    .is_none_or(|n| i.title.to_lowercase().contains(n))
            })
            .filter(|i| self.range.overlaps(i))
            .collect();

        kept.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.title.cmp(&b.title)));
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Recurrence;
    use crate::session::Role;
    use crate::store::testing::ScriptedStore;
    use crate::store::{MemoryStore, Store};
    use chrono::{NaiveDate, NaiveTime};
    use std::sync::Arc;

    fn member(id: &str) -> Actor {
        Actor::new(id, id, Role::Member)
    }

    fn admin() -> Actor {
        Actor::new("boss", "boss", Role::Admin)
    }

    fn draft(title: &str, day: u32, start: u32, end: u32) -> EventDraft {
        EventDraft {
            title: title.into(),
            description: Some("Agenda in the wiki".into()),
            date: NaiveDate::from_ymd_opt(2025, 3, day).expect("valid date"),
            start_time: NaiveTime::from_hms_opt(start, 0, 0).expect("valid time"),
            end_time: NaiveTime::from_hms_opt(end, 0, 0).expect("valid time"),
            category: Category::Workshop,
            recurrence: Recurrence::None,
            reminder: false,
        }
    }

    fn calendar() -> (Arc<MemoryStore>, Calendar) {
        let store = Arc::new(MemoryStore::new());
        let calendar = Calendar::new(store.clone(), RecurrenceHorizon::default());
        (store, calendar)
    }

    #[tokio::test]
    async fn test_create_records_the_creator_and_expands() {
        let (_, cal) = calendar();
        let mut weekly = draft("Soldering club", 5, 18, 20);
        weekly.recurrence = Recurrence::Weekly;

        let event = cal.create(&member("u1"), &weekly).await.expect("Should create");
        assert_eq!(event.created_by, "u1");
        assert_eq!(event.meeting_url, None);

        let view = cal.load().await;
        assert_eq!(view.instances.len(), 13);
        assert!(view.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_admin_meetings_get_a_join_link() {
        let (_, cal) = calendar();
        let mut meeting = draft("Board meeting", 5, 18, 19);
        meeting.category = Category::Meeting;

        let event = cal.create(&admin(), &meeting).await.expect("Should create");
        let url = event.meeting_url.clone().expect("Should have a link");
        assert!(url.starts_with("https://meet.jit.si/meet-"));
        assert_eq!(
            event.description.as_deref(),
            Some(format!("Agenda in the wiki\n\nJoin: {}", url).as_str())
        );

        // Members don't get one.
        let mut other = draft("Members meeting", 6, 18, 19);
        other.category = Category::Meeting;
        let event = cal.create(&member("u1"), &other).await.expect("Should create");
        assert_eq!(event.meeting_url, None);
    }

    #[tokio::test]
    async fn test_conflicts_only_with_own_events() {
        let (_, cal) = calendar();
        cal.create(&member("u1"), &draft("Laser slot", 5, 9, 11))
            .await
            .expect("Should create");

        let clash = cal.create(&member("u1"), &draft("CNC slot", 5, 10, 12)).await;
        assert!(matches!(clash, Err(PortalError::Conflict(_))));

        // Back to back is fine, and other members may overlap.
        cal.create(&member("u1"), &draft("CNC slot", 5, 11, 12))
            .await
            .expect("Adjacent slot");
        cal.create(&member("u2"), &draft("CNC slot", 5, 10, 12))
            .await
            .expect("Other member");
    }

    #[tokio::test]
    async fn test_conflicts_with_recurring_instances() {
        let (_, cal) = calendar();
        let mut daily = draft("Morning shift", 5, 8, 9);
        daily.recurrence = Recurrence::Daily;
        cal.create(&member("u1"), &daily).await.expect("Should create");

        let clash = cal.create(&member("u1"), &draft("Early call", 20, 8, 10)).await;
        assert!(matches!(clash, Err(PortalError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_update_checks_ownership_and_ignores_itself() {
        let (_, cal) = calendar();
        let event = cal
            .create(&member("u1"), &draft("Laser slot", 5, 9, 11))
            .await
            .expect("Should create");

        let moved = draft("Laser slot", 5, 10, 12);
        assert!(matches!(
            cal.update(&member("u2"), &event.id, &moved).await,
            Err(PortalError::Forbidden(_))
        ));

        let updated = cal.update(&member("u1"), &event.id, &moved).await.expect("Owner may edit");
        assert_eq!(updated.start_time, NaiveTime::from_hms_opt(10, 0, 0).expect("valid time"));

        let renamed = draft("Laser induction", 5, 10, 12);
        let updated = cal.update(&admin(), &event.id, &renamed).await.expect("Admin may edit");
        assert_eq!(updated.title, "Laser induction");
        assert_eq!(updated.created_by, "u1");
    }

    #[tokio::test]
    async fn test_update_keeps_the_existing_meeting_link() {
        let (_, cal) = calendar();
        let mut meeting = draft("Board meeting", 5, 18, 19);
        meeting.category = Category::Meeting;
        let event = cal.create(&admin(), &meeting).await.expect("Should create");

        meeting.description = event.description.clone();
        meeting.end_time = NaiveTime::from_hms_opt(20, 0, 0).expect("valid time");
        let updated = cal.update(&admin(), &event.id, &meeting).await.expect("Should update");

        assert_eq!(updated.meeting_url, event.meeting_url);
        assert_eq!(updated.description, event.description);
    }

    #[tokio::test]
    async fn test_delete_rules() {
        let (store, cal) = calendar();
        let event = cal
            .create(&member("u1"), &draft("Laser slot", 5, 9, 11))
            .await
            .expect("Should create");

        assert!(matches!(
            cal.delete(&member("u2"), &event.id).await,
            Err(PortalError::Forbidden(_))
        ));
        cal.delete(&member("u1"), &event.id).await.expect("Owner may delete");
        assert!(store.select(EVENTS_TABLE, &[]).await.expect("select").is_empty());

        assert!(matches!(
            cal.delete(&admin(), &event.id).await,
            Err(PortalError::NotFound(_))
        ));
    }

    fn malformed_row() -> Row {
        match serde_json::json!({
            "id": "bad",
            "title": "Broken",
            "date": "2025-13-45",
            "start_time": "09:00",
            "end_time": "10:00",
            "category": "Meeting",
            "created_by": "u1"
        }) {
            serde_json::Value::Object(map) => map,
            _ => unreachable!(),
        }
    }

    #[tokio::test]
    async fn test_rows_that_fail_validation_can_still_be_deleted() {
        let (store, cal) = calendar();
        store.insert(EVENTS_TABLE, malformed_row()).await.expect("insert");
        let id = EventId::new("bad");

        assert_eq!(cal.load().await.diagnostics.len(), 1);
        assert!(matches!(
            cal.delete(&member("u2"), &id).await,
            Err(PortalError::Forbidden(_))
        ));
        cal.delete(&member("u1"), &id).await.expect("Owner may delete a broken row");
        assert!(store.select(EVENTS_TABLE, &[]).await.expect("select").is_empty());
    }

    #[tokio::test]
    async fn test_admin_can_repair_a_malformed_row() {
        let (store, cal) = calendar();
        store.insert(EVENTS_TABLE, malformed_row()).await.expect("insert");
        let id = EventId::new("bad");

        let repaired = cal
            .update(&admin(), &id, &draft("Fixed", 5, 9, 10))
            .await
            .expect("Admin may repair");
        assert_eq!(repaired.title, "Fixed");
        assert_eq!(repaired.created_by, "u1");

        let view = cal.load().await;
        assert!(view.diagnostics.is_empty());
        assert_eq!(view.instances.len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_drafts_are_rejected_before_writing() {
        let (store, cal) = calendar();
        let backwards = draft("Backwards", 5, 11, 9);
        assert!(matches!(
            cal.create(&member("u1"), &backwards).await,
            Err(PortalError::Validation(_))
        ));
        assert!(store.select(EVENTS_TABLE, &[]).await.expect("select").is_empty());
    }

    #[tokio::test]
    async fn test_failed_load_is_an_empty_view_with_a_diagnostic() {
        let store = Arc::new(ScriptedStore::default());
        store.set_fail_reads(true);
        let cal = Calendar::new(store, RecurrenceHorizon::default());

        let view = cal.load().await;
        assert!(view.instances.is_empty());
        assert_eq!(view.diagnostics.len(), 1);
        assert_eq!(view.diagnostics[0].event_id, None);

        assert!(matches!(
            cal.create(&member("u1"), &draft("Laser slot", 5, 9, 11)).await,
            Err(PortalError::StoreRead(_))
        ));
    }

    #[tokio::test]
    async fn test_filter_combines_criteria() {
        let (_, cal) = calendar();
        cal.create(&member("u1"), &draft("Laser slot", 5, 9, 10)).await.expect("create");
        cal.create(&member("u2"), &draft("Laser induction", 6, 9, 10)).await.expect("create");
        let mut deadline = draft("Grant report", 7, 9, 10);
        deadline.category = Category::Deadline;
        cal.create(&member("u1"), &deadline).await.expect("create");

        let view = cal.load().await;
        let titles = |filter: &EventFilter, viewer: Option<&Actor>| -> Vec<String> {
            filter
                .apply(view.instances.clone(), viewer)
                .into_iter()
                .map(|i| i.title)
                .collect()
        };

        let search = EventFilter {
            search: Some("LASER".into()),
            ..Default::default()
        };
        assert_eq!(titles(&search, None), vec!["Laser slot", "Laser induction"]);

        let mine = EventFilter {
            only_mine: true,
            ..Default::default()
        };
        assert_eq!(titles(&mine, Some(&member("u1"))), vec!["Laser slot", "Grant report"]);
        assert!(titles(&mine, None).is_empty());

        let deadlines_from_the_6th = EventFilter {
            categories: vec![Category::Deadline],
            range: DateRange::parse(Some("2025-03-06"), None).expect("range"),
            ..Default::default()
        };
        assert_eq!(titles(&deadlines_from_the_6th, None), vec!["Grant report"]);
    }
}
