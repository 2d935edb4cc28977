//! Core library for the makerspace member portal.
//!
//! Shared by the `makerspace` CLI and `makerspace-server`:
//! - `event` and `recurrence` for event definitions and their expansion into instances
//! - `calendar` for loading, filtering and changing events
//! - `presence`, `heartbeat` and `watcher` for live "who's online" tracking
//! - `store` for the hosted database the portal runs against

pub mod calendar;
pub mod config;
pub mod date_range;
pub mod error;
pub mod event;
pub mod heartbeat;
pub mod presence;
pub mod recurrence;
pub mod session;
pub mod store;
pub mod watcher;

pub use calendar::{Calendar, CalendarView, EventFilter, EventGateway};
pub use config::PortalConfig;
pub use date_range::DateRange;
pub use error::{PortalError, PortalResult};
pub use event::{Category, Event, EventDraft, EventId, EventInstance, Recurrence};
pub use presence::{PresenceGateway, PresenceRecord, online_users};
pub use recurrence::{Expansion, ExpansionDiagnostic, RecurrenceHorizon, expand_event, expand_rows};
pub use session::{Actor, Role};
pub use store::{SharedStore, Store};
