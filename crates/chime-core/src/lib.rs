//! Shared data model for the Chime reminder engine.
//!
//! This crate defines:
//! - Schedules (recurrence rule + active window + day mask)
//! - Quiet hours and saved places
//! - The ephemeral fire instants produced by expansion
//! - The opaque settings blob (load-with-defaults, never fatal)
//!
//! Everything here is plain data with normalization invariants; the
//! expansion algorithms live in `chime-engine`.

mod error;
mod settings;
mod types;

pub use error::SettingsError;
pub use settings::{DEFAULT_RADIUS_METERS, Settings};
pub use types::{
    DEFAULT_MESSAGE, DayMask, MAX_INTERVAL_MINUTES, MIN_INTERVAL_MINUTES, MINUTES_PER_DAY, PlaceId,
    QuietHours, Recurrence, SavedPlace, Schedule, ScheduleId, ScheduledInstant,
};
