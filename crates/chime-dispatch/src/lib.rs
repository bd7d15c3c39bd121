//! Notification dispatch for Chime.
//!
//! This crate owns the boundary to the platform:
//! - [`Notifier`] and [`LocationService`] are the trait seams the OS-level
//!   services plug into
//! - [`DispatchAdapter`] turns a filtered queue into registrations, with
//!   all-or-nothing rollback on partial failure
//! - [`Debouncer`] coalesces rapid edits before a re-arm
//! - [`ScheduleRunner`] drives the per-schedule armed/inactive state machine

mod adapter;
mod debounce;
mod error;
mod notifier;
mod runner;
#[cfg(test)]
mod testing;

pub use adapter::{BatchOutcome, DispatchAdapter};
pub use debounce::{DEBOUNCE_DELAY, Debouncer};
pub use error::{DispatchError, NotifierError};
pub use notifier::{
    LocationService, NotificationPayload, Notifier, PendingNotification, Position, RegionEvent,
    RegistrationId,
};
pub use runner::{ScheduleRunner, ScheduleState};
