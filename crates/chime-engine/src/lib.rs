//! Pure scheduling algorithms for Chime.
//!
//! This crate turns schedules into concrete fire instants:
//! - [`expand`] walks one schedule's recurrence rule over a horizon
//! - [`build_queue`] merges every active schedule into one capped queue
//! - [`apply_quiet_hours`] drops instants inside the global mute window
//!
//! Everything here is synchronous and clock-free: `now` is always an
//! explicit parameter, so the same inputs always produce the same output.

mod expand;
mod queue;
mod quiet;

pub use expand::{expand, minute_of_day};
pub use queue::{DEFAULT_MAX_QUEUE, MONTHLY_HORIZON_DAYS, SHORT_HORIZON_DAYS, build_queue, horizon_for};
pub use quiet::{apply_quiet_hours, is_muted};
