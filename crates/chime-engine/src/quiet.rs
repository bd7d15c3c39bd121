//! Quiet-hours filtering.
//!
//! Quiet hours describe an *excluded* span, so the comparison logic is the
//! inverse of a schedule window's included span: the start minute is muted
//! and the end minute is the first minute delivered again.

use chime_core::{QuietHours, ScheduledInstant};

use crate::minute_of_day;

/// Whether a minute-of-day falls inside the mute window.
///
/// Disabled or zero-width quiet hours mute nothing.
pub fn is_muted(minute: u32, quiet: &QuietHours) -> bool {
    if !quiet.enabled || quiet.start == quiet.end {
        return false;
    }
    if quiet.start < quiet.end {
        quiet.start <= minute && minute < quiet.end
    } else {
        minute >= quiet.start || minute < quiet.end
    }
}

/// Drop every instant whose time-of-day falls inside the mute window.
pub fn apply_quiet_hours(queue: Vec<ScheduledInstant>, quiet: &QuietHours) -> Vec<ScheduledInstant> {
    if !quiet.enabled || quiet.start == quiet.end {
        return queue;
    }
    queue
        .into_iter()
        .filter(|instant| !is_muted(minute_of_day(instant.fire_at), quiet))
        .collect()
}
