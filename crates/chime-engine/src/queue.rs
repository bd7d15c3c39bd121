//! Merge every active schedule into one time-ordered, capped queue.

use chrono::{Duration, NaiveDateTime};
use tracing::debug;

use chime_core::{Recurrence, Schedule, ScheduledInstant};

use crate::expand;

/// Default cap on the combined queue size.
pub const DEFAULT_MAX_QUEUE: usize = 64;

/// Horizon for interval/daily/weekly schedules, in days.
pub const SHORT_HORIZON_DAYS: i64 = 7;

/// Horizon for monthly schedules, in days. A monthly cadence inside a
/// one-week horizon would usually produce nothing at all.
pub const MONTHLY_HORIZON_DAYS: i64 = 90;

/// The expansion horizon appropriate for a recurrence rule.
pub fn horizon_for(recurrence: &Recurrence) -> Duration {
    match recurrence {
        Recurrence::Monthly { .. } => Duration::days(MONTHLY_HORIZON_DAYS),
        _ => Duration::days(SHORT_HORIZON_DAYS),
    }
}

/// Expand every active schedule, tag each instant with its owner, merge
/// into one list sorted by fire time, and truncate to `max_count`.
///
/// The sort is stable, so instants firing at the same moment keep the
/// input order of their schedules.
pub fn build_queue(
    now: NaiveDateTime,
    schedules: &[Schedule],
    max_count: usize,
) -> Vec<ScheduledInstant> {
    let mut queue = Vec::new();
    for schedule in schedules.iter().filter(|s| s.is_active) {
        let horizon = horizon_for(&schedule.recurrence);
        let message = schedule.message_or_default().to_string();
        for fire_at in expand(schedule, now, horizon, max_count) {
            queue.push(ScheduledInstant {
                schedule_id: schedule.id,
                fire_at,
                message: message.clone(),
            });
        }
    }

    queue.sort_by_key(|instant| instant.fire_at);
    if queue.len() > max_count {
        debug!(total = queue.len(), cap = max_count, "queue cap reached, truncating");
        queue.truncate(max_count);
    }
    queue
}
