//! Recurrence expansion for a single schedule.

use chrono::{Datelike, Duration, Months, NaiveDate, NaiveDateTime, NaiveTime, Timelike};
use tracing::warn;

use chime_core::{MINUTES_PER_DAY, Recurrence, Schedule};

/// Minute-of-day for a timestamp, in `[0, 1440)`.
pub fn minute_of_day(t: NaiveDateTime) -> u32 {
    t.hour() * 60 + t.minute()
}

/// Wall-clock time for a normalized minute-of-day.
fn time_of(minute: u32) -> NaiveTime {
    NaiveTime::from_num_seconds_from_midnight_opt(minute * 60, 0).unwrap_or(NaiveTime::MIN)
}

/// Whether a minute-of-day falls inside an *included* span `[start, end)`.
///
/// Equal bounds mean all day; `end < start` means the span crosses midnight.
fn in_window(minute: u32, start: u32, end: u32) -> bool {
    if start == end {
        true
    } else if start < end {
        start <= minute && minute < end
    } else {
        minute >= start || minute < end
    }
}

/// Expand one schedule into its future fire instants.
///
/// The result is strictly increasing, every instant lies in
/// `(now, now + horizon]`, its weekday is enabled in the schedule's mask,
/// and at most `max_count` instants are returned. The schedule is
/// normalized before use, so out-of-range input cannot fail.
pub fn expand(
    schedule: &Schedule,
    now: NaiveDateTime,
    horizon: Duration,
    max_count: usize,
) -> Vec<NaiveDateTime> {
    let s = schedule.clone().normalized();
    if max_count == 0 || horizon <= Duration::zero() || s.days.is_empty() {
        return Vec::new();
    }
    let until = now + horizon;

    match s.recurrence {
        Recurrence::Interval { every_minutes } => {
            let primary = if s.is_all_day() {
                walk_all_day(&s, every_minutes, now, until, max_count)
            } else {
                walk_window(&s, every_minutes, now, until, max_count)
            };
            if !primary.is_empty() {
                return primary;
            }
            // A window/day combination the primary walk cannot reconcile
            // still gets a best-effort fixed-interval walk. Worth noticing
            // in logs, but not worth failing over.
            let fallback = walk_fallback(&s, every_minutes, now, until, max_count);
            if !fallback.is_empty() {
                warn!(
                    schedule_id = %s.id,
                    window_start = s.window_start,
                    window_end = s.window_end,
                    "window walk produced nothing, using fallback interval walk"
                );
            }
            fallback
        }
        Recurrence::Daily { at_minute } | Recurrence::Weekly { at_minute } => {
            walk_at_minute(&s, at_minute, now, until, max_count)
        }
        Recurrence::Monthly { day, at_minute } => {
            walk_monthly(&s, day, at_minute, now, until, max_count)
        }
    }
}

/// All-day interval walk: ticks are minute-of-day multiples of the
/// interval, anchored to midnight.
fn walk_all_day(
    s: &Schedule,
    every: u32,
    now: NaiveDateTime,
    until: NaiveDateTime,
    max_count: usize,
) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    let mut date = now.date();
    while date <= until.date() {
        let mut minute = 0;
        while minute < MINUTES_PER_DAY {
            let t = date.and_time(time_of(minute));
            if t > until {
                return out;
            }
            if t > now && s.days.allows(date.weekday()) {
                out.push(t);
                if out.len() == max_count {
                    return out;
                }
            }
            minute += every;
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    out
}

/// Bounded-window interval walk. Each day's window is laid out as absolute
/// timestamps; a midnight-crossing window for day D spans from D's start
/// time to D+1's end time, so ticks in the early morning carry D+1's
/// weekday for the mask check.
fn walk_window(
    s: &Schedule,
    every: u32,
    now: NaiveDateTime,
    until: NaiveDateTime,
    max_count: usize,
) -> Vec<NaiveDateTime> {
    let mut out = Vec::new();
    // Start one day back: an overnight window begun yesterday can still
    // hold instants after `now`.
    let mut date = now.date().pred_opt().unwrap_or(now.date());
    while date <= until.date() {
        let window_start = date.and_time(time_of(s.window_start));
        let window_end = if s.crosses_midnight() {
            match date.succ_opt() {
                Some(next) => next.and_time(time_of(s.window_end)),
                None => break,
            }
        } else {
            date.and_time(time_of(s.window_end))
        };

        let mut t = window_start;
        while t < window_end {
            if t > until {
                break;
            }
            if t > now && s.days.allows(t.weekday()) {
                out.push(t);
                if out.len() == max_count {
                    return out;
                }
            }
            t += Duration::minutes(every as i64);
        }

        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    out
}

/// Fallback walk: step from `now + interval` by the interval, keeping
/// instants that land inside the window on an enabled day.
fn walk_fallback(
    s: &Schedule,
    every: u32,
    now: NaiveDateTime,
    until: NaiveDateTime,
    max_count: usize,
) -> Vec<NaiveDateTime> {
    let step = Duration::minutes(every as i64);
    let mut out = Vec::new();
    let mut t = now + step;
    while t <= until {
        if in_window(minute_of_day(t), s.window_start, s.window_end) && s.days.allows(t.weekday()) {
            out.push(t);
            if out.len() == max_count {
                break;
            }
        }
        t += step;
    }
    out
}

/// Daily/weekly walk: one instant per enabled day at a fixed minute.
fn walk_at_minute(
    s: &Schedule,
    at_minute: u32,
    now: NaiveDateTime,
    until: NaiveDateTime,
    max_count: usize,
) -> Vec<NaiveDateTime> {
    let fire_time = time_of(at_minute);
    let mut out = Vec::new();
    let mut date = now.date();
    while date <= until.date() {
        let t = date.and_time(fire_time);
        if t > until {
            break;
        }
        if t > now && s.days.allows(date.weekday()) {
            out.push(t);
            if out.len() == max_count {
                break;
            }
        }
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }
    out
}

/// Monthly walk: one instant per month on the configured day-of-month,
/// clamped to the last day of months that are shorter.
fn walk_monthly(
    s: &Schedule,
    day: u32,
    at_minute: u32,
    now: NaiveDateTime,
    until: NaiveDateTime,
    max_count: usize,
) -> Vec<NaiveDateTime> {
    let fire_time = time_of(at_minute);
    let mut out = Vec::new();
    let Some(mut cursor) = NaiveDate::from_ymd_opt(now.year(), now.month(), 1) else {
        return out;
    };
    loop {
        let clamped = day.min(days_in_month(cursor));
        let Some(date) = cursor.with_day(clamped) else {
            break;
        };
        let t = date.and_time(fire_time);
        if t > until {
            break;
        }
        if t > now && s.days.allows(date.weekday()) {
            out.push(t);
            if out.len() == max_count {
                break;
            }
        }
        match cursor.checked_add_months(Months::new(1)) {
            Some(next) => cursor = next,
            None => break,
        }
    }
    out
}

/// Number of days in the month containing `first_of_month`.
fn days_in_month(first_of_month: NaiveDate) -> u32 {
    first_of_month
        .checked_add_months(Months::new(1))
        .and_then(|next| next.pred_opt())
        .map(|last| last.day())
        .unwrap_or(28)
}
