//! Core types for schedules, quiet hours, and fire instants.

use chrono::{NaiveDateTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Minutes in one day; all minute-of-day values live in `[0, 1440)`.
pub const MINUTES_PER_DAY: u32 = 1440;

/// Smallest allowed interval between fires, in minutes.
pub const MIN_INTERVAL_MINUTES: u32 = 5;

/// Largest allowed interval between fires, in minutes.
pub const MAX_INTERVAL_MINUTES: u32 = 180;

/// Body text used when a schedule's message is blank.
pub const DEFAULT_MESSAGE: &str = "Time for your reminder";

/// Stable identifier for a schedule, used as the notification tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScheduleId(pub Uuid);

impl ScheduleId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ScheduleId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ScheduleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ScheduleId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Identifier of a saved place, referenced by location-gated schedules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlaceId(pub String);

impl std::fmt::Display for PlaceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for PlaceId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// A place the user has saved, usable as a geofence anchor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SavedPlace {
    pub id: PlaceId,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// When/how often a schedule fires.
///
/// Daily and weekly differ only in where the day mask comes from at the UI
/// layer; the engine treats both as one-instant-per-enabled-day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Recurrence {
    /// Fire every N minutes inside the active window.
    Interval {
        #[serde(deserialize_with = "de_interval")]
        every_minutes: u32,
    },
    /// Fire once per day at a fixed minute-of-day.
    Daily {
        #[serde(deserialize_with = "de_minute")]
        at_minute: u32,
    },
    /// Fire once per selected weekday at a fixed minute-of-day.
    Weekly {
        #[serde(deserialize_with = "de_minute")]
        at_minute: u32,
    },
    /// Fire once per month on a fixed day-of-month.
    ///
    /// When the month is shorter than `day`, the fire clamps to the last
    /// day of that month.
    Monthly {
        #[serde(deserialize_with = "de_day")]
        day: u32,
        #[serde(deserialize_with = "de_minute")]
        at_minute: u32,
    },
}

/// Seven-day enablement mask, index 0 = Monday through index 6 = Sunday.
///
/// An all-false mask means the schedule never fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct DayMask(pub [bool; 7]);

impl DayMask {
    /// Every day enabled.
    pub const ALL: Self = Self([true; 7]);

    /// No day enabled; such a schedule never fires.
    pub const NONE: Self = Self([false; 7]);

    /// Whether the given weekday is enabled.
    pub fn allows(&self, weekday: Weekday) -> bool {
        self.0[weekday.num_days_from_monday() as usize]
    }

    /// Whether no day is enabled at all.
    pub fn is_empty(&self) -> bool {
        !self.0.iter().any(|&d| d)
    }

    /// Convert from a platform's Sunday-first mask (index 0 = Sunday).
    pub fn from_sunday_first(native: [bool; 7]) -> Self {
        let mut mask = [false; 7];
        for (native_index, &enabled) in native.iter().enumerate() {
            let index = if native_index == 0 { 6 } else { native_index - 1 };
            mask[index] = enabled;
        }
        Self(mask)
    }
}

impl Default for DayMask {
    fn default() -> Self {
        Self::ALL
    }
}

// Tolerates masks of the wrong length from the settings blob: short masks
// pad with false, long masks truncate. Length is always exactly 7 after this.
impl<'de> Deserialize<'de> for DayMask {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Vec::<bool>::deserialize(deserializer)?;
        let mut mask = [false; 7];
        for (i, slot) in mask.iter_mut().enumerate() {
            *slot = raw.get(i).copied().unwrap_or(false);
        }
        Ok(Self(mask))
    }
}

/// A user-defined recurring reminder rule.
///
/// The engine treats a schedule as an immutable input per computation; the
/// UI layer owns creation, edits, and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Stable identifier; doubles as the notification tag.
    #[serde(default)]
    pub id: ScheduleId,
    /// When/how often to fire.
    pub recurrence: Recurrence,
    /// Window start, minutes since midnight.
    #[serde(default, deserialize_with = "de_minute")]
    pub window_start: u32,
    /// Window end, minutes since midnight. Equal to `window_start` means
    /// all day; less than it means the window crosses midnight.
    #[serde(default, deserialize_with = "de_minute")]
    pub window_end: u32,
    /// Which weekdays the schedule may fire on (Monday-first).
    #[serde(default)]
    pub days: DayMask,
    /// Notification body; blank falls back to [`DEFAULT_MESSAGE`].
    #[serde(default)]
    pub message: String,
    /// Whether the schedule participates in queue building.
    #[serde(default = "default_true")]
    pub is_active: bool,
    /// When set, the schedule only arms while the device is within the
    /// configured radius of this place.
    #[serde(default)]
    pub location: Option<PlaceId>,
}

fn default_true() -> bool {
    true
}

impl Schedule {
    /// Create an interval schedule firing every `every_minutes` inside the
    /// `[window_start, window_end)` window, all days enabled.
    pub fn interval(every_minutes: u32, window_start: u32, window_end: u32) -> Self {
        Self {
            id: ScheduleId::new(),
            recurrence: Recurrence::Interval { every_minutes },
            window_start,
            window_end,
            days: DayMask::ALL,
            message: String::new(),
            is_active: true,
            location: None,
        }
        .normalized()
    }

    /// Create a daily schedule firing at `at_minute` every day.
    pub fn daily(at_minute: u32) -> Self {
        Self {
            id: ScheduleId::new(),
            recurrence: Recurrence::Daily { at_minute },
            window_start: 0,
            window_end: 0,
            days: DayMask::ALL,
            message: String::new(),
            is_active: true,
            location: None,
        }
        .normalized()
    }

    /// Create a weekly schedule firing at `at_minute` on the masked days.
    pub fn weekly(at_minute: u32, days: DayMask) -> Self {
        Self {
            days,
            ..Self::daily(at_minute)
        }
        .with_recurrence(Recurrence::Weekly { at_minute })
        .normalized()
    }

    /// Create a monthly schedule firing on `day` at `at_minute`.
    pub fn monthly(day: u32, at_minute: u32) -> Self {
        Self::daily(at_minute)
            .with_recurrence(Recurrence::Monthly { day, at_minute })
            .normalized()
    }

    fn with_recurrence(mut self, recurrence: Recurrence) -> Self {
        self.recurrence = recurrence;
        self
    }

    /// Return a copy with every numeric field clamped into its valid range.
    ///
    /// Intervals clamp into `[5, 180]`, minute-of-day values wrap modulo
    /// 1440, day-of-month clamps into `[1, 31]`. Invalid input is never an
    /// error; it is coerced before any computation runs.
    pub fn normalized(mut self) -> Self {
        self.recurrence = match self.recurrence {
            Recurrence::Interval { every_minutes } => Recurrence::Interval {
                every_minutes: every_minutes.clamp(MIN_INTERVAL_MINUTES, MAX_INTERVAL_MINUTES),
            },
            Recurrence::Daily { at_minute } => Recurrence::Daily {
                at_minute: at_minute % MINUTES_PER_DAY,
            },
            Recurrence::Weekly { at_minute } => Recurrence::Weekly {
                at_minute: at_minute % MINUTES_PER_DAY,
            },
            Recurrence::Monthly { day, at_minute } => Recurrence::Monthly {
                day: day.clamp(1, 31),
                at_minute: at_minute % MINUTES_PER_DAY,
            },
        };
        self.window_start %= MINUTES_PER_DAY;
        self.window_end %= MINUTES_PER_DAY;
        self
    }

    /// Whether the active window covers the whole day.
    pub fn is_all_day(&self) -> bool {
        self.window_start == self.window_end
    }

    /// Whether the active window crosses midnight.
    pub fn crosses_midnight(&self) -> bool {
        self.window_end < self.window_start
    }

    /// The notification body, falling back to the default when blank.
    pub fn message_or_default(&self) -> &str {
        let trimmed = self.message.trim();
        if trimmed.is_empty() {
            DEFAULT_MESSAGE
        } else {
            trimmed
        }
    }
}

/// A single global mute window.
///
/// Same minute-of-day semantics as a schedule window, but it describes an
/// *excluded* span: instants inside it are dropped, not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuietHours {
    #[serde(default)]
    pub enabled: bool,
    /// Mute start, minutes since midnight.
    #[serde(default, deserialize_with = "de_minute")]
    pub start: u32,
    /// Mute end, minutes since midnight. Equal to `start` means zero-width
    /// (the filter is a no-op); less than it means the mute span crosses
    /// midnight.
    #[serde(default, deserialize_with = "de_minute")]
    pub end: u32,
}

impl QuietHours {
    /// An enabled mute window over `[start, end)`.
    pub fn between(start: u32, end: u32) -> Self {
        Self {
            enabled: true,
            start: start % MINUTES_PER_DAY,
            end: end % MINUTES_PER_DAY,
        }
    }
}

/// A concrete future fire time produced by expansion.
///
/// Ephemeral: never persisted, regenerated on every reschedule pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduledInstant {
    pub schedule_id: ScheduleId,
    pub fire_at: NaiveDateTime,
    pub message: String,
}

// Numeric coercion for the settings blob: out-of-range and non-finite
// values become safe defaults instead of deserialization errors.

fn de_interval<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_interval(f64::deserialize(deserializer)?))
}

fn de_minute<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_minute(f64::deserialize(deserializer)?))
}

fn de_day<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(coerce_day(f64::deserialize(deserializer)?))
}

fn coerce_interval(raw: f64) -> u32 {
    if !raw.is_finite() {
        return MIN_INTERVAL_MINUTES;
    }
    (raw.trunc() as i64).clamp(MIN_INTERVAL_MINUTES as i64, MAX_INTERVAL_MINUTES as i64) as u32
}

fn coerce_minute(raw: f64) -> u32 {
    if !raw.is_finite() {
        return 0;
    }
    (raw.trunc() as i64).rem_euclid(MINUTES_PER_DAY as i64) as u32
}

fn coerce_day(raw: f64) -> u32 {
    if !raw.is_finite() {
        return 1;
    }
    (raw.trunc() as i64).clamp(1, 31) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn normalized_clamps_interval() {
        let fast = Schedule::interval(1, 540, 1260);
        assert_eq!(
            fast.recurrence,
            Recurrence::Interval { every_minutes: 5 }
        );

        let slow = Schedule::interval(600, 540, 1260);
        assert_eq!(
            slow.recurrence,
            Recurrence::Interval { every_minutes: 180 }
        );
    }

    #[test]
    fn normalized_wraps_window_minutes() {
        let schedule = Schedule {
            window_start: 1500,
            window_end: 2880,
            ..Schedule::interval(30, 0, 0)
        }
        .normalized();
        assert_eq!(schedule.window_start, 60);
        assert_eq!(schedule.window_end, 0);
    }

    #[test]
    fn normalized_clamps_day_of_month() {
        let schedule = Schedule::monthly(99, 540);
        assert_eq!(
            schedule.recurrence,
            Recurrence::Monthly { day: 31, at_minute: 540 }
        );

        let schedule = Schedule::monthly(0, 540);
        assert_eq!(
            schedule.recurrence,
            Recurrence::Monthly { day: 1, at_minute: 540 }
        );
    }

    #[test]
    fn window_shape_predicates() {
        let all_day = Schedule::interval(30, 600, 600);
        assert!(all_day.is_all_day());
        assert!(!all_day.crosses_midnight());

        let overnight = Schedule::interval(30, 1260, 360);
        assert!(!overnight.is_all_day());
        assert!(overnight.crosses_midnight());
    }

    #[test]
    fn blank_message_falls_back_to_default() {
        let mut schedule = Schedule::daily(540);
        assert_eq!(schedule.message_or_default(), DEFAULT_MESSAGE);

        schedule.message = "   ".to_string();
        assert_eq!(schedule.message_or_default(), DEFAULT_MESSAGE);

        schedule.message = "Drink water".to_string();
        assert_eq!(schedule.message_or_default(), "Drink water");
    }

    #[test]
    fn day_mask_is_monday_first() {
        let weekdays_only = DayMask([true, true, true, true, true, false, false]);
        assert!(weekdays_only.allows(Weekday::Mon));
        assert!(weekdays_only.allows(Weekday::Fri));
        assert!(!weekdays_only.allows(Weekday::Sat));
        assert!(!weekdays_only.allows(Weekday::Sun));
    }

    #[test]
    fn day_mask_from_sunday_first_rotates() {
        // Native: Sunday and Monday enabled (indices 0 and 1).
        let mask = DayMask::from_sunday_first([true, true, false, false, false, false, false]);
        assert!(mask.allows(Weekday::Sun));
        assert!(mask.allows(Weekday::Mon));
        assert!(!mask.allows(Weekday::Tue));
    }

    #[test]
    fn day_mask_deserialize_tolerates_wrong_length() {
        let short: DayMask = serde_json::from_str("[true, true]").unwrap();
        assert_eq!(short, DayMask([true, true, false, false, false, false, false]));

        let long: DayMask =
            serde_json::from_str("[true, true, true, true, true, true, true, true, true]").unwrap();
        assert_eq!(long, DayMask::ALL);
    }

    #[test]
    fn recurrence_serde_roundtrip() {
        let recurrence = Recurrence::Monthly { day: 15, at_minute: 480 };
        let json = serde_json::to_string(&recurrence).unwrap();
        assert!(json.contains("\"type\":\"monthly\""));
        let decoded: Recurrence = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, recurrence);
    }

    #[test]
    fn deserialize_coerces_out_of_range_numbers() {
        let json = r#"{
            "recurrence": { "type": "interval", "every_minutes": -30 },
            "window_start": -60,
            "window_end": 2000.5
        }"#;
        let schedule: Schedule = serde_json::from_str(json).unwrap();
        assert_eq!(
            schedule.recurrence,
            Recurrence::Interval { every_minutes: 5 }
        );
        assert_eq!(schedule.window_start, 1380);
        assert_eq!(schedule.window_end, 560);
        assert!(schedule.is_active);
    }

    #[test]
    fn coercion_handles_non_finite_input() {
        assert_eq!(coerce_interval(f64::NAN), MIN_INTERVAL_MINUTES);
        assert_eq!(coerce_interval(f64::INFINITY), MIN_INTERVAL_MINUTES);
        assert_eq!(coerce_minute(f64::NEG_INFINITY), 0);
        assert_eq!(coerce_day(f64::NAN), 1);
    }

    #[test]
    fn quiet_hours_default_is_disabled() {
        let qh = QuietHours::default();
        assert!(!qh.enabled);
        assert_eq!(qh.start, qh.end);
    }

    #[test]
    fn schedule_id_roundtrips_through_display() {
        let id = ScheduleId::new();
        let parsed: ScheduleId = id.to_string().parse().unwrap();
        assert_eq!(parsed, id);
    }
}
