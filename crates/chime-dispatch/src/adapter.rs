//! The dispatch adapter: expansion pipeline to registered notifications.

use std::sync::Arc;

use chrono::NaiveDateTime;
use tracing::{debug, info, warn};

use chime_core::{Schedule, ScheduleId, Settings};
use chime_engine::{DEFAULT_MAX_QUEUE, apply_quiet_hours, build_queue};

use crate::{
    DispatchError, LocationService, NotificationPayload, Notifier, RegistrationId,
};

/// Title used for every notification payload.
const NOTIFICATION_TITLE: &str = "Chime";

/// Result of arming a batch of schedules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOutcome {
    /// Every surviving instant was registered.
    Armed { registered: usize },
    /// The pipeline ran but nothing was eligible to register: every instant
    /// fell inside quiet hours, or every schedule was gated out. Distinct
    /// from an error so the caller can explain why.
    NothingToSchedule,
}

/// Turns filtered queues into notifier registrations.
///
/// Registration is all-or-nothing per batch: if any call fails partway,
/// everything registered so far in the batch is cancelled (best effort)
/// and the error is surfaced, so no schedule is ever left half-armed.
pub struct DispatchAdapter<N> {
    notifier: Arc<N>,
    location: Option<Arc<dyn LocationService>>,
    max_queue: usize,
}

impl<N: Notifier> DispatchAdapter<N> {
    /// Create an adapter over a notifier backend.
    pub fn new(notifier: Arc<N>) -> Self {
        Self {
            notifier,
            location: None,
            max_queue: DEFAULT_MAX_QUEUE,
        }
    }

    /// Attach a location service for location-gated schedules. Without one,
    /// gated schedules are always skipped.
    pub fn with_location(mut self, location: Arc<dyn LocationService>) -> Self {
        self.location = Some(location);
        self
    }

    /// Override the combined queue cap.
    pub fn with_max_queue(mut self, max_queue: usize) -> Self {
        self.max_queue = max_queue;
        self
    }

    /// Run the full pipeline for every active schedule in the settings:
    /// cancel stale registrations, expand, merge, filter, register.
    ///
    /// `now` is explicit so re-arm passes are deterministic and testable.
    pub async fn register_batch(
        &self,
        settings: &Settings,
        now: NaiveDateTime,
    ) -> Result<BatchOutcome, DispatchError> {
        let active: Vec<&Schedule> = settings.schedules.iter().filter(|s| s.is_active).collect();

        // Idempotent re-arm: clear whatever any schedule in the settings had
        // registered before, active or not. A schedule deactivated since the
        // last pass loses its stale registrations here.
        let batch_tags: Vec<String> = settings
            .schedules
            .iter()
            .map(|s| s.id.to_string())
            .collect();
        let cleared = self.cancel_by_tags(&batch_tags).await?;
        if cleared > 0 {
            debug!(cleared, "cancelled stale registrations before re-arm");
        }

        let mut eligible = Vec::new();
        for schedule in active {
            if self.is_eligible(schedule, settings).await {
                eligible.push(schedule.clone());
            }
        }

        let queue = build_queue(now, &eligible, self.max_queue);
        let queue = apply_quiet_hours(queue, &settings.quiet_hours);
        if queue.is_empty() {
            info!("no eligible instants to register");
            return Ok(BatchOutcome::NothingToSchedule);
        }

        // Sequential registration so a failure cleanly splits the batch:
        // everything before it succeeded, nothing after it was attempted.
        let mut registered: Vec<RegistrationId> = Vec::with_capacity(queue.len());
        for instant in &queue {
            let payload = NotificationPayload {
                title: NOTIFICATION_TITLE.to_string(),
                body: instant.message.clone(),
                tag: instant.schedule_id.to_string(),
            };
            match self.notifier.schedule_at(instant.fire_at, payload).await {
                Ok(id) => registered.push(id),
                Err(e) => {
                    warn!(
                        registered = registered.len(),
                        remaining = queue.len() - registered.len(),
                        error = %e,
                        "registration failed partway, rolling back batch"
                    );
                    self.rollback(&registered).await;
                    return Err(e.into());
                }
            }
        }

        info!(registered = registered.len(), "batch armed");
        Ok(BatchOutcome::Armed {
            registered: registered.len(),
        })
    }

    /// Cancel every pending registration tagged with the given schedule.
    /// Returns how many were cancelled.
    pub async fn cancel_for_schedule(&self, id: &ScheduleId) -> Result<usize, DispatchError> {
        let count = self.cancel_by_tags(&[id.to_string()]).await?;
        if count > 0 {
            info!(schedule_id = %id, cancelled = count, "cancelled registrations");
        }
        Ok(count)
    }

    async fn cancel_by_tags(&self, tags: &[String]) -> Result<usize, DispatchError> {
        let pending = self.notifier.list_pending().await?;
        let mut cancelled = 0;
        for entry in pending {
            if tags.iter().any(|tag| *tag == entry.tag) {
                self.notifier.cancel(&entry.id).await?;
                cancelled += 1;
            }
        }
        Ok(cancelled)
    }

    /// Whether a schedule may arm right now. Schedules without a location
    /// gate always may; gated schedules need a verifiable in-radius fix,
    /// and anything unverifiable is a skip, not an error.
    async fn is_eligible(&self, schedule: &Schedule, settings: &Settings) -> bool {
        let Some(place_id) = &schedule.location else {
            return true;
        };
        let Some(location) = &self.location else {
            info!(schedule_id = %schedule.id, "no location service, skipping gated schedule");
            return false;
        };
        let Some(place) = settings.place(place_id) else {
            warn!(schedule_id = %schedule.id, place = %place_id, "saved place not found, skipping");
            return false;
        };
        let Some(position) = location.current_position().await else {
            info!(schedule_id = %schedule.id, "position unavailable, skipping gated schedule");
            return false;
        };
        let inside = location
            .is_within_radius(position, place, settings.radius_meters)
            .await;
        if !inside {
            info!(schedule_id = %schedule.id, place = %place_id, "outside radius, skipping");
        }
        inside
    }

    /// Best-effort cleanup of a partially registered batch. Cancel
    /// failures are swallowed; the original registration error is what the
    /// caller sees.
    async fn rollback(&self, registered: &[RegistrationId]) {
        for id in registered {
            if let Err(e) = self.notifier.cancel(id).await {
                warn!(registration_id = %id, error = %e, "rollback cancel failed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NotifierError;
    use crate::testing::{MockLocation, MockNotifier};
    use chime_core::{QuietHours, SavedPlace, Schedule};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn dt(h: u32, mi: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, 6)
            .unwrap()
            .and_hms_opt(h, mi, 0)
            .unwrap()
    }

    fn settings_with(schedules: Vec<Schedule>) -> Settings {
        Settings {
            schedules,
            ..Settings::default()
        }
    }

    #[tokio::test]
    async fn registers_every_surviving_instant() {
        let notifier = Arc::new(MockNotifier::default());
        let adapter = DispatchAdapter::new(Arc::clone(&notifier)).with_max_queue(8);
        let settings = settings_with(vec![Schedule::daily(540)]);

        let outcome = adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert_eq!(outcome, BatchOutcome::Armed { registered: 7 });
        assert_eq!(notifier.pending_count().await, 7);
    }

    #[tokio::test]
    async fn rearm_is_idempotent() {
        let notifier = Arc::new(MockNotifier::default());
        let adapter = DispatchAdapter::new(Arc::clone(&notifier)).with_max_queue(8);
        let settings = settings_with(vec![Schedule::daily(540)]);

        adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        let first = notifier.pending().await;
        adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        let second = notifier.pending().await;

        assert_eq!(first.len(), second.len());
        let tags = |entries: &[crate::PendingNotification]| {
            entries
                .iter()
                .map(|p| (p.tag.clone(), p.fire_at))
                .collect::<Vec<_>>()
        };
        assert_eq!(tags(&first), tags(&second));
    }

    #[tokio::test]
    async fn rearm_clears_registrations_of_deactivated_schedules() {
        let notifier = Arc::new(MockNotifier::default());
        let adapter = DispatchAdapter::new(Arc::clone(&notifier)).with_max_queue(8);
        let mut settings = settings_with(vec![Schedule::daily(540)]);

        adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert_eq!(notifier.pending_count().await, 7);

        // Deactivate and re-arm: the stale registrations must not survive.
        settings.schedules[0].is_active = false;
        let outcome = adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert_eq!(outcome, BatchOutcome::NothingToSchedule);
        assert_eq!(notifier.pending_count().await, 0);
    }

    // A mid-batch failure rolls everything back and stops.
    #[tokio::test]
    async fn partial_failure_rolls_back_whole_batch() {
        let notifier = Arc::new(MockNotifier::default());
        notifier.fail_after(4).await;
        let adapter = DispatchAdapter::new(Arc::clone(&notifier)).with_max_queue(32);
        let settings = settings_with(vec![
            Schedule::daily(540),
            Schedule::daily(600),
            Schedule::daily(660),
        ]);

        let result = adapter.register_batch(&settings, dt(0, 0)).await;
        assert!(matches!(result, Err(DispatchError::Notifier(_))));
        assert_eq!(notifier.pending_count().await, 0);
        // The 5th call failed; nothing after it was attempted.
        assert_eq!(notifier.schedule_calls().await, 5);
    }

    #[tokio::test]
    async fn everything_muted_reports_nothing_to_schedule() {
        let notifier = Arc::new(MockNotifier::default());
        let adapter = DispatchAdapter::new(Arc::clone(&notifier));
        let mut settings = settings_with(vec![Schedule::daily(540)]);
        // Mute the entire waking day around 09:00.
        settings.quiet_hours = QuietHours::between(480, 600);

        let outcome = adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert_eq!(outcome, BatchOutcome::NothingToSchedule);
        assert_eq!(notifier.pending_count().await, 0);
    }

    #[tokio::test]
    async fn cancel_for_schedule_only_touches_its_tag() {
        let notifier = Arc::new(MockNotifier::default());
        let adapter = DispatchAdapter::new(Arc::clone(&notifier)).with_max_queue(16);
        let keep = Schedule::daily(540);
        let drop_me = Schedule::daily(600);
        let drop_id = drop_me.id;
        let settings = settings_with(vec![keep.clone(), drop_me]);

        adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        let before = notifier.pending_count().await;

        let cancelled = adapter.cancel_for_schedule(&drop_id).await.unwrap();
        assert!(cancelled > 0);
        assert_eq!(notifier.pending_count().await, before - cancelled);
        let remaining = notifier.pending().await;
        assert!(remaining.iter().all(|p| p.tag == keep.id.to_string()));
    }

    #[tokio::test]
    async fn gated_schedule_without_location_service_is_skipped() {
        let notifier = Arc::new(MockNotifier::default());
        let adapter = DispatchAdapter::new(Arc::clone(&notifier));
        let mut schedule = Schedule::daily(540);
        schedule.location = Some("home".into());
        let settings = settings_with(vec![schedule]);

        let outcome = adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert_eq!(outcome, BatchOutcome::NothingToSchedule);
    }

    #[tokio::test]
    async fn gated_schedule_arms_only_inside_radius() {
        let notifier = Arc::new(MockNotifier::default());
        let mut schedule = Schedule::daily(540);
        schedule.location = Some("home".into());
        let mut settings = settings_with(vec![schedule]);
        settings.places.push(SavedPlace {
            id: "home".into(),
            name: "Home".to_string(),
            latitude: 57.7,
            longitude: 11.97,
        });

        let outside = DispatchAdapter::new(Arc::clone(&notifier))
            .with_location(Arc::new(MockLocation::outside()));
        let outcome = outside.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert_eq!(outcome, BatchOutcome::NothingToSchedule);

        let inside = DispatchAdapter::new(Arc::clone(&notifier))
            .with_location(Arc::new(MockLocation::inside()));
        let outcome = inside.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert!(matches!(outcome, BatchOutcome::Armed { .. }));
    }

    #[tokio::test]
    async fn gated_schedule_without_a_position_fix_is_skipped() {
        let notifier = Arc::new(MockNotifier::default());
        let mut schedule = Schedule::daily(540);
        schedule.location = Some("home".into());
        let mut settings = settings_with(vec![schedule]);
        settings.places.push(SavedPlace {
            id: "home".into(),
            name: "Home".to_string(),
            latitude: 57.7,
            longitude: 11.97,
        });

        let adapter = DispatchAdapter::new(Arc::clone(&notifier))
            .with_location(Arc::new(MockLocation::unavailable()));
        let outcome = adapter.register_batch(&settings, dt(0, 0)).await.unwrap();
        assert_eq!(outcome, BatchOutcome::NothingToSchedule);
        assert_eq!(notifier.pending_count().await, 0);
    }

    #[tokio::test]
    async fn rollback_swallows_cleanup_failures() {
        let notifier = Arc::new(MockNotifier::default());
        notifier.fail_after(2).await;
        notifier.fail_cancels(true).await;
        let adapter = DispatchAdapter::new(Arc::clone(&notifier)).with_max_queue(16);
        let settings = settings_with(vec![Schedule::daily(540)]);

        // The registration error surfaces even though cleanup also failed.
        let result = adapter.register_batch(&settings, dt(0, 0)).await;
        assert!(matches!(
            result,
            Err(DispatchError::Notifier(NotifierError::Rejected(_)))
        ));
    }
}
