//! Per-schedule arm/stop state machine over the dispatch adapter.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDateTime;
use tokio::sync::RwLock;
use tracing::{info, warn};

use chime_core::{PlaceId, Schedule, ScheduleId, Settings};

use crate::{
    BatchOutcome, DEBOUNCE_DELAY, Debouncer, DispatchAdapter, DispatchError, Notifier, RegionEvent,
};

/// Wall-clock source for re-arm passes; injectable so tests stay
/// deterministic. Expansion itself never reads a clock.
pub type Clock = Arc<dyn Fn() -> NaiveDateTime + Send + Sync>;

/// Observable state of one schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScheduleState {
    /// Not armed; no registrations are backing this schedule.
    #[default]
    Inactive,
    /// Armed; the schedule participated in the last successful batch.
    Armed,
}

/// Drives schedules through `Inactive → Armed → Inactive`.
///
/// - `start` activates a schedule and re-arms the batch
/// - `stop`/`remove` cancel the debounce timer and the registrations
/// - `update_schedule` edits an armed schedule and re-arms it after a
///   debounce delay, so rapid edits coalesce into one registration pass
/// - a failed batch auto-deactivates every schedule in it, so no schedule
///   claims an armed state with no backing registrations
/// - `on_region_change` re-runs the pass when the device crosses the region
///   of a place some active schedule is gated on
pub struct ScheduleRunner<N> {
    adapter: Arc<DispatchAdapter<N>>,
    settings: Arc<RwLock<Settings>>,
    states: Arc<RwLock<HashMap<ScheduleId, ScheduleState>>>,
    debouncer: Debouncer,
    debounce_delay: Duration,
    clock: Clock,
}

impl<N> Clone for ScheduleRunner<N> {
    fn clone(&self) -> Self {
        Self {
            adapter: Arc::clone(&self.adapter),
            settings: Arc::clone(&self.settings),
            states: Arc::clone(&self.states),
            debouncer: self.debouncer.clone(),
            debounce_delay: self.debounce_delay,
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<N: Notifier + 'static> ScheduleRunner<N> {
    /// Create a runner over the adapter and an initial settings snapshot.
    pub fn new(adapter: Arc<DispatchAdapter<N>>, settings: Settings) -> Self {
        Self {
            adapter,
            settings: Arc::new(RwLock::new(settings)),
            states: Arc::new(RwLock::new(HashMap::new())),
            debouncer: Debouncer::new(),
            debounce_delay: DEBOUNCE_DELAY,
            clock: Arc::new(|| chrono::Local::now().naive_local()),
        }
    }

    /// Replace the wall-clock source.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Replace the debounce delay.
    pub fn with_debounce_delay(mut self, delay: Duration) -> Self {
        self.debounce_delay = delay;
        self
    }

    /// Snapshot of the current settings.
    pub async fn settings(&self) -> Settings {
        self.settings.read().await.clone()
    }

    /// Current state of a schedule; unknown ids are `Inactive`.
    pub async fn state(&self, id: &ScheduleId) -> ScheduleState {
        self.states
            .read()
            .await
            .get(id)
            .copied()
            .unwrap_or_default()
    }

    /// Activate a schedule and re-arm the batch.
    pub async fn start(&self, id: &ScheduleId) -> Result<BatchOutcome, DispatchError> {
        {
            let mut settings = self.settings.write().await;
            if let Some(schedule) = settings.schedules.iter_mut().find(|s| s.id == *id) {
                schedule.is_active = true;
            }
        }
        self.rearm().await
    }

    /// Deactivate a schedule: abort its debounce timer, cancel its
    /// registrations, and mark it inactive. Returns how many registrations
    /// were cancelled.
    pub async fn stop(&self, id: &ScheduleId) -> Result<usize, DispatchError> {
        self.debouncer.cancel(id).await;
        {
            let mut settings = self.settings.write().await;
            if let Some(schedule) = settings.schedules.iter_mut().find(|s| s.id == *id) {
                schedule.is_active = false;
            }
        }
        self.states.write().await.insert(*id, ScheduleState::Inactive);
        let cancelled = self.adapter.cancel_for_schedule(id).await?;
        info!(schedule_id = %id, cancelled, "schedule stopped");
        Ok(cancelled)
    }

    /// Remove a schedule entirely. A debounce timer pending for it is
    /// aborted first, so it can never re-arm after removal.
    pub async fn remove(&self, id: &ScheduleId) -> Result<usize, DispatchError> {
        self.debouncer.cancel(id).await;
        self.settings.write().await.schedules.retain(|s| s.id != *id);
        self.states.write().await.remove(id);
        self.adapter.cancel_for_schedule(id).await
    }

    /// Apply an edit to a schedule. If the schedule is armed, a re-arm is
    /// scheduled after the debounce delay; further edits reset the timer.
    pub async fn update_schedule<F>(&self, id: &ScheduleId, edit: F)
    where
        F: FnOnce(&mut Schedule),
    {
        {
            let mut settings = self.settings.write().await;
            let Some(schedule) = settings.schedules.iter_mut().find(|s| s.id == *id) else {
                return;
            };
            edit(schedule);
            *schedule = schedule.clone().normalized();
        }

        if self.state(id).await != ScheduleState::Armed {
            return;
        }

        let runner = self.clone();
        let id = *id;
        self.debouncer
            .trigger(id, self.debounce_delay, async move {
                if let Err(e) = runner.rearm().await {
                    warn!(schedule_id = %id, error = %e, "debounced re-arm failed");
                }
            })
            .await;
    }

    /// React to the device entering or leaving a saved place's region.
    ///
    /// When any active schedule is gated on that place, a full registration
    /// pass re-evaluates gating: entering registers the gated schedules,
    /// exiting cancels their registrations. Events for places no active
    /// schedule references are ignored and return `None`.
    pub async fn on_region_change(
        &self,
        place: &PlaceId,
        event: RegionEvent,
    ) -> Result<Option<BatchOutcome>, DispatchError> {
        let relevant = {
            let settings = self.settings.read().await;
            settings
                .schedules
                .iter()
                .any(|s| s.is_active && s.location.as_ref() == Some(place))
        };
        if !relevant {
            return Ok(None);
        }
        info!(place = %place, ?event, "region change, re-running registration pass");
        self.rearm().await.map(Some)
    }

    /// Run a full registration pass for every active schedule.
    ///
    /// On success the batch's schedules are marked armed. On failure the
    /// adapter has already rolled the batch back, and every schedule in it
    /// is auto-deactivated.
    pub async fn rearm(&self) -> Result<BatchOutcome, DispatchError> {
        let now = (self.clock)();
        let snapshot = self.settings.read().await.clone();
        let batch: Vec<ScheduleId> = snapshot
            .schedules
            .iter()
            .filter(|s| s.is_active)
            .map(|s| s.id)
            .collect();

        match self.adapter.register_batch(&snapshot, now).await {
            Ok(outcome) => {
                // Schedules absent from the batch had their registrations
                // cleared by the adapter; their armed state ends with them.
                let mut states = self.states.write().await;
                for schedule in &snapshot.schedules {
                    let state = if batch.contains(&schedule.id) {
                        ScheduleState::Armed
                    } else {
                        ScheduleState::Inactive
                    };
                    states.insert(schedule.id, state);
                }
                Ok(outcome)
            }
            Err(e) => {
                warn!(error = %e, "batch registration failed, deactivating its schedules");
                {
                    let mut settings = self.settings.write().await;
                    for schedule in settings.schedules.iter_mut() {
                        if batch.contains(&schedule.id) {
                            schedule.is_active = false;
                        }
                    }
                }
                let mut states = self.states.write().await;
                for id in &batch {
                    states.insert(*id, ScheduleState::Inactive);
                }
                Err(e)
            }
        }
    }
}
