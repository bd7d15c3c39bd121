//! In-memory test doubles for the platform traits.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;

use chime_core::SavedPlace;

use crate::{
    LocationService, NotificationPayload, Notifier, NotifierError, PendingNotification, Position,
    RegistrationId,
};

#[derive(Default)]
struct MockState {
    pending: Vec<PendingNotification>,
    schedule_calls: usize,
    fail_after: Option<usize>,
    fail_cancels: bool,
}

/// In-memory notifier with injectable failures.
#[derive(Default)]
pub(crate) struct MockNotifier {
    state: Mutex<MockState>,
}

impl MockNotifier {
    /// Let the first `n` schedule calls succeed, then reject the rest.
    pub(crate) async fn fail_after(&self, n: usize) {
        self.state.lock().await.fail_after = Some(n);
    }

    pub(crate) async fn fail_cancels(&self, fail: bool) {
        self.state.lock().await.fail_cancels = fail;
    }

    pub(crate) async fn pending(&self) -> Vec<PendingNotification> {
        self.state.lock().await.pending.clone()
    }

    pub(crate) async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }

    pub(crate) async fn schedule_calls(&self) -> usize {
        self.state.lock().await.schedule_calls
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn schedule_at(
        &self,
        fire_at: NaiveDateTime,
        payload: NotificationPayload,
    ) -> Result<RegistrationId, NotifierError> {
        let mut state = self.state.lock().await;
        state.schedule_calls += 1;
        if let Some(limit) = state.fail_after {
            if state.schedule_calls > limit {
                return Err(NotifierError::Rejected("injected failure".to_string()));
            }
        }
        let id = RegistrationId::new();
        state.pending.push(PendingNotification {
            id: id.clone(),
            tag: payload.tag,
            fire_at,
        });
        Ok(id)
    }

    async fn cancel(&self, id: &RegistrationId) -> Result<(), NotifierError> {
        let mut state = self.state.lock().await;
        if state.fail_cancels {
            return Err(NotifierError::Unavailable("injected cancel failure".to_string()));
        }
        state.pending.retain(|p| &p.id != id);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<PendingNotification>, NotifierError> {
        Ok(self.state.lock().await.pending.clone())
    }
}

/// Location service reporting inside or outside the radius; the answer can
/// change mid-test to simulate the device moving.
pub(crate) struct MockLocation {
    inside: AtomicBool,
    has_fix: bool,
}

impl MockLocation {
    pub(crate) fn inside() -> Self {
        Self { inside: AtomicBool::new(true), has_fix: true }
    }

    pub(crate) fn outside() -> Self {
        Self { inside: AtomicBool::new(false), has_fix: true }
    }

    pub(crate) fn unavailable() -> Self {
        Self { inside: AtomicBool::new(false), has_fix: false }
    }

    pub(crate) fn set_inside(&self, inside: bool) {
        self.inside.store(inside, Ordering::SeqCst);
    }
}

#[async_trait]
impl LocationService for MockLocation {
    async fn current_position(&self) -> Option<Position> {
        self.has_fix.then_some(Position {
            latitude: 57.7,
            longitude: 11.97,
        })
    }

    async fn is_within_radius(
        &self,
        _position: Position,
        _place: &SavedPlace,
        _radius_meters: f64,
    ) -> bool {
        self.inside.load(Ordering::SeqCst)
    }
}
