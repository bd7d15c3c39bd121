//! Trait seams for the platform's notification and location services.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chime_core::SavedPlace;

use crate::NotifierError;

/// Identifier the notification backend assigns to one registration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RegistrationId(pub String);

impl RegistrationId {
    /// Generate a fresh random id, for backends that let the caller choose.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for RegistrationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What the user sees when a registration fires.
///
/// `tag` carries the owning schedule's id so registrations can later be
/// enumerated and cancelled by schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub body: String,
    pub tag: String,
}

/// One registration currently pending with the backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingNotification {
    pub id: RegistrationId,
    pub tag: String,
    pub fire_at: NaiveDateTime,
}

/// The OS-level notification service, reduced to the three operations the
/// dispatch adapter needs. Cancel-by-schedule is built on `list_pending`
/// plus tag filtering; the backend only has to cancel by its own id.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Register one notification to fire at the given instant.
    async fn schedule_at(
        &self,
        fire_at: NaiveDateTime,
        payload: NotificationPayload,
    ) -> Result<RegistrationId, NotifierError>;

    /// Cancel one registration by backend id.
    async fn cancel(&self, id: &RegistrationId) -> Result<(), NotifierError>;

    /// Enumerate every registration currently pending.
    async fn list_pending(&self) -> Result<Vec<PendingNotification>, NotifierError>;
}

/// A geographic position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub latitude: f64,
    pub longitude: f64,
}

/// The platform's location service, reduced to what location gating needs.
/// `current_position` returning `None` means "unavailable" (no fix, no
/// permission); gated schedules are then skipped, not failed.
#[async_trait]
pub trait LocationService: Send + Sync {
    /// The device's current position, if one can be obtained.
    async fn current_position(&self) -> Option<Position>;

    /// Whether a position is within `radius_meters` of a saved place.
    async fn is_within_radius(
        &self,
        position: Position,
        place: &SavedPlace,
        radius_meters: f64,
    ) -> bool;
}

/// A geofence transition reported by the platform for a saved place.
///
/// The host feeds these into [`crate::ScheduleRunner::on_region_change`];
/// the registration pass re-evaluates gating, so the event kind only
/// matters for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionEvent {
    Entered,
    Exited,
}
