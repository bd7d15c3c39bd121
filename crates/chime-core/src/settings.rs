//! The opaque settings blob.
//!
//! Persistence is an external collaborator's concern; this module only
//! defines the blob shape and a tolerant loader. Load failures and
//! malformed entries always degrade to defaults, never to an error.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{QuietHours, SavedPlace, Schedule, SettingsError};

/// Default geofence radius for location-gated schedules, in meters.
pub const DEFAULT_RADIUS_METERS: f64 = 200.0;

/// Everything the engine needs from the settings store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub schedules: Vec<Schedule>,
    #[serde(default)]
    pub quiet_hours: QuietHours,
    #[serde(default)]
    pub places: Vec<SavedPlace>,
    #[serde(default = "default_radius")]
    pub radius_meters: f64,
}

fn default_radius() -> f64 {
    DEFAULT_RADIUS_METERS
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            schedules: Vec::new(),
            quiet_hours: QuietHours::default(),
            places: Vec::new(),
            radius_meters: DEFAULT_RADIUS_METERS,
        }
    }
}

impl Settings {
    /// Load settings from a file, falling back to defaults on any failure.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::from_json(&contents),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings unreadable, using defaults");
                Self::default()
            }
        }
    }

    /// Parse settings from a JSON blob, falling back to defaults on any
    /// failure. Individually malformed schedule entries are dropped with a
    /// warning rather than poisoning the whole document.
    pub fn from_json(contents: &str) -> Self {
        let mut doc: serde_json::Value = match serde_json::from_str(contents) {
            Ok(doc) => doc,
            Err(e) => {
                warn!(error = %e, "settings blob malformed, using defaults");
                return Self::default();
            }
        };

        // Pull schedules out first so one bad entry can be skipped.
        let raw_schedules = match doc.get_mut("schedules") {
            Some(serde_json::Value::Array(entries)) => std::mem::take(entries),
            _ => Vec::new(),
        };

        let mut settings: Settings = match serde_json::from_value(doc) {
            Ok(settings) => settings,
            Err(e) => {
                warn!(error = %e, "settings blob has invalid shape, using defaults");
                Self::default()
            }
        };

        for (index, entry) in raw_schedules.into_iter().enumerate() {
            match serde_json::from_value::<Schedule>(entry) {
                Ok(schedule) => settings.schedules.push(schedule.normalized()),
                Err(e) => {
                    warn!(index, error = %e, "skipping malformed schedule entry");
                }
            }
        }

        settings
    }

    /// Serialize and write the blob.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Look up a saved place by id.
    pub fn place(&self, id: &crate::PlaceId) -> Option<&SavedPlace> {
        self.places.iter().find(|p| &p.id == id)
    }
}
