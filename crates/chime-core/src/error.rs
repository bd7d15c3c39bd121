//! Error types for the core data model.

use thiserror::Error;

/// Errors that can occur while persisting settings.
///
/// Loading never produces these: a missing or malformed blob falls back to
/// defaults. Only explicit save operations surface them.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Filesystem error while writing the blob.
    #[error("failed to write settings: {0}")]
    Io(#[from] std::io::Error),

    /// The settings could not be serialized.
    #[error("failed to serialize settings: {0}")]
    Serialize(#[from] serde_json::Error),
}
