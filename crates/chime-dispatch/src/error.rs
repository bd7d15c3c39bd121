//! Error types for dispatch operations.

use thiserror::Error;

/// Errors surfaced by a [`crate::Notifier`] implementation.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// The platform rejected a registration.
    #[error("registration rejected: {0}")]
    Rejected(String),

    /// The notification backend could not be reached.
    #[error("notification backend unavailable: {0}")]
    Unavailable(String),

    /// Backend state could not be read or written.
    #[error("notification backend I/O: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur in dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// The external notifier failed; the batch was rolled back.
    #[error("notifier error: {0}")]
    Notifier(#[from] NotifierError),
}
