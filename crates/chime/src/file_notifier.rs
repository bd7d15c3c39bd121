//! A file-backed [`Notifier`] for local use.
//!
//! Pending registrations live in one JSON file, so `chime pending` and a
//! later `chime stop` see what an earlier `chime arm` registered. A real
//! deployment would implement [`Notifier`] against the platform's
//! notification service instead.

use std::path::PathBuf;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::warn;

use chime_dispatch::{
    NotificationPayload, Notifier, NotifierError, PendingNotification, RegistrationId,
};

pub struct FileNotifier {
    path: PathBuf,
    pending: Mutex<Vec<PendingNotification>>,
}

impl FileNotifier {
    /// Open the notifier over a state file, creating empty state if the
    /// file does not exist. A corrupt state file is discarded with a
    /// warning rather than refusing to start.
    pub async fn open(path: PathBuf) -> Result<Self, NotifierError> {
        let pending = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(pending) => pending,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "pending state corrupt, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            pending: Mutex::new(pending),
        })
    }

    async fn persist(&self, pending: &[PendingNotification]) -> Result<(), NotifierError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(pending)
            .map_err(|e| NotifierError::Unavailable(e.to_string()))?;
        tokio::fs::write(&self.path, contents).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for FileNotifier {
    async fn schedule_at(
        &self,
        fire_at: NaiveDateTime,
        payload: NotificationPayload,
    ) -> Result<RegistrationId, NotifierError> {
        let mut pending = self.pending.lock().await;
        let id = RegistrationId::new();
        pending.push(PendingNotification {
            id: id.clone(),
            tag: payload.tag,
            fire_at,
        });
        self.persist(&pending).await?;
        Ok(id)
    }

    async fn cancel(&self, id: &RegistrationId) -> Result<(), NotifierError> {
        let mut pending = self.pending.lock().await;
        pending.retain(|p| &p.id != id);
        self.persist(&pending).await?;
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<PendingNotification>, NotifierError> {
        Ok(self.pending.lock().await.clone())
    }
}
