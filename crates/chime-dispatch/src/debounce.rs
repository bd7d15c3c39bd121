//! Per-schedule edit debouncing.
//!
//! Edits to an armed schedule re-register it, but not on every keystroke:
//! each edit resets a short timer keyed by schedule id, and only the timer
//! that survives fires the re-arm. The table exclusively owns its entries;
//! removing or stopping a schedule aborts its timer, so a stale timer can
//! never re-arm a schedule that was deleted before it fired.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::task::AbortHandle;

use chime_core::ScheduleId;

/// Default delay before a debounced action fires.
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(300);

struct PendingTimer {
    generation: u64,
    handle: AbortHandle,
}

#[derive(Default)]
struct Inner {
    next_generation: u64,
    pending: HashMap<ScheduleId, PendingTimer>,
}

/// Owned table of pending debounce timers, keyed by schedule id.
#[derive(Clone, Default)]
pub struct Debouncer {
    inner: Arc<Mutex<Inner>>,
}

impl Debouncer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule `action` to run after `delay`, aborting any timer already
    /// pending for the same schedule. The latest trigger wins.
    pub async fn trigger<F>(&self, id: ScheduleId, delay: Duration, action: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut inner = self.inner.lock().await;
        inner.next_generation += 1;
        let generation = inner.next_generation;

        if let Some(previous) = inner.pending.remove(&id) {
            previous.handle.abort();
        }

        let table = Arc::clone(&self.inner);
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            action.await;
            // Clear our own entry, but only if it is still ours: a newer
            // trigger may have replaced it while the action ran.
            let mut inner = table.lock().await;
            if inner
                .pending
                .get(&id)
                .is_some_and(|timer| timer.generation == generation)
            {
                inner.pending.remove(&id);
            }
        });

        inner.pending.insert(
            id,
            PendingTimer {
                generation,
                handle: handle.abort_handle(),
            },
        );
    }

    /// Abort the pending timer for a schedule, if any. Returns whether a
    /// timer was actually cancelled.
    pub async fn cancel(&self, id: &ScheduleId) -> bool {
        let mut inner = self.inner.lock().await;
        match inner.pending.remove(id) {
            Some(timer) => {
                timer.handle.abort();
                true
            }
            None => false,
        }
    }

    /// Number of timers currently pending.
    pub async fn pending_count(&self) -> usize {
        self.inner.lock().await.pending.len()
    }
}
