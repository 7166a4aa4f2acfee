//! Debounced persistence of the document being edited.
//!
//! Every change hands the coordinator a fresh snapshot and restarts the quiet
//! period. When the period elapses with no newer change the latest snapshot is
//! written once, unless it equals what was last written. `flush` skips the
//! wait. Writes are serialized, so they reach the backend in the order they
//! were issued and an older snapshot never lands after a newer one.

use crate::backend::DocumentBackend;
use crate::document::Document;
use crate::notifications::{NotificationItem, Notifications};
use chrono::{DateTime, Utc};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum SaveState {
    #[default]
    Saved,
    Dirty,
    Saving,
    Error(String),
}

#[derive(Default)]
struct AutosaveState {
    epoch: u64,
    pending: Option<Document>,
    last_persisted: Option<Document>,
    saving: bool,
    save_state: SaveState,
    last_saved_at: Option<DateTime<Utc>>,
}

struct Inner {
    backend: Arc<dyn DocumentBackend>,
    quiet: Duration,
    notifications: Notifications,
    state: Mutex<AutosaveState>,
    writer: tokio::sync::Mutex<()>,
}

#[derive(Clone)]
pub struct AutosaveCoordinator {
    inner: Arc<Inner>,
}

impl AutosaveCoordinator {
    pub fn new(
        backend: Arc<dyn DocumentBackend>,
        quiet: Duration,
        notifications: Notifications,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                backend,
                quiet,
                notifications,
                state: Mutex::new(AutosaveState::default()),
                writer: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn quiet_period(&self) -> Duration {
        self.inner.quiet
    }

    /// Records `doc` as the copy the backend already holds.
    pub fn mark_persisted(&self, doc: Document) {
        let mut state = self.inner.lock();
        state.last_persisted = Some(doc);
        state.pending = None;
        state.save_state = SaveState::Saved;
    }

    /// Queues `doc` and restarts the quiet period.
    pub fn schedule(&self, doc: Document) {
        let epoch = {
            let mut state = self.inner.lock();
            state.epoch += 1;
            // While a write is in flight `last_persisted` is about to change, so
            // the comparison waits for `persist_pending` under the writer lock.
            if !state.saving
                && state
                    .last_persisted
                    .as_ref()
                    .is_some_and(|persisted| persisted.same_content(&doc))
            {
                state.pending = None;
                state.save_state = SaveState::Saved;
                return;
            }
            state.pending = Some(doc);
            if !state.saving {
                state.save_state = SaveState::Dirty;
            }
            state.epoch
        };

        let Ok(handle) = Handle::try_current() else {
            warn!("no async runtime; autosave waits for an explicit flush");
            return;
        };
        let inner = Arc::clone(&self.inner);
        debug!(epoch, quiet_ms = inner.quiet.as_millis() as u64, "autosave scheduled");
        handle.spawn(async move {
            tokio::time::sleep(inner.quiet).await;
            if inner.lock().epoch != epoch {
                return;
            }
            inner.persist_pending().await;
        });
    }

    /// Writes the pending snapshot now, cancelling the quiet-period timer.
    pub async fn flush(&self) {
        self.inner.lock().epoch += 1;
        self.inner.persist_pending().await;
    }

    pub fn save_state(&self) -> SaveState {
        self.inner.lock().save_state.clone()
    }

    pub fn is_saving(&self) -> bool {
        self.inner.lock().saving
    }

    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        self.inner.lock().last_saved_at
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, AutosaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn persist_pending(&self) {
        let _writer = self.writer.lock().await;

        let snapshot = {
            let mut state = self.lock();
            let Some(doc) = state.pending.take() else {
                return;
            };
            if state
                .last_persisted
                .as_ref()
                .is_some_and(|persisted| persisted.same_content(&doc))
            {
                state.save_state = SaveState::Saved;
                return;
            }
            state.saving = true;
            state.save_state = SaveState::Saving;
            doc
        };

        let result = self.backend.upsert(&snapshot).await;

        let failure = {
            let mut state = self.lock();
            state.saving = false;
            match result {
                Ok(()) => {
                    info!(document = %snapshot.id, blocks = snapshot.blocks.len(), "document saved");
                    state.last_persisted = Some(snapshot);
                    state.last_saved_at = Some(Utc::now());
                    state.save_state = if state.pending.is_some() {
                        SaveState::Dirty
                    } else {
                        SaveState::Saved
                    };
                    None
                }
                Err(err) => {
                    let message = err.to_string();
                    error!(document = %snapshot.id, error = %message, "autosave failed");
                    state.save_state = SaveState::Error(message.clone());
                    Some(message)
                }
            }
        };

        if let Some(message) = failure {
            self.notifications
                .push(NotificationItem::save_failed(message));
        }
    }
}
