//! Push subscriptions that keep a local view in step with the store.

use std::sync::{Arc, Mutex, PoisonError};

use strictly_chess_rules::RulesEngine;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument};

use super::{AppliedUpdate, LocalView, SnapshotOutcome, SyncEngine, SyncState};
use crate::SessionError;
use crate::session::{SessionId, UserId};
use crate::store::SessionStore;

/// Notification delivered to a subscriber callback.
#[derive(Debug, Clone)]
pub enum SyncEvent {
    /// A newer snapshot was applied.
    Updated(LocalView),
    /// Synchronization stopped; no further events follow.
    Halted(SessionError),
}

/// Opens synchronized views of sessions.
#[derive(Debug, Clone)]
pub struct StateSynchronizer {
    store: Arc<dyn SessionStore>,
    rules: Arc<dyn RulesEngine>,
}

impl StateSynchronizer {
    /// Creates a synchronizer over the given store and rules.
    pub fn new(store: Arc<dyn SessionStore>, rules: Arc<dyn RulesEngine>) -> Self {
        Self { store, rules }
    }

    /// Subscribes to session `id`.
    ///
    /// `on_update` runs on a background task for every applied snapshot, in
    /// commit order, starting with the snapshot current at subscription time.
    /// Own writes come back through the same path. When `viewer` is given,
    /// each view carries that user's role.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] (`NotFound`) if the session does not exist.
    #[instrument(skip(self, on_update))]
    pub async fn subscribe<F>(
        &self,
        id: &str,
        viewer: Option<UserId>,
        mut on_update: F,
    ) -> Result<SyncHandle, SessionError>
    where
        F: FnMut(SyncEvent) + Send + 'static,
    {
        let engine = Arc::new(Mutex::new(SyncEngine::new(
            id.to_string(),
            Arc::clone(&self.rules),
            viewer,
        )));
        let (state_tx, state_rx) = watch::channel(SyncState::Unsynced);

        let mut feed = self.store.subscribe(id).await?;
        lock(&engine).begin();
        state_tx.send_replace(SyncState::Syncing);

        let task_engine = Arc::clone(&engine);
        let task = tokio::spawn(async move {
            while let Some(item) = feed.next().await {
                let outcome = {
                    let mut engine = lock(&task_engine);
                    match item {
                        Ok(session) => engine.apply(session),
                        Err(err) => engine.fail(err.into()),
                    }
                };

                match outcome {
                    SnapshotOutcome::Applied(view) => {
                        state_tx.send_replace(SyncState::Synced);
                        on_update(SyncEvent::Updated(view));
                    }
                    SnapshotOutcome::Ignored => {}
                    SnapshotOutcome::Halted(err) => {
                        state_tx.send_replace(SyncState::Errored);
                        on_update(SyncEvent::Halted(err));
                        return;
                    }
                }
            }
            debug!(session_id = %feed.session_id(), "Session feed ended");
        });

        info!(session_id = id, "Subscribed to session");
        Ok(SyncHandle {
            session_id: id.to_string(),
            engine,
            state: state_rx,
            task,
        })
    }
}

/// A live subscription. Dropping it unsubscribes.
#[derive(Debug)]
pub struct SyncHandle {
    session_id: SessionId,
    engine: Arc<Mutex<SyncEngine>>,
    state: watch::Receiver<SyncState>,
    task: JoinHandle<()>,
}

impl SyncHandle {
    /// Session this subscription follows.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current synchronization state.
    pub fn state(&self) -> SyncState {
        *self.state.borrow()
    }

    /// Waits until the state satisfies `predicate`, returning that state.
    ///
    /// Returns `None` if the subscription ended first.
    pub async fn wait_for_state(
        &mut self,
        predicate: impl FnMut(&SyncState) -> bool,
    ) -> Option<SyncState> {
        self.state.wait_for(predicate).await.ok().map(|state| *state)
    }

    /// Latest local view.
    pub fn view(&self) -> Option<LocalView> {
        lock(&self.engine).view().cloned()
    }

    /// Every update applied so far, oldest first.
    pub fn applied_log(&self) -> Vec<AppliedUpdate> {
        lock(&self.engine).log().to_vec()
    }

    /// Error that halted synchronization, if any.
    pub fn halted_by(&self) -> Option<SessionError> {
        lock(&self.engine).halted_by().cloned()
    }

    /// Returns true while the background task is still delivering updates.
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }

    /// Stops delivering updates. Writes already sent to the store still land.
    #[instrument(skip(self), fields(session_id = %self.session_id))]
    pub fn unsubscribe(self) {
        info!("Unsubscribing from session");
        // Drop aborts the task.
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        if !self.task.is_finished() {
            debug!(session_id = %self.session_id, "Aborting session subscription");
            self.task.abort();
        }
    }
}

fn lock(engine: &Mutex<SyncEngine>) -> std::sync::MutexGuard<'_, SyncEngine> {
    engine.lock().unwrap_or_else(PoisonError::into_inner)
}
