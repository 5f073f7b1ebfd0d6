//! In-process session store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::{FeedHub, SessionFeed, SessionStore, StoreError, StoreErrorKind};
use crate::session::{Session, SessionId};

/// Default number of snapshots buffered per subscriber.
const DEFAULT_FEED_CAPACITY: usize = 64;

/// Session store kept in memory and shared by clones.
///
/// Every commit is broadcast to subscribers while the document lock is held,
/// so subscribers observe commits in exactly the order they happened.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    documents: Arc<Mutex<HashMap<SessionId, Session>>>,
    hub: Arc<FeedHub>,
    writes: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[instrument]
    pub fn new() -> Self {
        Self::with_feed_capacity(DEFAULT_FEED_CAPACITY)
    }

    /// Creates an empty store buffering `capacity` snapshots per subscriber.
    #[instrument]
    pub fn with_feed_capacity(capacity: usize) -> Self {
        info!(capacity, "Creating in-memory session store");
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
            hub: Arc::new(FeedHub::new(capacity)),
            writes: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of successful `create` and `write` commits so far.
    pub fn commit_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Makes the next `count` commits fail with a backend error.
    ///
    /// Simulates a flaky network link.
    pub fn fail_next_commits(&self, count: usize) {
        self.failures.store(count, Ordering::SeqCst);
    }

    /// Consumes one injected failure, if any are pending.
    #[track_caller]
    fn injected_failure(&self) -> Result<(), StoreError> {
        let pending = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        match pending {
            Ok(_) => {
                warn!("Injected store failure");
                Err(StoreError::backend("simulated network failure"))
            }
            Err(_) => Ok(()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn create(&self, session: &Session) -> Result<Session, StoreError> {
        self.injected_failure()?;
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);

        if documents.contains_key(session.id()) {
            warn!("Session already exists");
            return Err(StoreError::new(StoreErrorKind::AlreadyExists(
                session.id().clone(),
            )));
        }

        let committed = session.clone().with_revision(1);
        documents.insert(committed.id().clone(), committed.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.hub.publish(&committed);

        debug!("Session document created");
        Ok(committed)
    }

    #[instrument(skip(self))]
    async fn read(&self, id: &str) -> Result<Session, StoreError> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        documents.get(id).cloned().ok_or_else(|| {
            debug!("Session not found");
            StoreError::new(StoreErrorKind::NotFound(id.to_string()))
        })
    }

    #[instrument(skip(self, session), fields(session_id = %session.id()))]
    async fn write(
        &self,
        session: &Session,
        expected_revision: u64,
    ) -> Result<Session, StoreError> {
        self.injected_failure()?;
        let mut documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);

        let stored = documents.get(session.id()).ok_or_else(|| {
            StoreError::new(StoreErrorKind::NotFound(session.id().clone()))
        })?;

        let actual = *stored.revision();
        if actual != expected_revision {
            warn!(expected = expected_revision, actual, "Rejecting stale write");
            return Err(StoreError::new(StoreErrorKind::Conflict {
                expected: expected_revision,
                actual,
            }));
        }

        let committed = session.clone().with_revision(actual + 1);
        documents.insert(committed.id().clone(), committed.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.hub.publish(&committed);

        debug!(revision = committed.revision(), "Session document written");
        Ok(committed)
    }

    #[instrument(skip(self))]
    async fn subscribe(&self, id: &str) -> Result<SessionFeed, StoreError> {
        let documents = self.documents.lock().unwrap_or_else(PoisonError::into_inner);
        let current = documents
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::new(StoreErrorKind::NotFound(id.to_string())))?;

        // Subscribing under the document lock leaves no gap before the next commit.
        let receiver = self.hub.subscribe(id);
        debug!(revision = current.revision(), "Subscribed to session feed");
        Ok(SessionFeed::new(id.to_string(), current, receiver))
    }
}
