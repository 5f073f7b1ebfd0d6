//! Session store: one shared, revisioned document per game.
//!
//! Writes are whole-document replacements conditioned on the revision the
//! writer read. Subscribers receive every committed snapshot in commit order,
//! including the ones their own writes produced.

mod broadcast;
mod error;
mod memory;
mod sqlite;

pub use error::{StoreError, StoreErrorKind};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub(crate) use broadcast::FeedHub;

use async_trait::async_trait;
use tokio::sync::broadcast::{Receiver, error::RecvError};
use tracing::{debug, warn};

use crate::session::Session;

/// Item carried by a session feed.
pub type FeedItem = Result<Session, StoreError>;

/// Backend holding session documents.
#[async_trait]
pub trait SessionStore: Send + Sync + std::fmt::Debug {
    /// Persists a new document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the id is taken or the backend fails.
    async fn create(&self, session: &Session) -> Result<Session, StoreError>;

    /// Reads the current document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] with [`StoreErrorKind::NotFound`] if absent.
    async fn read(&self, id: &str) -> Result<Session, StoreError>;

    /// Replaces the document if its stored revision equals `expected_revision`.
    ///
    /// Returns the committed document carrying its new revision.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] with [`StoreErrorKind::Conflict`] on a stale
    /// revision, [`StoreErrorKind::NotFound`] if absent.
    async fn write(&self, session: &Session, expected_revision: u64)
    -> Result<Session, StoreError>;

    /// Opens a push feed of committed snapshots.
    ///
    /// Commits made through this store reach the feed one by one in commit
    /// order. A backend shared with other processes may deliver their commits
    /// coalesced, as the latest snapshot only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the document does not exist.
    async fn subscribe(&self, id: &str) -> Result<SessionFeed, StoreError>;
}

/// Ordered stream of committed snapshots for one session.
///
/// Yields the snapshot current at subscription time first, then every later
/// commit. Snapshots never go backwards in revision.
#[derive(Debug)]
pub struct SessionFeed {
    session_id: String,
    current: Option<Session>,
    last_revision: Option<u64>,
    receiver: Receiver<FeedItem>,
}

impl SessionFeed {
    pub(crate) fn new(session_id: String, current: Session, receiver: Receiver<FeedItem>) -> Self {
        Self {
            session_id,
            current: Some(current),
            last_revision: None,
            receiver,
        }
    }

    /// Returns the session this feed follows.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Waits for the next snapshot. Returns `None` once the store goes away.
    pub async fn next(&mut self) -> Option<FeedItem> {
        if let Some(current) = self.current.take() {
            self.last_revision = Some(*current.revision());
            return Some(Ok(current));
        }

        loop {
            match self.receiver.recv().await {
                Ok(Ok(session)) => {
                    if self
                        .last_revision
                        .is_some_and(|last| *session.revision() <= last)
                    {
                        debug!(
                            session_id = %self.session_id,
                            revision = session.revision(),
                            "Skipping snapshot already delivered"
                        );
                        continue;
                    }
                    self.last_revision = Some(*session.revision());
                    return Some(Ok(session));
                }
                Ok(Err(err)) => return Some(Err(err)),
                Err(RecvError::Lagged(skipped)) => {
                    warn!(session_id = %self.session_id, skipped, "Feed lagged, skipping to newer snapshots");
                }
                Err(RecvError::Closed) => {
                    debug!(session_id = %self.session_id, "Feed closed");
                    return None;
                }
            }
        }
    }
}
