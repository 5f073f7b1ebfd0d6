//! Per-session fan-out of committed snapshots.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::broadcast;
use tracing::{debug, instrument, trace};

use super::{FeedItem, StoreError};
use crate::session::{Session, SessionId};

#[derive(Debug)]
struct Channel {
    sender: broadcast::Sender<FeedItem>,
    last_revision: Option<u64>,
}

/// Fans committed snapshots out to subscribers, at most once per revision.
#[derive(Debug)]
pub(crate) struct FeedHub {
    channels: Mutex<HashMap<SessionId, Channel>>,
    capacity: usize,
}

impl FeedHub {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: capacity.max(1),
        }
    }

    /// Registers a new receiver for `id`.
    #[instrument(skip(self))]
    pub(crate) fn subscribe(&self, id: &str) -> broadcast::Receiver<FeedItem> {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let channel = channels.entry(id.to_string()).or_insert_with(|| {
            debug!(session_id = id, "Opening feed channel");
            Channel {
                sender: broadcast::channel(self.capacity).0,
                last_revision: None,
            }
        });
        channel.sender.subscribe()
    }

    /// Sends `session` to subscribers unless this revision was already sent.
    pub(crate) fn publish(&self, session: &Session) {
        let mut channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(channel) = channels.get_mut(session.id()) else {
            return;
        };

        let revision = *session.revision();
        if channel.last_revision.is_some_and(|last| revision <= last) {
            trace!(session_id = %session.id(), revision, "Revision already published");
            return;
        }
        channel.last_revision = Some(revision);

        // No receivers is not an error: nobody is watching right now.
        let delivered = channel.sender.send(Ok(session.clone())).unwrap_or(0);
        trace!(session_id = %session.id(), revision, delivered, "Snapshot published");
    }

    /// Sends a terminal error to subscribers of `id`.
    pub(crate) fn publish_error(&self, id: &str, err: StoreError) {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(channel) = channels.get(id) {
            let _ = channel.sender.send(Err(err));
        }
    }

    /// Returns true while at least one receiver for `id` is alive.
    pub(crate) fn has_subscribers(&self, id: &str) -> bool {
        let channels = self.channels.lock().unwrap_or_else(PoisonError::into_inner);
        channels
            .get(id)
            .is_some_and(|channel| channel.sender.receiver_count() > 0)
    }
}
