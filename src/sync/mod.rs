//! Keeping a local working copy consistent with the canonical session.

mod engine;
mod synchronizer;

pub use engine::{AppliedUpdate, LocalView, SnapshotOutcome, SyncEngine, SyncState};
pub use synchronizer::{StateSynchronizer, SyncEvent, SyncHandle};
