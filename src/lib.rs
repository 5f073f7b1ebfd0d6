//! Strictly Chess - synchronized two-player chess sessions
//!
//! Two authenticated participants share one continuously synchronized game
//! document; anyone else who opens the session watches read-only.
//!
//! # Architecture
//!
//! - **Store**: revisioned session documents with push feeds (in-memory or SQLite)
//! - **Session**: creation, joining, role and turn arbitration, move application
//! - **Sync**: a state machine that keeps a local view in step with the store
//! - **Rules**: legality and terminal conditions, from `strictly_chess_rules`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use strictly_chess::{MemoryStore, Participant, SessionManager, StandardChess, SyncConfig};
//!
//! # async fn example() -> anyhow::Result<()> {
//! let manager = SessionManager::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(StandardChess::new()),
//!     &SyncConfig::default(),
//! );
//!
//! let created = manager
//!     .create_session(&Participant::new("alice".to_string(), None))
//!     .await?;
//! println!("Share this link: {}", created.link());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

// Private module declarations
mod config;
mod error;
mod session;
mod store;
mod sync;

// Crate-level exports - Configuration
pub use config::{ConfigError, SyncConfig};

// Crate-level exports - Errors
pub use error::{SessionError, SessionErrorKind};

// Crate-level exports - Session management
pub use session::{
    CreatedSession, FIRST_PLAYER_DEFAULT_NAME, GAME_QUERY_PARAM, Joined, MoveApplier, MoveAttempt,
    Participant, PlayerSlot, Role, SECOND_PLAYER_DEFAULT_NAME, Session, SessionId, SessionLink,
    SessionManager, SessionStatus, StatusReport, UserId, derive_status,
};

// Crate-level exports - Session store
pub use store::{
    FeedItem, MemoryStore, SessionFeed, SessionStore, SqliteStore, StoreError, StoreErrorKind,
};

// Crate-level exports - Synchronization
pub use sync::{
    AppliedUpdate, LocalView, SnapshotOutcome, StateSynchronizer, SyncEngine, SyncEvent,
    SyncHandle, SyncState,
};

// Crate-level exports - Rules
pub use strictly_chess_rules::{
    MoveDescriptor, MoveVerdict, Promotion, RulesEngine, RulesError, RulesErrorKind, Side,
    StandardChess, TerminalCondition,
};
