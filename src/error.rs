//! Session engine error types.

use derive_more::{Display, Error};
use strictly_chess_rules::RulesError;
use tracing::instrument;

use crate::store::{StoreError, StoreErrorKind};

/// Closed set of failures a session operation can surface.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum SessionErrorKind {
    /// No document exists for the session id.
    #[display("Game not found: {}", _0)]
    NotFound(String),

    /// Transient store failure; the operation may be retried.
    #[display("Persistence failure: {}", _0)]
    Persistence(String),

    /// A stored document could not be turned into a playable session.
    #[display("Invalid remote state: {}", _0)]
    InvalidRemoteState(String),

    /// Another writer committed first.
    #[display("Revision conflict: expected {}, found {}", expected, actual)]
    RevisionConflict {
        /// Revision the write was based on.
        expected: u64,
        /// Revision currently stored.
        actual: u64,
    },

    /// A share link that carries no session id.
    #[display("Invalid game link: {}", _0)]
    InvalidLink(String),
}

/// Session error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Session error: {} at {}:{}", kind, file, line)]
pub struct SessionError {
    /// Error classification.
    pub kind: SessionErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl SessionError {
    /// Creates a new session error with caller location tracking.
    #[track_caller]
    #[instrument]
    pub fn new(kind: SessionErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }

    /// Returns true if repeating the operation after a re-read may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            SessionErrorKind::Persistence(_) | SessionErrorKind::RevisionConflict { .. }
        )
    }

    /// Returns true if the session cannot continue synchronizing.
    pub fn is_fatal_for_session(&self) -> bool {
        matches!(self.kind, SessionErrorKind::InvalidRemoteState(_))
    }

    /// Returns the message shown to a player.
    pub fn user_message(&self) -> String {
        match &self.kind {
            SessionErrorKind::NotFound(_) => "Game not found".to_string(),
            SessionErrorKind::Persistence(msg) => format!("Could not save the game: {}", msg),
            SessionErrorKind::InvalidRemoteState(_) => "Invalid game state".to_string(),
            SessionErrorKind::RevisionConflict { .. } => {
                "The game changed in the meantime, please try again".to_string()
            }
            SessionErrorKind::InvalidLink(_) => "That game link is not valid".to_string(),
        }
    }
}

impl From<StoreError> for SessionError {
    #[track_caller]
    fn from(err: StoreError) -> Self {
        let kind = match err.kind {
            StoreErrorKind::NotFound(id) => SessionErrorKind::NotFound(id),
            StoreErrorKind::Conflict { expected, actual } => {
                SessionErrorKind::RevisionConflict { expected, actual }
            }
            StoreErrorKind::InvalidDocument(msg) => SessionErrorKind::InvalidRemoteState(msg),
            StoreErrorKind::AlreadyExists(id) => {
                SessionErrorKind::Persistence(format!("session {} already exists", id))
            }
            StoreErrorKind::Backend(msg) => SessionErrorKind::Persistence(msg),
        };
        Self::new(kind)
    }
}

impl From<RulesError> for SessionError {
    #[track_caller]
    fn from(err: RulesError) -> Self {
        Self::new(SessionErrorKind::InvalidRemoteState(err.kind.to_string()))
    }
}
