//! Move validation and write-back.

use std::sync::Arc;

use chrono::Utc;
use strictly_chess_rules::{MoveDescriptor, MoveVerdict, RulesEngine};
use tracing::{debug, info, instrument, warn};

use super::{Session, SessionStatus};
use crate::SessionError;
use crate::store::SessionStore;

/// Outcome of a move attempt.
///
/// Only `Accepted` touched the store. The other two are silent no-ops for
/// the UI surface, not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveAttempt {
    /// The move was legal and committed; carries the committed session.
    Accepted(Session),
    /// The user is not the side to move (or not a player at all).
    NotPermitted,
    /// The rules engine refused the move, or the game is over.
    Rejected,
}

impl MoveAttempt {
    /// Returns true if the move was committed.
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveAttempt::Accepted(_))
    }
}

/// Gates, validates, and commits moves.
#[derive(Debug, Clone)]
pub struct MoveApplier {
    store: Arc<dyn SessionStore>,
    rules: Arc<dyn RulesEngine>,
}

impl MoveApplier {
    /// Creates a move applier over the given store and rules.
    pub fn new(store: Arc<dyn SessionStore>, rules: Arc<dyn RulesEngine>) -> Self {
        Self { store, rules }
    }

    /// Attempts `descriptor` for `user_id` against the snapshot `session`.
    ///
    /// Issues exactly one store write when the move is accepted and none
    /// otherwise. The write is conditioned on the snapshot's revision.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the stored position does not parse, the
    /// write fails, or the snapshot is stale (`RevisionConflict`).
    #[instrument(skip(self, session), fields(session_id = %session.id(), revision = session.revision(), descriptor = %descriptor))]
    pub async fn attempt_move(
        &self,
        session: &Session,
        user_id: &str,
        descriptor: &MoveDescriptor,
    ) -> Result<MoveAttempt, SessionError> {
        if !session.may_move(user_id) {
            debug!("Move not permitted");
            return Ok(MoveAttempt::NotPermitted);
        }

        if *session.status() == SessionStatus::Finished {
            debug!("Game already finished");
            return Ok(MoveAttempt::Rejected);
        }

        let (position, notation) = match self
            .rules
            .validate_and_apply(session.position(), descriptor)?
        {
            MoveVerdict::Accepted { position, notation } => (position, notation),
            MoveVerdict::Rejected => {
                debug!("Illegal move");
                return Ok(MoveAttempt::Rejected);
            }
        };

        let mut next = session.clone();
        let mut history = session.move_history().clone();
        history.push(notation.clone());
        let terminal = self.rules.terminal_condition(&position, &history)?;
        next.record_move(position, notation.clone(), terminal.is_some(), Utc::now());

        let committed = self
            .store
            .write(&next, *session.revision())
            .await
            .inspect_err(|err| warn!(error = %err, "Move write failed"))?;

        info!(
            notation = %notation,
            revision = committed.revision(),
            status = %committed.status(),
            "Move accepted"
        );
        Ok(MoveAttempt::Accepted(committed))
    }
}
