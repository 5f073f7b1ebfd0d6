//! Synchronization state machine for one session.
//!
//! The engine is driven by committed snapshots and decides, per snapshot,
//! whether it advances the local view. It performs no I/O.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use strictly_chess_rules::RulesEngine;
use tracing::{debug, error, info, instrument};

use crate::session::{Role, Session, SessionId, SessionStatus, StatusReport, UserId, derive_status};
use crate::{SessionError, SessionErrorKind};

/// Where a synchronizer stands with respect to the canonical document.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SyncState {
    /// Nothing applied, subscription not opened.
    Unsynced,
    /// Subscription opened, waiting for the first snapshot.
    Syncing,
    /// The local view mirrors the latest applied snapshot.
    Synced,
    /// A snapshot could not be applied; synchronization has halted.
    Errored,
}

/// One entry of the applied-update log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
pub struct AppliedUpdate {
    /// Revision of the applied snapshot.
    revision: u64,
    /// Position the local view moved to.
    position: String,
    /// Session status at that revision.
    status: SessionStatus,
    /// Number of plies played at that revision.
    plies: usize,
    /// When the snapshot was applied locally.
    applied_at: DateTime<Utc>,
}

/// The local working copy of a session.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct LocalView {
    /// Latest applied snapshot.
    session: Session,
    /// Status derived from the snapshot's position and history.
    report: StatusReport,
    /// Role of the local viewer, when one was named.
    role: Option<Role>,
}

/// What applying a snapshot did.
#[derive(Debug, Clone)]
pub enum SnapshotOutcome {
    /// The snapshot advanced the local view.
    Applied(LocalView),
    /// The snapshot was not newer than the last applied one, or the engine has halted.
    Ignored,
    /// The snapshot was unusable; the engine is now errored.
    Halted(SessionError),
}

/// Applies committed snapshots to a local view in revision order.
#[derive(Debug)]
pub struct SyncEngine {
    session_id: SessionId,
    rules: Arc<dyn RulesEngine>,
    viewer: Option<UserId>,
    state: SyncState,
    log: Vec<AppliedUpdate>,
    view: Option<LocalView>,
    halted_by: Option<SessionError>,
}

impl SyncEngine {
    /// Creates an engine for `session_id`, optionally tracking `viewer`'s role.
    pub fn new(session_id: SessionId, rules: Arc<dyn RulesEngine>, viewer: Option<UserId>) -> Self {
        Self {
            session_id,
            rules,
            viewer,
            state: SyncState::Unsynced,
            log: Vec::new(),
            view: None,
            halted_by: None,
        }
    }

    /// Marks the subscription as opened.
    pub fn begin(&mut self) {
        if self.state == SyncState::Unsynced {
            debug!(session_id = %self.session_id, "Sync started");
            self.state = SyncState::Syncing;
        }
    }

    /// Applies a committed snapshot.
    ///
    /// Snapshots not newer than the last applied revision are ignored, which
    /// makes re-delivery of an echoed write a no-op.
    #[instrument(skip(self, session), fields(session_id = %self.session_id, revision = session.revision()))]
    pub fn apply(&mut self, session: Session) -> SnapshotOutcome {
        if self.state == SyncState::Errored {
            debug!("Sync halted, ignoring snapshot");
            return SnapshotOutcome::Ignored;
        }

        let revision = *session.revision();
        if self.last_applied_revision().is_some_and(|last| revision <= last) {
            debug!("Echo ignored");
            return SnapshotOutcome::Ignored;
        }

        let view = match self.build_view(session) {
            Ok(view) => view,
            Err(err) => return self.fail(err),
        };

        self.log.push(AppliedUpdate {
            revision,
            position: view.session.position().clone(),
            status: *view.session.status(),
            plies: view.session.move_history().len(),
            applied_at: Utc::now(),
        });
        self.view = Some(view.clone());
        self.state = SyncState::Synced;

        info!(status = %view.report, "Applied snapshot");
        SnapshotOutcome::Applied(view)
    }

    /// Halts synchronization with `err`.
    pub fn fail(&mut self, err: SessionError) -> SnapshotOutcome {
        error!(session_id = %self.session_id, error = %err, "Synchronization halted");
        self.state = SyncState::Errored;
        self.halted_by = Some(err.clone());
        SnapshotOutcome::Halted(err)
    }

    fn build_view(&self, session: Session) -> Result<LocalView, SessionError> {
        if session.id() != &self.session_id {
            return Err(SessionError::new(SessionErrorKind::InvalidRemoteState(format!(
                "snapshot for {} delivered to {}",
                session.id(),
                self.session_id
            ))));
        }

        self.rules.parse_position(session.position())?;
        let side_to_move = self.rules.side_to_move(session.position())?;
        if side_to_move != *session.turn() {
            return Err(SessionError::new(SessionErrorKind::InvalidRemoteState(format!(
                "turn is {} but the position has {} to move",
                session.turn(),
                side_to_move
            ))));
        }

        let report = derive_status(self.rules.as_ref(), session.position(), session.move_history())?;
        let role = self.viewer.as_deref().map(|viewer| session.role_of(viewer));

        Ok(LocalView {
            session,
            report,
            role,
        })
    }

    /// Session this engine follows.
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Current state.
    pub fn state(&self) -> SyncState {
        self.state
    }

    /// Applied-update log, oldest first.
    pub fn log(&self) -> &[AppliedUpdate] {
        &self.log
    }

    /// Latest local view, if any snapshot was applied.
    pub fn view(&self) -> Option<&LocalView> {
        self.view.as_ref()
    }

    /// Error that halted synchronization, if any.
    pub fn halted_by(&self) -> Option<&SessionError> {
        self.halted_by.as_ref()
    }

    /// Revision of the most recently applied snapshot.
    pub fn last_applied_revision(&self) -> Option<u64> {
        self.log.last().map(|entry| entry.revision)
    }
}
