//! Session creation and joining.

use std::sync::Arc;

use chrono::Utc;
use derive_getters::Getters;
use strictly_chess_rules::{MoveDescriptor, RulesEngine};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{
    FIRST_PLAYER_DEFAULT_NAME, MoveApplier, MoveAttempt, Participant, PlayerSlot, Role,
    SECOND_PLAYER_DEFAULT_NAME, Session, SessionLink,
};
use crate::store::SessionStore;
use crate::{SessionError, SessionErrorKind, SyncConfig};

/// A freshly created session and the link to share with the opponent.
#[derive(Debug, Clone, Getters)]
pub struct CreatedSession {
    /// The committed session document.
    session: Session,
    /// Link the second player opens to join.
    link: SessionLink,
}

/// The role a participant ended up with, and the session as they saw it.
#[derive(Debug, Clone, Getters)]
pub struct Joined {
    /// Role granted to the joiner.
    role: Role,
    /// Session document after the join.
    session: Session,
}

/// Creates, joins, and loads sessions.
#[derive(Debug, Clone)]
pub struct SessionManager {
    store: Arc<dyn SessionStore>,
    rules: Arc<dyn RulesEngine>,
    moves: MoveApplier,
    share_base_url: String,
    max_join_retries: u32,
}

impl SessionManager {
    /// Creates a session manager over explicitly provided clients.
    #[instrument(skip(store, rules, config))]
    pub fn new(
        store: Arc<dyn SessionStore>,
        rules: Arc<dyn RulesEngine>,
        config: &SyncConfig,
    ) -> Self {
        info!(share_base_url = %config.share_base_url(), "Creating session manager");
        Self {
            moves: MoveApplier::new(Arc::clone(&store), Arc::clone(&rules)),
            store,
            rules,
            share_base_url: config.share_base_url().clone(),
            max_join_retries: *config.max_join_retries(),
        }
    }

    /// Returns the move applier sharing this manager's clients.
    pub fn moves(&self) -> &MoveApplier {
        &self.moves
    }

    /// Creates a session with `initiator` as first player.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] (`Persistence`, retryable) if the store
    /// write fails.
    #[instrument(skip(self, initiator), fields(initiator = %initiator.id()))]
    pub async fn create_session(
        &self,
        initiator: &Participant,
    ) -> Result<CreatedSession, SessionError> {
        let id = new_session_id();
        let position = self.rules.initial_position();
        let turn = self.rules.side_to_move(&position)?;
        let first_player = PlayerSlot::seat(initiator, FIRST_PLAYER_DEFAULT_NAME);

        let session = Session::open(id.clone(), first_player, position, turn, Utc::now());
        let committed = self
            .store
            .create(&session)
            .await
            .inspect_err(|err| warn!(error = %err, "Failed to create session"))?;

        info!(session_id = %id, "Created new session");
        Ok(CreatedSession {
            link: SessionLink::new(self.share_base_url.clone(), id),
            session: committed,
        })
    }

    /// Reads the current session document.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] (`NotFound`) if there is no such session.
    #[instrument(skip(self))]
    pub async fn load_session(&self, id: &str) -> Result<Session, SessionError> {
        Ok(self.store.read(id).await?)
    }

    /// Joins session `id` as `joiner`.
    ///
    /// Seated players get their existing role back without a write. The first
    /// newcomer takes the second slot; everyone after that observes, which is
    /// never persisted. A lost write race re-reads and re-evaluates.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] (`NotFound`) if there is no such session,
    /// `Persistence` on store failure, or `RevisionConflict` once retries run out.
    #[instrument(skip(self, joiner), fields(joiner = %joiner.id()))]
    pub async fn join_session(
        &self,
        id: &str,
        joiner: &Participant,
    ) -> Result<Joined, SessionError> {
        let mut last_conflict = SessionErrorKind::RevisionConflict {
            expected: 0,
            actual: 0,
        };

        for attempt in 0..=self.max_join_retries {
            let session = self.load_session(id).await?;
            let role = session.role_of(joiner.id());

            if role != Role::Unassigned {
                debug!(?role, "No seat change needed");
                return Ok(Joined { role, session });
            }

            let mut next = session.clone();
            next.seat_second_player(
                PlayerSlot::seat(joiner, SECOND_PLAYER_DEFAULT_NAME),
                Utc::now(),
            );

            match self.store.write(&next, *session.revision()).await {
                Ok(committed) => {
                    info!(session_id = %id, "Player joined as second player");
                    return Ok(Joined {
                        role: Role::SecondPlayer,
                        session: committed,
                    });
                }
                Err(err) if err.is_conflict() => {
                    warn!(attempt, error = %err, "Join lost a write race, re-reading");
                    last_conflict = SessionError::from(err).kind;
                }
                Err(err) => return Err(err.into()),
            }
        }

        Err(SessionError::new(last_conflict))
    }

    /// Joins the session a share link points at.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] (`InvalidLink`) for a link without a session
    /// id, otherwise as [`SessionManager::join_session`].
    #[instrument(skip(self, joiner))]
    pub async fn join_link(&self, link: &str, joiner: &Participant) -> Result<Joined, SessionError> {
        let id = SessionLink::resolve(link)?;
        self.join_session(&id, joiner).await
    }

    /// Loads session `id` and attempts a move on the fresh snapshot.
    ///
    /// # Errors
    ///
    /// As [`SessionManager::load_session`] and [`MoveApplier::attempt_move`].
    #[instrument(skip(self))]
    pub async fn submit_move(
        &self,
        id: &str,
        user_id: &str,
        descriptor: &MoveDescriptor,
    ) -> Result<MoveAttempt, SessionError> {
        let session = self.load_session(id).await?;
        self.moves.attempt_move(&session, user_id, descriptor).await
    }

    /// Builds the share link for `id`.
    pub fn link_for(&self, id: &str) -> SessionLink {
        SessionLink::new(self.share_base_url.clone(), id)
    }
}

/// Generates a collision-resistant session id.
fn new_session_id() -> String {
    format!("game_{}", Uuid::new_v4().simple())
}
