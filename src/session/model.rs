//! The session document shared by both players and every observer.

use chrono::{DateTime, Utc};
use derive_getters::Getters;
use derive_new::new;
use serde::{Deserialize, Serialize};
use strictly_chess_rules::Side;
use tracing::{debug, instrument};

/// Unique identifier for a game session.
pub type SessionId = String;

/// Stable identifier issued by the identity provider.
pub type UserId = String;

/// Display name recorded for a first player who did not supply one.
pub const FIRST_PLAYER_DEFAULT_NAME: &str = "Player 1";

/// Display name recorded for a second player who did not supply one.
pub const SECOND_PLAYER_DEFAULT_NAME: &str = "Player 2";

/// An authenticated principal as handed over by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters, new)]
pub struct Participant {
    /// Opaque, stable user id.
    id: UserId,
    /// Optional human-readable name.
    display_name: Option<String>,
}

/// A filled player slot in a session document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct PlayerSlot {
    /// User id of the seated player.
    id: UserId,
    /// Name shown to the other participants.
    display_name: String,
}

impl PlayerSlot {
    /// Seats a participant, falling back to `default_name` when they have no name.
    pub fn seat(participant: &Participant, default_name: &str) -> Self {
        Self {
            id: participant.id().clone(),
            display_name: participant
                .display_name()
                .clone()
                .unwrap_or_else(|| default_name.to_string()),
        }
    }
}

/// Lifecycle status of a session.
///
/// Ordered: a session only ever moves forward through
/// `Waiting` → `Active` → `Finished`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SessionStatus {
    /// Created, second player slot still open.
    Waiting,
    /// Both players seated, game in progress.
    Active,
    /// The position is terminal.
    Finished,
}

impl SessionStatus {
    /// Returns the later of the two statuses.
    pub fn advance_to(self, next: SessionStatus) -> SessionStatus {
        self.max(next)
    }
}

/// One game, as persisted in the session store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session id, immutable.
    id: SessionId,
    /// The initiator; plays White.
    first_player: PlayerSlot,
    /// The first joiner; plays Black.
    second_player: Option<PlayerSlot>,
    /// Canonical position text (FEN).
    position: String,
    /// Side to move, mirrored from `position`.
    turn: Side,
    /// Lifecycle status.
    status: SessionStatus,
    /// Standard notation of every accepted move, oldest first.
    move_history: Vec<String>,
    /// Creation time.
    created_at: DateTime<Utc>,
    /// Time of the most recent mutation.
    last_updated: DateTime<Utc>,
    /// Write counter, bumped by the store on every committed write.
    #[serde(default)]
    revision: u64,
}

impl Session {
    /// Builds a fresh session waiting for its second player.
    #[instrument(skip(first_player, position), fields(first_player = %first_player.id))]
    pub(crate) fn open(
        id: SessionId,
        first_player: PlayerSlot,
        position: String,
        turn: Side,
        now: DateTime<Utc>,
    ) -> Self {
        debug!("Opening session document");
        Self {
            id,
            first_player,
            second_player: None,
            position,
            turn,
            status: SessionStatus::Waiting,
            move_history: Vec::new(),
            created_at: now,
            last_updated: now,
            revision: 0,
        }
    }

    /// Fills the second player slot and starts the game.
    pub(crate) fn seat_second_player(&mut self, slot: PlayerSlot, now: DateTime<Utc>) {
        self.second_player = Some(slot);
        self.status = self.status.advance_to(SessionStatus::Active);
        self.last_updated = now;
    }

    /// Records an accepted move.
    pub(crate) fn record_move(
        &mut self,
        position: String,
        notation: String,
        terminal: bool,
        now: DateTime<Utc>,
    ) {
        self.position = position;
        self.turn = self.turn.opponent();
        self.move_history.push(notation);
        if terminal {
            self.status = self.status.advance_to(SessionStatus::Finished);
        }
        self.last_updated = now;
    }

    /// Stamps the revision assigned by the store on commit.
    pub(crate) fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Returns the player seated on `side`, if any.
    pub fn player(&self, side: Side) -> Option<&PlayerSlot> {
        match side {
            Side::White => Some(&self.first_player),
            Side::Black => self.second_player.as_ref(),
        }
    }

    /// Serializes the session to its JSON document form.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if serialization fails.
    pub fn to_document(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Parses a session from its JSON document form.
    ///
    /// Only the document shape is checked here; whether `position` is a
    /// playable board is for the rules engine to decide.
    ///
    /// # Errors
    ///
    /// Returns a [`serde_json::Error`] if the document is malformed.
    pub fn from_document(document: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(document)
    }
}
