//! Role assignment and turn arbitration.

use serde::{Deserialize, Serialize};
use strictly_chess_rules::Side;
use tracing::{debug, instrument};

use super::Session;

/// How a user relates to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::EnumIter)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    /// The initiator, playing White.
    FirstPlayer,
    /// The first joiner, playing Black.
    SecondPlayer,
    /// Not seated while the second slot is still open.
    Unassigned,
    /// Read-only viewer of a full session.
    Observer,
}

impl Role {
    /// Side this role plays, if it plays at all.
    pub fn side(self) -> Option<Side> {
        match self {
            Role::FirstPlayer => Some(Side::White),
            Role::SecondPlayer => Some(Side::Black),
            Role::Unassigned | Role::Observer => None,
        }
    }

    /// Returns true for the two seated roles.
    pub fn is_player(self) -> bool {
        self.side().is_some()
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::FirstPlayer => write!(f, "first player (White)"),
            Role::SecondPlayer => write!(f, "second player (Black)"),
            Role::Unassigned => write!(f, "unassigned"),
            Role::Observer => write!(f, "observer"),
        }
    }
}

impl Session {
    /// Resolves the role `user_id` holds in this session.
    #[instrument(skip(self), fields(session_id = %self.id()))]
    pub fn role_of(&self, user_id: &str) -> Role {
        let role = if self.first_player().id() == user_id {
            Role::FirstPlayer
        } else {
            match self.second_player() {
                Some(second) if second.id() == user_id => Role::SecondPlayer,
                Some(_) => Role::Observer,
                None => Role::Unassigned,
            }
        };

        debug!(?role, "Resolved role");
        role
    }

    /// Checks if `user_id` may move now: their side must be the side to move.
    #[instrument(skip(self), fields(session_id = %self.id()))]
    pub fn may_move(&self, user_id: &str) -> bool {
        let role = self.role_of(user_id);
        let allowed = role.side() == Some(*self.turn());

        debug!(?role, turn = ?self.turn(), allowed, "Checked move permission");
        allowed
    }
}
