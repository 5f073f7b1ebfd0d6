//! Session documents and the operations players perform on them.

mod lifecycle;
mod link;
mod model;
mod moves;
mod role;
mod status;

pub use lifecycle::{CreatedSession, Joined, SessionManager};
pub use link::{GAME_QUERY_PARAM, SessionLink};
pub use model::{
    FIRST_PLAYER_DEFAULT_NAME, Participant, PlayerSlot, SECOND_PLAYER_DEFAULT_NAME, Session,
    SessionId, SessionStatus, UserId,
};
pub use moves::{MoveApplier, MoveAttempt};
pub use role::Role;
pub use status::{StatusReport, derive_status};
