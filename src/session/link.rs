//! Shareable session links (`<base>?game=<id>`).

use derive_getters::Getters;
use tracing::{debug, instrument};

use super::SessionId;
use crate::{SessionError, SessionErrorKind};

/// Query parameter that carries the session id.
pub const GAME_QUERY_PARAM: &str = "game";

/// A link another participant can open to join a session.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct SessionLink {
    /// Page the link points at.
    base_url: String,
    /// Session the link joins.
    session_id: SessionId,
}

impl SessionLink {
    /// Creates a link to `session_id` under `base_url`.
    pub fn new(base_url: impl Into<String>, session_id: impl Into<SessionId>) -> Self {
        Self {
            base_url: base_url.into(),
            session_id: session_id.into(),
        }
    }

    /// Extracts the session id from a link or a bare session id.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError`] if the input carries no usable session id.
    #[instrument]
    pub fn resolve(input: &str) -> Result<SessionId, SessionError> {
        let input = input.trim();

        let candidate = match input.split_once('?') {
            Some((_, query)) => query
                .split('#')
                .next()
                .unwrap_or_default()
                .split('&')
                .filter_map(|pair| pair.split_once('='))
                .find(|(key, _)| *key == GAME_QUERY_PARAM)
                .map(|(_, value)| value)
                .ok_or_else(|| {
                    SessionError::new(SessionErrorKind::InvalidLink(format!(
                        "no '{}' parameter in '{}'",
                        GAME_QUERY_PARAM, input
                    )))
                })?,
            None => input,
        };

        if !is_session_id(candidate) {
            return Err(SessionError::new(SessionErrorKind::InvalidLink(format!(
                "'{}' is not a session id",
                candidate
            ))));
        }

        debug!(session_id = candidate, "Resolved session link");
        Ok(candidate.to_string())
    }
}

impl std::fmt::Display for SessionLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let separator = if self.base_url.contains('?') { '&' } else { '?' };
        write!(
            f,
            "{}{}{}={}",
            self.base_url, separator, GAME_QUERY_PARAM, self.session_id
        )
    }
}

fn is_session_id(s: &str) -> bool {
    !s.is_empty()
        && s
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}
