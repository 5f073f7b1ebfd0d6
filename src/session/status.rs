//! Human-readable game status derived from a position.

use derive_getters::Getters;
use strictly_chess_rules::{RulesEngine, RulesError, Side, TerminalCondition};
use tracing::instrument;

/// Status line and turn indicator for a position.
#[derive(Debug, Clone, PartialEq, Eq, Getters)]
pub struct StatusReport {
    /// Text shown to players.
    message: String,
    /// Side to move in the position.
    turn: Side,
    /// Terminal condition, if the game is over.
    terminal: Option<TerminalCondition>,
}

impl StatusReport {
    /// Returns true once the position is terminal.
    pub fn is_game_over(&self) -> bool {
        self.terminal.is_some()
    }
}

impl std::fmt::Display for StatusReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

/// Derives the status of `position`.
///
/// `history` is only used to detect threefold repetition; with an empty
/// history only conditions visible in the position itself are reported.
/// Calling this repeatedly on the same input always yields the same report.
///
/// # Errors
///
/// Returns [`RulesError`] if the position or history does not parse.
#[instrument(skip(rules, history), fields(plies = history.len()))]
pub fn derive_status(
    rules: &dyn RulesEngine,
    position: &str,
    history: &[String],
) -> Result<StatusReport, RulesError> {
    let turn = rules.side_to_move(position)?;
    let terminal = rules.terminal_condition(position, history)?;

    let message = match terminal {
        Some(TerminalCondition::Checkmate { winner }) => format!("Checkmate! {} wins!", winner),
        Some(TerminalCondition::Stalemate) => "Game ended in a stalemate".to_string(),
        Some(TerminalCondition::ThreefoldRepetition) => {
            "Game ended by threefold repetition".to_string()
        }
        Some(TerminalCondition::InsufficientMaterial) => {
            "Game ended due to insufficient material".to_string()
        }
        Some(TerminalCondition::FiftyMoveRule) => "Game ended in a draw".to_string(),
        None => format!("{}'s turn", turn),
    };

    Ok(StatusReport {
        message,
        turn,
        terminal,
    })
}
