//! The rules engine capability consumed by the session engine.

use crate::{MoveDescriptor, MoveVerdict, RulesError, Side, TerminalCondition};

/// Move legality and terminal-condition queries over canonical position text.
///
/// Positions travel as strings so that session documents can carry them
/// without depending on the engine's internal board representation.
pub trait RulesEngine: Send + Sync + std::fmt::Debug {
    /// Returns the position every game starts from.
    fn initial_position(&self) -> String;

    /// Checks that `position` deserializes into a playable board.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if the text is not a valid position.
    fn parse_position(&self, position: &str) -> Result<(), RulesError>;

    /// Returns the side to move in `position`.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if the text is not a valid position.
    fn side_to_move(&self, position: &str) -> Result<Side, RulesError>;

    /// Validates `descriptor` against `position` and applies it if legal.
    ///
    /// An illegal move is not an error: it yields [`MoveVerdict::Rejected`].
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if `position` is not a valid position.
    fn validate_and_apply(
        &self,
        position: &str,
        descriptor: &MoveDescriptor,
    ) -> Result<MoveVerdict, RulesError>;

    /// Returns true if the side to move is checkmated.
    fn is_checkmate(&self, position: &str) -> Result<bool, RulesError>;

    /// Returns true if the side to move is stalemated.
    fn is_stalemate(&self, position: &str) -> Result<bool, RulesError>;

    /// Returns true if neither side has mating material.
    fn is_insufficient_material(&self, position: &str) -> Result<bool, RulesError>;

    /// Returns true for any draw visible in the position alone
    /// (stalemate, insufficient material, fifty-move rule).
    fn is_draw(&self, position: &str) -> Result<bool, RulesError>;

    /// Returns true if replaying `history` repeats some position three times.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if the history does not replay.
    fn is_threefold_repetition(&self, history: &[String]) -> Result<bool, RulesError>;

    /// Replays `history` from the initial position and returns the result.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] naming the first entry that does not replay.
    fn replay(&self, history: &[String]) -> Result<String, RulesError>;

    /// Classifies the terminal condition of `position`, if any.
    ///
    /// Checkmate takes precedence over draws. `history` is only consulted for
    /// repetition; pass an empty slice when it is not available.
    fn terminal_condition(
        &self,
        position: &str,
        history: &[String],
    ) -> Result<Option<TerminalCondition>, RulesError> {
        if self.is_checkmate(position)? {
            let loser = self.side_to_move(position)?;
            return Ok(Some(TerminalCondition::Checkmate {
                winner: loser.opponent(),
            }));
        }
        if self.is_stalemate(position)? {
            return Ok(Some(TerminalCondition::Stalemate));
        }
        if !history.is_empty() && self.is_threefold_repetition(history)? {
            return Ok(Some(TerminalCondition::ThreefoldRepetition));
        }
        if self.is_insufficient_material(position)? {
            return Ok(Some(TerminalCondition::InsufficientMaterial));
        }
        if self.is_draw(position)? {
            return Ok(Some(TerminalCondition::FiftyMoveRule));
        }
        Ok(None)
    }
}
