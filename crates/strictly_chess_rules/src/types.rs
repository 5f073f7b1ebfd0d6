//! Core domain types shared between the rules engine and its callers.

use std::str::FromStr;

use derive_getters::Getters;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::{RulesError, RulesErrorKind};

/// A side of the board.
///
/// Serialized as the single-letter tags used in FEN (`"w"` / `"b"`).
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    strum::EnumIter,
)]
pub enum Side {
    /// White (moves first).
    #[serde(rename = "w")]
    #[display("White")]
    White,
    /// Black (moves second).
    #[serde(rename = "b")]
    #[display("Black")]
    Black,
}

impl Side {
    /// Returns the opposing side.
    pub fn opponent(self) -> Self {
        match self {
            Side::White => Side::Black,
            Side::Black => Side::White,
        }
    }

    /// Returns the side to move after `plies` half-moves from the initial position.
    pub fn after_plies(plies: usize) -> Self {
        if plies % 2 == 0 {
            Side::White
        } else {
            Side::Black
        }
    }
}

/// Piece a pawn may promote to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(rename_all = "lowercase")]
pub enum Promotion {
    /// Promote to a queen.
    #[display("q")]
    Queen,
    /// Promote to a rook.
    #[display("r")]
    Rook,
    /// Promote to a bishop.
    #[display("b")]
    Bishop,
    /// Promote to a knight.
    #[display("n")]
    Knight,
}

impl Promotion {
    /// Parses a promotion from its lowercase piece letter.
    #[instrument]
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'q' => Some(Promotion::Queen),
            'r' => Some(Promotion::Rook),
            'b' => Some(Promotion::Bishop),
            'n' => Some(Promotion::Knight),
            _ => None,
        }
    }
}

/// A request to move a piece, as emitted by a UI surface.
///
/// Squares are algebraic coordinates (`"e2"`). The promotion choice only
/// matters when the move is a pawn promotion; it defaults to a queen there.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Getters)]
pub struct MoveDescriptor {
    /// Origin square.
    from: String,
    /// Destination square.
    to: String,
    /// Optional promotion choice.
    promotion: Option<Promotion>,
}

impl MoveDescriptor {
    /// Creates a descriptor from two algebraic squares.
    ///
    /// # Errors
    ///
    /// Returns [`RulesError`] if either square is not a valid coordinate.
    #[instrument]
    pub fn new(from: &str, to: &str, promotion: Option<Promotion>) -> Result<Self, RulesError> {
        Ok(Self {
            from: parse_square(from)?,
            to: parse_square(to)?,
            promotion,
        })
    }
}

impl FromStr for MoveDescriptor {
    type Err = RulesError;

    /// Parses coordinate notation such as `e2e4` or `e7e8q`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if !(s.len() == 4 || s.len() == 5) || !s.is_ascii() {
            return Err(RulesError::new(RulesErrorKind::InvalidDescriptor(s.to_string())));
        }

        let promotion = match s.chars().nth(4) {
            Some(c) => Some(Promotion::from_char(c).ok_or_else(|| {
                RulesError::new(RulesErrorKind::InvalidDescriptor(s.to_string()))
            })?),
            None => None,
        };

        Self::new(&s[0..2], &s[2..4], promotion)
    }
}

impl std::fmt::Display for MoveDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", self.from, self.to)?;
        if let Some(promotion) = self.promotion {
            write!(f, "{}", promotion)?;
        }
        Ok(())
    }
}

#[track_caller]
fn parse_square(square: &str) -> Result<String, RulesError> {
    let square = square.trim().to_ascii_lowercase();
    let bytes = square.as_bytes();
    let valid = bytes.len() == 2
        && (b'a'..=b'h').contains(&bytes[0])
        && (b'1'..=b'8').contains(&bytes[1]);

    if valid {
        Ok(square)
    } else {
        Err(RulesError::new(RulesErrorKind::InvalidSquare(square)))
    }
}

/// Result of submitting a move descriptor against a position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MoveVerdict {
    /// The move is legal.
    Accepted {
        /// Canonical text of the resulting position.
        position: String,
        /// Standard short notation of the applied move.
        notation: String,
    },
    /// The move is not legal in the position.
    Rejected,
}

impl MoveVerdict {
    /// Returns true if the move was accepted.
    pub fn is_accepted(&self) -> bool {
        matches!(self, MoveVerdict::Accepted { .. })
    }
}

/// A condition that ends the game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TerminalCondition {
    /// The side to move is checkmated.
    Checkmate {
        /// The side that delivered mate.
        winner: Side,
    },
    /// The side to move has no legal moves and is not in check.
    Stalemate,
    /// The same position occurred three times.
    ThreefoldRepetition,
    /// Neither side can deliver mate.
    InsufficientMaterial,
    /// Fifty moves by each side without a capture or pawn move.
    FiftyMoveRule,
}

impl TerminalCondition {
    /// Returns true for every drawn outcome.
    pub fn is_draw(&self) -> bool {
        !matches!(self, TerminalCondition::Checkmate { .. })
    }

    /// Returns the winner, if the game was decided.
    pub fn winner(&self) -> Option<Side> {
        match self {
            TerminalCondition::Checkmate { winner } => Some(*winner),
            _ => None,
        }
    }
}
