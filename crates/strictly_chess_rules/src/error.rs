//! Rules engine error types.

use derive_more::{Display, Error};
use tracing::instrument;

/// What went wrong inside the rules engine.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum RulesErrorKind {
    /// Position text could not be parsed or describes an impossible board.
    #[display("Invalid position '{}'", _0)]
    InvalidPosition(String),

    /// A square coordinate outside `a1`..`h8`.
    #[display("Invalid square '{}'", _0)]
    InvalidSquare(String),

    /// A move descriptor that is not coordinate notation.
    #[display("Invalid move descriptor '{}'", _0)]
    InvalidDescriptor(String),

    /// A history entry that does not replay from the preceding position.
    #[display("Move {} ('{}') does not replay", ply, notation)]
    InvalidHistory {
        /// Zero-based index of the offending entry.
        ply: usize,
        /// The offending notation.
        notation: String,
    },
}

/// Rules engine error with location tracking.
#[derive(Debug, Clone, Display, Error)]
#[display("Rules error: {} at {}:{}", kind, file, line)]
pub struct RulesError {
    /// Error classification.
    pub kind: RulesErrorKind,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl RulesError {
    /// Creates a new rules error with caller location tracking.
    #[track_caller]
    #[instrument]
    pub fn new(kind: RulesErrorKind) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            kind,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
