//! Chess rules for strictly_chess sessions.
//!
//! The session engine never inspects a board directly. It hands positions
//! (FEN text) and move descriptors to a [`RulesEngine`] and gets back a
//! verdict, standard notation, and terminal-condition answers.
//!
//! # Example
//!
//! ```
//! use strictly_chess_rules::{MoveDescriptor, MoveVerdict, RulesEngine, StandardChess};
//!
//! let rules = StandardChess::new();
//! let start = rules.initial_position();
//! let descriptor: MoveDescriptor = "e2e4".parse().unwrap();
//!
//! match rules.validate_and_apply(&start, &descriptor).unwrap() {
//!     MoveVerdict::Accepted { notation, .. } => assert_eq!(notation, "e4"),
//!     MoveVerdict::Rejected => unreachable!(),
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod engine;
mod error;
mod standard;
mod types;

pub use engine::RulesEngine;
pub use error::{RulesError, RulesErrorKind};
pub use standard::StandardChess;
pub use types::{MoveDescriptor, MoveVerdict, Promotion, Side, TerminalCondition};
