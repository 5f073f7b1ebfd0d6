//! Standard chess rules backed by `shakmaty`.

use std::collections::HashMap;

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::uci::UciMove;
use shakmaty::{CastlingMode, Chess, Color, EnPassantMode, Move, Position, Role, Square};
use tracing::{debug, instrument, trace};

use crate::{
    MoveDescriptor, MoveVerdict, Promotion, RulesEngine, RulesError, RulesErrorKind, Side,
};

/// Positions are FEN strings; notation is SAN.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardChess;

impl StandardChess {
    /// Creates the standard chess rules engine.
    pub fn new() -> Self {
        Self
    }

    #[track_caller]
    fn load(position: &str) -> Result<Chess, RulesError> {
        let fen: Fen = position
            .parse()
            .map_err(|e| invalid_position(position, &e))?;
        fen.into_position::<Chess>(CastlingMode::Standard)
            .map_err(|e| invalid_position(position, &e))
    }

    fn to_fen(pos: &Chess) -> String {
        Fen::from_position(pos.clone(), EnPassantMode::Legal).to_string()
    }

    /// Finds the legal move matching a descriptor, if any.
    fn find_move(pos: &Chess, descriptor: &MoveDescriptor) -> Option<Move> {
        let from: Square = descriptor.from().parse().ok()?;
        let to: Square = descriptor.to().parse().ok()?;
        let requested = to_role(descriptor.promotion().unwrap_or(Promotion::Queen));

        pos.legal_moves().into_iter().find(|m| {
            match m.to_uci(CastlingMode::Standard) {
                UciMove::Normal {
                    from: f,
                    to: t,
                    promotion,
                } => f == from && t == to && promotion.is_none_or(|role| role == requested),
                _ => false,
            }
        })
    }

    /// Repetition identity of a position: placement, side, castling, en passant.
    fn repetition_key(pos: &Chess) -> String {
        Self::to_fen(pos)
            .split_whitespace()
            .take(4)
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn replay_positions(history: &[String]) -> Result<Vec<Chess>, RulesError> {
        let mut pos = Chess::default();
        let mut seen = Vec::with_capacity(history.len() + 1);
        seen.push(pos.clone());

        for (ply, notation) in history.iter().enumerate() {
            let invalid = || {
                RulesError::new(RulesErrorKind::InvalidHistory {
                    ply,
                    notation: notation.clone(),
                })
            };
            let san: SanPlus = notation.parse().map_err(|_| invalid())?;
            let m = san.san.to_move(&pos).map_err(|_| invalid())?;
            pos.play_unchecked(&m);
            seen.push(pos.clone());
        }

        Ok(seen)
    }
}

#[track_caller]
fn invalid_position(position: &str, err: &dyn std::fmt::Display) -> RulesError {
    RulesError::new(RulesErrorKind::InvalidPosition(format!("{}: {}", position, err)))
}

fn to_role(promotion: Promotion) -> Role {
    match promotion {
        Promotion::Queen => Role::Queen,
        Promotion::Rook => Role::Rook,
        Promotion::Bishop => Role::Bishop,
        Promotion::Knight => Role::Knight,
    }
}

fn to_side(color: Color) -> Side {
    match color {
        Color::White => Side::White,
        Color::Black => Side::Black,
    }
}

impl RulesEngine for StandardChess {
    fn initial_position(&self) -> String {
        Self::to_fen(&Chess::default())
    }

    #[instrument(skip(self))]
    fn parse_position(&self, position: &str) -> Result<(), RulesError> {
        Self::load(position).map(|_| ())
    }

    fn side_to_move(&self, position: &str) -> Result<Side, RulesError> {
        Ok(to_side(Self::load(position)?.turn()))
    }

    #[instrument(skip(self), fields(descriptor = %descriptor))]
    fn validate_and_apply(
        &self,
        position: &str,
        descriptor: &MoveDescriptor,
    ) -> Result<MoveVerdict, RulesError> {
        let pos = Self::load(position)?;

        let Some(m) = Self::find_move(&pos, descriptor) else {
            debug!("No legal move matches descriptor");
            return Ok(MoveVerdict::Rejected);
        };

        let mut next = pos;
        let notation = SanPlus::from_move_and_play_unchecked(&mut next, &m).to_string();
        let position = Self::to_fen(&next);

        debug!(notation = %notation, position = %position, "Move applied");
        Ok(MoveVerdict::Accepted { position, notation })
    }

    fn is_checkmate(&self, position: &str) -> Result<bool, RulesError> {
        Ok(Self::load(position)?.is_checkmate())
    }

    fn is_stalemate(&self, position: &str) -> Result<bool, RulesError> {
        Ok(Self::load(position)?.is_stalemate())
    }

    fn is_insufficient_material(&self, position: &str) -> Result<bool, RulesError> {
        Ok(Self::load(position)?.is_insufficient_material())
    }

    fn is_draw(&self, position: &str) -> Result<bool, RulesError> {
        let pos = Self::load(position)?;
        Ok(pos.is_stalemate() || pos.is_insufficient_material() || pos.halfmoves() >= 100)
    }

    #[instrument(skip(self, history), fields(plies = history.len()))]
    fn is_threefold_repetition(&self, history: &[String]) -> Result<bool, RulesError> {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for pos in Self::replay_positions(history)? {
            let count = counts.entry(Self::repetition_key(&pos)).or_default();
            *count += 1;
            if *count >= 3 {
                trace!("Position repeated three times");
                return Ok(true);
            }
        }
        Ok(false)
    }

    #[instrument(skip(self, history), fields(plies = history.len()))]
    fn replay(&self, history: &[String]) -> Result<String, RulesError> {
        let positions = Self::replay_positions(history)?;
        let last = positions.last().cloned().unwrap_or_default();
        Ok(Self::to_fen(&last))
    }
}
