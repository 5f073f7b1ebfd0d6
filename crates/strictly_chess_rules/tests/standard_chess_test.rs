//! Tests for the standard chess rules engine.

use proptest::prelude::*;
use shakmaty::fen::Fen;
use shakmaty::{CastlingMode, Chess, Position};

use strictly_chess_rules::{
    MoveDescriptor, MoveVerdict, Promotion, RulesEngine, RulesErrorKind, Side, StandardChess,
    TerminalCondition,
};

const START: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

/// Plays coordinate moves from the initial position, returning position and history.
fn play(rules: &StandardChess, moves: &[&str]) -> (String, Vec<String>) {
    let mut position = rules.initial_position();
    let mut history = Vec::new();
    for mv in moves {
        let descriptor: MoveDescriptor = mv.parse().expect("Valid descriptor");
        match rules
            .validate_and_apply(&position, &descriptor)
            .expect("Valid position")
        {
            MoveVerdict::Accepted {
                position: next,
                notation,
            } => {
                position = next;
                history.push(notation);
            }
            MoveVerdict::Rejected => panic!("Move {} unexpectedly rejected", mv),
        }
    }
    (position, history)
}

#[test]
fn test_initial_position_is_standard_start() {
    let rules = StandardChess::new();
    assert_eq!(rules.initial_position(), START);
    assert_eq!(rules.side_to_move(START).expect("Valid"), Side::White);
}

#[test]
fn test_pawn_push_yields_san_and_flips_turn() {
    let rules = StandardChess::new();
    let (position, history) = play(&rules, &["e2e4"]);
    assert_eq!(history, ["e4"]);
    assert_eq!(rules.side_to_move(&position).expect("Valid"), Side::Black);
}

#[test]
fn test_illegal_move_rejected() {
    let rules = StandardChess::new();
    let descriptor: MoveDescriptor = "e2e5".parse().expect("Valid descriptor");
    let verdict = rules
        .validate_and_apply(START, &descriptor)
        .expect("Valid position");
    assert_eq!(verdict, MoveVerdict::Rejected);
}

#[test]
fn test_moving_opponent_piece_rejected() {
    let rules = StandardChess::new();
    let descriptor: MoveDescriptor = "e7e5".parse().expect("Valid descriptor");
    let verdict = rules
        .validate_and_apply(START, &descriptor)
        .expect("Valid position");
    assert!(!verdict.is_accepted());
}

#[test]
fn test_invalid_position_is_error() {
    let rules = StandardChess::new();
    let err = rules.parse_position("not a position").unwrap_err();
    assert!(matches!(err.kind, RulesErrorKind::InvalidPosition(_)));
}

#[test]
fn test_castling_from_king_squares() {
    let rules = StandardChess::new();
    let fen = "r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1";
    let descriptor: MoveDescriptor = "e1g1".parse().expect("Valid descriptor");
    match rules.validate_and_apply(fen, &descriptor).expect("Valid") {
        MoveVerdict::Accepted { notation, .. } => assert_eq!(notation, "O-O"),
        MoveVerdict::Rejected => panic!("Castling rejected"),
    }
}

#[test]
fn test_promotion_defaults_to_queen() {
    let rules = StandardChess::new();
    let fen = "8/P7/8/8/8/8/8/k6K w - - 0 1";

    let queen: MoveDescriptor = "a7a8".parse().expect("Valid descriptor");
    match rules.validate_and_apply(fen, &queen).expect("Valid") {
        MoveVerdict::Accepted { notation, .. } => assert!(notation.starts_with("a8=Q")),
        MoveVerdict::Rejected => panic!("Promotion rejected"),
    }

    let knight = MoveDescriptor::new("a7", "a8", Some(Promotion::Knight)).expect("Valid");
    match rules.validate_and_apply(fen, &knight).expect("Valid") {
        MoveVerdict::Accepted { notation, .. } => assert!(notation.starts_with("a8=N")),
        MoveVerdict::Rejected => panic!("Underpromotion rejected"),
    }
}

#[test]
fn test_promotion_choice_ignored_for_ordinary_moves() {
    let rules = StandardChess::new();
    let descriptor = MoveDescriptor::new("e2", "e4", Some(Promotion::Queen)).expect("Valid");
    assert!(
        rules
            .validate_and_apply(START, &descriptor)
            .expect("Valid")
            .is_accepted()
    );
}

#[test]
fn test_fools_mate_is_checkmate_for_black() {
    let rules = StandardChess::new();
    let (position, history) = play(&rules, &["f2f3", "e7e5", "g2g4", "d8h4"]);
    assert_eq!(history.last().map(String::as_str), Some("Qh4#"));
    assert!(rules.is_checkmate(&position).expect("Valid"));
    let terminal = rules
        .terminal_condition(&position, &history)
        .expect("Valid")
        .expect("Terminal");
    assert_eq!(
        terminal,
        TerminalCondition::Checkmate {
            winner: Side::Black
        }
    );
    assert_eq!(terminal.winner(), Some(Side::Black));
    assert!(!terminal.is_draw());
}

#[test]
fn test_stalemate_detected() {
    let rules = StandardChess::new();
    let fen = "7k/5Q2/6K1/8/8/8/8/8 b - - 0 1";
    assert!(rules.is_stalemate(fen).expect("Valid"));
    assert!(!rules.is_checkmate(fen).expect("Valid"));
    assert!(rules.is_draw(fen).expect("Valid"));
    let terminal = rules
        .terminal_condition(fen, &[])
        .expect("Valid")
        .expect("Terminal");
    assert_eq!(terminal, TerminalCondition::Stalemate);
    assert!(terminal.is_draw());
    assert_eq!(terminal.winner(), None);
}

#[test]
fn test_bare_kings_are_insufficient_material() {
    let rules = StandardChess::new();
    let fen = "8/8/8/4k3/8/8/8/4K3 w - - 0 1";
    assert!(rules.is_insufficient_material(fen).expect("Valid"));
    assert_eq!(
        rules.terminal_condition(fen, &[]).expect("Valid"),
        Some(TerminalCondition::InsufficientMaterial)
    );
}

#[test]
fn test_fifty_move_rule_is_draw() {
    let rules = StandardChess::new();
    let fen = "8/8/8/4k3/8/8/8/R3K3 w - - 100 80";
    assert!(rules.is_draw(fen).expect("Valid"));
    assert_eq!(
        rules.terminal_condition(fen, &[]).expect("Valid"),
        Some(TerminalCondition::FiftyMoveRule)
    );
}

#[test]
fn test_knight_shuffle_is_threefold_repetition() {
    let rules = StandardChess::new();
    let (position, history) = play(
        &rules,
        &[
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8",
        ],
    );
    assert!(rules.is_threefold_repetition(&history).expect("Replays"));
    assert!(!rules.is_threefold_repetition(&history[..4]).expect("Replays"));
    assert_eq!(
        rules.terminal_condition(&position, &history).expect("Valid"),
        Some(TerminalCondition::ThreefoldRepetition)
    );
}

#[test]
fn test_replay_reproduces_position() {
    let rules = StandardChess::new();
    let (position, history) = play(&rules, &["e2e4", "c7c5", "g1f3", "d7d6", "d2d4", "c5d4"]);
    assert_eq!(rules.replay(&history).expect("Replays"), position);
}

#[test]
fn test_replay_rejects_impossible_history() {
    let rules = StandardChess::new();
    let history = vec!["e4".to_string(), "e4".to_string()];
    let err = rules.replay(&history).unwrap_err();
    assert!(matches!(err.kind, RulesErrorKind::InvalidHistory { ply: 1, .. }));
}

#[test]
fn test_descriptor_parsing() {
    let descriptor: MoveDescriptor = "E7E8n".parse().expect("Valid descriptor");
    assert_eq!(descriptor.from(), "e7");
    assert_eq!(descriptor.to(), "e8");
    assert_eq!(*descriptor.promotion(), Some(Promotion::Knight));
    assert_eq!(descriptor.to_string(), "e7e8n");

    assert!("e9e4".parse::<MoveDescriptor>().is_err());
    assert!("e2e4x".parse::<MoveDescriptor>().is_err());
    assert!("e2".parse::<MoveDescriptor>().is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn prop_replay_matches_played_position(choices in proptest::collection::vec(any::<usize>(), 0..40)) {
        let rules = StandardChess::new();
        let mut board = Chess::default();
        let mut position = rules.initial_position();
        let mut history = Vec::new();

        for choice in choices {
            let legal = board.legal_moves();
            if legal.is_empty() {
                break;
            }
            let m = &legal[choice % legal.len()];
            let descriptor: MoveDescriptor = m
                .to_uci(CastlingMode::Standard)
                .to_string()
                .parse()
                .expect("UCI is coordinate notation");

            match rules.validate_and_apply(&position, &descriptor).expect("Valid position") {
                MoveVerdict::Accepted { position: next, notation } => {
                    position = next;
                    history.push(notation);
                }
                MoveVerdict::Rejected => panic!("Legal move {} rejected", descriptor),
            }
            board.play_unchecked(m);

            let side = rules.side_to_move(&position).expect("Valid");
            prop_assert_eq!(side, Side::after_plies(history.len()));
        }

        prop_assert_eq!(rules.replay(&history).expect("Replays"), position.clone());
        let fen: Fen = position.parse().expect("Valid FEN");
        prop_assert!(fen.into_position::<Chess>(CastlingMode::Standard).is_ok());
    }
}
