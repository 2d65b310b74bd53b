//! Move ordering: hash move first, then captures by victim value with a
//! defended-square discount, then quiets by history and killer status.

use std::cmp::Reverse;

use chess::{Board, ChessMove};

use crate::board::{attacked_by, is_capture};
use crate::eval::pst::mg_value;
use crate::search::heuristics::{HistoryTable, KillerTable};

/// Score guaranteeing the hash move is searched first.
const TT_MOVE_SCORE: i32 = 10_000;

/// Ordering bonus for the primary killer at a ply.
const KILLER_PRIMARY: i32 = 150;

/// Ordering bonus for the secondary killer at a ply.
const KILLER_SECONDARY: i32 = 120;

/// Heuristic ordering score of a single move; higher is searched earlier.
pub fn score_move(
    board: &Board,
    mv: ChessMove,
    ply: usize,
    tt_move: Option<ChessMove>,
    history: &HistoryTable,
    killers: &KillerTable,
) -> i32 {
    if tt_move == Some(mv) {
        return TT_MOVE_SCORE;
    }

    let mut score = 0;
    if is_capture(board, mv) {
        if let Some(victim) = board.piece_on(mv.get_dest()) {
            score += mg_value(victim);
        }
        // Capturing a defended piece risks losing the attacker.
        if attacked_by(board, !board.side_to_move(), mv.get_dest()) {
            if let Some(attacker) = board.piece_on(mv.get_source()) {
                score -= mg_value(attacker) / 10;
            }
        }
    } else {
        let side = board.side_to_move().to_index();
        score += history.get(side, mv.get_source().to_index(), mv.get_dest().to_index()) / 10;

        if ply != 0 {
            if killers.slot(ply, 0) == Some(mv) {
                score += KILLER_PRIMARY;
            } else if killers.slot(ply, 1) == Some(mv) {
                score += KILLER_SECONDARY;
            }
        }
    }

    if let Some(promotion) = mv.get_promotion() {
        score += mg_value(promotion);
    }

    score
}

/// Sort moves in descending score order.
pub fn order_moves(
    board: &Board,
    moves: Vec<ChessMove>,
    ply: usize,
    tt_move: Option<ChessMove>,
    history: &HistoryTable,
    killers: &KillerTable,
) -> Vec<ChessMove> {
    let mut scored: Vec<(i32, ChessMove)> = moves
        .into_iter()
        .map(|mv| (score_move(board, mv, ply, tt_move, history, killers), mv))
        .collect();
    scored.sort_by_key(|&(score, _)| Reverse(score));
    scored.into_iter().map(|(_, mv)| mv).collect()
}
