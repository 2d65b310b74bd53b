//! Negamax alpha-beta search with quiescence, PVS, LMR and forward
//! pruning, plus the aspiration-window driver above the root.

use chess::{Board, ChessMove, Color, MoveGen};

use crate::board::{is_capture, is_pawn_move};
use crate::eval;
use crate::eval::pst::mg_value;
use crate::search::Engine;
use crate::search::control::Clock;
use crate::search::tt::{Bound, TtEntry};

/// Base score for checkmate; mate-in-N scores count down from here.
pub const MATE_SCORE: i32 = 20_000;

/// Width of the mate band: anything within 300 of `MATE_SCORE` is a
/// forced mate some plies away.
const MATE_BAND: i32 = 300;

/// Reverse futility margin per ply of depth.
const RFP_MARGIN: i32 = 150;

/// Razoring margin per ply of depth.
const RAZOR_MARGIN: i32 = 240;

/// Forward futility margins for depths 1 and 2.
const FUTILITY_MARGINS: [i32; 2] = [250, 450];

/// Margin added to the victim's value in quiescence delta pruning.
const DELTA_MARGIN: i32 = 500;

/// Initial half-width of the aspiration window.
const ASPIRATION_WINDOW: i32 = 40;

/// Widening attempts before falling back to a full-width search.
const MAX_ASPIRATION_RESEARCHES: i32 = 2;

/// Whether a score encodes a forced mate for either side.
pub fn is_mate_score(score: i32) -> bool {
    score > MATE_SCORE - MATE_BAND || score < -MATE_SCORE + MATE_BAND
}

/// Step a mate score one ply further from the mate.
fn correct_mate_score(score: i32) -> i32 {
    if score >= 0 { score - 1 } else { score + 1 }
}

/// Score for the side to move when it has no legal reply.
fn mated_score(board: &Board, color: i32) -> i32 {
    if board.side_to_move() == Color::White {
        -color * MATE_SCORE
    } else {
        color * MATE_SCORE
    }
}

/// Per-node parameters threaded through the recursion.
#[derive(Clone, Copy)]
pub(super) struct NodeParams {
    /// Remaining depth in plies.
    pub depth: i32,
    /// +1 when White is to move at this node, -1 otherwise.
    pub color: i32,
    /// Distance from the root.
    pub ply: usize,
    /// Whether this node is on the principal variation.
    pub in_pv: bool,
    /// Check extensions granted on this path so far (capped at 4).
    pub num_ext: i32,
    /// Halfmove clock of this node's position.
    pub halfmove: u32,
}

impl Engine {
    /// Full-width alpha-beta with transposition cutoffs, reverse futility
    /// pruning, razoring, check extension, PVS and late-move reductions.
    ///
    /// Returns the score from the perspective of the side to move.
    pub(super) fn negamax(
        &mut self,
        board: &Board,
        mut alpha: i32,
        beta: i32,
        params: NodeParams,
    ) -> i32 {
        let NodeParams {
            mut depth,
            color,
            ply,
            in_pv,
            mut num_ext,
            halfmove,
        } = params;

        self.nodes += 1;

        let in_check = board.checkers().popcnt() > 0;
        let moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
        if moves.is_empty() {
            return if in_check {
                mated_score(board, color)
            } else {
                0
            };
        }

        if self.repetition.count(board.get_hash()) >= 3 {
            return 0;
        }
        if halfmove >= 100 {
            return 0;
        }

        let hash = board.get_hash();
        let tt_hit = self.tt.probe(hash);
        if let Some(entry) = tt_hit
            && entry.depth >= depth
        {
            let cutoff = match entry.bound {
                Bound::Exact => true,
                Bound::Lower => entry.score >= beta,
                Bound::Upper => entry.score <= alpha,
            };
            if cutoff {
                return entry.score;
            }
        }

        if depth == 0 {
            return self.quiescence(board, 3, color, alpha, beta);
        }

        // Static eval gates the whole-node pruning below; it is skipped in
        // PV nodes, in check, and in NNUE mode (too slow for every node).
        let mut static_eval = None;
        if !in_check && !in_pv && self.nnue.is_none() {
            let eval = color * eval::evaluate(board);
            static_eval = Some(eval);

            // Reverse futility: already so far above beta that quiet play
            // keeps the cutoff.
            if eval >= beta + RFP_MARGIN * depth {
                return eval;
            }

            // Razoring: hopelessly below alpha near the horizon, so check
            // whether tactics can save the position at all.
            if depth <= 3 && eval + RAZOR_MARGIN * depth < alpha {
                let q_score = self.quiescence(board, 3, color, alpha, beta);
                if q_score < alpha {
                    return q_score;
                }
            }
        }

        let tt_is_capture = tt_hit.is_some_and(|entry| is_capture(board, entry.best_move));

        if in_check && num_ext < 4 {
            depth += 1;
            num_ext += 1;
        }

        let original_alpha = alpha;
        let mut max_val = -MATE_SCORE;
        let mut best_move: Option<ChessMove> = None;
        let moves = self.order_moves(board, moves, ply);
        let side = board.side_to_move().to_index();

        for (move_index, &mv) in moves.iter().enumerate() {
            let capture = is_capture(board, mv);
            let promotion = mv.get_promotion().is_some();
            let killer = self.killers.is_killer(ply, mv);
            let from = mv.get_source().to_index();
            let to = mv.get_dest().to_index();
            let history = self.history.get(side, from, to);

            // Forward futility: a quiet move near the horizon cannot lift
            // a bad static eval back above alpha.
            if depth <= 2
                && !in_check
                && !in_pv
                && !capture
                && !promotion
                && self.nnue.is_none()
                && !is_mate_score(alpha)
                && !is_mate_score(beta)
                && let Some(eval) = static_eval
                && eval + FUTILITY_MARGINS[(depth - 1) as usize] < alpha
            {
                continue;
            }

            // Late move pruning: very late quiets at shallow depth.
            if depth <= 4
                && !in_check
                && !in_pv
                && !capture
                && !promotion
                && move_index as i32 > 8 + 2 * depth * depth
            {
                continue;
            }

            let child = board.make_move_new(mv);
            let child_halfmove = if capture || is_pawn_move(board, mv) {
                0
            } else {
                halfmove + 1
            };
            self.repetition.push(child.get_hash());

            let value = if move_index == 0 || depth < 3 {
                // First child inherits the PV; all siblings leave it.
                -self.negamax(
                    &child,
                    -beta,
                    -alpha,
                    NodeParams {
                        depth: depth - 1,
                        color: -color,
                        ply: ply + 1,
                        in_pv: move_index == 0 && in_pv,
                        num_ext,
                        halfmove: child_halfmove,
                    },
                )
            } else {
                let mut reduction = self.lmr.reduction(depth, move_index);
                if in_pv {
                    reduction -= 1;
                }
                if capture || promotion {
                    reduction -= 1;
                } else {
                    reduction -= (history / 400).clamp(-2, 2);
                }
                if killer {
                    reduction -= 1;
                }
                if tt_is_capture {
                    reduction += 1;
                }
                let reduction = reduction.min(depth - 1).max(1);

                let null_params = NodeParams {
                    depth: depth - reduction,
                    color: -color,
                    ply: ply + 1,
                    in_pv: false,
                    num_ext,
                    halfmove: child_halfmove,
                };
                let mut value = -self.negamax(&child, -alpha - 1, -alpha, null_params);
                if value > alpha && value < beta {
                    value = -self.negamax(
                        &child,
                        -beta,
                        -alpha,
                        NodeParams {
                            depth: depth - 1,
                            ..null_params
                        },
                    );
                }
                value
            };

            self.repetition.pop(child.get_hash());

            if value > max_val || (best_move.is_none() && value == max_val) {
                max_val = value;
                best_move = Some(mv);
            }
            alpha = alpha.max(value);

            if alpha >= beta {
                if !capture && !promotion {
                    let d = depth as f32;
                    let bonus = ((1.56 * d * d + 0.91 * d + 0.62) as i32) * 2;
                    self.history.update(side, from, to, bonus);

                    // Quiet moves tried before the cutoff were wasted work.
                    for &earlier in &moves[..move_index] {
                        if is_capture(board, earlier) {
                            continue;
                        }
                        self.history.update(
                            side,
                            earlier.get_source().to_index(),
                            earlier.get_dest().to_index(),
                            -bonus,
                        );
                    }

                    self.killers.store(ply, mv);
                }
                break;
            }
        }

        if is_mate_score(max_val) {
            max_val = correct_mate_score(max_val);
        }

        let bound = if max_val <= original_alpha {
            Bound::Upper
        } else if max_val >= beta {
            Bound::Lower
        } else {
            Bound::Exact
        };
        self.store_tt(hash, tt_hit, best_move, max_val, depth, bound);

        max_val
    }

    /// Root search: like [`Self::negamax`] but collecting the best move,
    /// polling the clock between moves, and using a wider full-window set
    /// (the first nine moves plus all tactical moves).
    pub(super) fn negamax_root(
        &mut self,
        board: &Board,
        depth: i32,
        mut alpha: i32,
        beta: i32,
        halfmove: u32,
        clock: &Clock,
    ) -> (Option<ChessMove>, i32) {
        let color = if board.side_to_move() == Color::White {
            1
        } else {
            -1
        };

        let original_alpha = alpha;
        let mut max_val = -MATE_SCORE;
        let mut best_move: Option<ChessMove> = None;

        let hash = board.get_hash();
        let tt_hit = self.tt.probe(hash);
        let moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
        let moves = self.order_moves(board, moves, 0);

        for (move_index, &mv) in moves.iter().enumerate() {
            // Abandon the iteration on timeout; depth 1 always finishes so
            // a best move exists.
            if clock.expired() && depth > 1 {
                break;
            }

            let capture = is_capture(board, mv);
            let promotion = mv.get_promotion().is_some();

            let child = board.make_move_new(mv);
            let child_halfmove = if capture || is_pawn_move(board, mv) {
                0
            } else {
                halfmove + 1
            };
            self.repetition.push(child.get_hash());

            let value = if move_index <= 8 || capture || promotion {
                -self.negamax(
                    &child,
                    -beta,
                    -alpha,
                    NodeParams {
                        depth: depth - 1,
                        color: -color,
                        ply: 1,
                        in_pv: move_index == 0,
                        num_ext: 0,
                        halfmove: child_halfmove,
                    },
                )
            } else {
                let reduction = (self.lmr.reduction(depth, move_index) - 1)
                    .min(depth - 1)
                    .max(1);
                let null_params = NodeParams {
                    depth: depth - reduction,
                    color: -color,
                    ply: 1,
                    in_pv: false,
                    num_ext: 0,
                    halfmove: child_halfmove,
                };
                let mut value = -self.negamax(&child, -alpha - 1, -alpha, null_params);
                if value > alpha {
                    value = -self.negamax(
                        &child,
                        -beta,
                        -alpha,
                        NodeParams {
                            depth: depth - 1,
                            ..null_params
                        },
                    );
                }
                value
            };

            self.repetition.pop(child.get_hash());
            alpha = alpha.max(value);

            if value > max_val || (best_move.is_none() && value == max_val) {
                max_val = value;
                best_move = Some(mv);
            }

            if alpha >= beta {
                break;
            }
        }

        if is_mate_score(max_val) {
            max_val = correct_mate_score(max_val);
        }

        if best_move.is_some() {
            let bound = if max_val <= original_alpha {
                Bound::Upper
            } else if max_val >= beta {
                Bound::Lower
            } else {
                Bound::Exact
            };
            self.store_tt(hash, tt_hit, best_move, max_val, depth, bound);
        }

        (best_move, max_val)
    }

    /// Quiescence search: stand pat on the static eval, then resolve
    /// captures and promotions until the position is quiet.
    pub(super) fn quiescence(
        &mut self,
        board: &Board,
        depth: i32,
        color: i32,
        mut alpha: i32,
        beta: i32,
    ) -> i32 {
        self.nodes += 1;

        let moves: Vec<ChessMove> = MoveGen::new_legal(board).collect();
        if moves.is_empty() {
            return if board.checkers().popcnt() > 0 {
                mated_score(board, color)
            } else {
                0
            };
        }

        if self.repetition.count(board.get_hash()) >= 3 {
            return 0;
        }

        let stand_pat = match self.nnue.as_mut() {
            Some(nnue) => nnue.evaluate(board),
            None => color * eval::evaluate(board),
        };
        if stand_pat >= beta {
            return beta;
        }
        alpha = alpha.max(stand_pat);

        let moves = self.order_moves(board, moves, 0);
        let mut max_val = stand_pat;

        for mv in moves {
            let capture = is_capture(board, mv);
            let promotion = mv.get_promotion().is_some();
            if !capture && !promotion {
                continue;
            }

            // Delta pruning: even winning this victim plus a margin would
            // leave us below alpha.
            if !promotion {
                let victim = board.piece_on(mv.get_dest()).map_or(0, mg_value);
                if stand_pat + DELTA_MARGIN + victim < alpha {
                    continue;
                }
            }

            let child = board.make_move_new(mv);
            self.repetition.push(child.get_hash());
            let score = -self.quiescence(&child, depth - 1, -color, -beta, -alpha);
            self.repetition.pop(child.get_hash());

            if score >= beta {
                return beta;
            }
            alpha = alpha.max(score);
            max_val = max_val.max(score);
        }

        if is_mate_score(max_val) {
            max_val = correct_mate_score(max_val);
        }
        max_val
    }

    /// Aspiration driver: search a narrow window around the previous
    /// score, widening the failing side a bounded number of times before
    /// giving up and searching the full window.
    pub(super) fn aspiration_search(
        &mut self,
        board: &Board,
        depth: i32,
        last_score: i32,
        halfmove: u32,
        clock: &Clock,
    ) -> (Option<ChessMove>, i32) {
        let mut alpha = last_score - ASPIRATION_WINDOW;
        let mut beta = last_score + ASPIRATION_WINDOW;
        let mut result = (None, 0);

        for attempt in 0..MAX_ASPIRATION_RESEARCHES {
            result = self.negamax_root(board, depth, alpha, beta, halfmove, clock);
            let score = result.1;
            if score <= alpha {
                alpha -= ASPIRATION_WINDOW * (attempt + 2);
            } else if score >= beta {
                beta += ASPIRATION_WINDOW * (attempt + 2);
            } else {
                return result;
            }
            if clock.expired() {
                return result;
            }
        }

        self.negamax_root(board, depth, -MATE_SCORE, MATE_SCORE, halfmove, clock)
    }

    /// Apply the TT replacement policy: write when the slot is empty, the
    /// new search is at least as deep, or an exact bound replaces an
    /// inexact one. Only positions with a best move are stored.
    fn store_tt(
        &mut self,
        hash: u64,
        existing: Option<TtEntry>,
        best_move: Option<ChessMove>,
        score: i32,
        depth: i32,
        bound: Bound,
    ) {
        let Some(best_move) = best_move else {
            return;
        };
        let replace = match existing {
            None => true,
            Some(old) => old.depth <= depth || (bound == Bound::Exact && old.bound != Bound::Exact),
        };
        if replace {
            self.tt.store(
                hash,
                TtEntry {
                    best_move,
                    score,
                    depth,
                    bound,
                },
            );
        }
    }

    /// Order legal moves, consulting the TT for the hash move.
    fn order_moves(&mut self, board: &Board, moves: Vec<ChessMove>, ply: usize) -> Vec<ChessMove> {
        let tt_move = self.tt.probe(board.get_hash()).map(|entry| entry.best_move);
        crate::search::ordering::order_moves(
            board,
            moves,
            ply,
            tt_move,
            &self.history,
            &self.killers,
        )
    }
}
