//! Search: iterative deepening over an aspiration-windowed negamax, with
//! all mutable search state owned by a single [`Engine`] value.

pub mod control;
pub mod heuristics;
pub mod negamax;
pub mod ordering;
pub mod repetition;
pub mod tt;

use std::time::Duration;

use chess::{Board, ChessMove, MoveGen};
use tracing::warn;

use crate::eval;
use crate::eval::nnue::{NNUE_PATH, Nnue, NnueError};
use control::Clock;
use heuristics::{HistoryTable, KillerTable, LmrTable};
use negamax::is_mate_score;
use repetition::RepetitionTable;
use tt::TranspositionTable;

/// Iterative deepening stops at this depth even with time to spare.
pub const MAX_DEPTH: u8 = 20;

/// Transposition table size when none is configured.
pub const DEFAULT_TT_MB: usize = 64;

/// A root position ready to be searched: the board plus the halfmove
/// clock the primitives library does not carry.
#[derive(Clone, Copy)]
pub struct RootPosition {
    /// Position to search.
    pub board: Board,
    /// Fifty-move-rule counter at the root.
    pub halfmove_clock: u32,
}

/// How long and how deep to search.
#[derive(Debug, Clone, Copy)]
pub struct SearchLimits {
    /// Wall-clock budget; `None` searches to the depth limit.
    pub budget: Option<Duration>,
    /// Depth ceiling, clamped to [`MAX_DEPTH`].
    pub depth: u8,
}

impl SearchLimits {
    /// Search until the clock runs out (or [`MAX_DEPTH`] is reached).
    pub fn timed(budget: Duration) -> Self {
        Self {
            budget: Some(budget),
            depth: MAX_DEPTH,
        }
    }

    /// Search to a fixed depth with no clock.
    pub fn fixed_depth(depth: u8) -> Self {
        Self {
            budget: None,
            depth: depth.min(MAX_DEPTH),
        }
    }
}

/// Result of a completed search.
#[derive(Debug, Clone)]
pub struct SearchReport {
    /// Best move from the deepest completed iteration; `None` only when
    /// the root has no legal moves.
    pub best_move: Option<ChessMove>,
    /// Score of the best move, from the side to move's perspective.
    pub score: i32,
    /// Deepest fully completed iteration.
    pub depth: u8,
    /// Nodes visited across all iterations.
    pub nodes: u64,
}

/// The search engine: transposition table, ordering heuristics, NNUE
/// state and counters, owned together and passed through the recursion.
///
/// The table and history persist across searches and are cleared on a new
/// game; the repetition table and accumulator are rebuilt per root.
pub struct Engine {
    pub(crate) tt: TranspositionTable,
    pub(crate) history: HistoryTable,
    pub(crate) killers: KillerTable,
    pub(crate) repetition: RepetitionTable,
    pub(crate) lmr: LmrTable,
    pub(crate) nnue: Option<Nnue>,
    pub(crate) nodes: u64,
}

impl Engine {
    /// Engine with the default transposition table size.
    pub fn new() -> Self {
        Self::with_tt_mb(DEFAULT_TT_MB)
    }

    /// Engine with a transposition table of `mb` megabytes.
    pub fn with_tt_mb(mb: usize) -> Self {
        Self {
            tt: TranspositionTable::new(mb),
            history: HistoryTable::new(),
            killers: KillerTable::new(),
            repetition: RepetitionTable::new(),
            lmr: LmrTable::new(),
            nnue: None,
            nodes: 0,
        }
    }

    /// Resize the transposition table.
    pub fn set_tt_size_mb(&mut self, mb: usize) {
        self.tt.set_size_mb(mb);
    }

    /// Reset state that should not leak between games.
    pub fn new_game(&mut self) {
        self.tt.clear();
        self.history.clear();
    }

    /// Load the NNUE weights and switch evaluation to the network.
    pub fn enable_nnue(&mut self) -> Result<(), NnueError> {
        if self.nnue.is_none() {
            self.nnue = Some(Nnue::load(NNUE_PATH)?);
        }
        Ok(())
    }

    /// Switch evaluation back to the hand-crafted evaluator.
    pub fn disable_nnue(&mut self) {
        self.nnue = None;
    }

    /// Whether NNUE evaluation is active.
    pub fn nnue_enabled(&self) -> bool {
        self.nnue.is_some()
    }

    /// Install a new root: apply `moves` to `start`, rebuilding the
    /// repetition table, the halfmove clock and the NNUE accumulator as
    /// each move is played. Illegal moves end the list with a warning.
    pub fn set_position(
        &mut self,
        start: &Board,
        start_halfmove: u32,
        moves: &[ChessMove],
    ) -> RootPosition {
        self.repetition.clear();
        if let Some(nnue) = self.nnue.as_mut() {
            nnue.set_position(start);
        }

        let mut board = *start;
        let mut halfmove = start_halfmove;
        for &mv in moves {
            if !MoveGen::new_legal(&board).any(|legal| legal == mv) {
                warn!(mv = %mv, "ignoring illegal move in position command");
                break;
            }
            halfmove = if crate::board::is_capture(&board, mv) || crate::board::is_pawn_move(&board, mv)
            {
                0
            } else {
                halfmove + 1
            };
            if let Some(nnue) = self.nnue.as_mut() {
                nnue.apply_move(&board, mv);
            }
            board = board.make_move_new(mv);
            self.repetition.push(board.get_hash());
        }

        RootPosition {
            board,
            halfmove_clock: halfmove,
        }
    }

    /// Iterative deepening from depth 1 to the limit.
    ///
    /// Each iteration runs an aspiration search seeded with the previous
    /// score and then reports through `on_iter(depth, score, nodes,
    /// elapsed, pv)`, letting the caller emit UCI `info` lines. Stops
    /// early on timeout or once a mate score is proven.
    pub fn search<F>(&mut self, root: &RootPosition, limits: SearchLimits, mut on_iter: F) -> SearchReport
    where
        F: FnMut(u8, i32, u64, Duration, &[ChessMove]),
    {
        self.nodes = 0;
        self.killers.reset();
        let clock = Clock::start(limits.budget);
        let max_depth = limits.depth.min(MAX_DEPTH).max(1);

        let mut last_score = eval::evaluate(&root.board);
        let mut best_move = None;
        let mut best_score = last_score;
        let mut completed_depth = 0u8;

        for depth in 1..=max_depth {
            let (mv, score) = self.aspiration_search(
                &root.board,
                depth as i32,
                last_score,
                root.halfmove_clock,
                &clock,
            );
            last_score = score;

            match mv {
                Some(mv) => {
                    best_move = Some(mv);
                    best_score = score;
                    completed_depth = depth;
                }
                // Timed out before the first root move finished.
                None => break,
            }

            let pv = self.principal_variation(&root.board, depth);
            on_iter(depth, score, self.nodes, clock.elapsed(), &pv);

            if clock.expired() || is_mate_score(score) {
                break;
            }
        }

        SearchReport {
            best_move,
            score: best_score,
            depth: completed_depth,
            nodes: self.nodes,
        }
    }

    /// Recover the principal variation by walking transposition-table
    /// best moves from the root, stopping at the first miss or move that
    /// is no longer legal.
    fn principal_variation(&mut self, board: &Board, depth: u8) -> Vec<ChessMove> {
        let mut pv = Vec::with_capacity(depth as usize);
        let mut board = *board;
        for _ in 0..depth {
            let Some(entry) = self.tt.probe(board.get_hash()) else {
                break;
            };
            let mv = entry.best_move;
            if !MoveGen::new_legal(&board).any(|legal| legal == mv) {
                break;
            }
            pv.push(mv);
            board = board.make_move_new(mv);
        }
        pv
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("tt", &self.tt)
            .field("nnue", &self.nnue_enabled())
            .field("nodes", &self.nodes)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn search_depth(engine: &mut Engine, root: &RootPosition, depth: u8) -> SearchReport {
        engine.search(root, SearchLimits::fixed_depth(depth), |_, _, _, _, _| {})
    }

    fn root_from(fen: &str) -> RootPosition {
        RootPosition {
            board: Board::from_str(fen).unwrap(),
            halfmove_clock: 0,
        }
    }

    #[test]
    fn depth_1_returns_a_legal_move() {
        let mut engine = Engine::with_tt_mb(1);
        let root = RootPosition {
            board: Board::default(),
            halfmove_clock: 0,
        };
        let report = search_depth(&mut engine, &root, 1);
        let best = report.best_move.expect("startpos has moves");
        assert!(MoveGen::new_legal(&root.board).any(|mv| mv == best));
        assert!(report.nodes > 0);
    }

    #[test]
    fn finds_mate_in_one_for_black() {
        // Back-rank mate: Black to move plays Re8-e1.
        let mut engine = Engine::with_tt_mb(1);
        let root = root_from("4r2k/8/8/8/8/8/5PPP/6K1 b - - 0 1");
        let report = search_depth(&mut engine, &root, 2);
        assert_eq!(report.best_move.unwrap().to_string(), "e8e1");
        assert!(
            report.score >= negamax::MATE_SCORE - 2,
            "expected a mate score, got {}",
            report.score
        );
    }

    #[test]
    fn finds_scholars_mate() {
        let mut engine = Engine::with_tt_mb(1);
        let root =
            root_from("r1bqkb1r/pppp1ppp/2n2n2/4p2Q/2B1P3/8/PPPP1PPP/RNB1K1NR w KQkq - 4 4");
        let report = search_depth(&mut engine, &root, 2);
        assert_eq!(report.best_move.unwrap().to_string(), "h5f7");
        assert!(report.score >= negamax::MATE_SCORE - 2);
    }

    #[test]
    fn stalemate_root_returns_no_move() {
        let mut engine = Engine::with_tt_mb(1);
        let root = root_from("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1");
        let report = search_depth(&mut engine, &root, 1);
        assert!(report.best_move.is_none());
        assert_eq!(report.depth, 0);
    }

    #[test]
    fn stalemate_node_scores_zero() {
        let mut engine = Engine::with_tt_mb(1);
        let board = Board::from_str("k7/2K5/1Q6/8/8/8/8/8 b - - 0 1").unwrap();
        let score = engine.negamax(
            &board,
            -negamax::MATE_SCORE,
            negamax::MATE_SCORE,
            negamax::NodeParams {
                depth: 1,
                color: -1,
                ply: 1,
                in_pv: false,
                num_ext: 0,
                halfmove: 0,
            },
        );
        assert_eq!(score, 0);
    }

    #[test]
    fn bare_kings_score_zero_at_any_depth() {
        let mut engine = Engine::with_tt_mb(1);
        let root = root_from("8/8/8/3k4/8/3K4/8/8 w - - 0 1");
        for depth in [1, 3, 5] {
            let report = search_depth(&mut engine, &root, depth);
            assert_eq!(report.score, 0, "KvK should stay 0 at depth {depth}");
        }
    }

    #[test]
    fn threefold_repetition_scores_zero() {
        // Three knight-shuffle cycles put the resulting position on its
        // third occurrence; both searches must call it a draw immediately,
        // material notwithstanding.
        let mut engine = Engine::with_tt_mb(1);
        let shuffle = [
            "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6", "f3g1", "f6g8", "g1f3", "g8f6",
            "f3g1", "f6g8",
        ];
        let moves: Vec<ChessMove> = shuffle
            .iter()
            .map(|s| ChessMove::from_str(s).unwrap())
            .collect();
        let root = engine.set_position(&Board::default(), 0, &moves);
        assert_eq!(engine.repetition.count(root.board.get_hash()), 3);

        let params = negamax::NodeParams {
            depth: 3,
            color: 1,
            ply: 1,
            in_pv: false,
            num_ext: 0,
            halfmove: 0,
        };
        let score = engine.negamax(
            &root.board,
            -negamax::MATE_SCORE,
            negamax::MATE_SCORE,
            params,
        );
        assert_eq!(score, 0);

        let q_score = engine.quiescence(&root.board, 3, 1, -negamax::MATE_SCORE, negamax::MATE_SCORE);
        assert_eq!(q_score, 0);
    }

    #[test]
    fn fifty_move_rule_scores_zero() {
        let mut engine = Engine::with_tt_mb(1);
        // Plenty of material, but the clock is already expired.
        let mut root = root_from("4k3/8/8/8/8/8/4R3/4K3 w - - 0 1");
        root.halfmove_clock = 100;
        let report = search_depth(&mut engine, &root, 3);
        assert_eq!(report.score, 0);
    }

    #[test]
    fn mate_score_stops_deepening_early() {
        let mut engine = Engine::with_tt_mb(1);
        let root = root_from("4r2k/8/8/8/8/8/5PPP/6K1 b - - 0 1");
        let mut deepest = 0;
        engine.search(&root, SearchLimits::fixed_depth(10), |depth, _, _, _, _| {
            deepest = depth;
        });
        assert!(deepest < 10, "search should stop once mate is proven");
    }

    #[test]
    fn iteration_callback_fires_in_order() {
        let mut engine = Engine::with_tt_mb(1);
        let root = RootPosition {
            board: Board::default(),
            halfmove_clock: 0,
        };
        let mut depths = Vec::new();
        engine.search(&root, SearchLimits::fixed_depth(3), |depth, _, _, _, _| {
            depths.push(depth);
        });
        assert_eq!(depths, vec![1, 2, 3]);
    }

    #[test]
    fn pv_starts_with_the_best_move() {
        let mut engine = Engine::with_tt_mb(1);
        let root = RootPosition {
            board: Board::default(),
            halfmove_clock: 0,
        };
        let mut last_pv = Vec::new();
        let report = engine.search(&root, SearchLimits::fixed_depth(4), |_, _, _, _, pv| {
            last_pv = pv.to_vec();
        });
        assert!(!last_pv.is_empty());
        assert_eq!(last_pv[0], report.best_move.unwrap());
    }

    #[test]
    fn expired_clock_still_returns_a_move() {
        let mut engine = Engine::with_tt_mb(1);
        let root = RootPosition {
            board: Board::default(),
            halfmove_clock: 0,
        };
        let report = engine.search(
            &root,
            SearchLimits::timed(Duration::ZERO),
            |_, _, _, _, _| {},
        );
        // Depth 1 ignores the clock, so a move always comes back.
        assert!(report.best_move.is_some());
        assert_eq!(report.depth, 1);
    }

    #[test]
    fn aspiration_agrees_with_full_window() {
        let fen = "r1bqkbnr/pppp1ppp/2n5/1B2p3/4P3/5N2/PPPP1PPP/RNBQK2R b KQkq - 3 3";
        let depth = 4;

        let mut full = Engine::with_tt_mb(1);
        let root = root_from(fen);
        let clock = Clock::start(None);
        let (full_move, full_score) =
            full.negamax_root(&root.board, depth, -negamax::MATE_SCORE, negamax::MATE_SCORE, 0, &clock);

        let mut aspirated = Engine::with_tt_mb(1);
        let (asp_move, _) =
            aspirated.aspiration_search(&root.board, depth, full_score, 0, &clock);
        assert_eq!(asp_move, full_move);
    }

    #[test]
    fn set_position_tracks_halfmove_clock() {
        let mut engine = Engine::with_tt_mb(1);
        let moves: Vec<ChessMove> = ["g1f3", "g8f6", "f3g1"]
            .iter()
            .map(|s| ChessMove::from_str(s).unwrap())
            .collect();
        let root = engine.set_position(&Board::default(), 0, &moves);
        assert_eq!(root.halfmove_clock, 3);

        // A pawn move resets the count.
        let moves: Vec<ChessMove> = ["g1f3", "e7e5"]
            .iter()
            .map(|s| ChessMove::from_str(s).unwrap())
            .collect();
        let root = engine.set_position(&Board::default(), 40, &moves);
        assert_eq!(root.halfmove_clock, 0);
    }

    #[test]
    fn set_position_stops_at_illegal_moves() {
        let mut engine = Engine::with_tt_mb(1);
        let moves: Vec<ChessMove> = ["e2e4", "e2e4"]
            .iter()
            .map(|s| ChessMove::from_str(s).unwrap())
            .collect();
        let root = engine.set_position(&Board::default(), 0, &moves);
        // Only the first move applied.
        assert_eq!(root.board.side_to_move(), chess::Color::Black);
    }

    #[test]
    fn warm_tt_keeps_returning_legal_moves() {
        let mut engine = Engine::with_tt_mb(1);
        let root = RootPosition {
            board: Board::default(),
            halfmove_clock: 0,
        };
        let first = search_depth(&mut engine, &root, 3);
        let second = search_depth(&mut engine, &root, 3);
        for report in [first, second] {
            let best = report.best_move.unwrap();
            assert!(MoveGen::new_legal(&root.board).any(|mv| mv == best));
        }
    }

    #[test]
    fn new_game_clears_learned_state() {
        let mut engine = Engine::with_tt_mb(1);
        let root = RootPosition {
            board: Board::default(),
            halfmove_clock: 0,
        };
        search_depth(&mut engine, &root, 3);
        assert!(!engine.tt.is_empty());
        engine.new_game();
        assert!(engine.tt.is_empty());
    }
}
