//! Synchronous UCI engine loop.
//!
//! Commands are read and handled one at a time; a `go` blocks the loop
//! until the search returns. stdout carries only protocol output.

use std::io::{self, BufRead, Write};
use std::time::Duration;

use tracing::{debug, info, warn};

use chess::{Board, ChessMove, Color, MoveGen};
use peregrine_engine::{Engine, RootPosition, SearchLimits, time};

use crate::command::{Command, GoParams, parse_command};
use crate::error::UciError;

/// Search depth used when `go` names no limit at all.
const DEFAULT_GO_DEPTH: u8 = 5;

/// Safety margin subtracted from every clock-derived budget.
const MOVE_OVERHEAD: Duration = Duration::from_millis(10);

/// The UCI engine: the search engine plus the current root position.
pub struct UciEngine {
    engine: Engine,
    root: RootPosition,
}

impl UciEngine {
    /// Engine at the starting position with default settings.
    pub fn new() -> Self {
        Self {
            engine: Engine::new(),
            root: RootPosition {
                board: Board::default(),
                halfmove_clock: 0,
            },
        }
    }

    /// Run the command loop until `quit` or end of input.
    pub fn run(mut self) -> Result<(), UciError> {
        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            debug!(cmd = %trimmed, "received UCI command");

            match parse_command(trimmed) {
                Ok(Command::Quit) => break,
                Ok(command) => self.handle(command)?,
                // Malformed input never terminates the loop.
                Err(err) => warn!(error = %err, "ignoring unparseable command"),
            }
            io::stdout().flush()?;
        }

        info!("peregrine shutting down");
        Ok(())
    }

    fn handle(&mut self, command: Command) -> Result<(), UciError> {
        match command {
            Command::Uci => {
                println!("id name Peregrine");
                println!("id author the peregrine authors");
                println!("option name Use NNUE type check default false");
                println!("option name Hash type spin default 64 min 1 max 1024");
                println!("uciok");
            }
            Command::IsReady => println!("readyok"),
            Command::UciNewGame => {
                self.engine.new_game();
                self.root = self.engine.set_position(&Board::default(), 0, &[]);
            }
            Command::Position {
                start,
                halfmove_clock,
                moves,
            } => {
                self.root = self.engine.set_position(&start, halfmove_clock, &moves);
            }
            Command::Go(params) => self.handle_go(params),
            Command::SetOption { name, value } => self.handle_setoption(&name, &value)?,
            Command::Unknown(_) | Command::Quit => {}
        }
        Ok(())
    }

    fn handle_setoption(&mut self, name: &str, value: &str) -> Result<(), UciError> {
        match name {
            "Use NNUE" => {
                if value == "true" {
                    // A missing or short weight file is fatal here.
                    self.engine.enable_nnue()?;
                    info!("NNUE evaluation enabled");
                } else {
                    self.engine.disable_nnue();
                }
            }
            "Hash" => match value.parse::<usize>() {
                Ok(mb) => self.engine.set_tt_size_mb(mb.clamp(1, 1024)),
                Err(_) => warn!(value, "ignoring invalid Hash value"),
            },
            _ => warn!(option = name, "ignoring unknown option"),
        }
        Ok(())
    }

    fn handle_go(&mut self, params: GoParams) {
        let legal: Vec<ChessMove> = MoveGen::new_legal(&self.root.board).collect();

        // A forced move needs no search, and a terminal position has no
        // answer beyond the null move.
        match legal.as_slice() {
            [] => {
                println!("bestmove 0000");
                return;
            }
            [only] => {
                println!("bestmove {only}");
                return;
            }
            _ => {}
        }

        let limits = self.limits_from(&params);
        let report = self
            .engine
            .search(&self.root, limits, |depth, score, nodes, elapsed, pv| {
                let millis = elapsed.as_millis().max(1);
                let nps = u128::from(nodes) * 1000 / millis;
                let pv_line = pv
                    .iter()
                    .map(ChessMove::to_string)
                    .collect::<Vec<_>>()
                    .join(" ");
                println!(
                    "info depth {depth} nodes {nodes} nps {nps} score cp {score} time {millis} pv {pv_line}"
                );
            });

        match report.best_move {
            Some(mv) => println!("bestmove {mv}"),
            None => println!("bestmove 0000"),
        }
    }

    /// Map `go` parameters to search limits, preferring an explicit
    /// movetime, then the side-to-move's clock, then a fixed depth.
    fn limits_from(&self, params: &GoParams) -> SearchLimits {
        if let Some(ms) = params.movetime {
            return SearchLimits::timed(
                Duration::from_millis(ms).saturating_sub(MOVE_OVERHEAD),
            );
        }

        let (remaining, increment) = match self.root.board.side_to_move() {
            Color::White => (params.wtime, params.winc),
            Color::Black => (params.btime, params.binc),
        };
        if let Some(remaining) = remaining {
            let budget = time::think_time(remaining, increment.unwrap_or(0));
            return SearchLimits::timed(budget.saturating_sub(MOVE_OVERHEAD));
        }

        SearchLimits::fixed_depth(params.depth.unwrap_or(DEFAULT_GO_DEPTH))
    }
}

impl Default for UciEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn engine_with_position(command: &str) -> UciEngine {
        let mut engine = UciEngine::new();
        let parsed = parse_command(command).unwrap();
        engine.handle(parsed).unwrap();
        engine
    }

    #[test]
    fn position_startpos_with_moves_updates_the_board() {
        let engine = engine_with_position("position startpos moves e2e4");
        let board = engine.root.board;
        assert_eq!(board.side_to_move(), Color::Black);
        assert_eq!(board.piece_on(chess::Square::E4), Some(chess::Piece::Pawn));
        assert_eq!(board.color_on(chess::Square::E4), Some(Color::White));
        assert!(board.piece_on(chess::Square::E2).is_none());
        // A pawn just moved, so the halfmove clock is zero.
        assert_eq!(engine.root.halfmove_clock, 0);
    }

    #[test]
    fn position_fen_sets_halfmove_clock() {
        let engine =
            engine_with_position("position fen 4k3/8/8/8/8/8/4R3/4K3 w - - 12 40 moves e2e7");
        // A quiet rook move extends the clock.
        assert_eq!(engine.root.halfmove_clock, 13);
    }

    #[test]
    fn ucinewgame_resets_the_board() {
        let mut engine = engine_with_position("position startpos moves e2e4 e7e5");
        engine.handle(parse_command("ucinewgame").unwrap()).unwrap();
        assert!(engine.root.board == Board::default());
    }

    #[test]
    fn movetime_is_preferred_and_shaved() {
        let engine = UciEngine::new();
        let limits = engine.limits_from(&GoParams {
            movetime: Some(1000),
            ..GoParams::default()
        });
        assert_eq!(limits.budget, Some(Duration::from_millis(990)));
    }

    #[test]
    fn clock_budget_follows_the_side_to_move() {
        let engine = engine_with_position("position startpos moves e2e4");
        // Black to move: btime applies.
        let limits = engine.limits_from(&GoParams {
            wtime: Some(1_000_000),
            btime: Some(55_000),
            ..GoParams::default()
        });
        // 55000/55 = 1000ms, minus the 10ms overhead.
        assert_eq!(limits.budget, Some(Duration::from_millis(990)));
    }

    #[test]
    fn bare_go_defaults_to_a_fixed_depth() {
        let engine = UciEngine::new();
        let limits = engine.limits_from(&GoParams::default());
        assert_eq!(limits.budget, None);
        assert_eq!(limits.depth, DEFAULT_GO_DEPTH);
    }

    #[test]
    fn go_depth_is_clamped_to_the_engine_maximum() {
        let engine = UciEngine::new();
        let limits = engine.limits_from(&GoParams {
            depth: Some(200),
            ..GoParams::default()
        });
        assert_eq!(limits.depth, peregrine_engine::MAX_DEPTH);
    }

    #[test]
    fn odd_setoption_commands_never_fail() {
        let mut engine = UciEngine::new();
        engine
            .handle(parse_command("setoption name Hash value 1").unwrap())
            .unwrap();
        // Unknown options and bad values are logged and ignored.
        engine
            .handle(parse_command("setoption name Threads value 8").unwrap())
            .unwrap();
        engine
            .handle(parse_command("setoption name Hash value lots").unwrap())
            .unwrap();
    }

    #[test]
    fn threefold_from_uci_moves_is_tracked() {
        let engine = engine_with_position(
            "position startpos moves g1f3 g8f6 f3g1 f6g8 g1f3 g8f6 f3g1 f6g8",
        );
        // The startpos-shaped position has now occurred twice on the line.
        let hash = engine.root.board.get_hash();
        let board = Board::from_str("rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1")
            .unwrap();
        assert_eq!(hash, board.get_hash());
    }
}
