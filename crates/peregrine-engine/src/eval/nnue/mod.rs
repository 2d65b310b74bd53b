//! NNUE evaluation: a 768 -> 128x2 -> 1 perspective network with clipped
//! ReLU activations, quantized to `i16` throughout.
//!
//! The weights live in an external binary blob. Accumulators are updated
//! incrementally as moves are applied during command parsing; the search
//! refreshes from scratch at every leaf, so both paths must agree.

mod accumulator;
mod features;
mod network;

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use chess::{Board, ChessMove, Color, Piece, Square};

use self::accumulator::Accumulator;
use self::features::feature_index;
use self::network::Network;

/// Default location of the weight blob.
pub const NNUE_PATH: &str = "./nnue-weights.bin";

/// Failure to bring up the network from its weight file.
#[derive(Debug, thiserror::Error)]
pub enum NnueError {
    /// The weight file could not be opened.
    #[error("cannot open NNUE weight file {path}: {source}")]
    Open {
        /// Path that was tried.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The weight file ended early or could not be read.
    #[error("cannot read NNUE weights: {0}")]
    Read(#[from] std::io::Error),
}

/// Loaded network plus the two perspective accumulators.
#[derive(Debug)]
pub struct Nnue {
    net: Network,
    white: Accumulator,
    black: Accumulator,
}

impl Nnue {
    /// Load weights from `path` and start from an empty-board accumulator.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, NnueError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| NnueError::Open {
            path: path.display().to_string(),
            source,
        })?;
        let net = Network::from_reader(BufReader::new(file))?;
        Ok(Self::from_network(net))
    }

    fn from_network(net: Network) -> Self {
        let white = Accumulator::from_biases(&net);
        let black = Accumulator::from_biases(&net);
        Self { net, white, black }
    }

    /// Rebuild both accumulators from the board.
    pub fn set_position(&mut self, board: &Board) {
        self.white = Accumulator::refresh(board, Color::White, &self.net);
        self.black = Accumulator::refresh(board, Color::Black, &self.net);
    }

    /// Update both accumulators for a move about to be played on `board`.
    ///
    /// Handles promotions, ordinary and en-passant captures, and moves the
    /// rook's feature pair on castling, so the incremental state always
    /// equals a full refresh of the resulting position.
    pub fn apply_move(&mut self, board: &Board, mv: ChessMove) {
        let from = mv.get_source();
        let to = mv.get_dest();
        let (Some(piece), Some(color)) = (board.piece_on(from), board.color_on(from)) else {
            return;
        };

        self.sub(from, piece, color);
        self.add(to, mv.get_promotion().unwrap_or(piece), color);

        if let Some(victim) = board.piece_on(to) {
            self.sub(to, victim, !color);
        } else if piece == Piece::Pawn && from.get_file() != to.get_file() {
            // En passant: the captured pawn sits behind the destination.
            let victim_index = match color {
                Color::White => to.to_index() - 8,
                Color::Black => to.to_index() + 8,
            };
            self.sub(chess::ALL_SQUARES[victim_index], Piece::Pawn, !color);
        } else if piece == Piece::King && king_travel(from, to) == 2 {
            let (rook_from, rook_to) = rook_castle_squares(to);
            self.sub(rook_from, Piece::Rook, color);
            self.add(rook_to, Piece::Rook, color);
        }
    }

    /// Refresh from `board` and evaluate for its side to move, in
    /// centipawns (positive is good for the side to move).
    pub fn evaluate(&mut self, board: &Board) -> i32 {
        self.set_position(board);
        self.forward_for(board.side_to_move())
    }

    /// Forward pass over the current accumulator state.
    pub fn forward_for(&self, side_to_move: Color) -> i32 {
        match side_to_move {
            Color::White => self.net.forward(&self.white, &self.black),
            Color::Black => self.net.forward(&self.black, &self.white),
        }
    }

    fn add(&mut self, sq: Square, piece: Piece, color: Color) {
        self.white
            .add_feature(feature_index(sq, piece, color, Color::White), &self.net);
        self.black
            .add_feature(feature_index(sq, piece, color, Color::Black), &self.net);
    }

    fn sub(&mut self, sq: Square, piece: Piece, color: Color) {
        self.white
            .sub_feature(feature_index(sq, piece, color, Color::White), &self.net);
        self.black
            .sub_feature(feature_index(sq, piece, color, Color::Black), &self.net);
    }
}

fn king_travel(from: Square, to: Square) -> i32 {
    (from.get_file().to_index() as i32 - to.get_file().to_index() as i32).abs()
}

fn rook_castle_squares(king_to: Square) -> (Square, Square) {
    match king_to {
        Square::G1 => (Square::H1, Square::F1),
        Square::C1 => (Square::A1, Square::D1),
        Square::G8 => (Square::H8, Square::F8),
        _ => (Square::A8, Square::D8),
    }
}
