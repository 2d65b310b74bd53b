//! Perspective accumulator: the hidden layer maintained as pieces come
//! and go.

use chess::{ALL_COLORS, ALL_PIECES, Board, Color};

use super::features::feature_index;
use super::network::{HIDDEN_SIZE, Network};

/// Accumulated hidden-layer values for one perspective.
#[derive(Clone, Copy, Debug)]
pub struct Accumulator {
    pub(super) vals: [i16; HIDDEN_SIZE],
}

impl Accumulator {
    /// Accumulator of the empty board: just the biases.
    pub fn from_biases(net: &Network) -> Self {
        Self {
            vals: net.acc_biases,
        }
    }

    /// Full recompute: biases plus the weight column of every feature
    /// present on the board. The inputs are one-hot, so the matrix product
    /// collapses to summing columns of occupied features.
    pub fn refresh(board: &Board, perspective: Color, net: &Network) -> Self {
        let mut acc = Self::from_biases(net);
        for &piece in &ALL_PIECES {
            for &color in &ALL_COLORS {
                let bb = *board.pieces(piece) & *board.color_combined(color);
                for sq in bb {
                    acc.add_feature(feature_index(sq, piece, color, perspective), net);
                }
            }
        }
        acc
    }

    /// Add a feature's weight column (piece arrived on a square).
    #[inline]
    pub fn add_feature(&mut self, index: usize, net: &Network) {
        for (v, &w) in self.vals.iter_mut().zip(&net.acc_weights[index]) {
            *v += w;
        }
    }

    /// Subtract a feature's weight column (piece left a square).
    #[inline]
    pub fn sub_feature(&mut self, index: usize, net: &Network) {
        for (v, &w) in self.vals.iter_mut().zip(&net.acc_weights[index]) {
            *v -= w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eval::nnue::network::synthetic_network;
    use chess::{Piece, Square};

    #[test]
    fn add_then_sub_is_identity() {
        let net = synthetic_network();
        let mut acc = Accumulator::from_biases(&net);
        let baseline = acc.vals;

        let idx = feature_index(Square::E4, Piece::Knight, Color::White, Color::White);
        acc.add_feature(idx, &net);
        assert_ne!(acc.vals, baseline);
        acc.sub_feature(idx, &net);
        assert_eq!(acc.vals, baseline);
    }

    #[test]
    fn refresh_matches_manual_accumulation() {
        let net = synthetic_network();
        let board = Board::default();

        let refreshed = Accumulator::refresh(&board, Color::White, &net);

        let mut manual = Accumulator::from_biases(&net);
        for sq in *board.combined() {
            let piece = board.piece_on(sq).unwrap();
            let color = board.color_on(sq).unwrap();
            manual.add_feature(feature_index(sq, piece, color, Color::White), &net);
        }
        assert_eq!(refreshed.vals, manual.vals);
    }
}
