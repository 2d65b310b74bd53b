//! Feature index mapping for the 768-input network.

use chess::{Color, Piece, Square};

/// Feature index of a piece for one perspective.
///
/// Layout: `color * 384 + piece * 64 + square`, where the Black
/// perspective flips the square vertically (`sq ^ 56`) and swaps the piece
/// color, so each side always sees its own pieces in the first half.
#[inline]
pub fn feature_index(sq: Square, piece: Piece, color: Color, perspective: Color) -> usize {
    let (color, sq_index) = match perspective {
        Color::White => (color, sq.to_index()),
        Color::Black => (!color, sq.to_index() ^ 56),
    };
    color.to_index() * 384 + piece.to_index() * 64 + sq_index
}
