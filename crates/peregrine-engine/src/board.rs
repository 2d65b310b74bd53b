//! Board queries built on top of the chess primitives crate.

use chess::{Board, ChessMove, Color, Piece, Square};

/// Whether a move captures something, asked of the position *before* the
/// move is made.
///
/// Covers en passant: a pawn moving diagonally always captures, even when
/// the destination square itself is empty.
pub fn is_capture(board: &Board, mv: ChessMove) -> bool {
    board.piece_on(mv.get_dest()).is_some()
        || (board.piece_on(mv.get_source()) == Some(Piece::Pawn)
            && mv.get_source().get_file() != mv.get_dest().get_file())
}

/// Whether the moving piece is a pawn.
pub fn is_pawn_move(board: &Board, mv: ChessMove) -> bool {
    board.piece_on(mv.get_source()) == Some(Piece::Pawn)
}

/// Whether `sq` is attacked by any piece of `attacker`.
///
/// Composed from the primitive attack lookups: a piece of kind `k` on `sq`
/// would reach exactly the squares from which an enemy `k` attacks `sq`
/// (with the pawn case using the defender's pawn-attack pattern).
pub fn attacked_by(board: &Board, attacker: Color, sq: Square) -> bool {
    let occupied = *board.combined();
    let theirs = *board.color_combined(attacker);

    let rooks_queens = (*board.pieces(Piece::Rook) | *board.pieces(Piece::Queen)) & theirs;
    if (chess::get_rook_moves(sq, occupied) & rooks_queens) != chess::EMPTY {
        return true;
    }

    let bishops_queens = (*board.pieces(Piece::Bishop) | *board.pieces(Piece::Queen)) & theirs;
    if (chess::get_bishop_moves(sq, occupied) & bishops_queens) != chess::EMPTY {
        return true;
    }

    if (chess::get_knight_moves(sq) & *board.pieces(Piece::Knight) & theirs) != chess::EMPTY {
        return true;
    }

    if (chess::get_king_moves(sq) & *board.pieces(Piece::King) & theirs) != chess::EMPTY {
        return true;
    }

    let their_pawns = *board.pieces(Piece::Pawn) & theirs;
    (chess::get_pawn_attacks(sq, !attacker, their_pawns)) != chess::EMPTY
}
