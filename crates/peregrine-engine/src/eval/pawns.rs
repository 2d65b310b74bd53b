//! Pawn-structure bitmasks: doubled, isolated and passed pawn detection,
//! plus open-file queries for rook placement.

use chess::{Board, Color, Piece, Square};

const FILE_A: u64 = 0x0101_0101_0101_0101;

/// Squares on the pawn's own file, excluding the pawn itself. Any own pawn
/// inside this mask means the pawn is doubled.
pub fn doubled_mask(sq: Square) -> u64 {
    let index = sq.to_index();
    (FILE_A << (index % 8)) ^ (1u64 << index)
}

/// Squares on the files adjacent to the pawn's file. No own pawn inside
/// this mask means the pawn is isolated.
pub fn isolated_mask(sq: Square) -> u64 {
    match sq.to_index() % 8 {
        0 => FILE_A << 1,
        7 => FILE_A << 6,
        file => (FILE_A << (file + 1)) | (FILE_A << (file - 1)),
    }
}

/// Squares strictly ahead of the pawn (from `color`'s point of view) on its
/// own and adjacent files. No enemy pawn inside this mask means the pawn
/// is passed.
pub fn passed_mask(sq: Square, color: Color) -> u64 {
    let index = sq.to_index();
    let rank = index / 8;
    let ahead = match color {
        Color::White => (!0u64).checked_shl(8 * (rank as u32 + 1)).unwrap_or(0),
        Color::Black => (!0u64).checked_shr(8 * (8 - rank as u32)).unwrap_or(0),
    };
    let file = index % 8;
    let file_mask = FILE_A << file;
    let left = FILE_A << file.saturating_sub(1);
    let right = FILE_A << (file + 1).min(7);
    ahead & (file_mask | left | right)
}

/// Pawns of `color` as a raw bitboard.
pub fn pawns_of(board: &Board, color: Color) -> u64 {
    (*board.pieces(Piece::Pawn) & *board.color_combined(color)).0
}

/// A file with no pawns of either side.
pub fn is_open_file(board: &Board, file: usize) -> bool {
    let file_mask = FILE_A << file;
    file_mask & board.pieces(Piece::Pawn).0 == 0
}

/// A file with no pawns of `color` (enemy pawns may remain).
pub fn is_semi_open_file(board: &Board, color: Color, file: usize) -> bool {
    let file_mask = FILE_A << file;
    file_mask & pawns_of(board, color) == 0
}
