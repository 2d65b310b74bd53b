//! King safety terms: zone attacks, virtual mobility and pawn tropism.

use chess::{Board, Color, Square};

use crate::board::attacked_by;

/// Penalty by number of attacked king-zone squares (0..=9, clamped by
/// construction since the zone holds at most nine squares).
const KING_ATTACK_SCORE: [i32; 10] = [0, 5, 15, 25, 40, 55, 70, 90, 100, 100];

/// The king zone: the eight neighbours plus the square two ranks ahead
/// (toward the enemy side) when it is on the board.
fn king_zone(king: Square, color: Color) -> Vec<Square> {
    let file = (king.to_index() % 8) as i32;
    let rank = (king.to_index() / 8) as i32;

    let forward = match color {
        Color::White => 2,
        Color::Black => -2,
    };
    let deltas: [(i32, i32); 9] = [
        (-1, 0),
        (0, -1),
        (-1, -1),
        (1, 0),
        (1, -1),
        (0, 1),
        (-1, 1),
        (1, 1),
        (0, forward),
    ];

    let mut zone = Vec::with_capacity(9);
    for (df, dr) in deltas {
        let f = file + df;
        let r = rank + dr;
        if (0..8).contains(&f) && (0..8).contains(&r) {
            zone.push(Square::make_square(
                chess::Rank::from_index(r as usize),
                chess::File::from_index(f as usize),
            ));
        }
    }
    zone
}

/// King-zone attack penalty for the king of `color`: count the zone
/// squares the enemy attacks and look the total up in the penalty table.
pub fn king_zone_penalty(board: &Board, color: Color, king: Square) -> i32 {
    let attacks = king_zone(king, color)
        .into_iter()
        .filter(|&sq| attacked_by(board, !color, sq))
        .count();
    KING_ATTACK_SCORE[attacks]
}

/// Virtual mobility: how many squares a queen standing on the king's
/// square would see past friendly pieces. A large number means open lines
/// toward the king.
pub fn king_virtual_mobility(board: &Board, color: Color, king: Square) -> i32 {
    let occupied = *board.combined();
    let friendly = *board.color_combined(color);
    let reach = (chess::get_bishop_moves(king, occupied) | chess::get_rook_moves(king, occupied))
        & !friendly;
    reach.popcnt() as i32
}

/// Manhattan distance between two squares.
pub fn manhattan_distance(a: Square, b: Square) -> i32 {
    let file_a = (a.to_index() % 8) as i32;
    let file_b = (b.to_index() % 8) as i32;
    let rank_a = (a.to_index() / 8) as i32;
    let rank_b = (b.to_index() / 8) as i32;
    (file_a - file_b).abs() + (rank_a - rank_b).abs()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn zone_size_in_the_middle() {
        // e4 king: eight neighbours plus e6.
        assert_eq!(king_zone(Square::E4, Color::White).len(), 9);
    }

    #[test]
    fn zone_clipped_in_the_corner() {
        // a1 king: b1, a2, b2, plus a3 two ahead.
        let zone = king_zone(Square::A1, Color::White);
        assert_eq!(zone.len(), 4);
        assert!(zone.contains(&Square::A3));
        // For Black the two-ahead square points down and falls off the board.
        let zone = king_zone(Square::A1, Color::Black);
        assert_eq!(zone.len(), 3);
    }

    #[test]
    fn forward_square_points_toward_the_enemy() {
        let white = king_zone(Square::E1, Color::White);
        assert!(white.contains(&Square::E3));
        let black = king_zone(Square::E8, Color::Black);
        assert!(black.contains(&Square::E6));
    }

    #[test]
    fn safe_king_has_no_zone_penalty() {
        let board = Board::default();
        assert_eq!(king_zone_penalty(&board, Color::White, Square::E1), 0);
    }

    #[test]
    fn queen_near_king_raises_penalty() {
        // Black queen on e3 attacks e2, d2 and f2 in the white king zone.
        let board = Board::from_str("4k3/8/8/8/8/4q3/8/4K3 w - - 0 1").unwrap();
        assert_eq!(king_zone_penalty(&board, Color::White, Square::E1), 25);
    }

    #[test]
    fn boxed_in_king_has_low_virtual_mobility() {
        let board = Board::default();
        assert_eq!(king_virtual_mobility(&board, Color::White, Square::E1), 0);
    }

    #[test]
    fn bare_king_has_high_virtual_mobility() {
        let board = Board::from_str("4k3/8/8/8/8/8/8/4K3 w - - 0 1").unwrap();
        assert!(king_virtual_mobility(&board, Color::White, Square::E1) >= 20);
    }

    #[test]
    fn manhattan_distance_examples() {
        assert_eq!(manhattan_distance(Square::A1, Square::A1), 0);
        assert_eq!(manhattan_distance(Square::A1, Square::H8), 14);
        assert_eq!(manhattan_distance(Square::E1, Square::A2), 5);
    }
}
