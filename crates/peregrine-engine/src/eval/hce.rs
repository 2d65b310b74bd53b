//! Hand-crafted tapered evaluation.
//!
//! Scores are centipawns from White's point of view; the search multiplies
//! by the side-to-move sign. Middlegame and endgame totals are accumulated
//! separately and blended by game phase at the end.

use chess::{Board, Color, Piece};

use crate::eval::king::{king_virtual_mobility, king_zone_penalty, manhattan_distance};
use crate::eval::pawns::{
    doubled_mask, is_open_file, is_semi_open_file, isolated_mask, passed_mask, pawns_of,
};
use crate::eval::phase::{MAX_PHASE, game_phase};
use crate::eval::pst::{eg_table, eg_value, mg_table, mg_value};

const TEMPO_BONUS: i32 = 10;

/// Material balance in classic points (pawn 1, minor 3, rook 5, queen 9),
/// White minus Black.
pub fn material_balance(board: &Board) -> i32 {
    let count = |piece: Piece, color: Color| {
        (*board.pieces(piece) & *board.color_combined(color)).popcnt() as i32
    };
    let side = |color: Color| {
        count(Piece::Pawn, color)
            + 3 * count(Piece::Knight, color)
            + 3 * count(Piece::Bishop, color)
            + 5 * count(Piece::Rook, color)
            + 9 * count(Piece::Queen, color)
    };
    side(Color::White) - side(Color::Black)
}

/// Pawnless positions within four points of material are dead draws: a
/// side with no pawns needs at least +4 to win.
pub fn is_material_draw(board: &Board) -> bool {
    if board.pieces(Piece::Pawn).popcnt() != 0 {
        return false;
    }
    let balance = material_balance(board);
    balance > -4 && balance < 4
}

/// Static evaluation in centipawns, White minus Black.
pub fn evaluate(board: &Board) -> i32 {
    if is_material_draw(board) {
        return 0;
    }

    let mut mg = 0i32;
    let mut eg = 0i32;

    let white_pawns = pawns_of(board, Color::White);
    let black_pawns = pawns_of(board, Color::Black);
    let white_king = board.king_square(Color::White);
    let black_king = board.king_square(Color::Black);

    let mut white_bishops = 0;
    let mut black_bishops = 0;
    let mut white_tropism = 0;
    let mut black_tropism = 0;
    let mut total_tropism = 0;

    for sq in *board.combined() {
        let Some(piece) = board.piece_on(sq) else {
            continue;
        };
        let Some(color) = board.color_on(sq) else {
            continue;
        };
        let index = sq.to_index();

        match color {
            Color::White => {
                let flipped = index ^ 56;
                mg += mg_value(piece) + mg_table(piece)[flipped];
                eg += eg_value(piece) + eg_table(piece)[flipped];
                if piece == Piece::Bishop {
                    white_bishops += 1;
                }
                if piece == Piece::Pawn {
                    let mut weight = 1;
                    if doubled_mask(sq) & white_pawns != 0 {
                        mg -= 10;
                        eg -= 6;
                    }
                    if isolated_mask(sq) & white_pawns == 0 {
                        mg -= 15;
                        eg -= 10;
                    }
                    if passed_mask(sq, Color::White) & black_pawns == 0 {
                        weight = 3;
                        mg += 15;
                        eg += 35;
                    }
                    total_tropism += weight;
                    white_tropism += manhattan_distance(white_king, sq) * weight;
                }
                if piece == Piece::Rook {
                    let file = index % 8;
                    if is_open_file(board, file) {
                        mg += 25;
                        eg += 10;
                    } else if is_semi_open_file(board, Color::White, file) {
                        mg += 15;
                        eg += 7;
                    }
                }
            }
            Color::Black => {
                mg -= mg_value(piece) + mg_table(piece)[index];
                eg -= eg_value(piece) + eg_table(piece)[index];
                if piece == Piece::Bishop {
                    black_bishops += 1;
                }
                if piece == Piece::Pawn {
                    let mut weight = 1;
                    if doubled_mask(sq) & black_pawns != 0 {
                        mg += 10;
                        eg += 6;
                    }
                    if isolated_mask(sq) & black_pawns == 0 {
                        mg += 15;
                        eg += 10;
                    }
                    if passed_mask(sq, Color::Black) & white_pawns == 0 {
                        weight = 3;
                        mg -= 15;
                        eg -= 35;
                    }
                    total_tropism += weight;
                    black_tropism += manhattan_distance(black_king, sq) * weight;
                }
                if piece == Piece::Rook {
                    let file = index % 8;
                    if is_open_file(board, file) {
                        mg -= 25;
                        eg -= 10;
                    } else if is_semi_open_file(board, Color::Black, file) {
                        mg -= 15;
                        eg -= 7;
                    }
                }
            }
        }
    }

    if white_bishops >= 2 {
        mg += 8;
        eg += 12;
    }
    if black_bishops >= 2 {
        mg -= 8;
        eg -= 12;
    }

    // King safety is a middlegame concern: open lines toward the king and
    // attacked squares around it.
    mg -= sqrt_penalty(king_virtual_mobility(board, Color::White, white_king));
    mg += sqrt_penalty(king_virtual_mobility(board, Color::Black, black_king));
    mg -= king_zone_penalty(board, Color::White, white_king);
    mg += king_zone_penalty(board, Color::Black, black_king);

    // King activity is an endgame concern: stay close to the pawns,
    // passed pawns weighing triple.
    if total_tropism != 0 {
        eg -= 3 * (white_tropism / total_tropism);
        eg += 3 * (black_tropism / total_tropism);
    }

    mg += if board.side_to_move() == Color::White {
        TEMPO_BONUS
    } else {
        -TEMPO_BONUS
    };

    let phase = game_phase(board);
    let blended = (mg * phase + eg * (MAX_PHASE - phase)) / MAX_PHASE;

    // Scale up as material leaves the board so endgame edges convert.
    let scale = 1.0 + 0.005 * (MAX_PHASE - phase) as f32;
    (blended as f32 * scale) as i32
}

fn sqrt_penalty(mobility: i32) -> i32 {
    ((mobility.max(2) as f64).sqrt() as i32) * 5
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    /// Flip colors and ranks of a FEN without castling rights or en
    /// passant square.
    fn mirror_fen(fen: &str) -> String {
        let mut fields: Vec<String> = fen.split_whitespace().map(str::to_string).collect();
        fields[0] = fields[0]
            .split('/')
            .rev()
            .collect::<Vec<_>>()
            .join("/")
            .chars()
            .map(|c| {
                if c.is_ascii_uppercase() {
                    c.to_ascii_lowercase()
                } else {
                    c.to_ascii_uppercase()
                }
            })
            .collect();
        fields[1] = if fields[1] == "w" { "b".into() } else { "w".into() };
        fields.join(" ")
    }

    fn eval_fen(fen: &str) -> i32 {
        evaluate(&Board::from_str(fen).unwrap())
    }

    #[test]
    fn startpos_is_exactly_the_tempo_bonus() {
        // Everything else cancels by symmetry; full phase means no scaling.
        assert_eq!(evaluate(&Board::default()), 10);
    }

    #[test]
    fn mirrored_positions_negate() {
        let fens = [
            "1k6/2q5/8/4n3/8/1P3P2/3Q4/1K6 w - - 0 1",
            "4k3/pp4pp/8/3N4/2B5/8/PP3PPP/4K3 w - - 0 1",
            "8/2k5/3p4/8/3P4/8/2K5/8 b - - 0 1",
            "r4rk1/1pp2ppp/p1np1n2/4p3/2B1P1b1/2NP1N2/PPP2PPP/R1BQ1RK1 w - - 0 1",
        ];
        for fen in fens {
            let score = eval_fen(fen);
            let mirrored = eval_fen(&mirror_fen(fen));
            assert!(
                (score + mirrored).abs() <= 1,
                "mirror asymmetry for {fen}: {score} vs {mirrored}"
            );
        }
    }

    #[test]
    fn bare_kings_draw() {
        assert_eq!(eval_fen("8/8/8/3k4/8/3K4/8/8 w - - 0 1"), 0);
    }

    #[test]
    fn pawnless_minor_up_is_a_draw() {
        // A single extra bishop cannot win without pawns.
        assert_eq!(eval_fen("8/8/8/3k4/8/3KB3/8/8 w - - 0 1"), 0);
        assert!(is_material_draw(
            &Board::from_str("8/8/8/3k4/8/3KB3/8/8 w - - 0 1").unwrap()
        ));
    }

    #[test]
    fn pawnless_queen_up_is_not_a_draw() {
        let board = Board::from_str("8/8/8/3k4/8/3KQ3/8/8 w - - 0 1").unwrap();
        assert!(!is_material_draw(&board));
        assert!(evaluate(&board) > 300);
    }

    #[test]
    fn material_balance_counts_points() {
        // White: queen (9). Black: rook + knight (8).
        let board = Board::from_str("1n2k2r/8/8/8/8/8/8/3QK3 w - - 0 1").unwrap();
        assert_eq!(material_balance(&board), 1);
    }

    #[test]
    fn lone_passed_pawn_endgame_exact_score() {
        // White Pa2/Ke1 against Ke8. Worked through the terms by hand:
        // mg = 82 - 35 (pst) - 15 (isolated) + 15 (passed) + 10 (tempo) = 57,
        // eg = 94 + 13 (pst) - 10 + 35 - 15 (tropism) = 117; the king terms
        // cancel. Phase 0 blends to 117 and the 1.12 endgame scale gives 131.
        assert_eq!(eval_fen("4k3/8/8/8/8/8/P7/4K3 w - - 0 1"), 131);
    }

    #[test]
    fn passed_pawn_outscores_blocked_pawn() {
        let passed = eval_fen("4k3/8/8/8/8/8/P7/4K3 w - - 0 1");
        // Same pawn with an enemy pawn guarding the promotion path.
        let held = eval_fen("4k3/8/1p6/8/8/8/P7/4K3 w - - 0 1");
        assert!(passed > held);
    }

    #[test]
    fn bishop_pair_bonus_counts() {
        // Symmetric minor-piece position evaluates to the blended tempo only.
        let symmetric = eval_fen("1nb1k3/4p3/8/8/8/8/4P3/1NB1K3 w - - 0 1");
        assert_eq!(symmetric, 1);

        // Swapping the white knight for a second bishop on the same square
        // adds material (+28/+16), piece-square (+18/+42) and the pair
        // bonus (+8/+12). Blended at phase 4 and scaled that is ~74; without
        // the pair term it would land near 61.
        let pair = eval_fen("1nb1k3/4p3/8/8/8/8/4P3/1BB1K3 w - - 0 1");
        assert!(
            (72..=76).contains(&(pair - symmetric)),
            "pair delta was {}",
            pair - symmetric
        );
    }

    #[test]
    fn tempo_swings_by_twenty_in_the_middlegame() {
        let white = eval_fen("r1bqkbnr/pppppppp/2n5/8/4P3/8/PPPP1PPP/RNBQKBNR w - - 0 1");
        let black = eval_fen("r1bqkbnr/pppppppp/2n5/8/4P3/8/PPPP1PPP/RNBQKBNR b - - 0 1");
        assert_eq!(white - black, 20);
    }
}
