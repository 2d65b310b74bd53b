//! UCI command parsing.

use std::str::FromStr;

use chess::{Board, ChessMove, Piece, Square};

use crate::error::UciError;

/// Limits given with a `go` command. Absent fields were not supplied.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct GoParams {
    /// `go movetime <ms>`.
    pub movetime: Option<u64>,
    /// White's remaining clock in ms.
    pub wtime: Option<u64>,
    /// Black's remaining clock in ms.
    pub btime: Option<u64>,
    /// White's increment per move in ms.
    pub winc: Option<u64>,
    /// Black's increment per move in ms.
    pub binc: Option<u64>,
    /// `go depth <plies>`.
    pub depth: Option<u8>,
}

/// A parsed UCI command.
pub enum Command {
    /// `uci` -- identify the engine.
    Uci,
    /// `isready` -- synchronization ping.
    IsReady,
    /// `ucinewgame` -- reset game state.
    UciNewGame,
    /// `position` -- starting board, its halfmove clock, and moves to apply.
    Position {
        /// Board described by `startpos` or the FEN fields.
        start: Board,
        /// Halfmove clock from FEN field five (0 for `startpos`).
        halfmove_clock: u32,
        /// Moves to apply on top, in long algebraic notation.
        moves: Vec<ChessMove>,
    },
    /// `go` -- start searching with the given limits.
    Go(GoParams),
    /// `setoption name <name> value <value>`.
    SetOption {
        /// Option name (may contain spaces, e.g. "Use NNUE").
        name: String,
        /// Option value.
        value: String,
    },
    /// `quit` -- exit the engine.
    Quit,
    /// Unrecognized command (silently ignored per the UCI convention).
    Unknown(String),
}

/// Parse a single line of UCI input.
pub fn parse_command(line: &str) -> Result<Command, UciError> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    if tokens.is_empty() {
        return Ok(Command::Unknown(String::new()));
    }

    match tokens[0] {
        "uci" => Ok(Command::Uci),
        "isready" => Ok(Command::IsReady),
        "ucinewgame" => Ok(Command::UciNewGame),
        "quit" => Ok(Command::Quit),
        "position" => parse_position(&tokens[1..]),
        "go" => parse_go(&tokens[1..]),
        "setoption" => parse_setoption(&tokens[1..]),
        _ => Ok(Command::Unknown(tokens[0].to_string())),
    }
}

/// Parse the `position` arguments.
///
/// Supports `position startpos [moves ...]` and
/// `position fen <6 FEN fields> [moves ...]`.
fn parse_position(tokens: &[&str]) -> Result<Command, UciError> {
    if tokens.is_empty() {
        return Err(UciError::MalformedPosition);
    }

    let (start, halfmove_clock, rest) = if tokens[0] == "startpos" {
        (Board::default(), 0, &tokens[1..])
    } else if tokens[0] == "fen" {
        if tokens.len() < 7 {
            return Err(UciError::InvalidFen {
                fen: tokens[1..].join(" "),
            });
        }
        let fen = tokens[1..7].join(" ");
        let board = Board::from_str(&fen).map_err(|_| UciError::InvalidFen { fen: fen.clone() })?;
        let halfmove = tokens[5].parse::<u32>().unwrap_or(0);
        (board, halfmove, &tokens[7..])
    } else {
        return Err(UciError::MalformedPosition);
    };

    let mut moves = Vec::new();
    if !rest.is_empty() && rest[0] == "moves" {
        for token in &rest[1..] {
            moves.push(parse_uci_move(token).ok_or_else(|| UciError::InvalidMove {
                uci_move: token.to_string(),
            })?);
        }
    }

    Ok(Command::Position {
        start,
        halfmove_clock,
        moves,
    })
}

/// Parse a move in long algebraic notation (`e2e4`, `e7e8q`).
fn parse_uci_move(text: &str) -> Option<ChessMove> {
    if text.len() != 4 && text.len() != 5 {
        return None;
    }
    let source = Square::from_str(&text[0..2]).ok()?;
    let dest = Square::from_str(&text[2..4]).ok()?;
    let promotion = match text.as_bytes().get(4) {
        None => None,
        Some(b'q') => Some(Piece::Queen),
        Some(b'r') => Some(Piece::Rook),
        Some(b'b') => Some(Piece::Bishop),
        Some(b'n') => Some(Piece::Knight),
        Some(_) => return None,
    };
    Some(ChessMove::new(source, dest, promotion))
}

/// Parse the `go` arguments as keyword/value pairs.
fn parse_go(tokens: &[&str]) -> Result<Command, UciError> {
    let mut params = GoParams::default();

    let mut i = 0;
    while i < tokens.len() {
        let keyword = tokens[i];
        let parsed = match keyword {
            "movetime" | "wtime" | "btime" | "winc" | "binc" | "depth" => {
                let value = tokens.get(i + 1).ok_or_else(|| UciError::InvalidValue {
                    param: keyword.to_string(),
                    value: String::new(),
                })?;
                let number: u64 = value.parse().map_err(|_| UciError::InvalidValue {
                    param: keyword.to_string(),
                    value: value.to_string(),
                })?;
                i += 2;
                Some((keyword, number))
            }
            _ => {
                i += 1;
                None
            }
        };

        if let Some((keyword, number)) = parsed {
            match keyword {
                "movetime" => params.movetime = Some(number),
                "wtime" => params.wtime = Some(number),
                "btime" => params.btime = Some(number),
                "winc" => params.winc = Some(number),
                "binc" => params.binc = Some(number),
                "depth" => params.depth = Some(number.min(u64::from(u8::MAX)) as u8),
                _ => {}
            }
        }
    }

    Ok(Command::Go(params))
}

/// Parse `setoption name <name...> value <value...>`.
fn parse_setoption(tokens: &[&str]) -> Result<Command, UciError> {
    let name_at = tokens.iter().position(|&t| t == "name");
    let value_at = tokens.iter().position(|&t| t == "value");

    let (name, value) = match (name_at, value_at) {
        (Some(n), Some(v)) if n < v => (tokens[n + 1..v].join(" "), tokens[v + 1..].join(" ")),
        (Some(n), None) => (tokens[n + 1..].join(" "), String::new()),
        _ => (String::new(), String::new()),
    };

    Ok(Command::SetOption { name, value })
}
