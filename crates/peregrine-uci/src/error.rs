//! UCI protocol errors.

use peregrine_engine::NnueError;

/// Errors that can occur during UCI protocol handling.
///
/// Parse errors are reported and swallowed by the command loop; only
/// I/O failures and a failed NNUE bring-up terminate the engine.
#[derive(Debug, thiserror::Error)]
pub enum UciError {
    /// The `position` command is missing its `startpos` or `fen` keyword.
    #[error("malformed position command: missing startpos or fen keyword")]
    MalformedPosition,

    /// Failed to parse a FEN string.
    #[error("invalid FEN: {fen}")]
    InvalidFen {
        /// The FEN string that failed to parse.
        fen: String,
    },

    /// A move string in the `position` command could not be parsed.
    #[error("invalid move: {uci_move}")]
    InvalidMove {
        /// The UCI move string that failed to parse.
        uci_move: String,
    },

    /// A numeric parameter value could not be parsed.
    #[error("invalid value for {param}: {value}")]
    InvalidValue {
        /// The parameter name (e.g. "wtime", "Hash").
        param: String,
        /// The value string that failed to parse.
        value: String,
    },

    /// The NNUE network could not be brought up when requested.
    #[error("NNUE initialisation failed: {0}")]
    Nnue(#[from] NnueError),

    /// An I/O error occurred while reading from stdin.
    #[error("I/O error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },
}
