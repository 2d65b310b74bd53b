//! Evaluation for peregrine: hand-crafted tapered eval and NNUE.

pub mod hce;
pub mod king;
pub mod nnue;
pub mod pawns;
pub mod phase;
pub mod pst;

pub use hce::evaluate;
pub use nnue::{NNUE_PATH, Nnue, NnueError};
