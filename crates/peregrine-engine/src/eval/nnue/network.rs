//! Quantized network weights and the forward pass.

use std::io::Read;

use byteorder::{LittleEndian, ReadBytesExt};

use super::NnueError;
use super::accumulator::Accumulator;

/// Number of input features: 64 squares x 6 piece kinds x 2 colors.
pub const INPUT_SIZE: usize = 768;

/// Hidden-layer width per perspective.
pub const HIDDEN_SIZE: usize = 128;

/// Evaluation scale mapping network output to centipawns.
const SCALE: i32 = 400;

/// Quantization factor of the accumulator layer.
const QA: i32 = 255;

/// Quantization factor of the output layer.
const QB: i32 = 64;

/// Network weights, quantized to `i16` and immutable after loading.
///
/// Binary layout (little-endian `i16`, no header):
/// `acc_weights[768][128]` row-major, then `acc_biases[128]`,
/// `out_weights[256]`, and a single `out_bias`.
#[derive(Debug)]
pub struct Network {
    pub(super) acc_weights: Box<[[i16; HIDDEN_SIZE]; INPUT_SIZE]>,
    pub(super) acc_biases: [i16; HIDDEN_SIZE],
    out_weights: [i16; 2 * HIDDEN_SIZE],
    out_bias: i16,
}

impl Network {
    /// Read weights from a little-endian `i16` stream in file order.
    pub fn from_reader(mut reader: impl Read) -> Result<Self, NnueError> {
        let mut flat = vec![0i16; INPUT_SIZE * HIDDEN_SIZE];
        reader.read_i16_into::<LittleEndian>(&mut flat)?;

        let mut acc_weights = Box::new([[0i16; HIDDEN_SIZE]; INPUT_SIZE]);
        for (feature, row) in acc_weights.iter_mut().enumerate() {
            row.copy_from_slice(&flat[feature * HIDDEN_SIZE..(feature + 1) * HIDDEN_SIZE]);
        }

        let mut acc_biases = [0i16; HIDDEN_SIZE];
        reader.read_i16_into::<LittleEndian>(&mut acc_biases)?;

        let mut out_weights = [0i16; 2 * HIDDEN_SIZE];
        reader.read_i16_into::<LittleEndian>(&mut out_weights)?;

        let out_bias = reader.read_i16::<LittleEndian>()?;

        Ok(Self {
            acc_weights,
            acc_biases,
            out_weights,
            out_bias,
        })
    }

    /// Forward pass from the side-to-move perspective.
    ///
    /// Each hidden activation is clipped to `[0, QA]` before meeting its
    /// output weight; the side to move uses the first half of the output
    /// weights, the opponent the second.
    pub fn forward(&self, us: &Accumulator, them: &Accumulator) -> i32 {
        let mut output = 0i32;
        for i in 0..HIDDEN_SIZE {
            output += crelu(us.vals[i]) * i32::from(self.out_weights[i]);
            output += crelu(them.vals[i]) * i32::from(self.out_weights[i + HIDDEN_SIZE]);
        }
        (output + i32::from(self.out_bias)) * SCALE / (QA * QB)
    }
}

/// Clipped ReLU: clamp the quantized activation to `[0, QA]`.
#[inline]
fn crelu(x: i16) -> i32 {
    i32::from(x).clamp(0, QA)
}

/// Network whose weights are a deterministic function of their index,
/// small enough that the forward pass cannot overflow. Test support.
#[cfg(test)]
pub(crate) fn synthetic_network() -> Network {
    let mut acc_weights = Box::new([[0i16; HIDDEN_SIZE]; INPUT_SIZE]);
    for (feature, row) in acc_weights.iter_mut().enumerate() {
        for (i, w) in row.iter_mut().enumerate() {
            *w = ((feature * 31 + i * 7) % 23) as i16 - 11;
        }
    }
    let mut acc_biases = [0i16; HIDDEN_SIZE];
    for (i, b) in acc_biases.iter_mut().enumerate() {
        *b = (i % 13) as i16 - 6;
    }
    let mut out_weights = [0i16; 2 * HIDDEN_SIZE];
    for (i, w) in out_weights.iter_mut().enumerate() {
        *w = (i % 17) as i16 - 8;
    }
    Network {
        acc_weights,
        acc_biases,
        out_weights,
        out_bias: 42,
    }
}
