//! IMA-style 4-bit ADPCM
//!
//! Stream layout:
//!
//! ```text
//! [0..2)  initial predictor, i16 little-endian (first sample, verbatim)
//! [2]     initial step index (0-88)
//! [3]     reserved, zero
//! [4..)   4-bit codes, two per byte, low nibble first
//! ```
//!
//! Encoder and decoder share [`AdpcmState::apply`], so the predictor and
//! step index sequences are identical on both sides for the same codes.

use thiserror::Error;

/// Header size in bytes.
pub const HEADER_LEN: usize = 4;

/// Highest valid step index.
pub const MAX_STEP_INDEX: u8 = 88;

/// Quantizer step per step index.
pub const STEP_TABLE: [i32; 89] = [
    7, 8, 9, 10, 11, 12, 13, 14, 16, 17, 19, 21, 23, 25, 28, 31, 34, 37, 41, 45, 50, 55, 60, 66,
    73, 80, 88, 97, 107, 118, 130, 143, 157, 173, 190, 209, 230, 253, 279, 307, 337, 371, 408,
    449, 494, 544, 598, 658, 724, 796, 876, 963, 1060, 1166, 1282, 1411, 1552, 1707, 1878, 2066,
    2272, 2499, 2749, 3024, 3327, 3660, 4026, 4428, 4871, 5358, 5894, 6484, 7132, 7845, 8630,
    9493, 10442, 11487, 12635, 13899, 15289, 16818, 18500, 20350, 22385, 24623, 27086, 29794,
    32767,
];

/// Step index adjustment per 4-bit code.
pub const INDEX_TABLE: [i8; 16] = [-1, -1, -1, -1, 2, 4, 6, 8, -1, -1, -1, -1, 2, 4, 6, 8];

const SIGN_BIT: u8 = 0x8;

/// Codec failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CodecError {
    /// Nothing to encode or decode.
    #[error("empty sample buffer")]
    Empty,
    /// Stream shorter than the fixed header.
    #[error("stream of {0} bytes has no header")]
    TooShort(usize),
    /// Stream holds fewer codes than the requested output needs.
    #[error("stream underrun: need {needed} bytes, have {available}")]
    Underrun { needed: usize, available: usize },
}

/// Encoded byte length for `samples` samples.
#[inline]
pub fn encoded_len(samples: usize) -> usize {
    HEADER_LEN + samples.saturating_sub(1).div_ceil(2)
}

/// Predictor/step-index pair.
///
/// Valid for one forward pass over one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdpcmState {
    predictor: i16,
    index: u8,
}

impl AdpcmState {
    /// Start a pass from a header value.
    pub fn new(predictor: i16, index: u8) -> Self {
        Self {
            predictor,
            index: index.min(MAX_STEP_INDEX),
        }
    }

    #[inline]
    pub fn predictor(&self) -> i16 {
        self.predictor
    }

    #[inline]
    pub fn index(&self) -> u8 {
        self.index
    }

    #[inline]
    fn step(&self) -> i32 {
        STEP_TABLE[self.index as usize]
    }

    /// Quantize `sample` against the current prediction and advance.
    #[inline]
    pub fn encode(&mut self, sample: i16) -> u8 {
        let mut step = self.step();
        let mut diff = sample as i32 - self.predictor as i32;

        let mut code = 0u8;
        if diff < 0 {
            code = SIGN_BIT;
            diff = -diff;
        }

        // Successive approximation against step, step/2, step/4
        for bit in [4u8, 2, 1] {
            if diff >= step {
                code |= bit;
                diff -= step;
            }
            step >>= 1;
        }

        self.apply(code);
        code
    }

    /// Reconstruct one sample from `code` and advance.
    #[inline]
    pub fn decode(&mut self, code: u8) -> i16 {
        self.apply(code & 0x0F);
        self.predictor
    }

    /// Shared recurrence: reconstruct the delta, move the predictor, adapt
    /// the step index.
    #[inline]
    fn apply(&mut self, code: u8) {
        let step = self.step();

        let mut delta = step >> 3;
        if code & 4 != 0 {
            delta += step;
        }
        if code & 2 != 0 {
            delta += step >> 1;
        }
        if code & 1 != 0 {
            delta += step >> 2;
        }

        let predictor = if code & SIGN_BIT != 0 {
            self.predictor as i32 - delta
        } else {
            self.predictor as i32 + delta
        };
        self.predictor = predictor.clamp(i16::MIN as i32, i16::MAX as i32) as i16;

        let index = self.index as i32 + INDEX_TABLE[code as usize] as i32;
        self.index = index.clamp(0, MAX_STEP_INDEX as i32) as u8;
    }
}

/// Encode `samples` into `out`, replacing its contents.
///
/// `out` is reused across recordings to avoid reallocating.
pub fn encode(samples: &[i16], out: &mut Vec<u8>) -> Result<(), CodecError> {
    out.clear();
    let (&first, rest) = samples.split_first().ok_or(CodecError::Empty)?;

    let mut state = AdpcmState::new(first, 0);
    out.reserve(encoded_len(samples.len()));
    out.extend_from_slice(&first.to_le_bytes());
    out.push(state.index());
    out.push(0);

    let mut pairs = rest.chunks_exact(2);
    for pair in &mut pairs {
        let lo = state.encode(pair[0]);
        let hi = state.encode(pair[1]);
        out.push(lo | (hi << 4));
    }
    if let [last] = pairs.remainder() {
        out.push(state.encode(*last));
    }

    Ok(())
}

/// Decode `encoded` into all of `out`.
///
/// The stream length is checked before anything is written: on error `out`
/// is left untouched.
pub fn decode(encoded: &[u8], out: &mut [i16]) -> Result<(), CodecError> {
    if out.is_empty() {
        return Err(CodecError::Empty);
    }
    if encoded.len() < HEADER_LEN {
        return Err(CodecError::TooShort(encoded.len()));
    }
    let needed = encoded_len(out.len());
    if encoded.len() < needed {
        return Err(CodecError::Underrun {
            needed,
            available: encoded.len(),
        });
    }

    let mut state = AdpcmState::new(i16::from_le_bytes([encoded[0], encoded[1]]), encoded[2]);

    let (first, rest) = out.split_at_mut(1);
    first[0] = state.predictor();

    let codes = &encoded[HEADER_LEN..needed];
    let mut pairs = rest.chunks_exact_mut(2);
    for (pair, &byte) in (&mut pairs).zip(codes) {
        pair[0] = state.decode(byte & 0x0F);
        pair[1] = state.decode(byte >> 4);
    }
    if let [last] = pairs.into_remainder() {
        // Odd code count: final byte's high nibble is padding
        *last = state.decode(codes[codes.len() - 1] & 0x0F);
    }

    Ok(())
}

/// Encode then decode `samples` in place, leaving the lossy reconstruction.
///
/// `scratch` receives the encoded stream.
pub fn round_trip(samples: &mut [i16], scratch: &mut Vec<u8>) -> Result<(), CodecError> {
    encode(samples, scratch)?;
    decode(scratch, samples)
}
