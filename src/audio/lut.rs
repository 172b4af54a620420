//! Sine lookup table for feedback tones
//!
//! 256 entries, one full cycle, built at compile time.

/// Number of entries in the sine LUT
pub const LUT_SIZE: usize = 256;

/// Peak amplitude of the table. Kept below full scale so tones never
/// trip the clip threshold of the level meter.
pub const LUT_PEAK: i16 = 24_000;

/// One cycle of sine, `LUT_PEAK` amplitude.
///
/// Index 0 = 0°, 64 = 90°, 128 = 180°, 192 = 270°
pub static SINE_LUT: [i16; LUT_SIZE] = {
    let mut table = [0i16; LUT_SIZE];
    let mut i = 0;
    while i < LUT_SIZE {
        let angle = (i as f64) * core::f64::consts::PI * 2.0 / (LUT_SIZE as f64);
        table[i] = (const_sin(angle) * LUT_PEAK as f64) as i16;
        i += 1;
    }
    table
};

/// Table lookup from a 32-bit phase accumulator (top 8 bits index).
#[inline]
pub fn sine_at(phase: u32) -> i16 {
    SINE_LUT[(phase >> 24) as usize]
}

/// Taylor-series sine usable in const context.
const fn const_sin(x: f64) -> f64 {
    let mut x = x;
    while x > core::f64::consts::PI {
        x -= 2.0 * core::f64::consts::PI;
    }
    while x < -core::f64::consts::PI {
        x += 2.0 * core::f64::consts::PI;
    }

    let x2 = x * x;
    let x3 = x2 * x;
    let x5 = x3 * x2;
    let x7 = x5 * x2;
    let x9 = x7 * x2;
    let x11 = x9 * x2;

    x - x3 / 6.0 + x5 / 120.0 - x7 / 5040.0 + x9 / 362880.0 - x11 / 39916800.0
}
