//! Live 16-bin spectrum for the bar graph
//!
//! One Goertzel resonator per bin over a Hann-tapered trailing window.
//! Bin values carry over between calls so the bars rise quickly and fall
//! slowly.

use core::f32::consts::PI;

use crate::config::{ANALYSIS_WINDOW, MIN_ANALYSIS_WINDOW, SAMPLE_RATE_HZ, SPECTRUM_BINS};

/// Bin center frequencies in Hz (voice band).
pub const BIN_CENTERS_HZ: [f32; SPECTRUM_BINS] = [
    200.0, 250.0, 315.0, 400.0, 500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0,
    2800.0, 3150.0, 3550.0, 4000.0,
];

/// Displayed range: below `DB_FLOOR` is an empty bar, above `DB_CEIL` full.
const DB_FLOOR: f32 = -72.0;
const DB_CEIL: f32 = -12.0;

/// Fraction of the gap closed per update when rising.
const ATTACK: f32 = 0.40;
/// Retained fraction per update when falling.
const DECAY: f32 = 0.92;

/// Spectrum analyzer with per-bin smoothing.
#[derive(Debug, Clone)]
pub struct SpectrumAnalyzer {
    sample_rate: u32,
    window: usize,
    min_window: usize,
    smooth: [f32; SPECTRUM_BINS],
    bins: [u8; SPECTRUM_BINS],
}

impl Default for SpectrumAnalyzer {
    fn default() -> Self {
        Self::new(SAMPLE_RATE_HZ, ANALYSIS_WINDOW, MIN_ANALYSIS_WINDOW)
    }
}

impl SpectrumAnalyzer {
    pub fn new(sample_rate: u32, window: usize, min_window: usize) -> Self {
        Self {
            sample_rate,
            window,
            min_window,
            smooth: [0.0; SPECTRUM_BINS],
            bins: [0; SPECTRUM_BINS],
        }
    }

    /// Latest bin values, 0-100.
    #[inline]
    pub fn bins(&self) -> &[u8; SPECTRUM_BINS] {
        &self.bins
    }

    /// Analyze the window ending at `window_end` (exclusive) in `samples`.
    ///
    /// Returns `false` and keeps the previous bins when fewer than the
    /// minimum window of samples precede `window_end`.
    pub fn update(&mut self, samples: &[i16], window_end: usize) -> bool {
        let end = window_end.min(samples.len());
        let n = end.min(self.window);
        if n < self.min_window {
            return false;
        }
        let x = &samples[end - n..end];

        let full_scale = n as f32 * 0.5;
        for (bin, &center) in BIN_CENTERS_HZ.iter().enumerate() {
            let power = self.goertzel_power(x, center);
            let level = level_fraction(power.max(1e-12).sqrt() / full_scale);

            let prev = self.smooth[bin];
            let next = if level > prev {
                prev + (level - prev) * ATTACK
            } else {
                prev * DECAY
            };
            self.smooth[bin] = next;
            self.bins[bin] = (next * 100.0).round().clamp(0.0, 100.0) as u8;
        }

        true
    }

    /// Power at the DFT bin nearest `freq_hz`, Hann-tapered.
    fn goertzel_power(&self, x: &[i16], freq_hz: f32) -> f32 {
        let n = x.len();
        let max_k = (n / 2).saturating_sub(1).max(1);
        let k = (freq_hz * n as f32 / self.sample_rate as f32)
            .round()
            .clamp(1.0, max_k as f32);
        let coeff = 2.0 * (2.0 * PI * k / n as f32).cos();

        let taper_step = 2.0 * PI / (n - 1) as f32;
        let (mut q1, mut q2) = (0.0f32, 0.0f32);
        for (i, &sample) in x.iter().enumerate() {
            let hann = 0.5 - 0.5 * (taper_step * i as f32).cos();
            let s = sample as f32 / 32768.0 * hann;
            let q0 = coeff * q1 - q2 + s;
            q2 = q1;
            q1 = q0;
        }

        q1 * q1 + q2 * q2 - coeff * q1 * q2
    }
}

/// Map a normalized magnitude onto the bar range.
#[inline]
fn level_fraction(magnitude: f32) -> f32 {
    let db = 20.0 * magnitude.clamp(1e-6, 1.0).log10();
    ((db - DB_FLOOR) / (DB_CEIL - DB_FLOOR)).clamp(0.0, 1.0)
}
