//! RMS / peak / clip meter in dBFS
//!
//! Stateless: every call recomputes from the trailing window.

use crate::config::{ANALYSIS_WINDOW, MIN_ANALYSIS_WINDOW};

/// Reported for silence instead of -inf.
pub const DBFS_FLOOR: f32 = -99.9;

/// Samples at or above this magnitude count as clipped.
pub const CLIP_THRESHOLD: i32 = 32_760;

/// One meter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelMetrics {
    pub rms_dbfs: f32,
    pub peak_dbfs: f32,
    /// Clipped samples in the window, 0-100.
    pub clip_percent: f32,
    /// False when the window was too short to measure.
    pub valid: bool,
}

impl LevelMetrics {
    /// Reading for a window too short to analyze.
    pub const INVALID: Self = Self {
        rms_dbfs: DBFS_FLOOR,
        peak_dbfs: DBFS_FLOOR,
        clip_percent: 0.0,
        valid: false,
    };
}

impl Default for LevelMetrics {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Convert a 0..1 magnitude to dBFS.
#[inline]
pub fn to_dbfs(normalized: f32) -> f32 {
    if normalized <= 0.0 {
        DBFS_FLOOR
    } else {
        20.0 * normalized.log10()
    }
}

/// Level meter over a trailing window.
#[derive(Debug, Clone, Copy)]
pub struct LevelMeter {
    window: usize,
    min_window: usize,
}

impl Default for LevelMeter {
    fn default() -> Self {
        Self::new(ANALYSIS_WINDOW, MIN_ANALYSIS_WINDOW)
    }
}

impl LevelMeter {
    pub const fn new(window: usize, min_window: usize) -> Self {
        Self { window, min_window }
    }

    /// Measure the window ending at `window_end` (exclusive) in `samples`.
    pub fn measure(&self, samples: &[i16], window_end: usize) -> LevelMetrics {
        let end = window_end.min(samples.len());
        let n = end.min(self.window);
        if n < self.min_window {
            return LevelMetrics::INVALID;
        }

        let mut peak = 0i32;
        let mut clipped = 0u32;
        let mut sum_sq = 0.0f64;
        for &sample in &samples[end - n..end] {
            let magnitude = (sample as i32).abs();
            peak = peak.max(magnitude);
            if magnitude >= CLIP_THRESHOLD {
                clipped += 1;
            }
            sum_sq += sample as f64 * sample as f64;
        }

        let rms = (sum_sq / n as f64).sqrt() / 32768.0;
        LevelMetrics {
            rms_dbfs: to_dbfs(rms as f32),
            peak_dbfs: to_dbfs(peak as f32 / 32768.0),
            clip_percent: 100.0 * clipped as f32 / n as f32,
            valid: true,
        }
    }
}
