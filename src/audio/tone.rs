//! Feedback tone generator
//!
//! Fixed-length tone from the sine LUT with a phase accumulator and a
//! linear fade at both ends so the speaker does not click.

use super::lut::sine_at;
use crate::config::ToneSpec;

/// Fade envelope state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeState {
    /// Output is zero
    Silent,
    /// Ramping up (0 → full)
    FadeIn,
    /// Full amplitude output
    Sustain,
    /// Ramping down (full → 0)
    FadeOut,
}

/// Tone generator for one beep.
#[derive(Debug, Clone)]
pub struct ToneGen {
    /// Phase accumulator (32-bit fixed point, top 8 bits = LUT index)
    phase: u32,
    /// Phase increment per sample
    phase_inc: u32,
    fade_state: FadeState,
    fade_pos: u16,
    fade_len: u16,
    /// Samples rendered so far
    pos: usize,
    /// Total tone length in samples
    len: usize,
}

impl ToneGen {
    /// Create a tone of `spec` at `sample_rate`.
    ///
    /// `fade_samples` is clamped so fade-in and fade-out fit in the tone.
    pub fn new(spec: ToneSpec, sample_rate: u32, fade_samples: u16) -> Self {
        let len = (sample_rate as u64 * spec.duration_ms as u64 / 1000) as usize;
        let max_fade = (len / 2).min(u16::MAX as usize) as u16;
        Self {
            phase: 0,
            phase_inc: Self::calc_phase_inc(spec.freq_hz, sample_rate),
            fade_state: FadeState::Silent,
            fade_pos: 0,
            fade_len: fade_samples.min(max_fade).max(1),
            pos: 0,
            len,
        }
    }

    /// phase_inc = (freq * 2^32) / sample_rate
    #[inline]
    fn calc_phase_inc(freq_hz: u32, sample_rate: u32) -> u32 {
        ((freq_hz as u64 * (1u64 << 32)) / sample_rate.max(1) as u64) as u32
    }

    #[inline]
    pub fn fade_state(&self) -> FadeState {
        self.fade_state
    }

    /// Total length in samples.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Samples not yet rendered.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.len - self.pos
    }

    /// All samples rendered.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.pos >= self.len
    }

    /// Fill `out` with the next samples. Returns how many were written.
    pub fn render(&mut self, out: &mut [i16]) -> usize {
        let count = out.len().min(self.remaining());
        for slot in &mut out[..count] {
            *slot = self.next_sample();
        }
        count
    }

    #[inline]
    fn next_sample(&mut self) -> i16 {
        // Gate closes one fade length before the end
        let gate = self.pos + (self.fade_len as usize) < self.len;
        self.pos += 1;

        let amplitude = self.update_fade(gate);
        if amplitude == 0 {
            return 0;
        }

        let sample = sine_at(self.phase);
        self.phase = self.phase.wrapping_add(self.phase_inc);

        ((sample as i32 * amplitude as i32) >> 16) as i16
    }

    /// Advance the envelope, returns amplitude (0-65535).
    #[inline]
    fn update_fade(&mut self, gate: bool) -> u16 {
        match (self.fade_state, gate) {
            (FadeState::Silent, true) => {
                self.fade_state = FadeState::FadeIn;
                self.fade_pos = 0;
                0
            }
            (FadeState::FadeIn, true) => {
                self.fade_pos += 1;
                if self.fade_pos >= self.fade_len {
                    self.fade_state = FadeState::Sustain;
                    0xFFFF
                } else {
                    ((self.fade_pos as u32 * 0xFFFF) / self.fade_len as u32) as u16
                }
            }
            (FadeState::Sustain, true) => 0xFFFF,
            (FadeState::FadeIn, false) | (FadeState::Sustain, false) => {
                self.fade_state = FadeState::FadeOut;
                self.fade_pos = self.fade_len;
                0xFFFF
            }
            (FadeState::FadeOut, _) => {
                if self.fade_pos == 0 {
                    self.fade_state = FadeState::Silent;
                    0
                } else {
                    self.fade_pos -= 1;
                    ((self.fade_pos as u32 * 0xFFFF) / self.fade_len as u32) as u16
                }
            }
            (FadeState::Silent, false) => 0,
        }
    }
}
