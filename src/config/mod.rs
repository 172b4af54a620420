//! Module: config
//!
//! Purpose: Fixed operating parameters for the voice memo subsystem.
//!
//! Architecture:
//! - `RecorderConfig`: one plain struct, built once at startup, never mutated
//! - `MemoryBudget`: how many bytes the sample buffer may claim
//! - Defaults reproduce the device tuning (16 kHz, 512-sample chunks)
//!
//! Safety: Safe. Copy types only.

use thiserror::Error;

/// Capture and playback sample rate.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Samples per capture chunk.
pub const CHUNK_SAMPLES: usize = 512;

/// Trailing analysis window length.
pub const ANALYSIS_WINDOW: usize = 256;

/// Below this many samples the analyzers skip the update.
pub const MIN_ANALYSIS_WINDOW: usize = 32;

/// Number of spectral bins.
pub const SPECTRUM_BINS: usize = 16;

/// PSRAM kept free for sprites and runtime allocations.
pub const PSRAM_HEADROOM_BYTES: usize = 512 * 1024;

/// Internal heap kept free for the system.
pub const HEAP_HEADROOM_BYTES: usize = 192 * 1024;

/// A short tone: frequency and duration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ToneSpec {
    pub freq_hz: u32,
    pub duration_ms: u32,
}

impl ToneSpec {
    pub const fn new(freq_hz: u32, duration_ms: u32) -> Self {
        Self { freq_hz, duration_ms }
    }
}

/// Recorder configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Capture/playback sample rate in Hz.
    pub sample_rate: u32,
    /// Samples requested per capture chunk.
    pub chunk_samples: usize,
    /// Trailing window analyzed for spectrum and level.
    pub analysis_window: usize,
    /// Minimum window before analysis is attempted.
    pub min_analysis_window: usize,
    /// Shortest recording the buffer must hold.
    pub floor_ms: u32,
    /// Longest recording the buffer is sized for.
    pub target_ms: u32,
    /// How long to wait for the speaker to go quiet before forcing it off.
    pub speaker_stop_grace_ms: u32,
    /// Extra time granted to a waited tone beyond its nominal length.
    pub tone_grace_ms: u32,
    /// Replay key hold time that triggers replay.
    pub replay_hold_ms: u32,
    /// Status refresh interval while recording.
    pub recording_status_ms: u32,
    /// Status refresh interval while playing.
    pub playing_status_ms: u32,
    /// Status refresh interval while holding at max.
    pub hold_status_ms: u32,
    /// Status refresh interval while in fault.
    pub fault_status_ms: u32,
    /// Speaker volume (0-100%).
    pub volume: u8,
    /// Beep played before the microphone is armed.
    pub arm_tone: ToneSpec,
    /// Cue played on entering fault.
    pub error_tone: ToneSpec,
    /// Cue played when replay is refused.
    pub refuse_tone: ToneSpec,
    /// Tone fade length in samples.
    pub tone_fade_samples: u16,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            sample_rate: SAMPLE_RATE_HZ,
            chunk_samples: CHUNK_SAMPLES,
            analysis_window: ANALYSIS_WINDOW,
            min_analysis_window: MIN_ANALYSIS_WINDOW,
            floor_ms: 3_000,
            target_ms: 30_000,
            speaker_stop_grace_ms: 200,
            tone_grace_ms: 190,
            replay_hold_ms: 650,
            recording_status_ms: 120,
            playing_status_ms: 100,
            hold_status_ms: 120,
            fault_status_ms: 200,
            volume: 70,
            arm_tone: ToneSpec::new(1200, 60),
            error_tone: ToneSpec::new(220, 120),
            refuse_tone: ToneSpec::new(220, 60),
            tone_fade_samples: 80, // 5ms @ 16kHz
        }
    }
}

/// Configuration rejected by [`RecorderConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    #[error("chunk size must be non-zero")]
    ZeroChunk,
    #[error("analysis window {window} is shorter than the minimum {min}")]
    WindowTooShort { window: usize, min: usize },
    #[error("floor {floor_ms}ms exceeds target {target_ms}ms")]
    FloorAboveTarget { floor_ms: u32, target_ms: u32 },
    #[error("volume {0}% out of range")]
    VolumeOutOfRange(u8),
}

impl RecorderConfig {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sample_rate == 0 {
            return Err(ConfigError::ZeroSampleRate);
        }
        if self.chunk_samples == 0 {
            return Err(ConfigError::ZeroChunk);
        }
        if self.min_analysis_window == 0 || self.analysis_window < self.min_analysis_window {
            return Err(ConfigError::WindowTooShort {
                window: self.analysis_window,
                min: self.min_analysis_window,
            });
        }
        if self.floor_ms > self.target_ms {
            return Err(ConfigError::FloorAboveTarget {
                floor_ms: self.floor_ms,
                target_ms: self.target_ms,
            });
        }
        if self.volume > 100 {
            return Err(ConfigError::VolumeOutOfRange(self.volume));
        }
        Ok(())
    }

    /// Samples covering `ms` milliseconds at the configured rate.
    #[inline]
    pub fn samples_for_ms(&self, ms: u32) -> usize {
        (self.sample_rate as u64 * ms as u64 / 1000) as usize
    }

    /// Milliseconds covered by `samples` at the configured rate.
    #[inline]
    pub fn ms_for_samples(&self, samples: usize) -> u32 {
        (samples as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

/// Bytes available to the sample buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryBudget {
    pub bytes: usize,
}

impl MemoryBudget {
    pub const fn new(bytes: usize) -> Self {
        Self { bytes }
    }

    /// Budget from free memory reported at startup.
    ///
    /// PSRAM is preferred; only half of the spare internal heap is counted.
    pub fn from_free(free_psram: usize, free_heap: usize) -> Self {
        let psram = free_psram.saturating_sub(PSRAM_HEADROOM_BYTES);
        let heap = free_heap.saturating_sub(HEAP_HEADROOM_BYTES);
        Self {
            bytes: psram.saturating_add(heap / 2),
        }
    }
}
