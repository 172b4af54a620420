//! Fault state for the voice memo.
//!
//! A hardware failure ends the current attempt: the recorder drops the
//! in-progress clip, restores the speaker and plays the error cue. The
//! fault stays latched here (readable from the display task) until the
//! next record press.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Why the last attempt failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// Microphone read failed mid-chunk.
    CaptureFailed = 1,

    /// Microphone could not be started.
    MicStartFailed = 2,

    /// Speaker could not be started or written.
    SpeakerFailed = 3,

    /// Encode/decode round trip failed before playback.
    CodecFailed = 4,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::CaptureFailed,
            2 => FaultCode::MicStartFailed,
            3 => FaultCode::SpeakerFailed,
            4 => FaultCode::CodecFailed,
            _ => FaultCode::None,
        }
    }

    /// Short text for the status screen.
    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "no fault",
            FaultCode::CaptureFailed => "MIC read failed",
            FaultCode::MicStartFailed => "MIC start failed",
            FaultCode::SpeakerFailed => "SPK failed",
            FaultCode::CodecFailed => "codec failed",
        }
    }
}

/// Thread-safe fault state.
///
/// Set by the recorder, read by whoever draws the screen.
///
/// # Usage
///
/// ```ignore
/// static FAULT: FaultState = FaultState::new();
///
/// // In the capture loop:
/// if let Err(e) = mic.read(chunk, timeout) {
///     FAULT.set(FaultCode::CaptureFailed, captured as u32);
/// }
///
/// // In the display task:
/// if FAULT.is_active() {
///     draw_error(FAULT.code().as_str());
/// }
/// ```
pub struct FaultState {
    /// True if fault is active.
    active: AtomicBool,

    /// Fault code (reason for fault).
    code: AtomicU8,

    /// Samples captured before the failure.
    data: AtomicU32,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
        }
    }

    /// Latch a fault.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.active.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    /// Samples captured before the failure.
    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    /// Clear the active flag. Code and data stay readable.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}
