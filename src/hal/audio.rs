//! Audio device traits.
//!
//! The microphone and speaker share one I2S bus and one ES8311, so only
//! one of them may be running at a time. The recorder enforces that; the
//! drivers behind these traits just do I/O.
//!
//! Reads and writes take a timeout and return how much was transferred
//! within it, so the caller can interleave status updates while waiting.

use core::time::Duration;

/// Hardware failure reported by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HalError {
    #[error("microphone failed to start")]
    MicStart,
    #[error("microphone read failed")]
    MicRead,
    #[error("speaker failed to start")]
    SpeakerStart,
    #[error("speaker write failed")]
    SpeakerWrite,
    #[error("control bus error")]
    Bus,
    #[error("audio codec not found")]
    ChipNotFound,
}

/// Samples moved by a 16-bit driver transfer.
///
/// A driver timeout moved nothing and is not a failure. Any other driver
/// error becomes `failure`.
pub fn transfer_samples<E>(
    result: Result<usize, E>,
    timed_out: impl FnOnce(&E) -> bool,
    failure: HalError,
) -> Result<usize, HalError> {
    match result {
        Ok(bytes) => Ok(bytes / 2),
        Err(e) if timed_out(&e) => Ok(0),
        Err(_) => Err(failure),
    }
}

/// Audio capture device.
pub trait Microphone {
    /// Power up the capture path.
    fn start(&mut self) -> Result<(), HalError>;

    /// Power down the capture path. Never fails.
    fn stop(&mut self);

    fn is_running(&self) -> bool;

    /// Read up to `buf.len()` samples, waiting at most `timeout`.
    ///
    /// Returns the number of samples delivered; 0 means nothing arrived
    /// yet.
    fn read(&mut self, buf: &mut [i16], timeout: Duration) -> Result<usize, HalError>;
}

/// Audio output device.
pub trait Speaker {
    /// Power up the output path and apply the volume.
    fn start(&mut self) -> Result<(), HalError>;

    /// Request a stop. Audio already queued may still be draining.
    fn stop(&mut self);

    /// Power down so the bus can be reconfigured for capture.
    fn release(&mut self);

    fn is_running(&self) -> bool;

    /// Queued audio is still coming out.
    fn is_playing(&self) -> bool;

    /// Queue samples, waiting at most `timeout` for room. Returns the
    /// number accepted.
    fn write(&mut self, samples: &[i16], timeout: Duration) -> Result<usize, HalError>;
}

/// Monotonic time source.
pub trait Clock {
    fn now_us(&self) -> i64;

    /// Yield for `us` microseconds.
    fn sleep_us(&self, us: u64);

    #[inline]
    fn now_ms(&self) -> i64 {
        self.now_us() / 1000
    }
}
