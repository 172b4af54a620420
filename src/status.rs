//! Status frames for the presentation layer.
//!
//! The recorder never draws; it hands a `StatusFrame` to a `StatusSink`
//! at a capped rate. Both binaries currently print frames through
//! `LogSink`; a display driver implements the same trait.

use core::fmt;

use crate::audio::level::LevelMetrics;
use crate::audio::route::AudioRoute;
use crate::config::SPECTRUM_BINS;
use crate::fault::FaultCode;
use crate::machine::Mode;

/// Consumer of status frames.
pub trait StatusSink {
    fn present(&mut self, frame: &StatusFrame);
}

/// Sink that drops every frame.
#[derive(Debug, Default)]
pub struct NullSink;

impl StatusSink for NullSink {
    fn present(&mut self, _frame: &StatusFrame) {}
}

/// Sink that keeps every frame (tests, replays).
#[derive(Debug, Default)]
pub struct CollectSink {
    pub frames: Vec<StatusFrame>,
}

impl StatusSink for CollectSink {
    fn present(&mut self, frame: &StatusFrame) {
        self.frames.push(frame.clone());
    }
}

/// Sink that writes frames to the `log` facade.
#[derive(Debug, Default)]
pub struct LogSink {
    frames: u64,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl StatusSink for LogSink {
    fn present(&mut self, frame: &StatusFrame) {
        self.frames += 1;
        log::info!(
            target: "voicememo::status",
            "[{}] {} | {} | {}",
            frame.title,
            frame.line1,
            frame.line2,
            frame.footer
        );
        if let Some(bins) = frame.bins {
            log::debug!(target: "voicememo::status", "bins {}", bar_graph(&bins));
        }
    }
}

/// One character per bin, eight levels.
pub fn bar_graph(bins: &[u8; SPECTRUM_BINS]) -> String {
    const LEVELS: [char; 9] = [' ', '▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];
    bins.iter()
        .map(|&b| LEVELS[(b.min(100) as usize * 8 + 50) / 100])
        .collect()
}

/// Footer flags: `Mic:ON Spk:OFF Buf:OK`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Footer {
    pub mic_on: bool,
    pub speaker_on: bool,
    pub buffer_ok: bool,
}

impl Footer {
    pub fn new(route: AudioRoute, buffer_ok: bool) -> Self {
        Self {
            mic_on: route.mic_on(),
            speaker_on: route.speaker_on(),
            buffer_ok,
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on {
        "ON"
    } else {
        "OFF"
    }
}

impl fmt::Display for Footer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Mic:{} Spk:{} Buf:{}",
            on_off(self.mic_on),
            on_off(self.speaker_on),
            if self.buffer_ok { "OK" } else { "NO" }
        )
    }
}

/// One screenful of status.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusFrame {
    pub mode: Mode,
    pub title: &'static str,
    pub line1: String,
    pub line2: String,
    pub bins: Option<[u8; SPECTRUM_BINS]>,
    pub metrics: Option<LevelMetrics>,
    pub footer: Footer,
}

/// Screen title for a mode.
pub fn title(mode: Mode) -> &'static str {
    match mode {
        Mode::Idle => "READY",
        Mode::ArmRecording => "REC",
        Mode::Recording => "RECORDING",
        Mode::HoldAtMax => "HOLD",
        Mode::Playing => "PLAY",
        Mode::Fault => "ERROR",
    }
}

/// `REC  1.25s / 30s  samp:20480  left:28750ms`
pub fn recording_line(elapsed_ms: u32, max_ms: u32, samples: usize) -> String {
    let left = max_ms.saturating_sub(elapsed_ms);
    format!(
        "REC  {}.{:02}s / {}s  samp:{}  left:{}ms",
        elapsed_ms / 1000,
        (elapsed_ms % 1000) / 10,
        max_ms / 1000,
        samples,
        left
    )
}

pub fn playing_line(pos: usize, len: usize) -> String {
    format!("playing... pos:{}/{}", pos, len)
}

pub fn metrics_line(metrics: &LevelMetrics) -> String {
    if metrics.valid {
        format!(
            "RMS {:.1} dBFS  PEAK {:.1} dBFS  CLIP {:.1}%",
            metrics.rms_dbfs, metrics.peak_dbfs, metrics.clip_percent
        )
    } else {
        String::from("RMS -- dBFS  PEAK -- dBFS  CLIP --%")
    }
}

/// Both hold-screen lines.
pub fn hold_lines(max_ms: u32, samples: usize) -> (String, String) {
    (
        format!("MAX {}s reached", max_ms / 1000),
        format!("RELEASE KEY2 to play ({} samples)", samples),
    )
}

/// `MIC read failed (512 samples)`
pub fn fault_line(code: FaultCode, samples: u32) -> String {
    format!("{} ({} samples)", code.as_str(), samples)
}

pub const FAULT_HINT: &str = "Check MIC enable / wiring";
pub const IDLE_HINT_RECORD: &str = "KEY2: hold rec / release play";
pub const IDLE_HINT_REPLAY: &str = "HOLD KEY1: PLAY";
pub const UNAVAILABLE_HINT: &str = "No record buffer";

/// Emits at most once per interval.
#[derive(Debug, Clone, Copy)]
pub struct RateLimiter {
    interval_us: i64,
    last_us: Option<i64>,
}

impl RateLimiter {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_us: interval_ms as i64 * 1000,
            last_us: None,
        }
    }

    pub fn set_interval_ms(&mut self, interval_ms: u32) {
        self.interval_us = interval_ms as i64 * 1000;
    }

    /// Make the next `ready` pass.
    pub fn force(&mut self) {
        self.last_us = None;
    }

    /// True (and restarts the interval) when strictly more than the
    /// interval passed since the last emission.
    pub fn ready(&mut self, now_us: i64) -> bool {
        let due = match self.last_us {
            None => true,
            Some(last) => now_us - last > self.interval_us,
        };
        if due {
            self.last_us = Some(now_us);
        }
        due
    }
}
