//! # StickVoiceMemo
//!
//! Hold-to-record voice memo for a handheld with a shared ES8311 codec.
//!
//! ## Architecture
//!
//! ```text
//! buttons ─▶ input ─▶ Recorder ──▶ Machine (pure FSM)
//!                       │  ▲
//!          Microphone ──┘  └── effects: mic/speaker power, tones,
//!          Speaker ◀───────    codec round trip, playback
//!                       │
//!                       └──▶ StatusSink (frames, bins, dBFS)
//! ```
//!
//! - The sample buffer is sized once at boot (`audio::sizer`) and reused
//! - Capture runs one 512-sample chunk per step; each chunk feeds the
//!   spectrum analyzer and level meter
//! - Before playback the recording goes through the ADPCM codec and back,
//!   so what you hear (and what the meters show) is the lossy version
//! - Microphone and speaker are never powered together
//!
//! Everything except `hal::esp` is plain logic and runs on the host.

pub mod audio;
pub mod config;
pub mod fault;
pub mod hal;
pub mod input;
pub mod log_drain;
pub mod logging;
pub mod machine;
pub mod recorder;
pub mod status;

pub use config::{MemoryBudget, RecorderConfig};
pub use fault::{FaultCode, FaultState};
pub use machine::{Machine, Mode};
pub use recorder::{Recorder, Shared};
pub use status::{StatusFrame, StatusSink};
