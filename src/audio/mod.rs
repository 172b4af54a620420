//! Audio core for the voice memo
//!
//! Architecture:
//! - Buffer sizer: largest chunk-aligned buffer within the memory budget
//! - Sample buffer: single slot, reused for every recording
//! - ADPCM codec: 4-bit IMA-style, encode→decode round trip before playback
//! - Spectrum analyzer + level meter: live feedback over a 256-sample window
//! - Tone generator: LUT + phase accumulator, faded beeps
//! - Route selector: which side owns the shared ES8311

pub mod adpcm;
pub mod buffer;
pub mod level;
pub mod lut;
pub mod route;
pub mod sizer;
pub mod spectrum;
pub mod tone;

pub use adpcm::{AdpcmState, CodecError};
pub use buffer::SampleBuffer;
pub use level::{LevelMeter, LevelMetrics};
pub use lut::{SINE_LUT, LUT_SIZE};
pub use route::{AudioRoute, RouteSelector};
pub use sizer::{HeapAllocator, SampleAllocator, SizePlan, SizedBuffer};
pub use spectrum::SpectrumAnalyzer;
pub use tone::{FadeState, ToneGen};
