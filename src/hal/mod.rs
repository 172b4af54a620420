//! Hardware seam for the voice memo.
//!
//! Traits for the audio devices and the clock, the ES8311 control
//! driver, a simulated board for host runs, and the ESP-IDF drivers.
//! Business logic stays in the recorder; everything here is I/O.

pub mod audio;
pub mod es8311;
pub mod sim;

#[cfg(target_os = "espidf")]
pub mod esp;

pub use audio::{Clock, HalError, Microphone, Speaker};
pub use es8311::{CodecPath, ControlBus, Es8311, Es8311Config, ES8311_ADDR};
