//! Codec route bookkeeping
//!
//! The ES8311 serves either the microphone (ADC) or the speaker (DAC),
//! never both: switching one on reconfigures the chip under the other.
//! The recorder records here which side currently owns it; the status
//! footer reads it from any task.

use core::sync::atomic::{AtomicU8, Ordering};

/// Who owns the audio codec.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioRoute {
    /// Both sides released
    Off = 0,
    /// Speaker (DAC) active
    Speaker = 1,
    /// Microphone (ADC) active
    Microphone = 2,
}

impl AudioRoute {
    /// Convert from u8
    #[inline]
    pub fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Speaker,
            2 => Self::Microphone,
            _ => Self::Off,
        }
    }

    #[inline]
    pub fn mic_on(self) -> bool {
        self == Self::Microphone
    }

    #[inline]
    pub fn speaker_on(self) -> bool {
        self == Self::Speaker
    }
}

impl From<u8> for AudioRoute {
    fn from(v: u8) -> Self {
        Self::from_u8(v)
    }
}

impl From<AudioRoute> for u8 {
    fn from(r: AudioRoute) -> Self {
        r as u8
    }
}

/// Thread-safe route holder
pub struct RouteSelector {
    route: AtomicU8,
}

impl RouteSelector {
    /// Create new selector (starts at Off)
    pub const fn new() -> Self {
        Self {
            route: AtomicU8::new(AudioRoute::Off as u8),
        }
    }

    /// Current route
    #[inline]
    pub fn get(&self) -> AudioRoute {
        AudioRoute::from_u8(self.route.load(Ordering::Acquire))
    }

    /// Record a new owner, return the previous one
    #[inline]
    pub fn claim(&self, route: AudioRoute) -> AudioRoute {
        AudioRoute::from_u8(self.route.swap(route as u8, Ordering::AcqRel))
    }

    /// Mark `route` released if it is still the owner.
    ///
    /// Returns `true` if it was.
    #[inline]
    pub fn release(&self, route: AudioRoute) -> bool {
        self.route
            .compare_exchange(
                route as u8,
                AudioRoute::Off as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for RouteSelector {
    fn default() -> Self {
        Self::new()
    }
}
