//! Record/playback state machine.
//!
//! Pure logic, no hardware dependencies. The recorder feeds it events
//! and executes the returned effects in order. Every transition that
//! powers one audio device releases the other one first.

use crate::fault::FaultCode;

/// Current activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Idle,
    /// Arming beep playing, microphone still off.
    ArmRecording,
    Recording,
    /// Buffer full, record key still held.
    HoldAtMax,
    Playing,
    Fault,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Idle => "Idle",
            Mode::ArmRecording => "ArmRecording",
            Mode::Recording => "Recording",
            Mode::HoldAtMax => "HoldAtMax",
            Mode::Playing => "Playing",
            Mode::Fault => "Fault",
        }
    }
}

/// Feedback tones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tone {
    /// Played before recording; its end moves ArmRecording on.
    Arm,
    Error,
    /// Request refused: nothing recorded, or no buffer.
    Refuse,
}

/// Inputs to the machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    RecordPressed,
    RecordReleased,
    ReplayRequested,
    /// Arming beep finished playing.
    ToneFinished,
    /// One chunk committed to the buffer.
    ChunkCaptured { full: bool },
    /// All samples written and the speaker went quiet.
    PlaybackFinished,
    Failed(FaultCode),
}

/// Side effects, executed in order by the recorder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    StopMicrophone,
    /// Stop, wait out the drain grace, power down.
    ReleaseSpeaker,
    StartMicrophone,
    StartSpeaker,
    PlayTone(Tone),
    /// Reset length and analyzers for a new take.
    ClearRecording,
    /// Codec round trip, then begin output.
    StartPlayback,
    DiscardRecording,
}

/// Upper bound on effects per transition.
pub const MAX_EFFECTS: usize = 4;

/// Fixed-capacity effect list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Effects {
    items: [Effect; MAX_EFFECTS],
    len: usize,
}

impl Effects {
    pub const NONE: Self = Self {
        items: [Effect::StopMicrophone; MAX_EFFECTS],
        len: 0,
    };

    fn of(list: &[Effect]) -> Self {
        let mut effects = Self::NONE;
        for &e in list.iter().take(MAX_EFFECTS) {
            effects.items[effects.len] = e;
            effects.len += 1;
        }
        effects
    }

    pub fn as_slice(&self) -> &[Effect] {
        &self.items[..self.len]
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn contains(&self, effect: Effect) -> bool {
        self.as_slice().contains(&effect)
    }
}

const START_PLAYBACK: &[Effect] = &[
    Effect::StopMicrophone,
    Effect::StartSpeaker,
    Effect::StartPlayback,
];

const REFUSE: &[Effect] = &[
    Effect::StopMicrophone,
    Effect::StartSpeaker,
    Effect::PlayTone(Tone::Refuse),
];

const ENTER_FAULT: &[Effect] = &[
    Effect::StopMicrophone,
    Effect::StartSpeaker,
    Effect::DiscardRecording,
    Effect::PlayTone(Tone::Error),
];

/// Machine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Machine {
    mode: Mode,
    record_held: bool,
    has_recording: bool,
    available: bool,
}

impl Machine {
    /// `available` is false when no recording buffer could be allocated.
    pub const fn new(available: bool) -> Self {
        Self {
            mode: Mode::Idle,
            record_held: false,
            has_recording: false,
            available,
        }
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.mode
    }

    #[inline]
    pub fn record_held(&self) -> bool {
        self.record_held
    }

    #[inline]
    pub fn has_recording(&self) -> bool {
        self.has_recording
    }

    #[inline]
    pub fn available(&self) -> bool {
        self.available
    }

    /// Apply `event` in place.
    pub fn handle(&mut self, event: Event) -> Effects {
        let (next, effects) = transition(*self, event);
        *self = next;
        effects
    }
}

/// Pure transition function.
pub fn transition(state: Machine, event: Event) -> (Machine, Effects) {
    let mut next = state;

    let effects = match (state.mode, event) {
        (_, Event::RecordPressed) => {
            next.record_held = true;
            match state.mode {
                Mode::Idle | Mode::Fault if state.available => {
                    next.mode = Mode::ArmRecording;
                    Effects::of(&[
                        Effect::StopMicrophone,
                        Effect::StartSpeaker,
                        Effect::PlayTone(Tone::Arm),
                    ])
                }
                Mode::Idle | Mode::Fault => Effects::of(REFUSE),
                _ => Effects::NONE,
            }
        }

        (Mode::HoldAtMax, Event::RecordReleased) => {
            next.record_held = false;
            next.mode = Mode::Playing;
            Effects::of(START_PLAYBACK)
        }
        // Releases arrive between chunks; with audio captured, stop here
        (Mode::Recording, Event::RecordReleased) if state.has_recording => {
            next.record_held = false;
            next.mode = Mode::Playing;
            Effects::of(START_PLAYBACK)
        }
        (_, Event::RecordReleased) => {
            next.record_held = false;
            Effects::NONE
        }

        (Mode::ArmRecording, Event::ToneFinished) => {
            if state.record_held {
                next.mode = Mode::Recording;
                next.has_recording = false;
                Effects::of(&[
                    Effect::ReleaseSpeaker,
                    Effect::StartMicrophone,
                    Effect::ClearRecording,
                ])
            } else {
                // Released during the beep: never start the microphone
                next.mode = Mode::Idle;
                Effects::NONE
            }
        }

        (Mode::Recording, Event::ChunkCaptured { full }) => {
            next.has_recording = true;
            if !state.record_held {
                next.mode = Mode::Playing;
                Effects::of(START_PLAYBACK)
            } else if full {
                next.mode = Mode::HoldAtMax;
                Effects::of(&[Effect::StopMicrophone, Effect::StartSpeaker])
            } else {
                Effects::NONE
            }
        }

        (Mode::Idle, Event::ReplayRequested) | (Mode::Fault, Event::ReplayRequested) => {
            if state.has_recording {
                next.mode = Mode::Playing;
                Effects::of(START_PLAYBACK)
            } else {
                Effects::of(REFUSE)
            }
        }

        (Mode::Playing, Event::PlaybackFinished) => {
            next.mode = Mode::Idle;
            Effects::NONE
        }

        (Mode::Fault, Event::Failed(_)) => Effects::NONE,
        (_, Event::Failed(_)) => {
            next.mode = Mode::Fault;
            next.has_recording = false;
            Effects::of(ENTER_FAULT)
        }

        _ => Effects::NONE,
    };

    (next, effects)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effects_list() {
        let e = Effects::of(&[Effect::StartSpeaker, Effect::PlayTone(Tone::Arm)]);
        assert_eq!(e.as_slice().len(), 2);
        assert!(e.contains(Effect::PlayTone(Tone::Arm)));
        assert!(!e.contains(Effect::StartMicrophone));
        assert!(Effects::NONE.is_empty());
    }

    #[test]
    fn test_transition_is_pure() {
        let m = Machine::new(true);
        let (next, _) = transition(m, Event::RecordPressed);
        assert_eq!(m.mode(), Mode::Idle);
        assert_eq!(next.mode(), Mode::ArmRecording);
    }
}
