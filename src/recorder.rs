//! Voice memo recorder.
//!
//! Owns the sample buffer, the analyzers and the state machine, and
//! drives the audio devices. The caller feeds button edges in and calls
//! [`Recorder::step`] in a loop; each step does the work of the current
//! mode and hands rate-limited status frames to a [`StatusSink`].
//!
//! Blocking happens in two places only: while one capture chunk fills,
//! and while the speaker drains before the microphone takes the codec.
//! The arming beep is written one block per step, so key edges still land
//! while it plays.

use core::time::Duration;

use crate::audio::adpcm;
use crate::audio::buffer::SampleBuffer;
use crate::audio::level::{LevelMeter, LevelMetrics};
use crate::audio::route::{AudioRoute, RouteSelector};
use crate::audio::sizer::SizedBuffer;
use crate::audio::spectrum::SpectrumAnalyzer;
use crate::audio::tone::ToneGen;
use crate::config::{RecorderConfig, ToneSpec, SPECTRUM_BINS};
use crate::fault::{FaultCode, FaultState};
use crate::hal::audio::{Clock, HalError, Microphone, Speaker};
use crate::input::ButtonEdges;
use crate::logging::LogStream;
use crate::machine::{Effect, Event, Machine, Mode, Tone};
use crate::status::{self, Footer, RateLimiter, StatusFrame, StatusSink};
use crate::{rt_debug, rt_error, rt_info, rt_warn};

/// Wait per microphone read while a chunk fills.
const CAPTURE_POLL: Duration = Duration::from_millis(20);

/// Wait per speaker write.
const WRITE_TIMEOUT: Duration = Duration::from_millis(10);

/// Sleep when a step has nothing to pump.
const IDLE_POLL_US: u64 = 10_000;

/// Poll period while waiting for the speaker to drain.
const DRAIN_POLL_US: u64 = 2_000;

/// Samples rendered per tone write.
const TONE_BLOCK: usize = 256;

/// A speaker that accepts nothing for this long counts as failed.
const WRITE_STALL_US: i64 = 1_000_000;

const IDLE_STATUS_MS: u32 = 500;

/// State shared with other tasks.
#[derive(Clone, Copy)]
pub struct Shared<'a> {
    pub log: &'a LogStream,
    pub fault: &'a FaultState,
    pub route: &'a RouteSelector,
}

#[derive(Debug, Clone, Copy)]
struct Playback {
    started_us: i64,
    written: usize,
}

/// The voice memo engine.
pub struct Recorder<'a, M: Microphone, S: Speaker, C: Clock> {
    config: RecorderConfig,
    mic: M,
    speaker: S,
    clock: C,
    shared: Shared<'a>,

    buffer: Option<SampleBuffer>,
    max_ms: u32,
    encoded: Vec<u8>,

    spectrum: SpectrumAnalyzer,
    meter: LevelMeter,
    metrics: LevelMetrics,

    machine: Machine,
    tone: Option<ToneGen>,
    playback: Option<Playback>,
    /// Beep drain deadline, set once the arming tone is fully written.
    arm_deadline_us: Option<i64>,
    record_started_us: i64,
    limiter: RateLimiter,
}

impl<'a, M: Microphone, S: Speaker, C: Clock> Recorder<'a, M, S, C> {
    /// `sized` is `None` when the buffer sizer gave up; recording is then
    /// refused but tones still work.
    pub fn new(
        config: RecorderConfig,
        sized: Option<SizedBuffer>,
        mic: M,
        speaker: S,
        clock: C,
        shared: Shared<'a>,
    ) -> Self {
        let (buffer, max_ms) = match sized {
            Some(sized) => {
                rt_info!(
                    shared.log,
                    clock.now_us(),
                    "rec buffer {} samples, max {} ms ({} attempts)",
                    sized.buffer.capacity(),
                    sized.max_ms,
                    sized.attempts
                );
                (Some(sized.buffer), sized.max_ms)
            }
            None => {
                rt_warn!(shared.log, clock.now_us(), "rec buffer unavailable, recording disabled");
                (None, 0)
            }
        };

        Self {
            spectrum: SpectrumAnalyzer::new(
                config.sample_rate,
                config.analysis_window,
                config.min_analysis_window,
            ),
            meter: LevelMeter::new(config.analysis_window, config.min_analysis_window),
            metrics: LevelMetrics::INVALID,
            machine: Machine::new(buffer.is_some()),
            tone: None,
            playback: None,
            arm_deadline_us: None,
            record_started_us: 0,
            limiter: RateLimiter::new(IDLE_STATUS_MS),
            encoded: Vec::new(),
            buffer,
            max_ms,
            config,
            mic,
            speaker,
            clock,
            shared,
        }
    }

    /// Bring the speaker up so idle tones can play.
    pub fn power_on(&mut self) {
        if let Err(code) = self.execute(Effect::StartSpeaker) {
            self.dispatch(Event::Failed(code));
        }
    }

    // --- Inputs ---

    pub fn press_record(&mut self) {
        self.dispatch(Event::RecordPressed);
    }

    pub fn release_record(&mut self) {
        self.dispatch(Event::RecordReleased);
    }

    pub fn request_replay(&mut self) {
        self.dispatch(Event::ReplayRequested);
    }

    /// Map key edges: record key press/release, replay key long press.
    pub fn apply_input(&mut self, record: ButtonEdges, replay: ButtonEdges) {
        if record.pressed {
            self.press_record();
        }
        if record.released {
            self.release_record();
        }
        if replay.held_for {
            self.request_replay();
        }
    }

    // --- Outputs ---

    #[inline]
    pub fn mode(&self) -> Mode {
        self.machine.mode()
    }

    /// Committed samples of the current recording.
    pub fn samples(&self) -> &[i16] {
        self.buffer.as_ref().map_or(&[], |b| b.samples())
    }

    pub fn spectrum(&self) -> &[u8; SPECTRUM_BINS] {
        self.spectrum.bins()
    }

    pub fn metrics(&self) -> LevelMetrics {
        self.metrics
    }

    pub fn buffer_available(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn max_duration_ms(&self) -> u32 {
        self.max_ms
    }

    pub fn machine(&self) -> &Machine {
        &self.machine
    }

    pub fn route(&self) -> AudioRoute {
        self.shared.route.get()
    }

    pub fn microphone(&self) -> &M {
        &self.mic
    }

    pub fn microphone_mut(&mut self) -> &mut M {
        &mut self.mic
    }

    pub fn speaker(&self) -> &S {
        &self.speaker
    }

    pub fn speaker_mut(&mut self) -> &mut S {
        &mut self.speaker
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    // --- Work ---

    /// Do the work of the current mode once.
    pub fn step(&mut self, sink: &mut dyn StatusSink) {
        match self.machine.mode() {
            Mode::Idle | Mode::Fault | Mode::HoldAtMax => {
                let pumped = self.pump_tone();
                self.publish(sink);
                if !pumped {
                    self.clock.sleep_us(IDLE_POLL_US);
                }
            }
            Mode::ArmRecording => {
                self.publish(sink);
                self.run_arming();
            }
            Mode::Recording => self.run_capture(sink),
            Mode::Playing => self.run_playback(sink),
        }
    }

    fn now_us(&self) -> i64 {
        self.clock.now_us()
    }

    fn dispatch(&mut self, event: Event) {
        let mut pending = Some(event);

        while let Some(event) = pending.take() {
            let before = self.machine.mode();
            if let Event::Failed(code) = event {
                if before != Mode::Fault {
                    let captured = self.samples().len() as u32;
                    self.shared.fault.set(code, captured);
                    rt_error!(
                        self.shared.log,
                        self.now_us(),
                        "fault {:?} in {} after {} samples",
                        code,
                        before.as_str(),
                        captured
                    );
                }
            }

            let effects = self.machine.handle(event);
            let after = self.machine.mode();
            if before != after {
                self.enter(before, after);
            }

            for &effect in effects.as_slice() {
                if let Err(code) = self.execute(effect) {
                    pending = Some(Event::Failed(code));
                    break;
                }
            }
        }
    }

    fn enter(&mut self, from: Mode, to: Mode) {
        rt_info!(self.shared.log, self.now_us(), "mode {} -> {}", from.as_str(), to.as_str());

        if from == Mode::Fault {
            self.shared.fault.clear();
        }
        if to != Mode::Playing {
            self.playback = None;
        }
        self.arm_deadline_us = None;

        let interval = match to {
            Mode::Idle => IDLE_STATUS_MS,
            Mode::ArmRecording | Mode::Recording => self.config.recording_status_ms,
            Mode::HoldAtMax => self.config.hold_status_ms,
            Mode::Playing => self.config.playing_status_ms,
            Mode::Fault => self.config.fault_status_ms,
        };
        self.limiter.set_interval_ms(interval);
        self.limiter.force();
    }

    fn execute(&mut self, effect: Effect) -> Result<(), FaultCode> {
        match effect {
            Effect::StopMicrophone => {
                if self.mic.is_running() {
                    self.mic.stop();
                }
                self.shared.route.release(AudioRoute::Microphone);
            }
            Effect::ReleaseSpeaker => self.release_speaker(),
            Effect::StartMicrophone => {
                self.mic.start().map_err(|e| self.hal_fault(e, FaultCode::MicStartFailed))?;
                self.shared.route.claim(AudioRoute::Microphone);
                self.record_started_us = self.now_us();
            }
            Effect::StartSpeaker => {
                if !self.speaker.is_running() {
                    self.speaker
                        .start()
                        .map_err(|e| self.hal_fault(e, FaultCode::SpeakerFailed))?;
                }
                self.shared.route.claim(AudioRoute::Speaker);
            }
            Effect::PlayTone(tone) => {
                let spec = self.tone_spec(tone);
                self.tone = Some(ToneGen::new(
                    spec,
                    self.config.sample_rate,
                    self.config.tone_fade_samples,
                ));
            }
            Effect::ClearRecording | Effect::DiscardRecording => {
                if let Some(buffer) = self.buffer.as_mut() {
                    buffer.clear();
                }
                self.metrics = LevelMetrics::INVALID;
            }
            Effect::StartPlayback => self.start_playback()?,
        }
        Ok(())
    }

    fn hal_fault(&self, err: HalError, code: FaultCode) -> FaultCode {
        rt_error!(self.shared.log, self.now_us(), "{}", err);
        code
    }

    fn tone_spec(&self, tone: Tone) -> ToneSpec {
        match tone {
            Tone::Arm => self.config.arm_tone,
            Tone::Error => self.config.error_tone,
            Tone::Refuse => self.config.refuse_tone,
        }
    }

    /// Stop the speaker, give queued audio the grace period to drain,
    /// then power it down regardless.
    fn release_speaker(&mut self) {
        self.tone = None;
        self.speaker.stop();

        let grace_us = self.config.speaker_stop_grace_ms as i64 * 1000;
        let deadline = self.now_us() + grace_us;
        while self.speaker.is_playing() && self.now_us() < deadline {
            self.clock.sleep_us(DRAIN_POLL_US);
        }
        if self.speaker.is_playing() {
            rt_warn!(
                self.shared.log,
                self.now_us(),
                "speaker forced off after {} ms",
                self.config.speaker_stop_grace_ms
            );
        }

        self.speaker.release();
        self.shared.route.release(AudioRoute::Speaker);
    }

    /// Write all of `samples`, retrying partial writes.
    fn write_all(&mut self, samples: &[i16]) -> Result<(), HalError> {
        let mut off = 0;
        let mut last_progress = self.now_us();
        while off < samples.len() {
            let n = self.speaker.write(&samples[off..], WRITE_TIMEOUT)?;
            if n > 0 {
                off += n;
                last_progress = self.now_us();
            } else if self.now_us() - last_progress > WRITE_STALL_US {
                return Err(HalError::SpeakerWrite);
            }
        }
        Ok(())
    }

    /// Render and write one block of the pending tone.
    ///
    /// Returns `true` if anything was written.
    fn pump_tone(&mut self) -> bool {
        let Some(tone) = self.tone.as_mut() else {
            return false;
        };

        let mut block = [0i16; TONE_BLOCK];
        let n = tone.render(&mut block);
        if tone.is_done() {
            self.tone = None;
        }
        if n == 0 {
            return false;
        }

        if let Err(e) = self.write_all(&block[..n]) {
            self.tone = None;
            rt_warn!(self.shared.log, self.now_us(), "tone dropped: {}", e);
            if self.machine.mode() != Mode::Fault {
                self.dispatch(Event::Failed(FaultCode::SpeakerFailed));
            }
        }
        true
    }

    /// Advance the arming beep by one block or one drain poll.
    ///
    /// `ToneFinished` goes out once the tone is written and the speaker has
    /// drained or the grace period ran out.
    fn run_arming(&mut self) {
        if self.tone.is_some() {
            self.pump_tone();
            return;
        }

        let now = self.now_us();
        let grace_us = self.config.tone_grace_ms as i64 * 1000;
        let deadline = *self.arm_deadline_us.get_or_insert(now + grace_us);
        if self.speaker.is_playing() && now < deadline {
            self.clock.sleep_us(DRAIN_POLL_US);
            return;
        }

        self.dispatch(Event::ToneFinished);
    }

    /// Capture exactly one chunk, then feed it to the analyzers.
    fn run_capture(&mut self, sink: &mut dyn StatusSink) {
        let chunk_samples = self.config.chunk_samples;
        let want = match self.buffer.as_ref() {
            Some(buffer) => buffer.remaining().min(chunk_samples),
            None => 0,
        };
        if want == 0 {
            self.dispatch(Event::ChunkCaptured { full: true });
            return;
        }

        let mut filled = 0;
        while filled < want {
            let read = match self.buffer.as_mut() {
                Some(buffer) => {
                    let region = buffer.next_chunk(want);
                    self.mic.read(&mut region[filled..], CAPTURE_POLL)
                }
                None => Err(HalError::MicRead),
            };
            match read {
                Ok(n) => filled += n,
                Err(e) => {
                    rt_error!(self.shared.log, self.now_us(), "chunk read failed: {}", e);
                    self.dispatch(Event::Failed(FaultCode::CaptureFailed));
                    return;
                }
            }
            if filled < want {
                self.publish(sink);
            }
        }

        let Some(buffer) = self.buffer.as_mut() else {
            return;
        };
        let start = buffer.commit(filled);
        let full = buffer.is_full();
        let total = buffer.len();

        // Feedback from this chunk only
        let chunk = &buffer.samples()[start..start + filled];
        self.spectrum.update(chunk, chunk.len());
        self.metrics = self.meter.measure(chunk, chunk.len());
        rt_debug!(
            self.shared.log,
            self.clock.now_us(),
            "chunk {} samples, total {}",
            filled,
            total
        );

        self.publish(sink);
        self.dispatch(Event::ChunkCaptured { full });
    }

    /// Encode and decode the recording in place, then start output.
    fn start_playback(&mut self) -> Result<(), FaultCode> {
        let Some(buffer) = self.buffer.as_mut() else {
            return Err(FaultCode::CodecFailed);
        };

        let samples = buffer.len();
        if let Err(e) = adpcm::round_trip(buffer.samples_mut(), &mut self.encoded) {
            rt_error!(self.shared.log, self.clock.now_us(), "codec round trip: {}", e);
            return Err(FaultCode::CodecFailed);
        }
        rt_info!(
            self.shared.log,
            self.clock.now_us(),
            "codec {} samples -> {} bytes",
            samples,
            self.encoded.len()
        );

        self.tone = None;
        self.metrics = LevelMetrics::INVALID;
        self.playback = Some(Playback {
            started_us: self.now_us(),
            written: 0,
        });
        Ok(())
    }

    /// Playback position from wall-clock time since start.
    fn playback_pos(&self, playback: &Playback, len: usize) -> usize {
        let elapsed = (self.now_us() - playback.started_us).max(0) as u64;
        ((elapsed * self.config.sample_rate as u64 / 1_000_000) as usize).min(len)
    }

    fn run_playback(&mut self, sink: &mut dyn StatusSink) {
        let (Some(mut playback), Some(buffer)) = (self.playback, self.buffer.as_ref()) else {
            self.dispatch(Event::PlaybackFinished);
            return;
        };
        let len = buffer.len();

        if playback.written < len {
            match self.speaker.write(&buffer.samples()[playback.written..], WRITE_TIMEOUT) {
                Ok(n) => playback.written += n,
                Err(e) => {
                    rt_error!(self.shared.log, self.now_us(), "playback write failed: {}", e);
                    self.dispatch(Event::Failed(FaultCode::SpeakerFailed));
                    return;
                }
            }
            self.playback = Some(playback);
        } else {
            self.clock.sleep_us(DRAIN_POLL_US);
        }

        // The final position always reaches the sink
        let finished = playback.written >= len && !self.speaker.is_playing();
        if finished {
            self.limiter.force();
        }
        self.publish(sink);

        if finished {
            self.dispatch(Event::PlaybackFinished);
        }
    }

    /// Build and present a frame if the rate limiter allows it.
    fn publish(&mut self, sink: &mut dyn StatusSink) {
        let now = self.now_us();
        if !self.limiter.ready(now) {
            return;
        }

        let mode = self.machine.mode();
        let recorded = self.samples().len();
        let mut bins = None;
        let mut metrics = None;

        let (line1, line2) = match mode {
            Mode::Idle => {
                if self.buffer_available() {
                    (
                        String::from(status::IDLE_HINT_RECORD),
                        String::from(status::IDLE_HINT_REPLAY),
                    )
                } else {
                    (
                        String::from(status::UNAVAILABLE_HINT),
                        String::from(status::IDLE_HINT_REPLAY),
                    )
                }
            }
            Mode::ArmRecording => (String::from("beep... keep holding KEY2"), String::new()),
            Mode::Recording => {
                let elapsed_ms = ((now - self.record_started_us).max(0) / 1000) as u32;
                bins = Some(*self.spectrum.bins());
                metrics = Some(self.metrics);
                (
                    status::recording_line(elapsed_ms, self.max_ms, recorded),
                    status::metrics_line(&self.metrics),
                )
            }
            Mode::HoldAtMax => status::hold_lines(self.max_ms, recorded),
            Mode::Playing => {
                let pos = match self.playback {
                    Some(playback) => self.playback_pos(&playback, recorded),
                    None => 0,
                };
                if let Some(buffer) = self.buffer.as_ref() {
                    self.spectrum.update(buffer.samples(), pos);
                    self.metrics = self.meter.measure(buffer.samples(), pos);
                }
                bins = Some(*self.spectrum.bins());
                metrics = Some(self.metrics);
                (
                    status::playing_line(pos, recorded),
                    status::metrics_line(&self.metrics),
                )
            }
            Mode::Fault => (
                status::fault_line(self.shared.fault.code(), self.shared.fault.data()),
                String::from(status::FAULT_HINT),
            ),
        };

        let frame = StatusFrame {
            mode,
            title: status::title(mode),
            line1,
            line2,
            bins,
            metrics,
            footer: Footer::new(self.shared.route.get(), self.buffer_available()),
        };
        sink.present(&frame);
    }
}
