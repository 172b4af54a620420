//! Recorder tests on the simulated board

use std::sync::Arc;

use stick_voice_memo::audio::level::LevelMeter;
use stick_voice_memo::audio::route::{AudioRoute, RouteSelector};
use stick_voice_memo::audio::sizer::{self, HeapAllocator, SizedBuffer};
use stick_voice_memo::config::{MemoryBudget, RecorderConfig};
use stick_voice_memo::fault::{FaultCode, FaultState};
use stick_voice_memo::hal::audio::{Clock, Microphone, Speaker};
use stick_voice_memo::hal::sim::{
    ExclusivityMonitor, SimBoard, SimClock, SimMicrophone, SimSpeaker, Waveform,
};
use stick_voice_memo::input::ButtonTracker;
use stick_voice_memo::logging::LogStream;
use stick_voice_memo::machine::Mode;
use stick_voice_memo::recorder::{Recorder, Shared};
use stick_voice_memo::status::{self, CollectSink, NullSink, StatusSink};

type SimRecorder<'a> = Recorder<'a, SimMicrophone, SimSpeaker, SimClock>;

const SQUARE: Waveform = Waveform::Square {
    amplitude: 8000,
    half_period: 16,
};

/// Arm beep: 60 ms at 16 kHz.
const ARM_SAMPLES: usize = 960;

/// Enough steps to play the beep block by block and drain it.
const ARM_STEPS: usize = 200;

struct Rig {
    log: LogStream,
    fault: FaultState,
    route: RouteSelector,
}

impl Rig {
    fn new() -> Self {
        Self {
            log: LogStream::new(),
            fault: FaultState::new(),
            route: RouteSelector::new(),
        }
    }

    fn shared(&self) -> Shared<'_> {
        Shared {
            log: &self.log,
            fault: &self.fault,
            route: &self.route,
        }
    }
}

fn small_config() -> RecorderConfig {
    RecorderConfig {
        floor_ms: 1_000,
        target_ms: 4_000,
        ..RecorderConfig::default()
    }
}

fn sized(config: &RecorderConfig) -> Option<SizedBuffer> {
    sizer::allocate(config, MemoryBudget::new(1024 * 1024), &mut HeapAllocator)
}

/// Build a powered-on recorder. `setup` adjusts the board before it is
/// handed over.
fn build<'a>(
    rig: &'a Rig,
    config: RecorderConfig,
    buffer: Option<SizedBuffer>,
    setup: impl FnOnce(&mut SimBoard),
) -> (SimRecorder<'a>, Arc<ExclusivityMonitor>) {
    let mut board = SimBoard::new(config.sample_rate, SQUARE);
    setup(&mut board);
    let monitor = Arc::clone(&board.monitor);
    let mut recorder = Recorder::new(
        config,
        buffer,
        board.mic,
        board.speaker,
        board.clock,
        rig.shared(),
    );
    recorder.power_on();
    (recorder, monitor)
}

fn default_rig(rig: &Rig) -> (SimRecorder<'_>, Arc<ExclusivityMonitor>) {
    let config = small_config();
    let buffer = sized(&config);
    build(rig, config, buffer, |_| {})
}

/// Step until `mode` is reached. Panics after `max_steps`.
fn step_until(
    recorder: &mut SimRecorder<'_>,
    sink: &mut dyn StatusSink,
    mode: Mode,
    max_steps: usize,
) {
    for _ in 0..max_steps {
        if recorder.mode() == mode {
            return;
        }
        recorder.step(sink);
    }
    assert_eq!(recorder.mode(), mode, "not reached in {} steps", max_steps);
}

/// Press, beep, capture one chunk, release.
fn record_one_chunk(recorder: &mut SimRecorder<'_>, sink: &mut dyn StatusSink) {
    recorder.press_record();
    assert_eq!(recorder.mode(), Mode::ArmRecording);

    step_until(recorder, sink, Mode::Recording, ARM_STEPS);

    recorder.step(sink);
    assert_eq!(recorder.mode(), Mode::Recording);
    assert_eq!(recorder.samples().len(), 512);

    recorder.release_record();
    assert_eq!(recorder.mode(), Mode::Playing);
}

#[test]
fn test_powers_on_idle_with_speaker() {
    let rig = Rig::new();
    let (recorder, _) = default_rig(&rig);
    assert_eq!(recorder.mode(), Mode::Idle);
    assert!(recorder.buffer_available());
    assert_eq!(recorder.max_duration_ms(), 4_000);
    assert_eq!(recorder.route(), AudioRoute::Speaker);
    assert!(recorder.speaker().is_running());
}

#[test]
fn test_one_chunk_end_to_end() {
    let rig = Rig::new();
    let (mut recorder, monitor) = default_rig(&rig);
    let mut sink = CollectSink::default();

    record_one_chunk(&mut recorder, &mut sink);
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);

    // Playback is the codec round trip of the capture
    let samples = recorder.samples();
    assert_eq!(samples.len(), 512);
    let written = recorder.speaker().written();
    assert_eq!(written.len(), ARM_SAMPLES + 512);
    assert_eq!(&written[ARM_SAMPLES..], samples);

    let m = LevelMeter::default().measure(samples, samples.len());
    assert!(m.valid);
    assert_eq!(m.clip_percent, 0.0);
    assert!(
        (m.peak_dbfs - -12.25).abs() <= 2.0,
        "decoded peak {} dBFS",
        m.peak_dbfs
    );

    // The recorder's own last playing frame reports the end of the clip
    let done = sink
        .frames
        .iter()
        .rev()
        .find(|f| f.mode == Mode::Playing)
        .unwrap();
    assert_eq!(done.line1, status::playing_line(512, 512));
    let pm = done.metrics.unwrap();
    assert!(pm.valid);
    assert_eq!(pm.clip_percent, 0.0);
    assert!(
        (pm.peak_dbfs - -12.25).abs() <= 2.0,
        "playback peak {} dBFS",
        pm.peak_dbfs
    );
    assert_eq!(done.line2, status::metrics_line(&pm));

    assert_eq!(recorder.microphone().starts(), 1);
    assert!(!monitor.overlapped());
}

#[test]
fn test_capture_feeds_meters() {
    let rig = Rig::new();
    let (mut recorder, _) = default_rig(&rig);
    let mut sink = NullSink;

    recorder.press_record();
    step_until(&mut recorder, &mut sink, Mode::Recording, ARM_STEPS);
    recorder.step(&mut sink);
    assert_eq!(recorder.mode(), Mode::Recording);

    let m = recorder.metrics();
    assert!(m.valid);
    assert!((m.peak_dbfs - -12.25).abs() < 0.01, "peak {}", m.peak_dbfs);
    assert_eq!(m.clip_percent, 0.0);
    // 500 Hz fundamental
    assert!(recorder.spectrum()[4] > 0);
}

#[test]
fn test_release_during_beep_never_starts_microphone() {
    let rig = Rig::new();
    let (mut recorder, monitor) = default_rig(&rig);
    let mut sink = NullSink;

    recorder.press_record();
    recorder.release_record();
    assert_eq!(recorder.mode(), Mode::ArmRecording);
    step_until(&mut recorder, &mut sink, Mode::Idle, ARM_STEPS);

    assert_eq!(recorder.microphone().starts(), 0);
    assert_eq!(recorder.speaker().written().len(), ARM_SAMPLES);
    assert!(recorder.samples().is_empty());
    assert!(!monitor.overlapped());
}

#[test]
fn test_release_before_first_chunk_plays_after_it() {
    let rig = Rig::new();
    let (mut recorder, monitor) = default_rig(&rig);
    let mut sink = NullSink;

    recorder.press_record();
    step_until(&mut recorder, &mut sink, Mode::Recording, ARM_STEPS);

    recorder.release_record();
    assert_eq!(recorder.mode(), Mode::Recording);

    recorder.step(&mut sink);
    assert_eq!(recorder.mode(), Mode::Playing);
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);
    assert_eq!(recorder.samples().len(), 512);
    assert!(!monitor.overlapped());
}

#[test]
fn test_hold_at_max_then_release_plays() {
    let rig = Rig::new();
    let config = RecorderConfig {
        floor_ms: 64,
        target_ms: 64,
        ..RecorderConfig::default()
    };
    let buffer = sized(&config);
    let (mut recorder, monitor) = build(&rig, config, buffer, |_| {});
    let mut sink = NullSink;

    recorder.press_record();
    step_until(&mut recorder, &mut sink, Mode::HoldAtMax, ARM_STEPS);
    assert_eq!(recorder.samples().len(), 1024);
    assert!(!recorder.microphone().is_running());
    assert_eq!(recorder.route(), AudioRoute::Speaker);

    // Stays put while the key is held
    for _ in 0..5 {
        recorder.step(&mut sink);
    }
    assert_eq!(recorder.mode(), Mode::HoldAtMax);

    recorder.release_record();
    assert_eq!(recorder.mode(), Mode::Playing);
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);
    assert_eq!(recorder.samples().len(), 1024);
    assert!(!monitor.overlapped());
}

#[test]
fn test_capture_failure_enters_fault() {
    let rig = Rig::new();
    let config = small_config();
    let buffer = sized(&config);
    let (mut recorder, monitor) = build(&rig, config, buffer, |board| {
        board.mic.fail_after(Some(600));
    });
    let mut sink = CollectSink::default();

    recorder.press_record();
    step_until(&mut recorder, &mut sink, Mode::Recording, ARM_STEPS);
    recorder.step(&mut sink);
    assert_eq!(recorder.samples().len(), 512);

    // Second chunk breaks off after 88 samples
    recorder.step(&mut sink);
    assert_eq!(recorder.mode(), Mode::Fault);
    assert!(rig.fault.is_active());
    assert_eq!(rig.fault.code(), FaultCode::CaptureFailed);
    assert_eq!(rig.fault.data(), 512);
    assert!(recorder.samples().is_empty());
    assert!(!recorder.machine().has_recording());
    assert!(!recorder.microphone().is_running());
    assert_eq!(recorder.route(), AudioRoute::Speaker);

    // Error cue goes out, fault text is shown
    recorder.speaker_mut().clear_written();
    for _ in 0..20 {
        recorder.step(&mut sink);
    }
    assert_eq!(recorder.speaker().written().len(), 1920);
    let last = sink.frames.last().unwrap();
    assert_eq!(last.mode, Mode::Fault);
    assert_eq!(last.line1, "MIC read failed (512 samples)");
    assert_eq!(last.line2, status::FAULT_HINT);

    // Nothing to replay
    recorder.request_replay();
    assert_eq!(recorder.mode(), Mode::Fault);

    // Next press clears the fault
    recorder.press_record();
    assert_eq!(recorder.mode(), Mode::ArmRecording);
    assert!(!rig.fault.is_active());
    assert!(!monitor.overlapped());
}

#[test]
fn test_microphone_start_failure() {
    let rig = Rig::new();
    let config = small_config();
    let buffer = sized(&config);
    let (mut recorder, monitor) = build(&rig, config, buffer, |board| {
        board.mic.fail_start(true);
    });
    let mut sink = NullSink;

    recorder.press_record();
    step_until(&mut recorder, &mut sink, Mode::Fault, ARM_STEPS);

    assert_eq!(recorder.mode(), Mode::Fault);
    assert_eq!(rig.fault.code(), FaultCode::MicStartFailed);
    assert_eq!(recorder.microphone().starts(), 0);
    assert!(recorder.speaker().is_running(), "speaker restored");
    assert!(!monitor.overlapped());
}

#[test]
fn test_speaker_failure_during_playback() {
    let rig = Rig::new();
    let (mut recorder, _) = default_rig(&rig);
    let mut sink = NullSink;

    recorder.press_record();
    step_until(&mut recorder, &mut sink, Mode::Recording, ARM_STEPS);
    recorder.step(&mut sink);
    recorder.speaker_mut().fail_write(true);
    recorder.release_record();
    assert_eq!(recorder.mode(), Mode::Playing);

    recorder.step(&mut sink);
    assert_eq!(recorder.mode(), Mode::Fault);
    assert_eq!(rig.fault.code(), FaultCode::SpeakerFailed);

    // Cue write fails too; the recorder stays in fault without looping
    for _ in 0..5 {
        recorder.step(&mut sink);
    }
    assert_eq!(recorder.mode(), Mode::Fault);
}

#[test]
fn test_speaker_start_failure_at_power_on() {
    let rig = Rig::new();
    let config = small_config();
    let buffer = sized(&config);
    let (recorder, _) = build(&rig, config, buffer, |board| {
        board.speaker.fail_start(true);
    });
    assert_eq!(recorder.mode(), Mode::Fault);
    assert_eq!(rig.fault.code(), FaultCode::SpeakerFailed);
}

#[test]
fn test_replay_without_recording_refused() {
    let rig = Rig::new();
    let (mut recorder, _) = default_rig(&rig);
    let mut sink = NullSink;

    recorder.request_replay();
    assert_eq!(recorder.mode(), Mode::Idle);
    for _ in 0..10 {
        recorder.step(&mut sink);
    }
    // Refuse cue only
    assert_eq!(recorder.speaker().written().len(), ARM_SAMPLES);
    assert_eq!(recorder.mode(), Mode::Idle);
}

#[test]
fn test_replay_plays_last_recording() {
    let rig = Rig::new();
    let (mut recorder, monitor) = default_rig(&rig);
    let mut sink = NullSink;

    record_one_chunk(&mut recorder, &mut sink);
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);
    recorder.speaker_mut().clear_written();

    recorder.request_replay();
    assert_eq!(recorder.mode(), Mode::Playing);
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);

    assert_eq!(recorder.speaker().written(), recorder.samples());
    assert_eq!(recorder.samples().len(), 512);
    assert!(!monitor.overlapped());
}

#[test]
fn test_new_recording_replaces_old() {
    let rig = Rig::new();
    let (mut recorder, _) = default_rig(&rig);
    let mut sink = NullSink;

    record_one_chunk(&mut recorder, &mut sink);
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);

    recorder.press_record();
    step_until(&mut recorder, &mut sink, Mode::Recording, ARM_STEPS);
    recorder.step(&mut sink);
    recorder.step(&mut sink);
    assert_eq!(recorder.samples().len(), 1024);
    recorder.release_record();
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);
    assert_eq!(recorder.samples().len(), 1024);
}

#[test]
fn test_unavailable_buffer_refuses_record() {
    let rig = Rig::new();
    let (mut recorder, monitor) = build(&rig, small_config(), None, |_| {});
    let mut sink = CollectSink::default();

    assert!(!recorder.buffer_available());
    recorder.press_record();
    assert_eq!(recorder.mode(), Mode::Idle);
    for _ in 0..10 {
        recorder.step(&mut sink);
    }

    assert_eq!(recorder.microphone().starts(), 0);
    assert_eq!(recorder.speaker().written().len(), ARM_SAMPLES);
    let frame = sink.frames.last().unwrap();
    assert_eq!(frame.line1, status::UNAVAILABLE_HINT);
    assert!(!frame.footer.buffer_ok);
    assert!(!monitor.overlapped());
}

#[test]
fn test_status_frames_follow_route() {
    let rig = Rig::new();
    let (mut recorder, _) = default_rig(&rig);
    let mut sink = CollectSink::default();

    record_one_chunk(&mut recorder, &mut sink);
    step_until(&mut recorder, &mut sink, Mode::Idle, 1000);
    recorder.step(&mut sink);

    let recording: Vec<_> = sink
        .frames
        .iter()
        .filter(|f| f.mode == Mode::Recording)
        .collect();
    assert!(!recording.is_empty());
    for frame in &recording {
        assert!(frame.footer.mic_on && !frame.footer.speaker_on);
        assert!(frame.bins.is_some());
        assert_eq!(frame.title, "RECORDING");
    }

    assert!(sink.frames.iter().any(|f| f.mode == Mode::Playing));
    for frame in sink.frames.iter().filter(|f| f.mode == Mode::Playing) {
        assert!(frame.footer.speaker_on && !frame.footer.mic_on);
        assert!(frame.line1.starts_with("playing... pos:"));
    }

    let last = sink.frames.last().unwrap();
    assert_eq!(last.mode, Mode::Idle);
    assert_eq!(last.line1, status::IDLE_HINT_RECORD);
}

#[test]
fn test_clock_only_moves_when_waiting() {
    let rig = Rig::new();
    let (mut recorder, _) = default_rig(&rig);
    let t0 = recorder.clock().now_us();
    recorder.press_record();
    assert_eq!(recorder.clock().now_us(), t0);

    // First beep block fits the speaker queue without waiting
    recorder.step(&mut NullSink);
    assert_eq!(recorder.mode(), Mode::ArmRecording);
    assert_eq!(recorder.clock().now_us(), t0);

    // Beep plus drain wait
    step_until(&mut recorder, &mut NullSink, Mode::Recording, ARM_STEPS);
    assert!(recorder.clock().now_us() - t0 >= 60_000);
}

#[test]
fn test_key_released_during_beep_drives_back_to_idle() {
    let rig = Rig::new();
    let (mut recorder, monitor) = default_rig(&rig);
    let mut sink = CollectSink::default();
    let mut record_key = ButtonTracker::new(650);
    let mut replay_key = ButtonTracker::new(650);
    let mut armed = false;

    // Key down from 100 ms to 120 ms, well inside the 60 ms beep plus drain
    loop {
        let now = recorder.clock().now_ms();
        if now > 1_000 {
            break;
        }
        let rec = record_key.update((100..120).contains(&now), now);
        let rep = replay_key.update(false, now);
        recorder.apply_input(rec, rep);
        armed |= recorder.mode() == Mode::ArmRecording;
        recorder.step(&mut sink);
        assert_ne!(recorder.mode(), Mode::Recording, "at {} ms", now);
    }

    assert!(armed);
    assert_eq!(recorder.mode(), Mode::Idle);
    assert_eq!(recorder.microphone().starts(), 0);
    assert_eq!(recorder.speaker().written().len(), ARM_SAMPLES);
    assert!(recorder.samples().is_empty());
    assert!(sink.frames.iter().all(|f| !f.footer.mic_on));
    assert!(!monitor.overlapped());
}

#[test]
fn test_spectrum_carries_into_playback() {
    let rig = Rig::new();
    let (mut recorder, _) = default_rig(&rig);
    let mut sink = NullSink;

    record_one_chunk(&mut recorder, &mut sink);
    assert_eq!(recorder.mode(), Mode::Playing);
    // 500 Hz bin from the last capture chunk is still showing
    assert!(recorder.spectrum()[4] > 0);

    // Position is still below the minimum window: bins held, not cleared
    recorder.step(&mut sink);
    assert!(recorder.spectrum()[4] > 0);
}
