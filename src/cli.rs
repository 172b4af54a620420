//! Host simulator front-end
//!
//! Runs the recorder against the simulated board with a scripted key
//! timeline and prints the status frames.

use clap::{Parser, ValueEnum};
use log::LevelFilter;

use stick_voice_memo::audio::route::RouteSelector;
use stick_voice_memo::audio::sizer::{self, HeapAllocator};
use stick_voice_memo::config::{ConfigError, MemoryBudget, RecorderConfig};
use stick_voice_memo::fault::FaultState;
use stick_voice_memo::hal::audio::Clock;
use stick_voice_memo::hal::sim::{SimBoard, Waveform};
use stick_voice_memo::input::ButtonTracker;
use stick_voice_memo::log_drain::LogDrain;
use stick_voice_memo::logging::LogStream;
use stick_voice_memo::machine::Mode;
use stick_voice_memo::recorder::{Recorder, Shared};
use stick_voice_memo::status::LogSink;

/// Simulated microphone input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Signal {
    Silence,
    Square,
    Sine,
}

/// StickVoiceMemo host simulator
#[derive(Parser, Debug)]
#[command(name = "voicememo")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Increase logging verbosity
    /// -v = status frames, -vv = debug (spectrum bars), -vvv = trace
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    pub quiet: bool,

    /// How long the record key is held (ms)
    #[arg(long, default_value_t = 1500)]
    pub hold_ms: u32,

    /// Microphone signal
    #[arg(long, value_enum, default_value_t = Signal::Sine)]
    pub signal: Signal,

    /// Signal amplitude
    #[arg(long, default_value_t = 8000)]
    pub amplitude: i16,

    /// Sine frequency (Hz)
    #[arg(long, default_value_t = 1000.0)]
    pub freq_hz: f32,

    /// Memory budget for the record buffer (KiB)
    #[arg(long, default_value_t = 1024)]
    pub budget_kib: usize,

    /// Maximum recording length (ms)
    #[arg(long, default_value_t = 30_000)]
    pub max_ms: u32,

    /// Make the microphone fail after this many samples
    #[arg(long)]
    pub fail_after: Option<u64>,

    /// Long-press replay once the first playback ends
    #[arg(long)]
    pub replay: bool,
}

impl Args {
    /// Get the log level filter based on verbosity flags
    pub fn log_level(&self) -> LevelFilter {
        if self.quiet {
            LevelFilter::Error
        } else {
            match self.verbose {
                0 => LevelFilter::Warn,
                1 => LevelFilter::Info,
                2 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            }
        }
    }

    fn waveform(&self) -> Waveform {
        match self.signal {
            Signal::Silence => Waveform::Silence,
            Signal::Square => Waveform::Square {
                amplitude: self.amplitude,
                half_period: 16,
            },
            Signal::Sine => Waveform::Sine {
                amplitude: self.amplitude,
                freq_hz: self.freq_hz,
            },
        }
    }
}

/// Initialize the logging system based on CLI arguments
pub fn init_logging(args: &Args) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(LevelFilter::Warn);
    builder.filter_module("voicememo", args.log_level());
    builder.filter_module("stick_voice_memo", args.log_level());
    builder.format_timestamp_millis().init();
}

/// Key press starts this long into the run.
const SCRIPT_START_MS: i64 = 100;

/// Give up after this much simulated time past the scripted actions.
const SCRIPT_TAIL_MS: i64 = 10_000;

static LOG_STREAM: LogStream = LogStream::new();
static FAULT_STATE: FaultState = FaultState::new();
static ROUTE: RouteSelector = RouteSelector::new();

pub fn run(args: &Args) -> Result<(), ConfigError> {
    let config = RecorderConfig {
        target_ms: args.max_ms,
        ..RecorderConfig::default()
    };
    config.validate()?;

    let budget = MemoryBudget::new(args.budget_kib * 1024);
    let sized = sizer::allocate(&config, budget, &mut HeapAllocator);

    let mut board = SimBoard::new(config.sample_rate, args.waveform());
    board.mic.fail_after(args.fail_after);
    let clock = board.clock.clone();

    let shared = Shared {
        log: &LOG_STREAM,
        fault: &FAULT_STATE,
        route: &ROUTE,
    };
    let replay_hold_ms = config.replay_hold_ms;
    let mut recorder = Recorder::new(config, sized, board.mic, board.speaker, board.clock, shared);
    recorder.power_on();

    let mut record_key = ButtonTracker::new(replay_hold_ms);
    let mut replay_key = ButtonTracker::new(replay_hold_ms);
    let mut replay_from: Option<i64> = None;
    let mut played = false;
    let mut drain = LogDrain::new();
    let mut sink = LogSink::new();

    let release_at = SCRIPT_START_MS + args.hold_ms as i64;
    let mut deadline = release_at + SCRIPT_TAIL_MS;

    loop {
        let now = clock.now_ms();
        let mode = recorder.mode();

        if mode == Mode::Playing {
            played = true;
        }
        if args.replay && played && replay_from.is_none() && mode == Mode::Idle {
            replay_from = Some(now);
            deadline = now + SCRIPT_TAIL_MS;
        }

        let record_level = (SCRIPT_START_MS..release_at).contains(&now);
        let replay_level = replay_from
            .map(|from| now - from < replay_hold_ms as i64 + 50)
            .unwrap_or(false);

        let rec = record_key.update(record_level, now);
        let rep = replay_key.update(replay_level, now);
        recorder.apply_input(rec, rep);
        recorder.step(&mut sink);
        drain.drain(&LOG_STREAM, clock.now_us());

        let replay_done = replay_from.is_some_and(|from| now - from > replay_hold_ms as i64 + 50);
        let script_done = now > release_at && (!args.replay || replay_done);
        let finished = match recorder.mode() {
            Mode::Idle => played,
            Mode::Fault => true,
            _ => false,
        };
        if (script_done && finished) || now > deadline {
            break;
        }
    }

    drain.drain(&LOG_STREAM, i64::MAX);
    log::warn!(
        target: "voicememo",
        "done: mode {} samples {} max {} ms, {} frames, {} log entries",
        recorder.mode().as_str(),
        recorder.samples().len(),
        recorder.max_duration_ms(),
        sink.frames(),
        drain.forwarded()
    );
    Ok(())
}
