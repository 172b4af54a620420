//! Device firmware: peripherals, buffer sizing, control loop.
//!
//! Board wiring (StickS3):
//! - ES8311 on I2C0: SDA GPIO47, SCL GPIO48
//! - I2S0: MCLK GPIO18, BCLK GPIO17, WS GPIO15, DOUT GPIO14, DIN GPIO16
//! - KEY1 (replay) GPIO11, KEY2 (record) GPIO12, active low

use esp_idf_svc::hal::gpio::{PinDriver, Pull};
use esp_idf_svc::hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_svc::hal::i2s::config::{DataBitWidth, StdConfig};
use esp_idf_svc::hal::i2s::I2sDriver;
use esp_idf_svc::hal::peripherals::Peripherals;
use esp_idf_svc::hal::prelude::*;

use stick_voice_memo::audio::route::RouteSelector;
use stick_voice_memo::audio::sizer::{self, HeapAllocator};
use stick_voice_memo::config::{MemoryBudget, RecorderConfig};
use stick_voice_memo::fault::FaultState;
use stick_voice_memo::hal::audio::Clock;
use stick_voice_memo::hal::es8311::{Es8311, Es8311Config};
use stick_voice_memo::hal::esp::{self, AudioPath, EspClock, EspMicrophone, EspSpeaker};
use stick_voice_memo::input::ButtonTracker;
use stick_voice_memo::log_drain::LogDrain;
use stick_voice_memo::logging::LogStream;
use stick_voice_memo::recorder::{Recorder, Shared};
use stick_voice_memo::status::LogSink;

static LOG_STREAM: LogStream = LogStream::new();
static FAULT_STATE: FaultState = FaultState::new();
static ROUTE: RouteSelector = RouteSelector::new();

pub fn run() -> Result<(), Box<dyn std::error::Error>> {
    esp_idf_svc::sys::link_patches();
    esp_idf_svc::log::EspLogger::initialize_default();

    log::info!("{}", env!("VERSION_STRING"));

    let config = RecorderConfig::default();
    config.validate()?;

    // Size the buffer before the drivers take their DMA memory
    let (free_psram, free_heap) = esp::free_memory();
    let budget = MemoryBudget::from_free(free_psram, free_heap);
    log::info!(
        "free psram {} heap {} -> budget {} bytes",
        free_psram,
        free_heap,
        budget.bytes
    );
    let sized = sizer::allocate(&config, budget, &mut HeapAllocator);

    let peripherals = Peripherals::take()?;
    let pins = peripherals.pins;

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        pins.gpio47,
        pins.gpio48,
        &I2cConfig::new().baudrate(400.kHz().into()),
    )?;
    let codec = Es8311::new(
        i2c,
        Es8311Config {
            sample_rate: config.sample_rate,
            volume: config.volume,
            ..Default::default()
        },
    );

    let i2s_config = StdConfig::philips(config.sample_rate, DataBitWidth::Bits16);
    let i2s = I2sDriver::new_std_bidir(
        peripherals.i2s0,
        &i2s_config,
        pins.gpio17,
        pins.gpio16,
        pins.gpio14,
        Some(pins.gpio18),
        pins.gpio15,
    )?;

    let path = AudioPath::new(codec, i2s, config.sample_rate)?;
    let mic = EspMicrophone::new(path.clone());
    let speaker = EspSpeaker::new(path, config.volume);

    let mut key1 = PinDriver::input(pins.gpio11)?;
    key1.set_pull(Pull::Up)?;
    let mut key2 = PinDriver::input(pins.gpio12)?;
    key2.set_pull(Pull::Up)?;

    let clock = EspClock;
    let replay_hold_ms = config.replay_hold_ms;
    let shared = Shared {
        log: &LOG_STREAM,
        fault: &FAULT_STATE,
        route: &ROUTE,
    };
    let mut recorder = Recorder::new(config, sized, mic, speaker, clock, shared);
    recorder.power_on();

    let mut record_key = ButtonTracker::new(replay_hold_ms);
    let mut replay_key = ButtonTracker::new(replay_hold_ms);
    let mut drain = LogDrain::new();
    let mut sink = LogSink::new();

    loop {
        let now = clock.now_ms();
        let rec = record_key.update(key2.is_low(), now);
        let rep = replay_key.update(key1.is_low(), now);
        recorder.apply_input(rec, rep);
        recorder.step(&mut sink);
        drain.drain(&LOG_STREAM, clock.now_us());
    }
}
