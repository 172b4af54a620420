//! Simulated audio hardware for host runs and tests.
//!
//! Time only moves when something sleeps or waits on the shared
//! `SimClock`, so runs are deterministic. The microphone delivers samples
//! at the configured rate; the speaker drains its queue at the same rate.
//! Both report into an `ExclusivityMonitor` that remembers whether they
//! were ever powered together.

use core::time::Duration;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;

use super::audio::{Clock, HalError, Microphone, Speaker};

/// Shared simulated clock. Clones see the same time.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_us: Arc<AtomicI64>,
}

impl SimClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_us(&self, us: u64) {
        self.now_us.fetch_add(us as i64, Ordering::AcqRel);
    }
}

impl Clock for SimClock {
    fn now_us(&self) -> i64 {
        self.now_us.load(Ordering::Acquire)
    }

    fn sleep_us(&self, us: u64) {
        self.advance_us(us);
    }
}

/// Records whether microphone and speaker were ever powered together.
#[derive(Debug, Default)]
pub struct ExclusivityMonitor {
    mic: AtomicBool,
    speaker: AtomicBool,
    overlapped: AtomicBool,
}

impl ExclusivityMonitor {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::Acquire)
    }

    fn set_mic(&self, on: bool) {
        self.mic.store(on, Ordering::Release);
        self.check();
    }

    fn set_speaker(&self, on: bool) {
        self.speaker.store(on, Ordering::Release);
        self.check();
    }

    fn check(&self) {
        if self.mic.load(Ordering::Acquire) && self.speaker.load(Ordering::Acquire) {
            self.overlapped.store(true, Ordering::Release);
        }
    }
}

/// Signal fed to the simulated microphone.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Waveform {
    Silence,
    Constant(i16),
    /// Alternates `+amplitude` / `-amplitude` every `half_period` samples.
    Square { amplitude: i16, half_period: u32 },
    Sine { amplitude: i16, freq_hz: f32 },
}

impl Waveform {
    /// Sample number `n` since the microphone started.
    pub fn sample(&self, n: u64, sample_rate: u32) -> i16 {
        match *self {
            Waveform::Silence => 0,
            Waveform::Constant(v) => v,
            Waveform::Square {
                amplitude,
                half_period,
            } => {
                if (n / half_period.max(1) as u64) % 2 == 0 {
                    amplitude
                } else {
                    amplitude.saturating_neg()
                }
            }
            Waveform::Sine { amplitude, freq_hz } => {
                let t = n as f64 / sample_rate as f64;
                let v = (2.0 * core::f64::consts::PI * freq_hz as f64 * t).sin();
                (v * amplitude as f64) as i16
            }
        }
    }
}

fn samples_to_us(samples: u64, sample_rate: u32) -> u64 {
    (samples * 1_000_000).div_ceil(sample_rate.max(1) as u64)
}

/// Simulated microphone.
#[derive(Debug)]
pub struct SimMicrophone {
    clock: SimClock,
    monitor: Arc<ExclusivityMonitor>,
    sample_rate: u32,
    waveform: Waveform,
    running: bool,
    started_at: i64,
    produced: u64,
    fail_start: bool,
    fail_after: Option<u64>,
    starts: u32,
}

impl SimMicrophone {
    pub fn new(
        clock: SimClock,
        monitor: Arc<ExclusivityMonitor>,
        sample_rate: u32,
        waveform: Waveform,
    ) -> Self {
        Self {
            clock,
            monitor,
            sample_rate,
            waveform,
            running: false,
            started_at: 0,
            produced: 0,
            fail_start: false,
            fail_after: None,
            starts: 0,
        }
    }

    pub fn set_waveform(&mut self, waveform: Waveform) {
        self.waveform = waveform;
    }

    /// Make the next `start` fail.
    pub fn fail_start(&mut self, fail: bool) {
        self.fail_start = fail;
    }

    /// Fail reads once `samples` have been delivered since start.
    pub fn fail_after(&mut self, samples: Option<u64>) {
        self.fail_after = samples;
    }

    /// Number of successful starts.
    pub fn starts(&self) -> u32 {
        self.starts
    }

    /// Samples delivered since the last start.
    pub fn produced(&self) -> u64 {
        self.produced
    }

    fn ready(&self) -> u64 {
        let elapsed = (self.clock.now_us() - self.started_at).max(0) as u64;
        (elapsed * self.sample_rate as u64 / 1_000_000).saturating_sub(self.produced)
    }
}

impl Microphone for SimMicrophone {
    fn start(&mut self) -> Result<(), HalError> {
        if self.fail_start {
            return Err(HalError::MicStart);
        }
        self.running = true;
        self.started_at = self.clock.now_us();
        self.produced = 0;
        self.starts += 1;
        self.monitor.set_mic(true);
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
        self.monitor.set_mic(false);
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn read(&mut self, buf: &mut [i16], timeout: Duration) -> Result<usize, HalError> {
        if !self.running {
            return Err(HalError::MicRead);
        }
        if let Some(limit) = self.fail_after {
            if self.produced >= limit {
                return Err(HalError::MicRead);
            }
        }

        let wanted = buf.len() as u64;
        let ready = self.ready();
        if ready < wanted {
            let wait = samples_to_us(wanted - ready, self.sample_rate);
            self.clock.sleep_us(wait.min(timeout.as_micros() as u64));
        }

        let mut count = self.ready().min(wanted);
        if let Some(limit) = self.fail_after {
            count = count.min(limit - self.produced);
        }
        for (i, slot) in buf[..count as usize].iter_mut().enumerate() {
            *slot = self.waveform.sample(self.produced + i as u64, self.sample_rate);
        }
        self.produced += count;
        Ok(count as usize)
    }
}

/// Simulated speaker.
#[derive(Debug)]
pub struct SimSpeaker {
    clock: SimClock,
    monitor: Arc<ExclusivityMonitor>,
    sample_rate: u32,
    queue_samples: u64,
    running: bool,
    /// Time the queued audio finishes playing.
    drained_at: i64,
    written: Vec<i16>,
    fail_start: bool,
    fail_write: bool,
    starts: u32,
    releases: u32,
}

impl SimSpeaker {
    /// `queue_samples` is the DMA depth.
    pub fn new(
        clock: SimClock,
        monitor: Arc<ExclusivityMonitor>,
        sample_rate: u32,
        queue_samples: u64,
    ) -> Self {
        Self {
            clock,
            monitor,
            sample_rate,
            queue_samples: queue_samples.max(1),
            running: false,
            drained_at: 0,
            written: Vec::new(),
            fail_start: false,
            fail_write: false,
            starts: 0,
            releases: 0,
        }
    }

    pub fn fail_start(&mut self, fail: bool) {
        self.fail_start = fail;
    }

    pub fn fail_write(&mut self, fail: bool) {
        self.fail_write = fail;
    }

    /// Every sample ever accepted, in order.
    pub fn written(&self) -> &[i16] {
        &self.written
    }

    pub fn clear_written(&mut self) {
        self.written.clear();
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }

    pub fn releases(&self) -> u32 {
        self.releases
    }

    fn queued(&self) -> u64 {
        let left_us = (self.drained_at - self.clock.now_us()).max(0) as u64;
        (left_us * self.sample_rate as u64).div_ceil(1_000_000)
    }
}

impl Speaker for SimSpeaker {
    fn start(&mut self) -> Result<(), HalError> {
        if self.fail_start {
            return Err(HalError::SpeakerStart);
        }
        self.running = true;
        self.starts += 1;
        self.monitor.set_speaker(true);
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn release(&mut self) {
        self.running = false;
        self.drained_at = self.clock.now_us();
        self.releases += 1;
        self.monitor.set_speaker(false);
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn is_playing(&self) -> bool {
        self.clock.now_us() < self.drained_at
    }

    fn write(&mut self, samples: &[i16], timeout: Duration) -> Result<usize, HalError> {
        if !self.running || self.fail_write {
            return Err(HalError::SpeakerWrite);
        }

        let wanted = samples.len() as u64;
        let room = self.queue_samples.saturating_sub(self.queued());
        if room < wanted {
            let wait = samples_to_us(wanted - room, self.sample_rate);
            self.clock.sleep_us(wait.min(timeout.as_micros() as u64));
        }

        let room = self.queue_samples.saturating_sub(self.queued());
        let count = room.min(wanted) as usize;
        if count == 0 {
            return Ok(0);
        }

        let now = self.clock.now_us();
        let start = self.drained_at.max(now);
        self.written.extend_from_slice(&samples[..count]);
        self.drained_at = start + samples_to_us(count as u64, self.sample_rate) as i64;
        Ok(count)
    }
}

/// Clock, microphone and speaker wired to one monitor.
#[derive(Debug)]
pub struct SimBoard {
    pub clock: SimClock,
    pub monitor: Arc<ExclusivityMonitor>,
    pub mic: SimMicrophone,
    pub speaker: SimSpeaker,
}

impl SimBoard {
    /// DMA depth of the simulated speaker: 6 buffers of 256 frames.
    pub const SPEAKER_QUEUE: u64 = 6 * 256;

    pub fn new(sample_rate: u32, waveform: Waveform) -> Self {
        let clock = SimClock::new();
        let monitor = ExclusivityMonitor::new();
        Self {
            mic: SimMicrophone::new(clock.clone(), monitor.clone(), sample_rate, waveform),
            speaker: SimSpeaker::new(clock.clone(), monitor.clone(), sample_rate, Self::SPEAKER_QUEUE),
            clock,
            monitor,
        }
    }
}
