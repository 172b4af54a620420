//! ESP-IDF drivers: ES8311 over I2C, bidirectional I2S, esp_timer clock.
//!
//! Microphone and speaker are two handles on one `AudioPath`; the codec
//! path switch happens in their `start`/`release`.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use esp_idf_svc::hal::delay::{Ets, FreeRtos, TickType, BLOCK};
use esp_idf_svc::hal::i2c::I2cDriver;
use esp_idf_svc::hal::i2s::{I2sBiDir, I2sDriver};
use esp_idf_svc::sys::{self, EspError};

use super::audio::{transfer_samples, Clock, HalError, Microphone, Speaker};
use super::es8311::{CodecPath, ControlBus, Es8311};

impl ControlBus for I2cDriver<'_> {
    fn write_reg(&mut self, addr: u8, reg: u8, val: u8) -> Result<(), HalError> {
        self.write(addr, &[reg, val], BLOCK).map_err(|_| HalError::Bus)
    }

    fn read_reg(&mut self, addr: u8, reg: u8) -> Result<u8, HalError> {
        let mut buf = [0u8; 1];
        self.write_read(addr, &[reg], &mut buf, BLOCK)
            .map_err(|_| HalError::Bus)?;
        Ok(buf[0])
    }
}

/// `esp_timer` clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspClock;

impl Clock for EspClock {
    fn now_us(&self) -> i64 {
        // SAFETY: esp_timer_get_time is always safe to call after boot
        unsafe { sys::esp_timer_get_time() }
    }

    fn sleep_us(&self, us: u64) {
        if us >= 1000 {
            FreeRtos::delay_ms((us / 1000) as u32);
        } else {
            Ets::delay_us(us as u32);
        }
    }
}

/// Free PSRAM and internal heap in bytes.
pub fn free_memory() -> (usize, usize) {
    // SAFETY: heap_caps_get_free_size only reads allocator state
    unsafe {
        (
            sys::heap_caps_get_free_size(sys::MALLOC_CAP_SPIRAM),
            sys::heap_caps_get_free_size(sys::MALLOC_CAP_INTERNAL | sys::MALLOC_CAP_8BIT),
        )
    }
}

fn ticks(timeout: Duration) -> u32 {
    TickType::from(timeout).ticks()
}

fn is_timeout(e: &EspError) -> bool {
    e.code() == sys::ESP_ERR_TIMEOUT as sys::esp_err_t
}

/// The shared codec + I2S bus.
pub struct AudioPath<'d> {
    codec: Es8311<I2cDriver<'d>>,
    i2s: I2sDriver<'d, I2sBiDir>,
    sample_rate: u32,
    rx_on: bool,
    tx_on: bool,
    /// Estimated time the TX DMA queue runs dry.
    drained_at: i64,
}

impl<'d> AudioPath<'d> {
    pub fn new(
        mut codec: Es8311<I2cDriver<'d>>,
        i2s: I2sDriver<'d, I2sBiDir>,
        sample_rate: u32,
    ) -> Result<Rc<RefCell<Self>>, HalError> {
        codec.init()?;
        Ok(Rc::new(RefCell::new(Self {
            codec,
            i2s,
            sample_rate,
            rx_on: false,
            tx_on: false,
            drained_at: 0,
        })))
    }
}

/// Microphone half of the audio path.
pub struct EspMicrophone<'d> {
    path: Rc<RefCell<AudioPath<'d>>>,
    bytes: Vec<u8>,
}

impl<'d> EspMicrophone<'d> {
    pub fn new(path: Rc<RefCell<AudioPath<'d>>>) -> Self {
        Self {
            path,
            bytes: Vec::new(),
        }
    }
}

impl Microphone for EspMicrophone<'_> {
    fn start(&mut self) -> Result<(), HalError> {
        let mut p = self.path.borrow_mut();
        p.codec.set_path(CodecPath::Adc)?;
        p.i2s.rx_enable().map_err(|_| HalError::MicStart)?;
        p.rx_on = true;
        Ok(())
    }

    fn stop(&mut self) {
        let mut p = self.path.borrow_mut();
        if p.rx_on {
            let _ = p.i2s.rx_disable();
            p.rx_on = false;
        }
        let _ = p.codec.set_path(CodecPath::Off);
    }

    fn is_running(&self) -> bool {
        self.path.borrow().rx_on
    }

    fn read(&mut self, buf: &mut [i16], timeout: Duration) -> Result<usize, HalError> {
        self.bytes.resize(buf.len() * 2, 0);
        let mut p = self.path.borrow_mut();
        let samples = transfer_samples(
            p.i2s.read(&mut self.bytes, ticks(timeout)),
            is_timeout,
            HalError::MicRead,
        )?;

        for (slot, pair) in buf.iter_mut().zip(self.bytes[..samples * 2].chunks_exact(2)) {
            *slot = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(samples)
    }
}

/// Speaker half of the audio path.
pub struct EspSpeaker<'d> {
    path: Rc<RefCell<AudioPath<'d>>>,
    volume: u8,
    bytes: Vec<u8>,
}

impl<'d> EspSpeaker<'d> {
    pub fn new(path: Rc<RefCell<AudioPath<'d>>>, volume: u8) -> Self {
        Self {
            path,
            volume,
            bytes: Vec::new(),
        }
    }
}

impl Speaker for EspSpeaker<'_> {
    fn start(&mut self) -> Result<(), HalError> {
        let mut p = self.path.borrow_mut();
        p.codec.set_path(CodecPath::Dac)?;
        p.codec.set_volume(self.volume)?;
        p.codec.mute(false)?;
        p.i2s.tx_enable().map_err(|_| HalError::SpeakerStart)?;
        p.tx_on = true;
        Ok(())
    }

    fn stop(&mut self) {
        // Nothing new is queued after this; DMA drains until release
    }

    fn release(&mut self) {
        let mut p = self.path.borrow_mut();
        let _ = p.codec.mute(true);
        if p.tx_on {
            let _ = p.i2s.tx_disable();
            p.tx_on = false;
        }
        let _ = p.codec.set_path(CodecPath::Off);
        p.drained_at = 0;
    }

    fn is_running(&self) -> bool {
        self.path.borrow().tx_on
    }

    fn is_playing(&self) -> bool {
        // SAFETY: see EspClock
        let now = unsafe { sys::esp_timer_get_time() };
        now < self.path.borrow().drained_at
    }

    fn write(&mut self, samples: &[i16], timeout: Duration) -> Result<usize, HalError> {
        self.bytes.clear();
        for s in samples {
            self.bytes.extend_from_slice(&s.to_le_bytes());
        }

        let mut p = self.path.borrow_mut();
        if !p.tx_on {
            return Err(HalError::SpeakerWrite);
        }
        let accepted = transfer_samples(
            p.i2s.write(&self.bytes, ticks(timeout)),
            is_timeout,
            HalError::SpeakerWrite,
        )?;

        // SAFETY: see EspClock
        let now = unsafe { sys::esp_timer_get_time() };
        let dur_us = accepted as i64 * 1_000_000 / p.sample_rate.max(1) as i64;
        p.drained_at = p.drained_at.max(now) + dur_us;
        Ok(accepted)
    }
}
