//! ES8311 audio codec driver
//!
//! Control side only (register writes over a `ControlBus`); audio data
//! goes over I2S. The chip has one ADC and one DAC that share clocks, so
//! the driver keeps exactly one of them powered at a time.
//! Reference: ES8311 datasheet

use super::audio::HalError;

/// ES8311 I2C address (depends on AD0 pin)
pub const ES8311_ADDR: u8 = 0x18; // AD0 = LOW

/// Expected value of CHIP_ID1.
pub const CHIP_ID: u8 = 0x83;

/// ES8311 register addresses
#[allow(dead_code)]
pub mod regs {
    pub const RESET: u8 = 0x00;
    pub const CLK_MANAGER1: u8 = 0x01;
    pub const CLK_MANAGER2: u8 = 0x02;
    pub const CLK_MANAGER3: u8 = 0x03;
    pub const SDP_IN: u8 = 0x09;
    pub const SDP_OUT: u8 = 0x0A;
    pub const SYS_POWER: u8 = 0x0D;
    pub const SYS_ADC_POWER: u8 = 0x0E;
    pub const SYS_DAC_POWER: u8 = 0x12;
    pub const SYS_HP_DRIVE: u8 = 0x13;
    pub const ADC_PGA_GAIN: u8 = 0x14;
    pub const ADC_VOL: u8 = 0x17;
    pub const DAC_MUTE: u8 = 0x31;
    pub const DAC_VOL: u8 = 0x32;
    pub const CHIP_ID1: u8 = 0xFD;
    pub const CHIP_ID2: u8 = 0xFE;
}

const ADC_POWER_UP: u8 = 0x02;
const ADC_POWER_DOWN: u8 = 0x6A;
const DAC_POWER_UP: u8 = 0x00;
const DAC_POWER_DOWN: u8 = 0x02;
const DAC_MUTE_ON: u8 = 0x60;

/// Register access to the codec.
pub trait ControlBus {
    fn write_reg(&mut self, addr: u8, reg: u8, val: u8) -> Result<(), HalError>;
    fn read_reg(&mut self, addr: u8, reg: u8) -> Result<u8, HalError>;
}

/// Which converter is powered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecPath {
    Off,
    /// Microphone capture
    Adc,
    /// Speaker output
    Dac,
}

/// ES8311 configuration
#[derive(Debug, Clone)]
pub struct Es8311Config {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Initial DAC volume (0-100%)
    pub volume: u8,
    /// Mic PGA gain step (0-10, 3 dB each)
    pub mic_gain: u8,
}

impl Default for Es8311Config {
    fn default() -> Self {
        Self {
            sample_rate: crate::config::SAMPLE_RATE_HZ,
            volume: 70,
            mic_gain: 8,
        }
    }
}

/// DAC volume register for a 0-100% volume.
///
/// 0x00 = 0 dB, 0xBF = -95.5 dB
pub fn volume_to_reg(volume: u8) -> u8 {
    if volume >= 100 {
        0x00
    } else {
        ((100 - volume) as u16 * 0xBF / 100) as u8
    }
}

/// ES8311 driver
pub struct Es8311<B: ControlBus> {
    bus: B,
    config: Es8311Config,
    volume: u8,
    muted: bool,
    path: CodecPath,
}

impl<B: ControlBus> Es8311<B> {
    pub fn new(bus: B, config: Es8311Config) -> Self {
        Self {
            volume: config.volume.min(100),
            bus,
            config,
            muted: false,
            path: CodecPath::Off,
        }
    }

    /// Check the chip answers with the expected ID.
    pub fn probe(&mut self) -> Result<(), HalError> {
        let id = self.read_reg(regs::CHIP_ID1)?;
        if id != CHIP_ID {
            return Err(HalError::ChipNotFound);
        }
        Ok(())
    }

    /// Reset and configure the codec, both converters powered down.
    pub fn init(&mut self) -> Result<(), HalError> {
        use regs::*;

        self.probe()?;

        // Soft reset, then release
        self.write_reg(RESET, 0x1F)?;
        self.write_reg(RESET, 0x80)?;

        // MCLK from SCLK, all clocks on
        self.write_reg(CLK_MANAGER1, 0xBF)?;
        self.write_reg(CLK_MANAGER2, 0x18)?;
        self.write_reg(CLK_MANAGER3, 0x10)?;

        // 16-bit I2S both directions
        self.write_reg(SDP_IN, 0x0C)?;
        self.write_reg(SDP_OUT, 0x0C)?;

        self.write_reg(SYS_POWER, 0x01)?;
        self.write_reg(ADC_PGA_GAIN, 0x10 | self.config.mic_gain.min(10))?;
        self.write_reg(ADC_VOL, 0xBF)?;
        self.write_reg(DAC_VOL, volume_to_reg(self.volume))?;

        self.set_path(CodecPath::Off)
    }

    /// Power exactly one converter (or none).
    ///
    /// The outgoing side is powered down before the incoming one is
    /// powered up.
    pub fn set_path(&mut self, path: CodecPath) -> Result<(), HalError> {
        use regs::*;

        match path {
            CodecPath::Off => {
                self.write_reg(SYS_DAC_POWER, DAC_POWER_DOWN)?;
                self.write_reg(SYS_ADC_POWER, ADC_POWER_DOWN)?;
            }
            CodecPath::Adc => {
                self.write_reg(SYS_DAC_POWER, DAC_POWER_DOWN)?;
                self.write_reg(SYS_ADC_POWER, ADC_POWER_UP)?;
            }
            CodecPath::Dac => {
                self.write_reg(SYS_ADC_POWER, ADC_POWER_DOWN)?;
                self.write_reg(SYS_DAC_POWER, DAC_POWER_UP)?;
                self.write_reg(SYS_HP_DRIVE, 0x10)?;
            }
        }
        self.path = path;
        Ok(())
    }

    /// Set DAC volume (0-100%)
    pub fn set_volume(&mut self, volume: u8) -> Result<(), HalError> {
        self.volume = volume.min(100);
        self.write_reg(regs::DAC_VOL, volume_to_reg(self.volume))
    }

    /// Mute DAC output
    pub fn mute(&mut self, mute: bool) -> Result<(), HalError> {
        self.muted = mute;
        let val = if mute { DAC_MUTE_ON } else { 0x00 };
        self.write_reg(regs::DAC_MUTE, val)
    }

    pub fn path(&self) -> CodecPath {
        self.path
    }

    pub fn volume(&self) -> u8 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn bus(&self) -> &B {
        &self.bus
    }

    pub fn bus_mut(&mut self) -> &mut B {
        &mut self.bus
    }

    fn write_reg(&mut self, reg: u8, val: u8) -> Result<(), HalError> {
        self.bus.write_reg(ES8311_ADDR, reg, val)
    }

    fn read_reg(&mut self, reg: u8) -> Result<u8, HalError> {
        self.bus.read_reg(ES8311_ADDR, reg)
    }
}
