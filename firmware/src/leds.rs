//! Board LEDs, numbered from 1

use bsp_core::{ActiveLevel, HalError};
use embedded_hal::digital::StatefulOutputPin;

pub struct Leds<P, const N: usize> {
    pins: [P; N],
    level: ActiveLevel,
}

impl<P, const N: usize> Leds<P, N>
where
    P: StatefulOutputPin,
{
    /// Take the pins and switch every LED off
    pub fn new(pins: [P; N], level: ActiveLevel) -> Self {
        let mut leds = Self { pins, level };
        for led in 1..=N as u8 {
            leds.off(led).ok();
        }
        leds
    }

    pub fn on(&mut self, led: u8) -> Result<(), HalError> {
        let level = self.level;
        let pin = self.pin(led)?;
        match level {
            ActiveLevel::Low => pin.set_low(),
            ActiveLevel::High => pin.set_high(),
        }
        .map_err(|_| HalError::GpioError)
    }

    pub fn off(&mut self, led: u8) -> Result<(), HalError> {
        let level = self.level;
        let pin = self.pin(led)?;
        match level {
            ActiveLevel::Low => pin.set_high(),
            ActiveLevel::High => pin.set_low(),
        }
        .map_err(|_| HalError::GpioError)
    }

    pub fn toggle(&mut self, led: u8) -> Result<(), HalError> {
        self.pin(led)?.toggle().map_err(|_| HalError::GpioError)
    }

    pub fn is_on(&mut self, led: u8) -> Result<bool, HalError> {
        let level = self.level;
        let high = self.pin(led)?.is_set_high().map_err(|_| HalError::GpioError)?;
        Ok(match level {
            ActiveLevel::Low => !high,
            ActiveLevel::High => high,
        })
    }

    fn pin(&mut self, led: u8) -> Result<&mut P, HalError> {
        let index = (led as usize).checked_sub(1).ok_or(HalError::InvalidConfig)?;
        self.pins.get_mut(index).ok_or(HalError::InvalidConfig)
    }
}
