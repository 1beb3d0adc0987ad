//! HX711 24-bit load-cell ADC on Raspberry Pi GPIO.
use std::time::Duration;

use autoscale_traits::{BoxError, SampleSource};
use rppal::gpio::{Gpio, InputPin, OutputPin};
use tracing::trace;

use crate::error::{HwError, Result};
use crate::util::wait_until_low_with_timeout;

/// Channel A, gain 128.
pub const GAIN_A_128: u8 = 25;

/// SCK held high longer than 60 µs powers the chip down.
const POWER_DOWN_HOLD: Duration = Duration::from_micros(100);

pub struct Hx711 {
    dt: InputPin,
    sck: OutputPin,
    gain_pulses: u8,
    data_ready_timeout: Duration,
}

impl Hx711 {
    pub fn open(dt_pin: u8, sck_pin: u8, gain_pulses: u8, data_ready_timeout: Duration) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let dt = gpio
            .get(dt_pin)
            .map_err(|e| HwError::Gpio(format!("dt pin {dt_pin}: {e}")))?
            .into_input();
        let mut sck = gpio
            .get(sck_pin)
            .map_err(|e| HwError::Gpio(format!("sck pin {sck_pin}: {e}")))?
            .into_output();
        sck.set_low(); // clock idle low
        Ok(Self {
            dt,
            sck,
            gain_pulses,
            data_ready_timeout,
        })
    }

    pub fn read_with_timeout(&mut self, timeout: Duration) -> Result<i32> {
        let dt = &self.dt;
        wait_until_low_with_timeout(|| dt.is_high(), timeout, Duration::from_micros(200))?;

        let mut value: i32 = 0;
        for _ in 0..24 {
            self.sck.set_high();
            std::hint::spin_loop();
            value = (value << 1) | i32::from(self.dt.is_high());
            self.sck.set_low();
            std::hint::spin_loop();
        }
        // Extra pulses select channel and gain of the next conversion.
        for _ in 0..self.gain_pulses.saturating_sub(24) {
            self.sck.set_high();
            std::hint::spin_loop();
            self.sck.set_low();
            std::hint::spin_loop();
        }

        // Sign extend 24-bit
        if (value & 0x80_0000) != 0 {
            value |= !0xFF_FFFF;
        }
        trace!(raw = value, "hx711 raw read");
        Ok(value)
    }
}

impl SampleSource for Hx711 {
    fn is_ready(&mut self) -> bool {
        self.dt.is_low()
    }

    fn read_raw(&mut self) -> std::result::Result<i32, BoxError> {
        Ok(self.read_with_timeout(self.data_ready_timeout)?)
    }

    fn power_cycle(&mut self) -> std::result::Result<(), BoxError> {
        self.sck.set_high();
        std::thread::sleep(POWER_DOWN_HOLD);
        self.sck.set_low();
        tracing::debug!("hx711 power cycled");
        Ok(())
    }
}
