//! Raspberry Pi GPIO devices (rppal).
use std::time::Duration;

use rppal::gpio::{Gpio, OutputPin};
use sorter_traits::{DeviceError, Direction, Servo, Stepper};
use tracing::{debug, trace};

use crate::error::{HwError, Result};

/// Standard hobby-servo frame period.
const SERVO_PERIOD: Duration = Duration::from_millis(20);

fn output_pin(gpio: &Gpio, pin: u8) -> Result<OutputPin> {
    gpio.get(pin)
        .map(|p| p.into_output_low())
        .map_err(|e| HwError::Gpio(format!("open pin {pin}: {e}")))
}

/// STEP/DIR/EN driver (A4988, DRV8825, TMC in legacy mode). EN is active low.
pub struct HardwareStepper {
    step: OutputPin,
    dir: OutputPin,
    enable: Option<OutputPin>,
    half_period: Duration,
}

impl HardwareStepper {
    pub fn new(step_pin: u8, dir_pin: u8, enable_pin: Option<u8>, pulse_us: u32) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        let step = output_pin(&gpio, step_pin)?;
        let dir = output_pin(&gpio, dir_pin)?;
        let enable = match enable_pin {
            Some(pin) => {
                let mut en = output_pin(&gpio, pin)?;
                // released until the controller asks for torque
                en.set_high();
                Some(en)
            }
            None => None,
        };
        debug!(step_pin, dir_pin, ?enable_pin, pulse_us, "stepper pins ready");
        Ok(Self {
            step,
            dir,
            enable,
            half_period: Duration::from_micros(u64::from(pulse_us.max(2) / 2)),
        })
    }
}

impl Stepper for HardwareStepper {
    fn enable(&mut self) -> std::result::Result<(), DeviceError> {
        if let Some(en) = self.enable.as_mut() {
            en.set_low();
        }
        Ok(())
    }

    fn disable(&mut self) -> std::result::Result<(), DeviceError> {
        if let Some(en) = self.enable.as_mut() {
            en.set_high();
        }
        self.step.set_low();
        Ok(())
    }

    fn set_direction(&mut self, dir: Direction) -> std::result::Result<(), DeviceError> {
        match dir {
            Direction::Forward => self.dir.set_high(),
            Direction::Reverse => self.dir.set_low(),
        }
        Ok(())
    }

    fn pulse(&mut self, steps: u32) -> std::result::Result<(), DeviceError> {
        for _ in 0..steps {
            self.step.set_high();
            std::thread::sleep(self.half_period);
            self.step.set_low();
            std::thread::sleep(self.half_period);
        }
        trace!(steps, "stepper pulse train done");
        Ok(())
    }
}

/// Servo driven by rppal software PWM on a plain GPIO pin.
pub struct HardwareServo {
    pin: OutputPin,
    pin_no: u8,
}

impl HardwareServo {
    pub fn new(pin: u8) -> Result<Self> {
        let gpio = Gpio::new().map_err(|e| HwError::Gpio(e.to_string()))?;
        Ok(Self {
            pin: output_pin(&gpio, pin)?,
            pin_no: pin,
        })
    }
}

impl Servo for HardwareServo {
    fn set_pulse_us(&mut self, width_us: u16) -> std::result::Result<(), DeviceError> {
        if !(500..=2500).contains(&width_us) {
            return Err(Box::new(HwError::PulseOutOfRange(width_us)));
        }
        self.pin
            .set_pwm(SERVO_PERIOD, Duration::from_micros(u64::from(width_us)))
            .map_err(|e| HwError::Pwm(format!("pin {}: {e}", self.pin_no)))?;
        Ok(())
    }
}
