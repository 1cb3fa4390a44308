//! Device implementations for the carousel controller.
//!
//! Simulated devices are always available and record what they were told to
//! do, which makes them usable both for dry runs and for tests. Raspberry Pi
//! GPIO devices live behind the `hardware` feature, serial port setup behind
//! the `serial` feature.
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod rpi;
#[cfg(all(feature = "serial", unix))]
pub mod serial;

use std::cell::Cell;
use std::rc::Rc;

use sorter_traits::{DeviceError, Direction, Servo, Stepper};
use tracing::trace;

use crate::error::HwError;

/// Read-only view of a `SimulatedStepper`, kept by callers after the stepper
/// itself has been moved into the controller.
#[derive(Debug, Clone)]
pub struct StepperProbe {
    position: Rc<Cell<i64>>,
    total_pulses: Rc<Cell<u64>>,
    enabled: Rc<Cell<bool>>,
}

impl StepperProbe {
    /// Net signed position in steps (forward positive).
    pub fn position(&self) -> i64 {
        self.position.get()
    }
    /// Every pulse ever issued, regardless of direction.
    pub fn total_pulses(&self) -> u64 {
        self.total_pulses.get()
    }
    pub fn enabled(&self) -> bool {
        self.enabled.get()
    }
}

/// Simulated step/dir driver. Rejects pulses while disabled, like a real
/// driver with EN released would silently drop them.
#[derive(Debug)]
pub struct SimulatedStepper {
    dir: Direction,
    probe: StepperProbe,
}

impl Default for SimulatedStepper {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedStepper {
    pub fn new() -> Self {
        Self {
            dir: Direction::Forward,
            probe: StepperProbe {
                position: Rc::new(Cell::new(0)),
                total_pulses: Rc::new(Cell::new(0)),
                enabled: Rc::new(Cell::new(false)),
            },
        }
    }

    pub fn probe(&self) -> StepperProbe {
        self.probe.clone()
    }
}

impl Stepper for SimulatedStepper {
    fn enable(&mut self) -> Result<(), DeviceError> {
        self.probe.enabled.set(true);
        Ok(())
    }

    fn disable(&mut self) -> Result<(), DeviceError> {
        self.probe.enabled.set(false);
        Ok(())
    }

    fn set_direction(&mut self, dir: Direction) -> Result<(), DeviceError> {
        self.dir = dir;
        Ok(())
    }

    fn pulse(&mut self, steps: u32) -> Result<(), DeviceError> {
        if !self.probe.enabled.get() {
            return Err(Box::new(HwError::StepperDisabled));
        }
        let delta = match self.dir {
            Direction::Forward => i64::from(steps),
            Direction::Reverse => -i64::from(steps),
        };
        self.probe.position.set(self.probe.position.get() + delta);
        self.probe
            .total_pulses
            .set(self.probe.total_pulses.get() + u64::from(steps));
        trace!(steps, dir = ?self.dir, "stepper pulses (simulated)");
        Ok(())
    }
}

/// Read-only view of a `SimulatedServo`.
#[derive(Debug, Clone)]
pub struct ServoProbe {
    width_us: Rc<Cell<Option<u16>>>,
    writes: Rc<Cell<u32>>,
}

impl ServoProbe {
    /// Last commanded pulse width, `None` before the first command.
    pub fn width_us(&self) -> Option<u16> {
        self.width_us.get()
    }
    /// Number of commands received.
    pub fn writes(&self) -> u32 {
        self.writes.get()
    }
}

/// Simulated servo output.
#[derive(Debug)]
pub struct SimulatedServo {
    name: &'static str,
    probe: ServoProbe,
}

impl SimulatedServo {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            probe: ServoProbe {
                width_us: Rc::new(Cell::new(None)),
                writes: Rc::new(Cell::new(0)),
            },
        }
    }

    pub fn probe(&self) -> ServoProbe {
        self.probe.clone()
    }
}

impl Servo for SimulatedServo {
    fn set_pulse_us(&mut self, width_us: u16) -> Result<(), DeviceError> {
        if !(500..=2500).contains(&width_us) {
            return Err(Box::new(HwError::PulseOutOfRange(width_us)));
        }
        self.probe.width_us.set(Some(width_us));
        self.probe.writes.set(self.probe.writes.get() + 1);
        trace!(servo = self.name, width_us, "servo write (simulated)");
        Ok(())
    }
}
