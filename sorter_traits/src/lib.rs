pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// Boundary error type used by every device trait.
pub type DeviceError = Box<dyn std::error::Error + Send + Sync>;

/// Rotation sense of the carousel stepper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Reverse,
}

impl Direction {
    /// The opposite sense.
    pub fn reversed(self) -> Self {
        match self {
            Direction::Forward => Direction::Reverse,
            Direction::Reverse => Direction::Forward,
        }
    }
}

/// Step/dir stepper driver.
///
/// `pulse` blocks for the duration of the pulse train.
pub trait Stepper {
    fn enable(&mut self) -> Result<(), DeviceError>;
    fn disable(&mut self) -> Result<(), DeviceError>;
    fn set_direction(&mut self, dir: Direction) -> Result<(), DeviceError>;
    fn pulse(&mut self, steps: u32) -> Result<(), DeviceError>;
}

/// Hobby servo output (positional or continuous rotation), commanded by pulse width.
pub trait Servo {
    fn set_pulse_us(&mut self, width_us: u16) -> Result<(), DeviceError>;
}

/// Line transport to the classification host.
pub trait HostLink {
    /// Next received line, if one is already available. Never blocks.
    fn poll_line(&mut self) -> Option<String>;
    fn send_line(&mut self, line: &str) -> Result<(), DeviceError>;
}

impl<T: Stepper + ?Sized> Stepper for Box<T> {
    fn enable(&mut self) -> Result<(), DeviceError> {
        (**self).enable()
    }
    fn disable(&mut self) -> Result<(), DeviceError> {
        (**self).disable()
    }
    fn set_direction(&mut self, dir: Direction) -> Result<(), DeviceError> {
        (**self).set_direction(dir)
    }
    fn pulse(&mut self, steps: u32) -> Result<(), DeviceError> {
        (**self).pulse(steps)
    }
}

impl<T: Servo + ?Sized> Servo for Box<T> {
    fn set_pulse_us(&mut self, width_us: u16) -> Result<(), DeviceError> {
        (**self).set_pulse_us(width_us)
    }
}

impl<T: HostLink + ?Sized> HostLink for Box<T> {
    fn poll_line(&mut self) -> Option<String> {
        (**self).poll_line()
    }
    fn send_line(&mut self, line: &str) -> Result<(), DeviceError> {
        (**self).send_line(line)
    }
}
