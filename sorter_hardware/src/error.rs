use thiserror::Error;

#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    #[error("pwm error: {0}")]
    Pwm(String),
    #[error("servo pulse {0}us outside 500..=2500us")]
    PulseOutOfRange(u16),
    #[error("serial port error: {0}")]
    Serial(String),
    #[error("unsupported baud rate {0}")]
    UnsupportedBaud(u32),
    #[error("stepper driver disabled")]
    StepperDisabled,
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, HwError>;
