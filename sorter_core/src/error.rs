use thiserror::Error;

/// Why the controller latched its fault state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// The feed position already held a bean when a new one arrived.
    FeedSlotOccupied,
    /// A device call failed while sequencing.
    Device,
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FaultKind::FeedSlotOccupied => f.write_str("feed slot occupied"),
            FaultKind::Device => f.write_str("device failure"),
        }
    }
}

#[derive(Debug, Error, Clone)]
pub enum SorterError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("fault: {0}")]
    Fault(FaultKind),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing stepper")]
    MissingStepper,
    #[error("missing gate servo")]
    MissingGate,
    #[error("missing roller servos")]
    MissingRollers,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
