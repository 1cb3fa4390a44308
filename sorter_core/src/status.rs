//! Status returned from each control loop iteration.

use crate::error::SorterError;

/// Public status of a single step of the sorting loop.
#[derive(Debug)]
pub enum SortStatus {
    /// Waiting in `HomeWait` for `ZERO`.
    Idle,
    /// Sequencing beans.
    Running,
    /// Latched in `Error`; actuators have been parked.
    Faulted(SorterError),
}
