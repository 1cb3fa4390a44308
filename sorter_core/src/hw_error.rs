//! Maps `Box<dyn Error>` from trait boundaries to typed `SorterError`.
//!
//! The traits in `sorter_traits` use `Box<dyn Error + Send + Sync>`; this
//! module converts those to our typed error enum, with an optional
//! feature-gated path for `sorter_hardware::HwError` downcasting.

use crate::error::SorterError;

/// Map a trait-boundary error to a typed `SorterError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to the display string.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> SorterError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<sorter_hardware::error::HwError>() {
            return match hw {
                sorter_hardware::error::HwError::Io(io) => SorterError::Io(io.to_string()),
                other => SorterError::HardwareFault(other.to_string()),
            };
        }
    }

    SorterError::Hardware(e.to_string())
}

/// Convenience for `map_err` chains on device calls.
pub(crate) fn device_report(e: sorter_traits::DeviceError) -> eyre::Report {
    eyre::Report::new(map_hw_error(&*e))
}
