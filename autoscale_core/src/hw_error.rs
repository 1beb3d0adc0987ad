//! Maps `Box<dyn Error>` from trait boundaries to typed `ScaleError`.
//!
//! The traits in `autoscale_traits` use `Box<dyn Error + Send + Sync>` so any
//! front end can plug in; this module converts those to our typed error enum,
//! with an optional feature-gated path for `autoscale_hardware::HwError`.

use crate::error::ScaleError;

/// Map a trait-boundary error to a typed `ScaleError`.
///
/// Attempts to downcast known hardware error types first, then falls back
/// to string-based heuristics.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> ScaleError {
    #[cfg(feature = "hardware-errors")]
    {
        if let Some(hw) = e.downcast_ref::<autoscale_hardware::HwError>() {
            return match hw {
                autoscale_hardware::HwError::DataReadyTimeout
                | autoscale_hardware::HwError::NotReady => {
                    ScaleError::SensorUnavailable { waited_ms: 0 }
                }
                autoscale_hardware::HwError::Gpio(_) => ScaleError::Hardware(hw.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if lower.contains("timeout") || lower.contains("not ready") {
        ScaleError::SensorUnavailable { waited_ms: 0 }
    } else {
        ScaleError::Hardware(s)
    }
}
