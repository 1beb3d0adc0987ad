use thiserror::Error;

/// Load-cell front-end failures.
#[derive(Debug, Error)]
pub enum HwError {
    #[error("gpio error: {0}")]
    Gpio(String),
    /// DT never went low within the driver's data-ready timeout.
    #[error("hx711 data-ready timeout")]
    DataReadyTimeout,
    /// No conversion available (stalled or powered down).
    #[error("load cell not ready")]
    NotReady,
}

pub type Result<T> = std::result::Result<T, HwError>;
