use thiserror::Error;

use crate::calibration::PointSlot;

/// Failures of calibration and sensor operations.
///
/// Every variant is recoverable: the controller logs it, returns to Idle and
/// keeps running. `Persistence` is only ever logged; the calibration it
/// failed to store stays applied in memory.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ScaleError {
    #[error("sensor unavailable: no samples within {waited_ms} ms")]
    SensorUnavailable { waited_ms: u64 },
    #[error("signal did not settle while {phase}")]
    StabilityTimeout { phase: &'static str },
    #[error("insufficient signal: delta {delta} counts is below the {min} count minimum")]
    InsufficientSignal { delta: i64, min: i64 },
    #[error("calibration masses must differ (got {m1} g and {m2} g)")]
    DegenerateMasses { m1: f32, m2: f32 },
    #[error("missing calibration point {0}")]
    MissingCalibrationPoint(PointSlot),
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("signal polarity mismatch: factor {factor} is not positive; check calibration.polarity")]
    PolarityMismatch { factor: f32 },
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("calibration store failed: {0}")]
    Persistence(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing sample source")]
    MissingSource,
    #[error("missing factor store")]
    MissingStore,
    #[error("missing uploader")]
    MissingUploader,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
