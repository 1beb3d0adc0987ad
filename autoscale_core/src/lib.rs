#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Load-cell calibration and event capture (hardware-agnostic).
//!
//! All hardware interaction goes through `autoscale_traits::SampleSource`;
//! persistence through `FactorStore` and session delivery through `Uploader`.
//!
//! ## Architecture
//!
//! - **Sampling**: bounded reads and time windows over a source (`sampler`)
//! - **Stability**: windowed spread checks and plateau search (`stability`)
//! - **Calibration**: tare, single-point and two-point procedures (`calibration`)
//! - **Capture**: EMA, arming gate, hysteresis and session buffer (`capture`)
//! - **Control**: run mode, console commands and ticks (`controller`, `runner`)
//!
//! ## Units
//!
//! Raw counts are `i32` ADC codes. The scale factor is counts per gram.
//! Console commands take grams; readings and sessions are in kilograms.

pub mod builder;
pub mod calibration;
pub mod capture;
pub mod config;
pub mod console;
pub mod controller;
pub mod conversions;
pub mod error;
pub mod hw_error;
pub mod mocks;
pub mod runner;
pub mod sampler;
pub mod session;
pub mod stability;
pub mod stats;
pub mod status;
pub mod util;

pub use builder::{ControllerParts, Missing, ScaleControllerBuilder, Set, build_controller};
pub use calibration::{
    CalPhase, CalibrationEngine, CalibrationPoint, CalibrationState, PointSlot, Polarity,
};
pub use capture::{ActiveOutcome, ArmingGate, CaptureMachine, IdleOutcome};
pub use config::{CalibrationCfg, CaptureCfg, SamplerCfg, StabilityCfg};
pub use console::{Command, HELP, ParseError};
pub use controller::{Reply, ScaleController, StartupReport};
pub use error::{BuildError, Result, ScaleError};
pub use runner::{RunParams, RunSummary, run};
pub use sampler::Sampler;
pub use session::SessionBuffer;
pub use stability::StabilityDetector;
pub use stats::WindowStats;
pub use status::{EndReason, RunMode, TickStatus};
