#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Load-cell front ends.
//!
//! - `SimulatedLoadCell`: clock-paced simulation, always available.
//! - `hx711::Hx711`: the real ADC on Raspberry Pi GPIO (feature `hardware`).
pub mod error;
pub mod sim;
pub mod util;

#[cfg(feature = "hardware")]
pub mod hx711;

pub use error::HwError;
pub use sim::{SimHandle, SimulatedLoadCell};
