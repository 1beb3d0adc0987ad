#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema, calibration table import and factor persistence for the
//! load-cell scale.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `load_calibration_csv` fits a `raw,grams` table into a zero offset and a
//!   counts-per-gram factor, with one robust refit pass against outliers.
//! - `FileFactorStore` persists the calibration factor with atomic writes.
use serde::Deserialize;

mod calibration;
mod store;

pub use calibration::{CalibrationFit, CalibrationRow, load_calibration_csv};
pub use store::{FileFactorStore, write_atomic};

/// Device identity used in upload payloads.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Device {
    pub id: String,
}

impl Default for Device {
    fn default() -> Self {
        Self {
            id: "SCALE-ESP32-DEV-001".to_string(),
        }
    }
}

/// HX711 wiring (BCM numbering). Only needed for `sensor.kind = "hx711"`.
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct Pins {
    pub hx711_dt: u8,
    pub hx711_sck: u8,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    #[default]
    Simulated,
    Hx711,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Sensor {
    pub kind: SensorKind,
    /// Yield interval between unsuccessful polls (ms).
    pub poll_interval_ms: u64,
    /// Upper bound on readings kept per statistics window.
    pub max_window_samples: usize,
    /// Max time the HX711 driver waits for DT low inside one read (ms).
    pub data_ready_timeout_ms: u64,
}

impl Default for Sensor {
    fn default() -> Self {
        Self {
            kind: SensorKind::Simulated,
            poll_interval_ms: 1,
            max_window_samples: 128,
            data_ready_timeout_ms: 150,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Stability {
    pub check_window_ms: u64,
    pub plateau_rel_tol: f64,
    pub plateau_floor: f64,
}

impl Default for Stability {
    fn default() -> Self {
        Self {
            check_window_ms: 250,
            plateau_rel_tol: 0.01,
            plateau_floor: 200.0,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Calibration {
    /// Counts per gram used until a calibration is stored.
    pub default_factor: f32,
    pub polarity: Polarity,
    /// Where the calibrated factor is persisted; `None` keeps it in memory.
    pub store_path: Option<String>,
    pub tare_samples: usize,
    pub tare_read_timeout_ms: u64,
    pub tare_timeout_ms: u64,
    pub power_cycle_retries: u32,
    pub power_cycle_backoff_ms: u64,
    pub refine_min_samples: usize,
    pub refine_max_samples: usize,
    pub refine_min_ms: u64,
    pub refine_max_std_counts: f64,
    pub refine_timeout_ms: u64,
    pub zero_max_std_counts: f64,
    pub zero_stable_ms: u64,
    pub zero_timeout_ms: u64,
    pub settle_ms: u64,
    pub point_settle_ms: u64,
    pub plateau_window_ms: u64,
    pub plateau_max_std_counts: f64,
    pub plateau_min_ms: u64,
    pub plateau_timeout_ms: u64,
    pub min_delta_counts: i64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            default_factor: 9863.233,
            polarity: Polarity::Positive,
            store_path: None,
            tare_samples: 20,
            tare_read_timeout_ms: 200,
            tare_timeout_ms: 5_000,
            power_cycle_retries: 3,
            power_cycle_backoff_ms: 50,
            refine_min_samples: 20,
            refine_max_samples: 100,
            refine_min_ms: 1_200,
            refine_max_std_counts: 800.0,
            refine_timeout_ms: 4_000,
            zero_max_std_counts: 800.0,
            zero_stable_ms: 1_000,
            zero_timeout_ms: 5_000,
            settle_ms: 2_000,
            point_settle_ms: 1_500,
            plateau_window_ms: 600,
            plateau_max_std_counts: 800.0,
            plateau_min_ms: 1_200,
            plateau_timeout_ms: 15_000,
            min_delta_counts: 1_000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Capture {
    pub idle_poll_ms: u64,
    pub fast_read_timeout_ms: u64,
    pub ema_alpha: f32,
    pub deadband_kg: f32,
    pub arm_band_kg: f32,
    pub arm_stable_ms: u64,
    pub min_rise_kg: f32,
    pub trigger_kg: f32,
    pub release_kg: f32,
    pub hold_ms: u64,
    pub active_max_ms: u64,
    pub cooldown_ms: u64,
    pub capacity: usize,
    /// Emit an Active debug line every N samples (0 disables).
    pub debug_every: u32,
}

impl Default for Capture {
    fn default() -> Self {
        Self {
            idle_poll_ms: 200,
            fast_read_timeout_ms: 30,
            ema_alpha: 0.1,
            deadband_kg: 0.005,
            arm_band_kg: 0.05,
            arm_stable_ms: 1_000,
            min_rise_kg: 0.02,
            trigger_kg: 4.0,
            release_kg: 3.0,
            hold_ms: 2_000,
            active_max_ms: 90_000,
            cooldown_ms: 3_000,
            capacity: 6_000,
            debug_every: 16,
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// Session hand-off. Each session becomes one JSON line in `path`, or on
/// stdout when no path is set.
#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Upload {
    pub path: Option<String>,
}

/// One scripted change of the simulated platform load.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq)]
pub struct SimStep {
    /// Time since the simulation started (ms).
    pub at_ms: u64,
    pub kg: f32,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct Simulation {
    /// Raw counts with an empty platform.
    pub zero_raw: i32,
    /// True counts per gram of the simulated cell.
    pub counts_per_gram: f32,
    /// Peak amplitude of the deterministic noise (counts).
    pub noise_counts: i32,
    /// Conversion period (ms); an HX711 at 80 SPS is about 12.
    pub sample_period_ms: u64,
    pub steps: Vec<SimStep>,
}

impl Default for Simulation {
    fn default() -> Self {
        Self {
            zero_raw: 842_913,
            counts_per_gram: 9863.233,
            noise_counts: 150,
            sample_period_ms: 12,
            steps: Vec::new(),
        }
    }
}

#[derive(Debug, Deserialize, Default, Clone)]
#[serde(default)]
pub struct Config {
    pub device: Device,
    pub pins: Option<Pins>,
    pub sensor: Sensor,
    pub stability: Stability,
    pub calibration: Calibration,
    pub capture: Capture,
    pub logging: Logging,
    pub upload: Upload,
    pub simulation: Simulation,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.id.trim().is_empty() {
            eyre::bail!("device.id must not be empty");
        }

        // Sensor
        if self.sensor.kind == SensorKind::Hx711 && self.pins.is_none() {
            eyre::bail!("sensor.kind = \"hx711\" requires a [pins] section");
        }
        if self.sensor.poll_interval_ms == 0 {
            eyre::bail!("sensor.poll_interval_ms must be >= 1");
        }
        if self.sensor.max_window_samples == 0 {
            eyre::bail!("sensor.max_window_samples must be >= 1");
        }
        if self.sensor.data_ready_timeout_ms == 0 {
            eyre::bail!("sensor.data_ready_timeout_ms must be >= 1");
        }

        // Stability
        let s = &self.stability;
        if s.check_window_ms == 0 {
            eyre::bail!("stability.check_window_ms must be >= 1");
        }
        if !(s.plateau_rel_tol >= 0.0 && s.plateau_rel_tol < 1.0) {
            eyre::bail!("stability.plateau_rel_tol must be in [0.0, 1.0)");
        }
        if !(s.plateau_floor.is_finite() && s.plateau_floor >= 0.0) {
            eyre::bail!("stability.plateau_floor must be >= 0");
        }

        // Calibration
        let c = &self.calibration;
        if !(c.default_factor.is_finite() && c.default_factor > 0.0) {
            eyre::bail!("calibration.default_factor must be finite and > 0");
        }
        if c.tare_samples == 0 {
            eyre::bail!("calibration.tare_samples must be >= 1");
        }
        if c.tare_read_timeout_ms == 0 || c.tare_timeout_ms < c.tare_read_timeout_ms {
            eyre::bail!(
                "calibration.tare_timeout_ms must be >= calibration.tare_read_timeout_ms >= 1"
            );
        }
        if c.refine_min_samples == 0 || c.refine_max_samples < c.refine_min_samples {
            eyre::bail!(
                "calibration.refine_max_samples must be >= calibration.refine_min_samples >= 1"
            );
        }
        for (name, v) in [
            ("refine_max_std_counts", c.refine_max_std_counts),
            ("zero_max_std_counts", c.zero_max_std_counts),
            ("plateau_max_std_counts", c.plateau_max_std_counts),
        ] {
            if !(v.is_finite() && v > 0.0) {
                eyre::bail!("calibration.{name} must be > 0");
            }
        }
        if c.plateau_window_ms == 0 {
            eyre::bail!("calibration.plateau_window_ms must be >= 1");
        }
        if c.plateau_timeout_ms < c.plateau_min_ms {
            eyre::bail!("calibration.plateau_timeout_ms must be >= calibration.plateau_min_ms");
        }
        if c.zero_timeout_ms < c.zero_stable_ms {
            eyre::bail!("calibration.zero_timeout_ms must be >= calibration.zero_stable_ms");
        }
        if c.min_delta_counts <= 0 {
            eyre::bail!("calibration.min_delta_counts must be > 0");
        }
        if c.settle_ms > 5 * 60 * 1000 || c.point_settle_ms > 5 * 60 * 1000 {
            eyre::bail!("calibration settle delays are unreasonably large (>5min)");
        }

        // Capture
        let k = &self.capture;
        if k.idle_poll_ms == 0 {
            eyre::bail!("capture.idle_poll_ms must be >= 1");
        }
        if !(k.ema_alpha > 0.0 && k.ema_alpha <= 1.0) {
            eyre::bail!("capture.ema_alpha must be in (0.0, 1.0]");
        }
        for (name, v) in [
            ("deadband_kg", k.deadband_kg),
            ("arm_band_kg", k.arm_band_kg),
            ("min_rise_kg", k.min_rise_kg),
        ] {
            if !(v.is_finite() && v >= 0.0) {
                eyre::bail!("capture.{name} must be >= 0");
            }
        }
        if !(k.release_kg.is_finite() && k.release_kg > 0.0) {
            eyre::bail!("capture.release_kg must be > 0");
        }
        if !(k.trigger_kg.is_finite() && k.release_kg < k.trigger_kg) {
            eyre::bail!("capture.release_kg must be < capture.trigger_kg");
        }
        if k.deadband_kg >= k.release_kg {
            eyre::bail!("capture.deadband_kg must be < capture.release_kg");
        }
        if k.active_max_ms == 0 || k.active_max_ms <= k.hold_ms {
            eyre::bail!("capture.active_max_ms must be > capture.hold_ms");
        }
        if k.capacity == 0 {
            eyre::bail!("capture.capacity must be >= 1");
        }

        // Logging
        if let Some(r) = self.logging.rotation.as_deref()
            && !matches!(r, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        // Simulation
        let sim = &self.simulation;
        if !(sim.counts_per_gram.is_finite() && sim.counts_per_gram != 0.0) {
            eyre::bail!("simulation.counts_per_gram must be finite and non-zero");
        }
        if sim.noise_counts < 0 {
            eyre::bail!("simulation.noise_counts must be >= 0");
        }
        if sim.sample_period_ms == 0 {
            eyre::bail!("simulation.sample_period_ms must be >= 1");
        }
        if sim.steps.windows(2).any(|w| w[1].at_ms < w[0].at_ms) {
            eyre::bail!("simulation.steps must be sorted by at_ms");
        }

        Ok(())
    }
}
