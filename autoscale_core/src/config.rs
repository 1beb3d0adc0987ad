//! Runtime configuration for the scale engine.
//!
//! These are the structs consumed by `ScaleController` and its parts.
//! They are separate from the TOML-deserialized config in `autoscale_config`.

use std::time::Duration;

use crate::calibration::Polarity;

/// Window sampler configuration.
#[derive(Debug, Clone)]
pub struct SamplerCfg {
    /// Yield interval between unsuccessful polls of the source (ms).
    pub poll_interval_ms: u64,
    /// Upper bound on readings kept per window.
    pub max_window_samples: usize,
}

impl Default for SamplerCfg {
    fn default() -> Self {
        Self {
            poll_interval_ms: 1,
            max_window_samples: 128,
        }
    }
}

impl SamplerCfg {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Stability detector configuration.
#[derive(Debug, Clone)]
pub struct StabilityCfg {
    /// Length of each check window used by `is_stable` (ms).
    pub check_window_ms: u64,
    /// Plateau means must agree within this fraction of |mean|...
    pub plateau_rel_tol: f64,
    /// ...or within this many units, whichever is larger.
    pub plateau_floor: f64,
}

impl Default for StabilityCfg {
    fn default() -> Self {
        Self {
            check_window_ms: 250,
            plateau_rel_tol: 0.01,
            plateau_floor: 200.0,
        }
    }
}

/// Calibration procedure configuration. Counts are raw ADC units.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    /// Factor (counts per gram) used until a calibration is stored.
    pub default_factor: f32,
    pub polarity: Polarity,

    /// Readings averaged by `tare`.
    pub tare_samples: usize,
    /// Max wait for a single tare reading before power-cycling the source (ms).
    pub tare_read_timeout_ms: u64,
    /// Overall tare budget (ms).
    pub tare_timeout_ms: u64,
    /// Power-cycle attempts before the stability-gated fallback capture.
    pub power_cycle_retries: u32,
    /// First backoff after a power cycle; doubles per retry (ms).
    pub power_cycle_backoff_ms: u64,

    /// Zero refinement capture: minimum samples, duration, spread and budget.
    pub refine_min_samples: usize,
    pub refine_max_samples: usize,
    pub refine_min_ms: u64,
    pub refine_max_std_counts: f64,
    pub refine_timeout_ms: u64,

    /// Empty-platform confirmation via `is_stable`.
    pub zero_max_std_counts: f64,
    pub zero_stable_ms: u64,
    pub zero_timeout_ms: u64,

    /// Delay after the operator is asked to place the mass (ms).
    pub settle_ms: u64,
    /// Delay before recording a two-point sample (ms).
    pub point_settle_ms: u64,

    /// Plateau search with the mass in place.
    pub plateau_window_ms: u64,
    pub plateau_max_std_counts: f64,
    pub plateau_min_ms: u64,
    pub plateau_timeout_ms: u64,

    /// Smallest usable loaded-vs-zero delta (counts).
    pub min_delta_counts: i64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            default_factor: 9863.233,
            polarity: Polarity::Positive,
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

/// Event capture configuration. Masses in kilograms.
#[derive(Debug, Clone)]
pub struct CaptureCfg {
    /// Idle polling cadence (ms).
    pub idle_poll_ms: u64,
    /// Bounded wait for the single idle reading (ms).
    pub fast_read_timeout_ms: u64,
    /// Weight of the new sample in the idle EMA.
    pub ema_alpha: f32,
    /// Magnitudes below this are clamped to zero.
    pub deadband_kg: f32,
    /// Arming gate: |ema| must stay within this band...
    pub arm_band_kg: f32,
    /// ...for this long (ms).
    pub arm_stable_ms: u64,
    /// Minimum per-poll increase of the EMA to trigger.
    ///
    /// Checked on the same poll as `trigger_kg`, so a step load only
    /// triggers if it reaches `trigger_kg + min_rise_kg * (1 - ema_alpha) / ema_alpha`
    /// (4.18 kg with the defaults). Lower this to catch loads closer to
    /// `trigger_kg`.
    pub min_rise_kg: f32,
    /// Enter Active when |ema| reaches this.
    pub trigger_kg: f32,
    /// Active samples below this count towards ending the session.
    pub release_kg: f32,
    /// Time below release needed to end the session (ms).
    pub hold_ms: u64,
    /// Hard cap on a session (ms).
    pub active_max_ms: u64,
    /// Quiet period after a session or calibration (ms).
    pub cooldown_ms: u64,
    /// Session buffer capacity (samples).
    pub capacity: usize,
    /// Emit an Active debug line every N samples (0 disables).
    pub debug_every: u32,
}

impl Default for CaptureCfg {
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
