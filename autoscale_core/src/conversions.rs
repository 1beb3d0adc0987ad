//! `From` implementations bridging `autoscale_config` types to `autoscale_core` types.

use crate::calibration::{CalibrationState, Polarity};
use crate::config::{CalibrationCfg, CaptureCfg, SamplerCfg, StabilityCfg};
use crate::error::ScaleError;

// ── Polarity ─────────────────────────────────────────────────────────────────

impl From<autoscale_config::Polarity> for Polarity {
    fn from(p: autoscale_config::Polarity) -> Self {
        match p {
            autoscale_config::Polarity::Positive => Polarity::Positive,
            autoscale_config::Polarity::Negative => Polarity::Negative,
        }
    }
}

// ── SamplerCfg ───────────────────────────────────────────────────────────────

impl From<&autoscale_config::Sensor> for SamplerCfg {
    fn from(c: &autoscale_config::Sensor) -> Self {
        Self {
            poll_interval_ms: c.poll_interval_ms,
            max_window_samples: c.max_window_samples,
        }
    }
}

// ── StabilityCfg ─────────────────────────────────────────────────────────────

impl From<&autoscale_config::Stability> for StabilityCfg {
    fn from(c: &autoscale_config::Stability) -> Self {
        Self {
            check_window_ms: c.check_window_ms,
            plateau_rel_tol: c.plateau_rel_tol,
            plateau_floor: c.plateau_floor,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&autoscale_config::Calibration> for CalibrationCfg {
    fn from(c: &autoscale_config::Calibration) -> Self {
        Self {
            default_factor: c.default_factor,
            polarity: c.polarity.into(),
            tare_samples: c.tare_samples,
            tare_read_timeout_ms: c.tare_read_timeout_ms,
            tare_timeout_ms: c.tare_timeout_ms,
            power_cycle_retries: c.power_cycle_retries,
            power_cycle_backoff_ms: c.power_cycle_backoff_ms,
            refine_min_samples: c.refine_min_samples,
            refine_max_samples: c.refine_max_samples,
            refine_min_ms: c.refine_min_ms,
            refine_max_std_counts: c.refine_max_std_counts,
            refine_timeout_ms: c.refine_timeout_ms,
            zero_max_std_counts: c.zero_max_std_counts,
            zero_stable_ms: c.zero_stable_ms,
            zero_timeout_ms: c.zero_timeout_ms,
            settle_ms: c.settle_ms,
            point_settle_ms: c.point_settle_ms,
            plateau_window_ms: c.plateau_window_ms,
            plateau_max_std_counts: c.plateau_max_std_counts,
            plateau_min_ms: c.plateau_min_ms,
            plateau_timeout_ms: c.plateau_timeout_ms,
            min_delta_counts: c.min_delta_counts,
        }
    }
}

// ── CaptureCfg ───────────────────────────────────────────────────────────────

impl From<&autoscale_config::Capture> for CaptureCfg {
    fn from(c: &autoscale_config::Capture) -> Self {
        Self {
            idle_poll_ms: c.idle_poll_ms,
            fast_read_timeout_ms: c.fast_read_timeout_ms,
            ema_alpha: c.ema_alpha,
            deadband_kg: c.deadband_kg,
            arm_band_kg: c.arm_band_kg,
            arm_stable_ms: c.arm_stable_ms,
            min_rise_kg: c.min_rise_kg,
            trigger_kg: c.trigger_kg,
            release_kg: c.release_kg,
            hold_ms: c.hold_ms,
            active_max_ms: c.active_max_ms,
            cooldown_ms: c.cooldown_ms,
            capacity: c.capacity,
            debug_every: c.debug_every,
        }
    }
}

// ── CalibrationState ─────────────────────────────────────────────────────────

impl TryFrom<&autoscale_config::CalibrationFit> for CalibrationState {
    type Error = ScaleError;

    fn try_from(c: &autoscale_config::CalibrationFit) -> Result<Self, Self::Error> {
        CalibrationState::new(c.zero_offset, c.scale_factor, c.polarity.into())
    }
}
