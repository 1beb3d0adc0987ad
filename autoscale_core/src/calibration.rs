//! Load-cell calibration: tare, single-point and two-point procedures.
//!
//! Internals work in raw counts and grams. The scale factor is expressed in
//! counts per gram and is always positive; the sign of the bridge output is
//! carried separately by `Polarity`:
//!
//!   grams = polarity * (raw - zero_offset) / scale_factor
//!
//! Only the scale factor is persisted. The zero offset is re-established by
//! a tare on every start.
use std::time::Duration;

use autoscale_traits::{Clock, FactorStore, SampleSource};

use crate::config::{CalibrationCfg, StabilityCfg};
use crate::error::ScaleError;
use crate::sampler::Sampler;
use crate::util::{GRAMS_PER_KG, elapsed};

/// Masses closer than this are treated as equal by the two-point solve (g).
pub const MIN_MASS_SPAN_G: f32 = 1e-3;

/// Sign of the bridge output for increasing load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Polarity {
    #[default]
    Positive,
    Negative,
}

impl Polarity {
    #[inline]
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }
}

/// Slot of a two-point calibration sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointSlot {
    One,
    Two,
}

impl PointSlot {
    fn index(self) -> usize {
        match self {
            PointSlot::One => 0,
            PointSlot::Two => 1,
        }
    }
}

impl core::fmt::Display for PointSlot {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PointSlot::One => f.write_str("1"),
            PointSlot::Two => f.write_str("2"),
        }
    }
}

/// Reference mass and the plateau raw count recorded for it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationPoint {
    pub mass_g: f32,
    pub raw: i32,
}

/// Active conversion parameters. The factor is finite and non-zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationState {
    zero_offset: i32,
    scale_factor: f32,
    polarity: Polarity,
}

impl CalibrationState {
    pub fn new(zero_offset: i32, scale_factor: f32, polarity: Polarity) -> Result<Self, ScaleError> {
        if !scale_factor.is_finite() || scale_factor == 0.0 {
            return Err(ScaleError::InvalidArgument(format!(
                "scale factor must be finite and non-zero (got {scale_factor})"
            )));
        }
        Ok(Self {
            zero_offset,
            scale_factor,
            polarity,
        })
    }

    pub fn zero_offset(&self) -> i32 {
        self.zero_offset
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn polarity(&self) -> Polarity {
        self.polarity
    }

    /// Polarity-adjusted counts above the zero offset.
    #[inline]
    pub fn tared_counts(&self, raw: i32) -> f64 {
        self.polarity.sign() * (i64::from(raw) - i64::from(self.zero_offset)) as f64
    }

    #[inline]
    pub fn to_grams(&self, raw: i32) -> f32 {
        (self.tared_counts(raw) / f64::from(self.scale_factor)) as f32
    }

    #[inline]
    pub fn to_kg(&self, raw: i32) -> f32 {
        self.to_grams(raw) / GRAMS_PER_KG
    }
}

/// Observable progress of a calibration procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CalPhase {
    #[default]
    Idle,
    Taring,
    AwaitingZero,
    AwaitingMass,
    Computing,
}

/// Owns the calibration state and runs the procedures that change it.
pub struct CalibrationEngine<P> {
    cfg: CalibrationCfg,
    stability: StabilityCfg,
    state: CalibrationState,
    points: [Option<CalibrationPoint>; 2],
    phase: CalPhase,
    store: P,
}

impl<P> core::fmt::Debug for CalibrationEngine<P> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("CalibrationEngine")
            .field("state", &self.state)
            .field("points", &self.points)
            .field("phase", &self.phase)
            .finish()
    }
}

impl<P: FactorStore> CalibrationEngine<P> {
    /// Start from the configured default factor with a zero offset of 0.
    pub fn new(cfg: CalibrationCfg, stability: StabilityCfg, store: P) -> Result<Self, ScaleError> {
        let state = CalibrationState::new(0, cfg.default_factor, cfg.polarity)?;
        Ok(Self {
            cfg,
            stability,
            state,
            points: [None, None],
            phase: CalPhase::Idle,
            store,
        })
    }

    pub fn state(&self) -> &CalibrationState {
        &self.state
    }

    pub fn phase(&self) -> CalPhase {
        self.phase
    }

    pub fn points(&self) -> &[Option<CalibrationPoint>; 2] {
        &self.points
    }

    pub fn cfg(&self) -> &CalibrationCfg {
        &self.cfg
    }

    pub fn store(&self) -> &P {
        &self.store
    }

    /// Replace the in-memory state, e.g. from an imported calibration table.
    pub fn seed(&mut self, state: CalibrationState) {
        tracing::info!(
            zero = state.zero_offset,
            factor = state.scale_factor,
            "calibration seeded"
        );
        self.state = state;
    }

    fn set_phase(&mut self, phase: CalPhase) {
        if self.phase != phase {
            tracing::info!(from = ?self.phase, to = ?phase, "calibration phase");
            self.phase = phase;
        }
    }

    /// Adopt a stored factor if one exists and is usable.
    pub fn load_persisted(&mut self) -> bool {
        match self.store.load_factor() {
            Some(f) if f.is_finite() && f > 0.0 => {
                self.state.scale_factor = f;
                tracing::info!(factor = f, "loaded stored calibration factor");
                true
            }
            Some(f) => {
                tracing::warn!(
                    factor = f,
                    default = self.cfg.default_factor,
                    "ignoring invalid stored factor; using default"
                );
                false
            }
            None => {
                tracing::info!(
                    factor = self.state.scale_factor,
                    "no stored calibration factor; using default"
                );
                false
            }
        }
    }

    fn persist(&mut self) {
        let factor = self.state.scale_factor;
        match self.store.save_factor(factor) {
            Ok(()) => tracing::info!(factor, "calibration saved"),
            Err(e) => {
                let err = ScaleError::Persistence(e.to_string());
                tracing::warn!(error = %err, factor, "keeping calibration in memory only");
            }
        }
    }

    /// Zero the platform using the configured tare budgets.
    pub fn tare_default<S: SampleSource>(&mut self, sampler: &mut Sampler<S>) -> Result<i32, ScaleError> {
        let budget = self.cfg.tare_samples;
        let per_read = Duration::from_millis(self.cfg.tare_read_timeout_ms);
        let overall = Duration::from_millis(self.cfg.tare_timeout_ms);
        self.tare(sampler, budget, per_read, overall)
    }

    /// Average up to `sample_budget` raw counts and adopt the mean as the
    /// zero offset.
    ///
    /// A reading that does not arrive within `per_read_timeout` triggers a
    /// power cycle of the source, with a doubling backoff, up to
    /// `power_cycle_retries` times. When that yields nothing a short
    /// stability-gated capture gets the rest of `overall_timeout`.
    pub fn tare<S: SampleSource>(
        &mut self,
        sampler: &mut Sampler<S>,
        sample_budget: usize,
        per_read_timeout: Duration,
        overall_timeout: Duration,
    ) -> Result<i32, ScaleError> {
        let r = self.tare_inner(sampler, sample_budget, per_read_timeout, overall_timeout);
        self.set_phase(CalPhase::Idle);
        r
    }

    fn tare_inner<S: SampleSource>(
        &mut self,
        sampler: &mut Sampler<S>,
        sample_budget: usize,
        per_read_timeout: Duration,
        overall_timeout: Duration,
    ) -> Result<i32, ScaleError> {
        self.set_phase(CalPhase::Taring);
        let budget = sample_budget.max(1);
        let start = sampler.now();
        let mut values: Vec<f64> = Vec::with_capacity(budget);
        let mut retries = 0u32;
        let mut backoff = Duration::from_millis(self.cfg.power_cycle_backoff_ms);

        while values.len() < budget {
            let spent = elapsed(sampler.now(), start);
            if spent >= overall_timeout {
                break;
            }
            let remaining = overall_timeout - spent;
            if let Some(raw) = sampler.read_within(per_read_timeout.min(remaining)) {
                values.push(f64::from(raw));
                continue;
            }
            if retries >= self.cfg.power_cycle_retries {
                break;
            }
            retries += 1;
            tracing::warn!(
                attempt = retries,
                backoff_ms = backoff.as_millis() as u64,
                "sensor not ready during tare; power cycling"
            );
            if let Err(e) = sampler.source_mut().power_cycle() {
                tracing::warn!(error = %crate::hw_error::map_hw_error(&*e), "power cycle failed");
            }
            let pause = backoff.min(overall_timeout.saturating_sub(elapsed(sampler.now(), start)));
            let deadline = sampler.now() + pause;
            sampler.wait_until(deadline);
            backoff = backoff.saturating_mul(2);
        }

        let mean = if values.is_empty() {
            let remaining = overall_timeout.saturating_sub(elapsed(sampler.now(), start));
            tracing::warn!(
                remaining_ms = remaining.as_millis() as u64,
                "no tare samples; falling back to stable capture"
            );
            if remaining.is_zero() {
                None
            } else {
                sampler
                    .stable_capture(
                        budget.min(5),
                        budget,
                        self.cfg.refine_max_std_counts,
                        Duration::from_millis(self.stability.check_window_ms).min(remaining),
                        remaining,
                    )
                    .and_then(|s| s.mean_counts())
            }
        } else {
            crate::stats::WindowStats::from_samples(&values).mean_counts()
        };

        let waited_ms = sampler.clock().ms_since(start);
        let zero = mean.ok_or(ScaleError::SensorUnavailable { waited_ms })?;
        self.state.zero_offset = zero;
        tracing::info!(zero, samples = values.len(), power_cycles = retries, "tare complete");
        Ok(zero)
    }

    /// Tare, confirm the empty platform, then derive the factor from one
    /// reference mass. Persists the factor on success.
    pub fn single_point_calibrate<S: SampleSource>(
        &mut self,
        sampler: &mut Sampler<S>,
        known_mass_g: f32,
    ) -> Result<f32, ScaleError> {
        let r = self.single_point_inner(sampler, known_mass_g);
        self.set_phase(CalPhase::Idle);
        r
    }

    fn single_point_inner<S: SampleSource>(
        &mut self,
        sampler: &mut Sampler<S>,
        known_mass_g: f32,
    ) -> Result<f32, ScaleError> {
        if !(known_mass_g.is_finite() && known_mass_g > 0.0) {
            return Err(ScaleError::InvalidArgument(format!(
                "reference mass must be > 0 g (got {known_mass_g})"
            )));
        }
        let cfg = self.cfg.clone();

        tracing::info!("remove everything from the platform");
        self.tare_inner(
            sampler,
            cfg.tare_samples,
            Duration::from_millis(cfg.tare_read_timeout_ms),
            Duration::from_millis(cfg.tare_timeout_ms),
        )?;

        self.set_phase(CalPhase::AwaitingZero);
        if let Some(zero) = sampler
            .stable_capture(
                cfg.refine_min_samples,
                cfg.refine_max_samples,
                cfg.refine_max_std_counts,
                Duration::from_millis(cfg.refine_min_ms),
                Duration::from_millis(cfg.refine_timeout_ms),
            )
            .and_then(|s| s.mean_counts())
        {
            tracing::debug!(zero, "zero offset refined");
            self.state.zero_offset = zero;
        }
        let empty = sampler.detector(&self.stability, f64::from).is_stable(
            cfg.zero_max_std_counts,
            Duration::from_millis(cfg.zero_stable_ms),
            Duration::from_millis(cfg.zero_timeout_ms),
        );
        if !empty {
            return Err(ScaleError::StabilityTimeout {
                phase: "confirming the empty platform",
            });
        }

        self.set_phase(CalPhase::AwaitingMass);
        tracing::info!(mass_g = known_mass_g, "place the reference mass on the platform");
        let deadline = sampler.now() + Duration::from_millis(cfg.settle_ms);
        sampler.wait_until(deadline);

        let zero = self.state.zero_offset;
        let plateau = sampler
            .detector(&self.stability, move |raw| {
                (i64::from(raw) - i64::from(zero)) as f64
            })
            .find_plateau(
                Duration::from_millis(cfg.plateau_window_ms),
                cfg.plateau_max_std_counts,
                Duration::from_millis(cfg.plateau_min_ms),
                Duration::from_millis(cfg.plateau_timeout_ms),
            )
            .ok_or(ScaleError::StabilityTimeout {
                phase: "waiting for the reference mass to settle",
            })?;

        self.set_phase(CalPhase::Computing);
        let polarity = self.state.polarity;
        let delta = polarity.sign() * plateau;
        let delta_counts = delta.round() as i64;
        if delta_counts < cfg.min_delta_counts {
            return Err(ScaleError::InsufficientSignal {
                delta: delta_counts,
                min: cfg.min_delta_counts,
            });
        }
        let factor = (delta / f64::from(known_mass_g)) as f32;
        self.state = CalibrationState::new(zero, factor, polarity)?;
        tracing::info!(factor, zero, plateau, "single-point calibration computed");
        self.persist();
        Ok(factor)
    }

    /// Settle, wait for a plateau and record it as two-point sample `slot`.
    pub fn record_point<S: SampleSource>(
        &mut self,
        sampler: &mut Sampler<S>,
        slot: PointSlot,
        mass_g: f32,
    ) -> Result<CalibrationPoint, ScaleError> {
        let r = self.record_point_inner(sampler, slot, mass_g);
        self.set_phase(CalPhase::Idle);
        r
    }

    fn record_point_inner<S: SampleSource>(
        &mut self,
        sampler: &mut Sampler<S>,
        slot: PointSlot,
        mass_g: f32,
    ) -> Result<CalibrationPoint, ScaleError> {
        if !(mass_g.is_finite() && mass_g >= 0.0) {
            return Err(ScaleError::InvalidArgument(format!(
                "point mass must be >= 0 g (got {mass_g})"
            )));
        }
        self.set_phase(CalPhase::AwaitingMass);
        tracing::info!(%slot, mass_g, "recording calibration point");
        let deadline = sampler.now() + Duration::from_millis(self.cfg.point_settle_ms);
        sampler.wait_until(deadline);

        let zero = self.state.zero_offset;
        let tared = sampler
            .detector(&self.stability, move |raw| {
                (i64::from(raw) - i64::from(zero)) as f64
            })
            .find_plateau(
                Duration::from_millis(self.cfg.plateau_window_ms),
                self.cfg.plateau_max_std_counts,
                Duration::from_millis(self.cfg.plateau_min_ms),
                Duration::from_millis(self.cfg.plateau_timeout_ms),
            )
            .ok_or(ScaleError::StabilityTimeout {
                phase: "recording a calibration point",
            })?;

        let raw = (tared.round() as i64 + i64::from(zero))
            .clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32;
        let point = CalibrationPoint { mass_g, raw };
        self.points[slot.index()] = Some(point);
        tracing::info!(%slot, mass_g, raw, "calibration point stored");
        Ok(point)
    }

    /// Fit the factor and zero offset through the two recorded points.
    pub fn solve_two_point(&mut self) -> Result<f32, ScaleError> {
        let r = self.solve_inner();
        self.set_phase(CalPhase::Idle);
        r
    }

    fn solve_inner(&mut self) -> Result<f32, ScaleError> {
        let p1 = self.points[0].ok_or(ScaleError::MissingCalibrationPoint(PointSlot::One))?;
        let p2 = self.points[1].ok_or(ScaleError::MissingCalibrationPoint(PointSlot::Two))?;
        self.set_phase(CalPhase::Computing);

        let dm = p2.mass_g - p1.mass_g;
        if dm.abs() < MIN_MASS_SPAN_G {
            return Err(ScaleError::DegenerateMasses {
                m1: p1.mass_g,
                m2: p2.mass_g,
            });
        }
        let draw = i64::from(p2.raw) - i64::from(p1.raw);
        if draw.abs() < self.cfg.min_delta_counts {
            return Err(ScaleError::InsufficientSignal {
                delta: draw.abs(),
                min: self.cfg.min_delta_counts,
            });
        }
        let polarity = self.state.polarity;
        let sign = polarity.sign();
        let factor64 = sign * draw as f64 / f64::from(dm);
        let factor = factor64 as f32;
        if !(factor.is_finite() && factor > 0.0) {
            return Err(ScaleError::PolarityMismatch { factor });
        }
        let zero = (f64::from(p1.raw) - sign * factor64 * f64::from(p1.mass_g)).round();
        let zero = zero.clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;

        self.state = CalibrationState::new(zero, factor, polarity)?;
        self.points = [None, None];
        tracing::info!(factor, zero, "two-point calibration solved");
        self.persist();
        Ok(factor)
    }

    /// Forget any stored calibration and return to the configured default.
    ///
    /// Polarity describes the wiring and is kept, seeded or configured.
    pub fn reset_to_default(&mut self) -> f32 {
        if let Err(e) = self.store.clear_factor() {
            let err = ScaleError::Persistence(e.to_string());
            tracing::warn!(error = %err, "failed to clear stored factor");
        }
        self.state = CalibrationState {
            zero_offset: 0,
            scale_factor: self.cfg.default_factor,
            polarity: self.state.polarity,
        };
        self.points = [None, None];
        self.set_phase(CalPhase::Idle);
        tracing::info!(factor = self.cfg.default_factor, "calibration reset to default");
        self.cfg.default_factor
    }
}
