//! Type-state builder for `ScaleController` and generic `build_controller`.
//!
//! The builder enforces at compile time that a sample source, a factor store
//! and an uploader are provided before `build()` is available. `try_build()`
//! is always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use autoscale_traits::{Clock, FactorStore, MonotonicClock, SampleSource, Uploader};

use crate::calibration::{CalibrationEngine, CalibrationState};
use crate::capture::CaptureMachine;
use crate::config::{CalibrationCfg, CaptureCfg, SamplerCfg, StabilityCfg};
use crate::controller::ScaleController;
use crate::error::{BuildError, Result};
use crate::sampler::Sampler;

pub const DEFAULT_DEVICE_ID: &str = "SCALE-ESP32-DEV-001";

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Everything except the three collaborators.
#[derive(Clone)]
pub struct ControllerParts {
    pub sampler: SamplerCfg,
    pub stability: StabilityCfg,
    pub calibration: CalibrationCfg,
    pub capture: CaptureCfg,
    pub device_id: String,
    pub seed: Option<CalibrationState>,
    pub clock: Option<Arc<dyn Clock + Send + Sync>>,
}

impl Default for ControllerParts {
    fn default() -> Self {
        Self {
            sampler: SamplerCfg::default(),
            stability: StabilityCfg::default(),
            calibration: CalibrationCfg::default(),
            capture: CaptureCfg::default(),
            device_id: DEFAULT_DEVICE_ID.to_string(),
            seed: None,
            clock: None,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

/// Validate configuration and assemble the controller.
///
/// Single source of truth for validation, used by both
/// `ScaleControllerBuilder::try_build()` and `build_controller()`.
fn validate_and_build<S, P, U>(
    source: S,
    store: P,
    uploader: U,
    parts: ControllerParts,
) -> Result<ScaleController<S, P, U>>
where
    S: SampleSource,
    P: FactorStore,
    U: Uploader,
{
    let ControllerParts {
        sampler,
        stability,
        calibration,
        capture,
        device_id,
        seed,
        clock,
    } = parts;

    // ── Validation ───────────────────────────────────────────────────────────
    if device_id.trim().is_empty() {
        return Err(invalid("device id must not be empty"));
    }
    if sampler.max_window_samples == 0 {
        return Err(invalid("max_window_samples must be >= 1"));
    }
    if stability.check_window_ms == 0 {
        return Err(invalid("check_window_ms must be >= 1"));
    }
    if !(stability.plateau_rel_tol >= 0.0 && stability.plateau_floor >= 0.0) {
        return Err(invalid("plateau tolerances must be >= 0"));
    }
    if !(calibration.default_factor.is_finite() && calibration.default_factor > 0.0) {
        return Err(invalid("default factor must be finite and > 0"));
    }
    if calibration.tare_samples == 0 {
        return Err(invalid("tare_samples must be >= 1"));
    }
    if calibration.min_delta_counts <= 0 {
        return Err(invalid("min_delta_counts must be > 0"));
    }
    if calibration.plateau_window_ms == 0 {
        return Err(invalid("plateau_window_ms must be >= 1"));
    }
    if !(capture.ema_alpha > 0.0 && capture.ema_alpha <= 1.0) {
        return Err(invalid("ema_alpha must be in (0.0, 1.0]"));
    }
    if !(capture.release_kg > 0.0 && capture.release_kg < capture.trigger_kg) {
        return Err(invalid("release threshold must be > 0 and below the trigger threshold"));
    }
    if capture.idle_poll_ms == 0 {
        return Err(invalid("idle_poll_ms must be >= 1"));
    }
    if capture.capacity == 0 {
        return Err(invalid("session capacity must be >= 1"));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let clock = clock.unwrap_or_else(|| Arc::new(MonotonicClock::new()));
    let mut engine = CalibrationEngine::new(calibration, stability, store)?;
    if let Some(state) = seed {
        engine.seed(state);
    }
    Ok(ScaleController::new(
        Sampler::new(source, clock, sampler),
        engine,
        CaptureMachine::new(capture),
        uploader,
        device_id,
    ))
}

/// Builder for the boxed `ScaleController`.
pub struct ScaleControllerBuilder<S, P, U> {
    source: Option<Box<dyn SampleSource + Send>>,
    store: Option<Box<dyn FactorStore + Send>>,
    uploader: Option<Box<dyn Uploader + Send>>,
    parts: ControllerParts,
    _s: PhantomData<S>,
    _p: PhantomData<P>,
    _u: PhantomData<U>,
}

impl Default for ScaleControllerBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            source: None,
            store: None,
            uploader: None,
            parts: ControllerParts::default(),
            _s: PhantomData,
            _p: PhantomData,
            _u: PhantomData,
        }
    }
}

impl ScaleController {
    /// Start building a boxed controller.
    pub fn builder() -> ScaleControllerBuilder<Missing, Missing, Missing> {
        ScaleControllerBuilder::default()
    }
}

impl<S, P, U> ScaleControllerBuilder<S, P, U> {
    /// Fallible build available in any type-state; returns detailed BuildError for missing pieces.
    pub fn try_build(self) -> Result<ScaleController> {
        let source = self
            .source
            .ok_or_else(|| eyre::Report::new(BuildError::MissingSource))?;
        let store = self
            .store
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStore))?;
        let uploader = self
            .uploader
            .ok_or_else(|| eyre::Report::new(BuildError::MissingUploader))?;
        validate_and_build(source, store, uploader, self.parts)
    }

    fn retype<S2, P2, U2>(self) -> ScaleControllerBuilder<S2, P2, U2> {
        ScaleControllerBuilder {
            source: self.source,
            store: self.store,
            uploader: self.uploader,
            parts: self.parts,
            _s: PhantomData,
            _p: PhantomData,
            _u: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<S, P, U> ScaleControllerBuilder<S, P, U> {
    pub fn with_sampler(mut self, sampler: SamplerCfg) -> Self {
        self.parts.sampler = sampler;
        self
    }
    pub fn with_stability(mut self, stability: StabilityCfg) -> Self {
        self.parts.stability = stability;
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.parts.calibration = calibration;
        self
    }
    pub fn with_capture(mut self, capture: CaptureCfg) -> Self {
        self.parts.capture = capture;
        self
    }
    pub fn with_device_id(mut self, id: impl Into<String>) -> Self {
        self.parts.device_id = id.into();
        self
    }
    /// Start from an imported calibration instead of the default factor.
    pub fn with_seed(mut self, state: CalibrationState) -> Self {
        self.parts.seed = Some(state);
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Arc<dyn Clock + Send + Sync>) -> Self {
        self.parts.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<P, U> ScaleControllerBuilder<Missing, P, U> {
    pub fn with_source(
        mut self,
        source: impl SampleSource + Send + 'static,
    ) -> ScaleControllerBuilder<Set, P, U> {
        self.source = Some(Box::new(source));
        self.retype()
    }
}

impl<S, U> ScaleControllerBuilder<S, Missing, U> {
    pub fn with_store(
        mut self,
        store: impl FactorStore + Send + 'static,
    ) -> ScaleControllerBuilder<S, Set, U> {
        self.store = Some(Box::new(store));
        self.retype()
    }
}

impl<S, P> ScaleControllerBuilder<S, P, Missing> {
    pub fn with_uploader(
        mut self,
        uploader: impl Uploader + Send + 'static,
    ) -> ScaleControllerBuilder<S, P, Set> {
        self.uploader = Some(Box::new(uploader));
        self.retype()
    }
}

impl ScaleControllerBuilder<Set, Set, Set> {
    /// Validate and build. Only available once source, store and uploader are set.
    pub fn build(self) -> Result<ScaleController> {
        self.try_build()
    }
}

/// Build a statically-dispatched controller from concrete collaborators.
///
/// Delegates to the shared `validate_and_build`.
pub fn build_controller<S, P, U>(
    source: S,
    store: P,
    uploader: U,
    parts: ControllerParts,
) -> Result<ScaleController<S, P, U>>
where
    S: SampleSource,
    P: FactorStore,
    U: Uploader,
{
    validate_and_build(source, store, uploader, parts)
}
