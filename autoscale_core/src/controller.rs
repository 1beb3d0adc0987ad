//! The single owner of run mode, calibration and capture.
//!
//! `ScaleController` ties the sampler, the calibration engine and the capture
//! machine together. Everything runs on the caller's thread: `tick` does one
//! bounded unit of Idle or Active work, `execute` runs one operator command
//! to completion. A calibration command switches the mode to `Calibrating`
//! and a scoped guard switches it back, whatever the outcome.
use std::sync::Arc;
use std::time::{Duration, Instant};

use autoscale_traits::{Clock, FactorStore, SampleSource, Uploader};

use crate::calibration::{CalPhase, CalibrationEngine, CalibrationState, PointSlot};
use crate::capture::{ActiveOutcome, CaptureMachine, IdleOutcome};
use crate::console::{Command, HELP, ParseError};
use crate::error::ScaleError;
use crate::sampler::Sampler;
use crate::status::{EndReason, RunMode, TickStatus};

/// Outcome of one operator command, printable for the console.
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Help,
    Tared { zero: i32 },
    Calibrated { factor: f32 },
    PointRecorded { slot: PointSlot, mass_g: f32, raw: i32 },
    Reset { factor: f32 },
    Failed(ScaleError),
    Rejected(ParseError),
}

impl Reply {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Reply::Failed(_) | Reply::Rejected(_))
    }
}

impl core::fmt::Display for Reply {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Reply::Help => f.write_str(HELP),
            Reply::Tared { zero } => write!(f, "[TARE] zero offset = {zero}"),
            Reply::Calibrated { factor } => {
                write!(f, "[CAL] factor = {factor:.5} counts/g (saved)")
            }
            Reply::PointRecorded { slot, mass_g, raw } => {
                write!(f, "[CAL{slot}] recorded {mass_g} g at raw {raw}")
            }
            Reply::Reset { factor } => write!(f, "[CAL] reset to default factor {factor:.5}"),
            Reply::Failed(e) => write!(f, "[ERR] {e}"),
            Reply::Rejected(ParseError::Unknown(cmd)) => {
                write!(f, "[ERR] unknown command {cmd:?}\n{HELP}")
            }
            Reply::Rejected(e) => write!(f, "[ERR] {e}"),
        }
    }
}

/// What `startup` established.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartupReport {
    /// Zero offset from the initial tare, if the sensor answered.
    pub zero: Option<i32>,
    pub factor: f32,
    /// True when the factor came from the store.
    pub loaded: bool,
}

/// Restores Idle and starts the capture cooldown when dropped.
struct CalibrationGuard<'a> {
    mode: &'a mut RunMode,
    capture: &'a mut CaptureMachine,
    clock: Arc<dyn Clock + Send + Sync>,
}

impl Drop for CalibrationGuard<'_> {
    fn drop(&mut self) {
        *self.mode = RunMode::Idle;
        self.capture.start_cooldown(self.clock.now());
        tracing::debug!("calibration finished; capture cooling down");
    }
}

pub struct ScaleController<
    S = Box<dyn SampleSource + Send>,
    P = Box<dyn FactorStore + Send>,
    U = Box<dyn Uploader + Send>,
> {
    pub(crate) sampler: Sampler<S>,
    pub(crate) engine: CalibrationEngine<P>,
    pub(crate) capture: CaptureMachine,
    pub(crate) uploader: U,
    pub(crate) device_id: String,
    pub(crate) mode: RunMode,
}

impl<S, P, U> core::fmt::Debug for ScaleController<S, P, U> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ScaleController")
            .field("device_id", &self.device_id)
            .field("mode", &self.mode)
            .field("calibration", &self.engine)
            .finish()
    }
}

impl<S: SampleSource, P: FactorStore, U: Uploader> ScaleController<S, P, U> {
    pub fn new(
        sampler: Sampler<S>,
        engine: CalibrationEngine<P>,
        capture: CaptureMachine,
        uploader: U,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            sampler,
            engine,
            capture,
            uploader,
            device_id: device_id.into(),
            mode: RunMode::Idle,
        }
    }

    pub fn mode(&self) -> RunMode {
        self.mode
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    pub fn calibration(&self) -> &CalibrationState {
        self.engine.state()
    }

    pub fn phase(&self) -> CalPhase {
        self.engine.phase()
    }

    pub fn engine(&self) -> &CalibrationEngine<P> {
        &self.engine
    }

    pub fn capture(&self) -> &CaptureMachine {
        &self.capture
    }

    pub fn uploader(&self) -> &U {
        &self.uploader
    }

    pub fn source_mut(&mut self) -> &mut S {
        self.sampler.source_mut()
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        self.sampler.clock()
    }

    /// Initial tare, then adopt a stored factor if there is one.
    pub fn startup(&mut self) -> StartupReport {
        let zero = match self.calibrating(|sampler, engine| engine.tare_default(sampler)) {
            Ok(z) => Some(z),
            Err(e) => {
                tracing::warn!(error = %e, "startup tare failed; continuing untared");
                None
            }
        };
        let loaded = self.engine.load_persisted();
        let factor = self.engine.state().scale_factor();
        tracing::info!(?zero, factor, loaded, device_id = %self.device_id, "scale ready");
        StartupReport {
            zero,
            factor,
            loaded,
        }
    }

    /// Run `op` with the mode set to `Calibrating`.
    ///
    /// An Active session is aborted first. The guard restores Idle and the
    /// capture cooldown on every exit path.
    fn calibrating<T>(
        &mut self,
        op: impl FnOnce(&mut Sampler<S>, &mut CalibrationEngine<P>) -> Result<T, ScaleError>,
    ) -> Result<T, ScaleError> {
        let now = self.sampler.now();
        if self.capture.is_active() {
            tracing::warn!("calibration requested during a session");
            self.capture.abort_session(now);
        }
        self.mode = RunMode::Calibrating;
        let _guard = CalibrationGuard {
            mode: &mut self.mode,
            capture: &mut self.capture,
            clock: Arc::clone(self.sampler.clock()),
        };
        let r = op(&mut self.sampler, &mut self.engine);
        if let Err(e) = &r {
            tracing::warn!(error = %e, "calibration step failed");
        }
        r
    }

    pub fn tare(&mut self) -> Result<i32, ScaleError> {
        self.calibrating(|sampler, engine| engine.tare_default(sampler))
    }

    pub fn calibrate(&mut self, mass_g: f32) -> Result<f32, ScaleError> {
        let r = self.calibrating(|sampler, engine| engine.single_point_calibrate(sampler, mass_g));
        if r.is_ok() {
            self.verification_read();
        }
        r
    }

    pub fn record_point(&mut self, slot: PointSlot, mass_g: f32) -> Result<i32, ScaleError> {
        self.calibrating(|sampler, engine| engine.record_point(sampler, slot, mass_g))
            .map(|p| p.raw)
    }

    pub fn solve(&mut self) -> Result<f32, ScaleError> {
        let r = self.calibrating(|_, engine| engine.solve_two_point());
        if r.is_ok() {
            self.verification_read();
        }
        r
    }

    pub fn reset_calibration(&mut self) -> f32 {
        let r: Result<f32, ScaleError> = self.calibrating(|_, engine| Ok(engine.reset_to_default()));
        r.unwrap_or(self.engine.cfg().default_factor)
    }

    /// One live reading in kg, logged after a successful calibration.
    pub fn verification_read(&mut self) -> Option<f32> {
        let timeout = Duration::from_millis(self.engine.cfg().tare_read_timeout_ms);
        let kg = self
            .sampler
            .read_within(timeout)
            .map(|raw| self.engine.state().to_kg(raw));
        match kg {
            Some(kg) => tracing::info!(kg, "verification reading"),
            None => tracing::warn!("no verification reading"),
        }
        kg
    }

    /// Parse and execute one console line.
    pub fn execute_line(&mut self, line: &str) -> Reply {
        match line.parse::<Command>() {
            Ok(cmd) => self.execute(cmd),
            Err(e) => {
                tracing::debug!(error = %e, line, "command rejected");
                Reply::Rejected(e)
            }
        }
    }

    pub fn execute(&mut self, cmd: Command) -> Reply {
        tracing::info!(?cmd, "command");
        let reply = match cmd {
            Command::Help => Ok(Reply::Help),
            Command::Tare => self.tare().map(|zero| Reply::Tared { zero }),
            Command::Calibrate { mass_g } => {
                self.calibrate(mass_g).map(|factor| Reply::Calibrated { factor })
            }
            Command::RecordPoint { slot, mass_g } => self
                .record_point(slot, mass_g)
                .map(|raw| Reply::PointRecorded { slot, mass_g, raw }),
            Command::Solve => self.solve().map(|factor| Reply::Calibrated { factor }),
            Command::ResetCal => Ok(Reply::Reset {
                factor: self.reset_calibration(),
            }),
        };
        reply.unwrap_or_else(Reply::Failed)
    }

    /// One bounded unit of capture work.
    pub fn tick(&mut self) -> TickStatus {
        let now = self.sampler.now();
        match self.mode {
            RunMode::Calibrating => TickStatus::Calibrating(self.engine.phase()),
            RunMode::Idle => self.tick_idle(now),
            RunMode::Active => self.tick_active(now),
        }
    }

    fn tick_idle(&mut self, now: Instant) -> TickStatus {
        if !self.capture.idle_poll_due(now) {
            return TickStatus::Idle {
                ema_kg: self.capture.ema_kg(),
                armed: self.capture.is_armed(),
            };
        }
        let timeout = Duration::from_millis(self.capture.cfg().fast_read_timeout_ms);
        let kg = self
            .sampler
            .read_within(timeout)
            .map(|raw| self.engine.state().to_kg(raw));
        let now = self.sampler.now();
        match self.capture.on_idle_sample(now, kg) {
            IdleOutcome::NoData => TickStatus::Idle {
                ema_kg: None,
                armed: false,
            },
            IdleOutcome::Waiting { ema_kg, armed } => TickStatus::Idle {
                ema_kg: Some(ema_kg),
                armed,
            },
            IdleOutcome::Triggered { ema_kg } => {
                self.mode = RunMode::Active;
                tracing::info!(ema_kg, "session started");
                TickStatus::Triggered { ema_kg }
            }
        }
    }

    fn tick_active(&mut self, now: Instant) -> TickStatus {
        if self.capture.max_duration_reached(now) {
            return self.end_session(now, EndReason::MaxDuration);
        }
        let Some(raw) = self.sampler.try_read() else {
            return TickStatus::Active {
                samples: self.capture.buffer().len(),
            };
        };
        let kg = self.engine.state().to_kg(raw);
        let now = self.sampler.now();
        match self.capture.on_active_sample(now, kg) {
            ActiveOutcome::Continue => TickStatus::Active {
                samples: self.capture.buffer().len(),
            },
            ActiveOutcome::End(reason) => self.end_session(now, reason),
        }
    }

    fn end_session(&mut self, now: Instant, reason: EndReason) -> TickStatus {
        let samples = self.capture.buffer().len();
        let uploader = &mut self.uploader;
        let device_id = self.device_id.as_str();
        let uploaded = self
            .capture
            .end_session(now, reason, |s| uploader.submit(s, device_id));
        if !uploaded {
            tracing::warn!(samples, "session upload failed; samples discarded");
        }
        self.mode = RunMode::Idle;
        TickStatus::SessionEnded {
            reason,
            samples,
            uploaded,
        }
    }

    /// Hand an in-progress session to the uploader before shutting down.
    pub fn flush(&mut self) -> Option<TickStatus> {
        if self.mode != RunMode::Active {
            return None;
        }
        let now = self.sampler.now();
        Some(self.end_session(now, EndReason::Shutdown))
    }
}
