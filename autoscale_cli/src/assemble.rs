//! Wiring from a validated `Config` to a running controller.
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use autoscale_config::{CalibrationFit, Config, FileFactorStore, SensorKind};
use autoscale_core::mocks::MemoryFactorStore;
use autoscale_core::{
    CalibrationCfg, CalibrationState, CaptureCfg, ControllerParts, SamplerCfg, ScaleController,
    StabilityCfg, build_controller,
};
use autoscale_hardware::SimulatedLoadCell;
use autoscale_traits::{Clock, FactorStore, MonotonicClock, SampleSource};
use eyre::WrapErr;

use crate::upload::JsonlUploader;

pub type CliController =
    ScaleController<Box<dyn SampleSource + Send>, Box<dyn FactorStore + Send>, JsonlUploader>;

pub fn make_source(
    cfg: &Config,
    clock: &Arc<dyn Clock + Send + Sync>,
) -> eyre::Result<Box<dyn SampleSource + Send>> {
    match cfg.sensor.kind {
        SensorKind::Simulated => {
            let sim = &cfg.simulation;
            let cell = SimulatedLoadCell::new(
                Arc::clone(clock),
                sim.zero_raw,
                sim.counts_per_gram,
                Duration::from_millis(sim.sample_period_ms),
            )
            .with_noise(sim.noise_counts)
            .with_steps(
                sim.steps
                    .iter()
                    .map(|s| (Duration::from_millis(s.at_ms), s.kg)),
            );
            tracing::info!(?cell, steps = sim.steps.len(), "using simulated load cell");
            Ok(Box::new(cell))
        }
        SensorKind::Hx711 => open_hx711(cfg),
    }
}

#[cfg(feature = "hardware")]
fn open_hx711(cfg: &Config) -> eyre::Result<Box<dyn SampleSource + Send>> {
    use autoscale_hardware::hx711::{GAIN_A_128, Hx711};

    let pins = cfg
        .pins
        .ok_or_else(|| eyre::eyre!("invalid configuration: missing [pins] for hx711"))?;
    let hx = Hx711::open(
        pins.hx711_dt,
        pins.hx711_sck,
        GAIN_A_128,
        Duration::from_millis(cfg.sensor.data_ready_timeout_ms),
    )
    .wrap_err("open hx711")?;
    tracing::info!(dt = pins.hx711_dt, sck = pins.hx711_sck, "hx711 opened");
    Ok(Box::new(hx))
}

#[cfg(not(feature = "hardware"))]
fn open_hx711(_cfg: &Config) -> eyre::Result<Box<dyn SampleSource + Send>> {
    eyre::bail!("hx711 support not compiled in; rebuild with --features hardware")
}

fn make_store(cfg: &Config) -> Box<dyn FactorStore + Send> {
    match cfg.calibration.store_path.as_deref() {
        Some(path) => Box::new(FileFactorStore::new(path)),
        None => Box::new(MemoryFactorStore::new()),
    }
}

pub fn load_fit(path: &Path) -> eyre::Result<CalibrationFit> {
    let fit = autoscale_config::load_calibration_csv(path)
        .wrap_err_with(|| format!("failed to load calibration {}", path.display()))?;
    tracing::info!(
        zero_offset = fit.zero_offset,
        scale_factor = fit.scale_factor,
        polarity = ?fit.polarity,
        "calibration table loaded"
    );
    Ok(fit)
}

pub fn parts(cfg: &Config, fit: Option<&CalibrationFit>) -> eyre::Result<ControllerParts> {
    let seed = fit.map(CalibrationState::try_from).transpose()?;
    Ok(ControllerParts {
        sampler: SamplerCfg::from(&cfg.sensor),
        stability: StabilityCfg::from(&cfg.stability),
        calibration: CalibrationCfg::from(&cfg.calibration),
        capture: CaptureCfg::from(&cfg.capture),
        device_id: cfg.device.id.clone(),
        seed,
        clock: None,
    })
}

/// Build the controller the CLI runs against.
pub fn controller(cfg: &Config, fit: Option<&CalibrationFit>) -> eyre::Result<CliController> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let source = make_source(cfg, &clock)?;
    let uploader = JsonlUploader::new(cfg.upload.path.as_ref().map(Into::into));
    let mut parts = parts(cfg, fit)?;
    parts.clock = Some(clock);
    build_controller(source, make_store(cfg), uploader, parts)
}
