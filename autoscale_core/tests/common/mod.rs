#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use autoscale_core::builder::{ControllerParts, build_controller};
use autoscale_core::mocks::{MemoryFactorStore, RecordingUploader};
use autoscale_core::{CalibrationState, Polarity, ScaleController, TickStatus};
use autoscale_hardware::{SimHandle, SimulatedLoadCell};
use autoscale_traits::{BoxError, SampleSource, TestClock};

pub const ZERO_RAW: i32 = 842_913;
pub const COUNTS_PER_GRAM: f32 = 9_863.233;
pub const NOISE: i32 = 150;

pub type SimController = ScaleController<SimulatedLoadCell, MemoryFactorStore, RecordingUploader>;

pub struct Rig {
    pub clock: TestClock,
    pub sim: SimHandle,
    pub store: MemoryFactorStore,
    pub uploads: RecordingUploader,
    pub ctl: SimController,
}

pub fn cell(clock: &TestClock, counts_per_gram: f32, noise: i32) -> SimulatedLoadCell {
    SimulatedLoadCell::new(
        Arc::new(clock.clone()),
        ZERO_RAW,
        counts_per_gram,
        Duration::from_millis(12),
    )
    .with_noise(noise)
}

pub fn rig_with(cell: SimulatedLoadCell, clock: TestClock, parts: ControllerParts) -> Rig {
    let sim = cell.handle();
    let store = MemoryFactorStore::new();
    let uploads = RecordingUploader::new();
    let parts = ControllerParts {
        clock: Some(Arc::new(clock.clone())),
        ..parts
    };
    let ctl = build_controller(cell, store.clone(), uploads.clone(), parts).expect("controller");
    Rig {
        clock,
        sim,
        store,
        uploads,
        ctl,
    }
}

/// Calibration matching the simulated cell exactly.
pub fn matched_parts() -> ControllerParts {
    ControllerParts {
        seed: Some(
            CalibrationState::new(ZERO_RAW, COUNTS_PER_GRAM, Polarity::Positive).expect("state"),
        ),
        ..ControllerParts::default()
    }
}

/// Default rig: the simulated cell matches the seeded calibration.
pub fn rig(steps: &[(u64, f32)]) -> Rig {
    let clock = TestClock::new();
    let c = cell(&clock, COUNTS_PER_GRAM, NOISE)
        .with_steps(steps.iter().map(|&(ms, kg)| (Duration::from_millis(ms), kg)));
    rig_with(c, clock, matched_parts())
}

/// Tick until `pred` holds or `limit` of simulated time passes.
pub fn tick_until(rig: &mut Rig, limit: Duration, mut pred: impl FnMut(&TickStatus) -> bool) -> Option<TickStatus> {
    let start = rig.clock.elapsed();
    while rig.clock.elapsed() - start < limit {
        let st = rig.ctl.tick();
        if pred(&st) {
            return Some(st);
        }
        rig.clock.advance(Duration::from_millis(2));
    }
    None
}

/// Paced source whose raw value is a function of elapsed clock time.
pub struct Scripted<F> {
    clock: TestClock,
    period: Duration,
    next_due: Duration,
    f: F,
}

impl<F: FnMut(Duration) -> i32> Scripted<F> {
    pub fn new(clock: &TestClock, period_ms: u64, f: F) -> Self {
        Self {
            clock: clock.clone(),
            period: Duration::from_millis(period_ms),
            next_due: clock.elapsed(),
            f,
        }
    }
}

impl<F: FnMut(Duration) -> i32> SampleSource for Scripted<F> {
    fn is_ready(&mut self) -> bool {
        self.clock.elapsed() >= self.next_due
    }

    fn read_raw(&mut self) -> Result<i32, BoxError> {
        let now = self.clock.elapsed();
        self.next_due = now + self.period;
        Ok((self.f)(now))
    }
}
