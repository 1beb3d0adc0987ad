mod common;

use std::time::Duration;

use autoscale_core::builder::ControllerParts;
use autoscale_core::{CalPhase, CalibrationState, PointSlot, Polarity, Reply, RunMode, ScaleError};
use autoscale_traits::{FactorStore, TestClock};
use common::{COUNTS_PER_GRAM, ZERO_RAW, rig, rig_with};
use rstest::rstest;

#[test]
fn two_point_recovers_exact_factor() {
    let clock = TestClock::new();
    let cell = common::cell(&clock, 986.32, 0);
    let mut r = rig_with(cell, clock, ControllerParts::default());

    assert_eq!(r.ctl.record_point(PointSlot::One, 0.0), Ok(ZERO_RAW));
    r.sim.set_load_kg(0.1);
    assert_eq!(r.ctl.record_point(PointSlot::Two, 100.0), Ok(ZERO_RAW + 98_632));

    let factor = r.ctl.solve().expect("solve");
    assert!((factor - 986.32).abs() < 1e-3, "{factor}");
    assert_eq!(r.ctl.calibration().zero_offset(), ZERO_RAW);
    assert_eq!(r.store.stored(), Some(factor));
    assert_eq!(r.ctl.engine().points(), &[None, None]);
    assert_eq!(r.ctl.mode(), RunMode::Idle);
}

#[test]
fn two_point_through_console() {
    let mut r = rig(&[]);
    assert!(matches!(
        r.ctl.execute_line("cal1 0"),
        Reply::PointRecorded { slot: PointSlot::One, .. }
    ));
    r.sim.set_load_kg(1.0);
    assert!(r.ctl.execute_line("CAL2 1000").is_ok());
    let Reply::Calibrated { factor } = r.ctl.execute_line("solve") else {
        panic!("solve failed");
    };
    assert!((factor - COUNTS_PER_GRAM).abs() / COUNTS_PER_GRAM < 1e-3, "{factor}");
    let kg = r.ctl.verification_read().expect("reading");
    assert!((kg - 1.0).abs() < 0.001, "{kg}");
}

#[test]
fn equal_masses_are_degenerate() {
    let mut r = rig(&[]);
    r.ctl.record_point(PointSlot::One, 100.0).expect("p1");
    r.sim.set_load_kg(0.2);
    r.ctl.record_point(PointSlot::Two, 100.0).expect("p2");
    assert_eq!(
        r.ctl.solve(),
        Err(ScaleError::DegenerateMasses { m1: 100.0, m2: 100.0 })
    );
    assert_eq!(r.store.stored(), None);
    // points survive so the operator can redo one of them
    assert!(r.ctl.engine().points().iter().all(Option::is_some));
}

#[test]
fn unchanged_load_is_insufficient_signal() {
    let mut r = rig(&[]);
    r.ctl.record_point(PointSlot::One, 0.0).expect("p1");
    r.ctl.record_point(PointSlot::Two, 500.0).expect("p2");
    assert!(matches!(
        r.ctl.solve(),
        Err(ScaleError::InsufficientSignal { .. })
    ));
}

#[test]
fn single_point_calibration_with_mass_placed_while_settling() {
    // Tare, zero refinement and the empty-platform check take about 2.5 s;
    // the settle delay then runs for 2 s.
    let mut r = rig(&[(3_000, 0.5)]);
    let factor = r.ctl.calibrate(500.0).expect("calibrate");
    assert!((factor - COUNTS_PER_GRAM).abs() / COUNTS_PER_GRAM < 1e-3, "{factor}");
    let zero = r.ctl.calibration().zero_offset();
    assert!((zero - ZERO_RAW).abs() <= 150, "{zero}");
    assert_eq!(r.store.stored(), Some(factor));
    assert_eq!(r.ctl.phase(), CalPhase::Idle);
    assert_eq!(r.ctl.mode(), RunMode::Idle);
}

#[test]
fn single_point_without_mass_is_insufficient_signal() {
    let mut r = rig(&[]);
    let before = r.ctl.calibration().scale_factor();
    assert!(matches!(
        r.ctl.calibrate(500.0),
        Err(ScaleError::InsufficientSignal { min: 1_000, .. })
    ));
    assert_eq!(r.ctl.calibration().scale_factor(), before);
    assert_eq!(r.store.stored(), None);
}

#[test]
fn single_point_rejects_negative_polarity_signal() {
    let clock = TestClock::new();
    let cell = common::cell(&clock, COUNTS_PER_GRAM, 150).with_steps([(Duration::from_secs(3), -0.5)]);
    let mut r = rig_with(cell, clock, ControllerParts::default());
    assert!(matches!(
        r.ctl.calibrate(500.0),
        Err(ScaleError::InsufficientSignal { .. })
    ));
}

#[test]
fn negative_polarity_is_honoured() {
    let clock = TestClock::new();
    let cell = common::cell(&clock, COUNTS_PER_GRAM, 150).with_steps([(Duration::from_secs(3), -0.5)]);
    let mut parts = ControllerParts::default();
    parts.calibration.polarity = Polarity::Negative;
    let mut r = rig_with(cell, clock, parts);
    let factor = r.ctl.calibrate(500.0).expect("calibrate");
    assert!((factor - COUNTS_PER_GRAM).abs() / COUNTS_PER_GRAM < 1e-3, "{factor}");
}

#[test]
fn seeded_polarity_outranks_configured_polarity() {
    let clock = TestClock::new();
    let cell = common::cell(&clock, COUNTS_PER_GRAM, 150).with_steps([(Duration::from_secs(3), -0.5)]);
    let parts = ControllerParts {
        seed: Some(CalibrationState::new(ZERO_RAW, 1_000.0, Polarity::Negative).expect("seed")),
        ..ControllerParts::default()
    };
    assert_eq!(parts.calibration.polarity, Polarity::Positive);
    let mut r = rig_with(cell, clock, parts);
    let factor = r.ctl.calibrate(500.0).expect("calibrate");
    assert!((factor - COUNTS_PER_GRAM).abs() / COUNTS_PER_GRAM < 1e-3, "{factor}");
    assert_eq!(r.ctl.calibration().polarity(), Polarity::Negative);
}

#[rstest]
#[case(0.0)]
#[case(-5.0)]
#[case(f32::NAN)]
fn single_point_rejects_bad_mass(#[case] mass: f32) {
    let mut r = rig(&[]);
    assert!(matches!(
        r.ctl.calibrate(mass),
        Err(ScaleError::InvalidArgument(_))
    ));
    assert_eq!(r.sim.reads(), 0, "nothing sampled for a rejected argument");
}

#[test]
fn tare_power_cycles_a_stalled_sensor() {
    let mut r = rig(&[]);
    r.sim.stall(Some(2));
    let zero = r.ctl.tare().expect("tare");
    assert!((zero - ZERO_RAW).abs() <= 150);
    assert_eq!(r.sim.power_cycles(), 2);
}

#[test]
fn tare_reports_dead_sensor() {
    let mut r = rig(&[]);
    r.sim.stall(None);
    let err = r.ctl.tare().expect_err("dead sensor");
    assert!(matches!(err, ScaleError::SensorUnavailable { waited_ms } if waited_ms >= 5_000));
    assert_eq!(r.sim.power_cycles(), 3);
    assert_eq!(r.ctl.mode(), RunMode::Idle);
    assert_eq!(r.ctl.calibration().zero_offset(), ZERO_RAW, "zero left untouched");
}

#[test]
fn reset_is_idempotent() {
    let mut r = rig(&[]);
    r.ctl.record_point(PointSlot::One, 0.0).expect("p1");
    r.sim.set_load_kg(0.1);
    r.ctl.record_point(PointSlot::Two, 100.0).expect("p2");
    r.ctl.solve().expect("solve");
    assert!(r.store.stored().is_some());
    // a half-finished two-point run is dropped too
    r.ctl.record_point(PointSlot::One, 100.0).expect("p1 again");

    let default = r.ctl.engine().cfg().default_factor;
    for _ in 0..2 {
        assert_eq!(r.ctl.reset_calibration(), default);
        assert_eq!(r.store.stored(), None);
        assert_eq!(r.ctl.calibration().scale_factor(), default);
        assert_eq!(r.ctl.calibration().zero_offset(), 0);
        assert_eq!(r.ctl.engine().points(), &[None, None]);
    }
}

#[test]
fn startup_tares_and_loads_stored_factor() {
    let mut r = rig(&[]);
    r.store.clone().save_factor(4_321.0).expect("save");
    let report = r.ctl.startup();
    assert!(report.loaded);
    assert_eq!(report.factor, 4_321.0);
    assert!(report.zero.is_some_and(|z| (z - ZERO_RAW).abs() <= 150));
}

#[test]
fn startup_survives_a_dead_sensor() {
    let mut r = rig(&[]);
    r.sim.stall(None);
    let report = r.ctl.startup();
    assert_eq!(report.zero, None);
    assert!(!report.loaded);
}
