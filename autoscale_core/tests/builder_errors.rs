use autoscale_core::mocks::{MemoryFactorStore, NoopSource, RecordingUploader};
use autoscale_core::{BuildError, CaptureCfg, CalibrationCfg, ScaleController};
use rstest::rstest;

fn build_error(r: autoscale_core::Result<ScaleController>) -> BuildError {
    r.expect_err("should fail")
        .downcast_ref::<BuildError>()
        .cloned()
        .expect("BuildError")
}

#[test]
fn missing_collaborators_are_reported_in_order() {
    let e = build_error(ScaleController::builder().try_build());
    assert!(matches!(e, BuildError::MissingSource));

    let e = build_error(ScaleController::builder().with_source(NoopSource).try_build());
    assert!(matches!(e, BuildError::MissingStore));

    let e = build_error(
        ScaleController::builder()
            .with_source(NoopSource)
            .with_store(MemoryFactorStore::new())
            .try_build(),
    );
    assert!(matches!(e, BuildError::MissingUploader));
}

#[test]
fn complete_builder_builds() {
    let ctl = ScaleController::builder()
        .with_uploader(RecordingUploader::new())
        .with_store(MemoryFactorStore::new())
        .with_source(NoopSource)
        .with_device_id("bench-01")
        .build()
        .expect("build");
    assert_eq!(ctl.device_id(), "bench-01");
    assert_eq!(
        ctl.calibration().scale_factor(),
        CalibrationCfg::default().default_factor
    );
}

#[rstest]
#[case(CaptureCfg { release_kg: 4.0, ..CaptureCfg::default() }, "release threshold")]
#[case(CaptureCfg { ema_alpha: 0.0, ..CaptureCfg::default() }, "ema_alpha")]
#[case(CaptureCfg { ema_alpha: 1.5, ..CaptureCfg::default() }, "ema_alpha")]
#[case(CaptureCfg { capacity: 0, ..CaptureCfg::default() }, "capacity")]
#[case(CaptureCfg { idle_poll_ms: 0, ..CaptureCfg::default() }, "idle_poll_ms")]
fn invalid_capture_config_is_rejected(#[case] capture: CaptureCfg, #[case] needle: &str) {
    let e = build_error(
        ScaleController::builder()
            .with_source(NoopSource)
            .with_store(MemoryFactorStore::new())
            .with_uploader(RecordingUploader::new())
            .with_capture(capture)
            .build(),
    );
    assert!(e.to_string().contains(needle), "{e}");
}

#[rstest]
#[case(CalibrationCfg { default_factor: 0.0, ..CalibrationCfg::default() }, "default factor")]
#[case(CalibrationCfg { default_factor: f32::NAN, ..CalibrationCfg::default() }, "default factor")]
#[case(CalibrationCfg { tare_samples: 0, ..CalibrationCfg::default() }, "tare_samples")]
#[case(CalibrationCfg { min_delta_counts: 0, ..CalibrationCfg::default() }, "min_delta_counts")]
#[case(CalibrationCfg { plateau_window_ms: 0, ..CalibrationCfg::default() }, "plateau_window_ms")]
fn invalid_calibration_config_is_rejected(#[case] calibration: CalibrationCfg, #[case] needle: &str) {
    let e = build_error(
        ScaleController::builder()
            .with_source(NoopSource)
            .with_store(MemoryFactorStore::new())
            .with_uploader(RecordingUploader::new())
            .with_calibration(calibration)
            .build(),
    );
    assert!(e.to_string().contains(needle), "{e}");
}

#[test]
fn blank_device_id_is_rejected() {
    let e = build_error(
        ScaleController::builder()
            .with_source(NoopSource)
            .with_store(MemoryFactorStore::new())
            .with_uploader(RecordingUploader::new())
            .with_device_id("   ")
            .build(),
    );
    assert!(e.to_string().contains("device id"));
}
