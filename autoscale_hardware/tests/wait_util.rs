use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::thread;
use std::time::Duration;

use autoscale_hardware::error::HwError;
use autoscale_hardware::util::wait_until_low_with_timeout;

#[test]
fn wait_until_low_success_path() {
    let high = Arc::new(AtomicBool::new(true));
    let high_bg = high.clone();
    thread::spawn(move || {
        thread::sleep(Duration::from_millis(3));
        high_bg.store(false, Ordering::Relaxed);
    });

    let waited = wait_until_low_with_timeout(
        || high.load(Ordering::Relaxed),
        Duration::from_millis(500),
        Duration::from_micros(200),
    )
    .expect("line went low");
    assert!(waited >= Duration::from_millis(3));
}

#[test]
fn already_low_returns_immediately() {
    let waited = wait_until_low_with_timeout(|| false, Duration::ZERO, Duration::from_millis(1))
        .expect("no wait needed");
    assert!(waited < Duration::from_millis(50));
}

#[test]
fn wait_until_low_timeout_path() {
    let err = wait_until_low_with_timeout(
        || true,
        Duration::from_millis(5),
        Duration::from_micros(200),
    )
    .expect_err("expected timeout error");
    assert!(matches!(err, HwError::DataReadyTimeout), "{err:?}");
}
