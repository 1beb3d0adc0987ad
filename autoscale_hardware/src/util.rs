use std::time::{Duration, Instant};

use crate::error::{HwError, Result};

/// Wait until `is_high` turns false (the line went low) or `timeout` expires.
///
/// Sleeps `poll_interval` between checks; returns how long the wait took.
pub fn wait_until_low_with_timeout(
    mut is_high: impl FnMut() -> bool,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<Duration> {
    let start = Instant::now();
    while is_high() {
        let waited = start.elapsed();
        if waited >= timeout {
            tracing::trace!(waited_us = waited.as_micros() as u64, "data-ready wait expired");
            return Err(HwError::DataReadyTimeout);
        }
        std::thread::sleep(poll_interval.min(timeout - waited));
    }
    Ok(start.elapsed())
}
