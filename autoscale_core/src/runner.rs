//! Cooperative control loop around a `ScaleController`.
//!
//! One thread owns the controller. Each pass drains pending console lines,
//! runs one tick and yields through the clock. Shutdown is observed between
//! passes; an in-progress session is flushed before returning.
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use autoscale_traits::{FactorStore, SampleSource, Uploader};

use crate::controller::{Reply, ScaleController};
use crate::status::TickStatus;

/// Loop pacing and limits.
#[derive(Debug, Clone, Copy)]
pub struct RunParams {
    /// Yield between passes that did no work.
    pub tick_interval: Duration,
    /// Stop after this long even without a shutdown request.
    pub max_runtime: Option<Duration>,
    /// Run the initial tare and factor load before looping.
    pub startup: bool,
}

impl Default for RunParams {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(2),
            max_runtime: None,
            startup: true,
        }
    }
}

/// Totals for one `run` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub sessions: u32,
    pub uploaded: u32,
    pub commands: u32,
    pub ticks: u64,
}

impl RunSummary {
    fn record(&mut self, status: &TickStatus) {
        if let TickStatus::SessionEnded { uploaded, .. } = status {
            self.sessions += 1;
            if *uploaded {
                self.uploaded += 1;
            }
        }
    }
}

/// Drive `controller` until `shutdown` is set or `max_runtime` elapses.
///
/// `next_command` is polled without blocking; it returns `None` when no
/// console line is pending. Every reply goes to `on_reply` and every tick
/// result to `on_status`.
pub fn run<S, P, U>(
    controller: &mut ScaleController<S, P, U>,
    params: RunParams,
    shutdown: &AtomicBool,
    mut next_command: impl FnMut() -> Option<String>,
    mut on_reply: impl FnMut(&Reply),
    mut on_status: impl FnMut(&TickStatus),
) -> RunSummary
where
    S: SampleSource,
    P: FactorStore,
    U: Uploader,
{
    let clock = std::sync::Arc::clone(controller.clock());
    let started = clock.now();
    let mut summary = RunSummary::default();

    if params.startup {
        controller.startup();
    }
    tracing::info!(
        tick_interval_ms = params.tick_interval.as_millis() as u64,
        max_runtime_ms = params.max_runtime.map(|d| d.as_millis() as u64),
        "control loop started"
    );

    loop {
        if shutdown.load(Ordering::Relaxed) {
            tracing::info!("shutdown requested");
            break;
        }
        if params
            .max_runtime
            .is_some_and(|max| clock.now().saturating_duration_since(started) >= max)
        {
            tracing::info!("max runtime reached");
            break;
        }

        while let Some(line) = next_command() {
            if line.trim().is_empty() {
                continue;
            }
            summary.commands += 1;
            let reply = controller.execute_line(&line);
            on_reply(&reply);
        }

        let status = controller.tick();
        summary.ticks += 1;
        summary.record(&status);
        on_status(&status);

        // Only Triggered and SessionEnded change state; everything else waits.
        if !matches!(
            status,
            TickStatus::Triggered { .. } | TickStatus::SessionEnded { .. }
        ) {
            clock.sleep(params.tick_interval);
        }
    }

    if let Some(status) = controller.flush() {
        summary.record(&status);
        on_status(&status);
    }
    tracing::info!(
        sessions = summary.sessions,
        uploaded = summary.uploaded,
        commands = summary.commands,
        "control loop stopped"
    );
    summary
}
