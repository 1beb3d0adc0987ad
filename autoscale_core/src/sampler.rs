//! Time-boxed sensor sampling.
//!
//! `Sampler` owns the `SampleSource` together with the injected clock and is
//! the only place that polls the hardware. Every wait in here is bounded and
//! yields through `Clock::sleep` between unsuccessful polls, so other
//! collaborators keep running and tests can drive time with a `TestClock`.
use std::sync::Arc;
use std::time::{Duration, Instant};

use autoscale_traits::{Clock, SampleSource};

use crate::config::{SamplerCfg, StabilityCfg};
use crate::hw_error::map_hw_error;
use crate::stability::StabilityDetector;
use crate::stats::WindowStats;
use crate::util::elapsed;

pub struct Sampler<S> {
    source: S,
    clock: Arc<dyn Clock + Send + Sync>,
    cfg: SamplerCfg,
}

impl<S> core::fmt::Debug for Sampler<S> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sampler").field("cfg", &self.cfg).finish()
    }
}

impl<S: SampleSource> Sampler<S> {
    pub fn new(source: S, clock: Arc<dyn Clock + Send + Sync>, cfg: SamplerCfg) -> Self {
        Self { source, clock, cfg }
    }

    pub fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    #[inline]
    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn cfg(&self) -> &SamplerCfg {
        &self.cfg
    }

    /// Poll until the source reports ready or `timeout` expires.
    /// A zero timeout checks exactly once.
    pub fn wait_ready(&mut self, timeout: Duration) -> bool {
        let start = self.clock.now();
        let poll = self.cfg.poll_interval();
        loop {
            if self.source.is_ready() {
                return true;
            }
            if elapsed(self.clock.now(), start) >= timeout {
                return false;
            }
            self.clock.sleep(poll);
        }
    }

    /// Read one value if the source is ready right now.
    pub fn try_read(&mut self) -> Option<i32> {
        if !self.source.is_ready() {
            return None;
        }
        self.read_logged()
    }

    /// Read one value, waiting at most `timeout` for it.
    pub fn read_within(&mut self, timeout: Duration) -> Option<i32> {
        if !self.wait_ready(timeout) {
            return None;
        }
        self.read_logged()
    }

    fn read_logged(&mut self) -> Option<i32> {
        match self.source.read_raw() {
            Ok(v) => Some(v),
            Err(e) => {
                tracing::debug!(error = %map_hw_error(&*e), "sample read failed");
                None
            }
        }
    }

    /// Collect raw counts for `window`; see `sample_window_with`.
    pub fn sample_window(&mut self, window: Duration, max_samples: usize) -> WindowStats {
        self.sample_window_with(window, max_samples, |raw| raw as f64)
    }

    /// Collect `map(raw)` for every successful read until `window` elapses.
    ///
    /// The window is time-boxed: readings past `max_samples` (further capped
    /// by `SamplerCfg::max_window_samples`) are read and discarded.
    pub fn sample_window_with<F>(
        &mut self,
        window: Duration,
        max_samples: usize,
        mut map: F,
    ) -> WindowStats
    where
        F: FnMut(i32) -> f64,
    {
        let cap = max_samples.min(self.cfg.max_window_samples);
        let mut values = Vec::with_capacity(cap);
        let poll = self.cfg.poll_interval();
        let start = self.clock.now();
        while elapsed(self.clock.now(), start) < window {
            // A failed read is an unsuccessful poll.
            let raw = if self.source.is_ready() {
                self.read_logged()
            } else {
                None
            };
            match raw {
                Some(raw) if values.len() < cap => values.push(map(raw)),
                Some(_) => {}
                None => self.clock.sleep(poll),
            }
        }
        WindowStats::from_samples(&values)
    }

    /// Accumulate readings until at least `min_samples` were taken over at
    /// least `min_duration` and their spread is within `max_std_dev`.
    ///
    /// Falls back to the plain average when `max_samples` is reached or
    /// `timeout` expires first. Returns `None` only if nothing was read.
    pub fn stable_capture(
        &mut self,
        min_samples: usize,
        max_samples: usize,
        max_std_dev: f64,
        min_duration: Duration,
        timeout: Duration,
    ) -> Option<WindowStats> {
        let max_samples = max_samples.max(min_samples).max(1);
        let mut values = Vec::with_capacity(max_samples);
        let poll = self.cfg.poll_interval();
        let start = self.clock.now();
        loop {
            let since = elapsed(self.clock.now(), start);
            if values.len() >= max_samples || since >= timeout {
                break;
            }
            if !self.source.is_ready() {
                self.clock.sleep(poll);
                continue;
            }
            let Some(raw) = self.read_logged() else {
                self.clock.sleep(poll);
                continue;
            };
            values.push(f64::from(raw));
            if values.len() >= min_samples && elapsed(self.clock.now(), start) >= min_duration {
                let stats = WindowStats::from_samples(&values);
                if stats.is_quiet(max_std_dev) {
                    return Some(stats);
                }
            }
        }
        let stats = WindowStats::from_samples(&values);
        if stats.is_empty() {
            None
        } else {
            tracing::debug!(
                count = stats.count,
                std_dev = stats.std_dev,
                "stable capture fell back to plain average"
            );
            Some(stats)
        }
    }

    /// Cooperatively wait until `deadline`, yielding in poll-sized steps.
    pub fn wait_until(&mut self, deadline: Instant) {
        let poll = self.cfg.poll_interval().max(Duration::from_millis(10));
        loop {
            let now = self.clock.now();
            if now >= deadline {
                return;
            }
            self.clock.sleep(poll.min(deadline - now));
        }
    }

    /// Build a stability detector over `map(raw)`.
    pub fn detector<'a, F>(
        &'a mut self,
        cfg: &'a StabilityCfg,
        map: F,
    ) -> StabilityDetector<'a, S, F>
    where
        F: FnMut(i32) -> f64,
    {
        StabilityDetector::new(self, cfg, map)
    }
}
