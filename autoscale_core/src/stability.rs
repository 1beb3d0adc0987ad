//! Settling and plateau detection on top of the window sampler.
use std::time::{Duration, Instant};

use autoscale_traits::SampleSource;

use crate::config::StabilityCfg;
use crate::sampler::Sampler;
use crate::stats::WindowStats;
use crate::util::elapsed;

/// Decides whether a signal has settled, sampling `map(raw)` window by window.
///
/// A stable run starts at the beginning of the first quiet window and is
/// broken by any window whose std-dev exceeds the threshold.
pub struct StabilityDetector<'a, S, F> {
    sampler: &'a mut Sampler<S>,
    cfg: &'a StabilityCfg,
    map: F,
}

impl<'a, S, F> StabilityDetector<'a, S, F>
where
    S: SampleSource,
    F: FnMut(i32) -> f64,
{
    pub fn new(sampler: &'a mut Sampler<S>, cfg: &'a StabilityCfg, map: F) -> Self {
        Self { sampler, cfg, map }
    }

    fn window(&mut self, len: Duration) -> (Instant, WindowStats) {
        let started = self.sampler.now();
        let max = self.sampler.cfg().max_window_samples;
        let stats = self.sampler.sample_window_with(len, max, &mut self.map);
        (started, stats)
    }

    /// True once consecutive check windows have stayed within `max_std_dev`
    /// for `min_duration`; false if `timeout` elapses first.
    pub fn is_stable(&mut self, max_std_dev: f64, min_duration: Duration, timeout: Duration) -> bool {
        let check = Duration::from_millis(self.cfg.check_window_ms.max(1));
        let start = self.sampler.now();
        let mut stable_since: Option<Instant> = None;
        while elapsed(self.sampler.now(), start) < timeout {
            let (win_start, w) = self.window(check);
            if w.is_quiet(max_std_dev) {
                let since = *stable_since.get_or_insert(win_start);
                if elapsed(self.sampler.now(), since) >= min_duration {
                    return true;
                }
            } else {
                tracing::trace!(std_dev = w.std_dev, count = w.count, "stability run broken");
                stable_since = None;
            }
        }
        false
    }

    /// Wait for a plateau and return its mean.
    ///
    /// Besides a stable run of `min_duration`, two consecutive quiet windows
    /// must agree on their means within `max(|mean| * plateau_rel_tol,
    /// plateau_floor)`. A disagreeing pair means the signal is still drifting
    /// and the run restarts at the newer window.
    pub fn find_plateau(
        &mut self,
        window: Duration,
        max_std_dev: f64,
        min_duration: Duration,
        timeout: Duration,
    ) -> Option<f64> {
        let window = window.max(Duration::from_millis(1));
        let start = self.sampler.now();
        let mut stable_since: Option<Instant> = None;
        let mut previous: Option<(Instant, f64)> = None;
        while elapsed(self.sampler.now(), start) < timeout {
            let (win_start, w) = self.window(window);
            if !w.is_quiet(max_std_dev) {
                stable_since = None;
                previous = None;
                continue;
            }
            let since = *stable_since.get_or_insert(win_start);
            let Some((prev_start, prev_mean)) = previous else {
                previous = Some((win_start, w.mean));
                continue;
            };
            if elapsed(win_start, prev_start) < window {
                continue;
            }
            let tol = (w.mean.abs() * self.cfg.plateau_rel_tol).max(self.cfg.plateau_floor);
            if (w.mean - prev_mean).abs() > tol {
                tracing::debug!(prev = prev_mean, mean = w.mean, tol, "plateau drifting");
                stable_since = Some(win_start);
            } else if elapsed(self.sampler.now(), since) >= min_duration {
                return Some(w.mean);
            }
            previous = Some((win_start, w.mean));
        }
        None
    }
}
