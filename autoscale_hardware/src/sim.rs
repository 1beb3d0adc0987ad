//! Clock-driven load cell for hardware-free runs and tests.
//!
//! The cell produces one conversion every `period`, measured on the injected
//! clock, so a `TestClock` drives it deterministically. The platform load is
//! either set through a `SimHandle` or scripted as timed steps.
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use autoscale_traits::{BoxError, Clock, SampleSource};

use crate::error::HwError;

#[derive(Debug, Clone)]
struct SimState {
    load_kg: f32,
    steps: Vec<(Duration, f32)>,
    /// Conversions are withheld while true.
    stalled: bool,
    /// Power cycles still needed before a stalled cell recovers.
    cycles_to_recover: Option<u32>,
    power_cycles: u32,
    reads: u64,
}

/// Shared control over a `SimulatedLoadCell`.
#[derive(Debug, Clone)]
pub struct SimHandle {
    state: Arc<Mutex<SimState>>,
}

impl SimHandle {
    fn lock(&self) -> Option<MutexGuard<'_, SimState>> {
        self.state.lock().ok()
    }

    /// Put `kg` on the platform now. Clears any pending scripted steps.
    pub fn set_load_kg(&self, kg: f32) {
        if let Some(mut s) = self.lock() {
            s.load_kg = kg;
            s.steps.clear();
        }
    }

    /// Stop producing conversions. With `Some(n)` the cell comes back after
    /// `n` power cycles; with `None` it stays dead.
    pub fn stall(&self, cycles_to_recover: Option<u32>) {
        if let Some(mut s) = self.lock() {
            s.stalled = true;
            s.cycles_to_recover = cycles_to_recover;
        }
    }

    pub fn power_cycles(&self) -> u32 {
        self.lock().map_or(0, |s| s.power_cycles)
    }

    pub fn reads(&self) -> u64 {
        self.lock().map_or(0, |s| s.reads)
    }
}

pub struct SimulatedLoadCell {
    clock: Arc<dyn Clock + Send + Sync>,
    started: Instant,
    next_due: Instant,
    period: Duration,
    zero_raw: i32,
    counts_per_gram: f32,
    noise_counts: i32,
    rng: u32,
    state: Arc<Mutex<SimState>>,
}

impl core::fmt::Debug for SimulatedLoadCell {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SimulatedLoadCell")
            .field("period", &self.period)
            .field("zero_raw", &self.zero_raw)
            .field("counts_per_gram", &self.counts_per_gram)
            .field("noise_counts", &self.noise_counts)
            .finish()
    }
}

impl SimulatedLoadCell {
    pub fn new(
        clock: Arc<dyn Clock + Send + Sync>,
        zero_raw: i32,
        counts_per_gram: f32,
        period: Duration,
    ) -> Self {
        let now = clock.now();
        Self {
            clock,
            started: now,
            next_due: now,
            period: period.max(Duration::from_millis(1)),
            zero_raw,
            counts_per_gram,
            noise_counts: 0,
            rng: 0x9E37_79B9,
            state: Arc::new(Mutex::new(SimState {
                load_kg: 0.0,
                steps: Vec::new(),
                stalled: false,
                cycles_to_recover: None,
                power_cycles: 0,
                reads: 0,
            })),
        }
    }

    /// Add bounded pseudo-random noise of at most `counts` per reading.
    pub fn with_noise(mut self, counts: i32) -> Self {
        self.noise_counts = counts.max(0);
        self
    }

    /// Script load changes: `(time since start, kg)`, applied in order.
    pub fn with_steps(self, steps: impl IntoIterator<Item = (Duration, f32)>) -> Self {
        let mut steps: Vec<_> = steps.into_iter().collect();
        steps.sort_by_key(|s| s.0);
        if let Ok(mut s) = self.state.lock() {
            s.steps = steps;
        }
        self
    }

    pub fn handle(&self) -> SimHandle {
        SimHandle {
            state: Arc::clone(&self.state),
        }
    }

    fn noise(&mut self) -> i32 {
        if self.noise_counts == 0 {
            return 0;
        }
        // xorshift32
        let mut x = self.rng;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.rng = x;
        let span = 2 * self.noise_counts as u32 + 1;
        (x % span) as i32 - self.noise_counts
    }
}

impl SampleSource for SimulatedLoadCell {
    fn is_ready(&mut self) -> bool {
        let stalled = self.state.lock().map_or(true, |s| s.stalled);
        !stalled && self.clock.now() >= self.next_due
    }

    fn read_raw(&mut self) -> Result<i32, BoxError> {
        let now = self.clock.now();
        let load_kg = {
            let mut s = self.state.lock().map_err(|_| HwError::NotReady)?;
            if s.stalled {
                return Err(HwError::NotReady.into());
            }
            let since = now.saturating_duration_since(self.started);
            while s.steps.first().is_some_and(|(at, _)| *at <= since) {
                let (_, kg) = s.steps.remove(0);
                s.load_kg = kg;
            }
            s.reads += 1;
            s.load_kg
        };
        self.next_due = now + self.period;
        let counts = f64::from(load_kg) * 1_000.0 * f64::from(self.counts_per_gram);
        let raw = (f64::from(self.zero_raw) + counts.round())
            .clamp(f64::from(i32::MIN), f64::from(i32::MAX)) as i32;
        Ok(raw.saturating_add(self.noise()))
    }

    fn power_cycle(&mut self) -> Result<(), BoxError> {
        let mut s = self.state.lock().map_err(|_| HwError::NotReady)?;
        s.power_cycles += 1;
        if s.stalled {
            match s.cycles_to_recover {
                Some(n) if n <= 1 => {
                    s.stalled = false;
                    s.cycles_to_recover = None;
                }
                Some(n) => s.cycles_to_recover = Some(n - 1),
                None => {}
            }
        }
        tracing::debug!(
            power_cycles = s.power_cycles,
            stalled = s.stalled,
            "simulated power cycle"
        );
        self.next_due = self.clock.now() + self.period;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use autoscale_traits::TestClock;

    fn cell(clock: &TestClock) -> SimulatedLoadCell {
        SimulatedLoadCell::new(Arc::new(clock.clone()), 1_000, 10.0, Duration::from_millis(12))
    }

    #[test]
    fn paces_conversions_on_the_clock() {
        let clock = TestClock::new();
        let mut c = cell(&clock);
        assert!(c.is_ready());
        assert_eq!(c.read_raw().expect("read"), 1_000);
        assert!(!c.is_ready());
        clock.advance(Duration::from_millis(12));
        assert!(c.is_ready());
    }

    #[test]
    fn steps_apply_at_their_time() {
        let clock = TestClock::new();
        let mut c = cell(&clock).with_steps([(Duration::from_millis(100), 0.5)]);
        assert_eq!(c.read_raw().expect("read"), 1_000);
        clock.advance(Duration::from_millis(100));
        assert_eq!(c.read_raw().expect("read"), 1_000 + 5_000);
    }

    #[test]
    fn noise_stays_bounded() {
        let clock = TestClock::new();
        let mut c = cell(&clock).with_noise(50);
        for _ in 0..500 {
            let v = c.read_raw().expect("read");
            assert!((950..=1_050).contains(&v), "{v}");
        }
    }

    #[test]
    fn stalled_cell_recovers_after_power_cycles() {
        let clock = TestClock::new();
        let mut c = cell(&clock);
        let h = c.handle();
        h.stall(Some(2));
        assert!(!c.is_ready());
        assert!(c.read_raw().is_err());
        c.power_cycle().expect("cycle");
        assert!(!c.is_ready());
        c.power_cycle().expect("cycle");
        clock.advance(Duration::from_millis(12));
        assert!(c.is_ready());
        assert_eq!(h.power_cycles(), 2);
    }
}
