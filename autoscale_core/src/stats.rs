//! Summary statistics of one sampling window.

/// Count, mean and sample standard deviation of a window.
///
/// - `std_dev` uses the unbiased (n-1) estimator.
/// - A single reading has `std_dev == 0.0`.
/// - An empty window has `std_dev == f64::INFINITY` and `mean == 0.0`; callers
///   must treat it as unstable.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowStats {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
}

impl WindowStats {
    pub const EMPTY: WindowStats = WindowStats {
        count: 0,
        mean: 0.0,
        std_dev: f64::INFINITY,
    };

    pub fn from_samples(values: &[f64]) -> Self {
        let n = values.len();
        if n == 0 {
            return Self::EMPTY;
        }
        let mean = values.iter().sum::<f64>() / n as f64;
        let std_dev = if n > 1 {
            let acc: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
            (acc / (n - 1) as f64).sqrt()
        } else {
            0.0
        };
        Self {
            count: n,
            mean,
            std_dev,
        }
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// True when the window holds data and its spread is within `max_std_dev`.
    #[inline]
    pub fn is_quiet(&self, max_std_dev: f64) -> bool {
        self.count > 0 && self.std_dev <= max_std_dev
    }

    /// Mean rounded to the nearest raw count.
    pub fn mean_counts(&self) -> Option<i32> {
        if self.is_empty() || !self.mean.is_finite() {
            return None;
        }
        let r = self.mean.round();
        Some(r.clamp(i32::MIN as f64, i32::MAX as f64) as i32)
    }
}
