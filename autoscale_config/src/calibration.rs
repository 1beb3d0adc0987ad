//! Calibration table import.
//!
//! A `raw,grams` CSV is fitted as `raw = slope * grams + intercept`. The
//! slope magnitude is the factor in counts per gram, its sign the polarity,
//! and the intercept the zero offset.
use std::path::Path;

use serde::Deserialize;

use crate::Polarity;

/// Expected headers:
/// raw,grams
///
/// Example:
/// raw,grams
/// 842913,0.0
/// 1829236,100.0
#[derive(Debug, Deserialize, Clone, Copy)]
pub struct CalibrationRow {
    pub raw: i64,
    pub grams: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationFit {
    pub zero_offset: i32,
    /// Counts per gram, always > 0.
    pub scale_factor: f32,
    pub polarity: Polarity,
}

/// Least-squares line through `(grams, raw)` pairs.
fn ols(pts: &[(f64, f64)]) -> Option<(f64, f64)> {
    if pts.len() < 2 {
        return None;
    }
    let n = pts.len() as f64;
    let mean_x = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let mean_y = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let (sxx, sxy) = pts.iter().fold((0.0f64, 0.0f64), |(sxx, sxy), (x, y)| {
        let dx = x - mean_x;
        (sxx + dx * dx, sxy + dx * (y - mean_y))
    });
    if !sxx.is_finite() || sxx == 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    slope
        .is_finite()
        .then_some((slope, mean_y - slope * mean_x))
}

impl CalibrationFit {
    pub fn from_rows(rows: &[CalibrationRow]) -> eyre::Result<Self> {
        if rows.len() < 2 {
            eyre::bail!("calibration requires at least two rows, got {}", rows.len());
        }
        if let Some((i, r)) = rows
            .iter()
            .enumerate()
            .find(|(_, r)| !(r.grams.is_finite() && r.grams >= 0.0))
        {
            eyre::bail!("calibration row {} has invalid grams {}", i + 1, r.grams);
        }

        let pts: Vec<(f64, f64)> = rows
            .iter()
            .map(|r| (f64::from(r.grams), r.raw as f64))
            .collect();
        let (slope0, icpt0) = ols(&pts).ok_or_else(|| {
            eyre::eyre!("calibration cannot determine slope (all rows use the same mass)")
        })?;

        // One refit without rows whose residual exceeds 2x the RMS residual.
        let resid = |&(x, y): &(f64, f64)| y - (slope0 * x + icpt0);
        let rms = (pts.iter().map(|p| resid(p).powi(2)).sum::<f64>() / pts.len() as f64).sqrt();
        let (slope, icpt) = if rms.is_finite() && rms > 0.0 {
            let inliers: Vec<(f64, f64)> = pts
                .iter()
                .copied()
                .filter(|p| resid(p).abs() <= 2.0 * rms)
                .collect();
            if inliers.len() >= 2 && inliers.len() < pts.len() {
                ols(&inliers).unwrap_or((slope0, icpt0))
            } else {
                (slope0, icpt0)
            }
        } else {
            (slope0, icpt0)
        };

        if slope == 0.0 {
            eyre::bail!("calibration produced zero slope (invalid scale factor)");
        }
        if !icpt.is_finite() || icpt.abs() > f64::from(i32::MAX) {
            eyre::bail!("calibration produced an out-of-range zero offset");
        }
        let polarity = if slope > 0.0 {
            Polarity::Positive
        } else {
            Polarity::Negative
        };
        Ok(Self {
            zero_offset: icpt.round() as i32,
            scale_factor: slope.abs() as f32,
            polarity,
        })
    }
}

pub fn load_calibration_csv(path: &Path) -> eyre::Result<CalibrationFit> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open calibration CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let actual: Vec<&str> = headers.iter().collect();
    if actual != ["raw", "grams"] {
        eyre::bail!(
            "calibration CSV must have headers 'raw,grams', got: {}",
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<CalibrationRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    CalibrationFit::from_rows(&rows)
}
