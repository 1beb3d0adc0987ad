//! JSON-lines session uploader.
//!
//! One line per session:
//! `{"scale_id":"..","t0_epoch_ms":..,"samples":[{"t":0,"kg":0.12345},..]}`
use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use autoscale_traits::{CalibratedSample, Uploader};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct SamplePayload {
    t: u32,
    kg: f64,
}

#[derive(Debug, Serialize)]
struct SessionPayload<'a> {
    scale_id: &'a str,
    /// Wall-clock time of the first sample, derived from the last one.
    t0_epoch_ms: u64,
    samples: Vec<SamplePayload>,
}

fn round5(kg: f32) -> f64 {
    (f64::from(kg) * 100_000.0).round() / 100_000.0
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Appends sessions to a file, or prints them on stdout.
#[derive(Debug, Default)]
pub struct JsonlUploader {
    path: Option<PathBuf>,
}

impl JsonlUploader {
    pub fn new(path: Option<PathBuf>) -> Self {
        Self { path }
    }

    fn line(samples: &[CalibratedSample], device_id: &str) -> serde_json::Result<String> {
        let last_t = samples.last().map_or(0, |s| u64::from(s.t_ms));
        let payload = SessionPayload {
            scale_id: device_id,
            t0_epoch_ms: now_epoch_ms().saturating_sub(last_t),
            samples: samples
                .iter()
                .map(|s| SamplePayload {
                    t: s.t_ms,
                    kg: round5(s.kg),
                })
                .collect(),
        };
        serde_json::to_string(&payload)
    }

    fn write_line(&self, line: &str) -> io::Result<()> {
        match &self.path {
            Some(path) => {
                let mut f = OpenOptions::new().create(true).append(true).open(path)?;
                writeln!(f, "{line}")?;
                f.flush()
            }
            None => {
                let mut out = io::stdout().lock();
                writeln!(out, "{line}")?;
                out.flush()
            }
        }
    }
}

impl Uploader for JsonlUploader {
    fn submit(&mut self, samples: &[CalibratedSample], device_id: &str) -> bool {
        let line = match Self::line(samples, device_id) {
            Ok(l) => l,
            Err(e) => {
                tracing::warn!(error = %e, "failed to encode session");
                return false;
            }
        };
        match self.write_line(&line) {
            Ok(()) => {
                tracing::info!(samples = samples.len(), bytes = line.len(), "session uploaded");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, path = ?self.path, "session upload failed");
                false
            }
        }
    }
}
