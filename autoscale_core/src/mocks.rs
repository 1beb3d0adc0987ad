//! In-memory collaborators for tests, dry runs and `self-check`.

use std::sync::{Arc, Mutex};

use autoscale_traits::{BoxError, CalibratedSample, FactorStore, SampleSource, Uploader};

/// A source that never has data. Useful for exercising timeout paths.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSource;

impl SampleSource for NoopSource {
    fn is_ready(&mut self) -> bool {
        false
    }

    fn read_raw(&mut self) -> Result<i32, BoxError> {
        Err(Box::new(std::io::Error::other("noop source: not ready")))
    }
}

/// Factor store held in memory. Clones share the same slot.
#[derive(Debug, Default, Clone)]
pub struct MemoryFactorStore {
    slot: Arc<Mutex<Option<f32>>>,
    fail_saves: bool,
}

impl MemoryFactorStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_factor(factor: f32) -> Self {
        Self {
            slot: Arc::new(Mutex::new(Some(factor))),
            fail_saves: false,
        }
    }

    /// Every `save_factor` fails, as a worn-out flash page would.
    pub fn failing() -> Self {
        Self {
            slot: Arc::default(),
            fail_saves: true,
        }
    }

    pub fn stored(&self) -> Option<f32> {
        self.slot.lock().ok().and_then(|s| *s)
    }
}

impl FactorStore for MemoryFactorStore {
    fn load_factor(&self) -> Option<f32> {
        self.stored()
    }

    fn save_factor(&mut self, factor: f32) -> Result<(), BoxError> {
        if self.fail_saves {
            return Err(Box::new(std::io::Error::other("store is read-only")));
        }
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| std::io::Error::other("store lock poisoned"))?;
        *slot = Some(factor);
        Ok(())
    }

    fn clear_factor(&mut self) -> Result<(), BoxError> {
        let mut slot = self
            .slot
            .lock()
            .map_err(|_| std::io::Error::other("store lock poisoned"))?;
        *slot = None;
        Ok(())
    }
}

/// One session as the uploader saw it.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSession {
    pub device_id: String,
    pub samples: Vec<CalibratedSample>,
}

/// Uploader that keeps every submitted session. Clones share the record.
#[derive(Debug, Clone)]
pub struct RecordingUploader {
    sessions: Arc<Mutex<Vec<RecordedSession>>>,
    accept: bool,
}

impl Default for RecordingUploader {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingUploader {
    pub fn new() -> Self {
        Self {
            sessions: Arc::default(),
            accept: true,
        }
    }

    /// Records sessions but reports every upload as failed.
    pub fn rejecting() -> Self {
        Self {
            sessions: Arc::default(),
            accept: false,
        }
    }

    pub fn sessions(&self) -> Vec<RecordedSession> {
        self.sessions.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().map_or(0, |s| s.len())
    }
}

impl Uploader for RecordingUploader {
    fn submit(&mut self, samples: &[CalibratedSample], device_id: &str) -> bool {
        if let Ok(mut s) = self.sessions.lock() {
            s.push(RecordedSession {
                device_id: device_id.to_string(),
                samples: samples.to_vec(),
            });
        }
        self.accept
    }
}
