//! Bounded buffer for the samples of one weighing session.

use autoscale_traits::CalibratedSample;

/// Ordered samples of the current session, never longer than `capacity`.
///
/// Pushes past capacity are dropped and counted; they never end the session.
#[derive(Debug, Clone)]
pub struct SessionBuffer {
    samples: Vec<CalibratedSample>,
    capacity: usize,
    dropped: u64,
}

impl SessionBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            samples: Vec::with_capacity(capacity),
            capacity,
            dropped: 0,
        }
    }

    /// Append a sample; returns false if it was dropped for lack of room.
    pub fn push(&mut self, sample: CalibratedSample) -> bool {
        if self.samples.len() < self.capacity {
            self.samples.push(sample);
            true
        } else {
            self.dropped = self.dropped.saturating_add(1);
            false
        }
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.dropped = 0;
    }

    pub fn as_slice(&self) -> &[CalibratedSample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Samples discarded since the last `clear`.
    pub fn dropped(&self) -> u64 {
        self.dropped
    }
}
