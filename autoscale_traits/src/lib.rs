pub mod clock;

pub use clock::{Clock, MonotonicClock, TestClock};

/// Error type used at the collaborator boundary.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A load-cell ADC front end (e.g. HX711).
///
/// `read_raw` is only expected to succeed after `is_ready` returned true;
/// bounding any wait is the caller's job.
pub trait SampleSource {
    fn is_ready(&mut self) -> bool;
    fn read_raw(&mut self) -> Result<i32, BoxError>;

    /// Power the converter down and back up. Sources without a power pin
    /// treat this as a no-op.
    fn power_cycle(&mut self) -> Result<(), BoxError> {
        Ok(())
    }
}

/// Persistent storage for the scale factor (counts per gram).
pub trait FactorStore {
    fn load_factor(&self) -> Option<f32>;
    fn save_factor(&mut self, factor: f32) -> Result<(), BoxError>;
    fn clear_factor(&mut self) -> Result<(), BoxError>;
}

/// One element of a capture session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibratedSample {
    /// Milliseconds since the session started.
    pub t_ms: u32,
    pub kg: f32,
}

/// Receives completed sessions. Fire-and-forget: `false` means the upload
/// failed; the caller logs it and moves on.
pub trait Uploader {
    fn submit(&mut self, samples: &[CalibratedSample], device_id: &str) -> bool;
}

impl<T: SampleSource + ?Sized> SampleSource for Box<T> {
    fn is_ready(&mut self) -> bool {
        (**self).is_ready()
    }
    fn read_raw(&mut self) -> Result<i32, BoxError> {
        (**self).read_raw()
    }
    fn power_cycle(&mut self) -> Result<(), BoxError> {
        (**self).power_cycle()
    }
}

impl<T: FactorStore + ?Sized> FactorStore for Box<T> {
    fn load_factor(&self) -> Option<f32> {
        (**self).load_factor()
    }
    fn save_factor(&mut self, factor: f32) -> Result<(), BoxError> {
        (**self).save_factor(factor)
    }
    fn clear_factor(&mut self) -> Result<(), BoxError> {
        (**self).clear_factor()
    }
}

impl<T: Uploader + ?Sized> Uploader for Box<T> {
    fn submit(&mut self, samples: &[CalibratedSample], device_id: &str) -> bool {
        (**self).submit(samples, device_id)
    }
}
