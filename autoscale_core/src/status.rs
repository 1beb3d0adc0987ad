//! Controller run mode and capture progress.

use crate::calibration::CalPhase;

/// What the control loop is doing. Calibrating suspends Idle/Active work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    #[default]
    Idle,
    Active,
    Calibrating,
}

/// Why an Active session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// Mass stayed below the release threshold for the hold time.
    Released,
    /// The hard cap on session duration was reached.
    MaxDuration,
    /// The process is shutting down; the partial session is flushed.
    Shutdown,
}

/// Result of one controller tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickStatus {
    /// Idle polling (or waiting for the next poll).
    Idle { ema_kg: Option<f32>, armed: bool },
    /// A session started on this tick.
    Triggered { ema_kg: f32 },
    /// Session in progress.
    Active { samples: usize },
    /// A session ended on this tick and was handed to the uploader.
    SessionEnded {
        reason: EndReason,
        samples: usize,
        uploaded: bool,
    },
    /// Calibration in progress elsewhere; nothing was done.
    Calibrating(CalPhase),
}
