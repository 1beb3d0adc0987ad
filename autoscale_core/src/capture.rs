//! Event-capture state machine.
//!
//! Pure logic: the controller feeds it timestamps and masses, it answers with
//! what happened. Idle readings are smoothed with an EMA and gated by an
//! arming latch; Active readings go into the bounded `SessionBuffer` until
//! the mass has been below the release threshold for the hold time or the
//! session hits its hard cap.
//!
//! All threshold comparisons use deadbanded magnitudes, so a platform that
//! reads negative behaves like its mirror image.
use std::time::{Duration, Instant};

use autoscale_traits::CalibratedSample;

use crate::config::CaptureCfg;
use crate::session::SessionBuffer;
use crate::status::EndReason;
use crate::util::{deadband, elapsed, rel_ms_u32};

/// Latches once the smoothed mass has dwelt near zero long enough.
///
/// Leaving the band only restarts the dwell timer; an earned latch stays set
/// until a trigger consumes it or a cooldown resets it.
#[derive(Debug, Clone, Default)]
pub struct ArmingGate {
    armed: bool,
    in_band_since: Option<Instant>,
}

impl ArmingGate {
    pub fn is_armed(&self) -> bool {
        self.armed
    }

    fn update(&mut self, now: Instant, smoothed_kg: f32, band_kg: f32, dwell: Duration) {
        if smoothed_kg.abs() <= band_kg {
            let since = *self.in_band_since.get_or_insert(now);
            if !self.armed && elapsed(now, since) >= dwell {
                self.armed = true;
                tracing::debug!("capture armed");
            }
        } else {
            self.in_band_since = None;
        }
    }

    fn reset(&mut self) {
        self.armed = false;
        self.in_band_since = None;
    }
}

/// What an Idle poll produced.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum IdleOutcome {
    /// No reading yet and nothing to reuse.
    NoData,
    Waiting { ema_kg: f32, armed: bool },
    Triggered { ema_kg: f32 },
}

/// What an Active sample produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActiveOutcome {
    Continue,
    End(EndReason),
}

#[derive(Debug, Clone)]
pub struct CaptureMachine {
    cfg: CaptureCfg,
    ema: Option<f32>,
    gate: ArmingGate,
    last_poll: Option<Instant>,
    cooldown_until: Option<Instant>,
    session_start: Option<Instant>,
    below_since: Option<Instant>,
    buffer: SessionBuffer,
    active_samples: u32,
}

impl CaptureMachine {
    pub fn new(cfg: CaptureCfg) -> Self {
        let buffer = SessionBuffer::with_capacity(cfg.capacity);
        Self {
            cfg,
            ema: None,
            gate: ArmingGate::default(),
            last_poll: None,
            cooldown_until: None,
            session_start: None,
            below_since: None,
            buffer,
            active_samples: 0,
        }
    }

    pub fn cfg(&self) -> &CaptureCfg {
        &self.cfg
    }

    /// Smoothed Idle mass after the deadband, if any reading was seen.
    pub fn ema_kg(&self) -> Option<f32> {
        self.ema.map(|e| deadband(e, self.cfg.deadband_kg))
    }

    pub fn is_armed(&self) -> bool {
        self.gate.is_armed()
    }

    pub fn is_active(&self) -> bool {
        self.session_start.is_some()
    }

    pub fn session_start(&self) -> Option<Instant> {
        self.session_start
    }

    pub fn buffer(&self) -> &SessionBuffer {
        &self.buffer
    }

    pub fn in_cooldown(&self, now: Instant) -> bool {
        self.cooldown_until.is_some_and(|until| now < until)
    }

    /// Quiet period during which the gate is held reset.
    pub fn start_cooldown(&mut self, now: Instant) {
        self.cooldown_until = Some(now + Duration::from_millis(self.cfg.cooldown_ms));
        self.gate.reset();
    }

    pub fn idle_poll_due(&self, now: Instant) -> bool {
        self.last_poll
            .is_none_or(|t| elapsed(now, t) >= Duration::from_millis(self.cfg.idle_poll_ms))
    }

    /// Feed one Idle poll. `sample_kg` is `None` when no fresh reading was
    /// available in time, in which case the last smoothed value is reused.
    pub fn on_idle_sample(&mut self, now: Instant, sample_kg: Option<f32>) -> IdleOutcome {
        self.last_poll = Some(now);
        let prev = self.ema;
        let ema = match (prev, sample_kg) {
            (Some(p), Some(x)) => (1.0 - self.cfg.ema_alpha) * p + self.cfg.ema_alpha * x,
            (Some(p), None) => p,
            (None, Some(x)) => x,
            (None, None) => return IdleOutcome::NoData,
        };
        self.ema = Some(ema);

        let band = self.cfg.deadband_kg;
        let smoothed = deadband(ema, band);
        let rise = prev.map_or(0.0, |p| smoothed.abs() - deadband(p, band).abs());

        if self.in_cooldown(now) {
            self.gate.reset();
        } else {
            self.gate.update(
                now,
                smoothed,
                self.cfg.arm_band_kg,
                Duration::from_millis(self.cfg.arm_stable_ms),
            );
        }
        tracing::trace!(ema_kg = smoothed, rise, armed = self.gate.is_armed(), "idle poll");

        if self.gate.is_armed() && rise >= self.cfg.min_rise_kg && smoothed.abs() >= self.cfg.trigger_kg
        {
            self.begin_session(now);
            return IdleOutcome::Triggered { ema_kg: smoothed };
        }
        IdleOutcome::Waiting {
            ema_kg: smoothed,
            armed: self.gate.is_armed(),
        }
    }

    fn begin_session(&mut self, now: Instant) {
        self.buffer.clear();
        self.session_start = Some(now);
        self.below_since = None;
        self.active_samples = 0;
        self.gate.reset();
    }

    /// Feed one Active reading.
    pub fn on_active_sample(&mut self, now: Instant, kg: f32) -> ActiveOutcome {
        let Some(start) = self.session_start else {
            return ActiveOutcome::Continue;
        };
        let kg = deadband(kg, self.cfg.deadband_kg);
        let t_ms = rel_ms_u32(now, start);
        self.buffer.push(CalibratedSample { t_ms, kg });
        self.active_samples = self.active_samples.wrapping_add(1);
        if self.cfg.debug_every > 0 && self.active_samples % self.cfg.debug_every == 0 {
            tracing::debug!(
                t_ms,
                kg,
                samples = self.buffer.len(),
                dropped = self.buffer.dropped(),
                "active"
            );
        }

        if kg.abs() < self.cfg.release_kg {
            let since = *self.below_since.get_or_insert(now);
            if elapsed(now, since) >= Duration::from_millis(self.cfg.hold_ms) {
                return ActiveOutcome::End(EndReason::Released);
            }
        } else {
            self.below_since = None;
        }
        if self.max_duration_reached(now) {
            return ActiveOutcome::End(EndReason::MaxDuration);
        }
        ActiveOutcome::Continue
    }

    /// Time spent continuously below the release threshold.
    pub fn below_release_for(&self, now: Instant) -> Option<Duration> {
        self.below_since.map(|s| elapsed(now, s))
    }

    pub fn max_duration_reached(&self, now: Instant) -> bool {
        self.session_start
            .is_some_and(|s| elapsed(now, s) >= Duration::from_millis(self.cfg.active_max_ms))
    }

    /// Hand the buffered session to `upload`, then clear it and cool down.
    pub fn end_session<R>(
        &mut self,
        now: Instant,
        reason: EndReason,
        upload: impl FnOnce(&[CalibratedSample]) -> R,
    ) -> R {
        tracing::info!(
            ?reason,
            samples = self.buffer.len(),
            dropped = self.buffer.dropped(),
            duration_ms = self.session_start.map_or(0, |s| rel_ms_u32(now, s)),
            "session ended"
        );
        let r = upload(self.buffer.as_slice());
        self.finish(now);
        r
    }

    /// Discard the session without uploading.
    pub fn abort_session(&mut self, now: Instant) {
        if self.is_active() {
            tracing::warn!(samples = self.buffer.len(), "session aborted; samples discarded");
        }
        self.finish(now);
    }

    fn finish(&mut self, now: Instant) {
        self.buffer.clear();
        self.session_start = None;
        self.below_since = None;
        self.start_cooldown(now);
    }
}
