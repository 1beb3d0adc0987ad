mod common;

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use autoscale_core::{
    EndReason, ParseError, Reply, RunMode, RunParams, ScaleError, TickStatus, run,
};
use autoscale_traits::Clock;
use common::rig;

const LIMIT: Duration = Duration::from_secs(30);

fn is_triggered(st: &TickStatus) -> bool {
    matches!(st, TickStatus::Triggered { .. })
}

#[test]
fn session_is_captured_and_uploaded() {
    // Arms after 1 s at zero; 5 kg from 2 s to 8 s.
    let mut r = rig(&[(2_000, 5.0), (8_000, 0.0)]);
    common::tick_until(&mut r, LIMIT, is_triggered).expect("trigger");
    assert_eq!(r.ctl.mode(), RunMode::Active);

    let ended = common::tick_until(&mut r, LIMIT, |st| {
        matches!(st, TickStatus::SessionEnded { .. })
    })
    .expect("session end");
    let TickStatus::SessionEnded {
        reason,
        samples,
        uploaded,
    } = ended
    else {
        unreachable!()
    };
    assert_eq!(reason, EndReason::Released);
    assert!(uploaded);
    assert_eq!(r.ctl.mode(), RunMode::Idle);

    let sessions = r.uploads.sessions();
    assert_eq!(sessions.len(), 1);
    let s = &sessions[0];
    assert_eq!(s.samples.len(), samples);
    assert_eq!(s.device_id, "SCALE-ESP32-DEV-001");
    // the first sample lands within one sample period of the session start
    assert!(s.samples[0].t_ms <= 12, "{}", s.samples[0].t_ms);
    assert!(s.samples.windows(2).all(|w| w[0].t_ms <= w[1].t_ms));
    let peak = s.samples.iter().map(|x| x.kg).fold(f32::MIN, f32::max);
    assert!((peak - 5.0).abs() < 0.01, "{peak}");
    // hold time below release at the tail
    let last = s.samples[s.samples.len() - 1];
    assert_eq!(last.kg, 0.0);
}

#[test]
fn failed_upload_is_logged_and_dropped() {
    let clock = autoscale_traits::TestClock::new();
    let cell = common::cell(&clock, common::COUNTS_PER_GRAM, 0)
        .with_steps([(Duration::from_secs(2), 5.0), (Duration::from_secs(8), 0.0)]);
    let sim = cell.handle();
    let uploads = autoscale_core::mocks::RecordingUploader::rejecting();
    let parts = autoscale_core::ControllerParts {
        clock: Some(std::sync::Arc::new(clock.clone())),
        ..common::matched_parts()
    };
    let mut ctl = autoscale_core::build_controller(
        cell,
        autoscale_core::mocks::MemoryFactorStore::new(),
        uploads.clone(),
        parts,
    )
    .expect("controller");
    let mut ended = None;
    while clock.elapsed() < LIMIT {
        if let st @ TickStatus::SessionEnded { .. } = ctl.tick() {
            ended = Some(st);
            break;
        }
        clock.advance(Duration::from_millis(2));
    }
    assert!(matches!(
        ended,
        Some(TickStatus::SessionEnded { uploaded: false, .. })
    ));
    assert_eq!(uploads.count(), 1);
    assert_eq!(ctl.mode(), RunMode::Idle);
    assert!(!ctl.capture().is_active());
    assert!(sim.reads() > 0);
}

#[test]
fn failed_calibration_restores_idle_and_cools_down() {
    let mut r = rig(&[]);
    r.sim.stall(None);
    let reply = r.ctl.execute_line("tare");
    assert!(matches!(
        reply,
        Reply::Failed(ScaleError::SensorUnavailable { .. })
    ));
    assert!(reply.to_string().starts_with("[ERR] sensor unavailable"));
    assert_eq!(r.ctl.mode(), RunMode::Idle);
    let now = r.ctl.clock().now();
    assert!(r.ctl.capture().in_cooldown(now));
}

#[test]
fn calibration_aborts_an_active_session() {
    let mut r = rig(&[(2_000, 5.0)]);
    common::tick_until(&mut r, LIMIT, is_triggered).expect("trigger");
    common::tick_until(&mut r, Duration::from_millis(200), |_| false);
    assert!(r.ctl.capture().buffer().len() > 0);

    assert!(matches!(r.ctl.execute_line("tare"), Reply::Tared { .. }));
    assert_eq!(r.ctl.mode(), RunMode::Idle);
    assert!(!r.ctl.capture().is_active());
    assert_eq!(r.uploads.count(), 0, "aborted sessions are not uploaded");
}

#[test]
fn flush_hands_partial_session_to_uploader() {
    let mut r = rig(&[(2_000, 5.0)]);
    assert_eq!(r.ctl.flush(), None);
    common::tick_until(&mut r, LIMIT, is_triggered).expect("trigger");
    common::tick_until(&mut r, Duration::from_millis(500), |_| false);
    let st = r.ctl.flush().expect("active session");
    assert!(matches!(
        st,
        TickStatus::SessionEnded {
            reason: EndReason::Shutdown,
            uploaded: true,
            ..
        }
    ));
    assert_eq!(r.uploads.count(), 1);
}

#[test]
fn calibration_cooldown_blocks_immediate_trigger() {
    // Mass arrives right after a tare; the cooldown and the dwell keep the
    // gate closed, so a load already on the platform never starts a session.
    let mut r = rig(&[(500, 5.0)]);
    r.ctl.tare().expect("tare");
    let hit = common::tick_until(&mut r, Duration::from_secs(20), is_triggered);
    assert_eq!(hit, None);
}

#[test]
fn unknown_command_reply_lists_help() {
    let mut r = rig(&[]);
    let reply = r.ctl.execute_line("weigh");
    assert_eq!(reply, Reply::Rejected(ParseError::Unknown("weigh".into())));
    let text = reply.to_string();
    assert!(text.contains("unknown command"));
    assert!(text.contains("resetcal"));
    assert_eq!(r.ctl.mode(), RunMode::Idle);
}

#[test]
fn runner_executes_commands_and_flushes_on_exit() {
    let mut r = rig(&[(3_000, 5.0)]);
    let mut lines: VecDeque<String> = ["help", "", "bogus"].iter().map(|s| s.to_string()).collect();
    let mut replies = Vec::new();
    let mut sessions = 0;
    let shutdown = AtomicBool::new(false);
    let params = RunParams {
        max_runtime: Some(Duration::from_secs(15)),
        startup: false,
        ..RunParams::default()
    };
    let summary = run(
        &mut r.ctl,
        params,
        &shutdown,
        || lines.pop_front(),
        |reply| replies.push(reply.clone()),
        |st| {
            if matches!(st, TickStatus::SessionEnded { .. }) {
                sessions += 1;
            }
        },
    );
    assert_eq!(summary.commands, 2);
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0], Reply::Help);
    assert!(!replies[1].is_ok());
    // the load never leaves, so the only session is the flushed one
    assert_eq!(summary.sessions, 1);
    assert_eq!(summary.uploaded, 1);
    assert_eq!(sessions, 1);
    assert_eq!(r.ctl.mode(), RunMode::Idle);
}

#[test]
fn runner_stops_immediately_on_shutdown() {
    let mut r = rig(&[]);
    let shutdown = AtomicBool::new(true);
    let summary = run(
        &mut r.ctl,
        RunParams::default(),
        &shutdown,
        || None,
        |_| {},
        |_| {},
    );
    assert_eq!(summary.ticks, 0);
    assert_eq!(summary.sessions, 0);
}
