//! Subcommand handlers.
use std::io::BufRead;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use autoscale_config::{CalibrationFit, Config};
use autoscale_core::{
    Command, EndReason, Reply, RunParams, Sampler, SamplerCfg, ScaleError, TickStatus,
};
use autoscale_traits::{Clock, MonotonicClock};
use crossbeam_channel::{Receiver, unbounded};
use serde_json::json;

use crate::assemble;

const SELF_CHECK_TIMEOUT: Duration = Duration::from_millis(1_000);

fn end_reason_name(r: EndReason) -> &'static str {
    match r {
        EndReason::Released => "released",
        EndReason::MaxDuration => "max_duration",
        EndReason::Shutdown => "shutdown",
    }
}

pub fn reply_json(reply: &Reply) -> serde_json::Value {
    match reply {
        Reply::Help => json!({ "reply": "help", "text": autoscale_core::HELP }),
        Reply::Tared { zero } => json!({ "reply": "tared", "zero_offset": zero }),
        Reply::Calibrated { factor } => json!({ "reply": "calibrated", "scale_factor": factor }),
        Reply::PointRecorded { slot, mass_g, raw } => json!({
            "reply": "point_recorded",
            "slot": slot.to_string(),
            "mass_g": mass_g,
            "raw": raw,
        }),
        Reply::Reset { factor } => json!({ "reply": "reset", "scale_factor": factor }),
        Reply::Failed(e) => json!({ "reply": "failed", "error": e.to_string() }),
        Reply::Rejected(e) => json!({ "reply": "rejected", "error": e.to_string() }),
    }
}

fn print_reply(reply: &Reply, json: bool) {
    if json {
        println!("{}", reply_json(reply));
    } else {
        println!("{reply}");
    }
}

/// Feed stdin lines into a channel from a dedicated thread.
fn spawn_console() -> eyre::Result<Receiver<String>> {
    let (tx, rx) = unbounded();
    std::thread::Builder::new()
        .name("console".into())
        .spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
            tracing::debug!("console input closed");
        })?;
    Ok(rx)
}

pub struct RunOpts {
    pub max_runtime_ms: Option<u64>,
    pub no_stdin: bool,
    pub no_tare: bool,
    pub json: bool,
}

pub fn run(cfg: &Config, fit: Option<&CalibrationFit>, opts: &RunOpts) -> eyre::Result<()> {
    let mut controller = assemble::controller(cfg, fit)?;

    let shutdown = Arc::new(AtomicBool::new(false));
    {
        let flag = Arc::clone(&shutdown);
        ctrlc::set_handler(move || flag.store(true, Ordering::Relaxed))?;
    }

    let console = if opts.no_stdin {
        None
    } else {
        if !opts.json {
            println!("{}", autoscale_core::HELP);
        }
        Some(spawn_console()?)
    };

    let params = RunParams {
        max_runtime: opts.max_runtime_ms.map(Duration::from_millis),
        startup: !opts.no_tare,
        ..RunParams::default()
    };
    let json = opts.json;
    let summary = autoscale_core::run(
        &mut controller,
        params,
        &shutdown,
        || console.as_ref().and_then(|rx| rx.try_recv().ok()),
        |reply| print_reply(reply, json),
        |status| {
            if let TickStatus::SessionEnded {
                reason,
                samples,
                uploaded,
            } = status
            {
                tracing::info!(
                    reason = end_reason_name(*reason),
                    samples,
                    uploaded,
                    "session ended"
                );
            }
        },
    );

    if json {
        println!(
            "{}",
            json!({
                "sessions": summary.sessions,
                "uploaded": summary.uploaded,
                "commands": summary.commands,
            })
        );
    } else {
        eprintln!(
            "stopped: {} session(s), {} uploaded, {} command(s)",
            summary.sessions, summary.uploaded, summary.commands
        );
    }
    Ok(())
}

/// Run one console command against a freshly started controller.
pub fn exec(
    cfg: &Config,
    fit: Option<&CalibrationFit>,
    line: &str,
    json: bool,
) -> eyre::Result<()> {
    // Parse before touching the sensor so bad input fails fast.
    let cmd: Command = line.parse()?;
    if cmd == Command::Help {
        print_reply(&Reply::Help, json);
        return Ok(());
    }

    let mut controller = assemble::controller(cfg, fit)?;
    controller.startup();
    match controller.execute(cmd) {
        Reply::Failed(e) => Err(e.into()),
        reply => {
            print_reply(&reply, json);
            Ok(())
        }
    }
}

pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let clock: Arc<dyn Clock + Send + Sync> = Arc::new(MonotonicClock::new());
    let source = assemble::make_source(cfg, &clock)?;
    let mut sampler = Sampler::new(source, clock, SamplerCfg::from(&cfg.sensor));
    let raw = sampler
        .read_within(SELF_CHECK_TIMEOUT)
        .ok_or(ScaleError::SensorUnavailable {
            waited_ms: SELF_CHECK_TIMEOUT.as_millis() as u64,
        })?;
    if json {
        println!("{}", json!({ "self_check": "ok", "raw": raw }));
    } else {
        println!("self-check ok: raw = {raw}");
    }
    Ok(())
}
