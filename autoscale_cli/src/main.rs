#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! `autoscale`: run the capture loop, execute one console command, or check
//! the sensor.
mod assemble;
mod cli;
mod error_fmt;
mod logging;
mod service;
mod upload;

use std::path::Path;

use clap::Parser;
use eyre::WrapErr;

use crate::cli::{Cli, Commands, DEFAULT_CONFIG, JSON_MODE, json_mode};

fn load_config(path: Option<&Path>) -> eyre::Result<autoscale_config::Config> {
    let (path, explicit) = match path {
        Some(p) => (p, true),
        None => (Path::new(DEFAULT_CONFIG), false),
    };
    if !explicit && !path.exists() {
        return Ok(autoscale_config::Config::default());
    }
    let text = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
    let cfg = autoscale_config::load_toml(&text)
        .map_err(eyre::Report::new)
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    cfg.validate()
        .wrap_err_with(|| format!("invalid configuration in {}", path.display()))?;
    Ok(cfg)
}

fn real_main(cli: Cli) -> eyre::Result<()> {
    let cfg = load_config(cli.config.as_deref())?;
    logging::init(cli.json, cli.log_level.as_deref(), &cfg.logging)?;
    tracing::debug!(config = ?cli.config, device_id = %cfg.device.id, "configuration loaded");

    let fit = cli
        .calibration
        .as_deref()
        .map(assemble::load_fit)
        .transpose()?;

    match cli.cmd {
        Commands::Run {
            max_runtime_ms,
            no_stdin,
            no_tare,
        } => service::run(
            &cfg,
            fit.as_ref(),
            &service::RunOpts {
                max_runtime_ms,
                no_stdin,
                no_tare,
                json: cli.json,
            },
        ),
        Commands::Exec { line } => service::exec(&cfg, fit.as_ref(), &line.join(" "), cli.json),
        Commands::SelfCheck => service::self_check(&cfg, cli.json),
    }
}

fn main() {
    let _ = color_eyre::install();
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(cli) {
        tracing::error!(error = %format!("{err:#}"), "command failed");
        if json_mode() {
            eprintln!("{}", error_fmt::format_error_json(&err));
        } else {
            eprintln!("{}", error_fmt::humanize(&err));
        }
        std::process::exit(error_fmt::exit_code_for_error(&err));
    }
}
