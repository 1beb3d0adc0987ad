//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

pub const DEFAULT_CONFIG: &str = "etc/autoscale.toml";

pub fn json_mode() -> bool {
    JSON_MODE.get().copied().unwrap_or(false)
}

#[derive(Parser, Debug)]
#[command(name = "autoscale", version, about = "Load-cell calibration and weighing capture")]
pub struct Cli {
    /// Path to config TOML (typed); defaults to etc/autoscale.toml when present
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Optional calibration CSV (strict header `raw,grams`) to seed the zero offset and factor
    #[arg(long, value_name = "FILE")]
    pub calibration: Option<PathBuf>,

    /// Log and report as JSON lines instead of pretty text
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the capture loop, reading operator commands from stdin
    Run {
        /// Stop after this many milliseconds (default: run until Ctrl-C)
        #[arg(long, value_name = "MS")]
        max_runtime_ms: Option<u64>,
        /// Do not read operator commands from stdin
        #[arg(long, action = ArgAction::SetTrue)]
        no_stdin: bool,
        /// Skip the initial tare
        #[arg(long, action = ArgAction::SetTrue)]
        no_tare: bool,
    },
    /// Execute one console command (e.g. `exec cal 500`) and exit
    Exec {
        #[arg(
            required = true,
            trailing_var_arg = true,
            allow_hyphen_values = true,
            value_name = "COMMAND"
        )]
        line: Vec<String>,
    },
    /// Quick health check: one reading from the configured sensor
    SelfCheck,
}
