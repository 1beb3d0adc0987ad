//! Line-oriented operator commands.
//!
//! Parsing is transport-agnostic: the CLI feeds lines from stdin or its
//! arguments, tests feed strings. Masses on the command line are grams.
use std::str::FromStr;

use thiserror::Error;

use crate::calibration::PointSlot;

pub const HELP: &str = "\
Commands:
  help              - show this help
  tare              - zero the platform
  cal <g>           - single-point calibration with a known mass in grams
  cal1 <g>          - two-point: record point 1 at <g> grams
  cal2 <g>          - two-point: record point 2 at <g> grams
  solve             - compute the factor from cal1/cal2
  resetcal          - revert to the default calibration factor";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Command {
    Help,
    Tare,
    Calibrate { mass_g: f32 },
    RecordPoint { slot: PointSlot, mass_g: f32 },
    Solve,
    ResetCal,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty command")]
    Empty,
    #[error("usage: {0} <grams>")]
    Usage(&'static str),
    #[error("not a number: {0:?}")]
    BadNumber(String),
    #[error("unknown command: {0:?}")]
    Unknown(String),
}

fn grams(cmd: &'static str, arg: Option<&str>) -> Result<f32, ParseError> {
    let arg = arg.ok_or(ParseError::Usage(cmd))?;
    arg.parse::<f32>()
        .ok()
        .filter(|g| g.is_finite())
        .ok_or_else(|| ParseError::BadNumber(arg.to_string()))
}

impl FromStr for Command {
    type Err = ParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let lower = line.trim().to_ascii_lowercase();
        let mut parts = lower.split_whitespace();
        let Some(word) = parts.next() else {
            return Err(ParseError::Empty);
        };
        let arg = parts.next();
        let takes_mass = matches!(word, "cal" | "cal1" | "cal2");
        if parts.next().is_some() || (!takes_mass && arg.is_some()) {
            return Err(ParseError::Unknown(lower.clone()));
        }
        match word {
            "help" | "?" => Ok(Command::Help),
            "tare" => Ok(Command::Tare),
            "solve" => Ok(Command::Solve),
            "resetcal" => Ok(Command::ResetCal),
            "cal" => Ok(Command::Calibrate {
                mass_g: grams("cal", arg)?,
            }),
            "cal1" => Ok(Command::RecordPoint {
                slot: PointSlot::One,
                mass_g: grams("cal1", arg)?,
            }),
            "cal2" => Ok(Command::RecordPoint {
                slot: PointSlot::Two,
                mass_g: grams("cal2", arg)?,
            }),
            _ => Err(ParseError::Unknown(word.to_string())),
        }
    }
}
