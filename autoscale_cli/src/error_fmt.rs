//! Human-readable error descriptions and structured JSON error formatting.

use autoscale_core::{BuildError, ParseError, ScaleError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingSource => {
                "What happened: No sample source was provided to the controller.\nLikely causes: The load cell failed to initialize or was not wired into the builder.\nHow to fix: Check sensor.kind and [pins] in the config.".to_string()
            }
            BuildError::MissingStore => {
                "What happened: No calibration store was provided to the controller.\nLikely causes: The builder was not configured.\nHow to fix: Pass a store via with_store(...).".to_string()
            }
            BuildError::MissingUploader => {
                "What happened: No session uploader was provided to the controller.\nLikely causes: The builder was not configured.\nHow to fix: Pass an uploader via with_uploader(...).".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Missing or out-of-range values in the TOML.\nHow to fix: Edit the config file, then rerun."
            ),
        };
    }

    if let Some(pe) = err.downcast_ref::<ParseError>() {
        return format!(
            "What happened: Command not understood ({pe}).\nHow to fix: Run `autoscale exec help` for the command list.\n{}",
            autoscale_core::HELP
        );
    }

    if let Some(se) = err.downcast_ref::<ScaleError>() {
        return match se {
            ScaleError::SensorUnavailable { waited_ms } => format!(
                "What happened: The load cell produced no data within {waited_ms} ms.\nLikely causes: HX711 not wired correctly, no power/ground, or wrong DT/SCK pins.\nHow to fix: Verify [pins] and power, then run `autoscale self-check`."
            ),
            ScaleError::StabilityTimeout { phase } => format!(
                "What happened: The reading did not settle while {phase}.\nLikely causes: Vibration, airflow, or the mass was still moving.\nHow to fix: Steady the platform and retry; raise the calibration timeouts if the cell is slow."
            ),
            ScaleError::InsufficientSignal { delta, min } => format!(
                "What happened: The calibration mass moved the reading by only {delta} counts (need {min}).\nLikely causes: No mass on the platform, a mass that is too light, or reversed cell wiring.\nHow to fix: Place a heavier reference mass; check calibration.polarity."
            ),
            ScaleError::DegenerateMasses { .. } | ScaleError::MissingCalibrationPoint(_) => format!(
                "What happened: {se}.\nHow to fix: Record two points with different masses (`cal1 <g>`, `cal2 <g>`), then `solve`."
            ),
            ScaleError::PolarityMismatch { .. } => format!(
                "What happened: {se}.\nLikely causes: Load cell wired in reverse.\nHow to fix: Set calibration.polarity = \"negative\" or swap the signal wires."
            ),
            _ => format!(
                "What happened: {se}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init or config
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open hx711") || lower.contains("hx711 support not compiled") {
        return format!(
            "What happened: Failed to initialize the HX711 ({msg}).\nLikely causes: Incorrect pin numbers, insufficient GPIO permissions, or a build without the `hardware` feature.\nHow to fix: Fix the [pins] values; ensure the process may access GPIO; use sensor.kind = \"simulated\" off-device."
        );
    }

    // Calibration CSV header special-case
    let chain = format!("{err:#}").to_ascii_lowercase();
    if chain.contains("calibration csv must have headers") {
        return "Invalid headers in calibration CSV. Expected 'raw,grams'.".to_string();
    }

    if lower.contains("invalid configuration") || lower.contains("failed to read config") {
        let cause = err
            .chain()
            .nth(1)
            .map(|c| format!(" ({c})"))
            .unwrap_or_default();
        return format!(
            "What happened: Configuration is invalid or unreadable{cause}.\nLikely causes: Wrong --config path, a TOML syntax error, or out-of-range values.\nHow to fix: Edit the TOML config and try again."
        );
    }

    // Generic fallback
    let mut cause = String::new();
    if let Some(src) = err.source() {
        cause = format!(" Cause: {src}");
    }
    format!(
        "Something went wrong.{cause}\nHow to fix: Re-run with --log-level=debug for details. Original: {msg}"
    )
}

/// Stable exit codes: 2 usage, 3 sensor, 4 stability, 5 calibration math, 1 other.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<ParseError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::InvalidArgument(_)) => 2,
        Some(ScaleError::SensorUnavailable { .. } | ScaleError::Hardware(_)) => 3,
        Some(ScaleError::StabilityTimeout { .. }) => 4,
        Some(
            ScaleError::InsufficientSignal { .. }
            | ScaleError::DegenerateMasses { .. }
            | ScaleError::MissingCalibrationPoint(_)
            | ScaleError::PolarityMismatch { .. },
        ) => 5,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<ParseError>().is_some() {
        return "BadCommand";
    }
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<ScaleError>() {
        Some(ScaleError::SensorUnavailable { .. }) => "SensorUnavailable",
        Some(ScaleError::StabilityTimeout { .. }) => "StabilityTimeout",
        Some(ScaleError::InsufficientSignal { .. }) => "InsufficientSignal",
        Some(ScaleError::DegenerateMasses { .. }) => "DegenerateMasses",
        Some(ScaleError::MissingCalibrationPoint(_)) => "MissingCalibrationPoint",
        Some(ScaleError::InvalidArgument(_)) => "InvalidArgument",
        Some(ScaleError::PolarityMismatch { .. }) => "PolarityMismatch",
        Some(ScaleError::Hardware(_)) => "Hardware",
        Some(ScaleError::Persistence(_)) => "Persistence",
        None => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({ "reason": reason_name(err), "message": humanize(err) }).to_string()
}
