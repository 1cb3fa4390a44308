//! Human-readable error descriptions and structured JSON error formatting.

use sorter_core::{BuildError, FaultKind, SorterError};

/// Map an eyre::Report to a human-readable explanation with likely causes and fix hints.
pub fn humanize(err: &eyre::Report) -> String {
    // Typed matches first
    if let Some(be) = err.downcast_ref::<BuildError>() {
        return match be {
            BuildError::MissingStepper => {
                "What happened: No stepper was provided to the sorter.\nLikely causes: The carousel driver failed to initialize.\nHow to fix: Check [pins].step and [pins].dir and that the driver is powered.".to_string()
            }
            BuildError::MissingGate => {
                "What happened: No gate servo was provided to the sorter.\nLikely causes: The gate servo failed to initialize.\nHow to fix: Check [pins].gate_servo.".to_string()
            }
            BuildError::MissingRollers => {
                "What happened: Roller servos were not provided to the sorter.\nLikely causes: One of the feed roller servos failed to initialize.\nHow to fix: Check [pins].roller_left and [pins].roller_right.".to_string()
            }
            BuildError::InvalidConfig(msg) => format!(
                "What happened: Invalid configuration ({msg}).\nLikely causes: Inconsistent carousel geometry or out-of-range pulse widths in the TOML.\nHow to fix: Edit the config file, then rerun `sorter self-check`."
            ),
        };
    }

    if let Some(se) = err.downcast_ref::<SorterError>() {
        return match se {
            SorterError::Fault(FaultKind::FeedSlotOccupied) => "What happened: A new bean arrived at a feed slot that was still occupied.\nLikely causes: Ring bookkeeping out of step with the carousel, usually after a missed ZERO.\nHow to fix: Clear the carousel, restart the controller and send ZERO before sorting.".to_string(),
            SorterError::Fault(FaultKind::Device) => "What happened: A device failed during sorting and the controller latched its fault state.\nLikely causes: Stepper driver fault, servo power loss or a broken host link.\nHow to fix: Check wiring and power, then restart. Re-run with --log-level=debug for the failing call.".to_string(),
            SorterError::Hardware(msg) | SorterError::HardwareFault(msg) => format!(
                "What happened: Hardware error ({msg}).\nLikely causes: Wrong pin numbers, missing GPIO permissions or an unpowered driver.\nHow to fix: Fix [pins] in the config and make sure the process can access GPIO."
            ),
            SorterError::Config(msg) => format!(
                "What happened: Configuration could not be loaded ({msg}).\nLikely causes: Missing file, TOML syntax error or an out-of-range value.\nHow to fix: Pass --config with a valid file; see etc/sorter_config.toml for a sample."
            ),
            SorterError::Io(msg) => format!(
                "What happened: I/O error on the host link ({msg}).\nLikely causes: Wrong serial device, port already in use or cable unplugged.\nHow to fix: Check --port and [link].baud."
            ),
            other => format!(
                "What happened: {other}.\nLikely causes: See logs.\nHow to fix: Re-run with --log-level=debug or set RUST_LOG for more detail."
            ),
        };
    }

    // String-based heuristics for errors coming from init
    let msg = err.to_string();
    let lower = msg.to_ascii_lowercase();

    if lower.contains("open serial port") || lower.contains("open port") {
        return format!(
            "What happened: Could not open the host link.\nLikely causes: Wrong device path or insufficient permissions.\nHow to fix: Check --port; add the user to the dialout group if needed. Original: {msg}"
        );
    }

    if lower.contains("init tracing") {
        return "What happened: Logging could not be initialized.\nHow to fix: Check [logging].file and RUST_LOG.".to_string();
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

/// Stable exit codes: 2 config, 3 ring fault, 4 device, 5 link I/O, 1 otherwise.
pub fn exit_code_for_error(err: &eyre::Report) -> i32 {
    if err.downcast_ref::<BuildError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Config(_)) => 2,
        Some(SorterError::Fault(FaultKind::FeedSlotOccupied)) => 3,
        Some(
            SorterError::Fault(FaultKind::Device)
            | SorterError::Hardware(_)
            | SorterError::HardwareFault(_),
        ) => 4,
        Some(SorterError::Io(_)) => 5,
        _ => 1,
    }
}

fn reason_name(err: &eyre::Report) -> &'static str {
    if err.downcast_ref::<BuildError>().is_some() {
        return "InvalidConfig";
    }
    match err.downcast_ref::<SorterError>() {
        Some(SorterError::Config(_)) => "Config",
        Some(SorterError::Fault(FaultKind::FeedSlotOccupied)) => "FeedSlotOccupied",
        Some(SorterError::Fault(FaultKind::Device)) => "DeviceFault",
        Some(SorterError::Hardware(_) | SorterError::HardwareFault(_)) => "Hardware",
        Some(SorterError::Io(_)) => "Io",
        _ => "Error",
    }
}

/// Structured JSON for errors when --json is enabled.
pub fn format_error_json(err: &eyre::Report) -> String {
    serde_json::json!({
        "reason": reason_name(err),
        "exit_code": exit_code_for_error(err),
        "message": humanize(err),
    })
    .to_string()
}
