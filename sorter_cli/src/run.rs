//! Wiring between the typed config, the devices, the host link and the
//! control loop.

use std::io::{BufReader, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use eyre::WrapErr;
use sorter_config::{Config, DefectEjectMode};
use sorter_core::config as rt;
use sorter_core::runner::{self, RunOptions, RunOutcome};
use sorter_core::{
    ActuatedFlap, AdminCommand, AutoClassifier, LineLink, SortStats, Sorter, SorterError,
    StubVerdict,
};
use sorter_traits::{HostLink, Servo, Stepper};

#[cfg(all(feature = "hardware", target_os = "linux"))]
fn make_devices(cfg: &Config) -> eyre::Result<Devices> {
    use sorter_hardware::rpi::{HardwareServo, HardwareStepper};
    let p = &cfg.pins;
    let hw = |e: sorter_hardware::error::HwError| SorterError::Hardware(e.to_string());
    let stepper = HardwareStepper::new(p.step, p.dir, p.enable, cfg.carousel.step_pulse_us)
        .map_err(hw)
        .wrap_err("open stepper pins")?;
    let gate = HardwareServo::new(p.gate_servo)
        .map_err(hw)
        .wrap_err("open gate servo")?;
    let left = HardwareServo::new(p.roller_left)
        .map_err(hw)
        .wrap_err("open left roller servo")?;
    let right = HardwareServo::new(p.roller_right)
        .map_err(hw)
        .wrap_err("open right roller servo")?;
    let flap = match (cfg.defect_eject.mode, p.defect_flap) {
        (DefectEjectMode::Actuated, Some(pin)) => Some(Box::new(
            HardwareServo::new(pin)
                .map_err(hw)
                .wrap_err("open defect flap servo")?,
        ) as Box<dyn Servo>),
        _ => None,
    };
    Ok(Devices {
        stepper: Box::new(stepper),
        gate: Box::new(gate),
        left: Box::new(left),
        right: Box::new(right),
        flap,
    })
}

#[cfg(not(all(feature = "hardware", target_os = "linux")))]
fn make_devices(cfg: &Config) -> eyre::Result<Devices> {
    use sorter_hardware::{SimulatedServo, SimulatedStepper};
    tracing::info!("hardware backend not compiled in; using simulated devices");
    let flap = (cfg.defect_eject.mode == DefectEjectMode::Actuated)
        .then(|| Box::new(SimulatedServo::new("defect_flap")) as Box<dyn Servo>);
    Ok(Devices {
        stepper: Box::new(SimulatedStepper::new()),
        gate: Box::new(SimulatedServo::new("gate")),
        left: Box::new(SimulatedServo::new("roller_left")),
        right: Box::new(SimulatedServo::new("roller_right")),
        flap,
    })
}

struct Devices {
    stepper: Box<dyn Stepper>,
    gate: Box<dyn Servo>,
    left: Box<dyn Servo>,
    right: Box<dyn Servo>,
    flap: Option<Box<dyn Servo>>,
}

/// Build a `Sorter` from the typed config, on real pins when the hardware
/// backend is compiled in.
pub fn build_sorter(cfg: &Config) -> eyre::Result<Sorter> {
    let dev = make_devices(cfg)?;
    let builder = Sorter::builder()
        .with_carousel(rt::CarouselCfg::from(&cfg.carousel))
        .with_timing(rt::TimingCfg::from(&cfg.timing))
        .with_gate_cfg(rt::GateCfg::from(&cfg.gate))
        .with_roller_cfg(rt::RollerCfg::from(&cfg.rollers))
        .with_calibration(rt::CalibrationCfg::from(&cfg.calibration))
        .with_stepper(dev.stepper)
        .with_gate(dev.gate)
        .with_rollers(dev.left, dev.right);
    let builder = match dev.flap {
        Some(servo) => builder.with_defect_ejector(ActuatedFlap::new(
            servo,
            rt::DefectFlapCfg::from(&cfg.defect_eject),
        )),
        None => builder,
    };
    builder.build()
}

/// Host link on the given serial port, or stdin/stdout when `port` is `None`.
pub fn open_link(port: Option<&Path>, baud: u32) -> eyre::Result<Box<dyn HostLink>> {
    let Some(path) = port else {
        tracing::info!("host link on stdin/stdout");
        return Ok(Box::new(LineLink::spawn(
            BufReader::new(std::io::stdin()),
            std::io::stdout(),
        )));
    };

    #[cfg(all(feature = "serial", unix))]
    let file = sorter_hardware::serial::open_serial(path, baud)
        .map_err(|e| SorterError::Io(e.to_string()))
        .wrap_err_with(|| format!("open serial port {}", path.display()))?;
    #[cfg(not(all(feature = "serial", unix)))]
    let file = {
        tracing::warn!(baud, "serial support not compiled in; port opened without line settings");
        std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| SorterError::Io(e.to_string()))
            .wrap_err_with(|| format!("open port {}", path.display()))?
    };

    let reader = file
        .try_clone()
        .map_err(|e| SorterError::Io(e.to_string()))
        .wrap_err("clone port handle for reader")?;
    tracing::info!(port = %path.display(), baud, "host link on serial port");
    Ok(Box::new(LineLink::spawn(BufReader::new(reader), file)))
}

pub struct RunArgs<'a> {
    pub port: Option<&'a Path>,
    pub auto_classify: Option<StubVerdict>,
    pub max_iterations: Option<u64>,
    pub zero_on_start: bool,
    pub json: bool,
}

pub fn run_sorter(cfg: &Config, args: &RunArgs<'_>, shutdown: Arc<AtomicBool>) -> eyre::Result<()> {
    let mut sorter = build_sorter(cfg)?;
    let link = open_link(args.port, cfg.link.baud)?;
    let mut link: Box<dyn HostLink> = match args.auto_classify {
        Some(policy) => {
            tracing::info!(?policy, "answering capture requests locally");
            Box::new(AutoClassifier::new(link, policy))
        }
        None => link,
    };

    if args.zero_on_start {
        sorter
            .handle_command(AdminCommand::Zero, link.as_mut())
            .wrap_err("zero on start")?;
    }

    let opts = RunOptions {
        max_iterations: args.max_iterations,
        shutdown: Some(shutdown),
    };
    let outcome = runner::run(&mut sorter, link.as_mut(), &opts)?;
    report_stats(outcome, sorter.stats(), args.json)
}

/// Final counters go to stderr; stdout may be the protocol channel.
fn report_stats(outcome: RunOutcome, s: SortStats, json: bool) -> eyre::Result<()> {
    let mut err = std::io::stderr().lock();
    if json {
        let obj = serde_json::json!({
            "outcome": format!("{outcome:?}"),
            "fed": s.fed,
            "captures": s.captures,
            "results": s.results,
            "timeouts": s.timeouts,
            "normal_ejects": s.normal_ejects,
            "defect_ejects": s.defect_ejects,
        });
        writeln!(err, "{obj}")?;
    } else {
        writeln!(
            err,
            "stopped ({outcome:?}): fed={} captures={} results={} timeouts={} normal={} defect={}",
            s.fed, s.captures, s.results, s.timeouts, s.normal_ejects, s.defect_ejects
        )?;
    }
    Ok(())
}

/// Construct every device and the sorter, then report the effective geometry.
pub fn self_check(cfg: &Config, json: bool) -> eyre::Result<()> {
    let sorter = build_sorter(cfg)?;
    let c = sorter.carousel_cfg();
    if json {
        let obj = serde_json::json!({
            "status": "ok",
            "slots": c.slots,
            "steps_per_rev": c.steps_per_rev,
            "capture_position": c.capture_position,
            "normal_eject_position": c.normal_eject_position,
            "defect_eject_position": c.defect_eject_position,
            "defect_eject": format!("{:?}", cfg.defect_eject.mode).to_lowercase(),
            "state": sorter.state().name(),
        });
        println!("{obj}");
    } else {
        println!("OK");
        println!(
            "carousel: {} slots, {} steps/rev, capture={} normal={} defect={}",
            c.slots,
            c.steps_per_rev,
            c.capture_position,
            c.normal_eject_position,
            c.defect_eject_position
        );
        println!("defect eject: {:?}", cfg.defect_eject.mode);
    }
    Ok(())
}
