#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the carousel sorter.
//!
//! `Config` and its sections are deserialized from TOML and checked with
//! `Config::validate()`. Everything except `[pins]` has defaults matching the
//! reference machine (24 slots, 3200 steps per revolution).
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Pins {
    pub step: u8,
    pub dir: u8,
    pub enable: Option<u8>,
    pub gate_servo: u8,
    pub roller_left: u8,
    pub roller_right: u8,
    /// Servo for the actuated defect flap; only used with `defect_eject.mode = "actuated"`.
    pub defect_flap: Option<u8>,
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RotationDirection {
    #[default]
    Forward,
    Reverse,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CarouselCfg {
    pub slots: usize,
    pub steps_per_rev: u32,
    pub direction: RotationDirection,
    pub capture_position: usize,
    pub normal_eject_position: usize,
    pub defect_eject_position: usize,
    /// Full STEP period in microseconds.
    pub step_pulse_us: u32,
}

impl Default for CarouselCfg {
    fn default() -> Self {
        Self {
            slots: 24,
            steps_per_rev: 3200,
            direction: RotationDirection::Forward,
            capture_position: 2,
            normal_eject_position: 8,
            defect_eject_position: 11,
            step_pulse_us: 500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TimingCfg {
    pub feed_run_ms: u64,
    pub settle_ms: u64,
    pub response_timeout_ms: u64,
    pub gate_open_ms: u64,
    /// Sleep between control-loop iterations.
    pub loop_period_ms: u64,
}

impl Default for TimingCfg {
    fn default() -> Self {
        Self {
            feed_run_ms: 600,
            settle_ms: 150,
            response_timeout_ms: 3000,
            gate_open_ms: 400,
            loop_period_ms: 2,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct GateCfg {
    pub open_us: u16,
    pub closed_us: u16,
}

impl Default for GateCfg {
    fn default() -> Self {
        Self {
            open_us: 1900,
            closed_us: 1100,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct RollerCfg {
    /// Pulse width at which the continuous-rotation servos stand still.
    pub neutral_us: u16,
    /// Offset from neutral used while feeding.
    pub feed_speed: u16,
    /// Hard clamp for any speed offset.
    pub max_speed: u16,
}

impl Default for RollerCfg {
    fn default() -> Self {
        Self {
            neutral_us: 1500,
            feed_speed: 200,
            max_speed: 400,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CalibrationCfg {
    /// Forward-then-reverse nudge issued by ZERO.
    pub zero_nudge_steps: u32,
    pub jog_small_steps: u32,
    pub jog_large_steps: u32,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            zero_nudge_steps: 20,
            jog_small_steps: 10,
            jog_large_steps: 100,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DefectEjectMode {
    /// Beans drop through an opening at the defect position.
    #[default]
    Passive,
    /// A servo flap pushes the bean out.
    Actuated,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DefectEjectCfg {
    pub mode: DefectEjectMode,
    pub open_us: u16,
    pub closed_us: u16,
    pub open_ms: u64,
}

impl Default for DefectEjectCfg {
    fn default() -> Self {
        Self {
            mode: DefectEjectMode::Passive,
            open_us: 1900,
            closed_us: 1100,
            open_ms: 300,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct LinkCfg {
    pub baud: u32,
}

impl Default for LinkCfg {
    fn default() -> Self {
        Self { baud: 115_200 }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Config {
    pub pins: Pins,
    #[serde(default)]
    pub carousel: CarouselCfg,
    #[serde(default)]
    pub timing: TimingCfg,
    #[serde(default)]
    pub gate: GateCfg,
    #[serde(default)]
    pub rollers: RollerCfg,
    #[serde(default)]
    pub calibration: CalibrationCfg,
    #[serde(default)]
    pub defect_eject: DefectEjectCfg,
    #[serde(default)]
    pub link: LinkCfg,
    #[serde(default)]
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read and parse a config file, then validate it.
pub fn load_file(path: &std::path::Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

const SERVO_RANGE_US: std::ops::RangeInclusive<u16> = 500..=2500;

fn check_servo_us(name: &str, v: u16) -> eyre::Result<()> {
    if !SERVO_RANGE_US.contains(&v) {
        eyre::bail!("{name} must be in 500..=2500 us");
    }
    Ok(())
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Carousel geometry
        let c = &self.carousel;
        if c.slots < 2 {
            eyre::bail!("carousel.slots must be >= 2");
        }
        if c.slots > 1024 {
            eyre::bail!("carousel.slots is unreasonably large (>1024)");
        }
        if (c.steps_per_rev as usize) < c.slots {
            eyre::bail!("carousel.steps_per_rev must be >= carousel.slots");
        }
        if c.capture_position == 0 {
            eyre::bail!("carousel.capture_position must be > 0 (position 0 is the feed)");
        }
        if c.normal_eject_position <= c.capture_position {
            eyre::bail!("carousel.normal_eject_position must be after capture_position");
        }
        if c.defect_eject_position <= c.normal_eject_position {
            eyre::bail!("carousel.defect_eject_position must be after normal_eject_position");
        }
        if c.defect_eject_position >= c.slots {
            eyre::bail!("carousel.defect_eject_position must be < carousel.slots");
        }
        if c.step_pulse_us < 2 {
            eyre::bail!("carousel.step_pulse_us must be >= 2");
        }

        // Timing
        let t = &self.timing;
        if t.feed_run_ms == 0 {
            eyre::bail!("timing.feed_run_ms must be >= 1");
        }
        if t.response_timeout_ms == 0 {
            eyre::bail!("timing.response_timeout_ms must be >= 1");
        }
        if t.gate_open_ms == 0 {
            eyre::bail!("timing.gate_open_ms must be >= 1");
        }
        if t.response_timeout_ms > 60 * 60 * 1000 {
            eyre::bail!("timing.response_timeout_ms is unreasonably large (>1h)");
        }
        if t.loop_period_ms > 1000 {
            eyre::bail!("timing.loop_period_ms must be <= 1000");
        }

        // Servos
        check_servo_us("gate.open_us", self.gate.open_us)?;
        check_servo_us("gate.closed_us", self.gate.closed_us)?;
        check_servo_us("rollers.neutral_us", self.rollers.neutral_us)?;
        if self.rollers.max_speed > 500 {
            eyre::bail!("rollers.max_speed must be <= 500");
        }
        if self.rollers.feed_speed == 0 || self.rollers.feed_speed > self.rollers.max_speed {
            eyre::bail!("rollers.feed_speed must be in 1..=rollers.max_speed");
        }
        let lo = self.rollers.neutral_us.saturating_sub(self.rollers.max_speed);
        let hi = self.rollers.neutral_us.saturating_add(self.rollers.max_speed);
        if !SERVO_RANGE_US.contains(&lo) || !SERVO_RANGE_US.contains(&hi) {
            eyre::bail!("rollers.neutral_us +/- rollers.max_speed must stay within 500..=2500 us");
        }

        // Calibration
        if self.calibration.jog_small_steps == 0 || self.calibration.jog_large_steps == 0 {
            eyre::bail!("calibration jog step counts must be >= 1");
        }

        // Defect eject
        if self.defect_eject.mode == DefectEjectMode::Actuated {
            if self.pins.defect_flap.is_none() {
                eyre::bail!("defect_eject.mode = \"actuated\" requires pins.defect_flap");
            }
            check_servo_us("defect_eject.open_us", self.defect_eject.open_us)?;
            check_servo_us("defect_eject.closed_us", self.defect_eject.closed_us)?;
            if self.defect_eject.open_ms == 0 {
                eyre::bail!("defect_eject.open_ms must be >= 1");
            }
        }

        // Link
        if self.link.baud == 0 {
            eyre::bail!("link.baud must be > 0");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
