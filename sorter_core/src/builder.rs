//! Type-state builder for `Sorter`.
//!
//! The builder enforces at compile time that the stepper, gate servo and
//! roller servos are provided before `build()` is available. `try_build()` is
//! always available for dynamic checks.

use std::marker::PhantomData;
use std::sync::Arc;

use sorter_traits::clock::{Clock, MonotonicClock};
use sorter_traits::{Servo, Stepper};

use crate::actuators::{GateActuator, RollerActuator};
use crate::config::*;
use crate::eject::{DefectEjector, PassiveDrop};
use crate::error::{BuildError, Result};
use crate::fsm::{SortState, SortStats, Sorter};
use crate::motion::MotionController;
use crate::slot_ring::SlotRing;

impl Sorter {
    /// Start building a Sorter.
    pub fn builder() -> SorterBuilder<Missing, Missing, Missing> {
        SorterBuilder::default()
    }
}

// ── Type-state markers ───────────────────────────────────────────────────────

pub struct Missing;
pub struct Set;

/// Builder for `Sorter`. All fields are validated on `build()`.
pub struct SorterBuilder<S, G, R> {
    stepper: Option<Box<dyn Stepper>>,
    gate: Option<Box<dyn Servo>>,
    rollers: Option<(Box<dyn Servo>, Box<dyn Servo>)>,
    ejector: Option<Box<dyn DefectEjector>>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    carousel: Option<CarouselCfg>,
    timing: Option<TimingCfg>,
    gate_cfg: Option<GateCfg>,
    roller_cfg: Option<RollerCfg>,
    calibration: Option<CalibrationCfg>,
    _s: PhantomData<S>,
    _g: PhantomData<G>,
    _r: PhantomData<R>,
}

impl Default for SorterBuilder<Missing, Missing, Missing> {
    fn default() -> Self {
        Self {
            stepper: None,
            gate: None,
            rollers: None,
            ejector: None,
            clock: None,
            carousel: None,
            timing: None,
            gate_cfg: None,
            roller_cfg: None,
            calibration: None,
            _s: PhantomData,
            _g: PhantomData,
            _r: PhantomData,
        }
    }
}

fn invalid(msg: &'static str) -> eyre::Report {
    eyre::Report::new(BuildError::InvalidConfig(msg))
}

fn servo_width_ok(us: u16) -> bool {
    (500..=2500).contains(&us)
}

/// Validate configuration and construct a `Sorter` in `HomeWait`.
///
/// The single place where runtime configs are checked; `sorter_config`
/// performs the same checks on the file but the builder can be fed directly.
#[allow(clippy::too_many_arguments)]
fn validate_and_build(
    stepper: Box<dyn Stepper>,
    gate: Box<dyn Servo>,
    rollers: (Box<dyn Servo>, Box<dyn Servo>),
    ejector: Box<dyn DefectEjector>,
    clock: Option<Box<dyn Clock + Send + Sync>>,
    carousel: CarouselCfg,
    timing: TimingCfg,
    gate_cfg: GateCfg,
    roller_cfg: RollerCfg,
    calibration: CalibrationCfg,
) -> Result<Sorter> {
    // ── Validation ───────────────────────────────────────────────────────────
    if carousel.slots < 2 {
        return Err(invalid("slots must be >= 2"));
    }
    let slots = u32::try_from(carousel.slots).map_err(|_| invalid("slots out of range"))?;
    if carousel.steps_per_rev < slots {
        return Err(invalid("steps_per_rev must be >= slots"));
    }
    if carousel.capture_position == 0 {
        return Err(invalid("capture_position must be > 0"));
    }
    if carousel.normal_eject_position <= carousel.capture_position {
        return Err(invalid("normal_eject_position must be after capture_position"));
    }
    if carousel.defect_eject_position <= carousel.normal_eject_position {
        return Err(invalid(
            "defect_eject_position must be after normal_eject_position",
        ));
    }
    if carousel.defect_eject_position >= carousel.slots {
        return Err(invalid("defect_eject_position must be < slots"));
    }
    if timing.feed_run_ms == 0 || timing.response_timeout_ms == 0 || timing.gate_open_ms == 0 {
        return Err(invalid("feed, response and gate durations must be >= 1 ms"));
    }
    if !servo_width_ok(gate_cfg.open_us) || !servo_width_ok(gate_cfg.closed_us) {
        return Err(invalid("gate widths must be in 500..=2500 us"));
    }
    if roller_cfg.feed_speed == 0 || roller_cfg.feed_speed > roller_cfg.max_speed {
        return Err(invalid("feed_speed must be in 1..=max_speed"));
    }
    if !servo_width_ok(roller_cfg.neutral_us.saturating_add(roller_cfg.max_speed))
        || !servo_width_ok(roller_cfg.neutral_us.saturating_sub(roller_cfg.max_speed))
    {
        return Err(invalid("neutral_us +/- max_speed must stay within 500..=2500 us"));
    }

    // ── Assemble ─────────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock + Send + Sync> = match clock {
        Some(b) => Arc::from(b),
        None => Arc::new(MonotonicClock::new()),
    };
    let motion = MotionController::new(stepper, slots, carousel.steps_per_rev, carousel.direction);
    let (left, right) = rollers;

    Ok(Sorter {
        ring: SlotRing::new(carousel.slots),
        motion,
        gate: GateActuator::new(gate, gate_cfg),
        rollers: RollerActuator::new(left, right, roller_cfg),
        ejector,
        clock,
        carousel,
        timing,
        calibration,
        state: SortState::HomeWait,
        stats: SortStats::default(),
    })
}

impl<S, G, R> SorterBuilder<S, G, R> {
    /// Fallible build available in any type-state; returns detailed error for missing pieces.
    pub fn try_build(self) -> Result<Sorter> {
        let stepper = self
            .stepper
            .ok_or_else(|| eyre::Report::new(BuildError::MissingStepper))?;
        let gate = self
            .gate
            .ok_or_else(|| eyre::Report::new(BuildError::MissingGate))?;
        let rollers = self
            .rollers
            .ok_or_else(|| eyre::Report::new(BuildError::MissingRollers))?;

        validate_and_build(
            stepper,
            gate,
            rollers,
            self.ejector.unwrap_or_else(|| Box::new(PassiveDrop)),
            self.clock,
            self.carousel.unwrap_or_default(),
            self.timing.unwrap_or_default(),
            self.gate_cfg.unwrap_or_default(),
            self.roller_cfg.unwrap_or_default(),
            self.calibration.unwrap_or_default(),
        )
    }

    /// Move every field into a builder with different markers.
    fn retag<S2, G2, R2>(self) -> SorterBuilder<S2, G2, R2> {
        SorterBuilder {
            stepper: self.stepper,
            gate: self.gate,
            rollers: self.rollers,
            ejector: self.ejector,
            clock: self.clock,
            carousel: self.carousel,
            timing: self.timing,
            gate_cfg: self.gate_cfg,
            roller_cfg: self.roller_cfg,
            calibration: self.calibration,
            _s: PhantomData,
            _g: PhantomData,
            _r: PhantomData,
        }
    }
}

/// Chainable setters that do not affect type-state.
impl<S, G, R> SorterBuilder<S, G, R> {
    pub fn with_carousel(mut self, carousel: CarouselCfg) -> Self {
        self.carousel = Some(carousel);
        self
    }
    pub fn with_timing(mut self, timing: TimingCfg) -> Self {
        self.timing = Some(timing);
        self
    }
    pub fn with_gate_cfg(mut self, gate: GateCfg) -> Self {
        self.gate_cfg = Some(gate);
        self
    }
    pub fn with_roller_cfg(mut self, rollers: RollerCfg) -> Self {
        self.roller_cfg = Some(rollers);
        self
    }
    pub fn with_calibration(mut self, calibration: CalibrationCfg) -> Self {
        self.calibration = Some(calibration);
        self
    }
    /// Defect ejection strategy; defaults to `PassiveDrop`.
    pub fn with_defect_ejector(mut self, ejector: impl DefectEjector + 'static) -> Self {
        self.ejector = Some(Box::new(ejector));
        self
    }
    /// Provide a custom clock implementation; defaults to `MonotonicClock` when not provided.
    pub fn with_clock(mut self, clock: Box<dyn Clock + Send + Sync>) -> Self {
        self.clock = Some(clock);
        self
    }
}

// Setters that advance type-state
impl<G, R> SorterBuilder<Missing, G, R> {
    pub fn with_stepper(self, stepper: impl Stepper + 'static) -> SorterBuilder<Set, G, R> {
        let mut next = self.retag();
        next.stepper = Some(Box::new(stepper));
        next
    }
}

impl<S, R> SorterBuilder<S, Missing, R> {
    pub fn with_gate(self, servo: impl Servo + 'static) -> SorterBuilder<S, Set, R> {
        let mut next = self.retag();
        next.gate = Some(Box::new(servo));
        next
    }
}

impl<S, G> SorterBuilder<S, G, Missing> {
    pub fn with_rollers(
        self,
        left: impl Servo + 'static,
        right: impl Servo + 'static,
    ) -> SorterBuilder<S, G, Set> {
        let mut next = self.retag();
        next.rollers = Some((Box::new(left), Box::new(right)));
        next
    }
}

impl SorterBuilder<Set, Set, Set> {
    /// Validate and build the Sorter. Only available when every device is set.
    pub fn build(self) -> Result<Sorter> {
        self.try_build()
    }
}
