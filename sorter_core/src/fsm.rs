//! The sorting state machine (`Sorter`).
//!
//! One `step` performs at most one transition. Every wait is a deadline held
//! in the state variant and compared against the injected clock, so inbound
//! lines keep flowing while the carousel waits on feeding, classification or
//! the gate. Only the per-cell pulse train blocks.

use std::sync::Arc;
use std::time::{Duration, Instant};

use eyre::WrapErr;
use sorter_traits::clock::Clock;
use sorter_traits::{Direction, HostLink};
use tracing::{debug, error, info, warn};

use crate::actuators::{GateActuator, RollerActuator};
use crate::config::{CalibrationCfg, CarouselCfg, TimingCfg};
use crate::eject::DefectEjector;
use crate::error::{FaultKind, Result, SorterError};
use crate::hw_error::device_report;
use crate::motion::MotionController;
use crate::protocol::{AdminCommand, Classification, Inbound, Outbound, parse_line};
use crate::slot_ring::{BeanId, BeanState, SlotRing};
use crate::status::SortStatus;

/// Controller state. Timed states carry their own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortState {
    /// Waiting for `ZERO` (or `JOG` alignment). Initial state.
    HomeWait,
    Init,
    FeedStart,
    FeedWait { until: Instant },
    StepOneCell { until: Instant },
    CheckCapture,
    WaitResult { bean: BeanId, until: Instant },
    CheckEject,
    EjectOpen,
    EjectCloseWait { until: Instant },
    /// Terminal. Only a restart leaves it.
    Error(FaultKind),
}

impl SortState {
    pub fn name(&self) -> &'static str {
        match self {
            SortState::HomeWait => "HomeWait",
            SortState::Init => "Init",
            SortState::FeedStart => "FeedStart",
            SortState::FeedWait { .. } => "FeedWait",
            SortState::StepOneCell { .. } => "StepOneCell",
            SortState::CheckCapture => "CheckCapture",
            SortState::WaitResult { .. } => "WaitResult",
            SortState::CheckEject => "CheckEject",
            SortState::EjectOpen => "EjectOpen",
            SortState::EjectCloseWait { .. } => "EjectCloseWait",
            SortState::Error(_) => "Error",
        }
    }
}

/// Counters since construction.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SortStats {
    pub fed: u64,
    pub captures: u64,
    pub results: u64,
    pub timeouts: u64,
    pub normal_ejects: u64,
    pub defect_ejects: u64,
}

pub struct Sorter {
    pub(crate) ring: SlotRing,
    pub(crate) motion: MotionController,
    pub(crate) gate: GateActuator,
    pub(crate) rollers: RollerActuator,
    pub(crate) ejector: Box<dyn DefectEjector>,
    pub(crate) clock: Arc<dyn Clock + Send + Sync>,
    pub(crate) carousel: CarouselCfg,
    pub(crate) timing: TimingCfg,
    pub(crate) calibration: CalibrationCfg,
    pub(crate) state: SortState,
    pub(crate) stats: SortStats,
}

impl core::fmt::Debug for Sorter {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Sorter")
            .field("state", &self.state)
            .field("head", &self.ring.head())
            .field("pending", &self.ring.pending())
            .field("stats", &self.stats)
            .finish()
    }
}

impl Sorter {
    pub fn state(&self) -> SortState {
        self.state
    }

    pub fn ring(&self) -> &SlotRing {
        &self.ring
    }

    pub fn motion(&self) -> &MotionController {
        &self.motion
    }

    pub fn gate(&self) -> &GateActuator {
        &self.gate
    }

    pub fn rollers(&self) -> &RollerActuator {
        &self.rollers
    }

    pub fn stats(&self) -> SortStats {
        self.stats
    }

    pub fn carousel_cfg(&self) -> &CarouselCfg {
        &self.carousel
    }

    pub fn timing_cfg(&self) -> &TimingCfg {
        &self.timing
    }

    /// Status implied by the current state, without stepping.
    pub fn status(&self) -> SortStatus {
        match self.state {
            SortState::HomeWait => SortStatus::Idle,
            SortState::Error(kind) => SortStatus::Faulted(SorterError::Fault(kind)),
            _ => SortStatus::Running,
        }
    }

    /// The latched fault, if any.
    pub fn fault(&self) -> Option<FaultKind> {
        match self.state {
            SortState::Error(kind) => Some(kind),
            _ => None,
        }
    }

    pub(crate) fn clock(&self) -> &Arc<dyn Clock + Send + Sync> {
        &self.clock
    }

    /// Feed one inbound line. Returns `true` when the line was an
    /// administrative command, which suppresses this iteration's FSM step.
    pub fn handle_line(&mut self, line: &str, link: &mut dyn HostLink) -> Result<bool> {
        match parse_line(line) {
            Ok(Inbound::Command(cmd)) => {
                self.handle_command(cmd, link)?;
                Ok(true)
            }
            Ok(Inbound::Result { bean, class }) => {
                self.on_result(bean, class);
                Ok(false)
            }
            Err(e) => {
                debug!(line, error = %e, "discarding inbound line");
                Ok(false)
            }
        }
    }

    /// Apply an administrative command.
    ///
    /// `HOME` works from any state except `Error`. `ZERO` and `JOG` are only
    /// honored in `HomeWait`; elsewhere they are ignored.
    pub fn handle_command(&mut self, cmd: AdminCommand, link: &mut dyn HostLink) -> Result<()> {
        match cmd {
            AdminCommand::Home => {
                if let SortState::Error(kind) = self.state {
                    warn!(%kind, "HOME ignored while faulted");
                    return Ok(());
                }
                self.rollers.stop()?;
                self.gate.close()?;
                self.ejector.park()?;
                if let Some(bean) = self.ring.take_pending() {
                    info!(bean = bean.get(), "HOME dropped outstanding capture request");
                }
                self.transition(SortState::HomeWait);
                send(link, Outbound::MoveComplete)?;
            }
            AdminCommand::Zero => {
                if !self.in_home_wait("ZERO") {
                    return Ok(());
                }
                let nudge = self.calibration.zero_nudge_steps;
                self.motion.enable()?;
                self.motion
                    .raw_pulses(Direction::Forward, nudge)
                    .wrap_err("zero nudge forward")?;
                self.motion
                    .raw_pulses(Direction::Reverse, nudge)
                    .wrap_err("zero nudge reverse")?;
                self.ring.reset();
                self.motion.realign();
                info!(nudge, "carousel zeroed");
                self.transition(SortState::Init);
                send(link, Outbound::MoveComplete)?;
            }
            AdminCommand::Jog(mv) => {
                if !self.in_home_wait("JOG") {
                    return Ok(());
                }
                let (dir, steps) = mv.resolve(&self.calibration);
                self.motion.enable()?;
                self.motion.raw_pulses(dir, steps).wrap_err("jog")?;
                debug!(?dir, steps, "jog");
                send(link, Outbound::MoveComplete)?;
            }
        }
        Ok(())
    }

    fn in_home_wait(&self, what: &'static str) -> bool {
        let ok = self.state == SortState::HomeWait;
        if !ok {
            warn!(command = what, state = self.state.name(), "command ignored outside HomeWait");
        }
        ok
    }

    /// Apply a classification from the host.
    ///
    /// Only the pending bean is accepted, and only while waiting for it.
    /// Anything else leaves the ring and the pending request untouched.
    pub fn on_result(&mut self, bean: BeanId, class: Classification) {
        let waiting = matches!(self.state, SortState::WaitResult { bean: b, .. } if b == bean);
        if !waiting || self.ring.pending() != Some(bean) {
            debug!(bean = bean.get(), ?class, "discarding result for non-pending bean");
            return;
        }
        let next = match class {
            Classification::Normal => BeanState::Normal,
            Classification::Defect => BeanState::Defect,
        };
        match self.ring.set_state_of(bean, next) {
            Ok(pos) => info!(bean = bean.get(), pos, ?class, "bean classified"),
            Err(e) => warn!(bean = bean.get(), error = %e, "classification not applied"),
        }
        self.ring.take_pending();
        self.stats.results += 1;
        self.transition(SortState::CheckEject);
    }

    /// One FSM step. Device failures surface as errors; the caller decides
    /// whether to latch them with [`Sorter::latch_fault`].
    pub fn step(&mut self, link: &mut dyn HostLink) -> Result<SortStatus> {
        let now = self.clock.now();
        if !matches!(self.state, SortState::Error(_)) {
            self.ejector.service(now)?;
        }

        match self.state {
            SortState::HomeWait => return Ok(SortStatus::Idle),
            SortState::Init => {
                self.motion.enable()?;
                self.park_actuators()?;
                self.transition(SortState::FeedStart);
            }
            SortState::FeedStart => {
                self.rollers.feed()?;
                let until = now + ms(self.timing.feed_run_ms);
                self.transition(SortState::FeedWait { until });
            }
            SortState::FeedWait { until } => {
                if now < until {
                    return Ok(SortStatus::Running);
                }
                self.rollers.stop()?;
                match self.ring.insert_new(0) {
                    Ok(bean) => {
                        self.stats.fed += 1;
                        info!(bean = bean.get(), pos = 0, "bean fed");
                        let until = now + ms(self.timing.settle_ms);
                        self.transition(SortState::StepOneCell { until });
                    }
                    Err(e) => {
                        error!(error = %e, "feed position occupied");
                        return Ok(self.enter_error(FaultKind::FeedSlotOccupied));
                    }
                }
            }
            SortState::StepOneCell { until } => {
                if now < until {
                    return Ok(SortStatus::Running);
                }
                let steps = self.motion.advance_one_cell(&mut self.ring)?;
                debug!(steps, head = self.ring.head(), "carousel advanced");
                self.transition(SortState::CheckCapture);
            }
            SortState::CheckCapture => self.check_capture(now, link)?,
            SortState::WaitResult { bean, until } => {
                if now < until {
                    return Ok(SortStatus::Running);
                }
                match self.ring.set_state_of(bean, BeanState::Defect) {
                    Ok(pos) => warn!(bean = bean.get(), pos, "classification timed out, defaulting to defect"),
                    Err(e) => warn!(bean = bean.get(), error = %e, "timed-out bean not updated"),
                }
                self.ring.take_pending();
                self.stats.timeouts += 1;
                self.transition(SortState::CheckEject);
            }
            SortState::CheckEject => self.check_eject(now)?,
            SortState::EjectOpen => {
                self.gate.open()?;
                let until = now + ms(self.timing.gate_open_ms);
                self.transition(SortState::EjectCloseWait { until });
            }
            SortState::EjectCloseWait { until } => {
                if now < until {
                    return Ok(SortStatus::Running);
                }
                self.gate.close()?;
                let pos = self.carousel.normal_eject_position;
                let slot = self.ring.clear(pos);
                if let Some(bean) = slot.bean {
                    self.stats.normal_ejects += 1;
                    info!(bean = bean.get(), pos, "normal bean ejected");
                }
                self.transition(SortState::FeedStart);
            }
            SortState::Error(kind) => return Ok(SortStatus::Faulted(SorterError::Fault(kind))),
        }
        Ok(SortStatus::Running)
    }

    fn check_capture(&mut self, now: Instant, link: &mut dyn HostLink) -> Result<()> {
        let pos = self.carousel.capture_position;
        let slot = self.ring.get(pos);
        let (Some(bean), BeanState::Entered) = (slot.bean, slot.state) else {
            self.transition(SortState::CheckEject);
            return Ok(());
        };
        self.ring
            .set_state(pos, BeanState::CaptureRequested)
            .map_err(|e| eyre::Report::new(SorterError::State(e.to_string())))?;
        self.ring.set_pending(bean);
        self.stats.captures += 1;
        let until = now + ms(self.timing.response_timeout_ms);
        self.transition(SortState::WaitResult { bean, until });
        info!(bean = bean.get(), pos, "capture requested");
        send(link, Outbound::Capture { bean, position: pos })
    }

    fn check_eject(&mut self, now: Instant) -> Result<()> {
        let defect_pos = self.carousel.defect_eject_position;
        let slot = self.ring.get(defect_pos);
        if let Some(bean) = slot.bean
            && slot.state.is_terminal()
        {
            self.ejector.eject(now).wrap_err("defect eject")?;
            self.ring.clear(defect_pos);
            self.stats.defect_ejects += 1;
            info!(bean = bean.get(), pos = defect_pos, state = ?slot.state, "bean ejected at defect position");
        }

        let normal_pos = self.carousel.normal_eject_position;
        if self.ring.get(normal_pos).state == BeanState::Normal {
            self.transition(SortState::EjectOpen);
        } else {
            self.gate.close()?;
            self.transition(SortState::FeedStart);
        }
        Ok(())
    }

    /// Latch `kind` and park every actuator, best-effort.
    pub fn latch_fault(&mut self, kind: FaultKind) {
        if matches!(self.state, SortState::Error(_)) {
            return;
        }
        self.enter_error(kind);
    }

    fn enter_error(&mut self, kind: FaultKind) -> SortStatus {
        error!(%kind, state = self.state.name(), "entering fault state");
        if let Err(e) = self.motion.disable() {
            warn!(error = %e, "stepper disable failed on fault");
        }
        if let Err(e) = self.rollers.stop() {
            warn!(error = %e, "roller stop failed on fault");
        }
        if let Err(e) = self.gate.close() {
            warn!(error = %e, "gate close failed on fault");
        }
        if let Err(e) = self.ejector.park() {
            warn!(error = %e, "defect ejector park failed on fault");
        }
        self.state = SortState::Error(kind);
        SortStatus::Faulted(SorterError::Fault(kind))
    }

    /// Stop rollers, close the gate and park the defect ejector.
    pub fn park_actuators(&mut self) -> Result<()> {
        self.rollers.stop()?;
        self.gate.close()?;
        self.ejector.park()
    }

    fn transition(&mut self, next: SortState) {
        debug!(from = self.state.name(), to = next.name(), "transition");
        self.state = next;
    }
}

fn send(link: &mut dyn HostLink, msg: Outbound) -> Result<()> {
    link.send_line(&msg.to_string())
        .map_err(device_report)
        .wrap_err_with(|| format!("sending '{msg}'"))
}

#[inline]
fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedLink;
    use crate::runner::tick;
    use sorter_hardware::{SimulatedServo, SimulatedStepper};
    use sorter_traits::clock::test_clock::TestClock;

    #[test]
    fn occupied_feed_position_is_fatal() {
        let clock = TestClock::new();
        let stepper = SimulatedStepper::new();
        let stepper_p = stepper.probe();
        let left = SimulatedServo::new("l");
        let left_p = left.probe();
        let mut s = Sorter::builder()
            .with_stepper(stepper)
            .with_gate(SimulatedServo::new("gate"))
            .with_rollers(left, SimulatedServo::new("r"))
            .with_clock(Box::new(clock.clone()))
            .build()
            .unwrap();
        let mut link = ScriptedLink::new();
        link.push("ZERO");
        tick(&mut s, &mut link).unwrap(); // ZERO
        tick(&mut s, &mut link).unwrap(); // Init
        tick(&mut s, &mut link).unwrap(); // FeedStart
        assert!(matches!(s.state(), SortState::FeedWait { .. }));

        // something already sits in the feed cell
        s.ring.insert_new(0).unwrap();
        clock.advance_ms(s.timing.feed_run_ms);

        let status = s.step(&mut link).unwrap();
        assert!(matches!(
            status,
            SortStatus::Faulted(SorterError::Fault(FaultKind::FeedSlotOccupied))
        ));
        assert_eq!(s.fault(), Some(FaultKind::FeedSlotOccupied));
        assert!(!stepper_p.enabled());
        assert_eq!(left_p.width_us(), Some(1500));
        assert_eq!(s.stats().fed, 0);
    }

    #[test]
    fn result_outside_wait_result_is_ignored() {
        let mut s = Sorter::builder()
            .with_stepper(SimulatedStepper::new())
            .with_gate(SimulatedServo::new("gate"))
            .with_rollers(SimulatedServo::new("l"), SimulatedServo::new("r"))
            .with_clock(Box::new(TestClock::new()))
            .build()
            .unwrap();
        s.ring.insert_new(2).unwrap();
        s.ring.set_state(2, BeanState::CaptureRequested).unwrap();
        let bean = BeanId::new(1).unwrap();
        s.ring.set_pending(bean);

        // pending matches but the FSM is in HomeWait
        s.on_result(bean, Classification::Normal);
        assert_eq!(s.ring.get(2).state, BeanState::CaptureRequested);
        assert_eq!(s.ring.pending(), Some(bean));
        assert_eq!(s.state(), SortState::HomeWait);
    }

    #[test]
    fn state_names_are_stable() {
        assert_eq!(SortState::HomeWait.name(), "HomeWait");
        assert_eq!(SortState::Error(FaultKind::Device).name(), "Error");
    }
}
