//! Gate and feed-roller actuators.
//!
//! Both are fire-and-forget: a command returns as soon as the servo has been
//! told where to go. Callers own the settle timing.

use eyre::WrapErr;
use sorter_traits::Servo;
use tracing::debug;

use crate::config::{GateCfg, RollerCfg};
use crate::error::Result;
use crate::hw_error::device_report;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatePosition {
    Closed,
    Open,
}

/// Normal-eject gate.
pub struct GateActuator {
    servo: Box<dyn Servo>,
    cfg: GateCfg,
    last: Option<GatePosition>,
}

impl core::fmt::Debug for GateActuator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("GateActuator")
            .field("cfg", &self.cfg)
            .field("last", &self.last)
            .finish()
    }
}

impl GateActuator {
    pub fn new(servo: Box<dyn Servo>, cfg: GateCfg) -> Self {
        Self {
            servo,
            cfg,
            last: None,
        }
    }

    /// Last commanded position, `None` before the first command.
    pub fn position(&self) -> Option<GatePosition> {
        self.last
    }

    pub fn open(&mut self) -> Result<()> {
        self.command(GatePosition::Open)
    }

    pub fn close(&mut self) -> Result<()> {
        self.command(GatePosition::Closed)
    }

    fn command(&mut self, pos: GatePosition) -> Result<()> {
        let width = match pos {
            GatePosition::Open => self.cfg.open_us,
            GatePosition::Closed => self.cfg.closed_us,
        };
        self.servo
            .set_pulse_us(width)
            .map_err(device_report)
            .wrap_err("gate servo")?;
        if self.last != Some(pos) {
            debug!(?pos, width, "gate");
        }
        self.last = Some(pos);
        Ok(())
    }
}

/// Differential pair of continuous-rotation servos feeding beans onto the ring.
///
/// The servos face each other, so equal and opposite offsets from neutral
/// turn both rollers toward the carousel.
pub struct RollerActuator {
    left: Box<dyn Servo>,
    right: Box<dyn Servo>,
    cfg: RollerCfg,
    speed: u16,
}

impl core::fmt::Debug for RollerActuator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RollerActuator")
            .field("cfg", &self.cfg)
            .field("speed", &self.speed)
            .finish()
    }
}

impl RollerActuator {
    pub fn new(left: Box<dyn Servo>, right: Box<dyn Servo>, cfg: RollerCfg) -> Self {
        Self {
            left,
            right,
            cfg,
            speed: 0,
        }
    }

    /// Current speed offset (0 = stopped).
    pub fn speed(&self) -> u16 {
        self.speed
    }

    /// Run at the configured feed speed.
    pub fn feed(&mut self) -> Result<()> {
        self.run(self.cfg.feed_speed)
    }

    /// Run forward at `speed`, clamped to `max_speed`.
    pub fn run(&mut self, speed: u16) -> Result<()> {
        let s = speed.min(self.cfg.max_speed);
        let left = self.cfg.neutral_us.saturating_add(s);
        let right = self.cfg.neutral_us.saturating_sub(s);
        self.write(left, right)?;
        self.speed = s;
        Ok(())
    }

    /// Neutral on both drives.
    pub fn stop(&mut self) -> Result<()> {
        self.write(self.cfg.neutral_us, self.cfg.neutral_us)?;
        self.speed = 0;
        Ok(())
    }

    fn write(&mut self, left_us: u16, right_us: u16) -> Result<()> {
        self.left
            .set_pulse_us(left_us)
            .map_err(device_report)
            .wrap_err("left roller")?;
        self.right
            .set_pulse_us(right_us)
            .map_err(device_report)
            .wrap_err("right roller")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter_hardware::SimulatedServo;

    #[test]
    fn gate_maps_positions_to_widths() {
        let servo = SimulatedServo::new("gate");
        let probe = servo.probe();
        let mut gate = GateActuator::new(Box::new(servo), GateCfg::default());
        gate.open().unwrap();
        assert_eq!(probe.width_us(), Some(1900));
        assert_eq!(gate.position(), Some(GatePosition::Open));
        gate.close().unwrap();
        assert_eq!(probe.width_us(), Some(1100));
    }

    #[test]
    fn rollers_are_symmetric_and_clamped() {
        let (l, r) = (SimulatedServo::new("l"), SimulatedServo::new("r"));
        let (lp, rp) = (l.probe(), r.probe());
        let mut rollers = RollerActuator::new(Box::new(l), Box::new(r), RollerCfg::default());

        rollers.feed().unwrap();
        assert_eq!((lp.width_us(), rp.width_us()), (Some(1700), Some(1300)));

        rollers.run(1000).unwrap();
        assert_eq!(rollers.speed(), 400);
        assert_eq!((lp.width_us(), rp.width_us()), (Some(1900), Some(1100)));

        rollers.stop().unwrap();
        assert_eq!(rollers.speed(), 0);
        assert_eq!((lp.width_us(), rp.width_us()), (Some(1500), Some(1500)));
    }
}
