//! Defect ejection strategies.
//!
//! At the defect position every terminal bean leaves the ring. Some builds
//! let beans fall through an open channel, others push them out with a
//! servo flap. Both are driven from the FSM without blocking: `eject` starts
//! the action and `service` is called on every step to finish it.

use std::time::{Duration, Instant};

use eyre::WrapErr;
use sorter_traits::Servo;
use tracing::debug;

use crate::config::DefectFlapCfg;
use crate::error::Result;
use crate::hw_error::device_report;

pub trait DefectEjector {
    /// Begin ejecting the bean currently at the defect position.
    fn eject(&mut self, now: Instant) -> Result<()>;
    /// Advance any in-flight action.
    fn service(&mut self, now: Instant) -> Result<()>;
    /// Move to the rest position immediately.
    fn park(&mut self) -> Result<()>;
}

impl<T: DefectEjector + ?Sized> DefectEjector for Box<T> {
    fn eject(&mut self, now: Instant) -> Result<()> {
        (**self).eject(now)
    }
    fn service(&mut self, now: Instant) -> Result<()> {
        (**self).service(now)
    }
    fn park(&mut self) -> Result<()> {
        (**self).park()
    }
}

/// Beans drop out of the ring on their own.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassiveDrop;

impl DefectEjector for PassiveDrop {
    fn eject(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }
    fn service(&mut self, _now: Instant) -> Result<()> {
        Ok(())
    }
    fn park(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Servo flap that opens on eject and closes after `open_ms`.
pub struct ActuatedFlap {
    servo: Box<dyn Servo>,
    cfg: DefectFlapCfg,
    close_at: Option<Instant>,
}

impl core::fmt::Debug for ActuatedFlap {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ActuatedFlap")
            .field("cfg", &self.cfg)
            .field("close_at", &self.close_at)
            .finish()
    }
}

impl ActuatedFlap {
    pub fn new(servo: Box<dyn Servo>, cfg: DefectFlapCfg) -> Self {
        Self {
            servo,
            cfg,
            close_at: None,
        }
    }

    pub fn is_open(&self) -> bool {
        self.close_at.is_some()
    }

    fn write(&mut self, width: u16) -> Result<()> {
        self.servo
            .set_pulse_us(width)
            .map_err(device_report)
            .wrap_err("defect flap servo")
    }
}

impl DefectEjector for ActuatedFlap {
    fn eject(&mut self, now: Instant) -> Result<()> {
        self.write(self.cfg.open_us)?;
        // A second eject while open just pushes the deadline out.
        self.close_at = Some(now + Duration::from_millis(self.cfg.open_ms));
        debug!(open_ms = self.cfg.open_ms, "defect flap open");
        Ok(())
    }

    fn service(&mut self, now: Instant) -> Result<()> {
        if let Some(at) = self.close_at
            && now >= at
        {
            self.write(self.cfg.closed_us)?;
            self.close_at = None;
            debug!("defect flap closed");
        }
        Ok(())
    }

    fn park(&mut self) -> Result<()> {
        self.close_at = None;
        self.write(self.cfg.closed_us)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sorter_hardware::SimulatedServo;

    #[test]
    fn flap_closes_only_after_deadline() {
        let servo = SimulatedServo::new("flap");
        let probe = servo.probe();
        let mut flap = ActuatedFlap::new(Box::new(servo), DefectFlapCfg::default());
        let t0 = Instant::now();

        flap.eject(t0).unwrap();
        assert_eq!(probe.width_us(), Some(1900));
        flap.service(t0 + Duration::from_millis(299)).unwrap();
        assert!(flap.is_open());
        flap.service(t0 + Duration::from_millis(300)).unwrap();
        assert!(!flap.is_open());
        assert_eq!(probe.width_us(), Some(1100));
    }

    #[test]
    fn park_closes_immediately() {
        let servo = SimulatedServo::new("flap");
        let probe = servo.probe();
        let mut flap = ActuatedFlap::new(Box::new(servo), DefectFlapCfg::default());
        flap.eject(Instant::now()).unwrap();
        flap.park().unwrap();
        assert!(!flap.is_open());
        assert_eq!(probe.width_us(), Some(1100));
    }

    #[test]
    fn passive_drop_never_fails() {
        let mut p = PassiveDrop;
        let now = Instant::now();
        assert!(p.eject(now).is_ok());
        assert!(p.service(now).is_ok());
        assert!(p.park().is_ok());
    }
}
