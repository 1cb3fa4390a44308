//! `From` implementations bridging `sorter_config` types to `sorter_core` types.

use sorter_config::RotationDirection;
use sorter_traits::Direction;

use crate::config::{CalibrationCfg, CarouselCfg, DefectFlapCfg, GateCfg, RollerCfg, TimingCfg};

// ── CarouselCfg ──────────────────────────────────────────────────────────────

/// Map the file's rotation sense onto the stepper `Direction`.
pub fn direction_from(d: RotationDirection) -> Direction {
    match d {
        RotationDirection::Forward => Direction::Forward,
        RotationDirection::Reverse => Direction::Reverse,
    }
}

impl From<&sorter_config::CarouselCfg> for CarouselCfg {
    fn from(c: &sorter_config::CarouselCfg) -> Self {
        Self {
            slots: c.slots,
            steps_per_rev: c.steps_per_rev,
            direction: direction_from(c.direction),
            capture_position: c.capture_position,
            normal_eject_position: c.normal_eject_position,
            defect_eject_position: c.defect_eject_position,
        }
    }
}

// ── TimingCfg ────────────────────────────────────────────────────────────────

impl From<&sorter_config::TimingCfg> for TimingCfg {
    fn from(c: &sorter_config::TimingCfg) -> Self {
        Self {
            feed_run_ms: c.feed_run_ms,
            settle_ms: c.settle_ms,
            response_timeout_ms: c.response_timeout_ms,
            gate_open_ms: c.gate_open_ms,
            loop_period_ms: c.loop_period_ms,
        }
    }
}

// ── Actuators ────────────────────────────────────────────────────────────────

impl From<&sorter_config::GateCfg> for GateCfg {
    fn from(c: &sorter_config::GateCfg) -> Self {
        Self {
            open_us: c.open_us,
            closed_us: c.closed_us,
        }
    }
}

impl From<&sorter_config::RollerCfg> for RollerCfg {
    fn from(c: &sorter_config::RollerCfg) -> Self {
        Self {
            neutral_us: c.neutral_us,
            feed_speed: c.feed_speed,
            max_speed: c.max_speed,
        }
    }
}

impl From<&sorter_config::DefectEjectCfg> for DefectFlapCfg {
    fn from(c: &sorter_config::DefectEjectCfg) -> Self {
        Self {
            open_us: c.open_us,
            closed_us: c.closed_us,
            open_ms: c.open_ms,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&sorter_config::CalibrationCfg> for CalibrationCfg {
    fn from(c: &sorter_config::CalibrationCfg) -> Self {
        Self {
            zero_nudge_steps: c.zero_nudge_steps,
            jog_small_steps: c.jog_small_steps,
            jog_large_steps: c.jog_large_steps,
        }
    }
}
