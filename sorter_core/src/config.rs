//! Configuration types for the sorting controller.
//!
//! These are the runtime configuration structs used by `Sorter`.
//! They are separate from the TOML-deserialized config in `sorter_config`.

use sorter_traits::Direction;

/// Carousel geometry and logical station positions.
#[derive(Debug, Clone)]
pub struct CarouselCfg {
    /// Number of slots on the ring (N).
    pub slots: usize,
    /// Stepper pulses for one full revolution.
    pub steps_per_rev: u32,
    /// Stepper direction that moves beans downstream.
    pub direction: Direction,
    /// Logical position where a classification is requested.
    pub capture_position: usize,
    /// Logical position where the gate releases Normal beans.
    pub normal_eject_position: usize,
    /// Logical position where remaining terminal beans leave the ring.
    pub defect_eject_position: usize,
}

impl Default for CarouselCfg {
    fn default() -> Self {
        Self {
            slots: 24,
            steps_per_rev: 3200,
            direction: Direction::Forward,
            capture_position: 2,
            normal_eject_position: 8,
            defect_eject_position: 11,
        }
    }
}

/// Deadlines for every timed state, in milliseconds.
#[derive(Debug, Clone)]
pub struct TimingCfg {
    pub feed_run_ms: u64,
    /// Pause after feeding before the carousel moves.
    pub settle_ms: u64,
    /// How long to wait for `RES` before defaulting to Defect.
    pub response_timeout_ms: u64,
    pub gate_open_ms: u64,
    /// Control-loop sleep between iterations.
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

/// Gate servo pulse widths.
#[derive(Debug, Clone)]
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

/// Feed roller drive parameters (offsets are in microseconds from neutral).
#[derive(Debug, Clone)]
pub struct RollerCfg {
    pub neutral_us: u16,
    pub feed_speed: u16,
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

/// Manual alignment motion sizes.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
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

/// Servo flap used by the actuated defect ejector.
#[derive(Debug, Clone)]
pub struct DefectFlapCfg {
    pub open_us: u16,
    pub closed_us: u16,
    /// How long the flap stays open after an eject.
    pub open_ms: u64,
}

impl Default for DefectFlapCfg {
    fn default() -> Self {
        Self {
            open_us: 1900,
            closed_us: 1100,
            open_ms: 300,
        }
    }
}
