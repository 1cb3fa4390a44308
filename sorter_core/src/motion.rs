//! Carousel stepping.
//!
//! One revolution rarely divides evenly into slots (3200 steps over 24 slots
//! is 133.33 steps per cell). `MotionController` spreads the remainder with a
//! Bresenham-style accumulator so that any N consecutive cells add up to
//! exactly `steps_per_rev`, and the ring never drifts against the frame.

use eyre::WrapErr;
use sorter_traits::{Direction, Stepper};
use tracing::trace;

use crate::error::Result;
use crate::hw_error::device_report;
use crate::slot_ring::SlotRing;

pub struct MotionController {
    stepper: Box<dyn Stepper>,
    slots: u32,
    steps_per_rev: u32,
    direction: Direction,
    accumulator: u32,
}

impl core::fmt::Debug for MotionController {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("MotionController")
            .field("slots", &self.slots)
            .field("steps_per_rev", &self.steps_per_rev)
            .field("direction", &self.direction)
            .field("accumulator", &self.accumulator)
            .finish()
    }
}

impl MotionController {
    /// `slots` must be non-zero; the builder validates this.
    pub fn new(
        stepper: Box<dyn Stepper>,
        slots: u32,
        steps_per_rev: u32,
        direction: Direction,
    ) -> Self {
        Self {
            stepper,
            slots: slots.max(1),
            steps_per_rev,
            direction,
            accumulator: 0,
        }
    }

    /// Current remainder accumulator (always `< slots`).
    pub fn accumulator(&self) -> u32 {
        self.accumulator
    }

    /// Step count for the next cell, advancing the accumulator.
    pub(crate) fn next_cell_steps(&mut self) -> u32 {
        let base = self.steps_per_rev / self.slots;
        let rem = self.steps_per_rev % self.slots;
        self.accumulator += rem;
        if self.accumulator >= self.slots {
            self.accumulator -= self.slots;
            base + 1
        } else {
            base
        }
    }

    /// Rotate the carousel by exactly one cell and update the ring mapping.
    /// Blocks for the duration of the pulse train. Returns the steps issued.
    pub fn advance_one_cell(&mut self, ring: &mut SlotRing) -> Result<u32> {
        let steps = self.next_cell_steps();
        self.stepper
            .set_direction(self.direction)
            .map_err(device_report)
            .wrap_err("stepper direction")?;
        self.stepper
            .pulse(steps)
            .map_err(device_report)
            .wrap_err("advance one cell")?;
        ring.advance_cell();
        trace!(steps, head = ring.head(), acc = self.accumulator, "cell advanced");
        Ok(steps)
    }

    /// Uncounted pulses for manual alignment; leaves head and accumulator alone.
    /// `Direction::Forward` means the production direction.
    pub fn raw_pulses(&mut self, dir: Direction, steps: u32) -> Result<()> {
        let physical = match dir {
            Direction::Forward => self.direction,
            Direction::Reverse => self.direction.reversed(),
        };
        self.stepper
            .set_direction(physical)
            .map_err(device_report)
            .wrap_err("stepper direction")?;
        self.stepper
            .pulse(steps)
            .map_err(device_report)
            .wrap_err("raw pulses")
    }

    /// Forget the accumulated remainder (full re-alignment).
    pub fn realign(&mut self) {
        self.accumulator = 0;
    }

    pub fn enable(&mut self) -> Result<()> {
        self.stepper
            .enable()
            .map_err(device_report)
            .wrap_err("stepper enable")
    }

    pub fn disable(&mut self) -> Result<()> {
        self.stepper
            .disable()
            .map_err(device_report)
            .wrap_err("stepper disable")
    }
}
