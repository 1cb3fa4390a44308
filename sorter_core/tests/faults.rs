use std::cell::Cell;
use std::rc::Rc;

use sorter_core::mocks::ScriptedLink;
use sorter_core::runner::{self, RunOptions};
use sorter_core::{FaultKind, SortState, SortStatus, Sorter, SorterError};
use sorter_hardware::SimulatedServo;
use sorter_traits::clock::test_clock::TestClock;
use sorter_traits::{DeviceError, Direction, Stepper};

/// Stepper whose driver dies after a fixed number of pulse trains.
struct FlakyStepper {
    trains_left: u32,
    enabled: Rc<Cell<bool>>,
}

impl Stepper for FlakyStepper {
    fn enable(&mut self) -> Result<(), DeviceError> {
        self.enabled.set(true);
        Ok(())
    }
    fn disable(&mut self) -> Result<(), DeviceError> {
        self.enabled.set(false);
        Ok(())
    }
    fn set_direction(&mut self, _dir: Direction) -> Result<(), DeviceError> {
        Ok(())
    }
    fn pulse(&mut self, _steps: u32) -> Result<(), DeviceError> {
        if self.trains_left == 0 {
            return Err(Box::new(std::io::Error::other("driver fault pin asserted")));
        }
        self.trains_left -= 1;
        Ok(())
    }
}

#[test]
fn device_error_latches_fault_and_parks_everything() {
    let enabled = Rc::new(Cell::new(false));
    let gate = SimulatedServo::new("gate");
    let left = SimulatedServo::new("l");
    let (gate_p, left_p) = (gate.probe(), left.probe());
    let mut sorter = Sorter::builder()
        // two trains for the ZERO nudge, one for the first cell
        .with_stepper(FlakyStepper {
            trains_left: 3,
            enabled: enabled.clone(),
        })
        .with_gate(gate)
        .with_rollers(left, SimulatedServo::new("r"))
        .with_clock(Box::new(TestClock::new()))
        .build()
        .unwrap();
    let mut link = ScriptedLink::new();
    link.push("ZERO");

    let err = runner::run(&mut sorter, &mut link, &RunOptions::default()).unwrap_err();
    assert!(format!("{err:#}").contains("driver fault pin asserted"));
    assert_eq!(sorter.state(), SortState::Error(FaultKind::Device));
    assert_eq!(sorter.fault(), Some(FaultKind::Device));
    assert!(!enabled.get());
    assert_eq!(gate_p.width_us(), Some(1100));
    assert_eq!(left_p.width_us(), Some(1500));
    assert_eq!(sorter.stats().fed, 2);
}

#[test]
fn error_state_is_terminal() {
    let mut sorter = Sorter::builder()
        .with_stepper(FlakyStepper {
            trains_left: 0,
            enabled: Rc::new(Cell::new(false)),
        })
        .with_gate(SimulatedServo::new("gate"))
        .with_rollers(SimulatedServo::new("l"), SimulatedServo::new("r"))
        .with_clock(Box::new(TestClock::new()))
        .build()
        .unwrap();
    let mut link = ScriptedLink::new();
    link.push("ZERO");
    assert!(runner::run(&mut sorter, &mut link, &RunOptions::default()).is_err());
    assert!(link.sent().is_empty());

    for line in ["HOME", "ZERO", "JOG d"] {
        link.push(line);
        let status = runner::tick(&mut sorter, &mut link).unwrap();
        assert!(matches!(
            status,
            SortStatus::Faulted(SorterError::Fault(FaultKind::Device))
        ));
    }
    assert_eq!(sorter.state(), SortState::Error(FaultKind::Device));
    assert!(link.sent().is_empty());

    // stepping a faulted sorter keeps reporting the fault
    let status = sorter.step(&mut link).unwrap();
    assert!(matches!(status, SortStatus::Faulted(_)));
}
