use crate::error::{FaultKind, Report, Result as CoreResult};
use crate::fsm::Sorter;
use crate::status::SortStatus;
use sorter_traits::HostLink;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Why `run` returned without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// The shutdown flag was raised.
    Shutdown,
    /// `max_iterations` reached.
    IterationLimit,
}

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Stop after this many iterations (testing and bring-up).
    pub max_iterations: Option<u64>,
    /// Raised by a signal handler to stop the loop.
    pub shutdown: Option<Arc<AtomicBool>>,
}

impl RunOptions {
    fn shutdown_requested(&self) -> bool {
        self.shutdown
            .as_ref()
            .is_some_and(|f| f.load(Ordering::Relaxed))
    }
}

/// One control-loop iteration: at most one inbound line, then at most one
/// FSM step. An administrative command suppresses the step.
pub fn tick(sorter: &mut Sorter, link: &mut dyn HostLink) -> CoreResult<SortStatus> {
    if let Some(line) = link.poll_line()
        && sorter.handle_line(&line, link)?
    {
        return Ok(sorter.status());
    }
    sorter.step(link)
}

/// Run the control loop until shutdown, the iteration limit, or a fault.
///
/// A latched fault is returned as an error. A device error latches
/// `FaultKind::Device` (actuators parked best-effort) and is returned.
/// On a clean stop the actuators are parked before returning.
pub fn run(
    sorter: &mut Sorter,
    link: &mut dyn HostLink,
    opts: &RunOptions,
) -> CoreResult<RunOutcome> {
    let period = Duration::from_millis(sorter.timing_cfg().loop_period_ms);
    let clock = sorter.clock().clone();
    let mut iterations: u64 = 0;
    let started = clock.now();
    tracing::info!(
        slots = sorter.carousel_cfg().slots,
        period_ms = period.as_millis() as u64,
        "control loop start"
    );

    let outcome = loop {
        if opts.shutdown_requested() {
            break RunOutcome::Shutdown;
        }
        if opts.max_iterations.is_some_and(|max| iterations >= max) {
            break RunOutcome::IterationLimit;
        }
        iterations += 1;

        match tick(sorter, link) {
            Ok(SortStatus::Idle | SortStatus::Running) => {}
            Ok(SortStatus::Faulted(e)) => {
                tracing::error!(error = %e, iterations, "control loop stopped on fault");
                return Err(Report::new(e));
            }
            Err(e) => {
                sorter.latch_fault(FaultKind::Device);
                tracing::error!(error = %e, iterations, "control loop stopped on device error");
                return Err(e);
            }
        }
        clock.sleep(period);
    };

    if let Err(e) = sorter.park_actuators() {
        tracing::warn!(error = %e, "parking actuators on stop failed");
    }
    let stats = sorter.stats();
    tracing::info!(
        ?outcome,
        iterations,
        elapsed_ms = clock.ms_since(started),
        fed = stats.fed,
        "control loop stop"
    );
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::ScriptedLink;
    use sorter_hardware::{SimulatedServo, SimulatedStepper};
    use sorter_traits::clock::test_clock::TestClock;

    fn sorter(clock: TestClock) -> Sorter {
        Sorter::builder()
            .with_stepper(SimulatedStepper::new())
            .with_gate(SimulatedServo::new("gate"))
            .with_rollers(SimulatedServo::new("l"), SimulatedServo::new("r"))
            .with_clock(Box::new(clock))
            .build()
            .unwrap()
    }

    #[test]
    fn command_suppresses_the_fsm_step() {
        let mut s = sorter(TestClock::new());
        let mut link = ScriptedLink::new();
        link.push("ZERO");
        assert!(matches!(tick(&mut s, &mut link).unwrap(), SortStatus::Running));
        // ZERO moved us to Init but Init itself has not run yet.
        assert_eq!(s.state(), crate::fsm::SortState::Init);
        assert_eq!(link.sent(), ["move_complete"]);
    }

    #[test]
    fn stops_at_iteration_limit() {
        let clock = TestClock::new();
        let mut s = sorter(clock.clone());
        let mut link = ScriptedLink::new();
        let opts = RunOptions {
            max_iterations: Some(10),
            shutdown: None,
        };
        assert_eq!(run(&mut s, &mut link, &opts).unwrap(), RunOutcome::IterationLimit);
        // default loop period is 2 ms
        assert_eq!(clock.elapsed(), Duration::from_millis(20));
    }

    #[test]
    fn raised_flag_stops_before_first_tick() {
        let mut s = sorter(TestClock::new());
        let mut link = ScriptedLink::new();
        link.push("ZERO");
        let opts = RunOptions {
            max_iterations: None,
            shutdown: Some(Arc::new(AtomicBool::new(true))),
        };
        assert_eq!(run(&mut s, &mut link, &opts).unwrap(), RunOutcome::Shutdown);
        assert_eq!(link.pending_inbound(), 1);
    }
}
