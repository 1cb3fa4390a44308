//! Shared rig for sorter integration tests: simulated devices with probes,
//! a deterministic clock and a scripted host that can answer captures.
#![allow(dead_code)]

use sorter_core::mocks::ScriptedLink;
use sorter_core::runner::tick;
use sorter_core::{CarouselCfg, DefectEjector, SortState, SortStatus, Sorter, TimingCfg};
use sorter_hardware::{ServoProbe, SimulatedServo, SimulatedStepper, StepperProbe};
use sorter_traits::clock::test_clock::TestClock;

pub const GATE_OPEN_US: u16 = 1900;

pub fn fast_timing() -> TimingCfg {
    TimingCfg {
        feed_run_ms: 10,
        settle_ms: 5,
        response_timeout_ms: 100,
        gate_open_ms: 20,
        loop_period_ms: 1,
    }
}

type Responder = Box<dyn FnMut(u32) -> Option<u8>>;

pub struct Rig {
    pub sorter: Sorter,
    pub link: ScriptedLink,
    pub clock: TestClock,
    pub stepper: StepperProbe,
    pub gate: ServoProbe,
    pub left: ServoProbe,
    pub right: ServoProbe,
    /// Every line the controller sent, in order.
    pub sent: Vec<String>,
    /// Set once the gate has been seen at its open width.
    pub gate_opened: bool,
    responder: Option<Responder>,
}

pub struct RigBuilder {
    carousel: CarouselCfg,
    timing: TimingCfg,
    ejector: Option<Box<dyn DefectEjector>>,
}

impl RigBuilder {
    pub fn carousel(mut self, c: CarouselCfg) -> Self {
        self.carousel = c;
        self
    }

    pub fn timing(mut self, t: TimingCfg) -> Self {
        self.timing = t;
        self
    }

    pub fn ejector(mut self, e: impl DefectEjector + 'static) -> Self {
        self.ejector = Some(Box::new(e));
        self
    }

    pub fn build(self) -> Rig {
        let clock = TestClock::new();
        let stepper = SimulatedStepper::new();
        let gate = SimulatedServo::new("gate");
        let left = SimulatedServo::new("roller_left");
        let right = SimulatedServo::new("roller_right");
        let (sp, gp, lp, rp) = (stepper.probe(), gate.probe(), left.probe(), right.probe());

        let mut b = Sorter::builder()
            .with_stepper(stepper)
            .with_gate(gate)
            .with_rollers(left, right)
            .with_carousel(self.carousel)
            .with_timing(self.timing)
            .with_clock(Box::new(clock.clone()));
        if let Some(e) = self.ejector {
            b = b.with_defect_ejector(e);
        }

        Rig {
            sorter: b.build().expect("rig builds"),
            link: ScriptedLink::new(),
            clock,
            stepper: sp,
            gate: gp,
            left: lp,
            right: rp,
            sent: Vec::new(),
            gate_opened: false,
            responder: None,
        }
    }
}

pub fn rig() -> RigBuilder {
    RigBuilder {
        carousel: CarouselCfg::default(),
        timing: fast_timing(),
        ejector: None,
    }
}

impl Rig {
    /// Answer future `CAP <id>` lines with `RES <id> <class>` when the
    /// closure returns a class; stay silent on `None`.
    pub fn respond_with(&mut self, f: impl FnMut(u32) -> Option<u8> + 'static) {
        self.responder = Some(Box::new(f));
    }

    pub fn send(&mut self, line: &str) {
        self.link.push(line);
    }

    /// One loop iteration followed by one millisecond of time.
    pub fn tick(&mut self) -> SortStatus {
        let status = tick(&mut self.sorter, &mut self.link).expect("tick");
        if self.gate.width_us() == Some(GATE_OPEN_US) {
            self.gate_opened = true;
        }
        for line in self.link.take_sent() {
            if let Some(id) = line
                .strip_prefix("CAP ")
                .and_then(|rest| rest.split_whitespace().next())
                .and_then(|id| id.parse::<u32>().ok())
                && let Some(f) = self.responder.as_mut()
                && let Some(class) = f(id)
            {
                self.link.push(format!("RES {id} {class}"));
            }
            self.sent.push(line);
        }
        self.clock.advance_ms(1);
        status
    }

    /// Tick until `pred` holds; panics after `limit` iterations.
    pub fn run_until(&mut self, limit: usize, mut pred: impl FnMut(&Rig) -> bool) {
        for _ in 0..limit {
            if pred(self) {
                return;
            }
            self.tick();
        }
        panic!(
            "condition not reached after {limit} ticks (state {:?})",
            self.sorter.state()
        );
    }

    /// `ZERO` from HomeWait, leaving the controller in Init.
    pub fn zero(&mut self) {
        self.send("ZERO");
        self.tick();
        assert_eq!(self.sorter.state(), SortState::Init);
    }

    pub fn in_state(&self, name: &str) -> bool {
        self.sorter.state().name() == name
    }

    pub fn has_sent(&self, line: &str) -> bool {
        self.sent.iter().any(|l| l == line)
    }
}
