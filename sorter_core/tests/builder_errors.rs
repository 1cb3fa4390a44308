use rstest::rstest;
use sorter_core::error::BuildError;
use sorter_core::{CarouselCfg, GateCfg, RollerCfg, SortState, Sorter, TimingCfg};
use sorter_hardware::{SimulatedServo, SimulatedStepper};

#[rstest]
fn missing_stepper_yields_typed_build_error() {
    let err = Sorter::builder()
        // missing with_stepper()
        .with_gate(SimulatedServo::new("gate"))
        .with_rollers(SimulatedServo::new("l"), SimulatedServo::new("r"))
        .try_build()
        .expect_err("should fail with MissingStepper");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingStepper) => {}
        other => panic!("expected MissingStepper, got: {other:?}"),
    }
}

#[rstest]
fn missing_gate_and_rollers_are_reported() {
    let err = Sorter::builder()
        .with_stepper(SimulatedStepper::new())
        .try_build()
        .expect_err("no gate");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingGate)
    ));

    let err = Sorter::builder()
        .with_stepper(SimulatedStepper::new())
        .with_gate(SimulatedServo::new("gate"))
        .try_build()
        .expect_err("no rollers");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::MissingRollers)
    ));
}

fn build_with(carousel: CarouselCfg, timing: TimingCfg, gate: GateCfg, rollers: RollerCfg) -> eyre::Result<Sorter> {
    Sorter::builder()
        .with_stepper(SimulatedStepper::new())
        .with_gate(SimulatedServo::new("gate"))
        .with_rollers(SimulatedServo::new("l"), SimulatedServo::new("r"))
        .with_carousel(carousel)
        .with_timing(timing)
        .with_gate_cfg(gate)
        .with_roller_cfg(rollers)
        .build()
}

#[rstest]
#[case::one_slot(CarouselCfg { slots: 1, ..CarouselCfg::default() })]
#[case::fewer_steps_than_slots(CarouselCfg { steps_per_rev: 10, ..CarouselCfg::default() })]
#[case::capture_at_feed(CarouselCfg { capture_position: 0, ..CarouselCfg::default() })]
#[case::normal_before_capture(CarouselCfg { normal_eject_position: 2, ..CarouselCfg::default() })]
#[case::defect_before_normal(CarouselCfg { defect_eject_position: 5, ..CarouselCfg::default() })]
#[case::defect_off_ring(CarouselCfg { defect_eject_position: 24, ..CarouselCfg::default() })]
fn invalid_geometry_is_rejected(#[case] carousel: CarouselCfg) {
    let err = build_with(carousel, TimingCfg::default(), GateCfg::default(), RollerCfg::default())
        .expect_err("geometry must be rejected");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

#[rstest]
#[case::zero_timeout(TimingCfg { response_timeout_ms: 0, ..TimingCfg::default() }, GateCfg::default(), RollerCfg::default())]
#[case::zero_feed(TimingCfg { feed_run_ms: 0, ..TimingCfg::default() }, GateCfg::default(), RollerCfg::default())]
#[case::gate_too_wide(TimingCfg::default(), GateCfg { open_us: 2600, closed_us: 1100 }, RollerCfg::default())]
#[case::feed_above_max(TimingCfg::default(), GateCfg::default(), RollerCfg { feed_speed: 450, ..RollerCfg::default() })]
#[case::rollers_out_of_range(TimingCfg::default(), GateCfg::default(), RollerCfg { neutral_us: 2300, ..RollerCfg::default() })]
fn invalid_actuation_is_rejected(
    #[case] timing: TimingCfg,
    #[case] gate: GateCfg,
    #[case] rollers: RollerCfg,
) {
    assert!(build_with(CarouselCfg::default(), timing, gate, rollers).is_err());
}

#[test]
fn fresh_sorter_waits_for_zero() {
    let s = build_with(
        CarouselCfg::default(),
        TimingCfg::default(),
        GateCfg::default(),
        RollerCfg::default(),
    )
    .unwrap();
    assert_eq!(s.state(), SortState::HomeWait);
    assert!(s.ring().is_empty());
    assert_eq!(s.ring().len(), 24);
}
