use rstest::rstest;
use sorter_hardware::{SimulatedServo, SimulatedStepper};
use sorter_traits::{Direction, Servo, Stepper};

#[rstest]
#[case(Direction::Forward, 200, 200)]
#[case(Direction::Reverse, 200, -200)]
fn stepper_direction_sets_sign(#[case] dir: Direction, #[case] steps: u32, #[case] expected: i64) {
    let mut stepper = SimulatedStepper::new();
    let probe = stepper.probe();
    stepper.enable().expect("enable");
    stepper.set_direction(dir).expect("dir");
    stepper.pulse(steps).expect("pulse");
    assert_eq!(probe.position(), expected);
}

#[rstest]
fn disabled_stepper_keeps_position() {
    let mut stepper = SimulatedStepper::new();
    let probe = stepper.probe();
    stepper.enable().expect("enable");
    stepper.pulse(5).expect("pulse");
    stepper.disable().expect("disable");
    assert!(stepper.pulse(5).is_err());
    assert_eq!(probe.position(), 5);
    assert!(!probe.enabled());
}

#[rstest]
#[case(499)]
#[case(2501)]
fn servo_rejects_out_of_range_widths(#[case] width: u16) {
    let mut servo = SimulatedServo::new("test");
    let probe = servo.probe();
    let err = servo.set_pulse_us(width).expect_err("out of range");
    assert!(err.to_string().contains("outside"));
    assert_eq!(probe.writes(), 0);
}
