use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use sorter_core::motion::MotionController;
use sorter_core::{SlotRing, parse_line};
use sorter_hardware::SimulatedStepper;
use sorter_traits::Direction;

// A mix of what the host sends during a production run
const TRAFFIC: &[&str] = &[
    "RES 1 1",
    "RES 1234 0",
    "  RES 77 1\r",
    "HOME",
    "ZERO",
    "JOG D",
    "JOG -250",
    "RES 0 1",
    "garbage line",
    "",
];

pub fn bench_parse(c: &mut Criterion) {
    c.bench_function("parse_line mixed traffic", |b| {
        b.iter(|| {
            let mut ok = 0usize;
            for line in TRAFFIC {
                if parse_line(black_box(line)).is_ok() {
                    ok += 1;
                }
            }
            ok
        });
    });
}

pub fn bench_revolution(c: &mut Criterion) {
    c.bench_function("one revolution 3200/24", |b| {
        b.iter_batched(
            || {
                let mut m =
                    MotionController::new(Box::new(SimulatedStepper::new()), 24, 3200, Direction::Forward);
                let _ = m.enable();
                (m, SlotRing::new(24))
            },
            |(mut m, mut ring)| {
                let mut total = 0u32;
                for _ in 0..24 {
                    total += m.advance_one_cell(&mut ring).unwrap_or(0);
                }
                black_box(total)
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bench_parse, bench_revolution);
criterion_main!(benches);
