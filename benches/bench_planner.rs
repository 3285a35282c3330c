#![feature(test)]
extern crate fftplan;
extern crate test;

use fftplan::num_complex::Complex;
use fftplan::{FftDirection, Placement, Planner, PlannerFlags, Problem};
use test::Bencher;

/// Times planning from an empty memo, without waking the plan
fn bench_planning(b: &mut Bencher, len: usize, flags: PlannerFlags) {
    let problem = Problem::dft_1d(len, FftDirection::Forward, Placement::OutOfPlace).unwrap();
    b.iter(|| {
        let mut planner = Planner::<f64>::new(flags);
        planner.plan(&problem).unwrap()
    });
}

#[bench] fn estimate_plan_000064(b: &mut Bencher) { bench_planning(b, 64, PlannerFlags::ESTIMATE); }
#[bench] fn estimate_plan_000097(b: &mut Bencher) { bench_planning(b, 97, PlannerFlags::ESTIMATE); }
#[bench] fn estimate_plan_001000(b: &mut Bencher) { bench_planning(b, 1000, PlannerFlags::ESTIMATE); }
#[bench] fn estimate_plan_065536(b: &mut Bencher) { bench_planning(b, 65536, PlannerFlags::ESTIMATE); }

#[bench] fn exhaustive_plan_000064(b: &mut Bencher) { bench_planning(b, 64, PlannerFlags::ESTIMATE | PlannerFlags::EXHAUSTIVE); }
#[bench] fn exhaustive_plan_001000(b: &mut Bencher) { bench_planning(b, 1000, PlannerFlags::ESTIMATE | PlannerFlags::EXHAUSTIVE); }

/// Times just the transform (not planning or twiddle computation)
/// for a given length
fn bench_apply(b: &mut Bencher, len: usize, flags: PlannerFlags) {
    let problem = Problem::dft_1d(len, FftDirection::Forward, Placement::InPlace).unwrap();
    let mut planner = Planner::<f32>::new(flags);
    let plan = planner.plan_dft(&problem).unwrap();

    let mut buffer = vec![Complex { re: 0.0f32, im: 0.0f32 }; len];
    b.iter(|| {
        plan.process_inplace(&problem, &mut buffer);
    });
}

#[bench] fn apply_estimate_000064(b: &mut Bencher) { bench_apply(b, 64, PlannerFlags::ESTIMATE); }
#[bench] fn apply_estimate_000097(b: &mut Bencher) { bench_apply(b, 97, PlannerFlags::ESTIMATE); }
#[bench] fn apply_estimate_001000(b: &mut Bencher) { bench_apply(b, 1000, PlannerFlags::ESTIMATE); }
#[bench] fn apply_estimate_001009(b: &mut Bencher) { bench_apply(b, 1009, PlannerFlags::ESTIMATE); }
#[bench] fn apply_estimate_065536(b: &mut Bencher) { bench_apply(b, 65536, PlannerFlags::ESTIMATE); }

#[bench] fn apply_measure_000064(b: &mut Bencher) { bench_apply(b, 64, PlannerFlags::MEASURE); }
#[bench] fn apply_measure_001000(b: &mut Bencher) { bench_apply(b, 1000, PlannerFlags::MEASURE); }
#[bench] fn apply_measure_065536(b: &mut Bencher) { bench_apply(b, 65536, PlannerFlags::MEASURE); }
