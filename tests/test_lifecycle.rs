//! Plans hold twiddle tables only while awake, and share them through their planner's cache.

use fftplan::num_complex::Complex;
use fftplan::{FftDirection, Placement, PlanState, Planner, PlannerFlags, Problem, Wakefulness};

#[test]
fn test_estimate_planning_allocates_no_tables() {
    let mut planner = Planner::<f64>::new(PlannerFlags::ESTIMATE);
    for len in [12, 13, 64, 97, 360] {
        let problem = Problem::dft_1d(len, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let plan = planner.plan(&problem).unwrap();
        assert_eq!(plan.state(), PlanState::Dormant);
    }
    assert_eq!(planner.twiddle_cache().live_tables(), 0);
}

#[test]
fn test_awake_and_sleep() {
    let mut planner = Planner::<f64>::new(PlannerFlags::ESTIMATE);
    let problem = Problem::dft_1d(360, FftDirection::Forward, Placement::InPlace).unwrap();
    let mut plan = planner.plan(&problem).unwrap();
    let cache = planner.twiddle_cache().clone();

    plan.awake(&cache, Wakefulness::Armed);
    assert_eq!(plan.state(), PlanState::Armed);
    let live = cache.live_tables();
    assert!(live > 0, "{}", plan);
    let single = cache.snapshot();

    // waking again changes nothing
    plan.awake(&cache, Wakefulness::Armed);
    assert_eq!(cache.snapshot(), single);

    // a clone shares every table
    let twin = plan.clone();
    assert_eq!(cache.live_tables(), live);
    let doubled: Vec<(String, bool, usize)> = single
        .iter()
        .map(|(recipe, zero, count)| (recipe.clone(), *zero, count * 2))
        .collect();
    assert_eq!(cache.snapshot(), doubled);
    drop(twin);
    assert_eq!(cache.snapshot(), single);

    plan.sleep();
    assert_eq!(plan.state(), PlanState::Dormant);
    assert_eq!(cache.live_tables(), 0);
    plan.sleep();
    assert_eq!(plan.state(), PlanState::Dormant);

    // asleep, the plan keeps its structure and can be woken again
    plan.awake(&cache, Wakefulness::Armed);
    assert_eq!(cache.snapshot(), single);
    let mut buffer = vec![Complex::new(1.0, 0.0); 360];
    plan.process_inplace(&problem, &mut buffer);
    assert!((buffer[0] - Complex::new(360.0, 0.0)).norm() < 1e-9);
    assert!(buffer[1..].iter().all(|x| x.norm() < 1e-9));
}

#[test]
fn test_measuring_tables_are_placeholders() {
    let mut planner = Planner::<f32>::new(PlannerFlags::ESTIMATE);
    let problem = Problem::dft_1d(100, FftDirection::Forward, Placement::OutOfPlace).unwrap();
    let mut plan = planner.plan(&problem).unwrap();
    let cache = planner.twiddle_cache().clone();

    plan.awake(&cache, Wakefulness::Measuring);
    assert_eq!(plan.state(), PlanState::Measuring);
    let snapshot = cache.snapshot();
    assert!(!snapshot.is_empty());
    assert!(snapshot.iter().all(|(_, zero, _)| *zero));

    // switching modes swaps the placeholders for real tables
    plan.awake(&cache, Wakefulness::Armed);
    assert_eq!(plan.state(), PlanState::Armed);
    assert!(cache.snapshot().iter().all(|(_, zero, _)| !zero));
}

#[test]
fn test_plans_share_tables() {
    let mut planner = Planner::<f64>::new(PlannerFlags::ESTIMATE);
    let problem = Problem::dft_1d(64, FftDirection::Forward, Placement::OutOfPlace).unwrap();
    let first = planner.plan_dft(&problem).unwrap();
    let live = planner.twiddle_cache().live_tables();
    assert!(live > 0);

    let second = planner.plan_dft(&problem).unwrap();
    assert_eq!(first.signature(), second.signature());
    assert_eq!(planner.twiddle_cache().live_tables(), live);

    drop(first);
    assert_eq!(planner.twiddle_cache().live_tables(), live);
    drop(second);
    assert_eq!(planner.twiddle_cache().live_tables(), 0);
}

#[test]
fn test_dropping_an_awake_plan_frees_tables() {
    let mut planner = Planner::<f64>::new(PlannerFlags::ESTIMATE);
    let problem = Problem::dft(&[12, 10], 3, FftDirection::Forward, Placement::InPlace).unwrap();
    {
        let plan = planner.plan_dft(&problem).unwrap();
        assert!(plan.is_awake());
        assert!(planner.twiddle_cache().live_tables() > 0, "{}", plan);
    }
    assert_eq!(planner.twiddle_cache().live_tables(), 0);
}
