use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::{debug, trace};

use crate::algorithm;
use crate::common::FftNum;
use crate::error::PlanError;
use crate::flags::PlannerFlags;
use crate::plan::{Plan, Wakefulness};
use crate::problem::{DataPtr, Problem, Region};
use crate::solver::{Score, Solver};
use crate::tensor::IoDim;
use crate::threads::{SerialLoop, SpawnLoop};
use crate::twiddles::TwiddleCache;

/// Tunables that solvers read while planning. Changing them changes which plans are built and how
/// fast they run, never what they compute.
#[derive(Clone)]
pub struct PlannerConfig {
    /// Worker count available to threaded plans.
    pub nthreads: usize,
    pub spawn_loop: Arc<dyn SpawnLoop>,
    /// One buffered solver is registered per entry: the most transforms it stages at once.
    pub buffered_max_nbufs: Vec<usize>,
    /// Largest staging buffer a buffered plan may allocate per transform.
    pub max_buffer_bytes: usize,
    /// Buffered transforms are placed `bufdist` points apart, with
    /// `bufdist % buffer_skew_modulus == buffer_skew` to keep them off the same cache sets.
    pub buffer_skew: usize,
    pub buffer_skew_modulus: usize,
    /// Rader plans below this prime are last-resort solutions.
    pub rader_min_prime: usize,
    /// Rader plans at or below this size are forbidden under `NO_SLOW`.
    pub rader_slow_limit: usize,
    /// Column batch sizes of the buffered generic twiddle stage.
    pub genericbuf_batches: Vec<usize>,
    /// `k` values for which `n = k * q * q` splits with radix `q` through the buffered generic stage.
    pub genericbuf_quotients: Vec<usize>,
    /// Minimum wall time spent timing each candidate when measuring.
    pub measure_min_time: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            nthreads: 1,
            spawn_loop: Arc::new(SerialLoop),
            buffered_max_nbufs: vec![8, 256],
            max_buffer_bytes: 65536,
            buffer_skew: 6,
            buffer_skew_modulus: 8,
            rader_min_prime: 53,
            rader_slow_limit: 32,
            genericbuf_batches: vec![4, 8, 16],
            genericbuf_quotients: vec![1, 2, 4],
            measure_min_time: Duration::from_micros(100),
        }
    }
}

impl PlannerConfig {
    #[must_use]
    pub fn with_threads(mut self, nthreads: usize, spawn_loop: Arc<dyn SpawnLoop>) -> Self {
        self.nthreads = nthreads.max(1);
        self.spawn_loop = spawn_loop;
        self
    }
    #[must_use]
    pub fn with_buffered_max_nbufs(mut self, max_nbufs: Vec<usize>) -> Self {
        self.buffered_max_nbufs = max_nbufs;
        self
    }
    #[must_use]
    pub fn with_max_buffer_bytes(mut self, bytes: usize) -> Self {
        self.max_buffer_bytes = bytes;
        self
    }
    #[must_use]
    pub fn with_rader_min_prime(mut self, min_prime: usize) -> Self {
        self.rader_min_prime = min_prime;
        self
    }
    #[must_use]
    pub fn with_measure_min_time(mut self, min_time: Duration) -> Self {
        self.measure_min_time = min_time;
        self
    }

    /// Most points a staging buffer may hold for element type `T`.
    pub fn max_buffer_len<T>(&self) -> usize {
        (self.max_buffer_bytes / std::mem::size_of::<T>().max(1)).max(1)
    }
}

impl fmt::Debug for PlannerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlannerConfig")
            .field("nthreads", &self.nthreads)
            .field("spawn_loop", &self.spawn_loop.name())
            .field("buffered_max_nbufs", &self.buffered_max_nbufs)
            .field("max_buffer_bytes", &self.max_buffer_bytes)
            .field("rader_min_prime", &self.rader_min_prime)
            .field("genericbuf_batches", &self.genericbuf_batches)
            .finish()
    }
}

/// Counters describing the work a planner has done.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PlannerStats {
    /// Searches run, one per problem that missed the memo.
    pub problems_planned: usize,
    pub memo_hits: usize,
    pub memo_misses: usize,
    pub failures_cached: usize,
    pub make_plan_calls: usize,
    /// Successful `make_plan` calls whose result was costed.
    pub plans_evaluated: usize,
    pub estimated_cost: f64,
    pub measured_time: Duration,
}

type MemoKey = (Problem, PlannerFlags, usize);

/// Builds plans by recursive, memoized search over its registered solvers.
///
/// A planner owns its memo and its twiddle cache. Plans it returns should be awakened with
/// [`Planner::awake`] so they share tables with every other plan from the same planner.
pub struct Planner<T: FftNum> {
    config: PlannerConfig,
    user_flags: PlannerFlags,
    // flags and thread count seen by the solver currently being asked for a plan
    flags: PlannerFlags,
    nthreads: usize,
    depth: usize,
    solvers: Vec<Arc<dyn Solver<T>>>,
    memo: HashMap<MemoKey, Option<Plan<T>>>,
    // problems on the planning stack, with the depth they were entered at
    in_progress: HashMap<MemoKey, usize>,
    // shallowest in-progress problem the current search ran into
    cycle_floor: Option<usize>,
    twiddles: TwiddleCache<T>,
    stats: PlannerStats,
}

impl<T: FftNum> Planner<T> {
    /// A planner with the default configuration and every built-in solver.
    pub fn new(flags: PlannerFlags) -> Self {
        Self::with_config(PlannerConfig::default(), flags)
    }

    pub fn with_config(config: PlannerConfig, flags: PlannerFlags) -> Self {
        let solvers = algorithm::default_solvers(&config);
        Self::with_solvers(config, flags, solvers)
    }

    /// A planner that only knows `solvers`, tried in the given order among equal scores.
    pub fn with_solvers(
        config: PlannerConfig,
        flags: PlannerFlags,
        solvers: Vec<Arc<dyn Solver<T>>>,
    ) -> Self {
        let nthreads = config.nthreads.max(1);
        Self {
            config,
            user_flags: flags,
            flags,
            nthreads,
            depth: 0,
            solvers,
            memo: HashMap::new(),
            in_progress: HashMap::new(),
            cycle_floor: None,
            twiddles: TwiddleCache::new(),
            stats: PlannerStats::default(),
        }
    }

    /// Appends a solver. The memo is cleared, since earlier failures may now succeed.
    pub fn register_solver(&mut self, solver: Arc<dyn Solver<T>>) {
        self.solvers.push(solver);
        self.forget();
    }

    pub fn solvers(&self) -> &[Arc<dyn Solver<T>>] {
        &self.solvers
    }

    /// Flags in effect for the search in progress, or the planner's flags between searches.
    pub fn flags(&self) -> PlannerFlags {
        self.flags
    }

    /// Changes the flags used by later top-level calls to [`Planner::plan`].
    pub fn set_flags(&mut self, flags: PlannerFlags) {
        self.user_flags = flags;
        if self.depth == 0 {
            self.flags = flags;
        }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Threads available to the problem currently being planned.
    pub fn nthreads(&self) -> usize {
        self.nthreads
    }

    pub fn twiddle_cache(&self) -> &TwiddleCache<T> {
        &self.twiddles
    }

    pub fn stats(&self) -> &PlannerStats {
        &self.stats
    }

    /// Number of memoized outcomes, failures included.
    pub fn memo_len(&self) -> usize {
        self.memo.len()
    }

    /// Drops every memoized plan and failure.
    pub fn forget(&mut self) {
        self.memo.clear();
    }

    /// Arms a plan with tables from this planner's cache.
    pub fn awake(&self, plan: &mut Plan<T>) {
        plan.awake(&self.twiddles, Wakefulness::Armed);
    }

    /// Plans `problem`, returning a dormant plan or `None` if no solver could handle it.
    ///
    /// Called from outside, this plans with the planner's own flags. Called by a solver, it plans
    /// a sub-problem with the flags of the search in progress.
    pub fn plan(&mut self, problem: &Problem) -> Option<Plan<T>> {
        if self.depth > 0 {
            return self.plan_with_flags(problem, self.flags, self.nthreads);
        }

        let flags = self.user_flags;
        let nthreads = self.config.nthreads.max(1);
        let result = self.plan_with_flags(problem, flags, nthreads);
        debug!(
            problem = %problem,
            flags = %flags,
            plan = %result.as_ref().map_or_else(|| "none".to_owned(), Plan::signature),
            "planned"
        );
        result
    }

    /// Plans a sub-problem with extra flags and a different thread budget.
    pub fn plan_with(
        &mut self,
        problem: &Problem,
        extra_flags: PlannerFlags,
        nthreads: usize,
    ) -> Option<Plan<T>> {
        let flags = self.flags | extra_flags;
        self.plan_with_flags(problem, flags, nthreads.max(1))
    }

    /// Plans `problem` and arms the result.
    pub fn plan_dft(&mut self, problem: &Problem) -> Result<Plan<T>, PlanError> {
        match self.plan(problem) {
            Some(mut plan) => {
                self.awake(&mut plan);
                Ok(plan)
            }
            None => Err(PlanError::NoPlan {
                signature: problem.signature(),
            }),
        }
    }

    fn plan_with_flags(
        &mut self,
        problem: &Problem,
        flags: PlannerFlags,
        nthreads: usize,
    ) -> Option<Plan<T>> {
        let key: MemoKey = (problem.clone(), flags.without(PlannerFlags::NO_SEARCH), nthreads);
        if let Some(entry) = self.memo.get(&key) {
            self.stats.memo_hits += 1;
            trace!(problem = %problem, flags = %flags, hit = entry.is_some(), "memo hit");
            return entry.clone();
        }
        if flags.contains(PlannerFlags::NO_SEARCH) {
            return None;
        }
        if let Some(&level) = self.in_progress.get(&key) {
            // the same problem is already being planned further up the stack
            trace!(problem = %problem, level, "cyclic sub-problem");
            self.cycle_floor = Some(self.cycle_floor.map_or(level, |floor| floor.min(level)));
            return None;
        }
        self.stats.memo_misses += 1;
        self.stats.problems_planned += 1;

        let level = self.depth;
        self.in_progress.insert(key.clone(), level);
        let outer_floor = self.cycle_floor.take();
        let saved = (self.flags, self.nthreads);
        self.flags = flags;
        self.nthreads = nthreads;
        self.depth += 1;

        let result = self.search(problem);

        self.depth -= 1;
        self.flags = saved.0;
        self.nthreads = saved.1;
        self.in_progress.remove(&key);

        // A search that ran into a problem still in progress above this one saw a truncated
        // solver space. Its outcome depends on the caller, so it must not be memoized.
        let inherited = self.cycle_floor.take().filter(|&floor| floor < level);
        self.cycle_floor = match (outer_floor, inherited) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        if inherited.is_some() {
            trace!(problem = %problem, "not memoized, depends on an enclosing search");
            return result;
        }

        if result.is_none() {
            self.stats.failures_cached += 1;
        }
        self.memo.insert(key, result.clone());
        result
    }

    fn search(&mut self, problem: &Problem) -> Option<Plan<T>> {
        let flags = self.flags;
        if flags.contains(PlannerFlags::EXHAUSTIVE) {
            return self.search_pass(problem, flags);
        }
        if let Some(plan) = self.search_pass(problem, flags | PlannerFlags::NO_UGLY) {
            return Some(plan);
        }
        if flags.contains(PlannerFlags::NO_UGLY) {
            return None;
        }
        self.search_pass(problem, flags)
    }

    fn search_pass(&mut self, problem: &Problem, pass_flags: PlannerFlags) -> Option<Plan<T>> {
        let exhaustive = pass_flags.contains(PlannerFlags::EXHAUSTIVE);
        let solvers = self.solvers.clone();
        self.flags = pass_flags;

        let mut candidates: Vec<(Score, usize, &Arc<dyn Solver<T>>)> = solvers
            .iter()
            .enumerate()
            .filter(|(_, solver)| solver.applicable(problem, self))
            .map(|(index, solver)| (solver.score(problem, self), index, solver))
            .filter(|(score, _, _)| *score != Score::Bad)
            .collect();

        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
        let no_ugly = pass_flags.contains(PlannerFlags::NO_UGLY);

        let mut best: Option<Plan<T>> = None;
        for (score, _, solver) in candidates {
            // last-resort solvers are tried only once every good one has failed
            if no_ugly && score == Score::Ugly && best.is_some() {
                break;
            }
            // the below-vector-loop restriction binds this problem, not its sub-problems
            self.flags = pass_flags.without(PlannerFlags::BELOW_VECTOR_LOOP);
            self.stats.make_plan_calls += 1;
            let made = solver.make_plan(problem, self);
            self.flags = pass_flags;

            let mut plan = match made {
                Some(plan) => plan,
                None => {
                    trace!(solver = %solver.name(), ?score, "make_plan failed");
                    continue;
                }
            };
            self.evaluate(&mut plan, problem, pass_flags);
            trace!(
                solver = %solver.name(),
                ?score,
                cost = plan.pcost(),
                plan = %plan,
                "candidate"
            );

            if !exhaustive {
                return Some(plan);
            }
            let prune = plan.could_prune_now();
            if best.as_ref().map_or(true, |b| plan.pcost() < b.pcost()) {
                best = Some(plan);
            }
            if prune {
                break;
            }
        }
        best
    }

    fn evaluate(&mut self, plan: &mut Plan<T>, problem: &Problem, flags: PlannerFlags) {
        self.stats.plans_evaluated += 1;
        if flags.is_estimate() {
            let cost = plan.ops().estimated_cost();
            plan.set_pcost(cost);
            self.stats.estimated_cost += cost;
        } else {
            let seconds = self.measure(plan, problem);
            plan.set_pcost(seconds);
        }
    }

    /// Times `plan` on zeroed planner-owned buffers, with placeholder twiddles.
    fn measure(&mut self, plan: &mut Plan<T>, problem: &Problem) -> f64 {
        plan.awake(&self.twiddles, Wakefulness::Measuring);

        let mut buffers = MeasureBuffers::<T>::new(problem);
        let [ri, ii, ro, io] = buffers.pointers(problem);

        let min_time = self.config.measure_min_time;
        let start = Instant::now();
        let mut iterations = 0u32;
        loop {
            unsafe { plan.apply(ri, ii, ro, io) };
            iterations += 1;
            if start.elapsed() >= min_time || iterations >= 1024 {
                break;
            }
        }
        let elapsed = start.elapsed();
        plan.sleep();

        self.stats.measured_time += elapsed;
        elapsed.as_secs_f64() / f64::from(iterations)
    }
}

impl<T: FftNum> fmt::Debug for Planner<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Planner")
            .field("flags", &self.user_flags)
            .field("config", &self.config)
            .field("solvers", &self.solvers.len())
            .field("memo", &self.memo.len())
            .field("stats", &self.stats)
            .finish()
    }
}

/// Zeroed buffers covering every offset a problem touches, one per region.
struct MeasureBuffers<T> {
    regions: HashMap<Region, (Vec<T>, isize)>,
}

impl<T: FftNum> MeasureBuffers<T> {
    fn new(problem: &Problem) -> Self {
        let dims: Vec<IoDim> = problem
            .sz
            .dims()
            .iter()
            .chain(problem.vecsz.dims())
            .copied()
            .collect();
        let input_reach = reach(&dims, |d| d.is);
        let output_reach = reach(&dims, |d| d.os);

        let mut spans: HashMap<Region, (isize, isize)> = HashMap::new();
        let mut cover = |ptr: DataPtr, (low, high): (isize, isize)| {
            let span = spans
                .entry(ptr.region)
                .or_insert((ptr.offset + low, ptr.offset + high));
            span.0 = span.0.min(ptr.offset + low);
            span.1 = span.1.max(ptr.offset + high);
        };
        cover(problem.ri, input_reach);
        cover(problem.ii, input_reach);
        cover(problem.ro, output_reach);
        cover(problem.io, output_reach);

        let regions = spans
            .into_iter()
            .map(|(region, (low, high))| {
                let len = (high - low + 1) as usize;
                (region, (vec![T::zero(); len], low))
            })
            .collect();
        Self { regions }
    }

    fn pointers(&mut self, problem: &Problem) -> [*mut T; 4] {
        let mut resolve = |ptr: DataPtr| -> *mut T {
            match self.regions.get_mut(&ptr.region) {
                Some((buffer, low)) => unsafe { buffer.as_mut_ptr().offset(ptr.offset - *low) },
                None => std::ptr::null_mut(),
            }
        };
        [
            resolve(problem.ri),
            resolve(problem.ii),
            resolve(problem.ro),
            resolve(problem.io),
        ]
    }
}

fn reach(dims: &[IoDim], stride: impl Fn(&IoDim) -> isize) -> (isize, isize) {
    dims.iter().fold((0, 0), |(low, high), d| {
        let extent = (d.n as isize - 1) * stride(d);
        if extent < 0 {
            (low + extent, high)
        } else {
            (low, high + extent)
        }
    })
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::problem::Placement;
    use crate::FftDirection;

    #[test]
    fn test_measure_buffers_cover_spans() {
        let problem = Problem::dft(&[4, 3], 2, FftDirection::Inverse, Placement::OutOfPlace).unwrap();
        let mut buffers = MeasureBuffers::<f32>::new(&problem);
        assert_eq!(buffers.regions.len(), 2);
        assert_eq!(buffers.regions[&Region::Input].0.len(), 48);
        assert_eq!(buffers.regions[&Region::Output].0.len(), 48);
        let [ri, ii, ro, io] = buffers.pointers(&problem);
        assert_eq!(unsafe { ri.offset_from(ii) }, 1);
        assert_eq!(unsafe { ro.offset_from(io) }, 1);
    }

    #[test]
    fn test_memo_and_stats() {
        let mut planner: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE);
        let problem = Problem::dft_1d(16, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let first = planner.plan(&problem).unwrap();
        let planned = planner.stats().problems_planned;
        assert!(planned > 0);

        let again = planner.plan(&problem).unwrap();
        assert_eq!(first.signature(), again.signature());
        assert_eq!(planner.stats().problems_planned, planned);
        assert!(planner.stats().memo_hits > 0);

        planner.forget();
        assert_eq!(planner.memo_len(), 0);
    }

    #[test]
    fn test_no_search() {
        let problem = Problem::dft_1d(8, FftDirection::Forward, Placement::InPlace).unwrap();
        let mut planner: Planner<f32> = Planner::new(PlannerFlags::ESTIMATE | PlannerFlags::NO_SEARCH);
        assert!(planner.plan(&problem).is_none());
        assert_eq!(planner.memo_len(), 0);

        planner.set_flags(PlannerFlags::ESTIMATE);
        let planned = planner.plan(&problem).unwrap();
        planner.set_flags(PlannerFlags::ESTIMATE | PlannerFlags::NO_SEARCH);
        let cached = planner.plan(&problem).unwrap();
        assert_eq!(planned.signature(), cached.signature());
    }

    #[test]
    fn test_empty_planner_fails_and_caches() {
        let mut planner: Planner<f32> =
            Planner::with_solvers(PlannerConfig::default(), PlannerFlags::ESTIMATE, Vec::new());
        let problem = Problem::dft_1d(8, FftDirection::Forward, Placement::InPlace).unwrap();
        assert!(planner.plan(&problem).is_none());
        assert_eq!(planner.stats().failures_cached, 1);
        assert!(planner.plan(&problem).is_none());
        assert_eq!(planner.stats().memo_hits, 1);
        assert!(matches!(planner.plan_dft(&problem), Err(PlanError::NoPlan { .. })));
    }

    /// Plans the size-2 problem as a size-3 one and the other way round, then gives up.
    struct Bounce;

    impl Solver<f64> for Bounce {
        fn name(&self) -> String {
            "bounce".to_owned()
        }
        fn applicable(&self, problem: &Problem, _planner: &Planner<f64>) -> bool {
            problem.sz.has_rank(1)
        }
        fn make_plan(&self, problem: &Problem, planner: &mut Planner<f64>) -> Option<Plan<f64>> {
            let other = 5 - problem.sz.dim(0).n;
            let other = Problem::dft_1d(other, FftDirection::Forward, Placement::OutOfPlace).unwrap();
            planner.plan(&other);
            None
        }
    }

    #[test]
    fn test_cycles_stay_out_of_the_memo() {
        let solvers: Vec<Arc<dyn Solver<f64>>> = vec![Arc::new(Bounce)];
        let flags = PlannerFlags::ESTIMATE | PlannerFlags::NO_UGLY;
        let mut planner = Planner::with_solvers(PlannerConfig::default(), flags, solvers);
        let two = Problem::dft_1d(2, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let three = Problem::dft_1d(3, FftDirection::Forward, Placement::OutOfPlace).unwrap();

        // three was only planned while two was in progress
        assert!(planner.plan(&two).is_none());
        assert_eq!(planner.memo_len(), 1);

        let hits = planner.stats().memo_hits;
        assert!(planner.plan(&three).is_none());
        assert_eq!(planner.memo_len(), 2);
        assert_eq!(planner.stats().memo_hits, hits + 1);
    }

    struct Fixed {
        score: Score,
        builds: bool,
    }

    impl Solver<f64> for Fixed {
        fn name(&self) -> String {
            format!("fixed-{:?}", self.score)
        }
        fn applicable(&self, _problem: &Problem, _planner: &Planner<f64>) -> bool {
            true
        }
        fn score(&self, _problem: &Problem, _planner: &Planner<f64>) -> Score {
            self.score
        }
        fn make_plan(&self, problem: &Problem, _planner: &mut Planner<f64>) -> Option<Plan<f64>> {
            self.builds.then(|| Plan::nop(problem))
        }
    }

    #[test]
    fn test_no_ugly_falls_back_when_good_solvers_fail() {
        let problem = Problem::dft_1d(8, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        for flags in [PlannerFlags::ESTIMATE, PlannerFlags::ESTIMATE | PlannerFlags::EXHAUSTIVE] {
            let solvers: Vec<Arc<dyn Solver<f64>>> = vec![
                Arc::new(Fixed { score: Score::Ugly, builds: true }),
                Arc::new(Fixed { score: Score::Good, builds: false }),
            ];
            let mut planner =
                Planner::with_solvers(PlannerConfig::default(), flags | PlannerFlags::NO_UGLY, solvers);
            assert!(planner.plan(&problem).is_some(), "{}", flags);
            assert_eq!(planner.stats().make_plan_calls, 2);
        }

        // a good plan keeps the ugly one from being built at all
        let solvers: Vec<Arc<dyn Solver<f64>>> = vec![
            Arc::new(Fixed { score: Score::Ugly, builds: true }),
            Arc::new(Fixed { score: Score::Good, builds: true }),
        ];
        let flags = PlannerFlags::ESTIMATE | PlannerFlags::EXHAUSTIVE | PlannerFlags::NO_UGLY;
        let mut planner = Planner::with_solvers(PlannerConfig::default(), flags, solvers);
        assert!(planner.plan(&problem).is_some());
        assert_eq!(planner.stats().make_plan_calls, 1);
    }
}
