use std::fmt;
use std::sync::Arc;

use crate::common::FftNum;
use crate::flags::PlannerFlags;
use crate::pickdim::pick_dim;
use crate::plan::{Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::Problem;
use crate::solver::{Score, Solver};
use crate::tensor::Tensor;
use crate::threads::{SendPtr, SpawnLoop};
use crate::twiddles::TwiddleCache;

/// Peels one dimension off the vector shape and loops over it, planning the rest as a child.
#[derive(Clone, Copy, Debug)]
pub struct VecLoopSolver {
    which: i32,
}

impl VecLoopSolver {
    pub const BUDDIES: &'static [i32] = &[1, -1];

    pub fn new(which: i32) -> Self {
        Self { which }
    }

    fn pick(&self, problem: &Problem) -> Option<usize> {
        pick_dim(self.which, Self::BUDDIES, problem.vecsz.dims(), !problem.is_inplace())
    }
}

fn loopable(problem: &Problem, flags: PlannerFlags) -> bool {
    problem.vecsz.rank().map_or(false, |rank| rank > 0)
        && !flags.contains(PlannerFlags::BELOW_VECTOR_LOOP)
}

/// Child flags: under `NO_VRECURSE` nothing below a vector loop may loop over vectors again.
fn child_flags(flags: PlannerFlags) -> PlannerFlags {
    if flags.contains(PlannerFlags::NO_VRECURSE) {
        PlannerFlags::BELOW_VECTOR_LOOP
    } else {
        PlannerFlags::empty()
    }
}

impl<T: FftNum> Solver<T> for VecLoopSolver {
    fn name(&self) -> String {
        format!("dft-vrank>=1/{}", self.which)
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        loopable(problem, planner.flags()) && self.pick(problem).is_some()
    }

    fn score(&self, problem: &Problem, _planner: &Planner<T>) -> Score {
        let dim = match self.pick(problem) {
            Some(dim) => problem.vecsz.dim(dim),
            None => return Score::Bad,
        };
        // a multi-dimensional transform wants its vector folded in by the rank split first
        let sz_rank = problem.sz.rank().unwrap_or(0);
        let min_stride = dim.is.unsigned_abs().min(dim.os.unsigned_abs());
        if sz_rank > 1 && min_stride < problem.sz.max_index() {
            return Score::Ugly;
        }
        // plain copies are the rank-0 solver's job
        if sz_rank == 0 && problem.vecsz.has_rank(1) {
            return Score::Ugly;
        }
        Score::Good
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let dim = self.pick(problem)?;
        let d = problem.vecsz.dim(dim);
        let child_problem = Problem::from_parts(
            problem.sz.clone(),
            problem.vecsz.copy_except(dim),
            problem.ri,
            problem.ii,
            problem.ro,
            problem.io,
        );
        let nthreads = planner.nthreads();
        let child = planner.plan_with(&child_problem, child_flags(planner.flags()), nthreads)?;

        let ops = child.ops().scale(d.n as f64);
        let node = VecLoopPlan {
            which: self.which,
            vl: d.n,
            ivs: d.is,
            ovs: d.os,
            child: Box::new(child),
        };
        Some(Plan::new(PlanKind::VecLoop(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct VecLoopPlan<T: FftNum> {
    which: i32,
    vl: usize,
    ivs: isize,
    ovs: isize,
    child: Box<Plan<T>>,
}

impl<T: FftNum> PlanNode<T> for VecLoopPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        for i in 0..self.vl as isize {
            self.child.apply(
                ri.offset(i * self.ivs),
                ii.offset(i * self.ivs),
                ro.offset(i * self.ovs),
                io.offset(i * self.ovs),
            );
        }
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.child.awake(cache, wakefulness);
    }

    fn sleep(&mut self) {
        self.child.sleep();
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-vrank>=1-x{}/{} {})", self.vl, self.which, self.child)
    }
}

/// Splits the longest loopable vector dimension into one block per thread and runs the blocks
/// through the planner's [`SpawnLoop`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadedVecLoopSolver;

impl ThreadedVecLoopSolver {
    fn pick(problem: &Problem) -> Option<usize> {
        let oop = !problem.is_inplace();
        problem
            .vecsz
            .dims()
            .iter()
            .enumerate()
            .filter(|(_, d)| oop || d.is == d.os)
            .max_by_key(|(index, d)| (d.n, std::cmp::Reverse(*index)))
            .map(|(index, _)| index)
    }
}

impl<T: FftNum> Solver<T> for ThreadedVecLoopSolver {
    fn name(&self) -> String {
        "dft-thr-vrank>=1".to_owned()
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        planner.nthreads() > 1
            && loopable(problem, planner.flags())
            && Self::pick(problem).map_or(false, |dim| problem.vecsz.dim(dim).n > 1)
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let dim = Self::pick(problem)?;
        let d = problem.vecsz.dim(dim);
        let nthreads = planner.nthreads();
        let nthr = nthreads.min(d.n);
        let block = (d.n + nthr - 1) / nthr;
        let nblocks = (d.n + block - 1) / block;
        let last = d.n - (nblocks - 1) * block;
        let child_threads = (nthreads + nthr - 1) / nthr;
        let flags = child_flags(planner.flags());

        let block_problem = |len: usize| {
            let mut dims = problem.vecsz.dims().to_vec();
            dims[dim].n = len;
            Problem::from_parts(
                problem.sz.clone(),
                Tensor::new(dims),
                problem.ri,
                problem.ii,
                problem.ro,
                problem.io,
            )
        };
        let child = planner.plan_with(&block_problem(block), flags, child_threads)?;
        let rest = if last != block {
            Some(Box::new(planner.plan_with(&block_problem(last), flags, child_threads)?))
        } else {
            None
        };

        let full_blocks = if rest.is_some() { nblocks - 1 } else { nblocks };
        let mut ops = child.ops().scale(full_blocks as f64);
        if let Some(rest) = &rest {
            ops += rest.ops();
        }
        let node = ThreadedVecLoopPlan {
            nblocks,
            block,
            ivs: d.is * block as isize,
            ovs: d.os * block as isize,
            child: Box::new(child),
            rest,
            spawn_loop: Arc::clone(&planner.config().spawn_loop),
        };
        Some(Plan::new(PlanKind::ThreadedVecLoop(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct ThreadedVecLoopPlan<T: FftNum> {
    nblocks: usize,
    block: usize,
    // distance between consecutive blocks
    ivs: isize,
    ovs: isize,
    child: Box<Plan<T>>,
    rest: Option<Box<Plan<T>>>,
    spawn_loop: Arc<dyn SpawnLoop>,
}

impl<T: FftNum> PlanNode<T> for ThreadedVecLoopPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        let (ri, ii, ro, io) = (SendPtr::new(ri), SendPtr::new(ii), SendPtr::new(ro), SendPtr::new(io));
        let work = |index: usize| {
            let plan = match &self.rest {
                Some(rest) if index + 1 == self.nblocks => rest,
                _ => &self.child,
            };
            let i = index as isize;
            // blocks cover disjoint vector elements
            plan.apply(
                ri.get().offset(i * self.ivs),
                ii.get().offset(i * self.ivs),
                ro.get().offset(i * self.ovs),
                io.get().offset(i * self.ovs),
            );
        };
        self.spawn_loop.spawn_loop(self.nblocks, &work);
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.child.awake(cache, wakefulness);
        if let Some(rest) = &mut self.rest {
            rest.awake(cache, wakefulness);
        }
    }

    fn sleep(&mut self) {
        self.child.sleep();
        if let Some(rest) = &mut self.rest {
            rest.sleep();
        }
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-thr-vrank>=1-x{}/{} {}", self.nblocks, self.block, self.child)?;
        if let Some(rest) = &self.rest {
            write!(f, " {}", rest)?;
        }
        f.write_str(")")
    }
}
