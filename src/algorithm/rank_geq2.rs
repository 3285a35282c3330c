use std::fmt;

use crate::common::FftNum;
use crate::flags::PlannerFlags;
use crate::pickdim::pick_dim;
use crate::plan::{Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::Problem;
use crate::solver::{Score, Solver};
use crate::tensor::InPlaceKind;
use crate::twiddles::TwiddleCache;

/// Splits a multi-dimensional transform into two lower-rank ones: the trailing dimensions are
/// transformed out of place for every index of the leading ones, then the leading dimensions are
/// transformed in place on the output.
#[derive(Clone, Copy, Debug)]
pub struct RankGeq2Solver {
    which: i32,
}

impl RankGeq2Solver {
    pub const BUDDIES: &'static [i32] = &[1, 0, -2];

    pub fn new(which: i32) -> Self {
        Self { which }
    }

    /// Rank of the leading part.
    fn split(&self, problem: &Problem) -> Option<usize> {
        let dims = problem.sz.dims();
        let split = pick_dim(self.which, Self::BUDDIES, dims, true)? + 1;
        (split < dims.len()).then_some(split)
    }
}

impl<T: FftNum> Solver<T> for RankGeq2Solver {
    fn name(&self) -> String {
        format!("dft-rank>=2/{}", self.which)
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        if problem.sz.rank().map_or(true, |rank| rank < 2) || !problem.vecsz.is_finite() {
            return false;
        }
        if planner.flags().contains(PlannerFlags::NO_RANK_SPLITS) && self.which != Self::BUDDIES[0] {
            return false;
        }
        self.split(problem).is_some()
    }

    fn score(&self, problem: &Problem, _planner: &Planner<T>) -> Score {
        // a loop over widely spaced vectors should go outside the split
        let vector_outside = problem.vecsz.rank().map_or(false, |rank| rank > 0)
            && problem.vecsz.min_stride() > problem.sz.max_index();
        if vector_outside {
            Score::Ugly
        } else {
            Score::Good
        }
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let split = self.split(problem)?;
        let (sz1, sz2) = problem.sz.split(split);

        let cld1_problem = Problem::from_parts(
            sz2.clone(),
            problem.vecsz.append(&sz1),
            problem.ri,
            problem.ii,
            problem.ro,
            problem.io,
        );
        let cld1 = planner.plan(&cld1_problem)?;

        let cld2_problem = Problem::from_parts(
            sz1.copy_inplace(InPlaceKind::Os),
            problem
                .vecsz
                .copy_inplace(InPlaceKind::Os)
                .append(&sz2.copy_inplace(InPlaceKind::Os)),
            problem.ro,
            problem.io,
            problem.ro,
            problem.io,
        );
        let cld2 = planner.plan(&cld2_problem)?;

        let ops = cld1.ops() + cld2.ops();
        let node = RankGeq2Plan {
            split,
            cld1: Box::new(cld1),
            cld2: Box::new(cld2),
        };
        Some(Plan::new(PlanKind::RankGeq2(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct RankGeq2Plan<T: FftNum> {
    split: usize,
    cld1: Box<Plan<T>>,
    cld2: Box<Plan<T>>,
}

impl<T: FftNum> PlanNode<T> for RankGeq2Plan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        self.cld1.apply(ri, ii, ro, io);
        self.cld2.apply(ro, io, ro, io);
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.cld1.awake(cache, wakefulness);
        self.cld2.awake(cache, wakefulness);
    }

    fn sleep(&mut self) {
        self.cld1.sleep();
        self.cld2.sleep();
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-rank>=2/{} {} {})", self.split, self.cld1, self.cld2)
    }
}
