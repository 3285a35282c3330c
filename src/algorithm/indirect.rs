use std::fmt;

use crate::common::FftNum;
use crate::flags::PlannerFlags;
use crate::plan::{Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::Problem;
use crate::solver::Solver;
use crate::tensor::{InPlaceKind, Tensor};
use crate::twiddles::TwiddleCache;

/// Whether the data is rearranged before or after the transform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum IndirectStrategy {
    /// Copy into the output layout, then transform in place on the output.
    Before,
    /// Transform in place on the input, then copy into the output layout.
    After,
}

impl fmt::Display for IndirectStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IndirectStrategy::Before => f.write_str("before"),
            IndirectStrategy::After => f.write_str("after"),
        }
    }
}

/// Handles transforms whose input and output layouts differ by pairing a rank-0 copy with an
/// in-place transform. Also turns a strided out-of-place transform into a copy plus a
/// unit-stride in-place one.
#[derive(Clone, Copy, Debug)]
pub struct IndirectSolver {
    strategy: IndirectStrategy,
}

impl IndirectSolver {
    pub fn new(strategy: IndirectStrategy) -> Self {
        Self { strategy }
    }

    fn inplace_kind(&self) -> InPlaceKind {
        match self.strategy {
            IndirectStrategy::Before => InPlaceKind::Os,
            IndirectStrategy::After => InPlaceKind::Is,
        }
    }
}

impl<T: FftNum> Solver<T> for IndirectSolver {
    fn name(&self) -> String {
        format!("dft-indirect-{}", self.strategy)
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        let flags = planner.flags();
        if !problem.vecsz.is_finite()
            || problem.sz.has_rank(0)
            || flags.contains(PlannerFlags::NO_INDIRECT)
        {
            return false;
        }
        let (sz, vecsz) = (&problem.sz, &problem.vecsz);
        if problem.is_inplace() {
            return !(sz.inplace_strides() && vecsz.inplace_strides())
                && Tensor::strides_decrease(sz, vecsz, self.inplace_kind());
        }
        match self.strategy {
            IndirectStrategy::After => {
                flags.contains(PlannerFlags::DESTROY_INPUT)
                    && sz.min_istride() <= 2
                    && sz.min_ostride() > 2
            }
            IndirectStrategy::Before => sz.min_ostride() <= 2 && sz.min_istride() > 2,
        }
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let copy_problem = Problem::from_parts(
            Tensor::rank_0(),
            problem.vecsz.append(&problem.sz),
            problem.ri,
            problem.ii,
            problem.ro,
            problem.io,
        );
        let copy = planner.plan(&copy_problem)?;

        let kind = self.inplace_kind();
        let (re, im) = match self.strategy {
            IndirectStrategy::Before => (problem.ro, problem.io),
            IndirectStrategy::After => (problem.ri, problem.ii),
        };
        let transform_problem = Problem::from_parts(
            problem.sz.copy_inplace(kind),
            problem.vecsz.copy_inplace(kind),
            re,
            im,
            re,
            im,
        );
        let transform = planner.plan(&transform_problem)?;

        let ops = copy.ops() + transform.ops();
        let node = IndirectPlan {
            strategy: self.strategy,
            copy: Box::new(copy),
            transform: Box::new(transform),
        };
        Some(Plan::new(PlanKind::Indirect(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct IndirectPlan<T: FftNum> {
    strategy: IndirectStrategy,
    copy: Box<Plan<T>>,
    transform: Box<Plan<T>>,
}

impl<T: FftNum> PlanNode<T> for IndirectPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        match self.strategy {
            IndirectStrategy::Before => {
                self.copy.apply(ri, ii, ro, io);
                self.transform.apply(ro, io, ro, io);
            }
            IndirectStrategy::After => {
                self.transform.apply(ri, ii, ri, ii);
                self.copy.apply(ri, ii, ro, io);
            }
        }
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.copy.awake(cache, wakefulness);
        self.transform.awake(cache, wakefulness);
    }

    fn sleep(&mut self) {
        self.copy.sleep();
        self.transform.sleep();
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.strategy {
            IndirectStrategy::Before => {
                write!(f, "(dft-indirect-before {} {})", self.copy, self.transform)
            }
            IndirectStrategy::After => {
                write!(f, "(dft-indirect-after {} {})", self.transform, self.copy)
            }
        }
    }
}
