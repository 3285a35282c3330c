use crate::common::FftNum;
use crate::plan::Plan;
use crate::planner::Planner;
use crate::problem::Problem;

/// How much a solver likes a problem. The planner tries candidates in decreasing score order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Score {
    /// Rejected outright.
    Bad,
    /// Works, but only as a last resort.
    Ugly,
    Good,
}

/// One decomposition strategy: an applicability oracle plus a plan factory.
///
/// Solvers are immutable once registered and are shared by every search the planner runs.
/// `make_plan` may recurse into the planner for sub-problems, and may still fail after
/// `applicable` said yes (typically because a child could not be planned).
pub trait Solver<T: FftNum>: Send + Sync {
    /// Stable name including the solver's parameters, used in logs.
    fn name(&self) -> String;

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool;

    fn score(&self, problem: &Problem, planner: &Planner<T>) -> Score {
        let _ = (problem, planner);
        Score::Good
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>>;
}
