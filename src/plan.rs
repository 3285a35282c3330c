use std::fmt;
use std::sync::Arc;

use num_complex::Complex;

use crate::algorithm::buffered::BufferedPlan;
use crate::algorithm::cooley_tukey::CooleyTukeyPlan;
use crate::algorithm::direct::{DirectBufferedPlan, DirectPlan};
use crate::algorithm::generic::GenericPlan;
use crate::algorithm::indirect::IndirectPlan;
use crate::algorithm::rank0::Rank0Plan;
use crate::algorithm::rank_geq2::RankGeq2Plan;
use crate::algorithm::raders_algorithm::{RaderDitPlan, RaderPlan};
use crate::algorithm::vecloop::{ThreadedVecLoopPlan, VecLoopPlan};
use crate::common::{fft_error_dormant, fft_error_inplace, fft_error_outofplace, fft_error_problem, FftNum};
use crate::ops::OpCount;
use crate::problem::{Problem, Region};
use crate::twiddles::{TwiddleCache, TwiddleRecipe, TwiddleTable};

/// What an awakened plan is for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Wakefulness {
    /// Trial runs while planning: twiddle tables are zero-filled placeholders.
    Measuring,
    /// Real transforms.
    Armed,
}

/// Lifecycle of a plan. Only awake plans may be applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PlanState {
    Dormant,
    Measuring,
    Armed,
}

impl From<Wakefulness> for PlanState {
    fn from(wakefulness: Wakefulness) -> Self {
        match wakefulness {
            Wakefulness::Measuring => PlanState::Measuring,
            Wakefulness::Armed => PlanState::Armed,
        }
    }
}

/// Behaviour shared by every plan kind. `Plan` wraps a node with its lifecycle bookkeeping.
pub(crate) trait PlanNode<T: FftNum> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T);

    /// Wake children and acquire twiddle tables. Called only on a dormant node.
    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness);

    /// Put children to sleep and release twiddle tables.
    fn sleep(&mut self);

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

/// Acquires a trigonometry-only table, zero-filled while measuring.
pub(crate) fn acquire_twiddles<T: FftNum>(
    cache: &TwiddleCache<T>,
    recipe: TwiddleRecipe,
    wakefulness: Wakefulness,
) -> Arc<TwiddleTable<T>> {
    cache.acquire_standard(recipe, wakefulness == Wakefulness::Measuring)
}

#[derive(Clone)]
pub(crate) enum PlanKind<T: FftNum> {
    Nop,
    Rank0(Rank0Plan<T>),
    Direct(DirectPlan<T>),
    DirectBuffered(DirectBufferedPlan<T>),
    CooleyTukey(CooleyTukeyPlan<T>),
    Buffered(BufferedPlan<T>),
    RankGeq2(RankGeq2Plan<T>),
    VecLoop(VecLoopPlan<T>),
    ThreadedVecLoop(ThreadedVecLoopPlan<T>),
    Indirect(IndirectPlan<T>),
    Rader(RaderPlan<T>),
    RaderDit(RaderDitPlan<T>),
    Generic(GenericPlan<T>),
}

macro_rules! dispatch_plan_kind {
    ($kind:expr, $node:ident => $body:expr, nop => $nop:expr) => {
        match $kind {
            PlanKind::Nop => $nop,
            PlanKind::Rank0($node) => $body,
            PlanKind::Direct($node) => $body,
            PlanKind::DirectBuffered($node) => $body,
            PlanKind::CooleyTukey($node) => $body,
            PlanKind::Buffered($node) => $body,
            PlanKind::RankGeq2($node) => $body,
            PlanKind::VecLoop($node) => $body,
            PlanKind::ThreadedVecLoop($node) => $body,
            PlanKind::Indirect($node) => $body,
            PlanKind::Rader($node) => $body,
            PlanKind::RaderDit($node) => $body,
            PlanKind::Generic($node) => $body,
        }
    };
}

/// An executable transform: a tree of plan nodes built by the planner for one problem shape.
///
/// Plans come out of the planner dormant. Call [`Plan::awake`] (or [`Planner::awake`]) before
/// applying one, and [`Plan::sleep`] to release its twiddle tables while keeping the structure.
///
/// [`Planner::awake`]: crate::Planner::awake
#[derive(Clone)]
pub struct Plan<T: FftNum> {
    kind: PlanKind<T>,
    problem: Problem,
    ops: OpCount,
    pcost: f64,
    could_prune_now: bool,
    state: PlanState,
}

impl<T: FftNum> Plan<T> {
    pub(crate) fn new(kind: PlanKind<T>, problem: &Problem, ops: OpCount) -> Self {
        Self {
            kind,
            problem: problem.clone(),
            ops,
            pcost: ops.estimated_cost(),
            could_prune_now: false,
            state: PlanState::Dormant,
        }
    }

    pub(crate) fn nop(problem: &Problem) -> Self {
        Self::new(PlanKind::Nop, problem, OpCount::zero())
    }

    #[must_use]
    pub(crate) fn prunable(mut self) -> Self {
        self.could_prune_now = true;
        self
    }

    pub(crate) fn set_pcost(&mut self, pcost: f64) {
        self.pcost = pcost;
    }

    /// Estimated arithmetic of one application.
    pub fn ops(&self) -> OpCount {
        self.ops
    }
    /// Cost the planner ranked this plan by: estimated operations, or measured seconds.
    pub fn pcost(&self) -> f64 {
        self.pcost
    }
    pub fn could_prune_now(&self) -> bool {
        self.could_prune_now
    }
    pub fn state(&self) -> PlanState {
        self.state
    }
    pub fn is_awake(&self) -> bool {
        self.state != PlanState::Dormant
    }
    /// The problem this plan was built for.
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Stable text describing the plan tree. Two plans print the same exactly when they compute
    /// the same way.
    pub fn signature(&self) -> String {
        self.to_string()
    }

    /// Acquires twiddle tables for this plan and every child. Waking an already awake plan in
    /// the same mode does nothing; waking it in the other mode swaps its tables.
    pub fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        let target = PlanState::from(wakefulness);
        if self.state == target {
            return;
        }
        if self.state != PlanState::Dormant {
            self.sleep();
        }
        dispatch_plan_kind!(&mut self.kind, node => node.awake(cache, wakefulness), nop => ());
        self.state = target;
    }

    /// Releases every twiddle table held by this plan and its children.
    pub fn sleep(&mut self) {
        if self.state == PlanState::Dormant {
            return;
        }
        dispatch_plan_kind!(&mut self.kind, node => node.sleep(), nop => ());
        self.state = PlanState::Dormant;
    }

    /// Runs the transform on raw split pointers.
    ///
    /// # Safety
    /// The pointers must address buffers laid out as this plan's problem describes, with every
    /// offset in its input and output spans valid, and the output must not overlap the input
    /// unless the problem is in place.
    #[inline]
    pub unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        if self.state == PlanState::Dormant {
            fft_error_dormant(&self.signature());
        }
        dispatch_plan_kind!(&self.kind, node => node.apply(ri, ii, ro, io), nop => ())
    }

    /// Runs an out-of-place problem over interleaved complex buffers.
    pub fn process_outofplace(
        &self,
        problem: &Problem,
        input: &mut [Complex<T>],
        output: &mut [Complex<T>],
    ) {
        self.process_outofplace_scalars(problem, as_scalars(input), as_scalars(output))
    }

    /// Runs an in-place problem over an interleaved complex buffer.
    pub fn process_inplace(&self, problem: &Problem, buffer: &mut [Complex<T>]) {
        self.process_inplace_scalars(problem, as_scalars(buffer))
    }

    /// Runs an out-of-place problem over raw scalar buffers, in whatever interleaved or split
    /// layout the problem's pointers describe.
    pub fn process_outofplace_scalars(&self, problem: &Problem, input: &mut [T], output: &mut [T]) {
        self.check_problem(problem);
        let regions_ok = !problem.is_inplace()
            && problem.ri.region == Region::Input
            && problem.ii.region == Region::Input
            && problem.ro.region == Region::Output
            && problem.io.region == Region::Output;
        if !regions_ok {
            fft_error_problem(&self.problem.signature(), &problem.signature());
        }

        let (input_low, input_high) = problem.input_span();
        let (output_low, output_high) = problem.output_span();
        if input_low < 0 || output_low < 0 {
            fft_error_problem(&self.problem.signature(), &problem.signature());
        }
        let required_input = input_high as usize + 1;
        let required_output = output_high as usize + 1;
        if input.len() < required_input || output.len() < required_output {
            fft_error_outofplace(
                required_input,
                input.len(),
                required_output,
                output.len(),
                &self.signature(),
            );
            return;
        }

        unsafe {
            let input = input.as_mut_ptr();
            let output = output.as_mut_ptr();
            self.apply(
                input.offset(problem.ri.offset),
                input.offset(problem.ii.offset),
                output.offset(problem.ro.offset),
                output.offset(problem.io.offset),
            );
        }
    }

    /// Runs an in-place problem over a raw scalar buffer.
    pub fn process_inplace_scalars(&self, problem: &Problem, buffer: &mut [T]) {
        self.check_problem(problem);
        let regions_ok = problem.is_inplace()
            && problem.ri.region == Region::Input
            && problem.ii.region == Region::Input;
        if !regions_ok {
            fft_error_problem(&self.problem.signature(), &problem.signature());
        }

        let (low, high) = problem.input_span();
        let (output_low, output_high) = problem.output_span();
        if low.min(output_low) < 0 {
            fft_error_problem(&self.problem.signature(), &problem.signature());
        }
        let required = high.max(output_high) as usize + 1;
        if buffer.len() < required {
            fft_error_inplace(required, buffer.len(), &self.signature());
            return;
        }

        unsafe {
            let buffer = buffer.as_mut_ptr();
            let ri = buffer.offset(problem.ri.offset);
            let ii = buffer.offset(problem.ii.offset);
            self.apply(ri, ii, ri, ii);
        }
    }

    fn check_problem(&self, problem: &Problem) {
        if *problem != self.problem {
            fft_error_problem(&self.problem.signature(), &problem.signature());
        }
    }
}

fn as_scalars<T: FftNum>(buffer: &mut [Complex<T>]) -> &mut [T] {
    // Complex<T> is repr(C) with re followed by im
    unsafe { std::slice::from_raw_parts_mut(buffer.as_mut_ptr() as *mut T, buffer.len() * 2) }
}

impl<T: FftNum> fmt::Display for Plan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        dispatch_plan_kind!(&self.kind, node => node.print(f), nop => f.write_str("(dft-nop)"))
    }
}

impl<T: FftNum> fmt::Debug for Plan<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Plan")
            .field("signature", &self.signature())
            .field("state", &self.state)
            .field("ops", &self.ops)
            .finish()
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::problem::Placement;
    use crate::FftDirection;

    #[test]
    fn test_nop_lifecycle() {
        let problem = Problem::dft_1d(1, FftDirection::Forward, Placement::InPlace).unwrap();
        let mut plan: Plan<f32> = Plan::nop(&problem);
        let cache = TwiddleCache::new();
        assert_eq!(plan.state(), PlanState::Dormant);
        assert_eq!(plan.signature(), "(dft-nop)");

        plan.awake(&cache, Wakefulness::Measuring);
        assert_eq!(plan.state(), PlanState::Measuring);
        plan.awake(&cache, Wakefulness::Armed);
        assert_eq!(plan.state(), PlanState::Armed);

        let mut buffer = vec![Complex::new(3.0f32, -1.0)];
        plan.process_inplace(&problem, &mut buffer);
        assert_eq!(buffer[0], Complex::new(3.0, -1.0));

        plan.sleep();
        plan.sleep();
        assert!(!plan.is_awake());
    }

    #[test]
    #[should_panic]
    fn test_dormant_apply_panics() {
        let problem = Problem::dft_1d(1, FftDirection::Forward, Placement::InPlace).unwrap();
        let plan: Plan<f64> = Plan::nop(&problem);
        let mut buffer = vec![Complex::new(0.0f64, 0.0)];
        plan.process_inplace(&problem, &mut buffer);
    }

    #[test]
    #[should_panic]
    fn test_wrong_problem_panics() {
        let problem = Problem::dft_1d(1, FftDirection::Forward, Placement::InPlace).unwrap();
        let other = Problem::dft_1d(4, FftDirection::Forward, Placement::InPlace).unwrap();
        let mut plan: Plan<f64> = Plan::nop(&problem);
        plan.awake(&TwiddleCache::new(), Wakefulness::Armed);
        let mut buffer = vec![Complex::new(0.0f64, 0.0); 4];
        plan.process_inplace(&other, &mut buffer);
    }
}
