use std::fmt;

use num_complex::Complex;
use num_traits::Zero;

use super::butterflies::Codelet;
use crate::array_utils::{DoubleBuf, LoadStore, SplitPtr};
use crate::common::FftNum;
use crate::flags::PlannerFlags;
use crate::ops::OpCount;
use crate::plan::{Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::Problem;
use crate::solver::{Score, Solver};
use crate::twiddles::TwiddleCache;

/// Columns processed per batch by buffered codelets of size `n`. Rounded past a multiple of four
/// so consecutive columns of the batch buffer do not share cache sets.
pub(crate) fn batch_size(n: usize) -> usize {
    ((n + 3) & !3) + 2
}

/// Applies a hardcoded codelet of size `n` to every transform of a rank-0 or rank-1 vector.
#[derive(Clone, Copy, Debug)]
pub struct DirectSolver {
    n: usize,
}

impl DirectSolver {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl<T: FftNum> Solver<T> for DirectSolver {
    fn name(&self) -> String {
        format!("dft-direct-{}", self.n)
    }

    fn applicable(&self, problem: &Problem, _planner: &Planner<T>) -> bool {
        problem.sz.has_rank(1)
            && problem.sz.dim(0).n == self.n
            && problem.vecsz.rank_at_most(1)
            && (!problem.is_inplace()
                || problem.vecsz.has_rank(0)
                || (problem.sz.inplace_strides() && problem.vecsz.inplace_strides()))
    }

    fn make_plan(&self, problem: &Problem, _planner: &mut Planner<T>) -> Option<Plan<T>> {
        let codelet = Codelet::new(self.n)?;
        let d = problem.sz.dim(0);
        let v = problem.vecsz.as_loop()?;
        let ops = codelet.ops().scale(v.n as f64);
        let node = DirectPlan {
            codelet,
            is: d.is,
            os: d.os,
            vl: v.n,
            ivs: v.is,
            ovs: v.os,
        };
        Some(Plan::new(PlanKind::Direct(node), problem, ops).prunable())
    }
}

#[derive(Clone)]
pub struct DirectPlan<T> {
    codelet: Codelet<T>,
    is: isize,
    os: isize,
    vl: usize,
    ivs: isize,
    ovs: isize,
}

impl<T: FftNum> PlanNode<T> for DirectPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        let input = SplitPtr::new(ri, ii, self.is);
        let output = SplitPtr::new(ro, io, self.os);
        for v in 0..self.vl as isize {
            self.codelet.perform(DoubleBuf {
                input: input.offset(v * self.ivs),
                output: output.offset(v * self.ovs),
            });
        }
    }

    fn awake(&mut self, _cache: &TwiddleCache<T>, _wakefulness: Wakefulness) {}

    fn sleep(&mut self) {}

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-direct-{}-x{})", self.codelet.len(), self.vl)
    }
}

/// Like [`DirectSolver`], but copies a batch of transforms into a contiguous buffer before
/// running the codelet. Pays off when the transforms themselves are widely strided.
#[derive(Clone, Copy, Debug)]
pub struct DirectBufferedSolver {
    n: usize,
}

impl DirectBufferedSolver {
    pub fn new(n: usize) -> Self {
        Self { n }
    }
}

impl<T: FftNum> Solver<T> for DirectBufferedSolver {
    fn name(&self) -> String {
        format!("dft-directbuf-{}", self.n)
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        if planner.flags().contains(PlannerFlags::NO_BUFFERING)
            || !problem.sz.has_rank(1)
            || problem.sz.dim(0).n != self.n
        {
            return false;
        }
        match problem.vecsz.as_loop() {
            Some(v) => {
                !problem.is_inplace()
                    || (problem.sz.inplace_strides() && problem.vecsz.inplace_strides())
                    || v.n <= batch_size(self.n)
            }
            None => false,
        }
    }

    fn score(&self, problem: &Problem, _planner: &Planner<T>) -> Score {
        let d = problem.sz.dim(0);
        match problem.vecsz.dims() {
            [v] if d.is.unsigned_abs() > v.is.unsigned_abs() => Score::Good,
            _ => Score::Ugly,
        }
    }

    fn make_plan(&self, problem: &Problem, _planner: &mut Planner<T>) -> Option<Plan<T>> {
        let codelet = Codelet::new(self.n)?;
        let d = problem.sz.dim(0);
        let v = problem.vecsz.as_loop()?;
        let ops = codelet
            .ops()
            .scale(v.n as f64)
            .madd(v.n as f64, OpCount::moves(2.0 * self.n as f64));
        let node = DirectBufferedPlan {
            codelet,
            batch: batch_size(self.n),
            is: d.is,
            os: d.os,
            vl: v.n,
            ivs: v.is,
            ovs: v.os,
        };
        Some(Plan::new(PlanKind::DirectBuffered(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct DirectBufferedPlan<T> {
    codelet: Codelet<T>,
    batch: usize,
    is: isize,
    os: isize,
    vl: usize,
    ivs: isize,
    ovs: isize,
}

impl<T: FftNum> DirectBufferedPlan<T> {
    // element j of column c lives at buffer[j * batch + c]
    unsafe fn run_batch(
        &self,
        buffer: &mut [Complex<T>],
        input: SplitPtr<T>,
        output: SplitPtr<T>,
        columns: usize,
    ) {
        let n = self.codelet.len();
        for c in 0..columns {
            let column = input.offset(c as isize * self.ivs);
            for j in 0..n {
                *buffer.get_unchecked_mut(j * self.batch + c) = column.load(j);
            }
        }

        let base = buffer.as_mut_ptr() as *mut T;
        let staged = SplitPtr::new(base, base.add(1), 2 * self.batch as isize);
        for c in 0..columns {
            self.codelet.perform(DoubleBuf {
                input: staged.offset(2 * c as isize),
                output: output.offset(c as isize * self.ovs),
            });
        }
    }
}

impl<T: FftNum> PlanNode<T> for DirectBufferedPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        let mut buffer = vec![Complex::zero(); self.batch * self.codelet.len()];
        let input = SplitPtr::new(ri, ii, self.is);
        let output = SplitPtr::new(ro, io, self.os);

        let mut start = 0;
        while start + self.batch < self.vl {
            let offset = start as isize;
            self.run_batch(
                &mut buffer,
                input.offset(offset * self.ivs),
                output.offset(offset * self.ovs),
                self.batch,
            );
            start += self.batch;
        }
        let offset = start as isize;
        self.run_batch(
            &mut buffer,
            input.offset(offset * self.ivs),
            output.offset(offset * self.ovs),
            self.vl - start,
        );
    }

    fn awake(&mut self, _cache: &TwiddleCache<T>, _wakefulness: Wakefulness) {}

    fn sleep(&mut self) {}

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-directbuf/{}-{}-x{})", self.batch, self.codelet.len(), self.vl)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::problem::DataPtr;
    use crate::tensor::Tensor;
    use crate::test_utils::{compare_vectors, naive_dft, random_signal};

    // `howmany` transforms of size n stored column-wise: element j of transform v at j*howmany + v
    fn strided_problem(n: usize, howmany: usize) -> Problem {
        let stride = 2 * howmany as isize;
        Problem::new(
            Tensor::dim_1d(n, stride, stride),
            Tensor::dim_1d(howmany, 2, 2),
            DataPtr::input(0),
            DataPtr::input(1),
            DataPtr::output(0),
            DataPtr::output(1),
        )
        .unwrap()
    }

    fn check_columns(n: usize, howmany: usize, input: &[Complex<f64>], output: &[Complex<f64>]) {
        for v in 0..howmany {
            let column: Vec<Complex<f64>> = (0..n).map(|j| input[j * howmany + v]).collect();
            let actual: Vec<Complex<f64>> = (0..n).map(|j| output[j * howmany + v]).collect();
            assert!(compare_vectors(&actual, &naive_dft(&column)), "column {}", v);
        }
    }

    #[test]
    fn test_direct_vector() {
        let mut planner: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE);
        for n in Codelet::<f64>::SIZES {
            let howmany = 3;
            let problem = strided_problem(n, howmany);
            let solver = DirectSolver::new(n);
            assert!(Solver::<f64>::applicable(&solver, &problem, &planner));
            let plan = solver.make_plan(&problem, &mut planner).unwrap();
            assert_eq!(plan.signature(), format!("(dft-direct-{}-x{})", n, howmany));
            assert!(plan.could_prune_now());

            let mut input: Vec<Complex<f64>> = random_signal(n * howmany);
            let original = input.clone();
            let mut output = vec![Complex::zero(); n * howmany];
            let mut plan = plan;
            planner.awake(&mut plan);
            plan.process_outofplace(&problem, &mut input, &mut output);
            check_columns(n, howmany, &original, &output);
        }
    }

    #[test]
    fn test_direct_buffered_partial_batches() {
        let mut planner: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE);
        let n = 5;
        // 8 columns per batch: one full batch and a partial one
        let howmany = 13;
        let problem = strided_problem(n, howmany);
        let solver = DirectBufferedSolver::new(n);
        assert!(Solver::<f64>::applicable(&solver, &problem, &planner));
        assert_eq!(Solver::<f64>::score(&solver, &problem, &planner), Score::Good);
        let mut plan = solver.make_plan(&problem, &mut planner).unwrap();
        planner.awake(&mut plan);

        let mut input: Vec<Complex<f64>> = random_signal(n * howmany);
        let original = input.clone();
        let mut output = vec![Complex::zero(); n * howmany];
        plan.process_outofplace(&problem, &mut input, &mut output);
        check_columns(n, howmany, &original, &output);

        let fresh: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE | PlannerFlags::NO_BUFFERING);
        assert!(!Solver::<f64>::applicable(&solver, &problem, &fresh));
    }

    #[test]
    fn test_batch_size() {
        assert_eq!(batch_size(2), 6);
        assert_eq!(batch_size(4), 6);
        assert_eq!(batch_size(5), 10);
        assert_eq!(batch_size(8), 10);
    }
}
