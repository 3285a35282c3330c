use std::fmt;
use std::marker::PhantomData;

use num_complex::Complex;
use num_traits::Zero;

use crate::array_utils::{copy_strided, SplitPtr};
use crate::common::FftNum;
use crate::ops::OpCount;
use crate::plan::{Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::Problem;
use crate::solver::Solver;
use crate::tensor::IoDim;
use crate::twiddles::TwiddleCache;

/// Plans problems with nothing to do: an empty vector, or a size-1 transform written over itself.
#[derive(Clone, Copy, Debug, Default)]
pub struct NopSolver;

impl<T: FftNum> Solver<T> for NopSolver {
    fn name(&self) -> String {
        "dft-nop".to_owned()
    }

    fn applicable(&self, problem: &Problem, _planner: &Planner<T>) -> bool {
        !problem.vecsz.is_finite()
            || (problem.sz.has_rank(0) && problem.is_inplace() && problem.vecsz.inplace_strides())
    }

    fn make_plan(&self, problem: &Problem, _planner: &mut Planner<T>) -> Option<Plan<T>> {
        Some(Plan::nop(problem).prunable())
    }
}

/// Plans size-1 transforms, which only move data.
#[derive(Clone, Copy, Debug, Default)]
pub struct Rank0Solver;

impl<T: FftNum> Solver<T> for Rank0Solver {
    fn name(&self) -> String {
        "dft-rank0".to_owned()
    }

    fn applicable(&self, problem: &Problem, _planner: &Planner<T>) -> bool {
        problem.sz.has_rank(0)
            && problem.vecsz.is_finite()
            && !(problem.is_inplace() && problem.vecsz.inplace_strides())
    }

    fn make_plan(&self, problem: &Problem, _planner: &mut Planner<T>) -> Option<Plan<T>> {
        let node = Rank0Plan::new(problem);
        let points = problem.vecsz.total_size() as f64;
        let ops = if node.method == CopyMethod::Gather {
            OpCount::moves(4.0 * points)
        } else {
            OpCount::moves(2.0 * points)
        };
        Some(Plan::new(PlanKind::Rank0(node), problem, ops).prunable())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CopyMethod {
    /// Interleaved row-major block written transposed: handed to `transpose`.
    Transpose { width: usize, height: usize },
    Strided,
    /// In place with different read and write strides: staged through a temporary.
    Gather,
}

/// Copies every point of the vector shape from the input to the output.
#[derive(Clone)]
pub struct Rank0Plan<T> {
    dims: Vec<IoDim>,
    method: CopyMethod,
    _phantom: PhantomData<T>,
}

impl<T: FftNum> Rank0Plan<T> {
    fn new(problem: &Problem) -> Self {
        let dims = problem.vecsz.dims().to_vec();
        let method = if problem.is_inplace() {
            CopyMethod::Gather
        } else {
            match Self::transpose_shape(problem, &dims) {
                Some((width, height)) => CopyMethod::Transpose { width, height },
                None => CopyMethod::Strided,
            }
        };
        Self {
            dims,
            method,
            _phantom: PhantomData,
        }
    }

    // `(n0, 2*n1, 2) x (n1, 2, 2*n0)` over interleaved data is a plain matrix transpose
    fn transpose_shape(problem: &Problem, dims: &[IoDim]) -> Option<(usize, usize)> {
        let interleaved =
            problem.ii.distance(problem.ri) == Some(1) && problem.io.distance(problem.ro) == Some(1);
        match dims {
            [rows, cols]
                if interleaved
                    && rows.is == 2 * cols.n as isize
                    && rows.os == 2
                    && cols.is == 2
                    && cols.os == 2 * rows.n as isize =>
            {
                Some((cols.n, rows.n))
            }
            _ => None,
        }
    }

    unsafe fn gather(&self, ri: *mut T, ii: *mut T) {
        let total: usize = self.dims.iter().map(|d| d.n).product();
        let mut temp = vec![Complex::<T>::zero(); total];
        let temp_ptr = temp.as_mut_ptr() as *mut T;

        // row-major strides over the temporary
        let mut stride = 2isize;
        let mut gather_dims = self.dims.clone();
        let mut scatter_dims = self.dims.clone();
        for (g, s) in gather_dims.iter_mut().zip(scatter_dims.iter_mut()).rev() {
            g.os = stride;
            s.is = stride;
            stride *= g.n as isize;
        }

        let data = SplitPtr::new(ri, ii, 0);
        let staged = SplitPtr::new(temp_ptr, temp_ptr.add(1), 0);
        copy_strided(data, staged, &gather_dims);
        copy_strided(staged, data, &scatter_dims);
    }
}

impl<T: FftNum> PlanNode<T> for Rank0Plan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        match self.method {
            CopyMethod::Transpose { width, height } => {
                let len = width * height;
                let input = std::slice::from_raw_parts(ri as *const Complex<T>, len);
                let output = std::slice::from_raw_parts_mut(ro as *mut Complex<T>, len);
                transpose::transpose(input, output, width, height);
            }
            CopyMethod::Strided => {
                copy_strided(SplitPtr::new(ri, ii, 0), SplitPtr::new(ro, io, 0), &self.dims)
            }
            CopyMethod::Gather => self.gather(ri, ii),
        }
    }

    fn awake(&mut self, _cache: &TwiddleCache<T>, _wakefulness: Wakefulness) {}

    fn sleep(&mut self) {}

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.method {
            CopyMethod::Transpose { width, height } => {
                write!(f, "(dft-rank0-transpose-{}x{})", height, width)
            }
            CopyMethod::Strided => write!(f, "(dft-rank0-copy-{})", self.dims.len()),
            CopyMethod::Gather => write!(f, "(dft-rank0-gather-{})", self.dims.len()),
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::flags::PlannerFlags;
    use crate::problem::DataPtr;
    use crate::tensor::Tensor;
    use crate::test_utils::random_signal;

    fn plan_for(problem: &Problem) -> Plan<f64> {
        let mut planner = Planner::new(PlannerFlags::ESTIMATE);
        planner.plan_dft(problem).unwrap()
    }

    #[test]
    fn test_transpose_copy() {
        let (n0, n1) = (3usize, 5usize);
        let vecsz = Tensor::new(vec![
            IoDim::new(n0, 2 * n1 as isize, 2),
            IoDim::new(n1, 2, 2 * n0 as isize),
        ]);
        let problem = Problem::new(
            Tensor::rank_0(),
            vecsz,
            DataPtr::input(0),
            DataPtr::input(1),
            DataPtr::output(0),
            DataPtr::output(1),
        )
        .unwrap();
        let plan = plan_for(&problem);
        assert_eq!(plan.signature(), "(dft-rank0-transpose-3x5)");

        let mut input: Vec<Complex<f64>> = random_signal(n0 * n1);
        let expected = input.clone();
        let mut output = vec![Complex::zero(); n0 * n1];
        plan.process_outofplace(&problem, &mut input, &mut output);
        for row in 0..n0 {
            for col in 0..n1 {
                assert_eq!(output[col * n0 + row], expected[row * n1 + col]);
            }
        }
    }

    #[test]
    fn test_inplace_gather() {
        // reads points 5 to 10 and writes them backwards from point 5
        let problem = Problem::new(
            Tensor::rank_0(),
            Tensor::dim_1d(6, 2, -2),
            DataPtr::input(0),
            DataPtr::input(1),
            DataPtr::input(0),
            DataPtr::input(1),
        )
        .unwrap();
        let node = Rank0Plan::<f64>::new(&problem);
        assert_eq!(node.method, CopyMethod::Gather);

        let mut buffer: Vec<Complex<f64>> = random_signal(11);
        let expected: Vec<Complex<f64>> = buffer.clone();
        unsafe {
            let base = (buffer.as_mut_ptr() as *mut f64).add(10);
            node.apply(base, base.add(1), base, base.add(1));
        }
        for i in 0..6 {
            assert_eq!(buffer[5 - i], expected[5 + i]);
        }
    }
}
