use std::fmt;
use std::sync::Arc;

use num_complex::Complex;
use num_traits::Zero;

use crate::common::{fft_error_dormant, FftNum};
use crate::math_utils::first_divisor;
use crate::ops::OpCount;
use crate::plan::{acquire_twiddles, Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::Problem;
use crate::solver::{Score, Solver};
use crate::tensor::Tensor;
use crate::twiddles::{TwiddleCache, TwiddleRecipe, TwiddleTable};

/// Last-resort solver for any size: one decimation-in-time step with radix `r`, the smallest
/// divisor of `n`, whose `r`-point transforms are computed directly in O(r^2). For a prime `n`
/// this is a plain quadratic DFT.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericSolver;

impl<T: FftNum> Solver<T> for GenericSolver {
    fn name(&self) -> String {
        "dft-generic".to_owned()
    }

    fn applicable(&self, problem: &Problem, _planner: &Planner<T>) -> bool {
        problem.sz.has_rank(1) && problem.vecsz.has_rank(0) && problem.sz.dim(0).n >= 2
    }

    fn score(&self, _problem: &Problem, _planner: &Planner<T>) -> Score {
        Score::Ugly
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let d = problem.sz.dim(0);
        let n = d.n;
        let r = first_divisor(n);
        let m = n / r;

        let child = if m > 1 {
            let child_problem = Problem::from_parts(
                Tensor::dim_1d(m, r as isize * d.is, d.os),
                Tensor::dim_1d(r, d.is, m as isize * d.os),
                problem.ri,
                problem.ii,
                problem.ro,
                problem.io,
            );
            Some(Box::new(planner.plan(&child_problem)?))
        } else {
            None
        };

        // each of the n outputs sums r twiddled inputs
        let points = n as f64;
        let rf = r as f64;
        let mut ops = OpCount::new(points * 2.0 * rf, points * 4.0 * rf, 0.0, points * 2.0 + 2.0 * rf);
        if let Some(child) = &child {
            ops += child.ops();
        }
        let node = GenericPlan {
            n,
            r,
            is: d.is,
            os: d.os,
            child,
            twiddles: None,
        };
        Some(Plan::new(PlanKind::Generic(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct GenericPlan<T: FftNum> {
    n: usize,
    r: usize,
    is: isize,
    os: isize,
    child: Option<Box<Plan<T>>>,
    twiddles: Option<Arc<TwiddleTable<T>>>,
}

impl<T: FftNum> GenericPlan<T> {
    /// `r` points starting at `(re, im)` with stride `stride`, read into `column` and replaced by
    /// their twiddled transform for output column `k`.
    unsafe fn transform_column(
        &self,
        twiddles: &[Complex<T>],
        column: &mut [Complex<T>],
        k: usize,
        re: *mut T,
        im: *mut T,
        stride: isize,
    ) {
        let (n, r) = (self.n, self.r);
        let m = n / r;
        for (s, slot) in column.iter_mut().enumerate() {
            let at = s as isize * stride;
            *slot = Complex::new(*re.offset(at), *im.offset(at));
        }
        for q in 0..r {
            let index = k + m * q;
            let mut sum = Complex::zero();
            let mut power = 0;
            for value in column.iter() {
                sum = sum + *value * twiddles[power];
                power += index;
                if power >= n {
                    power %= n;
                }
            }
            let at = q as isize * stride;
            *re.offset(at) = sum.re;
            *im.offset(at) = sum.im;
        }
    }
}

impl<T: FftNum> PlanNode<T> for GenericPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        let twiddles: &[Complex<T>] = match self.twiddles.as_deref() {
            Some(table) => table,
            None => fft_error_dormant("generic twiddles"),
        };
        let mut column = vec![Complex::zero(); self.r];

        match &self.child {
            None => {
                // prime size: read everything before writing, so in place works too
                for (s, slot) in column.iter_mut().enumerate() {
                    let at = s as isize * self.is;
                    *slot = Complex::new(*ri.offset(at), *ii.offset(at));
                }
                let mut power = 0;
                for q in 0..self.n {
                    let mut sum = Complex::zero();
                    let mut index = 0;
                    for value in column.iter() {
                        sum = sum + *value * twiddles[index];
                        index += power;
                        if index >= self.n {
                            index -= self.n;
                        }
                    }
                    let at = q as isize * self.os;
                    *ro.offset(at) = sum.re;
                    *io.offset(at) = sum.im;
                    power += 1;
                }
            }
            Some(child) => {
                child.apply(ri, ii, ro, io);
                let m = self.n / self.r;
                let stride = m as isize * self.os;
                for k in 0..m {
                    let at = k as isize * self.os;
                    self.transform_column(twiddles, &mut column, k, ro.offset(at), io.offset(at), stride);
                }
            }
        }
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        if let Some(child) = &mut self.child {
            child.awake(cache, wakefulness);
        }
        let recipe = TwiddleRecipe::Generic { n: self.n };
        self.twiddles = Some(acquire_twiddles(cache, recipe, wakefulness));
    }

    fn sleep(&mut self) {
        if let Some(child) = &mut self.child {
            child.sleep();
        }
        self.twiddles = None;
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.child {
            Some(child) => write!(f, "(dft-generic-{}/{} {})", self.n, self.r, child),
            None => write!(f, "(dft-generic-{})", self.n),
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::flags::PlannerFlags;
    use crate::problem::Placement;
    use crate::test_utils::{compare_vectors, naive_dft, random_signal};
    use crate::FftDirection;

    fn check_generic(len: usize, placement: Placement) {
        let mut planner: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE);
        let problem = Problem::dft_1d(len, FftDirection::Forward, placement).unwrap();
        assert!(Solver::<f64>::applicable(&GenericSolver, &problem, &planner));
        let mut plan = GenericSolver.make_plan(&problem, &mut planner).unwrap();
        planner.awake(&mut plan);

        let input: Vec<Complex<f64>> = random_signal(len);
        let expected = naive_dft(&input);
        let actual = match placement {
            Placement::OutOfPlace => {
                let mut scratch_input = input.clone();
                let mut output = vec![Complex::zero(); len];
                plan.process_outofplace(&problem, &mut scratch_input, &mut output);
                output
            }
            Placement::InPlace => {
                let mut buffer = input.clone();
                plan.process_inplace(&problem, &mut buffer);
                buffer
            }
        };
        assert!(compare_vectors(&actual, &expected), "{}", plan);
    }

    #[test]
    fn test_generic_prime() {
        for len in [2, 3, 5, 11, 13, 31] {
            check_generic(len, Placement::OutOfPlace);
        }
        check_generic(7, Placement::InPlace);
    }

    #[test]
    fn test_generic_composite() {
        for len in [4, 15, 21, 49, 60] {
            check_generic(len, Placement::OutOfPlace);
        }
    }

    #[test]
    fn test_generic_signature() {
        let mut planner: Planner<f32> = Planner::new(PlannerFlags::ESTIMATE);
        let prime = Problem::dft_1d(13, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let plan = GenericSolver.make_plan(&prime, &mut planner).unwrap();
        assert_eq!(plan.signature(), "(dft-generic-13)");
        assert_eq!(Solver::<f32>::score(&GenericSolver, &prime, &planner), Score::Ugly);

        let composite = Problem::dft_1d(15, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let plan = GenericSolver.make_plan(&composite, &mut planner).unwrap();
        assert!(plan.signature().starts_with("(dft-generic-15/3 "), "{}", plan);
    }
}
