use std::fmt;
use std::sync::Arc;

use num_complex::Complex;
use num_traits::Zero;
use strength_reduce::StrengthReducedUsize;

use crate::common::{fft_error_dormant, FftNum};
use crate::flags::PlannerFlags;
use crate::math_utils::{first_divisor, is_prime, modular_exponent, primitive_root};
use crate::ops::OpCount;
use crate::plan::{acquire_twiddles, Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::{DataPtr, Problem};
use crate::solver::{Score, Solver};
use crate::tensor::Tensor;
use crate::twiddles::{standard_factors, TwiddleCache, TwiddleKey, TwiddleRecipe, TwiddleTable};

/// Computes prime-sized FFTs by turning them into a cyclic convolution of size `n - 1`.
///
/// The input is permuted by powers of a primitive root `g` of `n`, transformed, multiplied by a
/// precomputed kernel, and transformed back. The inverse transform reuses the forward child
/// through `dft(conj(x)) = conj(idft(x))`, so both children are forward transforms.
#[derive(Clone, Copy, Debug, Default)]
pub struct RaderSolver;

fn slow_forbidden<T: FftNum>(prime: usize, planner: &Planner<T>) -> bool {
    planner.flags().contains(PlannerFlags::NO_SLOW) && prime <= planner.config().rader_slow_limit
}

impl<T: FftNum> Solver<T> for RaderSolver {
    fn name(&self) -> String {
        "dft-rader".to_owned()
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        if !problem.sz.has_rank(1) || !problem.vecsz.has_rank(0) {
            return false;
        }
        let n = problem.sz.dim(0).n;
        n > 2 && is_prime(n) && !slow_forbidden(n, planner)
    }

    fn score(&self, problem: &Problem, planner: &Planner<T>) -> Score {
        if problem.sz.dim(0).n < planner.config().rader_min_prime {
            Score::Ugly
        } else {
            Score::Good
        }
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let d = problem.sz.dim(0);
        let convolution = RaderConvolution::new(d.n, d.os, problem, planner)?;
        let ops = convolution.ops();
        let node = RaderPlan { is: d.is, convolution };
        Some(Plan::new(PlanKind::Rader(node), problem, ops))
    }
}

/// The convolution shared by both Rader plans: a length `n - 1` transform pair around a
/// pointwise product with the kernel.
#[derive(Clone)]
pub(crate) struct RaderConvolution<T: FftNum> {
    n: usize,
    reduced_n: StrengthReducedUsize,
    // output stride between the n points
    os: isize,
    g: usize,
    ginv: usize,
    cld1: Box<Plan<T>>,
    cld2: Box<Plan<T>>,
    // transforms the kernel while it is being computed
    cld_omega: Box<Plan<T>>,
    omega: Option<Arc<TwiddleTable<T>>>,
}

impl<T: FftNum> RaderConvolution<T> {
    fn new(n: usize, os: isize, problem: &Problem, planner: &mut Planner<T>) -> Option<Self> {
        let g = primitive_root(n as u64)? as usize;
        let ginv = modular_exponent(g, n - 2, n);
        let len = n - 1;
        let (ro, io) = (problem.ro, problem.io);
        let scratch = problem.free_scratch();

        let cld1 = planner.plan(&Problem::from_parts(
            Tensor::dim_1d(len, 2, os),
            Tensor::rank_0(),
            scratch,
            scratch.add(1),
            ro.add(os),
            io.add(os),
        ))?;
        let cld2 = planner.plan(&Problem::from_parts(
            Tensor::dim_1d(len, os, 2),
            Tensor::rank_0(),
            ro.add(os),
            io.add(os),
            scratch,
            scratch.add(1),
        ))?;
        let kernel = DataPtr::scratch_after(&[scratch]);
        let cld_omega = planner.plan(&Problem::from_parts(
            Tensor::dim_1d(len, 2, 2),
            Tensor::rank_0(),
            scratch,
            scratch.add(1),
            kernel,
            kernel.add(1),
        ))?;

        Some(Self {
            n,
            reduced_n: StrengthReducedUsize::new(n),
            os,
            g,
            ginv,
            cld1: Box::new(cld1),
            cld2: Box::new(cld2),
            cld_omega: Box::new(cld_omega),
            omega: None,
        })
    }

    fn ops(&self) -> OpCount {
        let len = (self.n - 1) as f64;
        self.cld1.ops()
            + self.cld2.ops()
            + OpCount::new(len * 2.0 + 4.0, len * 4.0, 0.0, len * 14.0 + 6.0)
    }

    fn omega_recipe(&self) -> TwiddleRecipe {
        TwiddleRecipe::RaderOmega {
            n: self.n,
            ginv: self.ginv,
        }
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.cld1.awake(cache, wakefulness);
        self.cld2.awake(cache, wakefulness);

        let recipe = self.omega_recipe();
        let key = TwiddleKey::new(recipe, wakefulness == Wakefulness::Measuring);
        let cld_omega = &mut self.cld_omega;
        let len = self.n - 1;
        let omega = cache.acquire(key, || {
            let mut kernel: Vec<Complex<T>> = standard_factors(recipe);
            let mut transformed = vec![Complex::zero(); len];
            cld_omega.awake(cache, Wakefulness::Armed);
            unsafe {
                let input = kernel.as_mut_ptr() as *mut T;
                let output = transformed.as_mut_ptr() as *mut T;
                cld_omega.apply(input, input.add(1), output, output.add(1));
            }
            cld_omega.sleep();
            transformed
        });
        self.omega = Some(omega);
    }

    fn sleep(&mut self) {
        self.cld1.sleep();
        self.cld2.sleep();
        self.omega = None;
    }

    /// Transforms the `n` points at `(ro, io)` with stride `os`. `buf` holds the points
    /// `1..n` permuted by powers of `g`, and `x0` the point at index 0.
    unsafe fn run(&self, buf: &mut [Complex<T>], x0: Complex<T>, ro: *mut T, io: *mut T) {
        let omega: &[Complex<T>] = match self.omega.as_deref() {
            Some(table) => table,
            None => fft_error_dormant("rader convolution"),
        };
        let os = self.os;
        let len = self.n - 1;
        let base = buf.as_mut_ptr() as *mut T;

        // transform of the permuted input lands on output points 1..n
        self.cld1.apply(base, base.add(1), ro.offset(os), io.offset(os));

        *ro = x0.re + *ro.offset(os);
        *io = x0.im + *io.offset(os);

        // conjugated product, so that the forward cld2 computes an inverse transform
        for k in 0..len {
            let at = (k as isize + 1) * os;
            let value = Complex::new(*ro.offset(at), *io.offset(at)) * omega[k];
            *ro.offset(at) = value.re;
            *io.offset(at) = -value.im;
        }

        // adds x0 to every output after the inverse transform
        *ro.offset(os) = *ro.offset(os) + x0.re;
        *io.offset(os) = *io.offset(os) - x0.im;

        self.cld2.apply(ro.offset(os), io.offset(os), base, base.add(1));

        let mut gpower = 1;
        for value in buf[..len].iter() {
            let at = gpower as isize * os;
            *ro.offset(at) = value.re;
            *io.offset(at) = -value.im;
            gpower = (gpower * self.ginv) % self.reduced_n;
        }
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.cld1, self.cld2)
    }
}

#[derive(Clone)]
pub struct RaderPlan<T: FftNum> {
    is: isize,
    convolution: RaderConvolution<T>,
}

impl<T: FftNum> PlanNode<T> for RaderPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        let conv = &self.convolution;
        let mut buf = vec![Complex::zero(); conv.n - 1];

        let mut gpower = 1;
        for slot in buf.iter_mut() {
            let at = gpower as isize * self.is;
            *slot = Complex::new(*ri.offset(at), *ii.offset(at));
            gpower = (gpower * conv.g) % conv.reduced_n;
        }
        let x0 = Complex::new(*ri, *ii);

        conv.run(&mut buf, x0, ro, io);
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.convolution.awake(cache, wakefulness);
    }

    fn sleep(&mut self) {
        self.convolution.sleep();
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-rader-{}/{} ", self.convolution.n, self.convolution.g)?;
        self.convolution.print(f)?;
        f.write_str(")")
    }
}

/// A decimation-in-time step whose prime radix `r` is computed with Rader's algorithm. The
/// Cooley-Tukey twiddles are folded into the permutation, so each column costs one convolution.
#[derive(Clone, Copy, Debug, Default)]
pub struct RaderDitSolver;

impl RaderDitSolver {
    fn radix(problem: &Problem) -> Option<usize> {
        if !problem.sz.has_rank(1) || !problem.vecsz.has_rank(0) {
            return None;
        }
        let n = problem.sz.dim(0).n;
        if n < 2 {
            return None;
        }
        let r = first_divisor(n);
        (r > 2 && r < n).then_some(r)
    }
}

impl<T: FftNum> Solver<T> for RaderDitSolver {
    fn name(&self) -> String {
        "dft-rader-dit".to_owned()
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        Self::radix(problem).map_or(false, |r| !slow_forbidden(r, planner))
    }

    fn score(&self, problem: &Problem, planner: &Planner<T>) -> Score {
        match Self::radix(problem) {
            Some(r) if r >= planner.config().rader_min_prime => Score::Good,
            Some(_) => Score::Ugly,
            None => Score::Bad,
        }
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let r = Self::radix(problem)?;
        let d = problem.sz.dim(0);
        let m = d.n / r;
        let (rank, len) = (r as isize, m as isize);

        let child_problem = Problem::from_parts(
            Tensor::dim_1d(m, rank * d.is, d.os),
            Tensor::dim_1d(r, d.is, len * d.os),
            problem.ri,
            problem.ii,
            problem.ro,
            problem.io,
        );
        let child = planner.plan(&child_problem)?;
        let convolution = RaderConvolution::new(r, len * d.os, problem, planner)?;

        let twiddle_ops = OpCount::new(2.0 * (r - 1) as f64, 4.0 * (r - 1) as f64, 0.0, 2.0 * (r - 1) as f64);
        let ops = (convolution.ops() + twiddle_ops).scale(m as f64) + child.ops();
        let node = RaderDitPlan {
            m,
            os: d.os,
            convolution,
            child: Box::new(child),
            twiddles: None,
        };
        Some(Plan::new(PlanKind::RaderDit(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct RaderDitPlan<T: FftNum> {
    m: usize,
    os: isize,
    convolution: RaderConvolution<T>,
    child: Box<Plan<T>>,
    twiddles: Option<Arc<TwiddleTable<T>>>,
}

impl<T: FftNum> RaderDitPlan<T> {
    fn recipe(&self) -> TwiddleRecipe {
        TwiddleRecipe::RaderTwiddle {
            r: self.convolution.n,
            m: self.m,
            g: self.convolution.g,
        }
    }
}

impl<T: FftNum> PlanNode<T> for RaderDitPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        self.child.apply(ri, ii, ro, io);

        let twiddles: &[Complex<T>] = match self.twiddles.as_deref() {
            Some(table) => table,
            None => fft_error_dormant("rader twiddles"),
        };
        let conv = &self.convolution;
        let r = conv.n;
        let mut buf = vec![Complex::zero(); r - 1];

        for j in 0..self.m {
            let rj = ro.offset(j as isize * self.os);
            let ij = io.offset(j as isize * self.os);

            let mut gpower = 1;
            for (k, slot) in buf.iter_mut().enumerate() {
                let at = gpower as isize * conv.os;
                let value = Complex::new(*rj.offset(at), *ij.offset(at));
                // the first column needs no twiddles
                *slot = if j == 0 {
                    value
                } else {
                    value * twiddles[(j - 1) * (r - 1) + k]
                };
                gpower = (gpower * conv.g) % conv.reduced_n;
            }
            let x0 = Complex::new(*rj, *ij);

            conv.run(&mut buf, x0, rj, ij);
        }
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.child.awake(cache, wakefulness);
        self.convolution.awake(cache, wakefulness);
        self.twiddles = Some(acquire_twiddles(cache, self.recipe(), wakefulness));
    }

    fn sleep(&mut self) {
        self.child.sleep();
        self.convolution.sleep();
        self.twiddles = None;
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-rader-dit-{}x{} ", self.convolution.n, self.m)?;
        self.convolution.print(f)?;
        write!(f, " {})", self.child)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::problem::Placement;
    use crate::test_utils::{compare_vectors, naive_dft, random_signal};
    use crate::FftDirection;

    fn check_plan(plan: &mut Plan<f64>, planner: &Planner<f64>, problem: &Problem, len: usize) {
        planner.awake(plan);
        let input: Vec<Complex<f64>> = random_signal(len);
        let expected = naive_dft(&input);
        let actual = if problem.is_inplace() {
            let mut buffer = input.clone();
            plan.process_inplace(problem, &mut buffer);
            buffer
        } else {
            let mut scratch_input = input.clone();
            let mut output = vec![Complex::zero(); len];
            plan.process_outofplace(problem, &mut scratch_input, &mut output);
            output
        };
        assert!(compare_vectors(&actual, &expected), "{}", plan);
    }

    #[test]
    fn test_rader() {
        let mut planner: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE);
        for (len, placement) in [
            (3, Placement::OutOfPlace),
            (13, Placement::OutOfPlace),
            (17, Placement::InPlace),
            (53, Placement::OutOfPlace),
        ] {
            let problem = Problem::dft_1d(len, FftDirection::Forward, placement).unwrap();
            assert!(Solver::<f64>::applicable(&RaderSolver, &problem, &planner), "{}", len);
            let mut plan = RaderSolver.make_plan(&problem, &mut planner).unwrap();
            check_plan(&mut plan, &planner, &problem, len);
        }
    }

    #[test]
    fn test_rader_score() {
        let planner: Planner<f32> = Planner::new(PlannerFlags::ESTIMATE);
        let small = Problem::dft_1d(13, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let large = Problem::dft_1d(59, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let composite = Problem::dft_1d(15, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        assert_eq!(Solver::<f32>::score(&RaderSolver, &small, &planner), Score::Ugly);
        assert_eq!(Solver::<f32>::score(&RaderSolver, &large, &planner), Score::Good);
        assert!(!Solver::<f32>::applicable(&RaderSolver, &composite, &planner));

        let no_slow: Planner<f32> = Planner::new(PlannerFlags::ESTIMATE | PlannerFlags::NO_SLOW);
        assert!(!Solver::<f32>::applicable(&RaderSolver, &small, &no_slow));
        assert!(Solver::<f32>::applicable(&RaderSolver, &large, &no_slow));
    }

    #[test]
    fn test_omega_is_shared() {
        let mut planner: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE);
        let problem = Problem::dft_1d(13, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let mut first = RaderSolver.make_plan(&problem, &mut planner).unwrap();
        let mut second = first.clone();
        planner.awake(&mut first);
        planner.awake(&mut second);

        // 13 = 2 * 6 + 1, g = 2, ginv = 7
        let key = TwiddleKey::new(TwiddleRecipe::RaderOmega { n: 13, ginv: 7 }, false);
        assert_eq!(planner.twiddle_cache().ref_count(&key), 2);
        first.sleep();
        assert_eq!(planner.twiddle_cache().ref_count(&key), 1);
        second.sleep();
        assert_eq!(planner.twiddle_cache().ref_count(&key), 0);
    }

    #[test]
    fn test_rader_dit() {
        let mut planner: Planner<f64> = Planner::new(PlannerFlags::ESTIMATE);
        for len in [9, 35, 39] {
            let problem = Problem::dft_1d(len, FftDirection::Forward, Placement::OutOfPlace).unwrap();
            assert!(Solver::<f64>::applicable(&RaderDitSolver, &problem, &planner), "{}", len);
            let mut plan = RaderDitSolver.make_plan(&problem, &mut planner).unwrap();
            assert!(plan.signature().starts_with("(dft-rader-dit-"), "{}", plan);
            check_plan(&mut plan, &planner, &problem, len);
        }

        // primes and radix 2 are left to other solvers
        let prime = Problem::dft_1d(13, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let even = Problem::dft_1d(26, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        assert!(!Solver::<f64>::applicable(&RaderDitSolver, &prime, &planner));
        assert!(!Solver::<f64>::applicable(&RaderDitSolver, &even, &planner));
    }
}
