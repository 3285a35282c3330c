use std::fmt;

use super::twiddle_stage::{StageKind, StagePlan, StageShape};
use crate::common::FftNum;
use crate::flags::PlannerFlags;
use crate::math_utils::{first_divisor, largest_prime_factor, sqrt_of_quotient};
use crate::plan::{Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::Planner;
use crate::problem::Problem;
use crate::solver::{Score, Solver};
use crate::tensor::{IoDim, Tensor};
use crate::twiddles::TwiddleCache;

pub use super::twiddle_stage::Decimation;

/// How a Cooley-Tukey solver picks its radix `r` for a size `n`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RadixChoice {
    Fixed(usize),
    FirstDivisor,
    LargestPrimeFactor,
    /// `r` such that `n = k * r * r`.
    SqrtOfQuotient(usize),
}

impl RadixChoice {
    /// The radix for `n`, if it gives a proper split `1 < r < n`.
    pub fn choose(self, n: usize) -> Option<usize> {
        if n < 4 {
            return None;
        }
        let r = match self {
            RadixChoice::Fixed(r) => r,
            RadixChoice::FirstDivisor => first_divisor(n),
            RadixChoice::LargestPrimeFactor => largest_prime_factor(n),
            RadixChoice::SqrtOfQuotient(k) => sqrt_of_quotient(n, k)?,
        };
        (r > 1 && r < n && n % r == 0).then_some(r)
    }
}

impl fmt::Display for RadixChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RadixChoice::Fixed(r) => write!(f, "{}", r),
            RadixChoice::FirstDivisor => f.write_str("first-divisor"),
            RadixChoice::LargestPrimeFactor => f.write_str("largest-prime-factor"),
            RadixChoice::SqrtOfQuotient(k) => write!(f, "sqrt-quotient-{}", k),
        }
    }
}

/// Splits a size-`n` transform into `r` transforms of size `m = n / r` and a twiddle stage.
///
/// With decimation in time the sub-transforms read the input with stride `r * is` and write
/// consecutive blocks of the output, then the stage combines them in place on the output. With
/// decimation in frequency the stage runs in place on the input first, so the input must be
/// destroyable.
#[derive(Clone, Copy, Debug)]
pub struct CooleyTukeySolver {
    radix: RadixChoice,
    dec: Decimation,
    stage: StageKind,
}

struct Split {
    r: usize,
    m: usize,
    d: IoDim,
    v: IoDim,
    shape: StageShape,
}

impl CooleyTukeySolver {
    pub fn new(radix: RadixChoice, dec: Decimation, stage: StageKind) -> Self {
        Self { radix, dec, stage }
    }

    fn split(&self, problem: &Problem) -> Option<Split> {
        if !problem.sz.has_rank(1) {
            return None;
        }
        let d = problem.sz.dim(0);
        let v = problem.vecsz.as_loop()?;
        let r = self.radix.choose(d.n)?;
        let m = d.n / r;
        let shape = match self.dec {
            Decimation::Dit => StageShape {
                r,
                m,
                s: d.os,
                vl: v.n,
                vs: v.os,
            },
            Decimation::Dif => StageShape {
                r,
                m,
                s: d.is,
                vl: v.n,
                vs: v.is,
            },
        };
        Some(Split { r, m, d, v, shape })
    }
}

impl<T: FftNum> Solver<T> for CooleyTukeySolver {
    fn name(&self) -> String {
        format!("dft-ct-{}/{}-{}", self.dec, self.radix, self.stage)
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        let split = match self.split(problem) {
            Some(split) => split,
            None => return false,
        };
        if self.dec == Decimation::Dif
            && !problem.is_inplace()
            && !planner.flags().contains(PlannerFlags::DESTROY_INPUT)
        {
            return false;
        }
        self.stage.applicable(self.dec, &split.shape, planner.flags())
    }

    fn score(&self, problem: &Problem, _planner: &Planner<T>) -> Score {
        match self.split(problem) {
            Some(split) if self.stage.is_ugly(&split.shape) => Score::Ugly,
            Some(_) => Score::Good,
            None => Score::Bad,
        }
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let Split { r, m, d, v, shape } = self.split(problem)?;
        let (ri, ii, ro, io) = (problem.ri, problem.ii, problem.ro, problem.io);
        let rank = r as isize;
        let len = m as isize;

        let (stage, child_problem) = match self.dec {
            Decimation::Dit => {
                let stage = self.stage.make(Decimation::Dit, shape, ro, io, planner)?;
                let child = Problem::from_parts(
                    Tensor::dim_1d(m, rank * d.is, d.os),
                    Tensor::new(vec![IoDim::new(r, d.is, len * d.os), v]),
                    ri,
                    ii,
                    ro,
                    io,
                );
                (stage, child)
            }
            Decimation::Dif => {
                let stage = self.stage.make(Decimation::Dif, shape, ri, ii, planner)?;
                let child = Problem::from_parts(
                    Tensor::dim_1d(m, d.is, rank * d.os),
                    Tensor::new(vec![IoDim::new(r, len * d.is, d.os), v]),
                    ri,
                    ii,
                    ro,
                    io,
                );
                (stage, child)
            }
        };
        let child = planner.plan(&child_problem)?;

        let ops = stage.ops() + child.ops();
        let node = CooleyTukeyPlan {
            dec: self.dec,
            r,
            stage,
            child: Box::new(child),
        };
        Some(Plan::new(PlanKind::CooleyTukey(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct CooleyTukeyPlan<T: FftNum> {
    dec: Decimation,
    r: usize,
    stage: StagePlan<T>,
    child: Box<Plan<T>>,
}

impl<T: FftNum> PlanNode<T> for CooleyTukeyPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        match self.dec {
            Decimation::Dit => {
                self.child.apply(ri, ii, ro, io);
                self.stage.apply(ro, io);
            }
            Decimation::Dif => {
                self.stage.apply(ri, ii);
                self.child.apply(ri, ii, ro, io);
            }
        }
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.stage.awake(cache, wakefulness);
        self.child.awake(cache, wakefulness);
    }

    fn sleep(&mut self) {
        self.stage.sleep();
        self.child.sleep();
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(dft-ct-{}/{} ", self.dec, self.r)?;
        self.stage.print(f)?;
        write!(f, " {})", self.child)
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use crate::problem::Placement;
    use crate::test_utils::{compare_vectors, naive_dft, random_signal};
    use crate::FftDirection;
    use num_complex::Complex;
    use num_traits::Zero;

    #[test]
    fn test_radix_choice() {
        assert_eq!(RadixChoice::Fixed(4).choose(12), Some(4));
        assert_eq!(RadixChoice::Fixed(5).choose(12), None);
        assert_eq!(RadixChoice::Fixed(4).choose(4), None);
        assert_eq!(RadixChoice::FirstDivisor.choose(45), Some(3));
        assert_eq!(RadixChoice::FirstDivisor.choose(13), None);
        assert_eq!(RadixChoice::LargestPrimeFactor.choose(45), Some(5));
        assert_eq!(RadixChoice::SqrtOfQuotient(2).choose(128), Some(8));
        assert_eq!(RadixChoice::SqrtOfQuotient(1).choose(128), None);
    }

    fn check_solver(solver: CooleyTukeySolver, len: usize, flags: PlannerFlags, placement: Placement) {
        let mut planner: Planner<f64> = Planner::new(flags);
        let problem = Problem::dft_1d(len, FftDirection::Forward, placement).unwrap();
        assert!(Solver::<f64>::applicable(&solver, &problem, &planner), "{}", Solver::<f64>::name(&solver));
        let mut plan = solver.make_plan(&problem, &mut planner).unwrap();
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
    fn test_dit_stages() {
        let oop = Placement::OutOfPlace;
        let flags = PlannerFlags::ESTIMATE;
        check_solver(CooleyTukeySolver::new(RadixChoice::Fixed(4), Decimation::Dit, StageKind::Direct), 48, flags, oop);
        check_solver(CooleyTukeySolver::new(RadixChoice::Fixed(3), Decimation::Dit, StageKind::DirectBuf), 45, flags, oop);
        check_solver(CooleyTukeySolver::new(RadixChoice::FirstDivisor, Decimation::Dit, StageKind::Dft), 55, flags, oop);
        check_solver(CooleyTukeySolver::new(RadixChoice::LargestPrimeFactor, Decimation::Dit, StageKind::DftTwoLevel), 42, flags, oop);
        check_solver(
            CooleyTukeySolver::new(RadixChoice::SqrtOfQuotient(1), Decimation::Dit, StageKind::GenericBuf { batch: 8 }),
            64 * 64,
            flags,
            oop,
        );
    }

    #[test]
    fn test_dif_stages() {
        let flags = PlannerFlags::ESTIMATE;
        check_solver(CooleyTukeySolver::new(RadixChoice::Fixed(8), Decimation::Dif, StageKind::Direct), 64, flags, Placement::InPlace);
        check_solver(
            CooleyTukeySolver::new(RadixChoice::FirstDivisor, Decimation::Dif, StageKind::Dft),
            35,
            flags | PlannerFlags::DESTROY_INPUT,
            Placement::OutOfPlace,
        );

        let planner: Planner<f32> = Planner::new(flags);
        let problem = Problem::dft_1d(64, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let dif = CooleyTukeySolver::new(RadixChoice::Fixed(8), Decimation::Dif, StageKind::Direct);
        assert!(!Solver::<f32>::applicable(&dif, &problem, &planner));
    }

    #[test]
    fn test_signature() {
        let mut planner: Planner<f32> = Planner::new(PlannerFlags::ESTIMATE);
        let problem = Problem::dft_1d(12, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let solver = CooleyTukeySolver::new(RadixChoice::Fixed(2), Decimation::Dit, StageKind::Direct);
        assert_eq!(Solver::<f32>::score(&solver, &problem, &planner), Score::Ugly);
        let plan = solver.make_plan(&problem, &mut planner).unwrap();
        assert_eq!(plan.signature(), "(dft-ct-dit/2 (dftw-direct-2-6x1) (dft-direct-6-x2))");
    }
}
