use std::fmt;

use crate::common::FftNum;
use crate::flags::PlannerFlags;
use crate::plan::{Plan, PlanKind, PlanNode, Wakefulness};
use crate::planner::{Planner, PlannerConfig};
use crate::problem::Problem;
use crate::solver::{Score, Solver};
use crate::tensor::{IoDim, Tensor};
use crate::twiddles::TwiddleCache;

/// Number of transforms staged per pass: as many as fit in the buffer budget, capped at
/// `max_nbuf`, preferring a nearby count that divides the vector length.
pub(crate) fn compute_nbuf(n: usize, vl: usize, max_nbuf: usize, max_buffer_len: usize) -> usize {
    let nbuf = max_nbuf.min((max_buffer_len / n.max(1)).max(1)).max(1);
    let lower = (nbuf / 4).max(1);
    let nbuf = (lower..=nbuf).rev().find(|i| vl % i == 0).unwrap_or(nbuf);
    nbuf.min(vl.max(1))
}

/// Distance in points between staged transforms.
pub(crate) fn compute_bufdist(n: usize, vl: usize, config: &PlannerConfig) -> usize {
    if vl == 1 {
        return n;
    }
    let modulus = config.buffer_skew_modulus.max(1);
    let skew = config.buffer_skew % modulus;
    n + (modulus + skew - n % modulus) % modulus
}

/// Transforms batches of `nbuf` vectors into a contiguous buffer, then copies each batch to the
/// output with a rank-0 plan. Vectors left over are handled by a third child.
#[derive(Clone, Copy, Debug)]
pub struct BufferedSolver {
    max_nbuf_index: usize,
}

impl BufferedSolver {
    pub fn new(max_nbuf_index: usize) -> Self {
        Self { max_nbuf_index }
    }

    fn max_nbuf(&self, config: &PlannerConfig) -> Option<usize> {
        config.buffered_max_nbufs.get(self.max_nbuf_index).copied()
    }

    fn nbuf<T>(&self, n: usize, vl: usize, config: &PlannerConfig) -> Option<usize> {
        Some(compute_nbuf(n, vl, self.max_nbuf(config)?, config.max_buffer_len::<T>()))
    }

    // an earlier instance already stages the same number of transforms
    fn redundant<T>(&self, n: usize, vl: usize, config: &PlannerConfig) -> bool {
        let max_buffer_len = config.max_buffer_len::<T>();
        let mine = self.nbuf::<T>(n, vl, config);
        config.buffered_max_nbufs[..self.max_nbuf_index.min(config.buffered_max_nbufs.len())]
            .iter()
            .any(|&max_nbuf| Some(compute_nbuf(n, vl, max_nbuf, max_buffer_len)) == mine)
    }
}

impl<T: FftNum> Solver<T> for BufferedSolver {
    fn name(&self) -> String {
        format!("dft-buffered/{}", self.max_nbuf_index)
    }

    fn applicable(&self, problem: &Problem, planner: &Planner<T>) -> bool {
        let flags = planner.flags();
        let config = planner.config();
        if flags.contains(PlannerFlags::NO_BUFFERING) || !problem.sz.has_rank(1) {
            return false;
        }
        let v = match problem.vecsz.as_loop() {
            Some(v) => v,
            None => return false,
        };
        let d = problem.sz.dim(0);
        if d.n > config.max_buffer_len::<T>() && flags.contains(PlannerFlags::CONSERVE_MEMORY) {
            return false;
        }
        let nbuf = match self.nbuf::<T>(d.n, v.n, config) {
            Some(nbuf) => nbuf,
            None => return false,
        };
        if self.redundant::<T>(d.n, v.n, config) {
            return false;
        }

        if !problem.is_inplace() {
            // the staged transforms write with stride 2, so they cannot recurse back here
            return d.os > 2;
        }
        problem.vecsz.has_rank(0)
            || (problem.sz.inplace_strides() && problem.vecsz.inplace_strides())
            || nbuf == v.n
    }

    fn score(&self, problem: &Problem, planner: &Planner<T>) -> Score {
        let too_big = problem.sz.dim(0).n > planner.config().max_buffer_len::<T>();
        if !problem.is_inplace() || too_big {
            Score::Ugly
        } else {
            Score::Good
        }
    }

    fn make_plan(&self, problem: &Problem, planner: &mut Planner<T>) -> Option<Plan<T>> {
        let d = problem.sz.dim(0);
        let v = problem.vecsz.as_loop()?;
        let n = d.n;
        let vl = v.n;
        let nbuf = self.nbuf::<T>(n, vl, planner.config())?;
        let bufdist = compute_bufdist(n, vl, planner.config());
        let (ivs, ovs) = if vl == 1 { (0, 0) } else { (v.is, v.os) };

        // keep the buffer's real/imaginary order the same as the input's
        let roffset = usize::from(problem.ii.distance(problem.ri) == Some(-1));
        let scratch = problem.free_scratch();
        let (br, bi) = (scratch.add(roffset as isize), scratch.add(1 - roffset as isize));
        let stride = 2 * bufdist as isize;

        let cld_problem = Problem::from_parts(
            Tensor::dim_1d(n, d.is, 2),
            Tensor::dim_1d(nbuf, ivs, stride),
            problem.ri,
            problem.ii,
            br,
            bi,
        );
        let cld = planner.plan(&cld_problem)?;

        let cldcpy_problem = Problem::from_parts(
            Tensor::rank_0(),
            Tensor::new(vec![IoDim::new(nbuf, stride, ovs), IoDim::new(n, 2, d.os)]),
            br,
            bi,
            problem.ro,
            problem.io,
        );
        let cldcpy = planner.plan(&cldcpy_problem)?;

        let passes = vl / nbuf;
        let rest = vl % nbuf;
        let cldrest = if rest > 0 {
            let start = (passes * nbuf) as isize;
            let rest_problem = Problem::from_parts(
                problem.sz.clone(),
                Tensor::dim_1d(rest, ivs, ovs),
                problem.ri.add(start * ivs),
                problem.ii.add(start * ivs),
                problem.ro.add(start * ovs),
                problem.io.add(start * ovs),
            );
            Some(Box::new(planner.plan(&rest_problem)?))
        } else {
            None
        };

        let mut ops = (cld.ops() + cldcpy.ops()).scale(passes as f64);
        if let Some(rest) = &cldrest {
            ops += rest.ops();
        }
        let node = BufferedPlan {
            n,
            vl,
            nbuf,
            bufdist,
            ivs,
            ovs,
            roffset,
            cld: Box::new(cld),
            cldcpy: Box::new(cldcpy),
            cldrest,
        };
        Some(Plan::new(PlanKind::Buffered(node), problem, ops))
    }
}

#[derive(Clone)]
pub struct BufferedPlan<T: FftNum> {
    n: usize,
    vl: usize,
    nbuf: usize,
    bufdist: usize,
    ivs: isize,
    ovs: isize,
    roffset: usize,
    cld: Box<Plan<T>>,
    cldcpy: Box<Plan<T>>,
    cldrest: Option<Box<Plan<T>>>,
}

impl<T: FftNum> PlanNode<T> for BufferedPlan<T> {
    unsafe fn apply(&self, ri: *mut T, ii: *mut T, ro: *mut T, io: *mut T) {
        let mut buffer = vec![T::zero(); 2 * self.nbuf * self.bufdist];
        let base = buffer.as_mut_ptr();
        let br = base.add(self.roffset);
        let bi = base.add(1 - self.roffset);

        let mut done = 0;
        while done + self.nbuf <= self.vl {
            let i = done as isize;
            self.cld.apply(ri.offset(i * self.ivs), ii.offset(i * self.ivs), br, bi);
            self.cldcpy.apply(br, bi, ro.offset(i * self.ovs), io.offset(i * self.ovs));
            done += self.nbuf;
        }

        if let Some(rest) = &self.cldrest {
            let i = done as isize;
            rest.apply(
                ri.offset(i * self.ivs),
                ii.offset(i * self.ivs),
                ro.offset(i * self.ovs),
                io.offset(i * self.ovs),
            );
        }
    }

    fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        self.cld.awake(cache, wakefulness);
        self.cldcpy.awake(cache, wakefulness);
        if let Some(rest) = &mut self.cldrest {
            rest.awake(cache, wakefulness);
        }
    }

    fn sleep(&mut self) {
        self.cld.sleep();
        self.cldcpy.sleep();
        if let Some(rest) = &mut self.cldrest {
            rest.sleep();
        }
    }

    fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "(dft-buffered-{}-x{}/{}-{} {} {}",
            self.n, self.vl, self.nbuf, self.bufdist, self.cld, self.cldcpy
        )?;
        if let Some(rest) = &self.cldrest {
            write!(f, " {}", rest)?;
        }
        f.write_str(")")
    }
}
