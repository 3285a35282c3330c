//! Twiddle stages: the `r`-point butterflies, with twiddle factors, that a Cooley-Tukey plan runs
//! in place over the `m` sub-transforms of size `n / r`.

use std::fmt;
use std::sync::Arc;

use num_complex::Complex;
use num_traits::Zero;

use super::butterflies::Codelet;
use super::direct::batch_size;
use crate::array_utils::{LoadStore, SplitPtr, TwiddleOnLoad, TwiddleOnStore};
use crate::common::{fft_error_dormant, FftNum};
use crate::flags::PlannerFlags;
use crate::ops::OpCount;
use crate::plan::{acquire_twiddles, Plan, Wakefulness};
use crate::planner::Planner;
use crate::problem::{DataPtr, Problem};
use crate::tensor::{IoDim, Tensor};
use crate::twiddles::{two_level_factor, two_level_log2, TwiddleCache, TwiddleRecipe, TwiddleTable};

/// Which side of the recursion the twiddle stage runs on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Decimation {
    /// Decimation in time: sub-transforms first, then the stage on the output.
    Dit,
    /// Decimation in frequency: the stage on the input first, then the sub-transforms.
    Dif,
}

impl fmt::Display for Decimation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decimation::Dit => "dit",
            Decimation::Dif => "dif",
        })
    }
}

/// Transforms above this size use two-level twiddle tables rather than a full one.
const LARGE_TRANSFORM: usize = 65536;

/// Points of padding after each column of the generic stage's batch buffer.
const GENERICBUF_PADDING: usize = 16;

/// How a stage computes its butterflies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StageKind {
    /// A hardcoded codelet with its twiddles fused in.
    Direct,
    /// A hardcoded codelet run over batches of columns copied to a contiguous buffer.
    DirectBuf,
    /// A full twiddle pass, then an arbitrary `r`-point sub-plan.
    Dft,
    /// As `Dft`, with factors rebuilt from a two-level table.
    DftTwoLevel,
    /// Batches of `batch` columns are twiddled into a buffer, transformed there by a sub-plan and
    /// copied back.
    GenericBuf { batch: usize },
}

impl fmt::Display for StageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKind::Direct => f.write_str("direct"),
            StageKind::DirectBuf => f.write_str("directbuf"),
            StageKind::Dft => f.write_str("dft"),
            StageKind::DftTwoLevel => f.write_str("dft2"),
            StageKind::GenericBuf { batch } => write!(f, "genericbuf/{}", batch),
        }
    }
}

/// Geometry of a stage: `vl` repetitions `vs` apart, each made of `m` butterflies `s` apart whose
/// `r` points sit `m * s` apart.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StageShape {
    pub r: usize,
    pub m: usize,
    pub s: isize,
    pub vl: usize,
    pub vs: isize,
}

impl StageShape {
    pub fn n(&self) -> usize {
        self.r * self.m
    }

    #[inline(always)]
    fn point(&self, v: usize, j: usize, k: usize) -> isize {
        v as isize * self.vs + (j * self.m + k) as isize * self.s
    }
}

// a radix that leaves too little work per butterfly column is only a last resort
fn ct_ugly(min_n: usize, shape: &StageShape) -> bool {
    let n = shape.n();
    n <= min_n || (n.is_power_of_two() && shape.vl * shape.m <= 4)
}

impl StageKind {
    pub fn applicable(self, dec: Decimation, shape: &StageShape, flags: PlannerFlags) -> bool {
        let StageShape { r, m, vl, .. } = *shape;
        match self {
            StageKind::Direct => Codelet::<f64>::SIZES.contains(&r),
            StageKind::DirectBuf => {
                Codelet::<f64>::SIZES.contains(&r) && dec == Decimation::Dit && vl == 1
            }
            StageKind::Dft => {
                !(flags.contains(PlannerFlags::CONSERVE_MEMORY) && shape.n() > LARGE_TRANSFORM)
            }
            StageKind::DftTwoLevel => true,
            StageKind::GenericBuf { batch } => {
                dec == Decimation::Dit
                    && vl == 1
                    && batch > 0
                    && m >= batch
                    && m % batch == 0
                    && r >= 64
                    && m >= r
            }
        }
    }

    pub fn is_ugly(self, shape: &StageShape) -> bool {
        match self {
            StageKind::Direct | StageKind::Dft => ct_ugly(16, shape),
            StageKind::DirectBuf => ct_ugly(512, shape),
            StageKind::DftTwoLevel => shape.n() <= LARGE_TRANSFORM,
            StageKind::GenericBuf { .. } => shape.n() < LARGE_TRANSFORM,
        }
    }

    /// Plans a stage running in place over the data at `(re, im)`.
    pub fn make<T: FftNum>(
        self,
        dec: Decimation,
        shape: StageShape,
        re: DataPtr,
        im: DataPtr,
        planner: &mut Planner<T>,
    ) -> Option<StagePlan<T>> {
        let StageShape { r, m, s, vl, vs } = shape;
        let butterflies = (m * vl) as f64;
        let twiddle_mults = ((r - 1) * m * vl) as f64;

        let (algorithm, ops) = match self {
            StageKind::Direct => {
                let codelet = Codelet::new(r)?;
                let ops = codelet.twiddled_ops().scale(butterflies);
                (StageAlgorithm::Direct(codelet), ops)
            }
            StageKind::DirectBuf => {
                let codelet = Codelet::new(r)?;
                let ops = codelet
                    .twiddled_ops()
                    .scale(butterflies)
                    .madd(butterflies, OpCount::moves(4.0 * r as f64));
                let batch = batch_size(r);
                (StageAlgorithm::DirectBuf { codelet, batch }, ops)
            }
            StageKind::Dft | StageKind::DftTwoLevel => {
                let child_problem = Problem::from_parts(
                    Tensor::dim_1d(r, m as isize * s, m as isize * s),
                    Tensor::new(vec![IoDim::new(m, s, s), IoDim::new(vl, vs, vs)]),
                    re,
                    im,
                    re,
                    im,
                );
                let child = Box::new(planner.plan(&child_problem)?);
                if self == StageKind::Dft {
                    let ops = child.ops().madd(twiddle_mults, OpCount::new(2.0, 4.0, 0.0, 0.0));
                    (StageAlgorithm::Dft(child), ops)
                } else {
                    let ops = child.ops().madd(twiddle_mults, OpCount::new(4.0, 8.0, 0.0, 0.0));
                    let log2_radix = two_level_log2(shape.n());
                    (StageAlgorithm::DftTwoLevel { child, log2_radix }, ops)
                }
            }
            StageKind::GenericBuf { batch } => {
                let bufdist = (r + GENERICBUF_PADDING) as isize;
                let scratch = DataPtr::scratch_after(&[re, im]);
                let child_problem = Problem::from_parts(
                    Tensor::dim_1d(r, 2, 2),
                    Tensor::dim_1d(batch, 2 * bufdist, 2 * bufdist),
                    scratch,
                    scratch.add(1),
                    scratch,
                    scratch.add(1),
                );
                let child = Box::new(planner.plan(&child_problem)?);
                let batches = (m / batch) as f64;
                let ops = child
                    .ops()
                    .scale(batches)
                    .madd((r * m) as f64, OpCount::new(4.0, 8.0, 0.0, 4.0));
                let log2_radix = two_level_log2(shape.n());
                (
                    StageAlgorithm::GenericBuf {
                        child,
                        batch,
                        log2_radix,
                    },
                    ops,
                )
            }
        };

        Some(StagePlan {
            dec,
            shape,
            algorithm,
            twiddles: None,
            ops,
        })
    }
}

#[derive(Clone)]
enum StageAlgorithm<T: FftNum> {
    Direct(Codelet<T>),
    DirectBuf { codelet: Codelet<T>, batch: usize },
    Dft(Box<Plan<T>>),
    DftTwoLevel { child: Box<Plan<T>>, log2_radix: u32 },
    GenericBuf {
        child: Box<Plan<T>>,
        batch: usize,
        log2_radix: u32,
    },
}

/// A planned twiddle stage. Owned by the Cooley-Tukey plan that created it.
#[derive(Clone)]
pub struct StagePlan<T: FftNum> {
    dec: Decimation,
    shape: StageShape,
    algorithm: StageAlgorithm<T>,
    twiddles: Option<Arc<TwiddleTable<T>>>,
    ops: OpCount,
}

impl<T: FftNum> StagePlan<T> {
    pub fn ops(&self) -> OpCount {
        self.ops
    }

    fn recipe(&self) -> TwiddleRecipe {
        let StageShape { r, m, .. } = self.shape;
        match &self.algorithm {
            StageAlgorithm::Direct(_) | StageAlgorithm::DirectBuf { .. } => {
                TwiddleRecipe::Codelet { r, m }
            }
            StageAlgorithm::Dft(_) => TwiddleRecipe::Transposed { r, m },
            StageAlgorithm::DftTwoLevel { log2_radix, .. }
            | StageAlgorithm::GenericBuf { log2_radix, .. } => TwiddleRecipe::TwoLevel {
                n: r * m,
                log2_radix: *log2_radix,
            },
        }
    }

    fn child_mut(&mut self) -> Option<&mut Plan<T>> {
        match &mut self.algorithm {
            StageAlgorithm::Dft(child)
            | StageAlgorithm::DftTwoLevel { child, .. }
            | StageAlgorithm::GenericBuf { child, .. } => Some(child),
            StageAlgorithm::Direct(_) | StageAlgorithm::DirectBuf { .. } => None,
        }
    }

    pub fn awake(&mut self, cache: &TwiddleCache<T>, wakefulness: Wakefulness) {
        if let Some(child) = self.child_mut() {
            child.awake(cache, wakefulness);
        }
        self.twiddles = Some(acquire_twiddles(cache, self.recipe(), wakefulness));
    }

    pub fn sleep(&mut self) {
        if let Some(child) = self.child_mut() {
            child.sleep();
        }
        self.twiddles = None;
    }

    fn factors(&self) -> &[Complex<T>] {
        match self.twiddles.as_deref() {
            Some(table) => table,
            None => fft_error_dormant("twiddle stage"),
        }
    }

    /// Runs the stage in place over the split data at `(rio, iio)`.
    pub unsafe fn apply(&self, rio: *mut T, iio: *mut T) {
        let twiddles = self.factors();
        match &self.algorithm {
            StageAlgorithm::Direct(codelet) => self.apply_direct(codelet, twiddles, rio, iio),
            StageAlgorithm::DirectBuf { codelet, batch } => {
                self.apply_directbuf(codelet, *batch, twiddles, rio, iio)
            }
            StageAlgorithm::Dft(child) => {
                let m = self.shape.m;
                self.apply_dft(child, rio, iio, |j, k| twiddles[(j - 1) * m + k])
            }
            StageAlgorithm::DftTwoLevel { child, log2_radix } => {
                self.apply_dft(child, rio, iio, |j, k| {
                    two_level_factor(twiddles, *log2_radix, j * k)
                })
            }
            StageAlgorithm::GenericBuf {
                child,
                batch,
                log2_radix,
            } => self.apply_genericbuf(child, *batch, *log2_radix, twiddles, rio, iio),
        }
    }

    unsafe fn apply_direct(&self, codelet: &Codelet<T>, twiddles: &[Complex<T>], rio: *mut T, iio: *mut T) {
        let StageShape { r, m, s, vl, .. } = self.shape;
        let data = SplitPtr::new(rio, iio, m as isize * s);
        for v in 0..vl {
            for k in 0..m {
                let column = data.offset(self.shape.point(v, 0, k));
                let factors = &twiddles[k * (r - 1)..(k + 1) * (r - 1)];
                match self.dec {
                    Decimation::Dit => codelet.perform(TwiddleOnLoad {
                        inner: column,
                        twiddles: factors,
                    }),
                    Decimation::Dif => codelet.perform(TwiddleOnStore {
                        inner: column,
                        twiddles: factors,
                    }),
                }
            }
        }
    }

    unsafe fn apply_directbuf(
        &self,
        codelet: &Codelet<T>,
        batch: usize,
        twiddles: &[Complex<T>],
        rio: *mut T,
        iio: *mut T,
    ) {
        let StageShape { r, m, s, .. } = self.shape;
        let data = SplitPtr::new(rio, iio, m as isize * s);
        let mut buffer = vec![Complex::<T>::zero(); batch * r];
        let base = buffer.as_mut_ptr() as *mut T;
        // element j of column c lives at buffer[j * batch + c]
        let staged = SplitPtr::new(base, base.add(1), 2 * batch as isize);

        let mut k0 = 0;
        while k0 < m {
            let columns = batch.min(m - k0);
            for c in 0..columns {
                let column = data.offset((k0 + c) as isize * s);
                let mut slot = staged.offset(2 * c as isize);
                for j in 0..r {
                    slot.store(column.load(j), j);
                }
            }
            for c in 0..columns {
                let k = k0 + c;
                codelet.perform(TwiddleOnLoad {
                    inner: staged.offset(2 * c as isize),
                    twiddles: &twiddles[k * (r - 1)..(k + 1) * (r - 1)],
                });
            }
            for c in 0..columns {
                let mut column = data.offset((k0 + c) as isize * s);
                let slot = staged.offset(2 * c as isize);
                for j in 0..r {
                    column.store(slot.load(j), j);
                }
            }
            k0 += columns;
        }
    }

    unsafe fn apply_dft(
        &self,
        child: &Plan<T>,
        rio: *mut T,
        iio: *mut T,
        factor: impl Fn(usize, usize) -> Complex<T>,
    ) {
        if self.dec == Decimation::Dif {
            child.apply(rio, iio, rio, iio);
        }

        let StageShape { r, m, vl, .. } = self.shape;
        let data = SplitPtr::new(rio, iio, 0);
        for v in 0..vl {
            for j in 1..r {
                for k in 0..m {
                    let mut point = data.offset(self.shape.point(v, j, k));
                    let value = point.load(0);
                    point.store(value * factor(j, k), 0);
                }
            }
        }

        if self.dec == Decimation::Dit {
            child.apply(rio, iio, rio, iio);
        }
    }

    unsafe fn apply_genericbuf(
        &self,
        child: &Plan<T>,
        batch: usize,
        log2_radix: u32,
        twiddles: &[Complex<T>],
        rio: *mut T,
        iio: *mut T,
    ) {
        let StageShape { r, m, s, .. } = self.shape;
        let bufdist = r + GENERICBUF_PADDING;
        let data = SplitPtr::new(rio, iio, m as isize * s);
        let mut buffer = vec![Complex::<T>::zero(); batch * bufdist];

        for k0 in (0..m).step_by(batch) {
            for c in 0..batch {
                let k = k0 + c;
                let column = data.offset(k as isize * s);
                let row = &mut buffer[c * bufdist..c * bufdist + r];
                for (j, slot) in row.iter_mut().enumerate() {
                    *slot = column.load(j) * two_level_factor(twiddles, log2_radix, j * k);
                }
            }

            let base = buffer.as_mut_ptr() as *mut T;
            child.apply(base, base.add(1), base, base.add(1));

            for c in 0..batch {
                let mut column = data.offset((k0 + c) as isize * s);
                for j in 0..r {
                    column.store(buffer[c * bufdist + j], j);
                }
            }
        }
    }

    pub fn print(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let StageShape { r, m, vl, .. } = self.shape;
        match &self.algorithm {
            StageAlgorithm::Direct(_) => write!(f, "(dftw-direct-{}-{}x{})", r, m, vl),
            StageAlgorithm::DirectBuf { batch, .. } => {
                write!(f, "(dftw-directbuf/{}-{}-{})", batch, r, m)
            }
            StageAlgorithm::Dft(child) => write!(f, "(dftw-dft-{}-{}x{} {})", r, m, vl, child),
            StageAlgorithm::DftTwoLevel { child, log2_radix } => {
                write!(f, "(dftw-dft2/{}-{}-{}x{} {})", log2_radix, r, m, vl, child)
            }
            StageAlgorithm::GenericBuf { child, batch, .. } => {
                write!(f, "(dftw-genericbuf/{}-{}-{} {})", batch, r, m, child)
            }
        }
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    fn shape(r: usize, m: usize, vl: usize) -> StageShape {
        StageShape {
            r,
            m,
            s: 2,
            vl,
            vs: 2 * (r * m) as isize,
        }
    }

    #[test]
    fn test_ugliness() {
        assert!(StageKind::Direct.is_ugly(&shape(2, 6, 1)));
        assert!(!StageKind::Direct.is_ugly(&shape(4, 8, 1)));
        // power of two with a single short column
        assert!(StageKind::Direct.is_ugly(&shape(8, 4, 1)));
        assert!(!StageKind::Direct.is_ugly(&shape(5, 4, 1)));
        assert!(StageKind::DirectBuf.is_ugly(&shape(8, 64, 1)));
        assert!(StageKind::DftTwoLevel.is_ugly(&shape(256, 256, 1)));
        assert!(!StageKind::DftTwoLevel.is_ugly(&shape(256, 512, 1)));
    }

    #[test]
    fn test_applicability() {
        let flags = PlannerFlags::ESTIMATE;
        assert!(StageKind::Direct.applicable(Decimation::Dif, &shape(8, 3, 2), flags));
        assert!(!StageKind::Direct.applicable(Decimation::Dit, &shape(9, 3, 1), flags));
        assert!(!StageKind::DirectBuf.applicable(Decimation::Dif, &shape(4, 3, 1), flags));
        assert!(!StageKind::DirectBuf.applicable(Decimation::Dit, &shape(4, 3, 2), flags));

        let big = shape(512, 256, 1);
        assert!(StageKind::Dft.applicable(Decimation::Dit, &big, flags));
        assert!(!StageKind::Dft.applicable(Decimation::Dit, &big, flags | PlannerFlags::CONSERVE_MEMORY));

        let generic = StageKind::GenericBuf { batch: 8 };
        assert!(generic.applicable(Decimation::Dit, &shape(64, 128, 1), flags));
        assert!(!generic.applicable(Decimation::Dif, &shape(64, 128, 1), flags));
        assert!(!generic.applicable(Decimation::Dit, &shape(32, 128, 1), flags));
        assert!(!generic.applicable(Decimation::Dit, &shape(64, 60, 1), flags));
    }
}
