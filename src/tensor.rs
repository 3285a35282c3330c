//! Shape descriptors: ordered lists of (extent, input stride, output stride) triples.
//!
//! Strides count scalars of the transform's element type, so an interleaved complex array has
//! stride 2 and its imaginary parts sit one scalar after the real parts.

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};

/// One dimension of a shape: `n` points, `is` scalars apart in the input and `os` apart in the output.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IoDim {
    pub n: usize,
    pub is: isize,
    pub os: isize,
}

impl IoDim {
    pub const fn new(n: usize, is: isize, os: isize) -> Self {
        Self { n, is, os }
    }

    fn max_abs_stride(&self) -> usize {
        self.is.unsigned_abs().max(self.os.unsigned_abs())
    }
    fn min_abs_stride(&self) -> usize {
        self.is.unsigned_abs().min(self.os.unsigned_abs())
    }

    // `self` directly encloses `inner`, so the pair can be walked as a single dimension
    fn strides_contiguous(&self, inner: &IoDim) -> bool {
        self.is == inner.is * inner.n as isize && self.os == inner.os * inner.n as isize
    }
}

/// Which stride is kept when a tensor is made in-place.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InPlaceKind {
    /// Output strides become the input strides.
    Is,
    /// Input strides become the output strides.
    Os,
}

/// A shape descriptor of finite rank, or the absorbing "minus infinity" rank meaning there is
/// nothing to compute.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Tensor {
    dims: Option<Vec<IoDim>>,
}

impl Tensor {
    pub fn new(dims: Vec<IoDim>) -> Self {
        Self { dims: Some(dims) }
    }
    /// A single point.
    pub fn rank_0() -> Self {
        Self::new(Vec::new())
    }
    pub fn dim_1d(n: usize, is: isize, os: isize) -> Self {
        Self::new(vec![IoDim::new(n, is, os)])
    }
    pub fn minus_infinity() -> Self {
        Self { dims: None }
    }

    /// Rank of the tensor, `None` when the rank is minus infinity.
    #[inline]
    pub fn rank(&self) -> Option<usize> {
        self.dims.as_ref().map(Vec::len)
    }
    #[inline]
    pub fn is_finite(&self) -> bool {
        self.dims.is_some()
    }
    #[inline]
    pub fn has_rank(&self, rank: usize) -> bool {
        self.rank() == Some(rank)
    }
    /// Rank is finite and at most `rank`.
    #[inline]
    pub fn rank_at_most(&self, rank: usize) -> bool {
        self.rank().map_or(false, |r| r <= rank)
    }

    /// The dimensions of a finite tensor, empty for minus infinity.
    pub fn dims(&self) -> &[IoDim] {
        self.dims.as_deref().unwrap_or(&[])
    }
    pub fn dim(&self, index: usize) -> IoDim {
        self.dims()[index]
    }

    /// A tensor of rank at most one as a single loop. Rank 0 is a loop of one iteration.
    pub fn as_loop(&self) -> Option<IoDim> {
        match self.dims.as_deref() {
            Some([]) => Some(IoDim::new(1, 0, 0)),
            Some([d]) => Some(*d),
            _ => None,
        }
    }

    /// Number of points described. Minus infinity describes none.
    pub fn total_size(&self) -> usize {
        match &self.dims {
            Some(dims) => dims.iter().map(|d| d.n).product(),
            None => 0,
        }
    }

    /// Largest offset, in scalars, reached from the base pointer on either side.
    pub fn max_index(&self) -> usize {
        self.dims()
            .iter()
            .map(|d| (d.n - 1) * d.max_abs_stride())
            .sum()
    }

    pub fn min_stride(&self) -> usize {
        self.dims()
            .iter()
            .map(IoDim::min_abs_stride)
            .min()
            .unwrap_or(0)
    }
    pub fn min_istride(&self) -> usize {
        self.dims()
            .iter()
            .map(|d| d.is.unsigned_abs())
            .min()
            .unwrap_or(0)
    }
    pub fn min_ostride(&self) -> usize {
        self.dims()
            .iter()
            .map(|d| d.os.unsigned_abs())
            .min()
            .unwrap_or(0)
    }

    /// Every dimension reads and writes with the same stride.
    pub fn inplace_strides(&self) -> bool {
        self.dims().iter().all(|d| d.is == d.os)
    }

    /// Removes unit extents and sorts dimensions into canonical order: decreasing smaller stride,
    /// then decreasing input stride, then decreasing output stride, then increasing extent.
    pub fn compress(&self) -> Self {
        match &self.dims {
            Some(dims) => {
                let mut kept: Vec<IoDim> = dims.iter().copied().filter(|d| d.n != 1).collect();
                kept.sort_by(canonical_order);
                Self::new(kept)
            }
            None => Self::minus_infinity(),
        }
    }

    /// Like `compress`, then merges dimensions that walk memory as one larger dimension.
    /// Used for vector shapes, where dimension boundaries carry no meaning.
    pub fn compress_contiguous(&self) -> Self {
        let dims = match &self.dims {
            Some(dims) if self.total_size() > 0 => dims,
            _ => return Self::minus_infinity(),
        };
        let mut kept: Vec<IoDim> = dims.iter().copied().filter(|d| d.n != 1).collect();
        if kept.len() <= 1 {
            return Self::new(kept);
        }

        kept.sort_by(|a, b| b.is.unsigned_abs().cmp(&a.is.unsigned_abs()));

        let mut merged: Vec<IoDim> = Vec::with_capacity(kept.len());
        for dim in kept {
            match merged.last_mut() {
                Some(last) if last.strides_contiguous(&dim) => {
                    last.n *= dim.n;
                    last.is = dim.is;
                    last.os = dim.os;
                }
                _ => merged.push(dim),
            }
        }
        merged.sort_by(canonical_order);
        Self::new(merged)
    }

    /// Concatenation of two tensors. Minus infinity absorbs.
    pub fn append(&self, other: &Tensor) -> Self {
        match (&self.dims, &other.dims) {
            (Some(a), Some(b)) => Self::new(a.iter().chain(b.iter()).copied().collect()),
            _ => Self::minus_infinity(),
        }
    }

    /// Splits into the first `rank` dimensions and the rest.
    pub fn split(&self, rank: usize) -> (Self, Self) {
        match &self.dims {
            Some(dims) => {
                let (head, tail) = dims.split_at(rank);
                (Self::new(head.to_vec()), Self::new(tail.to_vec()))
            }
            None => (Self::minus_infinity(), Self::minus_infinity()),
        }
    }

    /// A copy without dimension `index`.
    pub fn copy_except(&self, index: usize) -> Self {
        match &self.dims {
            Some(dims) => {
                let mut dims = dims.clone();
                dims.remove(index);
                Self::new(dims)
            }
            None => Self::minus_infinity(),
        }
    }

    /// A copy whose strides are the same on both sides.
    pub fn copy_inplace(&self, kind: InPlaceKind) -> Self {
        match &self.dims {
            Some(dims) => Self::new(
                dims.iter()
                    .map(|d| match kind {
                        InPlaceKind::Is => IoDim::new(d.n, d.is, d.is),
                        InPlaceKind::Os => IoDim::new(d.n, d.os, d.os),
                    })
                    .collect(),
            ),
            None => Self::minus_infinity(),
        }
    }

    /// Walking `sz` then `vecsz`, true if the first dimension whose strides differ would shrink
    /// when made in place the given way.
    pub fn strides_decrease(sz: &Tensor, vecsz: &Tensor, kind: InPlaceKind) -> bool {
        for d in sz.dims().iter().chain(vecsz.dims().iter()) {
            let delta = d.os - d.is;
            let shrinks = match kind {
                InPlaceKind::Os => delta < 0,
                InPlaceKind::Is => delta > 0,
            };
            if shrinks {
                return true;
            }
            if d.os != d.is {
                return false;
            }
        }
        false
    }

    /// Structural hash value, stable across runs.
    pub fn hash_value(&self) -> u64 {
        match &self.dims {
            Some(dims) => dims.iter().fold(dims.len() as u64, |h, d| {
                h.wrapping_mul(13131)
                    .wrapping_add(d.n as u64)
                    .wrapping_add((d.is as u64).wrapping_mul(7))
                    .wrapping_add((d.os as u64).wrapping_mul(13))
            }),
            None => u64::MAX,
        }
    }
}

fn canonical_order(a: &IoDim, b: &IoDim) -> Ordering {
    b.min_abs_stride()
        .cmp(&a.min_abs_stride())
        .then_with(|| b.is.unsigned_abs().cmp(&a.is.unsigned_abs()))
        .then_with(|| b.os.unsigned_abs().cmp(&a.os.unsigned_abs()))
        .then_with(|| a.n.cmp(&b.n))
}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash_value());
    }
}

impl fmt::Display for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.dims {
            Some(dims) => {
                f.write_str("(")?;
                for d in dims {
                    write!(f, "({} {} {})", d.n, d.is, d.os)?;
                }
                f.write_str(")")
            }
            None => f.write_str("(-inf)"),
        }
    }
}
