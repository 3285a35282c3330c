use std::fmt;
use std::hash::{Hash, Hasher};

use crate::error::PlanError;
use crate::tensor::{IoDim, Tensor};
use crate::FftDirection;

/// The buffer a `DataPtr` points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Region {
    /// The caller's input buffer.
    Input,
    /// The caller's output buffer.
    Output,
    /// A planner-private buffer, allocated by the plan that owns the sub-problem.
    Scratch(u8),
}

/// A symbolic data pointer: a scalar offset into one of the buffers a plan will be applied to.
///
/// Plans never store addresses. `DataPtr`s only identify which pointers alias during planning,
/// and let the safe execution wrappers translate a problem into real pointers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DataPtr {
    pub region: Region,
    pub offset: isize,
}

impl DataPtr {
    pub const fn new(region: Region, offset: isize) -> Self {
        Self { region, offset }
    }
    pub const fn input(offset: isize) -> Self {
        Self::new(Region::Input, offset)
    }
    pub const fn output(offset: isize) -> Self {
        Self::new(Region::Output, offset)
    }
    pub const fn scratch(id: u8) -> Self {
        Self::new(Region::Scratch(id), 0)
    }

    /// The first scratch region none of `ptrs` point into. Staging buffers nested inside other
    /// staging buffers get their own region, so a copy between them is never mistaken for an
    /// in-place transform.
    pub fn scratch_after(ptrs: &[DataPtr]) -> Self {
        let id = ptrs
            .iter()
            .filter_map(|ptr| match ptr.region {
                Region::Scratch(id) => Some(id.saturating_add(1)),
                _ => None,
            })
            .max()
            .unwrap_or(0);
        Self::scratch(id)
    }

    #[must_use]
    pub const fn add(self, delta: isize) -> Self {
        Self::new(self.region, self.offset + delta)
    }

    /// Offset of `self` from `base`, if both point into the same buffer.
    pub fn distance(self, base: DataPtr) -> Option<isize> {
        if self.region == base.region {
            Some(self.offset - base.offset)
        } else {
            None
        }
    }
}

/// Whether a convenience-constructed problem writes over its input.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Placement {
    InPlace,
    OutOfPlace,
}

/// One complex DFT instance: a transform shape, a vector (batch) shape, and the real and imaginary
/// parts of the input and output.
///
/// The engine computes only forward transforms. An inverse transform is the forward transform
/// with real and imaginary parts exchanged on both sides, which is how `FftDirection::Inverse`
/// problems are built.
///
/// Equality and hashing are structural: two problems are equal if they have the same shapes,
/// the same placement and the same real-to-imaginary offsets, wherever their data lives.
#[derive(Clone, Debug)]
pub struct Problem {
    pub sz: Tensor,
    pub vecsz: Tensor,
    pub ri: DataPtr,
    pub ii: DataPtr,
    pub ro: DataPtr,
    pub io: DataPtr,
}

impl Problem {
    /// Builds a problem from raw shapes, checking placement consistency and extents.
    pub fn new(
        sz: Tensor,
        vecsz: Tensor,
        ri: DataPtr,
        ii: DataPtr,
        ro: DataPtr,
        io: DataPtr,
    ) -> Result<Self, PlanError> {
        if !sz.is_finite() {
            return Err(PlanError::InfiniteRank);
        }
        if (ri == ro) != (ii == io) {
            return Err(PlanError::PlacementMismatch {
                real_inplace: ri == ro,
                imag_inplace: ii == io,
            });
        }
        check_extents(&sz, "transform")?;
        check_extents(&vecsz, "vector")?;
        Ok(Self::from_parts(sz, vecsz, ri, ii, ro, io))
    }

    /// Builds a sub-problem. Solvers derive these from problems that were already validated.
    pub(crate) fn from_parts(
        sz: Tensor,
        vecsz: Tensor,
        ri: DataPtr,
        ii: DataPtr,
        ro: DataPtr,
        io: DataPtr,
    ) -> Self {
        debug_assert!((ri == ro) == (ii == io));
        debug_assert!(sz.is_finite());
        Self {
            sz: sz.compress(),
            vecsz: vecsz.compress_contiguous(),
            ri,
            ii,
            ro,
            io,
        }
    }

    /// A one-dimensional transform of `len` interleaved complex values.
    pub fn dft_1d(
        len: usize,
        direction: FftDirection,
        placement: Placement,
    ) -> Result<Self, PlanError> {
        Self::dft(&[len], 1, direction, placement)
    }

    /// A row-major multi-dimensional transform of interleaved complex values, repeated `howmany`
    /// times over consecutive blocks.
    pub fn dft(
        dims: &[usize],
        howmany: usize,
        direction: FftDirection,
        placement: Placement,
    ) -> Result<Self, PlanError> {
        let mut stride: isize = 2;
        let mut iodims = Vec::with_capacity(dims.len());
        for (index, &n) in dims.iter().enumerate().rev() {
            iodims.push(IoDim::new(n, stride, stride));
            stride = checked_stride(stride, n, index)?;
        }
        iodims.reverse();
        let sz = Tensor::new(iodims);
        let vecsz = Tensor::dim_1d(howmany, stride, stride);

        let output = match placement {
            Placement::InPlace => DataPtr::input(0),
            Placement::OutOfPlace => DataPtr::output(0),
        };
        let (ri, ii, ro, io) = match direction {
            FftDirection::Forward => (DataPtr::input(0), DataPtr::input(1), output, output.add(1)),
            FftDirection::Inverse => (DataPtr::input(1), DataPtr::input(0), output.add(1), output),
        };
        Self::new(sz, vecsz, ri, ii, ro, io)
    }

    /// A scratch region distinct from every buffer this problem touches.
    pub(crate) fn free_scratch(&self) -> DataPtr {
        DataPtr::scratch_after(&[self.ri, self.ii, self.ro, self.io])
    }

    #[inline]
    pub fn is_inplace(&self) -> bool {
        self.ri == self.ro
    }

    /// Lowest and highest scalar offsets read from the input buffer.
    pub fn input_span(&self) -> (isize, isize) {
        span(
            &[self.ri.offset, self.ii.offset],
            self.sz.dims().iter().chain(self.vecsz.dims()).map(|d| (d.n, d.is)),
        )
    }

    /// Lowest and highest scalar offsets written in the output buffer.
    pub fn output_span(&self) -> (isize, isize) {
        span(
            &[self.ro.offset, self.io.offset],
            self.sz.dims().iter().chain(self.vecsz.dims()).map(|d| (d.n, d.os)),
        )
    }

    /// Stable textual form of the problem, used in plan signatures and logs.
    pub fn signature(&self) -> String {
        self.to_string()
    }

    fn placement_key(&self) -> (bool, Option<isize>, Option<isize>) {
        (
            self.is_inplace(),
            self.ii.distance(self.ri),
            self.io.distance(self.ro),
        )
    }
}

fn check_extents(tensor: &Tensor, name: &'static str) -> Result<(), PlanError> {
    for (index, d) in tensor.dims().iter().enumerate() {
        if d.n == 0 {
            return Err(PlanError::ZeroExtent {
                tensor: name,
                index,
            });
        }
        let reach = |stride: isize| (d.n as isize - 1).checked_mul(stride);
        if d.n > isize::MAX as usize || reach(d.is).is_none() || reach(d.os).is_none() {
            return Err(PlanError::RankOverflow { index });
        }
    }
    Ok(())
}

fn checked_stride(stride: isize, n: usize, index: usize) -> Result<isize, PlanError> {
    isize::try_from(n)
        .ok()
        .and_then(|n| stride.checked_mul(n))
        .ok_or(PlanError::RankOverflow { index })
}

fn span(bases: &[isize], dims: impl Iterator<Item = (usize, isize)>) -> (isize, isize) {
    let (mut low, mut high) = (0isize, 0isize);
    for (n, stride) in dims {
        let reach = (n as isize - 1) * stride;
        if reach < 0 {
            low += reach;
        } else {
            high += reach;
        }
    }
    let first = bases.iter().copied().min().unwrap_or(0);
    let last = bases.iter().copied().max().unwrap_or(0);
    (first + low, last + high)
}

impl PartialEq for Problem {
    fn eq(&self, other: &Self) -> bool {
        self.placement_key() == other.placement_key()
            && self.sz == other.sz
            && self.vecsz == other.vecsz
    }
}
impl Eq for Problem {}

impl Hash for Problem {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.placement_key().hash(state);
        self.sz.hash(state);
        self.vecsz.hash(state);
    }
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (inplace, ii, io) = self.placement_key();
        let offset = |d: Option<isize>| d.map_or_else(|| "split".to_owned(), |d| d.to_string());
        write!(
            f,
            "(dft {} {} {} {} {})",
            if inplace { "ip" } else { "oop" },
            offset(ii),
            offset(io),
            self.sz,
            self.vecsz
        )
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(p: &Problem) -> u64 {
        let mut hasher = DefaultHasher::new();
        p.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_structural_equality() {
        let a = Problem::dft_1d(12, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        let b = Problem::dft_1d(12, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));

        // the same shape placed at other offsets is still the same problem
        let shifted = Problem::new(
            a.sz.clone(),
            a.vecsz.clone(),
            DataPtr::scratch(0).add(8),
            DataPtr::scratch(0).add(9),
            DataPtr::output(40),
            DataPtr::output(41),
        )
        .unwrap();
        assert_eq!(a, shifted);

        let inplace = Problem::dft_1d(12, FftDirection::Forward, Placement::InPlace).unwrap();
        assert_ne!(a, inplace);

        let inverse = Problem::dft_1d(12, FftDirection::Inverse, Placement::OutOfPlace).unwrap();
        assert_ne!(a, inverse);
    }

    #[test]
    fn test_nested_scratch_is_a_new_region() {
        let top = Problem::dft(&[16], 4, FftDirection::Forward, Placement::InPlace).unwrap();
        assert_eq!(top.free_scratch(), DataPtr::scratch(0));

        // a buffer staged from another buffer
        let staged = Problem::new(
            Tensor::dim_1d(16, 2, 2),
            Tensor::dim_1d(4, 36, 36),
            DataPtr::scratch(0),
            DataPtr::scratch(0).add(1),
            DataPtr::output(0),
            DataPtr::output(1),
        )
        .unwrap();
        let next = staged.free_scratch();
        assert_eq!(next, DataPtr::scratch(1));
        assert_ne!(next, staged.ri);
        assert_eq!(DataPtr::scratch_after(&[next, DataPtr::input(3)]), DataPtr::scratch(2));
    }

    #[test]
    fn test_placement_mismatch() {
        let result = Problem::new(
            Tensor::dim_1d(4, 2, 2),
            Tensor::rank_0(),
            DataPtr::input(0),
            DataPtr::input(1),
            DataPtr::input(0),
            DataPtr::output(1),
        );
        assert_eq!(
            result.unwrap_err(),
            PlanError::PlacementMismatch {
                real_inplace: true,
                imag_inplace: false
            }
        );
    }

    #[test]
    fn test_zero_extent() {
        let result = Problem::dft(&[4, 0], 1, FftDirection::Forward, Placement::InPlace);
        assert_eq!(
            result.unwrap_err(),
            PlanError::ZeroExtent {
                tensor: "transform",
                index: 1
            }
        );
        let result = Problem::dft(&[4], 0, FftDirection::Forward, Placement::InPlace);
        assert!(matches!(result, Err(PlanError::ZeroExtent { tensor: "vector", .. })));
    }

    #[test]
    fn test_multidim_layout() {
        let p = Problem::dft(&[3, 5], 2, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        assert_eq!(p.sz.dims(), &[IoDim::new(3, 10, 10), IoDim::new(5, 2, 2)]);
        assert_eq!(p.vecsz.dims(), &[IoDim::new(2, 30, 30)]);
        assert_eq!(p.input_span(), (0, 59));
        assert_eq!(p.output_span(), (0, 59));
    }

    #[test]
    fn test_signature() {
        let p = Problem::dft_1d(8, FftDirection::Forward, Placement::OutOfPlace).unwrap();
        assert_eq!(p.signature(), "(dft oop 1 1 ((8 2 2)) ())");
        let p = Problem::dft_1d(8, FftDirection::Inverse, Placement::InPlace).unwrap();
        assert_eq!(p.signature(), "(dft ip -1 -1 ((8 2 2)) ())");
    }
}
