use num_complex::Complex;

use crate::common::FftNum;
use crate::tensor::IoDim;

/// Indexed access to the complex points a butterfly works on.
pub trait LoadStore<T: FftNum> {
    unsafe fn load(&self, idx: usize) -> Complex<T>;
    unsafe fn store(&mut self, val: Complex<T>, idx: usize);
}

impl<T: FftNum> LoadStore<T> for &mut [Complex<T>] {
    #[inline(always)]
    unsafe fn load(&self, idx: usize) -> Complex<T> {
        debug_assert!(idx < self.len());
        *self.get_unchecked(idx)
    }
    #[inline(always)]
    unsafe fn store(&mut self, val: Complex<T>, idx: usize) {
        debug_assert!(idx < self.len());
        *self.get_unchecked_mut(idx) = val;
    }
}

impl<T: FftNum, const N: usize> LoadStore<T> for &mut [Complex<T>; N] {
    #[inline(always)]
    unsafe fn load(&self, idx: usize) -> Complex<T> {
        debug_assert!(idx < N);
        *self.get_unchecked(idx)
    }
    #[inline(always)]
    unsafe fn store(&mut self, val: Complex<T>, idx: usize) {
        debug_assert!(idx < N);
        *self.get_unchecked_mut(idx) = val;
    }
}

/// Split-format strided view: point `i` has its real part at `re + i*stride` and its imaginary
/// part at `im + i*stride`. Interleaved complex data is the special case `im = re + 1`, stride 2.
#[derive(Debug)]
pub struct SplitPtr<T> {
    pub re: *mut T,
    pub im: *mut T,
    pub stride: isize,
}

impl<T> Clone for SplitPtr<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for SplitPtr<T> {}

impl<T> SplitPtr<T> {
    #[inline(always)]
    pub fn new(re: *mut T, im: *mut T, stride: isize) -> Self {
        Self { re, im, stride }
    }

    /// Moves both base pointers by `delta` scalars.
    #[inline(always)]
    pub unsafe fn offset(self, delta: isize) -> Self {
        Self::new(self.re.offset(delta), self.im.offset(delta), self.stride)
    }

    #[inline(always)]
    pub fn with_stride(self, stride: isize) -> Self {
        Self::new(self.re, self.im, stride)
    }
}

impl<T: FftNum> LoadStore<T> for SplitPtr<T> {
    #[inline(always)]
    unsafe fn load(&self, idx: usize) -> Complex<T> {
        let offset = idx as isize * self.stride;
        Complex {
            re: *self.re.offset(offset),
            im: *self.im.offset(offset),
        }
    }
    #[inline(always)]
    unsafe fn store(&mut self, val: Complex<T>, idx: usize) {
        let offset = idx as isize * self.stride;
        *self.re.offset(offset) = val.re;
        *self.im.offset(offset) = val.im;
    }
}

/// Reads from one strided view and writes to another. Butterflies load every point before they
/// store any, so the two views may coincide.
#[derive(Clone, Copy)]
pub struct DoubleBuf<T> {
    pub input: SplitPtr<T>,
    pub output: SplitPtr<T>,
}

impl<T: FftNum> LoadStore<T> for DoubleBuf<T> {
    #[inline(always)]
    unsafe fn load(&self, idx: usize) -> Complex<T> {
        self.input.load(idx)
    }
    #[inline(always)]
    unsafe fn store(&mut self, val: Complex<T>, idx: usize) {
        self.output.store(val, idx)
    }
}

/// Multiplies point `i > 0` by `twiddles[i - 1]` as it is loaded (decimation in time).
pub struct TwiddleOnLoad<'a, T, B> {
    pub inner: B,
    pub twiddles: &'a [Complex<T>],
}

impl<'a, T: FftNum, B: LoadStore<T>> LoadStore<T> for TwiddleOnLoad<'a, T, B> {
    #[inline(always)]
    unsafe fn load(&self, idx: usize) -> Complex<T> {
        let value = self.inner.load(idx);
        if idx == 0 {
            value
        } else {
            value * *self.twiddles.get_unchecked(idx - 1)
        }
    }
    #[inline(always)]
    unsafe fn store(&mut self, val: Complex<T>, idx: usize) {
        self.inner.store(val, idx)
    }
}

/// Multiplies point `i > 0` by `twiddles[i - 1]` as it is stored (decimation in frequency).
pub struct TwiddleOnStore<'a, T, B> {
    pub inner: B,
    pub twiddles: &'a [Complex<T>],
}

impl<'a, T: FftNum, B: LoadStore<T>> LoadStore<T> for TwiddleOnStore<'a, T, B> {
    #[inline(always)]
    unsafe fn load(&self, idx: usize) -> Complex<T> {
        self.inner.load(idx)
    }
    #[inline(always)]
    unsafe fn store(&mut self, val: Complex<T>, idx: usize) {
        if idx == 0 {
            self.inner.store(val, idx)
        } else {
            self.inner
                .store(val * *self.twiddles.get_unchecked(idx - 1), idx)
        }
    }
}

/// Copies an `n0` x `n1` block of complex points between two strided split layouts.
pub unsafe fn copy_2d<T: FftNum>(
    src: SplitPtr<T>,
    dst: SplitPtr<T>,
    n0: usize,
    is0: isize,
    os0: isize,
    n1: usize,
    is1: isize,
    os1: isize,
) {
    for i0 in 0..n0 {
        let src_row = src.offset(i0 as isize * is0).with_stride(is1);
        let mut dst_row = dst.offset(i0 as isize * os0).with_stride(os1);
        for i1 in 0..n1 {
            let value = src_row.load(i1);
            dst_row.store(value, i1);
        }
    }
}

/// Copies every point described by `dims`, reading with the input strides and writing with the
/// output strides.
pub unsafe fn copy_strided<T: FftNum>(src: SplitPtr<T>, dst: SplitPtr<T>, dims: &[IoDim]) {
    match dims {
        [] => {
            let value = src.load(0);
            let mut dst = dst;
            dst.store(value, 0);
        }
        [d] => copy_2d(src, dst, 1, 0, 0, d.n, d.is, d.os),
        [d0, d1] => copy_2d(src, dst, d0.n, d0.is, d0.os, d1.n, d1.is, d1.os),
        [first, rest @ ..] => {
            for i in 0..first.n {
                let i = i as isize;
                copy_strided(src.offset(i * first.is), dst.offset(i * first.os), rest);
            }
        }
    }
}
