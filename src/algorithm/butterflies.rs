use num_complex::Complex;

use crate::array_utils::LoadStore;
use crate::common::{scalar_from_f64, FftNum};
use crate::ops::OpCount;
use crate::twiddles;
use crate::FftDirection;

// Every butterfly loads all of its points before storing any of them, so the load and store
// views may alias.

#[derive(Clone)]
pub struct Butterfly2<T> {
    _phantom: std::marker::PhantomData<T>,
}
impl<T: FftNum> Butterfly2<T> {
    #[inline(always)]
    pub fn new() -> Self {
        Self {
            _phantom: std::marker::PhantomData,
        }
    }
    #[inline(always)]
    unsafe fn perform_fft_strided(left: &mut Complex<T>, right: &mut Complex<T>) {
        let temp = *left + *right;

        *right = *left - *right;
        *left = temp;
    }
    #[inline(always)]
    pub unsafe fn perform_fft_contiguous(&self, mut buffer: impl LoadStore<T>) {
        let value0 = buffer.load(0);
        let value1 = buffer.load(1);
        buffer.store(value0 + value1, 0);
        buffer.store(value0 - value1, 1);
    }
}

#[derive(Clone)]
pub struct Butterfly3<T> {
    pub twiddle: Complex<T>,
}
impl<T: FftNum> Butterfly3<T> {
    #[inline(always)]
    pub fn new(direction: FftDirection) -> Self {
        Self {
            twiddle: twiddles::compute_twiddle(1, 3, direction),
        }
    }

    #[inline(always)]
    pub unsafe fn perform_fft_contiguous(&self, mut buffer: impl LoadStore<T>) {
        let value0 = buffer.load(0);
        let value1 = buffer.load(1);
        let value2 = buffer.load(2);

        let xp = value1 + value2;
        let xn = value1 - value2;
        let sum = value0 + xp;

        let temp_a = value0
            + Complex {
                re: self.twiddle.re * xp.re,
                im: self.twiddle.re * xp.im,
            };
        let temp_b = Complex {
            re: -self.twiddle.im * xn.im,
            im: self.twiddle.im * xn.re,
        };

        buffer.store(sum, 0);
        buffer.store(temp_a + temp_b, 1);
        buffer.store(temp_a - temp_b, 2);
    }
}

#[derive(Clone)]
pub struct Butterfly4<T> {
    direction: FftDirection,
    _phantom: std::marker::PhantomData<T>,
}
impl<T: FftNum> Butterfly4<T> {
    #[inline(always)]
    pub fn new(direction: FftDirection) -> Self {
        Self {
            direction,
            _phantom: std::marker::PhantomData,
        }
    }
    #[inline(always)]
    pub unsafe fn perform_fft_contiguous(&self, mut buffer: impl LoadStore<T>) {
        // one hardcoded step of the six step algorithm, with both transposes folded into the
        // load/store order
        let mut value0 = buffer.load(0);
        let mut value1 = buffer.load(1);
        let mut value2 = buffer.load(2);
        let mut value3 = buffer.load(3);

        // column FFTs
        Butterfly2::perform_fft_strided(&mut value0, &mut value2);
        Butterfly2::perform_fft_strided(&mut value1, &mut value3);

        // the only twiddle is a quarter turn
        value3 = twiddles::rotate_90(value3, self.direction);

        // row FFTs
        Butterfly2::perform_fft_strided(&mut value0, &mut value1);
        Butterfly2::perform_fft_strided(&mut value2, &mut value3);

        buffer.store(value0, 0);
        buffer.store(value2, 1);
        buffer.store(value1, 2);
        buffer.store(value3, 3);
    }
}

#[derive(Clone)]
pub struct Butterfly5<T> {
    twiddle1: Complex<T>,
    twiddle2: Complex<T>,
}
impl<T: FftNum> Butterfly5<T> {
    pub fn new(direction: FftDirection) -> Self {
        Self {
            twiddle1: twiddles::compute_twiddle(1, 5, direction),
            twiddle2: twiddles::compute_twiddle(2, 5, direction),
        }
    }

    #[inline(never)]
    pub unsafe fn perform_fft_contiguous(&self, mut buffer: impl LoadStore<T>) {
        // Plain 5-point DFT, folded with W3 = conj(W2) and W4 = conj(W1):
        //   X1 = x0 + W1.re*(x1+x4) + W2.re*(x2+x3) + j*(W1.im*(x1-x4) + W2.im*(x2-x3))
        //   X2 = x0 + W1.re*(x2+x3) + W2.re*(x1+x4) - j*(W1.im*(x2-x3) - W2.im*(x1-x4))
        // and X3, X4 are the mirrored sums with the imaginary term negated.
        let x0 = buffer.load(0);
        let x1 = buffer.load(1);
        let x2 = buffer.load(2);
        let x3 = buffer.load(3);
        let x4 = buffer.load(4);

        let x14p = x1 + x4;
        let x14n = x1 - x4;
        let x23p = x2 + x3;
        let x23n = x2 - x3;
        let sum = x0 + x14p + x23p;
        let b14re_a = x0.re + self.twiddle1.re * x14p.re + self.twiddle2.re * x23p.re;
        let b14re_b = self.twiddle1.im * x14n.im + self.twiddle2.im * x23n.im;
        let b23re_a = x0.re + self.twiddle2.re * x14p.re + self.twiddle1.re * x23p.re;
        let b23re_b = self.twiddle2.im * x14n.im + -self.twiddle1.im * x23n.im;

        let b14im_a = x0.im + self.twiddle1.re * x14p.im + self.twiddle2.re * x23p.im;
        let b14im_b = self.twiddle1.im * x14n.re + self.twiddle2.im * x23n.re;
        let b23im_a = x0.im + self.twiddle2.re * x14p.im + self.twiddle1.re * x23p.im;
        let b23im_b = self.twiddle2.im * x14n.re + -self.twiddle1.im * x23n.re;

        buffer.store(sum, 0);
        buffer.store(Complex::new(b14re_a - b14re_b, b14im_a + b14im_b), 1);
        buffer.store(Complex::new(b23re_a - b23re_b, b23im_a + b23im_b), 2);
        buffer.store(Complex::new(b23re_a + b23re_b, b23im_a - b23im_b), 3);
        buffer.store(Complex::new(b14re_a + b14re_b, b14im_a - b14im_b), 4);
    }
}

#[derive(Clone)]
pub struct Butterfly6<T> {
    butterfly3: Butterfly3<T>,
}
impl<T: FftNum> Butterfly6<T> {
    #[inline(always)]
    pub fn new(direction: FftDirection) -> Self {
        Self {
            butterfly3: Butterfly3::new(direction),
        }
    }
    #[inline(always)]
    pub unsafe fn perform_fft_contiguous(&self, mut buffer: impl LoadStore<T>) {
        // GCD(2,3) == 1, so one hardcoded Good-Thomas step needs no twiddles. The input and
        // output reorderings are precomputed.
        let mut scratch_a = [buffer.load(0), buffer.load(2), buffer.load(4)];
        let mut scratch_b = [buffer.load(3), buffer.load(5), buffer.load(1)];

        // column FFTs
        self.butterfly3.perform_fft_contiguous(&mut scratch_a);
        self.butterfly3.perform_fft_contiguous(&mut scratch_b);

        // row FFTs
        Butterfly2::perform_fft_strided(&mut scratch_a[0], &mut scratch_b[0]);
        Butterfly2::perform_fft_strided(&mut scratch_a[1], &mut scratch_b[1]);
        Butterfly2::perform_fft_strided(&mut scratch_a[2], &mut scratch_b[2]);

        buffer.store(scratch_a[0], 0);
        buffer.store(scratch_b[1], 1);
        buffer.store(scratch_a[2], 2);
        buffer.store(scratch_b[0], 3);
        buffer.store(scratch_a[1], 4);
        buffer.store(scratch_b[2], 5);
    }
}

#[derive(Clone)]
pub struct Butterfly7<T> {
    twiddle1: Complex<T>,
    twiddle2: Complex<T>,
    twiddle3: Complex<T>,
}
impl<T: FftNum> Butterfly7<T> {
    pub fn new(direction: FftDirection) -> Self {
        Self {
            twiddle1: twiddles::compute_twiddle(1, 7, direction),
            twiddle2: twiddles::compute_twiddle(2, 7, direction),
            twiddle3: twiddles::compute_twiddle(3, 7, direction),
        }
    }
    #[inline(never)]
    pub unsafe fn perform_fft_contiguous(&self, mut buffer: impl LoadStore<T>) {
        // Same folding as the 5-point butterfly, with the DFT matrix rows
        //   | 1  W1  W2  W3  W3* W2* W1* |
        //   | 1  W2  W3* W1* W1  W3  W2* |
        //   | 1  W3  W1* W2  W2* W1  W3* |
        // and their mirror images.
        let x0 = buffer.load(0);
        let x1 = buffer.load(1);
        let x2 = buffer.load(2);
        let x3 = buffer.load(3);
        let x4 = buffer.load(4);
        let x5 = buffer.load(5);
        let x6 = buffer.load(6);

        let x16p = x1 + x6;
        let x16n = x1 - x6;
        let x25p = x2 + x5;
        let x25n = x2 - x5;
        let x34p = x3 + x4;
        let x34n = x3 - x4;
        let sum = x0 + x16p + x25p + x34p;

        let x16re_a = x0.re
            + self.twiddle1.re * x16p.re
            + self.twiddle2.re * x25p.re
            + self.twiddle3.re * x34p.re;
        let x16re_b =
            self.twiddle1.im * x16n.im + self.twiddle2.im * x25n.im + self.twiddle3.im * x34n.im;
        let x25re_a = x0.re
            + self.twiddle1.re * x34p.re
            + self.twiddle2.re * x16p.re
            + self.twiddle3.re * x25p.re;
        let x25re_b =
            -self.twiddle1.im * x34n.im + self.twiddle2.im * x16n.im - self.twiddle3.im * x25n.im;
        let x34re_a = x0.re
            + self.twiddle1.re * x25p.re
            + self.twiddle2.re * x34p.re
            + self.twiddle3.re * x16p.re;
        let x34re_b =
            -self.twiddle1.im * x25n.im + self.twiddle2.im * x34n.im + self.twiddle3.im * x16n.im;
        let x16im_a = x0.im
            + self.twiddle1.re * x16p.im
            + self.twiddle2.re * x25p.im
            + self.twiddle3.re * x34p.im;
        let x16im_b =
            self.twiddle1.im * x16n.re + self.twiddle2.im * x25n.re + self.twiddle3.im * x34n.re;
        let x25im_a = x0.im
            + self.twiddle1.re * x34p.im
            + self.twiddle2.re * x16p.im
            + self.twiddle3.re * x25p.im;
        let x25im_b =
            -self.twiddle1.im * x34n.re + self.twiddle2.im * x16n.re - self.twiddle3.im * x25n.re;
        let x34im_a = x0.im
            + self.twiddle1.re * x25p.im
            + self.twiddle2.re * x34p.im
            + self.twiddle3.re * x16p.im;
        let x34im_b =
            self.twiddle1.im * x25n.re - self.twiddle2.im * x34n.re - self.twiddle3.im * x16n.re;

        buffer.store(sum, 0);
        buffer.store(Complex::new(x16re_a - x16re_b, x16im_a + x16im_b), 1);
        buffer.store(Complex::new(x25re_a - x25re_b, x25im_a + x25im_b), 2);
        buffer.store(Complex::new(x34re_a - x34re_b, x34im_a - x34im_b), 3);
        buffer.store(Complex::new(x34re_a + x34re_b, x34im_a + x34im_b), 4);
        buffer.store(Complex::new(x25re_a + x25re_b, x25im_a - x25im_b), 5);
        buffer.store(Complex::new(x16re_a + x16re_b, x16im_a - x16im_b), 6);
    }
}

#[derive(Clone)]
pub struct Butterfly8<T> {
    root2: T,
    butterfly4: Butterfly4<T>,
    direction: FftDirection,
}
impl<T: FftNum> Butterfly8<T> {
    #[inline(always)]
    pub fn new(direction: FftDirection) -> Self {
        Self {
            root2: scalar_from_f64(0.5f64.sqrt()),
            butterfly4: Butterfly4::new(direction),
            direction,
        }
    }

    #[inline(always)]
    pub unsafe fn perform_fft_contiguous(&self, mut buffer: impl LoadStore<T>) {
        // six step algorithm: transpose into scratch, columns, twiddles, rows
        let mut scratch0 = [
            buffer.load(0),
            buffer.load(2),
            buffer.load(4),
            buffer.load(6),
        ];
        let mut scratch1 = [
            buffer.load(1),
            buffer.load(3),
            buffer.load(5),
            buffer.load(7),
        ];

        self.butterfly4.perform_fft_contiguous(&mut scratch0);
        self.butterfly4.perform_fft_contiguous(&mut scratch1);

        scratch1[1] = (twiddles::rotate_90(scratch1[1], self.direction) + scratch1[1]) * self.root2;
        scratch1[2] = twiddles::rotate_90(scratch1[2], self.direction);
        scratch1[3] = (twiddles::rotate_90(scratch1[3], self.direction) - scratch1[3]) * self.root2;

        for i in 0..4 {
            Butterfly2::perform_fft_strided(&mut scratch0[i], &mut scratch1[i]);
        }

        // the skipped second transpose is folded into the store order
        for i in 0..4 {
            buffer.store(scratch0[i], i);
        }
        for i in 0..4 {
            buffer.store(scratch1[i], i + 4);
        }
    }
}

/// A hardcoded small DFT, dispatched by size.
#[derive(Clone)]
pub enum Codelet<T> {
    Butterfly2(Butterfly2<T>),
    Butterfly3(Butterfly3<T>),
    Butterfly4(Butterfly4<T>),
    Butterfly5(Butterfly5<T>),
    Butterfly6(Butterfly6<T>),
    Butterfly7(Butterfly7<T>),
    Butterfly8(Butterfly8<T>),
}

impl<T: FftNum> Codelet<T> {
    pub const SIZES: std::ops::RangeInclusive<usize> = 2..=8;

    /// The forward codelet of size `len`, if there is one.
    pub fn new(len: usize) -> Option<Self> {
        let direction = FftDirection::Forward;
        Some(match len {
            2 => Codelet::Butterfly2(Butterfly2::new()),
            3 => Codelet::Butterfly3(Butterfly3::new(direction)),
            4 => Codelet::Butterfly4(Butterfly4::new(direction)),
            5 => Codelet::Butterfly5(Butterfly5::new(direction)),
            6 => Codelet::Butterfly6(Butterfly6::new(direction)),
            7 => Codelet::Butterfly7(Butterfly7::new(direction)),
            8 => Codelet::Butterfly8(Butterfly8::new(direction)),
            _ => return None,
        })
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        match *self {
            Codelet::Butterfly2(_) => 2,
            Codelet::Butterfly3(_) => 3,
            Codelet::Butterfly4(_) => 4,
            Codelet::Butterfly5(_) => 5,
            Codelet::Butterfly6(_) => 6,
            Codelet::Butterfly7(_) => 7,
            Codelet::Butterfly8(_) => 8,
        }
    }

    /// Transforms the `len()` points visible through `buffer`.
    #[inline(always)]
    pub unsafe fn perform(&self, buffer: impl LoadStore<T>) {
        match self {
            Codelet::Butterfly2(fft) => fft.perform_fft_contiguous(buffer),
            Codelet::Butterfly3(fft) => fft.perform_fft_contiguous(buffer),
            Codelet::Butterfly4(fft) => fft.perform_fft_contiguous(buffer),
            Codelet::Butterfly5(fft) => fft.perform_fft_contiguous(buffer),
            Codelet::Butterfly6(fft) => fft.perform_fft_contiguous(buffer),
            Codelet::Butterfly7(fft) => fft.perform_fft_contiguous(buffer),
            Codelet::Butterfly8(fft) => fft.perform_fft_contiguous(buffer),
        }
    }

    /// Arithmetic of one transform.
    pub fn ops(&self) -> OpCount {
        match *self {
            Codelet::Butterfly2(_) => OpCount::new(4.0, 0.0, 0.0, 0.0),
            Codelet::Butterfly3(_) => OpCount::new(12.0, 4.0, 0.0, 0.0),
            Codelet::Butterfly4(_) => OpCount::new(16.0, 0.0, 0.0, 0.0),
            Codelet::Butterfly5(_) => OpCount::new(32.0, 12.0, 0.0, 0.0),
            Codelet::Butterfly6(_) => OpCount::new(36.0, 8.0, 0.0, 0.0),
            Codelet::Butterfly7(_) => OpCount::new(60.0, 36.0, 0.0, 0.0),
            Codelet::Butterfly8(_) => OpCount::new(52.0, 4.0, 0.0, 0.0),
        }
    }

    /// Arithmetic of one transform whose inputs or outputs pass through `len() - 1` twiddle
    /// multiplications.
    pub fn twiddled_ops(&self) -> OpCount {
        let twiddles = (self.len() - 1) as f64;
        self.ops() + OpCount::new(2.0 * twiddles, 4.0 * twiddles, 0.0, 0.0)
    }
}

impl<T: FftNum> std::fmt::Debug for Codelet<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n1_{}", self.len())
    }
}
