use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::sync::{Arc, Mutex, PoisonError, Weak};

use num_complex::Complex;
use num_traits::Zero;
use tracing::debug;

use crate::common::{scalar_from_f64, FftNum};
use crate::math_utils::modular_exponent;
use crate::FftDirection;

/// Returns (cos(2 pi m / n), sin(2 pi m / n)), folding the angle into the first octant before
/// evaluating so large `n` keeps full precision.
pub fn cexp(m: usize, n: usize) -> (f64, f64) {
    debug_assert!(n > 0);
    let quarter_n = n as u128;
    let n = 4 * quarter_n;
    let mut m = 4 * (m as u128 % quarter_n);
    let mut octant = 0u8;

    if m > n - m {
        m = n - m;
        octant |= 4;
    }
    if m > quarter_n {
        m -= quarter_n;
        octant |= 2;
    }
    if m > quarter_n - m {
        m = quarter_n - m;
        octant |= 1;
    }

    let theta = 2.0 * std::f64::consts::PI * (m as f64) / (n as f64);
    let (mut s, mut c) = theta.sin_cos();

    if octant & 1 != 0 {
        std::mem::swap(&mut c, &mut s);
    }
    if octant & 2 != 0 {
        let t = c;
        c = -s;
        s = t;
    }
    if octant & 4 != 0 {
        s = -s;
    }
    (c, s)
}

/// `exp(-2 pi i * index / fft_len)` for a forward transform, its conjugate for an inverse one.
pub fn compute_twiddle<T: FftNum>(
    index: usize,
    fft_len: usize,
    direction: FftDirection,
) -> Complex<T> {
    let (c, s) = cexp(index, fft_len);
    let result = Complex {
        re: scalar_from_f64(c),
        im: scalar_from_f64(-s),
    };
    match direction {
        FftDirection::Forward => result,
        FftDirection::Inverse => result.conj(),
    }
}

pub fn rotate_90<T: FftNum>(value: Complex<T>, direction: FftDirection) -> Complex<T> {
    match direction {
        FftDirection::Forward => Complex {
            re: value.im,
            im: -value.re,
        },
        FftDirection::Inverse => Complex {
            re: -value.im,
            im: value.re,
        },
    }
}

/// How a table is laid out. `n` below always means the full transform length the factors rotate over.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TwiddleRecipe {
    /// Column-major for twiddle codelets: `W[k*(r-1) + j-1] = w_n^(j*k)`, n = r*m, k < m, 0 < j < r.
    Codelet { r: usize, m: usize },
    /// Row-major: `W[(j-1)*m + k] = w_n^(j*k)`.
    Transposed { r: usize, m: usize },
    /// Two short tables whose product gives any power: `w_n^t = W0[t % 2^b] * W1[t >> b]`.
    TwoLevel { n: usize, log2_radix: u32 },
    /// Every power: `W[k] = w_n^k`, k < n.
    Generic { n: usize },
    /// Rader convolution kernel for prime `n`, already transformed by a length n-1 DFT.
    RaderOmega { n: usize, ginv: usize },
    /// Rader permute-and-twiddle factors for a prime radix `r`: `W[(i-1)*(r-1) + k] = w_(r*m)^(i*g^k)`.
    RaderTwiddle { r: usize, m: usize, g: usize },
}

impl TwiddleRecipe {
    /// Number of complex factors in the table.
    pub fn len(&self) -> usize {
        match *self {
            TwiddleRecipe::Codelet { r, m } | TwiddleRecipe::Transposed { r, m } => (r - 1) * m,
            TwiddleRecipe::TwoLevel { n, log2_radix } => {
                let radix = 1usize << log2_radix;
                radix + (n + radix - 1) / radix
            }
            TwiddleRecipe::Generic { n } => n,
            TwiddleRecipe::RaderOmega { n, .. } => n - 1,
            TwiddleRecipe::RaderTwiddle { r, m, .. } => (r - 1) * (m - 1),
        }
    }
}

impl fmt::Display for TwiddleRecipe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            TwiddleRecipe::Codelet { r, m } => write!(f, "codelet-{}x{}", r, m),
            TwiddleRecipe::Transposed { r, m } => write!(f, "transposed-{}x{}", r, m),
            TwiddleRecipe::TwoLevel { n, log2_radix } => write!(f, "twolevel-{}/{}", n, log2_radix),
            TwiddleRecipe::Generic { n } => write!(f, "generic-{}", n),
            TwiddleRecipe::RaderOmega { n, ginv } => write!(f, "rader-omega-{}/{}", n, ginv),
            TwiddleRecipe::RaderTwiddle { r, m, g } => write!(f, "rader-twiddle-{}x{}/{}", r, m, g),
        }
    }
}

/// Identity of a cached table. Tables built while measuring are zero-filled and cached apart
/// from the real ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TwiddleKey {
    pub recipe: TwiddleRecipe,
    pub zero: bool,
}

impl TwiddleKey {
    pub fn new(recipe: TwiddleRecipe, zero: bool) -> Self {
        Self { recipe, zero }
    }
}

type TableMap<T> = Mutex<HashMap<TwiddleKey, Weak<TwiddleTable<T>>>>;

/// A shared, immutable table of rotation factors. Dropping the last handle frees it and removes
/// it from its cache.
pub struct TwiddleTable<T> {
    key: TwiddleKey,
    factors: Box<[Complex<T>]>,
    owner: Weak<TableMap<T>>,
}

impl<T> TwiddleTable<T> {
    pub fn key(&self) -> TwiddleKey {
        self.key
    }
}

impl<T> Deref for TwiddleTable<T> {
    type Target = [Complex<T>];
    fn deref(&self) -> &[Complex<T>] {
        &self.factors
    }
}

impl<T> fmt::Debug for TwiddleTable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TwiddleTable")
            .field("key", &self.key)
            .field("len", &self.factors.len())
            .finish()
    }
}

impl<T> Drop for TwiddleTable<T> {
    fn drop(&mut self) {
        if let Some(owner) = self.owner.upgrade() {
            let mut tables = owner.lock().unwrap_or_else(PoisonError::into_inner);
            let dead = tables
                .get(&self.key)
                .map_or(false, |entry| entry.strong_count() == 0);
            if dead {
                tables.remove(&self.key);
            }
        }
        debug!(recipe = %self.key.recipe, zero = self.key.zero, "freed twiddle table");
    }
}

/// Reference-counted twiddle tables, shared by every plan a planner produces.
///
/// A table is computed on first request and freed when the last plan holding it goes to sleep
/// or is dropped.
pub struct TwiddleCache<T> {
    tables: Arc<TableMap<T>>,
}

impl<T> Clone for TwiddleCache<T> {
    fn clone(&self) -> Self {
        Self {
            tables: Arc::clone(&self.tables),
        }
    }
}

impl<T> Default for TwiddleCache<T> {
    fn default() -> Self {
        Self {
            tables: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

impl<T: FftNum> TwiddleCache<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the table for `key`, running `compute` if no live table exists.
    /// `compute` runs without the cache locked, so it may itself acquire tables.
    pub fn acquire(
        &self,
        key: TwiddleKey,
        compute: impl FnOnce() -> Vec<Complex<T>>,
    ) -> Arc<TwiddleTable<T>> {
        if let Some(existing) = self.lookup(&key) {
            return existing;
        }

        let factors = if key.zero {
            vec![Complex::zero(); key.recipe.len()]
        } else {
            compute()
        };
        debug_assert_eq!(factors.len(), key.recipe.len());
        debug!(recipe = %key.recipe, zero = key.zero, len = factors.len(), "computed twiddle table");

        let mut tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(existing) = tables.get(&key).and_then(Weak::upgrade) {
            return existing;
        }
        let table = Arc::new(TwiddleTable {
            key,
            factors: factors.into_boxed_slice(),
            owner: Arc::downgrade(&self.tables),
        });
        tables.insert(key, Arc::downgrade(&table));
        table
    }

    /// Returns the table for a recipe that needs nothing but trigonometry.
    pub fn acquire_standard(&self, recipe: TwiddleRecipe, zero: bool) -> Arc<TwiddleTable<T>> {
        self.acquire(TwiddleKey::new(recipe, zero), || standard_factors(recipe))
    }

    fn lookup(&self, key: &TwiddleKey) -> Option<Arc<TwiddleTable<T>>> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.get(key).and_then(Weak::upgrade)
    }

    /// Number of plans currently holding the table for `key`.
    pub fn ref_count(&self, key: &TwiddleKey) -> usize {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.get(key).map_or(0, Weak::strong_count)
    }

    /// Number of tables currently alive.
    pub fn live_tables(&self) -> usize {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        tables.values().filter(|w| w.strong_count() > 0).count()
    }

    /// Keys and reference counts of every live table, sorted for stable comparison.
    pub fn snapshot(&self) -> Vec<(String, bool, usize)> {
        let tables = self.tables.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries: Vec<(String, bool, usize)> = tables
            .iter()
            .filter(|(_, w)| w.strong_count() > 0)
            .map(|(k, w)| (k.recipe.to_string(), k.zero, w.strong_count()))
            .collect();
        entries.sort();
        entries
    }
}

fn twiddle<T: FftNum>(index: usize, n: usize) -> Complex<T> {
    compute_twiddle(index, n, FftDirection::Forward)
}

/// Computes a table from its recipe. Rader omega tables need a transform and are built by the
/// plan that owns them.
pub fn standard_factors<T: FftNum>(recipe: TwiddleRecipe) -> Vec<Complex<T>> {
    match recipe {
        TwiddleRecipe::Codelet { r, m } => {
            let n = r * m;
            (0..m)
                .flat_map(|k| (1..r).map(move |j| twiddle(j * k, n)))
                .collect()
        }
        TwiddleRecipe::Transposed { r, m } => {
            let n = r * m;
            (1..r)
                .flat_map(|j| (0..m).map(move |k| twiddle(j * k, n)))
                .collect()
        }
        TwiddleRecipe::TwoLevel { n, log2_radix } => {
            let radix = 1usize << log2_radix;
            let high = (n + radix - 1) / radix;
            (0..radix)
                .map(|i| twiddle(i, n))
                .chain((0..high).map(|i| twiddle(i * radix, n)))
                .collect()
        }
        TwiddleRecipe::Generic { n } => (0..n).map(|k| twiddle(k, n)).collect(),
        TwiddleRecipe::RaderOmega { n, ginv } => {
            // untransformed kernel; the owning plan runs its DFT over this
            let scale = 1.0 / (n - 1) as f64;
            (0..n - 1)
                .map(|i| {
                    let power = modular_exponent(ginv as u64, i as u64, n as u64) as usize;
                    let (c, s) = cexp(power, n);
                    Complex {
                        re: scalar_from_f64(c * scale),
                        im: scalar_from_f64(-s * scale),
                    }
                })
                .collect()
        }
        TwiddleRecipe::RaderTwiddle { r, m, g } => {
            let n = r * m;
            (1..m)
                .flat_map(|i| {
                    (0..r - 1).map(move |k| {
                        let gpower = modular_exponent(g as u64, k as u64, r as u64) as usize;
                        twiddle(i * gpower, n)
                    })
                })
                .collect()
        }
    }
}

/// Looks up `w_n^t` in a two-level table.
#[inline(always)]
pub fn two_level_factor<T: FftNum>(table: &[Complex<T>], log2_radix: u32, t: usize) -> Complex<T> {
    let radix = 1usize << log2_radix;
    table[t & (radix - 1)] * table[radix + (t >> log2_radix)]
}

/// Picks the two-level split for length `n`: about the square root of `n`, rounded to a power of two.
pub fn two_level_log2(n: usize) -> u32 {
    let bits = usize::BITS - n.leading_zeros();
    (bits + 1) / 2
}
