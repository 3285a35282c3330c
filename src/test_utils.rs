use num_complex::Complex;
use num_traits::Float;

use rand::distributions::{Distribution, Uniform};
use rand::{rngs::StdRng, SeedableRng};

use crate::common::FftNum;
use crate::twiddles::cexp;

/// The seed for the random number generator used to generate
/// random signals. It's defined here so that we have deterministic
/// tests
const RNG_SEED: u64 = 1910_11431_4984;

pub fn random_signal<T: FftNum>(length: usize) -> Vec<Complex<T>> {
    let mut sig = Vec::with_capacity(length);
    let dist: Uniform<f64> = Uniform::new(-10.0, 10.0);
    let mut rng = StdRng::seed_from_u64(RNG_SEED + length as u64);
    for _ in 0..length {
        sig.push(Complex {
            re: T::from_f64(dist.sample(&mut rng)).unwrap(),
            im: T::from_f64(dist.sample(&mut rng)).unwrap(),
        });
    }
    sig
}

pub fn compare_vectors<T: FftNum + Float>(vec1: &[Complex<T>], vec2: &[Complex<T>]) -> bool {
    assert_eq!(vec1.len(), vec2.len());
    let mut error = 0f64;
    for (&a, &b) in vec1.iter().zip(vec2.iter()) {
        error += (a - b).norm().to_f64().unwrap();
    }
    (error / vec1.len().max(1) as f64) < 0.1f64
}

/// Quadratic forward DFT, accumulated in f64.
pub fn naive_dft<T: FftNum + Float>(input: &[Complex<T>]) -> Vec<Complex<T>> {
    let n = input.len();
    (0..n)
        .map(|k| {
            let mut sum = Complex::new(0f64, 0f64);
            for (j, x) in input.iter().enumerate() {
                let (c, s) = cexp((j * k) % n, n);
                let x = Complex::new(x.re.to_f64().unwrap(), x.im.to_f64().unwrap());
                sum += x * Complex::new(c, -s);
            }
            Complex::new(T::from_f64(sum.re).unwrap(), T::from_f64(sum.im).unwrap())
        })
        .collect()
}
