use num_traits::{FromPrimitive, Signed};
use std::fmt::Debug;

/// Generic floating point number, implemented for f32 and f64
pub trait FftNum: Copy + FromPrimitive + Signed + Sync + Send + Debug + 'static {}

impl<T> FftNum for T where T: Copy + FromPrimitive + Signed + Sync + Send + Debug + 'static {}

// Prints an error raised by an in-place transform. The transform panics after printing.
#[cold]
#[inline(never)]
pub fn fft_error_inplace(required: usize, actual: usize, signature: &str) {
    assert!(
        actual >= required,
        "Provided buffer must be at least {} scalars long to hold {}. Got {}",
        required,
        signature,
        actual
    );
}

// Prints an error raised by an out-of-place transform. The transform panics after printing.
#[cold]
#[inline(never)]
pub fn fft_error_outofplace(
    required_input: usize,
    actual_input: usize,
    required_output: usize,
    actual_output: usize,
    signature: &str,
) {
    assert!(
        actual_input >= required_input,
        "Provided input buffer must be at least {} scalars long to hold {}. Got {}",
        required_input,
        signature,
        actual_input
    );
    assert!(
        actual_output >= required_output,
        "Provided output buffer must be at least {} scalars long to hold {}. Got {}",
        required_output,
        signature,
        actual_output
    );
}

// Raised when a caller hands a problem to a plan that was built for a different one, or misuses regions.
#[cold]
#[inline(never)]
pub fn fft_error_problem(expected: &str, actual: &str) -> ! {
    panic!(
        "Plan was built for problem {}, but was applied to {}",
        expected, actual
    );
}

// Raised when apply() is called on a plan that has not been awakened.
#[cold]
#[inline(never)]
pub fn fft_error_dormant(signature: &str) -> ! {
    panic!("Plan {} must be awake before it is applied", signature);
}

#[cold]
#[inline(never)]
pub fn fft_error_conversion(value: f64) -> ! {
    panic!("Value {} is not representable in the transform's scalar type", value);
}

/// Converts an f64 constant into the transform's scalar type.
#[inline(always)]
pub fn scalar_from_f64<T: FftNum>(value: f64) -> T {
    match T::from_f64(value) {
        Some(converted) => converted,
        None => fft_error_conversion(value),
    }
}
