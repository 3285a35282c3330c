//! FFT plan construction for transforms of any size, shape and layout.
//!
//! A transform is described by a [`Problem`]: a shape [`Tensor`] of `(n, is, os)` dimensions, a
//! vector tensor of independent repetitions, and symbolic real and imaginary data pointers for the
//! input and output. A [`Planner`] searches its registered [`Solver`]s for a way to compute it,
//! recursively planning the sub-problems each solver decomposes the transform into, and memoizes
//! every answer (failures included) so shared sub-problems are only planned once.
//!
//! The resulting [`Plan`] is a tree of plan nodes. Plans come out of the planner dormant: waking
//! one acquires its twiddle tables from the planner's shared cache, and putting it to sleep
//! releases them while keeping the structure.
//!
//! ### Usage
//!
//! ```
//! use fftplan::{FftDirection, Placement, Planner, PlannerFlags, Problem};
//! use fftplan::num_complex::Complex;
//!
//! let problem = Problem::dft_1d(1234, FftDirection::Forward, Placement::InPlace).unwrap();
//! let mut planner = Planner::<f64>::new(PlannerFlags::ESTIMATE);
//! let plan = planner.plan_dft(&problem).unwrap();
//!
//! let mut buffer = vec![Complex { re: 0.0f64, im: 0.0f64 }; 1234];
//! plan.process_inplace(&problem, &mut buffer);
//! ```
//!
//! Only forward transforms are ever computed. An inverse transform is a forward transform with the
//! real and imaginary pointers swapped, which [`Problem::dft`] does for
//! [`FftDirection::Inverse`]. Outputs are not normalized.
//!
//! ### Planning modes
//!
//! With [`PlannerFlags::ESTIMATE`] candidates are ranked by their operation counts. Without it
//! the planner times each candidate on scratch buffers, which gives faster plans at a higher
//! planning cost. [`PlannerFlags::EXHAUSTIVE`] keeps searching past the first plan that works and
//! returns the cheapest one.
//!
//! ### Threads
//!
//! A planner configured with more than one thread may return plans that split vector loops into
//! blocks and run them through a [`SpawnLoop`]. [`ScopedThreads`] uses scoped std threads, and
//! with the `rayon` feature [`RayonLoop`] uses the global rayon pool.

use std::fmt::Display;

pub use num_complex;
pub use num_traits;

mod array_utils;
mod common;
mod error;
mod flags;
mod math_utils;
mod ops;
mod pickdim;
mod plan;
mod planner;
mod problem;
mod solver;
mod tensor;
mod threads;
mod twiddles;

/// Individual solvers and the plan nodes they build.
pub mod algorithm;

#[cfg(test)]
mod test_utils;

pub use crate::common::FftNum;
pub use crate::error::PlanError;
pub use crate::flags::PlannerFlags;
pub use crate::ops::OpCount;
pub use crate::pickdim::pick_dim;
pub use crate::plan::{Plan, PlanState, Wakefulness};
pub use crate::planner::{Planner, PlannerConfig, PlannerStats};
pub use crate::problem::{DataPtr, Placement, Problem, Region};
pub use crate::solver::{Score, Solver};
pub use crate::tensor::{InPlaceKind, IoDim, Tensor};
#[cfg(feature = "rayon")]
pub use crate::threads::RayonLoop;
pub use crate::threads::{ScopedThreads, SerialLoop, SpawnLoop};
pub use crate::twiddles::{TwiddleCache, TwiddleKey, TwiddleRecipe, TwiddleTable};

/// Represents a FFT direction, IE a forward FFT or an inverse FFT
#[derive(Copy, Clone, PartialEq, Eq, Debug, Hash)]
pub enum FftDirection {
    Forward,
    Inverse,
}

impl FftDirection {
    /// Returns the opposite direction of `self`.
    ///
    ///  - If `self` is `FftDirection::Forward`, returns `FftDirection::Inverse`
    ///  - If `self` is `FftDirection::Inverse`, returns `FftDirection::Forward`
    #[inline]
    pub fn opposite_direction(&self) -> FftDirection {
        match self {
            Self::Forward => Self::Inverse,
            Self::Inverse => Self::Forward,
        }
    }
}

impl Display for FftDirection {
    fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> Result<(), ::std::fmt::Error> {
        match self {
            Self::Forward => f.write_str("Forward"),
            Self::Inverse => f.write_str("Inverse"),
        }
    }
}
