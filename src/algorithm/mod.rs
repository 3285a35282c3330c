//! The built-in solvers, and the plan nodes they build.

use std::sync::Arc;

use crate::common::FftNum;
use crate::planner::PlannerConfig;
use crate::solver::Solver;

pub mod buffered;
pub mod butterflies;
pub mod cooley_tukey;
pub mod direct;
pub mod generic;
pub mod indirect;
pub mod rank0;
pub mod rank_geq2;
pub mod raders_algorithm;
pub mod twiddle_stage;
pub mod vecloop;

use self::buffered::BufferedSolver;
use self::butterflies::Codelet;
use self::cooley_tukey::{CooleyTukeySolver, Decimation, RadixChoice};
use self::direct::{DirectBufferedSolver, DirectSolver};
use self::generic::GenericSolver;
use self::indirect::{IndirectSolver, IndirectStrategy};
use self::rank0::{NopSolver, Rank0Solver};
use self::rank_geq2::RankGeq2Solver;
use self::raders_algorithm::{RaderDitSolver, RaderSolver};
use self::twiddle_stage::StageKind;
use self::vecloop::{ThreadedVecLoopSolver, VecLoopSolver};

/// Every built-in solver, in the order the planner tries equally scored candidates.
pub fn default_solvers<T: FftNum>(config: &PlannerConfig) -> Vec<Arc<dyn Solver<T>>> {
    let mut solvers: Vec<Arc<dyn Solver<T>>> = vec![Arc::new(NopSolver), Arc::new(Rank0Solver)];

    for n in Codelet::<T>::SIZES {
        solvers.push(Arc::new(DirectSolver::new(n)));
    }
    for n in Codelet::<T>::SIZES {
        solvers.push(Arc::new(DirectBufferedSolver::new(n)));
    }

    for r in Codelet::<T>::SIZES {
        let radix = RadixChoice::Fixed(r);
        solvers.push(Arc::new(CooleyTukeySolver::new(radix, Decimation::Dit, StageKind::Direct)));
        solvers.push(Arc::new(CooleyTukeySolver::new(radix, Decimation::Dit, StageKind::DirectBuf)));
        solvers.push(Arc::new(CooleyTukeySolver::new(radix, Decimation::Dif, StageKind::Direct)));
    }
    for radix in [RadixChoice::FirstDivisor, RadixChoice::LargestPrimeFactor] {
        for dec in [Decimation::Dit, Decimation::Dif] {
            for stage in [StageKind::Dft, StageKind::DftTwoLevel] {
                solvers.push(Arc::new(CooleyTukeySolver::new(radix, dec, stage)));
            }
        }
    }
    for &k in &config.genericbuf_quotients {
        for &batch in &config.genericbuf_batches {
            solvers.push(Arc::new(CooleyTukeySolver::new(
                RadixChoice::SqrtOfQuotient(k),
                Decimation::Dit,
                StageKind::GenericBuf { batch },
            )));
        }
    }

    for max_nbuf_index in 0..config.buffered_max_nbufs.len() {
        solvers.push(Arc::new(BufferedSolver::new(max_nbuf_index)));
    }
    for &buddy in RankGeq2Solver::BUDDIES {
        solvers.push(Arc::new(RankGeq2Solver::new(buddy)));
    }
    // threaded loops go first so they win ties with the serial ones
    if config.nthreads > 1 {
        solvers.push(Arc::new(ThreadedVecLoopSolver));
    }
    for &buddy in VecLoopSolver::BUDDIES {
        solvers.push(Arc::new(VecLoopSolver::new(buddy)));
    }
    solvers.push(Arc::new(IndirectSolver::new(IndirectStrategy::Before)));
    solvers.push(Arc::new(IndirectSolver::new(IndirectStrategy::After)));

    solvers.push(Arc::new(RaderSolver));
    solvers.push(Arc::new(RaderDitSolver));
    solvers.push(Arc::new(GenericSolver));
    solvers
}
