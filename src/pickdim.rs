//! Buddy suppression for solvers that are registered once per choice of dimension.
//!
//! A solver family such as the vector loop registers several instances that differ only in which
//! dimension they pick. When two instances would pick the same dimension of a given shape, only
//! the first one in the buddy list stays applicable, so the planner never builds the same plan
//! twice.

use crate::tensor::IoDim;

fn eligible(dim: &IoDim, oop: bool) -> bool {
    oop || dim.is == dim.os
}

/// `which > 0` picks the which-th eligible dimension from the front, `which < 0` counts from the
/// back, and `0` picks the middle dimension if it is eligible.
fn really_pick_dim(which: i32, dims: &[IoDim], oop: bool) -> Option<usize> {
    match which {
        0 => {
            let middle = dims.len().checked_sub(1)? / 2;
            eligible(&dims[middle], oop).then_some(middle)
        }
        which if which > 0 => dims
            .iter()
            .enumerate()
            .filter(|(_, d)| eligible(d, oop))
            .nth(which as usize - 1)
            .map(|(index, _)| index),
        which => dims
            .iter()
            .enumerate()
            .rev()
            .filter(|(_, d)| eligible(d, oop))
            .nth(which.unsigned_abs() as usize - 1)
            .map(|(index, _)| index),
    }
}

/// Picks a dimension for the buddy `which`, or `None` if it has no eligible dimension or an
/// earlier buddy in `buddies` would pick the same one.
pub fn pick_dim(which: i32, buddies: &[i32], dims: &[IoDim], oop: bool) -> Option<usize> {
    let picked = really_pick_dim(which, dims, oop)?;
    for &buddy in buddies {
        if buddy == which {
            break;
        }
        if really_pick_dim(buddy, dims, oop) == Some(picked) {
            return None;
        }
    }
    Some(picked)
}
