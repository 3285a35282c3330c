use thiserror::Error;

/// Errors reported while describing a transform or asking for a plan.
///
/// Buffer misuse at execution time is a programming error and panics instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("dimension {index} of the {tensor} shape has zero extent")]
    ZeroExtent { tensor: &'static str, index: usize },

    #[error(
        "in-place pairing mismatch: real pointers are {}, imaginary pointers are {}",
        placement_name(*real_inplace),
        placement_name(*imag_inplace)
    )]
    PlacementMismatch {
        real_inplace: bool,
        imag_inplace: bool,
    },

    #[error("transform shape must have a finite rank")]
    InfiniteRank,

    #[error("address span of dimension {index} overflows isize")]
    RankOverflow { index: usize },

    #[error("no solver could plan {signature}")]
    NoPlan { signature: String },
}

fn placement_name(inplace: bool) -> &'static str {
    if inplace {
        "in place"
    } else {
        "out of place"
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_display() {
        let err = PlanError::PlacementMismatch {
            real_inplace: true,
            imag_inplace: false,
        };
        assert_eq!(
            err.to_string(),
            "in-place pairing mismatch: real pointers are in place, imaginary pointers are out of place"
        );

        let err = PlanError::ZeroExtent {
            tensor: "vector",
            index: 1,
        };
        assert_eq!(err.to_string(), "dimension 1 of the vector shape has zero extent");
    }
}
