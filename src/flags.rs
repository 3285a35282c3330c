use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Planner mode flags. Combine with `|`.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct PlannerFlags: u32 {
        /// Time candidate plans instead of estimating them. This is the default mode.
        const MEASURE = 0;
        /// Rank candidates by operation count instead of timing them.
        const ESTIMATE = 1 << 0;
        /// Try every candidate and keep the cheapest rather than the first that works.
        const EXHAUSTIVE = 1 << 1;
        /// Never use last-resort solvers when something better works.
        const NO_UGLY = 1 << 2;
        /// Out-of-place plans may overwrite their input.
        const DESTROY_INPUT = 1 << 3;
        /// A vector loop may not plan its child as another vector loop.
        const NO_VRECURSE = 1 << 4;
        /// Forbid the solvers that stage data through a scratch buffer.
        const NO_BUFFERING = 1 << 5;
        /// Forbid copy-then-transform solvers.
        const NO_INDIRECT = 1 << 6;
        /// Avoid full twiddle tables for very large transforms.
        const CONSERVE_MEMORY = 1 << 7;
        /// Only the canonical multi-rank split.
        const NO_RANK_SPLITS = 1 << 8;
        /// Serve plans from the memo only; never search.
        const NO_SEARCH = 1 << 9;
        /// Forbid algorithms that only pay off for large sizes (Rader below a small threshold).
        const NO_SLOW = 1 << 10;
    }
}

impl PlannerFlags {
    // Set on the children of a vector loop when NO_VRECURSE is in effect. Unnamed, so it
    // never shows up in Display.
    pub(crate) const BELOW_VECTOR_LOOP: Self = Self::from_bits_retain(1 << 16);

    #[must_use]
    pub fn without(self, other: Self) -> Self {
        self.difference(other)
    }

    pub fn is_estimate(self) -> bool {
        self.contains(Self::ESTIMATE)
    }
}

impl Default for PlannerFlags {
    fn default() -> Self {
        Self::MEASURE
    }
}

impl fmt::Display for PlannerFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<String> = Vec::new();
        if !self.is_estimate() {
            names.push("measure".to_owned());
        }
        names.extend(
            self.iter_names()
                .map(|(name, _)| name.to_ascii_lowercase().replace('_', "-")),
        );
        f.write_str(&names.join("|"))
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_flags() {
        let flags = PlannerFlags::ESTIMATE | PlannerFlags::NO_UGLY;
        assert!(flags.contains(PlannerFlags::NO_UGLY));
        assert!(!flags.contains(PlannerFlags::EXHAUSTIVE));
        assert!(flags.is_estimate());
        assert!(!PlannerFlags::MEASURE.is_estimate());
        assert_eq!(flags.without(PlannerFlags::NO_UGLY), PlannerFlags::ESTIMATE);
        assert_eq!(flags.to_string(), "estimate|no-ugly");
        assert_eq!(PlannerFlags::MEASURE.to_string(), "measure");
        assert_eq!(PlannerFlags::default(), PlannerFlags::MEASURE);
    }

    #[test]
    fn test_internal_flag_is_unnamed() {
        let flags = PlannerFlags::ESTIMATE | PlannerFlags::BELOW_VECTOR_LOOP;
        assert!(flags.contains(PlannerFlags::BELOW_VECTOR_LOOP));
        assert_eq!(flags.to_string(), "estimate");
        assert_eq!(flags.without(PlannerFlags::BELOW_VECTOR_LOOP), PlannerFlags::ESTIMATE);
    }
}
