use std::ops::{Add, AddAssign};

/// Floating-point operation count of a plan, used as the planner's cost estimate.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct OpCount {
    pub add: f64,
    pub mul: f64,
    pub fma: f64,
    pub other: f64,
}

impl OpCount {
    pub const fn zero() -> Self {
        Self {
            add: 0.0,
            mul: 0.0,
            fma: 0.0,
            other: 0.0,
        }
    }
    pub const fn new(add: f64, mul: f64, fma: f64, other: f64) -> Self {
        Self {
            add,
            mul,
            fma,
            other,
        }
    }
    /// Memory traffic only: `other` loads/stores.
    pub const fn moves(count: f64) -> Self {
        Self::new(0.0, 0.0, 0.0, count)
    }

    #[must_use]
    pub fn scale(self, k: f64) -> Self {
        Self::new(self.add * k, self.mul * k, self.fma * k, self.other * k)
    }

    /// `self + k * other`
    #[must_use]
    pub fn madd(self, k: f64, other: OpCount) -> Self {
        self + other.scale(k)
    }

    /// Single-number cost. A fused multiply-add counts as two operations.
    pub fn estimated_cost(&self) -> f64 {
        self.add + self.mul + 2.0 * self.fma + self.other
    }
}

impl Add for OpCount {
    type Output = OpCount;
    fn add(self, rhs: OpCount) -> OpCount {
        OpCount::new(
            self.add + rhs.add,
            self.mul + rhs.mul,
            self.fma + rhs.fma,
            self.other + rhs.other,
        )
    }
}

impl AddAssign for OpCount {
    fn add_assign(&mut self, rhs: OpCount) {
        *self = *self + rhs;
    }
}
