use crate::fixed::Fixed;
use serde::{Deserialize, Serialize};

/// A value clamped to a Fixed-point range (for continuous values).
/// Used for: suitability ratios, morale-style multipliers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundedFixed {
    value: Fixed,
    min: Fixed,
    max: Fixed,
}

impl BoundedFixed {
    pub const fn new(value: Fixed, min: Fixed, max: Fixed) -> Self {
        let value = if value.raw() < min.raw() {
            min
        } else if value.raw() > max.raw() {
            max
        } else {
            value
        };
        Self { value, min, max }
    }

    pub fn get(&self) -> Fixed {
        self.value
    }

    pub fn min(&self) -> Fixed {
        self.min
    }

    pub fn max(&self) -> Fixed {
        self.max
    }

    pub fn add(&mut self, delta: Fixed) {
        self.value = (self.value + delta).max(self.min).min(self.max);
    }

    pub fn set(&mut self, value: Fixed) {
        self.value = value.max(self.min).min(self.max);
    }

    /// Ratio from 0.0 to 1.0 as Fixed. Returns 0 if max == min.
    pub fn ratio(&self) -> Fixed {
        let range = self.max - self.min;
        if range == Fixed::ZERO {
            return Fixed::ZERO;
        }
        (self.value - self.min).div(range)
    }

    /// Decay toward a target by a rate (e.g., 0.05 = 5%).
    ///
    /// Deterministic: `value = value + (target - value) * rate`
    pub fn decay_toward(&mut self, target: Fixed, rate: Fixed) {
        let delta = (target - self.value).mul(rate);
        self.value += delta;
        self.value = self.value.max(self.min).min(self.max);
    }
}

/// A value clamped to an integer range (for discrete values).
/// Used for: relationship score (-100 to +100), reputation (0 to 100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoundedInt {
    value: i32,
    min: i32,
    max: i32,
}

impl BoundedInt {
    pub const fn new(value: i32, min: i32, max: i32) -> Self {
        let value = if value < min {
            min
        } else if value > max {
            max
        } else {
            value
        };
        Self { value, min, max }
    }

    pub fn get(&self) -> i32 {
        self.value
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn add(&mut self, delta: i32) {
        self.value = (self.value + delta).clamp(self.min, self.max);
    }

    pub fn set(&mut self, value: i32) {
        self.value = value.clamp(self.min, self.max);
    }

    /// Step toward a target by at most `rate` per call (integer decay).
    pub fn decay_toward(&mut self, target: i32, rate: i32) {
        let diff = target - self.value;
        let step = diff.clamp(-rate, rate);
        self.value = (self.value + step).clamp(self.min, self.max);
    }
}

pub type RelationScore = BoundedInt;
pub type Reputation = BoundedInt;
pub type WarWeariness = BoundedInt;

// Factory functions
pub const fn new_relation() -> BoundedInt {
    BoundedInt::new(0, -100, 100)
}

pub const fn new_reputation() -> BoundedInt {
    BoundedInt::new(50, 0, 100)
}

pub const fn new_war_weariness() -> BoundedInt {
    BoundedInt::new(0, 0, 100)
}
