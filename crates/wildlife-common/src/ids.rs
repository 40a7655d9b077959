//! Generational handles for animals living in an arena.
//!
//! A handle is an `(index, generation)` pair. When an animal is removed its
//! slot's generation is bumped, so every outstanding handle to it stops
//! resolving instead of pointing at whatever reuses the slot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable handle to an animal in the simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId {
    index: u32,
    generation: u32,
}

impl EntityId {
    /// Creates a handle from a slot index and generation.
    #[must_use]
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    /// Returns the arena slot index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// Returns the slot generation this handle was issued for.
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }

    /// Returns the handle the same slot will carry after its next reuse.
    #[must_use]
    pub const fn next_generation(self) -> Self {
        Self {
            index: self.index,
            generation: self.generation.wrapping_add(1),
        }
    }

    /// Packs the handle into a single integer (generation in the high bits).
    #[must_use]
    pub const fn to_bits(self) -> u64 {
        ((self.generation as u64) << 32) | self.index as u64
    }

    /// Unpacks a handle produced by [`EntityId::to_bits`].
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self {
            index: bits as u32,
            generation: (bits >> 32) as u32,
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}v{}", self.index, self.generation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn bits_round_trip(index in any::<u32>(), generation in any::<u32>()) {
            let id = EntityId::new(index, generation);
            prop_assert_eq!(EntityId::from_bits(id.to_bits()), id);
        }
    }

    #[test]
    fn test_generation_wraps() {
        let id = EntityId::new(1, u32::MAX);
        assert_eq!(id.next_generation().generation(), 0);
    }
}
