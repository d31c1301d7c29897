//! Structural hashing of type shapes for intern-table lookup.
//!
//! The interner buckets candidates by a structural hash and resolves collisions
//! with a full structural comparison, so the hash only needs good distribution,
//! not injectivity. The builder uses FNV-1a style sequential mixing rather than
//! XOR combination, which keeps ordered argument lists from self-cancelling.

use std::hash::{DefaultHasher, Hash, Hasher};

/// Hash builder for type shapes using FNV-1a inspired mixing.
///
/// Components are mixed in sequence; order matters, so `(A, B)` and `(B, A)`
/// argument lists produce different hashes.
pub struct TypeShapeHash {
    /// Current hash state
    state: u64,
}

impl TypeShapeHash {
    /// Create a builder seeded with the FNV-1a 64-bit offset basis.
    #[must_use]
    pub fn new() -> Self {
        TypeShapeHash {
            state: 0xcbf2_9ce4_8422_2325_u64,
        }
    }

    /// Mix a 64-bit value into the state.
    fn mix(&mut self, value: u64) {
        self.state ^= value;
        self.state = self.state.wrapping_mul(0x0100_0000_01b3_u64);

        self.state ^= self.state >> 33;
        self.state = self.state.wrapping_mul(0xff51_afd7_ed55_8ccd_u64);
        self.state ^= self.state >> 33;
    }

    /// Mix any hashable component into the shape.
    #[must_use]
    pub fn add_component<T: Hash + ?Sized>(mut self, component: &T) -> Self {
        let mut hasher = DefaultHasher::new();
        component.hash(&mut hasher);
        self.mix(hasher.finish());
        self
    }

    /// Mix a raw 64-bit value, typically an interned descriptor's address.
    #[must_use]
    pub fn add_raw(mut self, value: u64) -> Self {
        self.mix(value);
        self
    }

    /// Finalize and return the hash.
    #[must_use]
    pub fn finalize(self) -> u64 {
        self.state
    }
}

impl Default for TypeShapeHash {
    fn default() -> Self {
        TypeShapeHash::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_order_sensitivity() {
        let ab = TypeShapeHash::new().add_raw(1).add_raw(2).finalize();
        let ba = TypeShapeHash::new().add_raw(2).add_raw(1).finalize();
        assert_ne!(ab, ba);
    }

    #[test]
    fn test_deterministic() {
        let first = TypeShapeHash::new().add_component("List`1").add_raw(7).finalize();
        let second = TypeShapeHash::new().add_component("List`1").add_raw(7).finalize();
        assert_eq!(first, second);
    }

    #[test]
    fn test_no_self_cancellation() {
        // XOR-combined hashes would collapse repeated components to the seed.
        let twice = TypeShapeHash::new().add_raw(42).add_raw(42).finalize();
        let empty = TypeShapeHash::new().finalize();
        assert_ne!(twice, empty);
    }
}
