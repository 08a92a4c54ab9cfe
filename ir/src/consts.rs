//! Conversion between external integers and a circuit's value domain.

use std::fmt::Debug;
use std::hash::Hash;

use rand::{Rng, RngCore};

use crate::error::CircuitError;

/// Validates and converts user-facing values into canonical circuit values
/// and back. This is the only place implicit conversion from external
/// integers happens. Rings implement it for their elements; plain domains
/// (such as single bits) implement it directly.
pub trait ConstManager: Clone + Debug {
    type Value: Clone + Eq + Hash + Debug;

    /// Canonical value from an external integer; fails with
    /// [`CircuitError::InvalidConstant`] when the value is not representable.
    fn create(&self, value: i128) -> Result<Self::Value, CircuitError>;

    /// External representation of a canonical value.
    fn output(&self, value: &Self::Value) -> Result<i128, CircuitError>;

    /// Fresh random value of the domain.
    fn random(&self, rng: &mut dyn RngCore) -> Self::Value;
}

/// Single-bit domain of boolean circuits; constants must be 0 or 1.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Bits;

impl ConstManager for Bits {
    type Value = bool;

    fn create(&self, value: i128) -> Result<bool, CircuitError> {
        match value {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(CircuitError::InvalidConstant(format!(
                "boolean constant not in {{0, 1}}: {other}"
            ))),
        }
    }

    fn output(&self, value: &bool) -> Result<i128, CircuitError> {
        Ok(*value as i128)
    }

    fn random(&self, rng: &mut dyn RngCore) -> bool {
        rng.random_range(0..2) == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bits_reject_non_bits() {
        assert!(!Bits.create(0).unwrap());
        assert!(Bits.create(1).unwrap());
        assert!(Bits.create(2).is_err());
        assert!(Bits.create(-1).is_err());
        assert_eq!(Bits.output(&true).unwrap(), 1);
    }
}
