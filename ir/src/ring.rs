//! Value domains of arithmetic circuits.

use rand::{Rng, RngCore};

use crate::consts::ConstManager;
use crate::error::CircuitError;

/// A base ring the arithmetic circuit computes over.
///
/// A ring is also the constant manager of its circuits: element construction
/// and the external round-trip live on [`ConstManager`], the algebra lives
/// here.
pub trait Ring: ConstManager {
    /// Integer representation of an element, used for LUT indexing. `None`
    /// when the ring has no such representation.
    fn integer_representation(&self, elem: &Self::Value) -> Option<u128>;

    /// Number of elements; `None` for infinite rings.
    fn order(&self) -> Option<u128>;

    fn add(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;
    fn sub(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;
    fn mul(&self, a: &Self::Value, b: &Self::Value) -> Self::Value;
    fn neg(&self, a: &Self::Value) -> Self::Value;

    fn div(&self, a: &Self::Value, b: &Self::Value) -> Result<Self::Value, CircuitError>;
    fn inv(&self, a: &Self::Value) -> Result<Self::Value, CircuitError>;

    /// `a^power` by square-and-multiply. Negative powers go through
    /// [`Ring::inv`]; the exponent is integer-only.
    fn exp(&self, a: &Self::Value, power: i64) -> Result<Self::Value, CircuitError> {
        let mut base = if power < 0 { self.inv(a)? } else { a.clone() };
        let mut e = power.unsigned_abs();
        let mut res = self.create(1)?;
        while e > 0 {
            if e & 1 == 1 {
                res = self.mul(&res, &base);
            }
            e >>= 1;
            if e > 0 {
                base = self.mul(&base, &base);
            }
        }
        Ok(res)
    }
}

/// Integers modulo `n`, for `n >= 2`. Covers `Z/nZ` and prime fields.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModRing {
    modulus: u64,
}

impl ModRing {
    pub fn new(modulus: u64) -> Self {
        assert!(modulus >= 2, "modulus must be at least 2");
        Self { modulus }
    }

    pub fn modulus(&self) -> u64 {
        self.modulus
    }
}

impl ConstManager for ModRing {
    type Value = u64;

    fn create(&self, value: i128) -> Result<u64, CircuitError> {
        Ok(value.rem_euclid(self.modulus as i128) as u64)
    }

    fn output(&self, value: &u64) -> Result<i128, CircuitError> {
        Ok(*value as i128)
    }

    fn random(&self, rng: &mut dyn RngCore) -> u64 {
        rng.random_range(0..self.modulus)
    }
}

impl Ring for ModRing {
    fn integer_representation(&self, elem: &u64) -> Option<u128> {
        Some(*elem as u128)
    }

    fn order(&self) -> Option<u128> {
        Some(self.modulus as u128)
    }

    fn add(&self, a: &u64, b: &u64) -> u64 {
        ((*a as u128 + *b as u128) % self.modulus as u128) as u64
    }

    fn sub(&self, a: &u64, b: &u64) -> u64 {
        if a >= b {
            a - b
        } else {
            self.modulus - (b - a)
        }
    }

    fn mul(&self, a: &u64, b: &u64) -> u64 {
        ((*a as u128 * *b as u128) % self.modulus as u128) as u64
    }

    fn neg(&self, a: &u64) -> u64 {
        if *a == 0 { 0 } else { self.modulus - a }
    }

    fn div(&self, a: &u64, b: &u64) -> Result<u64, CircuitError> {
        let inv = self.inv(b)?;
        Ok(self.mul(a, &inv))
    }

    fn inv(&self, a: &u64) -> Result<u64, CircuitError> {
        // extended Euclid over signed 128-bit intermediates
        let (mut r0, mut r1) = (self.modulus as i128, *a as i128);
        let (mut t0, mut t1) = (0i128, 1i128);
        while r1 != 0 {
            let q = r0 / r1;
            (r0, r1) = (r1, r0 - q * r1);
            (t0, t1) = (t1, t0 - q * t1);
        }
        if r0 != 1 {
            return Err(CircuitError::Eval(format!(
                "{a} is not invertible modulo {}",
                self.modulus
            )));
        }
        Ok(t0.rem_euclid(self.modulus as i128) as u64)
    }
}

/// Unbounded integers, the "no base ring" mode: constants pass through
/// unchanged.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct IntRing;

impl ConstManager for IntRing {
    type Value = i128;

    fn create(&self, value: i128) -> Result<i128, CircuitError> {
        Ok(value)
    }

    fn output(&self, value: &i128) -> Result<i128, CircuitError> {
        Ok(*value)
    }

    fn random(&self, rng: &mut dyn RngCore) -> i128 {
        rng.random::<i64>() as i128
    }
}

impl Ring for IntRing {
    fn integer_representation(&self, elem: &i128) -> Option<u128> {
        u128::try_from(*elem).ok()
    }

    fn order(&self) -> Option<u128> {
        None
    }

    fn add(&self, a: &i128, b: &i128) -> i128 {
        a + b
    }

    fn sub(&self, a: &i128, b: &i128) -> i128 {
        a - b
    }

    fn mul(&self, a: &i128, b: &i128) -> i128 {
        a * b
    }

    fn neg(&self, a: &i128) -> i128 {
        -a
    }

    fn div(&self, a: &i128, b: &i128) -> Result<i128, CircuitError> {
        if *b == 0 {
            return Err(CircuitError::Eval("division by zero".into()));
        }
        Ok(a / b)
    }

    fn inv(&self, a: &i128) -> Result<i128, CircuitError> {
        match *a {
            1 => Ok(1),
            -1 => Ok(-1),
            other => Err(CircuitError::Eval(format!(
                "{other} is not invertible over the integers"
            ))),
        }
    }
}
