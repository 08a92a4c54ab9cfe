//! Bitwise circuits over fixed-width words.

use rand::RngCore;

use crate::circuit::Circuit;
use crate::consts::ConstManager;
use crate::error::CircuitError;
use crate::node::NodeId;
use crate::ops::{check_get, Arity, Evaluated, Operation};
use crate::param::{InputName, IntParam, TupleParam};
use crate::ring::Ring;
use crate::word::WordRing;

/// Operations of bitwise circuits: logic, shifts and rotations, and word
/// arithmetic closed mod `2^w`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum WordOp {
    Input(InputName),
    Const(u64),
    Get(i64),
    And,
    Or,
    Xor,
    Not,
    Shl(u32),
    Shr(u32),
    Rol(u32),
    Ror(u32),
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Neg,
    Lut(Box<[u64]>),
    Rnd,
}

impl Operation for WordOp {
    type Value = u64;
    type Domain = WordRing;

    fn opcode(&self) -> &'static str {
        use WordOp::*;
        match self {
            Input(_) => "INPUT",
            Const(_) => "CONST",
            Get(_) => "GET",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Not => "NOT",
            Shl(_) => "SHL",
            Shr(_) => "SHR",
            Rol(_) => "ROL",
            Ror(_) => "ROR",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Mod => "MOD",
            Neg => "NEG",
            Lut(_) => "LUT",
            Rnd => "RND",
        }
    }

    fn arity(&self) -> Arity {
        use WordOp::*;
        Arity::Exact(match self {
            Input(_) | Const(_) | Rnd => 0,
            Get(_) | Not | Shl(_) | Shr(_) | Rol(_) | Ror(_) | Neg | Lut(_) => 1,
            And | Or | Xor | Add | Sub | Mul | Div | Mod => 2,
        })
    }

    fn symmetric(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor | Self::Add | Self::Mul)
    }

    fn precomputable(&self) -> bool {
        !matches!(self, Self::Input(_) | Self::Rnd)
    }

    fn validate(
        &self,
        incoming: &[crate::node::OutputArity],
    ) -> Result<(), CircuitError> {
        if let Self::Get(index) = self {
            check_get(*index, incoming)?;
        }
        Ok(())
    }

    fn eval(
        &self,
        ring: &WordRing,
        rng: &mut dyn RngCore,
        args: &[u64],
    ) -> Result<Evaluated<u64>, CircuitError> {
        use WordOp::*;
        let value = match self {
            Const(value) => *value,
            And => ring.and(args[0], args[1]),
            Or => ring.or(args[0], args[1]),
            Xor => ring.xor(args[0], args[1]),
            Not => ring.not(args[0]),
            Shl(shift) => ring.shl(args[0], *shift),
            Shr(shift) => ring.shr(args[0], *shift),
            Rol(shift) => ring.rol(args[0], *shift),
            Ror(shift) => ring.ror(args[0], *shift),
            Add => ring.add(&args[0], &args[1]),
            Sub => ring.sub(&args[0], &args[1]),
            Mul => ring.mul(&args[0], &args[1]),
            Div => ring.div(&args[0], &args[1])?,
            Mod => ring.rem(args[0], args[1])?,
            Neg => ring.neg(&args[0]),
            Lut(table) => table
                .get(args[0] as usize)
                .copied()
                .ok_or_else(|| CircuitError::Eval(format!("LUT index {} out of range", args[0])))?,
            Rnd => ring.random(rng),
            Input(_) | Get(_) => unreachable!("resolved by the evaluator"),
        };
        Ok(Evaluated::One(value))
    }

    fn input(name: InputName) -> Self {
        Self::Input(name)
    }

    fn constant(value: u64) -> Self {
        Self::Const(value)
    }

    fn get(index: i64) -> Self {
        Self::Get(index)
    }

    fn as_input(&self) -> Option<&InputName> {
        match self {
            Self::Input(name) => Some(name),
            _ => None,
        }
    }

    fn as_constant(&self) -> Option<&u64> {
        match self {
            Self::Const(value) => Some(value),
            _ => None,
        }
    }

    fn as_get(&self) -> Option<i64> {
        match self {
            Self::Get(index) => Some(*index),
            _ => None,
        }
    }
}

fn shift_param(shift: i64) -> Result<u32, CircuitError> {
    let shift = IntParam::new().min(0).max(u32::MAX as i64).create(shift)?;
    Ok(shift as u32)
}

/// Operator-style construction of bitwise circuits.
impl Circuit<WordOp> {
    pub fn and(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::And, &[a, b])
    }

    pub fn or(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Or, &[a, b])
    }

    pub fn xor(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Xor, &[a, b])
    }

    pub fn not(&mut self, a: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Not, &[a])
    }

    pub fn shl(&mut self, a: NodeId, shift: i64) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Shl(shift_param(shift)?), &[a])
    }

    pub fn shr(&mut self, a: NodeId, shift: i64) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Shr(shift_param(shift)?), &[a])
    }

    pub fn rol(&mut self, a: NodeId, shift: i64) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Rol(shift_param(shift)?), &[a])
    }

    pub fn ror(&mut self, a: NodeId, shift: i64) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Ror(shift_param(shift)?), &[a])
    }

    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Add, &[a, b])
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Sub, &[a, b])
    }

    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Mul, &[a, b])
    }

    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Div, &[a, b])
    }

    pub fn rem(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Mod, &[a, b])
    }

    pub fn neg(&mut self, a: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Neg, &[a])
    }

    pub fn lut(&mut self, a: NodeId, table: &[i128]) -> Result<NodeId, CircuitError> {
        let entries: Vec<u64> = table
            .iter()
            .map(|value| self.domain().create(*value))
            .collect::<Result<_, _>>()?;
        let table = TupleParam::non_empty().create(entries)?;
        self.apply(WordOp::Lut(table), &[a])
    }

    pub fn rnd(&mut self) -> Result<NodeId, CircuitError> {
        self.apply(WordOp::Rnd, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn word_circuit(width: u32) -> Circuit<WordOp> {
        Circuit::new(WordRing::new(width))
    }

    /// `ROL(3)` on an 8-bit word.
    #[test]
    fn test_rotate_left() {
        let mut circuit = word_circuit(8);
        let x = circuit.add_input_named("x").unwrap();
        let rotated = circuit.rol(x, 3).unwrap();
        circuit.add_output(rotated).unwrap();
        assert_eq!(circuit.evaluate(&[0b0001_0110]).unwrap(), vec![0b1011_0000]);
    }

    #[test]
    fn test_word_arithmetic_wraps() {
        let mut circuit = word_circuit(8);
        let x = circuit.add_input_named("x").unwrap();
        let y = circuit.add_input_named("y").unwrap();
        let sum = circuit.add(x, y).unwrap();
        let negated = circuit.neg(sum).unwrap();
        circuit.add_output(negated).unwrap();
        assert_eq!(circuit.evaluate(&[200, 100]).unwrap(), vec![256 - 44]);
    }

    #[test]
    fn test_division_by_zero_fails() {
        let mut circuit = word_circuit(8);
        let x = circuit.add_input_named("x").unwrap();
        let zero = circuit.add_const(0).unwrap();
        let quotient = circuit.div(x, zero).unwrap();
        circuit.add_output(quotient).unwrap();
        assert!(circuit.evaluate(&[5]).is_err());
    }

    #[test]
    fn test_negative_shift_rejected() {
        let mut circuit = word_circuit(8);
        let x = circuit.add_input_named("x").unwrap();
        assert!(matches!(
            circuit.shl(x, -1),
            Err(CircuitError::Parameter(_))
        ));
    }

    #[test]
    fn test_word_lut() {
        let mut circuit = word_circuit(4);
        let x = circuit.add_input_named("x").unwrap();
        let table: Vec<i128> = (0..16).map(|v| (15 - v)).collect();
        let mapped = circuit.lut(x, &table).unwrap();
        circuit.add_output(mapped).unwrap();
        assert_eq!(circuit.evaluate(&[3]).unwrap(), vec![12]);
    }

    #[test]
    fn test_mod_and_shifts() {
        let mut circuit = word_circuit(16);
        let x = circuit.add_input_named("x").unwrap();
        let seven = circuit.add_const(7).unwrap();
        let reduced = circuit.rem(x, seven).unwrap();
        let shifted = circuit.shl(reduced, 2).unwrap();
        circuit.add_output(shifted).unwrap();
        assert_eq!(circuit.evaluate(&[65]).unwrap(), vec![(65 % 7) << 2]);
    }
}
