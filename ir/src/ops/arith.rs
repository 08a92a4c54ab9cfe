//! Arithmetic circuits over a base ring.

use std::hash::{Hash, Hasher};
use std::mem::discriminant;

use rand::RngCore;

use crate::circuit::{Circuit, GraphView};
use crate::consts::ConstManager;
use crate::error::CircuitError;
use crate::node::NodeId;
use crate::ops::{check_get, Arity, Evaluated, Operation, Simplified};
use crate::param::{InputName, IntParam, TupleParam};
use crate::ring::Ring;

/// Operations of arithmetic circuits over the ring `R`.
#[derive(Clone, Debug)]
pub enum ArithOp<R: Ring> {
    Input(InputName),
    Const(R::Value),
    Get(i64),
    Add,
    Sub,
    Mul,
    Div,
    /// `a^power`, integer exponent only.
    Exp(i64),
    Inv,
    Neg,
    /// Table lookup indexed by the ring's integer representation.
    Lut(Box<[R::Value]>),
    /// Fresh random ring element on every evaluation.
    Rnd,
}

// Manual equality and hashing keep the bounds on `R::Value` instead of `R`.

impl<R: Ring> PartialEq for ArithOp<R> {
    fn eq(&self, other: &Self) -> bool {
        use ArithOp::*;
        match (self, other) {
            (Input(a), Input(b)) => a == b,
            (Const(a), Const(b)) => a == b,
            (Get(a), Get(b)) | (Exp(a), Exp(b)) => a == b,
            (Lut(a), Lut(b)) => a == b,
            _ => discriminant(self) == discriminant(other),
        }
    }
}

impl<R: Ring> Eq for ArithOp<R> {}

impl<R: Ring> Hash for ArithOp<R> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        use ArithOp::*;
        discriminant(self).hash(state);
        match self {
            Input(name) => name.hash(state),
            Const(value) => value.hash(state),
            Get(index) | Exp(index) => index.hash(state),
            Lut(table) => table.hash(state),
            _ => {}
        }
    }
}

impl<R: Ring> Operation for ArithOp<R> {
    type Value = R::Value;
    type Domain = R;

    fn opcode(&self) -> &'static str {
        use ArithOp::*;
        match self {
            Input(_) => "INPUT",
            Const(_) => "CONST",
            Get(_) => "GET",
            Add => "ADD",
            Sub => "SUB",
            Mul => "MUL",
            Div => "DIV",
            Exp(_) => "EXP",
            Inv => "INV",
            Neg => "NEG",
            Lut(_) => "LUT",
            Rnd => "RND",
        }
    }

    fn arity(&self) -> Arity {
        use ArithOp::*;
        Arity::Exact(match self {
            Input(_) | Const(_) | Rnd => 0,
            Get(_) | Exp(_) | Inv | Neg | Lut(_) => 1,
            Add | Sub | Mul | Div => 2,
        })
    }

    fn symmetric(&self) -> bool {
        matches!(self, Self::Add | Self::Mul)
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
        ring: &R,
        rng: &mut dyn RngCore,
        args: &[R::Value],
    ) -> Result<Evaluated<R::Value>, CircuitError> {
        use ArithOp::*;
        let value = match self {
            Const(value) => value.clone(),
            Add => ring.add(&args[0], &args[1]),
            Sub => ring.sub(&args[0], &args[1]),
            Mul => ring.mul(&args[0], &args[1]),
            Div => ring.div(&args[0], &args[1])?,
            Exp(power) => ring.exp(&args[0], *power)?,
            Inv => ring.inv(&args[0])?,
            Neg => ring.neg(&args[0]),
            Lut(table) => {
                let index = ring.integer_representation(&args[0]).ok_or_else(|| {
                    CircuitError::Eval("LUT index has no integer representation".into())
                })?;
                table
                    .get(index as usize)
                    .cloned()
                    .ok_or_else(|| CircuitError::Eval(format!("LUT index {index} out of range")))?
            }
            Rnd => ring.random(rng),
            Input(_) | Get(_) => unreachable!("resolved by the evaluator"),
        };
        Ok(Evaluated::One(value))
    }

    fn simplify(
        &self,
        incoming: &[NodeId],
        graph: GraphView<'_, Self>,
        ring: &R,
    ) -> Option<Simplified<Self>> {
        use ArithOp::*;
        let &[a, b] = incoming else { return None };
        let zero = ring.create(0).ok()?;
        let one = ring.create(1).ok()?;
        match self {
            Add => {
                if graph.constant(a) == Some(&zero) {
                    return Some(Simplified::Node(b));
                }
                if graph.constant(b) == Some(&zero) {
                    return Some(Simplified::Node(a));
                }
                None
            }
            Sub => {
                if graph.constant(b) == Some(&zero) {
                    return Some(Simplified::Node(a));
                }
                if graph.constant(a) == Some(&zero) {
                    return Some(Simplified::Rewrite(Neg, vec![b]));
                }
                None
            }
            Mul => {
                if graph.constant(a) == Some(&zero) || graph.constant(b) == Some(&one) {
                    return Some(Simplified::Node(a));
                }
                if graph.constant(b) == Some(&zero) || graph.constant(a) == Some(&one) {
                    return Some(Simplified::Node(b));
                }
                None
            }
            _ => None,
        }
    }

    fn input(name: InputName) -> Self {
        Self::Input(name)
    }

    fn constant(value: R::Value) -> Self {
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

    fn as_constant(&self) -> Option<&R::Value> {
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

/// Operator-style construction of arithmetic circuits.
impl<R: Ring> Circuit<ArithOp<R>> {
    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(ArithOp::Add, &[a, b])
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(ArithOp::Sub, &[a, b])
    }

    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(ArithOp::Mul, &[a, b])
    }

    pub fn div(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(ArithOp::Div, &[a, b])
    }

    pub fn neg(&mut self, a: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(ArithOp::Neg, &[a])
    }

    pub fn inv(&mut self, a: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(ArithOp::Inv, &[a])
    }

    pub fn exp(&mut self, a: NodeId, power: i64) -> Result<NodeId, CircuitError> {
        let power = IntParam::new().create(power)?;
        self.apply(ArithOp::Exp(power), &[a])
    }

    /// Table lookup; entries are converted through the constant manager.
    pub fn lut(&mut self, a: NodeId, table: &[i128]) -> Result<NodeId, CircuitError> {
        let entries: Vec<R::Value> = table
            .iter()
            .map(|value| self.domain().create(*value))
            .collect::<Result<_, _>>()?;
        let table = TupleParam::non_empty().create(entries)?;
        self.apply(ArithOp::Lut(table), &[a])
    }

    pub fn rnd(&mut self) -> Result<NodeId, CircuitError> {
        self.apply(ArithOp::Rnd, &[])
    }

    /// Expresses the circuit as an affine map `C(x) = A·x + b` by evaluating
    /// it on the unit vectors and on the zero vector in one batch run.
    /// Assumes the circuit is linear; this is not verified.
    #[allow(clippy::type_complexity)]
    pub fn to_matrix(&self) -> Result<(Vec<Vec<R::Value>>, Vec<R::Value>), CircuitError> {
        let zero = self.domain().create(0)?;
        let one = self.domain().create(1)?;
        let width = self.n_inputs();

        // column w is the all-zero vector
        let inputs: Vec<Vec<R::Value>> = (0..width)
            .map(|i| {
                let mut column = vec![zero.clone(); width + 1];
                column[i] = one.clone();
                column
            })
            .collect();

        let mut rng = rand::rng();
        let output = self.evaluate_columns(&inputs, width + 1, &mut rng)?;
        let shift: Vec<R::Value> = output.iter().map(|row| row[width].clone()).collect();
        let matrix: Vec<Vec<R::Value>> = output
            .iter()
            .zip(&shift)
            .map(|(row, b)| (0..width).map(|j| self.domain().sub(&row[j], b)).collect())
            .collect();
        Ok((matrix, shift))
    }
}
