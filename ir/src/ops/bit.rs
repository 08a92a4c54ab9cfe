//! Boolean circuits over single bits.

use rand::RngCore;

use crate::circuit::{Circuit, GraphView};
use crate::consts::{Bits, ConstManager};
use crate::error::CircuitError;
use crate::node::{NodeId, OutputArity};
use crate::ops::{check_get, Arity, Evaluated, Operation, Simplified};
use crate::param::{InputName, TupleParam};

/// Operations of boolean circuits. Addition and subtraction coincide with
/// XOR, multiplication with AND.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum BitOp {
    Input(InputName),
    Const(bool),
    Get(i64),
    And,
    Or,
    Xor,
    Not,
    /// Variadic truth table indexed by the input bits, first input most
    /// significant; the table holds `2^arity` entries.
    Lut(Box<[bool]>),
    Rnd,
}

impl Operation for BitOp {
    type Value = bool;
    type Domain = Bits;

    fn opcode(&self) -> &'static str {
        use BitOp::*;
        match self {
            Input(_) => "INPUT",
            Const(_) => "CONST",
            Get(_) => "GET",
            And => "AND",
            Or => "OR",
            Xor => "XOR",
            Not => "NOT",
            Lut(_) => "LUT",
            Rnd => "RND",
        }
    }

    fn arity(&self) -> Arity {
        use BitOp::*;
        match self {
            Input(_) | Const(_) | Rnd => Arity::Exact(0),
            Get(_) | Not => Arity::Exact(1),
            And | Or | Xor => Arity::Exact(2),
            Lut(_) => Arity::Variable,
        }
    }

    fn symmetric(&self) -> bool {
        matches!(self, Self::And | Self::Or | Self::Xor)
    }

    fn precomputable(&self) -> bool {
        !matches!(self, Self::Input(_) | Self::Rnd)
    }

    fn validate(&self, incoming: &[OutputArity]) -> Result<(), CircuitError> {
        match self {
            Self::Get(index) => check_get(*index, incoming),
            Self::Lut(table) => {
                let expected = 1usize
                    .checked_shl(incoming.len() as u32)
                    .ok_or_else(|| CircuitError::Parameter("too many LUT inputs".into()))?;
                if table.len() != expected {
                    return Err(CircuitError::Parameter(format!(
                        "LUT table of {} entries does not cover {} inputs",
                        table.len(),
                        incoming.len()
                    )));
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn eval(
        &self,
        domain: &Bits,
        rng: &mut dyn RngCore,
        args: &[bool],
    ) -> Result<Evaluated<bool>, CircuitError> {
        use BitOp::*;
        let value = match self {
            Const(value) => *value,
            And => args[0] & args[1],
            Or => args[0] | args[1],
            Xor => args[0] ^ args[1],
            Not => !args[0],
            Lut(table) => {
                let index = args.iter().fold(0usize, |acc, bit| (acc << 1) | *bit as usize);
                table[index]
            }
            Rnd => domain.random(rng),
            Input(_) | Get(_) => unreachable!("resolved by the evaluator"),
        };
        Ok(Evaluated::One(value))
    }

    fn simplify(
        &self,
        incoming: &[NodeId],
        graph: GraphView<'_, Self>,
        _domain: &Bits,
    ) -> Option<Simplified<Self>> {
        use BitOp::*;
        match (self, incoming) {
            (Xor, &[a, b]) => {
                if graph.constant(a) == Some(&false) {
                    return Some(Simplified::Node(b));
                }
                if graph.constant(b) == Some(&false) {
                    return Some(Simplified::Node(a));
                }
                if graph.constant(a) == Some(&true) {
                    return Some(Simplified::Rewrite(Not, vec![b]));
                }
                if graph.constant(b) == Some(&true) {
                    return Some(Simplified::Rewrite(Not, vec![a]));
                }
                None
            }
            (And, &[a, b]) => {
                if graph.constant(a) == Some(&false) || graph.constant(b) == Some(&true) {
                    return Some(Simplified::Node(a));
                }
                if graph.constant(b) == Some(&false) || graph.constant(a) == Some(&true) {
                    return Some(Simplified::Node(b));
                }
                None
            }
            (Not, &[a]) => {
                // double negation
                if matches!(graph.op(a), Not) {
                    return Some(Simplified::Node(graph.incoming(a)[0]));
                }
                None
            }
            _ => None,
        }
    }

    fn input(name: InputName) -> Self {
        Self::Input(name)
    }

    fn constant(value: bool) -> Self {
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

    fn as_constant(&self) -> Option<&bool> {
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

/// Operator-style construction of boolean circuits. `add`/`sub` build XOR
/// and `mul` builds AND.
impl Circuit<BitOp> {
    pub fn and(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(BitOp::And, &[a, b])
    }

    pub fn or(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(BitOp::Or, &[a, b])
    }

    pub fn xor(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(BitOp::Xor, &[a, b])
    }

    pub fn not(&mut self, a: NodeId) -> Result<NodeId, CircuitError> {
        self.apply(BitOp::Not, &[a])
    }

    pub fn add(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.xor(a, b)
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.xor(a, b)
    }

    pub fn mul(&mut self, a: NodeId, b: NodeId) -> Result<NodeId, CircuitError> {
        self.and(a, b)
    }

    /// Variadic table lookup over the given input bits.
    pub fn lut(&mut self, table: &[i128], inputs: &[NodeId]) -> Result<NodeId, CircuitError> {
        let entries: Vec<bool> = table
            .iter()
            .map(|value| self.domain().create(*value))
            .collect::<Result<_, _>>()?;
        let table = TupleParam::non_empty().create(entries)?;
        self.apply(BitOp::Lut(table), inputs)
    }

    pub fn rnd(&mut self) -> Result<NodeId, CircuitError> {
        self.apply(BitOp::Rnd, &[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bit_circuit() -> Circuit<BitOp> {
        Circuit::new(Bits)
    }

    /// `LUT(0,1,1,0)` is the XOR truth table.
    #[test]
    fn test_lut_of_xor() {
        let mut circuit = bit_circuit();
        let a = circuit.add_input_named("a").unwrap();
        let b = circuit.add_input_named("b").unwrap();
        let out = circuit.lut(&[0, 1, 1, 0], &[a, b]).unwrap();
        circuit.add_output(out).unwrap();

        for (a, b) in [(0, 0), (0, 1), (1, 0), (1, 1)] {
            assert_eq!(circuit.evaluate(&[a, b]).unwrap(), vec![a ^ b]);
        }
    }

    #[test]
    fn test_lut_table_must_cover_inputs() {
        let mut circuit = bit_circuit();
        let a = circuit.add_input_named("a").unwrap();
        assert!(matches!(
            circuit.lut(&[0, 1, 1, 0], &[a]),
            Err(CircuitError::Parameter(_))
        ));
    }

    #[test]
    fn test_boolean_constants_checked() {
        let mut circuit = bit_circuit();
        assert!(matches!(
            circuit.add_const(2),
            Err(CircuitError::InvalidConstant(_))
        ));
    }

    #[test]
    fn test_xor_with_one_becomes_not() {
        let mut circuit = Circuit::<BitOp>::optimized(Bits);
        let a = circuit.add_input_named("a").unwrap();
        let one = circuit.add_const(1).unwrap();
        let negated = circuit.xor(a, one).unwrap();
        assert_eq!(circuit.node(negated).op().opcode(), "NOT");
        // NOT(NOT a) collapses back onto a
        let back = circuit.not(negated).unwrap();
        assert_eq!(back, a);
    }

    #[test]
    fn test_and_identities() {
        let mut circuit = Circuit::<BitOp>::optimized(Bits);
        let a = circuit.add_input_named("a").unwrap();
        let zero = circuit.add_const(0).unwrap();
        let one = circuit.add_const(1).unwrap();
        assert_eq!(circuit.and(a, zero).unwrap(), zero);
        assert_eq!(circuit.and(a, one).unwrap(), a);
        assert_eq!(circuit.xor(a, zero).unwrap(), a);
    }

    #[test]
    fn test_add_mul_aliases() {
        let mut circuit = bit_circuit();
        let a = circuit.add_input_named("a").unwrap();
        let b = circuit.add_input_named("b").unwrap();
        let sum = circuit.add(a, b).unwrap();
        let product = circuit.mul(a, b).unwrap();
        assert_eq!(circuit.node(sum).op().opcode(), "XOR");
        assert_eq!(circuit.node(product).op().opcode(), "AND");
    }
}
