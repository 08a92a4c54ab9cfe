//! Operation schemas of the built-in circuit flavors.
//!
//! Each flavor is a closed enum implementing [`Operation`]; new flavors are
//! composed at compile time by writing another enum carrying the three base
//! operations (INPUT, CONST, GET) plus whatever the flavor computes.

mod arith;
mod bit;
mod word;

pub use self::arith::ArithOp;
pub use self::bit::BitOp;
pub use self::word::WordOp;

use std::fmt::Debug;
use std::hash::Hash;

use rand::RngCore;

use crate::circuit::GraphView;
use crate::consts::ConstManager;
use crate::error::CircuitError;
use crate::node::{NodeId, OutputArity};
use crate::param::InputName;

/// Number of incoming nodes an operation accepts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Exact(usize),
    Variable,
}

/// Result of evaluating one node: a scalar, or the per-index values of a
/// multi-output node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Evaluated<V> {
    One(V),
    Many(Vec<V>),
}

impl<V> Evaluated<V> {
    pub fn scalar(&self) -> Option<&V> {
        match self {
            Self::One(value) => Some(value),
            Self::Many(_) => None,
        }
    }

    /// Resolves a GET index, negative indices counting from the end.
    pub fn index(&self, index: i64) -> Result<&V, CircuitError> {
        match self {
            Self::One(_) => Err(CircuitError::NotIndexable),
            Self::Many(values) => {
                let slot = resolve_index(index, values.len())?;
                Ok(&values[slot])
            }
        }
    }
}

/// Maps an index in `[-n, n)` onto `[0, n)`.
pub(crate) fn resolve_index(index: i64, n: usize) -> Result<usize, CircuitError> {
    let slot = if index < 0 { index + n as i64 } else { index };
    if slot < 0 || slot >= n as i64 {
        return Err(CircuitError::GetIndex {
            index,
            n_outputs: n,
        });
    }
    Ok(slot as usize)
}

/// Bounds-check shared by every flavor's GET validation.
pub(crate) fn check_get(index: i64, incoming: &[OutputArity]) -> Result<(), CircuitError> {
    match incoming[0] {
        OutputArity::Unit => Err(CircuitError::NotIndexable),
        OutputArity::Count(n) => resolve_index(index, n).map(|_| ()),
    }
}

/// Outcome of a peephole simplification.
pub enum Simplified<Op: Operation> {
    /// Reuse an existing node instead of creating one.
    Node(NodeId),
    /// Build a different operation instead.
    Rewrite(Op, Vec<NodeId>),
}

/// One opcode of a circuit flavor, together with its parameter values.
///
/// Instances are immutable; equality is variant plus parameters and, with
/// `Hash`, drives both the operation cache and the node cache.
pub trait Operation: Clone + Eq + Hash + Debug + Sized {
    type Value: Clone + Eq + Hash + Debug;
    type Domain: ConstManager<Value = Self::Value>;

    /// Name of the opcode; transformers dispatch on it.
    fn opcode(&self) -> &'static str;

    fn arity(&self) -> Arity;

    /// Output arity of a node using this operation, given its number of
    /// incoming nodes. Defaults to a single opaque output.
    fn output_arity(&self, n_incoming: usize) -> OutputArity {
        let _ = n_incoming;
        OutputArity::Unit
    }

    /// Whether the operation is commutative on its inputs. Used to
    /// canonicalize cache keys.
    fn symmetric(&self) -> bool {
        false
    }

    /// Whether the operation may be evaluated at construction time when all
    /// inputs are constants. INPUT and RND are not.
    fn precomputable(&self) -> bool {
        true
    }

    /// Validation hook run right before a node is created; receives the
    /// output arities of the incoming nodes.
    fn validate(&self, incoming: &[OutputArity]) -> Result<(), CircuitError> {
        let _ = incoming;
        Ok(())
    }

    /// Evaluates the operation on concrete values. INPUT and GET are resolved
    /// by the evaluator and never reach this method.
    fn eval(
        &self,
        domain: &Self::Domain,
        rng: &mut dyn RngCore,
        args: &[Self::Value],
    ) -> Result<Evaluated<Self::Value>, CircuitError>;

    /// Peephole rewrite applied at construction time in optimized circuits.
    fn simplify(
        &self,
        incoming: &[NodeId],
        graph: GraphView<'_, Self>,
        domain: &Self::Domain,
    ) -> Option<Simplified<Self>> {
        let _ = (incoming, graph, domain);
        None
    }

    // Base operations every flavor carries.

    fn input(name: InputName) -> Self;
    fn constant(value: Self::Value) -> Self;
    fn get(index: i64) -> Self;

    fn as_input(&self) -> Option<&InputName>;
    fn as_constant(&self) -> Option<&Self::Value>;
    fn as_get(&self) -> Option<i64>;
}
