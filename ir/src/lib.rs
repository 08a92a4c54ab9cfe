//! Computation circuits as typed DAGs of operation nodes.
//!
//! A [`Circuit`] owns an insertion-ordered list of nodes; the order is always
//! a valid topological order. Three built-in flavors cover arithmetic over a
//! base [`Ring`], bitwise fixed-width words and single-bit boolean logic;
//! further flavors are composed at compile time by implementing [`Operation`]
//! for another enum.
//!
//! ```
//! use circ_ir::{ArithmeticCircuit, IntRing};
//!
//! let mut circuit = ArithmeticCircuit::new(IntRing);
//! let a = circuit.add_input_named("a")?;
//! let b = circuit.add_input_named("b")?;
//! let sum = circuit.add(a, b)?;
//! let out = circuit.mul(sum, a)?;
//! circuit.add_output(out)?;
//! assert_eq!(circuit.evaluate(&[3, 4])?, vec![21]);
//! # Ok::<(), circ_ir::CircuitError>(())
//! ```

mod circuit;
mod consts;
mod error;
mod eval;
mod info;
mod location;
mod node;
mod ops;
mod param;
mod rebuild;
mod rewrite;
mod ring;
mod word;

pub use self::circuit::{Circuit, CircuitOptions, GraphView};
pub use self::consts::{Bits, ConstManager};
pub use self::error::CircuitError;
pub use self::info::{InfoValue, InheritPolicy, NodeInfoStore};
pub use self::location::Location;
pub use self::node::{Node, NodeId, OutputArity};
pub use self::ops::{Arity, ArithOp, BitOp, Evaluated, Operation, Simplified, WordOp};
pub use self::param::{BoolParam, InputName, IntParam, StrParam, TupleParam};
pub use self::ring::{IntRing, ModRing, Ring};
pub use self::word::WordRing;

/// Arithmetic circuit over the ring `R`.
pub type ArithmeticCircuit<R> = Circuit<ArithOp<R>>;

/// Bitwise circuit over fixed-width words.
pub type BitwiseCircuit = Circuit<WordOp>;

/// Boolean circuit over single bits.
pub type BooleanCircuit = Circuit<BitOp>;
