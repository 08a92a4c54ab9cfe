//! Bytecode emission for boolean circuits.
//!
//! [`RawSerializer`] linearizes a [`circ_ir::BooleanCircuit`] into a
//! [`Program`] — a compact instruction stream plus a header describing the
//! input and output RAM cells — reusing cells as soon as their last consumer
//! has been emitted. The program encodes to a bit-exact byte blob and can be
//! re-executed directly.

mod program;
mod serializer;

pub use self::program::{Instruction, Layout, OpCode, Program, ProgramError};
pub use self::serializer::{serialize, serialize_with_layout, RawSerializer};
