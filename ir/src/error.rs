use crate::param::InputName;

/// Errors reported while building, rewriting or evaluating a circuit.
#[derive(Debug, thiserror::Error)]
pub enum CircuitError {
    #[error("invalid parameter: {0}")]
    Parameter(String),
    #[error("{opcode} requires exactly {expected} inputs, given {given}")]
    Arity {
        opcode: &'static str,
        expected: usize,
        given: usize,
    },
    #[error("incoming node does not belong to this circuit")]
    ForeignNode,
    #[error("repeated input name {0}")]
    DuplicateInput(InputName),
    #[error("invalid constant: {0}")]
    InvalidConstant(String),
    #[error("number of inputs mismatch: circuit has {expected}, given {given}")]
    InputArity { expected: usize, given: usize },
    #[error("can not GET index {index} out of {n_outputs} outputs")]
    GetIndex { index: i64, n_outputs: usize },
    #[error("can not index a single-output node")]
    NotIndexable,
    #[error("hash collision while removing duplicates, extend the hash width")]
    HashCollision,
    #[error("can not iterate a single-output node")]
    NotIterable,
    #[error("evaluation failed: {0}")]
    Eval(String),
}
