//! Visitor-style transformers over circuit graphs.
//!
//! A [`Transformer`] walks a source circuit in topological order, producing
//! one result per node; what the result is — a target node, a group of
//! shares, an emitted instruction — is up to the transformer. [`run`] drives
//! the walk; [`Rebuilder`] is the circuit-to-circuit default that reapplies
//! every operation into a target circuit.

mod isw;
mod rebuild;

pub use self::isw::{mask, Isw, MaskableOp};
pub use self::rebuild::{Mapped, Rebuilder};

use std::collections::BTreeMap;

use circ_ir::{Circuit, CircuitError, NodeId, Operation};

#[derive(Debug, thiserror::Error)]
pub enum TransformError {
    #[error("no rule for operation {0}")]
    Unsupported(&'static str),
    #[error("a group result can not be used as a single node")]
    GroupAsSingle,
    #[error("a single result can not be indexed")]
    SingleAsGroup,
    #[error(transparent)]
    Circuit(#[from] CircuitError),
}

/// A visitor over a source circuit. Dispatch on the operation happens inside
/// [`Transformer::visit`], usually on [`Operation::opcode`]; GET nodes are
/// routed to [`Transformer::visit_get`] so multi-results can be indexed.
pub trait Transformer<Op: Operation> {
    type Out: Clone;

    fn visit(
        &mut self,
        source: &Circuit<Op>,
        node: NodeId,
        args: &[Self::Out],
    ) -> Result<Self::Out, TransformError>;

    fn visit_get(
        &mut self,
        source: &Circuit<Op>,
        node: NodeId,
        arg: &Self::Out,
        index: i64,
    ) -> Result<Self::Out, TransformError> {
        let _ = (source, node, arg, index);
        Err(TransformError::Unsupported("GET"))
    }

    /// Called once per output position of the source circuit, multiplicity
    /// preserved.
    fn make_output(
        &mut self,
        source: &Circuit<Op>,
        node: NodeId,
        out: &Self::Out,
    ) -> Result<(), TransformError> {
        let _ = (source, node, out);
        Ok(())
    }
}

/// Walks the source circuit in topological order, feeding each node's result
/// to its successors, then reports the outputs. Returns the full result map,
/// keyed by source raw id.
pub fn run<Op: Operation, T: Transformer<Op>>(
    transformer: &mut T,
    source: &Circuit<Op>,
) -> Result<BTreeMap<u32, T::Out>, TransformError> {
    let mut results: BTreeMap<u32, T::Out> = BTreeMap::new();
    for node in source.nodes() {
        let id = node.id();
        let out = if let Some(index) = node.op().as_get() {
            let arg = &results[&node.incoming()[0].raw()];
            transformer.visit_get(source, id, arg, index)?
        } else {
            let args: Vec<T::Out> = node
                .incoming()
                .iter()
                .map(|parent| results[&parent.raw()].clone())
                .collect();
            transformer.visit(source, id, &args)?
        };
        results.insert(id.raw(), out);
    }

    for output in source.outputs() {
        let out = results[&output.raw()].clone();
        transformer.make_output(source, *output, &out)?;
    }
    Ok(results)
}
