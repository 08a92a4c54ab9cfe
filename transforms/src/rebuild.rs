//! The circuit-to-circuit default transformer.

use circ_ir::{Circuit, NodeId, Operation};

use crate::{TransformError, Transformer};

/// Result of mapping one source node: a single target node or a group.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mapped {
    One(NodeId),
    Many(Vec<NodeId>),
}

impl Mapped {
    pub fn one(&self) -> Result<NodeId, TransformError> {
        match self {
            Self::One(id) => Ok(*id),
            Self::Many(_) => Err(TransformError::GroupAsSingle),
        }
    }

    pub fn index(&self, index: i64) -> Result<NodeId, TransformError> {
        match self {
            Self::One(_) => Err(TransformError::SingleAsGroup),
            Self::Many(ids) => {
                let slot = if index < 0 {
                    index + ids.len() as i64
                } else {
                    index
                };
                ids.get(usize::try_from(slot).map_err(|_| TransformError::SingleAsGroup)?)
                    .copied()
                    .ok_or(TransformError::SingleAsGroup)
            }
        }
    }
}

/// Reapplies every visited operation onto the mapped parents in a target
/// circuit, inheriting node info. The identity transformer: specialized
/// transformers fall back to this behavior for operations they do not
/// rewrite.
pub struct Rebuilder<Op: Operation> {
    target: Circuit<Op>,
}

impl<Op: Operation> Rebuilder<Op> {
    pub fn new(target: Circuit<Op>) -> Self {
        Self { target }
    }

    pub fn target(&mut self) -> &mut Circuit<Op> {
        &mut self.target
    }

    pub fn into_target(self) -> Circuit<Op> {
        self.target
    }
}

impl<Op: Operation> Transformer<Op> for Rebuilder<Op> {
    type Out = Mapped;

    fn visit(
        &mut self,
        source: &Circuit<Op>,
        node: NodeId,
        args: &[Mapped],
    ) -> Result<Mapped, TransformError> {
        let incoming: Vec<NodeId> = args
            .iter()
            .map(Mapped::one)
            .collect::<Result<_, _>>()?;
        let op = source.node(node).op().clone();
        let new_id = self.target.apply(op, &incoming)?;
        source
            .info()
            .inherit_to(node, self.target.info_mut(), new_id, true);
        Ok(Mapped::One(new_id))
    }

    fn visit_get(
        &mut self,
        source: &Circuit<Op>,
        node: NodeId,
        arg: &Mapped,
        index: i64,
    ) -> Result<Mapped, TransformError> {
        match arg {
            // the producing node kept its multi-output shape: copy the GET
            Mapped::One(_) => self.visit(source, node, std::slice::from_ref(arg)),
            Mapped::Many(_) => Ok(Mapped::One(arg.index(index)?)),
        }
    }

    fn make_output(
        &mut self,
        _source: &Circuit<Op>,
        _node: NodeId,
        out: &Mapped,
    ) -> Result<(), TransformError> {
        match out {
            Mapped::One(id) => self.target.add_output(*id)?,
            Mapped::Many(ids) => {
                for id in ids {
                    self.target.add_output(*id)?;
                }
            }
        }
        Ok(())
    }
}
