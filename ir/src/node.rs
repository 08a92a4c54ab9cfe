//! Vertices of a circuit graph.

use std::fmt;
use std::rc::Rc;

use crate::location::Location;
use crate::ops::Operation;

/// Identifier of a node, unique within its circuit.
///
/// Carries the owning circuit's uid so that handing a node of one circuit to
/// another is detected instead of silently aliasing an unrelated node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId {
    owner: u32,
    raw: u32,
}

impl NodeId {
    pub(crate) fn new(owner: u32, raw: u32) -> Self {
        Self { owner, raw }
    }

    /// The per-circuit numeric id.
    pub fn raw(&self) -> u32 {
        self.raw
    }

    pub(crate) fn owner(&self) -> u32 {
        self.owner
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.raw)
    }
}

/// Number of indexable outputs of a node.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputArity {
    /// Single opaque output; the node can not be indexed with GET.
    Unit,
    /// `n` outputs, each reachable through `GET(0..n)`.
    Count(usize),
}

/// A vertex of the circuit DAG: one operation instance applied to an ordered
/// list of parent nodes.
///
/// `incoming` is frozen at creation; `outgoing` holds one back-edge per
/// forward edge (duplicates preserved) and is rewritten by in-place rewrites.
#[derive(Debug)]
pub struct Node<Op: Operation> {
    id: NodeId,
    operation: Rc<Op>,
    incoming: Box<[NodeId]>,
    outgoing: Vec<NodeId>,
    n_outputs: OutputArity,
    location: Location,
}

impl<Op: Operation> Node<Op> {
    pub(crate) fn new(
        id: NodeId,
        operation: Rc<Op>,
        incoming: &[NodeId],
        n_outputs: OutputArity,
        location: Location,
    ) -> Self {
        Self {
            id,
            operation,
            incoming: incoming.into(),
            outgoing: Vec::new(),
            n_outputs,
            location,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn op(&self) -> &Op {
        &self.operation
    }

    pub fn operation(&self) -> &Rc<Op> {
        &self.operation
    }

    pub fn incoming(&self) -> &[NodeId] {
        &self.incoming
    }

    pub fn outgoing(&self) -> &[NodeId] {
        &self.outgoing
    }

    pub fn n_outputs(&self) -> OutputArity {
        self.n_outputs
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn is_input(&self) -> bool {
        self.operation.as_input().is_some()
    }

    pub fn is_const(&self) -> bool {
        self.operation.as_constant().is_some()
    }

    pub fn is_get(&self) -> bool {
        self.operation.as_get().is_some()
    }

    /// Whether the node can be taken apart with GET.
    pub fn is_iterable(&self) -> bool {
        self.n_outputs != OutputArity::Unit
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    pub(crate) fn set_incoming(&mut self, incoming: Box<[NodeId]>) {
        self.incoming = incoming;
    }

    pub(crate) fn incoming_mut(&mut self) -> &mut Box<[NodeId]> {
        &mut self.incoming
    }

    pub(crate) fn outgoing_mut(&mut self) -> &mut Vec<NodeId> {
        &mut self.outgoing
    }
}

impl<Op: Operation> fmt::Display for Node<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let incoming: Vec<String> = self.incoming.iter().map(|id| id.raw.to_string()).collect();
        write!(
            f,
            "{}:{} ({})",
            self.id.raw,
            self.operation.opcode(),
            incoming.join(",")
        )
    }
}
