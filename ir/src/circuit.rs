//! The circuit: an insertion-ordered DAG of operation nodes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::rc::Rc;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::consts::ConstManager;
use crate::error::CircuitError;
use crate::info::NodeInfoStore;
use crate::location::Location;
use crate::node::{Node, NodeId, OutputArity};
use crate::ops::{Arity, Evaluated, Operation, Simplified};
use crate::param::InputName;

static CIRCUIT_COUNTER: AtomicU32 = AtomicU32::new(0);

/// Construction-time switches. All off by default; [`Circuit::optimized`]
/// turns all of them on.
#[derive(Clone, Copy, Debug, Default)]
pub struct CircuitOptions {
    /// Share equal operation instances between nodes.
    pub cache_operations: bool,
    /// Return an existing node when the same operation is applied to the
    /// same incoming nodes again.
    pub cache_nodes: bool,
    /// Evaluate precomputable operations whose inputs are all constants.
    pub fold_constants: bool,
    /// Apply peephole identity/annihilator rewrites at construction time.
    pub simplify: bool,
}

impl CircuitOptions {
    pub fn optimized() -> Self {
        Self {
            cache_operations: true,
            cache_nodes: true,
            fold_constants: true,
            simplify: true,
        }
    }
}

/// A read-only view of the graph handed to [`Operation::simplify`].
pub struct GraphView<'a, Op: Operation> {
    nodes: &'a [Node<Op>],
    slot: &'a BTreeMap<u32, usize>,
}

impl<'a, Op: Operation> GraphView<'a, Op> {
    pub fn op(&self, id: NodeId) -> &'a Op {
        let slot = self.slot[&id.raw()];
        self.nodes[slot].op()
    }

    pub fn incoming(&self, id: NodeId) -> &'a [NodeId] {
        let slot = self.slot[&id.raw()];
        self.nodes[slot].incoming()
    }

    /// The constant value a node carries, if it is a CONST node.
    pub fn constant(&self, id: NodeId) -> Option<&'a Op::Value> {
        self.op(id).as_constant()
    }
}

/// A named, insertion-ordered collection of nodes with registered inputs and
/// outputs.
///
/// The node list is always a valid topological order: every node is created
/// from already-registered nodes of the same circuit, and in-place rewrites
/// preserve the relative order of surviving nodes.
#[derive(Debug)]
pub struct Circuit<Op: Operation> {
    name: String,
    uid: u32,
    domain: Op::Domain,
    options: CircuitOptions,

    pub(crate) nodes: Vec<Node<Op>>,
    pub(crate) slot: BTreeMap<u32, usize>,
    pub(crate) node_counter: u32,

    pub(crate) inputs: Vec<NodeId>,
    pub(crate) input_names: BTreeSet<InputName>,
    pub(crate) input_pos: BTreeMap<u32, usize>,
    unnamed_counter: u64,

    pub(crate) outputs: Vec<NodeId>,
    pub(crate) output_pos: BTreeMap<u32, Vec<usize>>,

    location: Location,
    pub(crate) info: NodeInfoStore,

    op_cache: HashMap<Op, Rc<Op>>,
    pub(crate) node_cache: HashMap<(Box<[u32]>, Op), NodeId>,
}

impl<Op: Operation> Circuit<Op> {
    pub fn new(domain: Op::Domain) -> Self {
        Self::with_options(domain, CircuitOptions::default())
    }

    /// A circuit with caching, folding and simplification enabled.
    pub fn optimized(domain: Op::Domain) -> Self {
        Self::with_options(domain, CircuitOptions::optimized())
    }

    pub fn with_options(domain: Op::Domain, options: CircuitOptions) -> Self {
        let uid = CIRCUIT_COUNTER.fetch_add(1, Ordering::Relaxed);
        Self {
            name: format!("unnamed{uid}"),
            uid,
            domain,
            options,
            nodes: Vec::new(),
            slot: BTreeMap::new(),
            node_counter: 0,
            inputs: Vec::new(),
            input_names: BTreeSet::new(),
            input_pos: BTreeMap::new(),
            unnamed_counter: 0,
            outputs: Vec::new(),
            output_pos: BTreeMap::new(),
            location: Location::root(),
            info: NodeInfoStore::default(),
            op_cache: HashMap::new(),
            node_cache: HashMap::new(),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// An empty circuit with the same domain and options.
    pub fn clone_empty(&self) -> Self {
        Self::with_options(self.domain.clone(), self.options)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn domain(&self) -> &Op::Domain {
        &self.domain
    }

    pub fn options(&self) -> CircuitOptions {
        self.options
    }

    // node access
    // -----------------------------------

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in topological (insertion) order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node<Op>> {
        self.nodes.iter()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.owner() == self.uid && self.slot.contains_key(&id.raw())
    }

    /// The node with the given id.
    ///
    /// # Panics
    /// Panics when the id belongs to a different circuit or was removed.
    pub fn node(&self, id: NodeId) -> &Node<Op> {
        self.try_node(id).expect("node id of this circuit")
    }

    pub fn try_node(&self, id: NodeId) -> Option<&Node<Op>> {
        if id.owner() != self.uid {
            return None;
        }
        let slot = self.slot.get(&id.raw())?;
        Some(&self.nodes[*slot])
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut Node<Op> {
        let slot = *self.slot.get(&id.raw()).expect("node id of this circuit");
        &mut self.nodes[slot]
    }

    pub(crate) fn check_own(&self, id: NodeId) -> Result<(), CircuitError> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(CircuitError::ForeignNode)
        }
    }

    pub(crate) fn uid(&self) -> u32 {
        self.uid
    }

    pub(crate) fn view(&self) -> GraphView<'_, Op> {
        GraphView {
            nodes: &self.nodes,
            slot: &self.slot,
        }
    }

    // inputs and outputs
    // -----------------------------------

    pub fn n_inputs(&self) -> usize {
        self.inputs.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.outputs.len()
    }

    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    /// Output nodes, with multiplicity.
    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn input_position(&self, id: NodeId) -> Option<usize> {
        self.input_pos.get(&id.raw()).copied()
    }

    pub fn output_positions(&self, id: NodeId) -> &[usize] {
        self.output_pos
            .get(&id.raw())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn is_output(&self, id: NodeId) -> bool {
        self.output_pos.contains_key(&id.raw())
    }

    /// Creates an input node with a generated name `x0, x1, …`, skipping
    /// names already taken.
    pub fn add_input(&mut self) -> Result<NodeId, CircuitError> {
        let name = self.next_unnamed();
        self.add_input_named(name)
    }

    /// Creates an input node with the given name; names are unique within a
    /// circuit.
    pub fn add_input_named(
        &mut self,
        name: impl Into<InputName>,
    ) -> Result<NodeId, CircuitError> {
        self.apply(Op::input(name.into()), &[])
    }

    /// Creates `n` inputs named `{stem}_0 .. {stem}_{n-1}` where the stem is
    /// the next free generated name.
    pub fn add_inputs(&mut self, n: usize) -> Result<Vec<NodeId>, CircuitError> {
        let stem = self.next_unnamed();
        self.add_inputs_with(n, |i| InputName::Text(format!("{stem}_{i}")))
    }

    pub fn add_inputs_with(
        &mut self,
        n: usize,
        name: impl Fn(usize) -> InputName,
    ) -> Result<Vec<NodeId>, CircuitError> {
        (0..n).map(|i| self.add_input_named(name(i))).collect()
    }

    fn next_unnamed(&mut self) -> InputName {
        loop {
            let name = InputName::Text(format!("x{}", self.unnamed_counter));
            self.unnamed_counter += 1;
            if !self.input_names.contains(&name) {
                return name;
            }
        }
    }

    /// Wraps an external value into a CONST node.
    pub fn add_const(&mut self, value: i128) -> Result<NodeId, CircuitError> {
        let value = self.domain.create(value)?;
        self.add_const_value(value)
    }

    pub fn add_const_value(&mut self, value: Op::Value) -> Result<NodeId, CircuitError> {
        self.apply(Op::constant(value), &[])
    }

    /// Registers a node as an output. Multi-output nodes are expanded into
    /// their per-index GET children; a node may be registered several times.
    pub fn add_output(&mut self, id: NodeId) -> Result<(), CircuitError> {
        self.check_own(id)?;
        match self.node(id).n_outputs() {
            OutputArity::Unit => {
                self.register_output(id);
                Ok(())
            }
            OutputArity::Count(n) => {
                for i in 0..n {
                    let part = self.get(id, i as i64)?;
                    self.register_output(part);
                }
                Ok(())
            }
        }
    }

    pub fn add_outputs(
        &mut self,
        ids: impl IntoIterator<Item = NodeId>,
    ) -> Result<(), CircuitError> {
        for id in ids {
            self.add_output(id)?;
        }
        Ok(())
    }

    /// Wraps a bare value and registers it as an output.
    pub fn add_const_output(&mut self, value: i128) -> Result<(), CircuitError> {
        let id = self.add_const(value)?;
        self.add_output(id)
    }

    pub(crate) fn register_output(&mut self, id: NodeId) {
        self.output_pos
            .entry(id.raw())
            .or_default()
            .push(self.outputs.len());
        self.outputs.push(id);
    }

    // node construction
    // -----------------------------------

    /// Selects one output of a multi-output node.
    pub fn get(&mut self, id: NodeId, index: i64) -> Result<NodeId, CircuitError> {
        self.apply(Op::get(index), &[id])
    }

    /// All GET children of a multi-output node, in index order. Fails with
    /// [`CircuitError::NotIterable`] on a single-output node.
    pub fn unpack(&mut self, id: NodeId) -> Result<Vec<NodeId>, CircuitError> {
        self.check_own(id)?;
        match self.node(id).n_outputs() {
            OutputArity::Unit => Err(CircuitError::NotIterable),
            OutputArity::Count(n) => (0..n).map(|i| self.get(id, i as i64)).collect(),
        }
    }

    /// Applies an operation to incoming nodes of this circuit, creating a
    /// node — or returning an existing one when simplification, folding or
    /// the node cache permits.
    pub fn apply(&mut self, op: Op, incoming: &[NodeId]) -> Result<NodeId, CircuitError> {
        for id in incoming {
            self.check_own(*id)?;
        }

        if let Arity::Exact(expected) = op.arity() {
            if incoming.len() != expected {
                return Err(CircuitError::Arity {
                    opcode: op.opcode(),
                    expected,
                    given: incoming.len(),
                });
            }
        }

        if self.options.simplify {
            match op.simplify(incoming, self.view(), &self.domain) {
                Some(Simplified::Node(id)) => return Ok(id),
                Some(Simplified::Rewrite(new_op, new_incoming)) => {
                    return self.apply(new_op, &new_incoming);
                }
                None => {}
            }
        }

        if self.options.fold_constants && op.precomputable() && !incoming.is_empty() {
            let args: Option<Vec<Op::Value>> = incoming
                .iter()
                .map(|id| self.node(*id).op().as_constant().cloned())
                .collect();
            if let Some(args) = args {
                let mut rng = rand::rng();
                // multi-valued results have no single CONST form and are
                // created as regular nodes
                if let Evaluated::One(value) = op.eval(&self.domain, &mut rng, &args)? {
                    return self.add_const_value(value);
                }
            }
        }

        let cache_key = if self.options.cache_nodes {
            let mut ids: Vec<u32> = incoming.iter().map(NodeId::raw).collect();
            if op.symmetric() {
                ids.sort_unstable();
            }
            let key = (ids.into_boxed_slice(), op.clone());
            if let Some(id) = self.node_cache.get(&key) {
                return Ok(*id);
            }
            Some(key)
        } else {
            None
        };

        let arities: Vec<OutputArity> = incoming
            .iter()
            .map(|id| self.node(*id).n_outputs())
            .collect();
        op.validate(&arities)?;

        let id = self.create_node(op, incoming)?;
        if let Some(key) = cache_key {
            self.node_cache.insert(key, id);
        }
        Ok(id)
    }

    fn create_node(&mut self, op: Op, incoming: &[NodeId]) -> Result<NodeId, CircuitError> {
        // check the name before allocating an id
        if let Some(name) = op.as_input() {
            if self.input_names.contains(name) {
                return Err(CircuitError::DuplicateInput(name.clone()));
            }
        }

        let op = self.intern(op);
        let input_name = op.as_input().cloned();
        let raw = self.node_counter;
        self.node_counter += 1;
        let id = NodeId::new(self.uid, raw);

        let n_outputs = op.output_arity(incoming.len());
        let node = Node::new(id, op, incoming, n_outputs, self.location.clone());
        for parent in incoming {
            self.node_mut(*parent).outgoing_mut().push(id);
        }
        self.slot.insert(raw, self.nodes.len());
        self.nodes.push(node);

        if let Some(name) = input_name {
            self.input_names.insert(name);
            self.input_pos.insert(raw, self.inputs.len());
            self.inputs.push(id);
        }
        Ok(id)
    }

    fn intern(&mut self, op: Op) -> Rc<Op> {
        if !self.options.cache_operations {
            return Rc::new(op);
        }
        if let Some(shared) = self.op_cache.get(&op) {
            return shared.clone();
        }
        let shared = Rc::new(op.clone());
        self.op_cache.insert(op, shared.clone());
        shared
    }

    // info and location
    // -----------------------------------

    pub fn info(&self) -> &NodeInfoStore {
        &self.info
    }

    pub fn info_mut(&mut self) -> &mut NodeInfoStore {
        &mut self.info
    }

    pub fn push_location(&mut self, token: &str) {
        self.location = self.location.child(token);
    }

    pub fn pop_location(&mut self) {
        self.location = self.location.parent();
    }

    /// Runs `f` with `token` pushed onto the location stack; nodes created
    /// inside carry the extended location.
    pub fn with_location<T>(&mut self, token: &str, f: impl FnOnce(&mut Self) -> T) -> T {
        self.push_location(token);
        let result = f(self);
        self.pop_location();
        result
    }

    pub(crate) fn rebuild_slots(&mut self) {
        self.slot = self
            .nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.id().raw(), slot))
            .collect();
    }
}

impl<Op: Operation> fmt::Display for Circuit<Op> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "<{} in:{} out:{} nodes:{}>",
            self.name,
            self.inputs.len(),
            self.outputs.len(),
            self.nodes.len()
        )
    }
}
