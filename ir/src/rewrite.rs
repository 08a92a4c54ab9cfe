//! In-place structural rewrites: garbage collection, deduplication,
//! renumbering and reordering.
//!
//! Every rewrite preserves the relative order of surviving nodes, keeps
//! forward and back edges in agreement and invalidates the node cache.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::hash::{DefaultHasher, Hash, Hasher};

use log::{debug, info};

use crate::circuit::Circuit;
use crate::error::CircuitError;
use crate::node::NodeId;
use crate::ops::Operation;

impl<Op: Operation> Circuit<Op> {
    /// Drops every node not reachable backwards from an output. Inputs are
    /// always kept.
    pub fn in_place_remove_unused_nodes(&mut self) {
        let mut used: BTreeSet<u32> = self.inputs.iter().map(NodeId::raw).collect();
        let mut queue: VecDeque<NodeId> = VecDeque::new();
        for id in &self.outputs {
            if used.insert(id.raw()) {
                queue.push_back(*id);
            }
        }
        while let Some(id) = queue.pop_front() {
            for parent in self.node(id).incoming() {
                if used.insert(parent.raw()) {
                    queue.push_back(*parent);
                }
            }
        }

        if used.len() == self.nodes.len() {
            debug!("no unused nodes detected");
            return;
        }

        let n_before = self.nodes.len();
        self.nodes.retain(|node| used.contains(&node.id().raw()));
        for node in &mut self.nodes {
            node.outgoing_mut()
                .retain(|successor| used.contains(&successor.raw()));
        }
        self.rebuild_slots();
        self.info.retain_nodes(&used);
        self.node_cache.clear();
        info!("removed {} unused nodes", n_before - self.nodes.len());
    }

    /// Merges nodes carrying the same operation applied to the same parents.
    /// Successors and the output list are redirected onto the surviving node.
    ///
    /// Keys are compared through a 128-bit hash; a hit whose operands differ
    /// fails with [`CircuitError::HashCollision`].
    pub fn in_place_remove_duplicate_nodes(&mut self) -> Result<(), CircuitError> {
        let mut seen: HashMap<u128, NodeId> = HashMap::new();
        let mut removed: BTreeSet<u32> = BTreeSet::new();

        for slot in 0..self.nodes.len() {
            let id = self.nodes[slot].id();
            let hash = {
                let node = &self.nodes[slot];
                hash128(&(node.op(), incoming_key(self, id)))
            };

            let Some(original) = seen.get(&hash).copied() else {
                seen.insert(hash, id);
                continue;
            };

            // full-key verification against the survivor
            if self.node(original).op() != self.node(id).op()
                || incoming_key(self, original) != incoming_key(self, id)
            {
                return Err(CircuitError::HashCollision);
            }

            let incoming = self.node(id).incoming().to_vec();
            let outgoing = self.node(id).outgoing().to_vec();

            // drop the duplicate's edges from its parents
            let parents: BTreeSet<u32> = incoming.iter().map(NodeId::raw).collect();
            for parent in &parents {
                let parent = NodeId::new(self.uid(), *parent);
                self.node_mut(parent)
                    .outgoing_mut()
                    .retain(|successor| *successor != id);
            }

            // redirect successors onto the survivor
            let successors: BTreeSet<u32> = outgoing.iter().map(NodeId::raw).collect();
            for successor in &successors {
                let successor = NodeId::new(self.uid(), *successor);
                let mut edges = 0;
                for parent in self.node_mut(successor).incoming_mut().iter_mut() {
                    if *parent == id {
                        *parent = original;
                        edges += 1;
                    }
                }
                for _ in 0..edges {
                    self.node_mut(original).outgoing_mut().push(successor);
                }
            }

            // the duplicate may be registered as an output
            if let Some(positions) = self.output_pos.remove(&id.raw()) {
                for position in &positions {
                    self.outputs[*position] = original;
                }
                self.output_pos
                    .entry(original.raw())
                    .or_default()
                    .extend(positions);
            }

            removed.insert(id.raw());
        }

        if !removed.is_empty() {
            self.nodes.retain(|node| !removed.contains(&node.id().raw()));
            let kept: BTreeSet<u32> = self.nodes.iter().map(|node| node.id().raw()).collect();
            self.rebuild_slots();
            self.info.retain_nodes(&kept);
            self.node_cache.clear();
        }
        info!("removed {} duplicate nodes", removed.len());
        Ok(())
    }

    /// Assigns sequential ids `0..n` in current list order, remapping edges,
    /// registrations and node info.
    pub fn in_place_renumerate(&mut self) {
        let map: BTreeMap<u32, u32> = self
            .nodes
            .iter()
            .enumerate()
            .map(|(slot, node)| (node.id().raw(), slot as u32))
            .collect();
        let uid = self.uid();
        let renamed = |id: NodeId| NodeId::new(uid, map[&id.raw()]);

        for node in &mut self.nodes {
            node.set_id(renamed(node.id()));
            let incoming: Box<[NodeId]> = node.incoming().iter().map(|id| renamed(*id)).collect();
            node.set_incoming(incoming);
            for successor in node.outgoing_mut() {
                *successor = renamed(*successor);
            }
        }

        for id in &mut self.inputs {
            *id = renamed(*id);
        }
        self.input_pos = self
            .inputs
            .iter()
            .enumerate()
            .map(|(position, id)| (id.raw(), position))
            .collect();
        for id in &mut self.outputs {
            *id = renamed(*id);
        }
        let mut output_pos: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (position, id) in self.outputs.iter().enumerate() {
            output_pos.entry(id.raw()).or_default().push(position);
        }
        self.output_pos = output_pos;

        self.node_counter = self.nodes.len() as u32;
        self.rebuild_slots();
        self.info.remap(&map);
        self.node_cache.clear();
    }

    /// Replaces the input list with a permutation of itself.
    pub fn in_place_reorder_inputs(&mut self, order: &[NodeId]) -> Result<(), CircuitError> {
        let current: BTreeSet<u32> = self.inputs.iter().map(NodeId::raw).collect();
        let proposed: BTreeSet<u32> = order.iter().map(NodeId::raw).collect();
        if order.len() != self.inputs.len() || current != proposed {
            return Err(CircuitError::Parameter(
                "the list of inputs does not match".into(),
            ));
        }
        self.inputs = order.to_vec();
        self.input_pos = self
            .inputs
            .iter()
            .enumerate()
            .map(|(position, id)| (id.raw(), position))
            .collect();
        Ok(())
    }

    /// Replaces the output list with a permutation of itself (multiplicity
    /// included).
    pub fn in_place_reorder_outputs(&mut self, order: &[NodeId]) -> Result<(), CircuitError> {
        let mut current: Vec<u32> = self.outputs.iter().map(NodeId::raw).collect();
        let mut proposed: Vec<u32> = order.iter().map(NodeId::raw).collect();
        current.sort_unstable();
        proposed.sort_unstable();
        if current != proposed {
            return Err(CircuitError::Parameter(
                "the list of outputs does not match".into(),
            ));
        }
        self.outputs = order.to_vec();
        let mut output_pos: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
        for (position, id) in self.outputs.iter().enumerate() {
            output_pos.entry(id.raw()).or_default().push(position);
        }
        self.output_pos = output_pos;
        Ok(())
    }

    /// Stable-moves all input nodes to the front of the node list. Inputs
    /// have no parents, so the result is still a topological order.
    pub fn in_place_reorder_inputs_first(&mut self) {
        let mut order: Vec<_> = Vec::with_capacity(self.nodes.len());
        let mut rest: Vec<_> = Vec::new();
        for node in self.nodes.drain(..) {
            if node.is_input() {
                order.push(node);
            } else {
                rest.push(node);
            }
        }
        order.extend(rest);
        self.nodes = order;
        self.rebuild_slots();
    }
}

/// Parent ids of a node, sorted when the operation is symmetric.
fn incoming_key<Op: Operation>(circuit: &Circuit<Op>, id: NodeId) -> Vec<u32> {
    let node = circuit.node(id);
    let mut ids: Vec<u32> = node.incoming().iter().map(NodeId::raw).collect();
    if node.op().symmetric() {
        ids.sort_unstable();
    }
    ids
}

/// Two independent 64-bit hashes packed into one 128-bit key.
fn hash128<T: Hash>(value: &T) -> u128 {
    let mut low = DefaultHasher::new();
    (0u8, value).hash(&mut low);
    let mut high = DefaultHasher::new();
    (1u8, value).hash(&mut high);
    ((high.finish() as u128) << 64) | low.finish() as u128
}

#[cfg(test)]
mod tests {
    use crate::circuit::Circuit;
    use crate::ops::ArithOp;
    use crate::ring::IntRing;
    use pretty_assertions::assert_eq;

    type IntCircuit = Circuit<ArithOp<IntRing>>;

    fn chain() -> (IntCircuit, Vec<crate::node::NodeId>) {
        let mut circuit = IntCircuit::new(IntRing);
        let a = circuit.add_input_named("a").unwrap();
        let b = circuit.add_input_named("b").unwrap();
        let sum = circuit.add(a, b).unwrap();
        let out = circuit.mul(sum, a).unwrap();
        circuit.add_output(out).unwrap();
        (circuit, vec![a, b, sum, out])
    }

    #[test]
    fn test_remove_unused_keeps_inputs() {
        let (mut circuit, ids) = chain();
        // dead branch
        let dead = circuit.neg(ids[2]).unwrap();
        let deader = circuit.add(dead, ids[0]).unwrap();
        assert!(circuit.contains(deader));
        assert_eq!(circuit.len(), 6);

        circuit.in_place_remove_unused_nodes();
        assert_eq!(circuit.len(), 4);
        assert!(!circuit.contains(dead));
        assert!(circuit.contains(ids[0]));
        assert_eq!(circuit.evaluate(&[3, 4]).unwrap(), vec![21]);

        // back edges exclude dropped successors
        for node in circuit.nodes() {
            for successor in node.outgoing() {
                assert!(circuit.contains(*successor));
            }
        }
    }

    #[test]
    fn test_remove_duplicates_preserves_evaluation() {
        let mut circuit = IntCircuit::new(IntRing);
        let a = circuit.add_input_named("a").unwrap();
        let b = circuit.add_input_named("b").unwrap();
        let sum1 = circuit.add(a, b).unwrap();
        // same addition with swapped operands: merged since ADD is symmetric
        let sum2 = circuit.add(b, a).unwrap();
        let out = circuit.mul(sum1, sum2).unwrap();
        circuit.add_output(out).unwrap();
        assert_ne!(sum1, sum2);

        let before = circuit.evaluate(&[3, 4]).unwrap();
        circuit.in_place_remove_duplicate_nodes().unwrap();
        assert_eq!(circuit.len(), 4);
        assert!(!circuit.contains(sum2));
        assert_eq!(circuit.evaluate(&[3, 4]).unwrap(), before);

        // the survivor carries both multiplication edges
        assert_eq!(circuit.node(sum1).outgoing().len(), 2);
    }

    #[test]
    fn test_remove_duplicate_outputs_remapped() {
        let mut circuit = IntCircuit::new(IntRing);
        let a = circuit.add_input_named("a").unwrap();
        let one1 = circuit.add_const(1).unwrap();
        let one2 = circuit.add_const(1).unwrap();
        let s1 = circuit.add(a, one1).unwrap();
        let s2 = circuit.add(a, one2).unwrap();
        circuit.add_output(s1).unwrap();
        circuit.add_output(s2).unwrap();

        circuit.in_place_remove_duplicate_nodes().unwrap();
        assert_eq!(circuit.outputs(), &[s1, s1]);
        assert_eq!(circuit.evaluate(&[5]).unwrap(), vec![6, 6]);
    }

    #[test]
    fn test_renumerate_assigns_sequential_ids() {
        let (mut circuit, ids) = chain();
        let dead = circuit.neg(ids[2]).unwrap();
        circuit.in_place_remove_unused_nodes();
        assert!(!circuit.contains(dead));

        circuit.in_place_renumerate();
        let raws: Vec<u32> = circuit.nodes().map(|node| node.id().raw()).collect();
        assert_eq!(raws, vec![0, 1, 2, 3]);
        assert_eq!(circuit.evaluate(&[3, 4]).unwrap(), vec![21]);
    }

    #[test]
    fn test_reorder_inputs() {
        let (mut circuit, ids) = chain();
        circuit.in_place_reorder_inputs(&[ids[1], ids[0]]).unwrap();
        // now the first input is b
        assert_eq!(circuit.evaluate(&[4, 3]).unwrap(), vec![21]);
        assert!(circuit.in_place_reorder_inputs(&[ids[0]]).is_err());
        assert!(circuit.in_place_reorder_inputs(&[ids[0], ids[2]]).is_err());
    }

    #[test]
    fn test_reorder_outputs() {
        let mut circuit = IntCircuit::new(IntRing);
        let a = circuit.add_input_named("a").unwrap();
        let b = circuit.add_input_named("b").unwrap();
        let sum = circuit.add(a, b).unwrap();
        let product = circuit.mul(a, b).unwrap();
        circuit.add_output(sum).unwrap();
        circuit.add_output(product).unwrap();

        circuit.in_place_reorder_outputs(&[product, sum]).unwrap();
        assert_eq!(circuit.evaluate(&[3, 4]).unwrap(), vec![12, 7]);
        assert!(circuit.in_place_reorder_outputs(&[sum, sum]).is_err());
    }

    #[test]
    fn test_reorder_inputs_first() {
        let mut circuit = IntCircuit::new(IntRing);
        let one = circuit.add_const(1).unwrap();
        let a = circuit.add_input_named("a").unwrap();
        let sum = circuit.add(a, one).unwrap();
        circuit.add_output(sum).unwrap();

        circuit.in_place_reorder_inputs_first();
        assert_eq!(circuit.nodes().next().unwrap().id(), a);
        assert_eq!(circuit.evaluate(&[2]).unwrap(), vec![3]);
    }
}
