//! Rebuilding circuits into other circuits: isomorphic copies, sequential
//! composition and concatenation.

use std::collections::BTreeMap;

use crate::circuit::Circuit;
use crate::error::CircuitError;
use crate::node::NodeId;
use crate::ops::Operation;

impl<Op: Operation> Circuit<Op> {
    /// Rebuilds this circuit inside `target`, returning the map from source
    /// raw ids to target nodes.
    ///
    /// Nodes listed in `replace` are not copied; their mapped counterpart is
    /// used instead (the usual case: replacing the source inputs by existing
    /// target nodes). Node info is inherited per key policy. When
    /// `register_outputs` is set, the images of the source outputs are
    /// registered as outputs of `target`, multiplicity preserved.
    pub fn reapply_into(
        &self,
        target: &mut Circuit<Op>,
        replace: &BTreeMap<NodeId, NodeId>,
        register_outputs: bool,
    ) -> Result<BTreeMap<u32, NodeId>, CircuitError> {
        for dst in replace.values() {
            target.check_own(*dst)?;
        }

        let mut map: BTreeMap<u32, NodeId> = BTreeMap::new();
        for node in self.nodes() {
            let id = node.id();
            let new_id = if let Some(dst) = replace.get(&id) {
                self.info().inherit_to(id, target.info_mut(), *dst, true);
                *dst
            } else {
                let incoming: Vec<NodeId> = node
                    .incoming()
                    .iter()
                    .map(|parent| map[&parent.raw()])
                    .collect();
                let new_id = target.apply(node.op().clone(), &incoming)?;
                self.info().inherit_to(id, target.info_mut(), new_id, true);
                new_id
            };
            map.insert(id.raw(), new_id);
        }

        if register_outputs {
            for output in self.outputs() {
                target.add_output(map[&output.raw()])?;
            }
        }
        Ok(map)
    }

    /// [`Circuit::reapply_into`] with the source inputs replaced positionally
    /// by the given target nodes.
    pub fn reapply_inputs(
        &self,
        target: &mut Circuit<Op>,
        inputs: &[NodeId],
        register_outputs: bool,
    ) -> Result<BTreeMap<u32, NodeId>, CircuitError> {
        if inputs.len() != self.n_inputs() {
            return Err(CircuitError::InputArity {
                expected: self.n_inputs(),
                given: inputs.len(),
            });
        }
        let replace: BTreeMap<NodeId, NodeId> = self
            .inputs()
            .iter()
            .copied()
            .zip(inputs.iter().copied())
            .collect();
        self.reapply_into(target, &replace, register_outputs)
    }

    /// Sequential composition `… ∘ stages[1] ∘ stages[0] ∘ self`: the outputs
    /// of each circuit feed the inputs of the next. Every stage must consume
    /// exactly as many inputs as the previous stage produces outputs.
    pub fn compose(&self, stages: &[&Circuit<Op>]) -> Result<Circuit<Op>, CircuitError> {
        let mut target = self.clone_empty();
        let map = self.reapply_into(&mut target, &BTreeMap::new(), stages.is_empty())?;
        let mut wires: Vec<NodeId> = self
            .outputs()
            .iter()
            .map(|id| map[&id.raw()])
            .collect();

        for (position, stage) in stages.iter().enumerate() {
            let last = position == stages.len() - 1;
            let map = stage.reapply_inputs(&mut target, &wires, last)?;
            wires = stage.outputs().iter().map(|id| map[&id.raw()]).collect();
        }
        Ok(target)
    }

    /// Concatenates circuits sharing a single input set: all circuits must
    /// have the same number of inputs, and outputs are stacked in order.
    pub fn concat_on_same_inputs(
        &self,
        others: &[&Circuit<Op>],
    ) -> Result<Circuit<Op>, CircuitError> {
        for other in others {
            if other.n_inputs() != self.n_inputs() {
                return Err(CircuitError::InputArity {
                    expected: self.n_inputs(),
                    given: other.n_inputs(),
                });
            }
        }

        let mut target = self.clone_empty();
        let map = self.reapply_into(&mut target, &BTreeMap::new(), true)?;
        let inputs: Vec<NodeId> = self.inputs().iter().map(|id| map[&id.raw()]).collect();
        for other in others {
            other.reapply_inputs(&mut target, &inputs, true)?;
        }
        Ok(target)
    }

    /// Concatenates circuits side by side, each keeping its own inputs.
    pub fn concat_parallel(&self, others: &[&Circuit<Op>]) -> Result<Circuit<Op>, CircuitError> {
        let mut target = self.clone_empty();
        self.reapply_into(&mut target, &BTreeMap::new(), true)?;
        for other in others {
            other.reapply_into(&mut target, &BTreeMap::new(), true)?;
        }
        Ok(target)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use crate::circuit::Circuit;
    use crate::info::{InfoValue, InheritPolicy};
    use crate::ops::ArithOp;
    use crate::ring::IntRing;
    use pretty_assertions::assert_eq;

    type IntCircuit = Circuit<ArithOp<IntRing>>;

    /// `(a + b) * a`
    fn chain() -> IntCircuit {
        let mut circuit = IntCircuit::new(IntRing);
        let a = circuit.add_input_named("a").unwrap();
        let b = circuit.add_input_named("b").unwrap();
        let sum = circuit.add(a, b).unwrap();
        let out = circuit.mul(sum, a).unwrap();
        circuit.add_output(out).unwrap();
        circuit
    }

    #[test]
    fn test_reapply_identity() {
        let source = chain();
        let mut target = source.clone_empty();
        source
            .reapply_into(&mut target, &BTreeMap::new(), true)
            .unwrap();
        assert_eq!(target.len(), source.len());
        for input in [[3, 4], [0, 0], [-2, 7]] {
            assert_eq!(
                target.evaluate(&input).unwrap(),
                source.evaluate(&input).unwrap()
            );
        }
    }

    #[test]
    fn test_reapply_with_replaced_inputs() {
        let source = chain();
        let mut target = IntCircuit::new(IntRing);
        let x = target.add_input_named("x").unwrap();
        let doubled = target.add(x, x).unwrap();
        // both source inputs read the doubled value
        source
            .reapply_inputs(&mut target, &[doubled, doubled], true)
            .unwrap();
        // (2x + 2x) * 2x
        assert_eq!(target.evaluate(&[3]).unwrap(), vec![72]);
    }

    #[test]
    fn test_reapply_inherits_info() {
        let mut source = chain();
        let out = *source.outputs().last().unwrap();
        source.info_mut().set_policy("origin", InheritPolicy::default());
        source.info_mut().set(out, "origin", InfoValue::from("sbox"));

        let mut target = source.clone_empty();
        let map = source
            .reapply_into(&mut target, &BTreeMap::new(), true)
            .unwrap();
        let copied = map[&out.raw()];
        assert_eq!(
            target.info().get(copied, "origin"),
            Some(&InfoValue::from("sbox"))
        );
    }

    #[test]
    fn test_compose_stages() {
        // first: (x, y) -> x + y; second: z -> z * z
        let mut first = IntCircuit::new(IntRing);
        let x = first.add_input_named("x").unwrap();
        let y = first.add_input_named("y").unwrap();
        let sum = first.add(x, y).unwrap();
        first.add_output(sum).unwrap();

        let mut second = IntCircuit::new(IntRing);
        let z = second.add_input_named("z").unwrap();
        let square = second.mul(z, z).unwrap();
        second.add_output(square).unwrap();

        let composed = first.compose(&[&second]).unwrap();
        assert_eq!(composed.n_inputs(), 2);
        assert_eq!(composed.evaluate(&[3, 4]).unwrap(), vec![49]);
    }

    #[test]
    fn test_compose_arity_mismatch() {
        let first = chain(); // one output
        let mut second = IntCircuit::new(IntRing);
        let x = second.add_input_named("x").unwrap();
        let y = second.add_input_named("y").unwrap();
        let sum = second.add(x, y).unwrap();
        second.add_output(sum).unwrap();
        assert!(first.compose(&[&second]).is_err());
    }

    #[test]
    fn test_concat_on_same_inputs() {
        let mut sums = IntCircuit::new(IntRing);
        let a = sums.add_input_named("a").unwrap();
        let b = sums.add_input_named("b").unwrap();
        let sum = sums.add(a, b).unwrap();
        sums.add_output(sum).unwrap();

        let mut products = IntCircuit::new(IntRing);
        let a = products.add_input_named("a").unwrap();
        let b = products.add_input_named("b").unwrap();
        let product = products.mul(a, b).unwrap();
        products.add_output(product).unwrap();

        let stacked = sums.concat_on_same_inputs(&[&products]).unwrap();
        assert_eq!(stacked.n_inputs(), 2);
        assert_eq!(stacked.evaluate(&[3, 4]).unwrap(), vec![7, 12]);
    }

    #[test]
    fn test_concat_parallel() {
        let mut left = IntCircuit::new(IntRing);
        let a = left.add_input_named("a").unwrap();
        let one = left.add_const(1).unwrap();
        let sum = left.add(a, one).unwrap();
        left.add_output(sum).unwrap();

        let mut right = IntCircuit::new(IntRing);
        let b = right.add_input_named("b").unwrap();
        let doubled = right.add(b, b).unwrap();
        right.add_output(doubled).unwrap();

        let side_by_side = left.concat_parallel(&[&right]).unwrap();
        assert_eq!(side_by_side.n_inputs(), 2);
        assert_eq!(side_by_side.evaluate(&[10, 20]).unwrap(), vec![11, 40]);
    }
}
