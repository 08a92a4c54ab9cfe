//! Forward evaluation of circuits: concrete runs, traces, batch runs.

use std::collections::BTreeMap;

use rand::RngCore;

use crate::circuit::Circuit;
use crate::consts::ConstManager;
use crate::error::CircuitError;
use crate::node::{Node, NodeId};
use crate::ops::{Evaluated, Operation};

impl<Op: Operation> Circuit<Op> {
    /// Evaluates the circuit on external values, converting inputs and
    /// outputs through the constant manager.
    pub fn evaluate(&self, inputs: &[i128]) -> Result<Vec<i128>, CircuitError> {
        let mut rng = rand::rng();
        self.evaluate_with_rng(inputs, &mut rng)
    }

    pub fn evaluate_with_rng(
        &self,
        inputs: &[i128],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<i128>, CircuitError> {
        let values = self.convert_inputs(inputs)?;
        let outputs = self.evaluate_values_with_rng(&values, rng)?;
        outputs.iter().map(|v| self.domain().output(v)).collect()
    }

    /// Evaluates on canonical domain values without conversion.
    pub fn evaluate_values(&self, inputs: &[Op::Value]) -> Result<Vec<Op::Value>, CircuitError> {
        let mut rng = rand::rng();
        self.evaluate_values_with_rng(inputs, &mut rng)
    }

    pub fn evaluate_values_with_rng(
        &self,
        inputs: &[Op::Value],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Op::Value>, CircuitError> {
        let mem = self.eval_memory(inputs, rng)?;
        self.outputs()
            .iter()
            .map(|id| {
                let value = &mem[self.slot_of(*id)];
                value
                    .scalar()
                    .cloned()
                    .ok_or_else(|| multi_output_error(self.node(*id)))
            })
            .collect()
    }

    /// The full memory map of one run, converted to external values.
    pub fn trace(&self, inputs: &[i128]) -> Result<BTreeMap<NodeId, i128>, CircuitError> {
        let values = self.convert_inputs(inputs)?;
        let mut rng = rand::rng();
        let mem = self.eval_memory(&values, &mut rng)?;
        self.nodes()
            .map(|node| {
                let value = mem[self.slot_of(node.id())]
                    .scalar()
                    .ok_or_else(|| multi_output_error(node))?;
                Ok((node.id(), self.domain().output(value)?))
            })
            .collect()
    }

    /// The full memory map of one run, as raw values.
    pub fn trace_values(
        &self,
        inputs: &[Op::Value],
    ) -> Result<BTreeMap<NodeId, Evaluated<Op::Value>>, CircuitError> {
        let mut rng = rand::rng();
        let mem = self.eval_memory(inputs, &mut rng)?;
        Ok(self
            .nodes()
            .zip(mem)
            .map(|(node, value)| (node.id(), value))
            .collect())
    }

    /// One random value per input, drawn from the domain.
    pub fn random_inputs(&self, rng: &mut dyn RngCore) -> Vec<Op::Value> {
        self.inputs()
            .iter()
            .map(|_| self.domain().random(rng))
            .collect()
    }

    fn convert_inputs(&self, inputs: &[i128]) -> Result<Vec<Op::Value>, CircuitError> {
        if inputs.len() != self.n_inputs() {
            return Err(CircuitError::InputArity {
                expected: self.n_inputs(),
                given: inputs.len(),
            });
        }
        inputs.iter().map(|v| self.domain().create(*v)).collect()
    }

    fn slot_of(&self, id: NodeId) -> usize {
        *self.slot.get(&id.raw()).expect("node id of this circuit")
    }

    /// Walks the node list once in topological order, filling one value per
    /// node. Inputs take the provided values; GET indexes into the producing
    /// node's values.
    fn eval_memory(
        &self,
        inputs: &[Op::Value],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Evaluated<Op::Value>>, CircuitError> {
        if inputs.len() != self.n_inputs() {
            return Err(CircuitError::InputArity {
                expected: self.n_inputs(),
                given: inputs.len(),
            });
        }
        let mut mem: Vec<Option<Evaluated<Op::Value>>> = vec![None; self.len()];
        for (id, value) in self.inputs().iter().zip(inputs) {
            mem[self.slot_of(*id)] = Some(Evaluated::One(value.clone()));
        }

        let mut args: Vec<Op::Value> = Vec::new();
        for (slot, node) in self.nodes().enumerate() {
            if mem[slot].is_some() {
                continue;
            }
            let value = if let Some(index) = node.op().as_get() {
                let parent = self.slot_of(node.incoming()[0]);
                let parent_value = mem[parent].as_ref().expect("topological order");
                Evaluated::One(parent_value.index(index)?.clone())
            } else {
                args.clear();
                for parent in node.incoming() {
                    let parent_value = mem[self.slot_of(*parent)]
                        .as_ref()
                        .expect("topological order");
                    args.push(
                        parent_value
                            .scalar()
                            .cloned()
                            .ok_or_else(|| multi_output_error(node))?,
                    );
                }
                node.op().eval(self.domain(), rng, &args)?
            };
            mem[slot] = Some(value);
        }
        Ok(mem
            .into_iter()
            .map(|value| value.expect("every node evaluated"))
            .collect())
    }

    /// Evaluates the circuit on several runs at once: each input carries one
    /// value per column and each column is an independent run. Defined for
    /// scalar (single-output) circuits.
    pub(crate) fn evaluate_columns(
        &self,
        inputs: &[Vec<Op::Value>],
        columns: usize,
        rng: &mut dyn RngCore,
    ) -> Result<Vec<Vec<Op::Value>>, CircuitError> {
        if inputs.len() != self.n_inputs() {
            return Err(CircuitError::InputArity {
                expected: self.n_inputs(),
                given: inputs.len(),
            });
        }
        if inputs.iter().any(|col| col.len() != columns) {
            return Err(CircuitError::Eval(
                "input columns of different lengths".into(),
            ));
        }

        let mut mem: Vec<Option<Vec<Op::Value>>> = vec![None; self.len()];
        for (id, column) in self.inputs().iter().zip(inputs) {
            mem[self.slot_of(*id)] = Some(column.clone());
        }

        let mut args: Vec<Op::Value> = Vec::new();
        for (slot, node) in self.nodes().enumerate() {
            if mem[slot].is_some() {
                continue;
            }
            if node.op().as_get().is_some() {
                return Err(CircuitError::Eval(
                    "GET is not supported in batch evaluation".into(),
                ));
            }
            let parents: Vec<usize> = node.incoming().iter().map(|p| self.slot_of(*p)).collect();
            let mut column = Vec::with_capacity(columns);
            for run in 0..columns {
                args.clear();
                for parent in &parents {
                    let parent_column = mem[*parent].as_ref().expect("topological order");
                    args.push(parent_column[run].clone());
                }
                match node.op().eval(self.domain(), rng, &args)? {
                    Evaluated::One(value) => column.push(value),
                    Evaluated::Many(_) => return Err(multi_output_error(node)),
                }
            }
            mem[slot] = Some(column);
        }

        Ok(self
            .outputs()
            .iter()
            .map(|id| mem[self.slot_of(*id)].clone().expect("every node evaluated"))
            .collect())
    }
}

fn multi_output_error<Op: Operation>(node: &Node<Op>) -> CircuitError {
    CircuitError::Eval(format!(
        "multi-output value of {} used where a single value is required",
        node.op().opcode()
    ))
}
