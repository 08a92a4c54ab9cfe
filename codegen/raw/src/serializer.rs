//! Linearization of boolean circuits with liveness-aware register reuse.

use std::collections::BTreeMap;

use log::debug;

use circ_ir::{BitOp, BooleanCircuit, NodeId, Operation};
use circ_transforms::{run, TransformError, Transformer};

use crate::program::{Instruction, Layout, OpCode, Program};

/// Walks a boolean circuit in topological order, assigning one RAM cell per
/// live node and emitting one instruction per gate.
///
/// Cells are recycled through a free list: once the last consumer of a node
/// has been emitted the node's cell is released — unless the node is an
/// output, outputs stay live forever. The resulting `ram_size` is the peak
/// number of simultaneously live cells.
pub struct RawSerializer {
    layout: Layout,
    free: Vec<u64>,
    cell: BTreeMap<u32, u64>,
    used: BTreeMap<u32, usize>,
    ram_size: u64,
    code: Vec<Instruction>,
}

impl Default for RawSerializer {
    fn default() -> Self {
        Self::new(Layout::default())
    }
}

impl RawSerializer {
    pub fn new(layout: Layout) -> Self {
        Self {
            layout,
            free: Vec::new(),
            cell: BTreeMap::new(),
            used: BTreeMap::new(),
            ram_size: 0,
            code: Vec::new(),
        }
    }

    /// Serializes the circuit into a [`Program`].
    pub fn serialize(mut self, circuit: &BooleanCircuit) -> Result<Program, TransformError> {
        run(&mut self, circuit)?;

        let input_cells: Vec<u64> = circuit
            .inputs()
            .iter()
            .map(|id| self.cell[&id.raw()])
            .collect();
        let output_cells: Vec<u64> = circuit
            .outputs()
            .iter()
            .map(|id| self.cell[&id.raw()])
            .collect();
        debug!(
            "serialized {}: {} opcodes, ram {}",
            circuit.name(),
            self.code.len(),
            self.ram_size
        );

        Ok(Program {
            layout: self.layout,
            ram_size: self.ram_size,
            input_cells,
            output_cells,
            code: self.code,
        })
    }

    fn alloc(&mut self, id: NodeId) -> u64 {
        let cell = self.free.pop().unwrap_or_else(|| {
            let grown = self.ram_size;
            self.ram_size += 1;
            grown
        });
        self.cell.insert(id.raw(), cell);
        cell
    }
}

impl Transformer<BitOp> for RawSerializer {
    type Out = ();

    fn visit(
        &mut self,
        source: &BooleanCircuit,
        id: NodeId,
        _args: &[()],
    ) -> Result<(), TransformError> {
        let node = source.node(id);
        if node.is_input() {
            // input cells are published through the header, no code emitted
            self.alloc(id);
            return Ok(());
        }

        let op = match node.op() {
            BitOp::Xor => OpCode::Xor,
            BitOp::And => OpCode::And,
            BitOp::Or => OpCode::Or,
            BitOp::Not => OpCode::Not,
            BitOp::Rnd => OpCode::Rnd,
            other => return Err(TransformError::Unsupported(other.opcode())),
        };
        let srcs: Vec<u64> = node
            .incoming()
            .iter()
            .map(|parent| self.cell[&parent.raw()])
            .collect();
        let dest = self.alloc(id);
        self.code.push(Instruction { op, dest, srcs });

        // release a parent's cell once its last consumer has been emitted
        for parent in node.incoming() {
            let count = self.used.entry(parent.raw()).or_insert(0);
            *count += 1;
            debug_assert!(*count <= source.node(*parent).outgoing().len());
            if *count == source.node(*parent).outgoing().len() && !source.is_output(*parent) {
                self.free.push(self.cell[&parent.raw()]);
            }
        }
        Ok(())
    }
}

/// Serializes a boolean circuit with the default layout.
pub fn serialize(circuit: &BooleanCircuit) -> anyhow::Result<Program> {
    Ok(RawSerializer::default().serialize(circuit)?)
}

/// Serializes a boolean circuit with an explicit layout.
pub fn serialize_with_layout(
    circuit: &BooleanCircuit,
    layout: Layout,
) -> anyhow::Result<Program> {
    Ok(RawSerializer::new(layout).serialize(circuit)?)
}
