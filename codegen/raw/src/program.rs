//! The bytecode program: bit-exact encoding, decoding and execution.
//!
//! Wire format (all integers little-endian by default):
//!
//! ```text
//! HEADER:
//!   uint64 n_inputs
//!   uint64 n_outputs
//!   uint64 n_opcodes
//!   uint64 code_byte_length
//!   uint64 ram_size
//!   bytes_addr × n_inputs   input cells
//!   bytes_addr × n_outputs  output cells
//! CODE:
//!   repeat n_opcodes times:
//!     bytes_op    opcode
//!     bytes_addr  dest cell
//!     bytes_addr  source cells, one per operand
//! ```

use std::fs;
use std::path::Path;

use anyhow::Context;
use rand::{Rng, RngCore};

#[derive(Debug, thiserror::Error)]
pub enum ProgramError {
    #[error("program blob ends before {0}")]
    Truncated(&'static str),
    #[error("unknown opcode {0}")]
    BadOpcode(u64),
    #[error("cell {0} is outside the program RAM")]
    BadAddress(u64),
    #[error("value {value} does not fit into {width} bytes")]
    Overflow { value: u64, width: usize },
    #[error("number of inputs mismatch: program has {expected}, given {given}")]
    InputCount { expected: usize, given: usize },
    #[error("unsupported field width {0}, expected 1..=8 bytes")]
    BadWidth(usize),
    #[error("trailing {0} bytes after the code section")]
    TrailingBytes(usize),
}

/// Byte widths and endianness of the encoded program.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub bytes_op: usize,
    pub bytes_addr: usize,
    pub little_endian: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            bytes_op: 1,
            bytes_addr: 2,
            little_endian: true,
        }
    }
}

impl Layout {
    fn check(&self) -> Result<(), ProgramError> {
        for width in [self.bytes_op, self.bytes_addr] {
            if !(1..=8).contains(&width) {
                return Err(ProgramError::BadWidth(width));
            }
        }
        Ok(())
    }

    fn write(&self, out: &mut Vec<u8>, value: u64, width: usize) -> Result<(), ProgramError> {
        if width < 8 && value >= 1u64 << (8 * width) {
            return Err(ProgramError::Overflow {
                value,
                width,
            });
        }
        let bytes = if self.little_endian {
            value.to_le_bytes()
        } else {
            value.to_be_bytes()
        };
        if self.little_endian {
            out.extend_from_slice(&bytes[..width]);
        } else {
            out.extend_from_slice(&bytes[8 - width..]);
        }
        Ok(())
    }

    fn read(
        &self,
        blob: &[u8],
        cursor: &mut usize,
        width: usize,
        what: &'static str,
    ) -> Result<u64, ProgramError> {
        let end = *cursor + width;
        if end > blob.len() {
            return Err(ProgramError::Truncated(what));
        }
        let mut bytes = [0u8; 8];
        if self.little_endian {
            bytes[..width].copy_from_slice(&blob[*cursor..end]);
        } else {
            bytes[8 - width..].copy_from_slice(&blob[*cursor..end]);
        }
        *cursor = end;
        Ok(if self.little_endian {
            u64::from_le_bytes(bytes)
        } else {
            u64::from_be_bytes(bytes)
        })
    }
}

/// Bytecode opcodes of the boolean instruction set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum OpCode {
    Xor = 1,
    And = 2,
    Or = 3,
    Not = 4,
    Rnd = 5,
}

impl OpCode {
    pub fn arity(&self) -> usize {
        match self {
            Self::Xor | Self::And | Self::Or => 2,
            Self::Not => 1,
            Self::Rnd => 0,
        }
    }

    fn from_u64(value: u64) -> Result<Self, ProgramError> {
        Ok(match value {
            1 => Self::Xor,
            2 => Self::And,
            3 => Self::Or,
            4 => Self::Not,
            5 => Self::Rnd,
            other => return Err(ProgramError::BadOpcode(other)),
        })
    }
}

/// One linearized instruction.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub op: OpCode,
    pub dest: u64,
    pub srcs: Vec<u64>,
}

/// A linearized boolean circuit, ready to be encoded to a byte blob or run
/// against a RAM of `ram_size` cells.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Program {
    pub layout: Layout,
    pub ram_size: u64,
    pub input_cells: Vec<u64>,
    pub output_cells: Vec<u64>,
    pub code: Vec<Instruction>,
}

impl Program {
    pub fn n_inputs(&self) -> usize {
        self.input_cells.len()
    }

    pub fn n_outputs(&self) -> usize {
        self.output_cells.len()
    }

    /// Byte length of the code section under the current layout.
    pub fn code_byte_length(&self) -> u64 {
        self.code
            .iter()
            .map(|instr| (self.layout.bytes_op + self.layout.bytes_addr * (1 + instr.srcs.len())) as u64)
            .sum()
    }

    /// Encodes header and code into one blob.
    pub fn encode(&self) -> Result<Vec<u8>, ProgramError> {
        let layout = self.layout;
        layout.check()?;
        let mut out = Vec::new();
        for value in [
            self.input_cells.len() as u64,
            self.output_cells.len() as u64,
            self.code.len() as u64,
            self.code_byte_length(),
            self.ram_size,
        ] {
            layout.write(&mut out, value, 8)?;
        }
        for cell in self.input_cells.iter().chain(&self.output_cells) {
            layout.write(&mut out, *cell, layout.bytes_addr)?;
        }
        for instr in &self.code {
            layout.write(&mut out, instr.op as u64, layout.bytes_op)?;
            layout.write(&mut out, instr.dest, layout.bytes_addr)?;
            for src in &instr.srcs {
                layout.write(&mut out, *src, layout.bytes_addr)?;
            }
        }
        Ok(out)
    }

    /// Decodes a blob produced by [`Program::encode`] under the same layout,
    /// validating lengths and addresses.
    pub fn decode(blob: &[u8], layout: Layout) -> Result<Self, ProgramError> {
        layout.check()?;
        let mut cursor = 0usize;
        let n_inputs = layout.read(blob, &mut cursor, 8, "header")?;
        let n_outputs = layout.read(blob, &mut cursor, 8, "header")?;
        let n_opcodes = layout.read(blob, &mut cursor, 8, "header")?;
        let code_byte_length = layout.read(blob, &mut cursor, 8, "header")?;
        let ram_size = layout.read(blob, &mut cursor, 8, "header")?;

        let check = |cell: u64| {
            if cell >= ram_size {
                Err(ProgramError::BadAddress(cell))
            } else {
                Ok(cell)
            }
        };

        let mut input_cells = Vec::with_capacity(n_inputs as usize);
        for _ in 0..n_inputs {
            input_cells.push(check(layout.read(
                blob,
                &mut cursor,
                layout.bytes_addr,
                "input cells",
            )?)?);
        }
        let mut output_cells = Vec::with_capacity(n_outputs as usize);
        for _ in 0..n_outputs {
            output_cells.push(check(layout.read(
                blob,
                &mut cursor,
                layout.bytes_addr,
                "output cells",
            )?)?);
        }

        let code_start = cursor;
        let mut code = Vec::with_capacity(n_opcodes as usize);
        for _ in 0..n_opcodes {
            let op = OpCode::from_u64(layout.read(blob, &mut cursor, layout.bytes_op, "opcode")?)?;
            let dest = check(layout.read(blob, &mut cursor, layout.bytes_addr, "dest cell")?)?;
            let mut srcs = Vec::with_capacity(op.arity());
            for _ in 0..op.arity() {
                srcs.push(check(layout.read(
                    blob,
                    &mut cursor,
                    layout.bytes_addr,
                    "source cell",
                )?)?);
            }
            code.push(Instruction { op, dest, srcs });
        }
        if (cursor - code_start) as u64 != code_byte_length {
            return Err(ProgramError::Truncated("code section"));
        }
        if cursor != blob.len() {
            return Err(ProgramError::TrailingBytes(blob.len() - cursor));
        }

        Ok(Self {
            layout,
            ram_size,
            input_cells,
            output_cells,
            code,
        })
    }

    /// Runs the program on the given input bits; RND instructions draw from
    /// the generator.
    pub fn execute(
        &self,
        inputs: &[bool],
        rng: &mut dyn RngCore,
    ) -> Result<Vec<bool>, ProgramError> {
        if inputs.len() != self.input_cells.len() {
            return Err(ProgramError::InputCount {
                expected: self.input_cells.len(),
                given: inputs.len(),
            });
        }
        let mut ram = vec![false; self.ram_size as usize];
        let cell = |address: u64| -> Result<usize, ProgramError> {
            if address >= self.ram_size {
                return Err(ProgramError::BadAddress(address));
            }
            Ok(address as usize)
        };

        for (address, value) in self.input_cells.iter().zip(inputs) {
            ram[cell(*address)?] = *value;
        }
        for instr in &self.code {
            let value = match instr.op {
                OpCode::Xor => ram[cell(instr.srcs[0])?] ^ ram[cell(instr.srcs[1])?],
                OpCode::And => ram[cell(instr.srcs[0])?] & ram[cell(instr.srcs[1])?],
                OpCode::Or => ram[cell(instr.srcs[0])?] | ram[cell(instr.srcs[1])?],
                OpCode::Not => !ram[cell(instr.srcs[0])?],
                OpCode::Rnd => rng.random_range(0..2) == 1,
            };
            ram[cell(instr.dest)?] = value;
        }
        self.output_cells
            .iter()
            .map(|address| Ok(ram[cell(*address)?]))
            .collect()
    }

    pub fn write_to(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let blob = self.encode()?;
        fs::write(path.as_ref(), blob)
            .with_context(|| format!("writing program to {}", path.as_ref().display()))?;
        Ok(())
    }

    pub fn read_from(path: impl AsRef<Path>, layout: Layout) -> anyhow::Result<Self> {
        let blob = fs::read(path.as_ref())
            .with_context(|| format!("reading program from {}", path.as_ref().display()))?;
        Ok(Self::decode(&blob, layout)?)
    }
}
