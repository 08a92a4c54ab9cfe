//! ISW masking: every wire is split into `order + 1` shares whose sum is the
//! original value, so that any `order` intermediate values are statistically
//! independent of the secrets.

use log::debug;

use circ_ir::{ArithOp, BitOp, Circuit, InputName, NodeId, Operation, Ring};

use crate::{run, TransformError, Transformer};

/// The operations a flavor must provide for ISW masking. For boolean
/// circuits addition and subtraction are both XOR.
pub trait MaskableOp: Operation {
    fn add() -> Self;
    fn sub() -> Self;
    fn mul() -> Self;
    fn rnd() -> Self;
}

impl<R: Ring> MaskableOp for ArithOp<R> {
    fn add() -> Self {
        Self::Add
    }

    fn sub() -> Self {
        Self::Sub
    }

    fn mul() -> Self {
        Self::Mul
    }

    fn rnd() -> Self {
        Self::Rnd
    }
}

impl MaskableOp for BitOp {
    fn add() -> Self {
        Self::Xor
    }

    fn sub() -> Self {
        Self::Xor
    }

    fn mul() -> Self {
        Self::And
    }

    fn rnd() -> Self {
        Self::Rnd
    }
}

/// The masking transformer. Each source node maps to its vector of shares in
/// the target circuit.
pub struct Isw<Op: MaskableOp> {
    order: usize,
    target: Circuit<Op>,
}

impl<Op: MaskableOp> Isw<Op> {
    pub fn new(order: usize, target: Circuit<Op>) -> Self {
        Self { order, target }
    }

    pub fn n_shares(&self) -> usize {
        self.order + 1
    }

    pub fn into_target(self) -> Circuit<Op> {
        self.target
    }

    /// One fresh input per share, named after the source input.
    fn mask_input(&mut self, name: &InputName) -> Result<Vec<NodeId>, TransformError> {
        (0..self.n_shares())
            .map(|i| {
                let share_name = InputName::Text(format!("{name}_share{i}"));
                Ok(self.target.add_input_named(share_name)?)
            })
            .collect()
    }

    /// `order` random shares plus one share correcting the sum to `c`.
    fn mask_const(&mut self, value: &Op::Value) -> Result<Vec<NodeId>, TransformError> {
        let mut shares: Vec<NodeId> = (0..self.order)
            .map(|_| Ok(self.target.apply(Op::rnd(), &[])?))
            .collect::<Result<_, TransformError>>()?;
        let mut last = self.target.add_const_value(value.clone())?;
        for share in &shares {
            last = self.target.apply(Op::add(), &[last, *share])?;
        }
        shares.push(last);
        Ok(shares)
    }

    fn mask_linear(&mut self, x: &[NodeId], y: &[NodeId]) -> Result<Vec<NodeId>, TransformError> {
        x.iter()
            .zip(y)
            .map(|(a, b)| Ok(self.target.apply(Op::add(), &[*a, *b])?))
            .collect()
    }

    /// The ISW multiplication gadget: for every unordered pair `i < j` draw
    /// `r_ij` fresh and set `r_ji = r_ij + x_i·y_j + x_j·y_i`; share `i` is
    /// `x_i·y_i − Σ_{j≠i} r_ij`.
    fn mask_mul(&mut self, x: &[NodeId], y: &[NodeId]) -> Result<Vec<NodeId>, TransformError> {
        let n = self.n_shares();
        let mut r: Vec<Vec<Option<NodeId>>> = vec![vec![None; n]; n];
        for i in 0..n {
            for j in (i + 1)..n {
                let r_ij = self.target.apply(Op::rnd(), &[])?;
                let xi_yj = self.target.apply(Op::mul(), &[x[i], y[j]])?;
                let xj_yi = self.target.apply(Op::mul(), &[x[j], y[i]])?;
                let partial = self.target.apply(Op::add(), &[r_ij, xi_yj])?;
                let r_ji = self.target.apply(Op::add(), &[partial, xj_yi])?;
                r[i][j] = Some(r_ij);
                r[j][i] = Some(r_ji);
            }
        }

        let mut z: Vec<NodeId> = x
            .iter()
            .zip(y)
            .map(|(a, b)| Ok(self.target.apply(Op::mul(), &[*a, *b])?))
            .collect::<Result<_, TransformError>>()?;
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    let r_ij = r[i][j].expect("filled for every i != j");
                    z[i] = self.target.apply(Op::sub(), &[z[i], r_ij])?;
                }
            }
        }
        Ok(z)
    }
}

impl<Op: MaskableOp> Transformer<Op> for Isw<Op> {
    type Out = Vec<NodeId>;

    fn visit(
        &mut self,
        source: &Circuit<Op>,
        node: NodeId,
        args: &[Vec<NodeId>],
    ) -> Result<Vec<NodeId>, TransformError> {
        let op = source.node(node).op();
        if let Some(name) = op.as_input() {
            let name = name.clone();
            return self.mask_input(&name);
        }
        if let Some(value) = op.as_constant() {
            let value = value.clone();
            return self.mask_const(&value);
        }
        match op.opcode() {
            "ADD" | "XOR" => self.mask_linear(&args[0], &args[1]),
            "MUL" | "AND" => self.mask_mul(&args[0], &args[1]),
            other => Err(TransformError::Unsupported(other)),
        }
    }

    fn make_output(
        &mut self,
        _source: &Circuit<Op>,
        _node: NodeId,
        shares: &Vec<NodeId>,
    ) -> Result<(), TransformError> {
        for share in shares {
            self.target.add_output(*share)?;
        }
        Ok(())
    }
}

/// Masks a circuit at the given order: each input and output turns into
/// `order + 1` shares summing to the original wire.
pub fn mask<Op: MaskableOp>(
    source: &Circuit<Op>,
    order: usize,
) -> Result<Circuit<Op>, TransformError> {
    debug!(
        "masking {} at order {order} ({} shares)",
        source.name(),
        order + 1
    );
    let mut transformer = Isw::new(order, source.clone_empty());
    run(&mut transformer, source)?;
    Ok(transformer.into_target())
}
