use circ_codegen_raw::{serialize, serialize_with_layout, Layout, OpCode, Program};
use circ_ir::{Bits, BooleanCircuit, CircuitError};
use circ_transforms::{mask, TransformError};

/// `y = (a AND b) XOR c`
fn and_xor() -> BooleanCircuit {
    let mut circuit = BooleanCircuit::new(Bits);
    let a = circuit.add_input_named("a").unwrap();
    let b = circuit.add_input_named("b").unwrap();
    let c = circuit.add_input_named("c").unwrap();
    let conj = circuit.and(a, b).unwrap();
    let out = circuit.xor(conj, c).unwrap();
    circuit.add_output(out).unwrap();
    circuit
}

/// A full adder over inputs `a`, `b`, `cin` with outputs `sum`, `cout`.
fn full_adder() -> BooleanCircuit {
    let mut circuit = BooleanCircuit::new(Bits);
    let a = circuit.add_input_named("a").unwrap();
    let b = circuit.add_input_named("b").unwrap();
    let cin = circuit.add_input_named("cin").unwrap();
    let ab = circuit.xor(a, b).unwrap();
    let sum = circuit.xor(ab, cin).unwrap();
    let and1 = circuit.and(ab, cin).unwrap();
    let and2 = circuit.and(a, b).unwrap();
    let cout = circuit.or(and1, and2).unwrap();
    circuit.add_output(sum).unwrap();
    circuit.add_output(cout).unwrap();
    circuit
}

fn bits(value: usize, count: usize) -> Vec<bool> {
    (0..count).map(|i| (value >> (count - 1 - i)) & 1 == 1).collect()
}

#[test]
fn test_and_xor_program_shape() {
    let program = serialize(&and_xor()).unwrap();
    assert_eq!(program.code.len(), 2);
    assert_eq!(program.code[0].op, OpCode::And);
    assert_eq!(program.code[1].op, OpCode::Xor);
    assert_eq!(program.ram_size, 4);
    assert_eq!(program.n_inputs(), 3);
    assert_eq!(program.n_outputs(), 1);

    let mut rng = rand::rng();
    let out = program.execute(&[true, true, false], &mut rng).unwrap();
    assert_eq!(out, vec![true]);
}

#[test]
fn test_program_matches_circuit_on_every_input() {
    let circuit = full_adder();
    let program = serialize(&circuit).unwrap();
    let mut rng = rand::rng();
    for assignment in 0..8 {
        let inputs = bits(assignment, 3);
        let expected: Vec<bool> = circuit
            .evaluate_values(&inputs)
            .unwrap();
        assert_eq!(program.execute(&inputs, &mut rng).unwrap(), expected);
    }
}

#[test]
fn test_encode_decode_execute_round_trip() {
    let circuit = full_adder();
    let program = serialize(&circuit).unwrap();
    let blob = program.encode().unwrap();
    let decoded = Program::decode(&blob, program.layout).unwrap();
    assert_eq!(decoded, program);

    let mut rng = rand::rng();
    for assignment in 0..8 {
        let inputs = bits(assignment, 3);
        assert_eq!(
            decoded.execute(&inputs, &mut rng).unwrap(),
            circuit.evaluate_values(&inputs).unwrap()
        );
    }
}

#[test]
fn test_cells_are_reused() {
    // a chain of NOTs stays within input cell + one scratch cell
    let mut circuit = BooleanCircuit::new(Bits);
    let mut wire = circuit.add_input_named("a").unwrap();
    for _ in 0..10 {
        wire = circuit.not(wire).unwrap();
    }
    circuit.add_output(wire).unwrap();

    let program = serialize(&circuit).unwrap();
    assert_eq!(program.code.len(), 10);
    assert_eq!(program.ram_size, 2);

    let mut rng = rand::rng();
    assert_eq!(
        program.execute(&[true], &mut rng).unwrap(),
        vec![true]
    );
}

#[test]
fn test_distinct_cells_for_inputs_and_outputs() {
    let program = serialize(&full_adder()).unwrap();
    let mut input_cells = program.input_cells.clone();
    input_cells.sort_unstable();
    input_cells.dedup();
    assert_eq!(input_cells.len(), program.n_inputs());

    let mut output_cells = program.output_cells.clone();
    output_cells.sort_unstable();
    output_cells.dedup();
    assert_eq!(output_cells.len(), program.n_outputs());
}

#[test]
fn test_output_cells_never_freed() {
    // the first output keeps its cell even though the second gate consumes it
    let mut circuit = BooleanCircuit::new(Bits);
    let a = circuit.add_input_named("a").unwrap();
    let b = circuit.add_input_named("b").unwrap();
    let conj = circuit.and(a, b).unwrap();
    let negated = circuit.not(conj).unwrap();
    circuit.add_output(conj).unwrap();
    circuit.add_output(negated).unwrap();

    let program = serialize(&circuit).unwrap();
    let mut rng = rand::rng();
    for assignment in 0..4 {
        let inputs = bits(assignment, 2);
        let out = program.execute(&inputs, &mut rng).unwrap();
        assert_eq!(out[0], inputs[0] & inputs[1]);
        assert_eq!(out[1], !(inputs[0] & inputs[1]));
    }
}

#[test]
fn test_const_rejected() {
    let mut circuit = BooleanCircuit::new(Bits);
    let a = circuit.add_input_named("a").unwrap();
    let one = circuit.add_const(1).unwrap();
    let out = circuit.xor(a, one).unwrap();
    circuit.add_output(out).unwrap();
    assert!(matches!(
        serialize(&circuit)
            .unwrap_err()
            .downcast::<TransformError>(),
        Ok(TransformError::Unsupported("CONST"))
    ));
}

#[test]
fn test_masked_program_executes() {
    // serialize an order-1 masked AND and re-run the bytecode: the XOR of the
    // output shares must equal the AND of the unshared inputs
    let mut source = BooleanCircuit::new(Bits);
    let a = source.add_input_named("a").unwrap();
    let b = source.add_input_named("b").unwrap();
    let conj = source.and(a, b).unwrap();
    source.add_output(conj).unwrap();
    let masked = mask(&source, 1).unwrap();

    let program = serialize(&masked).unwrap();
    let mut rng = rand::rng();
    for assignment in 0..16 {
        let shares = bits(assignment, 4);
        let a = shares[0] ^ shares[1];
        let b = shares[2] ^ shares[3];
        for _ in 0..4 {
            let out = program.execute(&shares, &mut rng).unwrap();
            assert_eq!(out[0] ^ out[1], a & b);
        }
    }
}

#[test]
fn test_wider_addresses() {
    let layout = Layout {
        bytes_addr: 4,
        ..Layout::default()
    };
    let circuit = and_xor();
    let program = serialize_with_layout(&circuit, layout).unwrap();
    let blob = program.encode().unwrap();
    // 5 x u64, 4 x u32 cells, 2 instructions of 1 + 3 x 4 bytes
    assert_eq!(blob.len(), 40 + 16 + 2 * 13);
    assert_eq!(Program::decode(&blob, layout).unwrap(), program);
}

#[test]
fn test_file_round_trip() {
    let circuit = and_xor();
    let program = serialize(&circuit).unwrap();
    let path = std::env::temp_dir().join("circ_codegen_raw_program.bin");
    program.write_to(&path).unwrap();
    let loaded = Program::read_from(&path, program.layout).unwrap();
    std::fs::remove_file(&path).ok();
    assert_eq!(loaded, program);
}

#[test]
fn test_boolean_circuit_still_checks_inputs() {
    let circuit = and_xor();
    assert!(matches!(
        circuit.evaluate(&[1, 0]),
        Err(CircuitError::InputArity { .. })
    ));
}
