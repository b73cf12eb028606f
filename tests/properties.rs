//! Property tests for the general invariants of spec.md §8 (numbered 1-10).
//! Seed scenarios S1-S6 live in `tests/seed_scenarios.rs`.

use blend65c::codegen::labels::LabelGenerator;
use blend65c::codegen::{basic_stub, generate, globals::GlobalAllocator, CodegenOptions, DebugMode, MockAssembler, OutputFormat, TargetDescriptor};
use blend65c::instructions::{InstId, Instruction, Opcode};
use blend65c::ir::function::StorageClass;
use blend65c::ir::{Function, Global, Module};
use blend65c::ssa;
use blend65c::ssa::dominator_tree::DominatorTree;
use blend65c::types::Type;
use blend65c::value::{Constant, Value};
use proptest::prelude::*;
use rustc_hash::FxHashSet;

fn options() -> CodegenOptions {
    CodegenOptions {
        target: TargetDescriptor::c64(),
        format: OutputFormat::Asm,
        source_map: false,
        debug: DebugMode::None,
        load_address: 0x080D,
        basic_stub: false,
        out_file: None,
    }
}

proptest! {
    /// Property 1: type sizes.
    #[test]
    fn property_1_byte_word_bool_void_sizes(n in 1u32..16) {
        prop_assert_eq!(Type::Void.size_in_bytes(), 0);
        prop_assert_eq!(Type::Bool.size_in_bytes(), 1);
        prop_assert_eq!(Type::Byte.size_in_bytes(), 1);
        prop_assert_eq!(Type::Word.size_in_bytes(), 2);
        prop_assert_eq!(Type::array(Type::Byte, n).size_in_bytes(), n);
        prop_assert_eq!(Type::array(Type::Word, n).size_in_bytes(), n * 2);
        prop_assert_eq!(Type::pointer(Type::Byte).size_in_bytes(), 2);
    }

    /// Property 7: label sanitization.
    #[test]
    fn property_7_sanitize_is_word_chars_only(s in "\\PC{0,24}") {
        let sanitized = LabelGenerator::sanitize(&s);
        if s.is_empty() {
            prop_assert_eq!(sanitized, "_empty");
        } else {
            prop_assert!(sanitized.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'));
            prop_assert!(!sanitized.chars().next().unwrap().is_ascii_digit());
        }
    }

    /// Property 8 and 9: BASIC stub round-trip and size law.
    #[test]
    fn property_8_9_basic_stub_round_trips(sys in 0i64..=65535, line in 0i64..=63999) {
        let load_address = 0x0801u16;
        let bytes = basic_stub::generate(load_address, line, sys).unwrap();
        prop_assert_eq!(bytes.len(), 9 + sys.to_string().len());
        match basic_stub::verify(&bytes, load_address) {
            basic_stub::StubVerification::Valid { sys_address, line_number } => {
                prop_assert_eq!(sys_address as i64, sys);
                prop_assert_eq!(line_number as i64, line);
            }
            other => prop_assert!(false, "expected a valid stub, got {other:?}"),
        }
    }

    /// Property 10: the zero-page allocator's running total always equals
    /// the sum of sizes successfully placed, and placement stops recording
    /// once the range is exhausted.
    #[test]
    fn property_10_zp_allocator_running_total(sizes in proptest::collection::vec(1u32..=8, 0..12)) {
        let target = TargetDescriptor::c64();
        let globals: Vec<Global> = sizes
            .iter()
            .enumerate()
            .map(|(i, &size)| Global {
                name: format!("g{i}"),
                ty: Type::array(Type::Byte, size),
                storage: StorageClass::ZeroPage,
                initial_value: None,
                address: None,
                is_constant: false,
            })
            .collect();
        let mut alloc = GlobalAllocator::new();
        alloc.allocate_all(&globals, &target);

        let placed_sum: u32 = globals
            .iter()
            .filter(|g| alloc.address_of(&g.name).is_some())
            .map(|g| g.ty.size_in_bytes())
            .sum();
        prop_assert_eq!(placed_sum, alloc.zp_bytes_used() as u32);
        prop_assert!(alloc.zp_bytes_used() <= target.zero_page_capacity());
    }
}

/// Property 2: every basic block ends with exactly one terminator, and it
/// is the last instruction; verified through the IL's own `verify` check.
#[test]
fn property_2_terminator_rule_holds_for_a_well_formed_function() {
    let mut f = Function::new("main", Type::Void);
    let a = f.add_block("a");
    f.link(0, a);
    f.block_mut(0).push(Instruction::new(InstId(0), Opcode::Jump { target: a }, None));
    f.block_mut(a)
        .push(Instruction::new(InstId(1), Opcode::ReturnVoid, None));
    assert!(f.verify().is_ok());
    for block in f.blocks_in_order() {
        assert_eq!(block.instructions.iter().filter(|i| i.is_terminator()).count(), 1);
        assert!(block.instructions.last().unwrap().is_terminator());
    }
}

/// Property 3: every register id is the result of at most one instruction.
#[test]
fn property_3_register_uniqueness_rejected_on_violation() {
    let mut f = Function::new("main", Type::Void);
    let r = f.values.make_register(Type::Byte);
    f.block_mut(0).push(Instruction::new(
        InstId(0),
        Opcode::Const {
            value: Value::Constant(Constant::new(1, Type::Byte)),
        },
        Some(r.clone()),
    ));
    f.block_mut(0).push(Instruction::new(
        InstId(1),
        Opcode::Const {
            value: Value::Constant(Constant::new(2, Type::Byte)),
        },
        Some(r),
    ));
    f.block_mut(0)
        .push(Instruction::new(InstId(2), Opcode::ReturnVoid, None));
    assert!(f.verify().is_err());
}

/// Property 4: dominance is reflexive, antisymmetric, and respects depth;
/// the entry's immediate dominator is -1.
#[test]
fn property_4_dominance_properties_on_a_diamond() {
    let mut f = Function::new("main", Type::Void);
    let a = f.add_block("a");
    let b = f.add_block("b");
    let merge = f.add_block("merge");
    f.link(0, a);
    f.link(0, b);
    f.link(a, merge);
    f.link(b, merge);
    f.block_mut(0).push(Instruction::new(InstId(0), Opcode::Jump { target: a }, None));
    f.block_mut(a)
        .push(Instruction::new(InstId(1), Opcode::Jump { target: merge }, None));
    f.block_mut(b)
        .push(Instruction::new(InstId(2), Opcode::Jump { target: merge }, None));
    f.block_mut(merge)
        .push(Instruction::new(InstId(3), Opcode::ReturnVoid, None));

    let tree = DominatorTree::compute(&f);
    assert_eq!(tree.idom(0), Some(-1));
    assert!(tree.dominates(0, 0));
    assert!(tree.dominates(0, a));
    assert!(tree.dominates(0, merge));
    assert!(!tree.dominates(a, b));
    assert!(!tree.dominates(b, a));
    assert!(tree.depth(0).unwrap() <= tree.depth(a).unwrap());
    assert!(tree.depth(0).unwrap() <= tree.depth(merge).unwrap());
}

/// Property 5: after renaming, a phi's operand set has no duplicate
/// versions and every predecessor contributes exactly one operand.
#[test]
fn property_5_ssa_renaming_phi_operands_form_a_set() {
    let mut f = Function::new("main", Type::Void);
    f.declare_local("x", Type::Byte, StorageClass::Ram);
    let a = f.add_block("a");
    let b = f.add_block("b");
    let merge = f.add_block("merge");
    f.link(0, a);
    f.link(0, b);
    f.link(a, merge);
    f.link(b, merge);
    f.block_mut(0).push(Instruction::new(InstId(0), Opcode::Jump { target: a }, None));
    f.block_mut(a).push(Instruction::new(
        InstId(1),
        Opcode::StoreVar {
            name: "x".into(),
            value: Value::Constant(Constant::new(1, Type::Byte)),
        },
        None,
    ));
    f.block_mut(a)
        .push(Instruction::new(InstId(2), Opcode::Jump { target: merge }, None));
    f.block_mut(b).push(Instruction::new(
        InstId(3),
        Opcode::StoreVar {
            name: "x".into(),
            value: Value::Constant(Constant::new(2, Type::Byte)),
        },
        None,
    ));
    f.block_mut(b)
        .push(Instruction::new(InstId(4), Opcode::Jump { target: merge }, None));
    f.block_mut(merge)
        .push(Instruction::new(InstId(5), Opcode::ReturnVoid, None));

    let mut promotable = FxHashSet::default();
    promotable.insert("x".to_string());
    ssa::construct(&mut f, &promotable);

    let phis: Vec<_> = f.block(merge).phis().collect();
    assert_eq!(phis.len(), 1);
    let Opcode::Phi { operands, .. } = &phis[0].opcode else {
        panic!("expected a phi");
    };
    let versions: FxHashSet<_> = operands.iter().filter_map(|op| op.value.as_register().map(|r| r.id)).collect();
    assert_eq!(versions.len(), operands.len(), "phi operand versions must be a set");
    assert!(f.verify().is_ok());
}

/// Property 6: determinism. Running the full pipeline twice on freshly
/// constructed, equivalent modules yields byte-identical output.
#[test]
fn property_6_pipeline_is_deterministic() {
    fn build() -> Module {
        let mut module = Module::new("det.b65");
        module.add_global(Global {
            name: "borderColor".to_string(),
            ty: Type::Byte,
            storage: StorageClass::Map(0xD020),
            initial_value: None,
            address: None,
            is_constant: false,
        });
        let mut func = Function::new("main", Type::Void);
        func.block_mut(0).push(Instruction::new(
            InstId(0),
            Opcode::HardwareWrite {
                address: 0xD020,
                value: Value::Constant(Constant::new(1, Type::Byte)),
            },
            None,
        ));
        func.block_mut(0)
            .push(Instruction::new(InstId(1), Opcode::ReturnVoid, None));
        module.add_function(func);
        module
    }

    let mut m1 = build();
    let mut m2 = build();
    let r1 = generate(&mut m1, options(), &MockAssembler::unavailable());
    let r2 = generate(&mut m2, options(), &MockAssembler::unavailable());
    assert_eq!(r1.asm_text, r2.asm_text);
    assert_eq!(r1.stats, r2.stats);
}
