//! End-to-end seed scenarios (spec.md §8, S1-S6), exercised through the
//! crate's public API rather than inline unit tests.

use blend65c::codegen::{generate, CodegenOptions, DebugMode, MockAssembler, OutputFormat, TargetDescriptor};
use blend65c::instructions::{InstId, Instruction, Opcode};
use blend65c::ir::function::StorageClass;
use blend65c::ir::{Function, Global, Module};
use blend65c::ssa;
use blend65c::types::Type;
use blend65c::value::{Constant, Value};
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

/// S1: `@map borderColor at $D020: byte` and `main() { borderColor = 1; }`.
#[test]
fn s1_hardware_write_pipeline() {
    let mut module = Module::new("s1.b65");
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

    let result = generate(&mut module, options(), &MockAssembler::unavailable());
    let lda = result.asm_text.find("LDA #$01").expect("LDA #$01 present");
    let sta = result.asm_text.find("STA $D020").expect("STA $D020 present");
    let rts = result.asm_text.find("RTS").expect("RTS present");
    assert!(lda < sta && sta < rts);
    assert!(result.stats.code_size >= 6);
}

/// S2: sequential zero-page allocation for `counter: byte`, `score: word`,
/// `flag: byte`.
#[test]
fn s2_zero_page_allocation_order() {
    let mut module = Module::new("s2.b65");
    for (name, ty) in [("counter", Type::Byte), ("score", Type::Word), ("flag", Type::Byte)] {
        module.add_global(Global {
            name: name.to_string(),
            ty,
            storage: StorageClass::ZeroPage,
            initial_value: None,
            address: None,
            is_constant: false,
        });
    }
    module.add_function(Function::new("main", Type::Void));
    module.functions[0].block_mut(0).push(Instruction::new(InstId(0), Opcode::ReturnVoid, None));

    let result = generate(&mut module, options(), &MockAssembler::unavailable());
    assert_eq!(result.stats.zp_used, 4);

    let target = TargetDescriptor::c64();
    let mut alloc = blend65c::codegen::globals::GlobalAllocator::new();
    alloc.allocate_all(&module.globals, &target);
    assert_eq!(alloc.address_of("counter").unwrap().address, target.zero_page_range.0);
    assert_eq!(alloc.address_of("score").unwrap().address, target.zero_page_range.0 + 1);
    assert_eq!(alloc.address_of("flag").unwrap().address, target.zero_page_range.0 + 3);
}

/// S3: empty module, `basic_stub=true`, `load=0x0801`, `sys=0x0810`.
#[test]
fn s3_basic_stub_schema() {
    let bytes = blend65c::codegen::basic_stub::generate(0x0801, 10, 0x0810).unwrap();
    assert_eq!(&bytes[5..9], b"2064");
    let next_line_ptr = u16::from_le_bytes([bytes[0], bytes[1]]);
    assert_eq!(next_line_ptr, 0x080C);
    assert_eq!(bytes.len(), 12);
}

/// S4: diamond CFG, `x` written in both branches, read after merge.
#[test]
fn s4_diamond_inserts_single_phi() {
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
    let stats = ssa::construct(&mut f, &promotable);

    assert_eq!(stats.phis_processed, 1);
    let phis: Vec<_> = f.block(merge).phis().collect();
    assert_eq!(phis.len(), 1);
    let Opcode::Phi { operands, .. } = &phis[0].opcode else {
        panic!("expected a phi opcode");
    };
    assert_eq!(operands.len(), 2);
    let preds: FxHashSet<u32> = operands.iter().map(|op| op.predecessor_block_id).collect();
    assert_eq!(preds, [a, b].into_iter().collect());
    assert!(f.verify().is_ok());
}

/// S5: loop CFG (header <-> body), `i` written in entry and incremented in
/// body, phi at the loop header with two operands.
#[test]
fn s5_loop_header_phi_has_two_operands() {
    let mut f = Function::new("main", Type::Void);
    f.declare_local("i", Type::Byte, StorageClass::Ram);
    let header = f.add_block("header");
    let body = f.add_block("body");
    let exit = f.add_block("exit");
    f.link(0, header);
    f.link(header, body);
    f.link(header, exit);
    f.link(body, header);

    f.block_mut(0).push(Instruction::new(
        InstId(0),
        Opcode::StoreVar {
            name: "i".into(),
            value: Value::Constant(Constant::new(0, Type::Byte)),
        },
        None,
    ));
    f.block_mut(0)
        .push(Instruction::new(InstId(1), Opcode::Jump { target: header }, None));

    let loaded = f.values.make_register(Type::Byte);
    f.block_mut(header)
        .push(Instruction::new(InstId(2), Opcode::LoadVar { name: "i".into() }, Some(loaded)));
    f.block_mut(header).push(Instruction::new(
        InstId(3),
        Opcode::Branch {
            condition: Value::Constant(Constant::new(1, Type::Bool)),
            then_block: body,
            else_block: exit,
        },
        None,
    ));

    f.block_mut(body).push(Instruction::new(
        InstId(4),
        Opcode::StoreVar {
            name: "i".into(),
            value: Value::Constant(Constant::new(1, Type::Byte)),
        },
        None,
    ));
    f.block_mut(body)
        .push(Instruction::new(InstId(5), Opcode::Jump { target: header }, None));

    f.block_mut(exit)
        .push(Instruction::new(InstId(6), Opcode::ReturnVoid, None));

    let mut promotable = FxHashSet::default();
    promotable.insert("i".to_string());
    let stats = ssa::construct(&mut f, &promotable);

    assert_eq!(stats.phis_processed, 1);
    let phis: Vec<_> = f.block(header).phis().collect();
    assert_eq!(phis.len(), 1);
    let Opcode::Phi { operands, .. } = &phis[0].opcode else {
        panic!("expected a phi opcode");
    };
    assert_eq!(operands.len(), 2);
    let preds: FxHashSet<u32> = operands.iter().map(|op| op.predecessor_block_id).collect();
    assert_eq!(preds, [0, body].into_iter().collect());
    assert!(f.verify().is_ok());
}

/// S6: label generator fed `"my-func!"` three times.
#[test]
fn s6_repeated_label_names_get_numeric_suffixes() {
    let mut gen = blend65c::codegen::labels::LabelGenerator::new();
    let a = gen.make_named(blend65c::codegen::labels::LabelCategory::Function, "my-func!");
    let b = gen.make_named(blend65c::codegen::labels::LabelCategory::Function, "my-func!");
    assert_eq!(a, "_my_func_");
    assert_eq!(b, "_my_func__1");
}
