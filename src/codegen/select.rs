//! Instruction selection: lowers IL opcodes to 6502 assembly (spec.md
//! §4.10).
//!
//! Each handler loads operands via `tracking`, emits one or more assembly
//! instructions with correctly formatted operands, updates tracking for
//! the result, and increments the running code-size counter — the four
//! steps spec.md §4.10 requires of every opcode handler. Branch fusion
//! (folding a preceding comparison directly into its consuming `BRANCH`) is
//! deliberately not attempted: peephole-level fusion is out of scope
//! (spec.md §1).

use crate::codegen::context::CodegenContext;
use crate::codegen::tracking::{LoadOutcome, TrackedValue};
use crate::instructions::{Instruction, Opcode};
use crate::ir::{BasicBlock, BlockId, Function, Module};
use crate::value::Value;
use rustc_hash::FxHashMap;

/// Where each SSA phi result lives, and which predecessor blocks must
/// store their incoming value there before falling through to their
/// terminator — the classic "out of SSA" lowering: a phi becomes a shared
/// memory slot written by every predecessor (spec.md §4.4's phi output
/// consumed here as a codegen input).
#[derive(Default)]
pub struct PhiResolution {
    slot_of: FxHashMap<u32, u16>,
    pred_stores: FxHashMap<BlockId, Vec<(u16, Value)>>,
}

impl PhiResolution {
    pub fn slot_of(&self, reg_id: u32) -> Option<u16> {
        self.slot_of.get(&reg_id).copied()
    }

    pub fn pred_stores(&self, block: BlockId) -> &[(u16, Value)] {
        self.pred_stores.get(&block).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Walk every block of `func`, assigning a RAM slot to each phi result and
/// recording which predecessor must store which value into it.
pub fn resolve_phis(func: &Function, next_slot: &mut u16) -> PhiResolution {
    let mut resolution = PhiResolution::default();
    for block in func.blocks_in_order() {
        for inst in block.phis() {
            let Opcode::Phi { operands, .. } = &inst.opcode else {
                continue;
            };
            let Some(result) = &inst.result else { continue };
            let slot = *next_slot;
            *next_slot += result.ty.size_in_bytes().max(1) as u16;
            resolution.slot_of.insert(result.id.0, slot);
            for op in operands {
                resolution
                    .pred_stores
                    .entry(op.predecessor_block_id)
                    .or_default()
                    .push((slot, op.value.clone()));
            }
        }
    }
    resolution
}

/// Lower every instruction in `block`, including phi-slot fixups at entry
/// and predecessor store fixups just before the terminator.
pub fn lower_block(
    ctx: &mut CodegenContext,
    module: &Module,
    func: &Function,
    block: &BasicBlock,
    phi_res: &PhiResolution,
) {
    ctx.tracker.invalidate_registers();

    let label = ctx.block_label(&func.name, block);
    ctx.asm.label(label.clone());
    let addr = ctx.current_address();
    ctx.labels.update_address(&label, addr);

    for inst in block.phis() {
        if let Some(result) = &inst.result {
            if let Some(slot) = phi_res.slot_of(result.id.0) {
                ctx.tracker
                    .track(result.id.0, TrackedValue::Absolute(slot), result.ty.is_word_sized());
            }
        }
    }

    let body: Vec<&Instruction> = block.body().collect();
    let (non_terminator, terminator) = match body.split_last() {
        Some((last, rest)) if last.is_terminator() => (rest, Some(*last)),
        _ => (body.as_slice(), None),
    };

    for inst in non_terminator {
        select_instruction(ctx, module, func, inst);
    }

    for &(slot, ref value) in phi_res.pred_stores(block.id) {
        emit_store_to_slot(ctx, value, slot);
    }

    if let Some(inst) = terminator {
        select_instruction(ctx, module, func, inst);
    } else {
        ctx.warnings.push(format!(
            "block {} ({}) has no terminator; codegen emitted none",
            block.id, block.label_name
        ));
    }
}

fn emit_store_to_slot(ctx: &mut CodegenContext, value: &Value, slot: u16) {
    load_to_a(ctx, value);
    ctx.asm.instruction("STA", Some(format!("${slot:04X}")), None, 3);
    ctx.add_code_size(3);
}

/// Give a bare constant or label `Value` a tracked location under a
/// synthetic id before it is loaded; registers are always tracked already
/// by the instruction that defined them.
fn seed_tracking_for_value(ctx: &mut CodegenContext, value: &Value) {
    match value {
        Value::Constant(c) => {
            ctx.tracker.track(
                synthetic_id(value),
                TrackedValue::Immediate(c.value),
                c.ty.is_word_sized(),
            );
        }
        Value::Register(_) => {}
        Value::Label(l) => {
            ctx.tracker
                .track(synthetic_id(value), TrackedValue::Label(l.name.clone()), false);
        }
    }
}

/// A stable id for non-register values, distinct from every real register
/// id (which start at 0 and grow by function). Used only as a hash-map key
/// into `ValueTracker`, never rendered.
fn synthetic_id(value: &Value) -> u32 {
    match value {
        Value::Register(r) => r.id.0,
        Value::Constant(c) => u32::MAX - (c.value as u32 & 0xFFFF),
        Value::Label(l) => u32::MAX / 2 - l.block_id,
    }
}

fn emit_raw(ctx: &mut CodegenContext, line: &str, size: u32) {
    let mut parts = line.splitn(2, ' ');
    let mnemonic = parts.next().unwrap_or(line).to_string();
    let operand = parts.next().map(|s| s.to_string());
    ctx.asm.instruction(mnemonic, operand, None, size);
    ctx.add_code_size(size);
}

fn seed(ctx: &mut CodegenContext, value: &Value) -> u32 {
    let id = synthetic_id(value);
    if ctx.tracker.location_of(id).is_none() {
        seed_tracking_for_value(ctx, value);
    }
    id
}

fn load_to_a(ctx: &mut CodegenContext, value: &Value) {
    let id = seed(ctx, value);
    match ctx.tracker.load_to_a(id) {
        LoadOutcome::Emitted(text) => emit_raw(ctx, &text, operand_size(value)),
        LoadOutcome::Unknown => {
            ctx.warnings.push(format!("could not load {value} into A: unknown location"));
        }
    }
}

fn operand_size(value: &Value) -> u32 {
    if value.ty().is_word_sized() {
        3
    } else {
        2
    }
}

fn operand_text(ctx: &mut CodegenContext, value: &Value) -> String {
    let id = seed(ctx, value);
    ctx.tracker.format_operand(id, &mut ctx.warnings)
}

fn global_location(ctx: &CodegenContext, name: &str) -> Option<TrackedValue> {
    ctx.globals.address_of(name).map(|addr| {
        if addr.is_zero_page {
            TrackedValue::ZeroPage(addr.address)
        } else {
            TrackedValue::Absolute(addr.address)
        }
    })
}

fn select_instruction(ctx: &mut CodegenContext, module: &Module, func: &Function, inst: &Instruction) {
    let pc = ctx.current_address();
    ctx.source_map.record(pc, inst.meta.span.as_ref());
    if ctx.inline_debug_enabled() {
        if let Some(span) = &inst.meta.span {
            ctx.asm.comment(format!("{}:{}:{}", span.file, span.line, span.column));
        }
    }

    match &inst.opcode {
        Opcode::Const { value } => {
            let result = inst.result.as_ref().expect("CONST always has a result");
            let id = result.id.0;
            match value {
                Value::Constant(c) => {
                    ctx.tracker
                        .track(id, TrackedValue::Immediate(c.value), c.ty.is_word_sized());
                }
                other => {
                    let vid = seed(ctx, other);
                    if let Some(loc) = ctx.tracker.location_of(vid).cloned() {
                        ctx.tracker.track(id, loc, other.ty().is_word_sized());
                    }
                }
            }
        }

        Opcode::LoadVar { name } => {
            let result = inst.result.as_ref().expect("LOAD_VAR always has a result");
            match global_location(ctx, name) {
                Some(loc) => {
                    let text = match &loc {
                        TrackedValue::ZeroPage(a) => format!("LDA ${a:02X}"),
                        TrackedValue::Absolute(a) => format!("LDA ${a:04X}"),
                        _ => unreachable!(),
                    };
                    let size = if matches!(loc, TrackedValue::ZeroPage(_)) { 2 } else { 3 };
                    emit_raw(ctx, &text, size);
                    ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
                }
                None => {
                    ctx.warnings.push(format!("LOAD_VAR `{name}`: no storage location known"));
                }
            }
        }

        Opcode::StoreVar { name, value } => {
            load_to_a(ctx, value);
            match global_location(ctx, name) {
                Some(TrackedValue::ZeroPage(addr)) => {
                    emit_raw(ctx, &format!("STA ${addr:02X}"), 2);
                }
                Some(TrackedValue::Absolute(addr)) => {
                    emit_raw(ctx, &format!("STA ${addr:04X}"), 3);
                }
                _ => {
                    ctx.warnings.push(format!("STORE_VAR `{name}`: no storage location known"));
                }
            }
        }

        Opcode::LoadArray { base, index } => {
            let result = inst.result.as_ref().expect("LOAD_ARRAY always has a result");
            let base_text = operand_text(ctx, base);
            load_index_to_y(ctx, index);
            emit_raw(ctx, &format!("LDA {base_text},Y"), 3);
            ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
        }

        Opcode::StoreArray { base, index, value } => {
            let base_text = operand_text(ctx, base);
            load_index_to_y(ctx, index);
            load_to_a(ctx, value);
            emit_raw(ctx, &format!("STA {base_text},Y"), 3);
        }

        Opcode::LoadAddr { address } => {
            let result = inst.result.as_ref().expect("LOAD_ADDR always has a result");
            let text = operand_text(ctx, address);
            emit_raw(ctx, &format!("LDA {text}"), 3);
            ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
        }

        Opcode::StoreAddr { address, value } => {
            let text = operand_text(ctx, address);
            load_to_a(ctx, value);
            emit_raw(ctx, &format!("STA {text}"), 3);
        }

        Opcode::HardwareRead { address } => {
            let result = inst.result.as_ref().expect("HARDWARE_READ always has a result");
            emit_raw(ctx, &format!("LDA ${address:04X}"), 3);
            ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
        }

        Opcode::HardwareWrite { address, value } => {
            load_to_a(ctx, value);
            emit_raw(ctx, &format!("STA ${address:04X}"), 3);
        }

        Opcode::Add { lhs, rhs } => binary_carry_op(ctx, inst, lhs, rhs, "CLC", "ADC"),
        Opcode::Sub { lhs, rhs } => binary_carry_op(ctx, inst, lhs, rhs, "SEC", "SBC"),
        Opcode::And { lhs, rhs } => binary_bitwise_op(ctx, inst, lhs, rhs, "AND"),
        Opcode::Or { lhs, rhs } => binary_bitwise_op(ctx, inst, lhs, rhs, "ORA"),
        Opcode::Xor { lhs, rhs } => binary_bitwise_op(ctx, inst, lhs, rhs, "EOR"),

        Opcode::Mul { lhs, rhs } => intrinsic_binary(ctx, module, inst, "__mul", lhs, rhs),
        Opcode::Div { lhs, rhs } => intrinsic_binary(ctx, module, inst, "__div", lhs, rhs),
        Opcode::Mod { lhs, rhs } => intrinsic_binary(ctx, module, inst, "__mod", lhs, rhs),

        Opcode::Shl { lhs, rhs } => shift_op(ctx, inst, lhs, rhs, "ASL", "__shl"),
        Opcode::Shr { lhs, rhs } => shift_op(ctx, inst, lhs, rhs, "LSR", "__shr"),

        Opcode::Not { value } => {
            let result = inst.result.as_ref().expect("NOT always has a result");
            warn_if_word(ctx, value, "NOT");
            load_to_a(ctx, value);
            emit_raw(ctx, "EOR #$FF", 2);
            ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
        }

        Opcode::Neg { value } => {
            let result = inst.result.as_ref().expect("NEG always has a result");
            warn_if_word(ctx, value, "NEG");
            load_to_a(ctx, value);
            emit_raw(ctx, "EOR #$FF", 2);
            emit_raw(ctx, "CLC", 1);
            emit_raw(ctx, "ADC #$01", 2);
            ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
        }

        Opcode::Eq { lhs, rhs } => compare_op(ctx, inst, lhs, rhs, "BEQ"),
        Opcode::Ne { lhs, rhs } => compare_op(ctx, inst, lhs, rhs, "BNE"),
        Opcode::Lt { lhs, rhs } => compare_op(ctx, inst, lhs, rhs, "BCC"),
        Opcode::Ge { lhs, rhs } => compare_op(ctx, inst, lhs, rhs, "BCS"),
        Opcode::Le { lhs, rhs } => {
            // a <= b  <=>  !(a > b); reuse the BCS/BCC machinery by swapping
            // operands (a <= b  <=>  b >= a).
            compare_op(ctx, inst, rhs, lhs, "BCS")
        }
        Opcode::Gt { lhs, rhs } => compare_op(ctx, inst, rhs, lhs, "BCC"),

        Opcode::Jump { target } => {
            let label = block_label(func, ctx, *target);
            emit_raw(ctx, &format!("JMP {label}"), 3);
        }

        Opcode::Branch {
            condition,
            then_block,
            else_block,
        } => {
            load_to_a(ctx, condition);
            emit_raw(ctx, "CMP #$00", 2);
            let then_label = block_label(func, ctx, *then_block);
            let else_label = block_label(func, ctx, *else_block);
            emit_raw(ctx, &format!("BNE {then_label}"), 2);
            emit_raw(ctx, &format!("JMP {else_label}"), 3);
        }

        Opcode::Return { value } => {
            load_to_a(ctx, value);
            emit_raw(ctx, "RTS", 1);
        }

        Opcode::ReturnVoid => {
            emit_raw(ctx, "RTS", 1);
        }

        Opcode::Call { callee, args } => {
            emit_call(ctx, callee, args, inst);
        }

        Opcode::IntrinsicCall { name, args } => {
            if module.intrinsic(name).is_none() {
                ctx.warnings.push(format!("intrinsic `{name}` is not registered"));
            }
            emit_call(ctx, name, args, inst);
        }

        Opcode::Phi { .. } => {
            // Resolved before regular instructions run; nothing to lower here.
        }
    }
}

fn block_label(func: &Function, ctx: &mut CodegenContext, target: BlockId) -> String {
    ctx.block_label(&func.name, func.block(target))
}

fn load_index_to_y(ctx: &mut CodegenContext, index: &Value) {
    let id = seed(ctx, index);
    match ctx.tracker.load_to_y(id) {
        LoadOutcome::Emitted(text) => emit_raw(ctx, &text, operand_size(index)),
        LoadOutcome::Unknown => ctx.warnings.push("array index: unknown value location".to_string()),
    }
}

/// Flag a word-sized operand passing through a byte-only Tier-1 sequence:
/// the lowering table (spec.md §4.10) defines `ADD`/`SUB`/etc. "(both ≤
/// byte)" only; a word-sized operand here silently loses its high byte
/// unless this warning fires.
fn warn_if_word(ctx: &mut CodegenContext, value: &Value, op: &str) {
    let id = seed(ctx, value);
    if ctx.tracker.is_word(id) {
        ctx.warnings.push(format!(
            "{op}: word-sized operand lowered through the byte-only Tier-1 sequence; high byte is not computed"
        ));
    }
}

fn binary_carry_op(
    ctx: &mut CodegenContext,
    inst: &Instruction,
    lhs: &Value,
    rhs: &Value,
    flag_op: &str,
    arith_op: &str,
) {
    let result = inst.result.as_ref().expect("arithmetic op always has a result");
    warn_if_word(ctx, lhs, arith_op);
    warn_if_word(ctx, rhs, arith_op);
    load_to_a(ctx, lhs);
    emit_raw(ctx, flag_op, 1);
    let rhs_text = operand_text(ctx, rhs);
    emit_raw(ctx, &format!("{arith_op} {rhs_text}"), 2);
    ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
}

fn binary_bitwise_op(ctx: &mut CodegenContext, inst: &Instruction, lhs: &Value, rhs: &Value, op: &str) {
    let result = inst.result.as_ref().expect("bitwise op always has a result");
    warn_if_word(ctx, lhs, op);
    warn_if_word(ctx, rhs, op);
    load_to_a(ctx, lhs);
    let rhs_text = operand_text(ctx, rhs);
    emit_raw(ctx, &format!("{op} {rhs_text}"), 2);
    ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
}

fn shift_op(ctx: &mut CodegenContext, inst: &Instruction, lhs: &Value, rhs: &Value, single_bit_op: &str, intrinsic: &str) {
    let result = inst.result.as_ref().expect("shift op always has a result");
    if let Value::Constant(c) = rhs {
        if c.value == 1 {
            warn_if_word(ctx, lhs, single_bit_op);
            load_to_a(ctx, lhs);
            emit_raw(ctx, single_bit_op, 1);
            ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
            return;
        }
    }
    emit_call(ctx, intrinsic, &[lhs.clone(), rhs.clone()], inst);
}

/// `Mul`/`Div`/`Mod` have no hardware support on the 6502; every use lowers
/// to a call into a runtime intrinsic of the same calling convention as a
/// user function call (spec.md §4.10: "other arithmetic opcodes follow the
/// same pattern").
fn intrinsic_binary(ctx: &mut CodegenContext, module: &Module, inst: &Instruction, name: &str, lhs: &Value, rhs: &Value) {
    if module.intrinsic(name).is_none() {
        ctx.warnings.push(format!("intrinsic `{name}` is not registered"));
    }
    emit_call(ctx, name, &[lhs.clone(), rhs.clone()], inst);
}

/// Compare `lhs` and `rhs`, producing 0/1 in the accumulator. `true_branch`
/// names the 6502 branch mnemonic that is taken when the comparison holds
/// (e.g. `BEQ` for `==`, `BCC` for unsigned `<`).
fn compare_op(ctx: &mut CodegenContext, inst: &Instruction, lhs: &Value, rhs: &Value, true_branch: &str) {
    let result = inst.result.as_ref().expect("comparison always has a result");
    warn_if_word(ctx, lhs, "compare");
    warn_if_word(ctx, rhs, "compare");
    load_to_a(ctx, lhs);
    let rhs_text = operand_text(ctx, rhs);
    emit_raw(ctx, &format!("CMP {rhs_text}"), 2);
    let true_label = ctx.labels.make_temp(Some("cmp_true"));
    let done_label = ctx.labels.make_temp(Some("cmp_done"));
    emit_raw(ctx, &format!("{true_branch} {true_label}"), 2);
    emit_raw(ctx, "LDA #$00", 2);
    emit_raw(ctx, &format!("JMP {done_label}"), 3);
    ctx.asm.label(true_label);
    emit_raw(ctx, "LDA #$01", 2);
    ctx.asm.label(done_label);
    ctx.tracker.track(result.id.0, TrackedValue::Accumulator, false);
}

/// Reference calling convention (spec.md §4.10): the first byte/word
/// parameter in A/X, remaining parameters in zero-page argument slots;
/// `JSR` to the callee; invalidate all tracking afterward.
fn emit_call(ctx: &mut CodegenContext, callee: &str, args: &[Value], inst: &Instruction) {
    ctx.reset_call_arg_slots();
    for (i, arg) in args.iter().enumerate() {
        match i {
            0 => load_to_a(ctx, arg),
            1 => {
                let id = seed(ctx, arg);
                match ctx.tracker.load_to_x(id) {
                    LoadOutcome::Emitted(text) => emit_raw(ctx, &text, operand_size(arg)),
                    LoadOutcome::Unknown => ctx.warnings.push("call argument: unknown value location".to_string()),
                }
            }
            _ => {
                let slot = ctx.allocate_call_arg_slot();
                load_to_a(ctx, arg);
                emit_raw(ctx, &format!("STA ${slot:02X}"), 2);
            }
        }
    }
    let label = ctx.function_label(callee);
    emit_raw(ctx, &format!("JSR {label}"), 3);
    ctx.tracker.invalidate_registers();
    if let Some(result) = &inst.result {
        ctx.tracker.track(result.id.0, TrackedValue::Accumulator, result.ty.is_word_sized());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::context::{CodegenOptions, OutputFormat, DebugMode};
    use crate::codegen::target::TargetDescriptor;
    use crate::ir::function::StorageClass as FnStorageClass;
    use crate::ir::Global;
    use crate::instructions::InstId;
    use crate::types::Type;
    use crate::value::Constant;

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

    /// spec.md §8, scenario S1.
    #[test]
    fn hardware_write_of_a_constant_emits_lda_then_sta() {
        let mut module = Module::new("demo.b65");
        module.add_global(Global {
            name: "borderColor".to_string(),
            ty: Type::Byte,
            storage: FnStorageClass::Map(0xD020),
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

        let mut ctx = CodegenContext::new(options());
        ctx.globals.allocate_all(&module.globals, &ctx.options.target.clone());
        let phi_res = PhiResolution::default();
        let func = module.find_function("main").unwrap();
        lower_block(&mut ctx, &module, func, func.block(0), &phi_res);

        let text = crate::codegen::asm::emit_acme(&ctx.asm);
        assert!(text.contains("LDA #$01"));
        assert!(text.contains("STA $D020"));
        assert!(text.contains("RTS"));
    }
}
