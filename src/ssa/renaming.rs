//! SSA renaming: the classic Cytron et al. dominator-tree walk that gives
//! every definition a unique version and fills in phi operands (spec.md
//! §4.4).

use crate::instructions::{InstId, Instruction, Opcode, PhiOperand};
use crate::ir::function::Function;
use crate::ir::BlockId;
use crate::ssa::dominator_tree::DominatorTree;
use crate::ssa::phi_placement::PhiPlacement;
use crate::value::Value;
use rustc_hash::{FxHashMap, FxHashSet};

/// Statistics and renamed-phi records produced by a renaming run (spec.md
/// §4.4, "Output").
#[derive(Debug, Default)]
pub struct RenamingResult {
    pub blocks_processed: usize,
    pub phis_processed: usize,
    pub variables_renamed: usize,
    pub versions_created: usize,
    /// Non-fatal: a variable was read before any dominating write
    /// (spec.md §7, "the renamer continues after a missing definition by
    /// treating the read as undefined-before-definition").
    pub warnings: Vec<String>,
}

/// Rename `func` in place: eliminate `LOAD_VAR`/`STORE_VAR` for every
/// variable in `promotable`, replacing reads with the dominating SSA value
/// and filling phi operands. Variables not in `promotable` (globals,
/// memory-mapped locations) are left untouched for the code generator to
/// lower as real memory accesses.
pub fn rename(
    func: &mut Function,
    domtree: &DominatorTree,
    placement: &PhiPlacement,
    promotable: &FxHashSet<String>,
) -> RenamingResult {
    let mut result = RenamingResult::default();

    // Insert phi instructions at every site `placement` computed, one per
    // (block, variable), in deterministic (variable-name, then block-id)
    // order so that identical inputs produce identical instruction ids.
    for var in placement.variables() {
        if !promotable.contains(var) {
            continue;
        }
        for &block_id in placement.sites_for(var) {
            let inst_id = func.values.make_inst_id();
            let phi = Instruction::new(
                inst_id,
                Opcode::Phi {
                    var: var.clone(),
                    operands: Vec::new(),
                },
                None,
            );
            func.block_mut(block_id).insert_phi(phi);
        }
    }

    let mut stacks: FxHashMap<String, Vec<Value>> = FxHashMap::default();
    for var in promotable {
        stacks.insert(var.clone(), Vec::new());
    }

    // alias maps an eliminated LOAD_VAR's original result register id to
    // the SSA value it actually denotes.
    let mut alias: FxHashMap<u32, Value> = FxHashMap::default();

    walk(
        func.entry_block(),
        func,
        domtree,
        promotable,
        &mut stacks,
        &mut alias,
        &mut result,
    );

    // Remove the now-redundant LOAD_VAR/STORE_VAR instructions for
    // promoted variables, and apply the alias substitution to every
    // remaining operand.
    for block in func.blocks.iter_mut() {
        let mut kept = Vec::with_capacity(block.instructions.len());
        for mut inst in std::mem::take(&mut block.instructions) {
            let remove = match &inst.opcode {
                Opcode::LoadVar { name } => promotable.contains(name),
                Opcode::StoreVar { name, .. } => promotable.contains(name),
                _ => false,
            };
            if remove {
                continue;
            }
            substitute_operands(&mut inst, &alias);
            kept.push(inst);
        }
        block.instructions = kept;
    }

    result
}

#[allow(clippy::too_many_arguments)]
fn walk(
    block_id: BlockId,
    func: &mut Function,
    domtree: &DominatorTree,
    promotable: &FxHashSet<String>,
    stacks: &mut FxHashMap<String, Vec<Value>>,
    alias: &mut FxHashMap<u32, Value>,
    result: &mut RenamingResult,
) {
    result.blocks_processed += 1;
    let mut pushed: FxHashMap<String, usize> = FxHashMap::default();

    // 1. Phis: allocate a fresh SSA version for each phi's result.
    let phi_ids: Vec<InstId> = func
        .block(block_id)
        .phis()
        .map(|i| i.id)
        .collect();
    for inst_id in phi_ids {
        let var = {
            let inst = find_inst(func, block_id, inst_id);
            inst.phi_var().unwrap().to_string()
        };
        let ty = func
            .locals
            .get(&var)
            .map(|l| l.ty.clone())
            .unwrap_or(crate::types::Type::Byte);
        let reg = func.values.make_named_register(ty, var.clone());
        result.versions_created += 1;
        result.phis_processed += 1;
        *pushed.entry(var.clone()).or_insert(0) += 1;
        stacks.get_mut(&var).unwrap().push(Value::Register(reg.clone()));
        let inst = find_inst_mut(func, block_id, inst_id);
        inst.result = Some(reg);
    }

    // 2. Ordinary instructions: resolve operands through the alias map,
    //    then update stacks for LOAD_VAR/STORE_VAR on promoted variables.
    let body_ids: Vec<InstId> = func
        .block(block_id)
        .body()
        .map(|i| i.id)
        .collect();
    for inst_id in body_ids {
        let inst = find_inst_mut(func, block_id, inst_id);
        substitute_operands(inst, alias);

        match &inst.opcode {
            Opcode::LoadVar { name } if promotable.contains(name) => {
                let name = name.clone();
                let result_reg = inst.result.clone();
                let current = stacks
                    .get(&name)
                    .and_then(|s| s.last().cloned());
                let value = match current {
                    Some(v) => v,
                    None => {
                        result.warnings.push(format!(
                            "variable `{name}` read in block {block_id} before any dominating write"
                        ));
                        Value::Constant(crate::value::Constant::new(
                            0,
                            func.locals
                                .get(&name)
                                .map(|l| l.ty.clone())
                                .unwrap_or(crate::types::Type::Byte),
                        ))
                    }
                };
                if let Some(r) = result_reg {
                    alias.insert(r.id.0, value);
                }
                result.variables_renamed += 1;
            }
            Opcode::StoreVar { name, value } if promotable.contains(name) => {
                let name = name.clone();
                let value = value.clone();
                *pushed.entry(name.clone()).or_insert(0) += 1;
                stacks.get_mut(&name).unwrap().push(value);
                result.variables_renamed += 1;
            }
            _ => {}
        }
    }

    // 3. Fill phi operands in every successor.
    let successors: Vec<BlockId> = func.block(block_id).successors().to_vec();
    for succ in successors {
        let phi_ids: Vec<InstId> = func.block(succ).phis().map(|i| i.id).collect();
        for inst_id in phi_ids {
            let var = {
                let inst = find_inst(func, succ, inst_id);
                inst.phi_var().unwrap().to_string()
            };
            let current = stacks.get(&var).and_then(|s| s.last().cloned());
            if let Some(value) = current {
                let inst = find_inst_mut(func, succ, inst_id);
                if let Opcode::Phi { operands, .. } = &mut inst.opcode {
                    operands.push(PhiOperand {
                        predecessor_block_id: block_id,
                        value,
                    });
                }
            }
        }
    }

    // 4. Recurse into dominator-tree children in ascending block-id order.
    let mut children = domtree.immediately_dominated_by(block_id).to_vec();
    children.sort_unstable();
    for child in children {
        walk(child, func, domtree, promotable, stacks, alias, result);
    }

    // 5. Pop versions pushed while processing this block.
    for (var, count) in pushed {
        let stack = stacks.get_mut(&var).unwrap();
        for _ in 0..count {
            stack.pop();
        }
    }
}

fn find_inst(func: &Function, block_id: BlockId, inst_id: InstId) -> &Instruction {
    func.block(block_id)
        .instructions
        .iter()
        .find(|i| i.id == inst_id)
        .expect("instruction id must exist in its recorded block")
}

fn find_inst_mut(func: &mut Function, block_id: BlockId, inst_id: InstId) -> &mut Instruction {
    func.block_mut(block_id)
        .instructions
        .iter_mut()
        .find(|i| i.id == inst_id)
        .expect("instruction id must exist in its recorded block")
}

fn substitute_operands(inst: &mut Instruction, alias: &FxHashMap<u32, Value>) {
    let resolve = |v: &mut Value| {
        if let Value::Register(r) = v {
            if let Some(replacement) = alias.get(&r.id.0) {
                *v = replacement.clone();
            }
        }
    };
    match &mut inst.opcode {
        Opcode::Const { value } => resolve(value),
        Opcode::StoreVar { value, .. } => resolve(value),
        Opcode::LoadArray { base, index } => {
            resolve(base);
            resolve(index);
        }
        Opcode::StoreArray { base, index, value } => {
            resolve(base);
            resolve(index);
            resolve(value);
        }
        Opcode::LoadAddr { address } => resolve(address),
        Opcode::StoreAddr { address, value } => {
            resolve(address);
            resolve(value);
        }
        Opcode::HardwareWrite { value, .. } => resolve(value),
        Opcode::Add { lhs, rhs }
        | Opcode::Sub { lhs, rhs }
        | Opcode::Mul { lhs, rhs }
        | Opcode::Div { lhs, rhs }
        | Opcode::Mod { lhs, rhs }
        | Opcode::And { lhs, rhs }
        | Opcode::Or { lhs, rhs }
        | Opcode::Xor { lhs, rhs }
        | Opcode::Shl { lhs, rhs }
        | Opcode::Shr { lhs, rhs }
        | Opcode::Eq { lhs, rhs }
        | Opcode::Ne { lhs, rhs }
        | Opcode::Lt { lhs, rhs }
        | Opcode::Le { lhs, rhs }
        | Opcode::Gt { lhs, rhs }
        | Opcode::Ge { lhs, rhs } => {
            resolve(lhs);
            resolve(rhs);
        }
        Opcode::Not { value } | Opcode::Neg { value } => resolve(value),
        Opcode::Branch { condition, .. } => resolve(condition),
        Opcode::Return { value } => resolve(value),
        Opcode::Call { args, .. } | Opcode::IntrinsicCall { args, .. } => {
            for a in args.iter_mut() {
                resolve(a);
            }
        }
        Opcode::Phi { operands, .. } => {
            for op in operands.iter_mut() {
                resolve(&mut op.value);
            }
        }
        Opcode::LoadVar { .. }
        | Opcode::HardwareRead { .. }
        | Opcode::Jump { .. }
        | Opcode::ReturnVoid => {}
    }
}
