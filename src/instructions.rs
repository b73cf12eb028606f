//! IL instructions: a closed opcode set with per-opcode operand shape, plus
//! the `operands`/`used_registers`/`has_side_effects`/`is_terminator`
//! predicates every pass relies on.
//!
//! This is a hand-written tagged union rather than the table-generated
//! `InstructionData` cranelift-codegen builds from its `meta/` crate
//! (spec.md §9 calls for exactly this: "a tagged union whose operand shape is
//! known statically and whose common predicates are `match` expressions over
//! the variant").

use crate::value::{Register, Value};
use smallvec::{smallvec, SmallVec};
use std::fmt;

/// An instruction id, unique within its owning function.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstId(pub u32);

impl fmt::Display for InstId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// Source location attached to an instruction for diagnostics and the
/// optional source map (spec.md §4.8).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SourceSpan {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

/// A hint from the semantic analyzer about the preferred addressing mode for
/// this instruction's memory operand. Purely advisory: instruction selection
/// (§4.10) is always correct without it and uses it only to avoid redundant
/// loads.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AddressingHint {
    ZeroPage,
    Absolute,
    Immediate,
}

/// Metadata carried by every instruction: an optional source span and an
/// optional addressing-mode hint.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct InstMeta {
    pub span: Option<SourceSpan>,
    pub addressing_hint: Option<AddressingHint>,
}

/// A `(predecessor_block_id, source_register)` operand of a `PHI`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhiOperand {
    pub predecessor_block_id: u32,
    pub value: Value,
}

/// The canonical Blend65 IL opcode set (spec.md §3.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Opcode {
    /// `CONST imm -> r`
    Const { value: Value },
    /// `LOAD_VAR name -> r`
    LoadVar { name: String },
    /// `STORE_VAR name <- r`
    StoreVar { name: String, value: Value },
    /// `LOAD_ARRAY base[index] -> r`
    LoadArray { base: Value, index: Value },
    /// `STORE_ARRAY base[index] <- r`
    StoreArray {
        base: Value,
        index: Value,
        value: Value,
    },
    /// `LOAD_ADDR addr -> r`
    LoadAddr { address: Value },
    /// `STORE_ADDR addr <- r`
    StoreAddr { address: Value, value: Value },
    /// `HARDWARE_READ addr -> r`
    HardwareRead { address: u16 },
    /// `HARDWARE_WRITE addr, r`
    HardwareWrite { address: u16, value: Value },
    Add { lhs: Value, rhs: Value },
    Sub { lhs: Value, rhs: Value },
    Mul { lhs: Value, rhs: Value },
    Div { lhs: Value, rhs: Value },
    Mod { lhs: Value, rhs: Value },
    And { lhs: Value, rhs: Value },
    Or { lhs: Value, rhs: Value },
    Xor { lhs: Value, rhs: Value },
    Shl { lhs: Value, rhs: Value },
    Shr { lhs: Value, rhs: Value },
    Not { value: Value },
    Neg { value: Value },
    Eq { lhs: Value, rhs: Value },
    Ne { lhs: Value, rhs: Value },
    Lt { lhs: Value, rhs: Value },
    Le { lhs: Value, rhs: Value },
    Gt { lhs: Value, rhs: Value },
    Ge { lhs: Value, rhs: Value },
    /// `JUMP label`
    Jump { target: u32 },
    /// `BRANCH cond, then_label, else_label`
    Branch {
        condition: Value,
        then_block: u32,
        else_block: u32,
    },
    /// `RETURN r`
    Return { value: Value },
    /// `RETURN_VOID`
    ReturnVoid,
    /// `CALL callee(args...) -> r?`
    Call { callee: String, args: Vec<Value> },
    /// `INTRINSIC_CALL name(args...) -> r?`
    IntrinsicCall { name: String, args: Vec<Value> },
    /// SSA phi function: one operand per predecessor block.
    Phi {
        /// The base (pre-SSA) variable name this phi merges versions of.
        var: String,
        operands: Vec<PhiOperand>,
    },
}

/// An instruction: an opcode, an optional result register, an id, and
/// metadata. Invariant (spec.md §3.3): the result register of an instruction
/// is defined by that instruction and nowhere else; at most one terminator
/// per basic block and it is always last.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Instruction {
    pub id: InstId,
    pub opcode: Opcode,
    pub result: Option<Register>,
    pub meta: InstMeta,
}

impl Instruction {
    pub fn new(id: InstId, opcode: Opcode, result: Option<Register>) -> Self {
        Instruction {
            id,
            opcode,
            result,
            meta: InstMeta::default(),
        }
    }

    pub fn with_meta(mut self, meta: InstMeta) -> Self {
        self.meta = meta;
        self
    }

    /// The values this instruction reads (registers, constants, labels via
    /// branch targets are not included here since they're block ids, not
    /// `Value`s).
    pub fn operands(&self) -> SmallVec<[&Value; 4]> {
        use Opcode::*;
        match &self.opcode {
            Const { value } => smallvec![value],
            LoadVar { .. } => smallvec![],
            StoreVar { value, .. } => smallvec![value],
            LoadArray { base, index } => smallvec![base, index],
            StoreArray { base, index, value } => smallvec![base, index, value],
            LoadAddr { address } => smallvec![address],
            StoreAddr { address, value } => smallvec![address, value],
            HardwareRead { .. } => smallvec![],
            HardwareWrite { value, .. } => smallvec![value],
            Add { lhs, rhs }
            | Sub { lhs, rhs }
            | Mul { lhs, rhs }
            | Div { lhs, rhs }
            | Mod { lhs, rhs }
            | And { lhs, rhs }
            | Or { lhs, rhs }
            | Xor { lhs, rhs }
            | Shl { lhs, rhs }
            | Shr { lhs, rhs }
            | Eq { lhs, rhs }
            | Ne { lhs, rhs }
            | Lt { lhs, rhs }
            | Le { lhs, rhs }
            | Gt { lhs, rhs }
            | Ge { lhs, rhs } => smallvec![lhs, rhs],
            Not { value } | Neg { value } => smallvec![value],
            Jump { .. } => smallvec![],
            Branch { condition, .. } => smallvec![condition],
            Return { value } => smallvec![value],
            ReturnVoid => smallvec![],
            Call { args, .. } | IntrinsicCall { args, .. } => args.iter().collect(),
            Phi { operands, .. } => operands.iter().map(|op| &op.value).collect(),
        }
    }

    /// The subset of `operands()` that are virtual registers.
    pub fn used_registers(&self) -> SmallVec<[&Register; 4]> {
        self.operands()
            .into_iter()
            .filter_map(Value::as_register)
            .collect()
    }

    /// True for stores, hardware writes, calls, and returns: anything whose
    /// removal would be observable.
    pub fn has_side_effects(&self) -> bool {
        use Opcode::*;
        matches!(
            self.opcode,
            StoreVar { .. }
                | StoreArray { .. }
                | StoreAddr { .. }
                | HardwareWrite { .. }
                | Call { .. }
                | IntrinsicCall { .. }
                | Return { .. }
                | ReturnVoid
        )
    }

    /// True exactly for the control group: `JUMP`, `BRANCH`, `RETURN`,
    /// `RETURN_VOID`.
    pub fn is_terminator(&self) -> bool {
        matches!(
            self.opcode,
            Opcode::Jump { .. } | Opcode::Branch { .. } | Opcode::Return { .. } | Opcode::ReturnVoid
        )
    }

    /// True for `PHI`.
    pub fn is_phi(&self) -> bool {
        matches!(self.opcode, Opcode::Phi { .. })
    }

    /// If this is a phi, the variable it merges.
    pub fn phi_var(&self) -> Option<&str> {
        match &self.opcode {
            Opcode::Phi { var, .. } => Some(var),
            _ => None,
        }
    }

    /// Mnemonic name, used by the textual IL printer and diagnostics.
    pub fn mnemonic(&self) -> &'static str {
        use Opcode::*;
        match &self.opcode {
            Const { .. } => "CONST",
            LoadVar { .. } => "LOAD_VAR",
            StoreVar { .. } => "STORE_VAR",
            LoadArray { .. } => "LOAD_ARRAY",
            StoreArray { .. } => "STORE_ARRAY",
            LoadAddr { .. } => "LOAD_ADDR",
            StoreAddr { .. } => "STORE_ADDR",
            HardwareRead { .. } => "HARDWARE_READ",
            HardwareWrite { .. } => "HARDWARE_WRITE",
            Add { .. } => "ADD",
            Sub { .. } => "SUB",
            Mul { .. } => "MUL",
            Div { .. } => "DIV",
            Mod { .. } => "MOD",
            And { .. } => "AND",
            Or { .. } => "OR",
            Xor { .. } => "XOR",
            Shl { .. } => "SHL",
            Shr { .. } => "SHR",
            Not { .. } => "NOT",
            Neg { .. } => "NEG",
            Eq { .. } => "EQ",
            Ne { .. } => "NE",
            Lt { .. } => "LT",
            Le { .. } => "LE",
            Gt { .. } => "GT",
            Ge { .. } => "GE",
            Jump { .. } => "JUMP",
            Branch { .. } => "BRANCH",
            Return { .. } => "RETURN",
            ReturnVoid => "RETURN_VOID",
            Call { .. } => "CALL",
            IntrinsicCall { .. } => "INTRINSIC_CALL",
            Phi { .. } => "PHI",
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(result) = &self.result {
            write!(f, "{result} = ")?;
        }
        write!(f, "{}", self.mnemonic())
    }
}
