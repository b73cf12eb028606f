//! Value-location tracking: where each live IL register currently resides
//! in the 6502's tiny register file (spec.md §4.5).
//!
//! Grounded on `cranelift-codegen`'s `ir::valueloc::ValueLoc` — a small
//! `Copy` enum keyed by register id, with `unwrap_*`-style accessors — but
//! closed over the 6502's concrete locations instead of an abstract
//! `RegUnit`/`StackSlot` pair, since there's no register allocator here:
//! instruction selection assigns locations directly.

use rustc_hash::FxHashMap;
use std::fmt;

/// Where a live value currently resides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackedValue {
    /// A compile-time-known constant (never spilled; reloading is free).
    Immediate(i64),
    Accumulator,
    XRegister,
    YRegister,
    ZeroPage(u16),
    Absolute(u16),
    /// Known to be on the evaluation stack; no direct operand form exists.
    Stack,
    /// An assembly label (a function, global, or block address).
    Label(String),
}

/// The result of attempting to materialize a tracked value into a specific
/// CPU register: either the emitted instruction text, or a note that the
/// value's location is unknown (spec.md §4.5: "return success or 'unknown
/// value' (with a warning)").
pub enum LoadOutcome {
    Emitted(String),
    Unknown,
}

/// Per-function value-location table plus the word-ness of each tracked
/// register (spec.md §4.5: "`is_word` flag for 16-bit values").
#[derive(Default)]
pub struct ValueTracker {
    locations: FxHashMap<u32, TrackedValue>,
    is_word: FxHashMap<u32, bool>,
}

impl ValueTracker {
    pub fn new() -> Self {
        ValueTracker::default()
    }

    /// Record `loc` as where register `id` now lives, overwriting any prior
    /// tracking.
    pub fn track(&mut self, id: u32, loc: TrackedValue, is_word: bool) {
        self.locations.insert(id, loc);
        self.is_word.insert(id, is_word);
    }

    pub fn location_of(&self, id: u32) -> Option<&TrackedValue> {
        self.locations.get(&id)
    }

    pub fn is_word(&self, id: u32) -> bool {
        self.is_word.get(&id).copied().unwrap_or(false)
    }

    /// Move the tracked value for `id` into the accumulator, emitting the
    /// cheapest sequence (spec.md §4.5). Updates tracking to reflect the
    /// new location (`Accumulator`) when it emits a load.
    pub fn load_to_a(&mut self, id: u32) -> LoadOutcome {
        self.load_to(id, TargetReg::A)
    }

    pub fn load_to_x(&mut self, id: u32) -> LoadOutcome {
        self.load_to(id, TargetReg::X)
    }

    pub fn load_to_y(&mut self, id: u32) -> LoadOutcome {
        self.load_to(id, TargetReg::Y)
    }

    fn load_to(&mut self, id: u32, target: TargetReg) -> LoadOutcome {
        let Some(loc) = self.locations.get(&id).cloned() else {
            return LoadOutcome::Unknown;
        };
        let mnemonic = target.load_mnemonic();
        let text = match (&loc, target.tracked_self()) {
            (l, t) if *l == t => format!("; {} already in {}", id_comment(id), target.name()),
            (TrackedValue::Immediate(v), _) => format!("{mnemonic} #${:02X}", v & 0xFF),
            (TrackedValue::ZeroPage(addr), _) => format!("{mnemonic} ${addr:02X}"),
            (TrackedValue::Absolute(addr), _) => format!("{mnemonic} ${addr:04X}"),
            (TrackedValue::Label(name), _) => format!("{mnemonic} {name}"),
            (TrackedValue::Accumulator, TargetReg::X) => "TAX".to_string(),
            (TrackedValue::Accumulator, TargetReg::Y) => "TAY".to_string(),
            (TrackedValue::XRegister, TargetReg::A) => "TXA".to_string(),
            (TrackedValue::YRegister, TargetReg::A) => "TYA".to_string(),
            (TrackedValue::XRegister, TargetReg::Y) | (TrackedValue::YRegister, TargetReg::X) => {
                // No direct X<->Y transfer on 6502; bounce through A.
                format!("TXA / TAY ; cross {}->{}", id_comment(id), target.name())
            }
            (TrackedValue::Stack, _) => return LoadOutcome::Unknown,
        };
        self.locations.insert(id, target.tracked_self());
        LoadOutcome::Emitted(text)
    }

    /// The textual operand for `id` when the instruction itself can address
    /// the value in place (zero page, absolute, immediate, or label).
    /// Falls back to a warning and a placeholder immediate for register-only
    /// locations, which instruction selection should never actually emit
    /// (spec.md §4.5: "using them is a bug in upstream instruction
    /// selection").
    pub fn format_operand(&self, id: u32, warnings: &mut Vec<String>) -> String {
        match self.locations.get(&id) {
            Some(TrackedValue::Immediate(v)) => format!("#${:02X}", v & 0xFF),
            Some(TrackedValue::ZeroPage(addr)) => format!("${addr:02X}"),
            Some(TrackedValue::Absolute(addr)) => format!("${addr:04X}"),
            Some(TrackedValue::Label(name)) => name.clone(),
            other => {
                warnings.push(format!(
                    "{}: value has no in-place operand form ({:?}); upstream selection bug",
                    id_comment(id),
                    other
                ));
                "#$00".to_string()
            }
        }
    }

    /// Drop register-resident tracking for every value (after a call or any
    /// side effect that clobbers the CPU registers).
    pub fn invalidate_registers(&mut self) {
        self.locations.retain(|_, loc| {
            !matches!(
                loc,
                TrackedValue::Accumulator | TrackedValue::XRegister | TrackedValue::YRegister
            )
        });
    }

    pub fn invalidate_accumulator(&mut self) {
        self.locations
            .retain(|_, loc| !matches!(loc, TrackedValue::Accumulator));
    }

    /// Reset all tracking (spec.md §4.11, re-entrancy).
    pub fn reset(&mut self) {
        self.locations.clear();
        self.is_word.clear();
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum TargetReg {
    A,
    X,
    Y,
}

impl TargetReg {
    fn load_mnemonic(self) -> &'static str {
        match self {
            TargetReg::A => "LDA",
            TargetReg::X => "LDX",
            TargetReg::Y => "LDY",
        }
    }

    fn tracked_self(self) -> TrackedValue {
        match self {
            TargetReg::A => TrackedValue::Accumulator,
            TargetReg::X => TrackedValue::XRegister,
            TargetReg::Y => TrackedValue::YRegister,
        }
    }

    fn name(self) -> &'static str {
        match self {
            TargetReg::A => "A",
            TargetReg::X => "X",
            TargetReg::Y => "Y",
        }
    }
}

fn id_comment(id: u32) -> String {
    format!("v{id}")
}

impl fmt::Display for TrackedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackedValue::Immediate(v) => write!(f, "#{v}"),
            TrackedValue::Accumulator => write!(f, "A"),
            TrackedValue::XRegister => write!(f, "X"),
            TrackedValue::YRegister => write!(f, "Y"),
            TrackedValue::ZeroPage(a) => write!(f, "zp:${a:02X}"),
            TrackedValue::Absolute(a) => write!(f, "abs:${a:04X}"),
            TrackedValue::Stack => write!(f, "stack"),
            TrackedValue::Label(l) => write!(f, "{l}"),
        }
    }
}
