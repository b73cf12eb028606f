//! Target architecture descriptors (spec.md §6.1, §6.3 `target` field).

/// Which 6502-family machine codegen is producing assembly for. Only `C64`
/// is implemented; the others are accepted by configuration parsing and
/// carried through unchanged (spec.md §4.13, §9 "open questions").
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TargetKind {
    C64,
    C128,
    X16,
}

/// The constants instruction selection and the globals allocator need for a
/// given machine: code start address, zero-page user range, and the
/// load address that triggers BASIC-stub emission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TargetDescriptor {
    pub name: &'static str,
    pub kind: TargetKind,
    /// Default code start address once past any BASIC stub.
    pub code_start: u16,
    /// Inclusive zero-page range available to user variables.
    pub zero_page_range: (u16, u16),
    /// The load address that implies a BASIC stub is appropriate.
    pub basic_start: u16,
    /// Fixed base address for the initialized data section. Kept separate
    /// from `code_start` rather than following the code so that data
    /// addresses don't depend on the eventual size of the generated code
    /// (no linker pass here to fix up symbolic references after the fact).
    pub data_start: u16,
    /// Fixed base address for uninitialized RAM-class globals. Placed well
    /// past `data_start` for the same reason: a generous, fixed gap stands
    /// in for a real linker's placement.
    pub ram_start: u16,
    /// Fixed base address for SSA phi out-of-SSA storage slots (one RAM
    /// byte/word per phi result, shared by its predecessors). Placed past
    /// `ram_start` for the same fixed-gap reason.
    pub phi_start: u16,
}

impl TargetDescriptor {
    /// The C64 reference target (spec.md §1, §3.4): zero page `0x0A..=0x8F`,
    /// BASIC start `0x0801`.
    pub fn c64() -> Self {
        TargetDescriptor {
            name: "c64",
            kind: TargetKind::C64,
            code_start: 0x080D,
            zero_page_range: (0x0A, 0x8F),
            basic_start: 0x0801,
            data_start: 0x1000,
            ram_start: 0x2000,
            phi_start: 0x3000,
        }
    }

    /// C128 shares the C64's BASIC/zero-page layout closely enough to reuse
    /// its descriptor; codegen does not yet special-case it (spec.md §6.3:
    /// "declared but not implemented").
    pub fn c128() -> Self {
        TargetDescriptor {
            name: "c128",
            ..Self::c64()
        }
    }

    /// Commander X16: distinct zero-page convention, same BASIC stub shape.
    pub fn x16() -> Self {
        TargetDescriptor {
            name: "x16",
            kind: TargetKind::X16,
            code_start: 0x080D,
            zero_page_range: (0x22, 0x7F),
            basic_start: 0x0801,
            data_start: 0x1000,
            ram_start: 0x2000,
            phi_start: 0x3000,
        }
    }

    pub fn for_kind(kind: TargetKind) -> Self {
        match kind {
            TargetKind::C64 => Self::c64(),
            TargetKind::C128 => Self::c128(),
            TargetKind::X16 => Self::x16(),
        }
    }

    pub fn zero_page_capacity(&self) -> u16 {
        self.zero_page_range.1 - self.zero_page_range.0 + 1
    }
}
