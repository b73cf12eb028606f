//! Backend-independent assembly IR, and the ACME-dialect textual emitter
//! (spec.md §4.9).
//!
//! Grounded on `cranelift-codegen`'s `binemit` module: codegen appends
//! items sequentially to a sink-like buffer (`AssemblyModule`) exactly the
//! way `emit_function` drives a `CodeSink`, except the "bytes" here are
//! textual assembly items rather than raw machine code, since the actual
//! encoding is deferred to the external macro assembler (spec.md §9:
//! "isolate it behind an interface").

use std::fmt::Write as _;

/// A data/reservation directive.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Directive {
    /// `* = $addr`
    SetOrigin(u16),
    /// `!byte $xx, $xx, ...`
    Byte(Vec<u8>),
    /// `!word $xxxx, ...`
    Word(Vec<u16>),
    /// `!fill count, value`
    Fill { count: u32, value: u8 },
    /// Reserve `count` bytes of uninitialized storage.
    Reserve { count: u32 },
}

/// One item in the assembly module, in emission order.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AsmItem {
    Comment(String),
    /// A section-divider comment (spec.md §4.11: "Section boundaries are
    /// emitted as comment dividers").
    SectionDivider(String),
    Label(String),
    Directive(Directive),
    Instruction {
        mnemonic: String,
        operand: Option<String>,
        comment: Option<String>,
        size_in_bytes: u32,
    },
}

/// A backend-independent, append-only assembly module.
#[derive(Default, Clone, Debug)]
pub struct AssemblyModule {
    items: Vec<AsmItem>,
}

impl AssemblyModule {
    pub fn new() -> Self {
        AssemblyModule::default()
    }

    pub fn reset(&mut self) {
        self.items.clear();
    }

    pub fn comment(&mut self, text: impl Into<String>) {
        self.items.push(AsmItem::Comment(text.into()));
    }

    pub fn section(&mut self, title: impl Into<String>) {
        self.items.push(AsmItem::SectionDivider(title.into()));
    }

    pub fn label(&mut self, name: impl Into<String>) {
        self.items.push(AsmItem::Label(name.into()));
    }

    pub fn directive(&mut self, directive: Directive) {
        self.items.push(AsmItem::Directive(directive));
    }

    pub fn instruction(
        &mut self,
        mnemonic: impl Into<String>,
        operand: Option<String>,
        comment: Option<String>,
        size_in_bytes: u32,
    ) {
        self.items.push(AsmItem::Instruction {
            mnemonic: mnemonic.into(),
            operand,
            comment,
            size_in_bytes,
        });
    }

    pub fn items(&self) -> &[AsmItem] {
        &self.items
    }

    /// Total bytes of every instruction and directive emitted so far.
    pub fn emitted_size(&self) -> u32 {
        self.items
            .iter()
            .map(|item| match item {
                AsmItem::Instruction { size_in_bytes, .. } => *size_in_bytes,
                AsmItem::Directive(Directive::Byte(b)) => b.len() as u32,
                AsmItem::Directive(Directive::Word(w)) => w.len() as u32 * 2,
                AsmItem::Directive(Directive::Fill { count, .. }) => *count,
                AsmItem::Directive(Directive::Reserve { count }) => *count,
                _ => 0,
            })
            .sum()
    }
}

/// Formats an `AssemblyModule` in the ACME cross-assembler's textual
/// dialect. Swapping in a different emitter for a different assembler does
/// not require any change to codegen (spec.md §4.9).
pub fn emit_acme(module: &AssemblyModule) -> String {
    let mut out = String::new();
    for item in module.items() {
        match item {
            AsmItem::Comment(text) => {
                let _ = writeln!(out, "; {text}");
            }
            AsmItem::SectionDivider(title) => {
                let _ = writeln!(out, "; ----- {title} -----");
            }
            AsmItem::Label(name) => {
                let _ = writeln!(out, "{name}:");
            }
            AsmItem::Directive(d) => emit_directive(&mut out, d),
            AsmItem::Instruction {
                mnemonic,
                operand,
                comment,
                ..
            } => {
                let mut line = format!("    {mnemonic}");
                if let Some(op) = operand {
                    let _ = write!(line, " {op}");
                }
                if let Some(c) = comment {
                    let _ = write!(line, " ; {c}");
                }
                let _ = writeln!(out, "{line}");
            }
        }
    }
    out
}

fn emit_directive(out: &mut String, directive: &Directive) {
    match directive {
        Directive::SetOrigin(addr) => {
            let _ = writeln!(out, "* = ${addr:04X}");
        }
        Directive::Byte(bytes) => {
            let rendered: Vec<String> = bytes.iter().map(|b| format!("${b:02X}")).collect();
            let _ = writeln!(out, "    !byte {}", rendered.join(", "));
        }
        Directive::Word(words) => {
            let rendered: Vec<String> = words.iter().map(|w| format!("${w:04X}")).collect();
            let _ = writeln!(out, "    !word {}", rendered.join(", "));
        }
        Directive::Fill { count, value } => {
            let _ = writeln!(out, "    !fill {count}, ${value:02X}");
        }
        Directive::Reserve { count } => {
            let _ = writeln!(out, "    !fill {count}, $00");
        }
    }
}
