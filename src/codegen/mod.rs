//! Code generation: IL -> 6502 assembly text (and optionally a packaged
//! `.prg`), per spec.md §4.7-§4.12.

pub mod asm;
pub mod basic_stub;
pub mod context;
pub mod globals;
pub mod labels;
pub mod prg;
pub mod select;
pub mod sourcemap;
pub mod target;
pub mod tracking;

pub use context::{generate, CodegenContext, CodegenOptions, CodegenResult, CodegenStats, DebugMode, OutputFormat};
pub use prg::{AssemblerInvoker, ExternalAssembler, MockAssembler};
pub use target::{TargetDescriptor, TargetKind};
