//! `blend65c`: the IL data model, SSA construction pipeline, and 6502 code
//! generator for the Blend65 compiler.
//!
//! This crate implements the middle and back end only. Lexing, parsing,
//! semantic analysis, CLI orchestration, and the external macro assembler
//! binary are external collaborators; see `codegen::prg::AssemblerInvoker`
//! for the seam where the last of those is plugged in.

pub mod codegen;
pub mod error;
pub mod instructions;
pub mod ir;
pub mod ssa;
pub mod types;
pub mod value;

#[cfg(feature = "config")]
pub mod config;

pub use error::CoreError;
pub use types::Type;
pub use value::{Constant, Register, Value};
