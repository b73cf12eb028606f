//! The closed error taxonomy every caller-triggered failure is classified
//! into (spec.md §7). Codegen warnings are deliberately not part of this
//! type — they are non-fatal and accumulate on `CodegenResult::warnings`.

use thiserror::Error;

#[cfg(feature = "config")]
use crate::config::ConfigError;

/// Top-level error returned by the crate's fallible entry points.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Missing config file, invalid JSON, or a schema violation.
    #[cfg(feature = "config")]
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// An explicit input file was missing, or an include/exclude pattern
    /// matched nothing (surfaced by the caller with the list of paths).
    #[error("file resolution failed: {0}")]
    FileResolution(String),

    /// A malformed instruction, unreachable result register, or broken
    /// terminator rule. Treated as a programmer bug; fatal with location.
    #[error("IL invariant violation: {0}")]
    IlInvariant(String),

    /// A post-SSA verification check failed.
    #[error("verification error: {0}")]
    Verification(String),
}
