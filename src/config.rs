//! Project configuration file parsing (spec.md §6.3) and its lowering into
//! `CodegenOptions` (§4.13). This module owns the shape and validation of
//! the `compilerOptions` JSON document; locating the file and resolving
//! `include`/`exclude` globs is the CLI's job, not this crate's.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::codegen::{CodegenOptions, DebugMode, OutputFormat, TargetDescriptor, TargetKind};

/// Errors surfaced while reading or validating a project configuration
/// file (spec.md §7, "Configuration error").
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read configuration file `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON in `{path}`: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid configuration: {0}")]
    Schema(String),
}

/// `target` (spec.md §6.3). Only `C64` lowers to a fully implemented
/// descriptor; the others are accepted and carried through unchanged.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TargetName {
    #[default]
    C64,
    C128,
    X16,
}

impl From<TargetName> for TargetKind {
    fn from(name: TargetName) -> Self {
        match name {
            TargetName::C64 => TargetKind::C64,
            TargetName::C128 => TargetKind::C128,
            TargetName::X16 => TargetKind::X16,
        }
    }
}

/// `optimization` (spec.md §6.3). Accepted and stored; no implemented pass
/// consumes it yet (spec.md §9, open question).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
pub enum OptimizationLevel {
    #[serde(rename = "O0")]
    O0,
    #[serde(rename = "O1")]
    O1,
    #[serde(rename = "O2")]
    O2,
    #[serde(rename = "O3")]
    O3,
    #[serde(rename = "Os")]
    Os,
    #[serde(rename = "Oz")]
    Oz,
}

/// `debug` (spec.md §6.3).
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum DebugLevel {
    #[default]
    None,
    Inline,
    Vice,
    Both,
}

impl From<DebugLevel> for DebugMode {
    fn from(level: DebugLevel) -> Self {
        match level {
            DebugLevel::None => DebugMode::None,
            DebugLevel::Inline => DebugMode::Inline,
            DebugLevel::Vice => DebugMode::Vice,
            DebugLevel::Both => DebugMode::Both,
        }
    }
}

/// `outputFormat` (spec.md §6.3).
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormatName {
    Asm,
    Prg,
    Crt,
    Both,
}

impl From<OutputFormatName> for OutputFormat {
    fn from(name: OutputFormatName) -> Self {
        match name {
            OutputFormatName::Asm => OutputFormat::Asm,
            OutputFormatName::Prg => OutputFormat::Prg,
            OutputFormatName::Crt => OutputFormat::Crt,
            OutputFormatName::Both => OutputFormat::Both,
        }
    }
}

/// The `compilerOptions` record (spec.md §6.3). Unknown fields inside this
/// record, and at the top level of the document, are ignored rather than
/// rejected.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerOptions {
    #[serde(default)]
    pub target: TargetName,
    pub optimization: Option<OptimizationLevel>,
    #[serde(default)]
    pub debug: DebugLevel,
    pub output_format: Option<OutputFormatName>,
    pub load_address: Option<u16>,
    pub out_dir: Option<String>,
    pub out_file: Option<String>,
    #[serde(default)]
    pub verbose: bool,
    #[serde(default)]
    pub strict: bool,
}

/// The optional `emulator` record (spec.md §6.3); launching an emulator is
/// an external-collaborator concern this crate only carries the
/// configuration for.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmulatorConfig {
    pub command: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
}

/// The full project configuration document (spec.md §6.3).
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectConfig {
    #[serde(default)]
    pub compiler_options: CompilerOptions,
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    pub root_dir: Option<String>,
    pub emulator: Option<EmulatorConfig>,
}

impl ProjectConfig {
    /// Parse `text` as a project configuration document.
    pub fn from_str(text: &str, path_for_errors: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path_for_errors.to_string(),
            source,
        })
    }

    /// Read and parse a project configuration file from disk.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&text, &path.display().to_string())
    }

    /// Lower this document into the `CodegenOptions` the pipeline consumes
    /// (spec.md §4.13).
    pub fn to_codegen_options(&self) -> Result<CodegenOptions, ConfigError> {
        let opts = &self.compiler_options;
        let target = TargetDescriptor::for_kind(opts.target.into());
        let load_address = opts.load_address.unwrap_or(0x0801);
        let format = opts.output_format.map(OutputFormat::from).unwrap_or(OutputFormat::Asm);
        let debug = DebugMode::from(opts.debug);
        let basic_stub = load_address == target.basic_start;

        if let Some(out_file) = &opts.out_file {
            if out_file.is_empty() {
                return Err(ConfigError::Schema("outFile must not be empty".to_string()));
            }
        }

        Ok(CodegenOptions {
            target,
            format,
            source_map: matches!(debug, DebugMode::Both),
            debug,
            load_address,
            basic_stub,
            out_file: opts.out_file.clone(),
        })
    }
}
