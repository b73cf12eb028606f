//! External macro-assembler invocation and `.prg` packaging (spec.md §4.9,
//! §9, §6.2).
//!
//! The only blocking I/O in codegen is shelling out to the external
//! assembler. Isolated behind a narrow trait so unit tests inject a
//! deterministic double (spec.md §9), the same seam
//! `cranelift-codegen`'s `TargetIsa`/`CodeSink` traits provide around
//! platform-specific emission.

use std::io;
use std::process::Command;

/// Converts assembly text into a raw binary object. The core never talks
/// to a process directly; it calls this trait.
pub trait AssemblerInvoker {
    /// Assemble `source`, returning the produced bytes (without any PRG
    /// header — that's applied separately by `package_prg`).
    fn assemble(&self, source: &str) -> io::Result<Vec<u8>>;
}

/// A deterministic test double that returns fixed bytes regardless of
/// input, or simulates the assembler being unavailable.
pub struct MockAssembler {
    pub fixed_output: Vec<u8>,
    pub available: bool,
}

impl MockAssembler {
    pub fn returning(bytes: Vec<u8>) -> Self {
        MockAssembler {
            fixed_output: bytes,
            available: true,
        }
    }

    pub fn unavailable() -> Self {
        MockAssembler {
            fixed_output: Vec::new(),
            available: false,
        }
    }
}

impl AssemblerInvoker for MockAssembler {
    fn assemble(&self, _source: &str) -> io::Result<Vec<u8>> {
        if !self.available {
            return Err(io::Error::new(io::ErrorKind::NotFound, "assembler unavailable"));
        }
        Ok(self.fixed_output.clone())
    }
}

/// Shells out to a real macro assembler binary (ACME by default), writing
/// `source` to a temporary file and reading the produced object back
/// (spec.md §9: "writes its input to a temporary file, and reads back
/// bytes").
pub struct ExternalAssembler {
    pub binary_path: String,
}

impl ExternalAssembler {
    pub fn new(binary_path: impl Into<String>) -> Self {
        ExternalAssembler {
            binary_path: binary_path.into(),
        }
    }
}

impl AssemblerInvoker for ExternalAssembler {
    fn assemble(&self, source: &str) -> io::Result<Vec<u8>> {
        let dir = std::env::temp_dir();
        let pid = std::process::id();
        let in_path = dir.join(format!("blend65c-{pid}.asm"));
        let out_path = dir.join(format!("blend65c-{pid}.bin"));
        std::fs::write(&in_path, source)?;

        let status = Command::new(&self.binary_path)
            .arg("-o")
            .arg(&out_path)
            .arg(&in_path)
            .status()?;
        let _ = std::fs::remove_file(&in_path);
        if !status.success() {
            let _ = std::fs::remove_file(&out_path);
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} exited with {status}", self.binary_path),
            ));
        }
        let bytes = std::fs::read(&out_path)?;
        let _ = std::fs::remove_file(&out_path);
        Ok(bytes)
    }
}

/// Prepend the PRG load-address header: `[low_byte, high_byte, ...bytes]`
/// (spec.md §6.2).
pub fn package_prg(load_address: u16, program_bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(program_bytes.len() + 2);
    out.push((load_address & 0xFF) as u8);
    out.push((load_address >> 8) as u8);
    out.extend_from_slice(program_bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_prg_prepends_little_endian_load_address() {
        let bytes = package_prg(0x0801, &[0xAA, 0xBB]);
        assert_eq!(bytes, vec![0x01, 0x08, 0xAA, 0xBB]);
    }

    #[test]
    fn mock_assembler_returns_fixed_bytes() {
        let mock = MockAssembler::returning(vec![1, 2, 3]);
        assert_eq!(mock.assemble("whatever").unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unavailable_mock_reports_an_error() {
        let mock = MockAssembler::unavailable();
        assert!(mock.assemble("whatever").is_err());
    }
}
