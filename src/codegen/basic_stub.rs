//! BASIC autostart stub byte layout, generation, and verification
//! (spec.md §4.12).

/// Why stub generation failed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StubError {
    #[error("SYS address {0} is out of range (must be 0..=65535)")]
    SysAddressOutOfRange(i64),
    #[error("BASIC line number {0} is out of range (must be 0..=63999)")]
    LineNumberOutOfRange(i64),
}

/// The outcome of `verify`: either a valid stub's parsed fields, or the
/// specific defect found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StubVerification {
    Valid { sys_address: u16, line_number: u16 },
    TooShort,
    WrongSysToken,
    NextLinePointerMismatch,
    MissingAddressDigits,
}

const SYS_TOKEN: u8 = 0x9E;

/// Generate the BASIC stub bytes for `sys_address` at `load_address`, with
/// BASIC line `line_number` (spec.md §4.12 byte layout). `sys_address` must
/// be in `[0, 65535]` and `line_number` in `[0, 63999]`.
pub fn generate(
    load_address: u16,
    line_number: i64,
    sys_address: i64,
) -> Result<Vec<u8>, StubError> {
    if !(0..=65535).contains(&sys_address) {
        return Err(StubError::SysAddressOutOfRange(sys_address));
    }
    if !(0..=63999).contains(&line_number) {
        return Err(StubError::LineNumberOutOfRange(line_number));
    }
    let sys_address = sys_address as u16;
    let line_number = line_number as u16;
    let digits = sys_address.to_string();
    let size = 9 + digits.len() as u16;
    let next_line_ptr = load_address.wrapping_add(size).wrapping_sub(2);

    let mut bytes = Vec::with_capacity(size as usize);
    bytes.push((next_line_ptr & 0xFF) as u8);
    bytes.push((next_line_ptr >> 8) as u8);
    bytes.push((line_number & 0xFF) as u8);
    bytes.push((line_number >> 8) as u8);
    bytes.push(SYS_TOKEN);
    bytes.extend(digits.bytes());
    bytes.push(0x00);
    bytes.push(0x00);
    bytes.push(0x00);

    Ok(bytes)
}

/// Parse and re-derive the stub structure from a byte buffer, reporting
/// whether it is valid and why not if it isn't (spec.md §4.12, "Verifier").
pub fn verify(buffer: &[u8], load_address: u16) -> StubVerification {
    if buffer.len() < 9 {
        return StubVerification::TooShort;
    }
    if buffer[4] != SYS_TOKEN {
        return StubVerification::WrongSysToken;
    }
    let next_line_ptr = u16::from_le_bytes([buffer[0], buffer[1]]);
    let line_number = u16::from_le_bytes([buffer[2], buffer[3]]);

    let digit_end = buffer[5..]
        .iter()
        .position(|&b| b == 0x00)
        .map(|p| 5 + p);
    let Some(digit_end) = digit_end else {
        return StubVerification::MissingAddressDigits;
    };
    let digits = &buffer[5..digit_end];
    if digits.is_empty() || !digits.iter().all(|b| b.is_ascii_digit()) {
        return StubVerification::MissingAddressDigits;
    }
    let digit_str = std::str::from_utf8(digits).unwrap_or("");
    let Ok(sys_address) = digit_str.parse::<u32>() else {
        return StubVerification::MissingAddressDigits;
    };
    if sys_address > 0xFFFF {
        return StubVerification::MissingAddressDigits;
    }

    let size = 9 + digits.len() as u16;
    let expected_next_line = load_address.wrapping_add(size).wrapping_sub(2);
    if next_line_ptr != expected_next_line {
        return StubVerification::NextLinePointerMismatch;
    }

    StubVerification::Valid {
        sys_address: sys_address as u16,
        line_number,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// spec.md §8, scenario S3.
    #[test]
    fn c64_stub_matches_known_layout() {
        let bytes = generate(0x0801, 10, 0x0810).unwrap();
        // sys=2064 decimal -> digits "2064"
        assert_eq!(bytes.len(), 9 + 4);
        assert_eq!(&bytes[5..9], b"2064");
        let next_line = u16::from_le_bytes([bytes[0], bytes[1]]);
        assert_eq!(next_line, 0x080C);
    }

    #[test]
    fn size_law_matches_digit_count() {
        for sys in [0i64, 9, 99, 999, 9999, 65535] {
            let bytes = generate(0x0801, 10, sys).unwrap();
            assert_eq!(bytes.len(), 9 + sys.to_string().len());
        }
    }

    #[test]
    fn verify_round_trips_generated_stub() {
        let bytes = generate(0x0801, 10, 4112).unwrap();
        match verify(&bytes, 0x0801) {
            StubVerification::Valid {
                sys_address,
                line_number,
            } => {
                assert_eq!(sys_address, 4112);
                assert_eq!(line_number, 10);
            }
            other => panic!("expected valid stub, got {other:?}"),
        }
    }

    #[test]
    fn verify_rejects_too_short_buffer() {
        assert_eq!(verify(&[0u8; 4], 0x0801), StubVerification::TooShort);
    }

    #[test]
    fn verify_rejects_wrong_sys_token() {
        let mut bytes = generate(0x0801, 10, 100).unwrap();
        bytes[4] = 0x00;
        assert_eq!(verify(&bytes, 0x0801), StubVerification::WrongSysToken);
    }

    #[test]
    fn line_number_out_of_range_fails() {
        assert_eq!(
            generate(0x0801, 64000, 100),
            Err(StubError::LineNumberOutOfRange(64000))
        );
    }
}
