//! S7 data layout constants
//!
//! Sizes follow the S7 memory model used by STEP 7 / TIA Portal:
//! - Data is stored big-endian (Motorola byte order)
//! - A `STRING` occupies a 2-byte header followed by its declared capacity

// ============================================================================
// Address Constants
// ============================================================================

/// Highest bit index within a byte.
pub const MAX_BIT_OFFSET: u8 = 7;

// ============================================================================
// String Layout
// ============================================================================

/// Maximum declared length of an S7 `STRING`.
pub const STRING_MAX_LEN: usize = 254;

/// Header bytes in front of the string payload:
/// Max Length(1) + Actual Length(1) = 2 bytes
pub const STRING_HEADER_LEN: usize = 2;

/// Total size of a `STRING[254]` in PLC memory.
///
/// = 2 (header) + 254 (payload) = 256 bytes
pub const STRING_BUFFER_LEN: usize = STRING_HEADER_LEN + STRING_MAX_LEN;

// ============================================================================
// Endpoint Defaults
// ============================================================================

/// ISO-on-TCP port used by S7 controllers.
pub const DEFAULT_S7_PORT: u16 = 102;

/// Default rack for S7-1200/1500 CPUs.
pub const DEFAULT_RACK: u16 = 0;

/// Default slot for S7-1200/1500 CPUs.
pub const DEFAULT_SLOT: u16 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_layout() {
        assert_eq!(STRING_BUFFER_LEN, 256);
        // Both header bytes must be able to hold the capacity
        assert!(STRING_MAX_LEN <= u8::MAX as usize);
    }
}
