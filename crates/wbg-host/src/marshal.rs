//! Return-area layouts shared with the guest.
//!
//! The host allocates a return area from the guest's own allocator, passes
//! its address as the first argument, and decodes the record the export
//! wrote there. All words are little-endian `u32`.

use crate::memory::{self, MemoryError};

pub const WORD: u32 = 4;

/// `(ptr, len)` of a guest-allocated UTF-8 string.
pub const STRING_RECORD_SIZE: u32 = 2 * WORD;

/// `(value, error_handle, is_error)`, padded to an 8-byte multiple.
pub const FALLIBLE_RECORD_SIZE: u32 = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StringRecord {
    pub ptr: u32,
    pub len: u32,
}

impl StringRecord {
    pub fn decode(mem: &[u8], at: u32) -> Result<Self, MemoryError> {
        Ok(StringRecord {
            ptr: memory::read_u32_le(mem, at)?,
            len: memory::read_u32_le(mem, at.saturating_add(WORD))?,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallibleRecord {
    pub value: u32,
    pub error: u32,
    pub is_error: bool,
}

impl FallibleRecord {
    pub fn decode(mem: &[u8], at: u32) -> Result<Self, MemoryError> {
        Ok(FallibleRecord {
            value: memory::read_u32_le(mem, at)?,
            error: memory::read_u32_le(mem, at.saturating_add(WORD))?,
            is_error: memory::read_u32_le(mem, at.saturating_add(2 * WORD))? != 0,
        })
    }

    /// `Ok(value)` or `Err(error_handle)`.
    pub fn into_result(self) -> Result<u32, u32> {
        if self.is_error {
            Err(self.error)
        } else {
            Ok(self.value)
        }
    }
}
