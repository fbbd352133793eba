//! Bounds-checked access to a guest linear-memory snapshot.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryError {
    pub offset: u64,
    pub len: u64,
    pub memory_len: usize,
}

impl fmt::Display for MemoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "guest memory access out of bounds: offset=0x{:08X} len={} memory_len={}",
            self.offset, self.len, self.memory_len
        )
    }
}

impl std::error::Error for MemoryError {}

fn range(mem_len: usize, offset: u32, len: u32) -> Result<std::ops::Range<usize>, MemoryError> {
    let start = offset as usize;
    let end = start.checked_add(len as usize);
    match end {
        Some(end) if end <= mem_len => Ok(start..end),
        _ => Err(MemoryError {
            offset: u64::from(offset),
            len: u64::from(len),
            memory_len: mem_len,
        }),
    }
}

pub fn slice(mem: &[u8], offset: u32, len: u32) -> Result<&[u8], MemoryError> {
    let r = range(mem.len(), offset, len)?;
    Ok(&mem[r])
}

pub fn slice_mut(mem: &mut [u8], offset: u32, len: u32) -> Result<&mut [u8], MemoryError> {
    let r = range(mem.len(), offset, len)?;
    Ok(&mut mem[r])
}

pub fn read_u32_le(mem: &[u8], offset: u32) -> Result<u32, MemoryError> {
    let b = slice(mem, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}

pub fn write_u32_le(mem: &mut [u8], offset: u32, value: u32) -> Result<(), MemoryError> {
    slice_mut(mem, offset, 4)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

pub fn write_f64_le(mem: &mut [u8], offset: u32, value: f64) -> Result<(), MemoryError> {
    slice_mut(mem, offset, 8)?.copy_from_slice(&value.to_le_bytes());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn words_are_little_endian() {
        let mut mem = vec![0u8; 16];
        write_u32_le(&mut mem, 4, 0x0102_0304).unwrap();
        assert_eq!(&mem[4..8], &[4, 3, 2, 1]);
        assert_eq!(read_u32_le(&mem, 4).unwrap(), 0x0102_0304);
    }

    #[test]
    fn access_past_end_is_rejected() {
        let mut mem = vec![0u8; 8];
        assert!(slice(&mem, 8, 0).is_ok());
        let err = read_u32_le(&mem, 6).unwrap_err();
        assert_eq!(err.memory_len, 8);
        assert!(write_f64_le(&mut mem, 1, 1.0).is_err());
        assert!(slice(&mem, u32::MAX, 2).is_err());
    }
}
