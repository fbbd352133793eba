//! Registry of typed-array windows into guest memory.
//!
//! Two handle spaces share the `u32` range. A *view* handle is the guest byte
//! offset it aliases, so raw copies can address memory by handle. A
//! *synthetic* handle names a host-only array whose bytes live here in the
//! registry; those handles are drawn upward from a reserved base above any
//! live guest offset. A synthetic subarray resolves to a window of the
//! allocation that contains it, so a guest can fill a scratch array, slice
//! it and copy the slice into its own memory without any guest bytes ever
//! being addressed by a synthetic number.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::ops::Range;

use crate::memory::{self, MemoryError};
use crate::value::Handle;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayKind {
    View,
    Synthetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArrayRecord {
    pub kind: ArrayKind,
    pub len: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypedArrayError {
    /// The handle was never produced by a constructor or `subarray`.
    Unregistered { handle: Handle },
    /// `len` bytes at `offset` do not fit inside the array `handle`.
    OutOfRange {
        handle: Handle,
        offset: u64,
        len: u32,
        array_len: u32,
    },
    /// A view would start inside the reserved synthetic range.
    ViewInSyntheticRange { offset: u32, base: u32 },
    /// The next synthetic handle would alias live guest memory.
    SyntheticRangeExhausted { next: u64, memory_len: usize },
    Memory(MemoryError),
}

impl fmt::Display for TypedArrayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypedArrayError::Unregistered { handle } => {
                write!(f, "typed array 0x{handle:08X} is not registered")
            }
            TypedArrayError::OutOfRange {
                handle,
                offset,
                len,
                array_len,
            } => write!(
                f,
                "{len} bytes at offset {offset} do not fit typed array 0x{handle:08X} of {array_len} bytes"
            ),
            TypedArrayError::ViewInSyntheticRange { offset, base } => write!(
                f,
                "typed array view at 0x{offset:08X} overlaps the synthetic handle range (base 0x{base:08X})"
            ),
            TypedArrayError::SyntheticRangeExhausted { next, memory_len } => write!(
                f,
                "synthetic typed-array handle 0x{next:08X} would alias guest memory of {memory_len} bytes"
            ),
            TypedArrayError::Memory(err) => err.fmt(f),
        }
    }
}

impl std::error::Error for TypedArrayError {}

impl From<MemoryError> for TypedArrayError {
    fn from(err: MemoryError) -> Self {
        TypedArrayError::Memory(err)
    }
}

#[derive(Debug, Clone)]
pub struct TypedArrayRegistry {
    records: HashMap<Handle, ArrayRecord>,
    /// Host bytes of each synthetic allocation, keyed by its first handle.
    backing: BTreeMap<Handle, Vec<u8>>,
    synthetic_base: u32,
    next_synthetic: u64,
}

impl TypedArrayRegistry {
    pub fn new(synthetic_base: u32) -> Self {
        TypedArrayRegistry {
            records: HashMap::new(),
            backing: BTreeMap::new(),
            synthetic_base,
            next_synthetic: u64::from(synthetic_base),
        }
    }

    pub fn synthetic_base(&self) -> u32 {
        self.synthetic_base
    }

    pub fn is_synthetic(&self, handle: Handle) -> bool {
        handle >= self.synthetic_base
    }

    /// Records a view of `len` bytes at guest `offset`; the handle is the offset.
    pub fn record(&mut self, offset: u32, len: u32) -> Result<Handle, TypedArrayError> {
        if self.is_synthetic(offset) {
            return Err(TypedArrayError::ViewInSyntheticRange {
                offset,
                base: self.synthetic_base,
            });
        }
        self.records.insert(
            offset,
            ArrayRecord {
                kind: ArrayKind::View,
                len,
            },
        );
        Ok(offset)
    }

    /// Records a view spanning all of guest memory. Its handle is offset 0.
    pub fn record_memory(&mut self, memory_len: usize) -> Result<Handle, TypedArrayError> {
        let len = u32::try_from(memory_len)
            .unwrap_or(u32::MAX)
            .min(self.synthetic_base);
        self.record(0, len)
    }

    /// Allocates a zeroed host-only array. `memory_len` is the current guest
    /// memory size; the handle must lie beyond it.
    pub fn allocate_synthetic(
        &mut self,
        len: u32,
        memory_len: usize,
    ) -> Result<Handle, TypedArrayError> {
        let next = self.next_synthetic;
        let handle = match u32::try_from(next) {
            Ok(h) if next >= memory_len as u64 => h,
            _ => return Err(TypedArrayError::SyntheticRangeExhausted { next, memory_len }),
        };
        // One slot per byte plus one past the end, so every subarray of this
        // allocation, empty tail included, resolves back to it.
        self.next_synthetic = next + u64::from(len) + 1;
        self.records.insert(
            handle,
            ArrayRecord {
                kind: ArrayKind::Synthetic,
                len,
            },
        );
        self.backing.insert(handle, vec![0; len as usize]);
        Ok(handle)
    }

    pub fn lookup(&self, handle: Handle) -> Option<u32> {
        self.records.get(&handle).map(|r| r.len)
    }

    pub fn record_of(&self, handle: Handle) -> Option<ArrayRecord> {
        self.records.get(&handle).copied()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Window `[begin, end)` of `base`: handle `base + begin`, length
    /// `end - begin` clamped at zero. The kind follows `base`. Synthetic
    /// windows are clamped to the end of their host allocation; a window at
    /// offset 0 shares its parent's handle and replaces its recorded length.
    pub fn subarray(
        &mut self,
        base: Handle,
        begin: u32,
        end: u32,
    ) -> Result<Handle, TypedArrayError> {
        if self.is_synthetic(base) {
            let (root, window) = self.synthetic_window(base)?;
            let available = self
                .backing
                .get(&root)
                .map_or(0, |bytes| bytes.len() - window.start);
            let end = end.min(u32::try_from(available).unwrap_or(u32::MAX));
            let begin = begin.min(end);
            let handle = base.saturating_add(begin);
            self.records.insert(
                handle,
                ArrayRecord {
                    kind: ArrayKind::Synthetic,
                    len: end - begin,
                },
            );
            return Ok(handle);
        }
        let handle = base.wrapping_add(begin);
        if self.is_synthetic(handle) {
            return Err(TypedArrayError::ViewInSyntheticRange {
                offset: handle,
                base: self.synthetic_base,
            });
        }
        let len = end.saturating_sub(begin);
        self.records.insert(
            handle,
            ArrayRecord {
                kind: ArrayKind::View,
                len,
            },
        );
        Ok(handle)
    }

    /// Allocation holding synthetic `handle` and the byte range it covers.
    fn synthetic_window(&self, handle: Handle) -> Result<(Handle, Range<usize>), TypedArrayError> {
        let record = self
            .record_of(handle)
            .filter(|r| r.kind == ArrayKind::Synthetic)
            .ok_or(TypedArrayError::Unregistered { handle })?;
        let (root, bytes) = self
            .backing
            .range(..=handle)
            .next_back()
            .ok_or(TypedArrayError::Unregistered { handle })?;
        let start = (handle - root) as usize;
        let end = start + record.len as usize;
        if end > bytes.len() {
            return Err(TypedArrayError::OutOfRange {
                handle: *root,
                offset: start as u64,
                len: record.len,
                array_len: bytes.len() as u32,
            });
        }
        Ok((*root, start..end))
    }

    /// Host bytes behind a synthetic array.
    pub fn synthetic_bytes(&self, handle: Handle) -> Result<&[u8], TypedArrayError> {
        let (root, range) = self.synthetic_window(handle)?;
        self.backing
            .get(&root)
            .and_then(|bytes| bytes.get(range))
            .ok_or(TypedArrayError::Unregistered { handle })
    }

    pub fn synthetic_bytes_mut(&mut self, handle: Handle) -> Result<&mut [u8], TypedArrayError> {
        let (root, range) = self.synthetic_window(handle)?;
        self.backing
            .get_mut(&root)
            .and_then(|bytes| bytes.get_mut(range))
            .ok_or(TypedArrayError::Unregistered { handle })
    }

    /// `target.set(src, offset)`: copies every byte of `src` into `target`
    /// starting `offset` bytes in, and returns the number of bytes copied.
    /// Either side may be a view or a synthetic array.
    pub fn set(
        &mut self,
        mem: &mut [u8],
        target: Handle,
        src: Handle,
        offset: u32,
    ) -> Result<u32, TypedArrayError> {
        let source = self
            .record_of(src)
            .ok_or(TypedArrayError::Unregistered { handle: src })?;
        let dest = self
            .record_of(target)
            .ok_or(TypedArrayError::Unregistered { handle: target })?;
        let out_of_range = TypedArrayError::OutOfRange {
            handle: target,
            offset: u64::from(offset),
            len: source.len,
            array_len: dest.len,
        };
        if u64::from(offset) + u64::from(source.len) > u64::from(dest.len) {
            return Err(out_of_range);
        }
        if source.len == 0 {
            return Ok(0);
        }
        let bytes = match source.kind {
            ArrayKind::View => memory::slice(mem, src, source.len)?.to_vec(),
            ArrayKind::Synthetic => self.synthetic_bytes(src)?.to_vec(),
        };
        let start = offset as usize;
        let window = match dest.kind {
            ArrayKind::View => {
                let at = target.checked_add(offset).ok_or(out_of_range)?;
                memory::slice_mut(mem, at, source.len)?
            }
            ArrayKind::Synthetic => self
                .synthetic_bytes_mut(target)?
                .get_mut(start..start + bytes.len())
                .ok_or(out_of_range)?,
        };
        window.copy_from_slice(&bytes);
        Ok(source.len)
    }
}
