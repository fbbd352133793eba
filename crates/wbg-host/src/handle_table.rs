//! Append-only store of host values addressed by integer handle.
//!
//! Slot 0 is permanently `undefined` and slots 1..=3 are seeded with `null`,
//! `true` and `false`, matching the layout the generated glue assumes for its
//! reference table. Entries are never reclaimed: dropping a reference is a
//! no-op and the table only grows for the lifetime of the session.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::value::{Handle, HostValue};

pub const HANDLE_UNDEFINED: Handle = 0;
pub const HANDLE_NULL: Handle = 1;
pub const HANDLE_TRUE: Handle = 2;
pub const HANDLE_FALSE: Handle = 3;
/// First handle `intern` can return.
pub const FIRST_FREE_HANDLE: Handle = 4;

#[derive(Debug, Clone)]
pub struct HandleTable {
    entries: Vec<HostValue>,
}

impl Default for HandleTable {
    fn default() -> Self {
        Self::new()
    }
}

impl HandleTable {
    pub fn new() -> Self {
        HandleTable {
            entries: vec![
                HostValue::Undefined,
                HostValue::Null,
                HostValue::Bool(true),
                HostValue::Bool(false),
            ],
        }
    }

    fn next_handle(&self) -> Handle {
        u32::try_from(self.entries.len()).unwrap_or(u32::MAX)
    }

    /// Appends `value` and returns its handle. Never reuses a slot.
    pub fn intern(&mut self, value: HostValue) -> Handle {
        let handle = self.next_handle();
        self.entries.push(value);
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&HostValue> {
        self.entries.get(handle as usize)
    }

    pub fn live_count(&self) -> usize {
        self.entries.len()
    }

    pub fn bool_handle(value: bool) -> Handle {
        if value {
            HANDLE_TRUE
        } else {
            HANDLE_FALSE
        }
    }

    /// Reserves `delta` `undefined` slots and returns the previous size, the
    /// contract of the generator's table-grow intrinsic.
    pub fn grow(&mut self, delta: u32) -> Handle {
        let previous = self.next_handle();
        let new_len = self.entries.len().saturating_add(delta as usize);
        self.entries.resize(new_len, HostValue::Undefined);
        previous
    }

    /// Resets a slot to `null`. Seeded slots and unallocated handles are left
    /// untouched; returns whether the slot changed.
    pub fn set_null(&mut self, handle: Handle) -> bool {
        if handle < FIRST_FREE_HANDLE {
            return false;
        }
        match self.entries.get_mut(handle as usize) {
            Some(slot) => {
                *slot = HostValue::Null;
                true
            }
            None => false,
        }
    }

    /// Appends `item` to the sequence at `seq` and returns the new length.
    pub fn push_to_sequence(&mut self, seq: Handle, item: Handle) -> Option<u32> {
        match self.entries.get_mut(seq as usize) {
            Some(HostValue::Sequence(items)) => {
                items.push(item);
                Some(u32::try_from(items.len()).unwrap_or(u32::MAX))
            }
            _ => None,
        }
    }
}

/// Content-addressed index over interned strings.
#[derive(Debug, Clone, Default)]
pub struct StringInterner {
    by_digest: HashMap<[u8; 32], Handle>,
}

impl StringInterner {
    /// Returns the handle of an equal string interned earlier, or interns
    /// `text` into `table` and remembers it. A remembered slot that no longer
    /// holds the string (the guest nulled it) is replaced by a fresh one.
    pub fn intern(&mut self, table: &mut HandleTable, text: String) -> Handle {
        let digest: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        if let Some(&handle) = self.by_digest.get(&digest) {
            if matches!(table.get(handle), Some(HostValue::String(s)) if *s == text) {
                return handle;
            }
            tracing::debug!(handle, "interned string slot was cleared; re-interning");
        }
        let handle = table.intern(HostValue::String(text));
        self.by_digest.insert(digest, handle);
        handle
    }

    pub fn len(&self) -> usize {
        self.by_digest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_digest.is_empty()
    }
}
