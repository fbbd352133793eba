//! Secure random bytes written straight into guest memory.

use crate::memory::{self, MemoryError};

/// A source of cryptographically secure bytes. `read` may return fewer bytes
/// than requested; it must never block waiting for more.
pub trait EntropySource: Send {
    fn read(&mut self, buf: &mut [u8]) -> usize;
}

/// The operating system's CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsEntropy;

impl EntropySource for OsEntropy {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        match getrandom::getrandom(buf) {
            Ok(()) => buf.len(),
            Err(err) => {
                tracing::warn!(error = %err, len = buf.len(), "os entropy unavailable");
                0
            }
        }
    }
}

pub struct EntropyProvider {
    source: Box<dyn EntropySource>,
    short_reads: u64,
}

impl Default for EntropyProvider {
    fn default() -> Self {
        Self::new(Box::new(OsEntropy))
    }
}

impl std::fmt::Debug for EntropyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntropyProvider")
            .field("short_reads", &self.short_reads)
            .finish_non_exhaustive()
    }
}

impl EntropyProvider {
    pub fn new(source: Box<dyn EntropySource>) -> Self {
        EntropyProvider {
            source,
            short_reads: 0,
        }
    }

    /// Number of fills that had to be zero-padded.
    pub fn short_reads(&self) -> u64 {
        self.short_reads
    }

    /// Writes exactly `len` bytes at `offset`. Bytes the source cannot supply
    /// are zeroed rather than retried. `len == 0` touches nothing.
    pub fn fill(&mut self, mem: &mut [u8], offset: u32, len: u32) -> Result<(), MemoryError> {
        if len == 0 {
            return Ok(());
        }
        let dest = memory::slice_mut(mem, offset, len)?;
        self.fill_bytes(dest);
        Ok(())
    }

    /// Fills a host-side buffer the same way `fill` fills guest memory.
    pub fn fill_bytes(&mut self, dest: &mut [u8]) {
        let got = self.source.read(dest).min(dest.len());
        if got < dest.len() {
            dest[got..].fill(0);
            self.short_reads += 1;
            tracing::warn!(
                requested = dest.len(),
                got,
                "entropy source returned a short read; zero-padded"
            );
        }
    }
}
