//! Addressable memory backend contract
//!
//! The corruption core never owns memory. Everything it mutates lives behind
//! this trait, which a host (emulator, process snapshot, file image) provides.

use crate::error::{CoreError, Result};

/// Byte-addressable memory organized into named domains
///
/// Implementations are externally synchronized: the scheduler assumes
/// exclusive access for the duration of a tick.
pub trait MemoryBackend {
    /// Size in bytes of the named domain
    ///
    /// # Errors
    /// `CoreError::UnresolvedDomain` if the name is unknown.
    fn size(&self, domain: &str) -> Result<u64>;

    /// Read `len` bytes starting at `start`
    fn peek_bytes(&self, domain: &str, start: u64, len: usize) -> Result<Vec<u8>>;

    /// Write `bytes` starting at `start`
    fn poke_bytes(&mut self, domain: &str, start: u64, bytes: &[u8]) -> Result<()>;

    /// Whether the host steps in real time
    ///
    /// When false the scheduler collapses all unit timing to "due
    /// immediately, lasts one application".
    fn supports_realtime(&self) -> bool {
        true
    }

    /// Validate that `[start, start + len)` fits inside the domain
    fn check_range(&self, domain: &str, start: u64, len: usize) -> Result<()> {
        let size = self.size(domain)?;
        if start.checked_add(len as u64).map_or(true, |end| end > size) {
            return Err(CoreError::OutOfRange {
                domain: domain.to_string(),
                address: start,
                len,
                size,
            });
        }
        Ok(())
    }
}
