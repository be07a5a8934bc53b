//! Unit generation contracts
//!
//! The distribution engine decides *where* to blast; a [`UnitGenerator`]
//! decides *what* to write there, one implementation per corruption kind. A
//! [`LayerProducer`] bypasses distribution entirely and supplies a whole
//! layer.

use crate::error::Result;
use crate::layer::BlastLayer;
use crate::memory::MemoryBackend;
use crate::rng::RandomSource;
use crate::unit::BlastUnit;

/// Produces a blast unit for a drawn target address
pub trait UnitGenerator {
    /// Produce a unit for `(domain, address)`, or `None` to skip this draw
    ///
    /// # Errors
    /// Backend failures (unresolved domain, out-of-range reads) propagate.
    fn generate(
        &mut self,
        domain: &str,
        address: u64,
        precision: usize,
        alignment: u64,
        mem: &dyn MemoryBackend,
        rng: &mut dyn RandomSource,
    ) -> Result<Option<BlastUnit>>;

    /// Whether each produced unit occupies the infinite pool
    ///
    /// Generators that answer true get their intensity capped at the
    /// scheduler's infinite-unit ceiling, since every unit they make costs a
    /// permanent slot.
    fn caps_at_infinite_pool(&self) -> bool {
        false
    }
}

/// External batch producer, consulted instead of the distribution strategies
pub trait LayerProducer {
    /// Produce the next layer, or `None` when nothing is staged
    fn produce(&mut self) -> Result<Option<BlastLayer>>;
}
