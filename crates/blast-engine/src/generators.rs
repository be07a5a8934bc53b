//! Built-in unit generators
//!
//! Two stock corruption kinds: random-value blasts and freezes. Hosts plug
//! in their own [`UnitGenerator`] implementations for anything richer.

use blast_core::{BlastUnit, MemoryBackend, RandomSource, Result, UnitGenerator};

/// Snap an address to the precision grid, add the alignment offset and keep
/// the result inside the domain
///
/// Returns `None` for domains too small to hold an aligned mutation.
#[must_use]
pub fn align_address(address: u64, precision: usize, alignment: u64, size: u64) -> Option<u64> {
    let precision = precision as u64;
    if precision == 0 || size < precision * 2 {
        return None;
    }
    let mut addr = address - (address % precision) + alignment;
    if addr > size - precision {
        // Out of range; land on the last aligned address instead
        addr = size - precision * 2 + alignment;
    }
    if addr + precision > size {
        return None;
    }
    Some(addr)
}

/// Generates VALUE units carrying `precision` random bytes
#[derive(Debug, Clone)]
pub struct RandomValueGenerator {
    lifetime: u64,
}

impl RandomValueGenerator {
    /// Create with the lifetime stamped onto every produced unit
    #[must_use]
    pub fn new(lifetime: u64) -> Self {
        Self { lifetime }
    }
}

impl Default for RandomValueGenerator {
    fn default() -> Self {
        Self::new(1)
    }
}

impl UnitGenerator for RandomValueGenerator {
    fn generate(
        &mut self,
        domain: &str,
        address: u64,
        precision: usize,
        alignment: u64,
        mem: &dyn MemoryBackend,
        rng: &mut dyn RandomSource,
    ) -> Result<Option<BlastUnit>> {
        let size = mem.size(domain)?;
        let Some(address) = align_address(address, precision, alignment, size) else {
            return Ok(None);
        };
        let value: Vec<u8> = (0..precision).map(|_| rng.next_long(256) as u8).collect();
        Ok(Some(
            BlastUnit::new_value(domain, address, value).with_lifetime(self.lifetime),
        ))
    }

    fn caps_at_infinite_pool(&self) -> bool {
        self.lifetime == 0
    }
}

/// Generates STORE units that pin an address to its current value
///
/// Every unit is infinite-lifetime, so generation is capped at the
/// scheduler's infinite pool size.
#[derive(Debug, Clone, Copy, Default)]
pub struct FreezeGenerator;

impl UnitGenerator for FreezeGenerator {
    fn generate(
        &mut self,
        domain: &str,
        address: u64,
        precision: usize,
        alignment: u64,
        mem: &dyn MemoryBackend,
        _rng: &mut dyn RandomSource,
    ) -> Result<Option<BlastUnit>> {
        let size = mem.size(domain)?;
        let Some(address) = align_address(address, precision, alignment, size) else {
            return Ok(None);
        };
        Ok(Some(
            BlastUnit::new_store(domain, address, precision, domain, address).with_lifetime(0),
        ))
    }

    fn caps_at_infinite_pool(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_snaps_down_to_the_precision_grid() {
        assert_eq!(align_address(0x13, 4, 0, 0x100), Some(0x10));
        assert_eq!(align_address(0x10, 4, 0, 0x100), Some(0x10));
    }

    #[test]
    fn align_applies_the_alignment_offset() {
        assert_eq!(align_address(0x13, 4, 2, 0x100), Some(0x12));
    }

    #[test]
    fn align_clamps_the_tail_of_the_domain() {
        // The last grid slot itself still fits
        assert_eq!(align_address(0xff, 4, 0, 0x100), Some(0xfc));
        // An alignment offset pushing past the end lands on the previous slot
        assert_eq!(align_address(0xff, 4, 2, 0x100), Some(0xfa));
    }

    #[test]
    fn align_rejects_tiny_domains() {
        assert_eq!(align_address(0, 4, 0, 7), None);
        assert_eq!(align_address(0, 0, 0, 0x100), None);
    }
}
