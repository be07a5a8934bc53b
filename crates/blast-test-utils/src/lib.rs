//! Testing utilities for the blast workspace
//!
//! Shared fixtures: an in-memory backend, scripted random sources, simple
//! limiter filters and unit generators with predictable behavior.

#![allow(missing_docs)]

use std::collections::VecDeque;

use indexmap::IndexMap;
use parking_lot::Mutex;

use blast_core::{
    BlastUnit, CoreError, ListFilter, MemoryBackend, RandomSource, Result, UnitGenerator,
};

/// In-memory backend with named domains backed by byte vectors
#[derive(Debug, Clone, Default)]
pub struct FakeMemory {
    domains: IndexMap<String, Vec<u8>>,
    realtime: bool,
}

impl FakeMemory {
    #[must_use]
    pub fn new() -> Self {
        Self {
            domains: IndexMap::new(),
            realtime: true,
        }
    }

    /// Add a zero-filled domain of the given size
    #[must_use]
    pub fn with_domain(mut self, name: &str, size: usize) -> Self {
        self.domains.insert(name.to_string(), vec![0; size]);
        self
    }

    /// Add a domain with explicit contents
    #[must_use]
    pub fn with_domain_bytes(mut self, name: &str, bytes: Vec<u8>) -> Self {
        self.domains.insert(name.to_string(), bytes);
        self
    }

    #[must_use]
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    /// Raw bytes of a domain, for assertions
    #[must_use]
    pub fn bytes(&self, domain: &str) -> &[u8] {
        &self.domains[domain]
    }

    /// Remove a domain mid-test, simulating a host memory-map swap
    pub fn drop_domain(&mut self, domain: &str) {
        self.domains.shift_remove(domain);
    }

    fn resolve(&self, domain: &str) -> Result<&Vec<u8>> {
        self.domains
            .get(domain)
            .ok_or_else(|| CoreError::UnresolvedDomain {
                domain: domain.to_string(),
            })
    }
}

impl MemoryBackend for FakeMemory {
    fn size(&self, domain: &str) -> Result<u64> {
        Ok(self.resolve(domain)?.len() as u64)
    }

    fn peek_bytes(&self, domain: &str, start: u64, len: usize) -> Result<Vec<u8>> {
        self.check_range(domain, start, len)?;
        let bytes = self.resolve(domain)?;
        let start = start as usize;
        Ok(bytes[start..start + len].to_vec())
    }

    fn poke_bytes(&mut self, domain: &str, start: u64, bytes: &[u8]) -> Result<()> {
        self.check_range(domain, start, bytes.len())?;
        let target = self
            .domains
            .get_mut(domain)
            .ok_or_else(|| CoreError::UnresolvedDomain {
                domain: domain.to_string(),
            })?;
        let start = start as usize;
        target[start..start + bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    fn supports_realtime(&self) -> bool {
        self.realtime
    }
}

/// Random source replaying a scripted sequence of values
///
/// Each call pops the next value and reduces it modulo the bound; an
/// exhausted script yields zeros.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRng {
    values: VecDeque<u64>,
}

impl ScriptedRng {
    #[must_use]
    pub fn new(values: impl IntoIterator<Item = u64>) -> Self {
        Self {
            values: values.into_iter().collect(),
        }
    }

    fn next(&mut self) -> u64 {
        self.values.pop_front().unwrap_or(0)
    }
}

impl RandomSource for ScriptedRng {
    fn next_index(&mut self, bound: usize) -> usize {
        if bound == 0 {
            return 0;
        }
        (self.next() % bound as u64) as usize
    }

    fn next_long(&mut self, bound: u64) -> u64 {
        if bound == 0 {
            return 0;
        }
        self.next() % bound
    }
}

/// Limiter permitting only ranges inside `[lo, hi)` of a single domain
/// (or any domain when none is given)
#[derive(Debug, Clone)]
pub struct RangeFilter {
    pub lo: u64,
    pub hi: u64,
    pub domain: Option<String>,
}

impl RangeFilter {
    #[must_use]
    pub fn new(lo: u64, hi: u64) -> Self {
        Self {
            lo,
            hi,
            domain: None,
        }
    }

    #[must_use]
    pub fn for_domain(mut self, domain: &str) -> Self {
        self.domain = Some(domain.to_string());
        self
    }
}

impl ListFilter for RangeFilter {
    fn precision(&self) -> usize {
        1
    }

    fn matches(&self, start: u64, end: u64, domain: &str) -> bool {
        if let Some(wanted) = &self.domain {
            if wanted != domain {
                return false;
            }
        }
        start >= self.lo && end <= self.hi
    }
}

/// Generator emitting a VALUE unit at exactly the drawn address, no
/// alignment, payload of zeros
#[derive(Debug, Clone)]
pub struct StubGenerator {
    pub lifetime: u64,
    pub infinite_cost: bool,
}

impl Default for StubGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl StubGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lifetime: 1,
            infinite_cost: false,
        }
    }

    #[must_use]
    pub fn with_lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = lifetime;
        self
    }

    #[must_use]
    pub fn with_infinite_cost(mut self) -> Self {
        self.infinite_cost = true;
        self
    }
}

impl UnitGenerator for StubGenerator {
    fn generate(
        &mut self,
        domain: &str,
        address: u64,
        precision: usize,
        _alignment: u64,
        _mem: &dyn MemoryBackend,
        _rng: &mut dyn RandomSource,
    ) -> Result<Option<BlastUnit>> {
        Ok(Some(
            BlastUnit::new_value(domain, address, vec![0; precision]).with_lifetime(self.lifetime),
        ))
    }

    fn caps_at_infinite_pool(&self) -> bool {
        self.infinite_cost
    }
}

/// Generator refusing every draw, for exercising the all-skipped path
#[derive(Debug, Clone, Copy, Default)]
pub struct NeverGenerator;

impl UnitGenerator for NeverGenerator {
    fn generate(
        &mut self,
        _domain: &str,
        _address: u64,
        _precision: usize,
        _alignment: u64,
        _mem: &dyn MemoryBackend,
        _rng: &mut dyn RandomSource,
    ) -> Result<Option<BlastUnit>> {
        Ok(None)
    }
}

/// Thread-safe journal of observed values, shared between a fixture and the
/// assertions in a test body
#[derive(Debug, Default)]
pub struct Journal<T>(Mutex<Vec<T>>);

impl<T: Clone> Journal<T> {
    #[must_use]
    pub fn new() -> Self {
        Self(Mutex::new(Vec::new()))
    }

    pub fn record(&self, value: T) {
        self.0.lock().push(value);
    }

    #[must_use]
    pub fn entries(&self) -> Vec<T> {
        self.0.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_memory_peeks_and_pokes() {
        let mut mem = FakeMemory::new().with_domain("wram", 16);
        mem.poke_bytes("wram", 4, &[1, 2, 3]).unwrap();
        assert_eq!(mem.peek_bytes("wram", 4, 3).unwrap(), vec![1, 2, 3]);
        assert!(mem.peek_bytes("wram", 15, 2).is_err());
        assert!(mem.size("vram").is_err());
    }

    #[test]
    fn scripted_rng_replays_and_then_zeros() {
        let mut rng = ScriptedRng::new([5, 17]);
        assert_eq!(rng.next_long(10), 5);
        assert_eq!(rng.next_long(10), 7);
        assert_eq!(rng.next_long(10), 0);
    }

    #[test]
    fn range_filter_honors_the_domain_pin() {
        let filter = RangeFilter::new(0, 0x10).for_domain("wram");
        assert!(filter.matches(0, 4, "wram"));
        assert!(!filter.matches(0, 4, "vram"));
        assert!(!filter.matches(0x8, 0x18, "wram"));
    }
}
