//! Blast units
//!
//! A [`BlastUnit`] is one scheduled byte-level mutation against a memory
//! domain. Its identity is the scheduling + target tuple; collections of
//! units sharing that tuple are applied and expired together by the
//! scheduler.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{error, trace, warn};

use crate::error::{CoreError, Result};
use crate::limiter::FilterRegistry;
use crate::memory::MemoryBackend;

/// Where a unit's bytes come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnitSource {
    /// A fixed payload written as-is
    Value {
        /// Bytes to write; length equals the unit precision
        value: Vec<u8>,
    },
    /// Bytes backed up from a source location, then re-applied
    Store {
        /// Domain the backup is read from
        source_domain: String,
        /// Address the backup is read from
        source_address: u64,
    },
}

/// Phase at which a unit's limiter is evaluated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LimiterTime {
    /// No limiter evaluation
    #[default]
    None,
    /// Evaluated when the unit's batch enters execution; a rejection drops
    /// the entire batch
    PreExecute,
    /// Evaluated on every application; a rejection skips only that unit
    Execute,
}

/// Which address pair participates in batch-matching for STORE units
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StoreLimiterSource {
    /// Match on the target (domain, address)
    #[default]
    Address,
    /// Match on the source (domain, address)
    SourceAddress,
    /// Match on both pairs
    Both,
}

/// Outcome of a single unit application
#[derive(Debug, Clone, PartialEq)]
pub enum ExecuteState {
    /// The unit did not apply this frame (no backup yet, or an execute-time
    /// limiter rejected it)
    NotExecuted,
    /// The unit applied
    Executed,
    /// Unrecoverable failure; the scheduler must stop
    Error(CoreError),
    /// Failure already logged and classified; the scheduler stops without
    /// further propagation
    HandledError,
}

/// Scheduler-owned working state, populated while a unit is queued or applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingData {
    /// Absolute frame the unit becomes due
    pub execute_frame_queued: u64,
    /// Absolute frame after which the unit expires, inclusive of the last
    /// application
    pub last_frame: u64,
    /// Backed-up original values for STORE units
    pub store_data: VecDeque<Vec<u8>>,
}

/// One scheduled byte mutation with timing, lifetime, loop and limiter
/// metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlastUnit {
    /// Target domain name
    pub domain: String,
    /// Target address
    pub address: u64,
    /// Byte width of the mutation
    pub precision: usize,
    /// Payload source
    pub source: UnitSource,
    /// Frames the unit stays applied; 0 means infinite
    pub lifetime: u64,
    /// Frame offset at which the unit first becomes due
    pub execute_frame: u64,
    /// Whether the unit re-queues itself on expiry
    pub looping: bool,
    /// Frame offset used instead of `execute_frame` on re-queue
    pub loop_timing: Option<u64>,
    /// Named limiter list gating the target range, if any
    pub limiter_list: Option<String>,
    /// Phase at which the limiter is evaluated
    pub limiter_time: LimiterTime,
    /// Invert the limiter verdict
    pub invert_limiter: bool,
    /// Address pair used for batch-matching STORE units
    pub store_limiter_source: StoreLimiterSource,
    #[serde(skip)]
    working: Option<WorkingData>,
}

impl BlastUnit {
    /// Create a VALUE unit; precision is taken from the payload length
    #[must_use]
    pub fn new_value(domain: impl Into<String>, address: u64, value: Vec<u8>) -> Self {
        let precision = value.len();
        Self {
            domain: domain.into(),
            address,
            precision,
            source: UnitSource::Value { value },
            lifetime: 1,
            execute_frame: 0,
            looping: false,
            loop_timing: None,
            limiter_list: None,
            limiter_time: LimiterTime::default(),
            invert_limiter: false,
            store_limiter_source: StoreLimiterSource::default(),
            working: None,
        }
    }

    /// Create a STORE unit backing up `precision` bytes from the source pair
    #[must_use]
    pub fn new_store(
        domain: impl Into<String>,
        address: u64,
        precision: usize,
        source_domain: impl Into<String>,
        source_address: u64,
    ) -> Self {
        Self {
            domain: domain.into(),
            address,
            precision,
            source: UnitSource::Store {
                source_domain: source_domain.into(),
                source_address,
            },
            lifetime: 1,
            execute_frame: 0,
            looping: false,
            loop_timing: None,
            limiter_list: None,
            limiter_time: LimiterTime::default(),
            invert_limiter: false,
            store_limiter_source: StoreLimiterSource::default(),
            working: None,
        }
    }

    /// Set the lifetime in frames (0 = infinite)
    #[must_use]
    pub fn with_lifetime(mut self, lifetime: u64) -> Self {
        self.lifetime = lifetime;
        self
    }

    /// Set the frame offset at which the unit first becomes due
    #[must_use]
    pub fn with_execute_frame(mut self, execute_frame: u64) -> Self {
        self.execute_frame = execute_frame;
        self
    }

    /// Mark the unit looping, with an optional re-queue offset
    #[must_use]
    pub fn with_loop(mut self, loop_timing: Option<u64>) -> Self {
        self.looping = true;
        self.loop_timing = loop_timing;
        self
    }

    /// Attach a limiter list
    #[must_use]
    pub fn with_limiter(
        mut self,
        list: impl Into<String>,
        time: LimiterTime,
        invert: bool,
    ) -> Self {
        self.limiter_list = Some(list.into());
        self.limiter_time = time;
        self.invert_limiter = invert;
        self
    }

    /// Select which address pair participates in STORE batch-matching
    #[must_use]
    pub fn with_store_limiter_source(mut self, source: StoreLimiterSource) -> Self {
        self.store_limiter_source = source;
        self
    }

    /// Whether this is a STORE unit
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(self.source, UnitSource::Store { .. })
    }

    /// Whether the unit persists until explicitly removed or evicted
    #[must_use]
    pub fn is_infinite(&self) -> bool {
        self.lifetime == 0
    }

    /// Scheduler-owned working state, if the unit is queued or applied
    #[must_use]
    pub fn working(&self) -> Option<&WorkingData> {
        self.working.as_ref()
    }

    /// Populate working state with resolved absolute frames
    ///
    /// Called by the scheduler on admission. Any previous working state
    /// (including store backups) is discarded.
    pub fn resolve_timing(&mut self, execute_frame_queued: u64, last_frame: u64) {
        self.working = Some(WorkingData {
            execute_frame_queued,
            last_frame,
            store_data: VecDeque::new(),
        });
    }

    /// Release working state on expiry or reset
    pub fn clear_working_data(&mut self) {
        self.working = None;
    }

    /// Evaluate the unit's limiter over its target range
    ///
    /// `Ok(true)` means the mutation is permitted. Units without a limiter
    /// list always pass.
    ///
    /// # Errors
    /// `CoreError::UnknownLimiter` if the referenced list is not registered.
    pub fn check_limiter(&self, limiters: &FilterRegistry) -> Result<bool> {
        let Some(list) = &self.limiter_list else {
            return Ok(true);
        };
        let filter = limiters.get(list).ok_or_else(|| CoreError::UnknownLimiter {
            list: list.clone(),
        })?;
        let end = self.address.saturating_add(self.precision as u64);
        let permitted = filter.matches(self.address, end, &self.domain);
        Ok(permitted != self.invert_limiter)
    }

    /// Entry guard evaluated when the unit's batch is promoted
    ///
    /// Returns `Ok(false)` if a pre-execute limiter rejects the unit, in
    /// which case the scheduler drops the whole batch unapplied.
    pub fn entering_execution(&mut self, limiters: &FilterRegistry) -> Result<bool> {
        if self.limiter_time == LimiterTime::PreExecute && !self.check_limiter(limiters)? {
            trace!(unit = %self, "pre-execute limiter rejected unit");
            return Ok(false);
        }
        Ok(true)
    }

    /// Capture the pre-mutation original value for a STORE unit
    ///
    /// The backup is taken once per working lifetime; later calls are no-ops.
    pub fn store_backup(&mut self, mem: &dyn MemoryBackend) -> Result<()> {
        let UnitSource::Store {
            source_domain,
            source_address,
        } = &self.source
        else {
            return Ok(());
        };
        let Some(working) = self.working.as_mut() else {
            return Ok(());
        };
        if !working.store_data.is_empty() {
            return Ok(());
        }
        let bytes = mem.peek_bytes(source_domain, *source_address, self.precision)?;
        working.store_data.push_back(bytes);
        Ok(())
    }

    /// Apply the unit once
    ///
    /// Backend failures on an unresolved domain are classified as already
    /// handled (the host swapped its memory map out from under us); any
    /// other failure is unrecoverable.
    pub fn execute(
        &mut self,
        mem: &mut dyn MemoryBackend,
        limiters: &FilterRegistry,
    ) -> ExecuteState {
        if self.working.is_none() {
            error!(unit = %self, "execute called without working data");
            debug_assert!(false, "unit executed without resolved timing");
            return ExecuteState::NotExecuted;
        }

        if self.limiter_time == LimiterTime::Execute {
            match self.check_limiter(limiters) {
                Ok(true) => {}
                Ok(false) => {
                    trace!(unit = %self, "execute-time limiter skipped unit");
                    return ExecuteState::NotExecuted;
                }
                Err(e) => return ExecuteState::Error(e),
            }
        }

        let bytes = match &self.source {
            UnitSource::Value { value } => value.clone(),
            UnitSource::Store { .. } => {
                let working = self.working.as_ref().expect("checked above");
                match working.store_data.front() {
                    Some(bytes) => bytes.clone(),
                    // Backup not captured yet; applies next frame
                    None => return ExecuteState::NotExecuted,
                }
            }
        };

        match mem.poke_bytes(&self.domain, self.address, &bytes) {
            Ok(()) => {
                trace!(unit = %self, "unit applied");
                ExecuteState::Executed
            }
            Err(e @ CoreError::UnresolvedDomain { .. }) => {
                warn!(unit = %self, error = %e, "domain vanished during execution");
                ExecuteState::HandledError
            }
            Err(e) => ExecuteState::Error(e),
        }
    }

    /// Whether `other` may share a batch with `self` under the limiter rules
    ///
    /// Only pre-execute limiters constrain batching; at any other phase the
    /// limiter is independent of the batch. STORE units match on the address
    /// pair selected by `store_limiter_source`; VALUE units match on the
    /// target pair.
    #[must_use]
    pub fn limiters_match(&self, other: &Self) -> bool {
        if self.limiter_time != LimiterTime::PreExecute {
            return true;
        }
        if self.limiter_list != other.limiter_list
            || self.limiter_time != other.limiter_time
            || self.invert_limiter != other.invert_limiter
        {
            return false;
        }
        match (&self.source, &other.source) {
            (
                UnitSource::Store {
                    source_domain: ours,
                    source_address: our_addr,
                },
                UnitSource::Store {
                    source_domain: theirs,
                    source_address: their_addr,
                },
            ) => match self.store_limiter_source {
                StoreLimiterSource::Address => {
                    self.address == other.address && self.domain == other.domain
                }
                StoreLimiterSource::SourceAddress => ours == theirs && our_addr == their_addr,
                StoreLimiterSource::Both => {
                    self.address == other.address
                        && self.domain == other.domain
                        && ours == theirs
                        && our_addr == their_addr
                }
            },
            (UnitSource::Value { .. }, UnitSource::Value { .. }) => {
                self.address == other.address && self.domain == other.domain
            }
            _ => false,
        }
    }
}

impl fmt::Display for BlastUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = if self.is_store() { "STORE" } else { "VALUE" };
        write!(
            f,
            "{kind} {domain}:{address:#x}[{precision}]",
            domain = self.domain,
            address = self.address,
            precision = self.precision
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limiter::ListFilter;
    use std::sync::Arc;

    struct Whitelist {
        lo: u64,
        hi: u64,
    }

    impl ListFilter for Whitelist {
        fn precision(&self) -> usize {
            1
        }

        fn matches(&self, start: u64, end: u64, _domain: &str) -> bool {
            start >= self.lo && end <= self.hi
        }
    }

    fn registry() -> FilterRegistry {
        let mut reg = FilterRegistry::new();
        reg.register("low", Arc::new(Whitelist { lo: 0, hi: 0x100 }));
        reg
    }

    #[test]
    fn value_constructor_takes_precision_from_payload() {
        let unit = BlastUnit::new_value("wram", 0x10, vec![1, 2, 3, 4]);
        assert_eq!(unit.precision, 4);
        assert!(!unit.is_store());
        assert!(!unit.is_infinite());
    }

    #[test]
    fn lifetime_zero_is_infinite() {
        let unit = BlastUnit::new_value("wram", 0, vec![0]).with_lifetime(0);
        assert!(unit.is_infinite());
    }

    #[test]
    fn limiter_permits_range_inside_list() {
        let reg = registry();
        let unit = BlastUnit::new_value("wram", 0x20, vec![0; 2]).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );
        assert!(unit.check_limiter(&reg).unwrap());
    }

    #[test]
    fn limiter_rejects_range_outside_list() {
        let reg = registry();
        let unit = BlastUnit::new_value("wram", 0x200, vec![0; 2]).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );
        assert!(!unit.check_limiter(&reg).unwrap());
    }

    #[test]
    fn inverted_limiter_flips_the_verdict() {
        let reg = registry();
        let unit = BlastUnit::new_value("wram", 0x200, vec![0; 2]).with_limiter(
            "low",
            LimiterTime::PreExecute,
            true,
        );
        assert!(unit.check_limiter(&reg).unwrap());
    }

    #[test]
    fn limiter_near_address_space_end_does_not_overflow() {
        let reg = registry();
        let unit = BlastUnit::new_value("wram", u64::MAX - 1, vec![0; 4]).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );
        assert!(!unit.check_limiter(&reg).unwrap());
    }

    #[test]
    fn execute_states_compare_by_value() {
        let failed = ExecuteState::Error(CoreError::UnresolvedDomain {
            domain: "wram".to_string(),
        });
        assert_eq!(failed.clone(), failed);
        assert_ne!(failed, ExecuteState::Executed);
        assert_ne!(ExecuteState::NotExecuted, ExecuteState::HandledError);
    }

    #[test]
    fn unknown_limiter_list_is_an_error() {
        let reg = registry();
        let unit = BlastUnit::new_value("wram", 0, vec![0]).with_limiter(
            "missing",
            LimiterTime::PreExecute,
            false,
        );
        assert!(matches!(
            unit.check_limiter(&reg),
            Err(CoreError::UnknownLimiter { .. })
        ));
    }

    #[test]
    fn non_pre_execute_limiters_always_batch_together() {
        let a = BlastUnit::new_value("wram", 0x10, vec![0]);
        let b = BlastUnit::new_value("wram", 0x999, vec![0]);
        assert!(a.limiters_match(&b));
    }

    #[test]
    fn pre_execute_value_units_batch_on_target_pair() {
        let a = BlastUnit::new_value("wram", 0x10, vec![0]).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );
        let b = BlastUnit::new_value("wram", 0x10, vec![9]).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );
        let c = BlastUnit::new_value("wram", 0x11, vec![9]).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );
        assert!(a.limiters_match(&b));
        assert!(!a.limiters_match(&c));
    }

    #[test]
    fn store_units_batch_on_selected_pair() {
        let base = BlastUnit::new_store("wram", 0x10, 1, "rom", 0x40).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );
        let same_source = BlastUnit::new_store("wram", 0x99, 1, "rom", 0x40).with_limiter(
            "low",
            LimiterTime::PreExecute,
            false,
        );

        let by_address = base.clone().with_store_limiter_source(StoreLimiterSource::Address);
        assert!(!by_address.limiters_match(&same_source));

        let by_source =
            base.clone().with_store_limiter_source(StoreLimiterSource::SourceAddress);
        assert!(by_source.limiters_match(&same_source));

        let by_both = base.with_store_limiter_source(StoreLimiterSource::Both);
        assert!(!by_both.limiters_match(&same_source));
    }

    #[test]
    fn resolve_timing_clears_previous_backups() {
        let mut unit = BlastUnit::new_store("wram", 0, 1, "wram", 0);
        unit.resolve_timing(0, 0);
        unit.working = Some(WorkingData {
            execute_frame_queued: 0,
            last_frame: 0,
            store_data: VecDeque::from(vec![vec![0xaa]]),
        });
        unit.resolve_timing(5, 7);
        let working = unit.working().unwrap();
        assert_eq!(working.execute_frame_queued, 5);
        assert_eq!(working.last_frame, 7);
        assert!(working.store_data.is_empty());
    }

    #[test]
    fn serde_round_trip_skips_working_data() {
        let mut unit = BlastUnit::new_value("wram", 0x30, vec![0xde, 0xad])
            .with_lifetime(3)
            .with_loop(Some(2));
        unit.resolve_timing(1, 3);

        let json = serde_json::to_string(&unit).unwrap();
        let back: BlastUnit = serde_json::from_str(&json).unwrap();

        assert_eq!(back.domain, unit.domain);
        assert_eq!(back.lifetime, 3);
        assert_eq!(back.loop_timing, Some(2));
        assert!(back.working().is_none());
    }
}
