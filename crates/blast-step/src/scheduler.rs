//! Frame scheduler
//!
//! Rather than handling every unit individually, units are filtered into
//! batches sharing a (due frame, lifetime, loop, limiter key) tuple and the
//! scheduler operates on whole batches: an admission buffer collects them,
//! `commit` sorts them into a frame-ordered queue, and each `tick` promotes
//! due batches into the applied pools, executes everything applied, expires
//! finished batches and re-queues looping ones.
//!
//! All state transitions happen under one mutex; the scheduler is a
//! synchronous state machine driven by an external stepping caller.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, error, trace, warn};

use blast_core::{
    BlastLayer, BlastUnit, ExecuteState, FilterRegistry, MemoryBackend, StepConfig,
};

use crate::error::{Result, StepError};
use crate::events::{StepObserver, StepPhase};

/// Units applied and expired together
type Batch = Vec<BlastUnit>;

/// Outcome of one tick
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepReport {
    /// Frame that was executed (the counter before advancing)
    pub frame: u64,
    /// Units that applied this tick
    pub executed_units: usize,
    /// Batches dropped unapplied by an entry guard
    pub dropped_batches: usize,
    /// Finite batches that expired this tick
    pub expired_batches: usize,
    /// Expired batches re-queued because they loop
    pub requeued_batches: usize,
}

/// Point-in-time scheduler counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Monotonic frame counter
    pub current_frame: u64,
    /// Frame of the earliest not-yet-applied batch
    pub next_frame: Option<u64>,
    /// Batches admitted but not yet committed
    pub uncommitted_batches: usize,
    /// Batches waiting in the frame-ordered queue
    pub queued_batches: usize,
    /// Applied batches with finite lifetime
    pub applied_finite_batches: usize,
    /// Applied batches with infinite lifetime
    pub applied_infinite_batches: usize,
    /// Whether ticks currently do any work
    pub running: bool,
}

#[derive(Debug, Default)]
struct SchedulerState {
    current_frame: u64,
    next_frame: Option<u64>,
    admission: Vec<Batch>,
    queued: VecDeque<Batch>,
    applied_finite: Vec<Batch>,
    applied_infinite: Vec<Batch>,
    is_running: bool,
}

/// The step scheduler
///
/// An owned instance; there is no process-wide singleton. Cheap to share
/// behind an `Arc` since every operation takes `&self`.
pub struct StepScheduler {
    config: StepConfig,
    state: Mutex<SchedulerState>,
    observers: Vec<Arc<dyn StepObserver>>,
}

impl StepScheduler {
    /// Create a scheduler with the given configuration
    #[must_use]
    pub fn new(config: StepConfig) -> Self {
        Self {
            config,
            state: Mutex::new(SchedulerState::default()),
            observers: Vec::new(),
        }
    }

    /// Active configuration
    #[must_use]
    pub fn config(&self) -> &StepConfig {
        &self.config
    }

    /// Register a lifecycle observer
    ///
    /// Observers fire in registration order, once per phase per tick.
    pub fn add_observer(&mut self, observer: Arc<dyn StepObserver>) {
        self.observers.push(observer);
    }

    fn fire(&self, phase: StepPhase, frame: u64) {
        trace!(?phase, frame, "step phase");
        for observer in &self.observers {
            observer.on_phase(phase, frame);
        }
    }

    /// Admit a unit, resolving its absolute timing against the current frame
    ///
    /// With `override_execute_frame` set (used when looping batches
    /// re-queue), the unit's `loop_timing` replaces `execute_frame`. A
    /// backend without real-time stepping collapses timing to "due
    /// immediately, lasts one application". The unit joins an existing
    /// admission batch when its scheduling tuple and limiter key match,
    /// otherwise it opens a new one.
    pub fn add(&self, unit: BlastUnit, override_execute_frame: bool, mem: &dyn MemoryBackend) {
        let mut state = self.state.lock();
        Self::add_locked(
            &mut state,
            unit,
            override_execute_frame,
            mem.supports_realtime(),
        );
    }

    /// Admit every unit of a layer
    pub fn add_layer(&self, layer: BlastLayer, mem: &dyn MemoryBackend) {
        let mut state = self.state.lock();
        let realtime = mem.supports_realtime();
        for unit in layer {
            Self::add_locked(&mut state, unit, false, realtime);
        }
    }

    fn add_locked(
        state: &mut SchedulerState,
        mut unit: BlastUnit,
        override_execute_frame: bool,
        realtime: bool,
    ) {
        if realtime {
            let offset = if override_execute_frame {
                // Looping units with a loop timing re-queue on it instead of
                // their original execute frame
                unit.loop_timing.unwrap_or(unit.execute_frame)
            } else {
                unit.execute_frame
            };
            let queued = state.current_frame + offset;
            // Lifetime is exclusive: 1 means exactly one application
            let last = (queued + unit.lifetime).saturating_sub(1);
            unit.resolve_timing(queued, last);
        } else {
            unit.resolve_timing(state.current_frame, state.current_frame);
        }

        let batch = Self::batch_for(state, &unit);
        batch.push(unit);
    }

    /// Find the admission batch the unit belongs to, creating one if no
    /// existing batch shares its scheduling tuple and limiter key
    fn batch_for<'a>(state: &'a mut SchedulerState, unit: &BlastUnit) -> &'a mut Batch {
        let queued = unit
            .working()
            .map_or(0, |w| w.execute_frame_queued);
        let position = state.admission.iter().position(|batch| {
            let head = &batch[0];
            head.working().map_or(0, |w| w.execute_frame_queued) == queued
                && head.lifetime == unit.lifetime
                && head.looping == unit.looping
                && head.limiters_match(unit)
        });
        match position {
            Some(i) => &mut state.admission[i],
            None => {
                debug!(frame = queued, lifetime = unit.lifetime, "opening new batch");
                state.admission.push(Vec::new());
                state.admission.last_mut().expect("just pushed")
            }
        }
    }

    /// Move admitted batches into the frame-ordered queue
    ///
    /// The whole queue is rebuilt with a stable sort on the due frame, so
    /// batches sharing a frame keep their admission order. Marks the
    /// scheduler runnable when the queue is non-empty.
    pub fn commit(&self) {
        let mut state = self.state.lock();
        Self::commit_locked(&mut state);
    }

    fn commit_locked(state: &mut SchedulerState) {
        let mut batches: Vec<Batch> = state.queued.drain(..).collect();
        batches.append(&mut state.admission);
        batches.sort_by_key(|batch| {
            batch[0]
                .working()
                .map_or(0, |w| w.execute_frame_queued)
        });
        debug!(batches = batches.len(), "committed batch queue");
        state.queued = batches.into();

        if let Some(front) = state.queued.front() {
            state.next_frame = front[0].working().map(|w| w.execute_frame_queued);
            state.is_running = true;
        } else {
            state.next_frame = None;
        }
    }

    /// Execute one frame
    ///
    /// Fires `Start`; while runnable, promotes every due batch (an entry
    /// guard rejecting any member drops the whole batch unapplied), captures
    /// store backups, fires `PreCorrupt`, executes the finite and infinite
    /// pools, fires `PostCorrupt`, advances the frame, expires finished
    /// batches and re-queues looping ones, then fires `End`.
    ///
    /// # Errors
    /// A fatal or handled unit failure stops the scheduler and is returned;
    /// batches already executed this tick are not rolled back, and `End`
    /// does not fire. The scheduler must be [`reset`](Self::reset) before it
    /// will run again.
    pub fn tick(
        &self,
        mem: &mut dyn MemoryBackend,
        limiters: &FilterRegistry,
    ) -> Result<StepReport> {
        let mut state = self.state.lock();
        let frame = state.current_frame;
        self.fire(StepPhase::Start, frame);

        let mut report = StepReport {
            frame,
            ..StepReport::default()
        };

        if state.is_running {
            match self.tick_running(&mut state, &mut report, mem, limiters) {
                Ok(()) => {}
                Err(e) => {
                    error!(error = %e, frame, "tick failed; scheduler stopped");
                    state.is_running = false;
                    return Err(e);
                }
            }
        }

        self.fire(StepPhase::End, frame);
        Ok(report)
    }

    fn tick_running(
        &self,
        state: &mut SchedulerState,
        report: &mut StepReport,
        mem: &mut dyn MemoryBackend,
        limiters: &FilterRegistry,
    ) -> Result<()> {
        let frame = report.frame;

        report.dropped_batches = Self::check_apply(state, limiters)?;
        Self::store_backups(state, mem)?;
        self.fire(StepPhase::PreCorrupt, frame);

        let (executed_finite, expired) =
            Self::execute_pool(&mut state.applied_finite, frame, true, mem, limiters)?;
        let (executed_infinite, _) =
            Self::execute_pool(&mut state.applied_infinite, frame, false, mem, limiters)?;
        report.executed_units = executed_finite + executed_infinite;

        self.fire(StepPhase::PostCorrupt, frame);
        state.current_frame += 1;

        let realtime = mem.supports_realtime();
        let mut needs_refilter = false;
        for i in expired.into_iter().rev() {
            let mut batch = state.applied_finite.remove(i);
            report.expired_batches += 1;
            let looping = batch[0].looping;
            for unit in &mut batch {
                unit.clear_working_data();
            }
            if looping {
                needs_refilter = true;
                report.requeued_batches += 1;
                for unit in batch {
                    let use_loop_timing = unit.loop_timing.is_some();
                    Self::add_locked(state, unit, use_loop_timing, realtime);
                }
            }
        }
        if needs_refilter {
            Self::commit_locked(state);
        }
        Ok(())
    }

    /// Promote every batch due at the current frame into the applied pools
    fn check_apply(state: &mut SchedulerState, limiters: &FilterRegistry) -> Result<usize> {
        let mut dropped = 0;
        while let Some(front) = state.queued.front() {
            let due = front[0].working().map_or(0, |w| w.execute_frame_queued);
            if due > state.current_frame {
                state.next_frame = Some(due);
                return Ok(dropped);
            }

            let mut batch = state.queued.pop_front().expect("front checked");
            let mut rejected = false;
            for unit in &mut batch {
                if !unit.entering_execution(limiters)? {
                    rejected = true;
                    break;
                }
            }
            if rejected {
                warn!(units = batch.len(), "entry guard rejected batch; dropped unapplied");
                dropped += 1;
            } else if batch[0].is_infinite() {
                state.applied_infinite.push(batch);
            } else {
                state.applied_finite.push(batch);
            }
        }
        state.next_frame = None;
        Ok(dropped)
    }

    /// Capture pre-mutation originals for every applied STORE unit
    fn store_backups(state: &mut SchedulerState, mem: &dyn MemoryBackend) -> Result<()> {
        for pool in [&mut state.applied_finite, &mut state.applied_infinite] {
            for batch in pool.iter_mut() {
                for unit in batch.iter_mut().filter(|u| u.is_store()) {
                    unit.store_backup(mem)?;
                }
            }
        }
        Ok(())
    }

    /// Execute every unit in the pool; optionally collect the indices of
    /// batches whose last frame is the one being executed
    fn execute_pool(
        pool: &mut [Batch],
        current_frame: u64,
        collect_expired: bool,
        mem: &mut dyn MemoryBackend,
        limiters: &FilterRegistry,
    ) -> Result<(usize, Vec<usize>)> {
        let mut executed = 0;
        let mut expired = Vec::new();
        for (i, batch) in pool.iter_mut().enumerate() {
            for unit in batch.iter_mut() {
                match unit.execute(mem, limiters) {
                    ExecuteState::Executed => executed += 1,
                    ExecuteState::NotExecuted => {}
                    ExecuteState::Error(source) => {
                        return Err(StepError::Fatal {
                            unit: unit.to_string(),
                            source,
                        });
                    }
                    ExecuteState::HandledError => return Err(StepError::Handled),
                }
            }
            if collect_expired
                && batch[0]
                    .working()
                    .is_some_and(|w| w.last_frame == current_frame)
            {
                expired.push(i);
            }
        }
        Ok((executed, expired))
    }

    /// Evict the oldest-admitted infinite batches above the configured cap
    ///
    /// Skipped entirely while execution is locked. Returns how many batches
    /// were evicted.
    pub fn evict_excess_infinite(&self) -> usize {
        if self.config.lock_execution {
            return 0;
        }
        let mut state = self.state.lock();
        let mut evicted = 0;
        while state.applied_infinite.len() > self.config.max_infinite_units {
            let batch = state.applied_infinite.remove(0);
            debug!(units = batch.len(), "evicted oldest infinite batch");
            evicted += 1;
        }
        evicted
    }

    /// Remove applied infinite units matching `(domain, address)` exactly
    ///
    /// The whole containing batch is removed, mirroring batch-granularity
    /// scheduling. Returns whether anything was removed.
    pub fn remove_infinite_at(&self, domain: &str, address: u64) -> bool {
        let mut state = self.state.lock();
        let before = state.applied_infinite.len();
        state.applied_infinite.retain(|batch| {
            !batch
                .iter()
                .any(|u| u.is_infinite() && u.domain == domain && u.address == address)
        });
        state.applied_infinite.len() != before
    }

    /// Whether an applied infinite unit targets `(domain, address)`
    #[must_use]
    pub fn infinite_unit_exists(&self, domain: &str, address: u64) -> bool {
        let state = self.state.lock();
        state.applied_infinite.iter().any(|batch| {
            batch
                .iter()
                .any(|u| u.is_infinite() && u.domain == domain && u.address == address)
        })
    }

    /// Clear all pools and queues and return to the initial state
    ///
    /// Working data on every applied unit is released first so STORE
    /// backups cannot leak across sessions.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        let state = &mut *state;
        for pool in [&mut state.applied_finite, &mut state.applied_infinite] {
            for batch in pool.iter_mut() {
                for unit in batch.iter_mut() {
                    unit.clear_working_data();
                }
            }
        }
        *state = SchedulerState::default();
        debug!("scheduler reset");
    }

    /// Every applied infinite unit flattened into one layer
    #[must_use]
    pub fn applied_infinite_layer(&self) -> BlastLayer {
        let state = self.state.lock();
        BlastLayer::with_units(
            state
                .applied_infinite
                .iter()
                .flatten()
                .cloned()
                .collect(),
        )
    }

    /// Every admitted-but-uncommitted unit flattened into one layer
    #[must_use]
    pub fn raw_uncommitted_layer(&self) -> BlastLayer {
        let state = self.state.lock();
        BlastLayer::with_units(state.admission.iter().flatten().cloned().collect())
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> StepStats {
        let state = self.state.lock();
        StepStats {
            current_frame: state.current_frame,
            next_frame: state.next_frame,
            uncommitted_batches: state.admission.len(),
            queued_batches: state.queued.len(),
            applied_finite_batches: state.applied_finite.len(),
            applied_infinite_batches: state.applied_infinite.len(),
            running: state.is_running,
        }
    }
}

impl std::fmt::Debug for StepScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepScheduler")
            .field("config", &self.config)
            .field("stats", &self.stats())
            .field("observers", &self.observers.len())
            .finish()
    }
}
