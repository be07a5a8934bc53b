//! Step lifecycle events
//!
//! Four phases fire once per tick, in a fixed order. Observers replace the
//! multicast delegates of older designs: the scheduler walks an explicit
//! listener list, so ordering is the registration order.

/// Phase of a scheduler tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepPhase {
    /// Tick began
    Start,
    /// Store backups captured; corruption about to apply
    PreCorrupt,
    /// All due units applied this frame
    PostCorrupt,
    /// Tick finished
    End,
}

/// Listener for scheduler lifecycle phases
///
/// Callbacks run while the scheduler lock is held; observers must not call
/// back into the scheduler.
pub trait StepObserver: Send + Sync {
    /// Called once per phase per tick, with the frame being executed
    fn on_phase(&self, phase: StepPhase, frame: u64);
}
