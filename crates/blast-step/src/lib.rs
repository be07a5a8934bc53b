//! blast-step - Frame scheduler for blast units
//!
//! Batches units by shared scheduling identity, queues the batches in frame
//! order and, once per external tick, applies everything due: promotion,
//! store backups, execution, expiry and loop re-queuing, all under a single
//! execution lock.
//!
//! # Example
//!
//! ```rust,ignore
//! use blast_core::{FilterRegistry, StepConfig};
//! use blast_step::StepScheduler;
//!
//! let scheduler = StepScheduler::new(StepConfig::default());
//! scheduler.add_layer(layer, &mem);
//! scheduler.commit();
//! let report = scheduler.tick(&mut mem, &FilterRegistry::new())?;
//! ```

#![warn(unreachable_pub)]

pub mod error;
pub mod events;
pub mod scheduler;

// Re-exports for convenience
pub use error::StepError;
pub use events::{StepObserver, StepPhase};
pub use scheduler::{StepReport, StepScheduler, StepStats};
