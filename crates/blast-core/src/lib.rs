//! blast-core - Data model for frame-scheduled byte corruption
//!
//! The leaf entities shared by the whole workspace:
//! - [`BlastUnit`]: one scheduled, reversible byte mutation
//! - [`BlastLayer`] / [`BlastSet`]: ordered and layered unit collections
//! - Collaborator traits for the memory backend, random source, limiter
//!   lists and unit generators
//! - Typed configuration for the engine and scheduler
//!
//! # Example
//!
//! ```rust
//! use blast_core::{BlastLayer, BlastUnit};
//!
//! let mut layer = BlastLayer::new();
//! layer.push(BlastUnit::new_value("wram", 0x100, vec![0xff]).with_lifetime(3));
//! assert_eq!(layer.len(), 1);
//! ```

#![warn(unreachable_pub)]

pub mod config;
pub mod error;
pub mod generator;
pub mod layer;
pub mod limiter;
pub mod memory;
pub mod rng;
pub mod set;
pub mod unit;

// Re-exports for convenience
pub use config::{BlastRadius, EngineConfig, StepConfig};
pub use error::{CoreError, Result};
pub use generator::{LayerProducer, UnitGenerator};
pub use layer::BlastLayer;
pub use limiter::{FilterRegistry, ListFilter};
pub use memory::MemoryBackend;
pub use rng::{RandomSource, SeededRng};
pub use set::BlastSet;
pub use unit::{
    BlastUnit, ExecuteState, LimiterTime, StoreLimiterSource, UnitSource, WorkingData,
};
