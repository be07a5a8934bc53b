//! blast-engine - Spatial distribution of blast units
//!
//! Turns an intensity and a set of target domains into a concrete
//! [`blast_core::BlastLayer`] using one of six distribution strategies, with
//! pluggable per-corruption-kind unit generators.
//!
//! # Example
//!
//! ```rust,ignore
//! use blast_core::{EngineConfig, SeededRng};
//! use blast_engine::{Distributor, RandomValueGenerator};
//!
//! let mut distributor = Distributor::new(
//!     EngineConfig::default(),
//!     Box::new(RandomValueGenerator::default()),
//!     Box::new(SeededRng::from_entropy()),
//! );
//! let layer = distributor.generate(&mem, &domains, None)?;
//! ```

#![warn(unreachable_pub)]

pub mod distribution;
pub mod error;
pub mod generators;

// Re-exports for convenience
pub use distribution::Distributor;
pub use error::EngineError;
pub use generators::{align_address, FreezeGenerator, RandomValueGenerator};
