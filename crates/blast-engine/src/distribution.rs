//! Layer generation across target domains
//!
//! The [`Distributor`] turns an intensity (requested unit count) and a list
//! of target domains into a [`BlastLayer`] using one of the [`BlastRadius`]
//! strategies. Generation is deterministic given a seeded random source.

use blast_core::{
    BlastLayer, BlastRadius, EngineConfig, LayerProducer, MemoryBackend, RandomSource,
    UnitGenerator,
};
use tracing::{debug, warn};

use crate::error::{EngineError, Result};

/// Rounds fired by the burst strategy
const BURST_ROUNDS: u64 = 10;

/// Distribution engine
///
/// Stateless per call aside from the owned random source; not safe for
/// concurrent calls against the same instance.
pub struct Distributor {
    config: EngineConfig,
    infinite_cap: usize,
    generator: Box<dyn UnitGenerator>,
    rng: Box<dyn RandomSource>,
    producer: Option<Box<dyn LayerProducer>>,
}

impl Distributor {
    /// Create a distributor from a configuration, unit generator and random
    /// source
    #[must_use]
    pub fn new(
        config: EngineConfig,
        generator: Box<dyn UnitGenerator>,
        rng: Box<dyn RandomSource>,
    ) -> Self {
        Self {
            config,
            infinite_cap: blast_core::StepConfig::default().max_infinite_units,
            generator,
            rng,
            producer: None,
        }
    }

    /// Cap applied to the intensity when the generator fills the infinite
    /// pool
    #[must_use]
    pub fn with_infinite_cap(mut self, cap: usize) -> Self {
        self.infinite_cap = cap;
        self
    }

    /// Install an external layer producer consulted instead of the
    /// distribution strategies
    #[must_use]
    pub fn with_producer(mut self, producer: Box<dyn LayerProducer>) -> Self {
        self.producer = Some(producer);
        self
    }

    /// Current configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Replace the configuration
    pub fn set_config(&mut self, config: EngineConfig) {
        self.config = config;
    }

    /// Generate a layer for the selected domains
    ///
    /// Returns `Ok(None)` when no domains are selected, the effective
    /// intensity is zero, or every draw was skipped by the generator. With
    /// an external producer installed, its output is passed through
    /// unmodified and an empty (never absent) layer stands in for a missing
    /// batch, so callers that explicitly selected a target set never see
    /// `None`.
    ///
    /// # Errors
    /// `EngineError::Core` if a named domain cannot be resolved; no partial
    /// layer is returned.
    pub fn generate(
        &mut self,
        mem: &dyn MemoryBackend,
        domains: &[String],
        intensity_override: Option<u64>,
    ) -> Result<Option<BlastLayer>> {
        if let Some(producer) = self.producer.as_mut() {
            let layer = producer.produce()?.unwrap_or_default();
            debug!(units = layer.len(), "external producer supplied layer");
            return Ok(Some(layer));
        }

        if domains.is_empty() {
            return Ok(None);
        }
        if self.config.precision == 0 {
            return Err(EngineError::InvalidConfig {
                reason: "precision must be at least one byte".to_string(),
            });
        }

        let mut intensity = intensity_override.unwrap_or(self.config.intensity);
        if intensity == 0 {
            return Ok(None);
        }
        if self.generator.caps_at_infinite_pool() && intensity > self.infinite_cap as u64 {
            warn!(
                intensity,
                cap = self.infinite_cap,
                "capping intensity to the infinite pool size"
            );
            intensity = self.infinite_cap as u64;
        }

        // Domain sizes are looked up once per call; intensity can be large
        let sizes: Vec<u64> = domains
            .iter()
            .map(|d| mem.size(d))
            .collect::<blast_core::Result<_>>()?;

        debug!(
            radius = %self.config.radius,
            intensity,
            domains = domains.len(),
            "generating blast layer"
        );

        let mut layer = BlastLayer::new();
        match self.config.radius {
            BlastRadius::Spread => {
                for _ in 0..intensity {
                    let r = self.rng.next_index(domains.len());
                    self.draw(mem, &mut layer, &domains[r], sizes[r])?;
                }
            }
            BlastRadius::Chunk => {
                let r = self.rng.next_index(domains.len());
                for _ in 0..intensity {
                    self.draw(mem, &mut layer, &domains[r], sizes[r])?;
                }
            }
            BlastRadius::Burst => {
                for _ in 0..BURST_ROUNDS {
                    let r = self.rng.next_index(domains.len());
                    for _ in 0..(intensity / BURST_ROUNDS) {
                        self.draw(mem, &mut layer, &domains[r], sizes[r])?;
                    }
                }
            }
            BlastRadius::Normalized => {
                // Scale every domain against the largest; smaller domains
                // draw proportionally fewer units
                let mut pairs: Vec<(u64, &String)> =
                    sizes.iter().copied().zip(domains.iter()).collect();
                pairs.sort_by_key(|(size, _)| *size);
                let largest = pairs.last().map_or(0, |(size, _)| *size);
                for (size, domain) in pairs {
                    if size == 0 {
                        // Degenerate domain draws nothing
                        continue;
                    }
                    let divider = largest / size;
                    for _ in 0..(intensity / divider) {
                        self.draw(mem, &mut layer, domain, size)?;
                    }
                }
            }
            BlastRadius::Proportional => {
                let total: u64 = sizes.iter().sum();
                if total > 0 {
                    for (size, domain) in sizes.iter().copied().zip(domains.iter()) {
                        let share = (intensity as f64 * size as f64 / total as f64).round();
                        for _ in 0..share as u64 {
                            self.draw(mem, &mut layer, domain, size)?;
                        }
                    }
                }
            }
            BlastRadius::Even => {
                let per_domain = intensity / domains.len() as u64;
                for (size, domain) in sizes.iter().copied().zip(domains.iter()) {
                    for _ in 0..per_domain {
                        self.draw(mem, &mut layer, domain, size)?;
                    }
                }
            }
        }

        if layer.is_empty() {
            Ok(None)
        } else {
            Ok(Some(layer))
        }
    }

    /// Draw one target address inside the domain and ask the generator for a
    /// unit; a `None` from the generator skips the draw silently
    fn draw(
        &mut self,
        mem: &dyn MemoryBackend,
        layer: &mut BlastLayer,
        domain: &str,
        size: u64,
    ) -> Result<()> {
        let bound = size.saturating_sub(self.config.precision as u64);
        let address = self.rng.next_long(bound);
        if let Some(unit) = self.generator.generate(
            domain,
            address,
            self.config.precision,
            self.config.alignment,
            mem,
            self.rng.as_mut(),
        )? {
            layer.push(unit);
        }
        Ok(())
    }
}

impl std::fmt::Debug for Distributor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Distributor")
            .field("config", &self.config)
            .field("infinite_cap", &self.infinite_cap)
            .field("external_producer", &self.producer.is_some())
            .finish()
    }
}
