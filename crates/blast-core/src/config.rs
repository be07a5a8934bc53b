//! Typed configuration
//!
//! Explicit structs instead of an untyped key-value store: every consumer
//! takes its configuration at construction time.

use serde::{Deserialize, Serialize};

/// Spatial distribution strategy for generated layers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlastRadius {
    /// Every draw picks a uniformly random domain, then a random address
    #[default]
    Spread,
    /// One domain picked once; every draw addresses it
    Chunk,
    /// 10 rounds, each picking one domain and drawing `intensity / 10` times
    Burst,
    /// Draws scaled down by each domain's size relative to the largest
    Normalized,
    /// Draws proportional to each domain's share of the total size
    Proportional,
    /// `intensity / domain_count` draws per domain, remainder dropped
    Even,
}

impl std::fmt::Display for BlastRadius {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Spread => "spread",
            Self::Chunk => "chunk",
            Self::Burst => "burst",
            Self::Normalized => "normalized",
            Self::Proportional => "proportional",
            Self::Even => "even",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for BlastRadius {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "spread" => Ok(Self::Spread),
            "chunk" => Ok(Self::Chunk),
            "burst" => Ok(Self::Burst),
            "normalized" => Ok(Self::Normalized),
            "proportional" => Ok(Self::Proportional),
            "even" => Ok(Self::Even),
            other => Err(format!("unknown blast radius: {other}")),
        }
    }
}

/// Distribution engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Requested unit count per generation call
    pub intensity: u64,
    /// Spatial distribution strategy
    pub radius: BlastRadius,
    /// Byte width of a single mutation
    pub precision: usize,
    /// Byte offset added to aligned addresses
    pub alignment: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            intensity: 1,
            radius: BlastRadius::Spread,
            precision: 1,
            alignment: 0,
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepConfig {
    /// Cap on applied infinite-lifetime batches before FIFO eviction
    pub max_infinite_units: usize,
    /// While set, eviction of infinite batches is suspended
    pub lock_execution: bool,
    /// Whether a host rewind clears all scheduled actions
    pub clear_on_rewind: bool,
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            max_infinite_units: 50,
            lock_execution: false,
            clear_on_rewind: false,
        }
    }
}
