//! Error types for the distribution engine

use blast_core::CoreError;

/// Distribution engine error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// A backend or limiter lookup failed
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The engine configuration cannot produce units
    #[error("invalid engine configuration: {reason}")]
    InvalidConfig {
        /// What was wrong
        reason: String,
    },
}

/// Convenience result alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;
