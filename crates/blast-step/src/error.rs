//! Error types for the step scheduler

use blast_core::CoreError;

/// Scheduler error type
///
/// Both execution variants halt the running scheduler; it must be reset
/// before the next tick does anything.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StepError {
    /// A unit failed irrecoverably during execution
    #[error("blast unit execution failed: {unit}: {source}")]
    Fatal {
        /// Description of the failing unit
        unit: String,
        /// Underlying backend failure
        source: CoreError,
    },

    /// A unit failed, but the failure was already classified and logged
    #[error("blast unit execution failed (already handled)")]
    Handled,

    /// A backend or limiter lookup failed outside unit execution
    #[error(transparent)]
    Core(#[from] CoreError),
}

/// Convenience result alias for scheduler operations
pub type Result<T> = std::result::Result<T, StepError>;
