//! Error types for the blast core
//!
//! Covers the configuration-class failures shared by every crate in the
//! workspace: unresolvable memory domains, out-of-range addresses and
//! unregistered limiter lists.

/// Core error type
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// The named memory domain is not known to the backend
    #[error("unresolved memory domain: {domain}")]
    UnresolvedDomain {
        /// Domain name that failed to resolve
        domain: String,
    },

    /// An address range fell outside the domain
    #[error("address {address:#x}+{len} out of range for domain {domain} (size {size:#x})")]
    OutOfRange {
        /// Domain name
        domain: String,
        /// Offending start address
        address: u64,
        /// Length of the access
        len: usize,
        /// Size of the domain
        size: u64,
    },

    /// A unit referenced a limiter list that is not registered
    #[error("unknown limiter list: {list}")]
    UnknownLimiter {
        /// The unregistered list name
        list: String,
    },
}

/// Convenience result alias for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
