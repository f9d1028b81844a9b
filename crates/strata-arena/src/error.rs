//! Arena-specific error types.

use strata_core::ProviderError;
use thiserror::Error;

/// Errors that can occur during arena operations.
///
/// Only the `try_*` entry points return these. Everything else treats a
/// failure as fatal and aborts the process after logging it.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ArenaError {
    /// The memory provider could not reserve or commit memory.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The arena configuration cannot be used.
    #[error("invalid arena config: {reason}")]
    InvalidConfig {
        /// What is wrong with the configuration.
        reason: String,
    },
    /// The request cannot be represented in the address space.
    #[error("allocation of {size} bytes aligned to {align} overflows the address space")]
    SizeOverflow {
        /// Number of bytes requested.
        size: usize,
        /// Requested alignment.
        align: usize,
    },
    /// An internal invariant does not hold. Reported by
    /// [`Arena::check_invariants`](crate::Arena::check_invariants).
    #[error("arena invariant violated: {reason}")]
    Corrupted {
        /// The first violation found.
        reason: String,
    },
}
