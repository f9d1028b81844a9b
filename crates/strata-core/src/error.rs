//! Errors reported by a [`MemoryProvider`](crate::MemoryProvider).
//!
//! These are the two unrecoverable resource conditions of the arena.
//! The arena aborts on them by default; the `try_*` entry points hand
//! them back to embedders that want to recover.

use thiserror::Error;

/// Errors from reserving or committing virtual memory.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum ProviderError {
    /// The provider could not reserve the requested virtual range
    /// (address-space exhaustion).
    #[error("failed to reserve {size} bytes of address space{}", os_suffix(.os_code))]
    ReserveFailed {
        /// Number of bytes requested.
        size: usize,
        /// Raw OS error code, if the platform reported one.
        os_code: Option<i32>,
    },
    /// The provider could not back the requested pages with physical
    /// memory (memory pressure).
    #[error("failed to commit {size} bytes at {addr:#x}{}", os_suffix(.os_code))]
    CommitFailed {
        /// Start address of the commit request.
        addr: usize,
        /// Number of bytes requested.
        size: usize,
        /// Raw OS error code, if the platform reported one.
        os_code: Option<i32>,
    },
}

impl ProviderError {
    /// Number of bytes the failed request asked for.
    pub fn size(&self) -> usize {
        match self {
            Self::ReserveFailed { size, .. } | Self::CommitFailed { size, .. } => *size,
        }
    }
}

fn os_suffix(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!(" (os error {code})"),
        None => String::new(),
    }
}
