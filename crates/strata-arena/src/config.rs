//! Arena configuration parameters.

use strata_core::mib;

use crate::error::ArenaError;

/// Configuration for one arena.
///
/// Exactly two numbers: how much address space each block asks for and
/// how much of it is committed at a time. Both are rounded up to the
/// provider's large-page granularity when a block is reserved, so tiny
/// values are legal and simply mean "one granule".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ArenaConfig {
    /// Requested address-space reservation per block, in bytes.
    ///
    /// Default: 64 MiB. Blocks created for oversized pushes are widened
    /// past this value.
    pub reserve_size: usize,

    /// Requested commit granularity, in bytes.
    ///
    /// Default: 64 MiB. The first block commits this much up front; later
    /// growth commits in multiples of it. Values above `reserve_size` are
    /// clamped to `reserve_size`.
    pub commit_size: usize,
}

impl ArenaConfig {
    /// Default reservation per block: 64 MiB.
    pub const DEFAULT_RESERVE_SIZE: usize = mib(64);

    /// Default commit granularity: 64 MiB.
    pub const DEFAULT_COMMIT_SIZE: usize = mib(64);

    /// Create a config with explicit reserve and commit sizes.
    pub const fn new(reserve_size: usize, commit_size: usize) -> Self {
        Self {
            reserve_size,
            commit_size,
        }
    }

    /// Replace the requested reservation size.
    pub const fn with_reserve_size(mut self, reserve_size: usize) -> Self {
        self.reserve_size = reserve_size;
        self
    }

    /// Replace the requested commit granularity.
    pub const fn with_commit_size(mut self, commit_size: usize) -> Self {
        self.commit_size = commit_size;
        self
    }

    /// Commit size after clamping to the reservation size.
    pub fn effective_commit_size(&self) -> usize {
        self.commit_size.min(self.reserve_size)
    }

    /// Check that both sizes are usable.
    pub fn validate(&self) -> Result<(), ArenaError> {
        if self.reserve_size == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "reserve_size must be nonzero".into(),
            });
        }
        if self.commit_size == 0 {
            return Err(ArenaError::InvalidConfig {
                reason: "commit_size must be nonzero".into(),
            });
        }
        Ok(())
    }
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self::new(Self::DEFAULT_RESERVE_SIZE, Self::DEFAULT_COMMIT_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_64mb() {
        let config = ArenaConfig::default();
        assert_eq!(config.reserve_size, 64 * 1024 * 1024);
        assert_eq!(config.commit_size, 64 * 1024 * 1024);
    }

    #[test]
    fn commit_clamped_to_reserve() {
        let config = ArenaConfig::new(4096, 1 << 20);
        assert_eq!(config.effective_commit_size(), 4096);
    }

    #[test]
    fn builder_overrides_one_field() {
        let config = ArenaConfig::default().with_commit_size(4);
        assert_eq!(config.reserve_size, ArenaConfig::DEFAULT_RESERVE_SIZE);
        assert_eq!(config.commit_size, 4);
    }

    #[test]
    fn zero_sizes_rejected() {
        assert!(matches!(
            ArenaConfig::new(0, 4).validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
        assert!(matches!(
            ArenaConfig::new(4, 0).validate(),
            Err(ArenaError::InvalidConfig { .. })
        ));
        assert!(ArenaConfig::new(4, 4).validate().is_ok());
    }
}
