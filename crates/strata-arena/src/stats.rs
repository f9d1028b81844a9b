//! Arena occupancy snapshots.

/// Point-in-time counts for one arena, from
/// [`Arena::stats`](crate::Arena::stats).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ArenaStats {
    /// Blocks in the active chain.
    pub active_blocks: usize,
    /// Blocks parked on the free list.
    pub retired_blocks: usize,
    /// Address space reserved across all blocks.
    pub reserved_bytes: usize,
    /// Memory committed across all blocks.
    pub committed_bytes: usize,
    /// Current logical position.
    pub position: usize,
    /// Bytes between block headers and bump cursors in the active chain,
    /// alignment padding included.
    pub used_bytes: usize,
}

impl ArenaStats {
    /// Total blocks ever reserved.
    pub fn total_blocks(&self) -> usize {
        self.active_blocks + self.retired_blocks
    }
}
