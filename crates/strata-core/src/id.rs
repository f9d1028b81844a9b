//! Strongly-typed identifiers for blocks and arena instances.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies a block within one arena.
///
/// Blocks are numbered in creation order: `BlockId(0)` is always the
/// first block reserved by the arena. A block keeps its ID for its whole
/// life, including while it is parked on the free list and after it is
/// reactivated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub u32);

impl BlockId {
    /// The first block of every arena.
    pub const FIRST: Self = Self(0);

    /// The block's index into the arena's block table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for BlockId {
    fn from(v: u32) -> Self {
        Self(v)
    }
}

/// Counter for unique [`ArenaInstanceId`] allocation.
static ARENA_INSTANCE_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique per-instance identifier for an arena.
///
/// Allocated from a monotonic atomic counter via [`ArenaInstanceId::next`].
/// Used as a structured log field so the blocks of different arenas can
/// be told apart in traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ArenaInstanceId(u64);

impl ArenaInstanceId {
    /// Allocate a fresh, unique instance ID. Thread-safe.
    pub fn next() -> Self {
        Self(ARENA_INSTANCE_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    /// The raw counter value.
    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ArenaInstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
