//! Saved arena positions.
//!
//! A [`Checkpoint`] records where an arena's bump cursor stood so it can be
//! restored with [`Arena::rewind`](crate::Arena::rewind). It is plain data:
//! copying one is free, and rewinding to it never fails.

use std::fmt;

use strata_core::ArenaInstanceId;

/// A logical arena position captured by
/// [`Arena::checkpoint`](crate::Arena::checkpoint).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[must_use]
pub struct Checkpoint {
    /// Arena the position was taken from.
    arena: ArenaInstanceId,
    /// Logical position at capture time.
    position: usize,
}

impl Checkpoint {
    pub(crate) fn new(arena: ArenaInstanceId, position: usize) -> Self {
        Self { arena, position }
    }

    /// The arena this checkpoint belongs to.
    pub fn arena(&self) -> ArenaInstanceId {
        self.arena
    }

    /// The saved logical position.
    pub fn position(&self) -> usize {
        self.position
    }
}

impl fmt::Display for Checkpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Checkpoint(arena={}, pos={})", self.arena, self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accessors_and_display() {
        let arena = ArenaInstanceId::next();
        let cp = Checkpoint::new(arena, 4096);
        assert_eq!(cp.arena(), arena);
        assert_eq!(cp.position(), 4096);
        let text = cp.to_string();
        assert!(text.contains("pos=4096"));
        assert!(text.contains(&arena.to_string()));
    }

    #[test]
    fn checkpoints_order_by_position_within_an_arena() {
        let arena = ArenaInstanceId::next();
        assert!(Checkpoint::new(arena, 32) < Checkpoint::new(arena, 64));
    }
}
