//! Scoped temporary allocation.
//!
//! [`Scratch`] is an RAII guard over a mutably borrowed [`Arena`]. It
//! records the position at creation and rewinds to it when dropped, so
//! everything allocated through the guard disappears together.
//!
//! Guards nest through [`DerefMut`]: the inner guard reborrows the outer
//! one, so the borrow checker rejects closing scopes out of order and any
//! reference into a scope that outlives it.
//!
//! ```
//! use strata_arena::{Arena, ArenaConfig};
//!
//! let mut arena = Arena::new(ArenaConfig::new(4096, 4096));
//! let before = arena.position();
//! {
//!     let mut outer = arena.scratch_begin();
//!     outer.alloc_slice_fill(16, 0u32);
//!     {
//!         let inner = outer.scratch_begin();
//!         inner.alloc_str("temporary");
//!     }
//! }
//! assert_eq!(arena.position(), before);
//! ```

use std::ops::{Deref, DerefMut};

use strata_core::{AccessMarker, MemoryProvider};

use crate::arena::Arena;

/// Rewinds the borrowed arena to its creation-time position on drop.
#[must_use = "a scratch scope ends as soon as the guard is dropped"]
pub struct Scratch<'a, P: MemoryProvider, M: AccessMarker> {
    arena: &'a mut Arena<P, M>,
    saved_position: usize,
}

impl<'a, P: MemoryProvider, M: AccessMarker> Scratch<'a, P, M> {
    pub(crate) fn new(arena: &'a mut Arena<P, M>) -> Self {
        let saved_position = arena.position();
        Self {
            arena,
            saved_position,
        }
    }

    /// Position the arena returns to when this scope ends.
    pub fn saved_position(&self) -> usize {
        self.saved_position
    }

    /// Bytes pushed since the scope began, alignment padding and skipped
    /// block space included.
    pub fn used(&self) -> usize {
        self.arena.position().saturating_sub(self.saved_position)
    }

    /// End the scope now. Same as dropping the guard.
    pub fn end(self) {}
}

impl<P: MemoryProvider, M: AccessMarker> Deref for Scratch<'_, P, M> {
    type Target = Arena<P, M>;

    fn deref(&self) -> &Self::Target {
        self.arena
    }
}

impl<P: MemoryProvider, M: AccessMarker> DerefMut for Scratch<'_, P, M> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.arena
    }
}

impl<P: MemoryProvider, M: AccessMarker> Drop for Scratch<'_, P, M> {
    fn drop(&mut self) {
        self.arena.pop_to(self.saved_position);
    }
}
