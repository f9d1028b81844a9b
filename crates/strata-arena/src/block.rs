//! Reserved virtual memory blocks with bump cursors.
//!
//! A [`Block`] is one reservation obtained from the memory provider. Its
//! first [`HEADER_SIZE`] bytes hold a [`BlockHeader`](crate::raw::BlockHeader);
//! the rest is bump-allocated through `offset`. Only the prefix up to
//! `committed` is backed by physical memory, and commit grows on demand.
//!
//! Every block is either part of the arena's active chain or parked on
//! its free list. [`BlockLink`] makes that explicit instead of reusing one
//! pointer for both lists.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use strata_core::{align_up, ArenaInstanceId, BlockId, MemoryProvider, ProviderError};

use crate::error::ArenaError;
use crate::raw::{self, BlockHeader};

/// Bytes at the start of every block reserved for the block header.
///
/// This is also the smallest valid logical position of an arena.
pub const HEADER_SIZE: usize = std::mem::size_of::<BlockHeader>();

/// Which list a block belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockLink {
    /// In the active chain. `prev` is the block this one was chained after;
    /// `None` only for the first block.
    Active { prev: Option<BlockId> },
    /// On the free list. `next_free` is the block retired before this one.
    Retired { next_free: Option<BlockId> },
}

/// A single reservation with bump allocation.
///
/// Invariant: `HEADER_SIZE <= offset <= committed <= reserved`.
pub(crate) struct Block {
    base: NonNull<u8>,
    /// Reservation size asked for, before rounding. Inherited by blocks
    /// chained after this one.
    requested_reserve: usize,
    /// Actual reservation size (rounded to the provider granularity).
    reserved: usize,
    /// Commit granularity asked for, before rounding.
    requested_commit: usize,
    /// Bytes currently committed from `base`.
    committed: usize,
    /// Logical position of `base` within the arena.
    base_position: usize,
    /// Bump cursor, relative to `base`.
    offset: usize,
    link: BlockLink,
    /// How many times this block has been picked back up from the free list.
    reuse_count: u32,
}

impl Block {
    /// Reserve a new block and commit its first `requested_commit` bytes.
    ///
    /// Both sizes are rounded up to `granule`. The reservation is released
    /// again if the initial commit fails.
    pub(crate) fn reserve<P: MemoryProvider>(
        provider: &P,
        arena: ArenaInstanceId,
        id: BlockId,
        requested_reserve: usize,
        requested_commit: usize,
        granule: usize,
    ) -> Result<Self, ArenaError> {
        let overflow = ArenaError::SizeOverflow {
            size: requested_reserve,
            align: granule,
        };
        let reserved = align_up(requested_reserve.max(HEADER_SIZE), granule).ok_or(overflow)?;
        let initial_commit = align_up(requested_commit.max(HEADER_SIZE), granule)
            .unwrap_or(reserved)
            .min(reserved);

        let base = provider.reserve(reserved)?;
        // SAFETY: `base..base + initial_commit` lies in the reservation we
        // just made; `base` is page-aligned by the provider contract.
        if let Err(err) = unsafe { provider.commit(base, initial_commit) } {
            // SAFETY: releasing the reservation made above, exactly once.
            unsafe { provider.release(base, reserved) };
            return Err(err.into());
        }
        // SAFETY: at least `HEADER_SIZE` bytes are committed and `base` is
        // page-aligned, hence 16-byte aligned.
        unsafe { raw::write_header(base, BlockHeader::new(arena, id, 0)) };

        Ok(Self {
            base,
            requested_reserve,
            reserved,
            requested_commit,
            committed: initial_commit,
            base_position: 0,
            offset: HEADER_SIZE,
            link: BlockLink::Active { prev: None },
            reuse_count: 0,
        })
    }

    /// Offset at which an allocation of `size` bytes aligned to `align`
    /// would start, if it fits in the reservation.
    ///
    /// Alignment is applied to the absolute address, so the result is
    /// correct even for alignments larger than the block base alignment.
    pub(crate) fn fit(&self, size: usize, align: usize) -> Option<usize> {
        let base = self.base.as_ptr() as usize;
        let aligned = align_up(base.checked_add(self.offset)?, align)? - base;
        let end = aligned.checked_add(size)?;
        (end <= self.reserved).then_some(aligned)
    }

    /// Commit enough memory that `end` bytes from `base` are usable.
    ///
    /// Commits whole multiples of the rounded commit granularity, clamped to
    /// the reservation. Returns the committed size from before the call.
    pub(crate) fn commit_to<P: MemoryProvider>(
        &mut self,
        provider: &P,
        end: usize,
        granule: usize,
    ) -> Result<usize, ProviderError> {
        let prior = self.committed;
        if end <= prior {
            return Ok(prior);
        }
        debug_assert!(end <= self.reserved);
        let step = align_up(self.requested_commit.max(1), granule).unwrap_or(self.reserved);
        let target = align_up(end, step)
            .unwrap_or(self.reserved)
            .min(self.reserved);
        // SAFETY: `prior..target` lies inside the reservation and `prior` is
        // a multiple of the granule, hence page-aligned.
        unsafe { provider.commit(raw::at(self.base, prior), target - prior)? };
        self.committed = target;
        tracing::trace!(
            commit_from = prior,
            commit_to = target,
            reserved = self.reserved,
            "grew block commit"
        );
        Ok(prior)
    }

    /// Pointer to `offset` bytes into the block.
    pub(crate) fn ptr_at(&self, offset: usize) -> NonNull<u8> {
        debug_assert!(offset <= self.reserved);
        // SAFETY: `offset` is within the reservation.
        unsafe { raw::at(self.base, offset) }
    }

    /// Move the bump cursor.
    pub(crate) fn set_offset(&mut self, offset: usize) {
        debug_assert!(HEADER_SIZE <= offset && offset <= self.committed);
        self.offset = offset;
    }

    /// Move the block onto the free list, resetting its cursor.
    ///
    /// Returns the previous cursor.
    pub(crate) fn retire(&mut self, next_free: Option<BlockId>) -> usize {
        let old = self.offset;
        self.offset = HEADER_SIZE;
        self.link = BlockLink::Retired { next_free };
        old
    }

    /// Mark the block as picked back up from the free list.
    ///
    /// The caller links it into the chain with [`chain_after`](Self::chain_after).
    pub(crate) fn reactivate(&mut self, arena: ArenaInstanceId, id: BlockId) {
        debug_assert!(matches!(self.link, BlockLink::Retired { .. }));
        self.reuse_count += 1;
        // SAFETY: the header bytes stay committed for the block's lifetime.
        unsafe { raw::write_header(self.base, BlockHeader::new(arena, id, self.reuse_count)) };
    }

    /// Link this block after `prev` at logical position `base_position`.
    pub(crate) fn chain_after(&mut self, prev: BlockId, base_position: usize) {
        self.link = BlockLink::Active { prev: Some(prev) };
        self.base_position = base_position;
    }

    /// Return the reservation to the provider.
    ///
    /// # Safety
    ///
    /// Must be called exactly once, after which no pointer into the block
    /// may be used.
    pub(crate) unsafe fn release<P: MemoryProvider>(&self, provider: &P) {
        // SAFETY: base/reserved describe exactly our reservation (caller
        // guarantees single release).
        unsafe { provider.release(self.base, self.reserved) };
    }

    /// Does `addr` fall inside the allocated span `[HEADER_SIZE, offset)`?
    pub(crate) fn holds(&self, addr: usize) -> bool {
        let base = self.base.as_ptr() as usize;
        addr >= base + HEADER_SIZE && addr < base + self.offset
    }

    /// Header currently stamped into block memory.
    pub(crate) fn header(&self) -> BlockHeader {
        // SAFETY: the header was written at reservation and stays committed.
        unsafe { raw::read_header(self.base) }
    }

    pub(crate) fn link(&self) -> BlockLink {
        self.link
    }

    pub(crate) fn set_next_free(&mut self, next_free: Option<BlockId>) {
        debug_assert!(matches!(self.link, BlockLink::Retired { .. }));
        self.link = BlockLink::Retired { next_free };
    }

    /// Logical position of the cursor.
    pub(crate) fn position(&self) -> usize {
        self.base_position + self.offset
    }

    pub(crate) fn base_position(&self) -> usize {
        self.base_position
    }

    pub(crate) fn offset(&self) -> usize {
        self.offset
    }

    pub(crate) fn committed(&self) -> usize {
        self.committed
    }

    pub(crate) fn reserved(&self) -> usize {
        self.reserved
    }

    pub(crate) fn requested_reserve(&self) -> usize {
        self.requested_reserve
    }

    pub(crate) fn requested_commit(&self) -> usize {
        self.requested_commit
    }

    pub(crate) fn reuse_count(&self) -> u32 {
        self.reuse_count
    }
}
