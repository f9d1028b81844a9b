//! The growable region arena.
//!
//! [`Arena`] owns a chain of [`Block`]s. Pushes bump-allocate in the
//! current block, growing its commit or chaining another block when it
//! fills. Rewinds move the logical position back, retiring trailing blocks
//! onto a free list that later growth draws from before reserving fresh
//! address space.
//!
//! ```text
//! Arena
//! ├── blocks: Vec<Block>        (every block ever reserved, by BlockId)
//! ├── current ──► B3 ──prev──► B1 ──prev──► B0     (active chain)
//! └── free_last ─► B2 ──next_free──► B4            (retired, reusable)
//! ```
//!
//! Pushing takes `&self` and every rewind takes `&mut self`, so references
//! handed out by a push can never outlive the rewind that retires them.

#![allow(unsafe_code)]

use std::alloc::Layout;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::Location;
use std::ptr::NonNull;

use strata_core::{
    align_up, is_power_of_two, AccessMarker, ArenaInstanceId, BlockId, MemoryProvider, NoMarker,
};
use strata_platform::OsMemory;

use crate::block::{Block, BlockLink, HEADER_SIZE};
use crate::checkpoint::Checkpoint;
use crate::config::ArenaConfig;
use crate::error::ArenaError;
use crate::raw;
use crate::scratch::Scratch;
use crate::stats::ArenaStats;

/// Minimum alignment used by the typed `alloc*` helpers.
pub const MIN_TYPED_ALIGN: usize = 8;

/// A growable, rewindable region arena over reserved virtual memory.
///
/// `P` supplies address space, `M` receives valid/invalid marks for
/// use-after-rewind tooling. The defaults use the operating system and
/// no diagnostics.
///
/// Not thread-safe: an arena is `Send` (when `P` and `M` are) but never
/// `Sync`. Use one arena per thread or task.
pub struct Arena<P: MemoryProvider = OsMemory, M: AccessMarker = NoMarker> {
    provider: P,
    marker: M,
    config: ArenaConfig,
    /// Provider granularity captured at creation.
    granule: usize,
    blocks: RefCell<Vec<Block>>,
    /// Tail of the active chain.
    current: Cell<BlockId>,
    /// Most recently retired block.
    free_last: Cell<Option<BlockId>>,
    id: ArenaInstanceId,
    created_at: &'static Location<'static>,
}

// SAFETY: the arena exclusively owns its reservations; the raw block base
// pointers are never shared outside it except through borrows of the
// arena itself. Moving the whole arena to another thread is sound when
// the provider and marker can move too. `RefCell`/`Cell` keep it `!Sync`.
unsafe impl<P: MemoryProvider + Send, M: AccessMarker + Send> Send for Arena<P, M> {}

impl Arena {
    /// Create an arena backed by the operating system.
    ///
    /// Aborts the process if the first block cannot be reserved or
    /// committed. See [`Arena::try_new`] for a fallible version.
    #[track_caller]
    pub fn new(config: ArenaConfig) -> Self {
        Self::with_parts(config, OsMemory::new(), NoMarker)
    }

    /// Create an arena backed by the operating system, reporting failure.
    #[track_caller]
    pub fn try_new(config: ArenaConfig) -> Result<Self, ArenaError> {
        Self::try_with_parts(config, OsMemory::new(), NoMarker)
    }
}

impl Default for Arena {
    #[track_caller]
    fn default() -> Self {
        Self::new(ArenaConfig::default())
    }
}

impl<P: MemoryProvider> Arena<P> {
    /// Create an arena over a custom memory provider. Aborts on failure.
    #[track_caller]
    pub fn with_provider(config: ArenaConfig, provider: P) -> Self {
        Self::with_parts(config, provider, NoMarker)
    }

    /// Create an arena over a custom memory provider, reporting failure.
    #[track_caller]
    pub fn try_with_provider(config: ArenaConfig, provider: P) -> Result<Self, ArenaError> {
        Self::try_with_parts(config, provider, NoMarker)
    }
}

impl<P: MemoryProvider, M: AccessMarker> Arena<P, M> {
    /// Create an arena with a custom provider and access marker.
    /// Aborts on failure.
    #[track_caller]
    pub fn with_parts(config: ArenaConfig, provider: P, marker: M) -> Self {
        let created_at = Location::caller();
        match Self::try_with_parts(config, provider, marker) {
            Ok(arena) => arena,
            Err(err) => abort_with(&err, None, created_at),
        }
    }

    /// Create an arena with a custom provider and access marker.
    ///
    /// Reserves the first block and commits its initial commit size. Both
    /// sizes are rounded up to the provider's large-page granularity.
    #[track_caller]
    pub fn try_with_parts(config: ArenaConfig, provider: P, marker: M) -> Result<Self, ArenaError> {
        let created_at = Location::caller();
        config.validate()?;
        let granule = provider
            .large_page_size()
            .max(provider.page_size())
            .next_power_of_two();
        let id = ArenaInstanceId::next();

        let first = Block::reserve(
            &provider,
            id,
            BlockId::FIRST,
            config.reserve_size,
            config.effective_commit_size(),
            granule,
        )?;
        // SAFETY: the block body up to `committed` is committed and unowned.
        unsafe {
            marker.mark_invalid(first.ptr_at(HEADER_SIZE), first.committed() - HEADER_SIZE);
        }
        tracing::debug!(
            arena = %id,
            reserved = first.reserved(),
            committed = first.committed(),
            %created_at,
            "created arena"
        );

        Ok(Self {
            provider,
            marker,
            config,
            granule,
            blocks: RefCell::new(vec![first]),
            current: Cell::new(BlockId::FIRST),
            free_last: Cell::new(None),
            id,
            created_at,
        })
    }

    /// Allocate `size` bytes aligned to `align`.
    ///
    /// When `zero` is set the returned bytes read as zero. Aborts the
    /// process if memory cannot be reserved or committed.
    ///
    /// The memory stays valid until a rewind passes below its position or
    /// the arena is dropped. Dereferencing it is up to the caller; the typed
    /// helpers ([`alloc`](Self::alloc), [`alloc_slice_copy`](Self::alloc_slice_copy),
    /// ...) do that safely.
    pub fn push(&self, size: usize, align: usize, zero: bool) -> NonNull<u8> {
        match self.try_push(size, align, zero) {
            Ok(ptr) => ptr,
            Err(err) => self.fatal(&err),
        }
    }

    /// Allocate memory for `layout`. Aborts on failure.
    pub fn push_layout(&self, layout: Layout, zero: bool) -> NonNull<u8> {
        self.push(layout.size(), layout.align(), zero)
    }

    /// Fallible [`push`](Self::push).
    pub fn try_push(&self, size: usize, align: usize, zero: bool) -> Result<NonNull<u8>, ArenaError> {
        debug_assert!(is_power_of_two(align), "alignment {align} is not a power of two");
        let mut blocks = self.blocks.borrow_mut();

        let mut current = self.current.get();
        let aligned = match blocks[current.index()].fit(size, align) {
            Some(aligned) => aligned,
            None => {
                current = self.grow(&mut blocks, size, align)?;
                blocks[current.index()]
                    .fit(size, align)
                    .ok_or(ArenaError::SizeOverflow { size, align })?
            }
        };

        let block = &mut blocks[current.index()];
        let end = aligned + size;
        let prior_committed = block.commit_to(&self.provider, end, self.granule)?;
        let ptr = block.ptr_at(aligned);
        block.set_offset(end);

        // SAFETY: `ptr..ptr + size` is committed and now owned by the caller.
        unsafe { self.marker.mark_valid(ptr, size) };
        if zero {
            // Pages committed by this call are fresh from the provider and
            // already zero.
            let stale = prior_committed.min(end).saturating_sub(aligned);
            // SAFETY: as above; `stale <= size`.
            unsafe { raw::zero(ptr, stale) };
        }
        Ok(ptr)
    }

    /// Make room for `size` bytes aligned to `align` in a new current block.
    ///
    /// Reuses the first free-list block with enough capacity, otherwise
    /// reserves a block with the requesting block's requested sizes,
    /// widened when the request would not fit in them.
    fn grow(&self, blocks: &mut Vec<Block>, size: usize, align: usize) -> Result<BlockId, ArenaError> {
        let prev = self.current.get();
        let (prev_end, requested_reserve, requested_commit) = {
            let block = &blocks[prev.index()];
            (
                block.base_position() + block.reserved(),
                block.requested_reserve(),
                block.requested_commit(),
            )
        };

        let id = match self.take_free(blocks, size, align) {
            Some(id) => {
                let block = &mut blocks[id.index()];
                block.reactivate(self.id, id);
                tracing::debug!(
                    arena = %self.id,
                    block = %id,
                    reserved = block.reserved(),
                    reuse_count = block.reuse_count(),
                    "reusing retired block"
                );
                id
            }
            None => {
                let overflow = ArenaError::SizeOverflow { size, align };
                let lead = if align <= self.provider.page_size() {
                    align_up(HEADER_SIZE, align).ok_or(overflow.clone())?
                } else {
                    HEADER_SIZE.checked_add(align).ok_or(overflow.clone())?
                };
                let needed = lead.checked_add(size).ok_or(overflow.clone())?;
                let (reserve, commit) = if needed > requested_reserve {
                    let widened = align_up(needed, align).ok_or(overflow)?;
                    (widened, widened)
                } else {
                    (requested_reserve, requested_commit)
                };
                let id = BlockId(u32::try_from(blocks.len()).map_err(|_| ArenaError::Corrupted {
                    reason: "block count exceeds u32::MAX".into(),
                })?);
                let block = Block::reserve(&self.provider, self.id, id, reserve, commit, self.granule)?;
                // SAFETY: the fresh block body is committed and unowned.
                unsafe {
                    self.marker
                        .mark_invalid(block.ptr_at(HEADER_SIZE), block.committed() - HEADER_SIZE);
                }
                tracing::debug!(
                    arena = %self.id,
                    block = %id,
                    reserved = block.reserved(),
                    committed = block.committed(),
                    base_position = prev_end,
                    "reserved new block"
                );
                blocks.push(block);
                id
            }
        };

        blocks[id.index()].chain_after(prev, prev_end);
        self.current.set(id);
        Ok(id)
    }

    /// Unlink and return the first free-list block that can hold the
    /// request, scanning from the most recently retired.
    fn take_free(&self, blocks: &mut [Block], size: usize, align: usize) -> Option<BlockId> {
        let mut before: Option<BlockId> = None;
        let mut cursor = self.free_last.get();
        while let Some(id) = cursor {
            let block = &blocks[id.index()];
            let next = match block.link() {
                BlockLink::Retired { next_free } => next_free,
                BlockLink::Active { .. } => {
                    debug_assert!(false, "active block {id} on the free list");
                    None
                }
            };
            if block.fit(size, align).is_some() {
                match before {
                    Some(before) => blocks[before.index()].set_next_free(next),
                    None => self.free_last.set(next),
                }
                return Some(id);
            }
            before = Some(id);
            cursor = next;
        }
        None
    }

    /// Rewind the position by `amount` bytes, never below [`HEADER_SIZE`].
    pub fn pop(&mut self, amount: usize) {
        let target = self.position().saturating_sub(amount).max(HEADER_SIZE);
        self.pop_to(target);
    }

    /// Rewind to a logical position.
    ///
    /// The target is clamped to `[HEADER_SIZE, position()]`. Trailing blocks
    /// that hold nothing at or below the target are retired onto the free
    /// list. Cost is proportional to the number of blocks retired.
    pub fn pop_to(&mut self, position: usize) {
        let target = position.max(HEADER_SIZE).min(self.position());
        let blocks = self.blocks.get_mut();
        let mut current = self.current.get();
        let mut retired = 0usize;

        while let BlockLink::Active { prev: Some(prev) } = blocks[current.index()].link() {
            let block = &mut blocks[current.index()];
            if target >= block.base_position() + HEADER_SIZE {
                break;
            }
            let old_offset = block.retire(self.free_last.get());
            // SAFETY: the body up to `committed` is committed; the `&mut self`
            // receiver proves no borrow into it survives.
            unsafe {
                self.marker
                    .mark_invalid(block.ptr_at(HEADER_SIZE), block.committed() - HEADER_SIZE);
            }
            tracing::trace!(
                arena = %self.id,
                block = %current,
                freed = old_offset - HEADER_SIZE,
                "retired block"
            );
            self.free_last.set(Some(current));
            current = prev;
            retired += 1;
        }

        let block = &mut blocks[current.index()];
        let old_offset = block.offset();
        let new_offset = (target - block.base_position()).min(old_offset);
        if new_offset < old_offset {
            // SAFETY: as above, for the freed tail of the surviving block.
            unsafe {
                self.marker
                    .mark_invalid(block.ptr_at(new_offset), old_offset - new_offset);
            }
            block.set_offset(new_offset);
        }
        self.current.set(current);

        tracing::trace!(
            arena = %self.id,
            position = block.position(),
            retired,
            "rewound arena"
        );
    }

    /// Rewind to the very start, keeping the first block resident and
    /// parking every other block on the free list.
    pub fn clear(&mut self) {
        self.pop_to(0);
    }

    /// The current logical position.
    ///
    /// Starts at [`HEADER_SIZE`] and grows with every push; a position
    /// obtained here can later be passed to [`pop_to`](Self::pop_to).
    pub fn position(&self) -> usize {
        self.blocks.borrow()[self.current.get().index()].position()
    }

    /// Save the current position for a later [`rewind`](Self::rewind).
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint::new(self.id, self.position())
    }

    /// Rewind to a saved checkpoint.
    ///
    /// Checkpoints are not ordered: rewinding to an older checkpoint
    /// invalidates every allocation made after it, including those a newer
    /// checkpoint was meant to protect.
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        debug_assert_eq!(
            checkpoint.arena(),
            self.id,
            "checkpoint belongs to a different arena"
        );
        self.pop_to(checkpoint.position());
    }

    /// Open a scratch scope that rewinds to the current position when it
    /// ends.
    ///
    /// The guard dereferences to the arena, so nested scopes are opened by
    /// calling `scratch_begin` on the guard itself. The borrow checker
    /// enforces that nested scopes close first.
    pub fn scratch_begin(&mut self) -> Scratch<'_, P, M> {
        Scratch::new(self)
    }

    /// Move `value` into the arena and return a reference to it.
    ///
    /// The value's destructor never runs.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc<T>(&self, value: T) -> &mut T {
        let layout = Layout::new::<T>();
        let ptr = self
            .push(layout.size(), layout.align().max(MIN_TYPED_ALIGN), false)
            .cast::<T>();
        // SAFETY: freshly pushed, aligned, sized for `T`, exclusively ours
        // until a rewind, which needs `&mut self`.
        unsafe {
            ptr.as_ptr().write(value);
            &mut *ptr.as_ptr()
        }
    }

    /// Copy a slice into the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> &mut [T] {
        let dst = self.push_array::<T>(src.len(), false);
        // SAFETY: `dst` has room for `src.len()` elements and cannot
        // overlap `src`, which lives outside the fresh allocation.
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), dst.as_ptr(), src.len());
            std::slice::from_raw_parts_mut(dst.as_ptr(), src.len())
        }
    }

    /// Allocate `len` copies of `value`.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_slice_fill<T: Copy>(&self, len: usize, value: T) -> &mut [T] {
        let dst = self.push_array::<T>(len, false);
        // SAFETY: room for `len` elements, each written before the slice
        // is formed.
        unsafe {
            for i in 0..len {
                dst.as_ptr().add(i).write(value);
            }
            std::slice::from_raw_parts_mut(dst.as_ptr(), len)
        }
    }

    /// Allocate `len` zeroed elements.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_zeroed<T: bytemuck::Zeroable>(&self, len: usize) -> &mut [T] {
        let dst = self.push_array::<T>(len, true);
        // SAFETY: the bytes are zero and `T: Zeroable` makes that a valid
        // value.
        unsafe { std::slice::from_raw_parts_mut(dst.as_ptr(), len) }
    }

    /// Copy a string into the arena.
    #[allow(clippy::mut_from_ref)]
    pub fn alloc_str(&self, src: &str) -> &mut str {
        let bytes = self.alloc_slice_copy(src.as_bytes());
        // SAFETY: copied byte-for-byte from a valid `str`.
        unsafe { std::str::from_utf8_unchecked_mut(bytes) }
    }

    fn push_array<T>(&self, len: usize, zero: bool) -> NonNull<T> {
        let align = std::mem::align_of::<T>().max(MIN_TYPED_ALIGN);
        let size = match std::mem::size_of::<T>().checked_mul(len) {
            Some(size) => size,
            None => self.fatal(&ArenaError::SizeOverflow { size: usize::MAX, align }),
        };
        self.push(size, align, zero).cast::<T>()
    }

    /// Is `ptr` inside memory currently handed out by this arena?
    pub fn owns<T: ?Sized>(&self, ptr: *const T) -> bool {
        let addr = ptr.cast::<u8>() as usize;
        let blocks = self.blocks.borrow();
        let owned = chain(&blocks, self.current.get()).any(|id| blocks[id.index()].holds(addr));
        owned
    }

    /// Number of blocks ever reserved, active or retired.
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Snapshot of block and byte counts.
    pub fn stats(&self) -> ArenaStats {
        let blocks = self.blocks.borrow();
        let mut stats = ArenaStats {
            position: blocks[self.current.get().index()].position(),
            ..ArenaStats::default()
        };
        for block in blocks.iter() {
            stats.reserved_bytes += block.reserved();
            stats.committed_bytes += block.committed();
            match block.link() {
                BlockLink::Active { .. } => {
                    stats.active_blocks += 1;
                    stats.used_bytes += block.offset() - HEADER_SIZE;
                }
                BlockLink::Retired { .. } => stats.retired_blocks += 1,
            }
        }
        stats
    }

    /// The configuration this arena was created with.
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// The memory provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// The access marker.
    pub fn marker(&self) -> &M {
        &self.marker
    }

    /// Unique ID of this arena, as used in log fields.
    pub fn id(&self) -> ArenaInstanceId {
        self.id
    }

    /// Source location that created this arena.
    pub fn created_at(&self) -> &'static Location<'static> {
        self.created_at
    }

    /// Verify the structural invariants of the block chain and free list.
    ///
    /// Intended for tests and debugging; walks every block.
    pub fn check_invariants(&self) -> Result<(), ArenaError> {
        let blocks = self.blocks.borrow();
        let corrupted = |reason: String| Err(ArenaError::Corrupted { reason });
        let mut seen = vec![false; blocks.len()];

        for (index, block) in blocks.iter().enumerate() {
            let header = block.header();
            if header.magic != raw::HEADER_MAGIC
                || header.arena != self.id.as_u64()
                || header.block as usize != index
                || header.reuse_count != block.reuse_count()
            {
                return corrupted(format!("block {index} has a stale or foreign header: {header:?}"));
            }
        }

        let mut next_base: Option<usize> = None;
        for id in chain(&blocks, self.current.get()) {
            let block = &blocks[id.index()];
            if std::mem::replace(&mut seen[id.index()], true) {
                return corrupted(format!("block {id} appears twice in the active chain"));
            }
            if !(HEADER_SIZE <= block.offset()
                && block.offset() <= block.committed()
                && block.committed() <= block.reserved())
            {
                return corrupted(format!(
                    "block {id}: header {HEADER_SIZE} <= offset {} <= committed {} <= reserved {} does not hold",
                    block.offset(),
                    block.committed(),
                    block.reserved()
                ));
            }
            if let Some(expected) = next_base {
                if block.base_position() + block.reserved() != expected {
                    return corrupted(format!(
                        "block {id} ends at {} but its successor starts at {expected}",
                        block.base_position() + block.reserved()
                    ));
                }
            }
            next_base = Some(block.base_position());
            if let BlockLink::Active { prev: None } = block.link() {
                if id != BlockId::FIRST || block.base_position() != 0 {
                    return corrupted(format!("chain root is block {id}, not the first block"));
                }
            }
        }

        let mut cursor = self.free_last.get();
        while let Some(id) = cursor {
            let block = &blocks[id.index()];
            if std::mem::replace(&mut seen[id.index()], true) {
                return corrupted(format!("block {id} is both active and retired"));
            }
            if block.offset() != HEADER_SIZE {
                return corrupted(format!("retired block {id} has offset {}", block.offset()));
            }
            cursor = match block.link() {
                BlockLink::Retired { next_free } => next_free,
                BlockLink::Active { .. } => {
                    return corrupted(format!("active block {id} is on the free list"))
                }
            };
        }

        if let Some(lost) = seen.iter().position(|&s| !s) {
            return corrupted(format!("block {lost} is on neither list"));
        }
        Ok(())
    }

    /// Release every block, active or retired.
    ///
    /// Equivalent to dropping the arena.
    pub fn release(self) {}

    #[cold]
    fn fatal(&self, err: &ArenaError) -> ! {
        abort_with(err, Some(self.id), self.created_at)
    }
}

/// Active chain from `current` back to the first block.
fn chain(blocks: &[Block], current: BlockId) -> impl Iterator<Item = BlockId> + '_ {
    let mut cursor = Some(current);
    std::iter::from_fn(move || {
        let id = cursor?;
        cursor = match blocks[id.index()].link() {
            BlockLink::Active { prev } => prev,
            BlockLink::Retired { .. } => None,
        };
        Some(id)
    })
}

#[cold]
fn abort_with(err: &ArenaError, arena: Option<ArenaInstanceId>, created_at: &Location<'_>) -> ! {
    tracing::error!(
        arena = arena.map(|id| id.as_u64()),
        %created_at,
        error = %err,
        "fatal arena failure, aborting"
    );
    // No subscriber may be installed; the abort reason must still reach
    // the operator.
    eprintln!("strata: arena created at {created_at}: {err}");
    std::process::abort()
}

impl<P: MemoryProvider, M: AccessMarker> Drop for Arena<P, M> {
    fn drop(&mut self) {
        let blocks = self.blocks.get_mut();
        for block in blocks.iter() {
            // SAFETY: each block is released exactly once, here, and the
            // arena (the only owner of pointers into it) is going away.
            unsafe { block.release(&self.provider) };
        }
        tracing::debug!(arena = %self.id, blocks = blocks.len(), "released arena");
        blocks.clear();
    }
}

impl<P: MemoryProvider, M: AccessMarker> fmt::Debug for Arena<P, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Arena")
            .field("id", &self.id)
            .field("created_at", &format_args!("{}", self.created_at))
            .field("config", &self.config)
            .field("stats", &stats)
            .finish()
    }
}
