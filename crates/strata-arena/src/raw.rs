//! Low-level primitives for arena memory operations.
//!
//! Every raw pointer write the arena performs goes through this module,
//! each with a `// SAFETY:` comment stating what the caller upholds.

#![allow(unsafe_code)]

use std::ptr::NonNull;

use strata_core::{ArenaInstanceId, BlockId};

/// Tag stored at the start of every block ("STRATA" + version).
pub(crate) const HEADER_MAGIC: u64 = 0x5354_5241_5441_0001;

/// Header written into the first bytes of every block.
///
/// The arena's bookkeeping lives in its block table; the in-memory header
/// lets a raw pointer be attributed to its arena and block when debugging.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct BlockHeader {
    pub(crate) magic: u64,
    pub(crate) arena: u64,
    pub(crate) block: u32,
    pub(crate) reuse_count: u32,
}

impl BlockHeader {
    pub(crate) fn new(arena: ArenaInstanceId, block: BlockId, reuse_count: u32) -> Self {
        Self {
            magic: HEADER_MAGIC,
            arena: arena.as_u64(),
            block: block.0,
            reuse_count,
        }
    }
}

/// Pointer `offset` bytes past `base`.
///
/// # Safety
///
/// `base..base + offset` must lie within one reservation.
#[inline]
pub(crate) unsafe fn at(base: NonNull<u8>, offset: usize) -> NonNull<u8> {
    // SAFETY: in-bounds of the reservation (caller contract), so the sum
    // cannot wrap to null.
    unsafe { base.add(offset) }
}

/// Write a block header at the start of a block.
///
/// # Safety
///
/// `base` must be the committed, 16-byte aligned start of a block with at
/// least `size_of::<BlockHeader>()` committed bytes.
pub(crate) unsafe fn write_header(base: NonNull<u8>, header: BlockHeader) {
    // SAFETY: committed and aligned (caller contract).
    unsafe { base.cast::<BlockHeader>().write(header) };
}

/// Read back a block header.
///
/// # Safety
///
/// Same as [`write_header`], and a header must have been written.
pub(crate) unsafe fn read_header(base: NonNull<u8>) -> BlockHeader {
    // SAFETY: committed, aligned, initialised (caller contract).
    unsafe { base.cast::<BlockHeader>().read() }
}

/// Zero `len` bytes at `ptr`.
///
/// # Safety
///
/// `ptr..ptr + len` must be committed and owned by the caller.
#[inline]
pub(crate) unsafe fn zero(ptr: NonNull<u8>, len: usize) {
    // SAFETY: committed and exclusively owned (caller contract).
    unsafe { std::ptr::write_bytes(ptr.as_ptr(), 0, len) };
}
