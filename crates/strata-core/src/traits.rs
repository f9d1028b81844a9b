//! Core abstraction traits for virtual memory and access diagnostics.
//!
//! The arena never talks to the operating system directly. It goes
//! through a [`MemoryProvider`], which makes the growth and reuse policy
//! testable with instrumented providers, and reports every transition
//! between "owned" and "retired" memory to an [`AccessMarker`].

#![allow(unsafe_code)]

use std::ptr::NonNull;

use crate::error::ProviderError;

/// Source of reserved and committed virtual memory.
///
/// Reservation hands out address space without backing it; commit makes a
/// page-aligned sub-range readable and writable. The arena rounds every
/// reserve and commit request up to [`large_page_size`](Self::large_page_size)
/// before calling the provider.
///
/// # Safety
///
/// Implementors must guarantee that:
/// - A successful [`reserve`](Self::reserve) returns a region of at least
///   `size` bytes, aligned to at least [`page_size`](Self::page_size), that
///   no other live reservation overlaps.
/// - After a successful [`commit`](Self::commit) the committed range is
///   readable and writable and reads as zero the first time it is touched.
/// - Memory stays valid until [`release`](Self::release) is called on the
///   owning reservation.
pub unsafe trait MemoryProvider {
    /// Reserve `size` bytes of address space without committing it.
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, ProviderError>;

    /// Back `size` bytes starting at `addr` with physical memory.
    ///
    /// # Safety
    ///
    /// `addr..addr + size` must lie inside a live reservation returned by
    /// this provider, and `addr` must be page-aligned.
    unsafe fn commit(&self, addr: NonNull<u8>, size: usize) -> Result<(), ProviderError>;

    /// Return the physical backing of a committed range, keeping the
    /// address space reserved.
    ///
    /// # Safety
    ///
    /// Same range requirements as [`commit`](Self::commit). The range must
    /// not be accessed again until it is recommitted.
    unsafe fn decommit(&self, addr: NonNull<u8>, size: usize);

    /// Release a whole reservation.
    ///
    /// # Safety
    ///
    /// `addr` and `size` must be exactly the base and size of a live
    /// reservation returned by [`reserve`](Self::reserve). No pointer into
    /// the region may be used afterwards.
    unsafe fn release(&self, addr: NonNull<u8>, size: usize);

    /// The system page size in bytes.
    fn page_size(&self) -> usize;

    /// The granularity the arena rounds reservations and commits up to.
    fn large_page_size(&self) -> usize;
}

/// Diagnostic hook bracketing ownership transitions of arena memory.
///
/// [`mark_valid`](Self::mark_valid) is called on every range handed out
/// by a push; [`mark_invalid`](Self::mark_invalid) on every range a rewind
/// takes back. External tooling (AddressSanitizer, poison patterns) can use
/// these to catch use-after-rewind. Ranges are always inside committed
/// memory.
///
/// # Safety
///
/// Implementations may write to the range passed to `mark_invalid` but
/// must never touch memory outside the given range.
pub unsafe trait AccessMarker {
    /// The range is now owned by a caller and may be read and written.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + len` must be committed memory of a live arena block.
    unsafe fn mark_valid(&self, ptr: NonNull<u8>, len: usize);

    /// The range has been retired and must not be touched.
    ///
    /// # Safety
    ///
    /// `ptr..ptr + len` must be committed memory of a live arena block that
    /// no caller still holds a reference into.
    unsafe fn mark_invalid(&self, ptr: NonNull<u8>, len: usize);
}

/// Marker that does nothing. The default for release use.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoMarker;

// SAFETY: never touches memory.
unsafe impl AccessMarker for NoMarker {
    #[inline]
    unsafe fn mark_valid(&self, _ptr: NonNull<u8>, _len: usize) {}

    #[inline]
    unsafe fn mark_invalid(&self, _ptr: NonNull<u8>, _len: usize) {}
}

/// Byte written over retired memory by [`PoisonFill`].
pub const POISON_BYTE: u8 = 0xDD;

/// Marker that overwrites retired memory with [`POISON_BYTE`].
///
/// A read through a dangling arena pointer then sees a recognisable
/// `0xDDDD...` pattern instead of plausible stale data.
#[derive(Clone, Copy, Debug, Default)]
pub struct PoisonFill;

// SAFETY: only writes inside the range passed to `mark_invalid`, which the
// caller guarantees is committed and unowned.
unsafe impl AccessMarker for PoisonFill {
    #[inline]
    unsafe fn mark_valid(&self, _ptr: NonNull<u8>, _len: usize) {}

    unsafe fn mark_invalid(&self, ptr: NonNull<u8>, len: usize) {
        // SAFETY: upheld by the caller (see trait docs).
        unsafe { std::ptr::write_bytes(ptr.as_ptr(), POISON_BYTE, len) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn poison_fill_overwrites_exact_range() {
        let mut buf = [0u8; 16];
        let ptr = NonNull::new(buf[4..].as_mut_ptr()).unwrap();
        // SAFETY: the range lies inside `buf`.
        unsafe { PoisonFill.mark_invalid(ptr, 8) };
        assert_eq!(&buf[..4], &[0; 4]);
        assert!(buf[4..12].iter().all(|&b| b == POISON_BYTE));
        assert_eq!(&buf[12..], &[0; 4]);
    }

    #[test]
    fn poison_fill_mark_valid_leaves_data() {
        let mut buf = [7u8; 8];
        let ptr = NonNull::new(buf.as_mut_ptr()).unwrap();
        // SAFETY: the range lies inside `buf`.
        unsafe { PoisonFill.mark_valid(ptr, 8) };
        assert_eq!(buf, [7u8; 8]);
    }
}
