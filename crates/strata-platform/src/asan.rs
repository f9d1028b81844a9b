//! AddressSanitizer-backed [`AccessMarker`].

#![allow(unsafe_code)]

use std::ffi::c_void;
use std::ptr::NonNull;

use strata_core::AccessMarker;

extern "C" {
    fn __asan_poison_memory_region(addr: *const c_void, size: usize);
    fn __asan_unpoison_memory_region(addr: *const c_void, size: usize);
}

/// Forwards arena access marks to AddressSanitizer.
///
/// Retired arena memory is poisoned, so ASan reports any access through a
/// pointer that outlived the rewind that retired it.
#[derive(Clone, Copy, Debug, Default)]
pub struct AsanMarker;

// SAFETY: the sanitizer calls only update shadow memory; they never write
// to the marked range itself.
unsafe impl AccessMarker for AsanMarker {
    unsafe fn mark_valid(&self, ptr: NonNull<u8>, len: usize) {
        // SAFETY: the range is committed arena memory (trait contract).
        unsafe { __asan_unpoison_memory_region(ptr.as_ptr().cast(), len) };
    }

    unsafe fn mark_invalid(&self, ptr: NonNull<u8>, len: usize) {
        // SAFETY: the range is committed arena memory (trait contract).
        unsafe { __asan_poison_memory_region(ptr.as_ptr().cast(), len) };
    }
}
