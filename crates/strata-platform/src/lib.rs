//! Operating-system virtual memory provider for the Strata arena.
//!
//! [`OsMemory`] implements [`strata_core::MemoryProvider`] on top of the
//! platform's address-space primitives:
//!
//! | Operation | Unix (libc) | Windows (winapi) |
//! |-----------|-------------|------------------|
//! | reserve   | `mmap(PROT_NONE)` | `VirtualAlloc(MEM_RESERVE)` |
//! | commit    | `mprotect(PROT_READ \| PROT_WRITE)` | `VirtualAlloc(MEM_COMMIT)` |
//! | decommit  | `madvise(MADV_DONTNEED)` + `mprotect(PROT_NONE)` | `VirtualFree(MEM_DECOMMIT)` |
//! | release   | `munmap` | `VirtualFree(MEM_RELEASE)` |
//!
//! With the `asan` feature, [`AsanMarker`] forwards arena access marks to
//! AddressSanitizer's manual poisoning interface.
//!
//! This crate and `strata-arena` are the only crates that contain `unsafe`
//! code.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

#[cfg(feature = "asan")]
pub mod asan;
pub mod os;

#[cfg(feature = "asan")]
pub use asan::AsanMarker;
pub use os::OsMemory;
