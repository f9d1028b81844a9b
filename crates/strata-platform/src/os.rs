//! [`OsMemory`]: the platform virtual memory provider.
//!
//! Reservations are made inaccessible (`PROT_NONE` / `PAGE_NOACCESS`) and
//! only become usable once committed, so a stray access past the committed
//! frontier faults instead of silently touching memory.

#![allow(unsafe_code)]

use std::io;
use std::ptr::NonNull;
use std::sync::OnceLock;

use strata_core::{mib, MemoryProvider, ProviderError};

/// Large-page granularity used where the platform does not report one.
pub const DEFAULT_LARGE_PAGE_SIZE: usize = mib(2);

/// Virtual memory provider backed by the operating system.
///
/// # Example
///
/// ```
/// use strata_core::MemoryProvider;
/// use strata_platform::OsMemory;
///
/// let os = OsMemory::new();
/// assert!(os.page_size().is_power_of_two());
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct OsMemory {
    /// Try huge-page backed reservations first (Linux `MAP_HUGETLB`).
    huge_pages: bool,
    /// Granularity override for [`MemoryProvider::large_page_size`].
    large_page_size: Option<usize>,
}

impl OsMemory {
    /// Provider with normal pages and the platform large-page granularity.
    pub const fn new() -> Self {
        Self {
            huge_pages: false,
            large_page_size: None,
        }
    }

    /// Attempt huge-page reservations, falling back to normal pages when the
    /// system has none configured. Only honoured on Linux.
    ///
    /// While enabled, [`MemoryProvider::large_page_size`] never reports less
    /// than [`DEFAULT_LARGE_PAGE_SIZE`], whatever override is set.
    pub const fn with_huge_pages(mut self, enabled: bool) -> Self {
        self.huge_pages = enabled;
        self
    }

    /// Override the granularity the arena rounds reserve/commit requests to.
    ///
    /// The value is raised to at least the system page size and rounded to
    /// a power of two.
    pub fn with_large_page_size(mut self, size: usize) -> Self {
        let size = size.max(system_page_size()).next_power_of_two();
        self.large_page_size = Some(size);
        self
    }
}

fn last_os_code() -> Option<i32> {
    io::Error::last_os_error().raw_os_error()
}

fn system_page_size() -> usize {
    static PAGE_SIZE: OnceLock<usize> = OnceLock::new();
    *PAGE_SIZE.get_or_init(sys::page_size)
}

// SAFETY: every successful `reserve` is a fresh anonymous mapping of at
// least `size` bytes, page-aligned by the OS; committed pages are
// zero-filled on first touch; mappings live until `release`.
unsafe impl MemoryProvider for OsMemory {
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, ProviderError> {
        let ptr = if self.huge_pages {
            sys::reserve_huge(size).or_else(|| {
                tracing::debug!(size, "huge-page reservation unavailable, using normal pages");
                sys::reserve(size)
            })
        } else {
            sys::reserve(size)
        };
        ptr.ok_or_else(|| ProviderError::ReserveFailed {
            size,
            os_code: last_os_code(),
        })
    }

    unsafe fn commit(&self, addr: NonNull<u8>, size: usize) -> Result<(), ProviderError> {
        // SAFETY: caller guarantees the range lies in a live reservation.
        if unsafe { sys::commit(addr, size) } {
            Ok(())
        } else {
            Err(ProviderError::CommitFailed {
                addr: addr.as_ptr() as usize,
                size,
                os_code: last_os_code(),
            })
        }
    }

    unsafe fn decommit(&self, addr: NonNull<u8>, size: usize) {
        // SAFETY: caller guarantees the range lies in a live reservation.
        unsafe { sys::decommit(addr, size) }
    }

    unsafe fn release(&self, addr: NonNull<u8>, size: usize) {
        // SAFETY: caller guarantees addr/size describe a whole reservation.
        unsafe { sys::release(addr, size) }
    }

    fn page_size(&self) -> usize {
        system_page_size()
    }

    fn large_page_size(&self) -> usize {
        let size = self.large_page_size.unwrap_or_else(|| {
            static LARGE_PAGE_SIZE: OnceLock<usize> = OnceLock::new();
            *LARGE_PAGE_SIZE.get_or_init(|| sys::large_page_size().max(system_page_size()))
        });
        // Huge-page mappings must stay huge-page multiples or munmap rejects them.
        if self.huge_pages {
            size.max(DEFAULT_LARGE_PAGE_SIZE)
        } else {
            size
        }
    }
}

#[cfg(unix)]
mod sys {
    use std::ptr::{self, NonNull};

    use super::DEFAULT_LARGE_PAGE_SIZE;

    #[cfg(target_os = "linux")]
    const RESERVE_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS | libc::MAP_NORESERVE;
    #[cfg(not(target_os = "linux"))]
    const RESERVE_FLAGS: libc::c_int = libc::MAP_PRIVATE | libc::MAP_ANONYMOUS;

    pub(super) fn page_size() -> usize {
        // SAFETY: sysconf has no preconditions; _SC_PAGESIZE is always valid.
        let size = unsafe { libc::sysconf(libc::_SC_PAGESIZE) };
        if size > 0 {
            size as usize
        } else {
            4096
        }
    }

    pub(super) fn large_page_size() -> usize {
        DEFAULT_LARGE_PAGE_SIZE
    }

    fn map(size: usize, flags: libc::c_int) -> Option<NonNull<u8>> {
        // SAFETY: anonymous PROT_NONE mapping at an OS-chosen address; the
        // kernel validates every argument and reports MAP_FAILED on error.
        let ptr = unsafe { libc::mmap(ptr::null_mut(), size, libc::PROT_NONE, flags, -1, 0) };
        if ptr == libc::MAP_FAILED {
            None
        } else {
            NonNull::new(ptr.cast::<u8>())
        }
    }

    pub(super) fn reserve(size: usize) -> Option<NonNull<u8>> {
        map(size, RESERVE_FLAGS)
    }

    #[cfg(target_os = "linux")]
    pub(super) fn reserve_huge(size: usize) -> Option<NonNull<u8>> {
        map(size, RESERVE_FLAGS | libc::MAP_HUGETLB)
    }

    #[cfg(not(target_os = "linux"))]
    pub(super) fn reserve_huge(_size: usize) -> Option<NonNull<u8>> {
        None
    }

    pub(super) unsafe fn commit(addr: NonNull<u8>, size: usize) -> bool {
        // SAFETY: range is inside a live mapping (caller contract).
        unsafe {
            libc::mprotect(
                addr.as_ptr().cast(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
            ) == 0
        }
    }

    pub(super) unsafe fn decommit(addr: NonNull<u8>, size: usize) {
        // SAFETY: range is inside a live mapping (caller contract). Failure
        // leaves the pages committed, which is harmless.
        unsafe {
            libc::madvise(addr.as_ptr().cast(), size, libc::MADV_DONTNEED);
            libc::mprotect(addr.as_ptr().cast(), size, libc::PROT_NONE);
        }
    }

    pub(super) unsafe fn release(addr: NonNull<u8>, size: usize) {
        // SAFETY: addr/size are exactly one mapping (caller contract).
        let rc = unsafe { libc::munmap(addr.as_ptr().cast(), size) };
        if rc != 0 {
            tracing::warn!(
                addr = addr.as_ptr() as usize,
                size,
                error = %std::io::Error::last_os_error(),
                "munmap failed"
            );
        }
    }
}

#[cfg(windows)]
mod sys {
    use std::ptr::{self, NonNull};

    use winapi::um::memoryapi::{GetLargePageMinimum, VirtualAlloc, VirtualFree};
    use winapi::um::sysinfoapi::{GetSystemInfo, SYSTEM_INFO};
    use winapi::um::winnt::{
        MEM_COMMIT, MEM_DECOMMIT, MEM_RELEASE, MEM_RESERVE, PAGE_NOACCESS, PAGE_READWRITE,
    };

    pub(super) fn page_size() -> usize {
        // SAFETY: GetSystemInfo fills the struct we pass and cannot fail.
        let info = unsafe {
            let mut info: SYSTEM_INFO = std::mem::zeroed();
            GetSystemInfo(&mut info);
            info
        };
        info.dwPageSize as usize
    }

    pub(super) fn large_page_size() -> usize {
        // SAFETY: no preconditions. Returns 0 when large pages are unsupported.
        unsafe { GetLargePageMinimum() }
    }

    pub(super) fn reserve(size: usize) -> Option<NonNull<u8>> {
        // SAFETY: reserve-only allocation at an OS-chosen address.
        let ptr = unsafe { VirtualAlloc(ptr::null_mut(), size, MEM_RESERVE, PAGE_NOACCESS) };
        NonNull::new(ptr.cast::<u8>())
    }

    pub(super) fn reserve_huge(_size: usize) -> Option<NonNull<u8>> {
        // MEM_LARGE_PAGES requires reserving and committing in one call,
        // which defeats commit-on-demand.
        None
    }

    pub(super) unsafe fn commit(addr: NonNull<u8>, size: usize) -> bool {
        // SAFETY: range is inside a live reservation (caller contract).
        let ptr = unsafe { VirtualAlloc(addr.as_ptr().cast(), size, MEM_COMMIT, PAGE_READWRITE) };
        !ptr.is_null()
    }

    pub(super) unsafe fn decommit(addr: NonNull<u8>, size: usize) {
        // SAFETY: range is inside a live reservation (caller contract).
        unsafe { VirtualFree(addr.as_ptr().cast(), size, MEM_DECOMMIT) };
    }

    pub(super) unsafe fn release(addr: NonNull<u8>, _size: usize) {
        // SAFETY: addr is the base of a reservation (caller contract);
        // MEM_RELEASE requires a zero size.
        let ok = unsafe { VirtualFree(addr.as_ptr().cast(), 0, MEM_RELEASE) };
        if ok == 0 {
            tracing::warn!(
                addr = addr.as_ptr() as usize,
                error = %std::io::Error::last_os_error(),
                "VirtualFree(MEM_RELEASE) failed"
            );
        }
    }
}
