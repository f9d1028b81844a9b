//! Reusable provider and marker fixtures.

#![allow(unsafe_code)]

use std::ptr::NonNull;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use strata_core::{AccessMarker, MemoryProvider, ProviderError};
use strata_platform::OsMemory;

/// Call and byte counts observed by a [`CountingProvider`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ProviderStats {
    /// Successful reservations.
    pub reserve_calls: usize,
    /// Successful commits.
    pub commit_calls: usize,
    /// Decommit calls.
    pub decommit_calls: usize,
    /// Release calls.
    pub release_calls: usize,
    /// Bytes across successful reservations.
    pub reserved_bytes: usize,
    /// Bytes across successful commits.
    pub committed_bytes: usize,
    /// Bytes handed back through `release`.
    pub released_bytes: usize,
}

impl ProviderStats {
    /// Reservations not yet released.
    pub fn live_reservations(&self) -> usize {
        self.reserve_calls - self.release_calls
    }
}

#[derive(Default)]
struct Counters {
    reserve_calls: AtomicUsize,
    commit_calls: AtomicUsize,
    decommit_calls: AtomicUsize,
    release_calls: AtomicUsize,
    reserved_bytes: AtomicUsize,
    committed_bytes: AtomicUsize,
    released_bytes: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> ProviderStats {
        let load = |c: &AtomicUsize| c.load(Ordering::Relaxed);
        ProviderStats {
            reserve_calls: load(&self.reserve_calls),
            commit_calls: load(&self.commit_calls),
            decommit_calls: load(&self.decommit_calls),
            release_calls: load(&self.release_calls),
            reserved_bytes: load(&self.reserved_bytes),
            committed_bytes: load(&self.committed_bytes),
            released_bytes: load(&self.released_bytes),
        }
    }
}

fn bump(counter: &AtomicUsize, by: usize) {
    counter.fetch_add(by, Ordering::Relaxed);
}

/// Forwards to an inner provider, counting calls and bytes.
///
/// The counters are shared with every [`CountingHandle`], so they can be
/// read after the provider has been moved into (and dropped with) an arena.
pub struct CountingProvider<P = OsMemory> {
    inner: P,
    counters: Arc<Counters>,
}

impl<P: MemoryProvider> CountingProvider<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            counters: Arc::default(),
        }
    }

    pub fn stats(&self) -> ProviderStats {
        self.counters.snapshot()
    }

    /// A handle that outlives the provider.
    pub fn handle(&self) -> CountingHandle {
        CountingHandle(Arc::clone(&self.counters))
    }
}

/// Shared view of a [`CountingProvider`]'s counters.
#[derive(Clone)]
pub struct CountingHandle(Arc<Counters>);

impl CountingHandle {
    pub fn stats(&self) -> ProviderStats {
        self.0.snapshot()
    }
}

// SAFETY: every call is forwarded unchanged to a provider that upholds the
// contract.
unsafe impl<P: MemoryProvider> MemoryProvider for CountingProvider<P> {
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, ProviderError> {
        let ptr = self.inner.reserve(size)?;
        bump(&self.counters.reserve_calls, 1);
        bump(&self.counters.reserved_bytes, size);
        Ok(ptr)
    }

    unsafe fn commit(&self, addr: NonNull<u8>, size: usize) -> Result<(), ProviderError> {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.commit(addr, size)? };
        bump(&self.counters.commit_calls, 1);
        bump(&self.counters.committed_bytes, size);
        Ok(())
    }

    unsafe fn decommit(&self, addr: NonNull<u8>, size: usize) {
        bump(&self.counters.decommit_calls, 1);
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.decommit(addr, size) }
    }

    unsafe fn release(&self, addr: NonNull<u8>, size: usize) {
        bump(&self.counters.release_calls, 1);
        bump(&self.counters.released_bytes, size);
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.release(addr, size) }
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn large_page_size(&self) -> usize {
        self.inner.large_page_size()
    }
}

/// Succeeds a fixed number of reserves and commits, then fails every
/// further one.
///
/// Useful for driving the `try_*` error paths without exhausting real
/// memory. Counters are atomics so the provider stays `Send`.
pub struct FailingProvider<P = OsMemory> {
    inner: P,
    reserve_budget: usize,
    commit_budget: usize,
    reserves: AtomicUsize,
    commits: AtomicUsize,
}

impl<P: MemoryProvider> FailingProvider<P> {
    /// Allow `reserve_budget` reservations and `commit_budget` commits.
    pub fn new(inner: P, reserve_budget: usize, commit_budget: usize) -> Self {
        Self {
            inner,
            reserve_budget,
            commit_budget,
            reserves: AtomicUsize::new(0),
            commits: AtomicUsize::new(0),
        }
    }

    /// Reserve attempts so far, successful or not.
    pub fn reserve_attempts(&self) -> usize {
        self.reserves.load(Ordering::Relaxed)
    }

    /// Commit attempts so far, successful or not.
    pub fn commit_attempts(&self) -> usize {
        self.commits.load(Ordering::Relaxed)
    }
}

// SAFETY: successful calls are forwarded unchanged; failures hand out no
// memory.
unsafe impl<P: MemoryProvider> MemoryProvider for FailingProvider<P> {
    fn reserve(&self, size: usize) -> Result<NonNull<u8>, ProviderError> {
        if self.reserves.fetch_add(1, Ordering::Relaxed) >= self.reserve_budget {
            return Err(ProviderError::ReserveFailed {
                size,
                os_code: None,
            });
        }
        self.inner.reserve(size)
    }

    unsafe fn commit(&self, addr: NonNull<u8>, size: usize) -> Result<(), ProviderError> {
        if self.commits.fetch_add(1, Ordering::Relaxed) >= self.commit_budget {
            return Err(ProviderError::CommitFailed {
                addr: addr.as_ptr() as usize,
                size,
                os_code: None,
            });
        }
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.commit(addr, size) }
    }

    unsafe fn decommit(&self, addr: NonNull<u8>, size: usize) {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.decommit(addr, size) }
    }

    unsafe fn release(&self, addr: NonNull<u8>, size: usize) {
        // SAFETY: forwarded caller contract.
        unsafe { self.inner.release(addr, size) }
    }

    fn page_size(&self) -> usize {
        self.inner.page_size()
    }

    fn large_page_size(&self) -> usize {
        self.inner.large_page_size()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MarkKind {
    Valid,
    Invalid,
}

/// One call observed by a [`RecordingMarker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MarkEvent {
    pub kind: MarkKind,
    pub addr: usize,
    pub len: usize,
}

/// Records every mark without touching memory.
#[derive(Debug, Default)]
pub struct RecordingMarker {
    events: Mutex<Vec<MarkEvent>>,
}

impl RecordingMarker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<MarkEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Is `addr` inside a range whose most recent mark was invalid?
    pub fn is_invalid(&self, addr: usize) -> bool {
        self.events()
            .iter()
            .rev()
            .find(|e| e.addr <= addr && addr < e.addr + e.len)
            .is_some_and(|e| e.kind == MarkKind::Invalid)
    }

    fn record(&self, kind: MarkKind, ptr: NonNull<u8>, len: usize) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(MarkEvent {
                kind,
                addr: ptr.as_ptr() as usize,
                len,
            });
    }
}

// SAFETY: never touches the marked memory.
unsafe impl AccessMarker for RecordingMarker {
    unsafe fn mark_valid(&self, ptr: NonNull<u8>, len: usize) {
        self.record(MarkKind::Valid, ptr, len);
    }

    unsafe fn mark_invalid(&self, ptr: NonNull<u8>, len: usize) {
        self.record(MarkKind::Invalid, ptr, len);
    }
}
