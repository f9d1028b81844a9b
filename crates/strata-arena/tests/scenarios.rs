//! Integration tests: end-to-end arena scenarios through the public API.
//!
//! Provider calls are observed with `CountingProvider`, so growth and reuse
//! claims are checked against what actually reached the memory provider.

use strata_arena::{Arena, ArenaConfig, ArenaError, HEADER_SIZE};
use strata_core::{ProviderError, POISON_BYTE};
use strata_platform::OsMemory;
use strata_test_utils::{CountingProvider, FailingProvider, MarkKind, RecordingMarker};

const PAGE: usize = 4096;

fn counting(granule: Option<usize>) -> CountingProvider {
    let os = match granule {
        Some(size) => OsMemory::new().with_large_page_size(size),
        None => OsMemory::new(),
    };
    CountingProvider::new(os)
}

// ── Basic push / pop ─────────────────────────────────────────────

#[test]
fn tiny_config_push_pop_reuses_block_memory() {
    let mut arena = Arena::with_provider(ArenaConfig::new(4, 4), counting(None));
    assert_eq!(arena.position(), HEADER_SIZE);

    let first = arena.push(4, 4, false).cast::<u32>();
    assert_eq!(arena.position(), HEADER_SIZE + 4);
    let second = arena.push(4, 4, false).cast::<u32>();
    assert_eq!(arena.position(), HEADER_SIZE + 8);
    assert_eq!(second.as_ptr() as usize - first.as_ptr() as usize, 4);

    // SAFETY: both slots were just pushed, are 4-byte aligned, and stay
    // valid until the `pop` below.
    unsafe {
        first.as_ptr().write(1987);
        second.as_ptr().write(1366);
        assert_eq!(first.as_ptr().read(), 1987);
        assert_eq!(second.as_ptr().read(), 1366);
    }

    let reserves = arena.provider().stats().reserve_calls;
    arena.pop(8);
    assert_eq!(arena.position(), HEADER_SIZE);
    let again = arena.push(4, 4, false).cast::<u32>();
    assert_eq!(again, first);
    assert_eq!(arena.provider().stats().reserve_calls, reserves);
    assert_eq!(arena.block_count(), 1);
}

#[test]
fn million_small_pushes_default_granule() {
    let arena = Arena::with_provider(ArenaConfig::new(4, 4), counting(None));
    for i in 0..1_000_000u32 {
        let slot = arena.alloc(i);
        assert_eq!(*slot, i);
    }
    // Typed helpers align to 8, so each u32 occupies 8 bytes.
    assert!(arena.position() >= HEADER_SIZE + 8 * 1_000_000);
    assert!(arena.block_count() >= 1);
    arena.check_invariants().unwrap();
}

#[test]
fn million_raw_pushes_chain_many_small_blocks() {
    let arena = Arena::with_provider(ArenaConfig::new(4, 4), counting(Some(PAGE)));
    for _ in 0..1_000_000 {
        arena.push(4, 4, false);
    }
    let per_block = (PAGE - HEADER_SIZE) / 4;
    let expected_blocks = 1_000_000usize.div_ceil(per_block);
    assert_eq!(arena.block_count(), expected_blocks);
    assert_eq!(arena.provider().stats().reserve_calls, expected_blocks);
    let stats = arena.stats();
    assert_eq!(stats.active_blocks, expected_blocks);
    assert_eq!(stats.used_bytes, 4_000_000);
    arena.check_invariants().unwrap();
}

#[test]
fn commit_grows_in_requested_steps() {
    let arena = Arena::with_provider(ArenaConfig::new(PAGE * 16, PAGE * 2), counting(Some(PAGE)));
    assert_eq!(arena.stats().committed_bytes, PAGE * 2);
    arena.push(PAGE * 2, 1, false);
    assert_eq!(arena.stats().committed_bytes, PAGE * 4);
    arena.push(PAGE * 5, 1, false);
    assert_eq!(arena.stats().committed_bytes, PAGE * 8);
    assert_eq!(arena.block_count(), 1);
    // One initial commit plus two growth steps.
    assert_eq!(arena.provider().stats().commit_calls, 3);
}

// ── Growth and reuse ─────────────────────────────────────────────

#[test]
fn growth_happens_exactly_when_block_is_full() {
    let arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), counting(Some(PAGE)));
    // Leave exactly 8 bytes; an 8-aligned 8-byte push must still fit.
    arena.push(PAGE - HEADER_SIZE - 8, 1, false);
    arena.push(8, 8, false);
    assert_eq!(arena.block_count(), 1);
    arena.push(1, 1, false);
    assert_eq!(arena.block_count(), 2);
}

#[test]
fn rewound_blocks_are_reused_before_reserving() {
    let mut arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), counting(Some(PAGE)));
    let start = arena.checkpoint();
    for _ in 0..32 {
        arena.push(PAGE / 2, 16, true);
    }
    let reserved = arena.provider().stats().reserve_calls;
    let blocks = arena.block_count();

    for _ in 0..10 {
        arena.rewind(start);
        for _ in 0..32 {
            arena.push(PAGE / 2, 16, true);
        }
    }
    assert_eq!(arena.provider().stats().reserve_calls, reserved);
    assert_eq!(arena.block_count(), blocks);
    arena.check_invariants().unwrap();
}

#[test]
fn clear_then_refill_keeps_reservation_count_flat() {
    let mut arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), counting(Some(PAGE)));
    for _ in 0..500 {
        arena.alloc_slice_fill(100, 0xABu8);
    }
    let reserved = arena.provider().stats().reserve_calls;
    arena.clear();
    assert_eq!(arena.position(), HEADER_SIZE);
    for _ in 0..500 {
        let bytes = arena.alloc_zeroed::<u8>(100);
        assert!(bytes.iter().all(|&b| b == 0));
    }
    assert_eq!(arena.provider().stats().reserve_calls, reserved);
}

#[test]
fn pop_to_lands_inside_earlier_block() {
    let mut arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), counting(Some(PAGE)));
    arena.push(100, 1, false);
    let inside_first = arena.position();
    arena.push(PAGE, 1, false);
    arena.push(PAGE, 1, false);
    assert_eq!(arena.stats().active_blocks, 3);

    arena.pop_to(inside_first);
    assert_eq!(arena.position(), inside_first);
    let stats = arena.stats();
    assert_eq!(stats.active_blocks, 1);
    assert_eq!(stats.retired_blocks, 2);
    arena.check_invariants().unwrap();
}

#[test]
fn pop_to_header_gap_of_later_block_retires_it() {
    let mut arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), counting(Some(PAGE)));
    arena.push(PAGE - HEADER_SIZE, 1, false);
    let full_first = arena.position();
    arena.push(16, 1, false);
    assert_eq!(arena.block_count(), 2);

    // Positions in block 1's header are not addressable; rewinding into
    // them retires block 1 and leaves block 0 where it was.
    arena.pop_to(PAGE + HEADER_SIZE / 2);
    assert_eq!(arena.position(), full_first);
    assert_eq!(arena.stats().retired_blocks, 1);
    arena.check_invariants().unwrap();
}

// ── Teardown ─────────────────────────────────────────────────────

#[test]
fn teardown_releases_active_and_retired_blocks_once() {
    let provider = counting(Some(PAGE));
    let handle = provider.handle();
    {
        let mut arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), provider);
        for _ in 0..20 {
            arena.push(PAGE / 2, 8, false);
        }
        arena.pop_to(HEADER_SIZE + PAGE * 3);
        let stats = arena.stats();
        assert!(stats.retired_blocks > 0);
        assert!(stats.active_blocks > 1);
        arena.release();
    }
    let stats = handle.stats();
    assert!(stats.reserve_calls > 1);
    assert_eq!(stats.release_calls, stats.reserve_calls);
    assert_eq!(stats.released_bytes, stats.reserved_bytes);
    assert_eq!(stats.live_reservations(), 0);
}

// ── Scratch scopes and checkpoints ──────────────────────────────

#[test]
fn nested_scratch_restores_outer_position() {
    let mut arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), counting(Some(PAGE)));
    arena.alloc_str("persistent");
    let before = arena.position();
    {
        let mut a = arena.scratch_begin();
        a.push(PAGE, 8, false);
        let after_a = a.position();
        {
            let mut b = a.scratch_begin();
            b.push(PAGE * 2, 8, false);
            let after_b = b.position();
            {
                let c = b.scratch_begin();
                c.push(10, 1, false);
            }
            assert_eq!(b.position(), after_b);
        }
        assert_eq!(a.position(), after_a);
    }
    assert_eq!(arena.position(), before);
    arena.check_invariants().unwrap();
}

#[test]
fn older_checkpoint_discards_newer_allocations() {
    let mut arena = Arena::with_provider(ArenaConfig::new(PAGE, PAGE), counting(Some(PAGE)));
    let older = arena.checkpoint();
    arena.push(64, 8, false);
    let newer = arena.checkpoint();
    arena.push(64, 8, false);

    arena.rewind(older);
    assert_eq!(arena.position(), older.position());
    // Rewinding "forward" to the newer checkpoint is a no-op.
    arena.rewind(newer);
    assert_eq!(arena.position(), older.position());
}

// ── Failure reporting ────────────────────────────────────────────

#[test]
fn try_push_reports_reserve_failure_on_growth() {
    let provider = FailingProvider::new(OsMemory::new().with_large_page_size(PAGE), 1, usize::MAX);
    let arena = Arena::try_with_provider(ArenaConfig::new(PAGE, PAGE), provider).unwrap();
    arena.try_push(PAGE - HEADER_SIZE, 1, false).unwrap();
    let before = arena.position();

    let err = arena.try_push(16, 8, false).unwrap_err();
    assert!(matches!(
        err,
        ArenaError::Provider(ProviderError::ReserveFailed { .. })
    ));
    assert_eq!(arena.position(), before);
    assert_eq!(arena.block_count(), 1);
    arena.check_invariants().unwrap();
}

#[test]
fn failed_initial_commit_releases_reservation() {
    let counting = CountingProvider::new(FailingProvider::new(OsMemory::new(), usize::MAX, 0));
    let handle = counting.handle();
    let err = Arena::try_with_provider(ArenaConfig::default(), counting).unwrap_err();
    assert!(matches!(
        err,
        ArenaError::Provider(ProviderError::CommitFailed { .. })
    ));
    let stats = handle.stats();
    assert_eq!(stats.reserve_calls, 1);
    assert_eq!(stats.release_calls, 1);
}

// ── Diagnostics ──────────────────────────────────────────────────

#[test]
fn recording_marker_flags_rewound_ranges() {
    let mut arena = Arena::with_parts(
        ArenaConfig::new(PAGE, PAGE),
        OsMemory::new().with_large_page_size(PAGE),
        RecordingMarker::new(),
    );
    let keep = arena.push(16, 8, false).as_ptr() as usize;
    let mark = arena.checkpoint();
    let gone = arena.push(PAGE, 8, false).as_ptr() as usize;
    assert!(!arena.marker().is_invalid(gone));

    arena.rewind(mark);
    assert!(arena.marker().is_invalid(gone));
    assert!(!arena.marker().is_invalid(keep));
    let valid_marks = arena
        .marker()
        .events()
        .iter()
        .filter(|e| e.kind == MarkKind::Valid)
        .count();
    assert_eq!(valid_marks, 2);
}

#[test]
fn poison_fill_overwrites_retired_block_contents() {
    let mut arena = Arena::with_parts(
        ArenaConfig::new(PAGE, PAGE),
        OsMemory::new().with_large_page_size(PAGE),
        strata_core::PoisonFill,
    );
    let mark = arena.checkpoint();
    arena.push(PAGE - HEADER_SIZE, 1, false);
    let addr = arena.alloc_slice_fill(32, 0x11u8).as_ptr() as usize;
    assert_eq!(arena.block_count(), 2);
    arena.rewind(mark);
    // SAFETY: the retired block stays reserved and committed while it
    // sits on the free list; this only reads it.
    let bytes = unsafe { std::slice::from_raw_parts(addr as *const u8, 32) };
    assert!(bytes.iter().all(|&b| b == POISON_BYTE));
}
