//! Benchmark profiles and workloads for the Strata arena.
//!
//! - [`reference_profile`]: default 64 MiB reserve/commit
//! - [`stress_profile`]: tiny blocks, so growth and reuse dominate
//! - [`push_many`]: the small-push loop shared by benches and tests

#![forbid(unsafe_code)]
#![deny(rustdoc::broken_intra_doc_links)]

use strata_arena::{Arena, ArenaConfig};
use strata_core::{kib, AccessMarker, MemoryProvider};

/// Arena configuration used for steady-state measurements.
pub fn reference_profile() -> ArenaConfig {
    ArenaConfig::default()
}

/// Arena configuration that forces a new block every few pushes.
///
/// Sizes round up to the provider granularity, so with a page-sized
/// granule every block holds one page.
pub fn stress_profile() -> ArenaConfig {
    ArenaConfig::new(kib(4), kib(4))
}

/// Push `count` allocations of `size` bytes aligned to `align`.
///
/// Returns the final position so callers can `black_box` it.
pub fn push_many<P: MemoryProvider, M: AccessMarker>(
    arena: &Arena<P, M>,
    count: usize,
    size: usize,
    align: usize,
) -> usize {
    for _ in 0..count {
        arena.push(size, align, false);
    }
    arena.position()
}

/// Deterministic mixed-size workload: sizes cycle through powers of two
/// from 8 to 4096 bytes, alignments through 1 to 64.
pub fn mixed_sizes(count: usize) -> impl Iterator<Item = (usize, usize)> {
    (0..count).map(|i| (8usize << (i % 10), 1usize << (i % 7)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_arena::HEADER_SIZE;
    use strata_platform::OsMemory;
    use strata_test_utils::CountingProvider;

    #[test]
    fn profiles_validate() {
        reference_profile().validate().unwrap();
        stress_profile().validate().unwrap();
    }

    #[test]
    fn push_many_moves_position() {
        let arena = Arena::new(stress_profile());
        let end = push_many(&arena, 100, 4, 4);
        assert!(end >= HEADER_SIZE + 400);
        arena.check_invariants().unwrap();
    }

    #[test]
    fn replaying_a_cleared_workload_reserves_nothing() {
        let provider = CountingProvider::new(OsMemory::new().with_large_page_size(kib(4)));
        let mut arena = Arena::with_provider(stress_profile(), provider);
        push_many(&arena, 2_000, 16, 8);
        arena.clear();
        let warm = arena.provider().stats().reserve_calls;
        assert!(warm > 1);
        for _ in 0..3 {
            push_many(&arena, 2_000, 16, 8);
            arena.clear();
        }
        assert_eq!(arena.provider().stats().reserve_calls, warm);
    }

    #[test]
    fn mixed_sizes_is_deterministic() {
        let a: Vec<_> = mixed_sizes(32).collect();
        let b: Vec<_> = mixed_sizes(32).collect();
        assert_eq!(a, b);
        assert!(a.iter().all(|&(size, align)| size >= 8 && align.is_power_of_two()));
    }
}
