//! Frame-style arena use: a long-lived arena, per-frame scratch scopes,
//! and occasional oversized requests.
//!
//! Run with `RUST_LOG=strata_arena=debug cargo run --example scratch_frames`
//! to see block creation and reuse.

use strata::prelude::*;
use tracing_subscriber::EnvFilter;

const FRAMES: usize = 8;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // Small blocks so the demo actually grows and recycles.
    let mut arena = Arena::with_provider(
        ArenaConfig::new(kib(64), kib(16)),
        OsMemory::new().with_large_page_size(kib(4)),
    );

    let title = arena.alloc_str("frames");
    tracing::info!(%title, position = arena.position(), "arena ready");
    let persistent = arena.checkpoint();

    for frame in 0..FRAMES {
        let mut scratch = arena.scratch_begin();

        // Many small pushes.
        let mut total = 0u64;
        for i in 0..10_000u32 {
            let slot = scratch.alloc(i);
            total += u64::from(*slot);
        }

        // One request larger than a block on every other frame.
        if frame % 2 == 1 {
            let big = scratch.alloc_zeroed::<u8>(256 * 1024);
            total += big.iter().map(|&b| u64::from(b)).sum::<u64>();
        }

        {
            let nested = scratch.scratch_begin();
            let label = nested.alloc_str("nested");
            tracing::debug!(frame, label = &*label, "nested scope");
        }

        let stats = scratch.stats();
        tracing::info!(
            frame,
            total,
            position = stats.position,
            active = stats.active_blocks,
            retired = stats.retired_blocks,
            reserved = stats.reserved_bytes,
            "frame done"
        );
    }

    assert_eq!(arena.position(), persistent.position());
    let stats = arena.stats();
    tracing::info!(
        blocks = stats.total_blocks(),
        retired = stats.retired_blocks,
        committed = stats.committed_bytes,
        "all frames rewound"
    );
    if let Err(err) = arena.check_invariants() {
        tracing::error!(%err, "arena invariants violated");
        std::process::exit(1);
    }
}
