//! Strata: a growable, rewindable region arena over reserved virtual memory.
//!
//! This is the top-level facade crate that re-exports the public API from
//! all Strata sub-crates. For most users, adding `strata` as a single
//! dependency is sufficient.
//!
//! # Quick start
//!
//! ```rust
//! use strata::prelude::*;
//!
//! let mut arena = Arena::new(ArenaConfig::default());
//!
//! // Typed allocations live until the arena is rewound past them.
//! let name = arena.alloc_str("frame");
//! let counts = arena.alloc_zeroed::<u32>(128);
//! counts[7] += 1;
//! assert_eq!(name, "frame");
//!
//! // Temporary work: everything pushed inside the scope is reclaimed
//! // when the guard drops.
//! let before = arena.position();
//! {
//!     let scratch = arena.scratch_begin();
//!     scratch.alloc_slice_fill(1024, 0.5f32);
//! }
//! assert_eq!(arena.position(), before);
//!
//! // Raw positions work too.
//! let mark = arena.checkpoint();
//! arena.push(4096, 64, true);
//! arena.rewind(mark);
//! assert_eq!(arena.position(), mark.position());
//! ```
//!
//! # Modules
//!
//! | Module | Sub-crate | Contents |
//! |--------|-----------|----------|
//! | [`arena`] | `strata-arena` | `Arena`, `Scratch`, `Checkpoint`, config and stats |
//! | [`types`] | `strata-core` | Provider and marker traits, IDs, size helpers, errors |
//! | [`platform`] | `strata-platform` | `OsMemory`, and `AsanMarker` with the `asan` feature |
//!
//! # Features
//!
//! - `asan`: enables `platform::AsanMarker`, which poisons rewound memory
//!   for AddressSanitizer. Requires a sanitizer-enabled build.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![forbid(unsafe_code)]

/// The arena itself (`strata-arena`).
pub use strata_arena as arena;

/// Core traits, IDs, errors, and size helpers (`strata-core`).
///
/// Implement [`types::MemoryProvider`] or [`types::AccessMarker`] here to
/// plug custom memory sources or diagnostics into an arena.
pub use strata_core as types;

/// Operating-system memory provider (`strata-platform`).
pub use strata_platform as platform;

/// Common imports for typical Strata usage.
///
/// ```rust
/// use strata::prelude::*;
/// ```
pub mod prelude {
    // Arena
    pub use strata_arena::{
        Arena, ArenaConfig, ArenaError, ArenaStats, Checkpoint, Scratch, HEADER_SIZE,
    };

    // Providers and markers
    pub use strata_core::{AccessMarker, MemoryProvider, NoMarker, PoisonFill};
    pub use strata_platform::OsMemory;

    // Sizes
    pub use strata_core::{gib, kib, mib};
}
