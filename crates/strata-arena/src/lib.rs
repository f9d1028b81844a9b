//! Growable region arena over reserved virtual memory.
//!
//! An [`Arena`] hands out memory by bumping a cursor through large
//! reservations obtained from a [`MemoryProvider`](strata_core::MemoryProvider).
//! Physical memory is committed on demand, and when a reservation fills
//! the arena chains another one. Allocations are never freed one by one:
//! the arena is rewound to an earlier position instead, either directly
//! ([`Arena::pop_to`], [`Arena::rewind`]) or by dropping a [`Scratch`]
//! guard.
//!
//! # Architecture
//!
//! ```text
//! Arena (orchestrator)
//! ├── Block[] (one reservation each, HEADER_SIZE header + bump region)
//! │   ├── active chain: current → prev → ... → first
//! │   └── free list: retired blocks, reused before reserving more
//! ├── MemoryProvider (OsMemory by default)
//! └── AccessMarker (NoMarker / PoisonFill / AsanMarker)
//! ```
//!
//! # Positions
//!
//! Every block occupies a contiguous range of logical positions starting
//! where its predecessor's reservation ends. A position is therefore a
//! single `usize` that survives block changes, and rewinding to one
//! retires every block that starts after it. The smallest position is
//! [`HEADER_SIZE`].
//!
//! # Failure
//!
//! Out-of-memory is fatal by default: the error is logged and the process
//! aborts. The `try_*` constructors and [`Arena::try_push`] return an
//! [`ArenaError`] instead.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod arena;
mod block;
pub mod checkpoint;
pub mod config;
pub mod error;
mod raw;
pub mod scratch;
pub mod stats;

pub use arena::{Arena, MIN_TYPED_ALIGN};
pub use block::HEADER_SIZE;
pub use checkpoint::Checkpoint;
pub use config::ArenaConfig;
pub use error::ArenaError;
pub use scratch::Scratch;
pub use stats::ArenaStats;
