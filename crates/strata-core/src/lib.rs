//! Core types and traits for the Strata virtual-memory arena.
//!
//! This is the leaf crate with zero internal dependencies. It defines
//! the seams the arena is built on: the [`MemoryProvider`] that reserves
//! and commits address space, the optional [`AccessMarker`] diagnostic
//! hook, block and arena identifiers, provider errors, and the
//! alignment/size arithmetic shared by every other crate.

#![deny(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]
#![deny(unsafe_code)]

pub mod error;
pub mod id;
pub mod size;
pub mod traits;

pub use error::ProviderError;
pub use id::{ArenaInstanceId, BlockId};
pub use size::{align_up, gib, is_power_of_two, kib, mib};
pub use traits::{AccessMarker, MemoryProvider, NoMarker, PoisonFill, POISON_BYTE};
