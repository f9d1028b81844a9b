//! Test utilities for Strata development.
//!
//! Instrumented implementations of the core traits:
//!
//! - [`CountingProvider`] wraps a real provider and counts every call.
//! - [`FailingProvider`] fails deterministically after N successes.
//! - [`RecordingMarker`] logs every valid/invalid transition.

#![deny(unsafe_code)]
#![allow(missing_docs)]
#![deny(rustdoc::broken_intra_doc_links)]

pub mod fixtures;

pub use fixtures::{
    CountingHandle, CountingProvider, FailingProvider, MarkEvent, MarkKind, ProviderStats,
    RecordingMarker,
};
