//! In-memory response caching.
//!
//! Two pieces: [`ResponseSnapshot`], an immutable materialized copy of an
//! origin response that any number of clients can replay independently,
//! and [`ResponseCache`], a mutex-guarded TTL store mapping target URLs to
//! snapshots with lazy expiry.
//!
//! The cache is plain shared state, not a singleton: the dispatch pipeline
//! receives it by `Arc` so tests can substitute a fresh store per test.

mod entry;
mod store;

pub use entry::{CaptureError, ResponseSnapshot};
pub use store::{ResponseCache, DEFAULT_TTL};
