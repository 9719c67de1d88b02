//! Single-flight memoization of keyed computations.
//!
//! A memo cache is constructed from a [`Generator`], a function mapping a string key to a
//! `Result<V, E>`. No matter how many callers concurrently request the same key, the generator is
//! invoked at most once for it, and every caller (past and future) observes the same result.
//!
//! ## Cache Variants
//!
//! There are two implementations of the [`MemoCache`] interface with identical semantics:
//!
//! - [`CoordinatorCache`] owns its map inside a single coordinator task. Callers send requests over
//!   a queue and wait for their private response. The coordinator spawns computations and
//!   deliveries, so it never blocks on a generator itself.
//! - [`GuardedCache`] keeps its map behind a mutex. The lock is only held for the lookup and
//!   insertion of an entry; the caller creating an entry spawns the generator outside the lock,
//!   and all callers wait on the entry's completion signal.
//!
//! ## Errors are cached
//!
//! An `Err` returned by the generator is memoized exactly like a value and replayed to every
//! caller of that key. It is *never* retried. Entries are never evicted either, so the cache grows
//! for as long as it lives.
//!
//! ## Limitations
//!
//! There is no timeout: a [`MemoCache::get`] waits for as long as the generator takes. A generator
//! that calls back into the same cache for the same key will deadlock.

#![warn(missing_docs)]

use std::future::Future;

mod config;
mod coordinator;
mod entry;
mod error;
mod generator;
mod guarded;
mod logging;

pub use config::*;
pub use coordinator::CoordinatorCache;
pub use error::MemoError;
pub use generator::*;
pub use guarded::GuardedCache;
pub use logging::init_logging;

/// The common interface of all memo caches.
pub trait MemoCache {
    /// The memoized value.
    type Value;
    /// The memoized generator error.
    type Error;

    /// Returns the memoized result for `key`, computing it if this is the first request for it.
    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Self::Value, MemoError<Self::Error>>> + Send;

    /// Releases any background resources held by the cache.
    fn close(&self) -> Result<(), MemoError<Self::Error>>;
}
