use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::Instrument;

use crate::entry::{self, Entry};
use crate::{Generator, MemoCache, MemoConfig, MemoError};

type EntryMap<V, E> = Mutex<HashMap<String, Entry<V, E>>>;

/// A memo cache sharing its entries behind a lock.
///
/// The lock is only held to look up or insert an entry, never while running the generator or
/// waiting for a result. The first caller for a key creates the entry and eagerly spawns the
/// generator on the current Tokio runtime, then every caller of that key (including the first one)
/// waits for the entry to become ready. Lookups of different keys proceed fully in parallel.
///
/// A caller giving up on its lookup does not affect the computation or any other caller.
pub struct GuardedCache<G: Generator> {
    name: Arc<str>,
    generator: Arc<G>,
    entries: EntryMap<G::Value, G::Error>,
}

impl<G: Generator> fmt::Debug for GuardedCache<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GuardedCache")
            .field("name", &self.name)
            .field("entries", &self.len())
            .finish()
    }
}

impl<G: Generator> GuardedCache<G> {
    /// Creates a new cache with the default configuration.
    pub fn new(generator: G) -> Self {
        Self::with_config(generator, &MemoConfig::default())
    }

    /// Creates a new cache.
    pub fn with_config(generator: G, config: &MemoConfig) -> Self {
        GuardedCache {
            name: config.name.as_str().into(),
            generator: Arc::new(generator),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The number of keys requested so far.
    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether no key was requested yet.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the memoized result for `key`.
    ///
    /// The first request of a key spawns the generator; all requests of the key wait for and share
    /// that result.
    ///
    /// # Panics
    ///
    /// Panics when a new key is requested outside of a Tokio runtime.
    pub async fn get(&self, key: &str) -> Result<G::Value, MemoError<G::Error>> {
        let span = tracing::trace_span!("memo.get", cache = %self.name, key);

        let (entry, completion) = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            match entries.get(key) {
                Some(entry) => (entry.clone(), None),
                None => {
                    let (entry, completion) = entry::pending();
                    entries.insert(key.to_owned(), entry.clone());
                    (entry, Some(completion))
                }
            }
        };

        match completion {
            Some(completion) => {
                span.in_scope(|| tracing::debug!("computing new entry"));
                let generator = Arc::clone(&self.generator);
                let key = key.to_owned();
                let computation = async move {
                    let result = generator.generate(&key).await;
                    completion.complete(result);
                };
                tokio::spawn(computation.instrument(span.clone()));
            }
            None => span.in_scope(|| tracing::trace!("waiting for existing entry")),
        }

        entry.wait().instrument(span).await
    }

    /// Does nothing, as this cache holds no background resources.
    ///
    /// The cache keeps serving requests after being closed.
    pub fn close(&self) -> Result<(), MemoError<G::Error>> {
        Ok(())
    }
}

impl<G: Generator> MemoCache for GuardedCache<G> {
    type Value = G::Value;
    type Error = G::Error;

    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Self::Value, MemoError<Self::Error>>> + Send {
        GuardedCache::get(self, key)
    }

    fn close(&self) -> Result<(), MemoError<Self::Error>> {
        GuardedCache::close(self)
    }
}
