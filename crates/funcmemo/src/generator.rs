use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;

/// The computation being memoized by a cache.
///
/// A generator maps a key to either a value or an error. Both outcomes are memoized. It is invoked
/// at most once per key and cache, but can be invoked concurrently for different keys.
pub trait Generator: Send + Sync + 'static {
    /// The value computed for a key.
    type Value: Clone + Send + Sync + 'static;
    /// The error the computation can fail with.
    type Error: Clone + Send + Sync + 'static;
    /// The computation future.
    type Computation: Future<Output = Result<Self::Value, Self::Error>> + Send + 'static;

    /// Starts the computation for `key`.
    fn generate(&self, key: &str) -> Self::Computation;
}

/// A [`Generator`] created by [`from_fn`].
#[derive(Clone)]
pub struct FnGenerator<F> {
    f: F,
}

impl<F> fmt::Debug for FnGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnGenerator").finish_non_exhaustive()
    }
}

/// Creates a [`Generator`] from an async function.
///
/// ```
/// let generator = funcmemo::from_fn(|key: String| async move { Ok::<_, String>(key.len()) });
/// # let _ = generator;
/// ```
pub fn from_fn<F, Fut, V, E>(f: F) -> FnGenerator<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
{
    FnGenerator { f }
}

impl<F, Fut, V, E> Generator for FnGenerator<F>
where
    F: Fn(String) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<V, E>> + Send + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Value = V;
    type Error = E;
    type Computation = Fut;

    fn generate(&self, key: &str) -> Self::Computation {
        (self.f)(key.to_owned())
    }
}

/// A [`Generator`] created by [`from_blocking_fn`].
pub struct BlockingFnGenerator<F> {
    f: Arc<F>,
}

impl<F> fmt::Debug for BlockingFnGenerator<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockingFnGenerator").finish_non_exhaustive()
    }
}

/// Creates a [`Generator`] from a synchronous function.
///
/// The function is run on the blocking thread pool of the current Tokio runtime, so that slow
/// computations do not stall the executor. A panic inside the function is re-raised in the cache's
/// computation task, which leaves the key as [`MemoError::Abandoned`](crate::MemoError::Abandoned).
pub fn from_blocking_fn<F, V, E>(f: F) -> BlockingFnGenerator<F>
where
    F: Fn(&str) -> Result<V, E> + Send + Sync + 'static,
{
    BlockingFnGenerator { f: Arc::new(f) }
}

impl<F, V, E> Generator for BlockingFnGenerator<F>
where
    F: Fn(&str) -> Result<V, E> + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
    E: Clone + Send + Sync + 'static,
{
    type Value = V;
    type Error = E;
    type Computation = BoxFuture<'static, Result<V, E>>;

    fn generate(&self, key: &str) -> Self::Computation {
        let f = Arc::clone(&self.f);
        let key = key.to_owned();

        Box::pin(async move {
            match tokio::task::spawn_blocking(move || f(&key)).await {
                Ok(result) => result,
                Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
                // The runtime is shutting down and takes the awaiting task down with it.
                Err(_cancelled) => futures::future::pending().await,
            }
        })
    }
}
