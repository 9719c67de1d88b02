//! The per-key memo entry and its one-shot completion signal.

use std::fmt;

use futures::channel::oneshot;
use futures::future::{FutureExt, Shared};

use crate::MemoError;

type ComputationChannel<V, E> = Shared<oneshot::Receiver<Result<V, E>>>;

/// Creates a new pending entry, together with the [`Completion`] that makes it ready.
///
/// The entry can be cloned and waited on any number of times. It becomes ready exactly once,
/// when the completion is fired.
pub(crate) fn pending<V, E>() -> (Entry<V, E>, Completion<V, E>)
where
    V: Clone,
    E: Clone,
{
    let (sender, receiver) = oneshot::channel();
    let entry = Entry {
        channel: receiver.shared(),
    };
    let completion = Completion {
        sender: Some(sender),
    };
    (entry, completion)
}

/// A memoized result, which might still be computing.
pub(crate) struct Entry<V, E> {
    channel: ComputationChannel<V, E>,
}

impl<V, E> Clone for Entry<V, E>
where
    V: Clone,
    E: Clone,
{
    fn clone(&self) -> Self {
        Entry {
            channel: self.channel.clone(),
        }
    }
}

impl<V, E> fmt::Debug for Entry<V, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry").finish_non_exhaustive()
    }
}

impl<V, E> Entry<V, E>
where
    V: Clone,
    E: Clone,
{
    /// Waits for the entry to become ready and returns a copy of its result.
    ///
    /// Returns immediately for entries that are already ready.
    pub async fn wait(self) -> Result<V, MemoError<E>> {
        match self.channel.await {
            Ok(result) => result.map_err(MemoError::Generator),
            Err(oneshot::Canceled) => Err(MemoError::Abandoned),
        }
    }
}

/// The write side of an [`Entry`].
///
/// Firing the completion consumes it, so an entry can never be completed twice. If it is dropped
/// without being fired, the entry resolves to [`MemoError::Abandoned`] for all waiters.
pub(crate) struct Completion<V, E> {
    sender: Option<oneshot::Sender<Result<V, E>>>,
}

impl<V, E> Completion<V, E> {
    /// Stores the result in the entry and wakes up all waiters.
    pub fn complete(mut self, result: Result<V, E>) {
        if let Some(sender) = self.sender.take() {
            // Fails only if every clone of the entry is gone, in which case nobody is interested.
            sender.send(result).ok();
        }
    }
}

impl<V, E> Drop for Completion<V, E> {
    fn drop(&mut self) {
        if self.sender.is_some() {
            tracing::warn!("memo computation abandoned without a result");
        }
    }
}
