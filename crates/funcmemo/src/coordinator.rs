use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use futures::channel::oneshot;
use tokio::sync::mpsc;
use tracing::Instrument;

use crate::entry::{self, Entry};
use crate::{Generator, MemoCache, MemoConfig, MemoError};

type Response<V, E> = oneshot::Sender<Result<V, MemoError<E>>>;

/// A lookup sent to the coordinator, with a private slot for the result.
struct Request<V, E> {
    key: String,
    response: Response<V, E>,
}

enum RequestSender<V, E> {
    Bounded(mpsc::Sender<Request<V, E>>),
    Unbounded(mpsc::UnboundedSender<Request<V, E>>),
}

impl<V, E> Clone for RequestSender<V, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Bounded(sender) => Self::Bounded(sender.clone()),
            Self::Unbounded(sender) => Self::Unbounded(sender.clone()),
        }
    }
}

impl<V, E> RequestSender<V, E> {
    /// Enqueues the request, returning `false` if the coordinator is gone.
    async fn send(&self, request: Request<V, E>) -> bool {
        match self {
            Self::Bounded(sender) => sender.send(request).await.is_ok(),
            Self::Unbounded(sender) => sender.send(request).is_ok(),
        }
    }
}

enum RequestReceiver<V, E> {
    Bounded(mpsc::Receiver<Request<V, E>>),
    Unbounded(mpsc::UnboundedReceiver<Request<V, E>>),
}

impl<V, E> RequestReceiver<V, E> {
    async fn recv(&mut self) -> Option<Request<V, E>> {
        match self {
            Self::Bounded(receiver) => receiver.recv().await,
            Self::Unbounded(receiver) => receiver.recv().await,
        }
    }
}

fn request_queue<V, E>(size: Option<usize>) -> (RequestSender<V, E>, RequestReceiver<V, E>) {
    match size {
        Some(size) => {
            let (sender, receiver) = mpsc::channel(size.max(1));
            (
                RequestSender::Bounded(sender),
                RequestReceiver::Bounded(receiver),
            )
        }
        None => {
            let (sender, receiver) = mpsc::unbounded_channel();
            (
                RequestSender::Unbounded(sender),
                RequestReceiver::Unbounded(receiver),
            )
        }
    }
}

/// A memo cache owned by a single coordinator task.
///
/// Callers never touch the cached entries. Each [`get`](Self::get) sends its key to the
/// coordinator, which looks it up in its private map, spawns the generator for new keys, and
/// spawns a delivery task that forwards the entry's result to the caller once it is ready. The
/// coordinator itself never waits on a generator or an entry, so slow keys do not hold up others.
///
/// After [`close`](Self::close), new requests fail with [`MemoError::Closed`]. Requests that were
/// already accepted are still answered. Dropping the cache closes it as well.
pub struct CoordinatorCache<G: Generator> {
    name: Arc<str>,
    requests: Mutex<Option<RequestSender<G::Value, G::Error>>>,
}

impl<G: Generator> fmt::Debug for CoordinatorCache<G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoordinatorCache")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<G: Generator> CoordinatorCache<G> {
    /// Creates a new cache with the default configuration.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime, as the coordinator task is spawned on it.
    pub fn new(generator: G) -> Self {
        Self::with_config(generator, &MemoConfig::default())
    }

    /// Creates a new cache and spawns its coordinator on the current Tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside of a Tokio runtime.
    pub fn with_config(generator: G, config: &MemoConfig) -> Self {
        let name: Arc<str> = config.name.as_str().into();
        let (sender, receiver) = request_queue(config.request_queue_size);

        let coordinator = Coordinator {
            generator: Arc::new(generator),
            entries: HashMap::new(),
        };
        let span = tracing::debug_span!("memo.coordinator", cache = %name);
        tokio::spawn(coordinator.run(receiver).instrument(span));

        CoordinatorCache {
            name,
            requests: Mutex::new(Some(sender)),
        }
    }

    /// Whether [`close`](Self::close) was called.
    pub fn is_closed(&self) -> bool {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_none()
    }

    /// Returns the memoized result for `key`.
    ///
    /// Fails with [`MemoError::Closed`] if the cache was closed before this call. The returned
    /// future does not borrow the cache, so a request stays alive even if the cache is dropped
    /// while it is in flight.
    pub fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<G::Value, MemoError<G::Error>>> + Send + use<G> {
        let sender = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let key = key.to_owned();

        async move {
            let Some(sender) = sender else {
                return Err(MemoError::Closed);
            };

            let (response, receiver) = oneshot::channel();
            if !sender.send(Request { key, response }).await {
                return Err(MemoError::Closed);
            }
            // Do not keep the queue open for longer than needed.
            drop(sender);

            // The response slot is only dropped without an answer when the runtime shuts down.
            receiver.await.unwrap_or(Err(MemoError::Closed))
        }
    }

    /// Stops accepting new requests.
    ///
    /// The coordinator finishes the requests already queued and then exits. Closing an already
    /// closed cache returns [`MemoError::Closed`].
    pub fn close(&self) -> Result<(), MemoError<G::Error>> {
        let sender = self
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        match sender {
            Some(_) => {
                tracing::debug!(cache = %self.name, "closing memo cache");
                Ok(())
            }
            None => Err(MemoError::Closed),
        }
    }
}

impl<G: Generator> MemoCache for CoordinatorCache<G> {
    type Value = G::Value;
    type Error = G::Error;

    fn get(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Self::Value, MemoError<Self::Error>>> + Send {
        CoordinatorCache::get(self, key)
    }

    fn close(&self) -> Result<(), MemoError<Self::Error>> {
        CoordinatorCache::close(self)
    }
}

/// The task exclusively owning the entries of a [`CoordinatorCache`].
struct Coordinator<G: Generator> {
    generator: Arc<G>,
    entries: HashMap<String, Entry<G::Value, G::Error>>,
}

impl<G: Generator> Coordinator<G> {
    /// Serves requests until the queue is closed and drained.
    async fn run(mut self, mut requests: RequestReceiver<G::Value, G::Error>) {
        while let Some(request) = requests.recv().await {
            self.handle(request);
        }

        tracing::debug!(entries = self.entries.len(), "memo coordinator stopped");
    }

    fn handle(&mut self, request: Request<G::Value, G::Error>) {
        let Request { key, response } = request;

        let entry = match self.entries.get(&key) {
            Some(entry) => {
                tracing::trace!(key = %key, "delivering existing entry");
                entry.clone()
            }
            None => {
                tracing::debug!(key = %key, "computing new entry");
                let (entry, completion) = entry::pending();
                self.entries.insert(key.clone(), entry.clone());

                let generator = Arc::clone(&self.generator);
                let computation = async move {
                    let result = generator.generate(&key).await;
                    completion.complete(result);
                };
                tokio::spawn(computation.in_current_span());

                entry
            }
        };

        let delivery = async move {
            // The caller may have given up waiting, which is fine.
            response.send(entry.wait().await).ok();
        };
        tokio::spawn(delivery.in_current_span());
    }
}
