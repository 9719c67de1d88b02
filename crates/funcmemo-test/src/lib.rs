//! Helpers for testing memo caches.
//!
//! When writing tests, keep the following points in mind:
//!
//!  - In every test, call [`setup`]. This will set up the logger so that all console output
//!    is captured by the test runner.
//!
//!  - Generators under test should report every invocation to a [`CallCounter`], which is how
//!    tests assert that a computation ran exactly once.
//!
//!  - Use a [`Gate`] to keep a generator in flight until the test decides to release it.

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::fmt;

/// Setup the test environment.
///
///  - Initializes logs: The logger only captures logs from the `funcmemo` crate and mutes all
///    other logs.
pub fn setup() {
    fmt()
        .with_env_filter(EnvFilter::new("funcmemo=trace"))
        .with_target(false)
        .pretty()
        .with_test_writer()
        .try_init()
        .ok();
}

/// Counts generator invocations, and lets tests wait for a number of them.
#[derive(Clone, Debug)]
pub struct CallCounter {
    calls: Arc<watch::Sender<usize>>,
}

impl Default for CallCounter {
    fn default() -> Self {
        Self::new()
    }
}

impl CallCounter {
    /// Creates a counter starting at zero.
    pub fn new() -> Self {
        let (calls, _) = watch::channel(0);
        Self {
            calls: Arc::new(calls),
        }
    }

    /// Records one invocation.
    pub fn hit(&self) {
        self.calls.send_modify(|calls| *calls += 1);
    }

    /// Returns the number of invocations so far.
    pub fn count(&self) -> usize {
        *self.calls.borrow()
    }

    /// Waits until at least `calls` invocations were recorded.
    pub async fn wait_for(&self, calls: usize) {
        let mut receiver = self.calls.subscribe();
        // The sender lives in `self`, so this can not fail.
        receiver.wait_for(|current| *current >= calls).await.ok();
    }
}

/// A release signal which stays open once opened.
#[derive(Clone, Debug)]
pub struct Gate {
    open: Arc<watch::Sender<bool>>,
}

impl Default for Gate {
    fn default() -> Self {
        Self::new()
    }
}

impl Gate {
    /// Creates a closed gate.
    pub fn new() -> Self {
        let (open, _) = watch::channel(false);
        Self {
            open: Arc::new(open),
        }
    }

    /// Opens the gate, releasing all current and future waiters.
    pub fn open(&self) {
        self.open.send_replace(true);
    }

    /// Waits until the gate is opened.
    pub async fn wait(&self) {
        let mut receiver = self.open.subscribe();
        receiver.wait_for(|open| *open).await.ok();
    }
}
