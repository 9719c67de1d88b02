//! Properties every memo cache has to fulfill, run against all cache variants.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use funcmemo::{CoordinatorCache, GuardedCache, MemoCache, MemoError};
use funcmemo_test::{CallCounter, Gate};
use futures::FutureExt;

use crate::{TIMEOUT, gated_generator, len_generator, test};

async fn single_invocation<C>(cache: Arc<C>, counter: CallCounter)
where
    C: MemoCache<Value = usize, Error = String> + Send + Sync + 'static,
{
    let callers: Vec<_> = (0..10)
        .map(|_| {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move { cache.get("abc").await })
        })
        .collect();

    let results = tokio::time::timeout(TIMEOUT, futures::future::try_join_all(callers))
        .await
        .unwrap()
        .unwrap();

    // Every caller sees the very same result.
    assert_eq!(results, vec![Ok(3); 10]);
    assert_eq!(counter.count(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_invocation_coordinator() {
    test::setup();
    let counter = CallCounter::new();
    let cache = Arc::new(CoordinatorCache::new(len_generator(counter.clone())));
    single_invocation(cache, counter).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_invocation_guarded() {
    test::setup();
    let counter = CallCounter::new();
    let cache = Arc::new(GuardedCache::new(len_generator(counter.clone())));
    single_invocation(cache, counter).await;
}

async fn error_memoization<C>(cache: C, counter: CallCounter)
where
    C: MemoCache<Value = usize, Error = String>,
{
    let expected = Err(MemoError::Generator("boom".to_owned()));

    let (first, second) = futures::join!(cache.get("x"), cache.get("x"));
    assert_eq!(first, expected);
    assert_eq!(second, expected);

    // Later calls get the cached error as well, the generator is not retried.
    assert_eq!(cache.get("x").await, expected);
    assert_eq!(counter.count(), 1);
}

#[tokio::test]
async fn test_error_memoization_coordinator() {
    test::setup();
    let counter = CallCounter::new();
    let cache = CoordinatorCache::new(len_generator(counter.clone()));
    error_memoization(cache, counter).await;
}

#[tokio::test]
async fn test_error_memoization_guarded() {
    test::setup();
    let counter = CallCounter::new();
    let cache = GuardedCache::new(len_generator(counter.clone()));
    error_memoization(cache, counter).await;
}

async fn cross_key_parallelism<C>(cache: C, counter: CallCounter, gates: [Gate; 2])
where
    C: MemoCache<Value = usize, Error = String>,
{
    let [gate_a, gate_b] = gates;
    let lookups = futures::future::join(cache.get("a"), cache.get("bb"));
    let release = async {
        // Both generators have to be in flight at the same time before either is released.
        counter.wait_for(2).await;
        gate_b.open();
        gate_a.open();
    };

    let ((a, b), ()) = tokio::time::timeout(TIMEOUT, async { tokio::join!(lookups, release) })
        .await
        .unwrap();

    assert_eq!(a, Ok(1));
    assert_eq!(b, Ok(2));
    assert_eq!(counter.count(), 2);
}

fn gates() -> ([Gate; 2], HashMap<&'static str, Gate>) {
    let gates = [Gate::new(), Gate::new()];
    let by_key = HashMap::from([("a", gates[0].clone()), ("bb", gates[1].clone())]);
    (gates, by_key)
}

#[tokio::test]
async fn test_cross_key_parallelism_coordinator() {
    test::setup();
    let counter = CallCounter::new();
    let (gates, by_key) = gates();
    let cache = CoordinatorCache::new(gated_generator(counter.clone(), by_key));
    cross_key_parallelism(cache, counter, gates).await;
}

#[tokio::test]
async fn test_cross_key_parallelism_guarded() {
    test::setup();
    let counter = CallCounter::new();
    let (gates, by_key) = gates();
    let cache = GuardedCache::new(gated_generator(counter.clone(), by_key));
    cross_key_parallelism(cache, counter, gates).await;
}

#[tokio::test]
async fn test_idempotent_reread_guarded() {
    test::setup();
    let counter = CallCounter::new();
    let cache = GuardedCache::new(len_generator(counter.clone()));

    assert_eq!(cache.get("").await, Ok(0));
    // A ready entry is served without waiting on anything.
    assert_eq!(MemoCache::get(&cache, "").now_or_never(), Some(Ok(0)));
    assert_eq!(counter.count(), 1);
}

#[tokio::test]
async fn test_idempotent_reread_coordinator() {
    test::setup();
    let counter = CallCounter::new();
    let slow = Gate::new();
    let gates = HashMap::from([("slow", slow.clone())]);
    let cache = CoordinatorCache::new(gated_generator(counter.clone(), gates));

    assert_eq!(cache.get("abc").await, Ok(3));

    // Keep another key in flight while re-reading the ready one.
    let pending = tokio::spawn(cache.get("slow"));
    tokio::time::timeout(TIMEOUT, counter.wait_for(2))
        .await
        .unwrap();

    for _ in 0..5 {
        let reread = tokio::time::timeout(Duration::from_millis(500), cache.get("abc"))
            .await
            .unwrap();
        assert_eq!(reread, Ok(3));
    }
    assert_eq!(counter.count(), 2);

    slow.open();
    let slow_result = tokio::time::timeout(TIMEOUT, pending).await.unwrap().unwrap();
    assert_eq!(slow_result, Ok(4));
    assert_eq!(counter.count(), 2);
}

async fn first_caller_gives_up<C>(cache: C, counter: CallCounter, gate: Gate)
where
    C: MemoCache<Value = usize, Error = String>,
{
    let first = tokio::time::timeout(Duration::from_millis(20), cache.get("abc"));
    let waiter = cache.get("abc");
    let release = async {
        counter.wait_for(1).await;
        // Open the gate only after the first caller timed out.
        tokio::time::sleep(Duration::from_millis(60)).await;
        gate.open();
    };

    let (first, waiter, ()) =
        tokio::time::timeout(TIMEOUT, async { tokio::join!(first, waiter, release) })
            .await
            .unwrap();

    assert!(first.is_err());
    assert_eq!(waiter, Ok(3));
    assert_eq!(cache.get("abc").await, Ok(3));
    assert_eq!(counter.count(), 1);
}

#[tokio::test]
async fn test_first_caller_gives_up_coordinator() {
    test::setup();
    let counter = CallCounter::new();
    let gate = Gate::new();
    let gates = HashMap::from([("abc", gate.clone())]);
    let cache = CoordinatorCache::new(gated_generator(counter.clone(), gates));
    first_caller_gives_up(cache, counter, gate).await;
}

#[tokio::test]
async fn test_first_caller_gives_up_guarded() {
    test::setup();
    let counter = CallCounter::new();
    let gate = Gate::new();
    let gates = HashMap::from([("abc", gate.clone())]);
    let cache = GuardedCache::new(gated_generator(counter.clone(), gates));
    first_caller_gives_up(cache, counter, gate).await;
}
