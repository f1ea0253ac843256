use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;

type Flight<V> = Shared<BoxFuture<'static, Option<V>>>;

/// Coalesces concurrent producers of the same key: the first caller spawns
/// the work, later callers await the same outcome.
///
/// Work runs on its own task, so it completes even if every waiter goes away.
/// The entry is dropped from the registry as soon as the work finishes.
pub struct SingleFlight<K, V> {
    flights: Arc<Mutex<HashMap<K, Flight<V>>>>,
}

impl<K, V> SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            flights: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Returns `None` only when the producing task panicked.
    pub async fn run<F, Fut>(&self, key: K, work: F) -> Option<V>
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = V> + Send + 'static,
    {
        let flight = {
            let mut flights = self.flights.lock();
            match flights.get(&key) {
                Some(existing) => existing.clone(),
                None => {
                    let guard = FlightGuard {
                        registry: Arc::clone(&self.flights),
                        key: key.clone(),
                    };
                    let fut = work();
                    // The registry lock is held here, so the guard cannot
                    // remove the entry before it is inserted.
                    let handle = tokio::spawn(async move {
                        let _guard = guard;
                        fut.await
                    });
                    let flight: Flight<V> = async move { handle.await.ok() }.boxed().shared();
                    flights.insert(key, flight.clone());
                    flight
                }
            }
        };

        flight.await
    }

    pub fn in_flight(&self) -> usize {
        self.flights.lock().len()
    }
}

impl<K, V> Default for SingleFlight<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

struct FlightGuard<K: Eq + Hash, V> {
    registry: Arc<Mutex<HashMap<K, Flight<V>>>>,
    key: K,
}

impl<K: Eq + Hash, V> Drop for FlightGuard<K, V> {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn concurrent_callers_share_one_producer() {
        let flights: SingleFlight<String, u32> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let make = || {
            let calls = Arc::clone(&calls);
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                7
            }
        };

        let (a, b, c) = tokio::join!(
            flights.run("k".to_string(), make()),
            flights.run("k".to_string(), make()),
            flights.run("k".to_string(), make()),
        );

        assert_eq!((a, b, c), (Some(7), Some(7), Some(7)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(flights.in_flight(), 0);
    }

    #[tokio::test]
    async fn distinct_keys_run_independently() {
        let flights: SingleFlight<&'static str, &'static str> = SingleFlight::new();
        let (a, b) = tokio::join!(
            flights.run("a", || async { "first" }),
            flights.run("b", || async { "second" }),
        );
        assert_eq!(a, Some("first"));
        assert_eq!(b, Some("second"));
    }

    #[tokio::test]
    async fn finished_flight_is_not_reused() {
        let flights: SingleFlight<u8, usize> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for _ in 0..2 {
            let calls = Arc::clone(&calls);
            flights
                .run(1, move || async move { calls.fetch_add(1, Ordering::SeqCst) })
                .await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    async fn explode() -> u8 {
        panic!("boom")
    }

    #[tokio::test]
    async fn panicking_producer_yields_none_and_clears_entry() {
        let flights: SingleFlight<u8, u8> = SingleFlight::new();
        let outcome = flights.run(1, explode).await;
        assert_eq!(outcome, None);
        assert_eq!(flights.in_flight(), 0);
    }
}
