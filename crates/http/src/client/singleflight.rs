//! Coalescing of concurrent identical operations into one in-flight call

use futures::future::{BoxFuture, FutureExt, Shared};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Mutex;

type Flight<T> = Shared<BoxFuture<'static, T>>;

struct Slot<T: Clone> {
    generation: u64,
    current: Option<(u64, Flight<T>)>,
}

/// At most one pending operation; late callers await the pending one.
///
/// The slot is emptied by the operation itself when it finishes, before any
/// caller observes the result, so the next [`SingleFlight::run`] after a
/// completion always starts a fresh operation.
pub struct SingleFlight<T: Clone> {
    slot: Arc<Mutex<Slot<T>>>,
}

impl<T: Clone> Default for SingleFlight<T> {
    fn default() -> Self {
        Self {
            slot: Arc::new(Mutex::new(Slot {
                generation: 0,
                current: None,
            })),
        }
    }
}

impl<T> SingleFlight<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// Create an idle slot
    pub fn new() -> Self {
        Self::default()
    }

    /// Join the pending operation, or start one with `start` if none is pending
    pub async fn run<F, Fut>(&self, start: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let flight = {
            let mut slot = self.slot.lock().await;
            if let Some((_, flight)) = &slot.current {
                flight.clone()
            } else {
                slot.generation = slot.generation.wrapping_add(1);
                let id = slot.generation;
                let release = Arc::clone(&self.slot);
                let work = start();

                let flight = async move {
                    let output = work.await;
                    let mut slot = release.lock().await;
                    if matches!(&slot.current, Some((current, _)) if *current == id) {
                        slot.current = None;
                    }
                    output
                }
                .boxed()
                .shared();

                slot.current = Some((id, flight.clone()));
                flight
            }
        };

        flight.await
    }

    /// Whether an operation is currently pending
    pub async fn is_in_flight(&self) -> bool {
        self.slot.lock().await.current.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn counted(calls: &Arc<AtomicUsize>, result: Result<u32, String>) -> Result<u32, String> {
        calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(50)).await;
        result
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_operation() {
        let flight = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let runs = (0..8).map(|i| {
            let calls = Arc::clone(&calls);
            let flight = &flight;
            async move {
                flight
                    .run(move || async move { counted(&calls, Ok(i)).await })
                    .await
            }
        });
        let results = futures::future::join_all(runs).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.iter().all(|r| r == &Ok(0)));
        assert!(!flight.is_in_flight().await);
    }

    #[tokio::test]
    async fn failure_is_shared_and_slot_is_released() {
        let flight = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let first = {
            let calls = Arc::clone(&calls);
            flight.run(move || async move { counted(&calls, Err("boom".into())).await })
        };
        let second = {
            let calls = Arc::clone(&calls);
            flight.run(move || async move { counted(&calls, Ok(1)).await })
        };
        let (a, b) = tokio::join!(first, second);

        assert_eq!(a, Err("boom".to_string()));
        assert_eq!(b, Err("boom".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let calls_after = Arc::clone(&calls);
        let fresh = flight
            .run(move || async move { counted(&calls_after, Ok(2)).await })
            .await;
        assert_eq!(fresh, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn sequential_runs_start_fresh() {
        let flight: SingleFlight<usize> = SingleFlight::new();
        let calls = Arc::new(AtomicUsize::new(0));

        for expected in 1..=3 {
            let calls = Arc::clone(&calls);
            let seen = flight
                .run(move || async move { calls.fetch_add(1, Ordering::SeqCst) + 1 })
                .await;
            assert_eq!(seen, expected);
        }
    }
}
